// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ingest worker configuration.

use serde::Deserialize;

const DEFAULT_CONCURRENCY: usize = 16;

/// Ingest worker configuration (runtime, fully resolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestConfig {
	/// Maximum number of tasks processed at once.
	pub concurrency: usize,
	/// Stop at the first failed task instead of logging and continuing.
	pub fail_fast: bool,
}

impl Default for IngestConfig {
	fn default() -> Self {
		IngestConfigLayer::default().finalize()
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IngestConfigLayer {
	#[serde(default)]
	pub concurrency: Option<usize>,
	#[serde(default)]
	pub fail_fast: Option<bool>,
}

impl IngestConfigLayer {
	pub fn merge(&mut self, other: IngestConfigLayer) {
		if other.concurrency.is_some() {
			self.concurrency = other.concurrency;
		}
		if other.fail_fast.is_some() {
			self.fail_fast = other.fail_fast;
		}
	}

	pub fn finalize(self) -> IngestConfig {
		IngestConfig {
			concurrency: self.concurrency.unwrap_or(DEFAULT_CONCURRENCY),
			fail_fast: self.fail_fast.unwrap_or(false),
		}
	}
}
