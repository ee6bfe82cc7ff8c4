// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for ingestion payload handling.

use thiserror::Error;

/// Errors raised while interpreting a captured event payload.
///
/// These never depend on storage state; they describe input that cannot be
/// turned into a well-formed event.
#[derive(Debug, Error)]
pub enum IngestError {
	#[error("invalid element at position {index}: {reason}")]
	InvalidElement { index: usize, reason: String },

	#[error("invalid timestamp {value:?}: {reason}")]
	InvalidTimestamp { value: String, reason: String },

	#[error("invalid payload: {0}")]
	InvalidPayload(String),

	#[error("serialization error: {0}")]
	Serialization(String),
}

impl From<serde_json::Error> for IngestError {
	fn from(err: serde_json::Error) -> Self {
		IngestError::Serialization(err.to_string())
	}
}

/// A specialized `Result` type for ingestion core operations.
pub type Result<T> = std::result::Result<T, IngestError>;
