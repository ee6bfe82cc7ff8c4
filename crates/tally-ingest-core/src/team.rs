// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-team registry of event names and property keys seen during ingestion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::person::TeamId;

/// A team's ingestion registry. Both lists only ever grow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
	pub id: TeamId,
	pub event_names: Vec<String>,
	pub event_properties: Vec<String>,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Team {
	pub fn new(id: TeamId) -> Self {
		let now = Utc::now();
		Self {
			id,
			event_names: Vec::new(),
			event_properties: Vec::new(),
			created_at: now,
			updated_at: now,
		}
	}

	/// Records an event name and its property keys.
	///
	/// Returns `true` if anything new was added, i.e. the team needs saving.
	pub fn register<'a>(&mut self, event: &str, keys: impl IntoIterator<Item = &'a str>) -> bool {
		let mut changed = false;
		if !self.event_names.iter().any(|e| e == event) {
			self.event_names.push(event.to_string());
			changed = true;
		}
		for key in keys {
			if !self.event_properties.iter().any(|p| p == key) {
				self.event_properties.push(key.to_string());
				changed = true;
			}
		}
		if changed {
			self.updated_at = Utc::now();
		}
		changed
	}
}
