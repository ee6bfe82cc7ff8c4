// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Audit records for person merges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::person::{PersonId, TeamId};

/// Unique identifier for a person merge record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersonMergeId(pub Uuid);

impl PersonMergeId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for PersonMergeId {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Display for PersonMergeId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::str::FromStr for PersonMergeId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// An audit record of one person being absorbed into another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonMerge {
	pub id: PersonMergeId,
	pub team_id: TeamId,
	pub survivor_id: PersonId,
	pub absorbed_id: PersonId,
	pub reason: MergeReason,
	pub merged_at: DateTime<Utc>,
}

impl PersonMerge {
	pub fn new(
		team_id: TeamId,
		survivor_id: PersonId,
		absorbed_id: PersonId,
		reason: MergeReason,
	) -> Self {
		Self {
			id: PersonMergeId::new(),
			team_id,
			survivor_id,
			absorbed_id,
			reason,
			merged_at: Utc::now(),
		}
	}
}

/// Why two persons were linked.
///
/// `previous_distinct_id` is the identifier the client claims it used before;
/// `distinct_id` is the identifier the event was captured under.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MergeReason {
	/// `$create_alias` event.
	Alias {
		previous_distinct_id: String,
		distinct_id: String,
	},
	/// `$identify` event carrying `$anon_distinct_id`.
	Identify {
		previous_distinct_id: String,
		distinct_id: String,
	},
}

impl MergeReason {
	pub fn alias(previous_distinct_id: String, distinct_id: String) -> Self {
		MergeReason::Alias {
			previous_distinct_id,
			distinct_id,
		}
	}

	pub fn identify(previous_distinct_id: String, distinct_id: String) -> Self {
		MergeReason::Identify {
			previous_distinct_id,
			distinct_id,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			MergeReason::Alias { .. } => "alias",
			MergeReason::Identify { .. } => "identify",
		}
	}
}
