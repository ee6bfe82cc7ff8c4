// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for the ingestion server.

use tally_ingest_core::{PersonId, TeamId};
use thiserror::Error;

/// Errors that can occur while ingesting events.
#[derive(Debug, Error)]
pub enum IngestServerError {
	#[error(transparent)]
	Core(#[from] tally_ingest_core::IngestError),

	#[error("database error: {0}")]
	Database(#[from] sqlx::Error),

	#[error("serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	/// A distinct ID is already bound to a person in this team.
	#[error("distinct id already bound in team {team_id}: {distinct_id}")]
	DuplicateIdentifier { team_id: TeamId, distinct_id: String },

	/// An element group with this hash already exists in this team.
	#[error("element chain {hash} already stored in team {team_id}")]
	DuplicateChainHash { team_id: TeamId, hash: String },

	#[error("person not found: {0}")]
	PersonNotFound(PersonId),

	/// Identity resolution kept losing races with concurrent writers.
	#[error("identity resolution for team {team_id} gave up after {attempts} attempts")]
	ResolutionExhausted { team_id: TeamId, attempts: u32 },

	/// The store contradicted itself, e.g. a unique violation with no row behind it.
	#[error("store consistency violation: {0}")]
	StoreConsistencyViolation(String),

	#[error("internal error: {0}")]
	Internal(String),
}

impl IngestServerError {
	/// Whether this error means a concurrent writer changed identity state
	/// between our lookup and our write.
	pub fn is_lost_race(&self) -> bool {
		matches!(
			self,
			IngestServerError::DuplicateIdentifier { .. } | IngestServerError::PersonNotFound(_)
		)
	}
}

/// A specialized `Result` type for ingestion server operations.
pub type Result<T> = std::result::Result<T, IngestServerError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lost_race_classification() {
		let duplicate = IngestServerError::DuplicateIdentifier {
			team_id: TeamId(1),
			distinct_id: "a".to_string(),
		};
		assert!(duplicate.is_lost_race());
		assert!(IngestServerError::PersonNotFound(PersonId::new()).is_lost_race());
		assert!(!IngestServerError::Internal("x".to_string()).is_lost_race());
		assert!(!IngestServerError::ResolutionExhausted {
			team_id: TeamId(1),
			attempts: 2
		}
		.is_lost_race());
	}
}
