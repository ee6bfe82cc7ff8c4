// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Identity resolution: linking two distinct IDs to one person.
//!
//! When a client reports that a prior identifier and its current identifier
//! belong to the same user, the resolver looks both up and picks one action:
//!
//! | prior    | current  | action                                   |
//! |----------|----------|------------------------------------------|
//! | X        | none     | attach current to X                      |
//! | none     | Y        | attach prior to Y                        |
//! | none     | none     | create one person with both              |
//! | X        | X        | nothing                                  |
//! | X        | Y        | merge X into Y; the current ID's person survives |
//!
//! Workers run this concurrently against the same store. When a write finds
//! the state it decided on has changed underneath it (an identifier got bound,
//! or a person got absorbed), the whole decision is retried from fresh
//! lookups, up to [`MAX_ATTEMPTS`] times.

use std::sync::Arc;
use tracing::{instrument, warn};

use tally_ingest_core::{AliasKind, MergeReason, Person, PersonId, TeamId};

use crate::error::{IngestServerError, Result};
use crate::repository::PersonDirectory;

/// Attempts per resolution before giving up with `ResolutionExhausted`.
pub const MAX_ATTEMPTS: u32 = 2;

/// Details about a person merge event for audit logging.
#[derive(Debug, Clone)]
pub struct PersonMergeDetails {
	pub team_id: TeamId,
	/// The person that survives.
	pub survivor_id: PersonId,
	/// The person that was absorbed and deleted.
	pub absorbed_id: PersonId,
	pub reason: MergeReason,
	/// Number of distinct IDs repointed to the survivor.
	pub identifiers_transferred: u64,
}

/// Hook trait for receiving notifications about person merges.
///
/// Called after the merge transaction has committed.
pub trait MergeAuditHook: Send + Sync {
	fn on_merge(&self, details: PersonMergeDetails);
}

/// A no-op implementation of MergeAuditHook that does nothing.
#[derive(Debug, Clone, Default)]
pub struct NoOpMergeAuditHook;

impl MergeAuditHook for NoOpMergeAuditHook {
	fn on_merge(&self, _details: PersonMergeDetails) {}
}

/// Shared reference to a merge audit hook.
pub type SharedMergeAuditHook = Arc<dyn MergeAuditHook>;

/// What the resolver ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
	/// An unbound identifier was attached to an existing person.
	Attached {
		person_id: PersonId,
		distinct_id: String,
	},
	/// Neither identifier was known; a person was created with both.
	Created { person_id: PersonId },
	/// Two persons were merged.
	Merged {
		survivor_id: PersonId,
		absorbed_id: PersonId,
	},
	/// Both identifiers already belonged to the same person.
	AlreadyLinked { person_id: PersonId },
}

impl Resolution {
	/// The person both identifiers now belong to.
	pub fn person_id(&self) -> PersonId {
		match self {
			Resolution::Attached { person_id, .. }
			| Resolution::Created { person_id }
			| Resolution::AlreadyLinked { person_id } => *person_id,
			Resolution::Merged { survivor_id, .. } => *survivor_id,
		}
	}
}

/// Service that links identifiers and merges persons.
pub struct IdentityResolver<D: PersonDirectory> {
	directory: D,
	audit_hook: Option<SharedMergeAuditHook>,
}

impl<D: PersonDirectory> IdentityResolver<D> {
	pub fn new(directory: D) -> Self {
		Self {
			directory,
			audit_hook: None,
		}
	}

	pub fn with_audit_hook(directory: D, hook: SharedMergeAuditHook) -> Self {
		Self {
			directory,
			audit_hook: Some(hook),
		}
	}

	pub fn set_audit_hook(&mut self, hook: SharedMergeAuditHook) {
		self.audit_hook = Some(hook);
	}

	/// Makes `previous_distinct_id` and `distinct_id` resolve to one person.
	///
	/// On merge, the person `distinct_id` was bound to survives.
	#[instrument(skip(self), fields(team_id = %team_id, previous_distinct_id = %previous_distinct_id, distinct_id = %distinct_id))]
	pub async fn resolve(
		&self,
		team_id: TeamId,
		previous_distinct_id: &str,
		distinct_id: &str,
		kind: AliasKind,
	) -> Result<Resolution> {
		for attempt in 1..=MAX_ATTEMPTS {
			match self
				.attempt(team_id, previous_distinct_id, distinct_id, kind)
				.await
			{
				Ok(resolution) => {
					tracing::debug!(attempt, ?resolution, "identity resolved");
					return Ok(resolution);
				}
				Err(e) if e.is_lost_race() => {
					warn!(attempt, error = %e, "identity resolution lost a race, retrying");
				}
				Err(e) => return Err(e),
			}
		}

		Err(IngestServerError::ResolutionExhausted {
			team_id,
			attempts: MAX_ATTEMPTS,
		})
	}

	async fn attempt(
		&self,
		team_id: TeamId,
		previous_distinct_id: &str,
		distinct_id: &str,
		kind: AliasKind,
	) -> Result<Resolution> {
		let previous = self.directory.find(team_id, previous_distinct_id).await?;
		let current = self.directory.find(team_id, distinct_id).await?;

		match (previous, current) {
			(Some(person), None) => {
				self.directory.attach_identifier(&person, distinct_id).await?;
				Ok(Resolution::Attached {
					person_id: person.id,
					distinct_id: distinct_id.to_string(),
				})
			}

			(None, Some(person)) => {
				self
					.directory
					.attach_identifier(&person, previous_distinct_id)
					.await?;
				Ok(Resolution::Attached {
					person_id: person.id,
					distinct_id: previous_distinct_id.to_string(),
				})
			}

			(None, None) => {
				let person = Person::new(team_id);
				let mut distinct_ids = vec![previous_distinct_id.to_string()];
				if distinct_id != previous_distinct_id {
					distinct_ids.push(distinct_id.to_string());
				}
				self
					.directory
					.create_with_identifiers(&person, &distinct_ids)
					.await?;
				Ok(Resolution::Created {
					person_id: person.id,
				})
			}

			(Some(absorbed), Some(survivor)) => {
				if absorbed.id == survivor.id {
					return Ok(Resolution::AlreadyLinked {
						person_id: survivor.id,
					});
				}

				let reason = match kind {
					AliasKind::Alias => {
						MergeReason::alias(previous_distinct_id.to_string(), distinct_id.to_string())
					}
					AliasKind::Identify => MergeReason::identify(
						previous_distinct_id.to_string(),
						distinct_id.to_string(),
					),
				};

				match self
					.directory
					.merge_into(survivor.id, absorbed.id, reason)
					.await?
				{
					Some(outcome) => {
						if let Some(ref hook) = self.audit_hook {
							hook.on_merge(PersonMergeDetails {
								team_id,
								survivor_id: survivor.id,
								absorbed_id: absorbed.id,
								reason: outcome.merge.reason,
								identifiers_transferred: outcome.identifiers_transferred,
							});
						}
						Ok(Resolution::Merged {
							survivor_id: survivor.id,
							absorbed_id: absorbed.id,
						})
					}
					None => Ok(Resolution::AlreadyLinked {
						person_id: survivor.id,
					}),
				}
			}
		}
	}
}
