// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-event ingestion.
//!
//! [`EventIngestPipeline::process`] is the entry point the task runner calls
//! once per captured event. It links identifiers for alias and identify
//! events, applies `$set` profiles, resolves the event time, stores the click
//! path as a deduplicated element chain, records new event names and property
//! keys on the team, makes sure a person exists for the sender and finally
//! stores the event.

use tracing::{instrument, warn};

use tally_ingest_core::{
	parse_elements, special_events, Event, IngestTask, Person, TeamId, ELEMENTS_PROPERTY,
};

use crate::error::{IngestServerError, Result};
use crate::identity_resolution::{IdentityResolver, SharedMergeAuditHook, MAX_ATTEMPTS};
use crate::repository::{ElementChainStore, EventStore, PersonDirectory, TeamRegistry};

/// Runs ingestion tasks against one repository.
pub struct EventIngestPipeline<R>
where
	R: PersonDirectory + ElementChainStore + EventStore + TeamRegistry + Clone,
{
	repository: R,
	resolver: IdentityResolver<R>,
}

impl<R> EventIngestPipeline<R>
where
	R: PersonDirectory + ElementChainStore + EventStore + TeamRegistry + Clone,
{
	pub fn new(repository: R) -> Self {
		Self {
			resolver: IdentityResolver::new(repository.clone()),
			repository,
		}
	}

	pub fn with_audit_hook(repository: R, hook: SharedMergeAuditHook) -> Self {
		Self {
			resolver: IdentityResolver::with_audit_hook(repository.clone(), hook),
			repository,
		}
	}

	pub fn resolver(&self) -> &IdentityResolver<R> {
		&self.resolver
	}

	/// Ingests one event. Returns the event as stored.
	#[instrument(skip(self, task), fields(team_id = %task.team_id, distinct_id = %task.distinct_id, event = %task.data.event))]
	pub async fn process(&self, task: &IngestTask) -> Result<Event> {
		let team_id = task.team_id;
		let now = task.now()?;

		if let Some((previous, kind)) = task.data.alias_request()? {
			self
				.resolver
				.resolve(team_id, &previous, &task.distinct_id, kind)
				.await?;
		}

		if let Some(set) = task.data.profile_update() {
			self.update_profile(team_id, &task.distinct_id, set).await?;
		}

		let timestamp = task.data.resolve_timestamp(now)?;

		let mut properties = task.data.event_properties();
		properties.insert(
			special_events::IP_PROPERTY.to_string(),
			serde_json::Value::String(task.ip.clone()),
		);

		let elements_hash = match properties.remove(ELEMENTS_PROPERTY) {
			Some(raw) if has_elements(&raw) => {
				let chain = parse_elements(&raw)?;
				let group = ElementChainStore::get_or_create(&self.repository, team_id, &chain).await?;
				Some(group.hash)
			}
			Some(raw) => {
				properties.insert(ELEMENTS_PROPERTY.to_string(), raw);
				None
			}
			None => None,
		};

		let keys: Vec<String> = properties.keys().cloned().collect();
		self
			.repository
			.register(team_id, &task.data.event, &keys)
			.await?;

		self.ensure_person(team_id, &task.distinct_id).await?;

		let event = Event::new(team_id, task.distinct_id.clone(), task.data.event.clone())
			.with_properties(serde_json::Value::Object(properties))
			.with_site_url(task.site_url.clone())
			.with_timestamp(timestamp)
			.with_elements_hash(elements_hash);
		self.repository.insert_event(&event).await?;

		tracing::debug!(event_id = %event.id, "event ingested");
		Ok(event)
	}

	/// Applies a `$set` profile to the sender's person, creating it if needed.
	///
	/// Retried once if the person is absorbed by a merge between lookup and
	/// update.
	async fn update_profile(
		&self,
		team_id: TeamId,
		distinct_id: &str,
		set: &serde_json::Map<String, serde_json::Value>,
	) -> Result<Person> {
		for attempt in 1..=MAX_ATTEMPTS {
			let person = self.repository.find_or_create(team_id, distinct_id).await?;
			match self.repository.update_properties(person.id, set).await {
				Err(IngestServerError::PersonNotFound(id)) => {
					warn!(attempt, person_id = %id, "person absorbed during profile update, retrying");
				}
				other => return other,
			}
		}

		Err(IngestServerError::ResolutionExhausted {
			team_id,
			attempts: MAX_ATTEMPTS,
		})
	}

	/// Creates a person for the sender unless one exists. Losing the creation
	/// race to another worker is fine.
	async fn ensure_person(&self, team_id: TeamId, distinct_id: &str) -> Result<()> {
		if self.repository.find(team_id, distinct_id).await?.is_some() {
			return Ok(());
		}

		let person = Person::new(team_id);
		match self
			.repository
			.create_with_identifiers(&person, &[distinct_id.to_string()])
			.await
		{
			Ok(()) | Err(IngestServerError::DuplicateIdentifier { .. }) => Ok(()),
			Err(e) => Err(e),
		}
	}
}

/// Whether `$elements` carries a chain worth storing. Empty lists and nulls
/// are left alone.
fn has_elements(raw: &serde_json::Value) -> bool {
	match raw {
		serde_json::Value::Null => false,
		serde_json::Value::Array(list) => !list.is_empty(),
		_ => true,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn has_elements_skips_empty() {
		assert!(!has_elements(&json!(null)));
		assert!(!has_elements(&json!([])));
		assert!(has_elements(&json!([{"tag_name": "a"}])));
		assert!(has_elements(&json!("garbage")));
	}
}
