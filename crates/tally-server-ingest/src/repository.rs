// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Database repositories for ingestion.
//!
//! This module provides the storage traits the ingestion services are written
//! against and their SQLite implementation:
//! - [`PersonDirectory`]: persons and their distinct-ID bindings
//! - [`ElementChainStore`]: content-addressed element chains
//! - [`EventStore`]: captured events
//! - [`TeamRegistry`]: per-team event name and property key registry
//!
//! Every multi-row mutation runs in one transaction whose first statement is a
//! write, so SQLite hands out the write lock before anything is read and the
//! pool's busy timeout makes competing writers queue instead of failing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::instrument;

use tally_ingest_core::{
	Element, ElementGroup, ElementGroupId, ElementId, Event, EventId, MergeReason, Person,
	PersonDistinctIdId, PersonId, PersonMerge, Team, TeamId,
};

use crate::error::{IngestServerError, Result};

/// Result of absorbing one person into another.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
	/// The survivor as stored after the merge.
	pub survivor: Person,
	/// The audit record written alongside the merge.
	pub merge: PersonMerge,
	/// Number of distinct IDs repointed from the absorbed person.
	pub identifiers_transferred: u64,
}

/// Maps `(team, distinct_id)` to a canonical person.
#[async_trait]
pub trait PersonDirectory: Send + Sync {
	/// Returns the person the distinct ID is bound to, if any.
	async fn find(&self, team_id: TeamId, distinct_id: &str) -> Result<Option<Person>>;

	async fn get_person(&self, id: PersonId) -> Result<Option<Person>>;

	async fn list_distinct_ids(&self, person_id: PersonId) -> Result<Vec<String>>;

	/// Atomically stores the person and binds every given distinct ID to it.
	///
	/// Fails with `DuplicateIdentifier` and stores nothing if any ID is
	/// already bound.
	async fn create_with_identifiers(&self, person: &Person, distinct_ids: &[String]) -> Result<()>;

	/// Binds one more distinct ID to an existing person.
	///
	/// `DuplicateIdentifier` if the ID is already bound; `PersonNotFound` if
	/// the person no longer exists.
	async fn attach_identifier(&self, person: &Person, distinct_id: &str) -> Result<()>;

	/// Absorbs one person into another in a single transaction.
	///
	/// The survivor keeps its property values and gains the absorbed person's
	/// keys it lacks, every binding is repointed, the absorbed person is
	/// deleted and a merge record is written. Returns `None` when both IDs are
	/// the same person.
	async fn merge_into(
		&self,
		survivor_id: PersonId,
		absorbed_id: PersonId,
		reason: MergeReason,
	) -> Result<Option<MergeOutcome>>;

	/// Sets properties on a person; the given values overwrite existing keys.
	async fn update_properties(
		&self,
		person_id: PersonId,
		properties: &serde_json::Map<String, serde_json::Value>,
	) -> Result<Person>;

	async fn list_merges_for_person(&self, person_id: PersonId) -> Result<Vec<PersonMerge>>;

	/// Returns the person bound to the distinct ID, creating one if needed.
	///
	/// Losing a creation race to another writer is resolved by re-reading.
	async fn find_or_create(&self, team_id: TeamId, distinct_id: &str) -> Result<Person> {
		if let Some(person) = self.find(team_id, distinct_id).await? {
			return Ok(person);
		}

		let person = Person::new(team_id);
		match self
			.create_with_identifiers(&person, &[distinct_id.to_string()])
			.await
		{
			Ok(()) => Ok(person),
			Err(IngestServerError::DuplicateIdentifier { .. }) => self
				.find(team_id, distinct_id)
				.await?
				.ok_or_else(|| {
					IngestServerError::StoreConsistencyViolation(format!(
						"distinct id {distinct_id} reported as bound in team {team_id} but not found"
					))
				}),
			Err(e) => Err(e),
		}
	}
}

/// Stores each distinct element chain once per team.
#[async_trait]
pub trait ElementChainStore: Send + Sync {
	/// Returns the stored group for this chain, storing it first if new.
	///
	/// The first writer of a given hash wins; later writers get its group.
	async fn get_or_create(&self, team_id: TeamId, elements: &[Element]) -> Result<ElementGroup>;

	async fn find_by_hash(&self, team_id: TeamId, hash: &str) -> Result<Option<ElementGroup>>;

	/// Elements of a group, in chain order.
	async fn list_elements(&self, group_id: ElementGroupId) -> Result<Vec<Element>>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
	async fn insert_event(&self, event: &Event) -> Result<()>;
	async fn get_event(&self, id: EventId) -> Result<Option<Event>>;
	/// Most recent events first.
	async fn list_events(&self, team_id: TeamId, limit: u32) -> Result<Vec<Event>>;
	async fn count_events(&self, team_id: TeamId) -> Result<u64>;
}

/// Append-only registry of event names and property keys per team.
#[async_trait]
pub trait TeamRegistry: Send + Sync {
	/// Records the event name and property keys, creating the team on first
	/// sight. Returns whether anything new was stored.
	async fn register(&self, team_id: TeamId, event: &str, property_keys: &[String]) -> Result<bool>;

	async fn get_team(&self, team_id: TeamId) -> Result<Option<Team>>;
}

/// SQLite implementation of every ingestion store.
#[derive(Clone)]
pub struct SqliteIngestRepository {
	pool: SqlitePool,
}

impl SqliteIngestRepository {
	/// Creates a new repository using the given SQLite connection pool.
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	/// Looks up the chain another writer stored first. It must exist.
	async fn existing_chain(&self, team_id: TeamId, hash: &str) -> Result<ElementGroup> {
		self.find_by_hash(team_id, hash).await?.ok_or_else(|| {
			IngestServerError::StoreConsistencyViolation(format!(
				"element chain {hash} conflicted in team {team_id} but cannot be found"
			))
		})
	}

	#[instrument(skip(self, group, elements), fields(team_id = %group.team_id, hash = %group.hash))]
	async fn insert_chain(&self, group: &ElementGroup, elements: &[Element]) -> Result<()> {
		let mut tx = self.pool.begin().await?;

		let inserted = sqlx::query(
			r#"
			INSERT INTO element_groups (id, team_id, hash, created_at)
			VALUES (?, ?, ?, ?)
			"#,
		)
		.bind(group.id.0.to_string())
		.bind(group.team_id.0)
		.bind(&group.hash)
		.bind(group.created_at.to_rfc3339())
		.execute(&mut *tx)
		.await;

		if let Err(e) = inserted {
			if is_unique_violation(&e) {
				return Err(IngestServerError::DuplicateChainHash {
					team_id: group.team_id,
					hash: group.hash.clone(),
				});
			}
			return Err(e.into());
		}

		for element in elements {
			let attr_class = element
				.attr_class
				.as_ref()
				.map(serde_json::to_string)
				.transpose()?;
			let attributes = serde_json::to_string(&element.attributes)?;

			sqlx::query(
				r#"
				INSERT INTO elements (id, group_id, text, tag_name, href, attr_class, attr_id, nth_child, nth_of_type, attributes, position)
				VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
				"#,
			)
			.bind(ElementId::new().0.to_string())
			.bind(group.id.0.to_string())
			.bind(&element.text)
			.bind(&element.tag_name)
			.bind(&element.href)
			.bind(attr_class)
			.bind(&element.attr_id)
			.bind(element.nth_child)
			.bind(element.nth_of_type)
			.bind(attributes)
			.bind(element.order)
			.execute(&mut *tx)
			.await?;
		}

		tx.commit().await?;
		Ok(())
	}
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
	matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

const PERSON_COLUMNS: &str = "p.id, p.team_id, p.properties, p.created_at, p.updated_at";

#[async_trait]
impl PersonDirectory for SqliteIngestRepository {
	#[instrument(skip(self), fields(team_id = %team_id, distinct_id = %distinct_id))]
	async fn find(&self, team_id: TeamId, distinct_id: &str) -> Result<Option<Person>> {
		let row = sqlx::query_as::<_, PersonRow>(&format!(
			r#"
			SELECT {PERSON_COLUMNS}
			FROM person_distinct_ids d
			JOIN persons p ON p.id = d.person_id
			WHERE d.team_id = ? AND d.distinct_id = ?
			"#
		))
		.bind(team_id.0)
		.bind(distinct_id)
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[instrument(skip(self), fields(person_id = %id))]
	async fn get_person(&self, id: PersonId) -> Result<Option<Person>> {
		let row = sqlx::query_as::<_, PersonRow>(&format!(
			"SELECT {PERSON_COLUMNS} FROM persons p WHERE p.id = ?"
		))
		.bind(id.0.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[instrument(skip(self), fields(person_id = %person_id))]
	async fn list_distinct_ids(&self, person_id: PersonId) -> Result<Vec<String>> {
		let rows: Vec<(String,)> = sqlx::query_as(
			r#"
			SELECT distinct_id FROM person_distinct_ids
			WHERE person_id = ?
			ORDER BY created_at, distinct_id
			"#,
		)
		.bind(person_id.0.to_string())
		.fetch_all(&self.pool)
		.await?;

		Ok(rows.into_iter().map(|(d,)| d).collect())
	}

	#[instrument(skip(self, person, distinct_ids), fields(person_id = %person.id, team_id = %person.team_id, count = distinct_ids.len()))]
	async fn create_with_identifiers(&self, person: &Person, distinct_ids: &[String]) -> Result<()> {
		let properties_json = serde_json::to_string(&person.properties)?;
		let mut tx = self.pool.begin().await?;

		sqlx::query(
			r#"
			INSERT INTO persons (id, team_id, properties, created_at, updated_at)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(person.id.0.to_string())
		.bind(person.team_id.0)
		.bind(properties_json)
		.bind(person.created_at.to_rfc3339())
		.bind(person.updated_at.to_rfc3339())
		.execute(&mut *tx)
		.await?;

		for distinct_id in distinct_ids {
			let inserted = sqlx::query(
				r#"
				INSERT INTO person_distinct_ids (id, team_id, person_id, distinct_id, created_at)
				VALUES (?, ?, ?, ?, ?)
				"#,
			)
			.bind(PersonDistinctIdId::new().0.to_string())
			.bind(person.team_id.0)
			.bind(person.id.0.to_string())
			.bind(distinct_id)
			.bind(person.created_at.to_rfc3339())
			.execute(&mut *tx)
			.await;

			match inserted {
				Ok(_) => {}
				Err(e) if is_unique_violation(&e) => {
					tx.rollback().await?;
					return Err(IngestServerError::DuplicateIdentifier {
						team_id: person.team_id,
						distinct_id: distinct_id.clone(),
					});
				}
				Err(e) => return Err(e.into()),
			}
		}

		tx.commit().await?;
		tracing::debug!("person created");
		Ok(())
	}

	#[instrument(skip(self, person), fields(person_id = %person.id, team_id = %person.team_id, distinct_id = %distinct_id))]
	async fn attach_identifier(&self, person: &Person, distinct_id: &str) -> Result<()> {
		let result = sqlx::query(
			r#"
			INSERT INTO person_distinct_ids (id, team_id, person_id, distinct_id, created_at)
			SELECT ?, ?, id, ?, ? FROM persons WHERE id = ?
			"#,
		)
		.bind(PersonDistinctIdId::new().0.to_string())
		.bind(person.team_id.0)
		.bind(distinct_id)
		.bind(Utc::now().to_rfc3339())
		.bind(person.id.0.to_string())
		.execute(&self.pool)
		.await;

		match result {
			Ok(done) if done.rows_affected() == 0 => Err(IngestServerError::PersonNotFound(person.id)),
			Ok(_) => Ok(()),
			Err(e) if is_unique_violation(&e) => Err(IngestServerError::DuplicateIdentifier {
				team_id: person.team_id,
				distinct_id: distinct_id.to_string(),
			}),
			Err(e) => Err(e.into()),
		}
	}

	#[instrument(skip(self, reason), fields(survivor_id = %survivor_id, absorbed_id = %absorbed_id, reason = reason.as_str()))]
	async fn merge_into(
		&self,
		survivor_id: PersonId,
		absorbed_id: PersonId,
		reason: MergeReason,
	) -> Result<Option<MergeOutcome>> {
		if survivor_id == absorbed_id {
			return Ok(None);
		}

		let now = Utc::now();
		let mut tx = self.pool.begin().await?;

		let touched = sqlx::query("UPDATE persons SET updated_at = ? WHERE id = ?")
			.bind(now.to_rfc3339())
			.bind(survivor_id.0.to_string())
			.execute(&mut *tx)
			.await?;
		if touched.rows_affected() == 0 {
			return Err(IngestServerError::PersonNotFound(survivor_id));
		}

		let select = format!("SELECT {PERSON_COLUMNS} FROM persons p WHERE p.id = ?");
		let mut survivor: Person = sqlx::query_as::<_, PersonRow>(&select)
			.bind(survivor_id.0.to_string())
			.fetch_one(&mut *tx)
			.await?
			.try_into()?;
		let absorbed: Person = sqlx::query_as::<_, PersonRow>(&select)
			.bind(absorbed_id.0.to_string())
			.fetch_optional(&mut *tx)
			.await?
			.ok_or(IngestServerError::PersonNotFound(absorbed_id))?
			.try_into()?;

		if survivor.team_id != absorbed.team_id {
			return Err(IngestServerError::Internal(format!(
				"refusing to merge person {absorbed_id} of team {} into team {}",
				absorbed.team_id, survivor.team_id
			)));
		}

		survivor.absorb_properties(&absorbed.properties);
		sqlx::query("UPDATE persons SET properties = ?, updated_at = ? WHERE id = ?")
			.bind(serde_json::to_string(&survivor.properties)?)
			.bind(survivor.updated_at.to_rfc3339())
			.bind(survivor_id.0.to_string())
			.execute(&mut *tx)
			.await?;

		let repointed = sqlx::query("UPDATE person_distinct_ids SET person_id = ? WHERE person_id = ?")
			.bind(survivor_id.0.to_string())
			.bind(absorbed_id.0.to_string())
			.execute(&mut *tx)
			.await?;

		sqlx::query("DELETE FROM persons WHERE id = ?")
			.bind(absorbed_id.0.to_string())
			.execute(&mut *tx)
			.await?;

		let merge = PersonMerge::new(survivor.team_id, survivor_id, absorbed_id, reason);
		sqlx::query(
			r#"
			INSERT INTO person_merges (id, team_id, survivor_id, absorbed_id, reason, merged_at)
			VALUES (?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(merge.id.0.to_string())
		.bind(merge.team_id.0)
		.bind(survivor_id.0.to_string())
		.bind(absorbed_id.0.to_string())
		.bind(serde_json::to_string(&merge.reason)?)
		.bind(merge.merged_at.to_rfc3339())
		.execute(&mut *tx)
		.await?;

		tx.commit().await?;

		let identifiers_transferred = repointed.rows_affected();
		tracing::info!(identifiers_transferred, "persons merged");

		Ok(Some(MergeOutcome {
			survivor,
			merge,
			identifiers_transferred,
		}))
	}

	#[instrument(skip(self, properties), fields(person_id = %person_id))]
	async fn update_properties(
		&self,
		person_id: PersonId,
		properties: &serde_json::Map<String, serde_json::Value>,
	) -> Result<Person> {
		let mut tx = self.pool.begin().await?;

		let touched = sqlx::query("UPDATE persons SET updated_at = ? WHERE id = ?")
			.bind(Utc::now().to_rfc3339())
			.bind(person_id.0.to_string())
			.execute(&mut *tx)
			.await?;
		if touched.rows_affected() == 0 {
			return Err(IngestServerError::PersonNotFound(person_id));
		}

		let mut person: Person = sqlx::query_as::<_, PersonRow>(&format!(
			"SELECT {PERSON_COLUMNS} FROM persons p WHERE p.id = ?"
		))
		.bind(person_id.0.to_string())
		.fetch_one(&mut *tx)
		.await?
		.try_into()?;

		person.set_properties(serde_json::Value::Object(properties.clone()));

		sqlx::query("UPDATE persons SET properties = ?, updated_at = ? WHERE id = ?")
			.bind(serde_json::to_string(&person.properties)?)
			.bind(person.updated_at.to_rfc3339())
			.bind(person_id.0.to_string())
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;
		Ok(person)
	}

	#[instrument(skip(self), fields(person_id = %person_id))]
	async fn list_merges_for_person(&self, person_id: PersonId) -> Result<Vec<PersonMerge>> {
		let rows = sqlx::query_as::<_, PersonMergeRow>(
			r#"
			SELECT id, team_id, survivor_id, absorbed_id, reason, merged_at
			FROM person_merges
			WHERE survivor_id = ? OR absorbed_id = ?
			ORDER BY merged_at
			"#,
		)
		.bind(person_id.0.to_string())
		.bind(person_id.0.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}
}

#[async_trait]
impl ElementChainStore for SqliteIngestRepository {
	#[instrument(skip(self, elements), fields(team_id = %team_id, elements = elements.len()))]
	async fn get_or_create(&self, team_id: TeamId, elements: &[Element]) -> Result<ElementGroup> {
		let group = ElementGroup::for_elements(team_id, elements);

		match self.insert_chain(&group, elements).await {
			Ok(()) => {
				tracing::debug!(hash = %group.hash, "element chain stored");
				Ok(group)
			}
			Err(IngestServerError::DuplicateChainHash { hash, .. }) => {
				tracing::debug!(hash = %hash, "element chain already stored");
				self.existing_chain(team_id, &hash).await
			}
			Err(e) => Err(e),
		}
	}

	#[instrument(skip(self), fields(team_id = %team_id, hash = %hash))]
	async fn find_by_hash(&self, team_id: TeamId, hash: &str) -> Result<Option<ElementGroup>> {
		let row = sqlx::query_as::<_, ElementGroupRow>(
			r#"
			SELECT id, team_id, hash, created_at
			FROM element_groups
			WHERE team_id = ? AND hash = ?
			"#,
		)
		.bind(team_id.0)
		.bind(hash)
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[instrument(skip(self), fields(group_id = %group_id))]
	async fn list_elements(&self, group_id: ElementGroupId) -> Result<Vec<Element>> {
		let rows = sqlx::query_as::<_, ElementRow>(
			r#"
			SELECT id, group_id, text, tag_name, href, attr_class, attr_id, nth_child, nth_of_type, attributes, position
			FROM elements
			WHERE group_id = ?
			ORDER BY position
			"#,
		)
		.bind(group_id.0.to_string())
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}
}

#[async_trait]
impl EventStore for SqliteIngestRepository {
	#[instrument(skip(self, event), fields(event_id = %event.id, team_id = %event.team_id, event_name = %event.event))]
	async fn insert_event(&self, event: &Event) -> Result<()> {
		let properties_json = serde_json::to_string(&event.properties)?;

		sqlx::query(
			r#"
			INSERT INTO events (id, team_id, event, distinct_id, properties, site_url, elements_hash, timestamp, created_at)
			VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(event.id.0.to_string())
		.bind(event.team_id.0)
		.bind(&event.event)
		.bind(&event.distinct_id)
		.bind(properties_json)
		.bind(&event.site_url)
		.bind(&event.elements_hash)
		.bind(event.timestamp.to_rfc3339())
		.bind(event.created_at.to_rfc3339())
		.execute(&self.pool)
		.await?;

		Ok(())
	}

	#[instrument(skip(self), fields(event_id = %id))]
	async fn get_event(&self, id: EventId) -> Result<Option<Event>> {
		let row = sqlx::query_as::<_, EventRow>(
			r#"
			SELECT id, team_id, event, distinct_id, properties, site_url, elements_hash, timestamp, created_at
			FROM events
			WHERE id = ?
			"#,
		)
		.bind(id.0.to_string())
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}

	#[instrument(skip(self), fields(team_id = %team_id))]
	async fn list_events(&self, team_id: TeamId, limit: u32) -> Result<Vec<Event>> {
		let rows = sqlx::query_as::<_, EventRow>(
			r#"
			SELECT id, team_id, event, distinct_id, properties, site_url, elements_hash, timestamp, created_at
			FROM events
			WHERE team_id = ?
			ORDER BY timestamp DESC
			LIMIT ?
			"#,
		)
		.bind(team_id.0)
		.bind(limit as i64)
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(TryInto::try_into).collect()
	}

	#[instrument(skip(self), fields(team_id = %team_id))]
	async fn count_events(&self, team_id: TeamId) -> Result<u64> {
		let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM events WHERE team_id = ?")
			.bind(team_id.0)
			.fetch_one(&self.pool)
			.await?;

		Ok(count as u64)
	}
}

#[async_trait]
impl TeamRegistry for SqliteIngestRepository {
	#[instrument(skip(self, property_keys), fields(team_id = %team_id, event = %event))]
	async fn register(&self, team_id: TeamId, event: &str, property_keys: &[String]) -> Result<bool> {
		let keys = || property_keys.iter().map(String::as_str);

		if let Some(mut known) = self.get_team(team_id).await? {
			if !known.register(event, keys()) {
				return Ok(false);
			}
		}

		let now = Utc::now().to_rfc3339();
		let mut tx = self.pool.begin().await?;

		sqlx::query(
			r#"
			INSERT INTO teams (id, event_names, event_properties, created_at, updated_at)
			VALUES (?, '[]', '[]', ?, ?)
			ON CONFLICT(id) DO NOTHING
			"#,
		)
		.bind(team_id.0)
		.bind(&now)
		.bind(&now)
		.execute(&mut *tx)
		.await?;

		let mut team: Team = sqlx::query_as::<_, TeamRow>(
			"SELECT id, event_names, event_properties, created_at, updated_at FROM teams WHERE id = ?",
		)
		.bind(team_id.0)
		.fetch_one(&mut *tx)
		.await?
		.try_into()?;

		let changed = team.register(event, keys());
		if changed {
			sqlx::query(
				"UPDATE teams SET event_names = ?, event_properties = ?, updated_at = ? WHERE id = ?",
			)
			.bind(serde_json::to_string(&team.event_names)?)
			.bind(serde_json::to_string(&team.event_properties)?)
			.bind(team.updated_at.to_rfc3339())
			.bind(team_id.0)
			.execute(&mut *tx)
			.await?;
		}

		tx.commit().await?;
		Ok(changed)
	}

	#[instrument(skip(self), fields(team_id = %team_id))]
	async fn get_team(&self, team_id: TeamId) -> Result<Option<Team>> {
		let row = sqlx::query_as::<_, TeamRow>(
			"SELECT id, event_names, event_properties, created_at, updated_at FROM teams WHERE id = ?",
		)
		.bind(team_id.0)
		.fetch_optional(&self.pool)
		.await?;

		row.map(TryInto::try_into).transpose()
	}
}

// Database row types

fn parse_timestamp(value: &str, field: &str) -> Result<DateTime<Utc>> {
	DateTime::parse_from_rfc3339(value)
		.map(|dt| dt.with_timezone(&Utc))
		.map_err(|_| IngestServerError::Internal(format!("Invalid {field}")))
}

fn parse_id<T: std::str::FromStr>(value: &str, field: &str) -> Result<T> {
	value
		.parse()
		.map_err(|_| IngestServerError::Internal(format!("Invalid {field}")))
}

#[derive(sqlx::FromRow)]
struct PersonRow {
	id: String,
	team_id: i64,
	properties: String,
	created_at: String,
	updated_at: String,
}

impl TryFrom<PersonRow> for Person {
	type Error = IngestServerError;

	fn try_from(row: PersonRow) -> Result<Self> {
		Ok(Person {
			id: parse_id(&row.id, "person ID")?,
			team_id: TeamId(row.team_id),
			properties: serde_json::from_str(&row.properties)?,
			created_at: parse_timestamp(&row.created_at, "created_at")?,
			updated_at: parse_timestamp(&row.updated_at, "updated_at")?,
		})
	}
}

#[derive(sqlx::FromRow)]
struct ElementGroupRow {
	id: String,
	team_id: i64,
	hash: String,
	created_at: String,
}

impl TryFrom<ElementGroupRow> for ElementGroup {
	type Error = IngestServerError;

	fn try_from(row: ElementGroupRow) -> Result<Self> {
		Ok(ElementGroup {
			id: parse_id(&row.id, "element group ID")?,
			team_id: TeamId(row.team_id),
			hash: row.hash,
			created_at: parse_timestamp(&row.created_at, "created_at")?,
		})
	}
}

#[derive(sqlx::FromRow)]
struct ElementRow {
	id: String,
	group_id: String,
	text: Option<String>,
	tag_name: String,
	href: Option<String>,
	attr_class: Option<String>,
	attr_id: Option<String>,
	nth_child: Option<i64>,
	nth_of_type: Option<i64>,
	attributes: String,
	position: i64,
}

impl TryFrom<ElementRow> for Element {
	type Error = IngestServerError;

	fn try_from(row: ElementRow) -> Result<Self> {
		Ok(Element {
			id: Some(parse_id(&row.id, "element ID")?),
			group_id: Some(parse_id(&row.group_id, "element group ID")?),
			text: row.text,
			tag_name: row.tag_name,
			href: row.href,
			attr_class: row
				.attr_class
				.map(|s| serde_json::from_str(&s))
				.transpose()?,
			attr_id: row.attr_id,
			nth_child: row.nth_child,
			nth_of_type: row.nth_of_type,
			attributes: serde_json::from_str(&row.attributes)?,
			order: row.position,
		})
	}
}

#[derive(sqlx::FromRow)]
struct EventRow {
	id: String,
	team_id: i64,
	event: String,
	distinct_id: String,
	properties: String,
	site_url: String,
	elements_hash: Option<String>,
	timestamp: String,
	created_at: String,
}

impl TryFrom<EventRow> for Event {
	type Error = IngestServerError;

	fn try_from(row: EventRow) -> Result<Self> {
		Ok(Event {
			id: parse_id(&row.id, "event ID")?,
			team_id: TeamId(row.team_id),
			event: row.event,
			distinct_id: row.distinct_id,
			properties: serde_json::from_str(&row.properties)?,
			site_url: row.site_url,
			elements_hash: row.elements_hash,
			timestamp: parse_timestamp(&row.timestamp, "timestamp")?,
			created_at: parse_timestamp(&row.created_at, "created_at")?,
		})
	}
}

#[derive(sqlx::FromRow)]
struct TeamRow {
	id: i64,
	event_names: String,
	event_properties: String,
	created_at: String,
	updated_at: String,
}

impl TryFrom<TeamRow> for Team {
	type Error = IngestServerError;

	fn try_from(row: TeamRow) -> Result<Self> {
		Ok(Team {
			id: TeamId(row.id),
			event_names: serde_json::from_str(&row.event_names)?,
			event_properties: serde_json::from_str(&row.event_properties)?,
			created_at: parse_timestamp(&row.created_at, "created_at")?,
			updated_at: parse_timestamp(&row.updated_at, "updated_at")?,
		})
	}
}

#[derive(sqlx::FromRow)]
struct PersonMergeRow {
	id: String,
	team_id: i64,
	survivor_id: String,
	absorbed_id: String,
	reason: String,
	merged_at: String,
}

impl TryFrom<PersonMergeRow> for PersonMerge {
	type Error = IngestServerError;

	fn try_from(row: PersonMergeRow) -> Result<Self> {
		Ok(PersonMerge {
			id: parse_id(&row.id, "merge ID")?,
			team_id: TeamId(row.team_id),
			survivor_id: parse_id(&row.survivor_id, "survivor ID")?,
			absorbed_id: parse_id(&row.absorbed_id, "absorbed ID")?,
			reason: serde_json::from_str(&row.reason)?,
			merged_at: parse_timestamp(&row.merged_at, "merged_at")?,
		})
	}
}
