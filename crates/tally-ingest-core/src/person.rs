// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Person types for identity resolution.
//!
//! A [`Person`] is the canonical record for one real-world user inside a team.
//! Client SDKs talk about users through distinct IDs; each distinct ID is bound
//! to exactly one person through a [`PersonDistinctId`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a team (tenant). Assigned by the outer platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamId(pub i64);

impl std::fmt::Display for TeamId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::str::FromStr for TeamId {
	type Err = std::num::ParseIntError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(s.parse()?))
	}
}

/// Unique identifier for a person.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersonId(pub Uuid);

impl PersonId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for PersonId {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Display for PersonId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::str::FromStr for PersonId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// Unique identifier for a distinct-id binding row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PersonDistinctIdId(pub Uuid);

impl PersonDistinctIdId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for PersonDistinctIdId {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Display for PersonDistinctIdId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// A person in a team.
///
/// `properties` is always a JSON object. Keys are last-write-wins when set
/// through [`set_properties`](Self::set_properties); merges use
/// [`absorb_properties`](Self::absorb_properties), where existing keys win.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
	pub id: PersonId,
	pub team_id: TeamId,
	pub properties: serde_json::Value,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Person {
	/// Creates a new person in the given team with empty properties.
	pub fn new(team_id: TeamId) -> Self {
		let now = Utc::now();
		Self {
			id: PersonId::new(),
			team_id,
			properties: serde_json::json!({}),
			created_at: now,
			updated_at: now,
		}
	}

	/// Sets the initial properties for this person (builder pattern).
	pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
		self.properties = properties;
		self
	}

	/// Merges properties into this person, overwriting existing keys.
	pub fn set_properties(&mut self, properties: serde_json::Value) {
		if let (serde_json::Value::Object(ref mut existing), serde_json::Value::Object(new)) =
			(&mut self.properties, properties)
		{
			for (key, value) in new {
				existing.insert(key, value);
			}
		}
		self.updated_at = Utc::now();
	}

	/// Copies in the properties of an absorbed person.
	///
	/// Keys this person already has are kept; the absorbed person's values only
	/// fill gaps.
	pub fn absorb_properties(&mut self, absorbed: &serde_json::Value) {
		if let (serde_json::Value::Object(ref mut existing), serde_json::Value::Object(other)) =
			(&mut self.properties, absorbed)
		{
			for (key, value) in other {
				existing.entry(key.clone()).or_insert_with(|| value.clone());
			}
		}
		self.updated_at = Utc::now();
	}
}

/// Binding of one distinct ID to one person, unique per team.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonDistinctId {
	pub id: PersonDistinctIdId,
	pub team_id: TeamId,
	pub person_id: PersonId,
	pub distinct_id: String,
	pub created_at: DateTime<Utc>,
}

impl PersonDistinctId {
	pub fn new(team_id: TeamId, person_id: PersonId, distinct_id: String) -> Self {
		Self {
			id: PersonDistinctIdId::new(),
			team_id,
			person_id,
			distinct_id,
			created_at: Utc::now(),
		}
	}
}

/// A person bundled with the distinct IDs bound to it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersonWithDistinctIds {
	pub person: Person,
	pub distinct_ids: Vec<String>,
}

impl PersonWithDistinctIds {
	pub fn new(person: Person, distinct_ids: Vec<String>) -> Self {
		Self {
			person,
			distinct_ids,
		}
	}

	pub fn owns(&self, distinct_id: &str) -> bool {
		self.distinct_ids.iter().any(|d| d == distinct_id)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn person_id_roundtrip() {
		let id = PersonId::new();
		let parsed: PersonId = id.to_string().parse().unwrap();
		assert_eq!(id, parsed);
	}

	#[test]
	fn team_id_parses_integers() {
		assert_eq!("42".parse::<TeamId>().unwrap(), TeamId(42));
		assert!("forty-two".parse::<TeamId>().is_err());
	}

	#[test]
	fn person_new_has_empty_properties() {
		let person = Person::new(TeamId(1));
		assert_eq!(person.properties, serde_json::json!({}));
		assert_eq!(person.team_id, TeamId(1));
	}

	#[test]
	fn set_properties_overwrites_existing_keys() {
		let mut person =
			Person::new(TeamId(1)).with_properties(serde_json::json!({"plan": "free", "name": "Ann"}));
		person.set_properties(serde_json::json!({"plan": "pro"}));
		assert_eq!(person.properties["plan"], "pro");
		assert_eq!(person.properties["name"], "Ann");
	}

	#[test]
	fn absorb_properties_keeps_existing_keys() {
		let mut survivor =
			Person::new(TeamId(1)).with_properties(serde_json::json!({"plan": "free", "name": "Ann"}));
		survivor.absorb_properties(&serde_json::json!({"plan": "pro", "email": "ann@example.com"}));
		assert_eq!(survivor.properties["plan"], "free");
		assert_eq!(survivor.properties["name"], "Ann");
		assert_eq!(survivor.properties["email"], "ann@example.com");
	}

	#[test]
	fn person_with_distinct_ids_owns() {
		let person = Person::new(TeamId(1));
		let bundle = PersonWithDistinctIds::new(person, vec!["a".to_string(), "b".to_string()]);
		assert!(bundle.owns("a"));
		assert!(!bundle.owns("c"));
	}

	proptest! {
		#[test]
		fn absorb_never_loses_survivor_keys(
			key in "[a-z]{1,10}",
			mine in "[a-z]{1,10}",
			theirs in "[a-z]{1,10}",
		) {
			let mut survivor = Person::new(TeamId(7))
				.with_properties(serde_json::json!({ key.clone(): mine.clone() }));
			survivor.absorb_properties(&serde_json::json!({ key.clone(): theirs }));
			prop_assert_eq!(&survivor.properties[&key], &serde_json::json!(mine));
		}
	}
}
