// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Captured events and the ingestion task payload.
//!
//! An [`IngestTask`] is what the capture endpoint hands to the task runner for
//! every accepted event. The ingest pipeline turns it into exactly one stored
//! [`Event`].

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{IngestError, Result};
use crate::person::TeamId;

/// Unique identifier for an event.
///
/// Uses UUIDv7 by default for time-ordered IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub Uuid);

impl EventId {
	/// Creates a new event ID using UUIDv7 (time-ordered).
	pub fn new_v7() -> Self {
		let uuid7_val = uuid7::uuid7();
		Self(Uuid::from_bytes(*uuid7_val.as_bytes()))
	}
}

impl Default for EventId {
	fn default() -> Self {
		Self::new_v7()
	}
}

impl std::fmt::Display for EventId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::str::FromStr for EventId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// A stored analytics event. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
	pub id: EventId,
	pub team_id: TeamId,
	pub event: String,
	pub distinct_id: String,
	pub properties: serde_json::Value,
	pub site_url: String,
	/// Content hash of the element group this event's click path was stored as.
	pub elements_hash: Option<String>,
	pub timestamp: DateTime<Utc>,
	pub created_at: DateTime<Utc>,
}

impl Event {
	pub fn new(team_id: TeamId, distinct_id: String, event: String) -> Self {
		let now = Utc::now();
		Self {
			id: EventId::new_v7(),
			team_id,
			event,
			distinct_id,
			properties: serde_json::json!({}),
			site_url: String::new(),
			elements_hash: None,
			timestamp: now,
			created_at: now,
		}
	}

	pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
		self.properties = properties;
		self
	}

	pub fn with_site_url(mut self, site_url: String) -> Self {
		self.site_url = site_url;
		self
	}

	pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
		self.timestamp = timestamp;
		self
	}

	pub fn with_elements_hash(mut self, hash: Option<String>) -> Self {
		self.elements_hash = hash;
		self
	}
}

/// Well-known system event names and property keys.
pub mod special_events {
	/// Binds `properties.alias` to the event's distinct ID.
	pub const CREATE_ALIAS: &str = "$create_alias";
	/// Identifies a user; may carry `$anon_distinct_id` and a `$set` profile.
	pub const IDENTIFY: &str = "$identify";
	/// Property naming the prior identifier in a `$create_alias` event.
	pub const ALIAS_PROPERTY: &str = "alias";
	/// Property naming the anonymous identifier in an `$identify` event.
	pub const ANON_DISTINCT_ID_PROPERTY: &str = "$anon_distinct_id";
	/// Property the source IP is recorded under.
	pub const IP_PROPERTY: &str = "$ip";
}

/// The free-form event body sent by a client SDK.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPayload {
	pub event: String,
	#[serde(default)]
	pub properties: Option<serde_json::Map<String, serde_json::Value>>,
	#[serde(default, rename = "$set")]
	pub set: Option<serde_json::Map<String, serde_json::Value>>,
	/// Explicit RFC 3339 timestamp.
	#[serde(default)]
	pub timestamp: Option<String>,
	/// Milliseconds the event happened before `now`.
	#[serde(default)]
	pub offset: Option<i64>,
}

/// Which signal asked for two identifiers to be linked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasKind {
	Alias,
	Identify,
}

impl EventPayload {
	pub fn new(event: impl Into<String>) -> Self {
		Self {
			event: event.into(),
			..Default::default()
		}
	}

	pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
		if let serde_json::Value::Object(map) = properties {
			self.properties = Some(map);
		}
		self
	}

	pub fn with_set(mut self, set: serde_json::Value) -> Self {
		if let serde_json::Value::Object(map) = set {
			self.set = Some(map);
		}
		self
	}

	pub fn with_offset(mut self, offset_ms: i64) -> Self {
		self.offset = Some(offset_ms);
		self
	}

	pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
		self.timestamp = Some(timestamp.into());
		self
	}

	/// The prior identifier this event links to the current distinct ID, if any.
	///
	/// A `$create_alias` event must carry `properties.alias`; an `$identify`
	/// event links only when it carries a non-empty `$anon_distinct_id`.
	pub fn alias_request(&self) -> Result<Option<(String, AliasKind)>> {
		match self.event.as_str() {
			special_events::CREATE_ALIAS => {
				let alias = self
					.property(special_events::ALIAS_PROPERTY)
					.and_then(distinct_id_from_value)
					.ok_or_else(|| {
						IngestError::InvalidPayload(
							"$create_alias requires a properties.alias identifier".to_string(),
						)
					})?;
				Ok(Some((alias, AliasKind::Alias)))
			}
			special_events::IDENTIFY => Ok(self
				.property(special_events::ANON_DISTINCT_ID_PROPERTY)
				.and_then(distinct_id_from_value)
				.map(|anon| (anon, AliasKind::Identify))),
			_ => Ok(None),
		}
	}

	/// The `$set` profile carried by an `$identify` event, if non-empty.
	pub fn profile_update(&self) -> Option<&serde_json::Map<String, serde_json::Value>> {
		if self.event != special_events::IDENTIFY {
			return None;
		}
		self.set.as_ref().filter(|set| !set.is_empty())
	}

	/// Properties to store on the event; falls back to `$set` when absent.
	pub fn event_properties(&self) -> serde_json::Map<String, serde_json::Value> {
		self
			.properties
			.clone()
			.or_else(|| self.set.clone())
			.unwrap_or_default()
	}

	/// Resolves when the event happened.
	///
	/// An explicit timestamp wins; otherwise `now` minus `offset` milliseconds;
	/// otherwise `now`.
	pub fn resolve_timestamp(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
		if let Some(raw) = self.timestamp.as_deref().filter(|s| !s.is_empty()) {
			return parse_timestamp(raw);
		}
		match self.offset {
			Some(offset) if offset != 0 => Duration::try_milliseconds(offset)
				.and_then(|delta| now.checked_sub_signed(delta))
				.ok_or_else(|| IngestError::InvalidTimestamp {
					value: offset.to_string(),
					reason: "offset out of range".to_string(),
				}),
			_ => Ok(now),
		}
	}

	fn property(&self, key: &str) -> Option<&serde_json::Value> {
		self.properties.as_ref().and_then(|p| p.get(key))
	}
}

fn distinct_id_from_value(value: &serde_json::Value) -> Option<String> {
	match value {
		serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
		serde_json::Value::Number(n) => Some(n.to_string()),
		_ => None,
	}
}

/// Parses an ISO 8601 timestamp into UTC.
///
/// RFC 3339 with an offset is preferred. A date-time or a bare date without
/// an offset is taken to be UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
	let rfc3339_err = match DateTime::parse_from_rfc3339(raw) {
		Ok(dt) => return Ok(dt.with_timezone(&Utc)),
		Err(e) => e,
	};

	const NAIVE_FORMATS: [&str; 4] = [
		"%Y-%m-%dT%H:%M:%S%.f",
		"%Y-%m-%d %H:%M:%S%.f",
		"%Y-%m-%dT%H:%M",
		"%Y-%m-%d %H:%M",
	];
	for format in NAIVE_FORMATS {
		if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
			return Ok(naive.and_utc());
		}
	}

	NaiveDate::parse_from_str(raw, "%Y-%m-%d")
		.ok()
		.and_then(|date| date.and_hms_opt(0, 0, 0))
		.map(|naive| naive.and_utc())
		.ok_or_else(|| IngestError::InvalidTimestamp {
			value: raw.to_string(),
			reason: rfc3339_err.to_string(),
		})
}

/// One unit of ingestion work, as queued by the capture endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestTask {
	pub distinct_id: String,
	pub ip: String,
	pub site_url: String,
	pub data: EventPayload,
	pub team_id: TeamId,
	/// Capture time reference, ISO 8601.
	pub now: String,
}

impl IngestTask {
	pub fn now(&self) -> Result<DateTime<Utc>> {
		parse_timestamp(&self.now)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn at(raw: &str) -> DateTime<Utc> {
		parse_timestamp(raw).unwrap()
	}

	#[test]
	fn event_id_default_is_unique() {
		assert_ne!(EventId::default(), EventId::default());
	}

	#[test]
	fn event_builder() {
		let event = Event::new(TeamId(1), "user1".to_string(), "$pageview".to_string())
			.with_site_url("https://example.com".to_string())
			.with_elements_hash(Some("abc".to_string()));
		assert_eq!(event.event, "$pageview");
		assert_eq!(event.site_url, "https://example.com");
		assert_eq!(event.elements_hash.as_deref(), Some("abc"));
	}

	#[test]
	fn timestamp_explicit_wins() {
		let payload = EventPayload::new("click")
			.with_timestamp("2024-01-01T00:00:00Z")
			.with_offset(5000);
		let ts = payload.resolve_timestamp(at("2024-06-01T00:00:00Z")).unwrap();
		assert_eq!(ts, at("2024-01-01T00:00:00Z"));
	}

	#[test]
	fn timestamp_offset_subtracts_milliseconds() {
		let payload = EventPayload::new("click").with_offset(5000);
		let ts = payload.resolve_timestamp(at("2024-01-01T00:00:10Z")).unwrap();
		assert_eq!(ts, at("2024-01-01T00:00:05Z"));
	}

	#[test]
	fn timestamp_defaults_to_now() {
		let now = at("2024-01-01T00:00:10Z");
		assert_eq!(EventPayload::new("click").resolve_timestamp(now).unwrap(), now);
	}

	#[test]
	fn timestamp_offset_out_of_range_is_rejected() {
		let now = at("2024-01-01T00:00:10Z");
		let huge: EventPayload =
			serde_json::from_str(r#"{"event":"$pageview","offset":9000000000000000000}"#).unwrap();
		assert!(matches!(
			huge.resolve_timestamp(now).unwrap_err(),
			IngestError::InvalidTimestamp { .. }
		));

		let min = EventPayload::new("$pageview").with_offset(i64::MIN);
		assert!(matches!(
			min.resolve_timestamp(now).unwrap_err(),
			IngestError::InvalidTimestamp { .. }
		));
	}

	#[test]
	fn parse_timestamp_without_offset_is_utc() {
		assert_eq!(
			parse_timestamp("2024-01-01T00:00:10").unwrap(),
			at("2024-01-01T00:00:10Z")
		);
		assert_eq!(
			parse_timestamp("2024-01-01T00:00:10.250").unwrap(),
			at("2024-01-01T00:00:10.250Z")
		);
		assert_eq!(parse_timestamp("2024-01-01").unwrap(), at("2024-01-01T00:00:00Z"));
	}

	#[test]
	fn ingest_task_accepts_naive_now() {
		let task: IngestTask = serde_json::from_str(
			r#"{"distinct_id":"u1","ip":"1.2.3.4","site_url":"https://a.test","data":{"event":"$pageview"},"team_id":1,"now":"2024-01-01T00:00:10"}"#,
		)
		.unwrap();
		assert_eq!(task.now().unwrap(), at("2024-01-01T00:00:10Z"));
	}

	#[test]
	fn timestamp_rejects_garbage() {
		let payload = EventPayload::new("click").with_timestamp("yesterday");
		let err = payload.resolve_timestamp(Utc::now()).unwrap_err();
		assert!(matches!(err, IngestError::InvalidTimestamp { .. }));
	}

	#[test]
	fn create_alias_requires_alias_property() {
		let missing = EventPayload::new("$create_alias");
		assert!(missing.alias_request().is_err());

		let payload =
			EventPayload::new("$create_alias").with_properties(serde_json::json!({"alias": "old"}));
		assert_eq!(
			payload.alias_request().unwrap(),
			Some(("old".to_string(), AliasKind::Alias))
		);
	}

	#[test]
	fn identify_links_only_with_anon_id() {
		let plain = EventPayload::new("$identify");
		assert_eq!(plain.alias_request().unwrap(), None);

		let linked = EventPayload::new("$identify")
			.with_properties(serde_json::json!({"$anon_distinct_id": "anon1"}));
		assert_eq!(
			linked.alias_request().unwrap(),
			Some(("anon1".to_string(), AliasKind::Identify))
		);
	}

	#[test]
	fn other_events_never_alias() {
		let payload =
			EventPayload::new("$pageview").with_properties(serde_json::json!({"alias": "ignored"}));
		assert_eq!(payload.alias_request().unwrap(), None);
	}

	#[test]
	fn profile_update_only_for_identify() {
		let identify = EventPayload::new("$identify").with_set(serde_json::json!({"plan": "pro"}));
		assert_eq!(identify.profile_update().unwrap()["plan"], "pro");

		let empty = EventPayload::new("$identify").with_set(serde_json::json!({}));
		assert!(empty.profile_update().is_none());

		let other = EventPayload::new("$pageview").with_set(serde_json::json!({"plan": "pro"}));
		assert!(other.profile_update().is_none());
	}

	#[test]
	fn event_properties_fall_back_to_set() {
		let payload = EventPayload::new("$identify").with_set(serde_json::json!({"plan": "pro"}));
		assert_eq!(payload.event_properties()["plan"], "pro");

		let both = EventPayload::new("$identify")
			.with_properties(serde_json::json!({"a": 1}))
			.with_set(serde_json::json!({"plan": "pro"}));
		assert!(!both.event_properties().contains_key("plan"));
	}

	#[test]
	fn payload_deserializes_sdk_shape() {
		let json = r#"{
			"event": "$identify",
			"properties": {"$anon_distinct_id": "anon1"},
			"$set": {"email": "a@example.com"},
			"offset": 250
		}"#;
		let payload: EventPayload = serde_json::from_str(json).unwrap();
		assert_eq!(payload.event, "$identify");
		assert_eq!(payload.offset, Some(250));
		assert_eq!(payload.set.unwrap()["email"], "a@example.com");
	}

	#[test]
	fn ingest_task_deserializes() {
		let json = r#"{
			"distinct_id": "user1",
			"ip": "10.0.0.1",
			"site_url": "https://app.example.com",
			"data": {"event": "$pageview"},
			"team_id": 7,
			"now": "2024-01-01T00:00:10Z"
		}"#;
		let task: IngestTask = serde_json::from_str(json).unwrap();
		assert_eq!(task.team_id, TeamId(7));
		assert_eq!(task.now().unwrap(), at("2024-01-01T00:00:10Z"));
	}
}
