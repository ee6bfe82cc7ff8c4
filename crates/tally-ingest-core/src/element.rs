// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! DOM element chains captured with UI interaction events.
//!
//! Autocapture SDKs send the click path of an interaction as an ordered list of
//! element descriptors under the `$elements` event property. The same click
//! path recurs across many events, so chains are stored once per team as an
//! [`ElementGroup`] keyed by a content hash (see [`hash_elements`]).
//!
//! The hash covers only the semantic fields of each element. Storage
//! bookkeeping (`id`, `group_id`) is excluded, and every JSON object is
//! serialized with its keys sorted, so the digest is stable across processes,
//! platforms and attribute insertion order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{IngestError, Result};
use crate::person::TeamId;

/// Event property holding the captured element list.
pub const ELEMENTS_PROPERTY: &str = "$elements";

/// Keys with this prefix are raw DOM attributes.
pub const ATTRIBUTE_PREFIX: &str = "attr__";

/// Unique identifier for a stored element row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(pub Uuid);

impl ElementId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for ElementId {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Display for ElementId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::str::FromStr for ElementId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// Unique identifier for an element group (a deduplicated chain).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementGroupId(pub Uuid);

impl ElementGroupId {
	pub fn new() -> Self {
		Self(Uuid::new_v4())
	}
}

impl Default for ElementGroupId {
	fn default() -> Self {
		Self::new()
	}
}

impl std::fmt::Display for ElementGroupId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl std::str::FromStr for ElementGroupId {
	type Err = uuid::Error;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		Ok(Self(Uuid::parse_str(s)?))
	}
}

/// One node of a click path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
	/// Storage-assigned row ID. Not part of the content hash.
	pub id: Option<ElementId>,
	/// Owning group, set once stored. Not part of the content hash.
	pub group_id: Option<ElementGroupId>,
	pub text: Option<String>,
	pub tag_name: String,
	pub href: Option<String>,
	pub attr_class: Option<Vec<String>>,
	pub attr_id: Option<String>,
	pub nth_child: Option<i64>,
	pub nth_of_type: Option<i64>,
	pub attributes: serde_json::Map<String, serde_json::Value>,
	/// Position within the chain, 0 being the clicked element.
	pub order: i64,
}

impl Element {
	/// Creates a bare element with the given tag at the given chain position.
	pub fn new(tag_name: impl Into<String>, order: i64) -> Self {
		Self {
			id: None,
			group_id: None,
			text: None,
			tag_name: tag_name.into(),
			href: None,
			attr_class: None,
			attr_id: None,
			nth_child: None,
			nth_of_type: None,
			attributes: serde_json::Map::new(),
			order,
		}
	}

	pub fn with_text(mut self, text: impl Into<String>) -> Self {
		self.text = Some(text.into());
		self
	}

	pub fn with_href(mut self, href: impl Into<String>) -> Self {
		self.href = Some(href.into());
		self
	}

	pub fn with_classes(mut self, classes: Vec<String>) -> Self {
		self.attr_class = Some(classes);
		self
	}

	pub fn with_attribute(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
		self.attributes.insert(key.into(), value);
		self
	}

	/// Parses one entry of the `$elements` list captured by the SDK.
	///
	/// `tag_name` is required. `attr__class` is split on single spaces, and
	/// every `attr__*` key is also kept verbatim in `attributes`.
	pub fn from_capture(index: usize, raw: &serde_json::Value) -> Result<Self> {
		let obj = raw.as_object().ok_or_else(|| IngestError::InvalidElement {
			index,
			reason: "element is not an object".to_string(),
		})?;

		let tag_name = obj
			.get("tag_name")
			.and_then(|v| v.as_str())
			.ok_or_else(|| IngestError::InvalidElement {
				index,
				reason: "missing tag_name".to_string(),
			})?;

		let string_field = |key: &str| obj.get(key).and_then(|v| v.as_str()).map(str::to_string);

		let attr_class = obj
			.get("attr__class")
			.and_then(|v| v.as_str())
			.filter(|s| !s.is_empty())
			.map(|s| s.split(' ').map(str::to_string).collect());

		let attributes = obj
			.iter()
			.filter(|(key, _)| key.starts_with(ATTRIBUTE_PREFIX))
			.map(|(key, value)| (key.clone(), value.clone()))
			.collect();

		Ok(Self {
			id: None,
			group_id: None,
			text: string_field("$el_text"),
			tag_name: tag_name.to_string(),
			href: string_field("attr__href"),
			attr_class,
			attr_id: string_field("attr__id"),
			nth_child: obj.get("nth_child").and_then(|v| v.as_i64()),
			nth_of_type: obj.get("nth_of_type").and_then(|v| v.as_i64()),
			attributes,
			order: index as i64,
		})
	}

	/// The semantic fields of this element, as hashed.
	pub fn canonical_value(&self) -> serde_json::Value {
		serde_json::json!({
			"text": self.text,
			"tag_name": self.tag_name,
			"href": self.href,
			"attr_class": self.attr_class,
			"attr_id": self.attr_id,
			"nth_child": self.nth_child,
			"nth_of_type": self.nth_of_type,
			"attributes": self.attributes,
			"order": self.order,
		})
	}
}

/// Parses the `$elements` property value into an ordered chain.
pub fn parse_elements(raw: &serde_json::Value) -> Result<Vec<Element>> {
	let list = raw
		.as_array()
		.ok_or_else(|| IngestError::InvalidPayload(format!("{ELEMENTS_PROPERTY} must be a list")))?;

	list
		.iter()
		.enumerate()
		.map(|(index, el)| Element::from_capture(index, el))
		.collect()
}

/// Computes the content hash of an element chain.
///
/// SHA-256 over the canonical JSON of the chain, as lowercase hex.
pub fn hash_elements(elements: &[Element]) -> String {
	let chain = serde_json::Value::Array(elements.iter().map(Element::canonical_value).collect());

	let mut canonical = String::new();
	write_canonical(&chain, &mut canonical);

	hex::encode(Sha256::digest(canonical.as_bytes()))
}

/// Writes compact JSON with object keys sorted at every depth.
fn write_canonical(value: &serde_json::Value, out: &mut String) {
	match value {
		serde_json::Value::Array(items) => {
			out.push('[');
			for (i, item) in items.iter().enumerate() {
				if i > 0 {
					out.push(',');
				}
				write_canonical(item, out);
			}
			out.push(']');
		}
		serde_json::Value::Object(map) => {
			let mut keys: Vec<&String> = map.keys().collect();
			keys.sort();
			out.push('{');
			for (i, key) in keys.into_iter().enumerate() {
				if i > 0 {
					out.push(',');
				}
				out.push_str(&serde_json::Value::from(key.as_str()).to_string());
				out.push(':');
				write_canonical(&map[key], out);
			}
			out.push('}');
		}
		scalar => out.push_str(&scalar.to_string()),
	}
}

/// A deduplicated element chain, unique per `(team_id, hash)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementGroup {
	pub id: ElementGroupId,
	pub team_id: TeamId,
	pub hash: String,
	pub created_at: DateTime<Utc>,
}

impl ElementGroup {
	/// Creates a group for the given chain, computing its hash.
	pub fn for_elements(team_id: TeamId, elements: &[Element]) -> Self {
		Self {
			id: ElementGroupId::new(),
			team_id,
			hash: hash_elements(elements),
			created_at: Utc::now(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn button() -> serde_json::Value {
		serde_json::json!({
			"tag_name": "button",
			"$el_text": "Sign up",
			"attr__class": "btn btn-primary",
			"attr__id": "signup",
			"attr__href": "/signup",
			"attr__data-track": "cta",
			"nth_child": 2,
			"nth_of_type": 1
		})
	}

	#[test]
	fn from_capture_maps_sdk_fields() {
		let el = Element::from_capture(0, &button()).unwrap();
		assert_eq!(el.tag_name, "button");
		assert_eq!(el.text.as_deref(), Some("Sign up"));
		assert_eq!(el.href.as_deref(), Some("/signup"));
		assert_eq!(el.attr_id.as_deref(), Some("signup"));
		assert_eq!(
			el.attr_class,
			Some(vec!["btn".to_string(), "btn-primary".to_string()])
		);
		assert_eq!(el.nth_child, Some(2));
		assert_eq!(el.nth_of_type, Some(1));
		assert_eq!(el.order, 0);
		assert_eq!(el.attributes.len(), 4);
		assert_eq!(el.attributes["attr__data-track"], "cta");
		assert!(!el.attributes.contains_key("$el_text"));
	}

	#[test]
	fn from_capture_requires_tag_name() {
		let err = Element::from_capture(3, &serde_json::json!({"$el_text": "x"})).unwrap_err();
		assert!(matches!(err, IngestError::InvalidElement { index: 3, .. }));
	}

	#[test]
	fn empty_class_string_is_absent() {
		let el =
			Element::from_capture(0, &serde_json::json!({"tag_name": "a", "attr__class": ""})).unwrap();
		assert!(el.attr_class.is_none());
	}

	#[test]
	fn parse_elements_assigns_order() {
		let raw = serde_json::json!([{"tag_name": "span"}, {"tag_name": "div"}, {"tag_name": "body"}]);
		let chain = parse_elements(&raw).unwrap();
		let orders: Vec<i64> = chain.iter().map(|e| e.order).collect();
		assert_eq!(orders, vec![0, 1, 2]);
		assert_eq!(chain[2].tag_name, "body");
	}

	#[test]
	fn parse_elements_rejects_non_list() {
		assert!(parse_elements(&serde_json::json!({"tag_name": "a"})).is_err());
	}

	#[test]
	fn hash_is_hex_sha256() {
		let hash = hash_elements(&[Element::new("button", 0)]);
		assert_eq!(hash.len(), 64);
		assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
	}

	#[test]
	fn hash_ignores_storage_ids() {
		let plain = Element::from_capture(0, &button()).unwrap();
		let mut stored = plain.clone();
		stored.id = Some(ElementId::new());
		stored.group_id = Some(ElementGroupId::new());
		assert_eq!(hash_elements(&[plain]), hash_elements(&[stored]));
	}

	#[test]
	fn hash_ignores_attribute_insertion_order() {
		let a = Element::new("a", 0)
			.with_attribute("attr__href", serde_json::json!("/x"))
			.with_attribute("attr__title", serde_json::json!("X"));
		let b = Element::new("a", 0)
			.with_attribute("attr__title", serde_json::json!("X"))
			.with_attribute("attr__href", serde_json::json!("/x"));
		assert_eq!(hash_elements(&[a]), hash_elements(&[b]));
	}

	#[test]
	fn hash_depends_on_chain_order() {
		let first = vec![Element::new("span", 0), Element::new("div", 1)];
		let swapped = vec![Element::new("div", 0), Element::new("span", 1)];
		assert_ne!(hash_elements(&first), hash_elements(&swapped));
	}

	#[test]
	fn hash_is_stable_for_known_chain() {
		let chain = vec![Element::new("button", 0).with_classes(vec!["a".to_string(), "b".to_string()])];
		let first = hash_elements(&chain);
		let second = hash_elements(&chain.clone());
		assert_eq!(first, second);
	}

	#[test]
	fn canonical_json_sorts_nested_keys() {
		let mut out = String::new();
		write_canonical(
			&serde_json::json!({"b": 1, "a": {"d": null, "c": [true, "x"]}}),
			&mut out,
		);
		assert_eq!(out, r#"{"a":{"c":[true,"x"],"d":null},"b":1}"#);
	}

	#[test]
	fn group_for_elements_carries_hash() {
		let chain = vec![Element::new("button", 0)];
		let group = ElementGroup::for_elements(TeamId(9), &chain);
		assert_eq!(group.hash, hash_elements(&chain));
		assert_eq!(group.team_id, TeamId(9));
	}

	proptest! {
		#[test]
		fn hash_changes_with_text(a in "[a-z]{1,12}", b in "[a-z]{1,12}") {
			let left = hash_elements(&[Element::new("a", 0).with_text(a.clone())]);
			let right = hash_elements(&[Element::new("a", 0).with_text(b.clone())]);
			prop_assert_eq!(a == b, left == right);
		}

		#[test]
		fn hash_invariant_to_attribute_order(
			keys in proptest::collection::btree_set("attr__[a-z]{1,8}", 1..6),
		) {
			let keys: Vec<String> = keys.into_iter().collect();
			let mut forward = Element::new("div", 0);
			for key in &keys {
				forward = forward.with_attribute(key.clone(), serde_json::json!(key.len()));
			}
			let mut reverse = Element::new("div", 0);
			for key in keys.iter().rev() {
				reverse = reverse.with_attribute(key.clone(), serde_json::json!(key.len()));
			}
			prop_assert_eq!(hash_elements(&[forward]), hash_elements(&[reverse]));
		}
	}
}
