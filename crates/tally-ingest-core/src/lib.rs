// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core types for Tally event ingestion.
//!
//! This crate holds the storage-independent half of ingestion: persons and
//! their distinct-ID bindings, element chains and their content hash, captured
//! events, the per-team name registry, and the ingestion task payload. It is
//! used by `tally-server-ingest`, which adds persistence and the concurrent
//! identity-resolution logic.
//!
//! # Example
//!
//! ```
//! use tally_ingest_core::{hash_elements, parse_elements, EventPayload, TeamId};
//!
//! let payload = EventPayload::new("$autocapture").with_properties(serde_json::json!({
//!     "$elements": [{"tag_name": "button", "attr__class": "a b"}],
//! }));
//!
//! let raw = &payload.properties.as_ref().unwrap()["$elements"];
//! let chain = parse_elements(raw).unwrap();
//! assert_eq!(hash_elements(&chain).len(), 64);
//! # let _ = TeamId(1);
//! ```

pub mod element;
pub mod error;
pub mod event;
pub mod merge;
pub mod person;
pub mod team;

pub use element::{
	hash_elements, parse_elements, Element, ElementGroup, ElementGroupId, ElementId,
	ATTRIBUTE_PREFIX, ELEMENTS_PROPERTY,
};
pub use error::{IngestError, Result};
pub use event::{
	parse_timestamp, special_events, AliasKind, Event, EventId, EventPayload, IngestTask,
};
pub use merge::{MergeReason, PersonMerge, PersonMergeId};
pub use person::{
	Person, PersonDistinctId, PersonDistinctIdId, PersonId, PersonWithDistinctIds, TeamId,
};
pub use team::Team;
