// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server-side ingestion for Tally.
//!
//! This crate provides:
//! - SQLite-backed stores for persons, element chains, events and teams
//! - [`IdentityResolver`], which links identifiers and merges persons safely
//!   under concurrent workers
//! - [`EventIngestPipeline`], the per-event entry point

pub mod error;
pub mod identity_resolution;
pub mod pipeline;
pub mod repository;

pub use error::{IngestServerError, Result};
pub use identity_resolution::{
	IdentityResolver, MergeAuditHook, NoOpMergeAuditHook, PersonMergeDetails, Resolution,
	SharedMergeAuditHook, MAX_ATTEMPTS,
};
pub use pipeline::EventIngestPipeline;
pub use repository::{
	ElementChainStore, EventStore, MergeOutcome, PersonDirectory, SqliteIngestRepository,
	TeamRegistry,
};
