// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections for the ingest worker.

pub mod database;
pub mod ingest;
pub mod logging;

pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use ingest::{IngestConfig, IngestConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
