// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! SQLite storage plumbing for Tally ingestion.
//!
//! Provides the connection pool, schema migrations and the shared database
//! error type. Repositories live with the services that own them.

pub mod error;
pub mod migrations;
pub mod pool;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{DbError, Result};
pub use migrations::run_migrations;
pub use pool::{create_pool, create_pool_with, PoolSettings};
