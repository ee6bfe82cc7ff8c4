// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Test helpers. Not part of the stable API.

use sqlx::sqlite::SqlitePool;
use tempfile::TempDir;

use crate::pool::create_pool;

/// Opens a pool on a fresh file-backed database.
///
/// The returned `TempDir` owns the file; keep it alive for the pool's lifetime.
pub async fn create_test_pool() -> (SqlitePool, TempDir) {
	let dir = tempfile::tempdir().unwrap();
	let db_path = dir.path().join("test.db");
	let pool = create_pool(&format!("sqlite:{}?mode=rwc", db_path.display()))
		.await
		.unwrap();
	(pool, dir)
}

/// Like [`create_test_pool`], with the ingestion schema applied.
pub async fn create_migrated_test_pool() -> (SqlitePool, TempDir) {
	let (pool, dir) = create_test_pool().await;
	crate::migrations::run_migrations(&pool).await.unwrap();
	(pool, dir)
}
