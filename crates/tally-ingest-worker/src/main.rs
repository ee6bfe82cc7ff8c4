// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tally ingest worker binary.
//!
//! Reads newline-delimited JSON ingestion tasks from a file or stdin and runs
//! each through the ingest pipeline against the configured SQLite database.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tally_server_config::{LoggingConfig, ServerConfig};
use tally_server_db::{create_pool_with, run_migrations, PoolSettings};
use tally_server_ingest::{EventIngestPipeline, SqliteIngestRepository};
use tokio::io::BufReader;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod audit;
mod runner;

/// Tally ingest worker - runs captured events through ingestion.
#[derive(Parser, Debug)]
#[command(
	name = "tally-ingest-worker",
	about = "Tally event ingestion worker",
	version
)]
struct Args {
	/// TOML config file (defaults to /etc/tally/ingest.toml)
	#[arg(long, env = "TALLY_CONFIG")]
	config: Option<PathBuf>,

	/// Override the number of tasks processed at once
	#[arg(long)]
	concurrency: Option<usize>,

	/// File of newline-delimited ingestion tasks; stdin when omitted
	input: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	dotenvy::dotenv().ok();

	let config: ServerConfig = match &args.config {
		Some(path) => tally_server_config::load_config_with_file(path)?,
		None => tally_server_config::load_config()?,
	};

	init_tracing(&config.logging);

	let concurrency = args.concurrency.unwrap_or(config.ingest.concurrency).max(1);
	tracing::info!(
		database = %config.database.url,
		concurrency,
		input = %args.input.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "stdin".to_string()),
		"starting tally-ingest-worker"
	);

	let pool = create_pool_with(
		&config.database.url,
		PoolSettings {
			max_connections: config.database.max_connections,
			busy_timeout: Duration::from_millis(config.database.busy_timeout_ms),
		},
	)
	.await?;
	run_migrations(&pool).await?;

	let pipeline = Arc::new(EventIngestPipeline::with_audit_hook(
		SqliteIngestRepository::new(pool.clone()),
		Arc::new(audit::LoggingMergeAuditHook),
	));

	let summary = match &args.input {
		Some(path) => {
			let file = tokio::fs::File::open(path).await?;
			runner::run(
				pipeline,
				BufReader::new(file),
				concurrency,
				config.ingest.fail_fast,
			)
			.await?
		}
		None => {
			runner::run(
				pipeline,
				BufReader::new(tokio::io::stdin()),
				concurrency,
				config.ingest.fail_fast,
			)
			.await?
		}
	};

	pool.close().await;
	tracing::info!(
		processed = summary.processed,
		failed = summary.failed,
		"ingest finished"
	);
	Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| logging.level.clone().into());
	let registry = tracing_subscriber::registry().with(filter);

	if logging.json {
		registry
			.with(tracing_subscriber::fmt::layer().json())
			.init();
	} else {
		registry.with(tracing_subscriber::fmt::layer()).init();
	}
}
