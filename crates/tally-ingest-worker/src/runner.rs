// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reads newline-delimited ingestion tasks and runs them concurrently.

use std::sync::Arc;

use anyhow::{anyhow, Context};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tracing::{error, warn};

use tally_ingest_core::IngestTask;
use tally_server_ingest::{
	ElementChainStore, EventIngestPipeline, EventStore, IngestServerError, PersonDirectory,
	TeamRegistry,
};

/// Counts from one run over an input stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
	pub processed: u64,
	pub failed: u64,
}

type TaskResult = Result<(), (usize, IngestServerError)>;

/// Runs every task in `input` through the pipeline, at most `concurrency`
/// at a time.
///
/// Malformed lines and failed tasks are logged and counted. With `fail_fast`
/// the first failure stops the run and is returned as an error.
pub async fn run<R, I>(
	pipeline: Arc<EventIngestPipeline<R>>,
	input: I,
	concurrency: usize,
	fail_fast: bool,
) -> anyhow::Result<RunSummary>
where
	R: PersonDirectory + ElementChainStore + EventStore + TeamRegistry + Clone + 'static,
	I: AsyncBufRead + Unpin,
{
	let semaphore = Arc::new(Semaphore::new(concurrency));
	let mut tasks: JoinSet<TaskResult> = JoinSet::new();
	let mut summary = RunSummary::default();
	let mut lines = input.lines();
	let mut line_no = 0usize;

	while let Some(line) = lines.next_line().await.context("reading task input")? {
		line_no += 1;
		if line.trim().is_empty() {
			continue;
		}

		let task: IngestTask = match serde_json::from_str(&line) {
			Ok(task) => task,
			Err(e) => {
				warn!(line = line_no, error = %e, "skipping malformed task");
				summary.failed += 1;
				if fail_fast {
					return Err(anyhow!("malformed task on line {line_no}: {e}"));
				}
				continue;
			}
		};

		let permit = semaphore.clone().acquire_owned().await?;
		let pipeline = pipeline.clone();
		tasks.spawn(async move {
			let _permit = permit;
			pipeline
				.process(&task)
				.await
				.map(|_| ())
				.map_err(|e| (line_no, e))
		});

		while let Some(finished) = tasks.try_join_next() {
			record(finished, &mut summary, fail_fast)?;
		}
	}

	while let Some(finished) = tasks.join_next().await {
		record(finished, &mut summary, fail_fast)?;
	}

	Ok(summary)
}

fn record(
	finished: Result<TaskResult, JoinError>,
	summary: &mut RunSummary,
	fail_fast: bool,
) -> anyhow::Result<()> {
	match finished {
		Ok(Ok(())) => summary.processed += 1,
		Ok(Err((line, e))) => {
			error!(line, error = %e, "ingest task failed");
			summary.failed += 1;
			if fail_fast {
				return Err(anyhow!("task on line {line} failed: {e}"));
			}
		}
		Err(e) => {
			error!(error = %e, "ingest task aborted");
			summary.failed += 1;
			if fail_fast {
				return Err(anyhow!(e).context("ingest task aborted"));
			}
		}
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use tally_ingest_core::TeamId;
	use tally_server_db::testing::create_migrated_test_pool;
	use tally_server_ingest::SqliteIngestRepository;

	const INPUT: &str = concat!(
		r#"{"distinct_id":"u1","ip":"10.0.0.1","site_url":"https://a.test","data":{"event":"$pageview"},"team_id":1,"now":"2024-01-01T00:00:00Z"}"#,
		"\n",
		"\n",
		"not json\n",
		r#"{"distinct_id":"u2","ip":"10.0.0.2","site_url":"https://a.test","data":{"event":"$identify","properties":{"$anon_distinct_id":"anon"}},"team_id":1,"now":"2024-01-01T00:00:00Z"}"#,
		"\n",
		r#"{"distinct_id":"u3","ip":"10.0.0.3","site_url":"https://a.test","data":{"event":"$create_alias"},"team_id":1,"now":"2024-01-01T00:00:00Z"}"#,
		"\n",
	);

	#[tokio::test]
	async fn test_run_counts_successes_and_failures() {
		let (pool, _dir) = create_migrated_test_pool().await;
		let repo = SqliteIngestRepository::new(pool);
		let pipeline = Arc::new(EventIngestPipeline::new(repo.clone()));

		let summary = run(pipeline, INPUT.as_bytes(), 2, false).await.unwrap();

		assert_eq!(
			summary,
			RunSummary {
				processed: 2,
				failed: 2
			}
		);
		assert_eq!(repo.count_events(TeamId(1)).await.unwrap(), 2);
		let anon = repo.find(TeamId(1), "anon").await.unwrap().unwrap();
		let user = repo.find(TeamId(1), "u2").await.unwrap().unwrap();
		assert_eq!(anon.id, user.id);
	}

	#[tokio::test]
	async fn test_out_of_range_offset_fails_only_its_task() {
		let (pool, _dir) = create_migrated_test_pool().await;
		let repo = SqliteIngestRepository::new(pool);
		let pipeline = Arc::new(EventIngestPipeline::new(repo.clone()));
		let input = concat!(
			r#"{"distinct_id":"u1","ip":"10.0.0.1","site_url":"https://a.test","data":{"event":"$pageview","offset":9000000000000000000},"team_id":1,"now":"2024-01-01T00:00:10Z"}"#,
			"\n",
			r#"{"distinct_id":"u1","ip":"10.0.0.1","site_url":"https://a.test","data":{"event":"$pageview"},"team_id":1,"now":"2024-01-01T00:00:10"}"#,
			"\n",
		);

		let summary = run(pipeline, input.as_bytes(), 2, false).await.unwrap();

		assert_eq!(
			summary,
			RunSummary {
				processed: 1,
				failed: 1
			}
		);
		assert_eq!(repo.count_events(TeamId(1)).await.unwrap(), 1);
	}

	#[tokio::test]
	async fn test_fail_fast_stops_on_malformed_line() {
		let (pool, _dir) = create_migrated_test_pool().await;
		let pipeline = Arc::new(EventIngestPipeline::new(SqliteIngestRepository::new(pool)));

		let err = run(pipeline, INPUT.as_bytes(), 1, true).await.unwrap_err();
		assert!(err.to_string().contains("line 3"));
	}
}
