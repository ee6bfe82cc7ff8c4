// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use tally_server_ingest::{MergeAuditHook, PersonMergeDetails};

/// Writes every person merge to the log.
#[derive(Debug, Clone, Default)]
pub struct LoggingMergeAuditHook;

impl MergeAuditHook for LoggingMergeAuditHook {
	fn on_merge(&self, details: PersonMergeDetails) {
		tracing::info!(
			team_id = %details.team_id,
			survivor_id = %details.survivor_id,
			absorbed_id = %details.absorbed_id,
			reason = details.reason.as_str(),
			identifiers_transferred = details.identifiers_transferred,
			"person merged"
		);
	}
}
