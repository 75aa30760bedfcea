use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::api::ActionReceipt;
use crate::core::SecurityEvent;
use crate::remediation::Decision;

const MAX_MESSAGE_BYTES: usize = 16 * 1024;

#[derive(Debug, Serialize)]
struct RemediationLog {
    schema_version: &'static str,
    tool_version: String,
    command: &'static str,
    started_at: String,
    finished_at: String,
    status: &'static str,
    actor: String,
    event: RemediationLogEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    upstream_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct RemediationLogEvent {
    id: String,
    client_id: String,
    severity: String,
    key: String,
    state_before: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    state_after: Option<String>,
}

/// Outcome of one decision as it should be recorded.
pub enum LoggedOutcome<'a> {
    Accepted {
        updated: &'a SecurityEvent,
        receipt: &'a ActionReceipt,
    },
    Failed {
        error: String,
    },
}

pub fn logs_dir(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/soarcery/logs")
}

pub fn write_remediation_log(
    dir: &Path,
    started_at: OffsetDateTime,
    finished_at: OffsetDateTime,
    actor: &str,
    decision: Decision,
    event: &SecurityEvent,
    outcome: LoggedOutcome<'_>,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create log directory: {}", dir.display()))?;

    let pid = std::process::id();
    let ts = finished_at.unix_timestamp_nanos();
    let path = dir.join(format!("remediation-{decision}-{pid}-{ts}.json"));

    let (status, state_after, upstream_message, error) = match outcome {
        LoggedOutcome::Accepted { updated, receipt } => (
            "ok",
            Some(updated.remediation_state().as_str().to_string()),
            receipt.message.as_deref().map(truncate_message),
            None,
        ),
        LoggedOutcome::Failed { error } => ("error", None, None, Some(truncate_message(&error))),
    };

    let log = RemediationLog {
        schema_version: "1.0",
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        command: decision.as_str(),
        started_at: format_time(started_at),
        finished_at: format_time(finished_at),
        status,
        actor: actor.to_string(),
        event: RemediationLogEvent {
            id: event.id.clone(),
            client_id: event.client_id.clone(),
            severity: event.severity.to_string(),
            key: event.key().unwrap_or_default().to_string(),
            state_before: event.remediation_state().as_str().to_string(),
            state_after,
        },
        upstream_message,
        error,
    };

    let buf = serde_json::to_vec_pretty(&log)?;
    std::fs::write(&path, buf)
        .with_context(|| format!("failed to write log: {}", path.display()))?;
    Ok(path)
}

fn format_time(t: OffsetDateTime) -> String {
    t.format(&Rfc3339).unwrap_or_else(|_| "unknown".to_string())
}

fn truncate_message(s: &str) -> String {
    if s.len() <= MAX_MESSAGE_BYTES {
        return s.to_string();
    }
    let mut end = MAX_MESSAGE_BYTES;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &s[..end])
}
