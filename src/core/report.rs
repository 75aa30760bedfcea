use serde::{Deserialize, Serialize};

use crate::core::{EventCount, SecurityEvent};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total: u64,
    pub remediated: u64,
    pub unremediated: u64,
    pub pending_approval: u64,
    pub by_severity: EventCount,
}

impl DashboardSummary {
    pub fn from_events(events: &[SecurityEvent]) -> Self {
        let mut summary = Self::default();
        for event in events {
            summary.total += 1;
            if event.remediated {
                summary.remediated += 1;
            } else {
                summary.unremediated += 1;
            }
            if event.needs_approval() {
                summary.pending_approval += 1;
            }
            summary.by_severity.record(event.severity);
        }
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub schema_version: String,
    pub tool_version: String,
    pub generated_at: String,
    pub summary: DashboardSummary,
    pub events: Vec<SecurityEvent>,
}
