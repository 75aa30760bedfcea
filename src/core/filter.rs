use std::fmt;
use std::str::FromStr;

use crate::core::{SecurityEvent, Severity};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Remediated,
    Unremediated,
    NeedsApproval,
}

impl StatusFilter {
    pub const fn as_str(self) -> &'static str {
        match self {
            StatusFilter::All => "all",
            StatusFilter::Remediated => "remediated",
            StatusFilter::Unremediated => "unremediated",
            StatusFilter::NeedsApproval => "needs-approval",
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "remediated" => Ok(StatusFilter::Remediated),
            "unremediated" | "pending" => Ok(StatusFilter::Unremediated),
            "needs-approval" | "needs_approval" | "approval" => Ok(StatusFilter::NeedsApproval),
            other => Err(format!(
                "invalid status: {other} (expected all|remediated|unremediated|needs-approval)"
            )),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub search: Option<String>,
    pub severity: Option<Severity>,
    pub status: StatusFilter,
}

impl EventFilter {
    pub fn matches(&self, event: &SecurityEvent) -> bool {
        if let Some(severity) = self.severity {
            if event.severity != severity {
                return false;
            }
        }
        let status_ok = match self.status {
            StatusFilter::All => true,
            StatusFilter::Remediated => event.remediated,
            StatusFilter::Unremediated => !event.remediated,
            StatusFilter::NeedsApproval => event.needs_approval(),
        };
        if !status_ok {
            return false;
        }
        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(term) => matches_search(event, &term.to_lowercase()),
        }
    }

    pub fn apply(&self, events: &[SecurityEvent]) -> Vec<SecurityEvent> {
        events.iter().filter(|e| self.matches(e)).cloned().collect()
    }
}

fn matches_search(event: &SecurityEvent, term: &str) -> bool {
    let fields = [
        Some(event.id.as_str()),
        Some(event.event_type.as_str()),
        Some(event.description.as_str()),
        Some(event.client_name.as_str()),
        event.source_ip.as_deref(),
        event.destination_ip.as_deref(),
    ];
    fields
        .into_iter()
        .flatten()
        .any(|f| f.to_lowercase().contains(term))
}
