use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::Severity;

pub const DEFAULT_EVENT_TYPE: &str = "GuardDuty Finding";

pub fn default_client_name(account_id: &str) -> String {
    format!("AWS Account {account_id}")
}

pub fn default_description(account_id: &str) -> String {
    format!("GuardDuty finding detected in account {account_id}")
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl EventMetadata {
    /// Blank keys are treated as missing; anything else is kept verbatim.
    pub fn with_key(key: &str) -> Self {
        Self {
            key: (!key.trim().is_empty()).then(|| key.to_string()),
            extra: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityEvent {
    pub id: String,
    pub client_id: String,
    pub client_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub event_type: String,
    pub description: String,
    pub severity: Severity,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_ip: Option<String>,
    pub remediated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation_approved: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remediation_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_location: Option<SourceLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_observed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_observed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub metadata: EventMetadata,
}

/// Decision state derived from `(remediated, remediation_approved)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemediationState {
    Open,
    ApprovedPending,
    Remediated,
    Rejected,
    /// Remediated upstream without a recorded decision, e.g. `(true, None)`.
    RemediatedUpstream,
}

impl RemediationState {
    pub const fn as_str(self) -> &'static str {
        match self {
            RemediationState::Open => "open",
            RemediationState::ApprovedPending => "approved",
            RemediationState::Remediated => "remediated",
            RemediationState::Rejected => "rejected",
            RemediationState::RemediatedUpstream => "remediated",
        }
    }
}

impl SecurityEvent {
    /// A bare event for `account_id` with placeholders filled in.
    pub fn placeholder(id: impl Into<String>, account_id: &str) -> Self {
        Self {
            id: id.into(),
            client_id: account_id.to_string(),
            client_name: default_client_name(account_id),
            timestamp: None,
            event_type: DEFAULT_EVENT_TYPE.to_string(),
            description: default_description(account_id),
            severity: Severity::Low,
            source_ip: None,
            destination_ip: None,
            remediated: false,
            remediation_approved: None,
            remediation_timestamp: None,
            remediation_details: None,
            protocol: None,
            source_location: None,
            first_observed: None,
            last_observed: None,
            updated_at: None,
            metadata: EventMetadata::default(),
        }
    }

    pub fn key(&self) -> Option<&str> {
        self.metadata.key.as_deref().filter(|k| !k.trim().is_empty())
    }

    /// The single gate for every remediation action.
    pub fn needs_approval(&self) -> bool {
        self.severity.is_high() && !self.remediated && self.remediation_approved != Some(true)
    }

    pub fn remediation_state(&self) -> RemediationState {
        match (self.remediated, self.remediation_approved) {
            (false, None) => RemediationState::Open,
            (false, Some(true)) => RemediationState::ApprovedPending,
            (true, Some(true)) => RemediationState::Remediated,
            (false, Some(false)) => RemediationState::Rejected,
            (true, _) => RemediationState::RemediatedUpstream,
        }
    }
}
