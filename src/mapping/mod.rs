//! Raw finding → `SecurityEvent` normalization and detail enrichment.

use crate::core::{
    EventMetadata, FindingDetail, FindingSummary, RawFinding, SecurityEvent, Severity,
    SourceLocation,
};

const UNKNOWN_ACCOUNT: &str = "unknown";

pub fn map(raw: &RawFinding) -> SecurityEvent {
    match raw {
        RawFinding::Summary(summary) => map_summary(summary),
        RawFinding::Detail { key, finding } => map_detail(key, finding),
    }
}

pub fn map_summary(summary: &FindingSummary) -> SecurityEvent {
    let account_id = summary
        .account_id
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(UNKNOWN_ACCOUNT);

    let mut event = SecurityEvent::placeholder(summary.finding_id.clone(), account_id);
    event.timestamp = summary.last_modified.clone();
    event.severity = Severity::from_label(&summary.severity);

    if let Some(status) = &summary.remediation_status {
        event.remediated = status.remediated.unwrap_or(false);
        event.remediation_timestamp = status.remediation_timestamp.clone();
        event.remediation_details = status.remediation_action.clone();
    }

    event.metadata = EventMetadata::with_key(&summary.key);
    event
}

/// Maps a detail record on its own, without a previously known summary.
pub fn map_detail(key: &str, detail: &FindingDetail) -> SecurityEvent {
    let account_id = detail
        .aws_account_id
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(UNKNOWN_ACCOUNT);
    let id = detail.id.clone().unwrap_or_else(|| key.to_string());

    let mut event = SecurityEvent::placeholder(id, account_id);
    event.timestamp = detail
        .updated_at
        .clone()
        .or_else(|| detail.created_at.clone());
    event.metadata = EventMetadata::with_key(key);
    enrich(event, detail)
}

/// Overlays detail fields onto `event`. Fields absent from `detail` leave the
/// event's value in place; `metadata` and `remediation_approved` are never
/// touched.
pub fn enrich(mut event: SecurityEvent, detail: &FindingDetail) -> SecurityEvent {
    if let Some(t) = non_empty(detail.first_type()) {
        event.event_type = t.to_string();
    }
    if let Some(d) = non_empty(detail.description.as_deref()) {
        event.description = d.to_string();
    }
    if let Some(label) = non_empty(detail.severity_label()) {
        event.severity = Severity::from_label(label);
    }
    if let Some(ip) = non_empty(detail.remote_ip()) {
        event.source_ip = Some(ip.to_string());
    }
    if let Some(ip) = non_empty(detail.instance_ip()) {
        event.destination_ip = Some(ip.to_string());
    }
    if let Some(protocol) = non_empty(detail.protocol()) {
        event.protocol = Some(protocol.to_string());
    }

    let country = non_empty(detail.remote_country()).map(str::to_string);
    let city = non_empty(detail.remote_city()).map(str::to_string);
    if country.is_some() || city.is_some() {
        event.source_location = Some(SourceLocation { country, city });
    }

    if let Some(v) = non_empty(detail.first_observed_at.as_deref()) {
        event.first_observed = Some(v.to_string());
    }
    if let Some(v) = non_empty(detail.last_observed_at.as_deref()) {
        event.last_observed = Some(v.to_string());
    }
    if let Some(v) = non_empty(detail.updated_at.as_deref()) {
        event.updated_at = Some(v.to_string());
    }

    if let Some(status) = &detail.remediation_status {
        if let Some(remediated) = status.remediated {
            event.remediated = remediated;
        }
        if let Some(ts) = non_empty(status.remediation_timestamp.as_deref()) {
            event.remediation_timestamp = Some(ts.to_string());
        }
        if let Some(action) = non_empty(status.remediation_action.as_deref()) {
            event.remediation_details = Some(action.to_string());
        }
    }

    event
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DEFAULT_EVENT_TYPE, RemediationStatus};

    fn summary(severity: &str) -> FindingSummary {
        FindingSummary {
            key: "k1".to_string(),
            severity: severity.to_string(),
            date: Some("2024-01-01".to_string()),
            account_id: Some("a1".to_string()),
            finding_id: "f1".to_string(),
            last_modified: Some("2024-01-01T00:00:00Z".to_string()),
            source: None,
            remediation_status: None,
        }
    }

    fn detail(json: &str) -> FindingDetail {
        serde_json::from_str(json).expect("detail json")
    }

    #[test]
    fn maps_summary_example() {
        let event = map(&RawFinding::Summary(summary("HIGH")));
        assert_eq!(event.id, "f1");
        assert_eq!(event.client_id, "a1");
        assert_eq!(event.client_name, "AWS Account a1");
        assert_eq!(event.severity, Severity::High);
        assert!(!event.remediated);
        assert_eq!(event.remediation_approved, None);
        assert_eq!(event.timestamp.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(event.event_type, DEFAULT_EVENT_TYPE);
        assert_eq!(event.description, "GuardDuty finding detected in account a1");
        assert_eq!(event.metadata.key.as_deref(), Some("k1"));
        assert_eq!(event.source_ip, None);
    }

    #[test]
    fn severity_matches_levels_and_falls_back_to_low() {
        for (label, expected) in [
            ("critical", Severity::Critical),
            ("CRITICAL", Severity::Critical),
            ("High", Severity::High),
            ("mEdIuM", Severity::Medium),
            ("LOW", Severity::Low),
            ("informational", Severity::Low),
            ("", Severity::Low),
            (" high ", Severity::Low),
        ] {
            assert_eq!(map_summary(&summary(label)).severity, expected, "label={label:?}");
        }
    }

    #[test]
    fn summary_remediation_status_is_carried() {
        let mut s = summary("critical");
        s.remediation_status = Some(RemediationStatus {
            remediated: Some(true),
            remediation_action: Some("Isolated instance i-0abc".to_string()),
            remediation_timestamp: Some("2024-01-02T10:00:00".to_string()),
        });
        let event = map_summary(&s);
        assert!(event.remediated);
        assert_eq!(event.remediation_approved, None);
        assert_eq!(
            event.remediation_details.as_deref(),
            Some("Isolated instance i-0abc")
        );
        assert_eq!(
            event.remediation_timestamp.as_deref(),
            Some("2024-01-02T10:00:00")
        );
    }

    #[test]
    fn null_remediated_defaults_to_false() {
        let mut s = summary("high");
        s.remediation_status = Some(RemediationStatus::default());
        assert!(!map_summary(&s).remediated);
    }

    #[test]
    fn blank_key_maps_to_missing_key() {
        let mut s = summary("high");
        s.key = String::new();
        assert_eq!(map_summary(&s).key(), None);
    }

    #[test]
    fn key_with_surrounding_spaces_is_kept_as_is() {
        let mut s = summary("high");
        s.key = " security-hub-findings/high/x/ 123456789012_f1_a.json ".to_string();
        let event = map_summary(&s);
        assert_eq!(event.metadata.key.as_deref(), Some(s.key.as_str()));
        assert_eq!(event.key(), Some(s.key.as_str()));
    }

    #[test]
    fn missing_account_does_not_fail() {
        let mut s = summary("low");
        s.account_id = None;
        let event = map_summary(&s);
        assert_eq!(event.client_id, "unknown");
    }

    #[test]
    fn enrich_overrides_present_fields() {
        let base = map_summary(&summary("low"));
        let d = detail(
            r#"{
                "Types": ["Execution:Runtime/ReverseShell"],
                "Description": "Reverse shell opened from instance",
                "Severity": {"Label": "CRITICAL"},
                "FirstObservedAt": "2024-01-01T00:00:00Z",
                "LastObservedAt": "2024-01-01T01:00:00Z",
                "UpdatedAt": "2024-01-01T02:00:00Z",
                "Action": {"NetworkConnectionAction": {
                    "Protocol": "TCP",
                    "RemoteIpDetails": {
                        "IpAddressV4": "203.0.113.9",
                        "Country": {"CountryName": "Brazil"},
                        "City": {"CityName": "Recife"}
                    }
                }},
                "Resources": [{"Details": {"AwsEc2Instance": {"IpV4Addresses": ["10.0.1.20"]}}}],
                "remediationStatus": {"remediated": true, "remediationAction": "Isolated", "remediationTimestamp": "2024-01-01T03:00:00"}
            }"#,
        );
        let event = enrich(base.clone(), &d);
        assert_eq!(event.event_type, "Execution:Runtime/ReverseShell");
        assert_eq!(event.description, "Reverse shell opened from instance");
        assert_eq!(event.severity, Severity::Critical);
        assert_eq!(event.source_ip.as_deref(), Some("203.0.113.9"));
        assert_eq!(event.destination_ip.as_deref(), Some("10.0.1.20"));
        assert_eq!(event.protocol.as_deref(), Some("TCP"));
        assert_eq!(
            event.source_location,
            Some(SourceLocation {
                country: Some("Brazil".to_string()),
                city: Some("Recife".to_string())
            })
        );
        assert_eq!(event.first_observed.as_deref(), Some("2024-01-01T00:00:00Z"));
        assert_eq!(event.updated_at.as_deref(), Some("2024-01-01T02:00:00Z"));
        assert!(event.remediated);
        assert_eq!(event.remediation_details.as_deref(), Some("Isolated"));
        assert_eq!(event.metadata, base.metadata);
        assert_eq!(event.id, base.id);
        assert_eq!(event.timestamp, base.timestamp);
    }

    #[test]
    fn enrich_without_network_action_keeps_source_ip() {
        let mut base = map_summary(&summary("high"));
        base.source_ip = Some("1.1.1.1".to_string());
        let event = enrich(base, &detail(r#"{"Types": ["Recon:EC2/PortProbeUnprotectedPort"]}"#));
        assert_eq!(event.source_ip.as_deref(), Some("1.1.1.1"));
        assert_eq!(event.event_type, "Recon:EC2/PortProbeUnprotectedPort");
    }

    #[test]
    fn enrich_with_empty_detail_is_identity() {
        let mut base = map_summary(&summary("high"));
        base.remediation_approved = Some(false);
        assert_eq!(enrich(base.clone(), &FindingDetail::default()), base);
    }

    #[test]
    fn enrich_never_touches_key_or_decision() {
        let mut base = map_summary(&summary("high"));
        base.remediation_approved = Some(true);
        let d = detail(r#"{"Id": "other", "remediationStatus": {"remediated": false}}"#);
        let event = enrich(base, &d);
        assert_eq!(event.metadata.key.as_deref(), Some("k1"));
        assert_eq!(event.remediation_approved, Some(true));
        assert_eq!(event.id, "f1");
    }

    #[test]
    fn maps_detail_shape_with_its_lookup_key() {
        let d = detail(
            r#"{
                "Id": "arn:aws:securityhub:finding/f9",
                "AwsAccountId": "123456789012",
                "Types": ["Backdoor:EC2/C&CActivity.B"],
                "Severity": {"Label": "HIGH"},
                "UpdatedAt": "2024-03-01T00:00:00Z"
            }"#,
        );
        let event = map(&RawFinding::Detail {
            key: "security-hub-findings/high/2024-03-01/f9.json".to_string(),
            finding: d,
        });
        assert_eq!(event.id, "arn:aws:securityhub:finding/f9");
        assert_eq!(event.client_id, "123456789012");
        assert_eq!(event.severity, Severity::High);
        assert_eq!(event.timestamp.as_deref(), Some("2024-03-01T00:00:00Z"));
        assert_eq!(
            event.key(),
            Some("security-hub-findings/high/2024-03-01/f9.json")
        );
    }
}
