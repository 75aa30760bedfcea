//! Raw finding shapes as returned by the upstream findings API.
//!
//! Every nested field is optional: upstream records are heterogeneous and a
//! missing property must read as `None`, never as a decode failure.

use serde::{Deserialize, Deserializer, Serialize};

/// `null` reads the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Remediation bookkeeping attached to a stored finding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemediationStatus {
    #[serde(default)]
    pub remediated: Option<bool>,
    #[serde(default)]
    pub remediation_action: Option<String>,
    #[serde(default)]
    pub remediation_timestamp: Option<String>,
}

/// List-view shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingSummary {
    #[serde(default, deserialize_with = "null_as_default")]
    pub key: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub severity: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    pub finding_id: String,
    #[serde(default)]
    pub last_modified: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub remediation_status: Option<RemediationStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SeverityDetail {
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CountryDetail {
    #[serde(default)]
    pub country_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CityDetail {
    #[serde(default)]
    pub city_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RemoteIpDetails {
    #[serde(default)]
    pub ip_address_v4: Option<String>,
    #[serde(default)]
    pub country: Option<CountryDetail>,
    #[serde(default)]
    pub city: Option<CityDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkConnectionAction {
    #[serde(default)]
    pub protocol: Option<String>,
    #[serde(default)]
    pub remote_ip_details: Option<RemoteIpDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FindingAction {
    #[serde(default)]
    pub network_connection_action: Option<NetworkConnectionAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Ec2InstanceDetails {
    #[serde(default, rename = "IpV4Addresses")]
    pub ip_v4_addresses: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceDetails {
    #[serde(default)]
    pub aws_ec2_instance: Option<Ec2InstanceDetails>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FindingResource {
    #[serde(default)]
    pub details: Option<ResourceDetails>,
}

/// Single-finding shape returned by the detail endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FindingDetail {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub aws_account_id: Option<String>,
    #[serde(default)]
    pub types: Option<Vec<String>>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub severity: Option<SeverityDetail>,
    #[serde(default)]
    pub first_observed_at: Option<String>,
    #[serde(default)]
    pub last_observed_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub action: Option<FindingAction>,
    #[serde(default)]
    pub resources: Option<Vec<FindingResource>>,
    #[serde(default, rename = "remediationStatus")]
    pub remediation_status: Option<RemediationStatus>,
}

impl FindingDetail {
    pub fn first_type(&self) -> Option<&str> {
        self.types.as_ref()?.first().map(String::as_str)
    }

    pub fn network_connection(&self) -> Option<&NetworkConnectionAction> {
        self.action.as_ref()?.network_connection_action.as_ref()
    }

    pub fn remote_ip_details(&self) -> Option<&RemoteIpDetails> {
        self.network_connection()?.remote_ip_details.as_ref()
    }

    pub fn remote_ip(&self) -> Option<&str> {
        self.remote_ip_details()?.ip_address_v4.as_deref()
    }

    pub fn remote_country(&self) -> Option<&str> {
        self.remote_ip_details()?.country.as_ref()?.country_name.as_deref()
    }

    pub fn remote_city(&self) -> Option<&str> {
        self.remote_ip_details()?.city.as_ref()?.city_name.as_deref()
    }

    pub fn protocol(&self) -> Option<&str> {
        self.network_connection()?.protocol.as_deref()
    }

    /// First IPv4 address of the first resource's EC2 instance.
    pub fn instance_ip(&self) -> Option<&str> {
        self.resources
            .as_ref()?
            .first()?
            .details
            .as_ref()?
            .aws_ec2_instance
            .as_ref()?
            .ip_v4_addresses
            .as_ref()?
            .first()
            .map(String::as_str)
    }

    pub fn severity_label(&self) -> Option<&str> {
        self.severity.as_ref()?.label.as_deref()
    }
}

/// A finding as it crossed the API boundary, tagged by shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawFinding {
    Summary(FindingSummary),
    /// Detail body plus the lookup key it was fetched under.
    Detail { key: String, finding: FindingDetail },
}

impl RawFinding {
    pub fn key(&self) -> &str {
        match self {
            RawFinding::Summary(summary) => &summary.key,
            RawFinding::Detail { key, .. } => key,
        }
    }
}
