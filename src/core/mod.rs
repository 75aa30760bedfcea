mod client;
mod event;
mod filter;
mod finding;
mod report;
mod session;
mod severity;

pub use client::{Client, EventCount, aggregate_clients};
pub use event::{
    DEFAULT_EVENT_TYPE, EventMetadata, RemediationState, SecurityEvent, SourceLocation,
    default_client_name, default_description,
};
pub use filter::{EventFilter, StatusFilter};
pub use finding::{
    CityDetail, CountryDetail, Ec2InstanceDetails, FindingAction, FindingDetail, FindingResource,
    FindingSummary, NetworkConnectionAction, RawFinding, RemediationStatus, RemoteIpDetails,
    ResourceDetails, SeverityDetail,
};
pub use report::{DashboardSummary, Report};
pub use session::{Role, Session};
pub use severity::Severity;
