//! Upstream findings API: the contract and its HTTP implementation.

mod error;
mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::{FindingDetail, FindingSummary, Role};

pub use error::{ApiError, Result};
pub use http::{HttpFindingsApi, HttpFindingsApiBuilder, user_agent};

#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub role: Role,
}

/// What the approve/reject endpoints said about the action, when anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionReceipt {
    #[serde(default)]
    pub message: Option<String>,
}

#[async_trait]
pub trait FindingsApi: Send + Sync {
    async fn list_findings(&self) -> Result<Vec<FindingSummary>>;
    async fn finding_detail(&self, key: &str) -> Result<FindingDetail>;

    /// The detail body exactly as stored upstream, unmodelled fields included.
    async fn raw_finding(&self, key: &str) -> Result<serde_json::Value>;
    async fn approve(&self, key: &str) -> Result<ActionReceipt>;
    async fn reject(&self, key: &str) -> Result<ActionReceipt>;

    /// `Ok(false)` when the upstream refused the credentials.
    async fn authenticate(&self, credentials: &Credentials) -> Result<bool>;

    /// Triggers report generation; the report itself is delivered elsewhere.
    async fn generate_report(&self, account_id: &str) -> Result<()>;

    async fn reset_password(
        &self,
        account_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()>;
}
