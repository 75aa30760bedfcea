use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::{debug, warn};

use crate::api::{ActionReceipt, ApiError, Credentials, FindingsApi};
use crate::core::{Client, DashboardSummary, Report, Role, SecurityEvent, Session, aggregate_clients};
use crate::logs::{LoggedOutcome, write_remediation_log};
use crate::mapping;
use crate::remediation::{Decision, EventBoard, RemediationError, Workflow, format_timestamp};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Remediation(#[from] RemediationError),

    #[error("unknown event: {0}")]
    UnknownEvent(String),

    #[error("event {event_id} has no finding key; its stored finding cannot be fetched")]
    NoFindingKey { event_id: String },

    /// An upstream-refused decision whose audit record could not be written.
    #[error(
        "failed to {decision} remediation for event {event_id}, and its remediation log could not be written: {audit_error}"
    )]
    UnloggedFailure {
        event_id: String,
        decision: Decision,
        audit_error: String,
        #[source]
        source: ApiError,
    },

    #[error("role {role} may not {action}")]
    Forbidden { role: Role, action: &'static str },

    #[error("account {account_id} is outside this session's scope")]
    OutOfScope { account_id: String },

    #[error("invalid password: {0}")]
    InvalidPassword(&'static str),
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Clone, Default)]
pub struct EngineOptions {
    pub show_progress: bool,
    /// Where remediation audit records go; `None` disables them.
    pub audit_log_dir: Option<PathBuf>,
}

/// An event after a detail lookup. `warning` is set when the lookup could
/// not be done; `event` is then the input unchanged.
#[derive(Debug, Clone)]
pub struct Enriched {
    pub event: SecurityEvent,
    pub warning: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DecisionOutcome {
    pub event: SecurityEvent,
    pub receipt: ActionReceipt,
    pub audit_log: Option<PathBuf>,
    pub audit_error: Option<String>,
}

pub struct Engine<A> {
    api: Arc<A>,
    workflow: Workflow<A>,
    session: Session,
    opts: EngineOptions,
}

impl<A: FindingsApi> Engine<A> {
    pub fn new(api: Arc<A>, session: Session, opts: EngineOptions) -> Self {
        let workflow = Workflow::new(Arc::clone(&api));
        Self {
            api,
            workflow,
            session,
            opts,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Every event the session may see, newest first.
    pub async fn events(&self) -> Result<Vec<SecurityEvent>> {
        let pb = self.spinner("Fetching findings...");
        let fetched = self.api.list_findings().await;
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        let summaries = fetched?;
        debug!(count = summaries.len(), "findings fetched");

        let scope = self.session.account_scope();
        let mut events: Vec<SecurityEvent> = summaries
            .iter()
            .map(mapping::map_summary)
            .filter(|e| scope.is_none_or(|account| e.client_id == account))
            .collect();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(events)
    }

    pub async fn client_events(&self, account_id: &str) -> Result<Vec<SecurityEvent>> {
        self.check_scope(account_id)?;
        let mut events = self.events().await?;
        events.retain(|e| e.client_id == account_id);
        Ok(events)
    }

    pub async fn event(&self, id: &str) -> Result<Option<SecurityEvent>> {
        Ok(self.events().await?.into_iter().find(|e| e.id == id))
    }

    /// The stored finding behind `event`, as the upstream returns it.
    pub async fn raw_finding(&self, event: &SecurityEvent) -> Result<serde_json::Value> {
        let key = event.key().ok_or_else(|| EngineError::NoFindingKey {
            event_id: event.id.clone(),
        })?;
        let pb = self.spinner("Fetching stored finding...");
        let fetched = self.api.raw_finding(key).await;
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        Ok(fetched?)
    }

    pub async fn enrich_event(&self, event: SecurityEvent) -> Enriched {
        let Some(key) = event.key().map(str::to_string) else {
            let warning = format!("event {} has no finding key; showing summary only", event.id);
            warn!(event_id = %event.id, "finding key missing; skipping detail lookup");
            return Enriched {
                event,
                warning: Some(warning),
            };
        };
        match self.api.finding_detail(&key).await {
            Ok(detail) => Enriched {
                event: mapping::enrich(event, &detail),
                warning: None,
            },
            Err(err) => {
                warn!(event_id = %event.id, error = %err, "detail lookup failed");
                Enriched {
                    warning: Some(format!("could not load details for {}: {err}", event.id)),
                    event,
                }
            }
        }
    }

    /// Enriches every event concurrently; output order follows input order.
    pub async fn enrich_all(&self, events: Vec<SecurityEvent>) -> Vec<Enriched> {
        let pb = self.spinner("Loading finding details...");
        let enriched = join_all(events.into_iter().map(|e| self.enrich_event(e))).await;
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        enriched
    }

    pub async fn clients(&self) -> Result<Vec<Client>> {
        Ok(aggregate_clients(&self.events().await?))
    }

    pub async fn pending(&self) -> Result<Vec<SecurityEvent>> {
        let mut events = self.events().await?;
        events.retain(SecurityEvent::needs_approval);
        Ok(events)
    }

    pub fn summary(&self, events: &[SecurityEvent]) -> DashboardSummary {
        DashboardSummary::from_events(events)
    }

    pub fn report(&self, events: Vec<SecurityEvent>) -> Report {
        Report {
            schema_version: "1.0".to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: format_timestamp(OffsetDateTime::now_utc()),
            summary: DashboardSummary::from_events(&events),
            events,
        }
    }

    pub async fn approve(&self, board: &mut EventBoard, id: &str) -> Result<DecisionOutcome> {
        self.decide(board, id, Decision::Approve).await
    }

    pub async fn reject(&self, board: &mut EventBoard, id: &str) -> Result<DecisionOutcome> {
        self.decide(board, id, Decision::Reject).await
    }

    pub async fn decide(
        &self,
        board: &mut EventBoard,
        id: &str,
        decision: Decision,
    ) -> Result<DecisionOutcome> {
        if !self.session.can_decide_remediation() {
            return Err(EngineError::Forbidden {
                role: self.session.role,
                action: decision.as_str(),
            });
        }
        let event = board
            .get(id)
            .cloned()
            .ok_or_else(|| EngineError::UnknownEvent(id.to_string()))?;

        let started_at = OffsetDateTime::now_utc();
        match self.workflow.decide(&event, decision).await {
            Ok(decided) => {
                let (audit_log, audit_error) = self.audit(
                    started_at,
                    decision,
                    &event,
                    LoggedOutcome::Accepted {
                        updated: &decided.event,
                        receipt: &decided.receipt,
                    },
                );
                board.apply(decided.event.clone());
                Ok(DecisionOutcome {
                    event: decided.event,
                    receipt: decided.receipt,
                    audit_log,
                    audit_error,
                })
            }
            Err(err @ RemediationError::Api { .. }) => {
                let (_, audit_error) = self.audit(
                    started_at,
                    decision,
                    &event,
                    LoggedOutcome::Failed {
                        error: error_chain(&err),
                    },
                );
                match (err, audit_error) {
                    (
                        RemediationError::Api {
                            event_id,
                            decision,
                            source,
                        },
                        Some(audit_error),
                    ) => Err(EngineError::UnloggedFailure {
                        event_id,
                        decision,
                        audit_error,
                        source,
                    }),
                    (err, _) => Err(err.into()),
                }
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn authenticate(&self, password: &str) -> Result<bool> {
        let credentials = Credentials {
            username: self.session.username.clone(),
            password: password.to_string(),
            role: self.session.role,
        };
        Ok(self.api.authenticate(&credentials).await?)
    }

    pub async fn generate_report(&self, account_id: &str) -> Result<()> {
        self.check_scope(account_id)?;
        let pb = self.spinner("Requesting report...");
        let result = self.api.generate_report(account_id).await;
        if let Some(pb) = pb {
            pb.finish_and_clear();
        }
        Ok(result?)
    }

    pub async fn reset_password(
        &self,
        account_id: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        self.check_scope(account_id)?;
        if current_password.is_empty() {
            return Err(EngineError::InvalidPassword("current password is empty"));
        }
        if new_password.is_empty() {
            return Err(EngineError::InvalidPassword("new password is empty"));
        }
        if new_password == current_password {
            return Err(EngineError::InvalidPassword(
                "new password must differ from the current one",
            ));
        }
        Ok(self
            .api
            .reset_password(account_id, current_password, new_password)
            .await?)
    }

    fn check_scope(&self, account_id: &str) -> Result<()> {
        match self.session.account_scope() {
            Some(own) if own != account_id => Err(EngineError::OutOfScope {
                account_id: account_id.to_string(),
            }),
            _ => Ok(()),
        }
    }

    fn audit(
        &self,
        started_at: OffsetDateTime,
        decision: Decision,
        event: &SecurityEvent,
        outcome: LoggedOutcome<'_>,
    ) -> (Option<PathBuf>, Option<String>) {
        let Some(dir) = &self.opts.audit_log_dir else {
            return (None, None);
        };
        match write_remediation_log(
            dir,
            started_at,
            OffsetDateTime::now_utc(),
            &self.session.username,
            decision,
            event,
            outcome,
        ) {
            Ok(path) => (Some(path), None),
            Err(err) => {
                warn!(event_id = %event.id, error = %err, "failed to write remediation log");
                (None, Some(format!("{err:#}")))
            }
        }
    }

    fn spinner(&self, message: &'static str) -> Option<indicatif::ProgressBar> {
        use std::io::IsTerminal;
        if !self.opts.show_progress || !std::io::stderr().is_terminal() {
            return None;
        }
        let pb = indicatif::ProgressBar::new_spinner();
        pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(120));
        Some(pb)
    }
}

fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
