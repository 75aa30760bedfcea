//! Approve/reject protocol for high-severity events.

mod board;

use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{info, warn};

use crate::api::{ActionReceipt, ApiError, FindingsApi};
use crate::core::SecurityEvent;

pub use board::EventBoard;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub const fn as_str(self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum RemediationError {
    #[error("event {event_id} has no finding key; cannot {decision} remediation")]
    MissingKey { event_id: String, decision: Decision },

    #[error("event {event_id} does not need approval (state: {state})")]
    NotPending {
        event_id: String,
        state: &'static str,
    },

    #[error("a remediation request for event {event_id} is already in progress")]
    InFlight { event_id: String },

    #[error("failed to {decision} remediation for event {event_id}")]
    Api {
        event_id: String,
        decision: Decision,
        #[source]
        source: ApiError,
    },
}

/// Result of a decision the upstream accepted.
#[derive(Debug, Clone)]
pub struct Decided {
    pub event: SecurityEvent,
    pub receipt: ActionReceipt,
}

/// Pure state step: only the decision fields and the timestamp change.
pub fn transition(event: &SecurityEvent, decision: Decision, at: OffsetDateTime) -> SecurityEvent {
    let mut next = event.clone();
    match decision {
        Decision::Approve => {
            next.remediated = true;
            next.remediation_approved = Some(true);
        }
        Decision::Reject => {
            next.remediated = false;
            next.remediation_approved = Some(false);
        }
    }
    next.remediation_timestamp = Some(format_timestamp(at));
    next
}

pub fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}

pub struct Workflow<A> {
    api: Arc<A>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl<A> Clone for Workflow<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            in_flight: Arc::clone(&self.in_flight),
        }
    }
}

impl<A: FindingsApi> Workflow<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self {
            api,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub async fn approve(&self, event: &SecurityEvent) -> Result<Decided, RemediationError> {
        self.decide(event, Decision::Approve).await
    }

    pub async fn reject(&self, event: &SecurityEvent) -> Result<Decided, RemediationError> {
        self.decide(event, Decision::Reject).await
    }

    pub fn is_in_flight(&self, event_id: &str) -> bool {
        self.lock_in_flight().contains(event_id)
    }

    pub async fn decide(
        &self,
        event: &SecurityEvent,
        decision: Decision,
    ) -> Result<Decided, RemediationError> {
        let Some(key) = event.key() else {
            warn!(event_id = %event.id, %decision, "finding key missing; not calling upstream");
            return Err(RemediationError::MissingKey {
                event_id: event.id.clone(),
                decision,
            });
        };
        if !event.needs_approval() {
            return Err(RemediationError::NotPending {
                event_id: event.id.clone(),
                state: event.remediation_state().as_str(),
            });
        }

        let _guard = self.begin(&event.id)?;

        let result = match decision {
            Decision::Approve => self.api.approve(key).await,
            Decision::Reject => self.api.reject(key).await,
        };

        match result {
            Ok(receipt) => {
                info!(event_id = %event.id, %decision, "remediation decision accepted");
                Ok(Decided {
                    event: transition(event, decision, OffsetDateTime::now_utc()),
                    receipt,
                })
            }
            Err(source) => {
                warn!(event_id = %event.id, %decision, error = %source, "remediation decision failed");
                Err(RemediationError::Api {
                    event_id: event.id.clone(),
                    decision,
                    source,
                })
            }
        }
    }

    fn begin(&self, event_id: &str) -> Result<InFlightGuard, RemediationError> {
        let mut set = self.lock_in_flight();
        if !set.insert(event_id.to_string()) {
            return Err(RemediationError::InFlight {
                event_id: event_id.to_string(),
            });
        }
        Ok(InFlightGuard {
            set: Arc::clone(&self.in_flight),
            event_id: event_id.to_string(),
        })
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

struct InFlightGuard {
    set: Arc<Mutex<HashSet<String>>>,
    event_id: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut set = self
            .set
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        set.remove(&self.event_id);
    }
}
