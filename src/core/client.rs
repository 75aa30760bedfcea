use serde::{Deserialize, Serialize};

use crate::core::{SecurityEvent, Severity, default_client_name};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCount {
    pub critical: u64,
    pub high: u64,
    pub medium: u64,
    pub low: u64,
    pub total: u64,
}

impl EventCount {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
        self.total += 1;
    }

    pub fn get(&self, severity: Severity) -> u64 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }
}

/// One tenant account and its event buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    pub name: String,
    pub event_count: EventCount,
}

/// Rebuilds the per-account aggregates from the full event set. Accounts
/// keep the order in which they first appear.
pub fn aggregate_clients(events: &[SecurityEvent]) -> Vec<Client> {
    let mut clients: Vec<Client> = Vec::new();
    for event in events {
        let idx = match clients.iter().position(|c| c.id == event.client_id) {
            Some(idx) => idx,
            None => {
                clients.push(Client {
                    id: event.client_id.clone(),
                    name: default_client_name(&event.client_id),
                    event_count: EventCount::default(),
                });
                clients.len() - 1
            }
        };
        clients[idx].event_count.record(event.severity);
    }
    clients
}
