//! Session store
//!
//! Tracks the forwarding outcome of completed charging sessions. The
//! adapter reports every forwarding attempt here, successful or not, so
//! operators can see which records reached the partner.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::adapter::result::SendResult;

/// Forwarding state of one charging session
#[derive(Debug, Clone)]
pub struct ForwardingRecord {
    pub session_id: Uuid,
    pub outcome: SendResult,
    /// Number of forwarding attempts made for this session
    pub attempts: u32,
    pub last_attempt: DateTime<Utc>,
}

/// Store for charging-session forwarding state.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Record the outcome of a forwarding attempt.
    async fn record_forwarding_outcome(&self, session_id: Uuid, outcome: SendResult);

    /// Look up the forwarding state of a session.
    async fn forwarding_record(&self, session_id: &Uuid) -> Option<ForwardingRecord>;
}

/// Thread-safe in-memory session store.
#[derive(Default)]
pub struct InMemorySessionStore {
    records: DashMap<Uuid, ForwardingRecord>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn record_forwarding_outcome(&self, session_id: Uuid, outcome: SendResult) {
        self.records
            .entry(session_id)
            .and_modify(|record| {
                record.outcome = outcome.clone();
                record.attempts += 1;
                record.last_attempt = Utc::now();
            })
            .or_insert_with(|| ForwardingRecord {
                session_id,
                outcome,
                attempts: 1,
                last_attempt: Utc::now(),
            });
    }

    async fn forwarding_record(&self, session_id: &Uuid) -> Option<ForwardingRecord> {
        self.records.get(session_id).map(|r| r.clone())
    }
}
