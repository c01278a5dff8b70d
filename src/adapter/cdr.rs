//! Charge detail record forwarding
//!
//! Single-record flush path shared by the batch queue and the
//! send-immediately mode. Every attempt, whatever its outcome, is
//! recorded in the session store and announced on the event bus; a
//! failed forward is not retried automatically (a later flush cycle or
//! the roaming network decides about retries).

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::ChargeDetailRecord;
use crate::notifications::{CdrForwardedEvent, Event, SharedEventBus};
use crate::session::SessionStore;

use super::batch::BatchUploader;
use super::result::SendResult;

/// Decides whether a record should be forwarded at all.
pub type CdrFilter = Box<dyn Fn(&ChargeDetailRecord) -> bool + Send + Sync>;

pub struct CdrForwarder {
    uploader: Arc<BatchUploader>,
    store: Arc<dyn SessionStore>,
    events: SharedEventBus,
    filter: Option<CdrFilter>,
}

impl CdrForwarder {
    pub fn new(
        uploader: Arc<BatchUploader>,
        store: Arc<dyn SessionStore>,
        events: SharedEventBus,
    ) -> Self {
        Self {
            uploader,
            store,
            events,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: CdrFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn set_filter(&mut self, filter: CdrFilter) {
        self.filter = Some(filter);
    }

    /// Forward one record and report the outcome to the session store.
    pub async fn forward(&self, record: &ChargeDetailRecord) -> SendResult {
        let outcome = match &self.filter {
            Some(filter) if !filter(record) => SendResult::Filtered,
            _ => self.uploader.upload_cdr(record).await,
        };

        match &outcome {
            SendResult::Success => {
                info!(session = %record.session_id, "Charge record forwarded");
            }
            SendResult::Filtered => {
                info!(session = %record.session_id, "Charge record filtered, not forwarded");
            }
            SendResult::Error(reason) | SendResult::CouldNotConvertFormat(reason) => {
                warn!(session = %record.session_id, reason, "Charge record forwarding failed");
            }
        }

        self.store
            .record_forwarding_outcome(record.session_id, outcome.clone())
            .await;

        self.events.publish(Event::CdrForwarded(CdrForwardedEvent {
            session_id: record.session_id,
            outcome: outcome_label(&outcome).to_string(),
            detail: match &outcome {
                SendResult::Error(reason) | SendResult::CouldNotConvertFormat(reason) => {
                    Some(reason.clone())
                }
                _ => None,
            },
            timestamp: Utc::now(),
        }));

        outcome
    }
}

fn outcome_label(outcome: &SendResult) -> &'static str {
    match outcome {
        SendResult::Success => "success",
        SendResult::Error(_) => "error",
        SendResult::CouldNotConvertFormat(_) => "could_not_convert",
        SendResult::Filtered => "filtered",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::batch::DEFAULT_CONCURRENCY;
    use crate::adapter::testing::ScriptedPartner;
    use crate::domain::AuthToken;
    use crate::notifications::create_event_bus;
    use crate::session::InMemorySessionStore;
    use crate::shared::ShutdownSignal;

    fn record() -> ChargeDetailRecord {
        let mut record = ChargeDetailRecord::new(
            "S1",
            "S1*E1",
            AuthToken::new("04a2b3c4d5e6f7"),
            Utc::now(),
        );
        record.session_end = Some(Utc::now());
        record
    }

    fn forwarder(api: Arc<ScriptedPartner>) -> (CdrForwarder, Arc<InMemorySessionStore>) {
        let store = Arc::new(InMemorySessionStore::new());
        let uploader = Arc::new(BatchUploader::new(
            api,
            DEFAULT_CONCURRENCY,
            None,
            ShutdownSignal::new(),
        ));
        (
            CdrForwarder::new(uploader, store.clone(), create_event_bus()),
            store,
        )
    }

    #[tokio::test]
    async fn success_recorded_in_store() {
        let api = Arc::new(ScriptedPartner::new());
        let (forwarder, store) = forwarder(api.clone());
        let record = record();

        let outcome = forwarder.forward(&record).await;

        assert_eq!(outcome, SendResult::Success);
        assert_eq!(api.session_post_count(), 1);
        let state = store.forwarding_record(&record.session_id).await.unwrap();
        assert_eq!(state.outcome, SendResult::Success);
    }

    #[tokio::test]
    async fn failure_recorded_but_not_retried() {
        let api = Arc::new(ScriptedPartner::new());
        api.fail_sessions(true);
        let (forwarder, store) = forwarder(api.clone());
        let record = record();

        let outcome = forwarder.forward(&record).await;

        assert!(matches!(outcome, SendResult::Error(_)));
        assert_eq!(api.total_calls(), 1, "single attempt, no retry");
        let state = store.forwarding_record(&record.session_id).await.unwrap();
        assert!(matches!(state.outcome, SendResult::Error(_)));
    }

    #[tokio::test]
    async fn filtered_record_skips_network() {
        let api = Arc::new(ScriptedPartner::new());
        let (forwarder, store) = forwarder(api.clone());
        let forwarder = forwarder.with_filter(Box::new(|_| false));
        let record = record();

        let outcome = forwarder.forward(&record).await;

        assert_eq!(outcome, SendResult::Filtered);
        assert_eq!(api.total_calls(), 0);
        let state = store.forwarding_record(&record.session_id).await.unwrap();
        assert_eq!(state.outcome, SendResult::Filtered);
    }
}
