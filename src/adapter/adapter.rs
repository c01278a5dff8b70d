//! CPO adapter facade
//!
//! Owns all pending-change queues, flush timers, the partner client
//! handle, the event bus and the session store reference. The inbound
//! entry points (`on_station_added`, `on_station_updated`,
//! `on_station_removed`, `on_evse_status_changed`,
//! `on_charge_session_completed`) are the only operations that mutate
//! queues; everything else is drain-and-upload plumbing.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};

use crate::domain::{
    AuthToken, ChargeDetailRecord, ChargingStation, StationId, StatusUpdate,
};
use crate::notifications::{
    AuthorizationDecidedEvent, Event, SharedEventBus, UploadCompletedEvent, UploadStartedEvent,
};
use crate::partner::PartnerApi;
use crate::session::SessionStore;
use crate::shared::ShutdownSignal;

use super::authorize::AuthorizationGate;
use super::batch::{BatchUploader, DEFAULT_CONCURRENCY};
use super::cdr::{CdrFilter, CdrForwarder};
use super::flush::{FlushOutcome, FlushScheduler, FlushTimerState};
use super::queue::{ChangeQueue, StationChangeKind};
use super::result::{
    AuthorizeResult, EnqueueOutcome, OperationKind, OperationResult, OperationResultBuilder,
    ResultKind, SendResult,
};

/// Adapter configuration consumed by the core.
///
/// Capability flags short-circuit the corresponding public operation to
/// an AdminDown outcome before any queueing or network activity.
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    /// Identifier scoping session uploads to an upstream tenant
    pub partner_identifier: Option<String>,
    pub data_flush_interval: Duration,
    pub status_flush_interval: Duration,
    pub cdr_flush_interval: Duration,
    /// Concurrent uploads per batch
    pub max_concurrent_uploads: usize,
    /// Bound on waiting for a queue lock
    pub lock_timeout: Duration,
    pub push_data_enabled: bool,
    pub push_status_enabled: bool,
    pub authentication_enabled: bool,
    pub send_cdrs_enabled: bool,
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            partner_identifier: None,
            data_flush_interval: Duration::from_secs(60),
            status_flush_interval: Duration::from_secs(15),
            cdr_flush_interval: Duration::from_secs(30),
            max_concurrent_uploads: DEFAULT_CONCURRENCY,
            lock_timeout: Duration::from_secs(5),
            push_data_enabled: true,
            push_status_enabled: true,
            authentication_enabled: true,
            send_cdrs_enabled: true,
        }
    }
}

/// Aggregate of one station-data flush cycle (adds, updates, removes)
#[derive(Debug)]
pub struct StationDataFlush {
    pub adds: OperationResult<ChargingStation>,
    pub updates: OperationResult<ChargingStation>,
    pub removes: OperationResult<ChargingStation>,
}

impl StationDataFlush {
    fn uniform(make: fn(OperationKind) -> OperationResult<ChargingStation>) -> Self {
        Self {
            adds: make(OperationKind::AddStations),
            updates: make(OperationKind::UpdateStations),
            removes: make(OperationKind::RemoveStations),
        }
    }

    pub fn admin_down() -> Self {
        Self::uniform(OperationResult::admin_down)
    }

    pub fn no_operation() -> Self {
        Self::uniform(OperationResult::no_operation)
    }

    pub fn lock_timeout() -> Self {
        Self::uniform(OperationResult::lock_timeout)
    }

    /// Items that went through the uploader across all three kinds
    pub fn attempted(&self) -> usize {
        self.adds.attempted() + self.updates.attempted() + self.removes.attempted()
    }

    pub fn lock_timed_out(&self) -> bool {
        self.adds.outcome == ResultKind::LockTimeout
    }
}

/// Outcome of an immediate charge-record forward
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CdrForwardOutcome {
    Forwarded(SendResult),
    AdminDown,
}

/// The CPO-side protocol adapter.
///
/// Construct with [`CpoAdapter::new`], wrap in an `Arc`, then call
/// [`start`](Self::start) to spawn the flush timers. All public
/// operations are safe to call concurrently.
pub struct CpoAdapter {
    config: AdapterConfig,
    queue: Arc<ChangeQueue>,
    uploader: Arc<BatchUploader>,
    gate: AuthorizationGate,
    forwarder: CdrForwarder,
    events: SharedEventBus,
    data_timer: Arc<FlushScheduler>,
    status_timer: Arc<FlushScheduler>,
    cdr_timer: Arc<FlushScheduler>,
    shutdown: ShutdownSignal,
}

impl CpoAdapter {
    pub fn new(
        api: Arc<dyn PartnerApi>,
        store: Arc<dyn SessionStore>,
        events: SharedEventBus,
        config: AdapterConfig,
        shutdown: ShutdownSignal,
    ) -> Self {
        let queue = Arc::new(ChangeQueue::new(config.lock_timeout));
        let uploader = Arc::new(BatchUploader::new(
            api.clone(),
            config.max_concurrent_uploads,
            config.partner_identifier.clone(),
            shutdown.clone(),
        ));
        let gate = AuthorizationGate::new(api, config.authentication_enabled);
        let forwarder = CdrForwarder::new(uploader.clone(), store, events.clone());

        Self {
            data_timer: FlushScheduler::new("station-data", config.data_flush_interval),
            status_timer: FlushScheduler::new("status", config.status_flush_interval),
            cdr_timer: FlushScheduler::new("cdr", config.cdr_flush_interval),
            queue,
            uploader,
            gate,
            forwarder,
            events,
            shutdown,
            config,
        }
    }

    /// Install a charge-record filter deciding which records are
    /// forwarded at all.
    pub fn with_cdr_filter(mut self, filter: CdrFilter) -> Self {
        self.forwarder.set_filter(filter);
        self
    }

    /// Spawn the three flush-timer tasks. Each queue kind runs its own
    /// timer; a flush of one kind never blocks a flush of another.
    pub fn start(self: Arc<Self>) {
        let adapter = self.clone();
        tokio::spawn(self.data_timer.clone().run(self.shutdown.clone(), move || {
            let adapter = adapter.clone();
            async move {
                let flush = adapter.flush_station_data().await;
                FlushOutcome {
                    drained: flush.attempted(),
                    rearm: flush.lock_timed_out(),
                }
            }
        }));

        let adapter = self.clone();
        tokio::spawn(
            self.status_timer
                .clone()
                .run(self.shutdown.clone(), move || {
                    let adapter = adapter.clone();
                    async move {
                        let result = adapter.flush_status_updates().await;
                        FlushOutcome {
                            drained: result.attempted(),
                            rearm: result.outcome == ResultKind::LockTimeout,
                        }
                    }
                }),
        );

        let adapter = self.clone();
        tokio::spawn(self.cdr_timer.clone().run(self.shutdown.clone(), move || {
            let adapter = adapter.clone();
            async move {
                let result = adapter.flush_cdr_records().await;
                FlushOutcome {
                    drained: result.attempted(),
                    rearm: result.outcome == ResultKind::LockTimeout,
                }
            }
        }));

        info!(
            data_interval_secs = self.config.data_flush_interval.as_secs(),
            status_interval_secs = self.config.status_flush_interval.as_secs(),
            cdr_interval_secs = self.config.cdr_flush_interval.as_secs(),
            "CPO adapter started"
        );
    }

    // ── Inbound entry points ───────────────────────────────────

    /// A station appeared in the roaming network.
    pub async fn on_station_added(&self, station: ChargingStation) -> EnqueueOutcome {
        self.enqueue_station(station, StationChangeKind::Add).await
    }

    /// A station's descriptive data changed.
    pub async fn on_station_updated(&self, station: ChargingStation) -> EnqueueOutcome {
        self.enqueue_station(station, StationChangeKind::Update)
            .await
    }

    /// A station disappeared from the roaming network.
    pub async fn on_station_removed(&self, station: ChargingStation) -> EnqueueOutcome {
        self.enqueue_station(station, StationChangeKind::Remove)
            .await
    }

    async fn enqueue_station(
        &self,
        station: ChargingStation,
        kind: StationChangeKind,
    ) -> EnqueueOutcome {
        if !self.config.push_data_enabled {
            return EnqueueOutcome::AdminDown;
        }

        match self.queue.enqueue_station_change(station, kind).await {
            Ok(receipt) => {
                if receipt.arm_timer {
                    self.data_timer.arm();
                }
                if receipt.inserted {
                    EnqueueOutcome::Enqueued
                } else {
                    EnqueueOutcome::AlreadyPending
                }
            }
            Err(err) => {
                warn!(error = %err, "Station change not enqueued");
                EnqueueOutcome::LockTimeout
            }
        }
    }

    /// An EVSE changed status.
    pub async fn on_evse_status_changed(&self, update: StatusUpdate) -> EnqueueOutcome {
        if !self.config.push_status_enabled {
            return EnqueueOutcome::AdminDown;
        }

        match self.queue.enqueue_status_update(update).await {
            Ok(receipt) => {
                if receipt.arm_timer {
                    self.status_timer.arm();
                }
                if receipt.delayed {
                    EnqueueOutcome::Delayed
                } else {
                    EnqueueOutcome::Enqueued
                }
            }
            Err(err) => {
                warn!(error = %err, "Status update not enqueued");
                EnqueueOutcome::LockTimeout
            }
        }
    }

    /// A charging session completed; queue its record for forwarding.
    pub async fn on_charge_session_completed(&self, record: ChargeDetailRecord) -> EnqueueOutcome {
        if !self.config.send_cdrs_enabled {
            return EnqueueOutcome::AdminDown;
        }

        match self.queue.enqueue_cdr(record).await {
            Ok(()) => {
                self.cdr_timer.arm();
                EnqueueOutcome::Enqueued
            }
            Err(err) => {
                warn!(error = %err, "Charge record not enqueued");
                EnqueueOutcome::LockTimeout
            }
        }
    }

    /// Forward one charge record immediately, bypassing the queue.
    pub async fn forward_cdr_now(&self, record: &ChargeDetailRecord) -> CdrForwardOutcome {
        if !self.config.send_cdrs_enabled {
            return CdrForwardOutcome::AdminDown;
        }
        CdrForwardOutcome::Forwarded(self.forwarder.forward(record).await)
    }

    // ── Authorization ──────────────────────────────────────────

    pub async fn authorize_start(&self, token: &AuthToken) -> AuthorizeResult {
        let outcome = self.gate.authorize_start(token).await;
        self.publish_authorization(token, "start", outcome);
        outcome
    }

    pub async fn authorize_stop(&self, token: &AuthToken) -> AuthorizeResult {
        let outcome = self.gate.authorize_stop(token).await;
        self.publish_authorization(token, "stop", outcome);
        outcome
    }

    // ── Flush cycles ───────────────────────────────────────────

    /// Drain and upload pending station changes.
    ///
    /// The empty-drain skip guard ensures an idle queue causes no
    /// network activity.
    pub async fn flush_station_data(&self) -> StationDataFlush {
        if !self.config.push_data_enabled {
            return StationDataFlush::admin_down();
        }

        let snapshot = match self.queue.drain_station_changes().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, "Station flush could not take the queue lock");
                return StationDataFlush::lock_timeout();
            }
        };

        if snapshot.is_empty() {
            return StationDataFlush::no_operation();
        }

        self.publish_started("station-data", snapshot.len());

        let adds = self
            .uploader
            .upload_stations(snapshot.adds, OperationKind::AddStations)
            .await;
        let updates = self
            .uploader
            .upload_stations(snapshot.updates, OperationKind::UpdateStations)
            .await;
        let removes = self
            .uploader
            .upload_stations(snapshot.removes, OperationKind::RemoveStations)
            .await;

        let uploaded: Vec<StationId> = adds
            .succeeded
            .iter()
            .chain(updates.succeeded.iter())
            .map(|station| station.id.clone())
            .collect();
        if !uploaded.is_empty() {
            match self.queue.mark_stations_uploaded(&uploaded).await {
                // Delayed status updates became eligible
                Ok(true) => self.status_timer.arm(),
                Ok(false) => {}
                Err(err) => warn!(error = %err, "Could not record uploaded stations"),
            }
        }

        let removed: Vec<StationId> = removes
            .succeeded
            .iter()
            .map(|station| station.id.clone())
            .collect();
        if !removed.is_empty() {
            if let Err(err) = self.queue.mark_stations_removed(&removed).await {
                warn!(error = %err, "Could not record removed stations");
            }
        }

        for result in [&adds, &updates, &removes] {
            self.publish_completed("station-data", result);
        }

        StationDataFlush {
            adds,
            updates,
            removes,
        }
    }

    /// Drain and upload pending EVSE status updates.
    pub async fn flush_status_updates(&self) -> OperationResult<StatusUpdate> {
        if !self.config.push_status_enabled {
            return OperationResult::admin_down(OperationKind::PushStatus);
        }

        let updates = match self.queue.drain_status_updates().await {
            Ok(updates) => updates,
            Err(err) => {
                warn!(error = %err, "Status flush could not take the queue lock");
                return OperationResult::lock_timeout(OperationKind::PushStatus);
            }
        };

        if updates.is_empty() {
            return OperationResult::no_operation(OperationKind::PushStatus);
        }

        self.publish_started("status", updates.len());
        let result = self.uploader.upload_status_updates(updates).await;
        self.publish_completed("status", &result);
        result
    }

    /// Drain and forward pending charge detail records.
    ///
    /// Records are removed from the queue when forwarding is attempted,
    /// not when it succeeds; failures are surfaced on the result and the
    /// session store, never retried automatically.
    pub async fn flush_cdr_records(&self) -> OperationResult<ChargeDetailRecord> {
        if !self.config.send_cdrs_enabled {
            return OperationResult::admin_down(OperationKind::ForwardRecords);
        }

        let records = match self.queue.drain_cdr_records().await {
            Ok(records) => records,
            Err(err) => {
                warn!(error = %err, "Record flush could not take the queue lock");
                return OperationResult::lock_timeout(OperationKind::ForwardRecords);
            }
        };

        if records.is_empty() {
            return OperationResult::no_operation(OperationKind::ForwardRecords);
        }

        self.publish_started("cdr", records.len());

        let mut builder = OperationResultBuilder::begin(OperationKind::ForwardRecords);
        for record in records {
            match self.forwarder.forward(&record).await {
                SendResult::Success => builder.push_success(record),
                SendResult::Filtered => {}
                SendResult::CouldNotConvertFormat(reason) => {
                    builder.push_warning(format!("session {} skipped: {reason}", record.session_id));
                }
                SendResult::Error(reason) => builder.push_rejected(record, reason),
            }
        }

        let result = builder.freeze();
        self.publish_completed("cdr", &result);
        result
    }

    /// Flush all three queue kinds now, concurrently.
    pub async fn flush_now(
        &self,
    ) -> (
        StationDataFlush,
        OperationResult<StatusUpdate>,
        OperationResult<ChargeDetailRecord>,
    ) {
        tokio::join!(
            self.flush_station_data(),
            self.flush_status_updates(),
            self.flush_cdr_records()
        )
    }

    /// Current (data, status, cdr) flush timer states.
    pub fn timer_states(&self) -> (FlushTimerState, FlushTimerState, FlushTimerState) {
        (
            self.data_timer.state(),
            self.status_timer.state(),
            self.cdr_timer.state(),
        )
    }

    pub(crate) fn change_queue(&self) -> &ChangeQueue {
        &self.queue
    }

    // ── Observer plumbing ──────────────────────────────────────

    fn publish_started(&self, queue: &str, items: usize) {
        self.events.publish(Event::UploadStarted(UploadStartedEvent {
            queue: queue.to_string(),
            items,
            timestamp: Utc::now(),
        }));
    }

    fn publish_completed<T>(&self, queue: &str, result: &OperationResult<T>) {
        if result.attempted() == 0 && result.warnings.is_empty() {
            return;
        }
        self.events
            .publish(Event::UploadCompleted(UploadCompletedEvent {
                queue: queue.to_string(),
                operation: result.kind.to_string(),
                succeeded: result.succeeded.len(),
                rejected: result.rejected.len(),
                warnings: result.warnings.len(),
                duration_ms: result.duration.as_millis() as u64,
                timestamp: Utc::now(),
            }));
    }

    fn publish_authorization(&self, token: &AuthToken, phase: &str, outcome: AuthorizeResult) {
        let label = match outcome {
            AuthorizeResult::Authorized => "authorized",
            AuthorizeResult::NotAuthorized => "not_authorized",
            AuthorizeResult::AdminDown => "admin_down",
        };
        self.events
            .publish(Event::AuthorizationDecided(AuthorizationDecidedEvent {
                token: token.to_string(),
                phase: phase.to_string(),
                outcome: label.to_string(),
                timestamp: Utc::now(),
            }));
    }
}
