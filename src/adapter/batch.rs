//! Bounded-concurrency batch uploads
//!
//! Maps drained domain objects to wire DTOs (per-item mapping failures are
//! collected as warnings, never abort the batch), fans the uploads out
//! under a counting semaphore, and aggregates per-item outcomes into one
//! [`OperationResult`]. Per-item HTTP failures reject that item only;
//! sibling uploads are unaffected.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::domain::{ChargeDetailRecord, ChargingStation, EvseId, PartnerError, StatusUpdate};
use crate::partner::dto::{ConnectorStatusDto, SessionDto, StationDto};
use crate::partner::{PartnerApi, PartnerResponse};
use crate::shared::ShutdownSignal;

use super::result::{OperationKind, OperationResult, OperationResultBuilder, SendResult};

/// Default number of concurrent uploads per batch
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Uploads drained queue snapshots to the partner.
pub struct BatchUploader {
    api: Arc<dyn PartnerApi>,
    concurrency: usize,
    partner_identifier: Option<String>,
    shutdown: ShutdownSignal,
}

impl BatchUploader {
    pub fn new(
        api: Arc<dyn PartnerApi>,
        concurrency: usize,
        partner_identifier: Option<String>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            api,
            concurrency: concurrency.max(1),
            partner_identifier,
            shutdown,
        }
    }

    /// Upload a batch of station descriptions.
    ///
    /// `kind` selects the wire flavour: removals are posted with the
    /// deleted flag set, adds and updates as plain descriptions.
    pub async fn upload_stations(
        &self,
        stations: Vec<ChargingStation>,
        kind: OperationKind,
    ) -> OperationResult<ChargingStation> {
        let mut builder = OperationResultBuilder::begin(kind);
        let deleted = kind == OperationKind::RemoveStations;

        let mut items: Vec<(ChargingStation, UploadFuture)> = Vec::new();
        for station in stations {
            match StationDto::from_domain(&station, deleted) {
                Ok(dto) => {
                    let api = self.api.clone();
                    items.push((station, async move { api.post_station(&dto).await }.boxed()));
                }
                Err(err) => {
                    warn!(station = %station.id, error = %err, "Station skipped: mapping failed");
                    builder.push_warning(format!("station {} skipped: {err}", station.id));
                }
            }
        }

        self.fan_out(&mut builder, items).await;
        let result = builder.freeze();
        record_batch_metrics(&result);
        result
    }

    /// Upload a batch of EVSE status updates.
    ///
    /// Updates are coalesced to the most recent change per EVSE first:
    /// within one flush window only the highest timestamp wins, the rest
    /// are dropped silently.
    pub async fn upload_status_updates(
        &self,
        updates: Vec<StatusUpdate>,
    ) -> OperationResult<StatusUpdate> {
        let mut builder = OperationResultBuilder::begin(OperationKind::PushStatus);

        let total = updates.len();
        let mut latest: HashMap<EvseId, StatusUpdate> = HashMap::new();
        for update in updates {
            match latest.entry(update.evse_id.clone()) {
                std::collections::hash_map::Entry::Occupied(mut entry) => {
                    if update.timestamp >= entry.get().timestamp {
                        entry.insert(update);
                    }
                }
                std::collections::hash_map::Entry::Vacant(entry) => {
                    entry.insert(update);
                }
            }
        }

        let coalesced = total - latest.len();
        if coalesced > 0 {
            debug!(coalesced, "Coalesced duplicate status updates");
        }

        let items: Vec<(StatusUpdate, UploadFuture)> = latest
            .into_values()
            .map(|update| {
                let dto = ConnectorStatusDto::from_update(&update);
                let api = self.api.clone();
                let fut = async move { api.post_connector_status(&dto).await }.boxed();
                (update, fut)
            })
            .collect();

        self.fan_out(&mut builder, items).await;
        let result = builder.freeze();
        record_batch_metrics(&result);
        result
    }

    /// Upload a single charge detail record.
    ///
    /// Shared by the batch-flush path and the send-immediately path.
    pub async fn upload_cdr(&self, record: &ChargeDetailRecord) -> SendResult {
        let dto = match SessionDto::from_record(record, self.partner_identifier.clone()) {
            Ok(dto) => dto,
            Err(err) => {
                warn!(session = %record.session_id, error = %err, "Charge record not convertible");
                return SendResult::CouldNotConvertFormat(err.to_string());
            }
        };

        let outcome = match self.api.post_session(&dto).await {
            Ok(response) if response.is_success() => SendResult::Success,
            Ok(response) => SendResult::Error(format!(
                "partner code {}: {}",
                response.code, response.message
            )),
            Err(err) => SendResult::Error(err.to_string()),
        };

        metrics::counter!(
            "bridge_cdr_forwards_total",
            "outcome" => if outcome.is_success() { "success" } else { "error" }
        )
        .increment(1);

        outcome
    }

    /// Run prepared uploads concurrently, bounded by the semaphore.
    ///
    /// Aggregation is set-based: completion order decides list order. On
    /// shutdown, outstanding requests are aborted; completed items keep
    /// their results and unfinished ones are recorded as rejected.
    async fn fan_out<T: Send + 'static>(
        &self,
        builder: &mut OperationResultBuilder<T>,
        items: Vec<(T, UploadFuture)>,
    ) {
        if items.is_empty() {
            return;
        }

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set: JoinSet<(usize, Result<PartnerResponse, PartnerError>)> = JoinSet::new();
        let mut pending: HashMap<usize, T> = HashMap::new();
        let mut cancelled = false;

        // Register every item up front so nothing is lost from the
        // aggregate if shutdown interrupts submission.
        let mut uploads = Vec::with_capacity(items.len());
        for (idx, (item, fut)) in items.into_iter().enumerate() {
            pending.insert(idx, item);
            uploads.push((idx, fut));
        }

        for (idx, fut) in uploads {
            let permit = tokio::select! {
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
                _ = self.shutdown.wait() => {
                    cancelled = true;
                    break;
                }
            };

            join_set.spawn(async move {
                let _permit = permit;
                (idx, fut.await)
            });
        }

        if cancelled {
            join_set.abort_all();
        }

        loop {
            tokio::select! {
                next = join_set.join_next() => match next {
                    None => break,
                    Some(Ok((idx, outcome))) => {
                        if let Some(item) = pending.remove(&idx) {
                            match outcome {
                                Ok(response) if response.is_success() => builder.push_success(item),
                                Ok(response) => builder.push_rejected(
                                    item,
                                    format!("partner code {}: {}", response.code, response.message),
                                ),
                                Err(err) => builder.push_rejected(item, err.to_string()),
                            }
                        }
                    }
                    Some(Err(join_err)) => {
                        if !join_err.is_cancelled() {
                            builder.push_warning(format!("upload task failed: {join_err}"));
                        }
                    }
                },
                _ = self.shutdown.wait(), if !cancelled => {
                    cancelled = true;
                    join_set.abort_all();
                }
            }
        }

        // Items whose upload never completed (cancelled or never spawned)
        for (_, item) in pending {
            builder.push_rejected(item, "upload aborted before completion");
        }
    }
}

type UploadFuture = BoxFuture<'static, Result<PartnerResponse, PartnerError>>;

fn record_batch_metrics<T>(result: &OperationResult<T>) {
    let kind = result.kind.to_string();
    metrics::counter!("bridge_upload_items_total", "kind" => kind.clone(), "outcome" => "succeeded")
        .increment(result.succeeded.len() as u64);
    metrics::counter!("bridge_upload_items_total", "kind" => kind.clone(), "outcome" => "rejected")
        .increment(result.rejected.len() as u64);
    metrics::histogram!("bridge_batch_duration_seconds", "kind" => kind)
        .record(result.duration.as_secs_f64());
}
