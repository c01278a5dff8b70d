//! Pending-change queues
//!
//! All mutable adapter state lives here. The three queue kinds (station
//! data, status updates, charge detail records) sit behind independent
//! async locks so a flush of one kind never blocks a flush of another.
//! Station changes are sets keyed by station identity (enqueueing the same
//! station twice for the same kind is a no-op); status updates are split
//! into a fast queue and a delayed queue so that a station's descriptive
//! upload always happens before its first status reaches the partner.
//!
//! Locks are never held across network I/O: drains swap the collections
//! out and release before the uploader runs.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{
    BridgeError, BridgeResult, ChargeDetailRecord, ChargingStation, StationId, StatusUpdate,
};

/// Kind of pending station change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationChangeKind {
    Add,
    Update,
    Remove,
}

impl std::fmt::Display for StationChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Add => write!(f, "add"),
            Self::Update => write!(f, "update"),
            Self::Remove => write!(f, "remove"),
        }
    }
}

/// Receipt for a station-change enqueue
#[derive(Debug, Clone, Copy)]
pub struct EnqueueReceipt {
    /// False when an identical change was already pending
    pub inserted: bool,
    /// True when the data-flush timer should be (re)armed
    pub arm_timer: bool,
}

/// Receipt for a status-update enqueue
#[derive(Debug, Clone, Copy)]
pub struct StatusEnqueueReceipt {
    /// True when the update was parked in the delayed queue
    pub delayed: bool,
    /// True when the fast-status timer should be (re)armed
    pub arm_timer: bool,
}

/// Drained station changes; the caller owns the snapshot exclusively.
#[derive(Debug, Default)]
pub struct StationChangeSnapshot {
    pub adds: Vec<ChargingStation>,
    pub updates: Vec<ChargingStation>,
    pub removes: Vec<ChargingStation>,
}

impl StationChangeSnapshot {
    pub fn is_empty(&self) -> bool {
        self.adds.is_empty() && self.updates.is_empty() && self.removes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.adds.len() + self.updates.len() + self.removes.len()
    }
}

#[derive(Default)]
struct DataInner {
    adds: HashMap<StationId, ChargingStation>,
    updates: HashMap<StationId, ChargingStation>,
    removes: HashMap<StationId, ChargingStation>,
}

#[derive(Default)]
struct StatusInner {
    fast: Vec<StatusUpdate>,
    delayed: Vec<StatusUpdate>,
    /// Stations with an Add that has not completed its upload yet.
    /// Kept here, shadowing the data queue, so status routing never has
    /// to take the data lock.
    pending_adds: HashSet<StationId>,
    /// Stations whose descriptive record has reached the partner
    uploaded: HashSet<StationId>,
}

/// In-memory pending-change queues, internally synchronized.
///
/// Every public operation acquires its lock with a bounded wait; exceeding
/// the bound yields [`BridgeError::LockTimeout`] instead of blocking the
/// caller indefinitely.
pub struct ChangeQueue {
    data: Mutex<DataInner>,
    status: Mutex<StatusInner>,
    cdrs: Mutex<Vec<ChargeDetailRecord>>,
    lock_timeout: Duration,
}

impl ChangeQueue {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            data: Mutex::new(DataInner::default()),
            status: Mutex::new(StatusInner::default()),
            cdrs: Mutex::new(Vec::new()),
            lock_timeout,
        }
    }

    async fn lock<'a, T>(
        &self,
        mutex: &'a Mutex<T>,
        queue: &'static str,
    ) -> BridgeResult<tokio::sync::MutexGuard<'a, T>> {
        tokio::time::timeout(self.lock_timeout, mutex.lock())
            .await
            .map_err(|_| BridgeError::LockTimeout { queue })
    }

    /// Enqueue a station add/update/remove. Idempotent per identity+kind.
    pub async fn enqueue_station_change(
        &self,
        station: ChargingStation,
        kind: StationChangeKind,
    ) -> BridgeResult<EnqueueReceipt> {
        let id = station.id.clone();
        let inserted = {
            let mut data = self.lock(&self.data, "station-data").await?;
            let set = match kind {
                StationChangeKind::Add => &mut data.adds,
                StationChangeKind::Update => &mut data.updates,
                StationChangeKind::Remove => &mut data.removes,
            };

            match set.entry(id.clone()) {
                std::collections::hash_map::Entry::Vacant(entry) => {
                    entry.insert(station);
                    true
                }
                std::collections::hash_map::Entry::Occupied(_) => false,
            }
        };

        // Shadow the pending Add on the status side so status routing can
        // check it without touching the data lock.
        if inserted && kind == StationChangeKind::Add {
            let mut status = self.lock(&self.status, "status").await?;
            status.pending_adds.insert(id.clone());
        }

        if inserted {
            debug!(station = %id, kind = %kind, "Station change enqueued");
        } else {
            debug!(station = %id, kind = %kind, "Station change already pending");
        }

        Ok(EnqueueReceipt {
            inserted,
            arm_timer: inserted,
        })
    }

    /// Enqueue an EVSE status update.
    ///
    /// Updates for stations with a pending Add are parked in the delayed
    /// queue: their station description must reach the partner first.
    pub async fn enqueue_status_update(
        &self,
        update: StatusUpdate,
    ) -> BridgeResult<StatusEnqueueReceipt> {
        let mut status = self.lock(&self.status, "status").await?;

        let delayed = status.pending_adds.contains(&update.station_id);
        if delayed {
            debug!(
                station = %update.station_id,
                evse = %update.evse_id,
                "Status update delayed until station upload"
            );
            status.delayed.push(update);
        } else {
            status.fast.push(update);
        }

        Ok(StatusEnqueueReceipt {
            delayed,
            arm_timer: !delayed,
        })
    }

    /// Enqueue a charge detail record for batch forwarding.
    pub async fn enqueue_cdr(&self, record: ChargeDetailRecord) -> BridgeResult<()> {
        let mut cdrs = self.lock(&self.cdrs, "cdr").await?;
        cdrs.push(record);
        Ok(())
    }

    /// Atomically swap out all pending station changes.
    pub async fn drain_station_changes(&self) -> BridgeResult<StationChangeSnapshot> {
        let mut data = self.lock(&self.data, "station-data").await?;

        Ok(StationChangeSnapshot {
            adds: std::mem::take(&mut data.adds).into_values().collect(),
            updates: std::mem::take(&mut data.updates).into_values().collect(),
            removes: std::mem::take(&mut data.removes).into_values().collect(),
        })
    }

    /// Atomically swap out the sendable status updates.
    ///
    /// Re-checks the ordering invariant under the lock: fast-queue entries
    /// whose station has meanwhile gained a pending Add are moved to the
    /// delayed queue, and delayed entries whose station upload completed
    /// are promoted into the outbound snapshot.
    pub async fn drain_status_updates(&self) -> BridgeResult<Vec<StatusUpdate>> {
        let mut status = self.lock(&self.status, "status").await?;
        let mut outbound = Vec::new();

        let delayed = std::mem::take(&mut status.delayed);
        for update in delayed {
            let still_pending = status.pending_adds.contains(&update.station_id)
                || !status.uploaded.contains(&update.station_id);
            if still_pending {
                status.delayed.push(update);
            } else {
                outbound.push(update);
            }
        }

        let fast = std::mem::take(&mut status.fast);
        for update in fast {
            if status.pending_adds.contains(&update.station_id) {
                status.delayed.push(update);
            } else {
                outbound.push(update);
            }
        }

        Ok(outbound)
    }

    /// Atomically swap out all pending charge detail records.
    pub async fn drain_cdr_records(&self) -> BridgeResult<Vec<ChargeDetailRecord>> {
        let mut cdrs = self.lock(&self.cdrs, "cdr").await?;
        Ok(std::mem::take(&mut cdrs))
    }

    /// Record that station descriptions reached the partner.
    ///
    /// Returns true when delayed status updates became eligible for the
    /// next fast flush, so the caller can re-arm the status timer.
    pub async fn mark_stations_uploaded(&self, ids: &[StationId]) -> BridgeResult<bool> {
        let mut status = self.lock(&self.status, "status").await?;
        for id in ids {
            status.pending_adds.remove(id);
            status.uploaded.insert(id.clone());
        }

        let eligible = status.delayed.iter().any(|update| {
            !status.pending_adds.contains(&update.station_id)
                && status.uploaded.contains(&update.station_id)
        });
        Ok(eligible)
    }

    /// Forget stations that were removed on the partner side.
    pub async fn mark_stations_removed(&self, ids: &[StationId]) -> BridgeResult<()> {
        let mut status = self.lock(&self.status, "status").await?;
        for id in ids {
            status.uploaded.remove(id);
        }
        Ok(())
    }

    /// Current (fast, delayed) status queue depths.
    pub async fn status_queue_depths(&self) -> BridgeResult<(usize, usize)> {
        let status = self.lock(&self.status, "status").await?;
        Ok((status.fast.len(), status.delayed.len()))
    }

    /// Number of pending station changes across all three kinds.
    pub async fn pending_station_changes(&self) -> BridgeResult<usize> {
        let data = self.lock(&self.data, "station-data").await?;
        Ok(data.adds.len() + data.updates.len() + data.removes.len())
    }

    /// Number of pending charge detail records.
    pub async fn pending_cdr_records(&self) -> BridgeResult<usize> {
        let cdrs = self.lock(&self.cdrs, "cdr").await?;
        Ok(cdrs.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Evse, EvseStatus, GeoCoordinate};

    fn station(id: &str) -> ChargingStation {
        let mut station = ChargingStation::new(id, format!("Station {id}"));
        station.geo = Some(GeoCoordinate {
            latitude: 48.1,
            longitude: 11.5,
        });
        station.evses.push(Evse::new(format!("{id}*E1").as_str()));
        station
    }

    fn queue() -> ChangeQueue {
        ChangeQueue::new(Duration::from_secs(1))
    }

    #[tokio::test]
    async fn duplicate_add_is_a_noop() {
        let queue = queue();

        let first = queue
            .enqueue_station_change(station("S1"), StationChangeKind::Add)
            .await
            .unwrap();
        let second = queue
            .enqueue_station_change(station("S1"), StationChangeKind::Add)
            .await
            .unwrap();

        assert!(first.inserted);
        assert!(!second.inserted);

        let snapshot = queue.drain_station_changes().await.unwrap();
        assert_eq!(snapshot.adds.len(), 1);
    }

    #[tokio::test]
    async fn same_station_different_kinds_coexist() {
        let queue = queue();

        queue
            .enqueue_station_change(station("S1"), StationChangeKind::Add)
            .await
            .unwrap();
        queue
            .enqueue_station_change(station("S1"), StationChangeKind::Remove)
            .await
            .unwrap();

        let snapshot = queue.drain_station_changes().await.unwrap();
        assert_eq!(snapshot.adds.len(), 1);
        assert_eq!(snapshot.removes.len(), 1);
    }

    #[tokio::test]
    async fn status_for_pending_add_goes_to_delayed_queue() {
        let queue = queue();
        queue
            .enqueue_station_change(station("S1"), StationChangeKind::Add)
            .await
            .unwrap();

        let receipt = queue
            .enqueue_status_update(StatusUpdate::new(
                "S1",
                "S1*E1",
                EvseStatus::Unknown,
                EvseStatus::Available,
            ))
            .await
            .unwrap();

        assert!(receipt.delayed);
        let (fast, delayed) = queue.status_queue_depths().await.unwrap();
        assert_eq!((fast, delayed), (0, 1));
    }

    #[tokio::test]
    async fn delayed_update_stays_until_station_uploaded() {
        let queue = queue();
        queue
            .enqueue_station_change(station("S1"), StationChangeKind::Add)
            .await
            .unwrap();
        queue
            .enqueue_status_update(StatusUpdate::new(
                "S1",
                "S1*E1",
                EvseStatus::Unknown,
                EvseStatus::Available,
            ))
            .await
            .unwrap();

        // Station add drained but its upload has not completed yet
        let _ = queue.drain_station_changes().await.unwrap();
        assert!(queue.drain_status_updates().await.unwrap().is_empty());

        // After the upload completes the update is promoted
        let eligible = queue
            .mark_stations_uploaded(&[StationId::from("S1")])
            .await
            .unwrap();
        assert!(eligible);

        let outbound = queue.drain_status_updates().await.unwrap();
        assert_eq!(outbound.len(), 1);
        assert_eq!(outbound[0].evse_id.as_str(), "S1*E1");
    }

    #[tokio::test]
    async fn fast_update_rerouted_when_add_arrives_later() {
        let queue = queue();

        queue
            .enqueue_status_update(StatusUpdate::new(
                "S1",
                "S1*E1",
                EvseStatus::Available,
                EvseStatus::Occupied,
            ))
            .await
            .unwrap();
        // Add arrives after the status update was already queued fast
        queue
            .enqueue_station_change(station("S1"), StationChangeKind::Add)
            .await
            .unwrap();

        assert!(queue.drain_status_updates().await.unwrap().is_empty());
        let (fast, delayed) = queue.status_queue_depths().await.unwrap();
        assert_eq!((fast, delayed), (0, 1));
    }

    #[tokio::test]
    async fn drain_leaves_queue_empty() {
        let queue = queue();
        queue
            .enqueue_station_change(station("S1"), StationChangeKind::Add)
            .await
            .unwrap();
        queue
            .enqueue_station_change(station("S2"), StationChangeKind::Update)
            .await
            .unwrap();

        let snapshot = queue.drain_station_changes().await.unwrap();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(queue.pending_station_changes().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn status_for_known_station_flows_fast() {
        let queue = queue();

        let receipt = queue
            .enqueue_status_update(StatusUpdate::new(
                "S9",
                "S9*E1",
                EvseStatus::Available,
                EvseStatus::Occupied,
            ))
            .await
            .unwrap();

        assert!(!receipt.delayed);
        let outbound = queue.drain_status_updates().await.unwrap();
        assert_eq!(outbound.len(), 1);
    }
}
