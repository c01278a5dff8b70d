//! Operation result aggregation
//!
//! One generic [`OperationResult`] replaces a per-entity zoo of
//! add/update/delete result classes: the operation kind is a tag, and
//! per-item outcomes are plain lists. Results are assembled through
//! [`OperationResultBuilder`] and frozen once the batch completes.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// What a batch operation was doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    AddStations,
    UpdateStations,
    RemoveStations,
    PushStatus,
    ForwardRecords,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddStations => write!(f, "add-stations"),
            Self::UpdateStations => write!(f, "update-stations"),
            Self::RemoveStations => write!(f, "remove-stations"),
            Self::PushStatus => write!(f, "push-status"),
            Self::ForwardRecords => write!(f, "forward-records"),
        }
    }
}

/// Overall outcome of a batch operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    /// Every item in the batch succeeded
    Success,
    /// Some items succeeded, some were rejected
    PartialSuccess,
    /// Every item in the batch was rejected
    Failed,
    /// The queue was empty; no network activity happened
    NoOperation,
    /// The capability is administratively disabled
    AdminDown,
    /// The queue lock could not be acquired in time
    LockTimeout,
}

/// A rejected item plus the reason it was rejected
#[derive(Debug, Clone)]
pub struct ItemRejection<T> {
    pub item: T,
    pub reason: String,
}

/// Aggregate result of one batch operation.
///
/// Invariant: `succeeded.len() + rejected.len()` equals the number of items
/// that survived the mapping filter; mapping casualties appear in
/// `warnings` only. Item order within the lists is completion order, not
/// input order.
#[derive(Debug, Clone)]
pub struct OperationResult<T> {
    pub kind: OperationKind,
    pub outcome: ResultKind,
    pub succeeded: Vec<T>,
    pub rejected: Vec<ItemRejection<T>>,
    pub warnings: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
}

impl<T> OperationResult<T> {
    /// Empty-queue outcome: nothing drained, nothing sent.
    pub fn no_operation(kind: OperationKind) -> Self {
        Self {
            kind,
            outcome: ResultKind::NoOperation,
            succeeded: Vec::new(),
            rejected: Vec::new(),
            warnings: Vec::new(),
            started_at: Utc::now(),
            duration: Duration::ZERO,
        }
    }

    /// Capability-disabled outcome: deliberate no-op, not a failure.
    pub fn admin_down(kind: OperationKind) -> Self {
        Self {
            outcome: ResultKind::AdminDown,
            ..Self::no_operation(kind)
        }
    }

    /// Lock-acquisition-timeout outcome.
    pub fn lock_timeout(kind: OperationKind) -> Self {
        Self {
            outcome: ResultKind::LockTimeout,
            ..Self::no_operation(kind)
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ResultKind::Success | ResultKind::NoOperation)
    }

    /// Items that went through the uploader (mapping casualties excluded)
    pub fn attempted(&self) -> usize {
        self.succeeded.len() + self.rejected.len()
    }
}

/// Accumulates per-item outcomes during a batch, then freezes into an
/// immutable [`OperationResult`].
pub struct OperationResultBuilder<T> {
    kind: OperationKind,
    succeeded: Vec<T>,
    rejected: Vec<ItemRejection<T>>,
    warnings: Vec<String>,
    started_at: DateTime<Utc>,
    started: Instant,
}

impl<T> OperationResultBuilder<T> {
    pub fn begin(kind: OperationKind) -> Self {
        Self {
            kind,
            succeeded: Vec::new(),
            rejected: Vec::new(),
            warnings: Vec::new(),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    pub fn push_success(&mut self, item: T) {
        self.succeeded.push(item);
    }

    pub fn push_rejected(&mut self, item: T, reason: impl Into<String>) {
        self.rejected.push(ItemRejection {
            item,
            reason: reason.into(),
        });
    }

    pub fn push_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Freeze the builder into the final aggregate.
    pub fn freeze(self) -> OperationResult<T> {
        let outcome = match (self.succeeded.is_empty(), self.rejected.is_empty()) {
            (true, true) => ResultKind::NoOperation,
            (false, true) => ResultKind::Success,
            (true, false) => ResultKind::Failed,
            (false, false) => ResultKind::PartialSuccess,
        };

        OperationResult {
            kind: self.kind,
            outcome,
            succeeded: self.succeeded,
            rejected: self.rejected,
            warnings: self.warnings,
            started_at: self.started_at,
            duration: self.started.elapsed(),
        }
    }
}

/// Outcome of forwarding a single charge detail record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendResult {
    Success,
    Error(String),
    CouldNotConvertFormat(String),
    Filtered,
}

impl SendResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Outcome of an authorization request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizeResult {
    Authorized,
    NotAuthorized,
    /// Authentication is administratively disabled
    AdminDown,
}

/// Outcome of an enqueue operation on the adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// Accepted into the pending queue
    Enqueued,
    /// Identical change already pending; enqueue was a no-op
    AlreadyPending,
    /// Status update parked until the owning station is uploaded
    Delayed,
    /// Capability disabled; nothing was queued
    AdminDown,
    /// Queue lock could not be acquired in time
    LockTimeout,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn freeze_computes_partial_success() {
        let mut builder: OperationResultBuilder<&str> =
            OperationResultBuilder::begin(OperationKind::AddStations);
        builder.push_success("A");
        builder.push_rejected("B", "connection refused");

        let result = builder.freeze();
        assert_eq!(result.outcome, ResultKind::PartialSuccess);
        assert_eq!(result.attempted(), 2);
    }

    #[test]
    fn freeze_of_empty_builder_is_no_operation() {
        let builder: OperationResultBuilder<&str> =
            OperationResultBuilder::begin(OperationKind::PushStatus);
        assert_eq!(builder.freeze().outcome, ResultKind::NoOperation);
    }

    #[test]
    fn all_rejected_is_failed() {
        let mut builder: OperationResultBuilder<&str> =
            OperationResultBuilder::begin(OperationKind::ForwardRecords);
        builder.push_rejected("A", "timeout");
        assert_eq!(builder.freeze().outcome, ResultKind::Failed);
    }

    #[test]
    fn admin_down_is_not_an_error() {
        let result: OperationResult<&str> = OperationResult::admin_down(OperationKind::AddStations);
        assert_eq!(result.outcome, ResultKind::AdminDown);
        assert_eq!(result.attempted(), 0);
    }
}
