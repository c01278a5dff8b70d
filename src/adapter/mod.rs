//! The CPO adapter core: queueing, batching, flush timers, authorization
//! and charge-record forwarding.

#[allow(clippy::module_inception)]
pub mod adapter;
pub mod authorize;
pub mod batch;
pub mod cdr;
pub mod flush;
pub mod queue;
pub mod result;

#[cfg(test)]
pub(crate) mod testing;

pub use adapter::{AdapterConfig, CdrForwardOutcome, CpoAdapter, StationDataFlush};
pub use authorize::AuthorizationGate;
pub use batch::{BatchUploader, DEFAULT_CONCURRENCY};
pub use cdr::{CdrFilter, CdrForwarder};
pub use flush::{FlushOutcome, FlushScheduler, FlushTimerState};
pub use queue::{ChangeQueue, EnqueueReceipt, StationChangeKind, StationChangeSnapshot};
pub use result::{
    AuthorizeResult, EnqueueOutcome, ItemRejection, OperationKind, OperationResult,
    OperationResultBuilder, ResultKind, SendResult,
};
