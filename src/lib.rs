//! # OIOI Roaming Bridge
//!
//! Bidirectional protocol adapter between an e-mobility roaming network
//! and a partner HTTP/JSON charge-point protocol.
//!
//! ## Architecture
//!
//! - **domain**: Roaming-network entities the adapter consumes, typed errors
//! - **partner**: Wire DTOs and the HTTP client towards the partner API
//! - **adapter**: The core — pending-change queues, bounded-concurrency
//!   batch uploads, flush timers, authorization gate, record forwarding
//! - **session**: Forwarding-outcome store for completed charging sessions
//! - **notifications**: Event bus announcing upload lifecycle events
//! - **shared**: Shutdown signal coordination

pub mod adapter;
pub mod config;
pub mod domain;
pub mod notifications;
pub mod partner;
pub mod session;
pub mod shared;

pub use config::{default_config_path, AppConfig};

// Re-export the core surface for easy access
pub use adapter::{AdapterConfig, AuthorizeResult, CpoAdapter, EnqueueOutcome, OperationResult};
pub use notifications::{create_event_bus, Event, EventBus, SharedEventBus};
pub use partner::{HttpPartnerClient, PartnerApi, PartnerClientConfig};
pub use session::{InMemorySessionStore, SessionStore};
pub use shared::ShutdownSignal;
