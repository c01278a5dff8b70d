//! Observer events
//!
//! Defines the events the adapter emits around its network operations.
//! Observers are strictly passive: a slow or absent subscriber never
//! affects the operation that produced the event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events emitted by the adapter
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    /// A batch upload is about to start
    UploadStarted(UploadStartedEvent),
    /// A batch upload finished (fully or partially)
    UploadCompleted(UploadCompletedEvent),
    /// A charge detail record forwarding attempt finished
    CdrForwarded(CdrForwardedEvent),
    /// An authorization request was decided
    AuthorizationDecided(AuthorizationDecidedEvent),
}

impl Event {
    /// Get the event type name
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::UploadStarted(_) => "upload_started",
            Event::UploadCompleted(_) => "upload_completed",
            Event::CdrForwarded(_) => "cdr_forwarded",
            Event::AuthorizationDecided(_) => "authorization_decided",
        }
    }
}

/// A batch upload is starting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadStartedEvent {
    /// Queue kind: "station-data", "status", "cdr"
    pub queue: String,
    pub items: usize,
    pub timestamp: DateTime<Utc>,
}

/// A batch upload completed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadCompletedEvent {
    pub queue: String,
    /// Operation kind, e.g. "add-stations"
    pub operation: String,
    pub succeeded: usize,
    pub rejected: usize,
    pub warnings: usize,
    pub duration_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// A charge detail record was forwarded (or failed to forward)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CdrForwardedEvent {
    pub session_id: Uuid,
    /// "success", "error", "could_not_convert", "filtered"
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// An authorization request was decided
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationDecidedEvent {
    pub token: String,
    /// "start" or "stop"
    pub phase: String,
    /// "authorized", "not_authorized", "admin_down"
    pub outcome: String,
    pub timestamp: DateTime<Utc>,
}

/// Event wrapper with delivery metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMessage {
    pub event: Event,
    pub emitted_at: DateTime<Utc>,
}

impl EventMessage {
    pub fn new(event: Event) -> Self {
        Self {
            event,
            emitted_at: Utc::now(),
        }
    }
}
