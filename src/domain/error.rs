//! Adapter errors

use thiserror::Error;

/// Per-item mapping failures (domain object → partner wire format).
///
/// These never abort a batch: the affected item is filtered out of the
/// upload set and the failure surfaces as a warning on the aggregate result.
#[derive(Debug, Clone, Error)]
pub enum MappingError {
    #[error("station {0} has no geo coordinates")]
    MissingCoordinates(String),

    #[error("station {0} has no connectors")]
    NoConnectors(String),

    #[error("token '{0}' is not representable as an RFID identifier")]
    UnmappableToken(String),

    #[error("charge record {0} has no usable session interval")]
    IncompleteRecord(String),
}

/// Failures on the partner HTTP edge.
#[derive(Debug, Error)]
pub enum PartnerError {
    #[error("transport: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("partner returned HTTP {0}")]
    HttpStatus(u16),

    #[error("malformed response body: {0}")]
    MalformedResponse(#[from] serde_json::Error),
}

/// Top-level adapter error
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Waited too long for a queue lock. The calling operation gives up
    /// with an explicit error instead of blocking indefinitely.
    #[error("timed out waiting for the {queue} queue lock")]
    LockTimeout { queue: &'static str },

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error(transparent)]
    Partner(#[from] PartnerError),

    #[error("configuration: {0}")]
    Config(String),
}

/// Result type for adapter operations
pub type BridgeResult<T> = Result<T, BridgeError>;
