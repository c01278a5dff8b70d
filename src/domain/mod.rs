//! Domain entities and errors

pub mod cdr;
pub mod error;
pub mod station;

// Re-export commonly used types
pub use cdr::{AuthToken, ChargeDetailRecord};
pub use error::{BridgeError, BridgeResult, MappingError, PartnerError};
pub use station::{
    Address, ChargingStation, Evse, EvseId, EvseStatus, GeoCoordinate, StationId, StatusUpdate,
};
