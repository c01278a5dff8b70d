//! Charging station domain entities
//!
//! These are the roaming-network objects the adapter consumes. The adapter
//! never mutates them; it only snapshots them into its pending-change queues
//! and maps them to partner wire DTOs at flush time.

use chrono::{DateTime, Utc};

/// Unique charging station identifier within the roaming network
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct StationId(String);

impl StationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for StationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique EVSE (connector) identifier
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct EvseId(String);

impl EvseId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for EvseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for EvseId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Operational status of a single EVSE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvseStatus {
    Available,
    Occupied,
    Reserved,
    OutOfService,
    Offline,
    Unknown,
}

impl Default for EvseStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

impl std::fmt::Display for EvseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available => write!(f, "Available"),
            Self::Occupied => write!(f, "Occupied"),
            Self::Reserved => write!(f, "Reserved"),
            Self::OutOfService => write!(f, "OutOfService"),
            Self::Offline => write!(f, "Offline"),
            Self::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Geographical position of a station
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoCoordinate {
    pub latitude: f64,
    pub longitude: f64,
}

/// Postal address of a station
#[derive(Debug, Clone, Default)]
pub struct Address {
    pub street: String,
    pub street_number: String,
    pub city: String,
    pub zip_code: String,
    pub country: String,
}

/// One physical charging connector on a station
#[derive(Debug, Clone)]
pub struct Evse {
    pub id: EvseId,
    /// Human-readable plug description (e.g. "Type2", "CHAdeMO")
    pub plug_type: Option<String>,
    /// Maximum charging power in kW
    pub max_power_kw: Option<f64>,
    pub status: EvseStatus,
}

impl Evse {
    pub fn new(id: impl Into<EvseId>) -> Self {
        Self {
            id: id.into(),
            plug_type: None,
            max_power_kw: None,
            status: EvseStatus::default(),
        }
    }
}

/// Charging station entity
#[derive(Debug, Clone)]
pub struct ChargingStation {
    pub id: StationId,
    pub name: String,
    pub description: Option<String>,
    /// Geo position. Mandatory on the partner side: a station without
    /// coordinates cannot be uploaded and is filtered at mapping time.
    pub geo: Option<GeoCoordinate>,
    pub address: Option<Address>,
    pub phone: Option<String>,
    pub open_24_hours: bool,
    pub evses: Vec<Evse>,
}

impl ChargingStation {
    pub fn new(id: impl Into<StationId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            geo: None,
            address: None,
            phone: None,
            open_24_hours: true,
            evses: Vec::new(),
        }
    }

    pub fn evse(&self, id: &EvseId) -> Option<&Evse> {
        self.evses.iter().find(|e| &e.id == id)
    }
}

/// A single EVSE status transition reported by the roaming network
#[derive(Debug, Clone)]
pub struct StatusUpdate {
    /// Station owning the EVSE
    pub station_id: StationId,
    pub evse_id: EvseId,
    pub old_status: EvseStatus,
    pub new_status: EvseStatus,
    pub timestamp: DateTime<Utc>,
}

impl StatusUpdate {
    pub fn new(
        station_id: impl Into<StationId>,
        evse_id: impl Into<EvseId>,
        old_status: EvseStatus,
        new_status: EvseStatus,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            evse_id: evse_id.into(),
            old_status,
            new_status,
            timestamp: Utc::now(),
        }
    }
}
