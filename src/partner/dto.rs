//! Partner wire DTOs
//!
//! The partner speaks a single-endpoint JSON protocol: every request is an
//! object with one top-level key naming the operation (`station-post`,
//! `connector-post-status`, `session-post`, `rfid-verify`) and every
//! response carries a `result` envelope with a numeric code.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::domain::{
    ChargeDetailRecord, ChargingStation, EvseStatus, MappingError, StatusUpdate,
};

/// Connector status values the partner understands.
///
/// Richer roaming-network statuses collapse onto this set; anything that
/// does not map cleanly becomes `Unknown` rather than an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectorStatus {
    Available,
    Occupied,
    Offline,
    Reserved,
    Unknown,
}

impl From<EvseStatus> for ConnectorStatus {
    fn from(status: EvseStatus) -> Self {
        match status {
            EvseStatus::Available => Self::Available,
            EvseStatus::Occupied => Self::Occupied,
            EvseStatus::Reserved => Self::Reserved,
            EvseStatus::Offline => Self::Offline,
            // OutOfService has no partner-side counterpart
            EvseStatus::OutOfService => Self::Offline,
            EvseStatus::Unknown => Self::Unknown,
        }
    }
}

/// Station address block
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub struct AddressDto {
    pub street: String,
    pub street_number: String,
    pub city: String,
    pub zip: String,
    pub country: String,
}

/// One connector inside a `station-post`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConnectorDto {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Charging speed in kW
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    pub status: ConnectorStatus,
}

/// `station-post` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StationDto {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<AddressDto>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub is_open_24: bool,
    pub connectors: Vec<ConnectorDto>,
    /// Set on station removal; the partner keeps no separate delete call.
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub deleted: bool,
}

impl StationDto {
    /// Map a roaming-network station onto the wire format.
    ///
    /// Fails per-item when mandatory partner fields cannot be produced;
    /// the caller collects the failure as a warning and drops the item
    /// from the batch.
    pub fn from_domain(station: &ChargingStation, deleted: bool) -> Result<Self, MappingError> {
        let geo = station
            .geo
            .ok_or_else(|| MappingError::MissingCoordinates(station.id.to_string()))?;

        if station.evses.is_empty() {
            return Err(MappingError::NoConnectors(station.id.to_string()));
        }

        let connectors = station
            .evses
            .iter()
            .map(|evse| ConnectorDto {
                id: evse.id.to_string(),
                name: evse.plug_type.clone(),
                speed: evse.max_power_kw,
                status: evse.status.into(),
            })
            .collect();

        Ok(Self {
            id: station.id.to_string(),
            name: station.name.clone(),
            description: station.description.clone(),
            latitude: geo.latitude,
            longitude: geo.longitude,
            address: station.address.as_ref().map(|a| AddressDto {
                street: a.street.clone(),
                street_number: a.street_number.clone(),
                city: a.city.clone(),
                zip: a.zip_code.clone(),
                country: a.country.clone(),
            }),
            phone: station.phone.clone(),
            is_open_24: station.open_24_hours,
            connectors,
            deleted,
        })
    }
}

/// `connector-post-status` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ConnectorStatusDto {
    pub connector_id: String,
    pub status: ConnectorStatus,
    pub timestamp: DateTime<Utc>,
}

impl ConnectorStatusDto {
    pub fn from_update(update: &StatusUpdate) -> Self {
        Self {
            connector_id: update.evse_id.to_string(),
            status: update.new_status.into(),
            timestamp: update.timestamp,
        }
    }
}

/// Session interval inside a `session-post`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SessionIntervalDto {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
}

/// User block inside a `session-post`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SessionUserDto {
    pub identifier_type: String,
    pub identifier: String,
}

/// `session-post` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SessionDto {
    pub user: SessionUserDto,
    pub session_id: String,
    pub connector_id: String,
    pub session_interval: SessionIntervalDto,
    /// Total energy delivered, in kWh
    pub energy_consumed: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_identifier: Option<String>,
}

impl SessionDto {
    pub fn from_record(
        record: &ChargeDetailRecord,
        partner_identifier: Option<String>,
    ) -> Result<Self, MappingError> {
        let stop = record
            .session_end
            .ok_or_else(|| MappingError::IncompleteRecord(record.session_id.to_string()))?;

        let rfid = record
            .token
            .to_rfid()
            .ok_or_else(|| MappingError::UnmappableToken(record.token.to_string()))?;

        Ok(Self {
            user: SessionUserDto {
                identifier_type: "rfid".to_string(),
                identifier: rfid,
            },
            session_id: record.session_id.to_string(),
            connector_id: record.evse_id.to_string(),
            session_interval: SessionIntervalDto {
                start: record.session_start,
                stop,
            },
            energy_consumed: record.energy_kwh.to_f64().unwrap_or(0.0),
            price: record.price.and_then(|p| p.to_f64()),
            partner_identifier,
        })
    }
}

/// `rfid-verify` payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RfidVerifyDto {
    pub rfid: String,
}

// ── Response envelope ──────────────────────────────────────────

/// Result code inside the partner's response envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Success,
    InvalidApiKey,
    InvalidPayload,
    NotFound,
    SystemError,
    Other(u32),
}

impl ResponseCode {
    pub fn from_code(code: u32) -> Self {
        match code {
            0 => Self::Success,
            104 => Self::InvalidApiKey,
            140 => Self::InvalidPayload,
            181 => Self::NotFound,
            300 => Self::SystemError,
            other => Self::Other(other),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for ResponseCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "Success"),
            Self::InvalidApiKey => write!(f, "InvalidApiKey"),
            Self::InvalidPayload => write!(f, "InvalidPayload"),
            Self::NotFound => write!(f, "NotFound"),
            Self::SystemError => write!(f, "SystemError"),
            Self::Other(code) => write!(f, "{}", code),
        }
    }
}

/// Parsed partner response
#[derive(Debug, Clone)]
pub struct PartnerResponse {
    pub code: ResponseCode,
    pub message: String,
}

impl PartnerResponse {
    pub fn is_success(&self) -> bool {
        self.code.is_success()
    }
}

/// Raw response envelope: `{ "result": { "code": .., "message": .. } }`
#[derive(Debug, Deserialize)]
pub struct ResultEnvelope {
    pub result: ResultBody,
}

#[derive(Debug, Deserialize)]
pub struct ResultBody {
    pub code: u32,
    #[serde(default)]
    pub message: String,
}

impl From<ResultEnvelope> for PartnerResponse {
    fn from(envelope: ResultEnvelope) -> Self {
        Self {
            code: ResponseCode::from_code(envelope.result.code),
            message: envelope.result.message,
        }
    }
}
