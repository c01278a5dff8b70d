//! Charge detail records and authentication tokens

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use super::station::{EvseId, StationId};

/// A local authentication token (RFID UID) presented at a charging station.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Map the token into the partner's RFID identifier space.
    ///
    /// The partner only accepts hexadecimal UIDs of 8 to 20 digits.
    /// Returns `None` for tokens outside that space; callers treat an
    /// unmappable token as a local deny, without any network call.
    pub fn to_rfid(&self) -> Option<String> {
        let uid = self.0.trim();
        if (8..=20).contains(&uid.len()) && uid.chars().all(|c| c.is_ascii_hexdigit()) {
            Some(uid.to_ascii_lowercase())
        } else {
            None
        }
    }
}

impl std::fmt::Display for AuthToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Summary of one completed charging session, pending forwarding
/// to the partner.
#[derive(Debug, Clone)]
pub struct ChargeDetailRecord {
    pub session_id: Uuid,
    pub station_id: StationId,
    pub evse_id: EvseId,
    pub token: AuthToken,
    pub session_start: DateTime<Utc>,
    pub session_end: Option<DateTime<Utc>>,
    /// Total energy delivered during the session, in kWh
    pub energy_kwh: Decimal,
    /// Price charged for the session, if known
    pub price: Option<Decimal>,
}

impl ChargeDetailRecord {
    pub fn new(
        station_id: impl Into<StationId>,
        evse_id: impl Into<EvseId>,
        token: AuthToken,
        session_start: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            station_id: station_id.into(),
            evse_id: evse_id.into(),
            token,
            session_start,
            session_end: None,
            energy_kwh: Decimal::ZERO,
            price: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_rfid_maps_lowercase() {
        let token = AuthToken::new("04A2B3C4D5E6F7");
        assert_eq!(token.to_rfid().unwrap(), "04a2b3c4d5e6f7");
    }

    #[test]
    fn short_token_is_unmappable() {
        assert!(AuthToken::new("04A2B3").to_rfid().is_none());
    }

    #[test]
    fn non_hex_token_is_unmappable() {
        assert!(AuthToken::new("not-an-rfid-uid").to_rfid().is_none());
    }
}
