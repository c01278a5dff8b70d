//! Scripted partner double shared by the adapter test modules.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::PartnerError;
use crate::partner::dto::{
    ConnectorStatusDto, PartnerResponse, ResponseCode, RfidVerifyDto, SessionDto, StationDto,
};
use crate::partner::PartnerApi;

/// In-memory [`PartnerApi`] with programmable per-item outcomes and call
/// counters. Every request is recorded; stations listed via
/// [`fail_station`](Self::fail_station) fail with a transport-level error.
pub(crate) struct ScriptedPartner {
    fail_stations: Mutex<HashSet<String>>,
    fail_sessions: Mutex<bool>,
    rfid_code: Mutex<u32>,
    station_posts: Mutex<Vec<StationDto>>,
    status_posts: Mutex<Vec<ConnectorStatusDto>>,
    session_posts: Mutex<Vec<SessionDto>>,
    rfid_verifies: Mutex<Vec<RfidVerifyDto>>,
    calls: AtomicUsize,
}

impl ScriptedPartner {
    pub fn new() -> Self {
        Self {
            fail_stations: Mutex::new(HashSet::new()),
            fail_sessions: Mutex::new(false),
            rfid_code: Mutex::new(0),
            station_posts: Mutex::new(Vec::new()),
            status_posts: Mutex::new(Vec::new()),
            session_posts: Mutex::new(Vec::new()),
            rfid_verifies: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Make uploads for this station id fail with HTTP 500.
    pub fn fail_station(&self, id: &str) {
        self.fail_stations.lock().unwrap().insert(id.to_string());
    }

    /// Make all session-post calls fail with HTTP 500.
    pub fn fail_sessions(&self, fail: bool) {
        *self.fail_sessions.lock().unwrap() = fail;
    }

    /// Set the result code returned by rfid-verify calls.
    pub fn set_rfid_code(&self, code: u32) {
        *self.rfid_code.lock().unwrap() = code;
    }

    pub fn total_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn station_post_count(&self) -> usize {
        self.station_posts.lock().unwrap().len()
    }

    pub fn status_post_count(&self) -> usize {
        self.status_posts.lock().unwrap().len()
    }

    pub fn session_post_count(&self) -> usize {
        self.session_posts.lock().unwrap().len()
    }

    pub fn rfid_verify_count(&self) -> usize {
        self.rfid_verifies.lock().unwrap().len()
    }

    pub fn posted_status_connectors(&self) -> Vec<String> {
        self.status_posts
            .lock()
            .unwrap()
            .iter()
            .map(|dto| dto.connector_id.clone())
            .collect()
    }

    fn ok() -> PartnerResponse {
        PartnerResponse {
            code: ResponseCode::Success,
            message: "Success".to_string(),
        }
    }
}

#[async_trait]
impl PartnerApi for ScriptedPartner {
    async fn post_station(&self, station: &StationDto) -> Result<PartnerResponse, PartnerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_stations.lock().unwrap().contains(&station.id) {
            return Err(PartnerError::HttpStatus(500));
        }
        self.station_posts.lock().unwrap().push(station.clone());
        Ok(Self::ok())
    }

    async fn post_connector_status(
        &self,
        status: &ConnectorStatusDto,
    ) -> Result<PartnerResponse, PartnerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.status_posts.lock().unwrap().push(status.clone());
        Ok(Self::ok())
    }

    async fn post_session(&self, session: &SessionDto) -> Result<PartnerResponse, PartnerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_sessions.lock().unwrap() {
            return Err(PartnerError::HttpStatus(500));
        }
        self.session_posts.lock().unwrap().push(session.clone());
        Ok(Self::ok())
    }

    async fn verify_rfid(&self, rfid: &RfidVerifyDto) -> Result<PartnerResponse, PartnerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.rfid_verifies.lock().unwrap().push(rfid.clone());
        let code = *self.rfid_code.lock().unwrap();
        Ok(PartnerResponse {
            code: ResponseCode::from_code(code),
            message: String::new(),
        })
    }
}
