//! Partner protocol edge: wire DTOs and the HTTP client

pub mod client;
pub mod dto;

pub use client::{HttpPartnerClient, PartnerApi, PartnerClientConfig};
pub use dto::{
    ConnectorStatus, ConnectorStatusDto, PartnerResponse, ResponseCode, RfidVerifyDto, SessionDto,
    StationDto,
};
