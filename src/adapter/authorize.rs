//! Authorization gate
//!
//! Maps a local authentication token onto the partner's RFID identifier
//! space and interprets the verification response. Single attempt per
//! call; retry policy belongs to the roaming network, not here.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::AuthToken;
use crate::partner::dto::RfidVerifyDto;
use crate::partner::PartnerApi;

use super::result::AuthorizeResult;

pub struct AuthorizationGate {
    api: Arc<dyn PartnerApi>,
    /// Authentication capability flag; disabled short-circuits to
    /// AdminDown before any mapping or network activity.
    enabled: bool,
}

impl AuthorizationGate {
    pub fn new(api: Arc<dyn PartnerApi>, enabled: bool) -> Self {
        Self { api, enabled }
    }

    /// Authorize the start of a charging session.
    pub async fn authorize_start(&self, token: &AuthToken) -> AuthorizeResult {
        self.verify(token, "start").await
    }

    /// Authorize the stop of a charging session.
    pub async fn authorize_stop(&self, token: &AuthToken) -> AuthorizeResult {
        self.verify(token, "stop").await
    }

    async fn verify(&self, token: &AuthToken, phase: &'static str) -> AuthorizeResult {
        if !self.enabled {
            return AuthorizeResult::AdminDown;
        }

        // Tokens outside the partner's identifier space are denied
        // locally, without a network call.
        let Some(rfid) = token.to_rfid() else {
            debug!(token = %token, phase, "Token not representable as RFID, denied locally");
            return AuthorizeResult::NotAuthorized;
        };

        match self.api.verify_rfid(&RfidVerifyDto { rfid }).await {
            Ok(response) if response.is_success() => AuthorizeResult::Authorized,
            Ok(response) => {
                debug!(
                    token = %token,
                    phase,
                    code = %response.code,
                    "Partner denied token"
                );
                AuthorizeResult::NotAuthorized
            }
            Err(err) => {
                warn!(token = %token, phase, error = %err, "RFID verification failed");
                AuthorizeResult::NotAuthorized
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::testing::ScriptedPartner;

    #[tokio::test]
    async fn valid_token_is_authorized() {
        let api = Arc::new(ScriptedPartner::new());
        let gate = AuthorizationGate::new(api.clone(), true);

        let outcome = gate
            .authorize_start(&AuthToken::new("04a2b3c4d5e6f7"))
            .await;

        assert_eq!(outcome, AuthorizeResult::Authorized);
        assert_eq!(api.rfid_verify_count(), 1);
    }

    #[tokio::test]
    async fn partner_rejection_is_not_authorized() {
        let api = Arc::new(ScriptedPartner::new());
        api.set_rfid_code(181);
        let gate = AuthorizationGate::new(api.clone(), true);

        let outcome = gate
            .authorize_stop(&AuthToken::new("04a2b3c4d5e6f7"))
            .await;

        assert_eq!(outcome, AuthorizeResult::NotAuthorized);
    }

    #[tokio::test]
    async fn unmappable_token_denied_without_network_call() {
        let api = Arc::new(ScriptedPartner::new());
        let gate = AuthorizationGate::new(api.clone(), true);

        let outcome = gate.authorize_start(&AuthToken::new("not hex!")).await;

        assert_eq!(outcome, AuthorizeResult::NotAuthorized);
        assert_eq!(api.total_calls(), 0);
    }

    #[tokio::test]
    async fn disabled_gate_short_circuits() {
        let api = Arc::new(ScriptedPartner::new());
        let gate = AuthorizationGate::new(api.clone(), false);

        let outcome = gate
            .authorize_start(&AuthToken::new("04a2b3c4d5e6f7"))
            .await;

        assert_eq!(outcome, AuthorizeResult::AdminDown);
        assert_eq!(api.total_calls(), 0);
    }
}
