//! OAuth callback correlator.
//!
//! Issues state tokens for authorize calls and completes the code exchange
//! when the browser is redirected back, attaching the credential to the
//! session that started the flow.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

use super::error::{AuthorizeError, CallbackError, StateRejection};
use super::oauth::{CodeExchanger, build_authorize_url};
use super::pending::{PendingStore, SweepStats};
use super::session::{SessionContext, SessionId, SessionKind};
use crate::core::config::BoxConfig;

/// Returned to the client by the authorize tool.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationRequest {
    pub authorization_url: String,
    pub state_token: String,
    pub expires_at: DateTime<Utc>,
}

/// Query parameters of the OAuth redirect.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

pub struct CallbackCorrelator {
    pending: PendingStore,
    exchanger: Arc<dyn CodeExchanger>,
    box_config: BoxConfig,
}

impl CallbackCorrelator {
    pub fn new(box_config: BoxConfig, pending_ttl: Duration, exchanger: Arc<dyn CodeExchanger>) -> Self {
        Self {
            pending: PendingStore::new(pending_ttl),
            exchanger,
            box_config,
        }
    }

    pub fn pending(&self) -> &PendingStore {
        &self.pending
    }

    /// Start an authorization flow for `session`.
    ///
    /// Supersedes any flow the session already had in progress and logs out
    /// an authenticated session.
    #[instrument(skip_all, fields(session = %session.id()))]
    pub fn begin_authorization(
        &self,
        session: &Arc<SessionContext>,
    ) -> Result<AuthorizationRequest, AuthorizeError> {
        if session.kind() == SessionKind::Ephemeral {
            return Err(AuthorizeError::StatelessSession);
        }
        if self.box_config.client_id.is_none() {
            return Err(AuthorizeError::NotConfigured(
                "BOX_CLIENT_ID is not set".to_string(),
            ));
        }

        let record = self.pending.insert(session);
        let authorization_url = build_authorize_url(&self.box_config, &record.state_token)?;
        // TTLs past chrono's range saturate.
        let expires_at = ChronoDuration::from_std(self.pending.ttl())
            .ok()
            .and_then(|ttl| record.created_at.checked_add_signed(ttl))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        info!("Authorization flow started");
        Ok(AuthorizationRequest {
            authorization_url,
            expires_at,
            state_token: record.state_token,
        })
    }

    /// Complete the flow for `state_token` with `code`.
    ///
    /// The token is claimed before the exchange, so at most one callback per
    /// token ever reaches the token endpoint.
    #[instrument(skip_all)]
    pub async fn handle_callback(
        &self,
        code: &str,
        state_token: &str,
    ) -> Result<SessionId, CallbackError> {
        let session = self.pending.claim(state_token).map_err(|reason| {
            warn!(%reason, "Rejected OAuth callback");
            CallbackError::UnknownState(reason)
        })?;

        match self.exchanger.exchange(code).await {
            Ok(credential) => {
                if session.attach_credential(credential, Some(state_token)) {
                    info!(session = %session.id(), "OAuth callback completed");
                    Ok(session.id().clone())
                } else if session.is_closed() {
                    Err(StateRejection::SessionClosed.into())
                } else {
                    Err(StateRejection::Superseded.into())
                }
            }
            Err(err) => {
                warn!(session = %session.id(), error = %err, "Code exchange failed");
                self.pending.fail(state_token);
                session.expire_pending(state_token);
                Err(err.into())
            }
        }
    }

    /// Handle the raw redirect query, including provider-reported errors.
    pub async fn handle_redirect(&self, params: CallbackParams) -> Result<SessionId, CallbackError> {
        if let Some(error) = params.error {
            if let Some(state) = params.state.as_deref() {
                if let Ok(session) = self.pending.claim(state) {
                    self.pending.fail(state);
                    session.expire_pending(state);
                }
            }
            let reason = params.error_description.unwrap_or(error);
            warn!(%reason, "Authorization denied by provider");
            return Err(CallbackError::ProviderDenied(reason));
        }

        let code = non_empty(params.code).ok_or(CallbackError::MissingParameter("code"))?;
        let state = non_empty(params.state).ok_or(CallbackError::MissingParameter("state"))?;
        self.handle_callback(&code, &state).await
    }

    pub fn sweep(&self) -> SweepStats {
        self.pending.sweep()
    }

    pub fn shutdown(&self) {
        self.pending.clear();
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::auth::fake::FakeExchanger;
    use crate::domains::auth::pending::PendingStatus;
    use crate::domains::auth::session::{AuthStatus, SessionManager, SessionScope};
    use crate::domains::box_api::fake::{FakeBoxApi, FakeConnector};

    fn setup(ttl: Duration) -> (Arc<CallbackCorrelator>, Arc<SessionManager>, Arc<FakeExchanger>) {
        let exchanger = FakeExchanger::new();
        let config = BoxConfig {
            client_id: Some("client".to_string()),
            client_secret: Some("secret".to_string()),
            ..Default::default()
        };
        let correlator = Arc::new(CallbackCorrelator::new(config, ttl, exchanger.clone()));
        let sessions = Arc::new(SessionManager::new(
            FakeConnector::new(FakeBoxApi::new()),
            Duration::from_secs(3600),
        ));
        (correlator, sessions, exchanger)
    }

    #[test]
    fn test_huge_ttl_saturates_expiry() {
        let (correlator, sessions, _) = setup(Duration::from_secs(u64::MAX));
        let guard = sessions.acquire(SessionScope::Keyed(SessionId::generate()));
        let request = correlator.begin_authorization(guard.session()).unwrap();
        assert_eq!(request.expires_at, DateTime::<Utc>::MAX_UTC);
        assert_eq!(guard.status(), AuthStatus::Pending);
    }

    #[tokio::test]
    async fn test_callback_authenticates_session() {
        let (correlator, sessions, exchanger) = setup(Duration::from_secs(300));
        let guard = sessions.acquire(SessionScope::Keyed(SessionId::generate()));

        let request = correlator.begin_authorization(guard.session()).unwrap();
        assert!(request.authorization_url.contains(&request.state_token));
        assert_eq!(guard.status(), AuthStatus::Pending);

        let id = correlator
            .handle_callback("abc", &request.state_token)
            .await
            .unwrap();
        assert_eq!(&id, guard.id());
        assert!(matches!(guard.status(), AuthStatus::Authenticated { .. }));
        assert_eq!(exchanger.calls(), 1);
    }

    #[tokio::test]
    async fn test_second_callback_rejected_without_exchange() {
        let (correlator, sessions, exchanger) = setup(Duration::from_secs(300));
        let guard = sessions.acquire(SessionScope::Keyed(SessionId::generate()));
        let token = correlator.begin_authorization(guard.session()).unwrap().state_token;

        correlator.handle_callback("abc", &token).await.unwrap();
        let err = correlator.handle_callback("abc", &token).await.unwrap_err();
        assert_eq!(err, CallbackError::UnknownState(StateRejection::AlreadyRedeemed));
        assert_eq!(exchanger.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callbacks_exchange_once() {
        let (correlator, sessions, exchanger) = setup(Duration::from_secs(300));
        let guard = sessions.acquire(SessionScope::Keyed(SessionId::generate()));
        let token = correlator.begin_authorization(guard.session()).unwrap().state_token;

        let (a, b) = tokio::join!(
            correlator.handle_callback("abc", &token),
            correlator.handle_callback("abc", &token)
        );
        assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
        assert_eq!(exchanger.calls(), 1);
    }

    #[tokio::test]
    async fn test_superseded_token_rejected() {
        let (correlator, sessions, _) = setup(Duration::from_secs(300));
        let guard = sessions.acquire(SessionScope::Keyed(SessionId::generate()));
        let first = correlator.begin_authorization(guard.session()).unwrap().state_token;
        let second = correlator.begin_authorization(guard.session()).unwrap().state_token;

        let err = correlator.handle_callback("abc", &first).await.unwrap_err();
        assert_eq!(err, CallbackError::UnknownState(StateRejection::Superseded));
        assert_eq!(guard.status(), AuthStatus::Pending);

        correlator.handle_callback("abc", &second).await.unwrap();
        assert!(matches!(guard.status(), AuthStatus::Authenticated { .. }));
    }

    #[tokio::test]
    async fn test_unknown_state_mutates_nothing() {
        let (correlator, sessions, exchanger) = setup(Duration::from_secs(300));
        let guard = sessions.acquire(SessionScope::Keyed(SessionId::generate()));
        correlator.begin_authorization(guard.session()).unwrap();

        let err = correlator.handle_callback("abc", "nonexistent").await.unwrap_err();
        assert_eq!(err, CallbackError::UnknownState(StateRejection::Unknown));
        assert_eq!(guard.status(), AuthStatus::Pending);
        assert_eq!(exchanger.calls(), 0);
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let (correlator, sessions, exchanger) = setup(Duration::ZERO);
        let guard = sessions.acquire(SessionScope::Keyed(SessionId::generate()));
        let token = correlator.begin_authorization(guard.session()).unwrap().state_token;

        let err = correlator.handle_callback("abc", &token).await.unwrap_err();
        assert_eq!(err, CallbackError::UnknownState(StateRejection::Expired));
        assert_eq!(guard.status(), AuthStatus::Unauthenticated);
        assert_eq!(exchanger.calls(), 0);
    }

    #[tokio::test]
    async fn test_exchange_failure_expires_record() {
        let (correlator, sessions, _) = setup(Duration::from_secs(300));
        let guard = sessions.acquire(SessionScope::Keyed(SessionId::generate()));
        let token = correlator.begin_authorization(guard.session()).unwrap().state_token;

        let err = correlator.handle_callback(FakeExchanger::BAD_CODE, &token).await.unwrap_err();
        assert!(matches!(err, CallbackError::Exchange(_)));
        assert_eq!(err.status_code(), 502);
        assert_eq!(correlator.pending().status(&token), Some(PendingStatus::Expired));
        assert_eq!(guard.status(), AuthStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn test_closed_session_rejected() {
        let (correlator, sessions, exchanger) = setup(Duration::from_secs(300));
        let id = SessionId::generate();
        let guard = sessions.acquire(SessionScope::Keyed(id.clone()));
        let token = correlator.begin_authorization(guard.session()).unwrap().state_token;
        sessions.teardown_by_id(&id);

        let err = correlator.handle_callback("abc", &token).await.unwrap_err();
        assert_eq!(err, CallbackError::UnknownState(StateRejection::SessionClosed));
        assert_eq!(exchanger.calls(), 0);
    }

    #[test]
    fn test_ephemeral_session_cannot_authorize() {
        let (correlator, sessions, _) = setup(Duration::from_secs(300));
        let guard = sessions.acquire(SessionScope::Ephemeral { bearer: None });
        assert_eq!(
            correlator.begin_authorization(guard.session()).unwrap_err(),
            AuthorizeError::StatelessSession
        );
        assert!(correlator.pending().is_empty());
    }

    #[tokio::test]
    async fn test_redirect_parameter_checks() {
        let (correlator, sessions, _) = setup(Duration::from_secs(300));
        let guard = sessions.acquire(SessionScope::Keyed(SessionId::generate()));
        let token = correlator.begin_authorization(guard.session()).unwrap().state_token;

        let missing = correlator
            .handle_redirect(CallbackParams {
                state: Some(token.clone()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(missing, CallbackError::MissingParameter("code"));

        let denied = correlator
            .handle_redirect(CallbackParams {
                state: Some(token.clone()),
                error: Some("access_denied".to_string()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(denied, CallbackError::ProviderDenied("access_denied".to_string()));
        assert_eq!(guard.status(), AuthStatus::Unauthenticated);
    }

    #[test]
    fn test_sessions_isolated() {
        let (correlator, sessions, _) = setup(Duration::from_secs(300));
        let a = sessions.acquire(SessionScope::Keyed(SessionId::generate()));
        let b = sessions.acquire(SessionScope::Keyed(SessionId::generate()));
        let ta = correlator.begin_authorization(a.session()).unwrap().state_token;
        let tb = correlator.begin_authorization(b.session()).unwrap().state_token;

        assert_ne!(ta, tb);
        assert_eq!(correlator.pending().waiting(), 2);
        assert_eq!(a.pending_token(), Some(ta));
        assert_eq!(b.pending_token(), Some(tb));
    }
}
