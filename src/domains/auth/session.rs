//! Session contexts and their manager.
//!
//! A [`SessionContext`] owns one client's authorization state and, once
//! authenticated, its lazily built Box client. The [`SessionManager`] maps
//! session scopes to contexts and guarantees that teardown runs exactly once.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info};
use uuid::Uuid;

use super::credential::Credential;
use super::error::SessionError;
use crate::domains::box_api::{BoxApi, BoxConnector};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Opaque session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(String);

impl SessionId {
    /// Mint a fresh random id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// How a session is scoped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    /// Lives as long as a pipe connection.
    Connection,
    /// Named by an `Mcp-Session-Id` header; outlives individual requests.
    Keyed,
    /// Lives for one HTTP request only.
    Ephemeral,
}

/// The scope a dispatch runs in.
#[derive(Debug, Clone)]
pub enum SessionScope {
    Connection(SessionId),
    Keyed(SessionId),
    /// Request-scoped; authorization comes only from the supplied credential.
    Ephemeral { bearer: Option<Credential> },
}

enum AuthState {
    Unauthenticated,
    Pending { state_token: String },
    Authenticated(Credential),
}

/// Snapshot of a session's authorization state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AuthStatus {
    Unauthenticated,
    Pending,
    Authenticated { expires_at: Option<DateTime<Utc>> },
}

struct SessionState {
    auth: AuthState,
    /// Only ever set while `auth` is `Authenticated`.
    client: Option<Arc<dyn BoxApi>>,
    last_seen: Instant,
}

/// Authorization and client state for one client interaction.
pub struct SessionContext {
    id: SessionId,
    kind: SessionKind,
    state: Mutex<SessionState>,
    connector: Arc<dyn BoxConnector>,
    closed: AtomicBool,
}

impl SessionContext {
    /// Create an unauthenticated session.
    pub fn new(id: SessionId, kind: SessionKind, connector: Arc<dyn BoxConnector>) -> Self {
        Self {
            id,
            kind,
            state: Mutex::new(SessionState {
                auth: AuthState::Unauthenticated,
                client: None,
                last_seen: Instant::now(),
            }),
            connector,
            closed: AtomicBool::new(false),
        }
    }

    fn with_credential(
        id: SessionId,
        kind: SessionKind,
        connector: Arc<dyn BoxConnector>,
        credential: Credential,
    ) -> Self {
        let session = Self::new(id, kind, connector);
        lock(&session.state).auth = AuthState::Authenticated(credential);
        session
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn status(&self) -> AuthStatus {
        match &lock(&self.state).auth {
            AuthState::Unauthenticated => AuthStatus::Unauthenticated,
            AuthState::Pending { .. } => AuthStatus::Pending,
            AuthState::Authenticated(cred) => AuthStatus::Authenticated {
                expires_at: cred.expires_at(),
            },
        }
    }

    /// The state token of the pending authorization, if any.
    pub fn pending_token(&self) -> Option<String> {
        match &lock(&self.state).auth {
            AuthState::Pending { state_token } => Some(state_token.clone()),
            _ => None,
        }
    }

    /// Return the session's client, building it on first use.
    ///
    /// An expired credential is dropped here, returning the session to
    /// `Unauthenticated`. The lock is held only while the client handle is
    /// built, never across a network call.
    pub fn client(&self) -> Result<Arc<dyn BoxApi>, SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        let mut state = lock(&self.state);
        state.last_seen = Instant::now();

        let credential = match &state.auth {
            AuthState::Unauthenticated => return Err(SessionError::NotAuthorized),
            AuthState::Pending { .. } => return Err(SessionError::AuthorizationPending),
            AuthState::Authenticated(cred) => cred,
        };

        if credential.is_expired_at(Utc::now()) {
            info!(session = %self.id, "Credential expired, session is unauthenticated again");
            state.auth = AuthState::Unauthenticated;
            state.client = None;
            return Err(SessionError::TokenExpired);
        }

        if let Some(client) = &state.client {
            return Ok(client.clone());
        }

        let client = self
            .connector
            .connect(credential)
            .map_err(SessionError::Connect)?;
        debug!(session = %self.id, "Box client created");
        state.client = Some(client.clone());
        Ok(client)
    }

    /// Enter `Pending` with a new state token. An authenticated session is
    /// logged out first.
    pub(crate) fn begin_pending(&self, state_token: &str) {
        let mut state = lock(&self.state);
        if matches!(state.auth, AuthState::Authenticated(_)) {
            info!(session = %self.id, "Re-authorization requested, logging out current credential");
        }
        state.client = None;
        state.auth = AuthState::Pending {
            state_token: state_token.to_string(),
        };
    }

    /// Move to `Authenticated`.
    ///
    /// With `expected_pending`, the transition only happens if the session is
    /// still waiting on exactly that state token. Returns whether the
    /// credential was attached.
    pub fn attach_credential(&self, credential: Credential, expected_pending: Option<&str>) -> bool {
        if self.is_closed() {
            return false;
        }
        let mut state = lock(&self.state);
        if let Some(expected) = expected_pending {
            match &state.auth {
                AuthState::Pending { state_token } if state_token == expected => {}
                _ => return false,
            }
        }
        state.auth = AuthState::Authenticated(credential);
        state.client = None;
        info!(session = %self.id, "Session authenticated");
        true
    }

    /// Drop back to `Unauthenticated` if still waiting on `state_token`.
    pub(crate) fn expire_pending(&self, state_token: &str) {
        let mut state = lock(&self.state);
        if matches!(&state.auth, AuthState::Pending { state_token: t } if t == state_token) {
            state.auth = AuthState::Unauthenticated;
        }
    }

    /// Explicit logout.
    pub fn logout(&self) {
        let mut state = lock(&self.state);
        state.auth = AuthState::Unauthenticated;
        state.client = None;
    }

    pub fn touch(&self) {
        lock(&self.state).last_seen = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        lock(&self.state).last_seen.elapsed()
    }

    /// Release the client handle. Returns `false` if the session was already
    /// closed, so teardown side effects run once.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        let mut state = lock(&self.state);
        state.client = None;
        state.auth = AuthState::Unauthenticated;
        debug!(session = %self.id, kind = ?self.kind, "Session torn down");
        true
    }
}

impl fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("status", &self.status())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Owns the set of live sessions.
pub struct SessionManager {
    sessions: Mutex<HashMap<SessionId, Arc<SessionContext>>>,
    connector: Arc<dyn BoxConnector>,
    idle_ttl: Duration,
}

impl SessionManager {
    pub fn new(connector: Arc<dyn BoxConnector>, idle_ttl: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            connector,
            idle_ttl,
        }
    }

    /// Return the session bound to `scope`, creating an unauthenticated one
    /// if none exists.
    ///
    /// Connection and ephemeral sessions are torn down when the returned
    /// guard drops. Keyed sessions stay until [`teardown_by_id`] or idle
    /// eviction.
    ///
    /// [`teardown_by_id`]: Self::teardown_by_id
    pub fn acquire(self: &Arc<Self>, scope: SessionScope) -> SessionGuard {
        let (session, release_on_drop) = match scope {
            SessionScope::Connection(id) => (self.get_or_create(id, SessionKind::Connection), true),
            SessionScope::Keyed(id) => (self.get_or_create(id, SessionKind::Keyed), false),
            SessionScope::Ephemeral { bearer } => {
                let id = SessionId::generate();
                let session = match bearer {
                    Some(cred) => SessionContext::with_credential(
                        id,
                        SessionKind::Ephemeral,
                        self.connector.clone(),
                        cred,
                    ),
                    None => SessionContext::new(id, SessionKind::Ephemeral, self.connector.clone()),
                };
                (Arc::new(session), true)
            }
        };
        session.touch();
        SessionGuard {
            session,
            manager: Arc::downgrade(self),
            release_on_drop,
        }
    }

    fn get_or_create(&self, id: SessionId, kind: SessionKind) -> Arc<SessionContext> {
        let mut sessions = lock(&self.sessions);
        match sessions.get(&id) {
            Some(existing) if !existing.is_closed() => return existing.clone(),
            _ => {}
        }
        debug!(session = %id, ?kind, "Creating session");
        let session = Arc::new(SessionContext::new(id.clone(), kind, self.connector.clone()));
        sessions.insert(id, session.clone());
        session
    }

    /// Guard on an existing live keyed session, or `None` if `id` names none.
    pub fn resume(self: &Arc<Self>, id: &SessionId) -> Option<SessionGuard> {
        let session = lock(&self.sessions)
            .get(id)
            .filter(|s| s.kind() == SessionKind::Keyed && !s.is_closed())
            .cloned()?;
        session.touch();
        Some(SessionGuard {
            session,
            manager: Arc::downgrade(self),
            release_on_drop: false,
        })
    }

    pub fn get(&self, id: &SessionId) -> Option<Arc<SessionContext>> {
        lock(&self.sessions).get(id).cloned()
    }

    /// Attach a credential to `session` unconditionally.
    pub fn attach_credential(&self, session: &SessionContext, credential: Credential) -> bool {
        session.attach_credential(credential, None)
    }

    /// Remove `session` from the set and release its client.
    pub fn teardown(&self, session: &Arc<SessionContext>) -> bool {
        {
            let mut sessions = lock(&self.sessions);
            if sessions
                .get(session.id())
                .is_some_and(|s| Arc::ptr_eq(s, session))
            {
                sessions.remove(session.id());
            }
        }
        session.close()
    }

    pub fn teardown_by_id(&self, id: &SessionId) -> bool {
        let removed = lock(&self.sessions).remove(id);
        removed.is_some_and(|s| s.close())
    }

    /// Tear down keyed sessions idle for longer than the configured TTL.
    pub fn evict_idle(&self) -> usize {
        let stale: Vec<Arc<SessionContext>> = {
            let mut sessions = lock(&self.sessions);
            let ids: Vec<SessionId> = sessions
                .values()
                .filter(|s| s.kind() == SessionKind::Keyed && s.idle_for() >= self.idle_ttl)
                .map(|s| s.id().clone())
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };
        for session in &stale {
            info!(session = %session.id(), "Evicting idle session");
            session.close();
        }
        stale.len()
    }

    /// Tear down every session. Used at shutdown.
    pub fn teardown_all(&self) -> usize {
        let all: Vec<Arc<SessionContext>> = lock(&self.sessions).drain().map(|(_, s)| s).collect();
        all.iter().filter(|s| s.close()).count()
    }

    pub fn len(&self) -> usize {
        lock(&self.sessions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Holds a session for the duration of a scope.
pub struct SessionGuard {
    session: Arc<SessionContext>,
    manager: std::sync::Weak<SessionManager>,
    release_on_drop: bool,
}

impl SessionGuard {
    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }
}

impl std::ops::Deref for SessionGuard {
    type Target = Arc<SessionContext>;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.release_on_drop {
            return;
        }
        match self.manager.upgrade() {
            Some(manager) => {
                manager.teardown(&self.session);
            }
            None => {
                self.session.close();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::box_api::fake::{FakeBoxApi, FakeConnector};
    use chrono::Duration as ChronoDuration;

    fn manager() -> (Arc<SessionManager>, Arc<FakeConnector>) {
        let connector = FakeConnector::new(FakeBoxApi::new());
        let manager = Arc::new(SessionManager::new(
            connector.clone(),
            Duration::from_secs(3600),
        ));
        (manager, connector)
    }

    #[test]
    fn test_acquire_keyed_returns_same_session() {
        let (manager, _) = manager();
        let id = SessionId::from("abc");
        let a = manager.acquire(SessionScope::Keyed(id.clone()));
        let b = manager.acquire(SessionScope::Keyed(id));
        assert!(Arc::ptr_eq(a.session(), b.session()));
        assert_eq!(a.status(), AuthStatus::Unauthenticated);
        drop(a);
        drop(b);
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_resume_only_finds_live_keyed_sessions() {
        let (manager, _) = manager();
        let id = SessionId::from("abc");
        assert!(manager.resume(&id).is_none());
        assert!(manager.is_empty());

        let keyed = manager.acquire(SessionScope::Keyed(id.clone()));
        let resumed = manager.resume(&id).unwrap();
        assert!(Arc::ptr_eq(keyed.session(), resumed.session()));
        drop(resumed);
        assert!(!keyed.is_closed());

        let conn = SessionId::generate();
        let _guard = manager.acquire(SessionScope::Connection(conn.clone()));
        assert!(manager.resume(&conn).is_none());

        manager.teardown_by_id(&id);
        assert!(manager.resume(&id).is_none());
    }

    #[test]
    fn test_connection_guard_tears_down_once() {
        let (manager, _) = manager();
        let guard = manager.acquire(SessionScope::Connection(SessionId::generate()));
        let session = guard.session().clone();
        assert_eq!(manager.len(), 1);
        drop(guard);
        assert!(session.is_closed());
        assert!(manager.is_empty());
        assert!(!session.close());
    }

    #[test]
    fn test_ephemeral_not_stored_and_uses_bearer() {
        let (manager, connector) = manager();
        let guard = manager.acquire(SessionScope::Ephemeral {
            bearer: Some(Credential::bearer("tok")),
        });
        assert!(manager.is_empty());
        assert!(guard.client().is_ok());
        assert_eq!(connector.tokens(), vec!["tok".to_string()]);
        let session = guard.session().clone();
        drop(guard);
        assert!(session.is_closed());
    }

    #[test]
    fn test_client_requires_authentication() {
        let (manager, _) = manager();
        let guard = manager.acquire(SessionScope::Ephemeral { bearer: None });
        assert_eq!(guard.client().err(), Some(SessionError::NotAuthorized));

        guard.begin_pending("t1");
        assert_eq!(guard.client().err(), Some(SessionError::AuthorizationPending));
    }

    #[test]
    fn test_client_built_once_per_credential() {
        let (manager, connector) = manager();
        let guard = manager.acquire(SessionScope::Keyed(SessionId::generate()));
        assert!(manager.attach_credential(&guard, Credential::bearer("a")));
        guard.client().unwrap();
        guard.client().unwrap();
        assert_eq!(connector.connects(), 1);
    }

    #[test]
    fn test_attach_requires_matching_pending_token() {
        let (manager, _) = manager();
        let guard = manager.acquire(SessionScope::Keyed(SessionId::generate()));
        guard.begin_pending("t1");
        guard.begin_pending("t2");
        assert!(!guard.attach_credential(Credential::bearer("x"), Some("t1")));
        assert_eq!(guard.status(), AuthStatus::Pending);
        assert!(guard.attach_credential(Credential::bearer("x"), Some("t2")));
        assert!(matches!(guard.status(), AuthStatus::Authenticated { .. }));
    }

    #[test]
    fn test_expired_credential_returns_to_unauthenticated() {
        let (manager, _) = manager();
        let guard = manager.acquire(SessionScope::Keyed(SessionId::generate()));
        let past = Utc::now() - ChronoDuration::seconds(5);
        guard.attach_credential(Credential::bearer("old").with_expiry(past), None);

        assert_eq!(guard.client().err(), Some(SessionError::TokenExpired));
        assert_eq!(guard.status(), AuthStatus::Unauthenticated);
    }

    #[test]
    fn test_begin_pending_logs_out() {
        let (manager, _) = manager();
        let guard = manager.acquire(SessionScope::Keyed(SessionId::generate()));
        guard.attach_credential(Credential::bearer("a"), None);
        guard.begin_pending("t");
        assert_eq!(guard.status(), AuthStatus::Pending);
        assert_eq!(guard.pending_token().as_deref(), Some("t"));
    }

    #[test]
    fn test_evict_idle_only_keyed() {
        let connector = FakeConnector::new(FakeBoxApi::new());
        let manager = Arc::new(SessionManager::new(connector, Duration::ZERO));
        let keyed = manager.acquire(SessionScope::Keyed(SessionId::generate()));
        let conn = manager.acquire(SessionScope::Connection(SessionId::generate()));

        assert_eq!(manager.evict_idle(), 1);
        assert!(keyed.is_closed());
        assert!(!conn.is_closed());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_teardown_all() {
        let (manager, _) = manager();
        let a = manager.acquire(SessionScope::Keyed(SessionId::generate()));
        let b = manager.acquire(SessionScope::Keyed(SessionId::generate()));
        assert_eq!(manager.teardown_all(), 2);
        assert!(a.is_closed() && b.is_closed());
        assert!(manager.is_empty());
    }

    #[test]
    fn test_closed_keyed_id_gets_fresh_session() {
        let (manager, _) = manager();
        let id = SessionId::from("k");
        let first = manager.acquire(SessionScope::Keyed(id.clone()));
        assert!(manager.teardown_by_id(&id));
        let second = manager.acquire(SessionScope::Keyed(id));
        assert!(!Arc::ptr_eq(first.session(), second.session()));
        assert!(!second.is_closed());
    }
}
