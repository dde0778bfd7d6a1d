//! Pending authorization store.
//!
//! Correlates issued OAuth state tokens with the sessions that requested
//! them. All transitions happen under a single lock; the code exchange itself
//! runs after the token has been claimed, outside the lock.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use rand::RngCore;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::{Duration, Instant};
use tracing::debug;

use super::error::StateRejection;
use super::session::{SessionContext, SessionId};

/// Lifecycle of a pending authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStatus {
    Created,
    Redeemed,
    Expired,
    Superseded,
}

impl PendingStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Created)
    }
}

/// A server-held record for one issued state token.
#[derive(Debug, Clone)]
pub struct PendingAuthorization {
    pub state_token: String,
    pub created_at: DateTime<Utc>,
    pub session_id: SessionId,
    pub status: PendingStatus,
    issued: Instant,
    /// When the record reached a terminal status.
    settled: Option<Instant>,
    session: Weak<SessionContext>,
}

impl PendingAuthorization {
    fn settle(&mut self, status: PendingStatus) {
        self.status = status;
        self.settled = Some(Instant::now());
    }
}

/// Result of a sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    /// Created records that timed out.
    pub expired: usize,
    /// Terminal records dropped.
    pub removed: usize,
}

#[derive(Default)]
struct Entries {
    by_token: HashMap<String, PendingAuthorization>,
    /// Current token per session.
    by_session: HashMap<SessionId, String>,
}

/// Process-wide map of pending authorizations.
pub struct PendingStore {
    entries: Mutex<Entries>,
    ttl: Duration,
}

impl PendingStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(Entries::default()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue a new state token for `session`, superseding any token the
    /// session was still waiting on.
    pub fn insert(&self, session: &Arc<SessionContext>) -> PendingAuthorization {
        let state_token = generate_state_token();
        let record = PendingAuthorization {
            state_token: state_token.clone(),
            created_at: Utc::now(),
            session_id: session.id().clone(),
            status: PendingStatus::Created,
            issued: Instant::now(),
            settled: None,
            session: Arc::downgrade(session),
        };

        let mut entries = self.lock();
        let previous = entries
            .by_session
            .insert(session.id().clone(), state_token.clone());
        if let Some(previous) = previous {
            if let Some(old) = entries.by_token.get_mut(&previous) {
                if old.status == PendingStatus::Created {
                    debug!(session = %session.id(), "Superseding pending authorization");
                    old.settle(PendingStatus::Superseded);
                }
            }
        }
        entries.by_token.insert(state_token.clone(), record.clone());
        session.begin_pending(&state_token);
        record
    }

    /// Atomically move a `Created` record to `Redeemed` and return its
    /// session. Only the first claim of a token can succeed.
    pub fn claim(&self, state_token: &str) -> Result<Arc<SessionContext>, StateRejection> {
        let mut entries = self.lock();
        let record = entries
            .by_token
            .get_mut(state_token)
            .ok_or(StateRejection::Unknown)?;

        match record.status {
            PendingStatus::Created => {}
            PendingStatus::Redeemed => return Err(StateRejection::AlreadyRedeemed),
            PendingStatus::Expired => return Err(StateRejection::Expired),
            PendingStatus::Superseded => return Err(StateRejection::Superseded),
        }

        if record.issued.elapsed() >= self.ttl {
            record.settle(PendingStatus::Expired);
            if let Some(session) = record.session.upgrade() {
                session.expire_pending(state_token);
            }
            return Err(StateRejection::Expired);
        }

        let session = match record.session.upgrade() {
            Some(session) if !session.is_closed() => session,
            _ => {
                record.settle(PendingStatus::Expired);
                return Err(StateRejection::SessionClosed);
            }
        };

        record.settle(PendingStatus::Redeemed);
        let session_id = record.session_id.clone();
        if entries
            .by_session
            .get(&session_id)
            .is_some_and(|t| t == state_token)
        {
            entries.by_session.remove(&session_id);
        }
        Ok(session)
    }

    /// Mark a redeemed token as expired after a failed exchange.
    pub fn fail(&self, state_token: &str) {
        let mut entries = self.lock();
        if let Some(record) = entries.by_token.get_mut(state_token) {
            if record.status == PendingStatus::Redeemed {
                record.settle(PendingStatus::Expired);
            }
        }
    }

    pub fn status(&self, state_token: &str) -> Option<PendingStatus> {
        self.lock().by_token.get(state_token).map(|r| r.status)
    }

    /// The token `session` is currently waiting on.
    pub fn pending_for(&self, session: &SessionId) -> Option<String> {
        let entries = self.lock();
        entries
            .by_session
            .get(session)
            .filter(|t| {
                entries
                    .by_token
                    .get(*t)
                    .is_some_and(|r| r.status == PendingStatus::Created)
            })
            .cloned()
    }

    /// Number of records still waiting for a callback.
    pub fn waiting(&self) -> usize {
        self.lock()
            .by_token
            .values()
            .filter(|r| r.status == PendingStatus::Created)
            .count()
    }

    pub fn len(&self) -> usize {
        self.lock().by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expire timed-out records and drop tombstones older than one TTL.
    pub fn sweep(&self) -> SweepStats {
        let mut stats = SweepStats::default();
        let mut entries = self.lock();
        let ttl = self.ttl;

        for record in entries.by_token.values_mut() {
            if record.status == PendingStatus::Created && record.issued.elapsed() >= ttl {
                record.settle(PendingStatus::Expired);
                if let Some(session) = record.session.upgrade() {
                    session.expire_pending(&record.state_token);
                }
                stats.expired += 1;
            }
        }

        let before = entries.by_token.len();
        entries
            .by_token
            .retain(|_, r| !(r.status.is_terminal() && r.settled.is_some_and(|at| at.elapsed() >= ttl)));
        stats.removed = before - entries.by_token.len();

        let Entries {
            by_token,
            by_session,
        } = &mut *entries;
        by_session.retain(|_, token| {
            by_token
                .get(token)
                .is_some_and(|r| r.status == PendingStatus::Created)
        });

        stats
    }

    /// Drop every record. Used at shutdown.
    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.by_token.clear();
        entries.by_session.clear();
    }
}

/// 192 bits of randomness, URL-safe.
fn generate_state_token() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}
