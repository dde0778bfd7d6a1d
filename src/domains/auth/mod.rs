//! Authorization domain.
//!
//! Session contexts, the pending-authorization store and the OAuth callback
//! correlator that ties a browser redirect back to the session which asked
//! for it.

mod correlator;
mod credential;
mod error;
mod oauth;
pub mod pages;
mod pending;
mod session;
mod sweeper;

#[cfg(test)]
pub(crate) mod fake;

pub use correlator::{AuthorizationRequest, CallbackCorrelator, CallbackParams};
pub use credential::{Credential, TokenResponse};
pub use error::{AuthorizeError, CallbackError, ExchangeError, SessionError, StateRejection};
pub use oauth::{BoxOAuthClient, CodeExchanger, UnconfiguredExchanger, build_authorize_url};
pub use pending::{PendingAuthorization, PendingStatus, PendingStore, SweepStats};
pub use session::{
    AuthStatus, SessionContext, SessionGuard, SessionId, SessionKind, SessionManager, SessionScope,
};
pub use sweeper::{spawn_sweeper, sweep_once};
