//! Test double for the code exchange.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::credential::Credential;
use super::error::ExchangeError;
use super::oauth::CodeExchanger;

/// Exchanges any code except [`FakeExchanger::BAD_CODE`] for
/// `token-for-<code>`, counting calls.
#[derive(Default)]
pub struct FakeExchanger {
    calls: AtomicUsize,
}

impl FakeExchanger {
    pub const BAD_CODE: &'static str = "bad-code";

    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CodeExchanger for FakeExchanger {
    async fn exchange(&self, code: &str) -> Result<Credential, ExchangeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if code == Self::BAD_CODE {
            return Err(ExchangeError("400 (invalid_grant): Auth code is invalid".to_string()));
        }
        Ok(Credential::bearer(format!("token-for-{}", code)))
    }
}
