//! In-memory stand-ins for the remote platform, used by tests.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::{ApiRequest, BoxApi, BoxConnector, UpstreamError};
use crate::domains::auth::Credential;

type Route = (Method, String);

/// Scripted [`BoxApi`]: answers by `(method, path)` and records every call.
#[derive(Default)]
pub struct FakeBoxApi {
    json: Mutex<HashMap<Route, Vec<Result<Value, UpstreamError>>>>,
    bytes: Mutex<HashMap<Route, Result<Bytes, UpstreamError>>>,
    calls: Mutex<Vec<ApiRequest>>,
}

impl FakeBoxApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Answer `method path` with `value`. Repeated calls for the same route
    /// queue responses; the last one is reused once the queue drains.
    pub fn on(&self, method: Method, path: &str, value: Value) -> &Self {
        self.push(method, path, Ok(value))
    }

    pub fn fail(&self, method: Method, path: &str, error: UpstreamError) -> &Self {
        self.push(method, path, Err(error))
    }

    pub fn on_bytes(&self, method: Method, path: &str, body: &[u8]) -> &Self {
        self.bytes
            .lock()
            .unwrap()
            .insert((method, path.to_string()), Ok(Bytes::copy_from_slice(body)));
        self
    }

    fn push(&self, method: Method, path: &str, response: Result<Value, UpstreamError>) -> &Self {
        self.json
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push(response);
        self
    }

    pub fn calls(&self) -> Vec<ApiRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn not_found(request: &ApiRequest) -> UpstreamError {
        UpstreamError {
            status: Some(404),
            code: Some("not_found".to_string()),
            message: format!("no fake route for {} {}", request.method, request.path),
        }
    }
}

#[async_trait]
impl BoxApi for FakeBoxApi {
    async fn send(&self, request: ApiRequest) -> Result<Value, UpstreamError> {
        self.calls.lock().unwrap().push(request.clone());
        let mut routes = self.json.lock().unwrap();
        let key = (request.method.clone(), request.path.clone());
        match routes.get_mut(&key) {
            Some(queue) if queue.len() > 1 => queue.remove(0),
            Some(queue) if queue.len() == 1 => queue[0].clone(),
            _ => Err(Self::not_found(&request)),
        }
    }

    async fn fetch_bytes(&self, request: ApiRequest) -> Result<Bytes, UpstreamError> {
        self.calls.lock().unwrap().push(request.clone());
        let key = (request.method.clone(), request.path.clone());
        self.bytes
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Err(Self::not_found(&request)))
    }
}

/// Connector that hands out the same [`FakeBoxApi`] and counts connections.
pub struct FakeConnector {
    api: Arc<FakeBoxApi>,
    connects: AtomicUsize,
    tokens: Mutex<Vec<String>>,
}

impl FakeConnector {
    pub fn new(api: Arc<FakeBoxApi>) -> Arc<Self> {
        Arc::new(Self {
            api,
            connects: AtomicUsize::new(0),
            tokens: Mutex::new(Vec::new()),
        })
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Access tokens clients were built with, in order.
    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

impl BoxConnector for FakeConnector {
    fn connect(&self, credential: &Credential) -> Result<Arc<dyn BoxApi>, UpstreamError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.tokens
            .lock()
            .unwrap()
            .push(credential.access_token().to_string());
        Ok(self.api.clone())
    }
}
