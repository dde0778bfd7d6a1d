//! Request description passed to the [`BoxApi`](super::BoxApi) collaborator.
//!
//! Tool bodies describe *what* to call; the client decides how to send it.
//! Keeping the description plain data lets tests assert on it directly.

use bytes::Bytes;
use reqwest::Method;
use serde_json::Value;

/// Which base URL a request targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiHost {
    /// Content API (`https://api.box.com/2.0`).
    Api,
    /// Upload API (`https://upload.box.com/api/2.0`).
    Upload,
    /// `path` is already an absolute URL (e.g. a representation download).
    Absolute,
}

/// File part of a multipart upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadPart {
    /// Upload attributes (`name`, `parent.id`).
    pub attributes: Value,
    /// File name sent with the part.
    pub file_name: String,
    /// Raw file content.
    pub content: Bytes,
}

/// Request body.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiBody {
    Empty,
    Json(Value),
    /// JSON-Patch document (`application/json-patch+json`).
    JsonPatch(Value),
    Multipart(UploadPart),
}

/// A single call against the Box API.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub host: ApiHost,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: ApiBody,
}

impl ApiRequest {
    fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            host: ApiHost::Api,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: ApiBody::Empty,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// GET an absolute URL.
    pub fn absolute(url: impl Into<String>) -> Self {
        Self {
            host: ApiHost::Absolute,
            ..Self::get(url)
        }
    }

    /// Add a query parameter.
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Add a query parameter when a value is present.
    pub fn query_opt<T: ToString>(self, key: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.query(key, v),
            None => self,
        }
    }

    /// Add a comma-joined list parameter when the list is non-empty.
    pub fn query_list(self, key: &str, values: Option<&[String]>) -> Self {
        match values {
            Some(v) if !v.is_empty() => self.query(key, v.join(",")),
            _ => self,
        }
    }

    /// Add a request header.
    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = ApiBody::Json(body);
        self
    }

    pub fn json_patch(mut self, body: Value) -> Self {
        self.body = ApiBody::JsonPatch(body);
        self
    }

    /// Turn this into a multipart upload against the upload host.
    pub fn upload(mut self, part: UploadPart) -> Self {
        self.host = ApiHost::Upload;
        self.body = ApiBody::Multipart(part);
        self
    }

    /// Value of a query parameter, if set.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}
