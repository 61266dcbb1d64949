//! # Request/Response Context
//!
//! Per-request mutable state threaded through the middleware pipeline. A
//! context is created fresh by the dispatcher for every inbound request,
//! owned exclusively by that request's task, and destroyed when the response
//! is finalized or the connection is aborted.

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::Response;
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::core::config::QueryConfig;
use crate::core::error::{ApiError, ApiResult};
use crate::core::query::parse_query;

/// Per-request state shared by every pipeline stage.
///
/// The immutable input facet (method, path, query, headers, body bytes) is
/// captured at construction. Derived facets — path params, parsed query,
/// parsed body — are computed lazily, each at most once. The scratch store
/// lets middlewares pass data forward under namespaced string keys
/// (`"timing.start"` rather than `"start"`).
#[derive(Debug)]
pub struct RequestContext {
    /// Correlation identifier for logs and error bodies
    pub correlation_id: String,

    /// HTTP method of the request
    pub method: Method,

    /// Raw request path, before normalization
    pub path: String,

    /// Raw query string, without the leading `?`
    pub raw_query: Option<String>,

    /// Request headers
    pub headers: HeaderMap,

    /// Request body bytes, already bounded by the configured maximum size
    pub body: Bytes,

    /// Path parameters extracted by the matcher; empty until a route matched
    pub params: HashMap<String, String>,

    /// Response-writing primitives; first writer wins
    pub response: ResponseWriter,

    /// Timestamp the context was created
    pub started_at: Instant,

    query_config: Arc<QueryConfig>,
    parsed_query: Option<HashMap<String, Value>>,
    parsed_body: Option<ApiResult<Value>>,
    store: HashMap<String, Value>,
}

impl RequestContext {
    pub fn new(
        method: Method,
        path: String,
        raw_query: Option<String>,
        headers: HeaderMap,
        body: Bytes,
        query_config: Arc<QueryConfig>,
    ) -> Self {
        Self {
            correlation_id: Uuid::new_v4().to_string(),
            method,
            path,
            raw_query,
            headers,
            body,
            params: HashMap::new(),
            response: ResponseWriter::new(),
            started_at: Instant::now(),
            query_config,
            parsed_query: None,
            parsed_body: None,
            store: HashMap::new(),
        }
    }

    /// Get a request header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// A single extracted path parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Parsed query parameters, coerced per configuration.
    ///
    /// Parsed on first access and cached for the rest of the request.
    pub fn query(&mut self) -> &HashMap<String, Value> {
        if self.parsed_query.is_none() {
            let raw = self.raw_query.as_deref().unwrap_or("");
            self.parsed_query = Some(parse_query(raw, &self.query_config));
        }
        self.parsed_query.as_ref().expect("query parsed above")
    }

    /// The request body decoded as JSON.
    ///
    /// Decoding happens exactly once; repeated calls within the request
    /// return the same value (or the same parse error). An empty body is a
    /// bad request, matching a handler that asked for one.
    pub fn body_json(&mut self) -> ApiResult<Value> {
        if self.parsed_body.is_none() {
            let result = if self.body.is_empty() {
                Err(ApiError::bad_request("request body is empty"))
            } else {
                serde_json::from_slice(&self.body)
                    .map_err(|e| ApiError::bad_request(format!("malformed JSON body: {e}")))
            };
            self.parsed_body = Some(result);
        }
        self.parsed_body.as_ref().expect("body parsed above").clone()
    }

    /// Store a value for later pipeline stages. Last write wins.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.store.insert(key.into(), value);
    }

    /// Read a value a previous stage stored.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.store.get(key)
    }

    /// Elapsed time since the context was created.
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}

/// Response state with one-shot send semantics.
///
/// Status and headers may be staged freely until a body write finalizes the
/// response; from then on every mutation fails with a `ResponseAlreadySent`
/// error. The dispatcher logs those and keeps the first response intact.
#[derive(Debug)]
pub struct ResponseWriter {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    sent: bool,
}

impl ResponseWriter {
    fn new() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            sent: false,
        }
    }

    /// Whether a body write already finalized this response.
    pub fn is_sent(&self) -> bool {
        self.sent
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Stage the response status. Fails once the response is sent.
    pub fn set_status(&mut self, status: StatusCode) -> ApiResult<()> {
        self.guard("set_status")?;
        self.status = status;
        Ok(())
    }

    /// Stage a response header. Fails once the response is sent.
    pub fn insert_header(&mut self, name: HeaderName, value: HeaderValue) -> ApiResult<()> {
        self.guard("insert_header")?;
        self.headers.insert(name, value);
        Ok(())
    }

    /// Write the response body and finalize. The first writer wins; any
    /// later write attempt is rejected without touching the first response.
    pub fn send(&mut self, body: impl Into<Bytes>) -> ApiResult<()> {
        self.guard("send")?;
        self.body = body.into();
        self.sent = true;
        Ok(())
    }

    /// Serialize `data` as the JSON response body with the given status.
    pub fn send_json<T: Serialize>(&mut self, status: StatusCode, data: &T) -> ApiResult<()> {
        self.guard("send_json")?;
        let body =
            serde_json::to_vec(data).map_err(|e| ApiError::internal(format!("serialize: {e}")))?;
        self.status = status;
        self.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        self.body = Bytes::from(body);
        self.sent = true;
        Ok(())
    }

    fn guard(&self, operation: &str) -> ApiResult<()> {
        if self.sent {
            Err(ApiError::response_already_sent(operation))
        } else {
            Ok(())
        }
    }

    /// Consume the writer into a transport response. A pipeline that
    /// completed without writing yields the staged status (200 by default)
    /// with an empty body.
    pub fn finalize(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}
