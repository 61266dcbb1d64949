//! # Dispatcher
//!
//! The single entry point bound to the transport. For each inbound request
//! it builds a context, resolves the route, runs the middleware pipeline and
//! finalizes exactly one response — mapping match outcomes and typed errors
//! to HTTP responses, and logging internal faults under a correlation id
//! without leaking detail to the client.

use arc_swap::ArcSwap;
use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::{header, HeaderValue, Method};
use axum::response::Response;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::core::config::{AppConfig, QueryConfig, ServerConfig};
use crate::core::context::RequestContext;
use crate::core::error::ApiError;
use crate::dispatch::registry::HandlerRegistry;
use crate::manifest::{RouteInfo, RouteManifest};
use crate::middleware::Pipeline;
use crate::routing::{MatchOutcome, Matcher};

/// The immutable pair a request dispatches against.
///
/// Re-scans build a fresh table that replaces the current one atomically;
/// in-flight requests keep the table they loaded.
pub struct DispatchTable {
    pub matcher: Matcher,
    pub registry: Arc<HandlerRegistry>,
}

impl DispatchTable {
    pub fn new(manifest: Arc<RouteManifest>, registry: Arc<HandlerRegistry>) -> Self {
        Self {
            matcher: Matcher::new(manifest),
            registry,
        }
    }
}

/// Orchestrates Matcher → Pipeline → Handler → finalization per request.
pub struct Dispatcher {
    table: ArcSwap<DispatchTable>,
    pipeline: Pipeline,
    server: ServerConfig,
    query: Arc<QueryConfig>,
}

impl Dispatcher {
    pub fn new(
        manifest: Arc<RouteManifest>,
        registry: Arc<HandlerRegistry>,
        pipeline: Pipeline,
        config: &AppConfig,
    ) -> Self {
        Self {
            table: ArcSwap::from_pointee(DispatchTable::new(manifest, registry)),
            pipeline,
            server: config.server.clone(),
            query: Arc::new(config.query.clone()),
        }
    }

    /// Atomically replace the route table (manifest re-scan).
    pub fn swap_table(&self, manifest: Arc<RouteManifest>, registry: Arc<HandlerRegistry>) {
        self.table
            .store(Arc::new(DispatchTable::new(manifest, registry)));
    }

    /// Read-only manifest snapshot for observability consumers.
    pub fn snapshot(&self) -> Vec<RouteInfo> {
        self.table.load().matcher.manifest().snapshot()
    }

    /// Handle one inbound request end to end.
    pub async fn dispatch(&self, request: Request) -> Response {
        let table = self.table.load_full();
        let (parts, body) = request.into_parts();

        // The body-size bound is the sole backpressure mechanism; exceeding
        // it aborts the request before any further buffering. A mid-read
        // transport failure is the client's fault, not an oversized body.
        let bytes = match to_bytes(body, self.server.max_body_size).await {
            Ok(bytes) => bytes,
            Err(read_err) => {
                let err = if is_length_limit(&read_err) {
                    ApiError::payload_too_large(format!(
                        "request body exceeds maximum of {} bytes",
                        self.server.max_body_size
                    ))
                } else {
                    ApiError::bad_request("failed to read request body")
                };
                let correlation_id = uuid::Uuid::new_v4().to_string();
                warn!(
                    correlation_id = %correlation_id,
                    method = %parts.method,
                    path = %parts.uri.path(),
                    error = %read_err,
                    "request body unreadable"
                );
                return error_response(&err, &correlation_id, None);
            }
        };

        let mut ctx = RequestContext::new(
            parts.method,
            parts.uri.path().to_string(),
            parts.uri.query().map(str::to_string),
            parts.headers,
            bytes,
            self.query.clone(),
        );

        debug!(
            correlation_id = %ctx.correlation_id,
            method = %ctx.method,
            path = %ctx.path,
            "dispatching request"
        );

        match table.matcher.resolve(&ctx.method, &ctx.path) {
            MatchOutcome::NotFound => {
                let err = ApiError::not_found(format!("no route for {}", ctx.path));
                error_response(&err, &ctx.correlation_id, None)
            }
            MatchOutcome::MethodNotAllowed { allowed } => {
                let err = ApiError::method_not_allowed(format!(
                    "{} is not allowed for {}",
                    ctx.method, ctx.path
                ))
                .with_detail(json!({
                    "allowed": allowed.iter().map(Method::to_string).collect::<Vec<_>>()
                }));
                error_response(&err, &ctx.correlation_id, Some(&allowed))
            }
            MatchOutcome::Matched { route, params } => {
                ctx.params = params;

                let Some(binding) = table.registry.get(route.id) else {
                    // startup binds every descriptor, so this is a fault
                    error!(
                        correlation_id = %ctx.correlation_id,
                        route = %route.path,
                        source = %route.source.display(),
                        "matched route has no bound handler"
                    );
                    let err = ApiError::internal("route has no bound handler");
                    return error_response(&err, &ctx.correlation_id, None);
                };

                let run = self
                    .pipeline
                    .run(&binding.middlewares, binding.handler.as_ref(), &mut ctx);
                let result = match tokio::time::timeout(self.server.request_timeout, run).await {
                    Ok(result) => result,
                    Err(_) => Err(ApiError::request_timeout(format!(
                        "request exceeded {}",
                        humantime::format_duration(self.server.request_timeout)
                    ))),
                };

                self.finalize(ctx, result)
            }
        }
    }

    /// Exactly one finalized response per request: the first writer wins.
    fn finalize(&self, ctx: RequestContext, result: Result<(), ApiError>) -> Response {
        match result {
            Ok(()) => ctx.response.finalize(),
            Err(err) if ctx.response.is_sent() => {
                // a stage failed after the response was finalized; keep the
                // first response and log the failure
                warn!(
                    correlation_id = %ctx.correlation_id,
                    method = %ctx.method,
                    path = %ctx.path,
                    error = %err,
                    "pipeline error after response was sent"
                );
                ctx.response.finalize()
            }
            Err(err) => {
                if err.is_internal() {
                    error!(
                        correlation_id = %ctx.correlation_id,
                        method = %ctx.method,
                        path = %ctx.path,
                        error = %err,
                        "request failed with internal fault"
                    );
                } else {
                    debug!(
                        correlation_id = %ctx.correlation_id,
                        method = %ctx.method,
                        path = %ctx.path,
                        error = %err,
                        "request failed"
                    );
                }
                error_response(&err, &ctx.correlation_id, None)
            }
        }
    }
}

/// Whether a body-read failure was the configured size limit tripping, as
/// opposed to a transport error mid-read.
fn is_length_limit(err: &axum::Error) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(inner) = current {
        if inner.is::<http_body_util::LengthLimitError>() {
            return true;
        }
        current = inner.source();
    }
    false
}

/// Build the structured JSON error response for a typed error.
fn error_response(err: &ApiError, correlation_id: &str, allowed: Option<&[Method]>) -> Response {
    let body = err.to_body(correlation_id);
    let bytes = serde_json::to_vec(&body).unwrap_or_default();

    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = err.status_code();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );

    if let Some(allowed) = allowed {
        let list = allowed
            .iter()
            .map(Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if let Ok(value) = HeaderValue::from_str(&list) {
            response.headers_mut().insert(header::ALLOW, value);
        }
    }

    response
}
