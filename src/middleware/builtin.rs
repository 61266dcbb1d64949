//! Built-in middlewares.

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use crate::core::context::RequestContext;
use crate::core::error::ApiResult;
use crate::middleware::pipeline::{Middleware, Next};

/// Logs one structured line per request: method, path, status and latency,
/// keyed by the request's correlation id.
///
/// Registered as a global middleware it wraps the whole chain, so the logged
/// latency covers every later stage including the handler.
#[derive(Debug, Default)]
pub struct RequestLogger;

#[async_trait]
impl Middleware for RequestLogger {
    fn name(&self) -> &str {
        "request-logger"
    }

    async fn handle(&self, ctx: &mut RequestContext, next: &mut Next<'_>) -> ApiResult<()> {
        ctx.set(
            "request_logger.start_ms",
            json!(ctx.elapsed().as_millis() as u64),
        );

        let result = next.proceed(ctx).await;

        info!(
            correlation_id = %ctx.correlation_id,
            method = %ctx.method,
            path = %ctx.path,
            status = ctx.response.status().as_u16(),
            elapsed_ms = ctx.elapsed().as_millis() as u64,
            outcome = if result.is_ok() { "ok" } else { "error" },
            "request completed"
        );

        result
    }
}
