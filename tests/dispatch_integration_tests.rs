//! # Dispatch Integration Tests
//!
//! End-to-end tests over the assembled engine: a routes tree on disk, a
//! loader binding test handlers, and real HTTP requests through the axum
//! service. Covers matching outcomes, error bodies, middleware behavior and
//! atomic re-scans.

use async_trait::async_trait;
use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use dirroute::core::config::{AppConfig, QueryConfig};
use dirroute::dispatch::{HandlerLoader, LoaderError, RouteBinding};
use dirroute::manifest::RouteDescriptor;
use dirroute::middleware::{handler_fn, Middleware, Next, Pipeline};
use dirroute::{ApiError, ApiResult, Engine, RequestContext};

fn touch(root: &Path, rel: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, "// handler\n").unwrap();
}

fn routes_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    touch(root, "users/route.get.ts");
    touch(root, "users/route.post.ts");
    touch(root, "users/[id]/route.get.ts");
    touch(root, "files/[...path].get.ts");
    touch(root, "search/route.get.ts");
    touch(root, "guarded/route.get.ts");
    touch(root, "clash/route.get.ts");
    touch(root, "slow/route.get.ts");
    dir
}

fn test_config(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.routes.dir = dir.path().to_path_buf();
    config.server.max_body_size = 1024;
    config.server.request_timeout = Duration::from_millis(200);
    config.query = QueryConfig {
        parse_arrays: true,
        array_delimiter: ",".to_string(),
        parse_numbers: true,
        parse_booleans: true,
    };
    config
}

/// Rejects requests without an `x-token` header by writing a 403 and not
/// proceeding.
struct Guard;

#[async_trait]
impl Middleware for Guard {
    fn name(&self) -> &str {
        "guard"
    }

    async fn handle(&self, ctx: &mut RequestContext, next: &mut Next<'_>) -> ApiResult<()> {
        if ctx.header("x-token").is_none() {
            return ctx
                .response
                .send_json(StatusCode::FORBIDDEN, &json!({"blocked": true}));
        }
        next.proceed(ctx).await
    }
}

/// Writes a response and proceeds anyway; the handler's later write must be
/// rejected without touching this one.
struct EagerWriter;

#[async_trait]
impl Middleware for EagerWriter {
    fn name(&self) -> &str {
        "eager-writer"
    }

    async fn handle(&self, ctx: &mut RequestContext, next: &mut Next<'_>) -> ApiResult<()> {
        ctx.response
            .send_json(StatusCode::ACCEPTED, &json!({"writer": "middleware"}))?;
        next.proceed(ctx).await
    }
}

/// Binds each route in the test tree to a purpose-built handler.
struct TestLoader;

impl HandlerLoader for TestLoader {
    fn load(&self, descriptor: &RouteDescriptor) -> Result<RouteBinding, LoaderError> {
        let binding = match descriptor.path.as_str() {
            "/users" if descriptor.method == Some(axum::http::Method::POST) => {
                RouteBinding::new(handler_fn(|ctx| {
                    Box::pin(async move {
                        let body = ctx.body_json()?;
                        ctx.response
                            .send_json(StatusCode::CREATED, &json!({"created": body}))
                    })
                }))
            }
            "/users" => RouteBinding::new(handler_fn(|ctx| {
                Box::pin(async move {
                    ctx.response
                        .send_json(StatusCode::OK, &json!({"users": ["ada", "grace"]}))
                })
            })),
            "/users/:id" => RouteBinding::new(handler_fn(|ctx| {
                Box::pin(async move {
                    let id = ctx
                        .param("id")
                        .ok_or_else(|| ApiError::internal("missing id param"))?
                        .to_string();
                    ctx.response.send_json(StatusCode::OK, &json!({"id": id}))
                })
            })),
            "/files/*path" => RouteBinding::new(handler_fn(|ctx| {
                Box::pin(async move {
                    let path = ctx
                        .param("path")
                        .ok_or_else(|| ApiError::internal("missing path param"))?
                        .to_string();
                    ctx.response.send_json(StatusCode::OK, &json!({"file": path}))
                })
            })),
            "/search" => RouteBinding::new(handler_fn(|ctx| {
                Box::pin(async move {
                    let query = ctx.query().clone();
                    ctx.response.send_json(StatusCode::OK, &json!(query))
                })
            })),
            "/guarded" => RouteBinding::new(handler_fn(|ctx| {
                Box::pin(async move {
                    ctx.response
                        .send_json(StatusCode::OK, &json!({"secret": 42}))
                })
            }))
            .with_middleware(Arc::new(Guard)),
            "/clash" => RouteBinding::new(handler_fn(|ctx| {
                Box::pin(async move {
                    ctx.response
                        .send_json(StatusCode::OK, &json!({"writer": "handler"}))
                })
            }))
            .with_middleware(Arc::new(EagerWriter)),
            "/slow" => RouteBinding::new(handler_fn(|ctx| {
                Box::pin(async move {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    ctx.response.send_json(StatusCode::OK, &json!({"late": true}))
                })
            })),
            _ => RouteBinding::new(handler_fn(|ctx| {
                Box::pin(async move { ctx.response.send("ok") })
            })),
        };
        Ok(binding)
    }
}

fn test_server(config: AppConfig) -> TestServer {
    let engine = Engine::new(config, Arc::new(TestLoader), Pipeline::builder().build()).unwrap();
    TestServer::new(engine.app()).unwrap()
}

/// Test a literal route resolves and the handler response comes through.
#[tokio::test]
async fn test_literal_route_dispatch() {
    let dir = routes_tree();
    let server = test_server(test_config(&dir));

    let response = server.get("/users").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!({"users": ["ada", "grace"]}));
}

/// Test path parameters reach the handler decoded.
#[tokio::test]
async fn test_param_and_catch_all_extraction() {
    let dir = routes_tree();
    let server = test_server(test_config(&dir));

    let response = server.get("/users/jane%20doe").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!({"id": "jane doe"}));

    let response = server.get("/files/docs/guide/intro.md").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response.json::<Value>(),
        json!({"file": "docs/guide/intro.md"})
    );
}

/// Test the structured 404 body for an unmatched path.
#[tokio::test]
async fn test_not_found_body() {
    let dir = routes_tree();
    let server = test_server(test_config(&dir));

    let response = server.get("/nope").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);

    let body = response.json::<Value>();
    assert_eq!(body["error"]["code"], 404);
    assert_eq!(body["error"]["type"], "not_found");
    assert!(body["error"]["correlation_id"].is_string());
}

/// Test a known path under a wrong method yields 405 with an Allow header.
#[tokio::test]
async fn test_method_not_allowed() {
    let dir = routes_tree();
    let server = test_server(test_config(&dir));

    let response = server.delete("/users").await;
    assert_eq!(response.status_code(), StatusCode::METHOD_NOT_ALLOWED);

    let allow = response.headers().get("allow").unwrap().to_str().unwrap();
    assert!(allow.contains("GET"));
    assert!(allow.contains("POST"));

    let body = response.json::<Value>();
    assert_eq!(body["error"]["type"], "method_not_allowed");
}

/// Test the JSON body is decoded once and handed to the handler.
#[tokio::test]
async fn test_post_body_roundtrip() {
    let dir = routes_tree();
    let server = test_server(test_config(&dir));

    let response = server.post("/users").json(&json!({"name": "ada"})).await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    assert_eq!(
        response.json::<Value>(),
        json!({"created": {"name": "ada"}})
    );
}

/// Test a malformed JSON body maps to a 400 with the structured error body.
#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let dir = routes_tree();
    let server = test_server(test_config(&dir));

    let response = server.post("/users").text("{not json").await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["type"], "bad_request");
}

/// Test query coercion: arrays split on the delimiter, numbers and booleans
/// coerced, plain strings left alone.
#[tokio::test]
async fn test_query_coercion() {
    let dir = routes_tree();
    let server = test_server(test_config(&dir));

    let response = server
        .get("/search")
        .add_query_param("tags", "a,b")
        .add_query_param("count", "3")
        .add_query_param("active", "true")
        .add_query_param("q", "hello")
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(
        response.json::<Value>(),
        json!({
            "tags": ["a", "b"],
            "count": 3,
            "active": true,
            "q": "hello",
        })
    );
}

/// Test a route middleware can short-circuit without the handler running,
/// and lets authorized requests through.
#[tokio::test]
async fn test_route_middleware_short_circuit() {
    let dir = routes_tree();
    let server = test_server(test_config(&dir));

    let response = server.get("/guarded").await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(response.json::<Value>(), json!({"blocked": true}));

    let response = server
        .get("/guarded")
        .add_header(
            axum::http::HeaderName::from_static("x-token"),
            axum::http::HeaderValue::from_static("valid"),
        )
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.json::<Value>(), json!({"secret": 42}));
}

/// Test the first response writer wins: a later write attempt is rejected
/// and the client sees the first response untouched.
#[tokio::test]
async fn test_first_response_writer_wins() {
    let dir = routes_tree();
    let server = test_server(test_config(&dir));

    let response = server.get("/clash").await;
    assert_eq!(response.status_code(), StatusCode::ACCEPTED);
    assert_eq!(response.json::<Value>(), json!({"writer": "middleware"}));
}

/// Test an oversized request body is rejected with 413 before dispatch.
#[tokio::test]
async fn test_oversized_body_rejected() {
    let dir = routes_tree();
    let server = test_server(test_config(&dir));

    let big = "x".repeat(4096);
    let response = server.post("/users").text(big).await;
    assert_eq!(response.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(
        response.json::<Value>()["error"]["type"],
        "payload_too_large"
    );
}

/// Test a handler overrunning the request timeout maps to 408.
#[tokio::test]
async fn test_request_timeout() {
    let dir = routes_tree();
    let server = test_server(test_config(&dir));

    let response = server.get("/slow").await;
    assert_eq!(response.status_code(), StatusCode::REQUEST_TIMEOUT);
    assert_eq!(response.json::<Value>()["error"]["type"], "request_timeout");
}

/// Test a re-scan atomically exposes routes added after startup.
#[tokio::test]
async fn test_rescan_swaps_route_table() {
    let dir = routes_tree();
    let config = test_config(&dir);
    let engine = Engine::new(config, Arc::new(TestLoader), Pipeline::builder().build()).unwrap();
    let server = TestServer::new(engine.app()).unwrap();

    assert_eq!(
        server.get("/late").await.status_code(),
        StatusCode::NOT_FOUND
    );

    touch(dir.path(), "late/route.get.ts");
    engine.rescan().unwrap();

    assert_eq!(server.get("/late").await.status_code(), StatusCode::OK);
}
