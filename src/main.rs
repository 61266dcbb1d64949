//! # dirroute - Main Entry Point
//!
//! Starts the file-system routing engine: load configuration, scan the
//! routes directory into a manifest, bind every discovered route to the
//! built-in echo handler and serve until shutdown. A broken route tree is
//! fatal here — the process exits instead of serving a partial table.

use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use dirroute::dispatch::{HandlerLoader, LoaderError, RouteBinding};
use dirroute::manifest::RouteDescriptor;
use dirroute::middleware::{handler_fn, Pipeline, RequestLogger};
use dirroute::{AppConfig, Engine, StartupError};

#[tokio::main]
async fn main() {
    init_observability();

    info!("🚀 Starting dirroute engine");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    match startup().await {
        Ok(engine) => {
            if let Err(err) = engine.serve().await {
                error!("Engine terminated: {}", err);
                std::process::exit(1);
            }
        }
        Err(err) => {
            error!("Failed to start engine: {}", err);
            std::process::exit(1);
        }
    }

    info!("✅ Engine shutdown complete");
}

/// Initialize structured logging with an environment-driven filter.
fn init_observability() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dirroute=info,tower_http=warn".into()),
        )
        .init();
}

async fn startup() -> Result<Engine, StartupError> {
    let config = match std::env::var("DIRROUTE_CONFIG") {
        Ok(path) => {
            info!("📋 Loading configuration from {}", path);
            AppConfig::load_from_file(&path).await?
        }
        Err(_) => {
            let mut config = AppConfig::default();
            config.apply_env_overrides()?;
            config
        }
    };

    let pipeline = Pipeline::builder()
        .with_global(Arc::new(RequestLogger))
        .build();

    let engine = Engine::new(config, Arc::new(EchoLoader), pipeline)?;
    info!("🛣️  Route manifest bound, engine ready");
    Ok(engine)
}

/// Binds every route file to a handler echoing the resolved route data.
///
/// Stands in for an embedding application's loader; it lets the engine run
/// against any routes directory without external handler code.
struct EchoLoader;

impl HandlerLoader for EchoLoader {
    fn load(&self, descriptor: &RouteDescriptor) -> Result<RouteBinding, LoaderError> {
        let route_path = descriptor.path.clone();
        let source = descriptor.source.display();

        Ok(RouteBinding::new(handler_fn(move |ctx| {
            let route_path = route_path.clone();
            let source = source.clone();
            Box::pin(async move {
                let query = ctx.query().clone();
                let body = json!({
                    "route": route_path,
                    "source": source,
                    "method": ctx.method.as_str(),
                    "path": ctx.path.clone(),
                    "params": ctx.params.clone(),
                    "query": query,
                });
                ctx.response
                    .send_json(axum::http::StatusCode::OK, &body)
            })
        })))
    }
}
