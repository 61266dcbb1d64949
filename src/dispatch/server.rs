//! # Engine
//!
//! Wires the whole stack together: scan the routes directory into a
//! manifest, bind handlers through the loader, and expose the dispatcher as
//! an axum service. Manifest errors here are fatal — the engine refuses to
//! start with a broken route tree.

use axum::extract::{Request, State};
use axum::response::Response;
use axum::Router;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::core::config::{AppConfig, ConfigError};
use crate::dispatch::dispatcher::Dispatcher;
use crate::dispatch::registry::{HandlerLoader, HandlerRegistry, LoaderError};
use crate::manifest::{ManifestBuilder, ManifestError};
use crate::middleware::Pipeline;

/// Anything that prevents the engine from serving traffic.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("manifest error: {0}")]
    Manifest(#[from] ManifestError),

    #[error("handler loading error: {0}")]
    Loader(#[from] LoaderError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// The assembled routing engine.
pub struct Engine {
    config: AppConfig,
    loader: Arc<dyn HandlerLoader>,
    dispatcher: Arc<Dispatcher>,
}

impl Engine {
    /// Scan the configured routes directory, bind every discovered route
    /// through the loader and assemble the dispatcher.
    pub fn new(
        config: AppConfig,
        loader: Arc<dyn HandlerLoader>,
        pipeline: Pipeline,
    ) -> Result<Self, StartupError> {
        config.validate()?;

        let manifest = ManifestBuilder::new(&config.routes.dir)
            .with_url_prefix(&config.routes.url_prefix)
            .build()?;
        let registry = HandlerRegistry::from_loader(&manifest, loader.as_ref())?;

        info!(
            routes = manifest.len(),
            dir = %config.routes.dir.display(),
            "route manifest built"
        );

        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(manifest),
            Arc::new(registry),
            pipeline,
            &config,
        ));

        Ok(Self {
            config,
            loader,
            dispatcher,
        })
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        self.dispatcher.clone()
    }

    /// The axum application, usable directly in tests without a socket.
    pub fn app(&self) -> Router {
        Router::new()
            .fallback(dispatch_entry)
            .layer(TraceLayer::new_for_http())
            .with_state(self.dispatcher.clone())
    }

    /// Re-scan the routes directory and atomically swap in the new table.
    ///
    /// In-flight requests finish against the table they started with. On any
    /// error the current table stays in place.
    pub fn rescan(&self) -> Result<usize, StartupError> {
        let manifest = ManifestBuilder::new(&self.config.routes.dir)
            .with_url_prefix(&self.config.routes.url_prefix)
            .build()?;
        let registry = HandlerRegistry::from_loader(&manifest, self.loader.as_ref())?;
        let count = manifest.len();

        self.dispatcher
            .swap_table(Arc::new(manifest), Arc::new(registry));
        info!(routes = count, "route manifest re-scanned");
        Ok(count)
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn serve(self) -> Result<(), StartupError> {
        let app = self.app();
        let listener = tokio::net::TcpListener::bind(self.config.server.bind_addr).await?;
        info!(addr = %self.config.server.bind_addr, "engine listening");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

/// Every request enters here; routing is the dispatcher's job, not axum's.
async fn dispatch_entry(State(dispatcher): State<Arc<Dispatcher>>, request: Request) -> Response {
    dispatcher.dispatch(request).await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install shutdown signal handler");
        return;
    }
    info!("shutdown signal received, draining connections");
}
