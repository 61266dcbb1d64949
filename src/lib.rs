//! # dirroute - File-System Routing Engine
//!
//! A routing and request-dispatch engine whose route table is derived from a
//! directory tree instead of code. Scanning a routes directory produces an
//! immutable manifest of endpoints; a specificity-ranked matcher resolves
//! each request to exactly one of them; a middleware pipeline with explicit
//! continuation runs around the bound handler.
//!
//! ## Architecture Overview
//!
//! The engine is built around a few core modules:
//! - `core`: error taxonomy, configuration, request context and query parsing
//! - `manifest`: routes-directory scan, filename convention, compiled patterns
//! - `routing`: specificity-ordered matching with first-class 404/405 outcomes
//! - `middleware`: ordered pipeline with before/after hooks and short-circuits
//! - `dispatch`: per-request orchestration, handler registry and the engine
//!
//! Route files follow a filename convention: `[name]` marks a parameter
//! segment, `[...name]` a trailing catch-all, `route.<ext>` the directory
//! index, and a `.<verb>.` suffix pins the HTTP method. The engine never
//! reads file contents; a [`dispatch::HandlerLoader`] turns each discovered
//! file into a callable at startup.

/// Error taxonomy, configuration, request context and query-string parsing
pub mod core;

/// Routes-directory scanning and the immutable route manifest
pub mod manifest;

/// Request-to-route resolution over the built manifest
pub mod routing;

/// Middleware pipeline with explicit continuation and lifecycle hooks
pub mod middleware;

/// Handler registry, dispatcher and the assembled engine
pub mod dispatch;

pub use crate::core::config::AppConfig;
pub use crate::core::context::RequestContext;
pub use crate::core::error::{ApiError, ApiResult, ErrorKind};
pub use crate::dispatch::{Dispatcher, Engine, HandlerLoader, RouteBinding, StartupError};
pub use crate::manifest::{ManifestBuilder, RouteDescriptor, RouteId, RouteManifest};
pub use crate::middleware::{handler_fn, Handler, HookStage, Middleware, Next, PipelineBuilder};
pub use crate::routing::{MatchOutcome, Matcher};
