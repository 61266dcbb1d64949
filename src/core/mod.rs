//! Core building blocks: error taxonomy, configuration, and the per-request
//! context threaded through the pipeline.

pub mod config;
pub mod context;
pub mod error;
pub mod query;

pub use config::{AppConfig, ConfigError, QueryConfig, RoutesConfig, ServerConfig};
pub use context::{RequestContext, ResponseWriter};
pub use error::{ApiError, ApiResult, ErrorKind};
