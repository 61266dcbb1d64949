//! Request dispatch: handler registry, per-request orchestration and the
//! engine that ties the manifest, matcher and pipeline to a listening
//! socket.

pub mod dispatcher;
pub mod registry;
pub mod server;

pub use dispatcher::{DispatchTable, Dispatcher};
pub use registry::{HandlerLoader, HandlerRegistry, LoaderError, RouteBinding};
pub use server::{Engine, StartupError};
