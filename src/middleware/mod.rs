//! Middleware pipeline system: the ordered execution chain that runs around
//! every matched handler.

pub mod builtin;
pub mod pipeline;

pub use builtin::RequestLogger;
pub use pipeline::{handler_fn, Handler, HookStage, Middleware, Next, Pipeline, PipelineBuilder};
