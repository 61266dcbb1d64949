//! # Handler Registry
//!
//! Maps descriptor identity to a resolved callable plus its declared route
//! middlewares. Populated once at startup by the loader collaborator and
//! immutable afterwards, so dispatch never performs dynamic resolution.

use std::collections::HashMap;
use std::sync::Arc;

use crate::manifest::{RouteDescriptor, RouteId, RouteManifest};
use crate::middleware::{Handler, Middleware};

/// A resolved route: the callable and the middlewares the route declared.
pub struct RouteBinding {
    pub handler: Arc<dyn Handler>,
    pub middlewares: Vec<Arc<dyn Middleware>>,
}

impl RouteBinding {
    pub fn new(handler: Arc<dyn Handler>) -> Self {
        Self {
            handler,
            middlewares: Vec::new(),
        }
    }

    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }
}

/// Resolves a descriptor's source handle into a binding.
///
/// This is the bundler/loader collaborator boundary: the engine does not
/// care whether the handler comes from direct evaluation, a pre-bundled
/// artifact, or compiled-in functions.
pub trait HandlerLoader: Send + Sync {
    fn load(&self, descriptor: &RouteDescriptor) -> Result<RouteBinding, LoaderError>;
}

/// A descriptor the loader could not resolve. Fatal at startup.
#[derive(Debug, thiserror::Error)]
#[error("no handler for route {path} (source file {source_file})")]
pub struct LoaderError {
    pub path: String,
    pub source_file: String,
}

/// Immutable descriptor-identity → binding map.
#[derive(Default)]
pub struct HandlerRegistry {
    bindings: HashMap<RouteId, RouteBinding>,
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("bindings", &self.bindings.keys())
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every manifest descriptor through the loader.
    pub fn from_loader(
        manifest: &RouteManifest,
        loader: &dyn HandlerLoader,
    ) -> Result<Self, LoaderError> {
        let mut registry = Self::new();
        for descriptor in manifest.routes() {
            registry.bind(descriptor.id, loader.load(descriptor)?);
        }
        Ok(registry)
    }

    /// Bind one route. Startup-only; the registry is shared read-only after.
    pub fn bind(&mut self, id: RouteId, binding: RouteBinding) {
        self.bindings.insert(id, binding);
    }

    pub fn get(&self, id: RouteId) -> Option<&RouteBinding> {
        self.bindings.get(&id)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
