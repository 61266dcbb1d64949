//! Route descriptors: the immutable, per-endpoint values the manifest holds.

use axum::http::Method;
use serde::Serialize;
use std::path::PathBuf;

use crate::manifest::pattern::{RoutePattern, SpecificityRank};

/// Identity of one discovered route, assigned in build order.
///
/// The handler registry binds callables to these, keeping dispatch free of
/// any dynamic lookup by path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RouteId(pub u32);

/// Opaque reference to the handler source behind a descriptor.
///
/// The engine never reads the file's contents; the loader collaborator
/// resolves the handle to a callable at startup.
#[derive(Debug, Clone)]
pub struct SourceHandle {
    /// Route-file path relative to the routes root
    pub file: PathBuf,
}

impl SourceHandle {
    pub fn display(&self) -> String {
        self.file.display().to_string()
    }
}

/// One discoverable endpoint. Immutable after build.
#[derive(Debug, Clone)]
pub struct RouteDescriptor {
    pub id: RouteId,

    /// Normalized pattern string, e.g. `/users/:id/pets/:petId`
    pub path: String,

    /// `None` matches any verb not otherwise claimed at this path
    pub method: Option<Method>,

    /// True if the pattern contains a parameter or catch-all segment
    pub is_dynamic: bool,

    /// Compiled matcher with one named capture per parameter
    pub pattern: RoutePattern,

    /// Handler source reference, owned by the loader collaborator
    pub source: SourceHandle,

    /// Deterministic ordering key among overlapping candidates
    pub rank: SpecificityRank,
}

impl RouteDescriptor {
    /// Whether this descriptor accepts the request method.
    pub fn matches_method(&self, method: &Method) -> bool {
        match &self.method {
            Some(own) => own == method,
            None => true,
        }
    }

    /// Read-only introspection view for observability consumers.
    pub fn info(&self) -> RouteInfo {
        RouteInfo {
            path: self.path.clone(),
            method: self.method.as_ref().map(|m| m.to_string()),
            is_dynamic: self.is_dynamic,
            pattern: self.pattern.regex_source().to_string(),
            rank: self.rank.value(),
            source: self.source.display(),
        }
    }
}

/// Serializable snapshot of one descriptor, exposed read-only.
#[derive(Debug, Clone, Serialize)]
pub struct RouteInfo {
    pub path: String,
    pub method: Option<String>,
    pub is_dynamic: bool,
    pub pattern: String,
    pub rank: u32,
    pub source: String,
}
