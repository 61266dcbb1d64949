//! # Manifest Builder
//!
//! Scans a routes directory and turns the file tree into an ordered set of
//! route descriptors. Only file names and paths are read, never contents —
//! resolving a descriptor to a callable is the loader's job.
//!
//! ## Filename convention
//! - directory segments become path segments; `[name]` is a parameter,
//!   `[...name]` a trailing catch-all
//! - a file stem of `route` (any extension) is the directory index and adds
//!   no segment; any other stem is one more path segment
//! - a dot-separated suffix on the stem names the method (`status.get.ts`);
//!   without one the route is method-unset and matches any verb
//!
//! Every failure here is fatal: the process must not start serving with a
//! manifest known to be invalid.

use axum::http::Method;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::manifest::descriptor::{RouteDescriptor, RouteId, RouteInfo, SourceHandle};
use crate::manifest::pattern::{PatternError, RoutePattern, Segment, SpecificityRank};

/// Fatal build-time errors, each naming the offending file(s).
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("routes directory {path:?} is unreadable: {source}")]
    UnreadableDirectory {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("route file {file:?}: {source}")]
    InvalidRoute {
        file: PathBuf,
        source: PatternError,
    },

    #[error("duplicate route {path} [{method}]: defined by both {first:?} and {second:?}")]
    DuplicateRoute {
        path: String,
        method: String,
        first: PathBuf,
        second: PathBuf,
    },
}

/// The verbs a filename suffix may claim.
const RECOGNIZED_VERBS: &[(&str, Method)] = &[
    ("get", Method::GET),
    ("post", Method::POST),
    ("put", Method::PUT),
    ("delete", Method::DELETE),
    ("patch", Method::PATCH),
    ("head", Method::HEAD),
    ("options", Method::OPTIONS),
];

fn parse_verb(token: &str) -> Option<Method> {
    RECOGNIZED_VERBS
        .iter()
        .find(|(name, _)| *name == token)
        .map(|(_, method)| method.clone())
}

/// Builds a [`RouteManifest`] from a routes directory.
pub struct ManifestBuilder {
    root: PathBuf,
    url_prefix: String,
}

impl ManifestBuilder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            url_prefix: String::new(),
        }
    }

    /// Prefix prepended to every discovered route path at build time, so the
    /// introspection snapshot shows externally visible paths.
    pub fn with_url_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.url_prefix = prefix.into();
        self
    }

    /// Walk the routes root in sorted order and build the manifest.
    pub fn build(&self) -> Result<RouteManifest, ManifestError> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.root).sort_by_file_name() {
            let entry = entry.map_err(|source| ManifestError::UnreadableDirectory {
                path: self.root.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .expect("walked path is under root")
                .to_path_buf();
            files.push(relative);
        }
        self.build_from_listing(files)
    }

    /// Build from an ordered listing of routes-root-relative file paths.
    ///
    /// This is the file-system collaborator boundary: [`Self::build`] feeds
    /// it the walked tree, and tests feed it synthetic listings.
    pub fn build_from_listing(
        &self,
        files: impl IntoIterator<Item = PathBuf>,
    ) -> Result<RouteManifest, ManifestError> {
        let mut descriptors = Vec::new();
        // (path, method) pairs seen so far, for duplicate detection
        let mut claimed: HashMap<String, Vec<(Option<Method>, PathBuf)>> = HashMap::new();

        for file in files {
            let Some(parsed) = self.descriptor_from_file(&file)? else {
                continue;
            };

            let entries = claimed.entry(parsed.path.clone()).or_default();
            for (method, earlier) in entries.iter() {
                // An unset-method route claims every verb at its path, so it
                // collides with any other route at the identical path.
                let conflict = match (method, &parsed.method) {
                    (None, _) | (_, None) => true,
                    (Some(a), Some(b)) => a == b,
                };
                if conflict {
                    return Err(ManifestError::DuplicateRoute {
                        path: parsed.path,
                        method: parsed
                            .method
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| "ANY".to_string()),
                        first: earlier.clone(),
                        second: file,
                    });
                }
            }
            entries.push((parsed.method.clone(), file));
            descriptors.push(parsed);
        }

        // Ascending specificity, with (path, method) as the final tie-break
        // so the ordering is total.
        descriptors.sort_by(|a, b| {
            (a.rank, &a.path, a.method.as_ref().map(|m| m.as_str()))
                .cmp(&(b.rank, &b.path, b.method.as_ref().map(|m| m.as_str())))
        });

        let routes: Vec<Arc<RouteDescriptor>> = descriptors
            .into_iter()
            .enumerate()
            .map(|(index, mut descriptor)| {
                descriptor.id = RouteId(index as u32);
                Arc::new(descriptor)
            })
            .collect();

        debug!(route_count = routes.len(), "route manifest built");
        Ok(RouteManifest { routes })
    }

    /// Derive one descriptor from a routes-root-relative file path.
    ///
    /// Returns `Ok(None)` for files that are not routes (dotfiles).
    fn descriptor_from_file(
        &self,
        file: &Path,
    ) -> Result<Option<RouteDescriptor>, ManifestError> {
        let invalid = |source: PatternError| ManifestError::InvalidRoute {
            file: file.to_path_buf(),
            source,
        };

        let file_name = match file.file_name().and_then(|n| n.to_str()) {
            Some(name) if !name.starts_with('.') => name,
            _ => return Ok(None),
        };

        // Tokenize the filename: drop at most one trailing non-verb token as
        // the extension, then take a trailing verb token as the method.
        let mut tokens: Vec<&str> = file_name.split('.').collect();
        if tokens.len() >= 2 && parse_verb(tokens[tokens.len() - 1]).is_none() {
            tokens.pop();
        }
        let method = if tokens.len() >= 2 {
            match parse_verb(tokens[tokens.len() - 1]) {
                Some(verb) => {
                    tokens.pop();
                    Some(verb)
                }
                None => None,
            }
        } else {
            None
        };
        let stem = tokens.join(".");

        let mut segments = Vec::new();
        for component in file.parent().into_iter().flat_map(|p| p.components()) {
            let raw = component.as_os_str().to_string_lossy();
            // hidden directories are not routes either
            if raw.starts_with('.') {
                return Ok(None);
            }
            segments.push(Segment::parse(&raw).map_err(invalid)?);
        }
        if stem != "route" {
            segments.push(Segment::parse(&stem).map_err(invalid)?);
        }

        let pattern = RoutePattern::from_segments(segments)
            .and_then(|p| p.with_prefix(&self.url_prefix))
            .map_err(invalid)?;

        let rank = SpecificityRank::new(&pattern, method.is_none());
        Ok(Some(RouteDescriptor {
            id: RouteId(0), // assigned after sorting
            path: pattern.path().to_string(),
            method,
            is_dynamic: pattern.is_dynamic(),
            rank,
            source: SourceHandle {
                file: file.to_path_buf(),
            },
            pattern,
        }))
    }
}

/// The built, immutable route table.
///
/// Constructed once at startup (or by an explicit re-scan, which produces a
/// new manifest that atomically replaces the old one) and shared read-only.
#[derive(Debug)]
pub struct RouteManifest {
    routes: Vec<Arc<RouteDescriptor>>,
}

impl RouteManifest {
    /// Descriptors in ascending specificity order.
    pub fn routes(&self) -> &[Arc<RouteDescriptor>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn get(&self, id: RouteId) -> Option<&Arc<RouteDescriptor>> {
        self.routes.get(id.0 as usize)
    }

    /// Read-only snapshot for observability consumers.
    pub fn snapshot(&self) -> Vec<RouteInfo> {
        self.routes.iter().map(|route| route.info()).collect()
    }
}
