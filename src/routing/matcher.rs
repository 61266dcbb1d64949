//! # Matcher
//!
//! Resolves a concrete request (method + path) against the built manifest.
//! Candidates are tested in ascending specificity order; the first compiled
//! pattern that accepts the normalized path wins. "No route" and "method not
//! allowed" are first-class outcomes here, not errors — the dispatcher turns
//! them into 404/405 responses.
//!
//! Matching runs against the path as transmitted: literal segments must
//! appear verbatim, and parameter values are percent-decoded only after
//! capture, so an encoded `/` inside a parameter stays within that one
//! segment instead of splitting it.

use axum::http::Method;
use std::collections::HashMap;
use std::sync::Arc;

use crate::manifest::{RouteDescriptor, RouteManifest};

/// Result of resolving one request against the manifest.
#[derive(Debug)]
pub enum MatchOutcome {
    /// A descriptor accepted the path under the request method.
    Matched {
        route: Arc<RouteDescriptor>,
        params: HashMap<String, String>,
    },
    /// At least one pattern accepted the path, but none under this method.
    MethodNotAllowed { allowed: Vec<Method> },
    /// No pattern accepted the path at all.
    NotFound,
}

/// Read-only matcher over an immutable manifest.
#[derive(Debug, Clone)]
pub struct Matcher {
    manifest: Arc<RouteManifest>,
}

impl Matcher {
    pub fn new(manifest: Arc<RouteManifest>) -> Self {
        Self { manifest }
    }

    pub fn manifest(&self) -> &Arc<RouteManifest> {
        &self.manifest
    }

    /// Select the single best descriptor for a request.
    pub fn resolve(&self, method: &Method, raw_path: &str) -> MatchOutcome {
        let path = normalize_path(raw_path);

        for route in self.manifest.routes() {
            if !route.matches_method(method) {
                continue;
            }
            if let Some(params) = route.pattern.match_path(&path) {
                return MatchOutcome::Matched {
                    route: route.clone(),
                    params,
                };
            }
        }

        // The path exists under other methods? Collect them for the Allow
        // header. A method-unset route would have matched above.
        let mut allowed = Vec::new();
        for route in self.manifest.routes() {
            if route.pattern.match_path(&path).is_some() {
                if let Some(method) = &route.method {
                    if !allowed.contains(method) {
                        allowed.push(method.clone());
                    }
                }
            }
        }

        if allowed.is_empty() {
            MatchOutcome::NotFound
        } else {
            MatchOutcome::MethodNotAllowed { allowed }
        }
    }
}

/// Normalize an incoming path: strip any query remnant and drop the trailing
/// slash (except for root). Percent-encoding is left intact; parameter
/// values decode after capture.
pub fn normalize_path(raw: &str) -> String {
    let path = raw.split('?').next().unwrap_or(raw);
    let path = if path.is_empty() { "/" } else { path };
    let trimmed = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };
    let trimmed = if trimmed.is_empty() { "/" } else { trimmed };
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ManifestBuilder;
    use std::path::PathBuf;

    fn matcher(files: &[&str]) -> Matcher {
        let manifest = ManifestBuilder::new("routes")
            .build_from_listing(files.iter().map(PathBuf::from))
            .unwrap();
        Matcher::new(Arc::new(manifest))
    }

    #[test]
    fn literal_route_beats_dynamic_at_same_length() {
        let m = matcher(&["users/all.get.ts", "users/[id].get.ts"]);

        match m.resolve(&Method::GET, "/users/all") {
            MatchOutcome::Matched { route, params } => {
                assert_eq!(route.path, "/users/all");
                assert!(params.is_empty());
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        match m.resolve(&Method::GET, "/users/42") {
            MatchOutcome::Matched { route, params } => {
                assert_eq!(route.path, "/users/:id");
                assert_eq!(params["id"], "42");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn catch_all_ranks_below_fixed_length_routes() {
        let m = matcher(&["files/readme.get.ts", "files/[...path].get.ts"]);

        match m.resolve(&Method::GET, "/files/readme") {
            MatchOutcome::Matched { route, .. } => assert_eq!(route.path, "/files/readme"),
            other => panic!("unexpected outcome: {other:?}"),
        }

        match m.resolve(&Method::GET, "/files/docs/a/b.txt") {
            MatchOutcome::Matched { route, params } => {
                assert_eq!(route.path, "/files/*path");
                assert_eq!(params["path"], "docs/a/b.txt");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn deeper_catch_all_wins_under_its_prefix() {
        let m = matcher(&["files/[...rest].get.ts", "files/docs/[...rest].get.ts"]);

        match m.resolve(&Method::GET, "/files/docs/guide.md") {
            MatchOutcome::Matched { route, params } => {
                assert_eq!(route.path, "/files/docs/*rest");
                assert_eq!(params["rest"], "guide.md");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        // outside the deeper prefix the shallow catch-all still applies
        match m.resolve(&Method::GET, "/files/logo.png") {
            MatchOutcome::Matched { route, params } => {
                assert_eq!(route.path, "/files/*rest");
                assert_eq!(params["rest"], "logo.png");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn extracts_named_params() {
        let m = matcher(&["users/[id]/pets/[petId]/route.get.ts"]);

        match m.resolve(&Method::GET, "/users/42/pets/7") {
            MatchOutcome::Matched { params, .. } => {
                assert_eq!(params["id"], "42");
                assert_eq!(params["petId"], "7");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn not_found_vs_method_not_allowed() {
        let m = matcher(&["users/route.get.ts", "users/route.post.ts"]);

        assert!(matches!(
            m.resolve(&Method::GET, "/missing"),
            MatchOutcome::NotFound
        ));

        match m.resolve(&Method::DELETE, "/users") {
            MatchOutcome::MethodNotAllowed { allowed } => {
                assert!(allowed.contains(&Method::GET));
                assert!(allowed.contains(&Method::POST));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn method_unset_route_matches_any_verb() {
        let m = matcher(&["webhook/route.ts"]);

        for method in [Method::GET, Method::POST, Method::PUT] {
            assert!(matches!(
                m.resolve(&method, "/webhook"),
                MatchOutcome::Matched { .. }
            ));
        }
    }

    #[test]
    fn explicit_method_ranks_above_method_unset_overlap() {
        // Distinct pattern strings that overlap on concrete paths.
        let m = matcher(&["users/[id].get.ts", "users/[name].ts"]);

        match m.resolve(&Method::GET, "/users/42") {
            MatchOutcome::Matched { route, .. } => assert_eq!(route.path, "/users/:id"),
            other => panic!("unexpected outcome: {other:?}"),
        }
        match m.resolve(&Method::POST, "/users/42") {
            MatchOutcome::Matched { route, .. } => assert_eq!(route.path, "/users/:name"),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn trailing_slash_and_percent_decoding() {
        let m = matcher(&["users/[id].get.ts"]);

        match m.resolve(&Method::GET, "/users/jane%20doe/") {
            MatchOutcome::Matched { params, .. } => {
                assert_eq!(params["id"], "jane doe");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn encoded_slash_matches_single_param_segment() {
        let m = matcher(&["users/[id].get.ts"]);

        // one segment as transmitted, one decoded param value
        match m.resolve(&Method::GET, "/users/a%2Fb") {
            MatchOutcome::Matched { route, params } => {
                assert_eq!(route.path, "/users/:id");
                assert_eq!(params["id"], "a/b");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        // a raw slash still separates segments and cannot match
        assert!(matches!(
            m.resolve(&Method::GET, "/users/a/b"),
            MatchOutcome::NotFound
        ));
    }

    #[test]
    fn normalize_path_rules() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path("/users/"), "/users");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("/a%2Fb"), "/a%2Fb");
    }
}
