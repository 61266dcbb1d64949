//! # Manifest Scan Integration Tests
//!
//! Exercises the full directory-scan path: a real routes tree on disk is
//! walked, filenames are parsed into route descriptors and the resulting
//! manifest ordering and duplicate detection are checked.

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use dirroute::manifest::{ManifestBuilder, ManifestError};

fn touch(root: &Path, rel: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, "// handler\n").unwrap();
}

/// Scan a realistic tree and check paths, methods and ordering.
#[test]
fn test_scan_builds_ordered_manifest() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    touch(root, "route.get.ts");
    touch(root, "users/route.get.ts");
    touch(root, "users/route.post.ts");
    touch(root, "users/[id]/route.get.ts");
    touch(root, "files/[...path].get.ts");
    touch(root, "health.ts");

    let manifest = ManifestBuilder::new(root).build().unwrap();
    assert_eq!(manifest.len(), 6);

    let paths: Vec<(&str, Option<&str>)> = manifest
        .routes()
        .iter()
        .map(|r| (r.path.as_str(), r.method.as_ref().map(|m| m.as_str())))
        .collect();

    // Static explicit-method routes first (deeper literal prefixes ahead of
    // shallower ones), then method-unset, then dynamic, catch-all last.
    assert_eq!(paths[0], ("/users", Some("GET")));
    assert_eq!(paths[1], ("/users", Some("POST")));
    assert_eq!(paths[2], ("/", Some("GET")));
    assert_eq!(paths[3], ("/health", None));
    assert_eq!(paths[4], ("/users/:id", Some("GET")));
    assert_eq!(paths[5], ("/files/*path", Some("GET")));
}

/// Dotfiles and hidden directories in the tree are not routes.
#[test]
fn test_scan_skips_dotfiles_and_hidden_directories() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    touch(root, "users/route.get.ts");
    touch(root, "users/.route.get.ts.swp");
    touch(root, ".hidden/route.get.ts");

    let manifest = ManifestBuilder::new(root).build().unwrap();
    let paths: Vec<&str> = manifest.routes().iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["/users"]);
}

/// Two files claiming the same path and method abort the build with both
/// files named in the error.
#[test]
fn test_scan_rejects_duplicate_routes() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    touch(root, "users/route.get.ts");
    touch(root, "users/route.get.js");

    let err = ManifestBuilder::new(root).build().unwrap_err();
    match err {
        ManifestError::DuplicateRoute {
            path,
            first,
            second,
            ..
        } => {
            assert_eq!(path, "/users");
            assert_ne!(first, second);
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// A malformed bracket segment names the offending file.
#[test]
fn test_scan_rejects_malformed_param_segment() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    touch(root, "users/[id/route.get.ts");

    let err = ManifestBuilder::new(root).build().unwrap_err();
    match err {
        ManifestError::InvalidRoute { file, .. } => {
            assert!(file.to_string_lossy().contains("[id"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

/// A missing routes directory is a fatal scan error, not an empty manifest.
#[test]
fn test_scan_missing_directory_fails() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("does-not-exist");

    let err = ManifestBuilder::new(&missing).build().unwrap_err();
    assert!(matches!(err, ManifestError::UnreadableDirectory { .. }));
}

/// The configured URL prefix lands on every discovered path.
#[test]
fn test_scan_applies_url_prefix() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();

    touch(root, "users/[id].get.ts");

    let manifest = ManifestBuilder::new(root)
        .with_url_prefix("/api/v1")
        .build()
        .unwrap();
    assert_eq!(manifest.routes()[0].path, "/api/v1/users/:id");
}
