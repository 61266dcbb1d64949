//! Request-time route resolution against the built manifest.

pub mod matcher;

pub use matcher::{normalize_path, MatchOutcome, Matcher};
