//! Path pattern compilation.
//!
//! File-derived segments become a normalized pattern string and a compiled
//! regex with one named capture per parameter. Supported segment forms:
//!
//! - literal text, matched exactly
//! - `[name]` — a named parameter capturing exactly one path segment
//! - `[...name]` — a trailing catch-all capturing one-or-more remaining
//!   segments joined by `/` (legal only in final position)

use regex::Regex;
use std::cmp::Reverse;
use std::collections::HashMap;
use thiserror::Error;

/// Errors from segment syntax or pattern compilation.
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("segment {segment:?} has unmatched bracket syntax")]
    UnmatchedBracket { segment: String },

    #[error("segment {segment:?} declares a parameter with no name")]
    EmptyParamName { segment: String },

    #[error("segment {segment:?} declares a catch-all with no name")]
    EmptyCatchAllName { segment: String },

    #[error("catch-all segment {segment:?} must be the final segment")]
    CatchAllNotLast { segment: String },

    #[error("pattern failed to compile: {0}")]
    Regex(#[from] regex::Error),
}

/// One parsed path segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Param(String),
    CatchAll(String),
}

impl Segment {
    /// Parse one raw file/directory name into a segment.
    pub fn parse(raw: &str) -> Result<Self, PatternError> {
        if raw.starts_with('[') {
            if !raw.ends_with(']') || raw.len() < 2 {
                return Err(PatternError::UnmatchedBracket {
                    segment: raw.to_string(),
                });
            }
            let inner = &raw[1..raw.len() - 1];
            if inner.contains('[') || inner.contains(']') {
                return Err(PatternError::UnmatchedBracket {
                    segment: raw.to_string(),
                });
            }
            if let Some(name) = inner.strip_prefix("...") {
                if name.is_empty() {
                    return Err(PatternError::EmptyCatchAllName {
                        segment: raw.to_string(),
                    });
                }
                return Ok(Self::CatchAll(name.to_string()));
            }
            if inner.is_empty() {
                return Err(PatternError::EmptyParamName {
                    segment: raw.to_string(),
                });
            }
            return Ok(Self::Param(inner.to_string()));
        }

        if raw.contains('[') || raw.contains(']') {
            return Err(PatternError::UnmatchedBracket {
                segment: raw.to_string(),
            });
        }

        Ok(Self::Literal(raw.to_string()))
    }

    fn is_dynamic(&self) -> bool {
        !matches!(self, Self::Literal(_))
    }
}

/// A compiled route pattern.
#[derive(Debug, Clone)]
pub struct RoutePattern {
    path: String,
    segments: Vec<Segment>,
    regex: Regex,
    param_names: Vec<String>,
}

impl RoutePattern {
    /// Compile a pattern from parsed segments.
    ///
    /// Rejects a catch-all anywhere but the final position; the builder maps
    /// the error to the offending file.
    pub fn from_segments(segments: Vec<Segment>) -> Result<Self, PatternError> {
        for segment in segments.iter().take(segments.len().saturating_sub(1)) {
            if let Segment::CatchAll(name) = segment {
                return Err(PatternError::CatchAllNotLast {
                    segment: format!("[...{name}]"),
                });
            }
        }

        let mut display = String::new();
        let mut expression = String::from("^");
        let mut param_names = Vec::new();

        if segments.is_empty() {
            display.push('/');
            expression.push('/');
        }

        for segment in &segments {
            display.push('/');
            expression.push('/');
            match segment {
                Segment::Literal(text) => {
                    display.push_str(text);
                    expression.push_str(&regex::escape(text));
                }
                Segment::Param(name) => {
                    display.push(':');
                    display.push_str(name);
                    expression.push_str(&format!("(?P<{name}>[^/]+)"));
                    param_names.push(name.clone());
                }
                Segment::CatchAll(name) => {
                    display.push('*');
                    display.push_str(name);
                    expression.push_str(&format!("(?P<{name}>.+)"));
                    param_names.push(name.clone());
                }
            }
        }
        expression.push('$');

        let regex = Regex::new(&expression)?;
        Ok(Self {
            path: display,
            segments,
            regex,
            param_names,
        })
    }

    /// The normalized pattern string, e.g. `/users/:id/pets/:petId`.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Prepend a URL prefix (itself already normalized, e.g. `/api`).
    pub fn with_prefix(mut self, prefix: &str) -> Result<Self, PatternError> {
        if prefix.is_empty() {
            return Ok(self);
        }
        let mut segments: Vec<Segment> = prefix
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| Segment::Literal(s.to_string()))
            .collect();
        segments.append(&mut self.segments);
        Self::from_segments(segments)
    }

    pub fn is_dynamic(&self) -> bool {
        self.segments.iter().any(Segment::is_dynamic)
    }

    pub fn has_catch_all(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::CatchAll(_)))
    }

    pub fn dynamic_segment_count(&self) -> usize {
        self.segments.iter().filter(|s| s.is_dynamic()).count()
    }

    pub fn literal_segment_count(&self) -> usize {
        self.segments.len() - self.dynamic_segment_count()
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn param_names(&self) -> &[String] {
        &self.param_names
    }

    /// Regex source, exposed for introspection consumers.
    pub fn regex_source(&self) -> &str {
        self.regex.as_str()
    }

    /// Test a normalized concrete path, yielding the named captures.
    ///
    /// The path is matched as transmitted; captured values are
    /// percent-decoded afterwards, piece by piece, so an encoded `/` inside
    /// a parameter never shifts a segment boundary.
    pub fn match_path(&self, path: &str) -> Option<HashMap<String, String>> {
        let captures = self.regex.captures(path)?;
        let params = self
            .param_names
            .iter()
            .filter_map(|name| {
                captures
                    .name(name)
                    .map(|m| (name.clone(), decode_captured(m.as_str())))
            })
            .collect();
        Some(params)
    }
}

/// Percent-decode a captured value. Catch-all captures span segments, so
/// each `/`-separated piece decodes independently.
fn decode_captured(raw: &str) -> String {
    raw.split('/')
        .map(|piece| {
            urlencoding::decode(piece)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| piece.to_string())
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Total ordering key for descriptor selection.
///
/// Lower sorts first, i.e. more specific. Derived `Ord` compares fields top
/// to bottom: catch-alls after every fixed-length route, then fewer dynamic
/// segments, then explicit method before method-unset, then more literal
/// segments — so of two catch-alls the one with the deeper literal prefix
/// wins. Descriptor ordering breaks any remaining tie on (path, method) so
/// the manifest order is total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SpecificityRank {
    catch_all: bool,
    dynamic_segments: usize,
    method_unset: bool,
    literal_segments: Reverse<usize>,
}

impl SpecificityRank {
    pub fn new(pattern: &RoutePattern, method_unset: bool) -> Self {
        Self {
            catch_all: pattern.has_catch_all(),
            dynamic_segments: pattern.dynamic_segment_count(),
            method_unset,
            literal_segments: Reverse(pattern.literal_segment_count()),
        }
    }

    /// Numeric form of the rank, for introspection and logging.
    pub fn value(&self) -> u32 {
        ((self.catch_all as u32) << 28)
            | ((self.dynamic_segments.min(0xFFF) as u32) << 16)
            | ((self.method_unset as u32) << 8)
            | (0xFF - self.literal_segments.0.min(0xFF) as u32)
    }
}
