//! Route discovery: file tree in, ordered descriptor set out.

pub mod builder;
pub mod descriptor;
pub mod pattern;

pub use builder::{ManifestBuilder, ManifestError, RouteManifest};
pub use descriptor::{RouteDescriptor, RouteId, RouteInfo, SourceHandle};
pub use pattern::{PatternError, RoutePattern, Segment, SpecificityRank};
