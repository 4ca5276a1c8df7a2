//! Discovery-driven ownership of overlays and alert-scoped loading.

/// Boundary contracts for discovery, target resolution and metadata, plus in-memory doubles.
pub mod collab;
/// Inspection hooks and the sample manifest.
pub mod debug;
/// [`AnnotationManager`](manager::AnnotationManager) and its options.
#[allow(clippy::module_inception)]
pub mod manager;
