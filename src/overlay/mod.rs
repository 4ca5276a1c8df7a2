//! Per-video overlays.

/// Overlay controller state machine.
pub mod controller;
/// Host boundary: video elements, overlay canvases and their factories.
pub mod host;
