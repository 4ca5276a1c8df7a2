//! Drawing: the surface boundary, the renderer registry and the built-in renderers.

/// Built-in `detection`, `text` and `cross` renderers.
pub mod builtin;
/// `vello_cpu` raster canvas.
pub mod cpu;
/// Renderer trait and the shared registry.
pub mod registry;
/// Colors and sizes used by the built-in renderers.
pub mod style;
/// 2D drawing surface trait and the recording double.
pub mod surface;
