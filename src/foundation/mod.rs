/// RGBA colors and their JSON forms.
pub mod color;
/// Time ranges, normalized geometry and viewports.
pub mod core;
/// Crate error type.
pub mod error;
