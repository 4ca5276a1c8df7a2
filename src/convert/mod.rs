//! Alert metadata to manifest conversion.

/// Built-in extractors.
pub mod extractors;
/// Extractor trait, registry and the conversion entry point.
pub mod pipeline;
