/// Annotation records and the manifest.
pub mod model;
