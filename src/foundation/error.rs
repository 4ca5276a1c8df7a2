/// Convenience result type used across alertlens.
pub type OverlayResult<T> = Result<T, OverlayError>;

/// Top-level error taxonomy used by overlay APIs.
///
/// None of these cross the render hot path or the alert-load entry point: both recover locally
/// and report through logs (and a `bool` for alert loads).
#[derive(thiserror::Error, Debug)]
pub enum OverlayError {
    /// Invalid user-provided configuration or manifest data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Required data was absent (no metadata for an alert, no target video).
    #[error("missing data: {0}")]
    MissingData(String),

    /// An annotation record could not be normalized (bad `timeRange`, missing category).
    #[error("malformed annotation: {0}")]
    MalformedAnnotation(String),

    /// No extractor or renderer is registered for a category.
    #[error("unknown category: {0}")]
    UnknownCategory(String),

    /// A renderer failed while drawing one annotation.
    #[error("render error: {0}")]
    Render(String),

    /// Errors when serializing or deserializing data structures.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OverlayError {
    /// Build a [`OverlayError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`OverlayError::MissingData`] value.
    pub fn missing_data(msg: impl Into<String>) -> Self {
        Self::MissingData(msg.into())
    }

    /// Build a [`OverlayError::MalformedAnnotation`] value.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedAnnotation(msg.into())
    }

    /// Build a [`OverlayError::UnknownCategory`] value.
    pub fn unknown_category(category: impl Into<String>) -> Self {
        Self::UnknownCategory(category.into())
    }

    /// Build a [`OverlayError::Render`] value.
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    /// Build a [`OverlayError::Serde`] value.
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

impl From<serde_json::Error> for OverlayError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serde(e.to_string())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
