use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::annotation::model::AnnotationManifest;
use crate::foundation::error::{OverlayError, OverlayResult};

/// Options shared by every extractor in one conversion.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConvertOpts {
    /// Visibility span given to instantaneous events (a timestamp or a frame index).
    pub point_duration_ms: f64,
    /// Added to every extracted range; results are clamped at zero.
    pub time_offset_ms: f64,
    /// Detections below this confidence are dropped.
    pub min_confidence: f64,
}

impl Default for ConvertOpts {
    fn default() -> Self {
        Self {
            point_duration_ms: 1000.0,
            time_offset_ms: 0.0,
            min_confidence: 0.0,
        }
    }
}

impl ConvertOpts {
    /// Override the span of instantaneous events.
    pub fn with_point_duration(mut self, ms: f64) -> Self {
        self.point_duration_ms = ms;
        self
    }

    /// Override the time offset.
    pub fn with_time_offset(mut self, ms: f64) -> Self {
        self.time_offset_ms = ms;
        self
    }

    /// Override the confidence floor.
    pub fn with_min_confidence(mut self, c: f64) -> Self {
        self.min_confidence = c;
        self
    }
}

/// Turns raw alert metadata into annotation-shaped objects for one category.
///
/// Output entries follow the raw manifest item shape (`{ id?, timeRange, data }`); the pipeline
/// files them under the requested category. Return an empty vector when the metadata holds
/// nothing for this category; return an error only when the input cannot be interpreted at all.
pub trait Extractor: Send + Sync {
    /// Extract entries from `raw`.
    fn extract(&self, raw: &Value, opts: &ConvertOpts) -> OverlayResult<Vec<Value>>;
}

impl<F> Extractor for F
where
    F: Fn(&Value, &ConvertOpts) -> OverlayResult<Vec<Value>> + Send + Sync,
{
    fn extract(&self, raw: &Value, opts: &ConvertOpts) -> OverlayResult<Vec<Value>> {
        self(raw, opts)
    }
}

/// Category-to-extractor table.
#[derive(Clone, Default)]
pub struct ExtractorRegistry {
    extractors: BTreeMap<String, Arc<dyn Extractor>>,
}

impl std::fmt::Debug for ExtractorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractorRegistry")
            .field("categories", &self.extractors.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ExtractorRegistry {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the `detection`, `text` and `cross` extractors.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        crate::convert::extractors::install_builtins(&mut reg);
        reg
    }

    /// Associate `category` with `extractor`, replacing any previous one.
    pub fn register(&mut self, category: impl Into<String>, extractor: Arc<dyn Extractor>) {
        self.extractors.insert(category.into(), extractor);
    }

    /// Return `true` when `category` has an extractor.
    pub fn contains(&self, category: &str) -> bool {
        self.extractors.contains_key(category)
    }

    /// Registered categories, sorted.
    pub fn categories(&self) -> Vec<String> {
        self.extractors.keys().cloned().collect()
    }

    /// Run the extractors for `categories` over `raw` and build a manifest from the result.
    ///
    /// Unknown categories are logged and skipped. An extractor that fails leaves its category
    /// out of the manifest. Returns `None` when nothing was extracted. The result depends only on
    /// the inputs.
    #[tracing::instrument(level = "debug", skip(self, raw, opts))]
    pub fn convert<S: AsRef<str> + std::fmt::Debug>(
        &self,
        raw: &Value,
        categories: &[S],
        opts: &ConvertOpts,
    ) -> Option<AnnotationManifest> {
        let mut items = Map::new();
        let mut seen = HashSet::new();

        for category in categories.iter().map(AsRef::as_ref) {
            if !seen.insert(category) {
                continue;
            }
            let Some(extractor) = self.extractors.get(category) else {
                tracing::warn!(
                    error = %OverlayError::unknown_category(category),
                    "no extractor registered; category skipped"
                );
                continue;
            };
            match extractor.extract(raw, opts) {
                Ok(entries) if entries.is_empty() => {
                    tracing::debug!(%category, "extractor found nothing");
                }
                Ok(entries) => {
                    tracing::debug!(%category, count = entries.len(), "extracted");
                    items.insert(category.to_owned(), Value::Array(entries));
                }
                Err(e) => {
                    tracing::error!(%category, error = %e, "extractor failed; category omitted");
                }
            }
        }

        if items.is_empty() {
            tracing::debug!("no annotations extracted");
            return None;
        }

        let mut extracted: Vec<&String> = items.keys().collect();
        extracted.sort();
        let manifest = json!({
            "metadata": source_metadata(raw, &extracted),
            "items": items,
        });
        AnnotationManifest::from_raw(&manifest)
    }
}

/// Convert with the built-in extractors.
pub fn convert_to_manifest<S: AsRef<str> + std::fmt::Debug>(
    raw: &Value,
    categories: &[S],
    opts: &ConvertOpts,
) -> Option<AnnotationManifest> {
    ExtractorRegistry::with_builtins().convert(raw, categories, opts)
}

fn source_metadata(raw: &Value, extracted: &[&String]) -> Value {
    let mut meta = Map::new();
    for key in ["alertId", "fps", "frameWidth", "frameHeight", "durationMs"] {
        if let Some(v) = raw.get(key).filter(|v| !v.is_null()) {
            meta.insert(key.to_owned(), v.clone());
        }
    }
    meta.insert("categories".to_owned(), json!(extracted));
    Value::Object(meta)
}

#[cfg(test)]
#[path = "../../tests/unit/convert/pipeline.rs"]
mod tests;
