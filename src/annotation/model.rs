use std::collections::{BTreeMap, HashSet};

use serde_json::{Map, Value, json};

use crate::foundation::core::TimeRange;
use crate::foundation::error::{OverlayError, OverlayResult};

/// One visualizable fact about a span of video time.
///
/// `data` is opaque to the manifest; its shape is decided by `category` and checked by the
/// renderer that claims that category.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    /// Unique within one manifest.
    pub id: String,
    /// Renderer discriminator, e.g. `"detection"` or `"text"`.
    pub category: String,
    /// Inclusive visibility window.
    pub time_range: TimeRange,
    /// Category-specific payload.
    #[serde(default)]
    pub data: Value,
}

impl Annotation {
    /// Return `true` when this annotation should be drawn at `t_ms`.
    pub fn is_visible_at(&self, t_ms: f64) -> bool {
        self.time_range.contains(t_ms)
    }

    /// Return `true` when the record satisfies the manifest invariants (non-empty id and
    /// category, well-formed time range).
    pub fn is_well_formed(&self) -> bool {
        !self.id.trim().is_empty()
            && !self.category.trim().is_empty()
            && self.time_range.is_well_formed()
    }

    /// Raw JSON form, as found under `items.<category>[]`.
    pub fn to_raw(&self) -> Value {
        json!({
            "id": self.id,
            "category": self.category,
            "timeRange": {
                "startMs": self.time_range.start_ms,
                "endMs": self.time_range.end_ms,
            },
            "data": self.data,
        })
    }

    fn from_raw_entry(category: &str, index: usize, raw: &Value) -> OverlayResult<Self> {
        let obj = raw.as_object().ok_or_else(|| {
            OverlayError::malformed(format!("{category}[{index}] is not an object"))
        })?;

        let id = match obj.get("id") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            None | Some(Value::Null) => format!("{category}:{index}"),
            Some(other) => {
                return Err(OverlayError::malformed(format!(
                    "{category}[{index}] has unusable id {other}"
                )));
            }
        };

        let time_range = obj
            .get("timeRange")
            .ok_or_else(|| OverlayError::malformed(format!("'{id}' has no timeRange")))
            .and_then(|tr| parse_time_range(&id, tr))?;

        Ok(Self {
            id,
            category: category.to_owned(),
            time_range,
            data: obj.get("data").cloned().unwrap_or(Value::Null),
        })
    }
}

fn parse_time_range(id: &str, raw: &Value) -> OverlayResult<TimeRange> {
    let bound = |key: &str| {
        raw.get(key).and_then(Value::as_f64).ok_or_else(|| {
            OverlayError::malformed(format!("'{id}' timeRange.{key} is missing or not a number"))
        })
    };
    TimeRange::new(bound("startMs")?, bound("endMs")?)
        .map_err(|e| OverlayError::malformed(format!("'{id}': {e}")))
}

/// Immutable, category-partitioned collection of annotations for one video.
///
/// Built once from the raw `{ metadata, items: { category: [...] } }` shape and then only
/// queried. Loading new annotation data means building a new manifest and replacing the old one
/// wholesale.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationManifest {
    metadata: Value,
    items: BTreeMap<String, Vec<Annotation>>,
    count: usize,
    dropped: usize,
}

impl AnnotationManifest {
    /// Build a manifest from the raw JSON shape.
    ///
    /// Entries with a malformed `timeRange`, an unusable `id`, or an `id` already taken are
    /// dropped and logged; the rest are kept. Entries with no `id` receive `"<category>:<index>"`.
    /// Returns `None` when `items` is absent or nothing survives normalization.
    pub fn from_raw(raw: &Value) -> Option<Self> {
        let Some(items) = raw.get("items").and_then(Value::as_object) else {
            tracing::warn!("manifest has no items object");
            return None;
        };

        let mut out: BTreeMap<String, Vec<Annotation>> = BTreeMap::new();
        let mut seen_ids: HashSet<String> = HashSet::new();
        let mut count = 0usize;
        let mut dropped = 0usize;

        for (category, entries) in items {
            let Some(entries) = entries.as_array() else {
                tracing::warn!(%category, "items entry is not an array; category dropped");
                dropped += 1;
                continue;
            };
            if category.trim().is_empty() {
                tracing::warn!(
                    entries = entries.len(),
                    "annotations under an empty category dropped"
                );
                dropped += entries.len();
                continue;
            }

            let mut kept = Vec::with_capacity(entries.len());
            for (index, entry) in entries.iter().enumerate() {
                match Annotation::from_raw_entry(category, index, entry) {
                    Ok(a) if seen_ids.insert(a.id.clone()) => kept.push(a),
                    Ok(a) => {
                        tracing::warn!(%category, id = %a.id, "duplicate annotation id dropped");
                        dropped += 1;
                    }
                    Err(e) => {
                        tracing::warn!(%category, index, error = %e, "malformed annotation dropped");
                        dropped += 1;
                    }
                }
            }

            if !kept.is_empty() {
                count += kept.len();
                out.insert(category.clone(), kept);
            }
        }

        if count == 0 {
            tracing::warn!(dropped, "manifest is empty after normalization");
            return None;
        }

        Some(Self {
            metadata: raw.get("metadata").cloned().unwrap_or(Value::Null),
            items: out,
            count,
            dropped,
        })
    }

    /// Parse a JSON document and build a manifest from it.
    pub fn from_json(s: &str) -> OverlayResult<Option<Self>> {
        let raw: Value = serde_json::from_str(s)?;
        Ok(Self::from_raw(&raw))
    }

    /// Raw JSON form; `from_raw(&m.to_raw())` reproduces `m`'s contents.
    pub fn to_raw(&self) -> Value {
        let items: Map<String, Value> = self
            .items
            .iter()
            .map(|(cat, anns)| {
                (
                    cat.clone(),
                    Value::Array(anns.iter().map(Annotation::to_raw).collect()),
                )
            })
            .collect();
        json!({ "metadata": self.metadata, "items": items })
    }

    /// Pretty-printed JSON of [`AnnotationManifest::to_raw`].
    pub fn to_json(&self) -> OverlayResult<String> {
        Ok(serde_json::to_string_pretty(&self.to_raw())?)
    }

    /// Upstream metadata carried alongside the items.
    pub fn metadata(&self) -> &Value {
        &self.metadata
    }

    /// Total number of annotations across all categories.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Number of raw entries dropped while building this manifest.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Categories present, in query order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    /// Annotations of one category in insertion order.
    pub fn category(&self, category: &str) -> &[Annotation] {
        self.items.get(category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All annotations, category-then-insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.items.values().flatten()
    }

    /// Look up one annotation by id.
    pub fn get(&self, id: &str) -> Option<&Annotation> {
        self.iter().find(|a| a.id == id)
    }

    /// Every annotation whose inclusive range contains `t_ms`, category-then-insertion order.
    pub fn visible_at(&self, t_ms: f64) -> Vec<&Annotation> {
        self.iter().filter(|a| a.is_visible_at(t_ms)).collect()
    }

    /// Annotation counts keyed by category.
    pub fn counts_by_category(&self) -> BTreeMap<String, usize> {
        self.items
            .iter()
            .map(|(cat, anns)| (cat.clone(), anns.len()))
            .collect()
    }

    /// Smallest range covering every annotation.
    pub fn time_span(&self) -> Option<TimeRange> {
        self.iter().map(|a| a.time_range).reduce(|acc, r| TimeRange {
            start_ms: acc.start_ms.min(r.start_ms),
            end_ms: acc.end_ms.max(r.end_ms),
        })
    }

    /// `true` when the manifest is non-empty and every annotation satisfies the invariants
    /// (well-formed, filed under its own category, unique id).
    pub fn validate(&self) -> bool {
        if self.count == 0 {
            return false;
        }
        let mut ids = HashSet::with_capacity(self.count);
        self.items.iter().all(|(cat, anns)| {
            anns.iter()
                .all(|a| a.is_well_formed() && a.category == *cat && ids.insert(a.id.as_str()))
        })
    }
}

impl serde::Serialize for AnnotationManifest {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_raw().serialize(serializer)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/annotation/model.rs"]
mod tests;
