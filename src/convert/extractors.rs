//! Built-in extractors over the upstream alert metadata shape:
//!
//! ```json
//! { "fps": 30, "frameWidth": 1920, "frameHeight": 1080,
//!   "detections": [{ "id": "..", "startMs": 0, "endMs": 900, "bbox": [x, y, w, h], "label": "..", "confidence": 0.9 }],
//!   "captions":   [{ "startMs": 0, "endMs": 2000, "text": ".." }],
//!   "markers":    [{ "timestampMs": 1200, "x": 0.5, "y": 0.5, "label": ".." }] }
//! ```
//!
//! Each entry's time comes from `startMs`/`endMs`, or a single `timestampMs`, or a `frame`
//! index converted through `fps`. Instantaneous events last
//! [`ConvertOpts::point_duration_ms`](crate::convert::pipeline::ConvertOpts). Pixel-space
//! coordinates are normalized with `frameWidth`/`frameHeight`.

use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::convert::pipeline::{ConvertOpts, ExtractorRegistry};
use crate::foundation::core::{NormBox, TimeRange};
use crate::foundation::error::{OverlayError, OverlayResult};
use crate::render::builtin::{CROSS, DETECTION, TEXT};

#[derive(Clone, Copy, Debug, Default)]
struct Frame {
    fps: Option<f64>,
    width: Option<f64>,
    height: Option<f64>,
}

impl Frame {
    fn of(raw: &Value) -> Self {
        let positive = |key: &str| {
            raw.get(key)
                .and_then(Value::as_f64)
                .filter(|v| v.is_finite() && *v > 0.0)
        };
        Self {
            fps: positive("fps"),
            width: positive("frameWidth"),
            height: positive("frameHeight"),
        }
    }

    fn dims(self) -> Option<(f64, f64)> {
        Some((self.width?, self.height?))
    }
}

fn list<'a>(raw: &'a Value, key: &str) -> OverlayResult<&'a [Value]> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(a)) => Ok(a.as_slice()),
        Some(other) => Err(OverlayError::malformed(format!(
            "'{key}' must be an array, got {}",
            json_kind(other)
        ))),
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn span(entry: &Value, frame: Frame, opts: &ConvertOpts) -> Option<TimeRange> {
    let num = |key: &str| entry.get(key).and_then(Value::as_f64);
    let point = opts.point_duration_ms.max(0.0);
    let (start, end) = match (num("startMs"), num("endMs"), num("timestampMs"), num("frame")) {
        (Some(s), Some(e), _, _) => (s, e),
        (Some(s), None, _, _) | (None, _, Some(s), _) => (s, s + point),
        (None, _, None, Some(f)) => {
            let t = f / frame.fps? * 1000.0;
            (t, t + point)
        }
        _ => return None,
    };
    let range = TimeRange::new(start, end).ok()?;
    let offset = if opts.time_offset_ms.is_finite() {
        opts.time_offset_ms
    } else {
        0.0
    };
    Some(range.shift(offset))
}

fn item(entry: &Value, range: TimeRange, data: Map<String, Value>) -> Value {
    let mut out = Map::new();
    if let Some(id) = entry.get("id").filter(|v| v.is_string() || v.is_number()) {
        out.insert("id".to_owned(), id.clone());
    }
    out.insert(
        "timeRange".to_owned(),
        json!({ "startMs": range.start_ms, "endMs": range.end_ms }),
    );
    out.insert("data".to_owned(), Value::Object(data));
    Value::Object(out)
}

fn copy_keys(entry: &Value, keys: &[&str], data: &mut Map<String, Value>) {
    for key in keys {
        if let Some(v) = entry.get(*key).filter(|v| !v.is_null()) {
            data.insert((*key).to_owned(), v.clone());
        }
    }
}

fn is_pixel_space(values: &[f64]) -> bool {
    values.iter().any(|v| *v > 1.0)
}

/// `detections[]` → `detection` items.
pub fn extract_detections(raw: &Value, opts: &ConvertOpts) -> OverlayResult<Vec<Value>> {
    let frame = Frame::of(raw);
    let mut out = Vec::new();
    for (index, entry) in list(raw, "detections")?.iter().enumerate() {
        let Some(range) = span(entry, frame, opts) else {
            tracing::warn!(index, "detection has no usable time; dropped");
            continue;
        };
        let Some(mut bbox) = entry
            .get("bbox")
            .and_then(NormBox::from_json)
            .filter(|b| b.is_finite())
        else {
            tracing::warn!(index, "detection has no usable bbox; dropped");
            continue;
        };
        if is_pixel_space(&[bbox.x, bbox.y, bbox.width, bbox.height]) {
            let Some((w, h)) = frame.dims() else {
                tracing::warn!(index, "pixel-space bbox without frame dimensions; dropped");
                continue;
            };
            bbox = bbox.normalized_by(w, h);
        }
        let confidence = entry.get("confidence").and_then(Value::as_f64);
        if confidence.is_some_and(|c| c < opts.min_confidence) {
            tracing::debug!(index, ?confidence, "detection below confidence floor");
            continue;
        }

        let mut data = Map::new();
        data.insert(
            "bbox".to_owned(),
            json!({ "x": bbox.x, "y": bbox.y, "width": bbox.width, "height": bbox.height }),
        );
        copy_keys(entry, &["label", "confidence", "color"], &mut data);
        out.push(item(entry, range, data));
    }
    Ok(out)
}

/// `captions[]` → `text` items.
pub fn extract_captions(raw: &Value, opts: &ConvertOpts) -> OverlayResult<Vec<Value>> {
    let frame = Frame::of(raw);
    let mut out = Vec::new();
    for (index, entry) in list(raw, "captions")?.iter().enumerate() {
        let message = ["text", "message"]
            .iter()
            .find_map(|k| entry.get(*k).and_then(Value::as_str))
            .map(str::trim)
            .filter(|m| !m.is_empty());
        let Some(message) = message else {
            tracing::warn!(index, "caption has no text; dropped");
            continue;
        };
        let Some(range) = span(entry, frame, opts) else {
            tracing::warn!(index, "caption has no usable time; dropped");
            continue;
        };

        let mut data = Map::new();
        data.insert("message".to_owned(), Value::String(message.to_owned()));
        copy_keys(entry, &["color"], &mut data);
        out.push(item(entry, range, data));
    }
    Ok(out)
}

/// `markers[]` → `cross` items.
pub fn extract_markers(raw: &Value, opts: &ConvertOpts) -> OverlayResult<Vec<Value>> {
    let frame = Frame::of(raw);
    let mut out = Vec::new();
    for (index, entry) in list(raw, "markers")?.iter().enumerate() {
        let coord = |k: &str| entry.get(k).and_then(Value::as_f64).filter(|v| v.is_finite());
        let (Some(mut x), Some(mut y)) = (coord("x"), coord("y")) else {
            tracing::warn!(index, "marker has no usable position; dropped");
            continue;
        };
        if is_pixel_space(&[x, y]) {
            let Some((w, h)) = frame.dims() else {
                tracing::warn!(index, "pixel-space marker without frame dimensions; dropped");
                continue;
            };
            x /= w;
            y /= h;
        }
        let Some(range) = span(entry, frame, opts) else {
            tracing::warn!(index, "marker has no usable time; dropped");
            continue;
        };

        let mut data = Map::new();
        data.insert("x".to_owned(), json!(x));
        data.insert("y".to_owned(), json!(y));
        copy_keys(entry, &["label", "size", "color"], &mut data);
        out.push(item(entry, range, data));
    }
    Ok(out)
}

pub(crate) fn install_builtins(reg: &mut ExtractorRegistry) {
    reg.register(DETECTION, Arc::new(extract_detections));
    reg.register(TEXT, Arc::new(extract_captions));
    reg.register(CROSS, Arc::new(extract_markers));
}

#[cfg(test)]
#[path = "../../tests/unit/convert/extractors.rs"]
mod tests;
