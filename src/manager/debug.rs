//! Development-only inspection hooks for the manager.

use std::collections::BTreeMap;

use serde_json::json;

use crate::annotation::model::AnnotationManifest;
use crate::foundation::core::VideoKey;
use crate::manager::manager::AnnotationManager;
use crate::overlay::controller::{OverlayState, RenderReport};

/// Snapshot of one overlay.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayDebug {
    /// Video the overlay tracks.
    pub video: VideoKey,
    /// Lifecycle state.
    pub state: OverlayState,
    /// Whether the video element still exists.
    pub video_alive: bool,
    /// Annotations in the installed manifest.
    pub annotation_count: usize,
    /// Annotation counts keyed by category.
    pub counts_by_category: BTreeMap<String, usize>,
    /// Categories excluded on this overlay.
    pub disabled: Vec<String>,
    /// Outcome of the latest render pass.
    pub last_report: RenderReport,
}

/// Snapshot of the whole manager, serializable for a console or log line.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebugInfo {
    /// Whether the manager has been torn down.
    pub destroyed: bool,
    /// Categories with a registered renderer.
    pub renderers: Vec<String>,
    /// Categories disabled manager-wide.
    pub disabled: Vec<String>,
    /// One entry per overlay, in key order.
    pub overlays: Vec<OverlayDebug>,
}

/// Demo manifest exercising every built-in category over the first ten seconds.
pub fn sample_manifest() -> Option<AnnotationManifest> {
    AnnotationManifest::from_raw(&json!({
        "metadata": { "source": "sample" },
        "items": {
            "detection": [
                { "id": "sample-person", "timeRange": { "startMs": 0, "endMs": 6000 },
                  "data": { "bbox": { "x": 0.1, "y": 0.2, "width": 0.25, "height": 0.6 },
                            "label": "person", "confidence": 0.92 } },
                { "id": "sample-vehicle", "timeRange": { "startMs": 3000, "endMs": 10000 },
                  "data": { "bbox": [0.55, 0.45, 0.35, 0.3], "label": "vehicle", "confidence": 0.71,
                            "color": "#ffaa00" } }
            ],
            "text": [
                { "id": "sample-caption", "timeRange": { "startMs": 0, "endMs": 10000 },
                  "data": { "message": "Sample alert overlay" } }
            ],
            "cross": [
                { "id": "sample-marker", "timeRange": { "startMs": 2000, "endMs": 8000 },
                  "data": { "x": 0.5, "y": 0.5, "label": "point of interest" } }
            ]
        }
    }))
}

impl AnnotationManager {
    /// Install [`sample_manifest`] on the target video.
    pub fn load_sample(&mut self) -> bool {
        let Some(manifest) = sample_manifest() else {
            return false;
        };
        let Some(key) = self.resolve_target() else {
            tracing::warn!("no target video for sample");
            return false;
        };
        self.load_manifest_into(key, manifest)
    }

    /// Snapshot of every overlay and the shared registry.
    pub fn debug_info(&self) -> DebugInfo {
        let overlays = self
            .controllers()
            .map(|ctl| {
                let manifest = ctl.manifest();
                OverlayDebug {
                    video: ctl.key(),
                    state: ctl.state(),
                    video_alive: ctl.video_alive(),
                    annotation_count: manifest.map_or(0, AnnotationManifest::count),
                    counts_by_category: manifest
                        .map(AnnotationManifest::counts_by_category)
                        .unwrap_or_default(),
                    disabled: ctl.disabled_categories().map(str::to_owned).collect(),
                    last_report: ctl.last_report(),
                }
            })
            .collect();
        DebugInfo {
            destroyed: self.is_destroyed(),
            renderers: self.registry().snapshot().categories(),
            disabled: self.disabled_categories().map(str::to_owned).collect(),
            overlays,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/manager/debug.rs"]
mod tests;
