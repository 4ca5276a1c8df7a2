use std::any::Any;
use std::collections::{BTreeSet, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use crate::annotation::model::AnnotationManifest;
use crate::foundation::core::{Rect, VideoKey};
use crate::foundation::error::OverlayError;
use crate::overlay::host::{OverlayCanvas, VideoElement};
use crate::render::cpu::CanvasFrame;
use crate::render::registry::RegistryHandle;
use crate::render::surface::DrawSurface;

/// Lifecycle state of an [`OverlayController`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayState {
    /// Canvas exists, no manifest loaded.
    Idle,
    /// Manifest loaded and canvas shown.
    Active,
    /// Canvas hidden; manifest (if any) is kept.
    Hidden,
    /// Torn down; every further call is a no-op.
    Destroyed,
}

/// Outcome of one render pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct RenderReport {
    /// Annotations the manifest reported visible.
    pub visible: usize,
    /// Annotations a renderer drew without error.
    pub drawn: usize,
    /// Visible annotations skipped (disabled category, no renderer, renderer declined).
    pub skipped: usize,
    /// Renderer invocations that returned an error.
    pub failed: usize,
}

/// Owns the canvas over one video and keeps it in step with playback time.
///
/// Every render pass re-checks the video's box before drawing, clears the canvas, asks the
/// manifest what is visible and hands each annotation to the renderer registered for its
/// category. Renderer failures are contained to the annotation being drawn.
pub struct OverlayController {
    key: VideoKey,
    video: Weak<dyn VideoElement>,
    canvas: Option<Box<dyn OverlayCanvas>>,
    registry: RegistryHandle,
    manifest: Option<AnnotationManifest>,
    visible: bool,
    debug_border: bool,
    disabled: BTreeSet<String>,
    reported: HashSet<String>,
    last_report: RenderReport,
}

impl std::fmt::Debug for OverlayController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayController")
            .field("key", &self.key)
            .field("state", &self.state())
            .field("annotations", &self.manifest.as_ref().map(|m| m.count()))
            .field("disabled", &self.disabled)
            .finish()
    }
}

impl OverlayController {
    /// Bind `canvas` to `video`. The canvas is positioned over the video and starts hidden.
    pub fn new(
        video: &Arc<dyn VideoElement>,
        mut canvas: Box<dyn OverlayCanvas>,
        registry: RegistryHandle,
    ) -> Self {
        canvas.set_layout(video.layout_box());
        canvas.set_visible(false);
        Self {
            key: video.key(),
            video: Arc::downgrade(video),
            canvas: Some(canvas),
            registry,
            manifest: None,
            visible: false,
            debug_border: false,
            disabled: BTreeSet::new(),
            reported: HashSet::new(),
            last_report: RenderReport::default(),
        }
    }

    /// Identity of the video this overlay tracks.
    pub fn key(&self) -> VideoKey {
        self.key
    }

    /// Current lifecycle state.
    pub fn state(&self) -> OverlayState {
        if self.canvas.is_none() {
            OverlayState::Destroyed
        } else if !self.visible {
            OverlayState::Hidden
        } else if self.manifest.is_some() {
            OverlayState::Active
        } else {
            OverlayState::Idle
        }
    }

    /// `false` once destroyed.
    pub fn is_alive(&self) -> bool {
        self.canvas.is_some()
    }

    /// Whether the tracked video element still exists.
    pub fn video_alive(&self) -> bool {
        self.video.strong_count() > 0
    }

    /// Whether the canvas is shown.
    pub fn is_visible(&self) -> bool {
        self.is_alive() && self.visible
    }

    /// The installed manifest, if any.
    pub fn manifest(&self) -> Option<&AnnotationManifest> {
        self.manifest.as_ref()
    }

    /// Report from the most recent render pass.
    pub fn last_report(&self) -> RenderReport {
        self.last_report
    }

    /// Categories currently excluded from drawing on this overlay.
    pub fn disabled_categories(&self) -> impl Iterator<Item = &str> {
        self.disabled.iter().map(String::as_str)
    }

    /// Install `manifest`, replacing any previous one, and draw it at the video's current time.
    pub fn load_manifest(&mut self, manifest: AnnotationManifest) {
        if !self.is_alive() {
            return;
        }
        tracing::debug!(
            video = %self.key,
            count = manifest.count(),
            counts = ?manifest.counts_by_category(),
            "manifest installed"
        );
        self.manifest = Some(manifest);
        self.reported.clear();
        self.render_current();
    }

    /// Drop the manifest and blank the canvas. The canvas itself is kept.
    pub fn clear_annotations(&mut self) {
        let Some(canvas) = self.canvas.as_mut() else {
            return;
        };
        self.manifest = None;
        self.reported.clear();
        canvas.clear(canvas.viewport().bounds());
        self.last_report = RenderReport::default();
    }

    /// Show the canvas.
    pub fn show(&mut self) {
        let Some(canvas) = self.canvas.as_mut() else {
            return;
        };
        if !self.visible {
            self.visible = true;
            canvas.set_visible(true);
        }
    }

    /// Hide the canvas; the manifest and render loop stay in place.
    pub fn hide(&mut self) {
        let Some(canvas) = self.canvas.as_mut() else {
            return;
        };
        if self.visible {
            self.visible = false;
            canvas.set_visible(false);
        }
    }

    /// Toggle the canvas outline used for layout debugging.
    pub fn set_debug_border(&mut self, on: bool) {
        let Some(canvas) = self.canvas.as_mut() else {
            return;
        };
        if self.debug_border != on {
            self.debug_border = on;
            canvas.set_debug_border(on);
        }
    }

    /// Include or exclude one category from drawing on this overlay only, then redraw.
    pub fn toggle_renderer(&mut self, category: &str, enabled: bool) {
        if !self.is_alive() {
            return;
        }
        let changed = if enabled {
            self.disabled.remove(category)
        } else {
            self.disabled.insert(category.to_owned())
        };
        if changed {
            tracing::debug!(video = %self.key, %category, enabled, "renderer toggled");
            self.render_current();
        }
    }

    /// Whether `category` is drawn on this overlay.
    pub fn is_renderer_enabled(&self, category: &str) -> bool {
        !self.disabled.contains(category)
    }

    /// Handle the video's time-update signal.
    pub fn on_time_update(&mut self, time_ms: f64) -> RenderReport {
        self.render(time_ms)
    }

    /// Render at the video's own clock. No-op once the video is gone.
    pub fn render_current(&mut self) -> RenderReport {
        match self.video.upgrade() {
            Some(video) => {
                let t = video.current_time_ms();
                self.render(t)
            }
            None => RenderReport::default(),
        }
    }

    /// Move/resize the canvas if the video's box changed. Returns `true` when it did.
    pub fn sync_layout(&mut self) -> bool {
        let Some(video) = self.video.upgrade() else {
            return false;
        };
        let Some(canvas) = self.canvas.as_mut() else {
            return false;
        };
        let target = video.layout_box();
        if same_box(canvas.layout(), target) {
            return false;
        }
        tracing::debug!(video = %self.key, ?target, "overlay resized");
        canvas.set_layout(target);
        true
    }

    /// One full render pass at `time_ms`.
    pub fn render(&mut self, time_ms: f64) -> RenderReport {
        if !self.is_alive() {
            return RenderReport::default();
        }
        self.sync_layout();

        let registry = self.registry.snapshot();
        let Some(canvas) = self.canvas.as_mut() else {
            return RenderReport::default();
        };
        let viewport = canvas.viewport();
        canvas.clear(viewport.bounds());

        let mut report = RenderReport::default();
        let Some(manifest) = self.manifest.as_ref() else {
            self.last_report = report;
            return report;
        };
        if !time_ms.is_finite() {
            tracing::warn!(video = %self.key, time_ms, "non-finite playback time; frame left blank");
            self.last_report = report;
            return report;
        }

        for annotation in manifest.visible_at(time_ms) {
            report.visible += 1;
            if self.disabled.contains(&annotation.category) {
                report.skipped += 1;
                continue;
            }
            let Some(renderer) = registry.lookup(&annotation.category) else {
                if self.reported.insert(annotation.category.clone()) {
    tracing::warn!(
                        video = %self.key,
                        error = %OverlayError::unknown_category(annotation.category.as_str()),
                        "no renderer registered; category skipped"
                    );
                }
                report.skipped += 1;
                continue;
            };
            if !renderer.can_render(annotation) {
                report.skipped += 1;
                continue;
            }

            canvas.save();
            let res = panic::catch_unwind(AssertUnwindSafe(|| {
                renderer.render(annotation, time_ms, viewport, &mut **canvas)
            }));
            canvas.restore();
            let res = res.unwrap_or_else(|payload| {
                Err(OverlayError::render(format!(
                    "renderer panicked: {}",
                    panic_message(payload.as_ref())
                )))
            });
            match res {
                Ok(()) => report.drawn += 1,
                Err(e) => {
                    report.failed += 1;
                    tracing::warn!(
                        video = %self.key,
                        category = %annotation.category,
                        id = %annotation.id,
                        error = %e,
                        "renderer failed; annotation skipped"
                    );
                }
            }
        }

        self.last_report = report;
        report
    }

    /// Pixels of the canvas as last drawn, for canvases that keep them.
    pub fn read_pixels(&mut self) -> Option<CanvasFrame> {
        self.canvas.as_mut()?.read_pixels()
    }

    /// Remove the canvas and release the manifest. Terminal.
    pub fn destroy(&mut self) {
        let Some(mut canvas) = self.canvas.take() else {
            return;
        };
        canvas.detach();
        self.manifest = None;
        self.visible = false;
        self.disabled.clear();
        self.reported.clear();
        tracing::debug!(video = %self.key, "overlay destroyed");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string payload"
    }
}

impl Drop for OverlayController {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn same_box(a: Rect, b: Rect) -> bool {
    const EPS: f64 = 0.5;
    (a.x0 - b.x0).abs() < EPS
        && (a.y0 - b.y0).abs() < EPS
        && (a.x1 - b.x1).abs() < EPS
        && (a.y1 - b.y1).abs() < EPS
}

#[cfg(test)]
#[path = "../../tests/unit/overlay/controller.rs"]
mod tests;
