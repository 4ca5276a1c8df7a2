use std::sync::Arc;

use crate::foundation::core::{Rect, VideoKey};
use crate::foundation::error::OverlayResult;
use crate::render::cpu::CanvasFrame;
use crate::render::surface::{DrawSurface, RecordingSurface};

/// A video element as seen by the overlay engine.
pub trait VideoElement: Send + Sync {
    /// Stable identity of this element.
    fn key(&self) -> VideoKey;
    /// Current playback position in ms.
    fn current_time_ms(&self) -> f64;
    /// Rendered box of the element in page coordinates.
    fn layout_box(&self) -> Rect;
}

/// Canvas layered over one video: a drawing surface plus placement and visibility.
pub trait OverlayCanvas: DrawSurface + Send {
    /// Position the canvas over `rect` and size its pixel buffer to match.
    fn set_layout(&mut self, rect: Rect);
    /// Last box applied by [`OverlayCanvas::set_layout`].
    fn layout(&self) -> Rect;
    /// Show or hide the canvas without touching its contents.
    fn set_visible(&mut self, visible: bool);
    /// Toggle an outline around the canvas for layout debugging.
    fn set_debug_border(&mut self, on: bool);
    /// Remove the canvas from the document.
    fn detach(&mut self);
    /// Read the composited pixels back, when this canvas keeps any.
    fn read_pixels(&mut self) -> Option<CanvasFrame> {
        None
    }
}

/// Creates the canvas for a newly discovered video.
pub trait CanvasFactory: Send {
    /// Build a canvas for `video`. Called once per overlay.
    fn create(&mut self, video: &dyn VideoElement) -> OverlayResult<Box<dyn OverlayCanvas>>;
}

impl<F> CanvasFactory for F
where
    F: FnMut(&dyn VideoElement) -> OverlayResult<Box<dyn OverlayCanvas>> + Send,
{
    fn create(&mut self, video: &dyn VideoElement) -> OverlayResult<Box<dyn OverlayCanvas>> {
        self(video)
    }
}

impl OverlayCanvas for RecordingSurface {
    fn set_layout(&mut self, rect: Rect) {
        self.apply_layout(rect);
    }

    fn layout(&self) -> Rect {
        RecordingSurface::layout(self)
    }

    fn set_visible(&mut self, visible: bool) {
        self.apply_visible(visible);
    }

    fn set_debug_border(&mut self, on: bool) {
        self.apply_debug_border(on);
    }

    fn detach(&mut self) {
        self.apply_detach();
    }
}

/// Factory handing out [`RecordingSurface`]s and keeping a handle to each, keyed by video.
#[derive(Clone, Debug, Default)]
pub struct RecordingCanvasFactory {
    made: Arc<std::sync::Mutex<Vec<(VideoKey, RecordingSurface)>>>,
}

impl RecordingCanvasFactory {
    /// New factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Surface created for `key`, most recent first.
    pub fn surface_for(&self, key: VideoKey) -> Option<RecordingSurface> {
        self.made
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .rev()
            .find(|(k, _)| *k == key)
            .map(|(_, s)| s.clone())
    }

    /// Number of canvases created so far.
    pub fn created(&self) -> usize {
        self.made.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

impl CanvasFactory for RecordingCanvasFactory {
    fn create(&mut self, video: &dyn VideoElement) -> OverlayResult<Box<dyn OverlayCanvas>> {
        let b = video.layout_box();
        let surface = RecordingSurface::new(b.width(), b.height());
        self.made
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((video.key(), surface.clone()));
        Ok(Box::new(surface))
    }
}

/// Video element with a settable clock and box, for tests and offline rendering.
#[derive(Debug)]
pub struct StaticVideo {
    key: VideoKey,
    state: std::sync::Mutex<(f64, Rect)>,
}

impl StaticVideo {
    /// Video `key` with the given box, paused at 0 ms.
    pub fn new(key: u64, layout_box: Rect) -> Arc<Self> {
        Arc::new(Self {
            key: VideoKey(key),
            state: std::sync::Mutex::new((0.0, layout_box)),
        })
    }

    /// Move the playback clock.
    pub fn seek(&self, time_ms: f64) {
        self.state.lock().unwrap_or_else(|p| p.into_inner()).0 = time_ms;
    }

    /// Change the rendered box (e.g. a responsive reflow).
    pub fn relayout(&self, layout_box: Rect) {
        self.state.lock().unwrap_or_else(|p| p.into_inner()).1 = layout_box;
    }
}

impl VideoElement for StaticVideo {
    fn key(&self) -> VideoKey {
        self.key
    }

    fn current_time_ms(&self) -> f64 {
        self.state.lock().unwrap_or_else(|p| p.into_inner()).0
    }

    fn layout_box(&self) -> Rect {
        self.state.lock().unwrap_or_else(|p| p.into_inner()).1
    }
}
