use std::sync::{Arc, Mutex, MutexGuard};

use crate::foundation::color::Rgba8;
use crate::foundation::core::{Point, Rect, Size, Viewport};

/// Horizontal placement of a text line relative to its anchor point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextAlign {
    /// Anchor is the top-left corner of the line box.
    #[default]
    Left,
    /// Anchor is the top-center of the line box.
    Center,
}

/// Drawing state saved and restored by [`DrawSurface::save`] / [`DrawSurface::restore`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawState {
    /// Color used by [`DrawSurface::stroke_rect`].
    pub stroke: Rgba8,
    /// Color used by [`DrawSurface::fill_rect`] and [`DrawSurface::fill_text`].
    pub fill: Rgba8,
    /// Stroke width in pixels.
    pub line_width: f64,
    /// Font size in pixels.
    pub font_size: f32,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            stroke: Rgba8::rgb(0, 0, 0),
            fill: Rgba8::rgb(0, 0, 0),
            line_width: 1.0,
            font_size: 10.0,
        }
    }
}

/// Current draw state plus the stack of saved states.
///
/// Unbalanced `restore` calls are ignored, matching 2D canvas semantics.
#[derive(Clone, Debug, Default)]
pub struct StateStack {
    current: DrawState,
    saved: Vec<DrawState>,
}

impl StateStack {
    /// The active state.
    pub fn current(&self) -> &DrawState {
        &self.current
    }

    /// Mutable access to the active state.
    pub fn current_mut(&mut self) -> &mut DrawState {
        &mut self.current
    }

    /// Push a copy of the active state.
    pub fn save(&mut self) {
        self.saved.push(self.current);
    }

    /// Pop the most recently saved state, if any.
    pub fn restore(&mut self) {
        if let Some(s) = self.saved.pop() {
            self.current = s;
        }
    }

    /// Number of outstanding saves.
    pub fn depth(&self) -> usize {
        self.saved.len()
    }
}

/// Minimal immediate-mode 2D drawing surface renderers draw into.
pub trait DrawSurface {
    /// Current pixel dimensions.
    fn viewport(&self) -> Viewport;
    /// Push the current draw state.
    fn save(&mut self);
    /// Pop the last pushed draw state.
    fn restore(&mut self);
    /// Set the stroke color.
    fn set_stroke_color(&mut self, color: Rgba8);
    /// Set the fill color (rectangles and text).
    fn set_fill_color(&mut self, color: Rgba8);
    /// Set the stroke width in pixels.
    fn set_line_width(&mut self, width: f64);
    /// Set the font size in pixels.
    fn set_font_size(&mut self, size_px: f32);
    /// Stroke the outline of `rect`.
    fn stroke_rect(&mut self, rect: Rect);
    /// Fill `rect`.
    fn fill_rect(&mut self, rect: Rect);
    /// Draw one line of text; see [`TextAlign`] for the anchor convention.
    fn fill_text(&mut self, text: &str, anchor: Point, align: TextAlign);
    /// Size of the line box `text` would occupy with the current font size.
    fn measure_text(&mut self, text: &str) -> Size;
    /// Reset `rect` to transparent.
    fn clear(&mut self, rect: Rect);
}

/// One recorded surface or canvas operation.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawCmd {
    /// `save()`.
    Save,
    /// `restore()`.
    Restore,
    /// `clear(rect)`.
    Clear(Rect),
    /// `stroke_rect` with the state in effect.
    StrokeRect {
        /// Outline rectangle.
        rect: Rect,
        /// Stroke color.
        color: Rgba8,
        /// Stroke width.
        width: f64,
    },
    /// `fill_rect` with the state in effect.
    FillRect {
        /// Filled rectangle.
        rect: Rect,
        /// Fill color.
        color: Rgba8,
    },
    /// `fill_text` with the state in effect.
    FillText {
        /// Drawn text.
        text: String,
        /// Anchor point.
        anchor: Point,
        /// Anchor convention.
        align: TextAlign,
        /// Fill color.
        color: Rgba8,
        /// Font size.
        size_px: f32,
    },
    /// Canvas moved/resized to track the video box.
    SetLayout(Rect),
    /// Canvas shown or hidden.
    SetVisible(bool),
    /// Debug border toggled.
    SetDebugBorder(bool),
    /// Canvas removed from the document.
    Detach,
}

impl DrawCmd {
    /// Return `true` for commands that put pixels on the surface.
    pub fn is_paint(&self) -> bool {
        matches!(
            self,
            Self::StrokeRect { .. } | Self::FillRect { .. } | Self::FillText { .. }
        )
    }
}

#[derive(Debug, Default)]
struct Recording {
    viewport: Viewport,
    layout: Rect,
    visible: bool,
    debug_border: bool,
    detached: bool,
    state: StateStack,
    cmds: Vec<DrawCmd>,
}

/// Surface that records every call instead of rasterizing.
///
/// Clones share one recording, so a test can keep a handle while the overlay owns another.
#[derive(Clone, Debug, Default)]
pub struct RecordingSurface {
    inner: Arc<Mutex<Recording>>,
}

impl RecordingSurface {
    /// New recorder with the given pixel size.
    pub fn new(width: f64, height: f64) -> Self {
        let out = Self::default();
        out.lock().viewport = Viewport::new(width, height);
        out
    }

    fn lock(&self) -> MutexGuard<'_, Recording> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Every recorded command, oldest first.
    pub fn commands(&self) -> Vec<DrawCmd> {
        self.lock().cmds.clone()
    }

    /// Number of recorded commands.
    pub fn command_count(&self) -> usize {
        self.lock().cmds.len()
    }

    /// Commands issued after the most recent full-surface clear.
    pub fn last_frame(&self) -> Vec<DrawCmd> {
        let rec = self.lock();
        let full = rec.viewport.bounds();
        let start = rec
            .cmds
            .iter()
            .rposition(|c| matches!(c, DrawCmd::Clear(r) if *r == full))
            .map_or(0, |i| i + 1);
        rec.cmds[start..].to_vec()
    }

    /// Text strings drawn in the last frame.
    pub fn last_frame_texts(&self) -> Vec<String> {
        self.last_frame()
            .into_iter()
            .filter_map(|c| match c {
                DrawCmd::FillText { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    /// Forget recorded commands (state and flags are kept).
    pub fn clear_commands(&self) {
        self.lock().cmds.clear();
    }

    /// Outstanding `save` calls without a matching `restore`.
    pub fn save_depth(&self) -> usize {
        self.lock().state.depth()
    }

    /// Current visibility flag.
    pub fn is_visible(&self) -> bool {
        self.lock().visible
    }

    /// Current debug border flag.
    pub fn has_debug_border(&self) -> bool {
        self.lock().debug_border
    }

    /// Whether the canvas has been removed from the document.
    pub fn is_detached(&self) -> bool {
        self.lock().detached
    }

    /// Last layout box applied.
    pub fn layout(&self) -> Rect {
        self.lock().layout
    }

    pub(crate) fn apply_layout(&self, rect: Rect) {
        let mut rec = self.lock();
        rec.layout = rect;
        rec.viewport = Viewport::from_rect(rect);
        rec.cmds.push(DrawCmd::SetLayout(rect));
    }

    pub(crate) fn apply_visible(&self, visible: bool) {
        let mut rec = self.lock();
        rec.visible = visible;
        rec.cmds.push(DrawCmd::SetVisible(visible));
    }

    pub(crate) fn apply_debug_border(&self, on: bool) {
        let mut rec = self.lock();
        rec.debug_border = on;
        rec.cmds.push(DrawCmd::SetDebugBorder(on));
    }

    pub(crate) fn apply_detach(&self) {
        let mut rec = self.lock();
        rec.detached = true;
        rec.cmds.push(DrawCmd::Detach);
    }
}

impl DrawSurface for RecordingSurface {
    fn viewport(&self) -> Viewport {
        self.lock().viewport
    }

    fn save(&mut self) {
        let mut rec = self.lock();
        rec.state.save();
        rec.cmds.push(DrawCmd::Save);
    }

    fn restore(&mut self) {
        let mut rec = self.lock();
        rec.state.restore();
        rec.cmds.push(DrawCmd::Restore);
    }

    fn set_stroke_color(&mut self, color: Rgba8) {
        self.lock().state.current_mut().stroke = color;
    }

    fn set_fill_color(&mut self, color: Rgba8) {
        self.lock().state.current_mut().fill = color;
    }

    fn set_line_width(&mut self, width: f64) {
        self.lock().state.current_mut().line_width = width;
    }

    fn set_font_size(&mut self, size_px: f32) {
        self.lock().state.current_mut().font_size = size_px;
    }

    fn stroke_rect(&mut self, rect: Rect) {
        let mut rec = self.lock();
        let s = *rec.state.current();
        rec.cmds.push(DrawCmd::StrokeRect {
            rect,
            color: s.stroke,
            width: s.line_width,
        });
    }

    fn fill_rect(&mut self, rect: Rect) {
        let mut rec = self.lock();
        let color = rec.state.current().fill;
        rec.cmds.push(DrawCmd::FillRect { rect, color });
    }

    fn fill_text(&mut self, text: &str, anchor: Point, align: TextAlign) {
        let mut rec = self.lock();
        let s = *rec.state.current();
        rec.cmds.push(DrawCmd::FillText {
            text: text.to_owned(),
            anchor,
            align,
            color: s.fill,
            size_px: s.font_size,
        });
    }

    fn measure_text(&mut self, text: &str) -> Size {
        let size = f64::from(self.lock().state.current().font_size);
        estimate_text_size(text, size)
    }

    fn clear(&mut self, rect: Rect) {
        self.lock().cmds.push(DrawCmd::Clear(rect));
    }
}

/// Monospace-ish estimate used when no shaped layout is available.
pub(crate) fn estimate_text_size(text: &str, font_size: f64) -> Size {
    Size::new(
        text.chars().count() as f64 * font_size * 0.6,
        font_size * 1.2,
    )
}

#[cfg(test)]
#[path = "../../tests/unit/render/surface.rs"]
mod tests;
