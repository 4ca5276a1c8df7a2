//! `vello_cpu` raster canvas used for offline frames (CLI `render`) and pixel tests.

use std::borrow::Cow;

use crate::foundation::color::Rgba8;
use crate::foundation::core::{Point, Rect, Size, Viewport};
use crate::foundation::error::{OverlayError, OverlayResult};
use crate::overlay::host::OverlayCanvas;
use crate::render::surface::{DrawSurface, StateStack, TextAlign, estimate_text_size};

/// A read-back canvas frame as RGBA8 pixels.
#[derive(Clone, Debug)]
pub struct CanvasFrame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
    /// Whether `data` is premultiplied alpha.
    pub premultiplied: bool,
}

impl CanvasFrame {
    /// Convert to straight alpha (what PNG encoders expect).
    pub fn into_straight(mut self) -> Self {
        if self.premultiplied {
            for px in self.data.chunks_exact_mut(4) {
                let a = u16::from(px[3]);
                if a == 0 {
                    continue;
                }
                for c in &mut px[..3] {
                    *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
                }
            }
            self.premultiplied = false;
        }
        self
    }

    /// RGBA of the pixel at `(x, y)`, if in bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        self.data.get(i..i + 4).map(|p| [p[0], p[1], p[2], p[3]])
    }
}

/// Parley shaping context bound to one registered font.
struct TextShaper {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<()>,
    family_name: String,
    font: vello_cpu::peniko::FontData,
}

impl TextShaper {
    fn new(font_bytes: Vec<u8>) -> OverlayResult<Self> {
        let mut font_ctx = parley::FontContext::default();
        let families = font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(font_bytes.clone()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            OverlayError::validation("no font families registered from font bytes")
        })?;
        let family_name = font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| OverlayError::validation("registered font family has no name"))?
            .to_string();
        Ok(Self {
            font_ctx,
            layout_ctx: parley::LayoutContext::new(),
            family_name,
            font: vello_cpu::peniko::FontData::new(vello_cpu::peniko::Blob::from(font_bytes), 0),
        })
    }

    fn layout(&mut self, text: &str, size_px: f32) -> parley::Layout<()> {
        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(Cow::Owned(self.family_name.clone())),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        let mut layout: parley::Layout<()> = builder.build(text);
        layout.break_all_lines(None);
        layout
    }
}

/// Overlay canvas rasterized on the CPU with `vello_cpu`.
///
/// Draw calls accumulate in a render context and are composited into the pixmap on
/// [`CpuCanvas::read_frame`] or before a partial clear. Text needs a font supplied with
/// [`CpuCanvas::with_font`]; without one, text calls are skipped and sizes are estimated.
pub struct CpuCanvas {
    width: u16,
    height: u16,
    pixmap: vello_cpu::Pixmap,
    ctx: vello_cpu::RenderContext,
    dirty: bool,
    state: StateStack,
    layout: Rect,
    visible: bool,
    debug_border: Option<Rgba8>,
    border_color: Rgba8,
    detached: bool,
    shaper: Option<TextShaper>,
    warned_no_font: bool,
}

impl std::fmt::Debug for CpuCanvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CpuCanvas")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("visible", &self.visible)
            .field("detached", &self.detached)
            .field("has_font", &self.shaper.is_some())
            .finish()
    }
}

impl CpuCanvas {
    /// Canvas of `width`x`height` pixels, visible, with no font.
    pub fn new(width: u32, height: u32) -> OverlayResult<Self> {
        let (w, h) = pixel_dims(width as f64, height as f64)?;
        Ok(Self {
            width: w,
            height: h,
            pixmap: vello_cpu::Pixmap::new(w, h),
            ctx: vello_cpu::RenderContext::new(w, h),
            dirty: false,
            state: StateStack::default(),
            layout: Rect::new(0.0, 0.0, f64::from(w), f64::from(h)),
            visible: true,
            debug_border: None,
            border_color: Rgba8::rgb(255, 0, 255),
            detached: false,
            shaper: None,
            warned_no_font: false,
        })
    }

    /// Use `font_bytes` (TTF/OTF) for text.
    pub fn with_font(mut self, font_bytes: Vec<u8>) -> OverlayResult<Self> {
        self.shaper = Some(TextShaper::new(font_bytes)?);
        Ok(self)
    }

    /// Color of the debug border outline.
    pub fn with_border_color(mut self, color: Rgba8) -> Self {
        self.border_color = color;
        self
    }

    /// Whether the canvas is currently shown.
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Composite pending draws and read the canvas back.
    ///
    /// A hidden canvas reads back fully transparent.
    pub fn read_frame(&mut self) -> CanvasFrame {
        self.flush();
        let mut data = self.pixmap.data_as_u8_slice().to_vec();
        if !self.visible {
            data.fill(0);
        } else if let Some(color) = self.debug_border {
            paint_border(&mut data, self.width, self.height, color.premultiplied());
        }
        CanvasFrame {
            width: u32::from(self.width),
            height: u32::from(self.height),
            data,
            premultiplied: true,
        }
    }

    fn flush(&mut self) {
        if !self.dirty {
            return;
        }
        self.ctx.flush();
        let mut layer = vello_cpu::Pixmap::new(self.width, self.height);
        self.ctx.render_to_pixmap(&mut layer);
        premul_over_in_place(
            self.pixmap.data_as_u8_slice_mut(),
            layer.data_as_u8_slice(),
        );
        self.ctx.reset();
        self.dirty = false;
    }

    fn set_paint(&mut self, c: Rgba8) {
        self.ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        self.ctx
            .set_paint(vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a));
        self.dirty = true;
    }

    fn text_size(&mut self, text: &str) -> Size {
        let size_px = self.state.current().font_size;
        match self.shaper.as_mut() {
            Some(shaper) => {
                let layout = shaper.layout(text, size_px);
                Size::new(f64::from(layout.width()), f64::from(layout.height()))
            }
            None => estimate_text_size(text, f64::from(size_px)),
        }
    }
}

impl DrawSurface for CpuCanvas {
    fn viewport(&self) -> Viewport {
        Viewport::new(f64::from(self.width), f64::from(self.height))
    }

    fn save(&mut self) {
        self.state.save();
    }

    fn restore(&mut self) {
        self.state.restore();
    }

    fn set_stroke_color(&mut self, color: Rgba8) {
        self.state.current_mut().stroke = color;
    }

    fn set_fill_color(&mut self, color: Rgba8) {
        self.state.current_mut().fill = color;
    }

    fn set_line_width(&mut self, width: f64) {
        self.state.current_mut().line_width = width;
    }

    fn set_font_size(&mut self, size_px: f32) {
        self.state.current_mut().font_size = size_px;
    }

    fn stroke_rect(&mut self, rect: Rect) {
        let s = *self.state.current();
        self.set_paint(s.stroke);
        self.ctx
            .set_stroke(vello_cpu::kurbo::Stroke::new(s.line_width.max(0.0)));
        self.ctx.stroke_rect(&rect_to_cpu(rect));
    }

    fn fill_rect(&mut self, rect: Rect) {
        let fill = self.state.current().fill;
        self.set_paint(fill);
        self.ctx.fill_rect(&rect_to_cpu(rect));
    }

    fn fill_text(&mut self, text: &str, anchor: Point, align: TextAlign) {
        let s = *self.state.current();
        let Some(shaper) = self.shaper.as_mut() else {
            if !self.warned_no_font {
                tracing::debug!("cpu canvas has no font; text skipped");
                self.warned_no_font = true;
            }
            return;
        };
        let layout = shaper.layout(text, s.font_size);
        let font = shaper.font.clone();
        let x = match align {
            TextAlign::Left => anchor.x,
            TextAlign::Center => anchor.x - f64::from(layout.width()) / 2.0,
        };

        self.set_paint(s.fill);
        self.ctx
            .set_transform(vello_cpu::kurbo::Affine::translate((x, anchor.y)));
        for line in layout.lines() {
            for item in line.items() {
                let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                    continue;
                };
                let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                    id: g.id,
                    x: g.x,
                    y: g.y,
                });
                self.ctx
                    .glyph_run(&font)
                    .font_size(run.run().font_size())
                    .fill_glyphs(glyphs);
            }
        }
        self.ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
    }

    fn measure_text(&mut self, text: &str) -> Size {
        self.text_size(text)
    }

    fn clear(&mut self, rect: Rect) {
        let full = self.viewport().bounds();
        if rect.x0 <= full.x0 && rect.y0 <= full.y0 && rect.x1 >= full.x1 && rect.y1 >= full.y1 {
            self.ctx.reset();
            self.dirty = false;
            self.pixmap.data_as_u8_slice_mut().fill(0);
            return;
        }
        self.flush();
        clear_region(
            self.pixmap.data_as_u8_slice_mut(),
            self.width,
            self.height,
            rect,
        );
    }
}

impl OverlayCanvas for CpuCanvas {
    fn set_layout(&mut self, rect: Rect) {
        self.layout = rect;
        let Ok((w, h)) = pixel_dims(rect.width(), rect.height()) else {
            tracing::warn!(?rect, "overlay box too large for the cpu canvas; size kept");
            return;
        };
        if w != self.width || h != self.height {
            self.width = w;
            self.height = h;
            self.pixmap = vello_cpu::Pixmap::new(w, h);
            self.ctx = vello_cpu::RenderContext::new(w, h);
            self.dirty = false;
        }
    }

    fn layout(&self) -> Rect {
        self.layout
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn set_debug_border(&mut self, on: bool) {
        self.debug_border = on.then_some(self.border_color);
    }

    fn detach(&mut self) {
        self.detached = true;
        self.visible = false;
    }

    fn read_pixels(&mut self) -> Option<CanvasFrame> {
        Some(self.read_frame())
    }
}

fn pixel_dims(width: f64, height: f64) -> OverlayResult<(u16, u16)> {
    let conv = |v: f64, what: &str| -> OverlayResult<u16> {
        let v = if v.is_finite() { v.round().max(1.0) } else { 1.0 };
        if v > f64::from(u16::MAX) {
            return Err(OverlayError::validation(format!(
                "canvas {what} exceeds u16"
            )));
        }
        Ok(v as u16)
    };
    Ok((conv(width, "width")?, conv(height, "height")?))
}

fn rect_to_cpu(r: Rect) -> vello_cpu::kurbo::Rect {
    vello_cpu::kurbo::Rect::new(r.x0, r.y0, r.x1, r.y1)
}

fn clear_region(data: &mut [u8], width: u16, height: u16, rect: Rect) {
    let rect = rect.abs();
    let x0 = rect.x0.floor().clamp(0.0, f64::from(width)) as usize;
    let x1 = rect.x1.ceil().clamp(0.0, f64::from(width)) as usize;
    let y0 = rect.y0.floor().clamp(0.0, f64::from(height)) as usize;
    let y1 = rect.y1.ceil().clamp(0.0, f64::from(height)) as usize;
    if x0 >= x1 || y0 >= y1 {
        return;
    }
    let stride = usize::from(width) * 4;
    for y in y0..y1 {
        let row = y * stride;
        data[row + x0 * 4..row + x1 * 4].fill(0);
    }
}

fn paint_border(data: &mut [u8], width: u16, height: u16, px: [u8; 4]) {
    let (w, h) = (usize::from(width), usize::from(height));
    for y in 0..h {
        for x in 0..w {
            if x == 0 || y == 0 || x + 1 == w || y + 1 == h {
                let i = (y * w + x) * 4;
                data[i..i + 4].copy_from_slice(&px);
            }
        }
    }
}

fn premul_over_in_place(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.chunks_exact_mut(4).zip(src.chunks_exact(4)) {
        let sa = u16::from(s[3]);
        if sa == 0 {
            continue;
        }
        let inv = 255u16 - sa;
        d[3] = s[3].saturating_add(mul_div255_u8(u16::from(d[3]), inv));
        for c in 0..3 {
            let dc = mul_div255_u8(u16::from(d[c]), inv);
            d[c] = s[c].saturating_add(dc);
        }
    }
}

fn mul_div255_u8(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

#[cfg(test)]
#[path = "../../tests/unit/render/cpu.rs"]
mod tests;
