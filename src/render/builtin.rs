//! Renderers for the `detection`, `text` and `cross` categories.

use std::sync::Arc;

use serde::Deserialize;

use crate::annotation::model::Annotation;
use crate::foundation::color::Rgba8;
use crate::foundation::core::{NormBox, NormPoint, Point, Rect, Viewport};
use crate::foundation::error::{OverlayError, OverlayResult};
use crate::render::registry::{Renderer, RendererRegistry};
use crate::render::style::OverlayStyle;
use crate::render::surface::{DrawSurface, TextAlign};

/// Category drawn by [`DetectionRenderer`].
pub const DETECTION: &str = "detection";
/// Category drawn by [`TextRenderer`].
pub const TEXT: &str = "text";
/// Category drawn by [`CrossRenderer`].
pub const CROSS: &str = "cross";

fn payload<'a, T: Deserialize<'a>>(annotation: &'a Annotation) -> OverlayResult<T> {
    T::deserialize(&annotation.data).map_err(|e| {
        OverlayError::render(format!(
            "{} '{}' has an unusable payload: {e}",
            annotation.category, annotation.id
        ))
    })
}

#[derive(Deserialize)]
struct DetectionData {
    bbox: serde_json::Value,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    color: Option<Rgba8>,
}

impl DetectionData {
    fn tag(&self) -> Option<String> {
        let pct = self
            .confidence
            .filter(|c| c.is_finite())
            .map(|c| format!("{:.0}%", c.clamp(0.0, 1.0) * 100.0));
        match (self.label.as_deref().map(str::trim), pct) {
            (Some(l), Some(p)) if !l.is_empty() => Some(format!("{l} {p}")),
            (Some(l), None) if !l.is_empty() => Some(l.to_owned()),
            (_, Some(p)) => Some(p),
            _ => None,
        }
    }
}

/// Stroked bounding box with a filled label tag above it.
///
/// Payload: `{ bbox: {x,y,width,height} | [x,y,w,h], label?, confidence?, color? }` in normalized
/// coordinates. When the tag would leave the top of the frame it is drawn just inside the box.
#[derive(Clone, Debug, Default)]
pub struct DetectionRenderer {
    style: OverlayStyle,
}

impl DetectionRenderer {
    /// Renderer using `style`.
    pub fn new(style: OverlayStyle) -> Self {
        Self { style }
    }
}

impl Renderer for DetectionRenderer {
    fn kind(&self) -> &str {
        DETECTION
    }

    fn render(
        &self,
        annotation: &Annotation,
        time_ms: f64,
        viewport: Viewport,
        surface: &mut dyn DrawSurface,
    ) -> OverlayResult<()> {
        if !annotation.is_visible_at(time_ms) || !viewport.is_drawable() {
            return Ok(());
        }
        let d: DetectionData = payload(annotation)?;
        let bbox = NormBox::from_json(&d.bbox)
            .filter(|b| b.is_finite())
            .ok_or_else(|| {
                OverlayError::render(format!("detection '{}' has no usable bbox", annotation.id))
            })?;
        let color = d.color.unwrap_or(self.style.detection_color);
        let rect = viewport.project_box(bbox);

        surface.save();
        surface.set_line_width(self.style.stroke_width);
        surface.set_stroke_color(color);
        surface.stroke_rect(rect);

        if let Some(tag) = d.tag() {
            surface.set_font_size(self.style.font_size_px);
            let size = surface.measure_text(&tag);
            let pad = self.style.label_padding_px;
            let tag_h = size.height + 2.0 * pad;
            let top = if rect.y0 - tag_h >= 0.0 {
                rect.y0 - tag_h
            } else {
                rect.y0
            };
            surface.set_fill_color(color);
            surface.fill_rect(Rect::new(
                rect.x0,
                top,
                rect.x0 + size.width + 2.0 * pad,
                top + tag_h,
            ));
            surface.set_fill_color(self.style.label_text_color);
            surface.fill_text(&tag, Point::new(rect.x0 + pad, top + pad), TextAlign::Left);
        }

        surface.restore();
        Ok(())
    }
}

#[derive(Deserialize)]
struct TextData {
    #[serde(alias = "text")]
    message: String,
    #[serde(default)]
    color: Option<Rgba8>,
}

/// One line of text centered horizontally at a fixed distance from the top edge.
///
/// Payload: `{ message | text, color? }`.
#[derive(Clone, Debug, Default)]
pub struct TextRenderer {
    style: OverlayStyle,
}

impl TextRenderer {
    /// Renderer using `style`.
    pub fn new(style: OverlayStyle) -> Self {
        Self { style }
    }
}

impl Renderer for TextRenderer {
    fn kind(&self) -> &str {
        TEXT
    }

    fn render(
        &self,
        annotation: &Annotation,
        time_ms: f64,
        viewport: Viewport,
        surface: &mut dyn DrawSurface,
    ) -> OverlayResult<()> {
        if !annotation.is_visible_at(time_ms) || !viewport.is_drawable() {
            return Ok(());
        }
        let d: TextData = payload(annotation)?;
        let message = d.message.trim();
        if message.is_empty() {
            return Ok(());
        }

        surface.save();
        surface.set_font_size(self.style.font_size_px);
        let size = surface.measure_text(message);
        let pad = self.style.label_padding_px;
        let cx = viewport.width / 2.0;
        let top = self.style.text_offset_y_px;

        surface.set_fill_color(self.style.text_backing);
        surface.fill_rect(Rect::new(
            cx - size.width / 2.0 - pad,
            top - pad,
            cx + size.width / 2.0 + pad,
            top + size.height + pad,
        ));
        surface.set_fill_color(d.color.unwrap_or(self.style.text_color));
        surface.fill_text(message, Point::new(cx, top), TextAlign::Center);
        surface.restore();
        Ok(())
    }
}

#[derive(Deserialize)]
struct CrossData {
    x: f64,
    y: f64,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    size: Option<f64>,
    #[serde(default)]
    color: Option<Rgba8>,
}

/// Crosshair marker at a normalized point, with an optional label to its right.
///
/// Payload: `{ x, y, label?, size?, color? }`; `size` is the half-length of each arm in pixels.
#[derive(Clone, Debug, Default)]
pub struct CrossRenderer {
    style: OverlayStyle,
}

impl CrossRenderer {
    /// Renderer using `style`.
    pub fn new(style: OverlayStyle) -> Self {
        Self { style }
    }
}

impl Renderer for CrossRenderer {
    fn kind(&self) -> &str {
        CROSS
    }

    fn render(
        &self,
        annotation: &Annotation,
        time_ms: f64,
        viewport: Viewport,
        surface: &mut dyn DrawSurface,
    ) -> OverlayResult<()> {
        if !annotation.is_visible_at(time_ms) || !viewport.is_drawable() {
            return Ok(());
        }
        let d: CrossData = payload(annotation)?;
        if !d.x.is_finite() || !d.y.is_finite() {
            return Err(OverlayError::render(format!(
                "cross '{}' position is not finite",
                annotation.id
            )));
        }
        let c = viewport.project_point(NormPoint { x: d.x, y: d.y });
        let arm = d
            .size
            .filter(|s| s.is_finite() && *s > 0.0)
            .unwrap_or(self.style.cross_size_px);
        let half = self.style.stroke_width / 2.0;

        surface.save();
        surface.set_fill_color(d.color.unwrap_or(self.style.cross_color));
        surface.fill_rect(Rect::new(c.x - arm, c.y - half, c.x + arm, c.y + half));
        surface.fill_rect(Rect::new(c.x - half, c.y - arm, c.x + half, c.y + arm));
        if let Some(label) = d.label.as_deref().map(str::trim).filter(|l| !l.is_empty()) {
            surface.set_font_size(self.style.font_size_px);
            let size = surface.measure_text(label);
            surface.fill_text(
                label,
                Point::new(c.x + arm + self.style.label_padding_px, c.y - size.height / 2.0),
                TextAlign::Left,
            );
        }
        surface.restore();
        Ok(())
    }
}

/// Registry with the `detection`, `text` and `cross` renderers installed.
pub fn builtin_registry(style: &OverlayStyle) -> RendererRegistry {
    let mut reg = RendererRegistry::new();
    let renderers: [Arc<dyn Renderer>; 3] = [
        Arc::new(DetectionRenderer::new(style.clone())),
        Arc::new(TextRenderer::new(style.clone())),
        Arc::new(CrossRenderer::new(style.clone())),
    ];
    for r in renderers {
        let kind = r.kind().to_owned();
        if let Err(e) = reg.register(kind, r) {
            tracing::error!(error = %e, "built-in renderer rejected");
        }
    }
    reg
}

#[cfg(test)]
#[path = "../../tests/unit/render/builtin.rs"]
mod tests;
