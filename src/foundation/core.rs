use crate::foundation::error::{OverlayError, OverlayResult};

pub use kurbo::{Point, Rect, Size};

/// Inclusive playback time range in milliseconds.
///
/// Both bounds are inclusive: an annotation spanning `[1000, 5000]` is visible at exactly
/// `1000.0` and at exactly `5000.0`. Two abutting ranges (`a.end_ms == b.start_ms`) are therefore
/// both visible at the shared instant.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeRange {
    /// Inclusive start, in ms.
    pub start_ms: f64,
    /// Inclusive end, in ms.
    pub end_ms: f64,
}

impl TimeRange {
    /// Create a validated range: finite, non-negative, `start_ms <= end_ms`.
    pub fn new(start_ms: f64, end_ms: f64) -> OverlayResult<Self> {
        let r = Self { start_ms, end_ms };
        if !r.is_well_formed() {
            return Err(OverlayError::malformed(format!(
                "timeRange [{start_ms}, {end_ms}] must be finite, non-negative and ordered"
            )));
        }
        Ok(r)
    }

    /// Return `true` when the bounds are finite, non-negative and ordered.
    pub fn is_well_formed(self) -> bool {
        self.start_ms.is_finite()
            && self.end_ms.is_finite()
            && self.start_ms >= 0.0
            && self.start_ms <= self.end_ms
    }

    /// Return `true` when `t_ms` is inside `[start_ms, end_ms]`.
    pub fn contains(self, t_ms: f64) -> bool {
        self.start_ms <= t_ms && t_ms <= self.end_ms
    }

    /// Span length in ms.
    pub fn duration_ms(self) -> f64 {
        self.end_ms - self.start_ms
    }

    /// Shift both bounds by `delta_ms`, clamping at zero.
    pub fn shift(self, delta_ms: f64) -> Self {
        Self {
            start_ms: (self.start_ms + delta_ms).max(0.0),
            end_ms: (self.end_ms + delta_ms).max(0.0),
        }
    }
}

/// Axis-aligned box in normalized frame coordinates (`[0,1]` on both axes, origin top-left).
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NormBox {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width as a fraction of the frame width.
    pub width: f64,
    /// Height as a fraction of the frame height.
    pub height: f64,
}

impl NormBox {
    /// Return `true` when all components are finite and the size is non-negative.
    pub fn is_finite(self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width >= 0.0
            && self.height >= 0.0
    }

    /// Read a box from `{x, y, width, height}` or `[x, y, width, height]`.
    pub fn from_json(v: &serde_json::Value) -> Option<Self> {
        match v {
            serde_json::Value::Array(a) => match a.as_slice() {
                [x, y, w, h] => Some(Self {
                    x: x.as_f64()?,
                    y: y.as_f64()?,
                    width: w.as_f64()?,
                    height: h.as_f64()?,
                }),
                _ => None,
            },
            serde_json::Value::Object(o) => Some(Self {
                x: o.get("x")?.as_f64()?,
                y: o.get("y")?.as_f64()?,
                width: o.get("width")?.as_f64()?,
                height: o.get("height")?.as_f64()?,
            }),
            _ => None,
        }
    }

    /// Divide by frame dimensions, turning a pixel-space box into a normalized one.
    pub fn normalized_by(self, frame_width: f64, frame_height: f64) -> Self {
        Self {
            x: self.x / frame_width,
            y: self.y / frame_height,
            width: self.width / frame_width,
            height: self.height / frame_height,
        }
    }

    /// Return `true` when the box lies inside the unit square.
    pub fn is_normalized(self) -> bool {
        const EPS: f64 = 1e-9;
        self.is_finite()
            && self.x >= -EPS
            && self.y >= -EPS
            && self.x + self.width <= 1.0 + EPS
            && self.y + self.height <= 1.0 + EPS
    }
}

/// Point in normalized frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NormPoint {
    /// Horizontal position, `0` is the left edge.
    pub x: f64,
    /// Vertical position, `0` is the top edge.
    pub y: f64,
}

/// Pixel dimensions of the drawing surface an overlay renders into.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Viewport {
    /// Width in pixels.
    pub width: f64,
    /// Height in pixels.
    pub height: f64,
}

impl Viewport {
    /// Create a viewport from pixel dimensions.
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Viewport covering `rect`'s size.
    pub fn from_rect(rect: Rect) -> Self {
        Self::new(rect.width(), rect.height())
    }

    /// Return `true` when there is at least one pixel to draw into.
    pub fn is_drawable(self) -> bool {
        self.width >= 1.0 && self.height >= 1.0
    }

    /// Full-surface rectangle anchored at the origin.
    pub fn bounds(self) -> Rect {
        Rect::new(0.0, 0.0, self.width, self.height)
    }

    /// Convert a normalized box to pixel coordinates.
    ///
    /// Components are clamped into the unit square first, so a slightly out-of-range box never
    /// projects outside the surface.
    pub fn project_box(self, b: NormBox) -> Rect {
        let x0 = b.x.clamp(0.0, 1.0);
        let y0 = b.y.clamp(0.0, 1.0);
        let x1 = (b.x + b.width).clamp(0.0, 1.0);
        let y1 = (b.y + b.height).clamp(0.0, 1.0);
        Rect::new(
            x0 * self.width,
            y0 * self.height,
            x1 * self.width,
            y1 * self.height,
        )
    }

    /// Convert a normalized point to pixel coordinates.
    pub fn project_point(self, p: NormPoint) -> Point {
        Point::new(
            p.x.clamp(0.0, 1.0) * self.width,
            p.y.clamp(0.0, 1.0) * self.height,
        )
    }
}

/// Identity of one video element on the page.
///
/// Discovery collaborators assign keys; the manager memoizes overlays by key.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct VideoKey(pub u64);

impl std::fmt::Display for VideoKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "video#{}", self.0)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
