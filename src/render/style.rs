use crate::foundation::color::Rgba8;

/// Visual settings shared by the built-in renderers.
///
/// Deserializes from a partial JSON object; absent fields keep their defaults.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OverlayStyle {
    /// Stroke width for boxes and cross arms, in pixels.
    pub stroke_width: f64,
    /// Default detection box and tag color.
    pub detection_color: Rgba8,
    /// Text color inside detection tags.
    pub label_text_color: Rgba8,
    /// Font size for tags, captions and marker labels.
    pub font_size_px: f32,
    /// Padding around tag text.
    pub label_padding_px: f64,
    /// Caption text color.
    pub text_color: Rgba8,
    /// Backing fill drawn behind captions.
    pub text_backing: Rgba8,
    /// Distance from the top edge to the caption line box.
    pub text_offset_y_px: f64,
    /// Default cross marker color.
    pub cross_color: Rgba8,
    /// Half-length of each cross arm.
    pub cross_size_px: f64,
    /// Outline drawn around the canvas when debug borders are on.
    pub debug_border_color: Rgba8,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            stroke_width: 2.0,
            detection_color: Rgba8::rgb(0, 255, 102),
            label_text_color: Rgba8::rgb(0, 0, 0),
            font_size_px: 14.0,
            label_padding_px: 3.0,
            text_color: Rgba8::rgb(255, 255, 255),
            text_backing: Rgba8::rgba(0, 0, 0, 153),
            text_offset_y_px: 24.0,
            cross_color: Rgba8::rgb(255, 51, 102),
            cross_size_px: 12.0,
            debug_border_color: Rgba8::rgb(255, 0, 255),
        }
    }
}

impl OverlayStyle {
    /// Defaults overridden by `ALERTLENS_STROKE_WIDTH`, `ALERTLENS_FONT_SIZE` and
    /// `ALERTLENS_TEXT_OFFSET_Y` when set to positive numbers.
    pub fn from_env() -> Self {
        fn positive<T: std::str::FromStr + PartialOrd + Default>(key: &str) -> Option<T> {
            std::env::var(key)
                .ok()
                .and_then(|v| v.trim().parse::<T>().ok())
                .filter(|v| *v > T::default())
        }

        let mut out = Self::default();
        if let Some(w) = positive::<f64>("ALERTLENS_STROKE_WIDTH") {
            out.stroke_width = w;
        }
        if let Some(s) = positive::<f32>("ALERTLENS_FONT_SIZE") {
            out.font_size_px = s;
        }
        if let Some(y) = positive::<f64>("ALERTLENS_TEXT_OFFSET_Y") {
            out.text_offset_y_px = y;
        }
        out
    }

    /// Return the style with a different stroke width.
    pub fn with_stroke_width(mut self, width: f64) -> Self {
        self.stroke_width = width;
        self
    }

    /// Return the style with a different font size.
    pub fn with_font_size(mut self, size_px: f32) -> Self {
        self.font_size_px = size_px;
        self
    }
}

#[cfg(test)]
#[path = "../../tests/unit/render/style.rs"]
mod tests;
