//! Annotation styles
//!
//! Two presets exist: a red style for temporary act boxes and a blue one for
//! persistent observe boxes. Both can be overridden from the config file.

use serde::{Deserialize, Serialize};
use tiny_skia::Color;

/// 8-bit straight-alpha color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_color(self) -> Color {
        Color::from_rgba8(self.r, self.g, self.b, self.a)
    }

    /// Same color with alpha multiplied by `factor`
    pub fn faded(self, factor: f32) -> Self {
        let a = (self.a as f32 * factor.clamp(0.0, 1.0)).round() as u8;
        Self { a, ..self }
    }
}

/// Visual style of one annotation box
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationStyle {
    pub stroke: Rgba,
    pub fill: Rgba,
    pub line_width: f32,
    pub corner_radius: f32,
    pub shadow: Rgba,
    pub caption_plate: Rgba,
    pub caption_text: Rgba,
    /// Per-draw caption text
    pub caption: Option<String>,
}

/// Config-file overrides for one preset; unset fields keep the preset value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StyleOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke: Option<Rgba>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<Rgba>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line_width: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corner_radius: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shadow: Option<Rgba>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption_plate: Option<Rgba>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption_text: Option<Rgba>,
}

impl StyleOverrides {
    pub fn apply(&self, base: AnnotationStyle) -> AnnotationStyle {
        AnnotationStyle {
            stroke: self.stroke.unwrap_or(base.stroke),
            fill: self.fill.unwrap_or(base.fill),
            line_width: self.line_width.unwrap_or(base.line_width),
            corner_radius: self.corner_radius.unwrap_or(base.corner_radius),
            shadow: self.shadow.unwrap_or(base.shadow),
            caption_plate: self.caption_plate.unwrap_or(base.caption_plate),
            caption_text: self.caption_text.unwrap_or(base.caption_text),
            caption: base.caption,
        }
        .sanitized()
    }
}

pub const MIN_LINE_WIDTH: f32 = 1.0;
pub const MAX_LINE_WIDTH: f32 = 16.0;
pub const MAX_CORNER_RADIUS: f32 = 48.0;

impl AnnotationStyle {
    /// Red box used by `act`
    pub fn temporary() -> Self {
        Self {
            stroke: Rgba::new(255, 59, 48, 255),
            fill: Rgba::new(255, 59, 48, 46),
            line_width: 4.0,
            corner_radius: 8.0,
            shadow: Rgba::new(0, 0, 0, 90),
            caption_plate: Rgba::new(255, 59, 48, 230),
            caption_text: Rgba::new(255, 255, 255, 255),
            caption: None,
        }
    }

    /// Blue box used by `observe`
    pub fn persistent() -> Self {
        Self {
            stroke: Rgba::new(10, 132, 255, 255),
            fill: Rgba::new(10, 132, 255, 38),
            line_width: 3.0,
            corner_radius: 8.0,
            shadow: Rgba::new(0, 0, 0, 70),
            caption_plate: Rgba::new(10, 132, 255, 230),
            caption_text: Rgba::new(255, 255, 255, 255),
            caption: None,
        }
    }

    pub fn with_caption(mut self, caption: Option<String>) -> Self {
        self.caption = caption.filter(|c| !c.trim().is_empty());
        self
    }

    /// Clamps numeric fields into drawable ranges
    pub fn sanitized(mut self) -> Self {
        self.line_width = if self.line_width.is_finite() {
            self.line_width.clamp(MIN_LINE_WIDTH, MAX_LINE_WIDTH)
        } else {
            MIN_LINE_WIDTH
        };
        self.corner_radius = if self.corner_radius.is_finite() {
            self.corner_radius.clamp(0.0, MAX_CORNER_RADIUS)
        } else {
            0.0
        };
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_differ() {
        assert_ne!(AnnotationStyle::temporary(), AnnotationStyle::persistent());
        assert!(AnnotationStyle::temporary().stroke.r > AnnotationStyle::temporary().stroke.b);
        assert!(AnnotationStyle::persistent().stroke.b > AnnotationStyle::persistent().stroke.r);
    }

    #[test]
    fn blank_caption_is_dropped() {
        let style = AnnotationStyle::temporary().with_caption(Some("   ".into()));
        assert!(style.caption.is_none());
        let style = AnnotationStyle::temporary().with_caption(Some("Save".into()));
        assert_eq!(style.caption.as_deref(), Some("Save"));
    }

    #[test]
    fn sanitize_clamps_widths() {
        let style = AnnotationStyle {
            line_width: 100.0,
            corner_radius: f32::NAN,
            ..AnnotationStyle::persistent()
        }
        .sanitized();
        assert_eq!(style.line_width, MAX_LINE_WIDTH);
        assert_eq!(style.corner_radius, 0.0);
    }

    #[test]
    fn fading_scales_alpha() {
        assert_eq!(Rgba::new(0, 0, 0, 200).faded(0.5).a, 100);
        assert_eq!(Rgba::new(0, 0, 0, 200).faded(2.0).a, 200);
    }

    #[test]
    fn overrides_keep_unset_preset_fields() {
        let overrides: StyleOverrides =
            serde_json::from_str(r#"{"line_width": 6.0, "stroke": {"r": 0, "g": 255, "b": 0, "a": 255}}"#)
                .unwrap();
        let style = overrides.apply(AnnotationStyle::persistent());
        assert_eq!(style.line_width, 6.0);
        assert_eq!(style.stroke, Rgba::new(0, 255, 0, 255));
        assert_eq!(style.fill, AnnotationStyle::persistent().fill);
    }

    #[test]
    fn overrides_are_sanitized() {
        let overrides = StyleOverrides {
            line_width: Some(0.0),
            ..StyleOverrides::default()
        };
        assert_eq!(overrides.apply(AnnotationStyle::temporary()).line_width, MIN_LINE_WIDTH);
    }
}
