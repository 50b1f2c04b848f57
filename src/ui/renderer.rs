//! Annotation rendering
//!
//! Draws one annotation box (drop shadow, rounded fill + stroke and an
//! optional caption plate) into a transparent tiny-skia pixmap. Layout is
//! computed separately from drawing so placement can be tested without
//! rasterising anything.

use std::cell::Cell;
use std::path::PathBuf;

use ab_glyph::{Font, FontVec, GlyphId, OutlineCurve, PxScale, ScaleFont};
use tiny_skia::{Color, FillRule, Paint, Path, PathBuilder, Pixmap, Stroke, Transform};

use crate::domain::core::Rect;
use crate::domain::display::Display;
use crate::ui::style::{AnnotationStyle, Rgba};

/// Rendering errors
#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("Failed to create pixmap for rendering")]
    PixmapCreationFailed,

    #[error("Annotation {rect:?} lies outside display {display}")]
    OutsideDisplay { rect: Rect, display: usize },

    #[error("Invalid annotation dimensions: {width}x{height}")]
    InvalidDimensions { width: i32, height: i32 },
}

const SHADOW_OFFSET: f32 = 3.0;
const SHADOW_SPREAD: f32 = 6.0;
const SHADOW_LAYERS: u32 = 4;
const CAPTION_GAP: f32 = 6.0;
const CAPTION_PADDING: f32 = 5.0;
const MAX_CAPTION_CHARS: usize = 80;

/// A rectangle in surface-local float coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl LocalRect {
    fn translated(&self, dx: f32, dy: f32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    fn inflated(&self, by: f32) -> Self {
        Self {
            x: self.x - by,
            y: self.y - by,
            w: self.w + by * 2.0,
            h: self.h + by * 2.0,
        }
    }
}

/// Measured caption text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptionMetrics {
    pub width: f32,
    pub height: f32,
    pub ascent: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaptionLayout {
    pub text: String,
    pub plate: LocalRect,
    pub text_x: f32,
    pub baseline: f32,
    pub px: f32,
}

/// Pre-calculated geometry for one annotation surface
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationLayout {
    /// Native surface frame in global coordinates, clipped to the display
    pub frame: Rect,
    /// The annotation box relative to `frame`
    pub box_rect: LocalRect,
    pub shadow_offset: f32,
    pub shadow_spread: f32,
    pub line_width: f32,
    pub corner_radius: f32,
    pub caption: Option<CaptionLayout>,
}

impl AnnotationLayout {
    /// Lays out `rect` on `display`
    ///
    /// `caption` carries the measured caption; `None` means no caption band.
    pub fn compute(
        rect: Rect,
        display: &Display,
        style: &AnnotationStyle,
        caption: Option<(&str, CaptionMetrics, f32)>,
    ) -> Result<Self, RendererError> {
        if rect.w <= 0 || rect.h <= 0 {
            return Err(RendererError::InvalidDimensions {
                width: rect.w,
                height: rect.h,
            });
        }

        let scale = display.scale.max(0.5);
        let line_width = style.line_width * scale;
        let shadow_offset = SHADOW_OFFSET * scale;
        let shadow_spread = SHADOW_SPREAD * scale;
        let margin = (shadow_offset + shadow_spread + line_width / 2.0).ceil() as i32;

        let mut unclipped = rect.inflate(margin);

        let caption_band = caption.map(|(text, metrics, px)| {
            let padding = CAPTION_PADDING * scale;
            let band = Rect::new(
                rect.x,
                rect.bottom().saturating_add((CAPTION_GAP * scale).round() as i32),
                (metrics.width + padding * 2.0).ceil() as i32,
                (metrics.height + padding * 2.0).ceil() as i32,
            );
            (text, metrics, px, padding, band)
        });
        if let Some((_, _, _, _, band)) = &caption_band {
            unclipped = unclipped.union(band);
        }

        let frame = unclipped
            .intersection(&display.frame)
            .ok_or(RendererError::OutsideDisplay {
                rect,
                display: display.id,
            })?;

        let to_local = |r: Rect| LocalRect {
            x: (r.x as i64 - frame.x as i64) as f32,
            y: (r.y as i64 - frame.y as i64) as f32,
            w: r.w as f32,
            h: r.h as f32,
        };

        let caption = caption_band.map(|(text, metrics, px, padding, band)| {
            let plate = to_local(band);
            CaptionLayout {
                text: text.to_string(),
                plate,
                text_x: plate.x + padding,
                baseline: plate.y + padding + metrics.ascent,
                px,
            }
        });

        Ok(Self {
            frame,
            box_rect: to_local(rect),
            shadow_offset,
            shadow_spread,
            line_width,
            corner_radius: style.corner_radius * scale,
            caption,
        })
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        (self.frame.w.max(0) as u32, self.frame.h.max(0) as u32)
    }
}

/// tiny-skia annotation renderer with optional outline-font captions
pub struct AnnotationRenderer {
    font: Option<FontVec>,
    caption_px: f32,
    missing_font_warned: Cell<bool>,
}

impl AnnotationRenderer {
    /// Loads the first readable font among `font_paths`
    pub fn new(font_paths: &[PathBuf], caption_px: f32) -> Self {
        let font = font_paths.iter().find_map(|path| {
            let bytes = std::fs::read(path)
                .map_err(|e| tracing::debug!(path = %path.display(), error = %e, "caption font unreadable"))
                .ok()?;
            FontVec::try_from_vec(bytes)
                .map_err(|e| tracing::debug!(path = %path.display(), error = %e, "caption font invalid"))
                .ok()
                .inspect(|_| tracing::info!(path = %path.display(), "loaded caption font"))
        });
        Self {
            font,
            caption_px,
            missing_font_warned: Cell::new(false),
        }
    }

    #[cfg(test)]
    fn without_font(caption_px: f32) -> Self {
        Self::new(&[], caption_px)
    }

    /// Measures caption text at `px` pixels
    pub fn measure(&self, text: &str, px: f32) -> CaptionMetrics {
        match &self.font {
            Some(font) => {
                let scaled = font.as_scaled(PxScale::from(px));
                let mut width = 0.0;
                let mut previous: Option<GlyphId> = None;
                for ch in text.chars() {
                    let id = font.glyph_id(ch);
                    if let Some(prev) = previous {
                        width += scaled.kern(prev, id);
                    }
                    width += scaled.h_advance(id);
                    previous = Some(id);
                }
                CaptionMetrics {
                    width,
                    height: scaled.height(),
                    ascent: scaled.ascent(),
                }
            }
            None => CaptionMetrics {
                width: text.chars().count() as f32 * px * 0.55,
                height: px * 1.2,
                ascent: px * 0.9,
            },
        }
    }

    /// Lays out `rect` with `style` on `display`, measuring the caption if any
    pub fn layout(
        &self,
        rect: Rect,
        display: &Display,
        style: &AnnotationStyle,
    ) -> Result<AnnotationLayout, RendererError> {
        let px = self.caption_px * display.scale.max(0.5);
        let text: Option<String> = style
            .caption
            .as_deref()
            .map(|c| c.chars().take(MAX_CAPTION_CHARS).collect());
        let caption = text
            .as_deref()
            .map(|t| (t, self.measure(t, px), px));
        AnnotationLayout::compute(rect, display, style, caption)
    }

    /// Render a layout to a transparent pixmap
    pub fn render(&self, layout: &AnnotationLayout, style: &AnnotationStyle) -> Result<Pixmap, RendererError> {
        let (width, height) = layout.canvas_size();
        let mut pixmap = Pixmap::new(width, height).ok_or(RendererError::PixmapCreationFailed)?;
        pixmap.fill(Color::TRANSPARENT);

        self.render_shadow(&mut pixmap, layout, style.shadow);

        if let Some(path) = rounded_rect(layout.box_rect, layout.corner_radius) {
            pixmap.fill_path(&path, &paint(style.fill), FillRule::Winding, Transform::identity(), None);
            let stroke = Stroke {
                width: layout.line_width,
                ..Stroke::default()
            };
            pixmap.stroke_path(&path, &paint(style.stroke), &stroke, Transform::identity(), None);
        }

        if let Some(caption) = &layout.caption {
            if let Some(path) = rounded_rect(caption.plate, caption.plate.h / 4.0) {
                pixmap.fill_path(
                    &path,
                    &paint(style.caption_plate),
                    FillRule::Winding,
                    Transform::identity(),
                    None,
                );
            }
            self.render_text(&mut pixmap, caption, style.caption_text);
        }

        Ok(pixmap)
    }

    /// Stacked translucent layers approximating a blurred shadow
    fn render_shadow(&self, pixmap: &mut Pixmap, layout: &AnnotationLayout, color: Rgba) {
        let base = layout
            .box_rect
            .translated(layout.shadow_offset, layout.shadow_offset);
        let layer_color = color.faded(1.0 / SHADOW_LAYERS as f32);
        for layer in 0..SHADOW_LAYERS {
            let spread = layout.shadow_spread * layer as f32 / SHADOW_LAYERS as f32;
            if let Some(path) = rounded_rect(base.inflated(spread), layout.corner_radius + spread) {
                pixmap.fill_path(&path, &paint(layer_color), FillRule::Winding, Transform::identity(), None);
            }
        }
    }

    fn render_text(&self, pixmap: &mut Pixmap, caption: &CaptionLayout, color: Rgba) {
        let Some(font) = &self.font else {
            if !self.missing_font_warned.replace(true) {
                tracing::warn!("no caption font available, captions are drawn without text");
            }
            return;
        };

        let scaled = font.as_scaled(PxScale::from(caption.px));
        let (sx, sy) = (scaled.h_scale_factor(), scaled.v_scale_factor());
        let mut builder = PathBuilder::new();
        let mut pen_x = caption.text_x;
        let mut previous: Option<GlyphId> = None;

        for ch in caption.text.chars() {
            let id = font.glyph_id(ch);
            if let Some(prev) = previous {
                pen_x += scaled.kern(prev, id);
            }
            if let Some(outline) = font.outline(id) {
                let map = |p: ab_glyph::Point| (pen_x + p.x * sx, caption.baseline - p.y * sy);
                let mut cursor: Option<(f32, f32)> = None;
                for curve in &outline.curves {
                    let (start, end) = match curve {
                        OutlineCurve::Line(a, b) => (map(*a), map(*b)),
                        OutlineCurve::Quad(a, _, c) => (map(*a), map(*c)),
                        OutlineCurve::Cubic(a, _, _, d) => (map(*a), map(*d)),
                    };
                    if cursor.is_none_or(|c| !same_point(c, start)) {
                        builder.move_to(start.0, start.1);
                    }
                    match curve {
                        OutlineCurve::Line(..) => builder.line_to(end.0, end.1),
                        OutlineCurve::Quad(_, b, _) => {
                            let ctrl = map(*b);
                            builder.quad_to(ctrl.0, ctrl.1, end.0, end.1);
                        }
                        OutlineCurve::Cubic(_, b, c, _) => {
                            let (c1, c2) = (map(*b), map(*c));
                            builder.cubic_to(c1.0, c1.1, c2.0, c2.1, end.0, end.1);
                        }
                    }
                    cursor = Some(end);
                }
            }
            pen_x += scaled.h_advance(id);
            previous = Some(id);
        }

        if let Some(path) = builder.finish() {
            pixmap.fill_path(&path, &paint(color), FillRule::Winding, Transform::identity(), None);
        }
    }
}

fn same_point(a: (f32, f32), b: (f32, f32)) -> bool {
    (a.0 - b.0).abs() < 0.01 && (a.1 - b.1).abs() < 0.01
}

fn paint(color: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(color.to_color());
    paint.anti_alias = true;
    paint
}

/// Rounded rectangle path with quadratic corners
fn rounded_rect(rect: LocalRect, radius: f32) -> Option<Path> {
    if rect.w <= 0.0 || rect.h <= 0.0 {
        return None;
    }
    let r = radius.min(rect.w / 2.0).min(rect.h / 2.0).max(0.0);
    let (x, y, right, bottom) = (rect.x, rect.y, rect.x + rect.w, rect.y + rect.h);

    let mut pb = PathBuilder::new();
    pb.move_to(x + r, y);
    pb.line_to(right - r, y);
    pb.quad_to(right, y, right, y + r);
    pb.line_to(right, bottom - r);
    pb.quad_to(right, bottom, right - r, bottom);
    pb.line_to(x + r, bottom);
    pb.quad_to(x, bottom, x, bottom - r);
    pb.line_to(x, y + r);
    pb.quad_to(x, y, x + r, y);
    pb.close();
    pb.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn display() -> Display {
        Display::new(0, Rect::new(0, 0, 1920, 1080), true)
    }

    #[test]
    fn layout_inflates_by_shadow_margin() {
        let style = AnnotationStyle::temporary();
        let layout = AnnotationLayout::compute(Rect::new(500, 400, 200, 100), &display(), &style, None).unwrap();

        assert!(layout.frame.x < 500 && layout.frame.y < 400);
        assert!(layout.frame.right() > 700 && layout.frame.bottom() > 500);
        assert_eq!(layout.box_rect.x, (500 - layout.frame.x) as f32);
        assert_eq!(layout.box_rect.w, 200.0);
        assert!(layout.caption.is_none());
    }

    #[test]
    fn caption_extends_frame_below_box() {
        let renderer = AnnotationRenderer::without_font(14.0);
        let style = AnnotationStyle::temporary().with_caption(Some("Click here".into()));
        let plain = renderer
            .layout(Rect::new(500, 400, 200, 100), &display(), &AnnotationStyle::temporary())
            .unwrap();
        let captioned = renderer.layout(Rect::new(500, 400, 200, 100), &display(), &style).unwrap();

        assert!(captioned.frame.bottom() > plain.frame.bottom());
        let caption = captioned.caption.unwrap();
        assert!(caption.plate.y > captioned.box_rect.y + captioned.box_rect.h);
        assert!(caption.baseline > caption.plate.y);
        assert!(caption.baseline < caption.plate.y + caption.plate.h);
    }

    #[test]
    fn frame_is_clipped_to_display() {
        let style = AnnotationStyle::temporary();
        let layout = AnnotationLayout::compute(Rect::new(1850, 1000, 200, 200), &display(), &style, None).unwrap();
        assert_eq!(layout.frame.right(), 1920);
        assert_eq!(layout.frame.bottom(), 1080);
    }

    #[test]
    fn layout_outside_display_fails() {
        let style = AnnotationStyle::temporary();
        let result = AnnotationLayout::compute(Rect::new(5000, 5000, 10, 10), &display(), &style, None);
        assert!(matches!(result, Err(RendererError::OutsideDisplay { .. })));
    }

    #[test]
    fn empty_rect_is_rejected() {
        let style = AnnotationStyle::temporary();
        let result = AnnotationLayout::compute(Rect::new(0, 0, 0, 10), &display(), &style, None);
        assert!(matches!(result, Err(RendererError::InvalidDimensions { .. })));
    }

    #[test]
    fn dpi_scaling_widens_stroke() {
        let style = AnnotationStyle::temporary();
        let mut hidpi = display();
        hidpi.scale = 2.0;
        let normal = AnnotationLayout::compute(Rect::new(100, 100, 50, 50), &display(), &style, None).unwrap();
        let scaled = AnnotationLayout::compute(Rect::new(100, 100, 50, 50), &hidpi, &style, None).unwrap();
        assert!(scaled.line_width > normal.line_width);
        assert!(scaled.frame.w > normal.frame.w);
    }

    #[test]
    fn render_draws_stroke_and_leaves_margin_clear() {
        let renderer = AnnotationRenderer::without_font(14.0);
        let style = AnnotationStyle::temporary();
        let layout = renderer.layout(Rect::new(100, 100, 200, 120), &display(), &style).unwrap();
        let pixmap = renderer.render(&layout, &style).unwrap();

        assert_eq!((pixmap.width(), pixmap.height()), layout.canvas_size());
        let edge = pixmap
            .pixel(layout.box_rect.x as u32, (layout.box_rect.y + layout.box_rect.h / 2.0) as u32)
            .unwrap();
        assert!(edge.alpha() > 200);
        assert_eq!(pixmap.pixel(0, 0).unwrap().alpha(), 0);
    }

    #[test]
    fn caption_without_font_still_draws_plate() {
        let renderer = AnnotationRenderer::new(&[PathBuf::from("/nonexistent/font.ttf")], 14.0);
        assert!(renderer.font.is_none());
        let style = AnnotationStyle::persistent().with_caption(Some("Submit".into()));
        let layout = renderer.layout(Rect::new(100, 100, 200, 120), &display(), &style).unwrap();
        let pixmap = renderer.render(&layout, &style).unwrap();

        let plate = layout.caption.as_ref().unwrap().plate;
        let center = pixmap
            .pixel((plate.x + plate.w / 2.0) as u32, (plate.y + plate.h / 2.0) as u32)
            .unwrap();
        assert!(center.alpha() > 200);
    }

    #[test]
    fn long_captions_are_truncated() {
        let renderer = AnnotationRenderer::without_font(14.0);
        let style = AnnotationStyle::temporary().with_caption(Some("x".repeat(500)));
        let layout = renderer.layout(Rect::new(100, 100, 200, 120), &display(), &style).unwrap();
        assert_eq!(layout.caption.unwrap().text.chars().count(), MAX_CAPTION_CHARS);
    }
}
