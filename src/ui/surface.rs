//! Annotation surface wrapper
//!
//! Owns one native overlay for its whole life. Dropping the wrapper tears the
//! native surface down in a fixed order: remove content, hide, release.

use crate::domain::core::Rect;
use crate::platform::NativeSurface;

/// Surface lifetime class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceKind {
    /// Auto-dismissed; at most one alive
    Temporary,
    /// Keyed by region id; lives until cancelled
    Persistent,
}

pub struct AnnotationSurface {
    kind: SurfaceKind,
    id: Option<String>,
    /// The annotation box, not the (larger) native frame
    rect: Rect,
    native: Option<Box<dyn NativeSurface>>,
}

impl AnnotationSurface {
    pub fn temporary(rect: Rect, native: Box<dyn NativeSurface>) -> Self {
        Self {
            kind: SurfaceKind::Temporary,
            id: None,
            rect,
            native: Some(native),
        }
    }

    pub fn persistent(
        id: impl Into<String>,
        rect: Rect,
        native: Box<dyn NativeSurface>,
    ) -> Self {
        Self {
            kind: SurfaceKind::Persistent,
            id: Some(id.into()),
            rect,
            native: Some(native),
        }
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// Runs the teardown sequence; later calls are no-ops
    pub fn teardown(&mut self) {
        if let Some(mut native) = self.native.take() {
            native.remove_content();
            native.hide();
            native.release();
            tracing::debug!(kind = ?self.kind, id = ?self.id, "annotation surface torn down");
        }
    }
}

impl Drop for AnnotationSurface {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for AnnotationSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationSurface")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .field("rect", &self.rect)
            .field("live", &self.native.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::display::Display;
    use crate::platform::headless::HeadlessPlatform;
    use crate::platform::{SurfaceFactory, SurfaceRequest};

    fn native(headless: &HeadlessPlatform) -> Box<dyn NativeSurface> {
        let display = Display::new(0, Rect::new(0, 0, 800, 600), true);
        let pixmap = tiny_skia::Pixmap::new(4, 4).unwrap();
        headless
            .create_surface(&SurfaceRequest {
                frame: Rect::new(10, 10, 4, 4),
                display: &display,
                pixels: &pixmap,
            })
            .unwrap()
    }

    #[test]
    fn drop_runs_teardown_in_order() {
        let headless = HeadlessPlatform::new();
        {
            let surface = AnnotationSurface::temporary(Rect::new(10, 10, 4, 4), native(&headless));
            assert_eq!(surface.rect(), Rect::new(10, 10, 4, 4));
            assert_eq!(headless.live_surfaces().len(), 1);
        }
        assert!(headless.live_surfaces().is_empty());
        assert_eq!(
            headless.lifecycle(),
            vec!["create:1", "remove_content:1", "hide:1", "release:1"]
        );
    }

    #[test]
    fn explicit_teardown_is_idempotent() {
        let headless = HeadlessPlatform::new();
        let mut surface = AnnotationSurface::persistent("r1", Rect::new(10, 10, 4, 4), native(&headless));
        assert!(format!("{surface:?}").contains("r1"));
        surface.teardown();
        surface.teardown();
        drop(surface);
        assert_eq!(headless.lifecycle().len(), 4);
    }
}
