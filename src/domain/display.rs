//! Display geometry resolution
//!
//! Picks the display an overlay should live on. Pure geometry: the platform
//! layer enumerates displays, this module only decides between them.

use crate::domain::core::{Point, Rect};

/// A connected display in global coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct Display {
    /// Zero-based enumeration index
    pub id: usize,
    /// Full display frame
    pub frame: Rect,
    /// Scale factor (1.0 = 96 DPI)
    pub scale: f32,
    /// Whether the OS reports this as the primary display
    pub is_primary: bool,
}

impl Display {
    pub fn new(id: usize, frame: Rect, is_primary: bool) -> Self {
        Self {
            id,
            frame,
            scale: 1.0,
            is_primary,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("No displays were enumerated")]
    NoDisplays,
}

/// A non-empty snapshot of the display configuration
///
/// Re-enumerated for every operation; never cached across commands.
#[derive(Debug, Clone)]
pub struct DisplayLayout {
    displays: Vec<Display>,
}

impl DisplayLayout {
    pub fn new(displays: Vec<Display>) -> Result<Self, DisplayError> {
        if displays.is_empty() {
            return Err(DisplayError::NoDisplays);
        }
        Ok(Self { displays })
    }

    pub fn displays(&self) -> &[Display] {
        &self.displays
    }

    /// The display flagged primary, else the first enumerated one
    pub fn primary(&self) -> &Display {
        self.displays
            .iter()
            .find(|d| d.is_primary)
            .unwrap_or(&self.displays[0])
    }

    /// Selects the best display for `rect`; never fails
    ///
    /// 1. largest positive intersection area (ties: earliest in enumeration order)
    /// 2. the display containing the rectangle's center
    /// 3. the primary display
    pub fn resolve(&self, rect: &Rect) -> &Display {
        let mut best: Option<(&Display, i64)> = None;
        for display in &self.displays {
            let area = rect
                .intersection(&display.frame)
                .map(|overlap| overlap.area())
                .unwrap_or(0);
            if area <= 0 {
                continue;
            }
            // Strictly greater keeps the first of equal candidates
            if best.map_or(true, |(_, best_area)| area > best_area) {
                best = Some((display, area));
            }
        }
        if let Some((display, _)) = best {
            return display;
        }

        if let Some(display) = self.containing(rect.center()) {
            return display;
        }

        self.primary()
    }

    fn containing(&self, point: Point) -> Option<&Display> {
        self.displays
            .iter()
            .find(|d| d.frame.contains_point(point.x, point.y))
    }
}
