//! Core geometry types
//!
//! Everything here lives in the global coordinate space: a single pixel
//! space spanning all displays, with a top-left origin. Secondary displays
//! may sit at negative coordinates.

use serde::{Deserialize, Serialize};

/// A point in global coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A width/height pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub w: i32,
    pub h: i32,
}

impl Size {
    pub fn new(w: i32, h: i32) -> Self {
        Self { w, h }
    }

    /// Both dimensions strictly positive
    pub fn is_positive(&self) -> bool {
        self.w > 0 && self.h > 0
    }
}

/// Rectangle in global pixel coordinates
///
/// This is the fundamental building block for all geometric calculations:
/// display frames, window frames, monitored regions and overlay placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    /// Creates a new rectangle
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Creates a rectangle from an origin and a size
    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self::new(origin.x, origin.y, size.w, size.h)
    }

    /// Returns the right edge coordinate, saturating at `i32::MAX`
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.w)
    }

    /// Returns the bottom edge coordinate, saturating at `i32::MAX`
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.h)
    }

    /// True when the far edges are representable without saturating
    pub fn has_representable_edges(&self) -> bool {
        self.x.checked_add(self.w).is_some() && self.y.checked_add(self.h).is_some()
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.w, self.h)
    }

    /// Center point, rounded towards the origin
    pub fn center(&self) -> Point {
        Point::new(self.x.saturating_add(self.w / 2), self.y.saturating_add(self.h / 2))
    }

    /// Returns true if this rectangle contains the given point
    ///
    /// Half-open: the minimum edges are inside, the maximum edges are not.
    pub fn contains_point(&self, px: i32, py: i32) -> bool {
        px >= self.x && px < self.right() && py >= self.y && py < self.bottom()
    }

    /// Returns the intersection of two rectangles, or None if they don't intersect
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());

        if left < right && top < bottom {
            Some(Rect::new(left, top, right.saturating_sub(left), bottom.saturating_sub(top)))
        } else {
            None
        }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.intersection(other).is_some()
    }

    /// Returns the bounding box that contains both rectangles
    pub fn union(&self, other: &Rect) -> Rect {
        let left = self.x.min(other.x);
        let top = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());

        Rect::new(left, top, right.saturating_sub(left), bottom.saturating_sub(top))
    }

    /// Returns the area of the rectangle in square pixels
    ///
    /// Widened to i64 so that large virtual desktops cannot overflow.
    pub fn area(&self) -> i64 {
        if self.w <= 0 || self.h <= 0 {
            return 0;
        }
        self.w as i64 * self.h as i64
    }

    /// A rectangle of `size` whose center coincides with this rectangle's center
    pub fn centered_on(&self, size: Size) -> Rect {
        let center = self.center();
        Rect::new(
            center.x.saturating_sub(size.w / 2),
            center.y.saturating_sub(size.h / 2),
            size.w,
            size.h,
        )
    }

    /// Translates a rectangle expressed relative to this rectangle's origin
    pub fn offset_by(&self, relative: Rect) -> Rect {
        Rect::new(
            self.x.saturating_add(relative.x),
            self.y.saturating_add(relative.y),
            relative.w,
            relative.h,
        )
    }

    /// Grows the rectangle by `margin` on every side
    pub fn inflate(&self, margin: i32) -> Rect {
        Rect::new(
            self.x.saturating_sub(margin),
            self.y.saturating_sub(margin),
            self.w.saturating_add(margin.saturating_mul(2)),
            self.h.saturating_add(margin.saturating_mul(2)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_basic_properties() {
        let rect = Rect::new(10, 20, 100, 50);
        assert_eq!(rect.right(), 110);
        assert_eq!(rect.bottom(), 70);
        assert_eq!(rect.area(), 5000);
        assert_eq!(rect.center(), Point::new(60, 45));
    }

    #[test]
    fn rect_contains_point_is_half_open() {
        let rect = Rect::new(10, 10, 20, 20);
        assert!(rect.contains_point(15, 15)); // Inside
        assert!(rect.contains_point(10, 10)); // Minimum corner
        assert!(!rect.contains_point(30, 15)); // Right edge
        assert!(!rect.contains_point(15, 30)); // Bottom edge
        assert!(!rect.contains_point(5, 5));
    }

    #[test]
    fn rect_intersection() {
        let rect1 = Rect::new(0, 0, 20, 20);
        let rect2 = Rect::new(10, 10, 20, 20);
        assert_eq!(rect1.intersection(&rect2), Some(Rect::new(10, 10, 10, 10)));

        // Touching edges do not intersect
        let rect3 = Rect::new(20, 0, 10, 10);
        assert!(rect1.intersection(&rect3).is_none());
    }

    #[test]
    fn rect_union() {
        let rect1 = Rect::new(0, 0, 10, 10);
        let rect2 = Rect::new(20, 20, 10, 10);
        assert_eq!(rect1.union(&rect2), Rect::new(0, 0, 30, 30));
    }

    #[test]
    fn area_handles_large_and_degenerate_rects() {
        assert_eq!(Rect::new(0, 0, 100_000, 100_000).area(), 10_000_000_000);
        assert_eq!(Rect::new(0, 0, -5, 10).area(), 0);
    }

    #[test]
    fn centered_on_window() {
        let window = Rect::new(100, 100, 800, 600);
        let boxed = window.centered_on(Size::new(200, 100));
        assert_eq!(boxed, Rect::new(400, 350, 200, 100));
        assert_eq!(boxed.center(), window.center());
    }

    #[test]
    fn offset_and_inflate() {
        let window = Rect::new(-1920, 40, 1000, 700);
        assert_eq!(
            window.offset_by(Rect::new(10, 20, 30, 40)),
            Rect::new(-1910, 60, 30, 40)
        );
        assert_eq!(Rect::new(10, 10, 5, 5).inflate(2), Rect::new(8, 8, 9, 9));
    }

    #[test]
    fn edges_saturate_near_i32_max() {
        let rect = Rect::new(i32::MAX - 10, i32::MAX - 10, 1000, 1000);
        assert_eq!(rect.right(), i32::MAX);
        assert_eq!(rect.bottom(), i32::MAX);
        assert!(!rect.has_representable_edges());
        assert!(rect.contains_point(i32::MAX - 5, i32::MAX - 5));

        let display = Rect::new(0, 0, 1920, 1080);
        assert!(rect.intersection(&display).is_none());
        let wide = Rect::new(i32::MIN, 0, i32::MAX, 10).union(&rect);
        assert_eq!(wide.x, i32::MIN);
        assert_eq!(wide.w, i32::MAX);
        assert!(Rect::new(0, 0, 10, 10).has_representable_edges());
    }
}
