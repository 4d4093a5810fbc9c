//! Integer geometry shared by frames, cursors and screens.

use serde::{Deserialize, Serialize};

/// A position in virtual-desktop coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Number of pixels covered.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    /// Rectangle anchored at the origin.
    pub const fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn right(&self) -> i32 {
        self.x + self.width as i32
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height as i32
    }

    pub fn is_empty(&self) -> bool {
        self.size().is_empty()
    }

    /// Smallest rectangle containing both `self` and `other`.
    ///
    /// Empty rectangles do not contribute.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(x, y, (right - x) as u32, (bottom - y) as u32)
    }

    /// Translate so that `origin` becomes (0, 0).
    pub fn relative_to(&self, origin: Point) -> Rect {
        Rect::new(self.x - origin.x, self.y - origin.y, self.width, self.height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_spans_side_by_side_screens() {
        let main = Rect::new(0, 0, 1920, 1080);
        let secondary = Rect::new(1920, -120, 1280, 1024);
        let all = main.union(&secondary);
        assert_eq!(all, Rect::new(0, -120, 3200, 1200));
    }

    #[test]
    fn union_ignores_empty() {
        let r = Rect::new(10, 10, 5, 5);
        assert_eq!(Rect::default().union(&r), r);
        assert_eq!(r.union(&Rect::default()), r);
    }

    #[test]
    fn relative_translation() {
        let r = Rect::new(1920, -120, 10, 10).relative_to(Point::new(0, -120));
        assert_eq!(r.top_left(), Point::new(1920, 0));
    }
}
