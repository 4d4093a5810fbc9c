//! Remote mouse cursor shape.

use crate::desktop::geometry::{Point, Size};

/// A cursor image in BGRA8 with its hot spot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MouseCursor {
    size: Size,
    hotspot: Point,
    image: Vec<u8>,
}

impl MouseCursor {
    /// Returns `None` when `image` does not hold exactly `size` BGRA pixels.
    pub fn new(size: Size, hotspot: Point, image: Vec<u8>) -> Option<Self> {
        if image.len() as u64 != size.area() * 4 {
            return None;
        }
        Some(Self { size, hotspot, image })
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn hotspot(&self) -> Point {
        self.hotspot
    }

    pub fn image(&self) -> &[u8] {
        &self.image
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_must_match_size() {
        assert!(MouseCursor::new(Size::new(2, 2), Point::default(), vec![0; 16]).is_some());
        assert!(MouseCursor::new(Size::new(2, 2), Point::default(), vec![0; 15]).is_none());
    }
}
