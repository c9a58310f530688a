//! Coordinates, sizes and rectangles shared by the raster modules.

use serde::{Deserialize, Serialize};

/// A pixel position in layer space.  Signed so tools can hand over positions
/// that fall off the canvas; those are treated as out of bounds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Width/height of a layer buffer in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Number of bytes an RGBA8 buffer of this size occupies.
    pub fn byte_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Address of a tile in the grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileIndex {
    pub row: u32,
    pub column: u32,
}

impl TileIndex {
    pub const fn new(row: u32, column: u32) -> Self {
        Self { row, column }
    }
}

/// Axis-aligned pixel rectangle, `min` inclusive and `max` exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl PixelRect {
    pub fn from_size(size: Size) -> Self {
        Self { min_x: 0, min_y: 0, max_x: size.width, max_y: size.height }
    }

    /// Rectangle covering exactly one pixel.
    pub fn from_pixel(x: u32, y: u32) -> Self {
        Self { min_x: x, min_y: y, max_x: x + 1, max_y: y + 1 }
    }

    pub fn width(&self) -> u32 {
        self.max_x.saturating_sub(self.min_x)
    }

    pub fn height(&self) -> u32 {
        self.max_y.saturating_sub(self.min_y)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Bytes needed to hold this rectangle as RGBA8.
    pub fn byte_len(&self) -> usize {
        (self.width() as usize).saturating_mul(self.height() as usize).saturating_mul(4)
    }

    /// Grow to cover the pixel at `(x, y)`.
    pub fn include(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x + 1);
        self.max_y = self.max_y.max(y + 1);
    }

    /// Grow to cover `other`.
    pub fn union(&mut self, other: &PixelRect) {
        if other.is_empty() {
            return;
        }
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    /// Clip to `0..width × 0..height`.
    pub fn clamp_to(&self, size: Size) -> PixelRect {
        let max_x = self.max_x.min(size.width);
        let max_y = self.max_y.min(size.height);
        PixelRect {
            min_x: self.min_x.min(max_x),
            min_y: self.min_y.min(max_y),
            max_x,
            max_y,
        }
    }

    pub fn covers(&self, size: Size) -> bool {
        self.min_x == 0 && self.min_y == 0 && self.max_x >= size.width && self.max_y >= size.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_grows_bounding_box() {
        let mut rect = PixelRect::from_pixel(5, 5);
        rect.include(2, 9);
        rect.include(7, 3);
        assert_eq!(rect, PixelRect { min_x: 2, min_y: 3, max_x: 8, max_y: 10 });
        assert_eq!(rect.width(), 6);
        assert_eq!(rect.height(), 7);
    }

    #[test]
    fn clamp_to_trims_past_the_edge() {
        let rect = PixelRect { min_x: 2, min_y: 2, max_x: 20, max_y: 20 };
        let clipped = rect.clamp_to(Size::new(10, 4));
        assert_eq!(clipped, PixelRect { min_x: 2, min_y: 2, max_x: 10, max_y: 4 });

        let outside = PixelRect { min_x: 12, min_y: 0, max_x: 14, max_y: 2 }.clamp_to(Size::new(10, 4));
        assert!(outside.is_empty());
    }
}
