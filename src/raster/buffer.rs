use image::{Rgba, RgbaImage};

use crate::color::TRANSPARENT;
use crate::error::RasterError;
use crate::geometry::{PixelRect, Point, Size};

// ============================================================================
// PIXEL ACCESS: the read/write seam tiles are filled and scanned through
// ============================================================================

/// Pixel-level access to a layer's storage.
///
/// `TileManager` never touches bytes directly; every fill and uniformity scan
/// goes through this trait so the tile index stays independent of how the
/// pixels are stored.
pub trait PixelAccess {
    fn size(&self) -> Size;

    /// Read a pixel; out-of-bounds positions read as transparent black.
    fn get_pixel(&self, pos: Point) -> Rgba<u8>;

    /// Write a pixel; out-of-bounds positions are ignored.
    fn put_pixel(&mut self, x: u32, y: u32, color: Rgba<u8>);

    /// Write `color` to `x0..x1` on row `y`.
    fn fill_span(&mut self, y: u32, x0: u32, x1: u32, color: Rgba<u8>) {
        for x in x0..x1 {
            self.put_pixel(x, y, color);
        }
    }
}

// ============================================================================
// PIXEL BUFFER: one layer's contiguous RGBA8 bytes
// ============================================================================

/// Row-major RGBA8 pixel storage for a single layer, top-left origin.
///
/// Invariant: `data.len() == width * height * 4`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

/// Result of a successful raw write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelWrite {
    pub before: Rgba<u8>,
    pub after: Rgba<u8>,
}

impl PixelBuffer {
    // ---- construction -------------------------------------------------------

    /// Fully transparent buffer.
    pub fn new(size: Size) -> Self {
        Self {
            width: size.width,
            height: size.height,
            data: vec![0; size.byte_len()],
        }
    }

    /// Buffer filled with one color.
    pub fn new_filled(size: Size, color: Rgba<u8>) -> Self {
        let mut buf = Self::new(size);
        for px in buf.data.chunks_exact_mut(4) {
            px.copy_from_slice(&color.0);
        }
        buf
    }

    /// Wrap existing bytes.  `data` must be exactly `width * height * 4` long.
    pub fn from_raw(size: Size, data: Vec<u8>) -> Result<Self, RasterError> {
        let expected = size.byte_len();
        if data.len() != expected {
            return Err(RasterError::SizeMismatch { expected, actual: data.len() });
        }
        Ok(Self { width: size.width, height: size.height, data })
    }

    pub fn from_rgba_image(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            data: image.as_raw().clone(),
        }
    }

    pub fn to_rgba_image(&self) -> RgbaImage {
        RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .unwrap_or_else(|| RgbaImage::new(self.width, self.height))
    }

    // ---- accessors ----------------------------------------------------------

    pub fn width(&self) -> u32 { self.width }

    pub fn height(&self) -> u32 { self.height }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    #[inline]
    pub fn is_in_bounds(&self, pos: Point) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.width && (pos.y as u32) < self.height
    }

    #[inline(always)]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize * self.width as usize + x as usize) * 4
    }

    // ---- pixel access -------------------------------------------------------

    /// Read a pixel (transparent black when out of bounds).
    #[inline]
    pub fn get_pixel(&self, pos: Point) -> Rgba<u8> {
        if !self.is_in_bounds(pos) {
            return TRANSPARENT;
        }
        let i = self.offset(pos.x as u32, pos.y as u32);
        Rgba([self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]])
    }

    /// Write a pixel and report the previous value.  `None` iff out of bounds.
    /// Always writes, even when the color is unchanged.
    #[inline]
    pub fn set_raw_pixel(&mut self, pos: Point, color: Rgba<u8>) -> Option<PixelWrite> {
        if !self.is_in_bounds(pos) {
            return None;
        }
        let i = self.offset(pos.x as u32, pos.y as u32);
        let px = &mut self.data[i..i + 4];
        let before = Rgba([px[0], px[1], px[2], px[3]]);
        px.copy_from_slice(&color.0);
        Some(PixelWrite { before, after: color })
    }

    // ---- bulk operations ----------------------------------------------------

    /// Swap in new bytes of the same dimensions.
    pub fn replace_data(&mut self, data: Vec<u8>) -> Result<(), RasterError> {
        let expected = self.data.len();
        if data.len() != expected {
            return Err(RasterError::SizeMismatch { expected, actual: data.len() });
        }
        self.data = data;
        Ok(())
    }

    /// Reallocate to `new_size`, copying the overlap of the old content.
    ///
    /// `dest_origin` is where the copy lands in the new buffer, `src_origin`
    /// where it is read from in the old one.  Negative origins are normalized
    /// by shifting both by the same amount, so nothing outside either buffer
    /// is read or written.  Uncovered pixels are transparent.
    pub fn change_size(&mut self, new_size: Size, dest_origin: Point, src_origin: Point) {
        let (old_w, old_h) = (self.width as i64, self.height as i64);
        let (new_w, new_h) = (new_size.width as i64, new_size.height as i64);
        let (mut dx, mut dy) = (dest_origin.x as i64, dest_origin.y as i64);
        let (mut sx, mut sy) = (src_origin.x as i64, src_origin.y as i64);

        if dx < 0 {
            sx -= dx;
            dx = 0;
        }
        if dy < 0 {
            sy -= dy;
            dy = 0;
        }
        if sx < 0 {
            dx -= sx;
            sx = 0;
        }
        if sy < 0 {
            dy -= sy;
            sy = 0;
        }

        let copy_w = (old_w - sx).min(new_w - dx).max(0) as usize;
        let copy_h = (old_h - sy).min(new_h - dy).max(0) as usize;

        let mut next = vec![0u8; new_size.byte_len()];
        let row_bytes = copy_w * 4;
        if row_bytes > 0 {
            for y in 0..copy_h {
                let src = (((y as i64 + sy) * old_w + sx) * 4) as usize;
                let dst = (((y as i64 + dy) * new_w + dx) * 4) as usize;
                next[dst..dst + row_bytes].copy_from_slice(&self.data[src..src + row_bytes]);
            }
        }

        self.data = next;
        self.width = new_size.width;
        self.height = new_size.height;
    }

    /// Copy a rectangle out as tightly packed RGBA rows.  Parts of `rect`
    /// outside the buffer read as transparent.
    pub fn extract_region(&self, rect: PixelRect) -> Vec<u8> {
        let mut out = vec![0u8; rect.byte_len()];
        let clipped = rect.clamp_to(self.size());
        if clipped.is_empty() {
            return out;
        }
        let out_stride = rect.width() as usize * 4;
        let run = clipped.width() as usize * 4;
        for y in clipped.min_y..clipped.max_y {
            let src = self.offset(clipped.min_x, y);
            let dst = (y - rect.min_y) as usize * out_stride + (clipped.min_x - rect.min_x) as usize * 4;
            out[dst..dst + run].copy_from_slice(&self.data[src..src + run]);
        }
        out
    }

    /// Write tightly packed RGBA rows back into `rect`.  Rows and columns
    /// falling outside the current buffer are skipped.  Returns how many
    /// pixels were dropped that way.
    pub fn blit_region(&mut self, rect: PixelRect, data: &[u8]) -> usize {
        if data.len() != rect.byte_len() {
            return rect.width() as usize * rect.height() as usize;
        }
        let clipped = rect.clamp_to(self.size());
        let total = rect.width() as usize * rect.height() as usize;
        let kept = clipped.width() as usize * clipped.height() as usize;
        if clipped.is_empty() {
            return total;
        }
        let in_stride = rect.width() as usize * 4;
        let run = clipped.width() as usize * 4;
        for y in clipped.min_y..clipped.max_y {
            let src = (y - rect.min_y) as usize * in_stride + (clipped.min_x - rect.min_x) as usize * 4;
            let dst = self.offset(clipped.min_x, y);
            self.data[dst..dst + run].copy_from_slice(&data[src..src + run]);
        }
        total - kept
    }
}

impl PixelAccess for PixelBuffer {
    fn size(&self) -> Size {
        PixelBuffer::size(self)
    }

    fn get_pixel(&self, pos: Point) -> Rgba<u8> {
        PixelBuffer::get_pixel(self, pos)
    }

    #[inline]
    fn put_pixel(&mut self, x: u32, y: u32, color: Rgba<u8>) {
        if x >= self.width || y >= self.height {
            return;
        }
        let i = self.offset(x, y);
        self.data[i..i + 4].copy_from_slice(&color.0);
    }

    fn fill_span(&mut self, y: u32, x0: u32, x1: u32, color: Rgba<u8>) {
        let x1 = x1.min(self.width);
        if y >= self.height || x0 >= x1 {
            return;
        }
        let start = self.offset(x0, y);
        let end = self.offset(x1, y);
        for px in self.data[start..end].chunks_exact_mut(4) {
            px.copy_from_slice(&color.0);
        }
    }
}
