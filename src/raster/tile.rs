use image::Rgba;
use rayon::prelude::*;

use crate::config::MAX_TILE_SIZE;
use crate::error::RasterError;
use crate::geometry::{PixelRect, Point, Size, TileIndex};
use crate::raster::buffer::PixelAccess;

// ============================================================================
// TILE
// ============================================================================

/// One `tile_size × tile_size` cell of the layer grid.
///
/// Invariant: `is_uniform` implies every in-bounds pixel of the tile equals
/// `uniform_color`, and `uniform_color` is `Some` exactly when `is_uniform`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tile {
    pub index: TileIndex,
    pub is_dirty: bool,
    pub is_uniform: bool,
    pub uniform_color: Option<Rgba<u8>>,
    size: u32,
}

impl Tile {
    fn new(index: TileIndex, size: u32) -> Self {
        Self {
            index,
            is_dirty: false,
            is_uniform: false,
            uniform_color: None,
            size,
        }
    }

    /// Top-left pixel of the tile.
    pub fn offset(&self) -> (u32, u32) {
        (self.index.column * self.size, self.index.row * self.size)
    }

    /// Pixel rectangle of the tile clipped to a buffer of `bounds`.
    pub fn bounds_within(&self, bounds: Size) -> PixelRect {
        let (ox, oy) = self.offset();
        PixelRect {
            min_x: ox,
            min_y: oy,
            max_x: ox + self.size,
            max_y: oy + self.size,
        }
        .clamp_to(bounds)
    }

    pub fn set_uniform(&mut self, color: Rgba<u8>) {
        self.is_uniform = true;
        self.uniform_color = Some(color);
    }

    pub fn clear_uniform(&mut self) {
        self.is_uniform = false;
        self.uniform_color = None;
    }
}

// ============================================================================
// TILE MANAGER: grid bookkeeping over a layer buffer
// ============================================================================

/// Partitions a layer into fixed-size tiles and tracks dirty/uniform state.
///
/// Pixel data is reached only through a [`PixelAccess`] handed in per call.
/// `set_size` never touches pixels, so whoever resizes the grid must resize
/// the buffer in the same step.
#[derive(Clone, Debug)]
pub struct TileManager {
    tile_size: u32,
    size: Size,
    rows: u32,
    columns: u32,
    tiles: Vec<Tile>,
}

impl TileManager {
    /// Fails unless `tile_size` is within `1..=MAX_TILE_SIZE`.
    pub fn new(size: Size, tile_size: u32) -> Result<Self, RasterError> {
        if tile_size == 0 || tile_size > MAX_TILE_SIZE {
            return Err(RasterError::InvalidConfig(format!(
                "tile_size must be within 1..={}, got {}",
                MAX_TILE_SIZE, tile_size
            )));
        }
        let mut tm = Self {
            tile_size,
            size,
            rows: 0,
            columns: 0,
            tiles: Vec::new(),
        };
        tm.init_tiles();
        Ok(tm)
    }

    fn init_tiles(&mut self) {
        self.rows = self.size.height.div_ceil(self.tile_size);
        self.columns = self.size.width.div_ceil(self.tile_size);
        let tile_size = self.tile_size;
        self.tiles = (0..self.rows)
            .flat_map(|row| (0..self.columns).map(move |column| Tile::new(TileIndex::new(row, column), tile_size)))
            .collect();
    }

    // ---- indexing helpers ----------------------------------------------------

    #[inline(always)]
    fn flat_index(&self, index: TileIndex) -> usize {
        (index.row * self.columns + index.column) as usize
    }

    pub fn tile_size(&self) -> u32 { self.tile_size }

    pub fn size(&self) -> Size { self.size }

    pub fn row_count(&self) -> u32 { self.rows }

    pub fn column_count(&self) -> u32 { self.columns }

    /// Tile containing `pos` (`floor(y / size)`, `floor(x / size)`).  Negative
    /// coordinates clamp to the first row/column and positions past the far
    /// edge produce indices that fail [`Self::is_tile_in_bounds`].
    #[inline]
    pub fn tile_index(&self, pos: Point) -> TileIndex {
        let ts = self.tile_size as i64;
        TileIndex {
            row: (pos.y as i64).div_euclid(ts).clamp(0, u32::MAX as i64) as u32,
            column: (pos.x as i64).div_euclid(ts).clamp(0, u32::MAX as i64) as u32,
        }
    }

    pub fn is_tile_in_bounds(&self, index: TileIndex) -> bool {
        index.row < self.rows && index.column < self.columns
    }

    pub fn tile(&self, index: TileIndex) -> Option<&Tile> {
        if !self.is_tile_in_bounds(index) {
            return None;
        }
        self.tiles.get(self.flat_index(index))
    }

    pub fn tile_mut(&mut self, index: TileIndex) -> Option<&mut Tile> {
        if !self.is_tile_in_bounds(index) {
            return None;
        }
        let idx = self.flat_index(index);
        self.tiles.get_mut(idx)
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> + '_ {
        self.tiles.iter()
    }

    // ---- dirty tracking -----------------------------------------------------

    pub fn set_all_dirty(&mut self) {
        for tile in &mut self.tiles {
            tile.is_dirty = true;
        }
    }

    /// Clear every dirty flag (the renderer calls this after uploading).
    pub fn reset_dirty_states(&mut self) {
        for tile in &mut self.tiles {
            tile.is_dirty = false;
        }
    }

    pub fn dirty_tiles(&self) -> Vec<TileIndex> {
        self.tiles.iter().filter(|t| t.is_dirty).map(|t| t.index).collect()
    }

    pub fn dirty_tile_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.is_dirty).count()
    }

    // ---- grid maintenance ---------------------------------------------------

    /// Rebuild the grid for a new layer size.  Pixel data is not touched and
    /// every rebuilt tile starts non-uniform and clean.
    pub fn set_size(&mut self, size: Size) {
        self.size = size;
        self.init_tiles();
    }

    /// Recompute every tile's uniform flag from the pixels.
    pub fn scan_all_tiles_uniformity<A>(&mut self, access: &A)
    where
        A: PixelAccess + Sync + ?Sized,
    {
        let bounds = self.size;
        self.tiles.par_iter_mut().for_each(|tile| {
            match scan_uniform_color(access, tile.bounds_within(bounds)) {
                Some(color) => tile.set_uniform(color),
                None => tile.clear_uniform(),
            }
        });
    }

    /// Mark dirty and rescan every tile overlapping `rect` (after a bulk
    /// region write that bypassed the per-pixel path).
    pub fn refresh_region<A>(&mut self, access: &A, rect: PixelRect)
    where
        A: PixelAccess + Sync + ?Sized,
    {
        let rect = rect.clamp_to(self.size);
        if rect.is_empty() {
            return;
        }
        let ts = self.tile_size;
        let (min_col, max_col) = (rect.min_x / ts, (rect.max_x - 1) / ts);
        let (min_row, max_row) = (rect.min_y / ts, (rect.max_y - 1) / ts);
        let bounds = self.size;
        self.tiles
            .par_iter_mut()
            .filter(|t| (min_row..=max_row).contains(&t.index.row) && (min_col..=max_col).contains(&t.index.column))
            .for_each(|tile| {
                tile.is_dirty = true;
                match scan_uniform_color(access, tile.bounds_within(bounds)) {
                    Some(color) => tile.set_uniform(color),
                    None => tile.clear_uniform(),
                }
            });
    }

    /// Write `color` to every in-bounds pixel of the tile.  The tile becomes
    /// dirty; it is marked uniform in `color` only when `mark_uniform` is set,
    /// otherwise its uniform state is cleared.
    pub fn fill_whole_tile<A>(&mut self, access: &mut A, index: TileIndex, color: Rgba<u8>, mark_uniform: bool)
    where
        A: PixelAccess + ?Sized,
    {
        let bounds = self.size;
        let Some(tile) = self.tile_mut(index) else {
            return;
        };
        let rect = tile.bounds_within(bounds);
        for y in rect.min_y..rect.max_y {
            access.fill_span(y, rect.min_x, rect.max_x, color);
        }

        tile.is_dirty = true;
        if mark_uniform {
            tile.set_uniform(color);
        } else {
            tile.clear_uniform();
        }
    }
}

/// The single color covering `rect`, or `None` when it holds more than one.
fn scan_uniform_color<A>(access: &A, rect: PixelRect) -> Option<Rgba<u8>>
where
    A: PixelAccess + ?Sized,
{
    if rect.is_empty() {
        return None;
    }
    let base = access.get_pixel(Point::new(rect.min_x as i32, rect.min_y as i32));
    for y in rect.min_y..rect.max_y {
        for x in rect.min_x..rect.max_x {
            if access.get_pixel(Point::new(x as i32, y as i32)) != base {
                return None;
            }
        }
    }
    Some(base)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::buffer::PixelBuffer;

    const BASE: Rgba<u8> = Rgba([1, 2, 3, 4]);
    const FILL: Rgba<u8> = Rgba([9, 8, 7, 6]);

    fn setup() -> (PixelBuffer, TileManager) {
        // 40×36 with 32px tiles gives a 2×2 grid with partial edge tiles.
        let buf = PixelBuffer::new_filled(Size::new(40, 36), BASE);
        let mut tm = TileManager::new(buf.size(), 32).unwrap();
        tm.scan_all_tiles_uniformity(&buf);
        (buf, tm)
    }

    #[test]
    fn computes_grid_and_indices() {
        let (_, tm) = setup();
        assert_eq!(tm.row_count(), 2);
        assert_eq!(tm.column_count(), 2);
        assert_eq!(tm.tile_index(Point::new(0, 0)), TileIndex::new(0, 0));
        assert_eq!(tm.tile_index(Point::new(33, 0)), TileIndex::new(0, 1));
        assert_eq!(tm.tile_index(Point::new(0, 33)), TileIndex::new(1, 0));
        assert!(tm.is_tile_in_bounds(TileIndex::new(1, 1)));
        assert!(!tm.is_tile_in_bounds(TileIndex::new(2, 0)));
        assert!(tm.tile(TileIndex::new(0, 2)).is_none());
    }

    #[test]
    fn initial_scan_marks_solid_tiles_uniform() {
        let (_, tm) = setup();
        for tile in tm.tiles() {
            assert!(tile.is_uniform);
            assert_eq!(tile.uniform_color, Some(BASE));
        }
    }

    #[test]
    fn scan_ignores_pixels_outside_the_buffer() {
        let mut buf = PixelBuffer::new_filled(Size::new(40, 36), BASE);
        buf.set_raw_pixel(Point::new(35, 2), FILL);
        let mut tm = TileManager::new(buf.size(), 32).unwrap();
        tm.scan_all_tiles_uniformity(&buf);
        assert!(tm.tile(TileIndex::new(0, 0)).unwrap().is_uniform);
        assert!(!tm.tile(TileIndex::new(0, 1)).unwrap().is_uniform);
        assert!(tm.tile(TileIndex::new(1, 1)).unwrap().is_uniform);
    }

    #[test]
    fn fill_whole_tile_writes_in_bounds_and_marks_uniform_dirty() {
        let (mut buf, mut tm) = setup();
        let idx = TileIndex::new(0, 0);
        tm.fill_whole_tile(&mut buf, idx, FILL, true);

        for y in 0..32 {
            for x in 0..32 {
                assert_eq!(buf.get_pixel(Point::new(x, y)), FILL);
            }
        }
        assert_eq!(buf.get_pixel(Point::new(33, 0)), BASE);

        let tile = tm.tile(idx).unwrap();
        assert!(tile.is_dirty);
        assert!(tile.is_uniform);
        assert_eq!(tile.uniform_color, Some(FILL));
    }

    #[test]
    fn fill_edge_tile_stays_inside_buffer() {
        let (mut buf, mut tm) = setup();
        tm.fill_whole_tile(&mut buf, TileIndex::new(1, 1), FILL, false);
        assert_eq!(buf.get_pixel(Point::new(39, 35)), FILL);
        assert_eq!(buf.get_pixel(Point::new(31, 35)), BASE);
        let tile = tm.tile(TileIndex::new(1, 1)).unwrap();
        assert!(tile.is_dirty);
        assert!(!tile.is_uniform);
        assert_eq!(tile.uniform_color, None);
    }

    #[test]
    fn dirty_flags_set_and_reset() {
        let (_, mut tm) = setup();
        assert_eq!(tm.dirty_tile_count(), 0);
        tm.set_all_dirty();
        assert_eq!(tm.dirty_tiles().len(), 4);
        tm.reset_dirty_states();
        assert!(tm.dirty_tiles().is_empty());
    }

    #[test]
    fn set_size_rebuilds_grid_only() {
        let (buf, mut tm) = setup();
        tm.set_size(Size::new(100, 10));
        assert_eq!(tm.row_count(), 1);
        assert_eq!(tm.column_count(), 4);
        assert_eq!(buf.size(), Size::new(40, 36));
    }

    #[test]
    fn rejects_tile_sizes_out_of_range() {
        assert!(TileManager::new(Size::new(8, 8), 0).is_err());
        assert!(TileManager::new(Size::new(8, 8), MAX_TILE_SIZE + 1).is_err());
        assert!(TileManager::new(Size::new(8, 8), MAX_TILE_SIZE).is_ok());
    }
}
