use std::collections::HashMap;

use image::Rgba;

use crate::color::{pack_rgba, unpack_rgba, PackedRgba};
use crate::config::EngineConfig;
use crate::error::RasterError;
use crate::geometry::{PixelRect, Point, Size, TileIndex};
use crate::raster::buffer::{PixelAccess, PixelBuffer};
use crate::raster::patch::{BufferSnapshot, Patch, PixelListPatch, TileFillPatch, WholePatch};
use crate::raster::LayerId;
use crate::log_info;

// ============================================================================
// ACCUMULATION STATE
// ============================================================================

/// Where the manager is in the per-operation cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiffState {
    Idle,
    Accumulating,
    Flushed,
}

/// Per-tile bucket of touched pixels, kept in first-touch order.
///
/// `written[i]` is set when a tool wrote the pixel itself; entries captured
/// only because a fill covered them stay unset.
#[derive(Clone, Debug, Default)]
struct PixelBucket {
    idx: Vec<u16>,
    before: Vec<PackedRgba>,
    after: Vec<PackedRgba>,
    written: Vec<bool>,
    slots: HashMap<u16, usize>,
}

#[derive(Clone, Debug, Default)]
struct PixelAccumulation {
    buckets: HashMap<TileIndex, PixelBucket>,
    tile_fills: HashMap<TileIndex, TileFillPatch>,
    pixel_count: usize,
}

impl PixelAccumulation {
    fn is_empty(&self) -> bool {
        self.pixel_count == 0 && self.tile_fills.is_empty()
    }

    /// Undo everything recorded so far on `target`: tile fills first, then
    /// pixel befores, the same order a patch is replayed in.
    fn rewind(&self, target: &mut PixelBuffer, tile_size: u32) {
        for fill in self.tile_fills.values() {
            if let Some(before) = fill.before {
                let rect = tile_rect(fill.tile, tile_size).clamp_to(target.size());
                let color = unpack_rgba(before);
                for y in rect.min_y..rect.max_y {
                    target.fill_span(y, rect.min_x, rect.max_x, color);
                }
            }
        }
        for (tile, bucket) in &self.buckets {
            let (ox, oy) = (tile.column * tile_size, tile.row * tile_size);
            for (local, before) in bucket.idx.iter().zip(&bucket.before) {
                let local = *local as u32;
                target.put_pixel(ox + local % tile_size, oy + local / tile_size, unpack_rgba(*before));
            }
        }
    }
}

/// One bit per pixel of the layer, used once per-pixel lists are gone.
#[derive(Clone, Debug)]
struct TouchedSet {
    size: Size,
    bits: Vec<u64>,
    count: usize,
}

impl TouchedSet {
    fn new(size: Size) -> Self {
        let len = (size.width as usize * size.height as usize).div_ceil(64);
        Self { size, bits: vec![0; len], count: 0 }
    }

    fn slot(&self, x: u32, y: u32) -> Option<(usize, u64)> {
        if x >= self.size.width || y >= self.size.height {
            return None;
        }
        let i = y as usize * self.size.width as usize + x as usize;
        Some((i / 64, 1u64 << (i % 64)))
    }

    fn insert(&mut self, x: u32, y: u32) {
        if let Some((word, mask)) = self.slot(x, y)
            && self.bits[word] & mask == 0
        {
            self.bits[word] |= mask;
            self.count += 1;
        }
    }

    fn contains(&self, x: u32, y: u32) -> bool {
        self.slot(x, y).is_some_and(|(word, mask)| self.bits[word] & mask != 0)
    }
}

/// Whole-buffer capture of the current operation.
#[derive(Clone, Debug)]
struct WholeCapture {
    /// Buffer as it was before the operation started.
    before: BufferSnapshot,
    /// Explicit "after"; `None` means capture the live buffer at flush.
    after: Option<BufferSnapshot>,
    /// Registered through `set_whole`, so never sliced to a bounding box.
    global: bool,
    /// Every pixel changed by the operation, fills included.
    touched: TouchedSet,
    /// Pixels a tool wrote directly; what `is_diff_exists` answers from.
    written: TouchedSet,
}

#[derive(Clone, Debug)]
enum Accumulation {
    Pixels(PixelAccumulation),
    Whole(Box<WholeCapture>),
}

impl Default for Accumulation {
    fn default() -> Self {
        Accumulation::Pixels(PixelAccumulation::default())
    }
}

// ============================================================================
// DIFF MANAGER
// ============================================================================

/// Collects the changes of one editing operation and finalizes them into a
/// [`Patch`].
///
/// Pixels are recorded per tile until more than `whole_buffer_threshold`
/// distinct pixels have been touched; from then on the operation is captured
/// as a before/after buffer pair sliced to the touched bounding box.
#[derive(Clone, Debug)]
pub struct DiffManager {
    tile_size: u32,
    threshold: usize,
    state: DiffState,
    accumulation: Accumulation,
    bbox: Option<PixelRect>,
}

impl DiffManager {
    /// Fails when `config` has a tile size or threshold out of range.
    pub fn new(config: &EngineConfig) -> Result<Self, RasterError> {
        config.validate()?;
        Ok(Self {
            tile_size: config.tile_size,
            threshold: config.whole_buffer_threshold,
            state: DiffState::Idle,
            accumulation: Accumulation::default(),
            bbox: None,
        })
    }

    pub fn state(&self) -> DiffState {
        self.state
    }

    pub fn is_whole_mode(&self) -> bool {
        matches!(self.accumulation, Accumulation::Whole(_))
    }

    /// Bounding box of everything touched in this operation.
    pub fn bounding_box(&self) -> Option<PixelRect> {
        self.bbox
    }

    /// Distinct pixels touched so far.
    pub fn pending_pixel_count(&self) -> usize {
        match &self.accumulation {
            Accumulation::Pixels(acc) => acc.pixel_count,
            Accumulation::Whole(capture) => capture.touched.count,
        }
    }

    pub fn has_changes(&self) -> bool {
        match &self.accumulation {
            Accumulation::Pixels(acc) => !acc.is_empty(),
            Accumulation::Whole(_) => true,
        }
    }

    fn begin(&mut self) {
        debug_assert!(
            self.state != DiffState::Flushed,
            "DiffManager: new changes recorded after flush without reset"
        );
        self.state = DiffState::Accumulating;
    }

    fn grow_bbox(&mut self, rect: PixelRect) {
        match &mut self.bbox {
            Some(bbox) => bbox.union(&rect),
            None => self.bbox = Some(rect),
        }
    }

    #[inline]
    fn locate(&self, x: u32, y: u32) -> (TileIndex, u16) {
        let ts = self.tile_size;
        let tile = TileIndex::new(y / ts, x / ts);
        let local = (y % ts) * ts + (x % ts);
        (tile, local as u16)
    }

    // ---- recording ----------------------------------------------------------

    /// Record a pixel written by a tool.  `pos` must be inside the buffer.
    /// The first `before` recorded for a pixel is kept; later calls only move
    /// `after`.
    pub fn add_pixel(&mut self, pos: Point, before: Rgba<u8>, after: Rgba<u8>) {
        self.record_pixel(pos, before, after, true);
    }

    /// Record the previous value of a pixel that a tile fill is about to
    /// overwrite.  Unlike [`Self::add_pixel`] this does not count as a write,
    /// so a tool may still draw over the pixel later in the operation.
    pub fn add_covered_pixel(&mut self, pos: Point, before: Rgba<u8>, after: Rgba<u8>) {
        self.record_pixel(pos, before, after, false);
    }

    fn record_pixel(&mut self, pos: Point, before: Rgba<u8>, after: Rgba<u8>, written: bool) {
        if pos.x < 0 || pos.y < 0 {
            return;
        }
        self.begin();
        let (x, y) = (pos.x as u32, pos.y as u32);
        self.grow_bbox(PixelRect::from_pixel(x, y));
        let (tile, local) = self.locate(x, y);

        match &mut self.accumulation {
            Accumulation::Pixels(acc) => {
                let bucket = acc.buckets.entry(tile).or_default();
                if let Some(&slot) = bucket.slots.get(&local) {
                    bucket.after[slot] = pack_rgba(after);
                    bucket.written[slot] |= written;
                    return;
                }
                // A tile filled earlier in this operation already overwrote
                // the pixel, so its real previous value is the tile's old color.
                let first_before = acc
                    .tile_fills
                    .get(&tile)
                    .and_then(|fill| fill.before)
                    .unwrap_or_else(|| pack_rgba(before));
                bucket.slots.insert(local, bucket.idx.len());
                bucket.idx.push(local);
                bucket.before.push(first_before);
                bucket.after.push(pack_rgba(after));
                bucket.written.push(written);
                acc.pixel_count += 1;
            }
            Accumulation::Whole(capture) => {
                capture.touched.insert(x, y);
                if written {
                    capture.written.insert(x, y);
                }
                capture.after = None;
            }
        }
    }

    /// Record a whole-tile fill.  The first `before` recorded for a tile is
    /// kept; later fills of the same tile only move `after`.
    pub fn add_tile_fill(&mut self, index: TileIndex, before: Option<Rgba<u8>>, after: Rgba<u8>) {
        self.begin();
        let rect = tile_rect(index, self.tile_size);
        self.grow_bbox(rect);

        match &mut self.accumulation {
            Accumulation::Pixels(acc) => {
                // The fill overwrites every pixel already recorded in this tile.
                if let Some(bucket) = acc.buckets.get_mut(&index) {
                    bucket.after.fill(pack_rgba(after));
                }
                acc.tile_fills
                    .entry(index)
                    .and_modify(|fill| fill.after = pack_rgba(after))
                    .or_insert(TileFillPatch {
                        tile: index,
                        before: before.map(pack_rgba),
                        after: pack_rgba(after),
                    });
            }
            Accumulation::Whole(capture) => {
                for y in rect.min_y..rect.max_y {
                    for x in rect.min_x..rect.max_x {
                        capture.touched.insert(x, y);
                    }
                }
                capture.after = None;
            }
        }
    }

    /// Whether `pos` was already written during this operation.
    pub fn is_diff_exists(&self, pos: Point) -> bool {
        if pos.x < 0 || pos.y < 0 {
            return false;
        }
        let (x, y) = (pos.x as u32, pos.y as u32);
        match &self.accumulation {
            Accumulation::Pixels(acc) => {
                let (tile, local) = self.locate(x, y);
                acc.buckets
                    .get(&tile)
                    .and_then(|b| b.slots.get(&local).map(|&slot| b.written[slot]))
                    .unwrap_or(false)
            }
            Accumulation::Whole(capture) => capture.written.contains(x, y),
        }
    }

    // ---- whole-buffer capture -----------------------------------------------

    /// True once the per-pixel lists have grown past the threshold.
    pub fn is_over_threshold(&self) -> bool {
        match &self.accumulation {
            Accumulation::Pixels(acc) => acc.pixel_count > self.threshold,
            Accumulation::Whole(_) => false,
        }
    }

    /// Switch to whole-buffer capture.  `current` is the live buffer with all
    /// of this operation's writes applied; the recorded befores are replayed
    /// onto a copy of it to recover the buffer as it was before the operation.
    pub fn promote_to_whole(&mut self, current: &PixelBuffer) {
        if self.is_whole_mode() {
            return;
        }
        let Accumulation::Pixels(acc) = std::mem::take(&mut self.accumulation) else {
            return;
        };
        let mut before = current.clone();
        acc.rewind(&mut before, self.tile_size);

        let mut touched = TouchedSet::new(current.size());
        let mut written = TouchedSet::new(current.size());
        for (tile, bucket) in &acc.buckets {
            let (ox, oy) = (tile.column * self.tile_size, tile.row * self.tile_size);
            for (local, by_tool) in bucket.idx.iter().zip(&bucket.written) {
                let local = *local as u32;
                let (x, y) = (ox + local % self.tile_size, oy + local / self.tile_size);
                touched.insert(x, y);
                if *by_tool {
                    written.insert(x, y);
                }
            }
        }
        for fill in acc.tile_fills.keys() {
            let rect = tile_rect(*fill, self.tile_size);
            for y in rect.min_y..rect.max_y {
                for x in rect.min_x..rect.max_x {
                    touched.insert(x, y);
                }
            }
        }

        log_info!(
            "DiffManager: {} pixels touched, switching to whole-buffer capture",
            acc.pixel_count
        );
        self.accumulation = Accumulation::Whole(Box::new(WholeCapture {
            before: BufferSnapshot { size: before.size(), data: before.into_raw() },
            after: None,
            global: false,
            touched,
            written,
        }));
    }

    /// Register an explicit whole-buffer change (filters, resizes, clears).
    ///
    /// If this operation already recorded changes, the earliest known state
    /// is kept as `before`.
    pub fn set_whole(&mut self, before: BufferSnapshot, after: BufferSnapshot) {
        self.begin();
        let before = match std::mem::take(&mut self.accumulation) {
            Accumulation::Pixels(acc) if !acc.is_empty() => {
                match PixelBuffer::from_raw(before.size, before.data) {
                    Ok(mut buf) => {
                        acc.rewind(&mut buf, self.tile_size);
                        BufferSnapshot { size: buf.size(), data: buf.into_raw() }
                    }
                    Err(_) => {
                        debug_assert!(false, "DiffManager: whole snapshot with inconsistent size");
                        return;
                    }
                }
            }
            Accumulation::Pixels(_) => before,
            Accumulation::Whole(capture) => capture.before,
        };
        self.grow_bbox(PixelRect::from_size(after.size));
        let touched = TouchedSet::new(after.size);
        let written = TouchedSet::new(after.size);
        self.accumulation = Accumulation::Whole(Box::new(WholeCapture {
            before,
            after: Some(after),
            global: true,
            touched,
            written,
        }));
    }

    // ---- finalization -------------------------------------------------------

    /// Mark the end of the operation.  No further changes may be recorded
    /// until [`Self::reset`].
    pub fn flush(&mut self) {
        self.state = DiffState::Flushed;
    }

    /// Finalize the accumulated changes.  Returns `None` when the operation
    /// changed nothing, so no history entry gets created for it.
    pub fn build_patch(&mut self, layer_id: LayerId, current: &PixelBuffer) -> Option<Patch> {
        self.state = DiffState::Flushed;
        match std::mem::take(&mut self.accumulation) {
            Accumulation::Pixels(acc) => build_pixel_patch(layer_id, acc),
            Accumulation::Whole(capture) => build_whole_patch(layer_id, *capture, self.bbox, current),
        }
    }

    /// Discard everything and return to idle.  Call once after every
    /// `build_patch`, or to abandon an operation.
    pub fn reset(&mut self) {
        self.accumulation = Accumulation::default();
        self.bbox = None;
        self.state = DiffState::Idle;
    }
}

/// Unclipped pixel rectangle of a tile.
fn tile_rect(index: TileIndex, tile_size: u32) -> PixelRect {
    let (ox, oy) = (index.column * tile_size, index.row * tile_size);
    PixelRect { min_x: ox, min_y: oy, max_x: ox + tile_size, max_y: oy + tile_size }
}

fn build_pixel_patch(layer_id: LayerId, acc: PixelAccumulation) -> Option<Patch> {
    let mut tiles: Vec<TileFillPatch> = acc
        .tile_fills
        .into_values()
        .filter(|fill| fill.before != Some(fill.after))
        .collect();
    tiles.sort_by_key(|fill| fill.tile);

    let mut buckets: Vec<(TileIndex, PixelBucket)> = acc.buckets.into_iter().collect();
    buckets.sort_by_key(|(tile, _)| *tile);

    let mut pixels = Vec::with_capacity(buckets.len());
    for (tile, bucket) in buckets {
        // Unchanged pixels are only dropped where no fill covers them; under
        // a fill they still have to be restored after the fill replays.
        let filled = tiles.iter().any(|fill| fill.tile == tile);
        let mut list = PixelListPatch {
            tile,
            idx: Vec::with_capacity(bucket.idx.len()),
            before: Vec::with_capacity(bucket.idx.len()),
            after: Vec::with_capacity(bucket.idx.len()),
        };
        for i in 0..bucket.idx.len() {
            if !filled && bucket.before[i] == bucket.after[i] {
                continue;
            }
            list.idx.push(bucket.idx[i]);
            list.before.push(bucket.before[i]);
            list.after.push(bucket.after[i]);
        }
        if !list.idx.is_empty() {
            pixels.push(list);
        }
    }

    if pixels.is_empty() && tiles.is_empty() {
        return None;
    }
    Some(Patch {
        layer_id,
        pixels: (!pixels.is_empty()).then_some(pixels),
        tiles: (!tiles.is_empty()).then_some(tiles),
        whole: None,
    })
}

fn build_whole_patch(
    layer_id: LayerId,
    capture: WholeCapture,
    bbox: Option<PixelRect>,
    current: &PixelBuffer,
) -> Option<Patch> {
    let after = capture.after.unwrap_or_else(|| BufferSnapshot {
        size: current.size(),
        data: current.as_raw().to_vec(),
    });
    let before = capture.before;
    if before == after {
        return None;
    }

    let region = bbox
        .map(|rect| rect.clamp_to(after.size))
        .filter(|rect| !capture.global && before.size == after.size && !rect.covers(after.size));

    let whole = match region {
        Some(rect) if !rect.is_empty() => {
            let before_buf = PixelBuffer::from_raw(before.size, before.data).ok()?;
            let after_buf = PixelBuffer::from_raw(after.size, after.data).ok()?;
            WholePatch::Region {
                rect,
                before: before_buf.extract_region(rect),
                after: after_buf.extract_region(rect),
            }
        }
        _ => WholePatch::Full { before, after },
    };

    Some(Patch { layer_id, pixels: None, tiles: None, whole: Some(whole) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
    const CLEAR: Rgba<u8> = Rgba([0, 0, 0, 0]);

    fn manager(tile_size: u32, threshold: usize) -> DiffManager {
        DiffManager::new(
            &EngineConfig::default()
                .with_tile_size(tile_size)
                .with_whole_buffer_threshold(threshold),
        )
        .unwrap()
    }

    #[test]
    fn rejects_out_of_range_config() {
        assert!(DiffManager::new(&EngineConfig::default().with_tile_size(0)).is_err());
        assert!(DiffManager::new(&EngineConfig::default().with_whole_buffer_threshold(0)).is_err());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "after flush")]
    fn recording_after_flush_without_reset_panics() {
        let mut dm = manager(4, 100);
        dm.add_pixel(Point::new(0, 0), CLEAR, RED);
        dm.flush();
        dm.add_pixel(Point::new(1, 0), CLEAR, RED);
    }

    #[test]
    fn covered_pixels_are_not_writes() {
        for threshold in [100, 1] {
            let mut dm = manager(4, threshold);
            let mut buf = PixelBuffer::new(Size::new(8, 8));
            for x in 0..4 {
                let pos = Point::new(x, 0);
                dm.add_covered_pixel(pos, CLEAR, GREEN);
                buf.set_raw_pixel(pos, GREEN);
            }
            dm.add_tile_fill(TileIndex::new(0, 0), None, GREEN);
            let pos = Point::new(5, 5);
            let write = buf.set_raw_pixel(pos, RED).unwrap();
            dm.add_pixel(pos, write.before, write.after);
            if dm.is_over_threshold() {
                dm.promote_to_whole(&buf);
            }
            assert_eq!(dm.is_whole_mode(), threshold == 1);

            assert!(!dm.is_diff_exists(Point::new(1, 0)));
            assert!(!dm.is_diff_exists(Point::new(2, 2)));
            assert!(dm.is_diff_exists(pos));

            // A tool writing over a covered pixel makes it a write.
            dm.add_pixel(Point::new(1, 0), GREEN, BLUE);
            assert!(dm.is_diff_exists(Point::new(1, 0)));
        }
    }

    #[test]
    fn keeps_first_before_and_last_after() {
        let mut dm = manager(4, 100);
        let buf = PixelBuffer::new(Size::new(8, 8));
        let pos = Point::new(5, 6);
        dm.add_pixel(pos, CLEAR, RED);
        dm.add_pixel(pos, RED, GREEN);
        dm.add_pixel(pos, GREEN, BLUE);
        assert_eq!(dm.pending_pixel_count(), 1);
        assert!(dm.is_diff_exists(pos));
        assert!(!dm.is_diff_exists(Point::new(6, 6)));

        let patch = dm.build_patch(Uuid::nil(), &buf).unwrap();
        let lists = patch.pixels.unwrap();
        assert_eq!(lists.len(), 1);
        assert_eq!(lists[0].tile, TileIndex::new(1, 1));
        assert_eq!(lists[0].idx, vec![2 * 4 + 1]);
        assert_eq!(lists[0].before, vec![pack_rgba(CLEAR)]);
        assert_eq!(lists[0].after, vec![pack_rgba(BLUE)]);
    }

    #[test]
    fn empty_or_noop_operation_builds_nothing() {
        let mut dm = manager(4, 100);
        let buf = PixelBuffer::new(Size::new(4, 4));
        assert!(dm.build_patch(Uuid::nil(), &buf).is_none());
        dm.reset();

        dm.add_pixel(Point::new(1, 1), RED, RED);
        assert!(dm.build_patch(Uuid::nil(), &buf).is_none());
        dm.reset();
        assert_eq!(dm.state(), DiffState::Idle);
    }

    #[test]
    fn tile_fill_keeps_first_before() {
        let mut dm = manager(4, 100);
        let buf = PixelBuffer::new(Size::new(8, 8));
        let tile = TileIndex::new(0, 1);
        dm.add_tile_fill(tile, Some(CLEAR), RED);
        dm.add_tile_fill(tile, Some(RED), GREEN);
        let patch = dm.build_patch(Uuid::nil(), &buf).unwrap();
        let tiles = patch.tiles.unwrap();
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].before, Some(pack_rgba(CLEAR)));
        assert_eq!(tiles[0].after, pack_rgba(GREEN));
        assert_eq!(dm.bounding_box(), Some(PixelRect { min_x: 4, min_y: 0, max_x: 8, max_y: 4 }));
    }

    #[test]
    fn pixel_under_earlier_fill_takes_fill_before() {
        let mut dm = manager(4, 100);
        let buf = PixelBuffer::new(Size::new(4, 4));
        dm.add_tile_fill(TileIndex::new(0, 0), Some(RED), GREEN);
        dm.add_pixel(Point::new(1, 1), GREEN, BLUE);
        let patch = dm.build_patch(Uuid::nil(), &buf).unwrap();
        let lists = patch.pixels.unwrap();
        assert_eq!(lists[0].before, vec![pack_rgba(RED)]);
        assert_eq!(lists[0].after, vec![pack_rgba(BLUE)]);
    }

    #[test]
    fn later_fill_overrides_recorded_pixel_after() {
        let mut dm = manager(4, 100);
        let buf = PixelBuffer::new(Size::new(4, 4));
        dm.add_pixel(Point::new(2, 2), RED, RED);
        dm.add_tile_fill(TileIndex::new(0, 0), Some(RED), GREEN);
        let patch = dm.build_patch(Uuid::nil(), &buf).unwrap();
        let lists = patch.pixels.unwrap();
        assert_eq!(lists[0].before, vec![pack_rgba(RED)]);
        assert_eq!(lists[0].after, vec![pack_rgba(GREEN)]);
    }

    #[test]
    fn promotion_reconstructs_pre_operation_buffer() {
        let mut dm = manager(4, 3);
        let mut buf = PixelBuffer::new_filled(Size::new(8, 8), RED);
        let original = buf.clone();

        for x in 0..5 {
            let pos = Point::new(x, 2);
            let write = buf.set_raw_pixel(pos, GREEN).unwrap();
            dm.add_pixel(pos, write.before, write.after);
            if dm.is_over_threshold() {
                dm.promote_to_whole(&buf);
            }
        }
        assert!(dm.is_whole_mode());
        assert_eq!(dm.pending_pixel_count(), 5);
        assert!(dm.is_diff_exists(Point::new(0, 2)));

        let patch = dm.build_patch(Uuid::nil(), &buf).unwrap();
        assert!(patch.pixels.is_none());
        match patch.whole.unwrap() {
            WholePatch::Region { rect, before, after } => {
                assert_eq!(rect, PixelRect { min_x: 0, min_y: 2, max_x: 5, max_y: 3 });
                assert_eq!(before, original.extract_region(rect));
                assert_eq!(after, buf.extract_region(rect));
            }
            other => panic!("expected region capture, got {other:?}"),
        }
    }

    #[test]
    fn set_whole_keeps_pre_operation_before() {
        let mut dm = manager(4, 100);
        let mut buf = PixelBuffer::new(Size::new(4, 4));
        let original = buf.clone();

        let write = buf.set_raw_pixel(Point::new(0, 0), RED).unwrap();
        dm.add_pixel(Point::new(0, 0), write.before, write.after);

        let before = BufferSnapshot { size: buf.size(), data: buf.as_raw().to_vec() };
        let next = PixelBuffer::new_filled(Size::new(2, 2), BLUE);
        let after = BufferSnapshot { size: next.size(), data: next.as_raw().to_vec() };
        dm.set_whole(before, after.clone());

        let patch = dm.build_patch(Uuid::nil(), &next).unwrap();
        match patch.whole.unwrap() {
            WholePatch::Full { before, after: got } => {
                assert_eq!(before.data, original.as_raw());
                assert_eq!(got, after);
            }
            other => panic!("expected full capture, got {other:?}"),
        }
    }
}
