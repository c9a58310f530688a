use std::collections::VecDeque;

use image::Rgba;

use crate::color::unpack_rgba;
use crate::config::EngineConfig;
use crate::error::RasterError;
use crate::geometry::{PixelRect, Point, Size, TileIndex};
use crate::history::{HistorySink, LayerBufferHistoryAction};
use crate::raster::buffer::{PixelBuffer, PixelWrite};
use crate::raster::diff::DiffManager;
use crate::raster::patch::{BufferSnapshot, Patch, PixelListPatch, WholePatch};
use crate::raster::tile::TileManager;
use crate::raster::LayerId;
use crate::{log_info, log_warn};

/// Notification for the renderer, drained once per frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LayerEvent {
    /// Re-upload the layer; `only_dirty` means the tile dirty flags say which
    /// parts changed.
    RequestUpdate { layer_id: LayerId, only_dirty: bool, context: String },
    /// Refresh the layer's thumbnail preview.
    PreviewUpdate { layer_id: LayerId },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Undo,
    Redo,
}

impl Direction {
    fn label(self) -> &'static str {
        match self {
            Direction::Undo => "undo",
            Direction::Redo => "redo",
        }
    }
}

// ============================================================================
// LAYER IMAGE AGENT
// ============================================================================

/// Per-layer façade over the pixel buffer, tile grid and diff accumulator.
///
/// Tools mutate a layer only through this type, and finished patches are
/// replayed only through [`Self::undo_patch`] / [`Self::redo_patch`].
#[derive(Debug)]
pub struct LayerImageAgent {
    layer_id: LayerId,
    config: EngineConfig,
    pbm: PixelBuffer,
    tm: TileManager,
    dm: DiffManager,
    events: VecDeque<LayerEvent>,
    modified: bool,
}

impl LayerImageAgent {
    // ---- construction -------------------------------------------------------

    pub fn new(layer_id: LayerId, buffer: PixelBuffer, config: EngineConfig) -> Result<Self, RasterError> {
        config.validate()?;
        let mut tm = TileManager::new(buffer.size(), config.tile_size)?;
        tm.scan_all_tiles_uniformity(&buffer);
        Ok(Self {
            layer_id,
            config,
            pbm: buffer,
            tm,
            dm: DiffManager::new(&config)?,
            events: VecDeque::new(),
            modified: false,
        })
    }

    /// Agent over a transparent buffer.
    pub fn with_size(layer_id: LayerId, size: Size, config: EngineConfig) -> Result<Self, RasterError> {
        Self::new(layer_id, PixelBuffer::new(size), config)
    }

    /// Agent over existing RGBA bytes; fails if `data` is not `w * h * 4` long.
    pub fn from_raw(layer_id: LayerId, size: Size, data: Vec<u8>, config: EngineConfig) -> Result<Self, RasterError> {
        Self::new(layer_id, PixelBuffer::from_raw(size, data)?, config)
    }

    // ---- accessors ----------------------------------------------------------

    pub fn layer_id(&self) -> LayerId { self.layer_id }

    pub fn config(&self) -> &EngineConfig { &self.config }

    pub fn width(&self) -> u32 { self.pbm.width() }

    pub fn height(&self) -> u32 { self.pbm.height() }

    pub fn size(&self) -> Size { self.pbm.size() }

    pub fn buffer(&self) -> &[u8] { self.pbm.as_raw() }

    pub fn pixel_buffer(&self) -> &PixelBuffer { &self.pbm }

    pub fn tile_manager(&self) -> &TileManager { &self.tm }

    /// Mutable grid access for the renderer (clearing dirty flags).
    pub fn tile_manager_mut(&mut self) -> &mut TileManager { &mut self.tm }

    pub fn diff_manager(&self) -> &DiffManager { &self.dm }

    /// Direct accumulator access, e.g. to `reset()` when a tool aborts a
    /// stroke after restoring its own pre-stroke pixels.
    pub fn diff_manager_mut(&mut self) -> &mut DiffManager { &mut self.dm }

    /// Whether the layer changed since the last [`Self::mark_saved`].
    pub fn is_modified(&self) -> bool { self.modified }

    pub fn mark_saved(&mut self) {
        self.modified = false;
    }

    #[inline]
    pub fn get_pixel(&self, pos: Point) -> Rgba<u8> {
        self.pbm.get_pixel(pos)
    }

    #[inline]
    pub fn is_in_bounds(&self, pos: Point) -> bool {
        self.pbm.is_in_bounds(pos)
    }

    // ---- events -------------------------------------------------------------

    fn emit_update(&mut self, only_dirty: bool, context: String) {
        self.events.push_back(LayerEvent::RequestUpdate { layer_id: self.layer_id, only_dirty, context });
    }

    fn emit_preview(&mut self) {
        self.events.push_back(LayerEvent::PreviewUpdate { layer_id: self.layer_id });
    }

    /// Take every notification queued since the last drain.
    pub fn drain_events(&mut self) -> Vec<LayerEvent> {
        self.events.drain(..).collect()
    }

    /// Ask for a full (not dirty-only) re-upload plus a preview refresh.
    pub fn force_update(&mut self) {
        self.emit_update(false, format!("Layer({}) force update", self.layer_id));
        self.emit_preview();
    }

    // ---- tool write path ----------------------------------------------------

    /// Write one pixel and record it in the current operation.
    ///
    /// Returns `None` when `pos` is out of bounds, or when the pixel was
    /// already written during this operation and `skip_existing_diff_check`
    /// is false (the write is skipped so the recorded `before` stays intact).
    pub fn set_pixel(&mut self, pos: Point, color: Rgba<u8>, skip_existing_diff_check: bool) -> Option<PixelWrite> {
        if !self.pbm.is_in_bounds(pos) {
            return None;
        }
        if !skip_existing_diff_check && self.dm.is_diff_exists(pos) {
            return None;
        }
        let write = self.pbm.set_raw_pixel(pos, color)?;
        self.modified = true;
        self.dm.add_pixel(pos, write.before, write.after);

        let index = self.tm.tile_index(pos);
        if let Some(tile) = self.tm.tile_mut(index) {
            tile.is_dirty = true;
            if tile.is_uniform && tile.uniform_color != Some(color) {
                tile.clear_uniform();
            }
        }

        self.promote_if_needed();
        Some(write)
    }

    /// Fill a whole tile with `color`, recording the change.
    ///
    /// Returns `false` for tiles outside the grid and for tiles that are
    /// already uniform in `color`.
    pub fn fill_tile(&mut self, index: TileIndex, color: Rgba<u8>) -> bool {
        let Some(tile) = self.tm.tile(index) else {
            return false;
        };
        if tile.is_uniform && tile.uniform_color == Some(color) {
            return false;
        }
        let before = tile.uniform_color;
        if before.is_none() {
            // Mixed content has no single color to restore, keep every pixel.
            let rect = tile.bounds_within(self.pbm.size());
            for y in rect.min_y..rect.max_y {
                for x in rect.min_x..rect.max_x {
                    let pos = Point::new(x as i32, y as i32);
                    self.dm.add_covered_pixel(pos, self.pbm.get_pixel(pos), color);
                }
            }
        }
        self.dm.add_tile_fill(index, before, color);
        self.tm.fill_whole_tile(&mut self.pbm, index, color, true);
        self.modified = true;
        self.promote_if_needed();
        true
    }

    fn promote_if_needed(&mut self) {
        if self.dm.is_over_threshold() {
            self.dm.promote_to_whole(&self.pbm);
        }
    }

    // ---- wholesale replacement ----------------------------------------------

    /// Replace the pixel bytes (same dimensions) without recording history.
    ///
    /// All tiles become dirty and uniformity is rescanned.  `silently`
    /// suppresses the render notification, `update_preview` adds a preview
    /// refresh.
    pub fn set_buffer(&mut self, data: Vec<u8>, silently: bool, update_preview: bool) -> Result<(), RasterError> {
        self.pbm.replace_data(data)?;
        self.modified = true;
        self.tm.scan_all_tiles_uniformity(&self.pbm);
        self.tm.set_all_dirty();

        if !silently {
            self.emit_update(true, format!("Layer({}) buffer set", self.layer_id));
            if update_preview {
                self.emit_preview();
            }
        }
        Ok(())
    }

    /// Install a complete new buffer (any size) and register it as a
    /// whole-buffer change of the current operation.  For filters, clears and
    /// other global edits.
    pub fn replace_whole(&mut self, next: PixelBuffer) {
        let before = BufferSnapshot { size: self.pbm.size(), data: self.pbm.as_raw().to_vec() };
        let after = BufferSnapshot { size: next.size(), data: next.as_raw().to_vec() };
        self.dm.set_whole(before, after);
        self.install_buffer(next);
        self.emit_update(true, format!("Layer({}) buffer replaced", self.layer_id));
        self.emit_preview();
    }

    fn install_buffer(&mut self, next: PixelBuffer) {
        if next.size() != self.tm.size() {
            self.tm.set_size(next.size());
        }
        self.pbm = next;
        self.modified = true;
        self.tm.scan_all_tiles_uniformity(&self.pbm);
        self.tm.set_all_dirty();
    }

    /// Resize the pixel buffer and the tile grid together.
    ///
    /// Content is copied by origin (see [`PixelBuffer::change_size`]); every
    /// tile of the new grid is dirty.  Notifications only go out with
    /// `emit_event`.
    pub fn change_buffer_size(&mut self, new_size: Size, emit_event: bool, dest_origin: Point, src_origin: Point) {
        self.pbm.change_size(new_size, dest_origin, src_origin);
        self.tm.set_size(new_size);
        self.tm.scan_all_tiles_uniformity(&self.pbm);
        self.tm.set_all_dirty();
        self.modified = true;

        if emit_event {
            self.emit_update(true, format!("Layer({}) buffer size changed", self.layer_id));
            self.emit_preview();
        }
    }

    // ---- history ------------------------------------------------------------

    /// Close the current operation: build its patch, hand it to `sink` if the
    /// operation changed anything, and reset the accumulator either way.
    /// Returns whether an action was pushed.
    pub fn register_to_history(&mut self, sink: &mut dyn HistorySink, context: &str) -> bool {
        self.dm.flush();
        let patch = self.dm.build_patch(self.layer_id, &self.pbm);
        let pushed = match patch {
            Some(patch) => {
                log_info!(
                    "Layer({}) {}: registered {} patch ({} px, {} tiles, {} bytes)",
                    self.layer_id,
                    context,
                    patch.kind().name(),
                    patch.pixel_count(),
                    patch.tile_count(),
                    patch.memory_size()
                );
                sink.push(Box::new(LayerBufferHistoryAction::new(patch, context)));
                true
            }
            None => false,
        };
        self.dm.reset();
        pushed
    }

    /// Restore the state before `patch`.  Safe to repeat: patches hold
    /// absolute values.
    pub fn undo_patch(&mut self, patch: &Patch) {
        self.apply_patch(patch, Direction::Undo);
    }

    /// Re-apply `patch`.
    pub fn redo_patch(&mut self, patch: &Patch) {
        self.apply_patch(patch, Direction::Redo);
    }

    fn apply_patch(&mut self, patch: &Patch, direction: Direction) {
        self.modified = true;
        let skipped = match &patch.whole {
            Some(whole) => self.apply_whole(whole, direction),
            None => {
                let mut skipped = 0;
                // Tiles first so per-pixel exceptions inside a filled tile win.
                if let Some(tiles) = &patch.tiles {
                    for fill in tiles {
                        if !self.tm.is_tile_in_bounds(fill.tile) {
                            skipped += 1;
                            continue;
                        }
                        let target = match direction {
                            Direction::Undo => fill.before,
                            Direction::Redo => Some(fill.after),
                        };
                        match target {
                            Some(packed) => {
                                self.tm.fill_whole_tile(&mut self.pbm, fill.tile, unpack_rgba(packed), true);
                            }
                            None => {
                                // Mixed previous content comes back through the pixel lists.
                                if let Some(tile) = self.tm.tile_mut(fill.tile) {
                                    tile.is_dirty = true;
                                    tile.clear_uniform();
                                }
                            }
                        }
                    }
                }
                if let Some(lists) = &patch.pixels {
                    for list in lists {
                        skipped += self.apply_pixel_list(list, direction);
                    }
                }
                skipped
            }
        };

        if skipped > 0 {
            log_warn!(
                "Layer({}) {}: skipped {} stale patch entries outside {}x{}",
                self.layer_id,
                direction.label(),
                skipped,
                self.pbm.width(),
                self.pbm.height()
            );
        }

        self.emit_update(true, format!("Layer({}) {} (patch)", self.layer_id, direction.label()));
        self.emit_preview();
    }

    /// Returns the number of pixels that fell outside the current buffer.
    fn apply_whole(&mut self, whole: &WholePatch, direction: Direction) -> usize {
        match whole {
            WholePatch::Full { before, after } => {
                let snapshot = match direction {
                    Direction::Undo => before,
                    Direction::Redo => after,
                };
                match PixelBuffer::from_raw(snapshot.size, snapshot.data.clone()) {
                    Ok(next) => {
                        self.install_buffer(next);
                        0
                    }
                    Err(e) => {
                        log_warn!("Layer({}) {}: unusable snapshot: {}", self.layer_id, direction.label(), e);
                        snapshot.size.width as usize * snapshot.size.height as usize
                    }
                }
            }
            WholePatch::Region { rect, before, after } => {
                let data = match direction {
                    Direction::Undo => before,
                    Direction::Redo => after,
                };
                let dropped = self.pbm.blit_region(*rect, data);
                self.tm.refresh_region(&self.pbm, *rect);
                dropped
            }
        }
    }

    /// Write one tile's pixel list.  Returns how many entries were skipped
    /// because they fall outside the current buffer.
    fn apply_pixel_list(&mut self, list: &PixelListPatch, direction: Direction) -> usize {
        // A tile outside the grid has no pixel inside the buffer.
        if !self.tm.is_tile_in_bounds(list.tile) {
            return list.idx.len();
        }
        let tile_size = self.tm.tile_size();
        let (ox, oy) = (list.tile.column * tile_size, list.tile.row * tile_size);
        let (w, h) = (self.pbm.width(), self.pbm.height());

        let values = match direction {
            Direction::Undo => &list.before,
            Direction::Redo => &list.after,
        };

        let mut skipped = 0;
        for (local, packed) in list.idx.iter().zip(values) {
            let local = *local as u32;
            let x = ox + local % tile_size;
            let y = oy + local / tile_size;
            if local >= tile_size * tile_size || x >= w || y >= h {
                skipped += 1;
                continue;
            }
            self.pbm.set_raw_pixel(Point::new(x as i32, y as i32), unpack_rgba(*packed));
        }

        // Arbitrary pixels were written, so the tile can no longer claim a
        // single color.
        if let Some(tile) = self.tm.tile_mut(list.tile) {
            tile.is_dirty = true;
            tile.clear_uniform();
        }
        skipped
    }

    /// Every dirty tile as a pixel rectangle clipped to the buffer.
    pub fn dirty_rects(&self) -> Vec<PixelRect> {
        let size = self.pbm.size();
        self.tm
            .tiles()
            .filter(|t| t.is_dirty)
            .map(|t| t.bounds_within(size))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::TRANSPARENT;
    use crate::history::Command;
    use uuid::Uuid;

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const GREEN: Rgba<u8> = Rgba([0, 255, 0, 255]);
    const BLUE: Rgba<u8> = Rgba([0, 0, 255, 255]);
    const FILL: Rgba<u8> = Rgba([10, 20, 30, 255]);

    fn agent(size: Size, tile_size: u32) -> LayerImageAgent {
        LayerImageAgent::with_size(Uuid::new_v4(), size, EngineConfig::default().with_tile_size(tile_size)).unwrap()
    }

    fn flush(agent: &mut LayerImageAgent) -> Option<Patch> {
        let mut sink: Vec<Box<dyn Command>> = Vec::new();
        agent.register_to_history(&mut sink, "test");
        sink.pop().and_then(|cmd| cmd.patch().cloned())
    }

    #[test]
    fn scenario_two_pixels_in_one_tile() {
        let mut agent = agent(Size::new(4, 4), 4);
        agent.set_pixel(Point::new(0, 0), RED, false).unwrap();
        agent.set_pixel(Point::new(1, 0), GREEN, false).unwrap();
        assert!(!agent.tile_manager().tile(TileIndex::new(0, 0)).unwrap().is_uniform);

        let patch = flush(&mut agent).unwrap();
        assert_eq!(patch.pixel_count(), 2);
        assert_eq!(patch.pixels.as_ref().unwrap().len(), 1);

        agent.undo_patch(&patch);
        assert_eq!(agent.get_pixel(Point::new(0, 0)), TRANSPARENT);
        assert_eq!(agent.get_pixel(Point::new(1, 0)), TRANSPARENT);

        agent.redo_patch(&patch);
        assert_eq!(agent.get_pixel(Point::new(0, 0)), RED);
        assert_eq!(agent.get_pixel(Point::new(1, 0)), GREEN);
    }

    #[test]
    fn scenario_fill_whole_tile_is_uniform() {
        let mut agent = agent(Size::new(4, 4), 4);
        assert!(agent.fill_tile(TileIndex::new(0, 0), FILL));
        let tile = agent.tile_manager().tile(TileIndex::new(0, 0)).unwrap();
        assert!(tile.is_uniform);
        assert_eq!(tile.uniform_color, Some(FILL));
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(agent.get_pixel(Point::new(x, y)), FILL);
            }
        }
        // Same color again is a no-op.
        assert!(!agent.fill_tile(TileIndex::new(0, 0), FILL));
    }

    #[test]
    fn write_into_uniform_tile_breaks_uniformity() {
        let mut agent = agent(Size::new(8, 8), 4);
        agent.fill_tile(TileIndex::new(1, 1), FILL);
        agent.set_pixel(Point::new(5, 5), FILL, false);
        assert!(agent.tile_manager().tile(TileIndex::new(1, 1)).unwrap().is_uniform);
        agent.set_pixel(Point::new(6, 6), RED, false);
        let tile = agent.tile_manager().tile(TileIndex::new(1, 1)).unwrap();
        assert!(!tile.is_uniform);
        assert_eq!(tile.uniform_color, None);
    }

    #[test]
    fn revisit_is_skipped_unless_requested() {
        let mut agent = agent(Size::new(4, 4), 4);
        let pos = Point::new(2, 2);
        assert!(agent.set_pixel(pos, RED, false).is_some());
        assert!(agent.set_pixel(pos, GREEN, false).is_none());
        assert_eq!(agent.get_pixel(pos), RED);
        let write = agent.set_pixel(pos, BLUE, true).unwrap();
        assert_eq!(write.before, RED);

        let patch = flush(&mut agent).unwrap();
        let list = &patch.pixels.as_ref().unwrap()[0];
        assert_eq!(list.before, vec![0]);
        assert_eq!(unpack_rgba(list.after[0]), BLUE);
    }

    #[test]
    fn pixel_after_fill_lands_the_same_at_any_threshold() {
        // (mixed tile before the fill, threshold)
        for (mixed, threshold) in [(false, 10_000), (false, 1), (true, 10_000), (true, 1)] {
            let config = EngineConfig::default().with_tile_size(4).with_whole_buffer_threshold(threshold);
            let mut agent = LayerImageAgent::with_size(Uuid::new_v4(), Size::new(8, 8), config).unwrap();
            agent.set_pixel(Point::new(5, 5), RED, false);
            agent.set_pixel(Point::new(6, 6), RED, false);
            if mixed {
                agent.set_pixel(Point::new(0, 0), RED, false);
            }
            agent.fill_tile(TileIndex::new(0, 0), GREEN);
            assert!(agent.set_pixel(Point::new(1, 1), BLUE, false).is_some());
            assert_eq!(agent.get_pixel(Point::new(1, 1)), BLUE, "mixed={mixed} threshold={threshold}");
            assert_eq!(agent.get_pixel(Point::new(0, 0)), GREEN);

            // The tool's own pixel is still protected.
            assert!(agent.set_pixel(Point::new(5, 5), GREEN, false).is_none());
            assert_eq!(agent.get_pixel(Point::new(5, 5)), RED);

            let edited = agent.buffer().to_vec();
            let patch = flush(&mut agent).unwrap();
            agent.undo_patch(&patch);
            assert!(agent.buffer().iter().all(|b| *b == 0));
            agent.redo_patch(&patch);
            assert_eq!(agent.buffer(), &edited[..]);
        }
    }

    #[test]
    fn pixel_list_outside_the_grid_is_skipped() {
        let mut agent = agent(Size::new(8, 8), 4);
        agent.set_pixel(Point::new(1, 1), RED, false);
        let mut patch = flush(&mut agent).unwrap();
        patch.pixels.as_mut().unwrap().push(PixelListPatch {
            tile: TileIndex::new(0, 200_000_000),
            idx: vec![0, 1],
            before: vec![0, 0],
            after: vec![0, 0],
        });
        patch.pixels.as_mut().unwrap().push(PixelListPatch {
            tile: TileIndex::new(1, 1),
            idx: vec![u16::MAX],
            before: vec![0],
            after: vec![0],
        });

        agent.undo_patch(&patch);
        assert_eq!(agent.get_pixel(Point::new(1, 1)), TRANSPARENT);
        agent.redo_patch(&patch);
        assert_eq!(agent.get_pixel(Point::new(1, 1)), RED);
        assert_eq!(agent.buffer().chunks_exact(4).filter(|px| px[3] != 0).count(), 1);
    }

    #[test]
    fn out_of_bounds_write_is_a_silent_noop() {
        let mut agent = agent(Size::new(4, 4), 4);
        assert!(agent.set_pixel(Point::new(-1, 0), RED, false).is_none());
        assert!(agent.set_pixel(Point::new(4, 0), RED, false).is_none());
        assert!(flush(&mut agent).is_none());
        assert!(!agent.is_modified());
    }

    #[test]
    fn fill_then_pixel_undoes_exactly() {
        let mut agent = agent(Size::new(8, 8), 4);
        agent.fill_tile(TileIndex::new(0, 0), RED);
        flush(&mut agent);
        let before = agent.buffer().to_vec();

        agent.fill_tile(TileIndex::new(0, 0), GREEN);
        agent.set_pixel(Point::new(1, 1), BLUE, false);
        let after = agent.buffer().to_vec();
        let patch = flush(&mut agent).unwrap();

        agent.undo_patch(&patch);
        assert_eq!(agent.buffer(), &before[..]);
        agent.redo_patch(&patch);
        assert_eq!(agent.buffer(), &after[..]);
    }

    #[test]
    fn fill_over_mixed_tile_restores_every_pixel() {
        let mut agent = agent(Size::new(6, 6), 4);
        agent.set_pixel(Point::new(0, 0), RED, false);
        agent.set_pixel(Point::new(3, 2), GREEN, false);
        flush(&mut agent);
        let before = agent.buffer().to_vec();

        agent.fill_tile(TileIndex::new(0, 0), BLUE);
        let patch = flush(&mut agent).unwrap();
        assert_eq!(patch.tiles.as_ref().unwrap()[0].before, None);

        agent.undo_patch(&patch);
        assert_eq!(agent.buffer(), &before[..]);
        assert!(!agent.tile_manager().tile(TileIndex::new(0, 0)).unwrap().is_uniform);
    }

    #[test]
    fn undo_and_redo_queue_render_events() {
        let mut agent = agent(Size::new(4, 4), 4);
        agent.set_pixel(Point::new(0, 0), RED, false);
        let patch = flush(&mut agent).unwrap();
        agent.drain_events();
        agent.tile_manager_mut().reset_dirty_states();

        agent.undo_patch(&patch);
        let events = agent.drain_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], LayerEvent::RequestUpdate { only_dirty: true, .. }));
        assert!(matches!(events[1], LayerEvent::PreviewUpdate { .. }));
        assert_eq!(agent.tile_manager().dirty_tiles(), vec![TileIndex::new(0, 0)]);
        assert_eq!(agent.dirty_rects(), vec![PixelRect::from_size(Size::new(4, 4))]);
    }

    #[test]
    fn set_buffer_checks_length_and_rescans() {
        let mut agent = agent(Size::new(2, 2), 4);
        assert!(agent.set_buffer(vec![0; 3], false, false).is_err());

        let mut data = Vec::new();
        for _ in 0..4 {
            data.extend_from_slice(&RED.0);
        }
        agent.set_buffer(data, true, false).unwrap();
        assert!(agent.drain_events().is_empty());
        let tile = agent.tile_manager().tile(TileIndex::new(0, 0)).unwrap();
        assert!(tile.is_dirty);
        assert_eq!(tile.uniform_color, Some(RED));
    }

    #[test]
    fn resize_keeps_buffer_and_grid_in_step() {
        let mut agent = agent(Size::new(4, 4), 4);
        agent.set_pixel(Point::new(0, 0), RED, false);
        flush(&mut agent);
        agent.change_buffer_size(Size::new(10, 6), true, Point::new(5, 5), Point::ORIGIN);
        assert_eq!(agent.size(), Size::new(10, 6));
        assert_eq!(agent.tile_manager().column_count(), 3);
        assert_eq!(agent.tile_manager().row_count(), 2);
        assert_eq!(agent.get_pixel(Point::new(5, 5)), RED);
        assert_eq!(agent.tile_manager().dirty_tile_count(), 6);
        assert_eq!(agent.drain_events().len(), 2);
    }

    #[test]
    fn stale_entries_are_skipped_after_shrink() {
        let mut agent = agent(Size::new(8, 8), 4);
        agent.set_pixel(Point::new(1, 1), RED, false);
        agent.set_pixel(Point::new(6, 6), GREEN, false);
        agent.fill_tile(TileIndex::new(1, 0), BLUE);
        let patch = flush(&mut agent).unwrap();

        agent.change_buffer_size(Size::new(4, 4), false, Point::ORIGIN, Point::ORIGIN);
        agent.undo_patch(&patch);
        assert_eq!(agent.get_pixel(Point::new(1, 1)), TRANSPARENT);
        agent.redo_patch(&patch);
        assert_eq!(agent.get_pixel(Point::new(1, 1)), RED);
        assert_eq!(agent.size(), Size::new(4, 4));
    }

    #[test]
    fn replace_whole_round_trips_across_sizes() {
        let mut agent = agent(Size::new(4, 4), 4);
        agent.set_pixel(Point::new(0, 0), RED, false);
        flush(&mut agent);
        let before = agent.buffer().to_vec();

        agent.replace_whole(PixelBuffer::new_filled(Size::new(6, 2), BLUE));
        let patch = flush(&mut agent).unwrap();
        assert!(matches!(patch.whole, Some(WholePatch::Full { .. })));

        agent.undo_patch(&patch);
        assert_eq!(agent.size(), Size::new(4, 4));
        assert_eq!(agent.buffer(), &before[..]);
        agent.redo_patch(&patch);
        assert_eq!(agent.size(), Size::new(6, 2));
        assert_eq!(agent.tile_manager().column_count(), 2);
        assert_eq!(agent.tile_manager().tile(TileIndex::new(0, 0)).unwrap().uniform_color, Some(BLUE));
    }
}
