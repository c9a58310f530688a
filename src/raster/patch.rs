use serde::{Deserialize, Serialize};

use crate::color::PackedRgba;
use crate::error::RasterError;
use crate::geometry::{PixelRect, Size, TileIndex};
use crate::raster::LayerId;

// ============================================================================
// PATCH: immutable record of one operation's change to a layer buffer
// ============================================================================

/// Changed pixels of one tile, stored as parallel arrays.
///
/// `idx[i]` is the tile-local linear index `dy * tile_size + dx`, and
/// `before[i]` / `after[i]` its packed colors.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelListPatch {
    pub tile: TileIndex,
    pub idx: Vec<u16>,
    pub before: Vec<PackedRgba>,
    pub after: Vec<PackedRgba>,
}

/// A whole tile filled with one color.  `before` is the tile's previous
/// uniform color, or `None` when it held mixed content (in which case the
/// matching pixel list carries the old pixels).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileFillPatch {
    pub tile: TileIndex,
    pub before: Option<PackedRgba>,
    pub after: PackedRgba,
}

/// Complete buffer contents with their dimensions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferSnapshot {
    pub size: Size,
    pub data: Vec<u8>,
}

/// Whole-buffer capture.  Authoritative when present in a [`Patch`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum WholePatch {
    /// Entire buffers; sizes differ when the operation resized the layer.
    Full { before: BufferSnapshot, after: BufferSnapshot },
    /// Captures sliced to the operation's bounding box.
    Region { rect: PixelRect, before: Vec<u8>, after: Vec<u8> },
}

impl WholePatch {
    fn memory_size(&self) -> usize {
        match self {
            WholePatch::Full { before, after } => before.data.len() + after.data.len(),
            WholePatch::Region { before, after, .. } => before.len() + after.len(),
        }
    }
}

/// Reversible change to one layer's buffer, produced by
/// `DiffManager::build_patch` and replayed by `LayerImageAgent`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    pub layer_id: LayerId,
    pub pixels: Option<Vec<PixelListPatch>>,
    pub tiles: Option<Vec<TileFillPatch>>,
    pub whole: Option<WholePatch>,
}

/// Coarse classification used in log lines and history descriptions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PatchKind {
    Pixels,
    Tiles,
    Mixed,
    WholeRegion,
    WholeFull,
}

impl PatchKind {
    pub fn name(&self) -> &'static str {
        match self {
            PatchKind::Pixels => "pixels",
            PatchKind::Tiles => "tiles",
            PatchKind::Mixed => "tiles+pixels",
            PatchKind::WholeRegion => "whole (region)",
            PatchKind::WholeFull => "whole (full)",
        }
    }
}

impl Patch {
    pub fn kind(&self) -> PatchKind {
        match (&self.whole, &self.tiles, &self.pixels) {
            (Some(WholePatch::Full { .. }), _, _) => PatchKind::WholeFull,
            (Some(WholePatch::Region { .. }), _, _) => PatchKind::WholeRegion,
            (None, Some(_), Some(_)) => PatchKind::Mixed,
            (None, Some(_), None) => PatchKind::Tiles,
            _ => PatchKind::Pixels,
        }
    }

    /// Number of recorded per-pixel entries (zero for whole patches).
    pub fn pixel_count(&self) -> usize {
        self.pixels.as_ref().map_or(0, |lists| lists.iter().map(|p| p.idx.len()).sum())
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.as_ref().map_or(0, |t| t.len())
    }

    /// Approximate heap footprint in bytes, for history memory budgets.
    pub fn memory_size(&self) -> usize {
        let pixels = self.pixels.as_ref().map_or(0, |lists| {
            lists.iter().map(|p| p.idx.len() * 2 + p.before.len() * 4 + p.after.len() * 4).sum()
        });
        let tiles = self.tile_count() * std::mem::size_of::<TileFillPatch>();
        let whole = self.whole.as_ref().map_or(0, |w| w.memory_size());
        pixels + tiles + whole
    }

    /// Session-scoped binary encoding.  Not a stable on-disk format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, RasterError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RasterError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample() -> Patch {
        Patch {
            layer_id: Uuid::new_v4(),
            pixels: Some(vec![PixelListPatch {
                tile: TileIndex::new(0, 1),
                idx: vec![0, 5],
                before: vec![0, 0],
                after: vec![0xff00_00ff, 0xff00_ff00],
            }]),
            tiles: Some(vec![TileFillPatch { tile: TileIndex::new(1, 1), before: None, after: 0xff0a_141e }]),
            whole: None,
        }
    }

    #[test]
    fn classifies_and_counts() {
        let patch = sample();
        assert_eq!(patch.kind(), PatchKind::Mixed);
        assert_eq!(patch.pixel_count(), 2);
        assert_eq!(patch.tile_count(), 1);
        assert!(patch.memory_size() >= 2 * 2 + 2 * 8);
    }

    #[test]
    fn bincode_encoding_survives_decode() {
        let patch = sample();
        let bytes = patch.to_bytes().unwrap();
        assert_eq!(Patch::from_bytes(&bytes).unwrap(), patch);
        assert!(Patch::from_bytes(&bytes[..3]).is_err());
    }
}
