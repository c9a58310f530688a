// ============================================================================
// RASTER MODULE: per-layer pixel storage, tile index, diffs and patches
// ============================================================================
//
// Architecture:
//   buffer.rs PixelBuffer (RGBA8 bytes) + the PixelAccess seam
//   tile.rs   TileManager: fixed-size grid with dirty / uniform flags
//   diff.rs   DiffManager: per-operation accumulation, whole-buffer fallback
//   patch.rs  immutable Patch records replayed by undo/redo
//   agent.rs  LayerImageAgent: the one entry point that ties them together
// ============================================================================

pub mod agent;
pub mod buffer;
pub mod diff;
pub mod patch;
pub mod tile;

pub use agent::{LayerEvent, LayerImageAgent};
pub use buffer::{PixelAccess, PixelBuffer, PixelWrite};
pub use diff::{DiffManager, DiffState};
pub use patch::{BufferSnapshot, Patch, PatchKind, PixelListPatch, TileFillPatch, WholePatch};
pub use tile::{Tile, TileManager};

/// Identifies a layer for the lifetime of a session.
pub type LayerId = uuid::Uuid;
