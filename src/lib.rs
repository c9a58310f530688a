// ============================================================================
// PixelForge: per-layer raster storage for a layered pixel-art editor
// ============================================================================
//
// Layout:
//   raster/     pixel buffers, tile index, diff accumulation, patches, agents
//   registry.rs LayerAgentRegistry: layer id -> agent lookup
//   history.rs  Command trait + LayerBufferHistoryAction (undo / redo)
//   config.rs   EngineConfig (tile size, whole-buffer threshold)
//   logger.rs   session log file and the log_* macros
//   cli.rs      headless inspector used by the binary
// ============================================================================

pub mod logger;

pub mod cli;
pub mod color;
pub mod config;
pub mod error;
pub mod geometry;
pub mod history;
pub mod raster;
pub mod registry;

pub use config::EngineConfig;
pub use error::RasterError;
pub use geometry::{PixelRect, Point, Size, TileIndex};
pub use history::{Command, HistorySink, LayerBufferHistoryAction};
pub use raster::{
    DiffManager, DiffState, LayerEvent, LayerId, LayerImageAgent, Patch, PatchKind, PixelAccess,
    PixelBuffer, TileManager,
};
pub use registry::LayerAgentRegistry;
