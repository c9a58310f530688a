use serde::{Deserialize, Serialize};

use crate::error::RasterError;

/// Default edge length of a tile in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 32;

/// Largest tile edge whose local indices (`dy * size + dx`) still fit a `u16`.
pub const MAX_TILE_SIZE: u32 = 256;

/// Distinct pixels one operation may touch before the diff switches to a
/// whole-buffer capture.
pub const DEFAULT_WHOLE_BUFFER_THRESHOLD: usize = 10_000;

/// Per-layer engine tuning.  Shared by every agent created in a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tile_size: u32,
    pub whole_buffer_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            whole_buffer_threshold: DEFAULT_WHOLE_BUFFER_THRESHOLD,
        }
    }
}

impl EngineConfig {
    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_whole_buffer_threshold(mut self, threshold: usize) -> Self {
        self.whole_buffer_threshold = threshold;
        self
    }

    pub fn validate(&self) -> Result<(), RasterError> {
        if self.tile_size == 0 || self.tile_size > MAX_TILE_SIZE {
            return Err(RasterError::InvalidConfig(format!(
                "tile_size must be within 1..={}, got {}",
                MAX_TILE_SIZE, self.tile_size
            )));
        }
        if self.whole_buffer_threshold == 0 {
            return Err(RasterError::InvalidConfig(
                "whole_buffer_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
