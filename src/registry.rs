use std::collections::HashMap;

use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::RasterError;
use crate::geometry::{Point, Size};
use crate::raster::{LayerId, LayerImageAgent, PixelBuffer};

/// Every live layer agent of a session, keyed by layer id.
///
/// Owned by the session and passed to whoever needs to reach a layer
/// (history commands, the renderer).
#[derive(Debug, Default)]
pub struct LayerAgentRegistry {
    config: EngineConfig,
    agents: HashMap<LayerId, LayerImageAgent>,
}

impl LayerAgentRegistry {
    pub fn new(config: EngineConfig) -> Self {
        Self { config, agents: HashMap::new() }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Create (or replace) the agent for `layer_id` over `buffer`.
    pub fn register_agent(&mut self, layer_id: LayerId, buffer: PixelBuffer) -> Result<&mut LayerImageAgent, RasterError> {
        let agent = LayerImageAgent::new(layer_id, buffer, self.config)?;
        Ok(self.agents.entry(layer_id).insert_entry(agent).into_mut())
    }

    /// New transparent layer with a fresh id.
    pub fn create_layer(&mut self, size: Size) -> Result<LayerId, RasterError> {
        let id = Uuid::new_v4();
        self.register_agent(id, PixelBuffer::new(size))?;
        Ok(id)
    }

    pub fn get(&self, layer_id: LayerId) -> Option<&LayerImageAgent> {
        self.agents.get(&layer_id)
    }

    pub fn get_mut(&mut self, layer_id: LayerId) -> Option<&mut LayerImageAgent> {
        self.agents.get_mut(&layer_id)
    }

    pub fn remove(&mut self, layer_id: LayerId) -> Option<LayerImageAgent> {
        self.agents.remove(&layer_id)
    }

    pub fn contains(&self, layer_id: LayerId) -> bool {
        self.agents.contains_key(&layer_id)
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = LayerId> + '_ {
        self.agents.keys().copied()
    }

    /// Resize every layer the same way (canvas resize).
    pub fn resize_all(&mut self, new_size: Size, dest_origin: Point, src_origin: Point) {
        for agent in self.agents.values_mut() {
            agent.change_buffer_size(new_size, true, dest_origin, src_origin);
        }
    }
}
