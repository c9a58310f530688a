use crate::raster::{LayerId, Patch};
use crate::registry::LayerAgentRegistry;
use crate::log_warn;

// ============================================================================
// COMMAND TRAIT
// ============================================================================

/// A reversible action as seen by the project history stack.
///
/// The stack owns ordering and grouping; a command only knows how to put the
/// layers it touched back into their before/after state.
pub trait Command: Send + Sync {
    fn undo(&self, layers: &mut LayerAgentRegistry);
    fn redo(&self, layers: &mut LayerAgentRegistry);
    fn description(&self) -> String;
    fn memory_size(&self) -> usize;

    /// The layer patch behind this command, if it has one.
    fn patch(&self) -> Option<&Patch> {
        None
    }
}

/// Push-one-action interface of the external history stack.
pub trait HistorySink {
    fn push(&mut self, command: Box<dyn Command>);
}

impl HistorySink for Vec<Box<dyn Command>> {
    fn push(&mut self, command: Box<dyn Command>) {
        Vec::push(self, command);
    }
}

// ============================================================================
// LAYER BUFFER ACTION: replays one Patch against its layer
// ============================================================================

pub struct LayerBufferHistoryAction {
    patch: Patch,
    context: String,
}

impl LayerBufferHistoryAction {
    pub fn new(patch: Patch, context: impl Into<String>) -> Self {
        Self { patch, context: context.into() }
    }

    pub fn layer_id(&self) -> LayerId {
        self.patch.layer_id
    }

    pub fn context(&self) -> &str {
        &self.context
    }
}

impl Command for LayerBufferHistoryAction {
    fn undo(&self, layers: &mut LayerAgentRegistry) {
        match layers.get_mut(self.patch.layer_id) {
            Some(agent) => agent.undo_patch(&self.patch),
            None => log_warn!("undo: no agent found for layer {}", self.patch.layer_id),
        }
    }

    fn redo(&self, layers: &mut LayerAgentRegistry) {
        match layers.get_mut(self.patch.layer_id) {
            Some(agent) => agent.redo_patch(&self.patch),
            None => log_warn!("redo: no agent found for layer {}", self.patch.layer_id),
        }
    }

    fn description(&self) -> String {
        if self.context.is_empty() {
            format!("Layer {}: buffer", self.patch.layer_id)
        } else {
            format!("Layer {}: {}", self.patch.layer_id, self.context)
        }
    }

    fn memory_size(&self) -> usize {
        self.patch.memory_size() + self.context.len()
    }

    fn patch(&self) -> Option<&Patch> {
        Some(&self.patch)
    }
}
