//! Per-node intensity buffer consumed by the renderer every frame

use crate::constants::{MAX_NODES, NODE_ACTIVE, NODE_HIGHLIGHTED, NODE_INACTIVE};

/// Visual brightness level of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Intensity {
    Inactive = NODE_INACTIVE,
    Active = NODE_ACTIVE,
    Highlighted = NODE_HIGHLIGHTED,
}

impl Intensity {
    pub fn from_level(high: bool) -> Self {
        if high {
            Intensity::Active
        } else {
            Intensity::Inactive
        }
    }
}

/// One intensity byte per node index, `MAX_NODES` entries
pub struct NodeStateBuffer {
    states: Box<[u8; MAX_NODES]>,
}

impl NodeStateBuffer {
    pub fn new() -> Self {
        Self {
            states: Box::new([NODE_INACTIVE; MAX_NODES]),
        }
    }

    /// Set every node to inactive
    pub fn reset(&mut self) {
        self.states.fill(NODE_INACTIVE);
    }

    /// Returns false without touching the buffer when the index is out of range
    pub fn set(&mut self, index: usize, intensity: Intensity) -> bool {
        match self.states.get_mut(index) {
            Some(state) => {
                *state = intensity as u8;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, index: usize) -> Option<u8> {
        self.states.get(index).copied()
    }

    pub fn highlight(&mut self, index: usize) -> bool {
        self.set(index, Intensity::Highlighted)
    }

    /// Drops the highlight along with all other node state.
    ///
    /// Every node goes back to inactive, including nodes that were active
    /// before; the next projection or read-back restores logical state.
    pub fn clear_highlight(&mut self) {
        self.reset();
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.states[..]
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.states[..]
    }

    pub fn count(&self, intensity: Intensity) -> usize {
        self.states
            .iter()
            .filter(|&&state| state == intensity as u8)
            .count()
    }
}

impl Default for NodeStateBuffer {
    fn default() -> Self {
        Self::new()
    }
}
