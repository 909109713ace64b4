//! Chip topology and node state
//!
//! - [`data`] - the static die dataset (names, groups, layer geometry)
//! - [`registry`] - name lookup and pre-resolved register groups
//! - [`state`] - the per-node intensity buffer
//! - [`projector`] - register values to node intensities
//! - [`demo`] - a synthetic die for running without a real dataset

pub mod data;
pub mod demo;
pub mod projector;
pub mod registry;
pub mod state;

pub use data::{ChipData, LayerGeometry, NodeIndex, SegBounds, SegVertex};
pub use projector::{project_apu, project_bits, project_cpu, ApuState, CpuState};
pub use registry::{ApuGroups, CpuGroups, NodeGroup, NodeRegistry};
pub use state::{Intensity, NodeStateBuffer};
