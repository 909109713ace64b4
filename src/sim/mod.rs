//! Transistor-level simulation
//!
//! The visualizer treats the simulator as a black box behind
//! [`TransistorSim`]. [`SimulationBridge`] owns at most one live instance
//! and keeps it loosely in step with the emulator's registers.
//! [`SwitchLevelSim`] is a netlist-driven implementation.

pub mod bridge;
pub mod netlist;
pub mod switch_level;

pub use bridge::SimulationBridge;
pub use netlist::{Netlist, NetlistPins};
pub use switch_level::{netlist_factory, SwitchLevelSim};

use crate::chip::NodeIndex;

/// A half-cycle stepped logic simulator.
///
/// Instances are created already reset by a [`SimFactory`]; dropping an
/// instance destroys it.
pub trait TransistorSim {
    /// Advance by one half clock cycle
    fn step(&mut self);

    /// Force a node high or low, recalculating everything connected to it
    fn write_node(&mut self, node: NodeIndex, high: bool);

    /// Store a byte in the simulator's addressable memory
    fn write_memory(&mut self, addr: u16, value: u8);

    /// Fill `out` with `active` for high nodes and `inactive` for low nodes.
    ///
    /// Entries past the simulator's node count are set to `inactive`.
    fn read_node_states(&self, active: u8, inactive: u8, out: &mut [u8]);
}

/// Creates a freshly reset simulator, or `None` when creation fails
pub type SimFactory = Box<dyn Fn() -> Option<Box<dyn TransistorSim>>>;
