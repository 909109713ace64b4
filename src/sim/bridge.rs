//! Keeps a transistor simulation in step with emulator register state
//!
//! Every operation is a no-op while no simulator instance exists, so the
//! visualizer can always fall back to plain register projection.

use super::{SimFactory, TransistorSim};
use crate::chip::{CpuGroups, CpuState, NodeGroup, NodeStateBuffer};
use crate::constants::{
    INSTRUCTION_WINDOW_BYTES, NODE_ACTIVE, NODE_INACTIVE, RESERVED_STATUS_BIT,
    STABILIZE_HALF_CYCLES,
};

/// Owner of the single live simulator instance
pub struct SimulationBridge {
    factory: Option<SimFactory>,
    sim: Option<Box<dyn TransistorSim>>,
}

impl SimulationBridge {
    pub fn new(factory: SimFactory) -> Self {
        Self {
            factory: Some(factory),
            sim: None,
        }
    }

    /// Bridge with no simulator available; every call is a no-op
    pub fn disabled() -> Self {
        Self {
            factory: None,
            sim: None,
        }
    }

    pub fn has_simulator(&self) -> bool {
        self.sim.is_some()
    }

    /// Create the simulator and let it settle. Does nothing if one exists.
    pub fn init_simulation(&mut self) {
        if self.sim.is_some() {
            return;
        }
        let Some(factory) = self.factory.as_ref() else {
            return;
        };

        match factory() {
            Some(mut sim) => {
                for _ in 0..STABILIZE_HALF_CYCLES {
                    sim.step();
                }
                log::info!("Transistor simulation created");
                self.sim = Some(sim);
            }
            None => log::warn!("Transistor simulation could not be created"),
        }
    }

    pub fn shutdown_simulation(&mut self) {
        if self.sim.take().is_some() {
            log::info!("Transistor simulation destroyed");
        }
    }

    /// Destroy and recreate the simulator, discarding all simulated state
    pub fn reset_simulation(&mut self) {
        log::debug!("Resetting transistor simulation");
        self.shutdown_simulation();
        self.init_simulation();
    }

    /// Force the simulated register nodes to the given CPU state
    pub fn sync_from_registers(&mut self, groups: &CpuGroups, cpu: &CpuState) {
        let Some(sim) = self.sim.as_deref_mut() else {
            return;
        };

        force_bits(sim, &groups.a, cpu.a.into(), None);
        force_bits(sim, &groups.x, cpu.x.into(), None);
        force_bits(sim, &groups.y, cpu.y.into(), None);
        force_bits(sim, &groups.sp, cpu.sp.into(), None);
        force_bits(sim, &groups.p, cpu.p.into(), Some(RESERVED_STATUS_BIT));
        force_bits(sim, &groups.pcl, cpu.pcl().into(), None);
        force_bits(sim, &groups.pch, cpu.pch().into(), None);
        force_bits(sim, &groups.ab, cpu.addr.into(), None);
    }

    /// Copy the bytes following `pc` into simulated memory.
    ///
    /// Covers up to three maximum-length instructions. Positions past the
    /// end of the 16-bit address space wrap around and are filled with zero
    /// instead of being read.
    pub fn feed_instruction_window(&mut self, pc: u16, read_byte: impl Fn(u16) -> u8) {
        let Some(sim) = self.sim.as_deref_mut() else {
            return;
        };

        for i in 0..INSTRUCTION_WINDOW_BYTES {
            let (addr, wrapped) = pc.overflowing_add(i as u16);
            let value = if wrapped { 0 } else { read_byte(addr) };
            sim.write_memory(addr, value);
        }
    }

    pub fn advance(&mut self, half_cycles: u32) {
        let Some(sim) = self.sim.as_deref_mut() else {
            return;
        };
        for _ in 0..half_cycles {
            sim.step();
        }
    }

    /// Overwrite the whole buffer with the simulated node levels
    pub fn read_back_node_states(&self, buffer: &mut NodeStateBuffer) {
        if let Some(sim) = self.sim.as_deref() {
            sim.read_node_states(NODE_ACTIVE, NODE_INACTIVE, buffer.as_bytes_mut());
        }
    }
}

fn force_bits<const N: usize>(
    sim: &mut dyn TransistorSim,
    group: &NodeGroup<N>,
    value: u32,
    skip_bit: Option<usize>,
) {
    for (bit, node) in group.iter() {
        if Some(bit) == skip_bit || bit >= 32 {
            continue;
        }
        sim.write_node(node, value & (1 << bit) != 0);
    }
}
