//! Projection of register values onto node intensities
//!
//! This only touches the display buffer; forcing values into the
//! transistor simulation is done by [`crate::sim::SimulationBridge`].

use super::registry::{ApuGroups, CpuGroups, NodeGroup};
use super::state::{Intensity, NodeStateBuffer};

/// Register snapshot of the CPU core
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CpuState {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub p: u8,
    pub pc: u16,
    /// Current address bus
    pub addr: u16,
    /// Current data bus
    pub data: u8,
    /// True while reading
    pub rw: bool,
}

impl CpuState {
    pub fn pcl(&self) -> u8 {
        (self.pc & 0xFF) as u8
    }

    pub fn pch(&self) -> u8 {
        (self.pc >> 8) as u8
    }
}

/// Output levels of the audio channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ApuState {
    pub sq0_out: u8,
    pub sq1_out: u8,
    pub tri_out: u8,
    pub noi_out: u8,
    pub pcm_out: u8,
}

/// Write the low `bit_count` bits of `value` into the group's nodes
pub fn project_bits<const N: usize>(
    buffer: &mut NodeStateBuffer,
    group: &NodeGroup<N>,
    bit_count: usize,
    value: u32,
) {
    let bit_count = bit_count.min(N).min(32);
    for (bit, node) in group.iter().take_while(|&(bit, _)| bit < bit_count) {
        buffer.set(node as usize, Intensity::from_level(value & (1 << bit) != 0));
    }
}

/// Project the CPU registers.
///
/// With `include_data_bus` false the data bus nodes are left alone, which
/// is what the emulator path wants since it has no data bus value.
pub fn project_cpu(
    buffer: &mut NodeStateBuffer,
    groups: &CpuGroups,
    cpu: &CpuState,
    include_data_bus: bool,
) {
    project_bits(buffer, &groups.a, 8, cpu.a.into());
    project_bits(buffer, &groups.x, 8, cpu.x.into());
    project_bits(buffer, &groups.y, 8, cpu.y.into());
    project_bits(buffer, &groups.sp, 8, cpu.sp.into());
    project_bits(buffer, &groups.p, 8, cpu.p.into());
    project_bits(buffer, &groups.pcl, 8, cpu.pcl().into());
    project_bits(buffer, &groups.pch, 8, cpu.pch().into());
    if include_data_bus {
        project_bits(buffer, &groups.db, 8, cpu.data.into());
    }
    project_bits(buffer, &groups.ab, 16, cpu.addr.into());
}

pub fn project_apu(buffer: &mut NodeStateBuffer, groups: &ApuGroups, apu: &ApuState) {
    project_bits(buffer, &groups.sq0, 4, apu.sq0_out.into());
    project_bits(buffer, &groups.sq1, 4, apu.sq1_out.into());
    project_bits(buffer, &groups.tri, 4, apu.tri_out.into());
    project_bits(buffer, &groups.noi, 4, apu.noi_out.into());
    project_bits(buffer, &groups.pcm, 7, apu.pcm_out.into());
}
