//! Upstream emulator interface
//!
//! The visualizer only reads from the emulator. [`DemoEmulator`] is a
//! register playback source for running without a real emulator.

use crate::chip::{ApuState, CpuState};

/// Read-only view of a running emulator
pub trait EmulatorSource {
    fn cpu_state(&self) -> CpuState;
    fn apu_state(&self) -> ApuState;
    /// Byte at `addr` in the CPU address space (RAM or cartridge ROM)
    fn read_byte(&self, addr: u16) -> u8;
    fn is_running(&self) -> bool;
    /// True once a program has been loaded
    fn is_loaded(&self) -> bool;
}

/// Entry point of the demo program
pub const DEMO_ENTRY: u16 = 0x8000;

/// Counting loop: `INX; INY; TXA; ADC #$01; JMP $8000`
const DEMO_PROGRAM: [u8; 8] = [0xE8, 0xC8, 0x8A, 0x69, 0x01, 0x4C, 0x00, 0x80];

/// Plays back the registers of a small counting loop.
///
/// This is not a 6502 core: each [`tick`](DemoEmulator::tick) moves to the
/// next instruction of a fixed program and applies its effect on the
/// registers it touches.
#[derive(Debug, Clone)]
pub struct DemoEmulator {
    cpu: CpuState,
    apu: ApuState,
    memory: Box<[u8; 0x10000]>,
    running: bool,
    frame: u32,
}

impl DemoEmulator {
    pub fn new() -> Self {
        let mut memory = Box::new([0_u8; 0x10000]);
        let entry = usize::from(DEMO_ENTRY);
        memory[entry..entry + DEMO_PROGRAM.len()].copy_from_slice(&DEMO_PROGRAM);
        // Reset vector
        memory[0xFFFC] = (DEMO_ENTRY & 0xFF) as u8;
        memory[0xFFFD] = (DEMO_ENTRY >> 8) as u8;

        Self {
            cpu: CpuState {
                sp: 0xFD,
                p: 0x24,
                pc: DEMO_ENTRY,
                addr: DEMO_ENTRY,
                rw: true,
                ..Default::default()
            },
            apu: ApuState::default(),
            memory,
            running: true,
            frame: 0,
        }
    }

    pub fn set_running(&mut self, running: bool) {
        self.running = running;
    }

    /// Execute one instruction of the demo loop and update the audio outputs
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }

        let cpu = &mut self.cpu;
        let opcode = self.memory[usize::from(cpu.pc)];
        match opcode {
            0xE8 => {
                cpu.x = cpu.x.wrapping_add(1);
                cpu.pc = cpu.pc.wrapping_add(1);
            }
            0xC8 => {
                cpu.y = cpu.y.wrapping_add(1);
                cpu.pc = cpu.pc.wrapping_add(1);
            }
            0x8A => {
                cpu.a = cpu.x;
                cpu.pc = cpu.pc.wrapping_add(1);
            }
            0x69 => {
                let operand = self.memory[usize::from(cpu.pc.wrapping_add(1))];
                let carry = cpu.p & 0x01;
                let (sum, overflow) = cpu.a.overflowing_add(operand.wrapping_add(carry));
                cpu.a = sum;
                cpu.p = (cpu.p & !0x01) | u8::from(overflow);
                cpu.data = operand;
                cpu.pc = cpu.pc.wrapping_add(2);
            }
            0x4C => {
                let lo = self.memory[usize::from(cpu.pc.wrapping_add(1))];
                let hi = self.memory[usize::from(cpu.pc.wrapping_add(2))];
                cpu.pc = u16::from_le_bytes([lo, hi]);
            }
            _ => cpu.pc = DEMO_ENTRY,
        }
        cpu.addr = cpu.pc;

        // Zero and negative flags follow the accumulator
        let zero = if cpu.a == 0 { 0x02 } else { 0 };
        cpu.p = (cpu.p & !0x82) | zero | (cpu.a & 0x80);

        self.frame = self.frame.wrapping_add(1);
        self.apu = ApuState {
            sq0_out: (self.frame % 16) as u8,
            sq1_out: ((self.frame / 2) % 16) as u8,
            tri_out: (15 - (self.frame % 16)) as u8,
            noi_out: (self.frame.wrapping_mul(7) % 16) as u8,
            pcm_out: ((self.frame / 4) % 128) as u8,
        };
    }
}

impl Default for DemoEmulator {
    fn default() -> Self {
        Self::new()
    }
}

impl EmulatorSource for DemoEmulator {
    fn cpu_state(&self) -> CpuState {
        self.cpu
    }

    fn apu_state(&self) -> ApuState {
        self.apu
    }

    fn read_byte(&self, addr: u16) -> u8 {
        self.memory[usize::from(addr)]
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn is_loaded(&self) -> bool {
        true
    }
}
