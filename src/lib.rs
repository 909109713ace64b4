//! chipvis - real-time 2A03 die visualizer
//!
//! Lights up the transistor-level layout of the NES CPU/APU from emulator
//! register state, optionally refined by a switch-level simulation.

pub mod chip;
pub mod config;
pub mod constants;
pub mod emulator;
pub mod gpu;
pub mod palette;
pub mod sim;
pub mod ui;
pub mod view;
pub mod visualizer;

pub use config::VisualizerConfig;
pub use emulator::{DemoEmulator, EmulatorSource};
pub use visualizer::Visualizer;
