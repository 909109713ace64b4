//! GPU rendering of the die layers
//!
//! - [`backend`] - the [`GpuBackend`] seam and the shader uniform block
//! - [`renderer`] - per-layer drawing driven by the node state buffer
//! - [`wgpu_backend`] - wgpu implementation displayed through egui
//! - [`recording`] - backend that records calls, for headless use
//! - `shaders/` - WGSL source of the chip shader

pub mod backend;
pub mod recording;
pub mod renderer;
pub mod wgpu_backend;

pub use backend::{GpuBackend, RenderInitError, VsParams};
pub use recording::{GpuCall, RecordingBackend};
pub use renderer::{ChipRenderer, FrameParams};
pub use wgpu_backend::WgpuBackend;
