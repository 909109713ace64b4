//! Graphics backend seam used by the chip renderer

use crate::chip::SegVertex;
use crate::palette::BlendMode;

/// Uniform block of the chip shader
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct VsParams {
    /// Half the die extent in normalized position units
    pub half_size: [f32; 2],
    /// Pan offset
    pub offset: [f32; 2],
    /// Zoom per axis, with the aspect ratio folded into x
    pub scale: [f32; 2],
    pub _pad: [f32; 2],
    /// Layer color
    pub color0: [f32; 4],
}

/// Why the renderer could not be initialized
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderInitError {
    /// The active graphics backend cannot run the chip shader
    #[error("graphics backend {backend} is not supported by the chip renderer")]
    UnsupportedBackend { backend: String },
    /// A buffer, texture or pipeline could not be created
    #[error("failed to create {what}")]
    ResourceCreation { what: String },
}

/// Create/bind/draw operations the renderer needs from a graphics API.
///
/// Resources are owned values released when dropped. Draw state is set per
/// pass in the order pipeline, bindings, uniforms, draw.
pub trait GpuBackend {
    type Buffer;
    type Texture;
    type Pipeline;

    fn backend_name(&self) -> &str;

    /// Upload immutable layer geometry; `None` when there is nothing to upload
    fn create_vertex_buffer(&mut self, label: &str, vertices: &[SegVertex]) -> Option<Self::Buffer>;

    /// One intensity byte per texel
    fn create_node_texture(&mut self, width: u32, height: u32) -> Option<Self::Texture>;

    fn create_pipeline(&mut self, blend: BlendMode) -> Result<Self::Pipeline, RenderInitError>;

    fn update_node_texture(&mut self, texture: &Self::Texture, data: &[u8]);

    fn begin_pass(&mut self, width: u32, height: u32, clear: [f32; 4]);
    fn apply_pipeline(&mut self, pipeline: &Self::Pipeline);
    fn apply_bindings(&mut self, vertices: &Self::Buffer, nodes: &Self::Texture);
    fn apply_uniforms(&mut self, params: &VsParams);
    fn draw(&mut self, base_element: u32, num_elements: u32, num_instances: u32);
    fn end_pass(&mut self);
}
