//! Backend that records calls instead of drawing
//!
//! Used for headless runs and to check what the renderer submits.

use super::backend::{GpuBackend, RenderInitError, VsParams};
use crate::chip::SegVertex;
use crate::palette::BlendMode;

#[derive(Debug, Clone, PartialEq)]
pub enum GpuCall {
    CreateVertexBuffer { id: u32, label: String, vertices: usize },
    CreateNodeTexture { id: u32, width: u32, height: u32 },
    CreatePipeline(BlendMode),
    UpdateNodeTexture { id: u32, bytes: usize },
    BeginPass { width: u32, height: u32, clear: [f32; 4] },
    ApplyPipeline(BlendMode),
    ApplyBindings { buffer: u32, texture: u32 },
    ApplyUniforms(VsParams),
    Draw { base: u32, count: u32, instances: u32 },
    EndPass,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedBuffer {
    pub id: u32,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTexture {
    pub id: u32,
}

#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub calls: Vec<GpuCall>,
    /// Contents of the most recent node texture upload
    pub node_texture: Vec<u8>,
    /// When set, pipeline creation fails like an unsupported backend would
    pub reject_pipelines: bool,
    next_id: u32,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rejecting_pipelines() -> Self {
        Self {
            reject_pipelines: true,
            ..Self::default()
        }
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    pub fn draw_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|call| matches!(call, GpuCall::Draw { .. }))
            .count()
    }

    /// Ids of the vertex buffers bound since the calls were last cleared
    pub fn bound_buffers(&self) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                GpuCall::ApplyBindings { buffer, .. } => Some(*buffer),
                _ => None,
            })
            .collect()
    }

    fn allocate_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl GpuBackend for RecordingBackend {
    type Buffer = RecordedBuffer;
    type Texture = RecordedTexture;
    type Pipeline = BlendMode;

    fn backend_name(&self) -> &str {
        "recording"
    }

    fn create_vertex_buffer(&mut self, label: &str, vertices: &[SegVertex]) -> Option<RecordedBuffer> {
        if vertices.is_empty() {
            return None;
        }
        let id = self.allocate_id();
        self.calls.push(GpuCall::CreateVertexBuffer {
            id,
            label: label.to_string(),
            vertices: vertices.len(),
        });
        Some(RecordedBuffer {
            id,
            label: label.to_string(),
        })
    }

    fn create_node_texture(&mut self, width: u32, height: u32) -> Option<RecordedTexture> {
        let id = self.allocate_id();
        self.calls.push(GpuCall::CreateNodeTexture { id, width, height });
        Some(RecordedTexture { id })
    }

    fn create_pipeline(&mut self, blend: BlendMode) -> Result<BlendMode, RenderInitError> {
        if self.reject_pipelines {
            return Err(RenderInitError::UnsupportedBackend {
                backend: self.backend_name().to_string(),
            });
        }
        self.calls.push(GpuCall::CreatePipeline(blend));
        Ok(blend)
    }

    fn update_node_texture(&mut self, texture: &RecordedTexture, data: &[u8]) {
        self.calls.push(GpuCall::UpdateNodeTexture {
            id: texture.id,
            bytes: data.len(),
        });
        self.node_texture = data.to_vec();
    }

    fn begin_pass(&mut self, width: u32, height: u32, clear: [f32; 4]) {
        self.calls.push(GpuCall::BeginPass { width, height, clear });
    }

    fn apply_pipeline(&mut self, pipeline: &BlendMode) {
        self.calls.push(GpuCall::ApplyPipeline(*pipeline));
    }

    fn apply_bindings(&mut self, vertices: &RecordedBuffer, nodes: &RecordedTexture) {
        self.calls.push(GpuCall::ApplyBindings {
            buffer: vertices.id,
            texture: nodes.id,
        });
    }

    fn apply_uniforms(&mut self, params: &VsParams) {
        self.calls.push(GpuCall::ApplyUniforms(*params));
    }

    fn draw(&mut self, base_element: u32, num_elements: u32, num_instances: u32) {
        self.calls.push(GpuCall::Draw {
            base: base_element,
            count: num_elements,
            instances: num_instances,
        });
    }

    fn end_pass(&mut self) {
        self.calls.push(GpuCall::EndPass);
    }
}
