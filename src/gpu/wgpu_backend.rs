//! wgpu implementation of [`GpuBackend`]
//!
//! Renders into an offscreen RGBA8 target that egui displays as an image.
//! Draw state is recorded between `begin_pass` and `end_pass` and replayed
//! into a single render pass when the pass ends.

use std::num::NonZeroU64;
use std::sync::Arc;

use wgpu::util::DeviceExt;

use super::backend::{GpuBackend, RenderInitError, VsParams};
use crate::chip::SegVertex;
use crate::palette::BlendMode;

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const NODE_TEXTURE_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

/// Uniform slots allocated up front; grows when a frame needs more
const INITIAL_UNIFORM_SLOTS: u64 = 8;

pub struct WgpuVertexBuffer {
    buffer: Arc<wgpu::Buffer>,
}

pub struct WgpuNodeTexture {
    texture: wgpu::Texture,
    bind_group: Arc<wgpu::BindGroup>,
    width: u32,
    height: u32,
}

struct RenderTarget {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct UniformRing {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    slots: u64,
}

enum PassCommand {
    Pipeline(Arc<wgpu::RenderPipeline>),
    Bindings {
        vertices: Arc<wgpu::Buffer>,
        nodes: Arc<wgpu::BindGroup>,
    },
    Uniforms(u64),
    Draw {
        vertices: std::ops::Range<u32>,
        instances: std::ops::Range<u32>,
    },
}

#[derive(Default)]
struct PassRecording {
    clear: [f32; 4],
    commands: Vec<PassCommand>,
    uniforms: Vec<VsParams>,
}

pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    backend_name: String,
    shader: wgpu::ShaderModule,
    uniform_layout: wgpu::BindGroupLayout,
    node_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    uniform_stride: u64,
    uniforms: UniformRing,
    target: Option<RenderTarget>,
    target_changed: bool,
    texture_id: Option<egui::TextureId>,
    pass: Option<PassRecording>,
}

impl WgpuBackend {
    pub fn new(render_state: &egui_wgpu::RenderState) -> Result<Self, RenderInitError> {
        let device = render_state.device.clone();
        let queue = render_state.queue.clone();
        let backend_name = format!("{:?}", render_state.adapter.get_info().backend);

        // Node brightness is read in the vertex stage
        if device.limits().max_sampled_textures_per_shader_stage == 0 {
            return Err(RenderInitError::UnsupportedBackend {
                backend: backend_name,
            });
        }

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Chip Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("./shaders/chip.wgsl").into()),
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Chip Uniform Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: NonZeroU64::new(std::mem::size_of::<VsParams>() as u64),
                },
                count: None,
            }],
        });

        let node_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Chip Node Texture Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: false },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Chip Pipeline Layout"),
            bind_group_layouts: &[&uniform_layout, &node_layout],
            push_constant_ranges: &[],
        });

        let uniform_stride = uniform_stride(device.limits().min_uniform_buffer_offset_alignment);
        let uniforms = create_uniform_ring(&device, &uniform_layout, uniform_stride, INITIAL_UNIFORM_SLOTS);

        log::debug!("wgpu chip backend created on {}", backend_name);

        Ok(Self {
            device,
            queue,
            backend_name,
            shader,
            uniform_layout,
            node_layout,
            pipeline_layout,
            uniform_stride,
            uniforms,
            target: None,
            target_changed: false,
            texture_id: None,
            pass: None,
        })
    }

    /// Register the render target with egui, re-pointing the texture id
    /// after the target was recreated
    pub fn egui_texture(&mut self, renderer: &mut egui_wgpu::Renderer) -> Option<egui::TextureId> {
        let target = self.target.as_ref()?;
        match self.texture_id {
            Some(id) if !self.target_changed => Some(id),
            Some(id) => {
                renderer.update_egui_texture_from_wgpu_texture(
                    &self.device,
                    &target.view,
                    wgpu::FilterMode::Linear,
                    id,
                );
                self.target_changed = false;
                Some(id)
            }
            None => {
                let id = renderer.register_native_texture(&self.device, &target.view, wgpu::FilterMode::Linear);
                self.texture_id = Some(id);
                self.target_changed = false;
                Some(id)
            }
        }
    }

    fn ensure_target(&mut self, width: u32, height: u32) {
        if let Some(target) = &self.target {
            if target.texture.width() == width && target.texture.height() == height {
                return;
            }
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Chip Render Target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        log::debug!("Chip render target resized to {}x{}", width, height);

        self.target = Some(RenderTarget { texture, view });
        self.target_changed = true;
    }

    fn ensure_uniform_slots(&mut self, needed: u64) {
        if needed <= self.uniforms.slots {
            return;
        }
        let slots = needed.next_power_of_two();
        self.uniforms = create_uniform_ring(&self.device, &self.uniform_layout, self.uniform_stride, slots);
    }

    fn submit(&self, pass: PassRecording) {
        let Some(target) = self.target.as_ref() else {
            return;
        };

        let stride = self.uniform_stride as usize;
        let mut staging = vec![0_u8; pass.uniforms.len() * stride];
        for (slot, params) in staging.chunks_exact_mut(stride).zip(&pass.uniforms) {
            slot[..std::mem::size_of::<VsParams>()].copy_from_slice(bytemuck::bytes_of(params));
        }
        if !staging.is_empty() {
            self.queue.write_buffer(&self.uniforms.buffer, 0, &staging);
        }

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Chip Render Encoder"),
        });
        {
            let [r, g, b, a] = pass.clear.map(f64::from);
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Chip Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for command in &pass.commands {
                match command {
                    PassCommand::Pipeline(pipeline) => render_pass.set_pipeline(pipeline),
                    PassCommand::Bindings { vertices, nodes } => {
                        render_pass.set_vertex_buffer(0, vertices.slice(..));
                        render_pass.set_bind_group(1, &**nodes, &[]);
                    }
                    PassCommand::Uniforms(slot) => {
                        let offset = (slot * self.uniform_stride) as u32;
                        render_pass.set_bind_group(0, &self.uniforms.bind_group, &[offset]);
                    }
                    PassCommand::Draw { vertices, instances } => {
                        render_pass.draw(vertices.clone(), instances.clone());
                    }
                }
            }
        }
        self.queue.submit(Some(encoder.finish()));
    }
}

/// Size of one dynamic-offset uniform slot
fn uniform_stride(alignment: u32) -> u64 {
    let alignment = u64::from(alignment.max(1));
    (std::mem::size_of::<VsParams>() as u64).div_ceil(alignment) * alignment
}

fn create_uniform_ring(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    stride: u64,
    slots: u64,
) -> UniformRing {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Chip Uniform Buffer"),
        size: stride * slots,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Chip Uniform Bind Group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: NonZeroU64::new(std::mem::size_of::<VsParams>() as u64),
            }),
        }],
    });
    UniformRing {
        buffer,
        bind_group,
        slots,
    }
}

impl GpuBackend for WgpuBackend {
    type Buffer = WgpuVertexBuffer;
    type Texture = WgpuNodeTexture;
    type Pipeline = Arc<wgpu::RenderPipeline>;

    fn backend_name(&self) -> &str {
        &self.backend_name
    }

    fn create_vertex_buffer(&mut self, label: &str, vertices: &[SegVertex]) -> Option<WgpuVertexBuffer> {
        if vertices.is_empty() {
            return None;
        }
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytemuck::cast_slice(vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        Some(WgpuVertexBuffer {
            buffer: Arc::new(buffer),
        })
    }

    fn create_node_texture(&mut self, width: u32, height: u32) -> Option<WgpuNodeTexture> {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Chip Node Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: NODE_TEXTURE_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Chip Node Texture Bind Group"),
            layout: &self.node_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::TextureView(&view),
            }],
        });
        Some(WgpuNodeTexture {
            texture,
            bind_group: Arc::new(bind_group),
            width,
            height,
        })
    }

    fn create_pipeline(&mut self, blend: BlendMode) -> Result<Arc<wgpu::RenderPipeline>, RenderInitError> {
        let (label, fragment_entry, blend_state) = match blend {
            BlendMode::Alpha => ("Chip Alpha Pipeline", "fs_alpha", wgpu::BlendState::ALPHA_BLENDING),
            BlendMode::Additive => {
                let add = wgpu::BlendComponent {
                    src_factor: wgpu::BlendFactor::One,
                    dst_factor: wgpu::BlendFactor::One,
                    operation: wgpu::BlendOperation::Add,
                };
                (
                    "Chip Additive Pipeline",
                    "fs_add",
                    wgpu::BlendState {
                        color: add,
                        alpha: add,
                    },
                )
            }
        };

        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            cache: None,
            label: Some(label),
            layout: Some(&self.pipeline_layout),
            vertex: wgpu::VertexState {
                module: &self.shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<SegVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        // Normalized position
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Unorm16x2,
                            offset: 0,
                            shader_location: 0,
                        },
                        // Node texel coordinate
                        wgpu::VertexAttribute {
                            format: wgpu::VertexFormat::Sint16x2,
                            offset: 4,
                            shader_location: 1,
                        },
                    ],
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: &self.shader,
                entry_point: Some(fragment_entry),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: Some(blend_state),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            multiview: None,
        });
        Ok(Arc::new(pipeline))
    }

    fn update_node_texture(&mut self, texture: &WgpuNodeTexture, data: &[u8]) {
        let expected = (texture.width * texture.height) as usize;
        if data.len() != expected {
            log::warn!(
                "Node texture update has {} bytes, expected {}",
                data.len(),
                expected
            );
            return;
        }

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(texture.width),
                rows_per_image: Some(texture.height),
            },
            wgpu::Extent3d {
                width: texture.width,
                height: texture.height,
                depth_or_array_layers: 1,
            },
        );
    }

    fn begin_pass(&mut self, width: u32, height: u32, clear: [f32; 4]) {
        self.ensure_target(width, height);
        self.pass = Some(PassRecording {
            clear,
            ..Default::default()
        });
    }

    fn apply_pipeline(&mut self, pipeline: &Arc<wgpu::RenderPipeline>) {
        if let Some(pass) = self.pass.as_mut() {
            pass.commands.push(PassCommand::Pipeline(pipeline.clone()));
        }
    }

    fn apply_bindings(&mut self, vertices: &WgpuVertexBuffer, nodes: &WgpuNodeTexture) {
        if let Some(pass) = self.pass.as_mut() {
            pass.commands.push(PassCommand::Bindings {
                vertices: vertices.buffer.clone(),
                nodes: nodes.bind_group.clone(),
            });
        }
    }

    fn apply_uniforms(&mut self, params: &VsParams) {
        if let Some(pass) = self.pass.as_mut() {
            let slot = pass.uniforms.len() as u64;
            pass.uniforms.push(*params);
            pass.commands.push(PassCommand::Uniforms(slot));
        }
    }

    fn draw(&mut self, base_element: u32, num_elements: u32, num_instances: u32) {
        if let Some(pass) = self.pass.as_mut() {
            pass.commands.push(PassCommand::Draw {
                vertices: base_element..base_element + num_elements,
                instances: 0..num_instances,
            });
        }
    }

    fn end_pass(&mut self) {
        let Some(pass) = self.pass.take() else {
            return;
        };
        self.ensure_uniform_slots(pass.uniforms.len() as u64);
        self.submit(pass);
    }
}
