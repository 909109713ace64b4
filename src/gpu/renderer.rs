//! Per-layer die renderer
//!
//! Owns the layer vertex buffers, the node lookup texture and one pipeline
//! per blend mode. Everything is created once in [`ChipRenderer::new`] and
//! released when the renderer is dropped.

use super::backend::{GpuBackend, RenderInitError, VsParams};
use crate::chip::{ChipData, NodeStateBuffer};
use crate::constants::{MAX_LAYERS, NODE_TEXTURE_HEIGHT, NODE_TEXTURE_WIDTH};
use crate::palette::{BlendMode, Palette};
use crate::view::ViewState;

/// Everything a single frame reads
pub struct FrameParams<'a> {
    pub states: &'a NodeStateBuffer,
    pub view: &'a ViewState,
    pub palette: &'a Palette,
    pub layer_visible: &'a [bool; MAX_LAYERS],
    pub blend: BlendMode,
    pub width: u32,
    pub height: u32,
}

struct LayerBuffer<B: GpuBackend> {
    buffer: B::Buffer,
    vertex_count: u32,
}

pub struct ChipRenderer<B: GpuBackend> {
    /// Indexed by layer; `None` for layers without geometry
    layers: Vec<Option<LayerBuffer<B>>>,
    node_texture: B::Texture,
    alpha_pipeline: B::Pipeline,
    additive_pipeline: B::Pipeline,
    half_size: [f32; 2],
}

impl<B: GpuBackend> ChipRenderer<B> {
    pub fn new(backend: &mut B, chip: &ChipData) -> Result<Self, RenderInitError> {
        let node_texture = backend
            .create_node_texture(NODE_TEXTURE_WIDTH, NODE_TEXTURE_HEIGHT)
            .ok_or_else(|| RenderInitError::ResourceCreation {
                what: "node texture".to_string(),
            })?;
        let alpha_pipeline = backend.create_pipeline(BlendMode::Alpha)?;
        let additive_pipeline = backend.create_pipeline(BlendMode::Additive)?;

        if chip.layers.len() > MAX_LAYERS {
            log::warn!(
                "Chip data has {} layers, only the first {} are drawn",
                chip.layers.len(),
                MAX_LAYERS
            );
        }

        let layers = chip
            .layers
            .iter()
            .take(MAX_LAYERS)
            .enumerate()
            .map(|(i, layer)| {
                let label = if layer.name.is_empty() {
                    format!("Layer {}", i)
                } else {
                    layer.name.clone()
                };
                let buffer = backend.create_vertex_buffer(&label, &layer.vertices)?;
                Some(LayerBuffer {
                    buffer,
                    vertex_count: layer.vertex_count(),
                })
            })
            .collect::<Vec<_>>();

        log::info!(
            "Chip renderer initialized on {} backend: {} of {} layers have geometry",
            backend.backend_name(),
            layers.iter().filter(|layer| layer.is_some()).count(),
            layers.len()
        );

        Ok(Self {
            layers,
            node_texture,
            alpha_pipeline,
            additive_pipeline,
            half_size: chip.bounds().half_size(),
        })
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn has_geometry(&self, layer: usize) -> bool {
        matches!(self.layers.get(layer), Some(Some(_)))
    }

    /// Upload node states and draw every visible layer in order
    pub fn render(&self, backend: &mut B, frame: &FrameParams<'_>) {
        if frame.width == 0 || frame.height == 0 {
            return;
        }

        backend.update_node_texture(&self.node_texture, frame.states.as_bytes());
        backend.begin_pass(frame.width, frame.height, frame.palette.background);
        backend.apply_pipeline(match frame.blend {
            BlendMode::Alpha => &self.alpha_pipeline,
            BlendMode::Additive => &self.additive_pipeline,
        });

        for (i, layer) in self.layers.iter().enumerate() {
            if !frame.layer_visible[i] {
                continue;
            }
            let Some(layer) = layer else {
                continue;
            };
            let Some(color0) = frame.palette.layer_color(i) else {
                continue;
            };

            backend.apply_bindings(&layer.buffer, &self.node_texture);
            backend.apply_uniforms(&VsParams {
                half_size: self.half_size,
                offset: frame.view.offset.to_array(),
                scale: frame.view.axis_scale(),
                _pad: [0.0; 2],
                color0,
            });
            backend.draw(0, layer.vertex_count, 1);
        }

        backend.end_pass();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::{demo::demo_chip, Intensity, LayerGeometry, SegVertex};
    use crate::gpu::recording::{GpuCall, RecordingBackend};

    fn frame<'a>(
        states: &'a NodeStateBuffer,
        view: &'a ViewState,
        palette: &'a Palette,
        visible: &'a [bool; MAX_LAYERS],
    ) -> FrameParams<'a> {
        FrameParams {
            states,
            view,
            palette,
            layer_visible: visible,
            blend: BlendMode::Alpha,
            width: 640,
            height: 480,
        }
    }

    #[test]
    fn test_skips_empty_layers_at_init() {
        let mut backend = RecordingBackend::new();
        let renderer = ChipRenderer::new(&mut backend, &demo_chip()).unwrap();

        assert_eq!(renderer.layer_count(), MAX_LAYERS);
        assert!(renderer.has_geometry(0));
        assert!(!renderer.has_geometry(2));
        assert!(!renderer.has_geometry(MAX_LAYERS));
        assert!(backend.calls.contains(&GpuCall::CreateNodeTexture {
            id: 1,
            width: 256,
            height: 32
        }));
    }

    #[test]
    fn test_unsupported_backend_fails_init() {
        let mut backend = RecordingBackend::rejecting_pipelines();
        let err = ChipRenderer::new(&mut backend, &demo_chip()).err();
        assert_eq!(
            err,
            Some(RenderInitError::UnsupportedBackend {
                backend: "recording".to_string()
            })
        );
    }

    #[test]
    fn test_one_draw_per_visible_layer() {
        let mut backend = RecordingBackend::new();
        let renderer = ChipRenderer::new(&mut backend, &demo_chip()).unwrap();
        let states = NodeStateBuffer::new();
        let view = ViewState::default();
        let palette = Palette::default();
        let mut visible = [true; MAX_LAYERS];

        backend.clear_calls();
        renderer.render(&mut backend, &frame(&states, &view, &palette, &visible));
        assert_eq!(backend.draw_count(), 5);

        visible[3] = false;
        backend.clear_calls();
        renderer.render(&mut backend, &frame(&states, &view, &palette, &visible));
        assert_eq!(backend.draw_count(), 4);
        assert_eq!(backend.bound_buffers().len(), 4);
        let uniforms = backend
            .calls
            .iter()
            .filter(|call| matches!(call, GpuCall::ApplyUniforms(_)))
            .count();
        assert_eq!(uniforms, 4);
    }

    #[test]
    fn test_frame_call_order_and_uniforms() {
        let chip = ChipData {
            layers: vec![LayerGeometry::new(
                "",
                vec![
                    SegVertex::new(0, 0, 4),
                    SegVertex::new(2000, 0, 4),
                    SegVertex::new(0, 1000, 4),
                ],
            )],
            ..Default::default()
        };
        let mut backend = RecordingBackend::new();
        let renderer = ChipRenderer::new(&mut backend, &chip).unwrap();
        assert!(backend.calls.contains(&GpuCall::CreateVertexBuffer {
            id: 2,
            label: "Layer 0".to_string(),
            vertices: 3
        }));

        let mut states = NodeStateBuffer::new();
        states.set(4, Intensity::Active);
        let mut view = ViewState::default();
        view.set_offset(0.25, -0.5);
        view.set_viewport_size(200.0, 100.0);
        let palette = Palette::default();
        let visible = [true; MAX_LAYERS];

        backend.clear_calls();
        let mut params = frame(&states, &view, &palette, &visible);
        params.blend = BlendMode::Additive;
        renderer.render(&mut backend, &params);

        let expected_uniforms = VsParams {
            half_size: [1000.0 / 65535.0, 500.0 / 65535.0],
            offset: [0.25, -0.5],
            scale: [4.5, 9.0],
            _pad: [0.0; 2],
            color0: palette.colors[0],
        };
        assert_eq!(
            backend.calls,
            vec![
                GpuCall::UpdateNodeTexture { id: 1, bytes: 8192 },
                GpuCall::BeginPass {
                    width: 640,
                    height: 480,
                    clear: palette.background
                },
                GpuCall::ApplyPipeline(BlendMode::Additive),
                GpuCall::ApplyBindings { buffer: 2, texture: 1 },
                GpuCall::ApplyUniforms(expected_uniforms),
                GpuCall::Draw { base: 0, count: 3, instances: 1 },
                GpuCall::EndPass,
            ]
        );
        assert_eq!(backend.node_texture[4], crate::constants::NODE_ACTIVE);
    }

    #[test]
    fn test_zero_sized_frame_is_skipped() {
        let mut backend = RecordingBackend::new();
        let renderer = ChipRenderer::new(&mut backend, &demo_chip()).unwrap();
        let states = NodeStateBuffer::new();
        let view = ViewState::default();
        let palette = Palette::default();
        let visible = [true; MAX_LAYERS];

        backend.clear_calls();
        let mut params = frame(&states, &view, &palette, &visible);
        params.height = 0;
        renderer.render(&mut backend, &params);
        assert!(backend.calls.is_empty());
    }
}
