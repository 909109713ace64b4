//! The chip visualizer
//!
//! Ties the registry, node state buffer, simulation bridge and renderer
//! together. Register projection and simulation work without a GPU; only
//! [`Visualizer::render`] needs [`Visualizer::init`] to have succeeded.

use crate::chip::{
    project_apu, project_cpu, ApuState, ChipData, CpuState, NodeIndex, NodeRegistry,
    NodeStateBuffer,
};
use crate::config::VisualizerConfig;
use crate::constants::{MAX_CYCLES_PER_FRAME, MAX_LAYERS, MIN_CYCLES_PER_FRAME};
use crate::emulator::EmulatorSource;
use crate::gpu::{ChipRenderer, FrameParams, GpuBackend, RenderInitError, WgpuBackend};
use crate::palette::{BlendMode, Palette};
use crate::sim::SimulationBridge;
use crate::view::ViewState;

pub struct Visualizer<B: GpuBackend = WgpuBackend> {
    chip: ChipData,
    registry: NodeRegistry,
    states: NodeStateBuffer,
    bridge: SimulationBridge,
    renderer: Option<ChipRenderer<B>>,
    view: ViewState,
    palette: Palette,
    blend: BlendMode,
    layer_visible: [bool; MAX_LAYERS],
    sim_enabled: bool,
    cycles_per_frame: u32,
    sync_half_cycles: u32,
}

impl<B: GpuBackend> Visualizer<B> {
    /// Build the node lookup tables and start the simulator if one is available
    pub fn new(chip: ChipData, config: &VisualizerConfig, mut bridge: SimulationBridge) -> Self {
        let config = config.clone().sanitized();
        let registry = NodeRegistry::new(&chip);
        bridge.init_simulation();

        Self {
            chip,
            registry,
            states: NodeStateBuffer::new(),
            bridge,
            renderer: None,
            view: ViewState::new(config.initial_scale, config.min_scale, config.max_scale),
            palette: config.palette,
            blend: config.blend_mode(),
            layer_visible: config.layer_visible,
            sim_enabled: config.sim_enabled,
            cycles_per_frame: config.cycles_per_frame,
            sync_half_cycles: config.sync_half_cycles,
        }
    }

    /// Create GPU resources. Does nothing when already initialized.
    ///
    /// On failure the visualizer stays uninitialized and `init` may be
    /// retried; everything except rendering keeps working.
    pub fn init(&mut self, backend: &mut B) -> Result<(), RenderInitError> {
        if self.renderer.is_some() {
            return Ok(());
        }
        match ChipRenderer::new(backend, &self.chip) {
            Ok(renderer) => {
                self.renderer = Some(renderer);
                Ok(())
            }
            Err(err) => {
                log::warn!("Chip renderer initialization failed: {}", err);
                Err(err)
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.renderer.is_some()
    }

    /// Release GPU resources and the simulator
    pub fn shutdown(&mut self) {
        if self.renderer.take().is_some() {
            log::info!("Chip renderer released");
        }
        self.bridge.shutdown_simulation();
    }

    /// Rebuild the node state buffer from the emulator for this frame
    pub fn update_from_emulator(&mut self, emu: &impl EmulatorSource) {
        self.states.reset();

        let mut cpu = emu.cpu_state();
        cpu.addr = cpu.pc;
        let groups = self.registry.cpu_groups();
        project_cpu(&mut self.states, groups, &cpu, false);

        if self.sim_enabled && self.bridge.has_simulator() && emu.is_running() && emu.is_loaded() {
            self.bridge.sync_from_registers(groups, &cpu);
            self.bridge.feed_instruction_window(cpu.pc, |addr| emu.read_byte(addr));
            self.bridge.advance(self.sync_half_cycles);
            self.bridge.read_back_node_states(&mut self.states);
        }

        project_apu(&mut self.states, self.registry.apu_groups(), &emu.apu_state());
    }

    /// Project a CPU snapshot, data bus included, without clearing the buffer
    pub fn update_cpu_state(&mut self, cpu: &CpuState) {
        project_cpu(&mut self.states, self.registry.cpu_groups(), cpu, true);
    }

    pub fn update_apu_state(&mut self, apu: &ApuState) {
        project_apu(&mut self.states, self.registry.apu_groups(), apu);
    }

    /// Advance the simulator by `half_cycles`, or the configured per-frame
    /// budget, and show its node states
    pub fn step_simulation(&mut self, half_cycles: Option<u32>) {
        if !self.sim_enabled || !self.bridge.has_simulator() {
            return;
        }
        self.bridge
            .advance(half_cycles.unwrap_or(self.cycles_per_frame));
        self.bridge.read_back_node_states(&mut self.states);
    }

    pub fn reset_simulation(&mut self) {
        self.bridge.reset_simulation();
    }

    pub fn set_simulation_enabled(&mut self, enabled: bool) {
        if self.sim_enabled != enabled {
            log::debug!("Transistor simulation {}", if enabled { "enabled" } else { "paused" });
        }
        self.sim_enabled = enabled;
    }

    pub fn simulation_enabled(&self) -> bool {
        self.sim_enabled
    }

    pub fn has_simulator(&self) -> bool {
        self.bridge.has_simulator()
    }

    pub fn cycles_per_frame(&self) -> u32 {
        self.cycles_per_frame
    }

    pub fn set_cycles_per_frame(&mut self, cycles: u32) {
        self.cycles_per_frame = cycles.clamp(MIN_CYCLES_PER_FRAME, MAX_CYCLES_PER_FRAME);
    }

    /// Draw the die into a `width` x `height` target
    pub fn render(&mut self, backend: &mut B, width: f32, height: f32) {
        let Some(renderer) = self.renderer.as_ref() else {
            return;
        };
        let (w, h) = (width as i32, height as i32);
        if w <= 0 || h <= 0 {
            return;
        }

        self.view.set_viewport_size(width, height);
        renderer.render(
            backend,
            &FrameParams {
                states: &self.states,
                view: &self.view,
                palette: &self.palette,
                layer_visible: &self.layer_visible,
                blend: self.blend,
                width: w as u32,
                height: h as u32,
            },
        );
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewState {
        &mut self.view
    }

    pub fn set_offset(&mut self, x: f32, y: f32) {
        self.view.set_offset(x, y);
    }

    pub fn add_offset(&mut self, dx: f32, dy: f32) {
        self.view.add_offset(dx, dy);
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.view.set_scale(scale);
    }

    pub fn add_scale(&mut self, delta: f32) {
        self.view.add_scale(delta);
    }

    pub fn scale(&self) -> f32 {
        self.view.scale()
    }

    pub fn set_layer_visible(&mut self, layer: usize, visible: bool) {
        if let Some(slot) = self.layer_visible.get_mut(layer) {
            *slot = visible;
        }
    }

    /// False for out-of-range layers
    pub fn get_layer_visible(&self, layer: usize) -> bool {
        self.layer_visible.get(layer).copied().unwrap_or(false)
    }

    pub fn toggle_layer_visible(&mut self, layer: usize) {
        if let Some(slot) = self.layer_visible.get_mut(layer) {
            *slot = !*slot;
        }
    }

    pub fn highlight_node(&mut self, index: usize) {
        self.states.highlight(index);
    }

    /// Resets every node to inactive, not just highlighted ones
    pub fn clear_highlight(&mut self) {
        self.states.clear_highlight();
    }

    pub fn node_name(&self, index: usize) -> Option<&str> {
        self.registry.node_name(index)
    }

    pub fn find_node_by_name(&self, name: &str) -> Option<NodeIndex> {
        self.registry.find_node_by_name(name)
    }

    pub fn node_states(&self) -> &NodeStateBuffer {
        &self.states
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    pub fn set_palette(&mut self, palette: Palette) {
        self.palette = palette;
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend
    }

    pub fn set_additive_blend(&mut self, additive: bool) {
        self.blend = if additive {
            BlendMode::Additive
        } else {
            BlendMode::Alpha
        };
    }

    pub fn layer_count(&self) -> usize {
        self.chip.layers.len().min(MAX_LAYERS)
    }

    pub fn layer_name(&self, layer: usize) -> Option<&str> {
        self.chip
            .layers
            .get(layer)
            .map(|l| l.name.as_str())
            .filter(|name| !name.is_empty())
    }

    /// Current settings, for saving
    pub fn config(&self) -> VisualizerConfig {
        let (min_scale, max_scale) = self.view.scale_range();
        VisualizerConfig {
            sim_enabled: self.sim_enabled,
            cycles_per_frame: self.cycles_per_frame,
            sync_half_cycles: self.sync_half_cycles,
            additive_blend: self.blend == BlendMode::Additive,
            initial_scale: self.view.scale(),
            min_scale,
            max_scale,
            palette: self.palette,
            layer_visible: self.layer_visible,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::{demo::demo_chip, Intensity};
    use crate::constants::{NODE_ACTIVE, NODE_HIGHLIGHTED, NODE_INACTIVE};
    use crate::emulator::DemoEmulator;
    use crate::gpu::RecordingBackend;
    use crate::sim::bridge::tests::scripted_factory;

    fn headless(bridge: SimulationBridge) -> Visualizer<RecordingBackend> {
        Visualizer::new(demo_chip(), &VisualizerConfig::default(), bridge)
    }

    #[test]
    fn test_init_failure_leaves_visualizer_usable() {
        let mut vis = headless(SimulationBridge::disabled());
        let mut backend = RecordingBackend::rejecting_pipelines();
        assert!(vis.init(&mut backend).is_err());
        assert!(!vis.is_initialized());

        backend.clear_calls();
        vis.render(&mut backend, 640.0, 480.0);
        assert!(backend.calls.is_empty());

        vis.update_cpu_state(&CpuState {
            a: 0x01,
            ..Default::default()
        });
        let a0 = vis.find_node_by_name("a0").unwrap();
        assert_eq!(vis.node_states().get(a0 as usize), Some(NODE_ACTIVE));
    }

    #[test]
    fn test_init_is_idempotent() {
        let mut vis = headless(SimulationBridge::disabled());
        let mut backend = RecordingBackend::new();
        vis.init(&mut backend).unwrap();
        let created = backend.calls.len();
        vis.init(&mut backend).unwrap();
        assert_eq!(backend.calls.len(), created);
    }

    #[test]
    fn test_update_from_emulator_without_simulation() {
        let mut vis = headless(SimulationBridge::disabled());
        let mut emu = DemoEmulator::new();
        for _ in 0..3 {
            emu.tick();
        }
        vis.highlight_node(4000);
        vis.update_from_emulator(&emu);

        let cpu = emu.cpu_state();
        assert_eq!(cpu.a, 1);
        let node = |name: &str| vis.find_node_by_name(name).unwrap() as usize;
        assert_eq!(vis.node_states().get(node("a0")), Some(NODE_ACTIVE));
        assert_eq!(vis.node_states().get(node("a1")), Some(NODE_INACTIVE));
        // Address bus follows the program counter
        assert_eq!(vis.node_states().get(node("ab15")), Some(NODE_ACTIVE));
        assert_eq!(vis.node_states().get(node("sq0_out0")), Some(NODE_ACTIVE));
        // Stale highlight is gone
        assert_eq!(vis.node_states().get(4000), Some(NODE_INACTIVE));
    }

    #[test]
    fn test_simulation_wins_over_projection() {
        let (factory, log) = scripted_factory();
        let mut vis = headless(SimulationBridge::new(factory));
        let emu = DemoEmulator::new();

        vis.update_from_emulator(&emu);

        let log = log.borrow();
        assert_eq!(log.steps, 20 + 20);
        assert_eq!(log.memory.len(), 9);
        // After 40 steps the scripted simulator leaves node 0 low
        // ((0 + 40) % 3 != 0) and drives node 2 high ((2 + 40) % 3 == 0)
        assert_eq!(vis.node_states().get(0), Some(NODE_INACTIVE));
        assert_eq!(vis.node_states().get(2), Some(NODE_ACTIVE));
    }

    #[test]
    fn test_paused_simulation_is_not_stepped() {
        let (factory, log) = scripted_factory();
        let mut vis = headless(SimulationBridge::new(factory));
        vis.set_simulation_enabled(false);

        vis.update_from_emulator(&DemoEmulator::new());
        vis.step_simulation(None);
        assert_eq!(log.borrow().steps, 20);
        assert!(log.borrow().writes.is_empty());

        vis.set_simulation_enabled(true);
        vis.step_simulation(None);
        assert_eq!(log.borrow().steps, 20 + 100);
        vis.step_simulation(Some(3));
        assert_eq!(log.borrow().steps, 20 + 100 + 3);
    }

    #[test]
    fn test_stopped_emulator_skips_simulation() {
        let (factory, log) = scripted_factory();
        let mut vis = headless(SimulationBridge::new(factory));
        let mut emu = DemoEmulator::new();
        emu.set_running(false);

        vis.update_from_emulator(&emu);
        assert_eq!(log.borrow().steps, 20);
        assert!(log.borrow().memory.is_empty());
    }

    #[test]
    fn test_highlight_and_clear() {
        let mut vis = headless(SimulationBridge::disabled());
        vis.update_cpu_state(&CpuState {
            a: 0xFF,
            ..Default::default()
        });
        vis.highlight_node(100);
        vis.highlight_node(usize::MAX);
        assert_eq!(vis.node_states().get(100), Some(NODE_HIGHLIGHTED));

        vis.clear_highlight();
        assert_eq!(vis.node_states().count(Intensity::Inactive), crate::constants::MAX_NODES);
    }

    #[test]
    fn test_layer_visibility_bounds() {
        let mut vis = headless(SimulationBridge::disabled());
        vis.set_layer_visible(MAX_LAYERS, false);
        vis.toggle_layer_visible(99);
        assert!(!vis.get_layer_visible(MAX_LAYERS));
        assert!((0..MAX_LAYERS).all(|layer| vis.get_layer_visible(layer)));

        vis.toggle_layer_visible(2);
        assert!(!vis.get_layer_visible(2));
        vis.set_layer_visible(2, true);
        assert!(vis.get_layer_visible(2));
    }

    #[test]
    fn test_layer_count_is_capped() {
        assert_eq!(headless(SimulationBridge::disabled()).layer_count(), MAX_LAYERS);

        let mut chip = demo_chip();
        chip.layers.truncate(2);
        let vis: Visualizer<RecordingBackend> =
            Visualizer::new(chip, &VisualizerConfig::default(), SimulationBridge::disabled());
        assert_eq!(vis.layer_count(), 2);

        let mut chip = demo_chip();
        chip.layers.extend(demo_chip().layers);
        let vis: Visualizer<RecordingBackend> =
            Visualizer::new(chip, &VisualizerConfig::default(), SimulationBridge::disabled());
        assert_eq!(vis.layer_count(), MAX_LAYERS);
    }

    #[test]
    fn test_render_updates_aspect() {
        let mut vis = headless(SimulationBridge::disabled());
        let mut backend = RecordingBackend::new();
        vis.init(&mut backend).unwrap();

        vis.render(&mut backend, 400.0, 200.0);
        assert_eq!(vis.view().aspect, 0.5);

        backend.clear_calls();
        vis.render(&mut backend, 0.5, 200.0);
        assert!(backend.calls.is_empty());
    }

    #[test]
    fn test_config_reflects_runtime_changes() {
        let mut vis = headless(SimulationBridge::disabled());
        vis.set_additive_blend(true);
        vis.set_scale(20.0);
        vis.set_cycles_per_frame(5);
        vis.toggle_layer_visible(1);

        let config = vis.config();
        assert!(config.additive_blend);
        assert_eq!(config.initial_scale, 20.0);
        assert_eq!(config.cycles_per_frame, 10);
        assert!(!config.layer_visible[1]);
        assert_eq!(vis.layer_name(0), Some("Layer 0"));
    }
}
