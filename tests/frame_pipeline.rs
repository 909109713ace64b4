//! Frame pipeline through the public API with headless stand-ins for the
//! GPU and the transistor simulator

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use chipvis::chip::demo::demo_chip;
use chipvis::chip::{ChipData, CpuState, Intensity};
use chipvis::constants::{NODE_ACTIVE, NODE_HIGHLIGHTED, NODE_INACTIVE};
use chipvis::gpu::{GpuCall, RecordingBackend};
use chipvis::sim::{netlist_factory, Netlist, SimFactory, SimulationBridge, TransistorSim};
use chipvis::{DemoEmulator, EmulatorSource, Visualizer, VisualizerConfig};

#[derive(Default)]
struct Recorded {
    steps: u32,
    writes: Vec<(u16, bool)>,
    memory: BTreeMap<u16, u8>,
}

/// Reports every node high
struct AllHighSim {
    recorded: Rc<RefCell<Recorded>>,
}

impl TransistorSim for AllHighSim {
    fn step(&mut self) {
        self.recorded.borrow_mut().steps += 1;
    }

    fn write_node(&mut self, node: u16, high: bool) {
        self.recorded.borrow_mut().writes.push((node, high));
    }

    fn write_memory(&mut self, addr: u16, value: u8) {
        self.recorded.borrow_mut().memory.insert(addr, value);
    }

    fn read_node_states(&self, active: u8, _inactive: u8, out: &mut [u8]) {
        out.fill(active);
    }
}

fn all_high_factory() -> (SimFactory, Rc<RefCell<Recorded>>) {
    let recorded = Rc::new(RefCell::new(Recorded::default()));
    let shared = recorded.clone();
    let factory: SimFactory = Box::new(move || {
        Some(Box::new(AllHighSim {
            recorded: shared.clone(),
        }) as Box<dyn TransistorSim>)
    });
    (factory, recorded)
}

fn node(vis: &Visualizer<RecordingBackend>, name: &str) -> usize {
    vis.find_node_by_name(name)
        .map(usize::from)
        .unwrap_or_else(|| panic!("demo chip has no node {}", name))
}

fn state(vis: &Visualizer<RecordingBackend>, name: &str) -> u8 {
    vis.node_states().get(node(vis, name)).unwrap()
}

#[test]
fn test_partial_group_projection() {
    let mut chip = ChipData::default();
    chip.node_names = (0..16).map(|i| format!("n{}", i)).collect();
    chip.node_groups
        .insert("a".to_string(), vec![5, 7, 9, 11, -1, -1, -1, -1]);

    let mut vis: Visualizer<RecordingBackend> =
        Visualizer::new(chip, &VisualizerConfig::default(), SimulationBridge::disabled());
    vis.update_cpu_state(&CpuState {
        a: 0xFF,
        ..Default::default()
    });

    let states = vis.node_states();
    for index in [5, 7, 9, 11] {
        assert_eq!(states.get(index), Some(NODE_ACTIVE));
    }
    assert_eq!(states.count(Intensity::Active), 4);
}

#[test]
fn test_missing_simulator_leaves_buffer_untouched() {
    let mut vis: Visualizer<RecordingBackend> =
        Visualizer::new(demo_chip(), &VisualizerConfig::default(), SimulationBridge::disabled());
    vis.update_cpu_state(&CpuState {
        x: 0x81,
        ..Default::default()
    });
    let before = vis.node_states().as_bytes().to_vec();

    vis.step_simulation(Some(20));
    vis.reset_simulation();

    assert!(!vis.has_simulator());
    assert_eq!(vis.node_states().as_bytes(), &before[..]);
}

#[test]
fn test_zoom_clamps_at_max_scale() {
    let mut vis: Visualizer<RecordingBackend> =
        Visualizer::new(demo_chip(), &VisualizerConfig::default(), SimulationBridge::disabled());
    assert_eq!(vis.scale(), 9.0);

    vis.add_scale(50.0);
    assert_eq!(vis.scale(), 59.0);
    vis.add_scale(1000.0);
    assert_eq!(vis.scale(), 100.0);
}

#[test]
fn test_hidden_layer_is_not_drawn() {
    let mut vis: Visualizer<RecordingBackend> =
        Visualizer::new(demo_chip(), &VisualizerConfig::default(), SimulationBridge::disabled());
    let mut backend = RecordingBackend::new();
    vis.init(&mut backend).unwrap();

    backend.clear_calls();
    vis.render(&mut backend, 800.0, 600.0);
    let all_layers = backend.draw_count();
    let layer3_buffer = backend.bound_buffers()[2];
    assert_eq!(all_layers, 5);

    vis.toggle_layer_visible(3);
    backend.clear_calls();
    vis.render(&mut backend, 800.0, 600.0);

    assert_eq!(backend.draw_count(), all_layers - 1);
    assert!(!backend.bound_buffers().contains(&layer3_buffer));
    let uniforms = backend
        .calls
        .iter()
        .filter(|call| matches!(call, GpuCall::ApplyUniforms(_)))
        .count();
    assert_eq!(uniforms, all_layers - 1);
}

#[test]
fn test_simulation_overwrites_registers_but_not_audio() {
    let (factory, recorded) = all_high_factory();
    let mut vis: Visualizer<RecordingBackend> =
        Visualizer::new(demo_chip(), &VisualizerConfig::default(), SimulationBridge::new(factory));
    let mut emu = DemoEmulator::new();
    emu.tick();

    vis.update_from_emulator(&emu);

    // Register projection is replaced by the simulated levels
    assert_eq!(state(&vis, "a0"), NODE_ACTIVE);
    assert_eq!(state(&vis, "db7"), NODE_ACTIVE);
    // Audio outputs are projected after the read-back
    let apu = emu.apu_state();
    assert_eq!(apu.sq0_out & 0x08, 0);
    assert_eq!(state(&vis, "sq0_out3"), NODE_INACTIVE);

    let recorded = recorded.borrow();
    let pc = emu.cpu_state().pc;
    assert_eq!(recorded.memory.len(), 9);
    assert_eq!(recorded.memory.get(&pc), Some(&emu.read_byte(pc)));
    assert!(!recorded.writes.is_empty());
    assert!(recorded.steps > 0);
}

#[test]
fn test_paused_emulator_is_not_simulated() {
    let (factory, recorded) = all_high_factory();
    let mut vis: Visualizer<RecordingBackend> =
        Visualizer::new(demo_chip(), &VisualizerConfig::default(), SimulationBridge::new(factory));
    let mut emu = DemoEmulator::new();
    emu.set_running(false);
    let steps_after_init = recorded.borrow().steps;

    vis.update_from_emulator(&emu);

    assert_eq!(recorded.borrow().steps, steps_after_init);
    assert!(recorded.borrow().memory.is_empty());
    // a = 0 from the register projection alone
    assert_eq!(state(&vis, "a0"), NODE_INACTIVE);
    assert_eq!(state(&vis, "pch7"), NODE_ACTIVE);
}

#[test]
fn test_reset_simulation_is_repeatable() {
    let netlist = Netlist::from_json_str(
        r#"{
            "node_count": 5,
            "vcc": 1,
            "vss": 2,
            "pullups": [4],
            "transistors": [[3, 4, 2]],
            "pins": { "clk0": 3 }
        }"#,
    )
    .unwrap();
    let mut vis: Visualizer<RecordingBackend> = Visualizer::new(
        demo_chip(),
        &VisualizerConfig::default(),
        SimulationBridge::new(netlist_factory(netlist)),
    );
    assert!(vis.has_simulator());

    vis.reset_simulation();
    vis.step_simulation(Some(0));
    let first = vis.node_states().as_bytes().to_vec();

    vis.step_simulation(Some(3));
    vis.reset_simulation();
    vis.step_simulation(Some(0));

    assert_eq!(vis.node_states().as_bytes(), &first[..]);
    assert_eq!(first[1], NODE_ACTIVE);
    assert_eq!(first[3], NODE_ACTIVE);
    assert_eq!(first[4], NODE_INACTIVE);
}

#[test]
fn test_clear_highlight_resets_every_node() {
    let mut vis: Visualizer<RecordingBackend> =
        Visualizer::new(demo_chip(), &VisualizerConfig::default(), SimulationBridge::disabled());
    vis.update_cpu_state(&CpuState {
        a: 0xFF,
        ..Default::default()
    });
    let x0 = node(&vis, "x0");
    vis.highlight_node(x0);
    assert_eq!(vis.node_states().get(x0), Some(NODE_HIGHLIGHTED));

    vis.clear_highlight();

    assert_eq!(state(&vis, "a0"), NODE_INACTIVE);
    assert_eq!(vis.node_states().get(x0), Some(NODE_INACTIVE));
    assert_eq!(vis.node_states().count(Intensity::Inactive), vis.node_states().as_bytes().len());
}

#[test]
fn test_node_texture_matches_state_buffer() {
    let mut vis: Visualizer<RecordingBackend> =
        Visualizer::new(demo_chip(), &VisualizerConfig::default(), SimulationBridge::disabled());
    let mut backend = RecordingBackend::new();
    vis.init(&mut backend).unwrap();

    let mut emu = DemoEmulator::new();
    for _ in 0..3 {
        emu.tick();
    }
    vis.update_from_emulator(&emu);
    vis.render(&mut backend, 320.0, 240.0);

    assert_eq!(backend.node_texture, vis.node_states().as_bytes());
    assert_eq!(state(&vis, "x0"), NODE_ACTIVE);
}
