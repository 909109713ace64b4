//! chipvis - 2A03 die visualizer
//!
//! Runs the visualizer against the built-in demo emulator. A real die
//! dataset and a transistor netlist can be given on the command line or
//! opened from the File menu.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use eframe::egui;

use chipvis::chip::{demo::demo_chip, ChipData};
use chipvis::gpu::WgpuBackend;
use chipvis::sim::{netlist_factory, Netlist, SimulationBridge};
use chipvis::ui::{ChipWindow, ChipWindowAction};
use chipvis::{DemoEmulator, Visualizer, VisualizerConfig};

/// Real-time 2A03 die visualizer
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[arg(long, help = "Chip layout dataset (JSON); the demo die is used when omitted")]
    chip: Option<PathBuf>,

    #[arg(long, help = "Transistor netlist (JSON) enabling the switch-level simulation")]
    netlist: Option<PathBuf>,
}

fn make_bridge(netlist: Option<&Netlist>) -> SimulationBridge {
    match netlist {
        Some(netlist) => SimulationBridge::new(netlist_factory(netlist.clone())),
        None => SimulationBridge::disabled(),
    }
}

struct ChipvisApp {
    chip: ChipData,
    netlist: Option<Netlist>,
    visualizer: Visualizer<WgpuBackend>,
    backend: Option<WgpuBackend>,
    emulator: DemoEmulator,
    window: ChipWindow,
}

impl ChipvisApp {
    fn new(cc: &eframe::CreationContext<'_>, chip: ChipData, netlist: Option<Netlist>, config: VisualizerConfig) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        let mut window = ChipWindow::new();
        let mut visualizer = Visualizer::new(chip.clone(), &config, make_bridge(netlist.as_ref()));

        let backend = match cc.wgpu_render_state.as_ref() {
            Some(render_state) => match WgpuBackend::new(render_state) {
                Ok(mut backend) => {
                    if let Err(err) = visualizer.init(&mut backend) {
                        window.set_status(format!("Renderer unavailable: {}", err), true);
                    }
                    Some(backend)
                }
                Err(err) => {
                    log::error!("GPU backend unavailable: {}", err);
                    window.set_status(format!("GPU backend unavailable: {}", err), true);
                    None
                }
            },
            None => {
                log::error!("eframe did not provide a wgpu render state");
                None
            }
        };

        Self {
            chip,
            netlist,
            visualizer,
            backend,
            emulator: DemoEmulator::new(),
            window,
        }
    }

    /// Replace the visualizer, keeping the current settings
    fn rebuild_visualizer(&mut self) {
        let config = self.visualizer.config();
        self.visualizer.shutdown();
        self.visualizer = Visualizer::new(self.chip.clone(), &config, make_bridge(self.netlist.as_ref()));
        if let Some(backend) = self.backend.as_mut() {
            if let Err(err) = self.visualizer.init(backend) {
                self.window.set_status(format!("Renderer unavailable: {}", err), true);
            }
        }
    }

    fn handle_action(&mut self, action: ChipWindowAction) {
        match action {
            ChipWindowAction::OpenChipData(path) => match ChipData::load_json(&path) {
                Ok(chip) => {
                    self.chip = chip;
                    self.rebuild_visualizer();
                    self.window.set_status(format!("Loaded {}", path.display()), false);
                }
                Err(err) => {
                    log::error!("{:#}", err);
                    self.window.set_status(format!("{:#}", err), true);
                }
            },
            ChipWindowAction::OpenNetlist(path) => match Netlist::load_json(&path) {
                Ok(netlist) => {
                    self.netlist = Some(netlist);
                    self.rebuild_visualizer();
                    if self.visualizer.has_simulator() {
                        self.window.set_status(format!("Simulating {}", path.display()), false);
                    } else {
                        self.window.set_status("Transistor simulation could not be created", true);
                    }
                }
                Err(err) => {
                    log::error!("{:#}", err);
                    self.window.set_status(format!("{:#}", err), true);
                }
            },
        }
    }
}

impl eframe::App for ChipvisApp {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        if self.window.emulator_paused() {
            self.visualizer.step_simulation(None);
        } else {
            self.emulator.tick();
            self.visualizer.update_from_emulator(&self.emulator);
        }

        let gpu = self.backend.as_mut().zip(frame.wgpu_render_state());
        if let Some(action) = self.window.show(ctx, &mut self.visualizer, gpu) {
            self.handle_action(action);
        }

        ctx.request_repaint();
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    let chip = match &args.chip {
        Some(path) => ChipData::load_json(path)?,
        None => {
            log::info!("No chip data given, using the demo die");
            demo_chip()
        }
    };
    let netlist = args.netlist.as_ref().map(Netlist::load_json).transpose()?;
    let config = VisualizerConfig::load();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1024.0, 768.0])
            .with_app_id("chipvis"),
        renderer: eframe::Renderer::Wgpu,
        ..Default::default()
    };

    eframe::run_native(
        "2A03 Chip Visualizer",
        options,
        Box::new(move |cc| Ok(Box::new(ChipvisApp::new(cc, chip, netlist, config)))),
    )
    .map_err(|err| anyhow::anyhow!("{}", err))
}
