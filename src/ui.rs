//! egui window around the visualizer: menus, node search and the die image

use std::path::PathBuf;

use egui::{Color32, PointerButton, Sense, Vec2};

use crate::chip::NodeIndex;
use crate::constants::{MAX_CYCLES_PER_FRAME, MIN_CYCLES_PER_FRAME};
use crate::gpu::WgpuBackend;
use crate::palette::BlendMode;
use crate::visualizer::Visualizer;

/// Scroll distance egui reports for one mouse wheel notch
const POINTS_PER_WHEEL_NOTCH: f32 = 50.0;

/// Smallest size the die image is laid out at
const MIN_VIEW_SIZE: f32 = 100.0;

/// Requests the host has to carry out
#[derive(Debug, Clone, PartialEq)]
pub enum ChipWindowAction {
    OpenChipData(PathBuf),
    OpenNetlist(PathBuf),
}

#[derive(Default)]
pub struct ChipWindow {
    search: String,
    highlighted: Option<NodeIndex>,
    status: Option<(String, bool)>,
    emulator_paused: bool,
}

impl ChipWindow {
    pub fn new() -> Self {
        Self::default()
    }

    /// While paused the simulator free-runs instead of following the emulator
    pub fn emulator_paused(&self) -> bool {
        self.emulator_paused
    }

    pub fn set_status(&mut self, message: impl Into<String>, is_error: bool) {
        self.status = Some((message.into(), is_error));
    }

    /// Draw the menu bar and the die view for this frame
    pub fn show(
        &mut self,
        ctx: &egui::Context,
        vis: &mut Visualizer<WgpuBackend>,
        gpu: Option<(&mut WgpuBackend, &egui_wgpu::RenderState)>,
    ) -> Option<ChipWindowAction> {
        let mut action = None;

        egui::TopBottomPanel::top("chip_menu_bar").show(ctx, |ui| {
            egui::menu::bar(ui, |ui| {
                action = self.file_menu(ui, vis);
                Self::view_menu(ui, vis);
                Self::style_menu(ui, vis);
                self.simulation_menu(ui, vis);
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.controls(ui, vis);
            if let Some((message, is_error)) = &self.status {
                let color = if *is_error { Color32::LIGHT_RED } else { Color32::GRAY };
                ui.colored_label(color, message);
            }
            ui.separator();
            self.die_view(ui, vis, gpu);
        });

        action
    }

    fn file_menu(&mut self, ui: &mut egui::Ui, vis: &Visualizer<WgpuBackend>) -> Option<ChipWindowAction> {
        let mut action = None;
        ui.menu_button("File", |ui| {
            if ui.button("Open Chip Data...").clicked() {
                if let Some(path) = rfd::FileDialog::new()
                    .add_filter("Chip data", &["json"])
                    .pick_file()
                {
                    action = Some(ChipWindowAction::OpenChipData(path));
                }
                ui.close_menu();
            }
            if ui.button("Open Netlist...").clicked() {
                if let Some(path) = rfd::FileDialog::new()
                    .add_filter("Netlist", &["json"])
                    .pick_file()
                {
                    action = Some(ChipWindowAction::OpenNetlist(path));
                }
                ui.close_menu();
            }
            ui.separator();
            if ui.button("Save Settings").clicked() {
                match vis.config().save() {
                    Ok(path) => self.set_status(format!("Settings saved to {}", path.display()), false),
                    Err(err) => {
                        log::warn!("Failed to save settings: {:#}", err);
                        self.set_status(format!("Failed to save settings: {:#}", err), true);
                    }
                }
                ui.close_menu();
            }
        });
        action
    }

    fn view_menu(ui: &mut egui::Ui, vis: &mut Visualizer<WgpuBackend>) {
        ui.menu_button("View", |ui| {
            if ui.button("Reset View").clicked() {
                vis.view_mut().reset();
                ui.close_menu();
            }
            ui.separator();
            for layer in 0..vis.layer_count() {
                let label = vis
                    .layer_name(layer)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Layer {}", layer));
                let mut visible = vis.get_layer_visible(layer);
                if ui.checkbox(&mut visible, label).changed() {
                    vis.set_layer_visible(layer, visible);
                }
            }
        });
    }

    fn style_menu(ui: &mut egui::Ui, vis: &mut Visualizer<WgpuBackend>) {
        ui.menu_button("Style", |ui| {
            let mut blend = vis.blend_mode();
            ui.radio_value(&mut blend, BlendMode::Alpha, "Alpha Blend");
            ui.radio_value(&mut blend, BlendMode::Additive, "Additive Blend");
            if blend != vis.blend_mode() {
                vis.set_additive_blend(blend == BlendMode::Additive);
            }
        });
    }

    fn simulation_menu(&mut self, ui: &mut egui::Ui, vis: &mut Visualizer<WgpuBackend>) {
        ui.menu_button("Simulation", |ui| {
            let mut enabled = vis.simulation_enabled();
            if ui.checkbox(&mut enabled, "Enable Transistor Sim").changed() {
                vis.set_simulation_enabled(enabled);
            }
            ui.checkbox(&mut self.emulator_paused, "Pause Emulator");
            ui.separator();
            if ui.button("Reset Simulation").clicked() {
                vis.reset_simulation();
                ui.close_menu();
            }
            ui.separator();
            let mut cycles = vis.cycles_per_frame();
            if ui
                .add(egui::Slider::new(&mut cycles, MIN_CYCLES_PER_FRAME..=MAX_CYCLES_PER_FRAME).text("Cycles/Frame"))
                .changed()
            {
                vis.set_cycles_per_frame(cycles);
            }
            if !vis.has_simulator() {
                ui.weak("No transistor simulator loaded");
            }
        });
    }

    fn controls(&mut self, ui: &mut egui::Ui, vis: &mut Visualizer<WgpuBackend>) {
        ui.horizontal(|ui| {
            let (min_scale, max_scale) = vis.view().scale_range();
            let mut scale = vis.scale();
            if ui
                .add(egui::Slider::new(&mut scale, min_scale..=max_scale).text("Zoom").fixed_decimals(1))
                .changed()
            {
                vis.set_scale(scale);
            }
            if ui.button("Reset").clicked() {
                vis.view_mut().reset();
            }

            ui.separator();
            let search = ui.add(egui::TextEdit::singleline(&mut self.search).hint_text("node name").desired_width(120.0));
            let submitted = search.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if ui.button("Highlight").clicked() || submitted {
                self.highlight_by_name(vis);
            }
            if ui.button("Clear").clicked() {
                self.highlighted = None;
                vis.clear_highlight();
                self.status = None;
            }
        });
    }

    fn highlight_by_name(&mut self, vis: &mut Visualizer<WgpuBackend>) {
        let name = self.search.trim().to_string();
        match vis.find_node_by_name(&name) {
            Some(node) => {
                self.highlighted = Some(node);
                self.set_status(format!("Highlighting node {} ({})", node, name), false);
            }
            None => {
                self.highlighted = None;
                self.set_status(format!("No node named '{}'", name), true);
            }
        }
    }

    fn die_view(
        &mut self,
        ui: &mut egui::Ui,
        vis: &mut Visualizer<WgpuBackend>,
        gpu: Option<(&mut WgpuBackend, &egui_wgpu::RenderState)>,
    ) {
        let size = ui.available_size().max(Vec2::splat(MIN_VIEW_SIZE));

        let Some((backend, render_state)) = gpu else {
            placeholder(ui, vis, size, "GPU rendering is unavailable");
            return;
        };
        if !vis.is_initialized() {
            placeholder(ui, vis, size, "Chip renderer is not initialized");
            return;
        }

        // The buffer is rebuilt every frame, so the highlight is reapplied
        if let Some(node) = self.highlighted {
            vis.highlight_node(usize::from(node));
        }

        let pixels_per_point = ui.ctx().pixels_per_point();
        vis.render(backend, size.x * pixels_per_point, size.y * pixels_per_point);
        let Some(texture) = backend.egui_texture(&mut render_state.renderer.write()) else {
            placeholder(ui, vis, size, "");
            return;
        };

        let response = ui.add(
            egui::Image::new(egui::load::SizedTexture::new(texture, size)).sense(Sense::click_and_drag()),
        );

        if response.hovered() {
            let wheel = ui.input(|i| i.raw_scroll_delta.y) / POINTS_PER_WHEEL_NOTCH;
            if wheel != 0.0 {
                vis.view_mut().zoom_by_wheel(wheel);
            }
        }
        if response.dragged_by(PointerButton::Primary) || response.dragged_by(PointerButton::Middle) {
            let delta = response.drag_delta();
            vis.view_mut().pan_by_pixels(delta.x, delta.y);
        }
    }
}

/// Background-filled area with a centered note, drawn instead of the die
fn placeholder(ui: &mut egui::Ui, vis: &Visualizer<WgpuBackend>, size: Vec2, text: &str) {
    let (rect, _) = ui.allocate_exact_size(size, Sense::hover());
    let painter = ui.painter();
    painter.rect_filled(rect, 0.0, vis.palette().background_color32());
    if !text.is_empty() {
        painter.text(
            rect.center(),
            egui::Align2::CENTER_CENTER,
            text,
            egui::FontId::proportional(14.0),
            Color32::GRAY,
        );
    }
}
