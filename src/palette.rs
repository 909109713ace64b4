//! Layer colors and blend modes for the die renderer

use crate::constants::MAX_LAYERS;
use serde::{Deserialize, Serialize};

/// How layers are composited onto the render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum BlendMode {
    #[default]
    Alpha,
    Additive,
}

/// RGBA color per layer plus the clear color of the render target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Palette {
    pub colors: [[f32; 4]; MAX_LAYERS],
    pub background: [f32; 4],
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            colors: [
                [0.96, 0.00, 0.34, 1.0], // pink
                [1.00, 0.92, 0.23, 1.0], // yellow
                [1.00, 0.32, 0.32, 1.0], // red
                [0.49, 0.34, 0.76, 0.7], // purple
                [0.98, 0.55, 0.00, 0.7], // orange
                [0.00, 0.69, 1.00, 1.0], // blue
            ],
            background: [0.1, 0.1, 0.15, 1.0],
        }
    }
}

impl Palette {
    /// Color for a layer, or `None` when the index is out of range
    pub fn layer_color(&self, layer: usize) -> Option<[f32; 4]> {
        self.colors.get(layer).copied()
    }

    /// Convert the background color into an egui color for UI fills
    pub fn background_color32(&self) -> egui::Color32 {
        let [r, g, b, a] = self.background;
        egui::Rgba::from_rgba_unmultiplied(r, g, b, a).into()
    }
}
