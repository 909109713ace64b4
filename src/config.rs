//! Persistent visualizer settings

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::{
    DEFAULT_CYCLES_PER_FRAME, DEFAULT_SCALE, DEFAULT_SYNC_HALF_CYCLES, MAX_CYCLES_PER_FRAME,
    MAX_LAYERS, MAX_SCALE, MIN_CYCLES_PER_FRAME, MIN_SCALE,
};
use crate::palette::{BlendMode, Palette};

const APP_DIR: &str = "chipvis";
const CONFIG_FILE: &str = "config.json";
const LOCAL_CONFIG_FILE: &str = "chipvis.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    pub sim_enabled: bool,
    /// Half-cycles per explicit simulation step
    pub cycles_per_frame: u32,
    /// Half-cycles run while following the emulator
    pub sync_half_cycles: u32,
    pub additive_blend: bool,
    pub initial_scale: f32,
    pub min_scale: f32,
    pub max_scale: f32,
    pub palette: Palette,
    pub layer_visible: [bool; MAX_LAYERS],
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            sim_enabled: true,
            cycles_per_frame: DEFAULT_CYCLES_PER_FRAME,
            sync_half_cycles: DEFAULT_SYNC_HALF_CYCLES,
            additive_blend: false,
            initial_scale: DEFAULT_SCALE,
            min_scale: MIN_SCALE,
            max_scale: MAX_SCALE,
            palette: Palette::default(),
            layer_visible: [true; MAX_LAYERS],
        }
    }
}

impl VisualizerConfig {
    /// User config file, `None` when the platform has no config directory
    pub fn user_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// User config overridden by `./chipvis.json`, defaults when neither loads
    pub fn load() -> Self {
        let candidates = Self::user_path()
            .into_iter()
            .chain(std::iter::once(PathBuf::from(LOCAL_CONFIG_FILE)));

        let mut config = Self::default();
        for path in candidates {
            if !path.exists() {
                continue;
            }
            match Self::load_from(&path) {
                Ok(loaded) => {
                    log::info!("Loaded config from {}", path.display());
                    config = loaded;
                }
                Err(err) => log::warn!("Ignoring config {}: {:#}", path.display(), err),
            }
        }
        config
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: VisualizerConfig =
            serde_json::from_str(&json).context("Failed to parse config JSON")?;
        Ok(config.sanitized())
    }

    /// Write to the user config file
    pub fn save(&self) -> Result<PathBuf> {
        let path = Self::user_path().context("No config directory on this platform")?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }

    pub fn blend_mode(&self) -> BlendMode {
        if self.additive_blend {
            BlendMode::Additive
        } else {
            BlendMode::Alpha
        }
    }

    /// Clamp values a hand-edited file may have pushed out of range
    pub fn sanitized(mut self) -> Self {
        self.cycles_per_frame = self
            .cycles_per_frame
            .clamp(MIN_CYCLES_PER_FRAME, MAX_CYCLES_PER_FRAME);
        self.sync_half_cycles = self.sync_half_cycles.clamp(1, MAX_CYCLES_PER_FRAME);
        if !(self.min_scale > 0.0) {
            self.min_scale = MIN_SCALE;
        }
        if !(self.max_scale >= self.min_scale) {
            self.max_scale = self.min_scale.max(MAX_SCALE);
        }
        self.initial_scale = if self.initial_scale.is_finite() {
            self.initial_scale.clamp(self.min_scale, self.max_scale)
        } else {
            DEFAULT_SCALE.clamp(self.min_scale, self.max_scale)
        };
        self
    }
}
