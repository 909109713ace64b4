//! Pan and zoom state of the chip view

use glam::Vec2;

use crate::constants::{DEFAULT_SCALE, MAX_SCALE, MIN_SCALE, PAN_PIXELS_PER_UNIT, WHEEL_ZOOM_FACTOR};

/// Manages the view transform applied by the vertex stage
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub offset: Vec2,
    scale: f32,
    min_scale: f32,
    max_scale: f32,
    initial_scale: f32,
    /// Height over width of the render target
    pub aspect: f32,
}

impl ViewState {
    /// Creates a view with the given zoom limits, starting at `initial_scale`
    pub fn new(initial_scale: f32, min_scale: f32, max_scale: f32) -> Self {
        let max_scale = max_scale.max(min_scale);
        Self {
            offset: Vec2::ZERO,
            scale: initial_scale.clamp(min_scale, max_scale),
            min_scale,
            max_scale,
            initial_scale,
            aspect: 1.0,
        }
    }

    pub fn scale(&self) -> f32 {
        self.scale
    }

    pub fn scale_range(&self) -> (f32, f32) {
        (self.min_scale, self.max_scale)
    }

    pub fn set_offset(&mut self, x: f32, y: f32) {
        self.offset = Vec2::new(x, y);
    }

    pub fn add_offset(&mut self, dx: f32, dy: f32) {
        self.offset += Vec2::new(dx, dy);
    }

    pub fn set_scale(&mut self, scale: f32) {
        self.scale = scale.clamp(self.min_scale, self.max_scale);
    }

    pub fn add_scale(&mut self, delta: f32) {
        self.set_scale(self.scale + delta);
    }

    /// Center the die and return to the initial zoom
    pub fn reset(&mut self) {
        self.offset = Vec2::ZERO;
        self.set_scale(self.initial_scale);
    }

    /// Pan by a mouse drag measured in screen pixels
    pub fn pan_by_pixels(&mut self, dx: f32, dy: f32) {
        let units_per_pixel = 1.0 / (self.scale * PAN_PIXELS_PER_UNIT);
        // Screen y grows downwards, clip space y upwards
        self.add_offset(dx * units_per_pixel, -dy * units_per_pixel);
    }

    /// Zoom proportionally to the current scale
    pub fn zoom_by_wheel(&mut self, wheel: f32) {
        self.add_scale(wheel * self.scale * WHEEL_ZOOM_FACTOR);
    }

    /// Update the aspect ratio from the render target size in pixels
    pub fn set_viewport_size(&mut self, width: f32, height: f32) {
        if width > 0.0 && height > 0.0 {
            self.aspect = height / width;
        }
    }

    /// Per-axis scale handed to the vertex stage
    pub fn axis_scale(&self) -> [f32; 2] {
        [self.scale * self.aspect, self.scale]
    }
}

impl Default for ViewState {
    fn default() -> Self {
        Self::new(DEFAULT_SCALE, MIN_SCALE, MAX_SCALE)
    }
}
