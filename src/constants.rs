//! Fixed dimensions and default values shared across the visualizer

/// Number of silicon layers the renderer knows about
pub const MAX_LAYERS: usize = 6;

/// Size of the node state buffer; node indices live in `[0, MAX_NODES)`
pub const MAX_NODES: usize = 8192;

/// Width of the node lookup texture in texels
pub const NODE_TEXTURE_WIDTH: u32 = 256;

/// Height of the node lookup texture in texels (256 x 32 = 8192 nodes)
pub const NODE_TEXTURE_HEIGHT: u32 = (MAX_NODES as u32) / NODE_TEXTURE_WIDTH;

// Node intensity values written into the lookup texture
pub const NODE_INACTIVE: u8 = 100;
pub const NODE_ACTIVE: u8 = 190;
pub const NODE_HIGHLIGHTED: u8 = 255;

// View defaults
pub const DEFAULT_SCALE: f32 = 9.0;
pub const MIN_SCALE: f32 = 1.0;
pub const MAX_SCALE: f32 = 100.0;

/// Screen pixels per unit of pan offset at scale 1.0
pub const PAN_PIXELS_PER_UNIT: f32 = 500.0;

/// Fraction of the current scale applied per mouse wheel notch
pub const WHEEL_ZOOM_FACTOR: f32 = 0.1;

// Simulation defaults
pub const DEFAULT_CYCLES_PER_FRAME: u32 = 100;
pub const MIN_CYCLES_PER_FRAME: u32 = 10;
pub const MAX_CYCLES_PER_FRAME: u32 = 1000;
pub const DEFAULT_SYNC_HALF_CYCLES: u32 = 20;

/// Half-cycles run right after the simulator is created
pub const STABILIZE_HALF_CYCLES: u32 = 20;

/// Bytes copied into simulated memory per frame: three 3-byte instructions
pub const INSTRUCTION_WINDOW_BYTES: u32 = 9;

/// Status flag bit that has no physical node in the simulated P register
pub const RESERVED_STATUS_BIT: usize = 5;
