/// Default presentation scale: 37 pixels span 100 µm.
pub const DEFAULT_PIXELS_PER_UM: f64 = 37.0 / 100.0;

/// Canvas used by the image generator, in pixels.
pub const DEFAULT_CANVAS_PX: [f64; 2] = [1532.0, 1024.0];

/// Minimum gap between placed droplets, in pixels at the default scale.
pub const DEFAULT_MARGIN_PX: f64 = 2.0;

/// Candidate centres tried per droplet before it is dropped.
pub const MAX_PLACEMENT_ATTEMPTS: usize = 100;

/// Cubic micrometres per microlitre.
pub const CUBIC_UM_PER_UL: f64 = 1e9;

/// Conventional multiplier from limit of detection to limit of quantification.
pub const LOQ_PER_LOD: f64 = 3.3;

/// Standard deviations above the blank used for the limit of detection.
pub const LOD_SIGMA: f64 = 3.0;

/// Prime multiplier used to derive replicate RNG streams from a base seed.
pub const RNG_DERIVATION_PRIME: u64 = 7919;

/// Upper bound on droplets per run; placement is quadratic in the worst case.
pub const MAX_DROPLETS: usize = 1_000_000;
