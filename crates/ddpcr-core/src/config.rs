use crate::constants::{
    CUBIC_UM_PER_UL, DEFAULT_CANVAS_PX, DEFAULT_MARGIN_PX, DEFAULT_PIXELS_PER_UM,
    MAX_PLACEMENT_ATTEMPTS,
};
use crate::statistics::StatisticsEngine;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Volume in µL of a sphere with the given diameter in µm.
pub fn sphere_volume_ul(diameter_um: f64) -> f64 {
    let radius = diameter_um / 2.0;
    (4.0 / 3.0) * PI * radius.powi(3) / CUBIC_UM_PER_UL
}

/// Parameters of an image-style population run: droplets are sized, placed on a
/// canvas, filled and read out.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    /// Deterministic seed for reproducible runs.
    pub seed: u64,
    /// Droplets requested; packing may place fewer.
    pub num_droplets: usize,
    /// Canvas width and height in µm.
    pub canvas_size_um: [f64; 2],
    /// Presentation scale used only when emitting pixel coordinates.
    pub pixels_per_um: f64,
    /// Mean droplet diameter in µm.
    pub mean_diameter_um: f64,
    /// Diameter standard deviation as a fraction of the mean.
    pub diameter_cv: f64,
    /// Diameters are clamped to `mean * (1 ± diameter_clamp_fraction)`.
    pub diameter_clamp_fraction: f64,
    /// Minimum gap between neighbouring droplet edges in µm.
    pub placement_margin_um: f64,
    /// Candidate centres tried per droplet before it is dropped.
    pub max_placement_attempts: usize,
    /// Bulk target concentration in copies/µL.
    pub concentration_copies_per_ul: f64,
    /// Base probability that an occupied droplet reads negative.
    pub false_negative_rate: f64,
    /// Base probability that an empty droplet reads positive.
    pub false_positive_rate: f64,
    /// Two-sided confidence level for the concentration interval.
    pub confidence_level: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            num_droplets: 200,
            canvas_size_um: [
                DEFAULT_CANVAS_PX[0] / DEFAULT_PIXELS_PER_UM,
                DEFAULT_CANVAS_PX[1] / DEFAULT_PIXELS_PER_UM,
            ],
            pixels_per_um: DEFAULT_PIXELS_PER_UM,
            mean_diameter_um: 100.0,
            diameter_cv: 0.1,
            diameter_clamp_fraction: 0.2,
            placement_margin_um: DEFAULT_MARGIN_PX / DEFAULT_PIXELS_PER_UM,
            max_placement_attempts: MAX_PLACEMENT_ATTEMPTS,
            concentration_copies_per_ul: 5.0,
            false_negative_rate: 0.1,
            false_positive_rate: 0.05,
            confidence_level: 0.95,
        }
    }
}

/// Parameters of the closed-form calculator: droplet count follows from the
/// sample volume and no geometry is involved.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssayConfig {
    pub seed: u64,
    /// Partitioned sample volume in µL.
    pub total_volume_ul: f64,
    pub mean_diameter_um: f64,
    pub diameter_cv: f64,
    pub diameter_clamp_fraction: f64,
    pub concentration_copies_per_ul: f64,
    pub false_negative_rate: f64,
    pub false_positive_rate: f64,
    pub confidence_level: f64,
}

impl Default for AssayConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            total_volume_ul: 20.0,
            mean_diameter_um: 100.0,
            diameter_cv: 0.1,
            diameter_clamp_fraction: 0.2,
            concentration_copies_per_ul: 5.0,
            false_negative_rate: 0.1,
            false_positive_rate: 0.05,
            confidence_level: 0.95,
        }
    }
}

macro_rules! define_config_error {
    (
        $(
            $variant:ident $( { $($field:ident : $type:ty),* } )? => $fmt:literal $(, $arg:expr)*
        );* $(;)?
    ) => {
        #[derive(Debug, Clone, PartialEq)]
        pub enum ConfigError {
            $(
                $variant $( { $($field : $type),* } )?,
            )*
        }

        impl std::fmt::Display for ConfigError {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        Self::$variant $( { $($field),* } )? => write!(f, $fmt $(, $arg)*),
                    )*
                }
            }
        }
    };
}

define_config_error! {
    InvalidNumDroplets => "num_droplets must be greater than 0";
    TooManyDroplets { max: usize, actual: usize } => "Too many droplets: {} > max {}", actual, max;
    InvalidCanvasSize => "canvas_size_um must be positive and finite in both dimensions";
    InvalidPixelsPerUm => "pixels_per_um must be positive and finite";
    InvalidMeanDiameter => "mean_diameter_um must be positive and finite";
    InvalidDiameterCv => "diameter_cv must be finite and non-negative";
    InvalidDiameterClampFraction => "diameter_clamp_fraction must be finite and within [0,1)";
    InvalidPlacementMargin => "placement_margin_um must be finite and non-negative";
    InvalidMaxPlacementAttempts => "max_placement_attempts must be positive";
    InvalidConcentration => "concentration_copies_per_ul must be finite and non-negative";
    InvalidFalseNegativeRate => "false_negative_rate must be finite and within [0,1]";
    InvalidFalsePositiveRate => "false_positive_rate must be finite and within [0,1)";
    ErrorRateBudgetExceeded { worst_case: f64 } => "size-scaled error rate can reach {worst_case:.3}; lower the base rates or the clamp fraction";
    InvalidConfidenceLevel => "confidence_level must be finite and within (0,1)";
    InvalidTotalVolume => "total_volume_ul must be finite and hold at least one droplet";
}

impl std::error::Error for ConfigError {}

impl SimConfig {
    pub const MAX_DROPLETS: usize = crate::constants::MAX_DROPLETS;

    /// Boundary check for front-ends. The simulation itself only clamps.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_counts()?;
        self.validate_canvas()?;
        validate_droplet_model(&self.droplet_model())?;
        if !(self.confidence_level.is_finite()
            && self.confidence_level > 0.0
            && self.confidence_level < 1.0)
        {
            return Err(ConfigError::InvalidConfidenceLevel);
        }
        Ok(())
    }

    fn validate_counts(&self) -> Result<(), ConfigError> {
        if self.num_droplets == 0 {
            return Err(ConfigError::InvalidNumDroplets);
        }
        if self.num_droplets > Self::MAX_DROPLETS {
            return Err(ConfigError::TooManyDroplets {
                max: Self::MAX_DROPLETS,
                actual: self.num_droplets,
            });
        }
        if self.max_placement_attempts == 0 {
            return Err(ConfigError::InvalidMaxPlacementAttempts);
        }
        Ok(())
    }

    fn validate_canvas(&self) -> Result<(), ConfigError> {
        if !self.canvas_size_um.iter().all(|s| s.is_finite() && *s > 0.0) {
            return Err(ConfigError::InvalidCanvasSize);
        }
        if !(self.pixels_per_um.is_finite() && self.pixels_per_um > 0.0) {
            return Err(ConfigError::InvalidPixelsPerUm);
        }
        if !(self.placement_margin_um.is_finite() && self.placement_margin_um >= 0.0) {
            return Err(ConfigError::InvalidPlacementMargin);
        }
        Ok(())
    }

    pub(crate) fn droplet_model(&self) -> DropletModel {
        DropletModel {
            mean_diameter_um: self.mean_diameter_um,
            diameter_cv: self.diameter_cv,
            diameter_clamp_fraction: self.diameter_clamp_fraction,
            concentration_copies_per_ul: self.concentration_copies_per_ul,
            false_negative_rate: self.false_negative_rate,
            false_positive_rate: self.false_positive_rate,
        }
    }

    /// Volume of a droplet at the configured mean diameter.
    pub fn nominal_droplet_volume_ul(&self) -> f64 {
        sphere_volume_ul(self.mean_diameter_um)
    }

    /// λ of a droplet at the configured mean diameter.
    pub fn nominal_occupancy(&self) -> f64 {
        self.concentration_copies_per_ul * self.nominal_droplet_volume_ul()
    }

    pub fn statistics_engine(&self) -> StatisticsEngine {
        StatisticsEngine {
            false_positive_rate: self.false_positive_rate,
            confidence_level: self.confidence_level,
            single_droplet_volume_ul: self.nominal_droplet_volume_ul(),
            expected_occupancy: self.nominal_occupancy(),
        }
    }
}

impl AssayConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_droplet_model(&self.droplet_model())?;
        if !(self.confidence_level.is_finite()
            && self.confidence_level > 0.0
            && self.confidence_level < 1.0)
        {
            return Err(ConfigError::InvalidConfidenceLevel);
        }
        if !self.total_volume_ul.is_finite() {
            return Err(ConfigError::InvalidTotalVolume);
        }
        let droplets = self.droplet_count();
        if droplets == 0 {
            return Err(ConfigError::InvalidTotalVolume);
        }
        if droplets > SimConfig::MAX_DROPLETS {
            return Err(ConfigError::TooManyDroplets {
                max: SimConfig::MAX_DROPLETS,
                actual: droplets,
            });
        }
        Ok(())
    }

    pub(crate) fn droplet_model(&self) -> DropletModel {
        DropletModel {
            mean_diameter_um: self.mean_diameter_um,
            diameter_cv: self.diameter_cv,
            diameter_clamp_fraction: self.diameter_clamp_fraction,
            concentration_copies_per_ul: self.concentration_copies_per_ul,
            false_negative_rate: self.false_negative_rate,
            false_positive_rate: self.false_positive_rate,
        }
    }

    pub fn nominal_droplet_volume_ul(&self) -> f64 {
        sphere_volume_ul(self.mean_diameter_um)
    }

    pub fn nominal_occupancy(&self) -> f64 {
        self.concentration_copies_per_ul * self.nominal_droplet_volume_ul()
    }

    pub fn statistics_engine(&self) -> StatisticsEngine {
        StatisticsEngine {
            false_positive_rate: self.false_positive_rate,
            confidence_level: self.confidence_level,
            single_droplet_volume_ul: self.nominal_droplet_volume_ul(),
            expected_occupancy: self.nominal_occupancy(),
        }
    }

    /// Number of nominal droplets that fit in the sample volume.
    pub fn droplet_count(&self) -> usize {
        let single = self.nominal_droplet_volume_ul();
        if !(single > 0.0 && self.total_volume_ul > 0.0) {
            return 0;
        }
        (self.total_volume_ul / single).floor() as usize
    }
}

/// Size and readout parameters shared by both run kinds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct DropletModel {
    pub mean_diameter_um: f64,
    pub diameter_cv: f64,
    pub diameter_clamp_fraction: f64,
    pub concentration_copies_per_ul: f64,
    pub false_negative_rate: f64,
    pub false_positive_rate: f64,
}

impl DropletModel {
    /// Largest diameter / population-mean ratio the clamp band allows.
    fn max_relative_size(&self) -> f64 {
        (1.0 + self.diameter_clamp_fraction) / (1.0 - self.diameter_clamp_fraction)
    }
}

fn validate_droplet_model(model: &DropletModel) -> Result<(), ConfigError> {
    if !(model.mean_diameter_um.is_finite() && model.mean_diameter_um > 0.0) {
        return Err(ConfigError::InvalidMeanDiameter);
    }
    if !(model.diameter_cv.is_finite() && model.diameter_cv >= 0.0) {
        return Err(ConfigError::InvalidDiameterCv);
    }
    if !(model.diameter_clamp_fraction.is_finite()
        && (0.0..1.0).contains(&model.diameter_clamp_fraction))
    {
        return Err(ConfigError::InvalidDiameterClampFraction);
    }
    if !(model.concentration_copies_per_ul.is_finite() && model.concentration_copies_per_ul >= 0.0)
    {
        return Err(ConfigError::InvalidConcentration);
    }
    if !(model.false_negative_rate.is_finite()
        && (0.0..=1.0).contains(&model.false_negative_rate))
    {
        return Err(ConfigError::InvalidFalseNegativeRate);
    }
    if !(model.false_positive_rate.is_finite()
        && (0.0..1.0).contains(&model.false_positive_rate))
    {
        return Err(ConfigError::InvalidFalsePositiveRate);
    }
    let worst_case = model.false_negative_rate.max(model.false_positive_rate)
        * model.max_relative_size();
    if worst_case > 1.0 {
        return Err(ConfigError::ErrorRateBudgetExceeded { worst_case });
    }
    Ok(())
}
