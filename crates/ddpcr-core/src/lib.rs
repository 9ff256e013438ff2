pub mod config;
pub mod constants;
pub mod corruption;
pub mod droplet;
pub mod geometry;
pub mod layout;
pub mod occupancy;
pub mod population;
pub mod rng;
pub mod statistics;

pub use config::{AssayConfig, SimConfig};
pub use droplet::{Call, Classification, Droplet};
pub use population::{simulate_assay, simulate_population, AssayRun, PopulationRun};
pub use statistics::{ConcentrationInterval, ConfusionCounts, PopulationSummary};
