use crate::config::{sphere_volume_ul, AssayConfig, DropletModel, SimConfig};
use crate::corruption::CorruptionModel;
use crate::droplet::Droplet;
use crate::geometry::{pack_circles, Canvas, PackingRules};
use crate::occupancy::{draw_true_count, expected_occupancy, OccupancyError};
use crate::rng::derive_replicate_rng;
use crate::statistics::{PopulationSummary, StatsError};
use rand::Rng;
use rand_distr::{Distribution, Normal};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("diameter distribution N({mean}, {std_dev}) is not valid")]
    InvalidDiameterSpread { mean: f64, std_dev: f64 },
    #[error(transparent)]
    Occupancy(#[from] OccupancyError),
    #[error(transparent)]
    Stats(#[from] StatsError),
}

/// Outcome of an image-style run. Packing may place fewer droplets than were
/// requested; only placed droplets are kept.
#[derive(Clone, Debug)]
pub struct PopulationRun {
    pub requested_count: usize,
    pub placed_count: usize,
    pub droplets: Vec<Droplet>,
}

impl PopulationRun {
    pub fn packing_shortfall(&self) -> usize {
        self.requested_count - self.placed_count
    }

    pub fn summarize(&self, config: &SimConfig) -> Result<PopulationSummary, StatsError> {
        config.statistics_engine().summarize(&self.droplets)
    }
}

/// Outcome of the closed-form calculator: every droplet is kept, none placed.
#[derive(Clone, Debug)]
pub struct AssayRun {
    pub target_volume_ul: f64,
    pub droplets: Vec<Droplet>,
}

impl AssayRun {
    pub fn summarize(&self, config: &AssayConfig) -> Result<PopulationSummary, StatsError> {
        config.statistics_engine().summarize(&self.droplets)
    }
}

/// A droplet whose size and content are fixed but which has not been read.
#[derive(Clone, Copy, Debug)]
struct DropletDraft {
    id: usize,
    diameter_um: f64,
    true_count: u64,
}

/// Size, fill, place and read out `config.num_droplets` droplets.
pub fn simulate_population<R: Rng + ?Sized>(
    config: &SimConfig,
    rng: &mut R,
) -> Result<PopulationRun, SimulationError> {
    let model = config.droplet_model();
    log::info!(
        "simulating {} droplets (mean {:.1} um, {} copies/uL)",
        config.num_droplets,
        model.mean_diameter_um,
        model.concentration_copies_per_ul
    );
    let drafts = draw_drafts(rng, &model, config.num_droplets)?;

    let radii: Vec<f64> = drafts.iter().map(|d| d.diameter_um / 2.0).collect();
    let rules = PackingRules {
        margin: config.placement_margin_um,
        max_attempts: config.max_placement_attempts,
    };
    let placements = pack_circles(rng, Canvas::new(config.canvas_size_um), &radii, rules);
    let placed: Vec<(DropletDraft, Option<[f64; 2]>)> = drafts
        .into_iter()
        .zip(placements)
        .filter(|(_, position)| position.is_some())
        .collect();

    let placed_count = placed.len();
    if placed_count < config.num_droplets {
        log::warn!(
            "packing placed {placed_count} of {} droplets",
            config.num_droplets
        );
    }

    let droplets = read_out(rng, &model, placed);
    log::info!("population finalized with {placed_count} droplets");
    Ok(PopulationRun {
        requested_count: config.num_droplets,
        placed_count,
        droplets,
    })
}

/// Size, fill and read out the droplets a sample volume partitions into.
pub fn simulate_assay<R: Rng + ?Sized>(
    config: &AssayConfig,
    rng: &mut R,
) -> Result<AssayRun, SimulationError> {
    let model = config.droplet_model();
    let count = config.droplet_count();
    log::info!(
        "partitioning {:.2} uL into {count} droplets",
        config.total_volume_ul
    );
    let drafts = draw_drafts(rng, &model, count)?;
    let unplaced = drafts.into_iter().map(|d| (d, None)).collect();
    Ok(AssayRun {
        target_volume_ul: config.total_volume_ul,
        droplets: read_out(rng, &model, unplaced),
    })
}

/// Independent seeded runs of the same configuration, summarized.
pub fn simulate_replicates(
    config: &SimConfig,
    runs: usize,
) -> Result<Vec<PopulationSummary>, SimulationError> {
    (0..runs)
        .map(|replicate| -> Result<PopulationSummary, SimulationError> {
            let mut rng = derive_replicate_rng(config.seed, replicate);
            let run = simulate_population(config, &mut rng)?;
            Ok(run.summarize(config)?)
        })
        .collect()
}

fn draw_drafts<R: Rng + ?Sized>(
    rng: &mut R,
    model: &DropletModel,
    count: usize,
) -> Result<Vec<DropletDraft>, SimulationError> {
    let diameters = draw_diameters(rng, model, count)?;
    let drafts = diameters
        .into_iter()
        .enumerate()
        .map(|(id, diameter_um)| -> Result<DropletDraft, OccupancyError> {
            let lambda = expected_occupancy(
                model.concentration_copies_per_ul,
                sphere_volume_ul(diameter_um),
            );
            Ok(DropletDraft {
                id,
                diameter_um,
                true_count: draw_true_count(rng, lambda)?,
            })
        })
        .collect::<Result<Vec<_>, OccupancyError>>()?;
    log::debug!(
        "{} of {count} droplets drawn occupied",
        drafts.iter().filter(|d| d.true_count > 0).count()
    );
    Ok(drafts)
}

/// Normal diameters clamped into `mean * (1 ± clamp_fraction)`.
fn draw_diameters<R: Rng + ?Sized>(
    rng: &mut R,
    model: &DropletModel,
    count: usize,
) -> Result<Vec<f64>, SimulationError> {
    let mean = model.mean_diameter_um;
    let std_dev = mean * model.diameter_cv;
    let normal = Normal::new(mean, std_dev)
        .map_err(|_| SimulationError::InvalidDiameterSpread { mean, std_dev })?;
    let lower = (mean * (1.0 - model.diameter_clamp_fraction)).max(f64::MIN_POSITIVE);
    let upper = mean * (1.0 + model.diameter_clamp_fraction);
    Ok((0..count)
        .map(|_| normal.sample(rng).max(lower).min(upper))
        .collect())
}

/// Apply the readout model against the mean diameter of the kept droplets.
fn read_out<R: Rng + ?Sized>(
    rng: &mut R,
    model: &DropletModel,
    kept: Vec<(DropletDraft, Option<[f64; 2]>)>,
) -> Vec<Droplet> {
    if kept.is_empty() {
        return Vec::new();
    }
    let mean_diameter =
        kept.iter().map(|(d, _)| d.diameter_um).sum::<f64>() / kept.len() as f64;
    let corruption = CorruptionModel::new(model.false_negative_rate, model.false_positive_rate);
    kept.into_iter()
        .map(|(draft, position)| {
            let call = corruption.observe(rng, draft.true_count, draft.diameter_um, mean_diameter);
            Droplet::new(draft.id, draft.diameter_um, position, draft.true_count, call)
        })
        .collect()
}
