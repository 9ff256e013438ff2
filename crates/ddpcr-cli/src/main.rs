use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ddpcr_core::config::{AssayConfig, SimConfig};
use ddpcr_core::layout::{droplet_records, PixelTransform};
use ddpcr_core::occupancy::PoissonPartition;
use ddpcr_core::population::{simulate_assay, simulate_population, simulate_replicates};
use ddpcr_core::rng::create_rng;
use ddpcr_core::statistics::PopulationSummary;
use serde::de::DeserializeOwned;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "ddpcr")]
#[command(about = "Digital droplet PCR simulation CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a placed droplet population from a config file
    Run {
        /// Path to config file (JSON)
        #[arg(long)]
        config: PathBuf,

        /// Output directory for summary.json and droplets.json (optional)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Estimate statistics for a partitioned sample volume
    Assay {
        /// Path to assay config file (JSON)
        #[arg(long)]
        config: PathBuf,

        /// Output directory for summary.json (optional)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Compare the drawn empty-droplet fraction with the Poisson prediction
    Poisson {
        /// Number of droplets
        #[arg(long, default_value_t = 10_000)]
        droplets: usize,

        /// Total target copies spread over the droplets
        #[arg(long, default_value_t = 5_000.0)]
        copies: f64,

        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Repeat a population run with independent seeds
    Replicates {
        /// Path to config file (JSON)
        #[arg(long)]
        config: PathBuf,

        /// Number of runs
        #[arg(long, default_value_t = 10)]
        runs: usize,
    },
    /// Dump the default configuration to stdout
    DumpDefaultConfig {
        /// Dump the assay calculator config instead
        #[arg(long)]
        assay: bool,
    },
}

fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let file = File::open(path).context("failed to open config file")?;
    serde_json::from_reader(BufReader::new(file)).context("failed to parse config")
}

fn write_json<T: serde::Serialize>(dir: &Path, name: &str, value: &T) -> Result<()> {
    std::fs::create_dir_all(dir).context("failed to create output directory")?;
    let file = File::create(dir.join(name)).with_context(|| format!("failed to create {name}"))?;
    serde_json::to_writer_pretty(file, value).with_context(|| format!("failed to write {name}"))
}

fn print_summary(summary: &PopulationSummary) {
    let counts = &summary.counts;
    println!("Droplets:          {}", summary.total_droplets);
    println!("  true positive:   {}", counts.true_positive);
    println!("  false positive:  {}", counts.false_positive);
    println!("  true negative:   {}", counts.true_negative);
    println!("  false negative:  {}", counts.false_negative);
    println!(
        "  FP / FN rate:    {:.1}% / {:.1}%",
        summary.false_positive_fraction * 100.0,
        summary.false_negative_fraction * 100.0
    );
    println!(
        "Diameter:          {:.1} um (sd {:.1} um, CV {:.1}%)",
        summary.diameter.mean_um,
        summary.diameter.std_dev_um,
        summary.diameter.cv * 100.0
    );
    println!(
        "Empty ratio:       {:.3} (actual) vs {:.3} (theoretical)",
        summary.empty_ratio.actual, summary.empty_ratio.theoretical
    );
    println!("LOD:               {:.2} copies/uL", summary.lod_copies_per_ul);
    println!("LOQ:               {:.2} copies/uL", summary.loq_copies_per_ul);
    let ci = &summary.concentration;
    println!(
        "Concentration:     {:.2} copies/uL ({:.0}% CI {:.2} - {:.2})",
        ci.estimate,
        ci.confidence_level * 100.0,
        ci.lower,
        ci.upper
    );
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::DumpDefaultConfig { assay } => {
            let json = if assay {
                serde_json::to_string_pretty(&AssayConfig::default())?
            } else {
                serde_json::to_string_pretty(&SimConfig::default())?
            };
            println!("{json}");
        }
        Commands::Run { config, out } => {
            let sim_config: SimConfig = load_config(&config)?;
            sim_config.validate().context("Config validation error")?;
            log::info!("loaded config from {}", config.display());

            let mut rng = create_rng(sim_config.seed);
            let run = simulate_population(&sim_config, &mut rng)?;
            let summary = run.summarize(&sim_config)?;
            println!(
                "Placed {} of {} requested droplets",
                run.placed_count, run.requested_count
            );
            print_summary(&summary);

            if let Some(out_dir) = out {
                let transform = PixelTransform::new(sim_config.pixels_per_um);
                write_json(&out_dir, "summary.json", &summary)?;
                write_json(
                    &out_dir,
                    "droplets.json",
                    &droplet_records(&run.droplets, transform),
                )?;
                println!("Results saved to {}", out_dir.display());
            }
        }
        Commands::Assay { config, out } => {
            let assay_config: AssayConfig = load_config(&config)?;
            assay_config
                .validate()
                .context("Assay config validation error")?;

            let mut rng = create_rng(assay_config.seed);
            let run = simulate_assay(&assay_config, &mut rng)?;
            let summary = run.summarize(&assay_config)?;
            println!(
                "Target volume:     {:.2} uL (actual {:.2} uL)",
                run.target_volume_ul, summary.total_volume_ul
            );
            print_summary(&summary);

            if let Some(out_dir) = out {
                write_json(&out_dir, "summary.json", &summary)?;
                println!("Results saved to {}", out_dir.display());
            }
        }
        Commands::Poisson {
            droplets,
            copies,
            seed,
        } => {
            let mut partition = PoissonPartition::new(droplets);
            let lambda = partition.set_lambda_from_copies(copies)?;
            partition.simulate(&mut create_rng(seed))?;
            let ratio = partition.empty_ratio()?;
            println!("lambda = {lambda:.3}");
            println!(
                "Empty ratio: {:.3} (actual) vs {:.3} (theoretical)",
                ratio.actual, ratio.theoretical
            );
            for bin in partition.copy_number_histogram()? {
                println!(
                    "  {:>3} copies: {:.3} observed, {:.3} Poisson",
                    bin.copies, bin.observed_fraction, bin.poisson_pmf
                );
            }
        }
        Commands::Replicates { config, runs } => {
            let sim_config: SimConfig = load_config(&config)?;
            sim_config.validate().context("Config validation error")?;
            let summaries = simulate_replicates(&sim_config, runs)?;
            for (i, summary) in summaries.iter().enumerate() {
                println!(
                    "run {i:>3}: {} droplets, empty {:.3} vs {:.3}, {:.2} copies/uL",
                    summary.total_droplets,
                    summary.empty_ratio.actual,
                    summary.empty_ratio.theoretical,
                    summary.concentration.estimate
                );
            }
        }
    }
    Ok(())
}
