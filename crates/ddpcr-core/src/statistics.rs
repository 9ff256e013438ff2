use crate::constants::{LOD_SIGMA, LOQ_PER_LOD};
use crate::droplet::{Classification, Droplet};
use crate::occupancy::EmptyRatio;
use serde::{Deserialize, Serialize};
use statrs::distribution::{Binomial, DiscreteCDF};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    #[error("confidence_level must be within (0,1), got {0}")]
    InvalidConfidenceLevel(f64),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionCounts {
    pub fn from_droplets(droplets: &[Droplet]) -> Self {
        let mut counts = Self::default();
        for droplet in droplets {
            match droplet.classification() {
                Classification::TruePositive => counts.true_positive += 1,
                Classification::FalsePositive => counts.false_positive += 1,
                Classification::TrueNegative => counts.true_negative += 1,
                Classification::FalseNegative => counts.false_negative += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }

    /// Droplets the reader calls positive, right or wrong.
    pub fn observed_positive(&self) -> usize {
        self.true_positive + self.false_positive
    }

    /// False positives over all droplets; zero for an empty population.
    pub fn false_positive_fraction(&self) -> f64 {
        fraction(self.false_positive, self.total())
    }

    /// False negatives over all droplets; zero for an empty population.
    pub fn false_negative_fraction(&self) -> f64 {
        fraction(self.false_negative, self.total())
    }
}

fn fraction(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Number-weighted diameter statistics (population standard deviation).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DiameterStats {
    pub mean_um: f64,
    pub std_dev_um: f64,
    pub cv: f64,
}

impl DiameterStats {
    pub fn from_droplets(droplets: &[Droplet]) -> Self {
        if droplets.is_empty() {
            return Self::default();
        }
        let n = droplets.len() as f64;
        let mean = droplets.iter().map(Droplet::diameter_um).sum::<f64>() / n;
        let variance = droplets
            .iter()
            .map(|d| (d.diameter_um() - mean).powi(2))
            .sum::<f64>()
            / n;
        let std_dev = variance.sqrt();
        Self {
            mean_um: mean,
            std_dev_um: std_dev,
            cv: if mean > 0.0 { std_dev / mean } else { 0.0 },
        }
    }
}

/// Fraction of truly empty droplets against `exp(-λ)`. The actual side is
/// zero for an empty population.
pub fn empty_ratio(droplets: &[Droplet], lambda: f64) -> EmptyRatio {
    let empty = droplets.iter().filter(|d| !d.is_occupied()).count();
    EmptyRatio {
        actual: fraction(empty, droplets.len()),
        theoretical: (-lambda).exp(),
    }
}

/// Rate of a blank sample that reads positive with `false_positive_rate`.
pub fn blank_lambda(false_positive_rate: f64) -> f64 {
    -(-false_positive_rate).ln_1p()
}

/// Limit of detection in copies/µL: three standard deviations above the blank.
pub fn detection_limit(false_positive_rate: f64, single_droplet_volume_ul: f64) -> f64 {
    if single_droplet_volume_ul <= 0.0 {
        return 0.0;
    }
    let blank = blank_lambda(false_positive_rate);
    (blank + LOD_SIGMA * blank.sqrt()) / single_droplet_volume_ul
}

pub fn quantification_limit(lod: f64) -> f64 {
    LOQ_PER_LOD * lod
}

/// Concentration in copies/µL recovered from a positive fraction.
///
/// Saturated partitions (ratio 1) recover an infinite concentration.
pub fn concentration_from_ratio(positive_ratio: f64, single_droplet_volume_ul: f64) -> f64 {
    if single_droplet_volume_ul <= 0.0 {
        return 0.0;
    }
    -(-positive_ratio).ln_1p() / single_droplet_volume_ul
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConcentrationInterval {
    pub lower: f64,
    pub estimate: f64,
    pub upper: f64,
    pub confidence_level: f64,
}

/// Binomial interval on the positive count, mapped through the Poisson
/// recovery formula bound by bound. All zero for an empty population.
pub fn concentration_interval(
    positive: usize,
    total: usize,
    confidence_level: f64,
    single_droplet_volume_ul: f64,
) -> Result<ConcentrationInterval, StatsError> {
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(StatsError::InvalidConfidenceLevel(confidence_level));
    }
    if total == 0 {
        return Ok(ConcentrationInterval {
            confidence_level,
            ..ConcentrationInterval::default()
        });
    }
    let n = total as f64;
    let ratio = positive as f64 / n;
    let (low_count, high_count) = binomial_interval(confidence_level, total as u64, ratio);
    Ok(ConcentrationInterval {
        lower: concentration_from_ratio(low_count as f64 / n, single_droplet_volume_ul),
        estimate: concentration_from_ratio(ratio, single_droplet_volume_ul),
        upper: concentration_from_ratio(high_count as f64 / n, single_droplet_volume_ul),
        confidence_level,
    })
}

/// Equal-tailed interval of Binomial(n, p): the `(1-c)/2` and `(1+c)/2` quantiles.
fn binomial_interval(confidence_level: f64, n: u64, p: f64) -> (u64, u64) {
    let tail = (1.0 - confidence_level) / 2.0;
    match Binomial::new(p, n) {
        Ok(dist) => (
            binomial_quantile(&dist, n, tail),
            binomial_quantile(&dist, n, 1.0 - tail),
        ),
        // p is a ratio of counts and always valid; fall back to the point.
        Err(_) => {
            let k = (p * n as f64).round() as u64;
            (k, k)
        }
    }
}

/// Smallest k with P(X ≤ k) ≥ q.
fn binomial_quantile(dist: &Binomial, n: u64, q: f64) -> u64 {
    let (mut low, mut high) = (0u64, n);
    while low < high {
        let mid = low + (high - low) / 2;
        if dist.cdf(mid) >= q {
            high = mid;
        } else {
            low = mid + 1;
        }
    }
    high
}

/// Aggregate statistics of one finalized population.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PopulationSummary {
    pub total_droplets: usize,
    pub counts: ConfusionCounts,
    pub false_positive_fraction: f64,
    pub false_negative_fraction: f64,
    pub expected_occupancy: f64,
    pub empty_ratio: EmptyRatio,
    pub diameter: DiameterStats,
    /// Sum of droplet volumes in µL.
    pub total_volume_ul: f64,
    pub lod_copies_per_ul: f64,
    pub loq_copies_per_ul: f64,
    pub concentration: ConcentrationInterval,
}

/// The single place population statistics are derived, shared by the image
/// run and the closed-form calculator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatisticsEngine {
    pub false_positive_rate: f64,
    pub confidence_level: f64,
    /// Nominal droplet volume used for LOD and concentration recovery.
    pub single_droplet_volume_ul: f64,
    /// Nominal λ for the empty-ratio check.
    pub expected_occupancy: f64,
}

impl StatisticsEngine {
    pub fn summarize(&self, droplets: &[Droplet]) -> Result<PopulationSummary, StatsError> {
        let counts = ConfusionCounts::from_droplets(droplets);
        let total = counts.total();
        let lod = detection_limit(self.false_positive_rate, self.single_droplet_volume_ul);
        let concentration = concentration_interval(
            counts.observed_positive(),
            total,
            self.confidence_level,
            self.single_droplet_volume_ul,
        )?;
        if total == 0 {
            log::warn!("summarizing an empty droplet population");
        }
        Ok(PopulationSummary {
            total_droplets: total,
            counts,
            false_positive_fraction: counts.false_positive_fraction(),
            false_negative_fraction: counts.false_negative_fraction(),
            expected_occupancy: self.expected_occupancy,
            empty_ratio: empty_ratio(droplets, self.expected_occupancy),
            diameter: DiameterStats::from_droplets(droplets),
            total_volume_ul: droplets.iter().map(Droplet::volume_ul).sum(),
            lod_copies_per_ul: lod,
            loq_copies_per_ul: quantification_limit(lod),
            concentration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sphere_volume_ul;
    use crate::droplet::Call;

    fn droplet(id: usize, diameter: f64, count: u64, call: Call) -> Droplet {
        Droplet::new(id, diameter, None, count, call)
    }

    #[test]
    fn confusion_counts_partition_the_population() {
        let droplets = vec![
            droplet(0, 100.0, 2, Call::Positive),
            droplet(1, 100.0, 1, Call::Negative),
            droplet(2, 100.0, 0, Call::Positive),
            droplet(3, 100.0, 0, Call::Negative),
            droplet(4, 100.0, 0, Call::Negative),
        ];
        let counts = ConfusionCounts::from_droplets(&droplets);
        assert_eq!(
            counts,
            ConfusionCounts {
                true_positive: 1,
                false_positive: 1,
                true_negative: 2,
                false_negative: 1,
            }
        );
        assert_eq!(counts.total(), 5);
        assert_eq!(counts.observed_positive(), 2);
        assert!((counts.false_positive_fraction() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn diameter_stats_use_population_deviation() {
        let droplets = vec![
            droplet(0, 90.0, 0, Call::Negative),
            droplet(1, 110.0, 0, Call::Negative),
        ];
        let stats = DiameterStats::from_droplets(&droplets);
        assert_eq!(stats.mean_um, 100.0);
        assert!((stats.std_dev_um - 10.0).abs() < 1e-12);
        assert!((stats.cv - 0.1).abs() < 1e-12);
        assert_eq!(DiameterStats::from_droplets(&[]), DiameterStats::default());
    }

    #[test]
    fn lod_follows_three_sigma_above_blank() {
        let volume = sphere_volume_ul(100.0);
        let lod = detection_limit(0.05, volume);
        assert!((lod - 1395.599_105_961_059).abs() < 1e-6, "lod {lod}");
        assert_eq!(quantification_limit(lod), 3.3 * lod);
    }

    #[test]
    fn loq_is_always_3_3_times_lod() {
        for fp in [0.0, 0.001, 0.01, 0.05, 0.1, 0.3] {
            for diameter in [50.0, 100.0, 150.0] {
                let lod = detection_limit(fp, sphere_volume_ul(diameter));
                assert_eq!(quantification_limit(lod), LOQ_PER_LOD * lod);
            }
        }
    }

    #[test]
    fn zero_false_positive_rate_gives_zero_lod() {
        assert_eq!(blank_lambda(0.0), 0.0);
        assert_eq!(detection_limit(0.0, sphere_volume_ul(100.0)), 0.0);
    }

    #[test]
    fn zero_volume_is_guarded() {
        assert_eq!(detection_limit(0.05, 0.0), 0.0);
        assert_eq!(concentration_from_ratio(0.5, 0.0), 0.0);
    }

    #[test]
    fn interval_matches_binomial_quantiles() {
        let volume = sphere_volume_ul(100.0);
        let interval = concentration_interval(30, 200, 0.95, volume).unwrap();
        // Binomial(200, 0.15) 2.5% and 97.5% quantiles are 20 and 40.
        assert!((interval.lower - concentration_from_ratio(0.1, volume)).abs() < 1e-9);
        assert!((interval.upper - concentration_from_ratio(0.2, volume)).abs() < 1e-9);
        assert!((interval.estimate - concentration_from_ratio(0.15, volume)).abs() < 1e-9);
    }

    #[test]
    fn interval_brackets_the_estimate() {
        let volume = sphere_volume_ul(120.0);
        for total in [1usize, 7, 50, 333, 5_000] {
            for positive in 1..total.min(60) {
                let interval = concentration_interval(positive, total, 0.95, volume).unwrap();
                assert!(
                    interval.lower <= interval.estimate && interval.estimate <= interval.upper,
                    "{positive}/{total}: {interval:?}"
                );
            }
        }
    }

    #[test]
    fn empty_population_interval_is_zero() {
        let interval = concentration_interval(0, 0, 0.95, sphere_volume_ul(100.0)).unwrap();
        assert_eq!(interval.lower, 0.0);
        assert_eq!(interval.estimate, 0.0);
        assert_eq!(interval.upper, 0.0);
    }

    #[test]
    fn invalid_confidence_level_is_a_configuration_error() {
        assert_eq!(
            concentration_interval(1, 10, 1.5, 1e-3),
            Err(StatsError::InvalidConfidenceLevel(1.5))
        );
    }

    #[test]
    fn summarize_empty_population_reports_zeros() {
        let engine = StatisticsEngine {
            false_positive_rate: 0.05,
            confidence_level: 0.95,
            single_droplet_volume_ul: sphere_volume_ul(100.0),
            expected_occupancy: 0.5,
        };
        let summary = engine.summarize(&[]).unwrap();
        assert_eq!(summary.total_droplets, 0);
        assert_eq!(summary.false_positive_fraction, 0.0);
        assert_eq!(summary.empty_ratio.actual, 0.0);
        assert!((summary.empty_ratio.theoretical - (-0.5f64).exp()).abs() < 1e-12);
        assert_eq!(summary.concentration.upper, 0.0);
        assert!(summary.lod_copies_per_ul > 0.0);
    }
}
