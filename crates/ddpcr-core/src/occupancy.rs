use rand::Rng;
use rand_distr::{Distribution, Poisson};
use serde::{Deserialize, Serialize};
use statrs::distribution::{Discrete, Poisson as PoissonPmf};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OccupancyError {
    #[error("occupancy rate must be finite, got {0}")]
    NonFiniteRate(f64),
    #[error("occupancy rate {0} is too large to sample")]
    RateTooLarge(f64),
}

/// Expected molecules per droplet, λ = concentration × volume.
pub fn expected_occupancy(concentration_copies_per_ul: f64, volume_ul: f64) -> f64 {
    concentration_copies_per_ul * volume_ul
}

/// Draw a molecule count from Poisson(λ). λ ≤ 0 always yields zero.
pub fn draw_true_count<R: Rng + ?Sized>(rng: &mut R, lambda: f64) -> Result<u64, OccupancyError> {
    if !lambda.is_finite() {
        return Err(OccupancyError::NonFiniteRate(lambda));
    }
    if lambda <= 0.0 {
        return Ok(0);
    }
    let poisson = Poisson::new(lambda).map_err(|_| OccupancyError::RateTooLarge(lambda))?;
    let sample: f64 = poisson.sample(rng);
    Ok(sample as u64)
}

/// P(X = k) for X ~ Poisson(λ), with the degenerate λ = 0 case handled.
pub fn poisson_pmf(lambda: f64, k: u64) -> f64 {
    if lambda <= 0.0 {
        return if k == 0 { 1.0 } else { 0.0 };
    }
    match PoissonPmf::new(lambda) {
        Ok(dist) => dist.pmf(k),
        Err(_) => 0.0,
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PartitionError {
    #[error("lambda must be set before simulating")]
    LambdaNotSet,
    #[error("the partition must be simulated first")]
    NotSimulated,
    #[error("partition needs at least one droplet")]
    NoDroplets,
    #[error(transparent)]
    Occupancy(#[from] OccupancyError),
}

/// Empty-droplet fraction drawn versus `exp(-λ)`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EmptyRatio {
    pub actual: f64,
    pub theoretical: f64,
}

impl EmptyRatio {
    pub fn deviation(&self) -> f64 {
        (self.actual - self.theoretical).abs()
    }
}

/// One bar of the copy-number histogram with its Poisson reference.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CopyNumberBin {
    pub copies: u64,
    pub observed_fraction: f64,
    pub poisson_pmf: f64,
}

/// A fixed number of equal droplets sharing one rate, without geometry or
/// readout error.
#[derive(Clone, Debug)]
pub struct PoissonPartition {
    n_droplets: usize,
    lambda: Option<f64>,
    counts: Option<Vec<u64>>,
}

impl PoissonPartition {
    pub fn new(n_droplets: usize) -> Self {
        Self {
            n_droplets,
            lambda: None,
            counts: None,
        }
    }

    pub fn n_droplets(&self) -> usize {
        self.n_droplets
    }

    pub fn lambda(&self) -> Option<f64> {
        self.lambda
    }

    pub fn counts(&self) -> Option<&[u64]> {
        self.counts.as_deref()
    }

    /// λ = total copies spread over all droplets.
    pub fn set_lambda_from_copies(&mut self, total_copies: f64) -> Result<f64, PartitionError> {
        if self.n_droplets == 0 {
            return Err(PartitionError::NoDroplets);
        }
        Ok(self.set_lambda(total_copies / self.n_droplets as f64))
    }

    /// λ = concentration × droplet volume.
    pub fn set_lambda_from_concentration(
        &mut self,
        concentration_copies_per_ul: f64,
        droplet_volume_ul: f64,
    ) -> f64 {
        self.set_lambda(expected_occupancy(
            concentration_copies_per_ul,
            droplet_volume_ul,
        ))
    }

    fn set_lambda(&mut self, lambda: f64) -> f64 {
        self.lambda = Some(lambda);
        self.counts = None;
        lambda
    }

    pub fn simulate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<&[u64], PartitionError> {
        let lambda = self.lambda.ok_or(PartitionError::LambdaNotSet)?;
        let counts = (0..self.n_droplets)
            .map(|_| draw_true_count(rng, lambda))
            .collect::<Result<Vec<_>, _>>()?;
        log::debug!(
            "simulated {} droplets at lambda={lambda:.4}",
            self.n_droplets
        );
        let counts = self.counts.insert(counts);
        Ok(counts.as_slice())
    }

    pub fn empty_ratio(&self) -> Result<EmptyRatio, PartitionError> {
        let (lambda, counts) = self.simulated()?;
        if counts.is_empty() {
            return Err(PartitionError::NoDroplets);
        }
        let empty = counts.iter().filter(|&&c| c == 0).count();
        Ok(EmptyRatio {
            actual: empty as f64 / counts.len() as f64,
            theoretical: (-lambda).exp(),
        })
    }

    /// Observed copy-number frequencies for k = 0..=max(3, largest draw).
    pub fn copy_number_histogram(&self) -> Result<Vec<CopyNumberBin>, PartitionError> {
        let (lambda, counts) = self.simulated()?;
        if counts.is_empty() {
            return Err(PartitionError::NoDroplets);
        }
        let max_copies = counts.iter().copied().max().unwrap_or(0).max(3);
        let mut tally = vec![0usize; max_copies as usize + 1];
        for &c in counts {
            tally[c as usize] += 1;
        }
        let total = counts.len() as f64;
        Ok(tally
            .iter()
            .enumerate()
            .map(|(k, &n)| CopyNumberBin {
                copies: k as u64,
                observed_fraction: n as f64 / total,
                poisson_pmf: poisson_pmf(lambda, k as u64),
            })
            .collect())
    }

    fn simulated(&self) -> Result<(f64, &[u64]), PartitionError> {
        let lambda = self.lambda.ok_or(PartitionError::LambdaNotSet)?;
        let counts = self.counts.as_deref().ok_or(PartitionError::NotSimulated)?;
        Ok((lambda, counts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::create_rng;

    #[test]
    fn zero_rate_always_draws_zero() {
        let mut rng = create_rng(0);
        for _ in 0..100 {
            assert_eq!(draw_true_count(&mut rng, 0.0), Ok(0));
        }
    }

    #[test]
    fn non_finite_rate_is_rejected() {
        let mut rng = create_rng(0);
        assert!(matches!(
            draw_true_count(&mut rng, f64::NAN),
            Err(OccupancyError::NonFiniteRate(_))
        ));
    }

    #[test]
    fn sample_mean_tracks_rate() {
        let mut rng = create_rng(5);
        let n = 20_000;
        let total: u64 = (0..n)
            .map(|_| draw_true_count(&mut rng, 2.5).unwrap())
            .sum();
        let mean = total as f64 / n as f64;
        assert!((mean - 2.5).abs() < 0.05, "mean {mean}");
    }

    #[test]
    fn simulate_requires_lambda() {
        let mut partition = PoissonPartition::new(10);
        let mut rng = create_rng(1);
        assert_eq!(
            partition.simulate(&mut rng).unwrap_err(),
            PartitionError::LambdaNotSet
        );
        assert_eq!(
            partition.empty_ratio().unwrap_err(),
            PartitionError::LambdaNotSet
        );
    }

    #[test]
    fn empty_ratio_requires_simulation() {
        let mut partition = PoissonPartition::new(10);
        partition.set_lambda_from_copies(5.0).unwrap();
        assert_eq!(
            partition.empty_ratio().unwrap_err(),
            PartitionError::NotSimulated
        );
    }

    #[test]
    fn resetting_lambda_discards_previous_draws() {
        let mut partition = PoissonPartition::new(10);
        partition.set_lambda_from_copies(5.0).unwrap();
        partition.simulate(&mut create_rng(1)).unwrap();
        partition.set_lambda_from_concentration(1000.0, 1e-3);
        assert_eq!(partition.lambda(), Some(1.0));
        assert!(partition.counts().is_none());
    }

    #[test]
    fn empty_ratio_converges_to_poisson_prediction() {
        for seed in 0..5 {
            let mut partition = PoissonPartition::new(10_000);
            let lambda = partition.set_lambda_from_copies(5_000.0).unwrap();
            assert_eq!(lambda, 0.5);
            partition.simulate(&mut create_rng(seed)).unwrap();
            let ratio = partition.empty_ratio().unwrap();
            assert!((ratio.theoretical - 0.606_530_659_712_633_4).abs() < 1e-12);
            assert!(ratio.deviation() < 0.02, "seed {seed}: {ratio:?}");
        }
    }

    #[test]
    fn histogram_spans_at_least_four_bins_and_sums_to_one() {
        let mut partition = PoissonPartition::new(1_000);
        partition.set_lambda_from_copies(100.0).unwrap();
        partition.simulate(&mut create_rng(3)).unwrap();
        let bins = partition.copy_number_histogram().unwrap();
        assert!(bins.len() >= 4);
        let total: f64 = bins.iter().map(|b| b.observed_fraction).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!((bins[0].poisson_pmf - (-0.1f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn pmf_handles_zero_rate() {
        assert_eq!(poisson_pmf(0.0, 0), 1.0);
        assert_eq!(poisson_pmf(0.0, 2), 0.0);
    }
}
