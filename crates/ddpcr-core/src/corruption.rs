use crate::droplet::Call;
use rand::Rng;

/// Size-dependent readout error.
///
/// Both base rates scale linearly with `diameter / mean_diameter`. The scaled
/// probabilities are not clamped: a product above 1 flips every draw.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CorruptionModel {
    pub false_negative_rate: f64,
    pub false_positive_rate: f64,
}

/// Per-droplet error probabilities after size scaling.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DynamicRates {
    pub false_negative: f64,
    pub false_positive: f64,
}

impl CorruptionModel {
    pub fn new(false_negative_rate: f64, false_positive_rate: f64) -> Self {
        Self {
            false_negative_rate,
            false_positive_rate,
        }
    }

    pub fn dynamic_rates(&self, relative_size: f64) -> DynamicRates {
        DynamicRates {
            false_negative: self.false_negative_rate * relative_size,
            false_positive: self.false_positive_rate * relative_size,
        }
    }

    /// Read one droplet. Exactly one uniform draw is consumed either way.
    pub fn observe<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        true_count: u64,
        diameter_um: f64,
        mean_diameter_um: f64,
    ) -> Call {
        let rates = self.dynamic_rates(diameter_um / mean_diameter_um);
        let draw: f64 = rng.random();
        if true_count > 0 {
            if draw < rates.false_negative {
                Call::Negative
            } else {
                Call::Positive
            }
        } else if draw < rates.false_positive {
            Call::Positive
        } else {
            Call::Negative
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::create_rng;

    #[test]
    fn rates_scale_linearly_with_size() {
        let model = CorruptionModel::new(0.1, 0.05);
        let rates = model.dynamic_rates(1.2);
        assert!((rates.false_negative - 0.12).abs() < 1e-12);
        assert!((rates.false_positive - 0.06).abs() < 1e-12);
        assert_eq!(model.dynamic_rates(1.0).false_negative, 0.1);
    }

    #[test]
    fn zero_false_positive_rate_never_flips_empty_droplets() {
        let model = CorruptionModel::new(0.1, 0.0);
        let mut rng = create_rng(11);
        for i in 0..5_000 {
            let diameter = 80.0 + (i % 41) as f64;
            assert_eq!(model.observe(&mut rng, 0, diameter, 100.0), Call::Negative);
        }
    }

    #[test]
    fn rate_above_one_always_flips() {
        let model = CorruptionModel::new(0.9, 0.9);
        let mut rng = create_rng(12);
        for _ in 0..1_000 {
            assert_eq!(model.observe(&mut rng, 2, 120.0, 100.0), Call::Negative);
            assert_eq!(model.observe(&mut rng, 0, 120.0, 100.0), Call::Positive);
        }
    }

    #[test]
    fn flip_frequency_matches_scaled_rate() {
        let model = CorruptionModel::new(0.1, 0.05);
        let mut rng = create_rng(13);
        let n = 40_000;
        let negatives = (0..n)
            .filter(|_| model.observe(&mut rng, 1, 120.0, 100.0) == Call::Negative)
            .count();
        let freq = negatives as f64 / n as f64;
        assert!((freq - 0.12).abs() < 0.01, "freq {freq}");
    }
}
