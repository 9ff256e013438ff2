use crate::config::sphere_volume_ul;
use serde::{Deserialize, Serialize};

/// What the reader reports for a droplet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Call {
    Positive,
    Negative,
}

impl Call {
    pub fn is_positive(self) -> bool {
        matches!(self, Call::Positive)
    }
}

/// Observed call judged against true occupancy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    TruePositive,
    FalsePositive,
    TrueNegative,
    FalseNegative,
}

impl Classification {
    pub fn from_state(true_count: u64, observed_call: Call) -> Self {
        match (true_count > 0, observed_call) {
            (true, Call::Positive) => Classification::TruePositive,
            (true, Call::Negative) => Classification::FalseNegative,
            (false, Call::Positive) => Classification::FalsePositive,
            (false, Call::Negative) => Classification::TrueNegative,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Classification::TruePositive => "true positive",
            Classification::FalsePositive => "false positive",
            Classification::TrueNegative => "true negative",
            Classification::FalseNegative => "false negative",
        }
    }
}

/// One finalized reaction compartment.
///
/// Fields are private so that volume always follows diameter and the
/// classification always follows `(true_count, observed_call)`.
#[derive(Clone, Debug, PartialEq)]
pub struct Droplet {
    id: usize,
    diameter_um: f64,
    volume_ul: f64,
    position_um: Option<[f64; 2]>,
    true_count: u64,
    observed_call: Call,
}

impl Droplet {
    pub fn new(
        id: usize,
        diameter_um: f64,
        position_um: Option<[f64; 2]>,
        true_count: u64,
        observed_call: Call,
    ) -> Self {
        Self {
            id,
            diameter_um,
            volume_ul: sphere_volume_ul(diameter_um),
            position_um,
            true_count,
            observed_call,
        }
    }

    /// Index of the droplet in the requested population.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn diameter_um(&self) -> f64 {
        self.diameter_um
    }

    pub fn radius_um(&self) -> f64 {
        self.diameter_um / 2.0
    }

    pub fn volume_ul(&self) -> f64 {
        self.volume_ul
    }

    /// Centre on the canvas, absent for populations built without geometry.
    pub fn position_um(&self) -> Option<[f64; 2]> {
        self.position_um
    }

    pub fn true_count(&self) -> u64 {
        self.true_count
    }

    pub fn is_occupied(&self) -> bool {
        self.true_count > 0
    }

    pub fn observed_call(&self) -> Call {
        self.observed_call
    }

    pub fn classification(&self) -> Classification {
        Classification::from_state(self.true_count, self.observed_call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_covers_all_states() {
        assert_eq!(
            Classification::from_state(3, Call::Positive),
            Classification::TruePositive
        );
        assert_eq!(
            Classification::from_state(1, Call::Negative),
            Classification::FalseNegative
        );
        assert_eq!(
            Classification::from_state(0, Call::Positive),
            Classification::FalsePositive
        );
        assert_eq!(
            Classification::from_state(0, Call::Negative),
            Classification::TrueNegative
        );
    }

    #[test]
    fn volume_tracks_diameter() {
        let droplet = Droplet::new(0, 100.0, None, 0, Call::Negative);
        assert_eq!(droplet.volume_ul(), sphere_volume_ul(100.0));
        assert_eq!(droplet.radius_um(), 50.0);
        assert!(droplet.position_um().is_none());
    }

    #[test]
    fn classification_serializes_snake_case() {
        let json = serde_json::to_string(&Classification::FalseNegative).unwrap();
        assert_eq!(json, "\"false_negative\"");
    }
}
