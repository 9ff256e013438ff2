//! Presentation-side view of a population.
//!
//! Everything in the model is in micrometres. Pixel values are produced here
//! only, for renderers and tabular exports.

use crate::droplet::{Call, Classification, Droplet};
use serde::{Deserialize, Serialize};

/// Fixed scale between canvas micrometres and image pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PixelTransform {
    pub pixels_per_um: f64,
}

/// A droplet as a circle in image space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PixelCircle {
    pub center_px: [f64; 2],
    pub radius_px: f64,
}

impl PixelTransform {
    pub fn new(pixels_per_um: f64) -> Self {
        Self { pixels_per_um }
    }

    pub fn to_px(&self, um: f64) -> f64 {
        um * self.pixels_per_um
    }

    /// `None` for droplets without a canvas position.
    pub fn circle(&self, droplet: &Droplet) -> Option<PixelCircle> {
        droplet.position_um().map(|[x, y]| PixelCircle {
            center_px: [self.to_px(x), self.to_px(y)],
            radius_px: self.to_px(droplet.radius_um()),
        })
    }

    /// Canvas size in whole pixels, rounded to nearest.
    pub fn canvas_px(&self, canvas_size_um: [f64; 2]) -> [u32; 2] {
        [
            self.to_px(canvas_size_um[0]).round() as u32,
            self.to_px(canvas_size_um[1]).round() as u32,
        ]
    }
}

/// One flattened row per droplet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DropletRecord {
    pub id: usize,
    pub diameter_um: f64,
    pub diameter_px: f64,
    pub volume_ul: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_px: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y_px: Option<f64>,
    pub true_count: u64,
    pub observed_call: Call,
    pub classification: Classification,
}

pub fn droplet_records(droplets: &[Droplet], transform: PixelTransform) -> Vec<DropletRecord> {
    droplets
        .iter()
        .map(|droplet| {
            let circle = transform.circle(droplet);
            DropletRecord {
                id: droplet.id(),
                diameter_um: droplet.diameter_um(),
                diameter_px: transform.to_px(droplet.diameter_um()),
                volume_ul: droplet.volume_ul(),
                x_px: circle.map(|c| c.center_px[0]),
                y_px: circle.map(|c| c.center_px[1]),
                true_count: droplet.true_count(),
                observed_call: droplet.observed_call(),
                classification: droplet.classification(),
            }
        })
        .collect()
}
