use rand::Rng;
use rstar::{RTree, RTreeObject, AABB};

/// Bounding rectangle for placement, in µm, anchored at the origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
}

impl Canvas {
    pub fn new(size: [f64; 2]) -> Self {
        Self {
            width: size[0],
            height: size[1],
        }
    }
}

/// Placement rules shared by every droplet in one packing pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PackingRules {
    /// Minimum gap between circle edges.
    pub margin: f64,
    /// Candidate centres tried per circle before it is dropped.
    pub max_attempts: usize,
}

/// A circle accepted onto the canvas.
#[derive(Clone, Debug)]
struct PlacedCircle {
    center: [f64; 2],
    radius: f64,
}

impl RTreeObject for PlacedCircle {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.center[0] - self.radius, self.center[1] - self.radius],
            [self.center[0] + self.radius, self.center[1] + self.radius],
        )
    }
}

/// Place circles of the given radii by rejection sampling, in input order.
///
/// Each circle gets up to `rules.max_attempts` uniformly drawn centres, inset
/// by its own radius. The first candidate whose distance to every placed
/// centre is at least `r_i + r_j + margin` is kept. A circle that exhausts its
/// attempts, or cannot fit inside the canvas at all, gets `None`.
pub fn pack_circles<R: Rng + ?Sized>(
    rng: &mut R,
    canvas: Canvas,
    radii: &[f64],
    rules: PackingRules,
) -> Vec<Option<[f64; 2]>> {
    let mut tree: RTree<PlacedCircle> = RTree::new();
    let mut placements = Vec::with_capacity(radii.len());

    for &radius in radii {
        let placement = place_one(rng, &tree, canvas, radius, rules);
        if let Some(center) = placement {
            tree.insert(PlacedCircle { center, radius });
        }
        placements.push(placement);
    }
    placements
}

fn place_one<R: Rng + ?Sized>(
    rng: &mut R,
    tree: &RTree<PlacedCircle>,
    canvas: Canvas,
    radius: f64,
    rules: PackingRules,
) -> Option<[f64; 2]> {
    if !(radius.is_finite() && radius > 0.0) {
        return None;
    }
    let (x_max, y_max) = (canvas.width - radius, canvas.height - radius);
    if x_max < radius || y_max < radius {
        return None;
    }

    for _ in 0..rules.max_attempts {
        let candidate = [
            rng.random_range(radius..=x_max),
            rng.random_range(radius..=y_max),
        ];
        if is_clear(tree, candidate, radius, rules.margin) {
            return Some(candidate);
        }
    }
    None
}

/// Whether a circle at `center` keeps the required gap to every placed circle.
fn is_clear(tree: &RTree<PlacedCircle>, center: [f64; 2], radius: f64, margin: f64) -> bool {
    // Any circle closer than r_i + r_j + margin has a box that meets this one.
    let reach = radius + margin;
    let envelope = AABB::from_corners(
        [center[0] - reach, center[1] - reach],
        [center[0] + reach, center[1] + reach],
    );
    tree.locate_in_envelope_intersecting(&envelope).all(|other| {
        let dx = other.center[0] - center[0];
        let dy = other.center[1] - center[1];
        dx.hypot(dy) >= radius + other.radius + margin
    })
}

/// Smallest edge gap among placed circles, `None` with fewer than two.
pub fn min_clearance(centers: &[[f64; 2]], radii: &[f64]) -> Option<f64> {
    let mut min_gap: Option<f64> = None;
    for i in 0..centers.len() {
        for j in (i + 1)..centers.len() {
            let dx = centers[i][0] - centers[j][0];
            let dy = centers[i][1] - centers[j][1];
            let gap = dx.hypot(dy) - radii[i] - radii[j];
            min_gap = Some(min_gap.map_or(gap, |g| g.min(gap)));
        }
    }
    min_gap
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::create_rng;

    const RULES: PackingRules = PackingRules {
        margin: 2.0,
        max_attempts: 100,
    };

    fn placed(placements: &[Option<[f64; 2]>], radii: &[f64]) -> (Vec<[f64; 2]>, Vec<f64>) {
        placements
            .iter()
            .zip(radii)
            .filter_map(|(p, r)| p.map(|c| (c, *r)))
            .unzip()
    }

    #[test]
    fn placed_circles_keep_margin_and_stay_inside() {
        let mut rng = create_rng(1);
        let canvas = Canvas::new([600.0, 400.0]);
        let radii: Vec<f64> = (0..120).map(|i| 8.0 + (i % 5) as f64).collect();
        let placements = pack_circles(&mut rng, canvas, &radii, RULES);
        assert_eq!(placements.len(), radii.len());

        let (centers, kept_radii) = placed(&placements, &radii);
        assert!(centers.len() > 1);
        for (c, r) in centers.iter().zip(&kept_radii) {
            assert!(c[0] >= *r && c[0] <= canvas.width - r);
            assert!(c[1] >= *r && c[1] <= canvas.height - r);
        }
        for i in 0..centers.len() {
            for j in (i + 1)..centers.len() {
                let dx = centers[i][0] - centers[j][0];
                let dy = centers[i][1] - centers[j][1];
                assert!(dx.hypot(dy) >= kept_radii[i] + kept_radii[j] + RULES.margin);
            }
        }
        let gap = min_clearance(&centers, &kept_radii).unwrap();
        assert!(gap >= RULES.margin);
    }

    #[test]
    fn circles_larger_than_canvas_are_dropped() {
        let mut rng = create_rng(2);
        let canvas = Canvas::new([200.0, 200.0]);
        let radii = vec![150.0; 500];
        let placements = pack_circles(&mut rng, canvas, &radii, RULES);
        assert!(placements.iter().all(Option::is_none));
    }

    #[test]
    fn crowded_canvas_places_fewer_than_requested() {
        let mut rng = create_rng(3);
        let canvas = Canvas::new([200.0, 200.0]);
        let radii = vec![30.0; 100];
        let placements = pack_circles(&mut rng, canvas, &radii, RULES);
        let count = placements.iter().filter(|p| p.is_some()).count();
        assert!(count > 0);
        assert!(count < radii.len());
    }

    #[test]
    fn circle_exactly_filling_canvas_is_centred() {
        let mut rng = create_rng(4);
        let canvas = Canvas::new([20.0, 20.0]);
        let placements = pack_circles(&mut rng, canvas, &[10.0], RULES);
        assert_eq!(placements, vec![Some([10.0, 10.0])]);
    }

    #[test]
    fn packing_is_reproducible_for_a_seed() {
        let canvas = Canvas::new([300.0, 300.0]);
        let radii = vec![10.0; 40];
        let a = pack_circles(&mut create_rng(9), canvas, &radii, RULES);
        let b = pack_circles(&mut create_rng(9), canvas, &radii, RULES);
        assert_eq!(a, b);
    }

    #[test]
    fn min_clearance_needs_two_circles() {
        assert_eq!(min_clearance(&[[0.0, 0.0]], &[1.0]), None);
        let gap = min_clearance(&[[0.0, 0.0], [10.0, 0.0]], &[2.0, 3.0]).unwrap();
        assert!((gap - 5.0).abs() < 1e-12);
    }
}
