//! Network-mode sampling: an adaptive jittered grid over the region polygon,
//! weighted toward higher intersection density, followed by cluster-dedup
//! (§4.8).

use geo::{Contains, Coord, Point, Polygon};
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::sampler::SampleRng;

#[derive(Debug, Clone, Copy)]
struct IndexedPoint(Point<f64>);

impl RTreeObject for IndexedPoint {
    type Envelope = AABB<[f64; 2]>;
    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.0.x(), self.0.y()])
    }
}

impl PointDistance for IndexedPoint {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.0.x() - point[0];
        let dy = self.0.y() - point[1];
        dx * dx + dy * dy
    }
}

/// Lays a square grid of side `grid_side` over `region`'s bounding box,
/// jittering one point per non-excluded cell by up to `grid_side / 3`.
/// `excluded` marks water (or any other cell to skip); `intersection_weight`
/// supplies the per-cell density used to draw `extra_points` bonus samples.
pub fn sample_network_points(
    region: &Polygon<f64>,
    grid_side: f64,
    extra_points: usize,
    excluded: impl Fn(Coord<f64>) -> bool,
    intersection_weight: impl Fn(i64, i64) -> f64,
    rng: &mut dyn SampleRng,
) -> Vec<Point<f64>> {
    use geo::BoundingRect;
    let Some(rect) = region.bounding_rect() else {
        return Vec::new();
    };

    let cols = ((rect.width() / grid_side).ceil() as i64).max(1);
    let rows = ((rect.height() / grid_side).ceil() as i64).max(1);

    let mut candidates = Vec::new();
    let mut weighted_cells = Vec::new();

    for cx in 0..cols {
        for cy in 0..rows {
            let base_x = rect.min().x + cx as f64 * grid_side;
            let base_y = rect.min().y + cy as f64 * grid_side;
            let jitter_x = rng.jitter(grid_side / 3.0);
            let jitter_y = rng.jitter(grid_side / 3.0);
            let point = Coord {
                x: base_x + grid_side / 2.0 + jitter_x,
                y: base_y + grid_side / 2.0 + jitter_y,
            };
            if excluded(point) || !region.contains(&point) {
                continue;
            }
            candidates.push(Point::from(point));
            weighted_cells.push((cx, cy, intersection_weight(cx, cy)));
        }
    }

    if extra_points > 0 {
        let total_weight: f64 = weighted_cells
            .iter()
            .map(|(_, _, w)| (w.max(1.0)).ln())
            .sum();
        if total_weight > 0.0 {
            for _ in 0..extra_points {
                let mut pick = rng.next_f64() * total_weight;
                for (cx, cy, w) in &weighted_cells {
                    pick -= w.max(1.0).ln();
                    if pick <= 0.0 {
                        let base_x = rect.min().x + *cx as f64 * grid_side;
                        let base_y = rect.min().y + *cy as f64 * grid_side;
                        let point = Coord {
                            x: base_x + grid_side / 2.0 + rng.jitter(grid_side / 3.0),
                            y: base_y + grid_side / 2.0 + rng.jitter(grid_side / 3.0),
                        };
                        if !excluded(point) && region.contains(&point) {
                            candidates.push(Point::from(point));
                        }
                        break;
                    }
                }
            }
        }
    }

    dedup_clusters(candidates, grid_side.min(100.0))
}

/// Keeps one point per cluster of points mutually within `radius` of each
/// other, using an R-tree so the check is sublinear instead of all-pairs.
fn dedup_clusters(points: Vec<Point<f64>>, radius: f64) -> Vec<Point<f64>> {
    let indexed: Vec<IndexedPoint> = points.iter().map(|p| IndexedPoint(*p)).collect();
    let tree = RTree::bulk_load(indexed);
    let radius_sq = radius * radius;

    let mut kept = Vec::new();
    let mut suppressed = vec![false; points.len()];

    for (i, point) in points.iter().enumerate() {
        if suppressed[i] {
            continue;
        }
        kept.push(*point);
        for neighbor in tree.locate_within_distance([point.x(), point.y()], radius_sq) {
            if let Some(j) = points.iter().position(|p| p.x() == neighbor.0.x() && p.y() == neighbor.0.y()) {
                if j != i {
                    suppressed[j] = true;
                }
            }
        }
    }

    kept
}
