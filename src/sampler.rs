/// Discontinuity classification and staircase sample synthesis.
use indicatif::ProgressBar;
use kiddo::SquaredEuclidean;
use kiddo::float::kdtree::KdTree;
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;

use crate::bounds::CloudBounds;
use crate::engine::{FUSED_COLOR, Sample, SYNTHETIC_COLOR, SYNTHETIC_CONFIDENCE};
use crate::heightfield::HeightField;

/// Read-only nearest-neighbor index over the original cloud, used to
/// avoid re-sampling wall geometry the cloud already covers.
pub struct CloudIndex {
    // Bucket size must exceed the number of points sharing a single
    // axis coordinate (e.g. a flat ground plane all at one z).
    tree: KdTree<f32, u64, 3, 1024, u32>,
    len: usize,
}

impl CloudIndex {
    pub fn build(positions: &[Point3<f32>]) -> Self {
        let mut tree = KdTree::new();
        for (i, p) in positions.iter().enumerate() {
            tree.add(&[p.x, p.y, p.z], i as u64);
        }
        Self {
            tree,
            len: positions.len(),
        }
    }

    /// True when some cloud point lies within `radius` of `point`.
    pub fn has_point_within(&self, point: &Point3<f32>, radius: f32) -> bool {
        if self.len == 0 {
            return false;
        }
        let nearest = self
            .tree
            .nearest_one::<SquaredEuclidean>(&[point.x, point.y, point.z]);
        nearest.distance <= radius * radius
    }
}

/// Walks the normalized height field and emits one surface sample per
/// flat cell and a vertical staircase per discontinuity cell.
pub struct DiscontinuitySampler<'a> {
    field: &'a HeightField,
    bounds: &'a CloudBounds,
    ground_level: f32,
    resolution: f32,
    fuse: bool,
    index: Option<&'a CloudIndex>,
}

impl<'a> DiscontinuitySampler<'a> {
    pub fn new(
        field: &'a HeightField,
        bounds: &'a CloudBounds,
        ground_level: f32,
        resolution: f32,
        fuse: bool,
        index: Option<&'a CloudIndex>,
    ) -> Self {
        Self {
            field,
            bounds,
            ground_level,
            resolution,
            fuse,
            index,
        }
    }

    /// Sample every interior cell, row-parallel. Sample order is
    /// irrelevant to the downstream engine, so rows are collected as
    /// they come.
    pub fn sample_all(&self, progress: Option<&ProgressBar>) -> Vec<Sample> {
        // A grid without interior cells has nothing to classify.
        if self.field.width < 5 || self.field.height < 5 {
            return Vec::new();
        }
        (0..self.field.height)
            .into_par_iter()
            .flat_map_iter(|y| {
                let row = self.sample_row(y);
                if let Some(pb) = progress {
                    pb.inc(1);
                }
                row
            })
            .collect()
    }

    fn sample_row(&self, y: usize) -> Vec<Sample> {
        let mut samples = Vec::new();
        // Gradients need a full 3x3 neighborhood whose own neighbors are
        // interior, hence the 2-cell margin.
        if y <= 1 || y >= self.field.height - 2 {
            return samples;
        }
        for x in 2..self.field.width - 2 {
            self.sample_cell(x, y, &mut samples);
        }
        samples
    }

    fn sample_cell(&self, x: usize, y: usize, out: &mut Vec<Sample>) {
        let heights = self.field.patch(x, y);
        let center = heights[1][1];

        // Directional first differences: rear looks back along an axis,
        // front looks ahead.
        let rdx = center - heights[0][1];
        let fdx = heights[2][1] - center;
        let rdy = center - heights[1][0];
        let fdy = heights[1][2] - center;

        // Relevant magnitude: the largest single-cell drop around here.
        let m = rdx.max(-fdx).max(rdy).max(-fdy);

        // Sobel gradients over the full neighborhood give the wall
        // orientation in the plane.
        let gx = -heights[0][0] + heights[2][0] + 2.0 * (-heights[0][1] + heights[2][1])
            - heights[0][2]
            + heights[2][2];
        let gy = -heights[0][0] + heights[0][2] + 2.0 * (-heights[1][0] + heights[1][2])
            - heights[2][0]
            + heights[2][2];
        let wall_normal = Vector3::new(-gx, -gy, 0.0)
            .try_normalize(f32::MIN_POSITIVE)
            .unwrap_or_else(Vector3::zeros);

        let px = (x as f32 - self.resolution / 2.0) * self.resolution + self.bounds.min_x;
        let py = (y as f32 - self.resolution / 2.0) * self.resolution + self.bounds.min_y;
        let top = Point3::new(px, py, center + self.ground_level);

        if m <= self.resolution {
            // Gently sloped terrain. In fuse mode the original cloud
            // already covers it, so nothing is emitted.
            if !self.fuse {
                out.push(self.synthetic(top, Vector3::z()));
            }
            return;
        }

        let top_normal = (Vector3::z() + wall_normal)
            .try_normalize(f32::MIN_POSITIVE)
            .unwrap_or_else(Vector3::z);
        out.push(self.synthetic(top, top_normal));

        let steps = (m / self.resolution).floor() as usize;
        for i in 1..=steps {
            let pz = self.ground_level + center - i as f32 * self.resolution;
            let candidate = Point3::new(px, py, pz);

            if self.fuse
                && self
                    .index
                    .is_some_and(|index| index.has_point_within(&candidate, self.resolution))
            {
                continue;
            }
            if is_concave_corner(rdx, fdx, rdy, fdy) {
                continue;
            }

            out.push(self.synthetic(candidate, wall_normal));
        }
    }

    fn synthetic(&self, position: Point3<f32>, normal: Vector3<f32>) -> Sample {
        Sample {
            position,
            normal,
            scale: self.resolution,
            confidence: SYNTHETIC_CONFIDENCE,
            color: SYNTHETIC_COLOR,
        }
    }
}

/// A reentrant corner: the cell sits below all four axis neighbors. A
/// staircase dropped here would cut through the adjoining walls.
#[inline]
pub fn is_concave_corner(rdx: f32, fdx: f32, rdy: f32, fdy: f32) -> bool {
    fdx > 0.0 && rdx < 0.0 && fdy > 0.0 && rdy < 0.0
}

/// Convert every original cloud point into a sample carrying its own
/// scale and confidence, for fuse mode.
pub fn fused_cloud_samples(cloud: &crate::cloud::PointCloud) -> Vec<Sample> {
    (0..cloud.len())
        .into_par_iter()
        .map(|i| Sample {
            position: cloud.positions[i],
            normal: cloud.normals[i],
            scale: cloud.scales[i],
            confidence: cloud.confidences[i],
            color: FUSED_COLOR,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cloud::PointCloud;

    /// 7x7 bounds spanning [0, 6] in x/y so that resolution 1.0 yields a
    /// 7x7 grid. Interior cells (2-cell margin) are x, y in 2..=4.
    fn unit_bounds() -> CloudBounds {
        let mut bounds = CloudBounds::new();
        bounds.update(&Point3::new(0.0, 0.0, 0.0));
        bounds.update(&Point3::new(6.0, 6.0, 6.0));
        bounds
    }

    /// Constant-height plateau across the whole grid.
    fn plateau_field(height: f32) -> HeightField {
        let mut field = HeightField::new(7, 7);
        for y in 0..7 {
            for x in 0..7 {
                field.set(x, y, height);
            }
        }
        field
    }

    /// A step: columns x <= 3 at `top`, columns x >= 4 at 0.
    fn step_field(top: f32) -> HeightField {
        let mut field = HeightField::new(7, 7);
        for y in 0..7 {
            for x in 0..7 {
                field.set(x, y, if x <= 3 { top } else { 0.0 });
            }
        }
        field
    }

    fn cell_samples(samples: &[Sample], px: f32, py: f32) -> Vec<Sample> {
        samples
            .iter()
            .filter(|s| s.position.x == px && s.position.y == py)
            .cloned()
            .collect()
    }

    #[test]
    fn plateau_yields_one_sample_per_interior_cell() {
        let field = plateau_field(2.0);
        let bounds = unit_bounds();
        let sampler = DiscontinuitySampler::new(&field, &bounds, 0.0, 1.0, false, None);
        let samples = sampler.sample_all(None);

        // 3x3 interior cells, one flat sample each.
        assert_eq!(samples.len(), 9);
        for s in &samples {
            assert_eq!(s.normal, Vector3::z());
            assert_eq!(s.position.z, 2.0);
            assert_eq!(s.scale, 1.0);
            assert_eq!(s.confidence, 0.5);
        }
    }

    #[test]
    fn plateau_emits_nothing_in_fuse_mode() {
        let field = plateau_field(2.0);
        let bounds = unit_bounds();
        let sampler = DiscontinuitySampler::new(&field, &bounds, 0.0, 1.0, true, None);
        assert!(sampler.sample_all(None).is_empty());
    }

    #[test]
    fn step_yields_descending_staircase() {
        let field = step_field(5.0);
        let bounds = unit_bounds();
        let sampler = DiscontinuitySampler::new(&field, &bounds, 0.0, 1.0, false, None);
        let samples = sampler.sample_all(None);

        // Cell (3, 3) sits on the step edge: m = 5, so one top sample
        // plus floor(5 / 1) wall samples.
        let mut cell = cell_samples(&samples, 2.5, 2.5);
        assert_eq!(cell.len(), 6);
        cell.sort_by(|a, b| b.position.z.total_cmp(&a.position.z));

        assert_eq!(cell[0].position.z, 5.0);
        let expected_top = (Vector3::z() + Vector3::x()).normalize();
        assert!((cell[0].normal - expected_top).norm() < 1e-6);

        for (i, s) in cell[1..].iter().enumerate() {
            assert_eq!(s.position.z, 4.0 - i as f32);
            assert_eq!(s.normal, Vector3::x());
        }
    }

    #[test]
    fn cells_below_the_step_stay_flat() {
        let field = step_field(5.0);
        let bounds = unit_bounds();
        let sampler = DiscontinuitySampler::new(&field, &bounds, 0.0, 1.0, false, None);
        let samples = sampler.sample_all(None);

        // The descending side sees only negative differences: m = 0.
        let cell = cell_samples(&samples, 3.5, 2.5);
        assert_eq!(cell.len(), 1);
        assert_eq!(cell[0].normal, Vector3::z());
    }

    #[test]
    fn ground_level_offsets_sample_heights() {
        let field = step_field(5.0);
        let bounds = unit_bounds();
        let sampler = DiscontinuitySampler::new(&field, &bounds, 10.0, 1.0, false, None);
        let samples = sampler.sample_all(None);

        let mut cell = cell_samples(&samples, 2.5, 2.5);
        cell.sort_by(|a, b| b.position.z.total_cmp(&a.position.z));
        assert_eq!(cell[0].position.z, 15.0);
        assert_eq!(cell[5].position.z, 10.0);
    }

    #[test]
    fn fuse_dedup_suppresses_covered_candidates() {
        let field = step_field(5.0);
        let bounds = unit_bounds();
        // One cloud point near the wall candidates of cell (3, 3) at
        // depths 3 and 4, but farther than 1.0 from the one at depth 2.
        let cloud_point = Point3::new(2.5, 2.5, 3.1);
        let index = CloudIndex::build(&[cloud_point]);

        let sampler = DiscontinuitySampler::new(&field, &bounds, 0.0, 1.0, true, Some(&index));
        let samples = sampler.sample_all(None);

        let mut cell = cell_samples(&samples, 2.5, 2.5);
        cell.sort_by(|a, b| b.position.z.total_cmp(&a.position.z));
        let depths: Vec<f32> = cell.iter().map(|s| s.position.z).collect();
        assert_eq!(depths, vec![5.0, 2.0, 1.0, 0.0]);
    }

    #[test]
    fn dedup_is_inert_when_fuse_is_off() {
        let field = step_field(5.0);
        let bounds = unit_bounds();
        let cloud_point = Point3::new(2.5, 2.5, 3.1);
        let index = CloudIndex::build(&[cloud_point]);

        let sampler = DiscontinuitySampler::new(&field, &bounds, 0.0, 1.0, false, Some(&index));
        let samples = sampler.sample_all(None);
        assert_eq!(cell_samples(&samples, 2.5, 2.5).len(), 6);
    }

    #[test]
    fn concave_corner_detection() {
        // Cell below all four neighbors: candidate walls would
        // self-intersect and must be discarded, fusing or not.
        assert!(is_concave_corner(-1.0, 1.0, -1.0, 1.0));

        assert!(!is_concave_corner(1.0, 1.0, -1.0, 1.0));
        assert!(!is_concave_corner(-1.0, -1.0, -1.0, 1.0));
        assert!(!is_concave_corner(-1.0, 1.0, 1.0, 1.0));
        assert!(!is_concave_corner(-1.0, 1.0, -1.0, -1.0));
        assert!(!is_concave_corner(0.0, 0.0, 0.0, 0.0));
    }

    #[test]
    fn cloud_index_radius_query() {
        let positions = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(5.0, 0.0, 0.0)];
        let index = CloudIndex::build(&positions);
        assert!(index.has_point_within(&Point3::new(0.5, 0.0, 0.0), 1.0));
        assert!(!index.has_point_within(&Point3::new(2.5, 0.0, 0.0), 1.0));
    }

    #[test]
    fn fused_samples_carry_cloud_attributes() {
        let mut cloud = PointCloud::default();
        cloud.positions.push(Point3::new(1.0, 2.0, 3.0));
        cloud.normals.push(Vector3::new(0.0, 1.0, 0.0));
        cloud.scales.push(0.25);
        cloud.confidences.push(0.8);

        let samples = fused_cloud_samples(&cloud);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].position, Point3::new(1.0, 2.0, 3.0));
        assert_eq!(samples[0].scale, 0.25);
        assert_eq!(samples[0].confidence, 0.8);
        assert_eq!(samples[0].color, FUSED_COLOR);
    }
}
