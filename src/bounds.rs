/// Point cloud coordinate bounds tracking and grid sizing
use nalgebra::Point3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::PipelineError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudBounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
    pub min_z: f32,
    pub max_z: f32,
}

impl CloudBounds {
    /// Create new bounds initialised to infinity values
    pub fn new() -> Self {
        Self {
            min_x: f32::INFINITY,
            max_x: f32::NEG_INFINITY,
            min_y: f32::INFINITY,
            max_y: f32::NEG_INFINITY,
            min_z: f32::INFINITY,
            max_z: f32::NEG_INFINITY,
        }
    }

    /// Compute bounds over all positions with chunked parallel reduction
    pub fn from_positions(positions: &[Point3<f32>]) -> Self {
        positions
            .par_chunks(25_000)
            .map(|chunk| {
                let mut local = CloudBounds::new();
                for p in chunk {
                    local.update(p);
                }
                local
            })
            .reduce_with(|mut a, b| {
                a.merge(&b);
                a
            })
            .unwrap_or_else(CloudBounds::new)
    }

    /// Update bounds with a new point
    pub fn update(&mut self, p: &Point3<f32>) {
        self.min_x = self.min_x.min(p.x);
        self.max_x = self.max_x.max(p.x);
        self.min_y = self.min_y.min(p.y);
        self.max_y = self.max_y.max(p.y);
        self.min_z = self.min_z.min(p.z);
        self.max_z = self.max_z.max(p.z);
    }

    /// Merge another bounds into this one
    pub fn merge(&mut self, other: &CloudBounds) {
        self.min_x = self.min_x.min(other.min_x);
        self.max_x = self.max_x.max(other.max_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_y = self.max_y.max(other.max_y);
        self.min_z = self.min_z.min(other.min_z);
        self.max_z = self.max_z.max(other.max_z);
    }

    /// Get world space dimensions
    pub fn dimensions(&self) -> (f32, f32, f32) {
        (
            self.max_x - self.min_x,
            self.max_y - self.min_y,
            self.max_z - self.min_z,
        )
    }

    /// Bounding volume, zero when any extent is non-positive
    pub fn volume(&self) -> f32 {
        let (dx, dy, dz) = self.dimensions();
        if dx <= 0.0 || dy <= 0.0 || dz <= 0.0 {
            return 0.0;
        }
        dx * dy * dz
    }

    /// Fail when the cloud spans no volume. A degenerate box would produce
    /// an empty or one-dimensional grid downstream.
    pub fn ensure_volume(&self) -> Result<(), PipelineError> {
        if self.volume() > 0.0 {
            Ok(())
        } else {
            Err(PipelineError::DegenerateBounds)
        }
    }

    /// Derive height field dimensions from the planar extent. Always at
    /// least 1x1 for a valid bounding box.
    pub fn grid_dims(&self, resolution: f32) -> (usize, usize) {
        let width = ((self.max_x - self.min_x) / resolution) as usize + 1;
        let height = ((self.max_y - self.min_y) / resolution) as usize + 1;
        (width, height)
    }
}
