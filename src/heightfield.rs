/// 2.5-D height field: rasterization, stencil filtering, hole filling
/// and ground normalization.
use nalgebra::Point3;
use rayon::prelude::*;

use crate::bounds::CloudBounds;
use crate::error::PipelineError;

/// Marker for cells that never received a height sample.
pub const NO_DATA: f32 = f32::MIN;

/// Row-major grid of heights over the XY plane. Cells hold either a
/// finite height or [`NO_DATA`].
#[derive(Debug, Clone)]
pub struct HeightField {
    pub width: usize,
    pub height: usize,
    data: Vec<f32>,
}

impl HeightField {
    /// Create a field with every cell unset
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![NO_DATA; width * height],
        }
    }

    #[inline]
    pub fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.data[y * self.width + x] = value;
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Project a world coordinate into a grid index. Centers the cell and
    /// rounds to nearest, clamped so boundary vertices stay inside the grid.
    #[inline]
    fn project(coord: f32, min: f32, resolution: f32, limit: usize) -> usize {
        let idx = ((coord - min) / resolution + resolution / 2.0 + 0.5) as usize;
        idx.min(limit - 1)
    }

    /// Rasterize a cloud into a height field, keeping the maximum height
    /// per cell. Strict greater-than keeps the first-seen value on exact
    /// ties. Cell writes collide between input points, so this stage runs
    /// single-writer.
    pub fn rasterize(
        positions: &[Point3<f32>],
        bounds: &CloudBounds,
        resolution: f32,
    ) -> HeightField {
        let (width, height) = bounds.grid_dims(resolution);
        let mut field = HeightField::new(width, height);

        for p in positions {
            let x = Self::project(p.x, bounds.min_x, resolution, width);
            let y = Self::project(p.y, bounds.min_y, resolution, height);
            if field.at(x, y) > p.z {
                continue;
            }
            field.set(x, y, p.z);
        }

        field
    }

    /// Gather the 3x3 neighborhood around an interior cell.
    /// `patch[dx + 1][dy + 1]` holds the value at `(x + dx, y + dy)`.
    pub fn patch(&self, x: usize, y: usize) -> [[f32; 3]; 3] {
        let mut patch = [[0.0f32; 3]; 3];
        for dx in -1i32..=1 {
            for dy in -1i32..=1 {
                patch[(dx + 1) as usize][(dy + 1) as usize] =
                    self.at((x as i32 + dx) as usize, (y as i32 + dy) as usize);
            }
        }
        patch
    }

    #[inline]
    fn is_border(&self, x: usize, y: usize) -> bool {
        y == 0 || y == self.height - 1 || x == 0 || x == self.width - 1
    }

    /// One-shot 3x3 median filter for outlier suppression. Writes a fresh
    /// grid; border cells are never trusted and come out unset. Sentinels
    /// take part in the median, so a sparse neighborhood medians to
    /// [`NO_DATA`] on its own.
    pub fn median_filtered(&self) -> HeightField {
        let mut out = HeightField::new(self.width, self.height);

        out.data
            .par_chunks_mut(self.width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, cell) in row.iter_mut().enumerate() {
                    if self.is_border(x, y) {
                        *cell = NO_DATA;
                        continue;
                    }
                    let mut heights = [0.0f32; 9];
                    flatten(self.patch(x, y), &mut heights);
                    heights.sort_unstable_by(f32::total_cmp);
                    *cell = heights[4];
                }
            });

        out
    }

    /// Iteratively fill unset interior cells from the median of their
    /// finite neighbors until a pass fills nothing new. A cell fills once
    /// at least 3 of its 9 neighborhood values are finite; cells with no
    /// finite neighbor anywhere stay unset forever, which is what lets the
    /// "no new fill" predicate terminate. Returns the number of passes.
    pub fn fill_holes(&mut self) -> usize {
        let mut passes = 0;
        loop {
            let (next, filled) = self.fill_pass();
            *self = next;
            passes += 1;
            if !filled {
                return passes;
            }
        }
    }

    /// One hole-filling pass into a fresh grid. The boolean is true iff
    /// some cell went from unset to finite, OR-reduced across rows.
    fn fill_pass(&self) -> (HeightField, bool) {
        let mut out = HeightField::new(self.width, self.height);

        let filled = out
            .data
            .par_chunks_mut(self.width)
            .enumerate()
            .map(|(y, row)| {
                let mut row_filled = false;
                for (x, cell) in row.iter_mut().enumerate() {
                    if self.is_border(x, y) {
                        *cell = NO_DATA;
                    } else if self.at(x, y) != NO_DATA {
                        *cell = self.at(x, y);
                    } else {
                        let mut heights = [0.0f32; 9];
                        flatten(self.patch(x, y), &mut heights);
                        let mut n = 0;
                        for i in 0..9 {
                            if heights[i] != NO_DATA {
                                heights[n] = heights[i];
                                n += 1;
                            }
                        }
                        if n >= 3 {
                            heights[..n].sort_unstable_by(f32::total_cmp);
                            *cell = heights[n / 2];
                            row_filled = true;
                        } else {
                            *cell = NO_DATA;
                        }
                    }
                }
                row_filled
            })
            .reduce(|| false, |a, b| a || b);

        (out, filled)
    }

    /// Subtract the global minimum finite height from every finite cell
    /// and set the remaining unset cells to exactly zero: permanently
    /// unreachable holes become flat ground at the datum. Fails when the
    /// field holds no finite cell at all. Returns the ground level.
    pub fn normalize_ground(&mut self) -> Result<f32, PipelineError> {
        let ground_level = self
            .data
            .par_iter()
            .copied()
            .filter(|&h| h != NO_DATA)
            .reduce(|| f32::INFINITY, f32::min);

        if !ground_level.is_finite() {
            return Err(PipelineError::EmptyHeightField);
        }

        self.data.par_iter_mut().for_each(|h| {
            if *h != NO_DATA {
                *h -= ground_level;
            } else {
                *h = 0.0;
            }
        });

        Ok(ground_level)
    }
}

#[inline]
fn flatten(patch: [[f32; 3]; 3], out: &mut [f32; 9]) {
    for (i, column) in patch.iter().enumerate() {
        out[i * 3..i * 3 + 3].copy_from_slice(column);
    }
}
