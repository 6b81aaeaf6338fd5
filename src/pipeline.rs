/// Stage sequencing for the proxy cloud pipeline: load, rasterize,
/// filter, fill, normalize, sample, hand off.
use std::path::PathBuf;

use indicatif::{ProgressBar, ProgressStyle};

use crate::bounds::CloudBounds;
use crate::cli::Args;
use crate::cloud::{self, PointCloud};
use crate::dds_writer::write_r32f_raster;
use crate::engine::Sample;
use crate::error::PipelineError;
use crate::heightfield::HeightField;
use crate::sampler::{CloudIndex, DiscontinuitySampler, fused_cloud_samples};

pub struct Pipeline {
    cloud_path: PathBuf,
    out_samples: PathBuf,
    resolution: f32,
    height_map: Option<PathBuf>,
    fuse: bool,
}

impl Pipeline {
    pub fn new(args: &Args) -> Self {
        Self {
            cloud_path: args.cloud.clone(),
            out_samples: args.out_samples.clone(),
            resolution: args.resolution,
            height_map: args.height_map.clone(),
            fuse: args.fuse_samples,
        }
    }

    /// Run every stage to completion. Any error is fatal; there is no
    /// partial-success path.
    pub fn run(&self) -> Result<(), PipelineError> {
        println!("Loading cloud {}...", self.cloud_path.display());
        let cloud = PointCloud::load_ply(&self.cloud_path)?;
        println!("  {} oriented points", cloud.len());

        let bounds = CloudBounds::from_positions(&cloud.positions);
        bounds.ensure_volume()?;
        self.print_bounds(&bounds);

        let (width, height) = bounds.grid_dims(self.resolution);
        println!("Creating height field ({}x{})", width, height);
        let field = HeightField::rasterize(&cloud.positions, &bounds, self.resolution);

        println!("Removing outliers (3x3 median)...");
        let mut field = field.median_filtered();

        let passes = field.fill_holes();
        println!("Filled holes in {} passes", passes);

        let ground_level = field.normalize_ground()?;
        println!("Ground level estimated at {:.3}", ground_level);

        if let Some(path) = &self.height_map {
            write_r32f_raster(
                path.to_string_lossy().as_ref(),
                field.width,
                field.height,
                field.data(),
            )?;
            println!("Saved {} (R32F height field)", path.display());
        }

        let samples = self.synthesize_samples(&cloud, &bounds, &field, ground_level);
        println!("Synthesized {} samples", samples.len());

        cloud::save_samples_ply(&samples, &self.out_samples)?;
        println!("Saved {} (sample set PLY)", self.out_samples.display());

        self.save_metadata(&cloud, &bounds, (width, height), ground_level, samples.len())?;

        Ok(())
    }

    /// Classify every interior cell and emit surface and wall samples,
    /// plus the original cloud's own samples when fusing.
    fn synthesize_samples(
        &self,
        cloud: &PointCloud,
        bounds: &CloudBounds,
        field: &HeightField,
        ground_level: f32,
    ) -> Vec<Sample> {
        let index = if self.fuse {
            Some(CloudIndex::build(&cloud.positions))
        } else {
            None
        };

        let pb = ProgressBar::new(field.height as u64);
        pb.set_style(progress_style("[{bar:40.green/blue}] {pos}/{len} rows ({percent}%) {msg}"));
        pb.set_message("Sampling discontinuities");

        let sampler = DiscontinuitySampler::new(
            field,
            bounds,
            ground_level,
            self.resolution,
            self.fuse,
            index.as_ref(),
        );
        let mut samples = sampler.sample_all(Some(&pb));
        pb.finish_with_message("Sampled");

        if self.fuse {
            samples.extend(fused_cloud_samples(cloud));
        }

        samples
    }

    /// Save a JSON sidecar describing the run next to the sample set.
    fn save_metadata(
        &self,
        cloud: &PointCloud,
        bounds: &CloudBounds,
        grid: (usize, usize),
        ground_level: f32,
        sample_count: usize,
    ) -> Result<(), PipelineError> {
        let metadata = serde_json::json!({
            "cloud": self.cloud_path.display().to_string(),
            "points": cloud.len(),
            "resolution": self.resolution,
            "grid": { "width": grid.0, "height": grid.1 },
            "ground_level": ground_level,
            "fuse_samples": self.fuse,
            "samples": sample_count,
            "bounds": bounds,
        });

        let metadata_path = self.out_samples.with_extension("meta.json");
        std::fs::write(&metadata_path, metadata.to_string())?;
        println!("Saved {}", metadata_path.display());

        Ok(())
    }

    fn print_bounds(&self, bounds: &CloudBounds) {
        println!("Cloud bounds:");
        println!("  X: {:.2} to {:.2}", bounds.min_x, bounds.max_x);
        println!("  Y: {:.2} to {:.2}", bounds.min_y, bounds.max_y);
        println!("  Z: {:.2} to {:.2} (height)", bounds.min_z, bounds.max_z);
    }
}

fn progress_style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap()
        .progress_chars("▉▊▋▌▍▎▏ ")
}

/// Convenience entry used by `main`.
pub fn run(args: &Args) -> Result<(), PipelineError> {
    Pipeline::new(args).run()
}
