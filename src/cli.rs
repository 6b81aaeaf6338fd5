/// Command-line configuration surface. Values are validated here, at the
/// boundary; behavior lives in the pipeline.
use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "proxy-cloud")]
#[command(
    about = "Resample an oriented point cloud into a discontinuity-aware \
             sample set for volumetric surface reconstruction"
)]
pub struct Args {
    /// Input oriented point cloud (PLY, no faces)
    pub cloud: PathBuf,

    /// Output sample set (PLY with normals, scale and confidence)
    pub out_samples: PathBuf,

    /// Height field resolution in world units per cell
    #[arg(short, long, value_parser = parse_resolution, default_value_t = 1.0)]
    pub resolution: f32,

    /// Save the normalized height field as an R32F DDS raster
    #[arg(short = 'm', long)]
    pub height_map: Option<PathBuf>,

    /// Blend the original cloud's own samples into the output and
    /// deduplicate near-coincident wall samples against it
    #[arg(short, long)]
    pub fuse_samples: bool,
}

fn parse_resolution(value: &str) -> Result<f32, String> {
    let resolution: f32 = value
        .parse()
        .map_err(|_| format!("'{}' is not a number", value))?;
    if resolution.is_finite() && resolution > 0.0 {
        Ok(resolution)
    } else {
        Err("resolution must be a strictly positive number".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["proxy-cloud", "in.ply", "out.ply"]).unwrap();
        assert_eq!(args.resolution, 1.0);
        assert!(args.height_map.is_none());
        assert!(!args.fuse_samples);
    }

    #[test]
    fn accepts_positive_resolution() {
        let args =
            Args::try_parse_from(["proxy-cloud", "in.ply", "out.ply", "-r", "0.25"]).unwrap();
        assert_eq!(args.resolution, 0.25);
    }

    #[test]
    fn rejects_non_positive_resolution() {
        assert!(Args::try_parse_from(["proxy-cloud", "in.ply", "out.ply", "-r", "0"]).is_err());
        assert!(Args::try_parse_from(["proxy-cloud", "in.ply", "out.ply", "-r", "-2"]).is_err());
        assert!(Args::try_parse_from(["proxy-cloud", "in.ply", "out.ply", "-r", "inf"]).is_err());
        assert!(Args::try_parse_from(["proxy-cloud", "in.ply", "out.ply", "-r", "x"]).is_err());
    }

    #[test]
    fn fuse_and_height_map_flags() {
        let args = Args::try_parse_from([
            "proxy-cloud",
            "in.ply",
            "out.ply",
            "--fuse-samples",
            "--height-map",
            "hmap.dds",
        ])
        .unwrap();
        assert!(args.fuse_samples);
        assert_eq!(args.height_map, Some(PathBuf::from("hmap.dds")));
    }
}
