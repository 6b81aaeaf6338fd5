/// Error types for the proxy cloud pipeline.
use std::path::PathBuf;

/// Fatal pipeline errors. None of these are recoverable: the process
/// reports the diagnostic and exits.
#[derive(Debug)]
pub enum PipelineError {
    IoError(std::io::Error),
    /// The PLY source could not be parsed.
    ParseError { path: PathBuf, details: String },
    /// A required per-vertex property is absent from the cloud.
    MissingProperty(&'static str),
    /// The input carries face connectivity and is not a point cloud.
    CloudHasFaces(PathBuf),
    /// The input contains no vertices.
    EmptyCloud(PathBuf),
    /// The cloud's bounding box has non-positive volume.
    DegenerateBounds,
    /// No grid cell received a height sample, so no ground level exists.
    EmptyHeightField,
}

impl From<std::io::Error> for PipelineError {
    fn from(err: std::io::Error) -> Self {
        PipelineError::IoError(err)
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineError::IoError(e) => write!(f, "IO error: {}", e),
            PipelineError::ParseError { path, details } => {
                write!(f, "could not parse {}: {}", path.display(), details)
            }
            PipelineError::MissingProperty(name) => {
                write!(f, "cloud is missing required vertex property '{}'", name)
            }
            PipelineError::CloudHasFaces(path) => {
                write!(f, "{} contains faces, expected a point cloud", path.display())
            }
            PipelineError::EmptyCloud(path) => {
                write!(f, "{} contains no vertices", path.display())
            }
            PipelineError::DegenerateBounds => {
                write!(f, "cloud bounding box has non-positive volume")
            }
            PipelineError::EmptyHeightField => {
                write!(f, "height field contains no samples, cannot estimate ground level")
            }
        }
    }
}

impl std::error::Error for PipelineError {}
