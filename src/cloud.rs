/// Oriented point cloud storage and PLY input/output.
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use nalgebra::{Point3, Vector3};
use ply_rs::ply::Property;

use crate::engine::Sample;
use crate::error::PipelineError;

/// An oriented point cloud with per-vertex scale and confidence,
/// stored as co-indexed columns.
#[derive(Debug, Clone, Default)]
pub struct PointCloud {
    pub positions: Vec<Point3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub scales: Vec<f32>,
    pub confidences: Vec<f32>,
}

impl PointCloud {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            positions: Vec::with_capacity(capacity),
            normals: Vec::with_capacity(capacity),
            scales: Vec::with_capacity(capacity),
            confidences: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Load an oriented cloud from a PLY file. Positions and normals are
    /// required; per-vertex scale (the `value` property) and
    /// confidence default to 1.0 when the source does not carry them.
    /// A source with face connectivity is rejected.
    pub fn load_ply(path: &Path) -> Result<Self, PipelineError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read_ply(&mut reader, path)
    }

    fn read_ply(reader: &mut impl BufRead, path: &Path) -> Result<Self, PipelineError> {
        let parser = ply_rs::parser::Parser::<ply_rs::ply::DefaultElement>::new();
        let ply = parser
            .read_ply(reader)
            .map_err(|e| PipelineError::ParseError {
                path: path.to_path_buf(),
                details: format!("PLY parse error: {:?}", e),
            })?;

        if ply.payload.get("face").is_some_and(|faces| !faces.is_empty()) {
            return Err(PipelineError::CloudHasFaces(path.to_path_buf()));
        }

        let Some(vertices) = ply.payload.get("vertex") else {
            return Err(PipelineError::EmptyCloud(path.to_path_buf()));
        };
        if vertices.is_empty() {
            return Err(PipelineError::EmptyCloud(path.to_path_buf()));
        }

        let mut cloud = PointCloud::with_capacity(vertices.len());
        for vertex in vertices {
            let x = require_float(vertex.get("x"), "x")?;
            let y = require_float(vertex.get("y"), "y")?;
            let z = require_float(vertex.get("z"), "z")?;
            let nx = require_float(vertex.get("nx"), "nx")?;
            let ny = require_float(vertex.get("ny"), "ny")?;
            let nz = require_float(vertex.get("nz"), "nz")?;

            cloud.positions.push(Point3::new(x, y, z));
            cloud.normals.push(Vector3::new(nx, ny, nz));
            cloud.scales.push(optional_float(vertex.get("value")).unwrap_or(1.0));
            cloud
                .confidences
                .push(optional_float(vertex.get("confidence")).unwrap_or(1.0));
        }

        Ok(cloud)
    }
}

fn require_float(prop: Option<&Property>, name: &'static str) -> Result<f32, PipelineError> {
    optional_float(prop).ok_or(PipelineError::MissingProperty(name))
}

fn optional_float(prop: Option<&Property>) -> Option<f32> {
    match prop {
        Some(Property::Float(v)) => Some(*v),
        Some(Property::Double(v)) => Some(*v as f32),
        Some(Property::Int(v)) => Some(*v as f32),
        Some(Property::UInt(v)) => Some(*v as f32),
        Some(Property::Short(v)) => Some(*v as f32),
        Some(Property::UShort(v)) => Some(*v as f32),
        Some(Property::Char(v)) => Some(*v as f32),
        Some(Property::UChar(v)) => Some(*v as f32),
        _ => None,
    }
}

/// Save a synthesized sample set as an ASCII PLY cloud with normals,
/// scale and confidence. This is the handoff artifact an external
/// reconstruction engine consumes.
pub fn save_samples_ply(samples: &[Sample], path: &Path) -> Result<(), PipelineError> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    writeln!(writer, "ply")?;
    writeln!(writer, "format ascii 1.0")?;
    writeln!(writer, "element vertex {}", samples.len())?;
    for prop in ["x", "y", "z", "nx", "ny", "nz", "value", "confidence"] {
        writeln!(writer, "property float {}", prop)?;
    }
    writeln!(writer, "end_header")?;

    for s in samples {
        writeln!(
            writer,
            "{} {} {} {} {} {} {} {}",
            s.position.x,
            s.position.y,
            s.position.z,
            s.normal.x,
            s.normal.y,
            s.normal.z,
            s.scale,
            s.confidence,
        )?;
    }

    writer.flush()?;
    Ok(())
}
