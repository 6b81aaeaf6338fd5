/// Triangle mesh record for the engine's extraction output, with
/// zero-confidence vertex pruning and PLY serialization.
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use nalgebra::{Point3, Vector3};

use crate::error::PipelineError;

#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    pub vertices: Vec<Point3<f32>>,
    pub normals: Vec<Vector3<f32>>,
    pub confidences: Vec<f32>,
    pub faces: Vec<[usize; 3]>,
}

impl TriangleMesh {
    /// Delete vertices the extraction could not support (confidence of
    /// exactly zero) and repair the face list. Returns the number of
    /// vertices removed.
    pub fn prune_zero_confidence(&mut self) -> usize {
        let delete: Vec<bool> = self.confidences.iter().map(|&c| c == 0.0).collect();
        self.delete_vertices_fix_faces(&delete)
    }

    /// Remove the flagged vertices, remap surviving indices and drop
    /// every face that references a deleted vertex.
    pub fn delete_vertices_fix_faces(&mut self, delete: &[bool]) -> usize {
        let mut remap = vec![None; self.vertices.len()];
        let mut kept = 0;
        for (i, &flag) in delete.iter().enumerate() {
            if !flag {
                remap[i] = Some(kept);
                kept += 1;
            }
        }
        let deleted = self.vertices.len() - kept;
        if deleted == 0 {
            return 0;
        }

        retain_by_mask(&mut self.vertices, delete);
        retain_by_mask(&mut self.normals, delete);
        retain_by_mask(&mut self.confidences, delete);

        let faces = std::mem::take(&mut self.faces);
        self.faces = faces
            .into_iter()
            .filter_map(|face| {
                match (remap[face[0]], remap[face[1]], remap[face[2]]) {
                    (Some(a), Some(b), Some(c)) => Some([a, b, c]),
                    _ => None,
                }
            })
            .collect();

        deleted
    }

    /// Serialize the mesh as ASCII PLY with vertex normals.
    pub fn save_ply(&self, path: &Path) -> Result<(), PipelineError> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "ply")?;
        writeln!(writer, "format ascii 1.0")?;
        writeln!(writer, "element vertex {}", self.vertices.len())?;
        for prop in ["x", "y", "z", "nx", "ny", "nz"] {
            writeln!(writer, "property float {}", prop)?;
        }
        writeln!(writer, "element face {}", self.faces.len())?;
        writeln!(writer, "property list uchar int vertex_indices")?;
        writeln!(writer, "end_header")?;

        for (v, n) in self.vertices.iter().zip(&self.normals) {
            writeln!(writer, "{} {} {} {} {} {}", v.x, v.y, v.z, n.x, n.y, n.z)?;
        }
        for face in &self.faces {
            writeln!(writer, "3 {} {} {}", face[0], face[1], face[2])?;
        }

        writer.flush()?;
        Ok(())
    }
}

fn retain_by_mask<T>(items: &mut Vec<T>, delete: &[bool]) {
    let mut i = 0;
    items.retain(|_| {
        let keep = !delete[i];
        i += 1;
        keep
    });
}
