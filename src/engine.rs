/// Sample records and the narrow interface to the external volumetric
/// reconstruction engine.
use nalgebra::{Point3, Vector3};

use crate::mesh::TriangleMesh;

/// Mid-level confidence assigned to synthesized samples.
pub const SYNTHETIC_CONFIDENCE: f32 = 0.5;

/// Placeholder color for synthesized samples.
pub const SYNTHETIC_COLOR: Vector3<f32> = Vector3::new(0.0, 0.0, 1.0);

/// Placeholder color for samples copied from the original cloud.
pub const FUSED_COLOR: Vector3<f32> = Vector3::new(0.7, 0.7, 0.7);

/// One oriented, scaled, confidence-tagged surface sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub position: Point3<f32>,
    pub normal: Vector3<f32>,
    pub scale: f32,
    /// Weight in [0, 1] the engine uses for this sample's influence.
    pub confidence: f32,
    pub color: Vector3<f32>,
}

/// The volumetric accumulation structure this pipeline feeds. Everything
/// beyond these five calls is opaque: octree layout, implicit function,
/// and iso-surface extraction all belong to the engine.
pub trait SurfaceEngine {
    fn insert_sample(&mut self, sample: Sample);
    fn limit_depth(&mut self);
    fn compute_voxels(&mut self);
    fn release_samples(&mut self);
    fn extract_mesh(&mut self) -> TriangleMesh;
}

/// Hand every sample to the engine, run its maintenance steps, extract
/// the surface and drop vertices the extraction could not support.
pub fn reconstruct<E: SurfaceEngine>(engine: &mut E, samples: Vec<Sample>) -> TriangleMesh {
    for sample in samples {
        engine.insert_sample(sample);
    }
    engine.limit_depth();
    engine.compute_voxels();
    engine.release_samples();

    let mut mesh = engine.extract_mesh();
    mesh.prune_zero_confidence();
    mesh
}
