//! Converts an unorganized, oriented point cloud into a
//! discontinuity-aware 2.5-D height field and resamples it into a dense,
//! uniformly spaced sample set for an external volumetric surface
//! reconstruction engine.

pub mod bounds;
pub mod cli;
pub mod cloud;
pub mod dds_writer;
pub mod engine;
pub mod error;
pub mod heightfield;
pub mod mesh;
pub mod pipeline;
pub mod sampler;
