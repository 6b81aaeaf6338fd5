use ddsfile::{AlphaMode, D3D10ResourceDimension, Dds, DxgiFormat, NewDxgiParams};

use crate::error::PipelineError;

/// Write a row-major single-channel float raster as an R32F DDS texture.
pub fn write_r32f_raster(
    path: &str,
    width: usize,
    height: usize,
    data: &[f32],
) -> Result<(), PipelineError> {
    let mut bytes = Vec::with_capacity(data.len() * 4);
    for &value in data {
        bytes.extend_from_slice(&value.to_le_bytes());
    }

    let params = NewDxgiParams {
        height: height as u32,
        width: width as u32,
        depth: None,
        format: DxgiFormat::R32_Float,
        mipmap_levels: Some(1),
        array_layers: Some(1),
        caps2: None,
        is_cubemap: false,
        resource_dimension: D3D10ResourceDimension::Texture2D,
        alpha_mode: AlphaMode::Unknown,
    };

    let mut dds = Dds::new_dxgi(params).map_err(|e| {
        PipelineError::IoError(std::io::Error::other(format!("DDS header error: {}", e)))
    })?;
    dds.data = bytes;
    dds.write(&mut std::fs::File::create(path)?).map_err(|e| {
        PipelineError::IoError(std::io::Error::other(format!("DDS write error: {}", e)))
    })?;
    Ok(())
}
