// src/image_io.rs - Loading images from disk as intensity rasters

use std::path::{Path, PathBuf};

use crate::errors::{ChromaError, Result};
use crate::image_utils::Raster;

/// Represents an input raster with its metadata
pub struct InputRaster {
    pub raster: Raster,
    pub path: PathBuf,
    pub filename: String,
}

/// Load an image file into an intensity raster
pub fn load_raster<P: AsRef<Path>>(path: P) -> Result<InputRaster> {
    let path = path.as_ref();

    if !path.is_file() {
        return Err(ChromaError::InvalidPath(path.to_path_buf()));
    }

    // Get filename without extension
    let filename = path.file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ChromaError::InvalidPath(path.to_path_buf()))?
        .to_string();

    let img = image::open(path)?;
    let raster = Raster::from_dynamic_image(&img);

    log::debug!(
        "Loaded {} ({}x{}, {} channel(s))",
        path.display(),
        raster.width(),
        raster.height(),
        raster.channels()
    );

    Ok(InputRaster {
        raster,
        path: path.to_path_buf(),
        filename,
    })
}
