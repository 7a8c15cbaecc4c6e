// src/extraction.rs - Band-averaged intensity profiles along a polyline

use crate::errors::{ChromaError, Result};
use crate::image_utils::{in_bounds, Raster};
use crate::path_algorithms::{
    cumulative_arc_length, linspace, resample_path, resample_series, Point,
};
use crate::profile::Profile;

/// Fewest samples taken along any path
pub const MIN_PROFILE_SAMPLES: usize = 500;
/// Most samples taken along any path
pub const MAX_PROFILE_SAMPLES: usize = 1000;

/// Number of profile samples for a path of the given length (one per two pixels, clamped)
pub fn profile_sample_count(path_length: f64) -> usize {
    let half = (path_length / 2.0).round();
    if half <= MIN_PROFILE_SAMPLES as f64 {
        MIN_PROFILE_SAMPLES
    } else if half >= MAX_PROFILE_SAMPLES as f64 {
        MAX_PROFILE_SAMPLES
    } else {
        half as usize
    }
}

/// Extract a distance/intensity profile along `path`.
///
/// The path is resampled at evenly spaced arc-length positions and, at each
/// position, `band_width` pixels perpendicular to the path are averaged.
///
/// # Arguments
/// * `raster` - Image to sample
/// * `path` - At least two points in pixel coordinates
/// * `band_width` - Odd number of pixels sampled across the path
///
/// # Returns
/// A profile whose distances start at 0 and whose filtered trace equals the raw trace
pub fn extract_profile(raster: &Raster, path: &[Point], band_width: usize) -> Result<Profile> {
    if path.len() < 2 {
        return Err(ChromaError::Extraction(format!(
            "path needs at least 2 points, got {}",
            path.len()
        )));
    }
    if path.iter().any(|p| !p.is_finite()) {
        return Err(ChromaError::Extraction("path contains non-finite coordinates".to_string()));
    }
    if band_width == 0 || band_width % 2 == 0 {
        return Err(ChromaError::Extraction(format!(
            "band width must be an odd positive number of pixels, got {}",
            band_width
        )));
    }
    if raster.is_empty() {
        return Err(ChromaError::Extraction("raster has no pixels".to_string()));
    }

    let cumulative = cumulative_arc_length(path);
    let total_length = cumulative[cumulative.len() - 1];
    if !(total_length > 0.0) {
        return Err(ChromaError::Extraction("path has zero length".to_string()));
    }

    let sample_count = profile_sample_count(total_length);
    let distances = linspace(0.0, total_length, sample_count);
    let resampled = resample_path(path, &cumulative, &distances);

    log::debug!(
        "Extracting profile: path length {:.1} px, {} samples, band width {}",
        total_length,
        sample_count,
        band_width
    );

    let band_means = sample_band(raster, &resampled, band_width);
    let raw_intensities = resample_series(&band_means, sample_count);

    Profile::new(distances, raw_intensities)
}

/// Average `band_width` pixels across the path at each consecutive point pair.
///
/// The band is centred on the first point of every pair and runs along the
/// pair's normal. Pixels outside the raster are skipped; a band with no
/// pixels left, or a zero-length pair, yields 0. The result has one value
/// per pair.
pub fn sample_band(raster: &Raster, points: &[Point], band_width: usize) -> Vec<f64> {
    let half = (band_width / 2) as i64;
    let (width, height) = (raster.width(), raster.height());

    points
        .windows(2)
        .map(|pair| {
            let (p1, p2) = (pair[0], pair[1]);
            let dx = p2.x - p1.x;
            let dy = p2.y - p1.y;
            let length = (dx * dx + dy * dy).sqrt();
            if !(length > 0.0) {
                return 0.0;
            }

            // Unit normal to the segment
            let nx = -dy / length;
            let ny = dx / length;

            let mut sum = 0.0;
            let mut count = 0usize;
            for offset in -half..=half {
                let xs = (p1.x + offset as f64 * nx).round() as i64;
                let ys = (p1.y + offset as f64 * ny).round() as i64;
                if !in_bounds(xs, ys, width, height) {
                    continue;
                }
                sum += raster.intensity(xs as usize, ys as usize);
                count += 1;
            }

            if count == 0 {
                0.0
            } else {
                sum / count as f64
            }
        })
        .collect()
}
