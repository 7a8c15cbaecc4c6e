#![allow(dead_code)]

use chromaband_lib::fitting::{mecozzi, MecozziParams};
use chromaband_lib::Raster;

/// Evenly spaced sample positions `0, spacing, 2 * spacing, ...`
pub fn axis(n: usize, spacing: f64) -> Vec<f64> {
    (0..n).map(|i| i as f64 * spacing).collect()
}

/// Sum of Gaussian bumps `(centre, height, sigma)` evaluated on `x`
pub fn gaussian_trace(x: &[f64], bumps: &[(f64, f64, f64)]) -> Vec<f64> {
    x.iter()
        .map(|&v| {
            bumps
                .iter()
                .map(|&(c, h, s)| h * (-0.5 * ((v - c) / s).powi(2)).exp())
                .sum()
        })
        .collect()
}

/// Sum of Mecozzi peaks evaluated on `x`
pub fn mecozzi_trace(x: &[f64], peaks: &[MecozziParams]) -> Vec<f64> {
    x.iter()
        .map(|&v| peaks.iter().map(|p| mecozzi(v, p)).sum())
        .collect()
}

/// Vertical gel lane: dark Gaussian bands `(row, depth, sigma)` on a bright background.
///
/// Every pixel in a row has the same value.
pub fn gel_lane(width: usize, height: usize, background: f64, bands: &[(f64, f64, f64)]) -> Raster {
    Raster::from_fn(width, height, |_, y| {
        let y = y as f64;
        let darkening: f64 = bands
            .iter()
            .map(|&(c, depth, sigma)| depth * (-0.5 * ((y - c) / sigma).powi(2)).exp())
            .sum();
        (background - darkening).max(0.0)
    })
}
