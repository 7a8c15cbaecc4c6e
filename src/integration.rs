// src/integration.rs - Baseline-subtracted peak areas
//
// Index ranges are end-inclusive throughout: a region (start, end) covers
// samples start..=end for area, reporting and export alike.

use serde::Serialize;

use crate::area::trapezoid;
use crate::errors::{ChromaError, Result};
use crate::path_algorithms::linspace;

/// Samples added on each side of an automatically found region
pub const AUTO_INTEGRATION_PADDING: usize = 3;

/// Parameters for automatic integration bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntegrationParams {
    /// Bounds start where the trace falls below `(100 - width_percent)%` of the apex
    pub width_percent: f64,
    /// Flat-tail extension: keep walking while the step is below this fraction of the apex
    pub sensitivity: f64,
}

impl Default for IntegrationParams {
    fn default() -> Self {
        Self {
            width_percent: 20.0,
            sensitivity: 0.01,
        }
    }
}

/// An integrated span of a profile
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IntegrationRegion {
    pub start: usize,
    /// Last sample of the region (inclusive)
    pub end: usize,
    /// Signed area above the straight baseline joining the endpoints
    pub area: f64,
}

impl IntegrationRegion {
    /// Measure the region `start..=end`; requires `start < end < len`
    pub fn measure(distances: &[f64], intensities: &[f64], start: usize, end: usize) -> Result<Self> {
        if start >= end {
            return Err(ChromaError::InvalidRange {
                start,
                end,
                len: intensities.len(),
            });
        }
        let area = integration_area(distances, intensities, start, end)?;
        Ok(Self { start, end, area })
    }

    /// Whether `index` falls inside the region
    pub fn contains(&self, index: usize) -> bool {
        self.start <= index && index <= self.end
    }
}

/// Area of `intensities` above the chord from `start` to `end` (inclusive).
///
/// The sign is kept: stretches below the baseline subtract from the total.
pub fn integration_area(distances: &[f64], intensities: &[f64], start: usize, end: usize) -> Result<f64> {
    let len = intensities.len();
    if distances.len() != len || start > end || end >= len {
        return Err(ChromaError::InvalidRange { start, end, len });
    }

    let x_range = &distances[start..=end];
    let y_range = &intensities[start..=end];
    let baseline = linspace(intensities[start], intensities[end], y_range.len());

    let above: Vec<f64> = y_range
        .iter()
        .zip(&baseline)
        .map(|(y, b)| y - b)
        .collect();

    Ok(trapezoid(&above, x_range))
}

/// Integrate between two positions chosen on the distance axis.
///
/// Each position snaps to the nearest sample; reversed selections are
/// swapped. Returns `(start_idx, end_idx, area)`. Empty input gives
/// `(0, 0, 0.0)`, as does a selection that snaps to a single sample.
pub fn manual_integrate(
    distances: &[f64],
    intensities: &[f64],
    start_x: f64,
    end_x: f64,
) -> Result<(usize, usize, f64)> {
    if distances.len() != intensities.len() {
        return Err(ChromaError::InvalidRange {
            start: 0,
            end: distances.len().saturating_sub(1),
            len: intensities.len(),
        });
    }
    if distances.is_empty() {
        return Ok((0, 0, 0.0));
    }

    let mut start_idx = nearest_index(distances, start_x);
    let mut end_idx = nearest_index(distances, end_x);
    if start_idx > end_idx {
        std::mem::swap(&mut start_idx, &mut end_idx);
    }

    let area = integration_area(distances, intensities, start_idx, end_idx)?;
    Ok((start_idx, end_idx, area))
}

/// Find integration bounds around a peak.
///
/// Walks outward while the trace stays above the width threshold, then keeps
/// walking across flat stretches, and finally pads both bounds by
/// [`AUTO_INTEGRATION_PADDING`] samples. Returns `(start_idx, end_idx)`.
pub fn auto_integrate(
    distances: &[f64],
    intensities: &[f64],
    peak_idx: usize,
    width_percent: f64,
    sensitivity: f64,
) -> Result<(usize, usize)> {
    let len = intensities.len();
    if distances.len() != len || peak_idx >= len {
        return Err(ChromaError::InvalidRange {
            start: peak_idx,
            end: peak_idx,
            len,
        });
    }

    let peak_height = intensities[peak_idx];
    let threshold = peak_height * (1.0 - width_percent / 100.0);
    let flat_step = sensitivity * peak_height;

    let mut left = peak_idx;
    while left > 0 && intensities[left] > threshold {
        left -= 1;
    }
    while left > 0 && (intensities[left] - intensities[left - 1]).abs() < flat_step {
        left -= 1;
    }

    let last = len - 1;
    let mut right = peak_idx;
    while right < last && intensities[right] > threshold {
        right += 1;
    }
    while right < last && (intensities[right] - intensities[right + 1]).abs() < flat_step {
        right += 1;
    }

    let start = left.saturating_sub(AUTO_INTEGRATION_PADDING);
    let end = (right + AUTO_INTEGRATION_PADDING).min(last);

    Ok((start, end))
}

/// Index of the sample closest to `x` (first one on ties)
pub fn nearest_index(values: &[f64], x: f64) -> usize {
    let mut best = 0;
    let mut best_diff = f64::INFINITY;
    for (i, &v) in values.iter().enumerate() {
        let diff = (v - x).abs();
        if diff < best_diff {
            best = i;
            best_diff = diff;
        }
    }
    best
}
