// src/filters.rs - Inversion and smoothing of raw profile intensities

use nalgebra::{DMatrix, DVector};

use crate::errors::{ChromaError, Result};
use crate::profile::Profile;

/// Gaussian kernels extend this many standard deviations each side
const GAUSSIAN_TRUNCATE: f64 = 4.0;

/// Parameters of the filter chain applied to a raw profile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterParams {
    /// Flip the trace so dark bands become peaks
    pub invert: bool,
    /// Savitzky-Golay window length; even values are bumped to the next odd one
    pub window_size: usize,
    /// Savitzky-Golay polynomial order, must stay below the window length
    pub poly_order: usize,
    /// Gaussian standard deviation in samples; 0 disables the pass
    pub smooth_sigma: f64,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            invert: true,
            window_size: 15,
            poly_order: 3,
            smooth_sigma: 0.0,
        }
    }
}

/// Run the filter chain on `profile` and store the result as its filtered trace.
///
/// On error the profile is left untouched.
pub fn apply_filters(profile: &mut Profile, params: &FilterParams) -> Result<()> {
    let filtered = filter_intensities(profile.raw_intensities(), params)?;
    profile.replace_filtered(filtered);
    Ok(())
}

/// Invert (optionally), then Savitzky-Golay, then Gaussian smoothing.
pub fn filter_intensities(raw: &[f64], params: &FilterParams) -> Result<Vec<f64>> {
    if !params.smooth_sigma.is_finite() || params.smooth_sigma < 0.0 {
        return Err(ChromaError::Filter(format!(
            "smoothing sigma must be a non-negative number, got {}",
            params.smooth_sigma
        )));
    }

    let inverted = if params.invert {
        invert(raw)
    } else {
        raw.to_vec()
    };

    let smoothed = savitzky_golay(&inverted, params.window_size, params.poly_order)?;

    Ok(gaussian_smooth(&smoothed, params.smooth_sigma))
}

/// Reflect intensities about their maximum (`max - v`)
pub fn invert(data: &[f64]) -> Vec<f64> {
    let max = data.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    data.iter().map(|&v| max - v).collect()
}

/// Savitzky-Golay smoothing.
///
/// Interior samples are the value at the centre of a least-squares
/// polynomial fitted to the surrounding window. The first and last half
/// windows are evaluated from the polynomials fitted to the first and last
/// full windows. Data no longer than the window is returned unchanged.
pub fn savitzky_golay(data: &[f64], window_size: usize, poly_order: usize) -> Result<Vec<f64>> {
    let window = if window_size % 2 == 0 { window_size + 1 } else { window_size };

    if poly_order >= window {
        return Err(ChromaError::Filter(format!(
            "polynomial order {} must be less than the window size {}; \
             try reducing the window size or polynomial order",
            poly_order, window
        )));
    }

    let n = data.len();
    if n <= window {
        return Ok(data.to_vec());
    }

    let projection = savgol_projection(window, poly_order)?;
    let half = window / 2;
    let mut smoothed = vec![0.0; n];

    // Interior: convolution with the centre row of the projection
    let centre = projection.row(0);
    for i in half..(n - half) {
        let start = i - half;
        smoothed[i] = (0..window).map(|k| centre[k] * data[start + k]).sum();
    }

    // Edges: evaluate the polynomials of the outermost windows
    let leading = fit_window(&projection, &data[..window]);
    for i in 0..half {
        smoothed[i] = eval_poly(&leading, i as f64 - half as f64);
    }

    let tail_start = n - window;
    let trailing = fit_window(&projection, &data[tail_start..]);
    for i in (n - half)..n {
        smoothed[i] = eval_poly(&trailing, (i - tail_start) as f64 - half as f64);
    }

    Ok(smoothed)
}

/// Least-squares projection onto polynomials in the centred window coordinate.
///
/// Row `j` maps a window of samples to the coefficient of `t^j`.
fn savgol_projection(window: usize, poly_order: usize) -> Result<DMatrix<f64>> {
    let half = (window / 2) as f64;
    let design = DMatrix::from_fn(window, poly_order + 1, |i, j| {
        (i as f64 - half).powi(j as i32)
    });

    design
        .pseudo_inverse(1e-12)
        .map_err(|e| ChromaError::Filter(format!("Savitzky-Golay coefficients: {}", e)))
}

fn fit_window(projection: &DMatrix<f64>, window: &[f64]) -> DVector<f64> {
    projection * DVector::from_column_slice(window)
}

fn eval_poly(coefficients: &DVector<f64>, t: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, &c| acc * t + c)
}

/// Gaussian smoothing with a kernel truncated at four standard deviations.
///
/// Boundaries reflect about the outer sample edges (`c b a | a b c`).
/// A non-positive sigma returns the data unchanged.
pub fn gaussian_smooth(data: &[f64], sigma: f64) -> Vec<f64> {
    if !(sigma > 0.0) || data.is_empty() {
        return data.to_vec();
    }

    let kernel = gaussian_kernel(sigma);
    let radius = (kernel.len() / 2) as isize;
    let n = data.len();

    (0..n)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .map(|(k, w)| {
                    let idx = reflect_index(i as isize + k as isize - radius, n);
                    w * data[idx]
                })
                .sum()
        })
        .collect()
}

/// Normalized Gaussian weights of radius `floor(4 * sigma + 0.5)`
pub fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (GAUSSIAN_TRUNCATE * sigma + 0.5) as isize;
    let mut weights: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x as f64 / sigma).powi(2)).exp())
        .collect();

    let weight_sum: f64 = weights.iter().sum();
    for weight in &mut weights {
        *weight /= weight_sum;
    }
    weights
}

#[inline]
fn reflect_index(i: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let k = i.rem_euclid(period);
    if k < n as isize {
        k as usize
    } else {
        (period - 1 - k) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn noisy_parabola(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let x = i as f64;
                0.02 * x * x - x + 3.0 + if i % 2 == 0 { 0.3 } else { -0.3 }
            })
            .collect()
    }

    #[test]
    fn invert_flips_about_maximum() {
        assert_eq!(invert(&[1.0, 4.0, 2.0]), vec![3.0, 0.0, 2.0]);
        assert!(invert(&[]).is_empty());
    }

    #[test]
    fn savitzky_golay_preserves_polynomials_of_its_order() {
        let data: Vec<f64> = (0..40).map(|i| {
            let x = i as f64 * 0.5;
            1.0 + 2.0 * x - 0.3 * x * x + 0.01 * x * x * x
        }).collect();
        let smoothed = savitzky_golay(&data, 9, 3).unwrap();
        for (a, b) in data.iter().zip(&smoothed) {
            assert_approx_eq!(a, b, 1e-8);
        }
    }

    #[test]
    fn savitzky_golay_quadratic_window_five_coefficients() {
        // Classic 5-point quadratic weights: (-3, 12, 17, 12, -3) / 35
        let data = [0.0, 0.0, 0.0, 0.0, 35.0, 0.0, 0.0, 0.0, 0.0];
        let smoothed = savitzky_golay(&data, 5, 2).unwrap();
        assert_approx_eq!(smoothed[2], -3.0, 1e-9);
        assert_approx_eq!(smoothed[3], 12.0, 1e-9);
        assert_approx_eq!(smoothed[4], 17.0, 1e-9);
        assert_approx_eq!(smoothed[5], 12.0, 1e-9);
        assert_approx_eq!(smoothed[6], -3.0, 1e-9);
    }

    #[test]
    fn even_window_is_bumped_and_short_data_untouched() {
        let data = [1.0, 5.0, 2.0, 8.0];
        assert_eq!(savitzky_golay(&data, 4, 2).unwrap(), data.to_vec());
        let long = noisy_parabola(30);
        assert_eq!(savitzky_golay(&long, 6, 2).unwrap(), savitzky_golay(&long, 7, 2).unwrap());
    }

    #[test]
    fn poly_order_must_stay_below_window() {
        let err = savitzky_golay(&noisy_parabola(30), 5, 5).unwrap_err();
        assert!(matches!(err, ChromaError::Filter(_)));
        assert!(err.is_recoverable());
    }

    #[test]
    fn gaussian_kernel_is_normalized() {
        let kernel = gaussian_kernel(1.5);
        assert_eq!(kernel.len(), 2 * 6 + 1);
        assert_approx_eq!(kernel.iter().sum::<f64>(), 1.0, 1e-12);
        assert_approx_eq!(kernel[0], kernel[12], 1e-15);
    }

    #[test]
    fn gaussian_keeps_constants_and_spreads_impulses() {
        let flat = vec![7.0; 20];
        for v in gaussian_smooth(&flat, 2.0) {
            assert_approx_eq!(v, 7.0, 1e-12);
        }

        let mut impulse = vec![0.0; 21];
        impulse[10] = 1.0;
        let spread = gaussian_smooth(&impulse, 1.0);
        assert_approx_eq!(spread.iter().sum::<f64>(), 1.0, 1e-12);
        assert!(spread[10] < 1.0 && spread[9] > 0.0 && spread[11] > 0.0);
        assert_approx_eq!(spread[9], spread[11], 1e-15);
    }

    #[test]
    fn reflect_mirrors_past_both_ends() {
        assert_eq!(reflect_index(-1, 4), 0);
        assert_eq!(reflect_index(-2, 4), 1);
        assert_eq!(reflect_index(4, 4), 3);
        assert_eq!(reflect_index(5, 4), 2);
        assert_eq!(reflect_index(-3, 1), 0);
    }

    #[test]
    fn filter_chain_is_repeatable() {
        let raw = noisy_parabola(60);
        let params = FilterParams { invert: true, window_size: 11, poly_order: 3, smooth_sigma: 1.2 };
        let first = filter_intensities(&raw, &params).unwrap();
        let second = filter_intensities(&raw, &params).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn failed_filter_leaves_profile_alone() {
        let raw = noisy_parabola(30);
        let distances: Vec<f64> = (0..30).map(|i| i as f64).collect();
        let mut profile = Profile::new(distances, raw.clone()).unwrap();
        let bad = FilterParams { invert: false, window_size: 5, poly_order: 7, smooth_sigma: 0.0 };
        assert!(apply_filters(&mut profile, &bad).is_err());
        assert_eq!(profile.filtered_intensities(), raw.as_slice());

        let negative_sigma = FilterParams { smooth_sigma: -1.0, ..FilterParams::default() };
        assert!(apply_filters(&mut profile, &negative_sigma).is_err());
    }
}
