// src/fitting.rs - Mecozzi asymmetric peak model and bounded least-squares fitting

use nalgebra::{Matrix4, Vector4};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::area::trapezoid;
use crate::errors::{ChromaError, Result};
use crate::path_algorithms::linspace;

/// Samples taken on each side of the seed peak
pub const FIT_HALF_WINDOW: usize = 50;
/// Points in a fitted curve
pub const FIT_CURVE_SAMPLES: usize = 500;

const INITIAL_HWHM: f64 = 20.0;
const INITIAL_ASYMMETRY: f64 = 1.0;
const HWHM_MAX: f64 = 100.0;
const ASYMMETRY_MIN: f64 = 0.1;
const ASYMMETRY_MAX: f64 = 10.0;

// Levenberg-Marquardt controls
const MAX_ITERATIONS: usize = 500;
const COST_TOLERANCE: f64 = 1e-10;
const STEP_TOLERANCE: f64 = 1e-10;
const GRADIENT_TOLERANCE: f64 = 1e-12;
const DIFF_STEP: f64 = 1.490_116_119_384_765_6e-8; // sqrt(f64::EPSILON)
const LAMBDA_INITIAL: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e12;

/// Parameters of the Mecozzi peak shape
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MecozziParams {
    pub height: f64,
    pub center: f64,
    /// Half-width at half-maximum
    pub hwhm: f64,
    /// Tailing parameter; small values approach a Gaussian
    pub asymmetry: f64,
}

impl MecozziParams {
    pub fn new(height: f64, center: f64, hwhm: f64, asymmetry: f64) -> Self {
        Self { height, center, hwhm, asymmetry }
    }

    fn to_vector(self) -> Vector4<f64> {
        Vector4::new(self.height, self.center, self.hwhm, self.asymmetry)
    }

    fn from_vector(v: &Vector4<f64>) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }

    /// Position left of which the model is identically zero
    pub fn cutoff(&self) -> f64 {
        self.center - self.hwhm * (4.0 - self.asymmetry * self.asymmetry) / (2.0 * self.asymmetry)
    }
}

/// Evaluate the Mecozzi model at `x`.
///
/// `f(x) = h * exp(k * (ln(1 + u) - u))` with `k = 4/a^2 - 1` and
/// `u = 2a(x - c) / (w(4 - a^2))`. Left of the cutoff
/// `c - w(4 - a^2)/(2a)` the model is 0. Parameter sets that would leave the
/// logarithm's domain, or produce a non-finite value, also evaluate to 0.
pub fn mecozzi(x: f64, params: &MecozziParams) -> f64 {
    let MecozziParams { height, center, hwhm, asymmetry: a } = *params;
    if !(hwhm > 0.0) || !(a > 0.0) {
        return 0.0;
    }

    let a2 = a * a;
    let span = hwhm * (4.0 - a2);
    if span == 0.0 {
        return 0.0;
    }

    let cutoff = center - span / (2.0 * a);
    if x < cutoff {
        return 0.0;
    }

    let u = 2.0 * a * (x - center) / span;
    if !(1.0 + u > 0.0) {
        return 0.0;
    }

    let k = 4.0 / a2 - 1.0;
    let value = height * (k * (u.ln_1p() - u)).exp();
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Evaluate the model at every x
pub fn mecozzi_curve(xs: &[f64], params: &MecozziParams) -> Vec<f64> {
    xs.iter().map(|&x| mecozzi(x, params)).collect()
}

/// A fitted peak: parameters, a dense model curve and its area
#[derive(Debug, Clone, PartialEq)]
pub struct PeakFit {
    pub params: MecozziParams,
    pub fitted_x: Vec<f64>,
    pub fitted_y: Vec<f64>,
    pub area: f64,
    /// Profile index the fit was seeded from, if any
    pub peak_index: Option<usize>,
}

impl PeakFit {
    fn sampled(params: MecozziParams, x_start: f64, x_end: f64, peak_index: Option<usize>) -> Self {
        let fitted_x = linspace(x_start, x_end, FIT_CURVE_SAMPLES);
        let fitted_y = mecozzi_curve(&fitted_x, &params);
        let area = trapezoid(&fitted_y, &fitted_x);
        Self { params, fitted_x, fitted_y, area, peak_index }
    }

    /// Rebuild a fit from stored parameters.
    ///
    /// The curve spans `center ± 5 * hwhm`. A stored `area` is kept as is,
    /// otherwise it is integrated from the curve.
    pub fn from_params(params: MecozziParams, peak_index: Option<usize>, area: Option<f64>) -> Self {
        let half_span = 5.0 * params.hwhm;
        let mut fit = Self::sampled(
            params,
            params.center - half_span,
            params.center + half_span,
            peak_index,
        );
        if let Some(area) = area {
            fit.area = area;
        }
        fit
    }
}

struct Bounds {
    lower: Vector4<f64>,
    upper: Vector4<f64>,
}

impl Bounds {
    fn clamp(&self, p: &Vector4<f64>) -> Vector4<f64> {
        Vector4::from_fn(|j, _| p[j].clamp(self.lower[j], self.upper[j]))
    }
}

/// Fit the Mecozzi model around `peak_idx`.
///
/// The window covers `peak_idx ± 50` samples (inclusive, clamped). The fit
/// starts from the peak height above the window minimum, the peak position,
/// a half-width of 20 and unit asymmetry.
pub fn fit_peak(distances: &[f64], intensities: &[f64], peak_idx: usize) -> Result<PeakFit> {
    let len = intensities.len();
    if distances.len() != len {
        return Err(ChromaError::Fit(format!(
            "distance and intensity arrays differ in length ({} vs {})",
            distances.len(),
            len
        )));
    }
    if peak_idx >= len {
        return Err(ChromaError::Fit(format!(
            "peak index {} is outside a profile of {} samples",
            peak_idx, len
        )));
    }

    let start = peak_idx.saturating_sub(FIT_HALF_WINDOW);
    let end = (peak_idx + FIT_HALF_WINDOW).min(len - 1);
    let x = &distances[start..=end];
    let y = &intensities[start..=end];

    if x.len() < 4 {
        return Err(ChromaError::Fit(format!(
            "fit window has {} samples, at least 4 are needed",
            x.len()
        )));
    }
    if x.iter().chain(y).any(|v| !v.is_finite()) {
        return Err(ChromaError::Fit("fit window contains non-finite values".to_string()));
    }

    let window_min = y.iter().cloned().fold(f64::INFINITY, f64::min);
    let height0 = intensities[peak_idx] - window_min;
    let (x_min, x_max) = (x[0], x[x.len() - 1]);
    if !(height0 > 0.0) {
        return Err(ChromaError::Fit(format!(
            "peak at index {} does not rise above its window",
            peak_idx
        )));
    }
    if !(x_max > x_min) {
        return Err(ChromaError::Fit("fit window spans no distance".to_string()));
    }

    let initial = MecozziParams::new(height0, distances[peak_idx], INITIAL_HWHM, INITIAL_ASYMMETRY);
    let bounds = Bounds {
        lower: Vector4::new(0.0, x_min, 0.0, ASYMMETRY_MIN),
        upper: Vector4::new(2.0 * height0, x_max, HWHM_MAX, ASYMMETRY_MAX),
    };

    let solution = least_squares(x, y, initial.to_vector(), &bounds)?;
    let params = MecozziParams::from_vector(&solution);

    log::debug!(
        "Fitted peak {}: h={:.3} c={:.3} w={:.3} a={:.3}",
        peak_idx,
        params.height,
        params.center,
        params.hwhm,
        params.asymmetry
    );

    Ok(PeakFit::sampled(params, x_min, x_max, Some(peak_idx)))
}

/// Fit every peak independently.
///
/// Failures are logged and skipped; the returned fits keep the order of
/// `peak_indices`. Returns the fits and the number of successes.
pub fn fit_all_peaks(distances: &[f64], intensities: &[f64], peak_indices: &[usize]) -> (Vec<PeakFit>, usize) {
    let outcomes: Vec<Result<PeakFit>> = peak_indices
        .par_iter()
        .map(|&idx| fit_peak(distances, intensities, idx))
        .collect();

    let mut fits = Vec::with_capacity(outcomes.len());
    for (idx, outcome) in peak_indices.iter().zip(outcomes) {
        match outcome {
            Ok(fit) => fits.push(fit),
            Err(e) => log::warn!("Error fitting peak at index {}: {}", idx, e),
        }
    }

    let success_count = fits.len();
    (fits, success_count)
}

fn residuals(x: &[f64], y: &[f64], p: &Vector4<f64>) -> Vec<f64> {
    let params = MecozziParams::from_vector(p);
    x.iter().zip(y).map(|(&xi, &yi)| mecozzi(xi, &params) - yi).collect()
}

fn half_sum_of_squares(r: &[f64]) -> f64 {
    0.5 * r.iter().map(|v| v * v).sum::<f64>()
}

/// `J^T J` and `J^T r` from a forward-difference Jacobian.
///
/// Steps that would cross an upper bound are taken backwards instead.
fn normal_equations(
    x: &[f64],
    y: &[f64],
    p: &Vector4<f64>,
    r: &[f64],
    bounds: &Bounds,
) -> (Matrix4<f64>, Vector4<f64>) {
    let mut columns: [Vec<f64>; 4] = Default::default();
    for (j, column) in columns.iter_mut().enumerate() {
        let mut h = DIFF_STEP * p[j].abs().max(1.0);
        if p[j] + h > bounds.upper[j] {
            h = -h;
        }
        let mut shifted = *p;
        shifted[j] += h;
        *column = residuals(x, y, &shifted)
            .iter()
            .zip(r)
            .map(|(a, b)| (a - b) / h)
            .collect();
    }

    let mut jtj = Matrix4::zeros();
    let mut jtr = Vector4::zeros();
    for (i, &ri) in r.iter().enumerate() {
        let row = Vector4::new(columns[0][i], columns[1][i], columns[2][i], columns[3][i]);
        jtj += row * row.transpose();
        jtr += row * ri;
    }
    (jtj, jtr)
}

/// Gradient components that can still move the parameters inside the box
fn projected_gradient_norm(g: &Vector4<f64>, p: &Vector4<f64>, bounds: &Bounds) -> f64 {
    (0..4)
        .map(|j| {
            let blocked = (p[j] <= bounds.lower[j] && g[j] > 0.0)
                || (p[j] >= bounds.upper[j] && g[j] < 0.0);
            if blocked {
                0.0
            } else {
                g[j].abs()
            }
        })
        .fold(0.0, f64::max)
}

/// Box-constrained Levenberg-Marquardt.
///
/// Steps solve `(J^T J + lambda * diag(J^T J)) d = -J^T r` and are projected
/// onto the bounds. Stops on a small relative cost decrease, a small step, a
/// vanishing projected gradient, or when no damping level improves the cost.
fn least_squares(x: &[f64], y: &[f64], initial: Vector4<f64>, bounds: &Bounds) -> Result<Vector4<f64>> {
    let mut p = bounds.clamp(&initial);
    let mut r = residuals(x, y, &p);
    let mut cost = half_sum_of_squares(&r);
    if !cost.is_finite() {
        return Err(ChromaError::Fit("initial guess has a non-finite cost".to_string()));
    }

    let mut lambda = LAMBDA_INITIAL;
    for _ in 0..MAX_ITERATIONS {
        if cost == 0.0 {
            return Ok(p);
        }

        let (jtj, jtr) = normal_equations(x, y, &p, &r, bounds);
        if projected_gradient_norm(&jtr, &p, bounds) <= GRADIENT_TOLERANCE {
            return Ok(p);
        }

        loop {
            let mut damped = jtj;
            for j in 0..4 {
                damped[(j, j)] += lambda * jtj[(j, j)].max(1e-12);
            }

            let rhs = -jtr;
            let step = damped
                .cholesky()
                .map(|c| c.solve(&rhs))
                .or_else(|| damped.lu().solve(&rhs));

            if let Some(step) = step {
                let candidate = bounds.clamp(&(p + step));
                let r_candidate = residuals(x, y, &candidate);
                let cost_candidate = half_sum_of_squares(&r_candidate);

                if cost_candidate.is_finite() && cost_candidate < cost {
                    let small_step = (0..4).all(|j| {
                        (candidate[j] - p[j]).abs() <= STEP_TOLERANCE * (STEP_TOLERANCE + p[j].abs())
                    });
                    let small_decrease = cost - cost_candidate <= COST_TOLERANCE * cost;

                    p = candidate;
                    r = r_candidate;
                    cost = cost_candidate;
                    lambda = (lambda / 10.0).max(LAMBDA_MIN);

                    if small_step || small_decrease {
                        return Ok(p);
                    }
                    break;
                }
            }

            lambda *= 10.0;
            if lambda > LAMBDA_MAX {
                // No damping level lowers the cost: p is a local minimum
                return Ok(p);
            }
        }
    }

    Err(ChromaError::Fit(format!(
        "no convergence after {} iterations",
        MAX_ITERATIONS
    )))
}
