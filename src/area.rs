// src/area.rs - Trapezoidal integration shared by integration and fitting

/// Integrate `y` over `x` with the composite trapezoidal rule.
///
/// Returns 0 for fewer than two samples. Negative contributions are kept,
/// so baseline-subtracted curves that dip below zero produce signed totals.
/// When the slices differ in length only the common prefix is integrated.
pub fn trapezoid(y: &[f64], x: &[f64]) -> f64 {
    let n = y.len().min(x.len());
    if n < 2 {
        return 0.0;
    }

    let mut area = 0.0;
    for i in 1..n {
        let dx = x[i] - x[i - 1];
        let avg_y = (y[i] + y[i - 1]) / 2.0;
        area += dx * avg_y;
    }
    area
}
