// src/path_algorithms.rs - Polyline geometry for arc-length resampling

use serde::{Deserialize, Serialize};

/// A point in image-pixel space (x to the right, y downward)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl From<[f64; 2]> for Point {
    fn from(p: [f64; 2]) -> Self {
        Self { x: p[0], y: p[1] }
    }
}

/// Calculate the Euclidean distance between two points
pub fn calculate_straight_path_length(point1: Point, point2: Point) -> f64 {
    let dx = point1.x - point2.x;
    let dy = point1.y - point2.y;

    (dx * dx + dy * dy).sqrt()
}

/// Cumulative arc length at every vertex of a polyline.
///
/// The first entry is 0 and the last is the total path length.
pub fn cumulative_arc_length(points: &[Point]) -> Vec<f64> {
    let mut cumulative = Vec::with_capacity(points.len());
    if points.is_empty() {
        return cumulative;
    }

    cumulative.push(0.0);
    let mut total = 0.0;
    for pair in points.windows(2) {
        total += calculate_straight_path_length(pair[0], pair[1]);
        cumulative.push(total);
    }
    cumulative
}

/// `n` evenly spaced values from `start` to `end`, both included.
pub fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (n - 1) as f64;
            let mut values: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
            // Pin the last sample so the span is exact.
            values[n - 1] = end;
            values
        }
    }
}

/// One-dimensional piecewise linear interpolation.
///
/// `xp` must be non-decreasing. Queries outside the table are clamped to the
/// first or last value of `fp`.
pub fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let n = xp.len().min(fp.len());
    if n == 0 {
        return 0.0;
    }
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[n - 1] {
        return fp[n - 1];
    }

    // First table entry strictly greater than x; always in 1..n here.
    let hi = xp[..n].partition_point(|&v| v <= x);
    let lo = hi - 1;
    let span = xp[hi] - xp[lo];
    if span <= 0.0 {
        return fp[hi];
    }
    let t = (x - xp[lo]) / span;
    fp[lo] + t * (fp[hi] - fp[lo])
}

/// Resample a polyline at the given arc-length positions.
pub fn resample_path(points: &[Point], cumulative: &[f64], positions: &[f64]) -> Vec<Point> {
    let xs: Vec<f64> = points.iter().map(|p| p.x).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.y).collect();

    positions
        .iter()
        .map(|&s| Point::new(interp(s, cumulative, &xs), interp(s, cumulative, &ys)))
        .collect()
}

/// Resample a series to `n` values by interpolating over its indices.
pub fn resample_series(values: &[f64], n: usize) -> Vec<f64> {
    if values.is_empty() || values.len() == n {
        return values.to_vec();
    }

    let index_axis: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    linspace(0.0, (values.len() - 1) as f64, n)
        .into_iter()
        .map(|i| interp(i, &index_axis, values))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn arc_length_accumulates_segments() {
        let path = [Point::new(0.0, 0.0), Point::new(3.0, 4.0), Point::new(3.0, 10.0)];
        let cumulative = cumulative_arc_length(&path);
        assert_eq!(cumulative, vec![0.0, 5.0, 11.0]);
    }

    #[test]
    fn linspace_hits_both_ends() {
        let values = linspace(0.0, 1.0, 5);
        assert_eq!(values, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(linspace(2.0, 9.0, 1), vec![2.0]);
    }

    #[test]
    fn interp_clamps_and_interpolates() {
        let xp = [0.0, 1.0, 3.0];
        let fp = [10.0, 20.0, 40.0];
        assert_eq!(interp(-1.0, &xp, &fp), 10.0);
        assert_eq!(interp(5.0, &xp, &fp), 40.0);
        assert_approx_eq!(interp(0.5, &xp, &fp), 15.0, 1e-12);
        assert_approx_eq!(interp(2.0, &xp, &fp), 30.0, 1e-12);
        assert_eq!(interp(1.0, &xp, &fp), 20.0);
    }

    #[test]
    fn resample_path_follows_corners() {
        let path = [Point::new(0.0, 0.0), Point::new(10.0, 0.0), Point::new(10.0, 10.0)];
        let cumulative = cumulative_arc_length(&path);
        let resampled = resample_path(&path, &cumulative, &[0.0, 5.0, 10.0, 15.0, 20.0]);
        assert_eq!(resampled[1], Point::new(5.0, 0.0));
        assert_eq!(resampled[2], Point::new(10.0, 0.0));
        assert_eq!(resampled[3], Point::new(10.0, 5.0));
        assert_eq!(resampled[4], Point::new(10.0, 10.0));
    }

    #[test]
    fn resample_series_stretches_by_index() {
        let stretched = resample_series(&[0.0, 2.0], 3);
        assert_eq!(stretched, vec![0.0, 1.0, 2.0]);
        assert_eq!(resample_series(&[1.0, 2.0], 2), vec![1.0, 2.0]);
    }
}
