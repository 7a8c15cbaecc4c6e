// src/peaks.rs - Adaptive local-maxima search over a filtered trace

use serde::Serialize;

/// Peak detection parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeakParams {
    /// Minimum peak height as a fraction of the data range, in `[0, 1]`
    pub height_threshold: f64,
    /// Minimum spacing between reported peaks, in samples
    pub min_distance: usize,
    /// Minimum prominence as a percentage of the data range
    pub prominence: f64,
    /// Minimum width at half prominence, in samples
    pub min_width: usize,
}

impl Default for PeakParams {
    fn default() -> Self {
        Self {
            height_threshold: 0.5,
            min_distance: 20,
            prominence: 10.0,
            min_width: 3,
        }
    }
}

/// A detected peak and its derived attributes
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Peak {
    /// Index into the profile arrays
    pub index: usize,
    /// Distance along the path at `index`
    pub position: f64,
    /// Filtered intensity at `index`
    pub intensity: f64,
    pub prominence: f64,
    /// Width at half prominence, in samples
    pub width: f64,
}

/// Peak indices of `filtered`, ascending.
///
/// Empty or constant input yields no peaks.
pub fn detect_peaks(filtered: &[f64], params: &PeakParams) -> Vec<usize> {
    select_peaks(filtered, params)
        .into_iter()
        .map(|candidate| candidate.index)
        .collect()
}

/// Detect peaks and attach their positions and shape attributes
pub fn characterize_peaks(distances: &[f64], filtered: &[f64], params: &PeakParams) -> Vec<Peak> {
    select_peaks(filtered, params)
        .into_iter()
        .map(|candidate| Peak {
            index: candidate.index,
            position: distances.get(candidate.index).copied().unwrap_or(f64::NAN),
            intensity: filtered[candidate.index],
            prominence: candidate.prominence,
            width: candidate.width,
        })
        .collect()
}

impl Peak {
    /// Describe the sample at `index` as a peak, measuring its prominence and
    /// width without applying any selection criteria. Returns `None` when the
    /// index is outside the arrays.
    pub fn at(distances: &[f64], filtered: &[f64], index: usize) -> Option<Self> {
        if index >= filtered.len() || index >= distances.len() {
            return None;
        }
        let (prominence, left_base, right_base) = prominence(filtered, index);
        let width = width_at_half_prominence(filtered, index, prominence, left_base, right_base);
        Some(Self {
            index,
            position: distances[index],
            intensity: filtered[index],
            prominence,
            width,
        })
    }
}

struct Candidate {
    index: usize,
    prominence: f64,
    width: f64,
}

fn select_peaks(data: &[f64], params: &PeakParams) -> Vec<Candidate> {
    if data.is_empty() {
        return Vec::new();
    }

    let min = data.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = data.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let data_range = max - min;
    if !(data_range > 0.0) {
        return Vec::new();
    }

    let abs_height = params.height_threshold * data_range + min;
    let adaptive_prominence = params.prominence * (data_range / 100.0);

    let mut peaks: Vec<usize> = local_maxima(data)
        .into_iter()
        .filter(|&i| data[i] >= abs_height)
        .collect();

    peaks = select_by_distance(data, &peaks, params.min_distance.max(1));

    let mut selected = Vec::with_capacity(peaks.len());
    for peak in peaks {
        let (prominence, left_base, right_base) = prominence(data, peak);
        if prominence < adaptive_prominence {
            continue;
        }
        let width = width_at_half_prominence(data, peak, prominence, left_base, right_base);
        if width < params.min_width as f64 {
            continue;
        }
        selected.push(Candidate { index: peak, prominence, width });
    }

    log::debug!(
        "Peak search: range {:.3}, height >= {:.3}, prominence >= {:.3}, {} peak(s)",
        data_range,
        abs_height,
        adaptive_prominence,
        selected.len()
    );

    selected
}

/// Indices of strict local maxima.
///
/// A flat plateau counts once, at its midpoint (rounded down). Maxima that
/// touch either end of the series are not reported.
pub fn local_maxima(data: &[f64]) -> Vec<usize> {
    let mut maxima = Vec::new();
    if data.len() < 3 {
        return maxima;
    }

    let i_max = data.len() - 1;
    let mut i = 1;
    while i < i_max {
        if data[i - 1] < data[i] {
            let mut ahead = i + 1;
            while ahead < i_max && data[ahead] == data[i] {
                ahead += 1;
            }
            if data[ahead] < data[i] {
                let left_edge = i;
                let right_edge = ahead - 1;
                maxima.push((left_edge + right_edge) / 2);
                i = ahead;
                continue;
            }
        }
        i += 1;
    }
    maxima
}

/// Drop peaks closer than `distance` samples to a higher (or equally high,
/// earlier) peak.
fn select_by_distance(data: &[f64], peaks: &[usize], distance: usize) -> Vec<usize> {
    let mut order: Vec<usize> = (0..peaks.len()).collect();
    order.sort_by(|&a, &b| {
        data[peaks[b]]
            .partial_cmp(&data[peaks[a]])
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.cmp(&b))
    });

    let mut keep = vec![true; peaks.len()];
    for &j in &order {
        if !keep[j] {
            continue;
        }

        let mut k = j;
        while k > 0 && peaks[j] - peaks[k - 1] < distance {
            keep[k - 1] = false;
            k -= 1;
        }

        let mut k = j + 1;
        while k < peaks.len() && peaks[k] - peaks[j] < distance {
            keep[k] = false;
            k += 1;
        }
    }

    peaks
        .iter()
        .zip(keep)
        .filter_map(|(&p, kept)| kept.then_some(p))
        .collect()
}

/// Topographic prominence of `peak` with its left and right bases.
///
/// Each side is scanned until a strictly higher sample or the series end;
/// the base is the lowest point on the way. The reference level is the
/// higher of the two bases.
fn prominence(data: &[f64], peak: usize) -> (f64, usize, usize) {
    let height = data[peak];

    let mut left_min = height;
    let mut left_base = peak;
    let mut i = peak;
    loop {
        if data[i] > height {
            break;
        }
        if data[i] < left_min {
            left_min = data[i];
            left_base = i;
        }
        if i == 0 {
            break;
        }
        i -= 1;
    }

    let mut right_min = height;
    let mut right_base = peak;
    let mut i = peak;
    while i < data.len() && data[i] <= height {
        if data[i] < right_min {
            right_min = data[i];
            right_base = i;
        }
        i += 1;
    }

    (height - left_min.max(right_min), left_base, right_base)
}

/// Width of the peak at half its prominence, interpolated between samples
fn width_at_half_prominence(
    data: &[f64],
    peak: usize,
    prominence: f64,
    left_base: usize,
    right_base: usize,
) -> f64 {
    let level = data[peak] - prominence * 0.5;

    let mut i = peak;
    while left_base < i && level < data[i] {
        i -= 1;
    }
    let mut left_ip = i as f64;
    if data[i] < level {
        left_ip += (level - data[i]) / (data[i + 1] - data[i]);
    }

    let mut i = peak;
    while i < right_base && level < data[i] {
        i += 1;
    }
    let mut right_ip = i as f64;
    if data[i] < level {
        right_ip -= (level - data[i]) / (data[i - 1] - data[i]);
    }

    right_ip - left_ip
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn gaussian_bumps(n: usize, bumps: &[(f64, f64, f64)]) -> Vec<f64> {
        (0..n)
            .map(|i| {
                let x = i as f64;
                bumps
                    .iter()
                    .map(|&(c, h, s)| h * (-0.5 * ((x - c) / s).powi(2)).exp())
                    .sum()
            })
            .collect()
    }

    #[test]
    fn flat_and_empty_series_have_no_peaks() {
        let params = PeakParams::default();
        assert!(detect_peaks(&[], &params).is_empty());
        assert!(detect_peaks(&[5.0; 100], &params).is_empty());
    }

    #[test]
    fn plateaus_report_their_midpoint() {
        assert_eq!(local_maxima(&[0.0, 1.0, 1.0, 1.0, 1.0, 0.0]), vec![2]);
        assert_eq!(local_maxima(&[0.0, 2.0, 0.0, 3.0, 3.0, 3.0, 0.0]), vec![1, 4]);
        // Edges and rising tails are not maxima
        assert!(local_maxima(&[3.0, 2.0, 1.0]).is_empty());
        assert!(local_maxima(&[0.0, 1.0, 1.0]).is_empty());
    }

    #[test]
    fn finds_separated_gaussian_bands() {
        let data = gaussian_bumps(300, &[(60.0, 100.0, 6.0), (150.0, 80.0, 8.0), (240.0, 90.0, 5.0)]);
        let params = PeakParams { height_threshold: 0.3, min_distance: 20, ..PeakParams::default() };
        assert_eq!(detect_peaks(&data, &params), vec![60, 150, 240]);
    }

    #[test]
    fn height_threshold_is_relative_to_range() {
        let data = gaussian_bumps(300, &[(60.0, 100.0, 6.0), (150.0, 30.0, 8.0)]);
        let params = PeakParams { height_threshold: 0.5, min_distance: 10, ..PeakParams::default() };
        assert_eq!(detect_peaks(&data, &params), vec![60]);
    }

    #[test]
    fn lower_neighbours_within_distance_are_suppressed() {
        let data = gaussian_bumps(200, &[(80.0, 100.0, 4.0), (95.0, 70.0, 4.0)]);
        let close = PeakParams { height_threshold: 0.1, min_distance: 30, ..PeakParams::default() };
        assert_eq!(detect_peaks(&data, &close), vec![80]);

        let loose = PeakParams { min_distance: 5, ..close };
        assert_eq!(detect_peaks(&data, &loose), vec![80, 95]);
    }

    #[test]
    fn equal_heights_prefer_the_earlier_peak() {
        let data = [0.0, 5.0, 0.0, 5.0, 0.0];
        let peaks = [1, 3];
        assert_eq!(select_by_distance(&data, &peaks, 3), vec![1]);
    }

    #[test]
    fn narrow_spikes_fail_the_width_test() {
        let mut data = gaussian_bumps(200, &[(100.0, 50.0, 10.0)]);
        data[40] = 60.0;
        let params = PeakParams { height_threshold: 0.2, min_distance: 5, ..PeakParams::default() };
        assert_eq!(detect_peaks(&data, &params), vec![100]);
    }

    #[test]
    fn prominence_uses_the_higher_base() {
        let data = [0.0, 10.0, 4.0, 6.0, 2.0, 20.0, 0.0];
        let (prom, left, right) = prominence(&data, 3);
        assert_approx_eq!(prom, 2.0, 1e-12);
        assert_eq!((left, right), (2, 4));

        let (prom, _, _) = prominence(&data, 5);
        assert_approx_eq!(prom, 20.0, 1e-12);
    }

    #[test]
    fn width_interpolates_between_samples() {
        let data = [0.0, 0.0, 4.0, 8.0, 4.0, 0.0, 0.0];
        let (prom, left, right) = prominence(&data, 3);
        let width = width_at_half_prominence(&data, 3, prom, left, right);
        assert_approx_eq!(width, 2.0, 1e-12);
    }

    #[test]
    fn characterized_peaks_carry_positions() {
        let data = gaussian_bumps(120, &[(50.0, 10.0, 4.0)]);
        let distances: Vec<f64> = (0..120).map(|i| i as f64 * 0.5).collect();
        let peaks = characterize_peaks(&distances, &data, &PeakParams::default());
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].index, 50);
        assert_approx_eq!(peaks[0].position, 25.0, 1e-12);
        assert_approx_eq!(peaks[0].intensity, 10.0, 1e-12);
        assert!(peaks[0].width > 3.0);

        let rebuilt = Peak::at(&distances, &data, 50).unwrap();
        assert_eq!(rebuilt, peaks[0]);
        assert!(Peak::at(&distances, &data, 120).is_none());
    }
}
