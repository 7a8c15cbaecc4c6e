// src/config.rs - Analysis configuration loaded from TOML

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{ChromaError, Result};
use crate::filters::FilterParams;
use crate::integration::IntegrationParams;
use crate::path_algorithms::Point;
use crate::peaks::PeakParams;

/// A named path, one per lane when several are analyzed on one image
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LaneConfig {
    pub label: String,
    pub points: Vec<[f64; 2]>,
}

/// Configuration for one chromatogram analysis
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    pub image_path: String,
    pub output_dir: String,

    /// Polyline drawn across the bands, in pixel coordinates.
    /// Used as lane "1" when `lanes` is empty.
    #[serde(default)]
    pub path_points: Vec<[f64; 2]>,

    // Image adjustment
    #[serde(default = "default_brightness")]
    pub brightness: f64,

    #[serde(default = "default_contrast")]
    pub contrast: f64,

    #[serde(default = "default_band_width")]
    pub band_width: usize,

    // Filtering
    #[serde(default = "default_invert")]
    pub invert: bool,

    #[serde(default = "default_window_size")]
    pub window_size: usize,

    #[serde(default = "default_poly_order")]
    pub poly_order: usize,

    #[serde(default = "default_smooth_sigma")]
    pub smooth_sigma: f64,

    // Peak detection
    #[serde(default = "default_peak_height_threshold")]
    pub peak_height_threshold: f64,

    #[serde(default = "default_peak_min_distance")]
    pub peak_min_distance: usize,

    #[serde(default = "default_peak_prominence")]
    pub peak_prominence: f64,

    #[serde(default = "default_peak_min_width")]
    pub peak_min_width: usize,

    // Integration
    #[serde(default = "default_integration_width_percent")]
    pub integration_width_percent: f64,

    #[serde(default = "default_integration_sensitivity")]
    pub integration_sensitivity: f64,

    // Fitting and output
    #[serde(default = "default_fit_peaks")]
    pub fit_peaks: bool,

    #[serde(default = "default_write_json_summary")]
    pub write_json_summary: bool,

    // Several labelled paths instead of path_points
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lanes: Vec<LaneConfig>,
}

fn default_brightness() -> f64 {
    0.0
}

fn default_contrast() -> f64 {
    1.0
}

fn default_band_width() -> usize {
    5
}

fn default_invert() -> bool {
    true
}

fn default_window_size() -> usize {
    15
}

fn default_poly_order() -> usize {
    3
}

fn default_smooth_sigma() -> f64 {
    0.0
}

fn default_peak_height_threshold() -> f64 {
    0.5
}

fn default_peak_min_distance() -> usize {
    20
}

fn default_peak_prominence() -> f64 {
    10.0 // percent of the data range
}

fn default_peak_min_width() -> usize {
    3
}

fn default_integration_width_percent() -> f64 {
    20.0
}

fn default_integration_sensitivity() -> f64 {
    0.01
}

fn default_fit_peaks() -> bool {
    true
}

fn default_write_json_summary() -> bool {
    true
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ChromaError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;

        Self::from_toml_str(&content).map_err(|e| match e {
            ChromaError::ConfigLoad { source, .. } => ChromaError::ConfigLoad {
                source,
                path: path.to_path_buf(),
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|source| ChromaError::ConfigLoad {
            source,
            path: PathBuf::from("<inline>"),
        })
    }

    /// Create default configuration
    pub fn default() -> Self {
        Self {
            image_path: "./input.png".to_string(),
            output_dir: "./output".to_string(),
            path_points: vec![[0.0, 0.0], [100.0, 0.0]],
            brightness: default_brightness(),
            contrast: default_contrast(),
            band_width: default_band_width(),
            invert: default_invert(),
            window_size: default_window_size(),
            poly_order: default_poly_order(),
            smooth_sigma: default_smooth_sigma(),
            peak_height_threshold: default_peak_height_threshold(),
            peak_min_distance: default_peak_min_distance(),
            peak_prominence: default_peak_prominence(),
            peak_min_width: default_peak_min_width(),
            integration_width_percent: default_integration_width_percent(),
            integration_sensitivity: default_integration_sensitivity(),
            fit_peaks: default_fit_peaks(),
            write_json_summary: default_write_json_summary(),
            lanes: Vec::new(),
        }
    }

    /// Check parameter ranges. Does not touch the filesystem.
    pub fn validate(&self) -> Result<()> {
        if !self.lanes.is_empty() && !self.path_points.is_empty() {
            return Err(ChromaError::Config(
                "set either path_points or lanes, not both".to_string(),
            ));
        }

        if self.lanes.is_empty() {
            validate_points("path_points", &self.path_points)?;
        }

        let mut labels = HashSet::new();
        for lane in &self.lanes {
            if lane.label.is_empty()
                || !lane.label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            {
                return Err(ChromaError::Config(format!(
                    "lane label '{}' must be non-empty and use only letters, digits, '-' or '_'",
                    lane.label
                )));
            }
            if !labels.insert(lane.label.as_str()) {
                return Err(ChromaError::Config(format!(
                    "lane label '{}' is used twice",
                    lane.label
                )));
            }
            validate_points(&format!("lane '{}'", lane.label), &lane.points)?;
        }

        if !(-1.0..=1.0).contains(&self.brightness) {
            return Err(ChromaError::Config(
                "brightness must be between -1.0 and 1.0".to_string(),
            ));
        }

        if !(0.5..=2.0).contains(&self.contrast) {
            return Err(ChromaError::Config(
                "contrast must be between 0.5 and 2.0".to_string(),
            ));
        }

        if self.band_width == 0 || self.band_width % 2 == 0 {
            return Err(ChromaError::Config(
                "band_width must be an odd number > 0".to_string(),
            ));
        }

        if self.window_size < 3 {
            return Err(ChromaError::Config(
                "window_size must be >= 3".to_string(),
            ));
        }

        // Even windows are bumped to the next odd size when filtering
        let effective_window = self.window_size | 1;
        if self.poly_order >= effective_window {
            return Err(ChromaError::Config(format!(
                "poly_order must be < window_size ({})",
                effective_window
            )));
        }

        if !self.smooth_sigma.is_finite() || self.smooth_sigma < 0.0 {
            return Err(ChromaError::Config(
                "smooth_sigma must be >= 0.0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.peak_height_threshold) {
            return Err(ChromaError::Config(
                "peak_height_threshold must be between 0.0 and 1.0".to_string(),
            ));
        }

        if !(0.0..=100.0).contains(&self.peak_prominence) {
            return Err(ChromaError::Config(
                "peak_prominence must be between 0.0 and 100.0".to_string(),
            ));
        }

        if !(self.integration_width_percent > 0.0 && self.integration_width_percent < 100.0) {
            return Err(ChromaError::Config(
                "integration_width_percent must be between 0.0 and 100.0".to_string(),
            ));
        }

        if !self.integration_sensitivity.is_finite() || self.integration_sensitivity < 0.0 {
            return Err(ChromaError::Config(
                "integration_sensitivity must be >= 0.0".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| {
            ChromaError::Config(format!("Failed to serialize config: {}", e))
        })?;

        fs::write(path, content).map_err(ChromaError::Io)?;

        Ok(())
    }

    /// Labelled paths to analyze, in configuration order
    pub fn lane_paths(&self) -> Vec<(String, Vec<Point>)> {
        if self.lanes.is_empty() {
            return vec![("1".to_string(), to_points(&self.path_points))];
        }
        self.lanes
            .iter()
            .map(|lane| (lane.label.clone(), to_points(&lane.points)))
            .collect()
    }

    pub fn filter_params(&self) -> FilterParams {
        FilterParams {
            invert: self.invert,
            window_size: self.window_size,
            poly_order: self.poly_order,
            smooth_sigma: self.smooth_sigma,
        }
    }

    pub fn peak_params(&self) -> PeakParams {
        PeakParams {
            height_threshold: self.peak_height_threshold,
            min_distance: self.peak_min_distance,
            prominence: self.peak_prominence,
            min_width: self.peak_min_width,
        }
    }

    pub fn integration_params(&self) -> IntegrationParams {
        IntegrationParams {
            width_percent: self.integration_width_percent,
            sensitivity: self.integration_sensitivity,
        }
    }
}

fn to_points(points: &[[f64; 2]]) -> Vec<Point> {
    points.iter().copied().map(Point::from).collect()
}

fn validate_points(name: &str, points: &[[f64; 2]]) -> Result<()> {
    if points.len() < 2 {
        return Err(ChromaError::Config(format!(
            "{} must contain at least 2 points",
            name
        )));
    }
    if points.iter().flatten().any(|v| !v.is_finite()) {
        return Err(ChromaError::Config(format!("{} must be finite", name)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_parameter_structs() {
        let config = Config::default();
        assert_eq!(config.filter_params(), FilterParams::default());
        assert_eq!(config.peak_params(), PeakParams::default());
        assert_eq!(config.integration_params(), IntegrationParams::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config = Config::from_toml_str(
            r#"
            image_path = "gel.png"
            output_dir = "out"
            path_points = [[10.0, 5.0], [10.0, 300.0]]
            window_size = 21
            "#,
        )
        .unwrap();
        assert_eq!(config.window_size, 21);
        assert_eq!(config.poly_order, 3);
        assert_eq!(config.band_width, 5);
        assert!(config.invert);
        assert_eq!(
            config.lane_paths(),
            vec![("1".to_string(), vec![Point::new(10.0, 5.0), Point::new(10.0, 300.0)])]
        );
    }

    #[test]
    fn malformed_toml_is_a_load_error() {
        let err = Config::from_toml_str("image_path = ").unwrap_err();
        assert!(matches!(err, ChromaError::ConfigLoad { .. }));
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let base = Config::default();
        let cases = [
            Config { band_width: 4, ..base.clone() },
            Config { poly_order: 15, ..base.clone() },
            Config { smooth_sigma: -0.5, ..base.clone() },
            Config { contrast: 3.0, ..base.clone() },
            Config { peak_height_threshold: 1.5, ..base.clone() },
            Config { path_points: vec![[0.0, 0.0]], ..base.clone() },
        ];
        for config in cases {
            assert!(matches!(config.validate(), Err(ChromaError::Config(_))));
        }

        // poly_order 14 fits an effective window of 15
        let even = Config { window_size: 14, poly_order: 14, ..base };
        assert!(even.validate().is_ok());
    }

    #[test]
    fn lanes_replace_the_single_path() {
        let config = Config::from_toml_str(
            r#"
            image_path = "gel.png"
            output_dir = "out"

            [[lanes]]
            label = "ladder"
            points = [[10.0, 0.0], [10.0, 300.0]]

            [[lanes]]
            label = "sample-2"
            points = [[40.0, 0.0], [40.0, 300.0]]
            "#,
        )
        .unwrap();
        assert!(config.validate().is_ok());
        let labels: Vec<String> = config.lane_paths().into_iter().map(|(label, _)| label).collect();
        assert_eq!(labels, vec!["ladder", "sample-2"]);

        let lane = |label: &str, points: Vec<[f64; 2]>| LaneConfig { label: label.to_string(), points };
        let base = Config { path_points: Vec::new(), ..config };
        let cases = [
            Config { path_points: vec![[0.0, 0.0], [1.0, 0.0]], ..base.clone() },
            Config { lanes: vec![lane("a", vec![[0.0, 0.0], [1.0, 0.0]]); 2], ..base.clone() },
            Config { lanes: vec![lane("a/b", vec![[0.0, 0.0], [1.0, 0.0]])], ..base.clone() },
            Config { lanes: vec![lane("a", vec![[0.0, 0.0]])], ..base.clone() },
            Config { lanes: Vec::new(), ..base.clone() },
        ];
        for config in cases {
            assert!(matches!(config.validate(), Err(ChromaError::Config(_))));
        }

        let text = toml::to_string_pretty(&base).unwrap();
        assert_eq!(Config::from_toml_str(&text).unwrap(), base);
    }

    #[test]
    fn serialized_config_loads_back() {
        let config = Config { smooth_sigma: 1.5, fit_peaks: false, ..Config::default() };
        let text = toml::to_string_pretty(&config).unwrap();
        assert_eq!(Config::from_toml_str(&text).unwrap(), config);
    }
}
