// src/pipeline.rs - One end-to-end chromatogram analysis driven by a Config

use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::analysis::Analysis;
use crate::config::Config;
use crate::errors::{ChromaError, Result};
use crate::extraction::extract_profile;
use crate::image_io::InputRaster;
use crate::image_utils::Raster;
use crate::output::{save_analysis_csv, save_comparison_csv, save_summary_json};
use crate::path_algorithms::Point;
use crate::report::format_report;

/// The analysis of one labelled lane
#[derive(Debug, Clone)]
pub struct LaneAnalysis {
    pub label: String,
    pub analysis: Analysis,
}

/// Files written for one lane
#[derive(Debug, Clone, PartialEq)]
pub struct LaneFiles {
    pub label: String,
    pub csv: PathBuf,
    pub report: PathBuf,
    pub json: Option<PathBuf>,
}

/// Files written by [`process_image`]
#[derive(Debug, Clone, PartialEq)]
pub struct OutputFiles {
    pub lanes: Vec<LaneFiles>,
    /// Side-by-side CSV, only written for two or more lanes
    pub comparison: Option<PathBuf>,
}

/// Analyze every configured lane of an in-memory raster.
///
/// The image adjustment is applied once; lanes run in parallel and come back
/// in configuration order. The first failing lane stops the run.
pub fn analyze_raster(raster: &Raster, config: &Config) -> Result<Vec<LaneAnalysis>> {
    let adjusted;
    let raster = if config.brightness != 0.0 || config.contrast != 1.0 {
        log::debug!(
            "Adjusting image: brightness {:.2}, contrast {:.2}",
            config.brightness,
            config.contrast
        );
        adjusted = raster.adjusted(config.brightness, config.contrast);
        &adjusted
    } else {
        raster
    };

    let lanes = config.lane_paths();
    lanes
        .par_iter()
        .map(|(label, path)| {
            log::info!("Analyzing lane {}", label);
            let analysis = analyze_path(raster, path, config)?;
            Ok(LaneAnalysis { label: label.clone(), analysis })
        })
        .collect()
}

/// Run extraction, filtering, peak detection, automatic integration and
/// (optionally) fitting along one path. The raster is used as given.
pub fn analyze_path(raster: &Raster, path: &[Point], config: &Config) -> Result<Analysis> {
    let profile = extract_profile(raster, path, config.band_width)?;
    log::info!(
        "Extracted {} samples over {:.1} px",
        profile.len(),
        profile.distances().last().copied().unwrap_or(0.0)
    );

    let mut analysis = Analysis::new(profile);
    analysis.apply_filters(&config.filter_params())?;

    let peak_count = analysis.detect_peaks(&config.peak_params());
    if peak_count == 0 {
        log::warn!("No peaks found; try lowering the height threshold or prominence");
        return Ok(analysis);
    }

    let regions = analysis.auto_integrate_peaks(&config.integration_params())?;
    log::info!("Integrated {} region(s)", regions);

    if config.fit_peaks {
        let fitted = analysis.fit_all_peaks();
        if fitted < peak_count {
            log::warn!("{} of {} peak fit(s) failed", peak_count - fitted, peak_count);
        }
    }

    Ok(analysis)
}

/// Analyze a loaded image and write CSV, report and JSON summary files
/// named after the image into `config.output_dir`.
///
/// A single lane writes `<name>.csv`; several lanes write `<name>_<label>.csv`
/// each plus `<name>_comparison.csv`.
pub fn process_image(input: InputRaster, config: &Config, debug: bool) -> Result<(Vec<LaneAnalysis>, OutputFiles)> {
    let InputRaster { raster, path, filename } = input;
    log::info!(
        "Processing {} ({}x{}, {} channel(s))",
        path.display(),
        raster.width(),
        raster.height(),
        raster.channels()
    );

    let lanes = analyze_raster(&raster, config)?;
    let output_dir = Path::new(&config.output_dir);
    std::fs::create_dir_all(output_dir).map_err(ChromaError::Io)?;

    let mut lane_files = Vec::with_capacity(lanes.len());
    for lane in &lanes {
        let stem = if lanes.len() == 1 {
            filename.clone()
        } else {
            format!("{}_{}", filename, lane.label)
        };
        let report = format_report(&lane.analysis);
        if debug {
            log::debug!("Analysis of {} lane {}:\n{}", filename, lane.label, report);
        }

        let files = write_lane_outputs(lane, &report, output_dir, &stem, config.write_json_summary)?;
        log::info!("Lane {} written to {}", lane.label, files.csv.display());
        lane_files.push(files);
    }

    let comparison = if lanes.len() > 1 {
        let path = output_dir.join(format!("{}_comparison.csv", filename));
        let pairs: Vec<(&str, &Analysis)> = lanes
            .iter()
            .map(|lane| (lane.label.as_str(), &lane.analysis))
            .collect();
        save_comparison_csv(&pairs, &path)?;
        log::info!("Lane comparison written to {}", path.display());
        Some(path)
    } else {
        None
    };

    Ok((
        lanes,
        OutputFiles {
            lanes: lane_files,
            comparison,
        },
    ))
}

fn write_lane_outputs(
    lane: &LaneAnalysis,
    report: &str,
    output_dir: &Path,
    stem: &str,
    write_json: bool,
) -> Result<LaneFiles> {
    let csv = output_dir.join(format!("{}.csv", stem));
    save_analysis_csv(&lane.analysis, &csv)?;

    let report_path = output_dir.join(format!("{}_report.txt", stem));
    std::fs::write(&report_path, report).map_err(ChromaError::Io)?;

    let json = if write_json {
        let json_path = output_dir.join(format!("{}_summary.json", stem));
        save_summary_json(&lane.analysis, &json_path)?;
        Some(json_path)
    } else {
        None
    };

    Ok(LaneFiles {
        label: lane.label.clone(),
        csv,
        report: report_path,
        json,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LaneConfig;

    /// Vertical lane of dark bands on a bright background
    fn lane(bands: &[(f64, f64, f64)]) -> Raster {
        Raster::from_fn(40, 800, |_, y| {
            let y = y as f64;
            let darkening: f64 = bands
                .iter()
                .map(|&(c, depth, sigma)| depth * (-0.5 * ((y - c) / sigma).powi(2)).exp())
                .sum();
            220.0 - darkening
        })
    }

    fn lane_config() -> Config {
        Config {
            path_points: vec![[20.0, 0.0], [20.0, 799.0]],
            ..Config::default()
        }
    }

    fn single_lane(raster: &Raster, config: &Config) -> Analysis {
        let mut lanes = analyze_raster(raster, config).unwrap();
        assert_eq!(lanes.len(), 1);
        lanes.remove(0).analysis
    }

    #[test]
    fn finds_integrates_and_fits_each_band() {
        let raster = lane(&[(200.0, 150.0, 8.0), (520.0, 120.0, 10.0)]);
        let analysis = single_lane(&raster, &lane_config());

        assert_eq!(analysis.peaks().len(), 2);
        assert!((analysis.peaks()[0].position - 200.0).abs() < 3.0);
        assert!((analysis.peaks()[1].position - 520.0).abs() < 3.0);
        assert_eq!(analysis.integrations().len(), 2);
        assert_eq!(analysis.fits().len(), 2);
    }

    #[test]
    fn blank_lane_has_no_peaks() {
        let raster = Raster::from_fn(40, 800, |_, _| 200.0);
        let analysis = single_lane(&raster, &lane_config());
        assert!(analysis.peaks().is_empty());
        assert!(analysis.integrations().is_empty());
    }

    #[test]
    fn fitting_can_be_switched_off() {
        let raster = lane(&[(400.0, 150.0, 8.0)]);
        let config = Config { fit_peaks: false, ..lane_config() };
        let analysis = single_lane(&raster, &config);
        assert_eq!(analysis.peaks().len(), 1);
        assert!(analysis.fits().is_empty());
    }

    #[test]
    fn bad_geometry_stops_the_run() {
        let raster = lane(&[]);
        let config = Config { path_points: vec![[5.0, 5.0], [5.0, 5.0]], ..Config::default() };
        assert!(matches!(
            analyze_raster(&raster, &config),
            Err(ChromaError::Extraction(_))
        ));
    }

    #[test]
    fn lanes_are_analyzed_separately_and_in_order() {
        // Two bands everywhere, a third only right of x = 20
        let raster = Raster::from_fn(40, 800, |x, y| {
            let y = y as f64;
            let band = |c: f64, depth: f64| depth * (-0.5 * ((y - c) / 8.0).powi(2)).exp();
            let extra = if x > 20 { band(650.0, 130.0) } else { 0.0 };
            220.0 - band(200.0, 150.0) - band(420.0, 140.0) - extra
        });
        let lane_at = |label: &str, x: f64| LaneConfig {
            label: label.to_string(),
            points: vec![[x, 0.0], [x, 799.0]],
        };
        let config = Config {
            path_points: Vec::new(),
            lanes: vec![lane_at("left", 8.0), lane_at("right", 32.0)],
            ..Config::default()
        };

        let lanes = analyze_raster(&raster, &config).unwrap();
        let labels: Vec<&str> = lanes.iter().map(|l| l.label.as_str()).collect();
        assert_eq!(labels, vec!["left", "right"]);
        assert_eq!(lanes[0].analysis.peaks().len(), 2);
        assert_eq!(lanes[1].analysis.peaks().len(), 3);
    }
}
