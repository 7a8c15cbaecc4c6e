// src/output.rs - CSV export/import of an analysis and a JSON summary of its results

use std::collections::HashMap;
use std::fs::{self, File};
use std::io;
use std::path::Path;

use csv::{Reader, Writer};
use serde::Serialize;

use crate::analysis::Analysis;
use crate::errors::{ChromaError, Result};
use crate::fitting::{mecozzi, MecozziParams, PeakFit};
use crate::integration::{nearest_index, IntegrationRegion};
use crate::peaks::Peak;
use crate::profile::Profile;

/// Write an analysis as one CSV row per profile sample.
///
/// Profile arrays keep full precision; per-result scalars are repeated on
/// every row with six decimals.
pub fn write_analysis_csv<W: io::Write>(analysis: &Analysis, writer: W) -> Result<()> {
    let profile = analysis.profile();
    let distances = profile.distances();
    let filtered = profile.filtered_intensities();
    let peaks = analysis.peaks();
    let integrations = analysis.integrations();
    let fits = analysis.fits();

    let mut header = vec![
        "Distance".to_string(),
        "Raw_Intensity".to_string(),
        "Filtered_Intensity".to_string(),
    ];
    if !peaks.is_empty() {
        header.push("Peaks".to_string());
        for n in 1..=peaks.len() {
            header.push(format!("Peak_{}_Position", n));
            header.push(format!("Peak_{}_Height", n));
        }
    }
    for n in 1..=integrations.len() {
        header.push(format!("Integration_{}", n));
        header.push(format!("Integration_{}_Start", n));
        header.push(format!("Integration_{}_End", n));
        header.push(format!("Integration_{}_Area", n));
    }
    for n in 1..=fits.len() {
        header.push(format!("Fit_{}", n));
        header.push(format!("Fit_{}_Height", n));
        header.push(format!("Fit_{}_Center", n));
        header.push(format!("Fit_{}_HWHM", n));
        header.push(format!("Fit_{}_Asymmetry", n));
        header.push(format!("Fit_{}_Area", n));
    }

    let mut writer = Writer::from_writer(writer);
    writer.write_record(&header).map_err(ChromaError::CsvOutput)?;

    for (i, &distance) in distances.iter().enumerate() {
        let mut record = Vec::with_capacity(header.len());
        record.push(distance.to_string());
        record.push(profile.raw_intensities()[i].to_string());
        record.push(filtered[i].to_string());

        if !peaks.is_empty() {
            let at_peak = peaks.iter().any(|p| p.index == i);
            record.push(if at_peak { filtered[i].to_string() } else { "0".to_string() });
            for peak in peaks {
                record.push(format!("{:.6}", peak.position));
                record.push(format!("{:.6}", peak.intensity));
            }
        }

        for region in integrations {
            record.push(if region.contains(i) { "1" } else { "0" }.to_string());
            record.push(format!("{:.6}", distances[region.start]));
            record.push(format!("{:.6}", distances[region.end]));
            record.push(format!("{:.6}", region.area));
        }

        for fit in fits {
            let p = &fit.params;
            record.push(mecozzi(distance, p).to_string());
            record.push(format!("{:.6}", p.height));
            record.push(format!("{:.6}", p.center));
            record.push(format!("{:.6}", p.hwhm));
            record.push(format!("{:.6}", p.asymmetry));
            record.push(format!("{:.6}", fit.area));
        }

        writer.write_record(&record).map_err(ChromaError::CsvOutput)?;
    }

    writer.flush().map_err(|e| ChromaError::CsvOutput(csv::Error::from(e)))?;

    Ok(())
}

/// Rebuild an analysis from CSV written by [`write_analysis_csv`].
///
/// Peaks and integration bounds snap to the nearest stored distance and
/// integration areas are recomputed. Fits are rebuilt from their parameters.
pub fn read_analysis_csv<R: io::Read>(reader: R) -> Result<Analysis> {
    let mut reader = Reader::from_reader(reader);
    let headers = reader.headers().map_err(ChromaError::CsvOutput)?.clone();

    let mut columns: Vec<Vec<f64>> = vec![Vec::new(); headers.len()];
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(ChromaError::CsvOutput)?;
        for (col, field) in record.iter().enumerate().take(headers.len()) {
            let value = field.trim().parse::<f64>().map_err(|_| {
                ChromaError::Import(format!(
                    "row {} column '{}' is not a number: '{}'",
                    row + 1,
                    &headers[col],
                    field
                ))
            })?;
            columns[col].push(value);
        }
    }

    let table: HashMap<&str, Vec<f64>> = headers.iter().zip(columns).collect();

    let distances = required_column(&table, "Distance")?.clone();
    let filtered = required_column(&table, "Filtered_Intensity")?.clone();
    let raw = table
        .get("Raw_Intensity")
        .cloned()
        .unwrap_or_else(|| filtered.clone());

    let profile = Profile::with_filtered(distances, raw, filtered)?;
    let distances = profile.distances();

    let mut peaks = Vec::new();
    let mut n = 1;
    while let Some(position) = first_value(&table, &format!("Peak_{}_Position", n)) {
        let index = nearest_index(distances, position);
        if let Some(peak) = Peak::at(distances, profile.filtered_intensities(), index) {
            peaks.push(peak);
        }
        n += 1;
    }

    let mut integrations = Vec::new();
    let mut n = 1;
    while let (Some(start_x), Some(end_x)) = (
        first_value(&table, &format!("Integration_{}_Start", n)),
        first_value(&table, &format!("Integration_{}_End", n)),
    ) {
        let mut start = nearest_index(distances, start_x);
        let mut end = nearest_index(distances, end_x);
        if start > end {
            std::mem::swap(&mut start, &mut end);
        }
        if start < end {
            integrations.push(IntegrationRegion::measure(
                distances,
                profile.filtered_intensities(),
                start,
                end,
            )?);
        } else {
            log::warn!("Skipping integration {}: it covers a single sample", n);
        }
        n += 1;
    }

    let mut fits = Vec::new();
    let mut n = 1;
    while let (Some(height), Some(center), Some(hwhm), Some(asymmetry)) = (
        first_value(&table, &format!("Fit_{}_Height", n)),
        first_value(&table, &format!("Fit_{}_Center", n)),
        first_value(&table, &format!("Fit_{}_HWHM", n)),
        first_value(&table, &format!("Fit_{}_Asymmetry", n)),
    ) {
        let params = MecozziParams::new(height, center, hwhm, asymmetry);
        let area = first_value(&table, &format!("Fit_{}_Area", n));
        fits.push(PeakFit::from_params(params, None, area));
        n += 1;
    }

    log::debug!(
        "Imported {} samples, {} peak(s), {} integration(s), {} fit(s)",
        profile.len(),
        peaks.len(),
        integrations.len(),
        fits.len()
    );

    Analysis::from_parts(profile, peaks, integrations, fits)
}

fn required_column<'a>(table: &'a HashMap<&str, Vec<f64>>, name: &str) -> Result<&'a Vec<f64>> {
    table
        .get(name)
        .ok_or_else(|| ChromaError::Import(format!("missing required column '{}'", name)))
}

fn first_value(table: &HashMap<&str, Vec<f64>>, name: &str) -> Option<f64> {
    table.get(name).and_then(|values| values.first().copied())
}

/// Write the analysis CSV to a file, creating its directory if needed
pub fn save_analysis_csv<P: AsRef<Path>>(analysis: &Analysis, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(ChromaError::Io)?;
    }
    let file = File::create(path).map_err(ChromaError::Io)?;
    write_analysis_csv(analysis, file)
}

/// Read an analysis CSV from a file
pub fn load_analysis_csv<P: AsRef<Path>>(path: P) -> Result<Analysis> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(ChromaError::InvalidPath(path.to_path_buf()));
    }
    read_analysis_csv(File::open(path)?)
}

/// Write several lanes side by side for comparison.
///
/// `Distance` comes from the first lane. Each lane adds `Intensity_<label>`
/// and, when it has peaks, `Peaks_<label>` holding the filtered value at peak
/// samples. Columns shorter than the longest lane are padded with `NaN`.
pub fn write_comparison_csv<W: io::Write>(lanes: &[(&str, &Analysis)], writer: W) -> Result<()> {
    let distances = lanes
        .first()
        .map(|(_, analysis)| analysis.profile().distances().to_vec())
        .unwrap_or_default();

    let mut header = vec!["Distance".to_string()];
    let mut columns = vec![distances];
    for (label, analysis) in lanes {
        let filtered = analysis.profile().filtered_intensities();
        header.push(format!("Intensity_{}", label));
        columns.push(filtered.to_vec());

        if !analysis.peaks().is_empty() {
            let mut marks = vec![f64::NAN; filtered.len()];
            for peak in analysis.peaks() {
                marks[peak.index] = filtered[peak.index];
            }
            header.push(format!("Peaks_{}", label));
            columns.push(marks);
        }
    }

    let rows = columns.iter().map(Vec::len).max().unwrap_or(0);
    let mut writer = Writer::from_writer(writer);
    writer.write_record(&header).map_err(ChromaError::CsvOutput)?;

    for i in 0..rows {
        let record: Vec<String> = columns
            .iter()
            .map(|column| column.get(i).copied().unwrap_or(f64::NAN).to_string())
            .collect();
        writer.write_record(&record).map_err(ChromaError::CsvOutput)?;
    }

    writer.flush().map_err(|e| ChromaError::CsvOutput(csv::Error::from(e)))?;

    Ok(())
}

/// Write the comparison CSV to a file, creating its directory if needed
pub fn save_comparison_csv<P: AsRef<Path>>(lanes: &[(&str, &Analysis)], path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(ChromaError::Io)?;
    }
    let file = File::create(path).map_err(ChromaError::Io)?;
    write_comparison_csv(lanes, file)
}

#[derive(Serialize)]
struct FitSummary {
    peak_index: Option<usize>,
    #[serde(flatten)]
    params: MecozziParams,
    area: f64,
}

#[derive(Serialize)]
struct AnalysisSummary<'a> {
    samples: usize,
    path_length: f64,
    peaks: &'a [Peak],
    integrations: &'a [IntegrationRegion],
    fits: Vec<FitSummary>,
}

/// Serialize peaks, integrations and fit parameters as pretty JSON
pub fn summary_json(analysis: &Analysis) -> Result<String> {
    let distances = analysis.profile().distances();
    let summary = AnalysisSummary {
        samples: distances.len(),
        path_length: distances.last().copied().unwrap_or(0.0),
        peaks: analysis.peaks(),
        integrations: analysis.integrations(),
        fits: analysis
            .fits()
            .iter()
            .map(|fit| FitSummary {
                peak_index: fit.peak_index,
                params: fit.params,
                area: fit.area,
            })
            .collect(),
    };

    Ok(serde_json::to_string_pretty(&summary)?)
}

/// Write [`summary_json`] to a file
pub fn save_summary_json<P: AsRef<Path>>(analysis: &Analysis, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(ChromaError::Io)?;
    }
    fs::write(path, summary_json(analysis)?).map_err(ChromaError::Io)?;
    Ok(())
}
