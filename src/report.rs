// src/report.rs - Plain-text summary of an analysis

use std::fmt::Write;

use crate::analysis::Analysis;

/// Summarize peaks, integrations and fits.
///
/// Each peak lists the integrations that contain it and the fits seeded from
/// it; all integrations and fitted areas follow.
pub fn format_report(analysis: &Analysis) -> String {
    let mut out = String::new();
    // Writing to a String cannot fail
    let _ = write_report(&mut out, analysis);
    out
}

fn write_report(out: &mut String, analysis: &Analysis) -> std::fmt::Result {
    let distances = analysis.profile().distances();

    writeln!(out, "Chromatogram Analysis:")?;
    writeln!(out, "------------------")?;

    if analysis.peaks().is_empty() {
        writeln!(out, "No peaks detected.")?;
        writeln!(out)?;
    } else {
        writeln!(out, "Detected Peaks:")?;
        for (j, peak) in analysis.peaks().iter().enumerate() {
            writeln!(out, "  Peak {}:", j + 1)?;
            writeln!(out, "    Position: {:.1}", peak.position)?;
            writeln!(out, "    Intensity: {:.1}", peak.intensity)?;

            for (k, region) in analysis.integrations().iter().enumerate() {
                if region.contains(peak.index) {
                    writeln!(out, "    Area (A{}): {:.1}", k + 1, region.area)?;
                }
            }

            for (i, fit) in analysis.fits().iter().enumerate() {
                if fit.peak_index == Some(peak.index) {
                    let p = &fit.params;
                    writeln!(out, "    Mecozzi Fit (F{}):", i + 1)?;
                    writeln!(out, "      Height: {:.2}", p.height)?;
                    writeln!(out, "      Center: {:.2}", p.center)?;
                    writeln!(out, "      HWHM: {:.2}", p.hwhm)?;
                    writeln!(out, "      Asymmetry: {:.2}", p.asymmetry)?;
                    writeln!(out, "      Area: {:.2}", fit.area)?;
                }
            }
            writeln!(out)?;
        }
    }

    if !analysis.integrations().is_empty() {
        writeln!(out, "All Integrations:")?;
        for (k, region) in analysis.integrations().iter().enumerate() {
            writeln!(out, "  Integration A{}:", k + 1)?;
            writeln!(out, "    Start: {:.1}", distances[region.start])?;
            writeln!(out, "    End: {:.1}", distances[region.end])?;
            writeln!(out, "    Area: {:.1}", region.area)?;
            writeln!(out)?;
        }
    }

    if !analysis.fits().is_empty() {
        writeln!(out, "Fitted Peak Areas:")?;
        writeln!(out, "------------------")?;
        for (j, fit) in analysis.fits().iter().enumerate() {
            writeln!(out, "  Fit {} (x={:.1}): {:.2}", j + 1, fit.params.center, fit.area)?;
        }
    }

    Ok(())
}
