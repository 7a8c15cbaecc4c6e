// src/analysis.rs - One profile together with the peaks, integrations and fits derived from it

use crate::errors::{ChromaError, Result};
use crate::filters::{self, FilterParams};
use crate::fitting::{self, PeakFit};
use crate::integration::{self, IntegrationParams, IntegrationRegion};
use crate::peaks::{self, Peak, PeakParams};
use crate::profile::Profile;

/// Analysis state for a single extracted line.
///
/// Peaks, integrations and fits always describe the current filtered trace:
/// re-filtering discards all of them.
#[derive(Debug, Clone)]
pub struct Analysis {
    profile: Profile,
    peaks: Vec<Peak>,
    integrations: Vec<IntegrationRegion>,
    fits: Vec<PeakFit>,
}

impl Analysis {
    pub fn new(profile: Profile) -> Self {
        Self {
            profile,
            peaks: Vec::new(),
            integrations: Vec::new(),
            fits: Vec::new(),
        }
    }

    /// Reassemble an analysis from stored results.
    ///
    /// Every peak, region and fit seed must index into the profile.
    pub fn from_parts(
        profile: Profile,
        peaks: Vec<Peak>,
        integrations: Vec<IntegrationRegion>,
        fits: Vec<PeakFit>,
    ) -> Result<Self> {
        let len = profile.len();
        if let Some(peak) = peaks.iter().find(|p| p.index >= len) {
            return Err(ChromaError::InvalidRange {
                start: peak.index,
                end: peak.index,
                len,
            });
        }
        if let Some(region) = integrations
            .iter()
            .find(|r| r.start >= r.end || r.end >= len)
        {
            return Err(ChromaError::InvalidRange {
                start: region.start,
                end: region.end,
                len,
            });
        }

        if let Some(index) = fits.iter().filter_map(|f| f.peak_index).find(|&i| i >= len) {
            return Err(ChromaError::InvalidRange {
                start: index,
                end: index,
                len,
            });
        }

        Ok(Self {
            profile,
            peaks,
            integrations,
            fits,
        })
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn peaks(&self) -> &[Peak] {
        &self.peaks
    }

    pub fn peak_indices(&self) -> Vec<usize> {
        self.peaks.iter().map(|p| p.index).collect()
    }

    pub fn integrations(&self) -> &[IntegrationRegion] {
        &self.integrations
    }

    pub fn fits(&self) -> &[PeakFit] {
        &self.fits
    }

    /// Re-run the filter chain from the raw trace.
    ///
    /// Success discards peaks, integrations and fits. On error nothing changes.
    pub fn apply_filters(&mut self, params: &FilterParams) -> Result<()> {
        filters::apply_filters(&mut self.profile, params)?;
        self.peaks.clear();
        self.integrations.clear();
        self.fits.clear();
        Ok(())
    }

    /// Replace the peak list with a fresh detection; returns the peak count
    pub fn detect_peaks(&mut self, params: &PeakParams) -> usize {
        self.peaks = peaks::characterize_peaks(
            self.profile.distances(),
            self.profile.filtered_intensities(),
            params,
        );
        log::info!("Detected {} peak(s)", self.peaks.len());
        self.peaks.len()
    }

    /// Integrate between two distances.
    ///
    /// A selection that snaps to a single sample is not stored and gives `None`.
    pub fn integrate_manual(&mut self, start_x: f64, end_x: f64) -> Result<Option<IntegrationRegion>> {
        let (start, end, area) = integration::manual_integrate(
            self.profile.distances(),
            self.profile.filtered_intensities(),
            start_x,
            end_x,
        )?;
        if start >= end {
            return Ok(None);
        }

        let region = IntegrationRegion { start, end, area };
        self.integrations.push(region);
        Ok(Some(region))
    }

    /// Integrate the index range `start..=end` and store it
    pub fn integrate_region(&mut self, start: usize, end: usize) -> Result<IntegrationRegion> {
        let region = IntegrationRegion::measure(
            self.profile.distances(),
            self.profile.filtered_intensities(),
            start,
            end,
        )?;
        self.integrations.push(region);
        Ok(region)
    }

    /// Add one automatically bounded region per detected peak.
    ///
    /// Returns the number of regions added; peaks whose bounds collapse to a
    /// single sample are skipped.
    pub fn auto_integrate_peaks(&mut self, params: &IntegrationParams) -> Result<usize> {
        let distances = self.profile.distances();
        let filtered = self.profile.filtered_intensities();

        let mut added = Vec::with_capacity(self.peaks.len());
        for peak in &self.peaks {
            let (start, end) = integration::auto_integrate(
                distances,
                filtered,
                peak.index,
                params.width_percent,
                params.sensitivity,
            )?;
            if start < end {
                added.push(IntegrationRegion::measure(distances, filtered, start, end)?);
            }
        }

        let count = added.len();
        self.integrations.extend(added);
        Ok(count)
    }

    /// Fit one peak and append the result
    pub fn fit_peak(&mut self, peak_idx: usize) -> Result<&PeakFit> {
        let fit = fitting::fit_peak(
            self.profile.distances(),
            self.profile.filtered_intensities(),
            peak_idx,
        )?;
        self.fits.push(fit);
        Ok(&self.fits[self.fits.len() - 1])
    }

    /// Replace the fits with one fit per detected peak; returns the success count
    pub fn fit_all_peaks(&mut self) -> usize {
        let indices = self.peak_indices();
        let (fits, success_count) = fitting::fit_all_peaks(
            self.profile.distances(),
            self.profile.filtered_intensities(),
            &indices,
        );
        log::info!("Fitted {} of {} peak(s)", success_count, indices.len());
        self.fits = fits;
        success_count
    }

    pub fn clear_peaks(&mut self) {
        self.peaks.clear();
    }

    pub fn clear_integrations(&mut self) {
        self.integrations.clear();
    }

    pub fn clear_fits(&mut self) {
        self.fits.clear();
    }
}
