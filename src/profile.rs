// src/profile.rs - Distance/intensity trace sampled along a path

use crate::errors::{ChromaError, Result};

/// A one-dimensional intensity trace.
///
/// The three arrays always have the same length and `distances` is strictly
/// increasing. Only the filter pipeline replaces the filtered array.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    distances: Vec<f64>,
    raw_intensities: Vec<f64>,
    filtered_intensities: Vec<f64>,
}

impl Profile {
    /// Create a profile whose filtered trace starts as a copy of the raw one
    pub fn new(distances: Vec<f64>, raw_intensities: Vec<f64>) -> Result<Self> {
        let filtered_intensities = raw_intensities.clone();
        Self::with_filtered(distances, raw_intensities, filtered_intensities)
    }

    /// Create a profile with an existing filtered trace (used when importing)
    pub fn with_filtered(
        distances: Vec<f64>,
        raw_intensities: Vec<f64>,
        filtered_intensities: Vec<f64>,
    ) -> Result<Self> {
        if distances.len() != raw_intensities.len() || distances.len() != filtered_intensities.len() {
            return Err(ChromaError::InvalidProfile(format!(
                "profile arrays differ in length: {} distances, {} raw, {} filtered",
                distances.len(),
                raw_intensities.len(),
                filtered_intensities.len()
            )));
        }

        if let Some(i) = distances.windows(2).position(|w| !(w[1] > w[0])) {
            return Err(ChromaError::InvalidProfile(format!(
                "distances must be strictly increasing (index {} -> {})",
                i,
                i + 1
            )));
        }

        Ok(Self {
            distances,
            raw_intensities,
            filtered_intensities,
        })
    }

    pub fn len(&self) -> usize {
        self.distances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distances.is_empty()
    }

    pub fn distances(&self) -> &[f64] {
        &self.distances
    }

    pub fn raw_intensities(&self) -> &[f64] {
        &self.raw_intensities
    }

    pub fn filtered_intensities(&self) -> &[f64] {
        &self.filtered_intensities
    }

    pub(crate) fn replace_filtered(&mut self, filtered: Vec<f64>) {
        debug_assert_eq!(filtered.len(), self.distances.len());
        self.filtered_intensities = filtered;
    }
}
