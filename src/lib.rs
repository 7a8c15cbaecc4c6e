// src/lib.rs - Library interface for chromaband

pub mod analysis;
pub mod area;
pub mod config;
pub mod errors;
pub mod extraction;
pub mod filters;
pub mod fitting;
pub mod image_io;
pub mod image_utils;
pub mod integration;
pub mod output;
pub mod path_algorithms;
pub mod peaks;
pub mod pipeline;
pub mod profile;
pub mod report;

// Re-export commonly used types and functions
pub use analysis::Analysis;
pub use config::{Config, LaneConfig};
pub use errors::{ChromaError, Result};
pub use image_io::{load_raster, InputRaster};
pub use image_utils::Raster;
pub use path_algorithms::Point;
pub use pipeline::{analyze_path, analyze_raster, process_image, LaneAnalysis};
pub use profile::Profile;

// Core numeric operations
pub use area::trapezoid;
pub use extraction::extract_profile;
pub use filters::{apply_filters, FilterParams};
pub use fitting::{fit_all_peaks, fit_peak, mecozzi, MecozziParams, PeakFit};
pub use integration::{auto_integrate, manual_integrate, IntegrationParams, IntegrationRegion};
pub use peaks::{detect_peaks, Peak, PeakParams};

// Export and reporting
pub use output::{
    load_analysis_csv, read_analysis_csv, save_analysis_csv, save_comparison_csv, write_analysis_csv,
    write_comparison_csv,
};
pub use report::format_report;
