// src/status/weight.rs

//! Weight estimation for pipeline operations
//!
//! Weights are derived from real work (bytes moved) so that large downloads
//! and extractions dominate the aggregate progress. Every weight has a small
//! floor so an empty version still reports meaningful progress.

use crate::content::ContentSummary;

/// Lower bound for any operation weight
pub const MIN_WEIGHT: f64 = 0.0001;

/// Relative cost of unpacking one package byte versus downloading it
const UNARCHIVE_FACTOR: f64 = 0.5;

/// Relative cost of placing one content byte versus downloading it
const COPY_FILES_FACTOR: f64 = 0.2;

fn bytes_to_weight(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

fn floored(weight: f64) -> f64 {
    weight.max(MIN_WEIGHT)
}

pub fn validate_license_weight() -> f64 {
    MIN_WEIGHT
}

pub fn uninstall_weight() -> f64 {
    MIN_WEIGHT
}

/// Weight of downloading the content package
pub fn download_package_weight(summary: &ContentSummary) -> f64 {
    floored(bytes_to_weight(summary.size))
}

/// Weight of unarchiving the package, proportional to package byte size
pub fn unarchive_package_weight(summary: &ContentSummary) -> f64 {
    floored(bytes_to_weight(summary.size) * UNARCHIVE_FACTOR)
}

/// Weight of placing content files, proportional to total uncompressed size
pub fn copy_content_files_weight(summary: &ContentSummary) -> f64 {
    floored(bytes_to_weight(summary.uncompressed_size()) * COPY_FILES_FACTOR)
}
