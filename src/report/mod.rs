//! Analysis reports
//!
//! [`AnalysisReport`] is the per-file result: four sections in a fixed
//! order, serialized as
//!
//! ```text
//! {
//!   "dynamics":  { "integrated_lufs": -14.2 },
//!   "spectral":  { "brightness_centroid_hz": 1834.5, "high_end_rolloff_hz": 4120.0 },
//!   "stereo":    { "is_stereo": true, "l_r_correlation": 0.873 },
//!   "tonality":  { "dominant_key": "A" }
//! }
//! ```
//!
//! Batch runs wrap each file in a [`FileReport`] and write the collection
//! with [`generate`]:
//!
//! - **JSON**: machine-readable, full reports plus a summary
//! - **CSV**: one row per file, for spreadsheets
//!
//! ```ignore
//! use sonal_aura::report;
//!
//! // Format is picked from the extension
//! report::generate("report.json", &files)?;
//! report::generate("report.csv", &files)?;
//! ```

pub mod csv;
pub mod json;

use crate::analyzer::loudness::LoudnessResult;
use crate::analyzer::spectral::SpectralResult;
use crate::analyzer::stereo::StereoResult;
use crate::analyzer::tonal::TonalResult;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

/// Full analysis of one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub dynamics: LoudnessResult,
    pub spectral: SpectralResult,
    pub stereo: StereoResult,
    pub tonality: TonalResult,
}

impl AnalysisReport {
    /// Merge the four analyzer outputs. Nothing is recomputed or dropped.
    pub fn assemble(
        dynamics: LoudnessResult,
        spectral: SpectralResult,
        stereo: StereoResult,
        tonality: TonalResult,
    ) -> Self {
        Self {
            dynamics,
            spectral,
            stereo,
            tonality,
        }
    }
}

/// One entry in a batch: the report, or why there isn't one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub file_path: String,
    pub file_name: String,
    pub report: Option<AnalysisReport>,
    pub error: Option<String>,
}

impl FileReport {
    pub fn new<P: AsRef<Path>>(path: P, outcome: crate::Result<AnalysisReport>) -> Self {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let (report, error) = match outcome {
            Ok(report) => (Some(report), None),
            Err(e) => (None, Some(e.to_string())),
        };

        Self {
            file_path: path.display().to_string(),
            file_name,
            report,
            error,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.report.is_some()
    }
}

/// Counts for a batch of files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub analyzed: usize,
    pub failed: usize,
}

impl Summary {
    pub fn from_results(results: &[FileReport]) -> Self {
        let analyzed = results.iter().filter(|r| r.is_ok()).count();

        Self {
            total: results.len(),
            analyzed,
            failed: results.len() - analyzed,
        }
    }
}

/// Generate a report in the appropriate format based on file extension
pub fn generate<P: AsRef<Path>>(path: P, results: &[FileReport]) -> io::Result<()> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let mut file = std::fs::File::create(path)?;

    match ext.as_str() {
        "csv" => csv::write(&mut file, results),
        _ => json::write(&mut file, results),
    }
}
