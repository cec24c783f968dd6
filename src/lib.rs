//! Sonal Aura - Audio analysis for mixes and masters
//!
//! Sonal Aura decodes an audio file and describes it in four short sections:
//! how loud it is, how bright it is, how wide it is, and what pitch class it
//! centers on.
//!
//! # Overview
//!
//! The pipeline is a straight line with a four-way fan-out in the middle:
//!
//! ```text
//! file ──▶ Loader ──▶ AudioSignal ─┬─▶ loudness ──┐
//!                                  ├─▶ spectral ──┤
//!                                  ├─▶ stereo ────┼─▶ AnalysisReport
//!                                  └─▶ tonal ─────┘
//! ```
//!
//! Every stage is deterministic: the same file always yields byte-identical
//! JSON.
//!
//! # Quick Start
//!
//! ```no_run
//! use sonal_aura::Analyzer;
//!
//! let analyzer = Analyzer::new();
//! let report = analyzer.analyze("master.flac")?;
//!
//! println!("Loudness: {} LUFS", report.dynamics.integrated_lufs);
//! println!("Brightness: {} Hz", report.spectral.brightness_centroid_hz);
//! println!("Correlation: {}", report.stereo.l_r_correlation);
//! println!("Key: {}", report.tonality.dominant_key);
//! # Ok::<(), sonal_aura::Error>(())
//! ```
//!
//! # Metrics
//!
//! | Section | Field | Meaning |
//! |---------|-------|---------|
//! | dynamics | integrated_lufs | BS.1770 gated loudness, -70.0 for silence |
//! | spectral | brightness_centroid_hz | Mean spectral centroid |
//! | spectral | high_end_rolloff_hz | Mean 85% spectral roll-off |
//! | stereo | is_stereo, l_r_correlation | Pearson L/R correlation, 1.0 for mono |
//! | tonality | dominant_key | Strongest of the 12 pitch classes |
//!
//! # Modules
//!
//! - [`loader`]: Decoding through symphonia into an [`AudioSignal`]
//! - [`analyzer`]: The four analyzers and the [`Analyzer`] that runs them
//! - [`report`]: Report types and batch output formatters (JSON, CSV)
//! - [`serve`]: Minimal HTTP front end

pub mod analyzer;
pub mod error;
pub mod loader;
pub mod report;
pub mod serve;
pub mod signal;

pub use analyzer::tonal::PitchClass;
pub use analyzer::{Analyzer, AnalyzerConfig, StftConfig};
pub use error::{AnalysisCause, AnalysisError, DecodeError, Error, ResourceError, Result, Stage};
pub use loader::Loader;
pub use report::{AnalysisReport, FileReport, Summary};
pub use signal::{AudioSignal, MonoView};
