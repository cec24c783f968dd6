//! Analysis engine
//!
//! Four independent analyzers read the decoded signal and each produce one
//! section of the report:
//!
//! ```text
//! Analyzer   | Reads          | Output
//! -----------|----------------|-------------------------------------------
//! loudness   | all channels   | integrated LUFS (BS.1770 gated)
//! spectral   | mono downmix   | spectral centroid, 85% roll-off
//! stereo     | L/R channels   | is_stereo, Pearson L/R correlation
//! tonal      | mono downmix   | dominant pitch class
//! ```
//!
//! The analyzers never see each other's results. With `parallel` enabled
//! (the default) they run on the rayon pool through nested `rayon::join`;
//! output is identical either way.

pub mod loudness;
pub mod spectral;
pub mod stereo;
pub mod tonal;

use crate::error::{AnalysisError, Result, Stage};
use crate::loader::Loader;
use crate::report::AnalysisReport;
use crate::signal::AudioSignal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use self::spectral::DEFAULT_ROLLOFF_PERCENT;
use self::tonal::{ChromaConfig, DEFAULT_CHROMA_MAX_HZ, DEFAULT_CHROMA_MIN_HZ, DEFAULT_TUNING_HZ};

pub const DEFAULT_WINDOW_SIZE: usize = 2048;
pub const DEFAULT_HOP_SIZE: usize = 512;

/// STFT framing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StftConfig {
    pub window_size: usize,
    pub hop_size: usize,
}

impl Default for StftConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            hop_size: DEFAULT_HOP_SIZE,
        }
    }
}

impl StftConfig {
    pub(crate) fn validate(&self, stage: Stage) -> std::result::Result<(), AnalysisError> {
        if self.window_size < 2 {
            return Err(AnalysisError::invalid(
                stage,
                format!("window size must be at least 2, got {}", self.window_size),
            ));
        }
        if self.hop_size == 0 {
            return Err(AnalysisError::invalid(stage, "hop size must be positive"));
        }
        Ok(())
    }
}

/// Round half away from zero to `decimals` places. Never returns -0.0.
pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    let rounded = (value * scale).round() / scale;
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// Tunable analysis parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub spectral_stft: StftConfig,
    pub rolloff_percent: f64,
    pub tonal_stft: StftConfig,
    pub tuning_hz: f64,
    pub chroma_min_hz: f64,
    pub chroma_max_hz: Option<f64>,
    pub parallel: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            spectral_stft: StftConfig::default(),
            rolloff_percent: DEFAULT_ROLLOFF_PERCENT,
            tonal_stft: StftConfig::default(),
            tuning_hz: DEFAULT_TUNING_HZ,
            chroma_min_hz: DEFAULT_CHROMA_MIN_HZ,
            chroma_max_hz: DEFAULT_CHROMA_MAX_HZ,
            parallel: true,
        }
    }
}

impl AnalyzerConfig {
    pub fn chroma(&self) -> ChromaConfig {
        ChromaConfig {
            tuning_hz: self.tuning_hz,
            min_hz: self.chroma_min_hz,
            max_hz: self.chroma_max_hz,
        }
    }
}

/// Main analyzer: decodes a file and runs every analysis stage on it.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    pub config: AnalyzerConfig,
    loader: Loader,
}

impl Analyzer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: AnalyzerConfig) -> Self {
        self.config = config;
        self
    }

    /// Same framing for the spectral and tonal passes.
    pub fn with_stft(mut self, window_size: usize, hop_size: usize) -> Self {
        let stft = StftConfig { window_size, hop_size };
        self.config.spectral_stft = stft;
        self.config.tonal_stft = stft;
        self
    }

    pub fn with_rolloff_percent(mut self, percent: f64) -> Self {
        self.config.rolloff_percent = percent;
        self
    }

    pub fn with_tuning(mut self, tuning_hz: f64) -> Self {
        self.config.tuning_hz = tuning_hz;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    /// Directory for the decoder's scratch WAV (system temp dir otherwise).
    pub fn with_scratch_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.loader = self.loader.with_scratch_dir(dir);
        self
    }

    /// Decode and analyze the audio file at `path`.
    pub fn analyze<P: AsRef<Path>>(&self, path: P) -> Result<AnalysisReport> {
        let path = path.as_ref();
        let signal = self.loader.load_path(path)?;

        log::info!(
            "{}: {} ch, {} Hz, {:.1}s",
            path.display(),
            signal.channel_count(),
            signal.sample_rate(),
            signal.duration_secs()
        );

        self.analyze_signal(&signal)
    }

    /// Decode and analyze an in-memory file. `extension` is a format hint.
    pub fn analyze_bytes(&self, data: &[u8], extension: Option<&str>) -> Result<AnalysisReport> {
        let signal = self.loader.load_bytes(data, extension)?;

        log::info!(
            "<{} bytes>: {} ch, {} Hz, {:.1}s",
            data.len(),
            signal.channel_count(),
            signal.sample_rate(),
            signal.duration_secs()
        );

        self.analyze_signal(&signal)
    }

    /// Run all four analyzers on an already decoded signal.
    pub fn analyze_signal(&self, signal: &AudioSignal) -> Result<AnalysisReport> {
        let config = &self.config;
        let chroma = config.chroma();
        let mono = signal.mono_view();

        let run_loudness = || loudness::analyze(signal);
        let run_stereo = || stereo::analyze(signal);
        let run_spectral = || spectral::analyze(&mono, &config.spectral_stft, config.rolloff_percent);
        let run_tonal = || tonal::analyze(&mono, &config.tonal_stft, &chroma);

        let ((dynamics, stereo), (spectral, tonality)) = if config.parallel {
            rayon::join(
                || rayon::join(run_loudness, run_stereo),
                || rayon::join(run_spectral, run_tonal),
            )
        } else {
            ((run_loudness(), run_stereo()), (run_spectral(), run_tonal()))
        };

        // First failure in fixed stage order wins, whatever finished first.
        let dynamics = dynamics?;
        let spectral = spectral?;
        let stereo = stereo?;
        let tonality = tonality?;

        Ok(AnalysisReport::assemble(dynamics, spectral, stereo, tonality))
    }
}
