//! Tonal center: dominant pitch class
//!
//! Every STFT bin is folded onto one of the 12 equal-tempered pitch classes
//! ("chroma"), ignoring the octave:
//!
//! ```text
//! semitones from A = round(12 · log2(f / 440))
//! class            = (semitones + 9) mod 12        C=0, C#=1, ... A=9, ... B=11
//! ```
//!
//! Each frame's chroma (bin energy |X|² summed per class) is scaled so its
//! strongest class is 1.0, then frames are summed into a 12-bin histogram.
//! The report carries the class with the most accumulated energy.
//!
//! This is a pitch-class estimate, not a key detector: there is no
//! major/minor decision and no tonic/dominant reasoning.

use crate::error::{ensure_finite, AnalysisError, Stage};
use crate::signal::MonoView;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::spectral::Stft;
use super::StftConfig;

pub const DEFAULT_TUNING_HZ: f64 = 440.0;
pub const DEFAULT_CHROMA_MIN_HZ: f64 = 27.5;
/// No upper cutoff by default: every bin up to Nyquist is folded in.
pub const DEFAULT_CHROMA_MAX_HZ: Option<f64> = None;

/// Semitones from C up to the tuning reference A.
const A_OFFSET: i64 = 9;

/// The 12 pitch classes, in histogram order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PitchClass {
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C#")]
    CSharp,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "D#")]
    DSharp,
    #[serde(rename = "E")]
    E,
    #[serde(rename = "F")]
    F,
    #[serde(rename = "F#")]
    FSharp,
    #[serde(rename = "G")]
    G,
    #[serde(rename = "G#")]
    GSharp,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A#")]
    ASharp,
    #[serde(rename = "B")]
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Index into [`PitchClass::ALL`], wrapping past 11.
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % 12]
    }

    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn label(&self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TonalResult {
    pub dominant_key: PitchClass,
}

/// Frequency range and tuning used to fold bins into chroma.
///
/// `max_hz: None` means the Nyquist frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChromaConfig {
    pub tuning_hz: f64,
    pub min_hz: f64,
    pub max_hz: Option<f64>,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        Self {
            tuning_hz: DEFAULT_TUNING_HZ,
            min_hz: DEFAULT_CHROMA_MIN_HZ,
            max_hz: DEFAULT_CHROMA_MAX_HZ,
        }
    }
}

impl ChromaConfig {
    fn validate(&self) -> Result<(), AnalysisError> {
        if !(self.tuning_hz.is_finite() && self.tuning_hz > 0.0) {
            return Err(AnalysisError::invalid(
                Stage::Tonal,
                format!("tuning must be a positive frequency, got {}", self.tuning_hz),
            ));
        }
        if !(self.min_hz.is_finite() && self.min_hz > 0.0) {
            return Err(AnalysisError::invalid(
                Stage::Tonal,
                format!("chroma lower bound must be a positive frequency, got {}", self.min_hz),
            ));
        }
        if let Some(max_hz) = self.max_hz {
            if !(max_hz.is_finite() && self.min_hz < max_hz) {
                return Err(AnalysisError::invalid(
                    Stage::Tonal,
                    format!("chroma range must satisfy 0 < min < max, got {}..{}", self.min_hz, max_hz),
                ));
            }
        }
        Ok(())
    }
}

/// Pitch class of `freq_hz` relative to `tuning_hz` (the frequency of A).
pub fn pitch_class_of(freq_hz: f64, tuning_hz: f64) -> PitchClass {
    let semitones = (12.0 * (freq_hz / tuning_hz).log2()).round() as i64;
    PitchClass::from_index((semitones + A_OFFSET).rem_euclid(12) as usize)
}

/// Class with the most energy. Ties go to the earliest class in C..B order.
pub fn dominant_pitch_class(histogram: &[f64; 12]) -> PitchClass {
    let mut best = 0;
    for (i, &energy) in histogram.iter().enumerate().skip(1) {
        if energy > histogram[best] {
            best = i;
        }
    }
    PitchClass::from_index(best)
}

/// Per-bin pitch class, `None` for bins outside the chroma range.
fn bin_classes(bins: usize, bin_hz: f64, chroma: &ChromaConfig) -> Vec<Option<usize>> {
    let max_hz = chroma.max_hz.unwrap_or(f64::INFINITY);

    (0..bins)
        .map(|k| {
            let freq = k as f64 * bin_hz;
            if freq >= chroma.min_hz && freq <= max_hz {
                Some(pitch_class_of(freq, chroma.tuning_hz).index())
            } else {
                None
            }
        })
        .collect()
}

/// Accumulated chroma histogram over all frames of `mono`.
pub fn chroma_histogram(
    mono: &MonoView,
    stft: &StftConfig,
    chroma: &ChromaConfig,
) -> Result<[f64; 12], AnalysisError> {
    stft.validate(Stage::Tonal)?;
    chroma.validate()?;
    if mono.is_empty() {
        return Err(AnalysisError::empty(Stage::Tonal));
    }

    let stft = Stft::new(stft);
    let classes = bin_classes(stft.bin_count(), stft.bin_hz(mono.sample_rate()), chroma);

    let mut histogram = [0.0f64; 12];

    stft.for_each_frame(mono.samples(), |magnitudes| {
        let mut frame = [0.0f64; 12];
        for (class, &m) in classes.iter().zip(magnitudes.iter()) {
            if let Some(c) = class {
                frame[*c] += m * m;
            }
        }

        let peak = frame.iter().cloned().fold(0.0, f64::max);
        if peak > 0.0 {
            for (h, v) in histogram.iter_mut().zip(frame.iter()) {
                *h += v / peak;
            }
        } else if frame.iter().any(|v| v.is_nan()) {
            histogram[0] = f64::NAN;
        }
    });

    for &energy in &histogram {
        ensure_finite(Stage::Tonal, "chroma energy", energy)?;
    }

    Ok(histogram)
}

/// Dominant pitch class of `mono`.
pub fn analyze(
    mono: &MonoView,
    stft: &StftConfig,
    chroma: &ChromaConfig,
) -> Result<TonalResult, AnalysisError> {
    let histogram = chroma_histogram(mono, stft, chroma)?;
    let dominant_key = dominant_pitch_class(&histogram);

    log::debug!("tonal: histogram {:?}, dominant {}", histogram, dominant_key);

    Ok(TonalResult { dominant_key })
}
