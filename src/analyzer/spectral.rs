//! Spectral analysis: brightness and high-end roll-off
//!
//! Uses a short-time Fourier transform over the mono downmix to describe how
//! energy is distributed across the spectrum.
//!
//! # How the Metrics Work
//!
//! Every STFT frame yields a magnitude spectrum `|X(k)|` for bins
//! `k = 0..=N/2`, where bin `k` sits at `k * sample_rate / N` Hz.
//!
//! 1. **Spectral centroid** (brightness): the magnitude-weighted mean
//!    frequency of the frame.
//!
//!    ```text
//!    centroid = Σ f(k)·|X(k)| / Σ |X(k)|
//!    ```
//!
//!    Dark mixes (bass-heavy, dull top end) sit low; bright mixes with a lot
//!    of presence and air sit high.
//!
//! 2. **Spectral roll-off**: scanning from low to high, the first bin where
//!    the running sum of magnitudes reaches 85% of the frame total. A low
//!    roll-off means little content in the top octaves.
//!
//! Both are averaged over all frames. Frames with no energy at all (digital
//! silence) contribute 0 Hz to both averages.
//!
//! ## Framing
//!
//! ```text
//! Parameter   | Default | Notes
//! ------------|---------|----------------------------------------------
//! Window      | 2048    | Periodic Hann, ~46 ms at 44.1 kHz
//! Hop         | 512     | 75% overlap
//! Padding     | N/2     | Zeros on both ends, frames centered on t·hop
//! ```
//!
//! Centered framing means any non-empty signal produces at least one frame,
//! so very short clips still get a report.

use crate::error::{ensure_finite, AnalysisError, Stage};
use crate::signal::MonoView;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::{round_to, StftConfig};

pub const DEFAULT_ROLLOFF_PERCENT: f64 = 0.85;

/// Mean spectral centroid and roll-off.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpectralResult {
    pub brightness_centroid_hz: f64,
    pub high_end_rolloff_hz: f64,
}

/// Periodic Hann window (the DFT-even variant used for spectral analysis)
pub(crate) fn hann_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f64::consts::PI * i as f64 / size as f64).cos()))
        .collect()
}

/// Planned forward FFT plus window, reusable across frames.
pub(crate) struct Stft {
    fft: Arc<dyn Fft<f64>>,
    window: Vec<f64>,
    hop: usize,
}

impl Stft {
    pub fn new(config: &StftConfig) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(config.window_size);

        Self {
            fft,
            window: hann_window(config.window_size),
            hop: config.hop_size,
        }
    }

    /// Bins `0..=N/2`
    pub fn bin_count(&self) -> usize {
        self.window.len() / 2 + 1
    }

    pub fn bin_hz(&self, sample_rate: u32) -> f64 {
        sample_rate as f64 / self.window.len() as f64
    }

    /// Number of centered frames for a signal of `len` samples.
    pub fn frame_count(&self, len: usize) -> usize {
        if len == 0 {
            0
        } else {
            1 + len / self.hop
        }
    }

    /// Run `f` on the magnitude spectrum of every frame, in order.
    pub fn for_each_frame<F: FnMut(&[f64])>(&self, samples: &[f64], mut f: F) {
        let size = self.window.len();
        let pad = size / 2;
        let bins = self.bin_count();

        let mut buffer = vec![Complex::new(0.0, 0.0); size];
        let mut magnitudes = vec![0.0; bins];

        for frame in 0..self.frame_count(samples.len()) {
            // Frame covers padded[frame*hop .. frame*hop + size], i.e. it is
            // centered on sample frame*hop of the original signal.
            let center = frame * self.hop;

            for (i, slot) in buffer.iter_mut().enumerate() {
                let sample = (center + i)
                    .checked_sub(pad)
                    .and_then(|idx| samples.get(idx))
                    .copied()
                    .unwrap_or(0.0);
                *slot = Complex::new(sample * self.window[i], 0.0);
            }

            self.fft.process(&mut buffer);

            for (mag, c) in magnitudes.iter_mut().zip(buffer.iter()) {
                *mag = c.norm();
            }

            f(&magnitudes);
        }
    }
}

/// Magnitude-weighted mean frequency of one frame (0 for an empty frame).
fn frame_centroid(magnitudes: &[f64], bin_hz: f64) -> f64 {
    let total: f64 = magnitudes.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }

    let weighted: f64 = magnitudes
        .iter()
        .enumerate()
        .map(|(k, &m)| k as f64 * bin_hz * m)
        .sum();

    weighted / total
}

/// Lowest bin frequency where the cumulative magnitude reaches `percent` of the total.
fn frame_rolloff(magnitudes: &[f64], bin_hz: f64, percent: f64) -> f64 {
    let total: f64 = magnitudes.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }

    let threshold = percent * total;
    let mut cumulative = 0.0;

    for (k, &m) in magnitudes.iter().enumerate() {
        cumulative += m;
        if cumulative >= threshold {
            return k as f64 * bin_hz;
        }
    }

    // Rounding can leave the running sum a hair under the threshold.
    (magnitudes.len() - 1) as f64 * bin_hz
}

/// Mean centroid and roll-off over all frames of `mono`.
pub fn analyze(
    mono: &MonoView,
    stft: &StftConfig,
    rolloff_percent: f64,
) -> Result<SpectralResult, AnalysisError> {
    stft.validate(Stage::Spectral)?;
    if !(rolloff_percent > 0.0 && rolloff_percent <= 1.0) {
        return Err(AnalysisError::invalid(
            Stage::Spectral,
            format!("roll-off percent must be in (0, 1], got {}", rolloff_percent),
        ));
    }
    if mono.is_empty() {
        return Err(AnalysisError::empty(Stage::Spectral));
    }

    let stft = Stft::new(stft);
    let bin_hz = stft.bin_hz(mono.sample_rate());

    let mut centroid_sum = 0.0;
    let mut rolloff_sum = 0.0;
    let mut frames = 0usize;

    stft.for_each_frame(mono.samples(), |magnitudes| {
        centroid_sum += frame_centroid(magnitudes, bin_hz);
        rolloff_sum += frame_rolloff(magnitudes, bin_hz, rolloff_percent);
        frames += 1;
    });

    if frames == 0 {
        return Err(AnalysisError::empty(Stage::Spectral));
    }

    let centroid = ensure_finite(Stage::Spectral, "spectral centroid", centroid_sum / frames as f64)?;
    let rolloff = ensure_finite(Stage::Spectral, "spectral roll-off", rolloff_sum / frames as f64)?;

    log::debug!(
        "spectral: {} frames, centroid {:.1} Hz, roll-off {:.1} Hz",
        frames,
        centroid,
        rolloff
    );

    Ok(SpectralResult {
        brightness_centroid_hz: round_to(centroid, 2),
        high_end_rolloff_hz: round_to(rolloff, 2),
    })
}
