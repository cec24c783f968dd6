//! Integrated loudness per ITU-R BS.1770
//!
//! # Measurement Chain
//!
//! ```text
//! channel ──▶ high shelf ──▶ high-pass ──▶ 400 ms blocks (100 ms hop) ──▶ z[ch][block]
//!             (~+4 dB)       (~38 Hz)       mean square per block
//!
//! per block:  L = -0.691 + 10·log10( Σ G_ch · z[ch][block] )      G = 1.0 for L, R, mono
//! ```
//!
//! The two filter stages together are the "K-weighting" curve: a rough
//! model of the ear that discounts deep bass and gives the presence region
//! a small lift.
//!
//! ## Gating
//!
//! 1. Absolute gate: blocks quieter than -70 LUFS are never counted.
//! 2. Relative gate: the mean of the remaining blocks sets a threshold 10 LU
//!    below it; blocks under that threshold are dropped too.
//! 3. Integrated loudness is the mean (in the power domain) of what is left.
//!
//! Gating keeps long quiet intros, fades and breakdowns from dragging the
//! figure down.
//!
//! ## Edge Cases
//!
//! - Signals shorter than one block are measured as a single block.
//! - When no block survives gating (digital silence, or nothing above
//!   -70 LUFS) the meter reports [`SILENCE_LUFS`].

use crate::error::{ensure_finite, AnalysisCause, AnalysisError, Stage};
use crate::signal::AudioSignal;
use serde::{Deserialize, Serialize};

use super::round_to;

/// Reported when nothing survives the absolute gate.
pub const SILENCE_LUFS: f64 = -70.0;

const ABSOLUTE_GATE_LUFS: f64 = -70.0;
const RELATIVE_GATE_LU: f64 = -10.0;
const LUFS_OFFSET: f64 = -0.691;
const BLOCK_SECS: f64 = 0.4;
const BLOCK_OVERLAP: f64 = 0.75;

/// Front channels (and mono) are weighted equally.
const CHANNEL_WEIGHT: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoudnessResult {
    pub integrated_lufs: f64,
}

/// Second-order IIR section, transposed direct form II.
#[derive(Debug, Clone)]
struct Biquad {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
    z1: f64,
    z2: f64,
}

impl Biquad {
    /// Coefficients normalized so that a0 == 1.
    fn new(b0: f64, b1: f64, b2: f64, a1: f64, a2: f64) -> Self {
        Self {
            b0,
            b1,
            b2,
            a1,
            a2,
            z1: 0.0,
            z2: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, x: f64) -> f64 {
        let y = self.b0 * x + self.z1;
        self.z1 = self.b1 * x - self.a1 * y + self.z2;
        self.z2 = self.b2 * x - self.a2 * y;
        y
    }
}

/// K-weighting pre-filter for one channel: high shelf, then high-pass.
#[derive(Debug, Clone)]
struct KWeighting {
    shelf: Biquad,
    highpass: Biquad,
}

impl KWeighting {
    /// Bilinear-transform design of the BS.1770 prototype for any sample rate.
    /// At 48 kHz this reproduces the reference coefficients of the standard.
    fn new(sample_rate: f64) -> Self {
        use std::f64::consts::PI;

        // Stage 1: high shelf
        let f0 = 1681.974450955533;
        let gain_db = 3.999843853973347;
        let q = 0.7071752369554196;

        let k = (PI * f0 / sample_rate).tan();
        let vh = 10f64.powf(gain_db / 20.0);
        let vb = vh.powf(0.4996667741545416);
        let a0 = 1.0 + k / q + k * k;

        let shelf = Biquad::new(
            (vh + vb * k / q + k * k) / a0,
            2.0 * (k * k - vh) / a0,
            (vh - vb * k / q + k * k) / a0,
            2.0 * (k * k - 1.0) / a0,
            (1.0 - k / q + k * k) / a0,
        );

        // Stage 2: high-pass
        let f0 = 38.13547087602444;
        let q = 0.5003270373238773;

        let k = (PI * f0 / sample_rate).tan();
        let a0 = 1.0 + k / q + k * k;

        let highpass = Biquad::new(
            1.0,
            -2.0,
            1.0,
            2.0 * (k * k - 1.0) / a0,
            (1.0 - k / q + k * k) / a0,
        );

        Self { shelf, highpass }
    }

    #[inline]
    fn process(&mut self, x: f64) -> f64 {
        self.highpass.process(self.shelf.process(x))
    }
}

fn power_to_lufs(power: f64) -> f64 {
    LUFS_OFFSET + 10.0 * power.log10()
}

fn lufs_to_power(lufs: f64) -> f64 {
    10f64.powf((lufs - LUFS_OFFSET) / 10.0)
}

/// Block length and hop in samples. Never zero.
fn block_geometry(sample_rate: u32) -> (usize, usize) {
    let block = ((BLOCK_SECS * sample_rate as f64).round() as usize).max(1);
    let hop = ((block as f64 * (1.0 - BLOCK_OVERLAP)).round() as usize).max(1);
    (block, hop)
}

/// Mean square of each gating block of an already K-weighted channel.
fn block_mean_squares(filtered: &[f64], block: usize, hop: usize) -> Vec<f64> {
    if filtered.is_empty() {
        return Vec::new();
    }

    if filtered.len() < block {
        let sum: f64 = filtered.iter().map(|x| x * x).sum();
        return vec![sum / filtered.len() as f64];
    }

    let count = (filtered.len() - block) / hop + 1;
    (0..count)
        .map(|j| {
            let start = j * hop;
            let sum: f64 = filtered[start..start + block].iter().map(|x| x * x).sum();
            sum / block as f64
        })
        .collect()
}

/// Gated mean over per-block weighted powers. `None` when nothing survives.
fn gated_loudness(block_powers: &[f64]) -> Option<f64> {
    let absolute = lufs_to_power(ABSOLUTE_GATE_LUFS);

    let candidates: Vec<f64> = block_powers
        .iter()
        .copied()
        .filter(|&p| p >= absolute)
        .collect();

    if candidates.is_empty() {
        return None;
    }

    let candidate_mean = candidates.iter().sum::<f64>() / candidates.len() as f64;
    let relative = lufs_to_power(power_to_lufs(candidate_mean) + RELATIVE_GATE_LU);

    let gated: Vec<f64> = candidates.into_iter().filter(|&p| p > relative).collect();
    if gated.is_empty() {
        return None;
    }

    let gated_mean = gated.iter().sum::<f64>() / gated.len() as f64;
    Some(power_to_lufs(gated_mean))
}

/// Integrated loudness of the whole signal, in LUFS.
pub fn analyze(signal: &AudioSignal) -> Result<LoudnessResult, AnalysisError> {
    let frames = signal.frames();
    if frames == 0 {
        return Err(AnalysisError::empty(Stage::Loudness));
    }

    let (block, hop) = block_geometry(signal.sample_rate());

    // Weighted sum over channels of each block's mean square
    let mut block_powers: Vec<f64> = Vec::new();

    for channel in signal.channels() {
        let mut filter = KWeighting::new(signal.sample_rate() as f64);
        let filtered: Vec<f64> = channel[..frames].iter().map(|&x| filter.process(x)).collect();
        let z = block_mean_squares(&filtered, block, hop);

        if block_powers.is_empty() {
            block_powers = vec![0.0; z.len()];
        }
        for (acc, zi) in block_powers.iter_mut().zip(z) {
            *acc += CHANNEL_WEIGHT * zi;
        }
    }

    if let Some(bad) = block_powers.iter().find(|p| !p.is_finite()) {
        return Err(AnalysisError::new(
            Stage::Loudness,
            AnalysisCause::NonFinite {
                quantity: "block power",
                value: *bad,
            },
        ));
    }

    let integrated = match gated_loudness(&block_powers) {
        Some(lufs) => ensure_finite(Stage::Loudness, "integrated loudness", lufs)?,
        None => {
            log::debug!(
                "loudness: no block above {} LUFS, reporting silence floor",
                ABSOLUTE_GATE_LUFS
            );
            SILENCE_LUFS
        }
    };

    log::debug!(
        "loudness: {} blocks, {:.2} LUFS",
        block_powers.len(),
        integrated
    );

    Ok(LoudnessResult {
        integrated_lufs: round_to(integrated, 2),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // EDUCATIONAL BACKGROUND: Reading LUFS
    // ==========================================================================
    //
    // LUFS are decibels of K-weighted mean-square power, offset so that a
    // 1 kHz full-scale sine in one channel reads about -3.01 LUFS (the
    // K-weighting gain at 1 kHz cancels the -0.691 offset).
    //
    // Typical targets:
    //   -14 LUFS  streaming platforms
    //   -23 LUFS  EBU R128 broadcast
    //    -9 LUFS  and louder: aggressively limited masters
    // ==========================================================================

    fn sine(freq: f64, sample_rate: u32, secs: f64, amplitude: f64) -> Vec<f64> {
        let n = (sample_rate as f64 * secs) as usize;
        (0..n)
            .map(|i| amplitude * (2.0 * std::f64::consts::PI * freq * i as f64 / sample_rate as f64).sin())
            .collect()
    }

    // ==========================================================================
    // FILTER TESTS
    // ==========================================================================

    #[test]
    fn test_k_weighting_matches_reference_at_48k() {
        // Coefficients published in ITU-R BS.1770-4 for 48 kHz
        let k = KWeighting::new(48000.0);

        assert!((k.shelf.b0 - 1.53512485958697).abs() < 1e-6);
        assert!((k.shelf.b1 - -2.69169618940638).abs() < 1e-6);
        assert!((k.shelf.b2 - 1.19839281085285).abs() < 1e-6);
        assert!((k.shelf.a1 - -1.69065929318241).abs() < 1e-6);
        assert!((k.shelf.a2 - 0.73248077421585).abs() < 1e-6);

        assert!((k.highpass.a1 - -1.99004745483398).abs() < 1e-6);
        assert!((k.highpass.a2 - 0.99007225036621).abs() < 1e-6);
    }

    #[test]
    fn test_k_weighting_attenuates_deep_bass() {
        let rate = 48000;
        let input = sine(20.0, rate, 2.0, 1.0);
        let mut filter = KWeighting::new(rate as f64);
        let output: Vec<f64> = input.iter().map(|&x| filter.process(x)).collect();

        // Compare RMS over the settled second half
        let half = input.len() / 2;
        let rms_in = (input[half..].iter().map(|x| x * x).sum::<f64>() / half as f64).sqrt();
        let rms_out = (output[half..].iter().map(|x| x * x).sum::<f64>() / half as f64).sqrt();
        assert!(rms_out < rms_in * 0.7, "20 Hz should be attenuated: {} vs {}", rms_out, rms_in);
    }

    // ==========================================================================
    // BLOCKING AND GATING TESTS
    // ==========================================================================

    #[test]
    fn test_block_geometry() {
        assert_eq!(block_geometry(48000), (19200, 4800));
        assert_eq!(block_geometry(44100), (17640, 4410));
    }

    #[test]
    fn test_block_count_with_overlap() {
        // 1 s at 48 kHz: blocks start every 100 ms while a full 400 ms fits
        let z = block_mean_squares(&vec![0.5; 48000], 19200, 4800);
        assert_eq!(z.len(), 7);
        assert!(z.iter().all(|&v| (v - 0.25).abs() < 1e-12));
    }

    #[test]
    fn test_short_signal_is_one_block() {
        let z = block_mean_squares(&[1.0, -1.0, 1.0], 19200, 4800);
        assert_eq!(z, vec![1.0]);
    }

    #[test]
    fn test_lufs_power_roundtrip_offset() {
        assert!((power_to_lufs(1.0) - LUFS_OFFSET).abs() < 1e-12);
        assert!((lufs_to_power(power_to_lufs(0.3)) - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_gating_drops_blocks_below_absolute_gate() {
        let quiet = lufs_to_power(-80.0);
        assert_eq!(gated_loudness(&[quiet, quiet, 0.0]), None);
    }

    #[test]
    fn test_block_exactly_at_absolute_gate_is_kept() {
        let at_gate = lufs_to_power(ABSOLUTE_GATE_LUFS);
        let lufs = gated_loudness(&[at_gate]).unwrap();
        assert!((lufs - ABSOLUTE_GATE_LUFS).abs() < 1e-9, "got {}", lufs);

        let below = lufs_to_power(ABSOLUTE_GATE_LUFS - 1e-6);
        assert_eq!(gated_loudness(&[below]), None);
    }

    #[test]
    fn test_relative_gate_ignores_quiet_blocks() {
        let loud = lufs_to_power(-10.0);
        let quiet = lufs_to_power(-40.0);
        let lufs = gated_loudness(&[loud, loud, quiet, quiet, quiet]).unwrap();
        assert!((lufs - -10.0).abs() < 1e-9, "got {}", lufs);
    }

    // ==========================================================================
    // INTEGRATED LOUDNESS TESTS
    // ==========================================================================

    #[test]
    fn test_full_scale_sine_mono() {
        let signal = AudioSignal::mono(48000, sine(1000.0, 48000, 5.0, 1.0)).unwrap();
        let result = analyze(&signal).unwrap();
        assert!(
            (result.integrated_lufs - -3.01).abs() < 0.1,
            "1 kHz full-scale mono sine should read ~-3.01 LUFS, got {}",
            result.integrated_lufs
        );
    }

    #[test]
    fn test_identical_stereo_sums_channels() {
        let s = sine(1000.0, 48000, 5.0, 1.0);
        let signal = AudioSignal::stereo(48000, s.clone(), s).unwrap();
        let result = analyze(&signal).unwrap();
        assert!(
            result.integrated_lufs.abs() < 0.1,
            "identical full-scale stereo sine should read ~0 LUFS, got {}",
            result.integrated_lufs
        );
    }

    #[test]
    fn test_halving_amplitude_drops_six_lu() {
        let loud = AudioSignal::mono(44100, sine(1000.0, 44100, 3.0, 0.5)).unwrap();
        let quiet = AudioSignal::mono(44100, sine(1000.0, 44100, 3.0, 0.25)).unwrap();
        let diff = analyze(&loud).unwrap().integrated_lufs - analyze(&quiet).unwrap().integrated_lufs;
        assert!((diff - 6.02).abs() < 0.05, "expected ~6.02 LU, got {}", diff);
    }

    #[test]
    fn test_quiet_tail_is_gated_out() {
        let mut samples = sine(1000.0, 48000, 3.0, 1.0);
        samples.extend(sine(1000.0, 48000, 3.0, 0.01));
        let signal = AudioSignal::mono(48000, samples).unwrap();
        let result = analyze(&signal).unwrap();

        // Without the relative gate the quiet half would pull this near -6 LUFS
        assert!(
            result.integrated_lufs > -4.0 && result.integrated_lufs < -2.5,
            "quiet tail should be gated out, got {}",
            result.integrated_lufs
        );
    }

    #[test]
    fn test_silence_reports_floor() {
        let signal = AudioSignal::stereo(44100, vec![0.0; 44100], vec![0.0; 44100]).unwrap();
        assert_eq!(analyze(&signal).unwrap().integrated_lufs, SILENCE_LUFS);

        let mono = AudioSignal::mono(44100, vec![0.0; 100]).unwrap();
        assert_eq!(analyze(&mono).unwrap().integrated_lufs, SILENCE_LUFS);
    }

    #[test]
    fn test_very_short_signal() {
        let signal = AudioSignal::mono(44100, sine(1000.0, 44100, 0.05, 0.5)).unwrap();
        let result = analyze(&signal).unwrap();
        assert!(result.integrated_lufs.is_finite());
        assert!(result.integrated_lufs > SILENCE_LUFS);
    }

    #[test]
    fn test_nan_samples_are_error() {
        let mut samples = sine(1000.0, 8000, 1.0, 0.5);
        samples[10] = f64::NAN;
        let signal = AudioSignal::mono(8000, samples).unwrap();
        let err = analyze(&signal).unwrap_err();
        assert_eq!(err.stage, Stage::Loudness);
    }

    #[test]
    fn test_empty_signal_is_error() {
        let signal = AudioSignal::mono(8000, vec![]).unwrap();
        assert_eq!(analyze(&signal).unwrap_err(), AnalysisError::empty(Stage::Loudness));
    }
}
