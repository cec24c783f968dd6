//! Stereo image: left/right correlation
//!
//! Pearson correlation coefficient between the two channels, -1.0 to 1.0:
//!
//! - 1.0: identical channels (dual mono)
//! - 0.0: uncorrelated (completely independent)
//! - -1.0: inverted phase (one channel is the negative of the other)
//!
//! Normal stereo music usually lands around 0.5-0.9. Values near zero or
//! below point at phase problems that will cancel when summed to mono.
//!
//! # Degenerate Channels
//!
//! Correlation is undefined when a channel has no variance (digital silence,
//! a constant DC offset). Instead of propagating NaN:
//!
//! - both channels flat: 1.0, there is no difference between them to measure
//! - one channel flat: 0.0, nothing in it follows the other channel
//!
//! Mono sources always report `is_stereo = false` and a fixed 1.0.

use crate::error::{ensure_finite, AnalysisError, Stage};
use crate::signal::AudioSignal;
use serde::{Deserialize, Serialize};

use super::round_to;

/// Correlation reported for mono sources.
pub const MONO_CORRELATION: f64 = 1.0;

/// Per-sample variance at or below this counts as a flat channel.
const FLAT_VARIANCE: f64 = 1e-20;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StereoResult {
    pub is_stereo: bool,
    pub l_r_correlation: f64,
}

/// Pearson correlation of two equal-length signals, with the flat-channel
/// fallbacks described in the module docs.
fn pearson_correlation(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len().min(y.len());
    let (x, y) = (&x[..n], &y[..n]);
    let count = n as f64;

    let mean_x = x.iter().sum::<f64>() / count;
    let mean_y = y.iter().sum::<f64>() / count;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;

    for (&a, &b) in x.iter().zip(y.iter()) {
        let dx = a - mean_x;
        let dy = b - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let flat_x = var_x / count <= FLAT_VARIANCE;
    let flat_y = var_y / count <= FLAT_VARIANCE;

    match (flat_x, flat_y) {
        (true, true) => 1.0,
        (true, false) | (false, true) => 0.0,
        (false, false) => (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0),
    }
}

/// Stereo correlation of `signal`, or the mono sentinel.
pub fn analyze(signal: &AudioSignal) -> Result<StereoResult, AnalysisError> {
    if signal.is_empty() {
        return Err(AnalysisError::empty(Stage::Stereo));
    }

    let (left, right) = match signal.channels() {
        [left, right] => (left, right),
        _ => {
            return Ok(StereoResult {
                is_stereo: false,
                l_r_correlation: MONO_CORRELATION,
            })
        }
    };

    let corr = ensure_finite(
        Stage::Stereo,
        "left/right correlation",
        pearson_correlation(left, right),
    )?;

    log::debug!("stereo: correlation {:.4}", corr);

    Ok(StereoResult {
        is_stereo: true,
        l_r_correlation: round_to(corr, 3),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // PEARSON CORRELATION TESTS
    // ==========================================================================

    #[test]
    fn test_pearson_correlation_identical() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = vec![1.0, 2.0, 3.0, 4.0, 5.0];

        let corr = pearson_correlation(&x, &y);
        assert!(
            (corr - 1.0).abs() < 1e-9,
            "Identical signals should have correlation 1.0, got {}",
            corr
        );
    }

    #[test]
    fn test_pearson_correlation_inverted() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = vec![-1.0, -2.0, -3.0, -4.0, -5.0];

        let corr = pearson_correlation(&x, &y);
        assert!(
            (corr - (-1.0)).abs() < 1e-9,
            "Inverted signals should have correlation -1.0, got {}",
            corr
        );
    }

    #[test]
    fn test_pearson_correlation_uncorrelated() {
        let x = vec![1.0, -1.0, 1.0, -1.0];
        let y = vec![1.0, 1.0, -1.0, -1.0];

        let corr = pearson_correlation(&x, &y);
        assert!(
            corr.abs() < 0.01,
            "Uncorrelated signals should have correlation near 0, got {}",
            corr
        );
    }

    #[test]
    fn test_pearson_correlation_scaled() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let y = vec![2.0, 4.0, 6.0, 8.0, 10.0];

        let corr = pearson_correlation(&x, &y);
        assert!((corr - 1.0).abs() < 1e-9, "got {}", corr);
    }

    #[test]
    fn test_pearson_correlation_truncates_to_shorter() {
        let x = vec![1.0, 2.0, 3.0, 100.0, -50.0];
        let y = vec![1.0, 2.0, 3.0];

        let corr = pearson_correlation(&x, &y);
        assert!((corr - 1.0).abs() < 1e-9, "got {}", corr);
    }

    // ==========================================================================
    // FLAT CHANNEL TESTS
    // ==========================================================================

    #[test]
    fn test_both_channels_silent() {
        assert_eq!(pearson_correlation(&[0.0; 64], &[0.0; 64]), 1.0);
    }

    #[test]
    fn test_both_channels_constant_offset() {
        assert_eq!(pearson_correlation(&[0.3; 64], &[-0.2; 64]), 1.0);
    }

    #[test]
    fn test_one_channel_silent() {
        let x: Vec<f64> = (0..64).map(|i| (i as f64 * 0.3).sin()).collect();
        assert_eq!(pearson_correlation(&x, &[0.0; 64]), 0.0);
        assert_eq!(pearson_correlation(&[0.0; 64], &x), 0.0);
    }

    // ==========================================================================
    // ANALYZER TESTS
    // ==========================================================================

    #[test]
    fn test_mono_uses_sentinel() {
        let signal = AudioSignal::mono(44100, vec![0.1, 0.2, -0.3]).unwrap();
        let result = analyze(&signal).unwrap();
        assert!(!result.is_stereo);
        assert_eq!(result.l_r_correlation, 1.0);
    }

    #[test]
    fn test_stereo_copy_and_negation() {
        let left: Vec<f64> = (0..4410).map(|i| (i as f64 * 0.0627).sin() * 0.5).collect();
        let negated: Vec<f64> = left.iter().map(|s| -s).collect();

        let same = analyze(&AudioSignal::stereo(44100, left.clone(), left.clone()).unwrap()).unwrap();
        assert!(same.is_stereo);
        assert!((same.l_r_correlation - 1.0).abs() < 1e-6);

        let inverted = analyze(&AudioSignal::stereo(44100, left, negated).unwrap()).unwrap();
        assert!((inverted.l_r_correlation + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_stereo_silence_uses_flat_fallback() {
        let signal = AudioSignal::stereo(44100, vec![0.0; 1000], vec![0.0; 1000]).unwrap();
        let result = analyze(&signal).unwrap();
        assert!(result.is_stereo);
        assert_eq!(result.l_r_correlation, 1.0);
    }

    #[test]
    fn test_nan_is_error() {
        let signal = AudioSignal::stereo(8000, vec![0.1, f64::NAN, 0.3], vec![0.1, 0.2, 0.3]).unwrap();
        let err = analyze(&signal).unwrap_err();
        assert_eq!(err.stage, Stage::Stereo);
    }

    #[test]
    fn test_rounded_to_three_decimals() {
        let left: Vec<f64> = (0..1000).map(|i| (i as f64 * 0.1).sin()).collect();
        let right: Vec<f64> = (0..1000).map(|i| (i as f64 * 0.1 + 0.7).sin()).collect();
        let result = analyze(&AudioSignal::stereo(8000, left, right).unwrap()).unwrap();
        let scaled = result.l_r_correlation * 1000.0;
        assert!((scaled - scaled.round()).abs() < 1e-6);
    }
}
