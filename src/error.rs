//! Error taxonomy for the analysis core
//!
//! Every failure leaves the core as one of three kinds:
//!
//! | Kind | Raised by | Meaning |
//! |------|-----------|---------|
//! | [`DecodeError`] | loader | Source unreadable, corrupt, unsupported or empty |
//! | [`AnalysisError`] | one analyzer | Numeric failure, tagged with the [`Stage`] that raised it |
//! | [`ResourceError`] | loader | Scratch storage could not be acquired, used or released |
//!
//! All of them are fatal to the request. There is no partial report.

use std::fmt;
use thiserror::Error;

/// Crate-level error returned by [`crate::Analyzer`].
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Resource(#[from] ResourceError),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// True when the input itself is at fault (as opposed to the analysis host).
    pub fn is_input_error(&self) -> bool {
        matches!(self, Error::Decode(_))
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("cannot read audio source: {0}")]
    Io(#[from] std::io::Error),

    #[error("unsupported audio format: {0}")]
    Unsupported(String),

    #[error("corrupt audio stream: {0}")]
    Corrupt(String),

    #[error("no decodable audio track")]
    NoAudioTrack,

    #[error("audio track does not report a sample rate")]
    UnknownSampleRate,

    #[error("unsupported channel layout: {0} channels (mono and stereo only)")]
    UnsupportedChannels(usize),

    #[error("audio source contains no samples")]
    Empty,
}

impl From<symphonia::core::errors::Error> for DecodeError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        use symphonia::core::errors::Error as SymphoniaError;

        match err {
            SymphoniaError::IoError(e) => DecodeError::Io(e),
            SymphoniaError::Unsupported(what) => DecodeError::Unsupported(what.to_string()),
            SymphoniaError::DecodeError(what) => DecodeError::Corrupt(what.to_string()),
            other => DecodeError::Corrupt(other.to_string()),
        }
    }
}

/// Which analyzer raised an [`AnalysisError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Loudness,
    Spectral,
    Stereo,
    Tonal,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Loudness => "loudness",
            Stage::Spectral => "spectral",
            Stage::Stereo => "stereo",
            Stage::Tonal => "tonal",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisCause {
    #[error("signal has no samples")]
    EmptySignal,

    #[error("non-finite {quantity} ({value})")]
    NonFinite { quantity: &'static str, value: f64 },

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{stage} analysis failed: {cause}")]
pub struct AnalysisError {
    pub stage: Stage,
    #[source]
    pub cause: AnalysisCause,
}

impl AnalysisError {
    pub fn new(stage: Stage, cause: AnalysisCause) -> Self {
        Self { stage, cause }
    }

    pub fn empty(stage: Stage) -> Self {
        Self::new(stage, AnalysisCause::EmptySignal)
    }

    pub fn invalid(stage: Stage, what: impl Into<String>) -> Self {
        Self::new(stage, AnalysisCause::InvalidParameter(what.into()))
    }
}

/// Fails with a [`AnalysisCause::NonFinite`] unless `value` is finite.
pub(crate) fn ensure_finite(
    stage: Stage,
    quantity: &'static str,
    value: f64,
) -> std::result::Result<f64, AnalysisError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(AnalysisError::new(
            stage,
            AnalysisCause::NonFinite { quantity, value },
        ))
    }
}

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("cannot create scratch file: {0}")]
    Acquire(#[source] std::io::Error),

    #[error("cannot write scratch file: {0}")]
    Write(#[source] hound::Error),

    #[error("cannot read scratch file: {0}")]
    Read(#[source] hound::Error),

    #[error("cannot remove scratch file: {0}")]
    Release(#[source] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Loudness.to_string(), "loudness");
        assert_eq!(Stage::Spectral.to_string(), "spectral");
        assert_eq!(Stage::Stereo.to_string(), "stereo");
        assert_eq!(Stage::Tonal.to_string(), "tonal");
    }

    #[test]
    fn test_analysis_error_message_names_stage_and_cause() {
        let err = AnalysisError::new(
            Stage::Spectral,
            AnalysisCause::NonFinite {
                quantity: "centroid",
                value: f64::NAN,
            },
        );
        let msg = err.to_string();
        assert!(msg.starts_with("spectral analysis failed"), "got {}", msg);
        assert!(msg.contains("centroid"), "got {}", msg);
    }

    #[test]
    fn test_ensure_finite() {
        assert_eq!(ensure_finite(Stage::Loudness, "lufs", -23.0), Ok(-23.0));

        let err = ensure_finite(Stage::Loudness, "lufs", f64::NEG_INFINITY).unwrap_err();
        assert_eq!(err.stage, Stage::Loudness);
        assert!(matches!(err.cause, AnalysisCause::NonFinite { quantity: "lufs", .. }));
    }

    #[test]
    fn test_error_conversions() {
        let err: Error = DecodeError::Empty.into();
        assert!(err.is_input_error());

        let err: Error = AnalysisError::empty(Stage::Tonal).into();
        assert!(!err.is_input_error());
        assert_eq!(err.to_string(), "tonal analysis failed: signal has no samples");
    }

    #[test]
    fn test_symphonia_unsupported_maps_to_unsupported() {
        let err: DecodeError = symphonia::core::errors::Error::Unsupported("core (probe): no suitable format reader found").into();
        assert!(matches!(err, DecodeError::Unsupported(_)));
    }
}
