//! Canonical in-memory signal shared by every analyzer

use crate::error::DecodeError;

/// Decoded audio, one buffer per channel.
///
/// Built once by the loader and never mutated afterwards; analyzers only
/// ever see `&AudioSignal`.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioSignal {
    sample_rate: u32,
    channels: Vec<Vec<f64>>,
}

impl AudioSignal {
    /// Build a signal from per-channel buffers.
    ///
    /// Only mono and stereo are accepted. Buffers of unequal length are
    /// allowed; consumers that pair channels truncate to the shorter one.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f64>>) -> Result<Self, DecodeError> {
        if sample_rate == 0 {
            return Err(DecodeError::UnknownSampleRate);
        }
        match channels.len() {
            1 | 2 => Ok(Self { sample_rate, channels }),
            0 => Err(DecodeError::Empty),
            n => Err(DecodeError::UnsupportedChannels(n)),
        }
    }

    pub fn mono(sample_rate: u32, samples: Vec<f64>) -> Result<Self, DecodeError> {
        Self::new(sample_rate, vec![samples])
    }

    pub fn stereo(sample_rate: u32, left: Vec<f64>, right: Vec<f64>) -> Result<Self, DecodeError> {
        Self::new(sample_rate, vec![left, right])
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channels(&self) -> &[Vec<f64>] {
        &self.channels
    }

    pub fn channel(&self, index: usize) -> Option<&[f64]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Frames available on every channel.
    pub fn frames(&self) -> usize {
        self.channels.iter().map(Vec::len).min().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.frames() == 0
    }

    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Arithmetic-mean downmix.
    pub fn mono_view(&self) -> MonoView {
        let frames = self.frames();
        let count = self.channels.len() as f64;

        let samples = if self.channels.len() == 1 {
            self.channels[0].clone()
        } else {
            (0..frames)
                .map(|i| self.channels.iter().map(|ch| ch[i]).sum::<f64>() / count)
                .collect()
        };

        MonoView {
            sample_rate: self.sample_rate,
            samples,
        }
    }
}

/// Downmix of an [`AudioSignal`], computed once per request.
#[derive(Debug, Clone, PartialEq)]
pub struct MonoView {
    sample_rate: u32,
    samples: Vec<f64>,
}

impl MonoView {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
