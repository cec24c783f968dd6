//! Signal loader: any supported container in, [`AudioSignal`] out
//!
//! Decoding goes through symphonia, so anything its registry can probe is
//! accepted (WAV, FLAC, Ogg Vorbis, MKV, MP3, AAC/M4A, ALAC with the crate's
//! feature set).
//!
//! Decoded packets are not collected directly. They are streamed into a
//! canonical 32-bit float WAV in a scratch file, and the signal is read back
//! from that file once the source is exhausted:
//!
//! ```text
//! source ──symphonia──▶ f32 packets ──hound──▶ scratch.wav ──hound──▶ AudioSignal
//! ```
//!
//! The scratch file is owned by a guard that removes it on every exit path.
//!
//! # Channel policy
//!
//! Mono and stereo only. Sources with more channels are rejected with
//! [`DecodeError::UnsupportedChannels`]; nothing is downmixed.

use crate::error::{DecodeError, ResourceError, Result};
use crate::signal::AudioSignal;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, ErrorKind};
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

const MAX_CHANNELS: usize = 2;
const SCRATCH_PREFIX: &str = "sonal-aura-";

/// Decodes audio sources into [`AudioSignal`]s.
#[derive(Debug, Clone, Default)]
pub struct Loader {
    scratch_dir: Option<PathBuf>,
}

impl Loader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place scratch files in `dir` instead of the system temp directory.
    pub fn with_scratch_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.scratch_dir = Some(dir.into());
        self
    }

    /// Decode the file at `path`. The extension, if any, is used as a probe hint.
    pub fn load_path<P: AsRef<Path>>(&self, path: P) -> Result<AudioSignal> {
        let path = path.as_ref();
        log::debug!("Loading audio file: {:?}", path);

        let file = File::open(path).map_err(DecodeError::Io)?;

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        self.decode(Box::new(file), hint, &path.display().to_string())
    }

    /// Decode an in-memory byte stream.
    pub fn load_bytes(&self, data: &[u8], extension: Option<&str>) -> Result<AudioSignal> {
        if data.is_empty() {
            return Err(DecodeError::Empty.into());
        }

        let cursor = Cursor::new(data.to_vec());

        let mut hint = Hint::new();
        if let Some(ext) = extension {
            hint.with_extension(ext);
        }

        self.decode(Box::new(cursor), hint, "<memory>")
    }

    fn decode(&self, source: Box<dyn MediaSource>, hint: Hint, label: &str) -> Result<AudioSignal> {
        let mss = MediaSourceStream::new(source, Default::default());

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(DecodeError::from)?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoAudioTrack)?;

        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or(DecodeError::UnknownSampleRate)?;

        if let Some(channels) = track.codec_params.channels {
            check_channels(channels.count())?;
        }

        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(DecodeError::from)?;

        let scratch = Scratch::acquire(self.scratch_dir.as_deref())?;
        let mut writer: Option<WavWriter<BufWriter<File>>> = None;
        let mut channel_count = 0usize;

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e)) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(DecodeError::from(e).into()),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(msg)) => {
                    log::warn!("{}: skipping corrupt packet: {}", label, msg);
                    continue;
                }
                Err(e) => return Err(DecodeError::from(e).into()),
            };

            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let channels = spec.channels.count();
            check_channels(channels)?;

            if writer.is_none() {
                channel_count = channels;
                writer = Some(scratch.writer(channels as u16, spec.rate)?);
            } else if channels != channel_count {
                return Err(DecodeError::Corrupt(format!(
                    "channel count changed mid-stream ({} -> {})",
                    channel_count, channels
                ))
                .into());
            }

            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);

            if let Some(w) = writer.as_mut() {
                for &sample in sample_buf.samples() {
                    w.write_sample(sample).map_err(ResourceError::Write)?;
                }
            }
        }

        let writer = writer.ok_or(DecodeError::Empty)?;
        writer.finalize().map_err(ResourceError::Write)?;

        let (canonical_rate, channels) = scratch.read_back()?;
        scratch.release()?;

        if canonical_rate != sample_rate {
            log::debug!(
                "{}: track reports {} Hz, decoder produced {} Hz",
                label,
                sample_rate,
                canonical_rate
            );
        }

        let signal = AudioSignal::new(canonical_rate, channels)?;
        if signal.is_empty() {
            return Err(DecodeError::Empty.into());
        }

        log::debug!(
            "{}: {} channel(s), {} Hz, {:.2}s",
            label,
            signal.channel_count(),
            signal.sample_rate(),
            signal.duration_secs()
        );

        Ok(signal)
    }
}

fn check_channels(count: usize) -> std::result::Result<(), DecodeError> {
    if count == 0 || count > MAX_CHANNELS {
        Err(DecodeError::UnsupportedChannels(count))
    } else {
        Ok(())
    }
}

/// Scoped scratch file for the canonical PCM representation.
///
/// `release` removes it and reports failures; dropping the guard without
/// releasing (any early return) removes it silently.
struct Scratch {
    file: Option<tempfile::NamedTempFile>,
}

impl Scratch {
    fn acquire(dir: Option<&Path>) -> std::result::Result<Self, ResourceError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(SCRATCH_PREFIX).suffix(".wav");

        let file = match dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .map_err(ResourceError::Acquire)?;

        log::debug!("Acquired scratch file {:?}", file.path());
        Ok(Self { file: Some(file) })
    }

    fn handle(&self) -> std::io::Result<File> {
        match &self.file {
            Some(f) => f.reopen(),
            None => Err(std::io::Error::new(ErrorKind::NotFound, "scratch file released")),
        }
    }

    fn writer(
        &self,
        channels: u16,
        sample_rate: u32,
    ) -> std::result::Result<WavWriter<BufWriter<File>>, ResourceError> {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        };
        let handle = self.handle().map_err(ResourceError::Acquire)?;
        WavWriter::new(BufWriter::new(handle), spec).map_err(ResourceError::Write)
    }

    fn read_back(&self) -> std::result::Result<(u32, Vec<Vec<f64>>), ResourceError> {
        let handle = self
            .handle()
            .map_err(|e| ResourceError::Read(hound::Error::IoError(e)))?;
        let reader = WavReader::new(BufReader::new(handle)).map_err(ResourceError::Read)?;

        let spec = reader.spec();
        let num_channels = spec.channels.max(1) as usize;
        let frames = reader.duration() as usize;
        let mut channels: Vec<Vec<f64>> = (0..num_channels).map(|_| Vec::with_capacity(frames)).collect();

        for (i, sample) in reader.into_samples::<f32>().enumerate() {
            let sample = sample.map_err(ResourceError::Read)?;
            channels[i % num_channels].push(sample as f64);
        }

        Ok((spec.sample_rate, channels))
    }

    fn release(mut self) -> std::result::Result<(), ResourceError> {
        if let Some(file) = self.file.take() {
            let path = file.path().to_path_buf();
            file.close().map_err(ResourceError::Release)?;
            log::debug!("Released scratch file {:?}", path);
        }
        Ok(())
    }
}

impl Drop for Scratch {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            log::debug!("Discarding scratch file {:?}", file.path());
        }
    }
}
