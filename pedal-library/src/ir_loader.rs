//! Cabinet impulse-response loading
//!
//! Decodes any format symphonia understands, folds to mono, resamples to
//! the pedal rate and trims to the cabinet's tap count, starting at the
//! onset.

use pedal_audio::{normalize_peak, CABINET_SLOTS, CABINET_TAPS};
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Onset level relative to the peak
const ONSET_THRESHOLD: f32 = 0.01;

#[derive(Error, Debug)]
pub enum IrLoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("No audio track found in file")]
    NoAudioTrack,
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Resample error: {0}")]
    Resample(String),
    #[error("Impulse response is silent")]
    Silent,
}

/// A decoded impulse response ready for the cabinet
#[derive(Debug, Clone)]
pub struct LoadedIr {
    /// Display name, from the file stem
    pub name: String,
    /// Peak-normalised taps, at most [`CABINET_TAPS`] long
    pub taps: Vec<f32>,
    /// Rate of the source file
    pub source_rate: u32,
}

pub struct IrLoader {
    target_sample_rate: u32,
}

impl Default for IrLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl IrLoader {
    pub fn new() -> Self {
        Self::with_sample_rate(48000)
    }

    pub fn with_sample_rate(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }

    pub fn load(&self, path: &Path) -> Result<LoadedIr, IrLoadError> {
        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| IrLoadError::Decode(e.to_string()))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(IrLoadError::NoAudioTrack)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();
        let source_rate = codec_params.sample_rate.unwrap_or(self.target_sample_rate);
        let channels = codec_params.channels.map(|c| c.count()).unwrap_or(1).max(1);

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| IrLoadError::Decode(e.to_string()))?;

        // Mono fold as packets arrive
        let mut mono: Vec<f32> = Vec::new();
        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(_) => break,
            };
            if packet.track_id() != track_id {
                continue;
            }
            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(_) => continue,
            };

            let spec = *decoded.spec();
            let mut sample_buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            let scale = 1.0 / channels as f32;
            mono.extend(
                sample_buf
                    .samples()
                    .chunks(channels)
                    .map(|frame| frame.iter().sum::<f32>() * scale),
            );
        }

        let mut taps = if source_rate != self.target_sample_rate {
            self.resample(&mono, source_rate)?
        } else {
            mono
        };

        let peak = taps.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        if peak < 1e-9 {
            return Err(IrLoadError::Silent);
        }
        // Drop leading silence and resampler latency ahead of the onset
        let onset = taps.iter().position(|s| s.abs() >= peak * ONSET_THRESHOLD).unwrap_or(0);
        taps.drain(..onset);
        taps.truncate(CABINET_TAPS);
        normalize_peak(&mut taps);

        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("IR")
            .to_string();
        debug!(name = %name, source_rate, taps = taps.len(), "impulse response decoded");

        Ok(LoadedIr {
            name,
            taps,
            source_rate,
        })
    }

    /// Load up to [`CABINET_SLOTS`] responses from a folder, sorted by file name.
    /// Files that fail to decode are skipped.
    pub fn load_dir(&self, dir: &Path) -> Result<Vec<LoadedIr>, IrLoadError> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| matches!(e.to_ascii_lowercase().as_str(), "wav" | "flac"))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        let mut irs = Vec::new();
        for path in paths {
            if irs.len() >= CABINET_SLOTS {
                break;
            }
            match self.load(&path) {
                Ok(ir) => irs.push(ir),
                Err(e) => warn!(path = %path.display(), error = %e, "impulse response skipped"),
            }
        }
        info!(dir = %dir.display(), count = irs.len(), "impulse responses loaded");
        Ok(irs)
    }

    /// Resample mono audio to the target rate
    fn resample(&self, samples: &[f32], source_rate: u32) -> Result<Vec<f32>, IrLoadError> {
        use rubato::{FftFixedInOut, Resampler};

        let mut resampler = FftFixedInOut::<f32>::new(
            source_rate as usize,
            self.target_sample_rate as usize,
            1024,
            1,
        )
        .map_err(|e| IrLoadError::Resample(e.to_string()))?;

        let chunk_size = resampler.input_frames_next();
        let mut output = Vec::new();

        let mut pos = 0;
        while pos + chunk_size <= samples.len() {
            let resampled = resampler
                .process(&[&samples[pos..pos + chunk_size]], None)
                .map_err(|e| IrLoadError::Resample(e.to_string()))?;
            output.extend_from_slice(&resampled[0]);
            pos += chunk_size;
        }

        // Tail, zero-padded to a full chunk
        if pos < samples.len() {
            let remaining = samples.len() - pos;
            let mut padded = samples[pos..].to_vec();
            padded.resize(chunk_size, 0.0);
            let resampled = resampler
                .process(&[padded.as_slice()], None)
                .map_err(|e| IrLoadError::Resample(e.to_string()))?;
            let keep = (remaining * self.target_sample_rate as usize) / source_rate as usize;
            output.extend_from_slice(&resampled[0][..keep.min(resampled[0].len())]);
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal 16-bit PCM WAV writer
    fn write_wav(path: &Path, rate: u32, channels: u16, samples: &[f32]) {
        let data_len = (samples.len() * 2) as u32;
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
        bytes.extend_from_slice(b"WAVEfmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&rate.to_le_bytes());
        bytes.extend_from_slice(&(rate * channels as u32 * 2).to_le_bytes());
        bytes.extend_from_slice(&(channels * 2).to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&data_len.to_le_bytes());
        for s in samples {
            bytes.extend_from_slice(&((s * 32767.0) as i16).to_le_bytes());
        }
        std::fs::write(path, bytes).unwrap();
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("pedal-ir-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn decaying(len: usize) -> Vec<f32> {
        (0..len).map(|i| 0.5 * (-(i as f32) / 40.0).exp()).collect()
    }

    #[test]
    fn test_stereo_folded_truncated_normalized() {
        let dir = temp_dir("stereo");
        let path = dir.join("cab.wav");
        let mono = decaying(600);
        let stereo: Vec<f32> = mono.iter().flat_map(|s| [*s, *s * 0.5]).collect();
        write_wav(&path, 48000, 2, &stereo);

        let ir = IrLoader::new().load(&path).unwrap();
        assert_eq!(ir.name, "cab");
        assert_eq!(ir.source_rate, 48000);
        assert_eq!(ir.taps.len(), CABINET_TAPS);
        let peak = ir.taps.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!((peak - 1.0).abs() < 1e-4, "peak {}", peak);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_resampled_from_44k() {
        let dir = temp_dir("resample");
        let path = dir.join("ir44.wav");
        write_wav(&path, 44100, 1, &decaying(2000));

        let ir = IrLoader::new().load(&path).unwrap();
        assert_eq!(ir.source_rate, 44100);
        assert_eq!(ir.taps.len(), CABINET_TAPS);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_silent_and_missing() {
        let dir = temp_dir("silent");
        let path = dir.join("zero.wav");
        write_wav(&path, 48000, 1, &[0.0; 100]);
        assert!(matches!(IrLoader::new().load(&path), Err(IrLoadError::Silent)));
        assert!(matches!(
            IrLoader::new().load(&dir.join("nope.wav")),
            Err(IrLoadError::Io(_))
        ));
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_load_dir_sorted_and_filtered() {
        let dir = temp_dir("dir");
        write_wav(&dir.join("b.wav"), 48000, 1, &decaying(300));
        write_wav(&dir.join("a.wav"), 48000, 1, &decaying(300));
        std::fs::write(dir.join("notes.txt"), "not audio").unwrap();

        let irs = IrLoader::new().load_dir(&dir).unwrap();
        let names: Vec<&str> = irs.iter().map(|ir| ir.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);

        std::fs::remove_dir_all(dir).ok();
    }
}
