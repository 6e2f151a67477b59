use super::error::AssemblyError;
use super::samples::AudioSamples;
use super::track_store::{EncodedTrack, LocalTrackHandle, TrackStore};
use crate::domain::narration::{NarrationUnit, UnitStatus};
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

pub const WAV_CONTENT_TYPE: &str = "audio/wav";
pub const WAV_EXTENSION: &str = "wav";

/// Result of stitching a job's units into one track
#[derive(Debug, Clone)]
pub struct AssembledTrack {
    pub handle: LocalTrackHandle,
    pub duration: Duration,
    pub units_included: usize,
    pub units_skipped: usize,
    pub size_bytes: usize,
}

/// Renders decoded units into one continuous mono buffer and encodes it
#[derive(Debug, Clone, Copy)]
pub struct TrackAssembler {
    sample_rate: u32,
}

impl TrackAssembler {
    pub fn new(sample_rate: u32) -> Self {
        Self { sample_rate }
    }

    /// Concatenate successful units in index order.
    ///
    /// Failed or undecoded units contribute nothing, so the result is a gap
    /// in the narration rather than a missing track.
    pub fn render(&self, units: &[NarrationUnit]) -> Result<(AudioSamples, usize), AssemblyError> {
        if units.is_empty() {
            return Err(AssemblyError::Empty);
        }

        let mut ordered: Vec<&NarrationUnit> = units.iter().collect();
        ordered.sort_by_key(|unit| unit.index);

        let mut included = Vec::with_capacity(ordered.len());
        for unit in ordered {
            match (&unit.status, &unit.decoded_audio) {
                (UnitStatus::Complete, Some(audio)) if !audio.is_empty() => {
                    let audio = if audio.sample_rate == self.sample_rate {
                        audio.clone()
                    } else {
                        audio
                            .clone()
                            .resampled(self.sample_rate)
                            .map_err(|e| AssemblyError::Render(e.to_string()))?
                    };
                    included.push(audio);
                }
                _ => {
                    tracing::warn!(
                        unit_index = unit.index,
                        status = ?unit.status,
                        "Omitting unit without decoded audio from track"
                    );
                }
            }
        }

        if included.is_empty() {
            return Err(AssemblyError::NoDecodedUnits);
        }

        let total_len: usize = included.iter().map(AudioSamples::len).sum();
        let mut samples = Vec::with_capacity(total_len);
        for audio in &included {
            samples.extend_from_slice(&audio.samples);
        }

        Ok((AudioSamples::new(samples, self.sample_rate), included.len()))
    }

    /// Render, encode and register the track so it can be played immediately
    pub fn assemble(
        &self,
        units: &[NarrationUnit],
        tracks: &TrackStore,
    ) -> Result<AssembledTrack, AssemblyError> {
        let (audio, units_included) = self.render(units)?;
        let duration = audio.duration();
        let bytes = encode_wav(&audio)?;
        let size_bytes = bytes.len();

        let handle = tracks.register(EncodedTrack {
            bytes: Arc::new(bytes),
            content_type: WAV_CONTENT_TYPE,
            extension: WAV_EXTENSION,
            duration,
        });

        tracing::info!(
            handle = %handle,
            units_included = units_included,
            units_skipped = units.len() - units_included,
            duration_secs = duration.as_secs_f64(),
            audio_size_bytes = size_bytes,
            "Narration track assembled"
        );

        Ok(AssembledTrack {
            handle,
            duration,
            units_included,
            units_skipped: units.len() - units_included,
            size_bytes,
        })
    }
}

/// Encode mono samples as 16-bit PCM WAV
pub fn encode_wav(audio: &AudioSamples) -> Result<Vec<u8>, AssemblyError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: audio.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + audio.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| AssemblyError::Encode(format!("Failed to create WAV writer: {}", e)))?;

        for sample in &audio.samples {
            let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
            writer
                .write_sample(value)
                .map_err(|e| AssemblyError::Encode(format!("Failed to write sample: {}", e)))?;
        }

        writer
            .finalize()
            .map_err(|e| AssemblyError::Encode(format!("Failed to finalize WAV data: {}", e)))?;
    }

    Ok(cursor.into_inner())
}
