use super::samples::AudioSamples;
use std::io::Cursor;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Decodes encoded audio (MP3, WAV, ...) into mono PCM at the engine's native rate
#[derive(Debug, Clone, Copy)]
pub struct PcmDecoder {
    target_sample_rate: u32,
}

impl PcmDecoder {
    pub fn new(target_sample_rate: u32) -> Self {
        Self { target_sample_rate }
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    /// Decode a complete in-memory file
    pub fn decode(&self, bytes: &[u8]) -> anyhow::Result<AudioSamples> {
        let (samples, sample_rate) = pcm_decode(bytes)?;
        AudioSamples::new(samples, sample_rate).resampled(self.target_sample_rate)
    }

    /// Decode on the blocking pool; decoding a few minutes of MP3 is CPU bound
    pub async fn decode_async(&self, bytes: Vec<u8>) -> anyhow::Result<AudioSamples> {
        let decoder = *self;
        tokio::task::spawn_blocking(move || decoder.decode(&bytes))
            .await
            .map_err(|e| anyhow::anyhow!("decode task failed: {}", e))?
    }
}

/// Play length of an encoded file, measured by decoding it
pub fn decoded_duration(bytes: &[u8]) -> anyhow::Result<Duration> {
    let (samples, sample_rate) = pcm_decode(bytes)?;
    if sample_rate == 0 {
        anyhow::bail!("Decoded audio has no sample rate");
    }
    Ok(Duration::from_secs_f64(
        samples.len() as f64 / f64::from(sample_rate),
    ))
}

fn pcm_decode(bytes: &[u8]) -> anyhow::Result<(Vec<f32>, u32)> {
    let source = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(source), Default::default());

    let probed = symphonia::default::get_probe().format(
        &Hint::new(),
        mss,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    // Find the first audio track with a known (decodeable) codec.
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| anyhow::anyhow!("No supported audio tracks found in input"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| anyhow::anyhow!("Unsupported codec: {}", e))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut pcm_data = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let channels = spec.channels.count().max(1);
                if sample_rate == 0 {
                    sample_rate = spec.rate;
                }

                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);

                // Downmix interleaved frames to mono
                pcm_data.extend(
                    buffer
                        .samples()
                        .chunks(channels)
                        .map(|frame| frame.iter().sum::<f32>() / channels as f32),
                );
            }
            Err(SymphoniaError::DecodeError(msg)) => {
                tracing::warn!(error = msg, "Skipping undecodable audio packet");
            }
            Err(e) => return Err(e.into()),
        }
    }

    if pcm_data.is_empty() {
        anyhow::bail!("Decoded audio contains no samples");
    }

    Ok((pcm_data, sample_rate))
}
