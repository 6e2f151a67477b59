use super::synthesis_repository::SynthesisRepository;
use crate::domain::narration::is_voice_neural_compatible;
use crate::domain::synthesis::{SynthesisError, SynthesisRequest};
use async_trait::async_trait;
use aws_sdk_polly::{
    types::{Engine, OutputFormat, VoiceId},
    Client as PollyClient,
};
use std::sync::Arc;

/// Polly rejects long requests; the retry sends only this many characters
const TRUNCATED_TEXT_CHARS: usize = 1000;

/// AWS Polly implementation of the synthesis repository
pub struct PollySynthesisRepository {
    polly_client: Arc<PollyClient>,
    neural_voices: Vec<String>,
}

impl PollySynthesisRepository {
    pub fn new(polly_client: Arc<PollyClient>, neural_voices: Vec<String>) -> Self {
        Self {
            polly_client,
            neural_voices,
        }
    }

    fn engine_for_voice(&self, voice: &str) -> Engine {
        let neural = if self.neural_voices.is_empty() {
            is_voice_neural_compatible(voice)
        } else {
            self.neural_voices.iter().any(|v| v == voice)
        };

        if neural {
            Engine::Neural
        } else {
            Engine::Standard
        }
    }

    /// Call AWS Polly for a single unit of text
    async fn call_polly(&self, text: &str, voice: &str) -> Result<Vec<u8>, PollyFailure> {
        let voice_id = VoiceId::from(voice);
        let engine = self.engine_for_voice(voice);

        tracing::info!(
            voice = voice,
            engine = ?engine,
            output_format = "Mp3",
            text_length = text.len(),
            "Calling AWS Polly synthesize_speech"
        );

        let result = self
            .polly_client
            .synthesize_speech()
            .text(text)
            .voice_id(voice_id)
            .output_format(OutputFormat::Mp3)
            .engine(engine.clone())
            .send()
            .await
            .map_err(|e| {
                let too_long = e
                    .as_service_error()
                    .map(|se| se.is_text_length_exceeded_exception())
                    .unwrap_or(false);

                tracing::error!(
                    error = %e,
                    voice = voice,
                    engine = ?engine,
                    text_length = text.len(),
                    "AWS Polly synthesize_speech failed"
                );

                if too_long {
                    PollyFailure::TextTooLong
                } else {
                    PollyFailure::Other(SynthesisError::Provider(format!(
                        "AWS Polly error: {}",
                        e
                    )))
                }
            })?;

        let audio_stream = result.audio_stream.collect().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to collect audio stream from Polly response");
            PollyFailure::Other(SynthesisError::Transport(format!(
                "Failed to read audio stream: {}",
                e
            )))
        })?;

        let audio_bytes = audio_stream.into_bytes().to_vec();
        tracing::debug!(
            audio_size = audio_bytes.len(),
            "Audio stream collected successfully"
        );

        Ok(audio_bytes)
    }
}

enum PollyFailure {
    TextTooLong,
    Other(SynthesisError),
}

#[async_trait]
impl SynthesisRepository for PollySynthesisRepository {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, SynthesisError> {
        let start_time = std::time::Instant::now();

        let audio_data = match self.call_polly(&request.text, &request.voice_id).await {
            Ok(audio) => audio,
            Err(PollyFailure::TextTooLong) => {
                let truncated = truncate_chars(&request.text, TRUNCATED_TEXT_CHARS);
                tracing::warn!(
                    chunk_index = request.chunk_index,
                    original_length = request.text.chars().count(),
                    truncated_length = truncated.chars().count(),
                    "Text length exceeded, retrying with truncated text"
                );

                match self.call_polly(truncated, &request.voice_id).await {
                    Ok(audio) => audio,
                    Err(PollyFailure::TextTooLong) => {
                        return Err(SynthesisError::Provider(
                            "text length exceeded even after truncation".to_string(),
                        ))
                    }
                    Err(PollyFailure::Other(e)) => return Err(e),
                }
            }
            Err(PollyFailure::Other(e)) => return Err(e),
        };

        let duration = start_time.elapsed();
        tracing::info!(
            provider = "polly",
            latency_ms = duration.as_millis() as u64,
            chunk_index = request.chunk_index,
            characters_count = request.text.len(),
            audio_size_bytes = audio_data.len(),
            "Synthesis completed"
        );

        Ok(audio_data)
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
