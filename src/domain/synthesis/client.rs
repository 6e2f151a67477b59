use super::dto::SynthesisRequest;
use super::error::SynthesisError;
use crate::domain::audio::{AudioSamples, PcmDecoder};
use crate::domain::narration::{LanguageCode, NarrationTarget, NarrationUnit};
use crate::infrastructure::repositories::SynthesisRepository;
use std::sync::Arc;
use std::time::Instant;

/// Turns one narration unit into decoded samples at the engine's native rate.
///
/// Stateless and single-shot: retries are the caller's decision.
pub struct SynthesisClient {
    repository: Arc<dyn SynthesisRepository>,
    decoder: PcmDecoder,
}

impl SynthesisClient {
    pub fn new(repository: Arc<dyn SynthesisRepository>, decoder: PcmDecoder) -> Self {
        Self {
            repository,
            decoder,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.decoder.target_sample_rate()
    }

    pub async fn synthesize(
        &self,
        unit: &NarrationUnit,
        voice_id: &str,
        language: LanguageCode,
        target: &NarrationTarget,
    ) -> Result<AudioSamples, SynthesisError> {
        let start_time = Instant::now();
        let request = SynthesisRequest::for_unit(&unit.text, unit.index, voice_id, language, target);

        let encoded = self.repository.synthesize(&request).await?;
        let encoded_size = encoded.len();

        let audio = self
            .decoder
            .decode_async(encoded)
            .await
            .map_err(|e| SynthesisError::Decode(e.to_string()))?;

        tracing::info!(
            unit_index = unit.index,
            voice_id = voice_id,
            language = %language,
            text_length = unit.text.len(),
            audio_size_bytes = encoded_size,
            duration_secs = audio.duration().as_secs_f64(),
            latency_ms = start_time.elapsed().as_millis() as u64,
            "Narration unit synthesized"
        );

        Ok(audio)
    }
}
