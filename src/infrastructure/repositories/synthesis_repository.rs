use crate::domain::synthesis::{SynthesisError, SynthesisRequest};
use async_trait::async_trait;

/// Repository for remote speech synthesis.
/// Abstracts the underlying provider (HTTP synthesis endpoint, AWS Polly, ...)
///
/// Implementations are responsible for:
/// - Issuing exactly one provider call per request (no retries)
/// - Unwrapping provider-specific response envelopes
/// - Returning the encoded audio bytes (MP3 or WAV) ready for decoding
#[async_trait]
pub trait SynthesisRepository: Send + Sync {
    /// Synthesize one narration unit
    ///
    /// # Errors
    /// Returns error on transport failure, malformed response or missing payload
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, SynthesisError>;
}
