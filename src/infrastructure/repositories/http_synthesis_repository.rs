use super::synthesis_repository::SynthesisRepository;
use crate::domain::synthesis::{SynthesisError, SynthesisRequest};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::Value;
use std::time::{Duration, Instant};

/// Remote synthesis endpoint returning base64 audio in a JSON response.
///
/// The endpoint may answer directly (`{"audioData": ...}`) or wrapped in a
/// gateway envelope (`{"statusCode": 200, "body": "<json>"}`).
pub struct HttpSynthesisRepository {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSynthesisRepository {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SynthesisError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SynthesisError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl SynthesisRepository for HttpSynthesisRepository {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, SynthesisError> {
        let start_time = Instant::now();

        tracing::info!(
            endpoint = %self.endpoint,
            voice_id = %request.voice_id,
            story_index = request.story_index,
            chunk_index = request.chunk_index,
            text_length = request.text.len(),
            "Calling remote synthesis endpoint"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    endpoint = %self.endpoint,
                    chunk_index = request.chunk_index,
                    "Remote synthesis request failed"
                );
                SynthesisError::Transport(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SynthesisError::Transport(format!("failed to read response: {}", e)))?;

        if !status.is_success() {
            tracing::error!(
                status = status.as_u16(),
                chunk_index = request.chunk_index,
                "Remote synthesis endpoint returned an error status"
            );
            return Err(SynthesisError::Status {
                status: status.as_u16(),
                message: preview(&body),
            });
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| SynthesisError::MalformedResponse(format!("invalid JSON: {}", e)))?;
        let audio = decode_audio_payload(&value)?;

        tracing::debug!(
            chunk_index = request.chunk_index,
            audio_size_bytes = audio.len(),
            latency_ms = start_time.elapsed().as_millis() as u64,
            "Remote synthesis audio received"
        );

        Ok(audio)
    }
}

/// Unwrap the response envelope and base64-decode the audio bytes
pub fn decode_audio_payload(value: &Value) -> Result<Vec<u8>, SynthesisError> {
    let encoded = extract_audio_payload(value)?;
    BASE64
        .decode(encoded.trim())
        .map_err(|e| SynthesisError::MalformedResponse(format!("invalid base64 audio: {}", e)))
}

/// Find the base64 audio string, looking at most one envelope level deep
pub fn extract_audio_payload(value: &Value) -> Result<String, SynthesisError> {
    check_for_error(value)?;

    if let Some(audio) = audio_field(value)? {
        return Ok(audio);
    }

    let inner = match value.get("body") {
        Some(Value::String(raw)) => serde_json::from_str::<Value>(raw)
            .map_err(|e| SynthesisError::MalformedResponse(format!("invalid envelope body: {}", e)))?,
        Some(body @ Value::Object(_)) => body.clone(),
        Some(Value::Null) | None => return Err(SynthesisError::MissingPayload),
        Some(other) => {
            return Err(SynthesisError::MalformedResponse(format!(
                "unexpected envelope body: {}",
                preview(&other.to_string())
            )))
        }
    };

    if let Value::String(message) = &inner {
        return Err(SynthesisError::Remote(message.clone()));
    }

    check_for_error(&inner)?;
    audio_field(&inner)?.ok_or(SynthesisError::MissingPayload)
}

fn check_for_error(value: &Value) -> Result<(), SynthesisError> {
    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        let message = match error {
            Value::String(message) => message.clone(),
            other => other.to_string(),
        };
        return Err(SynthesisError::Remote(message));
    }

    if let Some(status) = value.get("statusCode").and_then(Value::as_u64) {
        if status >= 400 {
            let message = match value.get("body") {
                Some(Value::String(body)) => preview(body),
                Some(other) => preview(&other.to_string()),
                None => String::new(),
            };
            return Err(SynthesisError::Status {
                status: status as u16,
                message,
            });
        }
    }

    Ok(())
}

fn audio_field(value: &Value) -> Result<Option<String>, SynthesisError> {
    match value.get("audioData") {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(audio)) if audio.trim().is_empty() => Err(SynthesisError::MissingPayload),
        Some(Value::String(audio)) => Ok(Some(audio.clone())),
        Some(_) => Err(SynthesisError::MalformedResponse(
            "audioData is not a string".to_string(),
        )),
    }
}

fn preview(text: &str) -> String {
    text.chars().take(200).collect()
}
