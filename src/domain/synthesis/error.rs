#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("remote synthesis returned status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("remote synthesis error: {0}")]
    Remote(String),
    #[error("malformed response: {0}")]
    MalformedResponse(String),
    #[error("response contained no audio payload")]
    MissingPayload,
    #[error("audio decode error: {0}")]
    Decode(String),
    #[error("provider error: {0}")]
    Provider(String),
}

impl SynthesisError {
    /// Whether another attempt could plausibly succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            SynthesisError::Transport(_)
            | SynthesisError::Provider(_)
            | SynthesisError::Remote(_) => true,
            SynthesisError::Status { status, .. } => *status >= 500 || *status == 429,
            SynthesisError::MalformedResponse(_)
            | SynthesisError::MissingPayload
            | SynthesisError::Decode(_) => false,
        }
    }
}
