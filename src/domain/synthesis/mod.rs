pub mod client;
pub mod dto;
pub mod error;
pub mod retry;

pub use client::SynthesisClient;
pub use dto::SynthesisRequest;
pub use error::SynthesisError;
pub use retry::RetryPolicy;
