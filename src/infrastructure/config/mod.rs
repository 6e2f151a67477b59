use crate::domain::narration::{ChunkLimits, VoicePreference};
use crate::domain::persistence::VerificationPolicy;
use crate::domain::playback::PlaybackTimings;
use crate::domain::synthesis::RetryPolicy;
use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::time::Duration;

const DEFAULT_NEURAL_VOICES: &str = "Joanna,Ivy,Justin,Matthew";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub environment: Environment,
    pub log_format: LogFormat,
    // Synthesis
    pub synthesis_provider: SynthesisProvider,
    pub synthesis_endpoint: Option<String>,
    pub synthesis_timeout_secs: u64,
    pub synthesis_retries: u32,
    pub aws_region: String,
    pub neural_voices: Vec<String>,
    pub default_voice_id: String,
    pub sample_rate: u32,
    // Chunking
    pub max_units: usize,
    pub max_unit_chars: usize,
    // Durable storage
    pub storage_base_url: Option<String>,
    pub cdn_base_url: Option<String>,
    pub verify_attempts: u32,
    pub verify_initial_delay_ms: u64,
    // Playback
    pub manual_stop_guard_ms: u64,
    pub reconcile_interval_ms: u64,
    pub reconcile_checks: u32,
    pub track_cache_enabled: bool,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    Production,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SynthesisProvider {
    Http,
    Polly,
}

impl Config {
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let synthesis_provider = env::var("SYNTHESIS_PROVIDER")
            .unwrap_or_else(|_| "http".to_string())
            .parse::<String>()
            .map(|s| match s.to_lowercase().as_str() {
                "polly" => SynthesisProvider::Polly,
                _ => SynthesisProvider::Http,
            })?;
        let synthesis_endpoint = optional_var("SYNTHESIS_ENDPOINT");
        if synthesis_provider == SynthesisProvider::Http && synthesis_endpoint.is_none() {
            return Err("SYNTHESIS_ENDPOINT is required when SYNTHESIS_PROVIDER=http".into());
        }

        let config = Config {
            environment: env::var("ENVIRONMENT")
                .unwrap_or_else(|_| "development".to_string())
                .parse::<String>()
                .map(|s| match s.as_str() {
                    "production" => Environment::Production,
                    _ => Environment::Development,
                })?,
            log_format: env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .parse::<String>()
                .map(|s| match s.as_str() {
                    "json" => LogFormat::Json,
                    _ => LogFormat::Pretty,
                })?,
            synthesis_provider,
            synthesis_endpoint,
            synthesis_timeout_secs: parse_var("SYNTHESIS_TIMEOUT_SECS", 60)?,
            synthesis_retries: parse_var("SYNTHESIS_RETRIES", 1)?,
            aws_region: env::var("AWS_REGION").unwrap_or_else(|_| "eu-west-1".to_string()),
            neural_voices: parse_list(
                &env::var("NEURAL_VOICES").unwrap_or_else(|_| DEFAULT_NEURAL_VOICES.to_string()),
            ),
            default_voice_id: env::var("DEFAULT_VOICE_ID").unwrap_or_else(|_| "Joanna".to_string()),
            sample_rate: parse_var("SAMPLE_RATE", 24_000)?,
            max_units: parse_var("MAX_UNITS", 4)?,
            max_unit_chars: parse_var("MAX_UNIT_CHARS", 2900)?,
            storage_base_url: optional_var("STORAGE_BASE_URL"),
            cdn_base_url: optional_var("CDN_BASE_URL"),
            verify_attempts: parse_var("VERIFY_ATTEMPTS", 5)?,
            verify_initial_delay_ms: parse_var("VERIFY_INITIAL_DELAY_MS", 500)?,
            manual_stop_guard_ms: parse_var("MANUAL_STOP_GUARD_MS", 300)?,
            reconcile_interval_ms: parse_var("RECONCILE_INTERVAL_MS", 500)?,
            reconcile_checks: parse_var("RECONCILE_CHECKS", 3)?,
            track_cache_enabled: env::var("TRACK_CACHE_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse::<String>()
                .map(|s| s.to_lowercase() == "true")
                .unwrap_or(true),
        };

        Ok(config)
    }

    pub fn is_development(&self) -> bool {
        self.environment == Environment::Development
    }

    pub fn synthesis_timeout(&self) -> Duration {
        Duration::from_secs(self.synthesis_timeout_secs)
    }

    pub fn voice_preference(&self) -> VoicePreference {
        VoicePreference::from_preference(&self.default_voice_id)
    }

    pub fn chunk_limits(&self) -> ChunkLimits {
        ChunkLimits {
            max_units: self.max_units,
            max_unit_chars: self.max_unit_chars,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.synthesis_retries,
            ..RetryPolicy::default()
        }
    }

    pub fn playback_timings(&self) -> PlaybackTimings {
        PlaybackTimings {
            manual_stop_guard: Duration::from_millis(self.manual_stop_guard_ms),
            reconcile_interval: Duration::from_millis(self.reconcile_interval_ms),
            reconcile_checks: self.reconcile_checks,
        }
    }

    pub fn verification_policy(&self) -> VerificationPolicy {
        VerificationPolicy {
            attempts: self.verify_attempts,
            initial_delay: Duration::from_millis(self.verify_initial_delay_ms),
        }
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_var<T>(name: &str, default: T) -> Result<T, Box<dyn std::error::Error>>
where
    T: FromStr,
    T::Err: std::error::Error + 'static,
{
    match optional_var(name) {
        Some(value) => Ok(value.trim().parse()?),
        None => Ok(default),
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
