use super::language::LanguageCode;
use serde::{Deserialize, Serialize};

/// Preference value that selects the on-device voice
pub const SYSTEM_VOICE: &str = "system";

/// Which voice narrates a story
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "voice_id", rename_all = "snake_case")]
pub enum VoicePreference {
    /// On-device speech, nothing is synthesized remotely
    System,
    /// Remote synthesized voice
    Premium(String),
}

impl VoicePreference {
    /// Parse a stored preference; `"system"` selects the on-device voice
    pub fn from_preference(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case(SYSTEM_VOICE) {
            VoicePreference::System
        } else {
            VoicePreference::Premium(value.to_string())
        }
    }

    pub fn uses_on_device_voice(&self) -> bool {
        matches!(self, VoicePreference::System)
    }

    pub fn premium_voice_id(&self) -> Option<&str> {
        match self {
            VoicePreference::Premium(voice_id) => Some(voice_id),
            VoicePreference::System => None,
        }
    }
}

/// Get the default remote voice for a language
pub fn default_voice_for_language(language: LanguageCode) -> &'static str {
    match language {
        LanguageCode::English => "Joanna",
        LanguageCode::Spanish => "Lupe",
        LanguageCode::French => "Lea",
        LanguageCode::German => "Vicki",
        LanguageCode::Italian => "Bianca",
        LanguageCode::Portuguese => "Ines",
    }
}

/// Check if a voice supports the neural engine
pub fn is_voice_neural_compatible(voice: &str) -> bool {
    // Based on AWS Polly documentation
    const NEURAL_VOICES: &[&str] = &[
        // English
        "Joanna", "Matthew", "Ivy", "Kendra", "Kimberly", "Salli", "Joey", "Justin", "Kevin",
        // Spanish
        "Lupe", "Pedro", "Sergio", // French
        "Lea", "Remi", // German
        "Vicki", "Daniel", // Italian
        "Bianca", "Adriano", // Portuguese
        "Ines", "Camila", "Vitoria", "Thiago",
    ];

    NEURAL_VOICES.contains(&voice)
}
