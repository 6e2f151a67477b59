use crate::domain::narration::{LanguageCode, NarrationTarget};
use serde::{Deserialize, Serialize};

/// Body of one remote synthesis call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisRequest {
    pub text: String,
    pub voice_id: String,
    pub language: LanguageCode,
    pub story_index: usize,
    pub chunk_index: usize,
    pub user_id: String,
    pub artifact_id: String,
}

impl SynthesisRequest {
    pub fn for_unit(
        text: &str,
        chunk_index: usize,
        voice_id: &str,
        language: LanguageCode,
        target: &NarrationTarget,
    ) -> Self {
        Self {
            text: text.to_string(),
            voice_id: voice_id.to_string(),
            language,
            story_index: target.story_index,
            chunk_index,
            user_id: target.user_id.clone(),
            artifact_id: target.artifact_id.clone(),
        }
    }
}
