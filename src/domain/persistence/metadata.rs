use super::error::PersistenceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One story in the artifact's side-record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoryEntry {
    #[serde(default)]
    pub culture: String,
    #[serde(default)]
    pub view: String,
    #[serde(default)]
    pub culture_story: String,
    /// Audio file name relative to the artifact prefix, empty when none
    #[serde(default)]
    pub story_audio: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_updated_at: Option<DateTime<Utc>>,
    /// Fields written by other producers, kept as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StoryEntry {
    fn placeholder(index: usize) -> Self {
        Self {
            original_index: Some(index),
            ..Self::default()
        }
    }
}

pub fn parse_record(bytes: &[u8]) -> Result<Vec<StoryEntry>, PersistenceError> {
    serde_json::from_slice(bytes)
        .map_err(|e| PersistenceError::Metadata(format!("unreadable stories record: {}", e)))
}

pub fn serialize_record(entries: &[StoryEntry]) -> Result<Vec<u8>, PersistenceError> {
    serde_json::to_vec_pretty(entries)
        .map_err(|e| PersistenceError::Metadata(format!("failed to serialize stories record: {}", e)))
}

/// Record used when the artifact has none yet
pub fn default_record(story_index: usize) -> Vec<StoryEntry> {
    (0..=story_index).map(StoryEntry::placeholder).collect()
}

/// Point the entry at `story_index` to `filename`, growing the record with
/// placeholders when it is too short
pub fn patch_record(
    entries: &mut Vec<StoryEntry>,
    story_index: usize,
    filename: &str,
    updated_at: DateTime<Utc>,
) {
    while entries.len() <= story_index {
        let index = entries.len();
        entries.push(StoryEntry::placeholder(index));
    }

    let entry = &mut entries[story_index];
    entry.story_audio = filename.to_string();
    entry.audio_updated_at = Some(updated_at);
}
