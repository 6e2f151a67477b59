use crate::domain::audio::{AudioSamples, LocalTrackHandle};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Pending,
    Processing,
    Complete,
    Error,
}

/// One bounded slice of narration text, synthesized by a single remote call
#[derive(Debug, Clone)]
pub struct NarrationUnit {
    pub index: usize,
    pub text: String,
    pub status: UnitStatus,
    pub decoded_audio: Option<AudioSamples>,
    pub error: Option<String>,
}

impl NarrationUnit {
    pub fn new(index: usize, text: String) -> Self {
        Self {
            index,
            text,
            status: UnitStatus::Pending,
            decoded_audio: None,
            error: None,
        }
    }

    pub fn start(&mut self) {
        self.status = UnitStatus::Processing;
        self.error = None;
    }

    pub fn complete(&mut self, audio: AudioSamples) {
        self.status = UnitStatus::Complete;
        self.decoded_audio = Some(audio);
        self.error = None;
    }

    pub fn fail(&mut self, error: String) {
        self.status = UnitStatus::Error;
        self.decoded_audio = None;
        self.error = Some(error);
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    NotCreated,
    Creating,
    Ready,
    Error,
}

/// Synthesis lifecycle for one narration item.
///
/// Invariant: `status == Ready` implies the on-device voice is in use or a
/// local or remote track is known.
#[derive(Debug, Clone, Default)]
pub struct SynthesisJob {
    pub units: Vec<NarrationUnit>,
    pub local_track: Option<LocalTrackHandle>,
    pub remote_key: Option<String>,
    pub status: JobStatus,
    pub last_error: Option<String>,
    pub uses_on_device_voice: bool,
}

impl SynthesisJob {
    pub fn new(uses_on_device_voice: bool) -> Self {
        Self {
            uses_on_device_voice,
            status: if uses_on_device_voice {
                JobStatus::Ready
            } else {
                JobStatus::NotCreated
            },
            ..Default::default()
        }
    }

    /// Replace the units with freshly chunked text; indices follow chunk order
    pub fn load_chunks(&mut self, chunks: Vec<String>) {
        self.units = chunks
            .into_iter()
            .enumerate()
            .map(|(index, text)| NarrationUnit::new(index, text))
            .collect();
    }

    pub fn has_audio_file(&self) -> bool {
        self.local_track.is_some() || self.remote_key.is_some()
    }

    pub fn completed_units(&self) -> usize {
        self.units
            .iter()
            .filter(|unit| unit.status == UnitStatus::Complete)
            .count()
    }

    /// Status a job settles into when nothing is in flight
    pub fn resting_status(&self) -> JobStatus {
        if self.uses_on_device_voice || self.has_audio_file() {
            JobStatus::Ready
        } else {
            JobStatus::NotCreated
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.status != JobStatus::Ready || self.uses_on_device_voice || self.has_audio_file()
    }
}

/// Identifies the story a narration belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrationTarget {
    pub user_id: String,
    pub artifact_id: String,
    /// Zero-based position of the story within the artifact
    pub story_index: usize,
}

impl NarrationTarget {
    pub fn new(user_id: impl Into<String>, artifact_id: impl Into<String>, story_index: usize) -> Self {
        Self {
            user_id: user_id.into(),
            artifact_id: artifact_id.into(),
            story_index,
        }
    }
}
