pub mod error;
pub mod keys;
pub mod metadata;
pub mod service;

pub use error::PersistenceError;
pub use keys::{audio_filename, audio_key, sanitize_path_component, stories_record_key};
pub use metadata::StoryEntry;
pub use service::{
    AudioAssignmentListener, PersistedTrack, PersistenceCoordinator, VerificationPolicy,
    ALTERNATE_CONTENT_TYPE,
};
