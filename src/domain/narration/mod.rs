pub mod chunker;
pub mod language;
pub mod manager;
pub mod model;
pub mod voice;

pub use chunker::{chunk_text, ChunkLimits};
pub use language::{detect_language, LanguageCode};
pub use manager::{NarrationDeps, NarrationManager, NarrationSettings};
pub use model::{JobStatus, NarrationTarget, NarrationUnit, SynthesisJob, UnitStatus};
pub use voice::{default_voice_for_language, is_voice_neural_compatible, VoicePreference};
