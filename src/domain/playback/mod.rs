pub mod engine;
pub mod error;
pub mod remote;
pub mod source;
pub mod state;
pub mod store;

pub use engine::{PlaybackEngine, PlaybackTimings};
pub use error::PlaybackError;
pub use remote::RemoteTrackLoader;
pub use source::{select_source, PlayOptions, PlaybackSource, SourceContext};
pub use state::{apply, NarrationState, PlaybackBackend, PlaybackStatus, StateUpdate};
pub use store::{Observer, StateStore, Subscription};
