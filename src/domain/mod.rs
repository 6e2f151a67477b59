pub mod audio;
pub mod narration;
pub mod persistence;
pub mod playback;
pub mod synthesis;
