pub mod config;
pub mod playback;
pub mod repositories;
