pub mod assembler;
pub mod decoder;
pub mod error;
pub mod samples;
pub mod track_store;

pub use assembler::{encode_wav, AssembledTrack, TrackAssembler, WAV_CONTENT_TYPE, WAV_EXTENSION};
pub use decoder::{decoded_duration, PcmDecoder};
pub use error::AssemblyError;
pub use samples::AudioSamples;
pub use track_store::{EncodedTrack, LocalTrackHandle, TrackStore};

/// Silent MPEG-1 Layer III stream: 128 kbps, 44.1 kHz, 1152 samples per frame
#[cfg(test)]
pub(crate) fn silent_mp3(frames: usize) -> Vec<u8> {
    const FRAME_LEN: usize = 417;
    let mut frame = vec![0u8; FRAME_LEN];
    frame[..4].copy_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);
    frame.repeat(frames)
}
