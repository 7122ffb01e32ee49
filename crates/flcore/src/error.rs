use thiserror::Error;

/// Construction and decode failure kinds (spec §7).
///
/// Construction errors (`ContainerInvalid`, `NoValidFrames`,
/// `PosterDecodeFailed`) are surfaced once, to the caller of
/// `AnimatedImage::from_bytes`. `FrameDecodeFailed` is never returned to a
/// playback caller; the cache discards it and the index is re-enterable on
/// the next prefetch cycle.
#[derive(Debug, Error)]
pub enum FlError {
    #[error("container bytes do not parse as a supported animated image: {0}")]
    ContainerInvalid(String),

    #[error("container parsed but contains zero valid frames")]
    NoValidFrames,

    #[error("no candidate poster frame could be decoded")]
    PosterDecodeFailed,

    #[error("background decode of frame {index} failed")]
    FrameDecodeFailed { index: usize },
}
