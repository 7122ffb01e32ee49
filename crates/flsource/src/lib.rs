//! Frame Data Source (spec §4.A): decodes one frame at a time from a
//! container, reports whether a frame needs blending with its predecessor,
//! and performs that blend. GIF and WebP are modeled as a shared trait
//! object rather than an inheritance hierarchy (spec §9 REDESIGN FLAGS).

pub mod frame_info;
pub mod gif;
pub mod webp;

pub use frame_info::FrameInfo;

use flcore::{FlError, Size};
use std::sync::Arc;

/// A fully predrawn frame: flattened RGBA8 pixels at canvas size, ready to
/// hand straight to a display surface with no further decode work (spec
/// §4.A "predraw").
#[derive(Clone)]
pub struct DecodedFrame {
    pixels: Arc<[u8]>,
    size: Size,
}

impl DecodedFrame {
    #[must_use]
    pub fn new(pixels: Vec<u8>, size: Size) -> Self {
        debug_assert_eq!(pixels.len() as u64, size.frame_bytes());
        Self { pixels: Arc::from(pixels), size }
    }

    #[must_use]
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[must_use]
    pub fn size(&self) -> Size {
        self.size
    }
}

/// The capability set both GIF and WebP frame sources implement (spec
/// §4.A).
///
/// `decode` is the only operation allowed to perform heavy pixel work and
/// may be invoked off the display thread.
pub trait FrameDataSource: Send + Sync {
    /// Number of valid frames this source can decode.
    fn frame_count(&self) -> usize;

    /// Decode frame `index`, fully predrawn to a flat RGBA8 buffer.
    ///
    /// # Errors
    /// Returns `FlError::FrameDecodeFailed` if the underlying codec errors.
    fn decode(&self, index: usize) -> Result<DecodedFrame, FlError>;

    /// Whether frame `index` must be composited on top of its predecessor
    /// before it is displayable. Always `false` for GIF (spec §4.A: GIF
    /// frames are already full-canvas composited by the container decode).
    fn requires_blending(&self, index: usize) -> bool;

    /// Composite `current` onto `previous` inside frame `index`'s rect,
    /// honoring alpha. Unused (never called) for GIF sources.
    fn blend(&self, current: &DecodedFrame, previous: &DecodedFrame, index: usize) -> DecodedFrame;
}
