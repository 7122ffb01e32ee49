//! `AnimatedImage` (spec §4.C): the immutable description of one decoded
//! container plus the mutable `FrameCache` that serves its frames.
//!
//! Grounded on the teacher's `LoadedClip` (`af-source/src/image.rs`), which
//! pairs static per-clip metadata with a handle into the thing that
//! actually produces pixels.

use std::sync::Arc;

use flcore::{normalize_delay, FlError, ImageKind, Size};
use flsource::{DecodedFrame, FrameDataSource};

use crate::cache::{FrameCache, FrameCacheParams};
use crate::config::CacheConfig;
use crate::debug::DebugDelegate;

/// A decoded, cache-backed animated image (spec §4.C).
pub struct AnimatedImage {
    size: Size,
    loop_count: u32,
    frame_count: usize,
    /// Always `0` for this backend: neither the eager GIF pre-decode nor
    /// the hand-rolled WebP `ANMF` walker can partially fail per frame the
    /// way a platform decoder streaming from a file handle can.
    skipped_frame_count: usize,
    delay_times: Vec<f64>,
    poster_image: DecodedFrame,
    poster_image_index: usize,
    kind: ImageKind,
    cache: FrameCache,
}

impl AnimatedImage {
    /// Build from raw GIF bytes (spec §4.C).
    ///
    /// # Errors
    /// Propagates `FlError::ContainerInvalid`/`NoValidFrames` from parsing,
    /// or `FlError::PosterDecodeFailed` if no frame could be decoded.
    pub fn from_gif_bytes(data: &[u8], config: CacheConfig) -> Result<Self, FlError> {
        let container = flsource::gif::GifContainer::parse(data)?;
        let size = container.size;
        let loop_count = container.loop_count;
        let raw_delays = container.raw_delays.clone();
        let frame_count = container.frame_count();
        let source: Arc<dyn FrameDataSource> = Arc::new(container.into_data_source());

        Self::assemble(size, loop_count, frame_count, raw_delays, source, ImageKind::Gif, config)
    }

    /// Build from raw animated WebP bytes (spec §4.C).
    ///
    /// # Errors
    /// Propagates `FlError::ContainerInvalid`/`NoValidFrames` from parsing,
    /// or `FlError::PosterDecodeFailed` if no frame could be decoded.
    pub fn from_webp_bytes(data: &[u8], config: CacheConfig) -> Result<Self, FlError> {
        let container = flsource::webp::WebPContainer::parse(data)?;
        let size = container.size;
        let loop_count = container.loop_count;
        let raw_delays = container.raw_delays.clone();
        let frame_count = container.frame_count();
        let source: Arc<dyn FrameDataSource> = Arc::new(container.into_data_source());

        Self::assemble(size, loop_count, frame_count, raw_delays, source, ImageKind::WebP, config)
    }

    fn assemble(
        size: Size,
        loop_count: u32,
        frame_count: usize,
        raw_delays: Vec<f64>,
        source: Arc<dyn FrameDataSource>,
        kind: ImageKind,
        config: CacheConfig,
    ) -> Result<Self, FlError> {
        let delay_times: Vec<f64> = raw_delays.into_iter().map(normalize_delay).collect();
        let (poster_image_index, poster_image) = find_poster(source.as_ref(), frame_count)?;
        let frame_bytes = size.frame_bytes();

        let cache = FrameCache::new(FrameCacheParams {
            frame_count,
            frame_bytes,
            poster_image: poster_image.clone(),
            poster_index: poster_image_index,
            data_source: source,
            config,
        });

        Ok(Self {
            size,
            loop_count,
            frame_count,
            skipped_frame_count: 0,
            delay_times,
            poster_image,
            poster_image_index,
            kind,
            cache,
        })
    }

    #[must_use]
    pub fn size(&self) -> Size {
        self.size
    }

    #[must_use]
    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    #[must_use]
    pub fn skipped_frame_count(&self) -> usize {
        self.skipped_frame_count
    }

    #[must_use]
    pub fn delay_time(&self, index: usize) -> Option<f64> {
        self.delay_times.get(index).copied()
    }

    #[must_use]
    pub fn kind(&self) -> ImageKind {
        self.kind
    }

    #[must_use]
    pub fn poster_image_index(&self) -> usize {
        self.poster_image_index
    }

    #[must_use]
    pub fn poster_image(&self) -> DecodedFrame {
        self.poster_image.clone()
    }

    /// Attach a debug observer to this image's cache (spec §9).
    pub fn set_debug_delegate(&self, delegate: Option<Arc<dyn DebugDelegate>>) {
        self.cache.set_debug_delegate(delegate);
    }

    /// Signal memory pressure (spec §5).
    pub fn on_memory_pressure(&self) {
        self.cache.on_memory_pressure();
    }

    /// Signal a completed loop (spec §5).
    pub fn on_loop_boundary(&self) {
        self.cache.on_loop_boundary();
    }

    /// Fetch frame `index`, triggering the cache's predictive window
    /// advance as a side effect (spec §4.B/§4.D).
    #[must_use]
    pub fn image_at(&self, index: usize) -> Option<DecodedFrame> {
        self.cache.get(index)
    }
}

/// Find the first frame that decodes successfully, to serve as both the
/// immediately-available poster image and the fallback frame for index 0
/// before the cache has filled in (spec §4.C "poster image").
///
/// # Errors
/// Returns `FlError::PosterDecodeFailed` if no frame in `0..frame_count`
/// decodes.
fn find_poster(source: &dyn FrameDataSource, frame_count: usize) -> Result<(usize, DecodedFrame), FlError> {
    for index in 0..frame_count {
        if let Ok(frame) = source.decode(index) {
            return Ok((index, frame));
        }
    }
    Err(FlError::PosterDecodeFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::gif::GifEncoder;
    use image::{Delay, Frame, RgbaImage};

    fn two_frame_gif() -> Vec<u8> {
        let mut bytes = vec![];
        {
            let mut encoder = GifEncoder::new(&mut bytes);
            for _ in 0..2 {
                let buf = RgbaImage::from_pixel(2, 2, image::Rgba([1, 2, 3, 255]));
                let frame = Frame::from_parts(buf, 0, 0, Delay::from_numer_denom_ms(50, 1));
                encoder.encode_frame(frame).expect("encode frame");
            }
        }
        bytes
    }

    #[test]
    fn builds_from_gif_bytes_with_normalized_delays() {
        let bytes = two_frame_gif();
        let image = AnimatedImage::from_gif_bytes(&bytes, CacheConfig::default()).expect("decode");
        assert_eq!(image.frame_count(), 2);
        assert_eq!(image.kind(), ImageKind::Gif);
        assert_eq!(image.skipped_frame_count(), 0);
        assert!((image.delay_time(0).unwrap() - 0.05).abs() < 1e-6);
    }

    #[test]
    fn poster_image_is_immediately_servable() {
        let bytes = two_frame_gif();
        let image = AnimatedImage::from_gif_bytes(&bytes, CacheConfig::default()).expect("decode");
        assert!(image.image_at(image.poster_image_index()).is_some());
    }

    #[test]
    fn rejects_invalid_bytes() {
        let err = AnimatedImage::from_gif_bytes(b"nope", CacheConfig::default()).unwrap_err();
        assert!(matches!(err, FlError::ContainerInvalid(_)));
    }
}
