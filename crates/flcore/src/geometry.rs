/// Canvas or frame dimensions, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Bytes needed for one RGBA8 frame of this size.
    ///
    /// # Example
    /// ```
    /// use flcore::Size;
    /// assert_eq!(Size::new(10, 10).frame_bytes(), 400);
    /// ```
    #[must_use]
    pub fn frame_bytes(self) -> u64 {
        4 * u64::from(self.width) * u64::from(self.height)
    }
}

/// A sub-rectangle of the canvas, used by WebP frames which may only cover
/// part of the full image (§3, `FrameInfo.frame_rect`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    #[must_use]
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    #[must_use]
    pub fn full(size: Size) -> Self {
        Self { x: 0, y: 0, width: size.width, height: size.height }
    }
}
