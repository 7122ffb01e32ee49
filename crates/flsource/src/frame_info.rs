use flcore::Rect;

/// Per-frame metadata for animated WebP (spec §3 "FrameInfo (WebP only)").
///
/// GIF-only sources never construct one of these; the GIF data source
/// reports `requires_blending() == false` unconditionally instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Sub-rectangle of the canvas this frame covers.
    pub frame_rect: Rect,
    /// If true, this frame is replaced with blank space once the next
    /// frame is rendered (WebP `ANMF` disposal method).
    pub dispose_to_background: bool,
    /// If true, transparent portions of this frame are rendered on top of
    /// the previous frame rather than replacing it outright.
    pub blend_with_previous: bool,
    /// Whether the frame carries an alpha channel.
    pub has_alpha: bool,
}
