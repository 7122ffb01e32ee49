use std::time::Duration;

/// Optional observers of internal cache/playback state (spec §4, §9
/// "Debug delegates"). Purely observational: implementations must not
/// influence timing or cache decisions other than via
/// `predraw_slowdown_factor`, which the decode worker honors to simulate
/// slow hardware in tests.
pub trait DebugDelegate: Send + Sync {
    /// Called after a background decode inserts a frame, with the full
    /// current set of cached indices.
    fn did_update_cached_frames(&self, _indices: &[usize]) {}

    /// Called on every `image_at`/`get` with the requested index.
    fn did_request_cached_frame(&self, _index: usize) {}

    /// Artificial slowdown applied to decode latency, for testing.
    /// Clamped to `>= 1.0` by the caller.
    fn predraw_slowdown_factor(&self) -> f32 {
        1.0
    }

    /// Called by the playback engine when a tick observes a cache miss and
    /// enters the Waiting state.
    fn waiting_for_frame(&self, _index: usize, _duration: Duration) {}
}
