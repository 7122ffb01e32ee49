//! The Playback Engine tick state machine (spec §4.D).
//!
//! Grounded on the teacher's display-thread-owns-everything model
//! (`af-app/src/pipeline.rs`'s frame-clock loop): all mutable playback
//! state here is only ever touched from whichever thread calls `tick`.

use std::sync::Arc;
use std::time::Duration;

use flcache::{AnimatedImage, DebugDelegate};
use flcore::LoopsRemaining;
use flsource::DecodedFrame;

/// Which run-loop mode the embedder's display-refresh tick source should
/// use (spec.md §6 "Configuration: Run-loop/tick mode selector"; original
/// `FLAnimatedImageView.runLoopMode`). The Rust core has no run loop of its
/// own — this is forwarded to the embedder's tick source as a hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickMode {
    #[default]
    Default,
    /// Keeps ticking during scroll/interaction-tracking loops.
    Common,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Playing,
    Paused,
    /// A required frame was missed; the cursor is frozen until it arrives.
    Waiting,
    Finished,
}

/// Drives a `current_frame_index` cursor across one `AnimatedImage`'s
/// frames at its own delay timing (spec §4.D).
pub struct PlaybackEngine {
    image: Arc<AnimatedImage>,
    current_frame_index: usize,
    current_frame: DecodedFrame,
    accumulator: f64,
    loops_remaining: LoopsRemaining,
    state: State,
    tick_mode: TickMode,
    debug: Option<Arc<dyn DebugDelegate>>,
    loop_completion: Option<Box<dyn Fn(LoopsRemaining) + Send + Sync>>,
    /// Set when a wrap-to-poster boundary has already been decremented and
    /// notified for the transition currently being retried, so a miss that
    /// lands exactly on that boundary doesn't re-fire the loop-completion
    /// callback on every subsequent retry tick. Cleared once the frame is
    /// actually obtained and the cursor advances.
    loop_boundary_pending: bool,
}

impl PlaybackEngine {
    #[must_use]
    pub fn new(image: Arc<AnimatedImage>) -> Self {
        let current_frame_index = image.poster_image_index();
        let current_frame = image.poster_image();
        let loops_remaining = LoopsRemaining::from_loop_count(image.loop_count());
        Self {
            image,
            current_frame_index,
            current_frame,
            accumulator: 0.0,
            loops_remaining,
            state: State::Paused,
            tick_mode: TickMode::default(),
            debug: None,
            loop_completion: None,
            loop_boundary_pending: false,
        }
    }

    /// Replace the driven image: resets the cursor to the new image's
    /// poster frame and clears accumulated time (spec §4.D "any assignment
    /// replaces the image, resets cursor to poster_image_index").
    pub fn set_image(&mut self, image: Arc<AnimatedImage>) {
        self.current_frame_index = image.poster_image_index();
        self.current_frame = image.poster_image();
        self.loops_remaining = LoopsRemaining::from_loop_count(image.loop_count());
        self.accumulator = 0.0;
        self.state = State::Paused;
        self.loop_boundary_pending = false;
        self.image = image;
    }

    pub fn set_debug_delegate(&mut self, delegate: Option<Arc<dyn DebugDelegate>>) {
        self.debug = delegate;
    }

    pub fn set_loop_completion<F>(&mut self, callback: F)
    where
        F: Fn(LoopsRemaining) + Send + Sync + 'static,
    {
        self.loop_completion = Some(Box::new(callback));
    }

    pub fn set_tick_mode(&mut self, mode: TickMode) {
        self.tick_mode = mode;
    }

    #[must_use]
    pub fn tick_mode(&self) -> TickMode {
        self.tick_mode
    }

    #[must_use]
    pub fn current_frame_index(&self) -> usize {
        self.current_frame_index
    }

    #[must_use]
    pub fn current_frame(&self) -> DecodedFrame {
        self.current_frame.clone()
    }

    #[must_use]
    pub fn is_animating(&self) -> bool {
        self.state == State::Playing
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state == State::Finished
    }

    /// Starts the tick source (spec §4.D). A no-op once `Finished`.
    pub fn play(&mut self) {
        if self.state != State::Finished {
            self.state = State::Playing;
        }
    }

    /// Stops the tick source, distinct from a detach (spec §4.D).
    pub fn pause(&mut self) {
        if self.state != State::Finished {
            self.state = State::Paused;
        }
    }

    /// External lifecycle teardown (e.g. leaving the view hierarchy):
    /// stops ticks like `pause`, but is a distinct call site so an embedder
    /// can tell the two apart (spec §4.D).
    pub fn detach(&mut self) {
        self.pause();
    }

    /// Resume after a detach with the preserved cursor; `accumulator` is
    /// reset to zero to avoid a resume jump (spec §4.D "Cancellation /
    /// teardown").
    pub fn reattach(&mut self) {
        self.accumulator = 0.0;
        self.play();
    }

    /// Advance the state machine by one display-refresh tick of length
    /// `dt` (spec §4.D "Tick state machine"). A no-op unless currently
    /// `Playing` or `Waiting` (a paused/finished engine never advances).
    pub fn tick(&mut self, dt: Duration) {
        if self.state == State::Paused || self.state == State::Finished {
            return;
        }

        let frame_count = self.image.frame_count();
        if frame_count == 0 {
            return;
        }

        self.accumulator += dt.as_secs_f64();

        loop {
            let Some(delay) = self.image.delay_time(self.current_frame_index) else {
                return;
            };
            // Waiting clamps the accumulator so a resolved miss cannot
            // burst-advance multiple frames at once.
            if self.accumulator >= delay && self.state == State::Waiting {
                self.accumulator = delay;
            }
            if self.accumulator < delay {
                break;
            }

            let next_index = (self.current_frame_index + 1) % frame_count;

            // Only decrement/notify once per actual wrap: a miss that lands
            // on this boundary re-enters this loop on every retry tick with
            // the same (unmoved) `current_frame_index`/`next_index`, so the
            // pending flag guards against re-counting the same boundary.
            if next_index == self.image.poster_image_index() && !self.loop_boundary_pending {
                self.loop_boundary_pending = true;
                let finished = self.loops_remaining.decrement();
                self.image.on_loop_boundary();
                if finished {
                    self.state = State::Finished;
                    if let Some(cb) = &self.loop_completion {
                        cb(self.loops_remaining);
                    }
                    return;
                }
                if let Some(cb) = &self.loop_completion {
                    cb(self.loops_remaining);
                }
            }

            let Some(frame) = self.image.image_at(next_index) else {
                self.state = State::Waiting;
                if let Some(delegate) = &self.debug {
                    delegate.waiting_for_frame(next_index, Duration::from_secs_f64(self.accumulator));
                }
                return;
            };

            self.loop_boundary_pending = false;
            self.current_frame_index = next_index;
            self.current_frame = frame;
            self.accumulator -= delay;
            self.state = State::Playing;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flcache::CacheConfig;
    use image::codecs::gif::GifEncoder;
    use image::{Delay, Frame, RgbaImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn gif_with_delays(delays_ms: &[u32]) -> Vec<u8> {
        let mut bytes = vec![];
        {
            let mut encoder = GifEncoder::new(&mut bytes);
            for &delay_ms in delays_ms {
                let buf = RgbaImage::from_pixel(2, 2, image::Rgba([9, 9, 9, 255]));
                let frame = Frame::from_parts(buf, 0, 0, Delay::from_numer_denom_ms(delay_ms, 1));
                encoder.encode_frame(frame).expect("encode frame");
            }
        }
        bytes
    }

    fn wait_until<F: Fn() -> bool>(pred: F) {
        for _ in 0..300 {
            if pred() {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn starts_paused_on_poster() {
        let bytes = gif_with_delays(&[100, 100, 100]);
        let image = Arc::new(AnimatedImage::from_gif_bytes(&bytes, CacheConfig::default()).unwrap());
        let engine = PlaybackEngine::new(Arc::clone(&image));
        assert!(!engine.is_animating());
        assert_eq!(engine.current_frame_index(), image.poster_image_index());
    }

    #[test]
    fn advances_one_step_per_elapsed_delay() {
        let bytes = gif_with_delays(&[40, 40, 40]);
        let image = Arc::new(AnimatedImage::from_gif_bytes(&bytes, CacheConfig::default()).unwrap());
        // Force every frame resident before ticking so misses never occur.
        wait_until(|| image.image_at(1).is_some() && image.image_at(2).is_some());

        let mut engine = PlaybackEngine::new(image);
        engine.play();
        engine.tick(Duration::from_millis(40));
        assert_eq!(engine.current_frame_index(), 1);
    }

    #[test]
    fn waiting_does_not_advance_cursor_or_consume_accumulator() {
        let bytes = gif_with_delays(&[10, 10, 10]);
        let image = Arc::new(AnimatedImage::from_gif_bytes(&bytes, CacheConfig::default()).unwrap());

        let mut engine = PlaybackEngine::new(image);
        engine.play();
        // Tick immediately, before the background decode of frame 1 has any
        // chance to complete: this should reliably produce a miss.
        engine.tick(Duration::from_millis(10));
        // Either it advanced (decode was fast) or it's waiting at frame 0;
        // the invariant under test is that a miss never leaves the cursor
        // on an uncached index.
        assert!(engine.current_frame_index() == 0 || engine.current_frame_index() == 1);
    }

    #[test]
    fn loop_completion_fires_exact_count_for_finite_loops() {
        let bytes = gif_with_delays(&[10, 10]);
        let image = Arc::new(AnimatedImage::from_gif_bytes(&bytes, CacheConfig::default()).unwrap());
        wait_until(|| image.image_at(1).is_some());

        // This backend's GIF path always reports loop_count = 0 (infinite);
        // exercise the finite-loop callback plumbing directly via a manual
        // override instead of relying on container-derived loop count.
        let mut engine = PlaybackEngine::new(image);
        engine.loops_remaining = LoopsRemaining::Finite(1);
        let fired = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(Mutex::new(LoopsRemaining::Finite(1)));
        {
            let fired = Arc::clone(&fired);
            let last = Arc::clone(&last);
            engine.set_loop_completion(move |remaining| {
                fired.fetch_add(1, Ordering::SeqCst);
                *last.lock().unwrap() = remaining;
            });
        }
        engine.play();
        for _ in 0..20 {
            engine.tick(Duration::from_millis(10));
        }
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(engine.is_finished());
    }

    #[test]
    fn pending_wrap_is_not_recounted_on_retry() {
        // Simulates a retry tick landing on a wrap-to-poster transition
        // that a previous tick already decremented/notified for (e.g. the
        // frame was not yet obtainable): the retry must not decrement
        // `loops_remaining` or re-fire `loop_completion` a second time.
        let bytes = gif_with_delays(&[10, 10]);
        let image = Arc::new(AnimatedImage::from_gif_bytes(&bytes, CacheConfig::default()).unwrap());
        wait_until(|| image.image_at(1).is_some());

        let mut engine = PlaybackEngine::new(image);
        engine.loops_remaining = LoopsRemaining::Finite(3);
        engine.current_frame_index = 1;
        engine.state = State::Waiting;
        engine.loop_boundary_pending = true;
        engine.accumulator = 0.010;

        let fired = Arc::new(AtomicUsize::new(0));
        {
            let fired = Arc::clone(&fired);
            engine.set_loop_completion(move |_| {
                fired.fetch_add(1, Ordering::SeqCst);
            });
        }

        engine.tick(Duration::from_millis(0));

        assert_eq!(fired.load(Ordering::SeqCst), 0, "already-pending wrap must not re-fire");
        assert_eq!(engine.loops_remaining, LoopsRemaining::Finite(3), "must not re-decrement");
        assert_eq!(engine.current_frame_index(), 0, "the pending wrap still resolves once obtainable");
    }

    #[test]
    fn reattach_resets_accumulator_without_jump() {
        let bytes = gif_with_delays(&[100, 100, 100]);
        let image = Arc::new(AnimatedImage::from_gif_bytes(&bytes, CacheConfig::default()).unwrap());
        wait_until(|| image.image_at(1).is_some());

        let mut engine = PlaybackEngine::new(image);
        engine.play();
        engine.tick(Duration::from_millis(60));
        let index_before = engine.current_frame_index();

        engine.detach();
        engine.reattach();
        // A tiny tick after reattach must not jump multiple frames even
        // though `accumulator` would otherwise have been close to `delay`.
        engine.tick(Duration::from_millis(1));
        assert_eq!(engine.current_frame_index(), index_before);
    }
}
