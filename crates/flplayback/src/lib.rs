//! The Playback Engine (spec §4.D) and its weak-target realization
//! (spec §4.E): drives a frame cursor across an `AnimatedImage` at its own
//! delay timing, polled by whatever owns the display-refresh loop.

pub mod engine;
pub mod weak;

pub use engine::{PlaybackEngine, TickMode};
pub use weak::WeakImageHandle;
