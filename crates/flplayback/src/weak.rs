//! Weak Target Proxy (spec §4.E), realized per spec §9 alternative (c):
//! Rust has no implicit retain cycle between a repeating timer and its
//! target, so no proxy object is needed when the engine is polled directly
//! (`PlaybackEngine::tick`). `WeakImageHandle` is provided for embedders
//! that do want a callback-style tick source (e.g. a GUI toolkit's display
//! link) without forcing the image to outlive the view that owns it,
//! grounded directly on the original's `FLWeakProxy`.

use std::sync::{Arc, Weak};

use flcache::AnimatedImage;

/// A non-owning handle to an `AnimatedImage`, analogous to `FLWeakProxy`
/// forwarding to a weakly-held target: holding one never keeps the image
/// (or its decode worker thread) alive.
#[derive(Clone)]
pub struct WeakImageHandle {
    inner: Weak<AnimatedImage>,
}

impl WeakImageHandle {
    #[must_use]
    pub fn new(image: &Arc<AnimatedImage>) -> Self {
        Self { inner: Arc::downgrade(image) }
    }

    /// Upgrade to a strong reference, or `None` if the image has already
    /// been dropped.
    #[must_use]
    pub fn upgrade(&self) -> Option<Arc<AnimatedImage>> {
        self.inner.upgrade()
    }
}
