//! The Frame Cache (spec §4.B) — the heart of the system.
//!
//! `get`/`image_at` is served synchronously and non-blockingly from the
//! display thread; all decode work happens on a single serial worker
//! thread, grounded on the teacher's "spawn a thread, hand back a channel"
//! pattern (`af-audio::state::spawn_audio_thread`,
//! `af-source::video::spawn_video_thread`), swapping `flume` for the
//! channel the worker's job queue is drained from.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use flsource::{DecodedFrame, FrameDataSource};
use parking_lot::Mutex;

use crate::config::{tier_capacity, CacheConfig};
use crate::debug::DebugDelegate;

struct CacheState {
    cached_frames: HashMap<usize, DecodedFrame>,
    requested_frames: HashSet<usize>,
    most_recently_requested_index: usize,
}

struct Shared {
    data_source: Arc<dyn FrameDataSource>,
    frame_count: usize,
    frame_bytes: u64,
    poster_image: DecodedFrame,
    poster_index: usize,
    capacity_current: AtomicUsize,
    pressured: AtomicBool,
    config: ArcSwap<CacheConfig>,
    state: Mutex<CacheState>,
    debug: Mutex<Option<Arc<dyn DebugDelegate>>>,
}

/// Parameters needed to construct a `FrameCache`, mirroring
/// `FLAnimatedImageFrameCache`'s designated initializer (spec §4.B).
pub struct FrameCacheParams {
    pub frame_count: usize,
    pub frame_bytes: u64,
    pub poster_image: DecodedFrame,
    pub poster_index: usize,
    pub data_source: Arc<dyn FrameDataSource>,
    pub config: CacheConfig,
}

/// Bounded, predictive cache over a finite ordered frame sequence (spec
/// §3, §4.B).
pub struct FrameCache {
    shared: Arc<Shared>,
    job_tx: flume::Sender<usize>,
}

impl FrameCache {
    #[must_use]
    pub fn new(params: FrameCacheParams) -> Self {
        let (capacity_current, _tier) =
            tier_capacity(params.frame_count, params.frame_bytes, &params.config);

        let shared = Arc::new(Shared {
            data_source: params.data_source,
            frame_count: params.frame_count,
            frame_bytes: params.frame_bytes,
            poster_image: params.poster_image,
            poster_index: params.poster_index,
            capacity_current: AtomicUsize::new(capacity_current),
            pressured: AtomicBool::new(false),
            config: ArcSwap::from_pointee(params.config),
            state: Mutex::new(CacheState {
                cached_frames: HashMap::new(),
                requested_frames: HashSet::new(),
                most_recently_requested_index: params.poster_index,
            }),
            debug: Mutex::new(None),
        });

        let (job_tx, job_rx) = flume::unbounded::<usize>();
        spawn_decode_worker(Arc::clone(&shared), job_rx);

        Self { shared, job_tx }
    }

    /// Attach (or detach with `None`) a debug observer.
    pub fn set_debug_delegate(&self, delegate: Option<Arc<dyn DebugDelegate>>) {
        *self.shared.debug.lock() = delegate;
    }

    #[must_use]
    pub fn capacity_current(&self) -> usize {
        self.shared.capacity_current.load(Ordering::Acquire)
    }

    pub fn set_config(&self, config: CacheConfig) {
        self.shared.config.store(Arc::new(config));
        // Per spec §4.B: a capacity change takes effect on the *next*
        // `get`, not immediately — so we don't recompute here.
    }

    #[must_use]
    pub fn poster_image(&self) -> DecodedFrame {
        self.shared.poster_image.clone()
    }

    /// Serve `get(index)` (spec §4.B "Responsibilities" #1): O(1),
    /// non-blocking, and triggers the predictive window advance as a
    /// side effect (#2).
    #[must_use]
    pub fn get(&self, index: usize) -> Option<DecodedFrame> {
        if let Some(delegate) = self.shared.debug.lock().as_ref() {
            delegate.did_request_cached_frame(index);
        }

        {
            let mut state = self.shared.state.lock();
            state.most_recently_requested_index = index;
        }

        if index == self.shared.poster_index {
            self.advance_window(index);
            return Some(self.shared.poster_image.clone());
        }

        let hit = self.shared.state.lock().cached_frames.get(&index).cloned();
        self.advance_window(index);
        hit
    }

    /// Memory-pressure signal (spec §5): downgrade the window to
    /// just-in-time immediately, evict down to the retention set, and
    /// mark "pressured" until the next loop boundary.
    pub fn on_memory_pressure(&self) {
        self.shared.capacity_current.store(1, Ordering::Release);
        self.shared.pressured.store(true, Ordering::Release);
        let index = self.shared.state.lock().most_recently_requested_index;
        self.advance_window(index);
    }

    /// Called by the playback engine when a loop boundary is crossed.
    /// Restores the tier-computed window size if a memory-pressure event
    /// downgraded it mid-loop.
    pub fn on_loop_boundary(&self) {
        if self.shared.pressured.swap(false, Ordering::AcqRel) {
            let config = self.shared.config.load();
            let (capacity, _tier) =
                tier_capacity(self.shared.frame_count, self.shared.frame_bytes, &config);
            self.shared.capacity_current.store(capacity, Ordering::Release);
        }
    }

    /// Prefetch + eviction (spec §4.B steps 5-6), run as a side effect of
    /// every `get`.
    fn advance_window(&self, index: usize) {
        let shared = &self.shared;
        let frame_count = shared.frame_count;
        if frame_count == 0 {
            return;
        }
        let capacity = shared.capacity_current.load(Ordering::Acquire).max(1);

        let window: Vec<usize> = (1..capacity).map(|k| (index + k) % frame_count).collect();

        let mut state = shared.state.lock();

        // The requested index itself must also be scheduled when missing:
        // this is the *only* enqueue path when `capacity == 1` (the "High"
        // memory tier / just-in-time window, and what memory pressure
        // forces), since the forward window `1..capacity` is empty there
        // and nothing else would ever feed the decode worker.
        for &j in std::iter::once(&index).chain(window.iter()) {
            if j == shared.poster_index {
                continue;
            }
            if !state.cached_frames.contains_key(&j) && !state.requested_frames.contains(&j) {
                state.requested_frames.insert(j);
                // Serial queue: ordering matters for WebP blend chains.
                let _ = self.job_tx.send(j);
            }
        }

        let mut retain: HashSet<usize> = window.into_iter().collect();
        retain.insert(index);

        // Evict every cached index outside the retention set `R` (spec
        // §4.B step 6), not merely until the count drops to `capacity` —
        // a stale out-of-window frame must not survive just because the
        // map already happens to be small enough (e.g. right after a
        // memory-pressure capacity drop).
        let evictable: Vec<usize> = state
            .cached_frames
            .keys()
            .copied()
            .filter(|idx| !retain.contains(idx))
            .collect();
        for idx in evictable {
            state.cached_frames.remove(&idx);
        }
    }
}

fn spawn_decode_worker(shared: Arc<Shared>, job_rx: flume::Receiver<usize>) {
    std::thread::spawn(move || {
        while let Ok(index) = job_rx.recv() {
            decode_and_insert(&shared, index);
        }
        log::trace!("decode worker exiting: job channel closed");
    });
}

fn decode_and_insert(shared: &Arc<Shared>, index: usize) {
    let needs_blend = shared.data_source.requires_blending(index);

    let start = Instant::now();
    let result = if needs_blend {
        resolve_blended(shared, index)
    } else {
        shared.data_source.decode(index)
    };
    apply_predraw_slowdown(shared, start.elapsed());

    shared.state.lock().requested_frames.remove(&index);

    match result {
        Ok(frame) => {
            let keys = {
                let mut state = shared.state.lock();
                state.cached_frames.insert(index, frame);
                state.cached_frames.keys().copied().collect::<Vec<_>>()
            };
            if let Some(delegate) = shared.debug.lock().as_ref() {
                delegate.did_update_cached_frames(&keys);
            }
        }
        Err(err) => {
            // Frame decode failures are never surfaced to the playback
            // caller (spec §7): the index just stays uncached and is
            // re-enterable on the next prefetch cycle.
            log::debug!("frame {index} decode discarded: {err}");
        }
    }
}

/// Walk backward from `index` to the nearest resident frame or the poster,
/// then decode+blend forward through the chain (spec §4.B "When a
/// background decode of index j completes").
fn resolve_blended(shared: &Arc<Shared>, index: usize) -> Result<DecodedFrame, flcore::FlError> {
    let mut chain = vec![index];
    let mut cursor = index;

    let mut base = loop {
        if cursor == 0 || cursor - 1 == shared.poster_index {
            break shared.poster_image.clone();
        }
        let prev = cursor - 1;
        if let Some(frame) = shared.state.lock().cached_frames.get(&prev).cloned() {
            break frame;
        }
        chain.push(prev);
        cursor = prev;
    };

    for &idx in chain.iter().rev() {
        let raw = shared.data_source.decode(idx)?;
        base = if shared.data_source.requires_blending(idx) {
            shared.data_source.blend(&raw, &base, idx)
        } else {
            raw
        };
        if idx != index {
            shared.state.lock().cached_frames.insert(idx, base.clone());
        }
    }

    Ok(base)
}

fn apply_predraw_slowdown(shared: &Arc<Shared>, decode_time: std::time::Duration) {
    let factor = shared
        .debug
        .lock()
        .as_ref()
        .map_or(1.0, |d| d.predraw_slowdown_factor().max(1.0));
    if factor > 1.0 {
        std::thread::sleep(decode_time.mul_f32(factor - 1.0));
    }
}
