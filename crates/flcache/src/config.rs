/// Tunables for the Frame Cache's window sizing policy (spec §4.B, §6
/// "Configuration").
///
/// Held behind an `ArcSwap` so `capacity_max` can be adjusted at runtime
/// (mirroring the teacher's `Arc<ArcSwap<RenderConfig>>` pattern for
/// hot-swappable config) without the display thread ever taking a lock to
/// read it.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Hard cap on `capacity_current`; `0` means no user cap.
    pub capacity_max: usize,
    /// Total decoded-frame-bytes budget under which an image is "Low"
    /// tier and cached in full.
    pub small_budget_bytes: u64,
    /// Total decoded-frame-bytes budget under which an image is "Mid"
    /// tier (a small rolling window) rather than "High" (just-in-time).
    pub large_budget_bytes: u64,
    /// Window size used for the "Mid" tier.
    pub mid_default_window: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity_max: 0,
            small_budget_bytes: 10 * 1024 * 1024,
            large_budget_bytes: 100 * 1024 * 1024,
            mid_default_window: 5,
        }
    }
}

/// Which memory tier an image falls into, purely for observability; the
/// numeric window size is what `FrameCache` actually uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryTier {
    Low,
    Mid,
    High,
}

/// Compute `capacity_current` from the window-sizing policy (spec §4.B).
#[must_use]
pub fn tier_capacity(frame_count: usize, frame_bytes: u64, config: &CacheConfig) -> (usize, MemoryTier) {
    let total = frame_bytes.saturating_mul(frame_count as u64);
    let (tier_choice, tier) = if total <= config.small_budget_bytes {
        (frame_count, MemoryTier::Low)
    } else if total <= config.large_budget_bytes {
        (config.mid_default_window, MemoryTier::Mid)
    } else {
        (1, MemoryTier::High)
    };

    let capped = if config.capacity_max > 0 {
        tier_choice.min(config.capacity_max)
    } else {
        tier_choice
    };
    (capped.min(frame_count.max(1)).max(1), tier)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_tier_caches_everything() {
        let config = CacheConfig::default();
        let (cap, tier) = tier_capacity(10, 400, &config);
        assert_eq!(cap, 10);
        assert_eq!(tier, MemoryTier::Low);
    }

    #[test]
    fn high_tier_is_just_in_time() {
        let config = CacheConfig { large_budget_bytes: 1_000, ..CacheConfig::default() };
        let (cap, tier) = tier_capacity(100, 1_000_000, &config);
        assert_eq!(cap, 1);
        assert_eq!(tier, MemoryTier::High);
    }

    #[test]
    fn capacity_max_caps_any_tier() {
        let config = CacheConfig { capacity_max: 2, ..CacheConfig::default() };
        let (cap, _) = tier_capacity(10, 400, &config);
        assert_eq!(cap, 2);
    }
}
