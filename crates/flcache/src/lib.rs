//! The Frame Cache layer (spec §4.B, §4.C): a bounded, predictive cache
//! over a decoded animated image's frame sequence, plus the `AnimatedImage`
//! type that owns it.

pub mod cache;
pub mod config;
pub mod debug;
pub mod image;

pub use cache::{FrameCache, FrameCacheParams};
pub use config::{tier_capacity, CacheConfig, MemoryTier};
pub use debug::DebugDelegate;
pub use image::AnimatedImage;
