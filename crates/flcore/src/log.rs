//! Thin wrapper around `env_logger` so embedders get consistent defaults
//! without each crate in the workspace re-deriving its own init logic.

/// Initialize `env_logger` with a sensible default filter
/// (`info` for this workspace's crates, `warn` for everything else) unless
/// `RUST_LOG` is already set.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[cfg(feature = "logging-init")]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn,flcore=info,flsource=info,flcache=info,flplayback=info"),
    )
    .is_test(cfg!(test))
    .try_init();
}
