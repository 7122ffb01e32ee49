//! Minimal CLI that loads a GIF/WebP file, ticks a simulated display clock,
//! and prints frame indices as they become current.
//!
//! This exists only to exercise `flcache`/`flplayback` end to end; per
//! spec §1 a full CLI/demo shell is out of scope for the core, so this
//! binary stays thin: argument parsing and a print loop, no new policy.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use flcache::{AnimatedImage, CacheConfig};
use flcore::ImageKind;
use flplayback::PlaybackEngine;

/// Play an animated GIF or WebP through the flanim frame cache, printing
/// each frame index as the playback engine advances to it.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path to a GIF or WebP file.
    path: PathBuf,

    /// Force the container kind instead of sniffing the extension.
    #[arg(long, value_enum)]
    kind: Option<Kind>,

    /// How many seconds of simulated playback to run.
    #[arg(long, default_value_t = 3.0)]
    seconds: f64,

    /// Simulated display refresh rate, in Hz.
    #[arg(long, default_value_t = 60.0)]
    fps: f64,

    /// Hard cap on the cache window, in frames (0 = unlimited).
    #[arg(long, default_value_t = 0)]
    capacity_max: usize,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum Kind {
    Gif,
    Webp,
}

fn sniff_kind(path: &PathBuf) -> anyhow::Result<Kind> {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("gif") => Ok(Kind::Gif),
        Some(ext) if ext.eq_ignore_ascii_case("webp") => Ok(Kind::Webp),
        _ => anyhow::bail!("cannot infer container kind from {path:?}; pass --kind"),
    }
}

fn main() -> anyhow::Result<()> {
    flcore::log::init_logging();
    let args = Args::parse();

    let kind = match args.kind {
        Some(kind) => kind,
        None => sniff_kind(&args.path)?,
    };

    let data = std::fs::read(&args.path)
        .with_context(|| format!("reading {}", args.path.display()))?;

    let config = CacheConfig { capacity_max: args.capacity_max, ..CacheConfig::default() };
    let image = match kind {
        Kind::Gif => AnimatedImage::from_gif_bytes(&data, config),
        Kind::Webp => AnimatedImage::from_webp_bytes(&data, config),
    }
    .with_context(|| format!("decoding {}", args.path.display()))?;

    let reported_kind = match image.kind() {
        ImageKind::Gif => "gif",
        ImageKind::WebP => "webp",
    };
    log::info!(
        "loaded {} frames ({reported_kind}, {}x{}, loop_count={})",
        image.frame_count(),
        image.size().width,
        image.size().height,
        image.loop_count(),
    );

    let image = Arc::new(image);
    let mut engine = PlaybackEngine::new(Arc::clone(&image));
    engine.set_loop_completion(|remaining| log::info!("loop completed, remaining={remaining:?}"));
    engine.play();

    let dt = Duration::from_secs_f64(1.0 / args.fps);
    let ticks = (args.seconds * args.fps) as u64;
    let mut last_printed = usize::MAX;

    for _ in 0..ticks {
        engine.tick(dt);
        let current = engine.current_frame_index();
        if current != last_printed {
            println!("frame {current}");
            last_printed = current;
        }
        if engine.is_finished() {
            break;
        }
        std::thread::sleep(dt);
    }

    Ok(())
}
