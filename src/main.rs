use flipbook::cli::Args;
use flipbook::config::{self, FlipbookOptions, PathConfig};
use flipbook::entities::{ProgressSink, RenderTarget};
use flipbook::progress::TerminalProgress;
use flipbook::render::{NullTarget, PngDumpTarget};
use flipbook::utils::resolve_sequence;
use flipbook::{Flipbook, PlayOutcome, UrlPolicy};

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn init_logging(args: &Args, path_config: &PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .as_ref()
            .cloned()
            .unwrap_or_else(|| config::config_file("flipbook.log", path_config));

        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file: {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging (respects RUST_LOG if set)
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let path_config = PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = config::ensure_dirs(&path_config) {
        eprintln!("Warning: {:#}", e);
    }

    init_logging(&args, &path_config)?;
    debug!("Command-line args: {:?}", args);

    let mut options = FlipbookOptions::load_or_default(&path_config)?;
    args.apply(&mut options);

    let (pattern, total) = resolve_sequence(&args.pattern, args.start, args.frames)
        .with_context(|| format!("Cannot resolve sequence '{}'", args.pattern))?;

    // Frame size defaults to the first frame's header
    let (width, height) = match (args.width, args.height) {
        (Some(w), Some(h)) => (w, h),
        (w, h) => {
            let first = pattern.locate(1);
            let (fw, fh) = image::image_dimensions(first.as_str())
                .with_context(|| format!("Cannot read size of first frame {}", first))?;
            (w.unwrap_or(fw), h.unwrap_or(fh))
        }
    };

    info!(
        "Sequence: {} frames from #{} ({}x{}), options {:?}",
        total,
        pattern.start(),
        width,
        height,
        options
    );

    let target: Arc<dyn RenderTarget> = match &args.dump_dir {
        Some(dir) => Arc::new(
            PngDumpTarget::new(dir)
                .with_context(|| format!("Cannot create dump directory {}", dir.display()))?,
        ),
        None => Arc::new(NullTarget::new()),
    };

    let bar = (!args.no_progress).then(|| Arc::new(TerminalProgress::new()));

    let mut builder = Flipbook::builder(total, width, height, pattern)
        .target(target)
        .options(options);
    if let Some(bar) = &bar {
        builder = builder.progress_sink(Arc::clone(bar) as Arc<dyn ProgressSink>);
    }
    let book = Arc::new(builder.build()?);

    let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
    let started = Instant::now();
    let handle = book.spawn_run(move || {
        let _ = ready_tx.send(());
    })?;

    if ready_rx.recv().is_ok() {
        info!("Critical path ready after {:?}", started.elapsed());
    }

    if args.play {
        let fps = if args.fps > 0.0 { args.fps } else { 24.0 };
        let frame_time = Duration::from_secs_f32(1.0 / fps);
        let mut missed = 0usize;

        for frame_idx in 1..=total {
            let tick = Instant::now();
            if book.play(frame_idx)? == PlayOutcome::NotAvailable {
                missed += 1;
            }
            if let Some(rest) = frame_time.checked_sub(tick.elapsed()) {
                std::thread::sleep(rest);
            }
        }
        let stats = book.cache().stats();
        info!(
            "Playback done: {} of {} frames missing (cache hits {}, misses {}, hit rate {:.1}%)",
            missed,
            total,
            stats.hits(),
            stats.misses(),
            stats.hit_rate() * 100.0
        );
    }

    let summary = handle
        .join()
        .map_err(|_| anyhow::anyhow!("Scheduler thread panicked"))?;

    if let Some(bar) = &bar {
        if summary.percent < 100 {
            bar.abandon(&format!("{} frames failed", book.counts().failed));
        }
    }

    println!(
        "Loaded {}/{} frames ({}%), {} failed, in {:.2?}",
        book.progress().ready,
        total,
        summary.percent,
        summary.failed,
        summary.elapsed
    );

    if book.progress().ready == 0 {
        bail!("No frames could be loaded");
    }
    if summary.failed > 0 {
        warn!("{} frames failed to load", summary.failed);
    }

    Ok(())
}
