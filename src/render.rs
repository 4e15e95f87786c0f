//! Rendering surfaces usable without a GUI
//!
//! - `NullTarget` counts draws and keeps the last frame (headless playback, tests)
//! - `PngDumpTarget` writes every drawn frame to `<dir>/play_00001.png`, ...

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use crate::entities::{FrameData, RenderTarget};

/// Discards pixels, remembers what was drawn
#[derive(Debug, Default)]
pub struct NullTarget {
    draws: AtomicUsize,
    last: Mutex<Option<(Arc<FrameData>, u32, u32)>>,
}

impl NullTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of draw calls so far
    pub fn draws(&self) -> usize {
        self.draws.load(Ordering::Relaxed)
    }

    /// Last drawn frame and its position
    pub fn last(&self) -> Option<(Arc<FrameData>, u32, u32)> {
        self.last.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl RenderTarget for NullTarget {
    fn draw(&self, frame: &FrameData, x: u32, y: u32) {
        self.draws.fetch_add(1, Ordering::Relaxed);
        *self.last.lock().unwrap_or_else(|e| e.into_inner()) = Some((Arc::new(frame.clone()), x, y));
    }
}

/// Writes drawn frames as numbered PNGs
#[derive(Debug)]
pub struct PngDumpTarget {
    dir: PathBuf,
    counter: AtomicUsize,
}

impl PngDumpTarget {
    /// Creates `dir` if needed
    pub fn new(dir: impl Into<PathBuf>) -> std::io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            counter: AtomicUsize::new(0),
        })
    }

    /// Number of frames written
    pub fn written(&self) -> usize {
        self.counter.load(Ordering::Relaxed)
    }
}

impl RenderTarget for PngDumpTarget {
    fn draw(&self, frame: &FrameData, _x: u32, _y: u32) {
        let n = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        let path = self.dir.join(format!("play_{:05}.png", n));
        match frame.to_image().save(&path) {
            Ok(()) => debug!("Wrote {}", path.display()),
            Err(e) => warn!("Failed to write {}: {}", path.display(), e),
        }
    }
}
