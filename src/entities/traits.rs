//! Abstract traits for the flipbook's external collaborators.
//!
//! These traits define what the cache and scheduler need from the outside
//! world (where frames live, how they decode, where they get drawn, who shows
//! progress), so `core` never depends on a concrete backend.
//!
//! Default implementations live in `entities::loader`, `utils::sequences`,
//! `core::player` and `progress`.

use std::sync::Arc;

use image::RgbaImage;

use super::frame::{FrameData, FrameError, Locator};

/// URL-generation policy: frame index -> locator.
///
/// Must be pure and total over `[1, total_frames]`.
pub trait UrlPolicy: Send + Sync {
    fn locate(&self, frame_idx: usize) -> Locator;
}

/// Any `Fn(usize) -> String` is a URL policy.
impl<F> UrlPolicy for F
where
    F: Fn(usize) -> String + Send + Sync,
{
    fn locate(&self, frame_idx: usize) -> Locator {
        Locator::new(self(frame_idx))
    }
}

/// Image-decode service: locator -> decoded RGBA image.
///
/// Called from worker threads in parallel mode. Failure must come back as
/// `Err`, never as an empty image.
pub trait FrameDecoder: Send + Sync {
    fn decode(&self, locator: &Locator) -> Result<RgbaImage, FrameError>;
}

/// Rendering surface. Write-only.
pub trait RenderTarget: Send + Sync {
    /// Paint `frame` with its top-left corner at (x, y).
    fn draw(&self, frame: &FrameData, x: u32, y: u32);
}

/// Optional load-percentage display.
pub trait ProgressSink: Send + Sync {
    /// Percentage changed (0..=100).
    fn set_percent(&self, percent: u8);

    /// Called once when percentage reaches exactly 100.
    fn hide(&self) {}
}

/// Abstract worker pool interface.
///
/// Lets the scheduler dispatch fetches without knowing the concrete
/// thread pool implementation.
pub trait WorkerPool: Send + Sync {
    /// Execute closure on a worker thread. No return value; report back via channels.
    fn execute(&self, f: Box<dyn FnOnce() + Send + 'static>);

    /// Maximum number of jobs running at once.
    fn concurrency(&self) -> usize;
}

/// Blanket impls: Arc<T> implements traits if T does
impl<T: FrameDecoder + ?Sized> FrameDecoder for Arc<T> {
    fn decode(&self, locator: &Locator) -> Result<RgbaImage, FrameError> {
        (**self).decode(locator)
    }
}

impl<T: RenderTarget + ?Sized> RenderTarget for Arc<T> {
    fn draw(&self, frame: &FrameData, x: u32, y: u32) {
        (**self).draw(frame, x, y)
    }
}

impl<T: ProgressSink + ?Sized> ProgressSink for Arc<T> {
    fn set_percent(&self, percent: u8) {
        (**self).set_percent(percent)
    }

    fn hide(&self) {
        (**self).hide()
    }
}

impl<T: WorkerPool + ?Sized> WorkerPool for Arc<T> {
    fn execute(&self, f: Box<dyn FnOnce() + Send + 'static>) {
        (**self).execute(f)
    }

    fn concurrency(&self) -> usize {
        (**self).concurrency()
    }
}
