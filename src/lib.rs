//! FLIPBOOK - progressive image-sequence loader
//!
//! Fetches a numbered sequence of frames into an in-memory cache in priority
//! order (first, last, middle, then a coarse-to-fine sweep) so playback can
//! start after three frames while the rest stream in the background.

// Core engine (cache, scheduler, workers, controller)
pub mod core;

// Frame types and collaborator traits
pub mod entities;

// App modules
pub mod cli;
pub mod config;
pub mod progress;
pub mod render;
pub mod utils;

// Re-export commonly used types
pub use config::FlipbookOptions;
pub use self::core::{Flipbook, FlipbookBuilder, FrameCache, PlayOutcome, Progress, RunSummary};
pub use entities::{
    FrameData, FrameDecoder, FrameEntry, FrameError, FrameStatus, ImageFileDecoder, Locator,
    ProgressSink, RenderTarget, UrlPolicy,
};
pub use utils::SequencePattern;
