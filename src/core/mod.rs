//! Core engine modules - frame cache, scheduler, workers, controller
//!
//! These modules form the loading engine, independent of any display.

pub mod frame_cache;
pub mod player;
pub mod prefetch;
pub mod workers;

// Re-exports for convenience
pub use frame_cache::{FrameCache, Progress, StatusCounts};
pub use player::{Flipbook, FlipbookBuilder, PlayOutcome};
pub use prefetch::{FetchOutcome, Prefetcher, RunSummary};
pub use workers::Workers;
