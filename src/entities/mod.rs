//! Entities module - frame types and collaborator interfaces
//!
//! Everything here is independent of scheduling: what a frame is, how it is
//! decoded and extracted, and the traits the engine talks to.

pub mod frame;
pub mod loader;
pub mod surface;
pub mod traits;

pub use frame::{FrameData, FrameEntry, FrameError, FrameStatus, Locator};
pub use loader::ImageFileDecoder;
pub use surface::{Surface, SurfaceGuard, SurfacePool};
pub use traits::{FrameDecoder, ProgressSink, RenderTarget, UrlPolicy, WorkerPool};
