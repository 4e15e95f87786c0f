//! Frame entries: load status, decoded pixel data and frame errors
//!
//! **Why**: The cache needs an explicit status per frame index so "never touched"
//! and "in flight" are distinguishable, and decoded pixels only exist for
//! frames that actually finished loading.
//!
//! **Used by**: FrameCache (status machine), Prefetcher (fetch procedure),
//! Flipbook::play (render path)
//!
//! # Status machine
//!
//! ```text
//! Empty ──mark_pending──> Pending ──mark_ready──> Ready
//!   ^                        │
//!   │                        └──mark_failed──> Failed ──mark_pending──> Pending
//! ```
//!
//! # Pixel format
//!
//! Always 8-bit RGBA, `width * height * 4` bytes, row-major, no padding.

use std::fmt;
use std::sync::Arc;

/// Frame loading status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameStatus {
    /// Never attempted
    #[default]
    Empty,
    /// Fetch in flight
    Pending,
    /// Decoded data present
    Ready,
    /// Fetch or decode errored
    Failed,
}

impl fmt::Display for FrameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FrameStatus::Empty => "Empty",
            FrameStatus::Pending => "Pending",
            FrameStatus::Ready => "Ready",
            FrameStatus::Failed => "Failed",
        };
        f.write_str(name)
    }
}

/// Decoded RGBA8 pixel buffer extracted from a scratch surface
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameData {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl FrameData {
    /// Wrap an RGBA8 buffer. Returns None if the length doesn't match `width * height * 4`.
    pub fn from_rgba8(width: u32, height: u32, pixels: Vec<u8>) -> Option<Self> {
        if pixels.len() != width as usize * height as usize * 4 {
            return None;
        }
        Some(Self { width, height, pixels })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA8 bytes
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// RGBA value at (x, y), None outside the buffer
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let px = &self.pixels[offset..offset + 4];
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Memory size in bytes
    pub fn mem(&self) -> usize {
        self.pixels.len()
    }

    /// Convert into an `image` buffer (for writing to disk)
    pub fn to_image(&self) -> image::RgbaImage {
        // Length is validated at construction, so this can't fail.
        image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone())
            .unwrap_or_else(|| image::RgbaImage::new(self.width, self.height))
    }
}

/// Snapshot of one cache entry.
///
/// `data` is `Some` iff `status == Ready`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameEntry {
    pub index: usize,
    pub status: FrameStatus,
    pub data: Option<Arc<FrameData>>,
}

impl FrameEntry {
    pub fn is_ready(&self) -> bool {
        self.status == FrameStatus::Ready
    }
}

/// Opaque source reference resolved from a frame index (path or URL)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator(String);

impl Locator {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Locator {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Locator {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Frame loading errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Index outside `[1, total]`
    OutOfRange { index: usize, total: usize },
    /// Status change not allowed from the current state
    InvalidTransition {
        index: usize,
        from: FrameStatus,
        to: FrameStatus,
    },
    /// Decode collaborator rejected the locator
    Decode(String),
    /// Frame exists but has no data yet
    NotReady(usize),
    /// Bad construction parameters
    InvalidConfig(String),
    /// Worker threads could not be started
    Workers(String),
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::OutOfRange { index, total } => {
                write!(f, "Frame #{} out of range [1, {}]", index, total)
            }
            FrameError::InvalidTransition { index, from, to } => {
                write!(f, "Frame #{}: invalid transition {} -> {}", index, from, to)
            }
            FrameError::Decode(e) => write!(f, "Decode error: {}", e),
            FrameError::NotReady(index) => write!(f, "Frame #{} not ready", index),
            FrameError::InvalidConfig(e) => write!(f, "Invalid config: {}", e),
            FrameError::Workers(e) => write!(f, "Worker pool error: {}", e),
        }
    }
}

impl std::error::Error for FrameError {}

impl From<image::ImageError> for FrameError {
    fn from(e: image::ImageError) -> Self {
        FrameError::Decode(e.to_string())
    }
}
