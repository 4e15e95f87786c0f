//! Frame cache: fixed-size indexed store with per-frame status machine
//!
//! Structure: Vec<Slot> indexed by `frame_idx - 1`
//! - O(1) lookup by 1-based frame index
//! - status and data live in one enum, so data exists iff status is Ready
//! - ready counter and percentage live under the same lock as the slots
//!
//! `mark_pending` is the only duplicate-fetch guard: it refuses frames that are
//! already Pending or Ready, so two workers can never load the same index.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, trace};

use crate::entities::{FrameData, FrameEntry, FrameError, FrameStatus, ProgressSink};

/// Slot storage. Pixel data only exists in `Ready`.
#[derive(Debug, Clone, Default)]
enum Slot {
    #[default]
    Empty,
    Pending,
    Ready(Arc<FrameData>),
    Failed,
}

impl Slot {
    fn status(&self) -> FrameStatus {
        match self {
            Slot::Empty => FrameStatus::Empty,
            Slot::Pending => FrameStatus::Pending,
            Slot::Ready(_) => FrameStatus::Ready,
            Slot::Failed => FrameStatus::Failed,
        }
    }
}

/// Load progress snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub ready: usize,
    pub total: usize,
    pub percent: u8,
}

impl Progress {
    pub fn is_complete(&self) -> bool {
        self.percent == 100
    }
}

/// Per-status frame counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusCounts {
    pub empty: usize,
    pub pending: usize,
    pub ready: usize,
    pub failed: usize,
}

/// `round(ready / total * 100)`, half rounds up. `total` must be > 0.
pub fn percent_of(ready: usize, total: usize) -> u8 {
    debug_assert!(total > 0);
    ((ready * 200 + total) / (2 * total)).min(100) as u8
}

#[derive(Debug)]
struct CacheState {
    slots: Vec<Slot>,
    ready: usize,
    percent: u8,
}

/// Read statistics for `play` lookups
#[derive(Debug, Default)]
pub struct CacheStats {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheStats {
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn hit_rate(&self) -> f64 {
        let total = self.hits() + self.misses();
        if total == 0 { 0.0 } else { self.hits() as f64 / total as f64 }
    }
}

/// Frame cache for one flipbook
pub struct FrameCache {
    state: Mutex<CacheState>,
    total: usize,
    /// Optional progress display
    sink: Option<Arc<dyn ProgressSink>>,
    /// Last percentage pushed to the sink (keeps notifications monotonic)
    notified: Mutex<Option<u8>>,
    stats: CacheStats,
}

impl std::fmt::Debug for FrameCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameCache")
            .field("total", &self.total)
            .field("progress", &self.progress())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

impl FrameCache {
    /// Create cache with `total` Empty entries (indices `1..=total`)
    pub fn new(total: usize) -> Result<Self, FrameError> {
        if total == 0 {
            return Err(FrameError::InvalidConfig("total_frames must be >= 1".into()));
        }

        debug!("FrameCache created: {} frames", total);

        Ok(Self {
            state: Mutex::new(CacheState {
                slots: vec![Slot::Empty; total],
                ready: 0,
                percent: 0,
            }),
            total,
            sink: None,
            notified: Mutex::new(None),
            stats: CacheStats::default(),
        })
    }

    /// Attach a progress display, notified from `mark_ready`
    pub fn with_progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    fn slot_idx(&self, frame_idx: usize) -> Result<usize, FrameError> {
        if frame_idx == 0 || frame_idx > self.total {
            return Err(FrameError::OutOfRange {
                index: frame_idx,
                total: self.total,
            });
        }
        Ok(frame_idx - 1)
    }

    /// Get status + data snapshot
    pub fn get(&self, frame_idx: usize) -> Result<FrameEntry, FrameError> {
        let i = self.slot_idx(frame_idx)?;
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let slot = &state.slots[i];
        let data = match slot {
            Slot::Ready(data) => Some(Arc::clone(data)),
            _ => None,
        };
        Ok(FrameEntry {
            index: frame_idx,
            status: slot.status(),
            data,
        })
    }

    /// Get ready data for playback, recording hit/miss.
    ///
    /// Ok(None) means the frame exists but isn't Ready.
    pub fn lookup(&self, frame_idx: usize) -> Result<Option<Arc<FrameData>>, FrameError> {
        let data = self.get(frame_idx)?.data;
        if data.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        Ok(data)
    }

    /// Lightweight status query (no data clone)
    pub fn status(&self, frame_idx: usize) -> Result<FrameStatus, FrameError> {
        let i = self.slot_idx(frame_idx)?;
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Ok(state.slots[i].status())
    }

    /// Empty|Failed -> Pending.
    ///
    /// `InvalidTransition` if Pending or Ready: caller must treat it as
    /// "already in progress / done" and skip.
    pub fn mark_pending(&self, frame_idx: usize) -> Result<(), FrameError> {
        let i = self.slot_idx(frame_idx)?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let from = state.slots[i].status();
        match from {
            FrameStatus::Empty | FrameStatus::Failed => {
                state.slots[i] = Slot::Pending;
                trace!("Frame #{} {} -> Pending", frame_idx, from);
                Ok(())
            }
            _ => Err(FrameError::InvalidTransition {
                index: frame_idx,
                from,
                to: FrameStatus::Pending,
            }),
        }
    }

    /// Pending -> Ready. Stores data, bumps the ready counter and percentage,
    /// notifies the progress sink. Returns the new progress.
    pub fn mark_ready(&self, frame_idx: usize, data: FrameData) -> Result<Progress, FrameError> {
        let i = self.slot_idx(frame_idx)?;
        let progress = {
            let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
            if !matches!(state.slots[i], Slot::Pending) {
                return Err(FrameError::InvalidTransition {
                    index: frame_idx,
                    from: state.slots[i].status(),
                    to: FrameStatus::Ready,
                });
            }
            let bytes = data.mem();
            state.slots[i] = Slot::Ready(Arc::new(data));
            state.ready += 1;
            state.percent = percent_of(state.ready, self.total);

            debug!(
                "Cached frame #{} ({} bytes), {}/{} ready ({}%)",
                frame_idx, bytes, state.ready, self.total, state.percent
            );

            Progress {
                ready: state.ready,
                total: self.total,
                percent: state.percent,
            }
        }; // state lock released here

        self.notify(progress.percent);
        Ok(progress)
    }

    /// Pending -> Failed
    pub fn mark_failed(&self, frame_idx: usize) -> Result<(), FrameError> {
        let i = self.slot_idx(frame_idx)?;
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !matches!(state.slots[i], Slot::Pending) {
            return Err(FrameError::InvalidTransition {
                index: frame_idx,
                from: state.slots[i].status(),
                to: FrameStatus::Failed,
            });
        }
        state.slots[i] = Slot::Failed;
        trace!("Frame #{} -> Failed", frame_idx);
        Ok(())
    }

    /// True iff frame is Ready (false for out-of-range)
    pub fn is_playable(&self, frame_idx: usize) -> bool {
        matches!(self.status(frame_idx), Ok(FrameStatus::Ready))
    }

    pub fn progress(&self) -> Progress {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        Progress {
            ready: state.ready,
            total: self.total,
            percent: state.percent,
        }
    }

    pub fn counts(&self) -> StatusCounts {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let mut counts = StatusCounts::default();
        for slot in &state.slots {
            match slot {
                Slot::Empty => counts.empty += 1,
                Slot::Pending => counts.pending += 1,
                Slot::Ready(_) => counts.ready += 1,
                Slot::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Number of frame entries (== total frames)
    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    pub fn total_frames(&self) -> usize {
        self.total
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Push percentage to the sink if it moved forward. Hide at exactly 100.
    fn notify(&self, percent: u8) {
        let Some(sink) = &self.sink else {
            return;
        };

        // Serialize notifications so concurrent completions can't report out of order
        let mut last = self.notified.lock().unwrap_or_else(|e| e.into_inner());
        if last.is_some_and(|p| p >= percent) {
            return;
        }
        *last = Some(percent);

        sink.set_percent(percent);
        if percent == 100 {
            debug!("All {} frames ready, hiding progress", self.total);
            sink.hide();
        }
    }
}
