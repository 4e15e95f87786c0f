//! Priority-ordered prefetch scheduler
//!
//! Fetch order:
//! 1. Critical path: first, last, middle frame - strictly one after another,
//!    on the calling thread. First frame is drawn as soon as it's ready.
//! 2. `on_critical_path_ready` callback.
//! 3. Background sweep: for step = load_step..=1 (descending), every multiple
//!    of step in `[step, total]` that is still Empty. Coarse steps spread
//!    samples over the whole range early, step 1 fills the gaps.
//!
//! Parallel mode claims each sweep frame (Empty -> Pending) on the scheduler
//! thread and hands the decode to the worker pool without waiting. Serial mode
//! fetches every frame inline. Either way `run` returns only after every
//! issued fetch resolved.
//!
//! Per-frame failures never escape a fetch: the frame is marked Failed, a
//! warning is logged, and the pass moves on.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, trace, warn};

use crate::core::frame_cache::FrameCache;
use crate::entities::{
    FrameDecoder, FrameError, FrameStatus, RenderTarget, SurfacePool, UrlPolicy, WorkerPool,
};

/// Result of one per-frame fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    Ready,
    Failed,
    /// Frame was already in flight or done; nothing fetched
    Skipped,
}

/// First, last, middle (`round(total / 2)`). May contain duplicates for tiny sequences.
pub fn critical_path(total: usize) -> [usize; 3] {
    [1, total, (total + 1) / 2]
}

/// Sweep candidates in issue order, before skipping already-fetched frames.
pub fn sweep_candidates(total: usize, load_step: usize) -> impl Iterator<Item = usize> {
    (1..=load_step)
        .rev()
        .flat_map(move |step| (step..=total).step_by(step))
}

/// Full issue order for one pass over an untouched cache: critical path then
/// sweep, each frame once.
pub fn fetch_plan(total: usize, load_step: usize) -> Vec<usize> {
    let mut seen = vec![false; total + 1];
    let mut plan = Vec::with_capacity(total);
    for idx in critical_path(total).into_iter().chain(sweep_candidates(total, load_step)) {
        if idx >= 1 && idx <= total && !seen[idx] {
            seen[idx] = true;
            plan.push(idx);
        }
    }
    plan
}

/// Everything a fetch needs, shareable with worker threads
pub struct FetchContext {
    pub cache: Arc<FrameCache>,
    pub urls: Arc<dyn UrlPolicy>,
    pub decoder: Arc<dyn FrameDecoder>,
    pub surfaces: Arc<SurfacePool>,
}

impl FetchContext {
    /// Per-frame fetch: claim, locate, decode, extract, record.
    pub fn fetch(&self, frame_idx: usize) -> FetchOutcome {
        match self.cache.mark_pending(frame_idx) {
            Ok(()) => self.load_claimed_guarded(frame_idx),
            Err(FrameError::InvalidTransition { from, .. }) => {
                trace!("Frame #{} already {}, skipping", frame_idx, from);
                FetchOutcome::Skipped
            }
            Err(e) => {
                warn!("Frame #{} not fetched: {}", frame_idx, e);
                FetchOutcome::Skipped
            }
        }
    }

    /// Load a frame the caller already moved to Pending.
    pub fn load_claimed(&self, frame_idx: usize) -> FetchOutcome {
        let locator = self.urls.locate(frame_idx);
        trace!("Fetching frame #{} from {}", frame_idx, locator);

        let decoded = match self.decoder.decode(&locator) {
            Ok(img) => img,
            Err(e) => {
                warn!("Failed to cache frame #{} ({}): {}", frame_idx, locator, e);
                self.fail(frame_idx);
                return FetchOutcome::Failed;
            }
        };

        // Own surface per decode; returned cleared when the guard drops
        let data = self.surfaces.checkout().capture(&decoded);

        match self.cache.mark_ready(frame_idx, data) {
            Ok(_) => FetchOutcome::Ready,
            Err(e) => {
                error!("Frame #{} decoded but not stored: {}", frame_idx, e);
                FetchOutcome::Skipped
            }
        }
    }

    /// Same as `load_claimed`, but a panicking decoder marks the frame Failed
    /// instead of leaving it Pending and taking the worker thread down.
    pub fn load_claimed_guarded(&self, frame_idx: usize) -> FetchOutcome {
        panic::catch_unwind(AssertUnwindSafe(|| self.load_claimed(frame_idx))).unwrap_or_else(|_| {
            error!("Decoder panicked on frame #{}", frame_idx);
            self.fail(frame_idx);
            FetchOutcome::Failed
        })
    }

    fn fail(&self, frame_idx: usize) {
        if let Err(e) = self.cache.mark_failed(frame_idx) {
            error!("Frame #{} could not be marked failed: {}", frame_idx, e);
        }
    }
}

/// What one `run` did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Fetches issued during this run
    pub attempted: usize,
    pub ready: usize,
    pub failed: usize,
    /// Overall load percentage at the end of the run
    pub percent: u8,
    pub elapsed: Duration,
}

impl RunSummary {
    fn record(&mut self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Ready => self.ready += 1,
            FetchOutcome::Failed => self.failed += 1,
            FetchOutcome::Skipped => {}
        }
    }
}

/// Drives frames through the cache in priority order
pub struct Prefetcher {
    ctx: Arc<FetchContext>,
    target: Arc<dyn RenderTarget>,
    /// None = serial mode
    pool: Option<Arc<dyn WorkerPool>>,
    load_step: usize,
}

impl Prefetcher {
    pub fn new(
        ctx: Arc<FetchContext>,
        target: Arc<dyn RenderTarget>,
        pool: Option<Arc<dyn WorkerPool>>,
        load_step: usize,
    ) -> Self {
        Self {
            ctx,
            target,
            pool,
            load_step: load_step.max(1),
        }
    }

    pub fn is_parallel(&self) -> bool {
        self.pool.is_some()
    }

    pub fn load_step(&self) -> usize {
        self.load_step
    }

    fn cache(&self) -> &FrameCache {
        &self.ctx.cache
    }

    fn is_empty(&self, frame_idx: usize) -> bool {
        matches!(self.cache().status(frame_idx), Ok(FrameStatus::Empty))
    }

    /// One full scheduling pass. Blocks until every issued fetch resolved.
    pub fn run<F: FnOnce()>(&self, on_critical_path_ready: F) -> RunSummary {
        let started = Instant::now();
        let total = self.cache().total_frames();
        let mut summary = RunSummary::default();

        info!(
            "Prefetch started: {} frames, step {}, {} mode",
            total,
            self.load_step,
            if self.is_parallel() { "parallel" } else { "serial" }
        );

        self.run_critical_path(&mut summary);
        debug!("Critical path done in {:?}", started.elapsed());
        on_critical_path_ready();

        self.run_sweep(total, &mut summary);

        summary.percent = self.cache().progress().percent;
        summary.elapsed = started.elapsed();
        info!(
            "Prefetch finished: {} attempted, {} ready, {} failed, {}% in {:?}",
            summary.attempted, summary.ready, summary.failed, summary.percent, summary.elapsed
        );
        summary
    }

    fn run_critical_path(&self, summary: &mut RunSummary) {
        let total = self.cache().total_frames();

        for (n, frame_idx) in critical_path(total).into_iter().enumerate() {
            // Empty guard: first/last/middle collapse for short sequences
            if !self.is_empty(frame_idx) {
                continue;
            }

            let outcome = self.ctx.fetch(frame_idx);
            if outcome != FetchOutcome::Skipped {
                summary.attempted += 1;
            }
            summary.record(outcome);

            if n == 0 {
                self.draw_first(outcome);
            }
        }
    }

    fn draw_first(&self, outcome: FetchOutcome) {
        if outcome != FetchOutcome::Ready {
            warn!("First frame unavailable, nothing drawn");
            return;
        }
        match self.cache().get(1) {
            Ok(entry) => {
                if let Some(data) = entry.data {
                    self.target.draw(&data, 0, 0);
                }
            }
            Err(e) => warn!("First frame lookup failed: {}", e),
        }
    }

    fn run_sweep(&self, total: usize, summary: &mut RunSummary) {
        let (tx, rx) = crossbeam_channel::unbounded::<FetchOutcome>();
        let mut in_flight = 0usize;

        for step in (1..=self.load_step).rev() {
            let mut issued = 0usize;

            for frame_idx in (step..=total).step_by(step) {
                if !self.is_empty(frame_idx) {
                    continue;
                }

                match &self.pool {
                    Some(pool) => {
                        // Claim here so later steps see Pending and skip it
                        if self.cache().mark_pending(frame_idx).is_err() {
                            continue;
                        }
                        let ctx = Arc::clone(&self.ctx);
                        let tx = tx.clone();
                        pool.execute(Box::new(move || {
                            let outcome = ctx.load_claimed_guarded(frame_idx);
                            let _ = tx.send(outcome);
                        }));
                        in_flight += 1;
                        summary.attempted += 1;
                        issued += 1;
                    }
                    None => {
                        let outcome = self.ctx.fetch(frame_idx);
                        if outcome != FetchOutcome::Skipped {
                            summary.attempted += 1;
                            issued += 1;
                        }
                        summary.record(outcome);
                    }
                }
            }

            if issued > 0 {
                debug!("Sweep step {}: {} frames issued", step, issued);
            }
        }
        drop(tx);

        // Drain: every job sends exactly one outcome
        for _ in 0..in_flight {
            match rx.recv() {
                Ok(outcome) => summary.record(outcome),
                Err(_) => {
                    error!("Worker channel closed with fetches outstanding");
                    break;
                }
            }
        }
    }
}
