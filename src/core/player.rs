//! Flipbook controller - the public boundary of the engine
//!
//! Owns the frame cache and the prefetch scheduler, exposes:
//! - `run` / `spawn_run`: one prefetch pass (critical path, callback, sweep)
//! - `play`: draw a cached frame, or report it as not available
//!
//! `play` only reads the cache, so it is safe to call from the presentation
//! loop while `run` is still streaming frames on another thread.

use std::sync::Arc;
use std::thread;

use log::{debug, info};

use crate::config::FlipbookOptions;
use crate::core::frame_cache::{FrameCache, Progress, StatusCounts};
use crate::core::prefetch::{FetchContext, Prefetcher, RunSummary};
use crate::core::workers::Workers;
use crate::entities::{
    FrameDecoder, FrameEntry, FrameError, FrameStatus, ImageFileDecoder, ProgressSink,
    RenderTarget, SurfacePool, UrlPolicy, WorkerPool,
};
use crate::render::NullTarget;

/// What `play` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// Frame was Ready and handed to the render target
    Drawn,
    /// Frame not loaded (yet, or failed); nothing drawn
    NotAvailable,
}

/// Builder for `Flipbook`.
///
/// # Example
/// ```ignore
/// let book = FlipbookBuilder::new(120, 640, 360, SequencePattern::parse("f.####.png", 1)?)
///     .target(viewport)
///     .progress_sink(label)
///     .options(FlipbookOptions::serial())
///     .build()?;
/// ```
pub struct FlipbookBuilder {
    total_frames: usize,
    width: u32,
    height: u32,
    urls: Arc<dyn UrlPolicy>,
    decoder: Arc<dyn FrameDecoder>,
    target: Arc<dyn RenderTarget>,
    sink: Option<Arc<dyn ProgressSink>>,
    pool: Option<Arc<dyn WorkerPool>>,
    options: FlipbookOptions,
}

impl FlipbookBuilder {
    /// Defaults: `ImageFileDecoder`, `NullTarget`, no progress sink, default options.
    pub fn new(total_frames: usize, width: u32, height: u32, urls: impl UrlPolicy + 'static) -> Self {
        Self {
            total_frames,
            width,
            height,
            urls: Arc::new(urls),
            decoder: Arc::new(ImageFileDecoder::new()),
            target: Arc::new(NullTarget::new()),
            sink: None,
            pool: None,
            options: FlipbookOptions::default(),
        }
    }

    pub fn decoder(mut self, decoder: Arc<dyn FrameDecoder>) -> Self {
        self.decoder = decoder;
        self
    }

    pub fn target(mut self, target: Arc<dyn RenderTarget>) -> Self {
        self.target = target;
        self
    }

    pub fn progress_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Share an existing pool instead of spawning one (parallel mode only)
    pub fn worker_pool(mut self, pool: Arc<dyn WorkerPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn options(mut self, options: FlipbookOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<Flipbook, FrameError> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameError::InvalidConfig(format!(
                "frame size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.options.load_step == 0 {
            return Err(FrameError::InvalidConfig("load_step must be >= 1".into()));
        }

        let mut cache = FrameCache::new(self.total_frames)?;
        if let Some(sink) = self.sink {
            cache = cache.with_progress_sink(sink);
        }
        let cache = Arc::new(cache);

        let pool: Option<Arc<dyn WorkerPool>> = if self.options.parallel_fetch {
            match self.pool {
                Some(pool) => Some(pool),
                None => {
                    let workers = Workers::new(self.options.worker_count())
                        .map_err(|e| FrameError::Workers(e.to_string()))?;
                    Some(Arc::new(workers))
                }
            }
        } else {
            None
        };

        // One surface per concurrent decode: every worker plus the scheduler thread
        let concurrency = pool.as_ref().map_or(0, |p| p.concurrency()) + 1;
        let surfaces = Arc::new(SurfacePool::new(self.width, self.height, concurrency));

        let ctx = Arc::new(FetchContext {
            cache: Arc::clone(&cache),
            urls: self.urls,
            decoder: self.decoder,
            surfaces,
        });
        let prefetcher = Prefetcher::new(ctx, Arc::clone(&self.target), pool, self.options.load_step);

        info!(
            "Flipbook created: {} frames, {}x{}, {:?}",
            self.total_frames, self.width, self.height, self.options
        );

        Ok(Flipbook {
            width: self.width,
            height: self.height,
            cache,
            prefetcher,
            target: self.target,
            options: self.options,
        })
    }
}

/// Progressive flipbook: frame cache + prefetch scheduler + render target
pub struct Flipbook {
    width: u32,
    height: u32,
    cache: Arc<FrameCache>,
    prefetcher: Prefetcher,
    target: Arc<dyn RenderTarget>,
    options: FlipbookOptions,
}

impl Flipbook {
    /// Construct with the default decoder (image files) and a headless target.
    pub fn new(
        total_frames: usize,
        width: u32,
        height: u32,
        urls: impl UrlPolicy + 'static,
        options: FlipbookOptions,
    ) -> Result<Self, FrameError> {
        FlipbookBuilder::new(total_frames, width, height, urls)
            .options(options)
            .build()
    }

    pub fn builder(total_frames: usize, width: u32, height: u32, urls: impl UrlPolicy + 'static) -> FlipbookBuilder {
        FlipbookBuilder::new(total_frames, width, height, urls)
    }

    /// One prefetch pass. Calls `on_critical_path_ready` once first, last
    /// and middle frames were attempted, then sweeps the rest. Returns after
    /// every issued fetch resolved; per-frame failures never fail the run.
    pub fn run<F: FnOnce()>(&self, on_critical_path_ready: F) -> RunSummary {
        self.prefetcher.run(on_critical_path_ready)
    }

    /// `run` on a dedicated scheduler thread, so the caller's loop keeps going.
    pub fn spawn_run<F>(self: &Arc<Self>, on_critical_path_ready: F) -> std::io::Result<thread::JoinHandle<RunSummary>>
    where
        F: FnOnce() + Send + 'static,
    {
        let book = Arc::clone(self);
        thread::Builder::new()
            .name("flipbook-scheduler".into())
            .spawn(move || book.run(on_critical_path_ready))
    }

    /// Draw frame `frame_idx` at (0, 0) if it's Ready.
    ///
    /// Not-ready frames are a normal outcome, not an error. Out-of-range
    /// indices return `OutOfRange` and never draw.
    pub fn play(&self, frame_idx: usize) -> Result<PlayOutcome, FrameError> {
        match self.cache.lookup(frame_idx)? {
            Some(data) => {
                self.target.draw(&data, 0, 0);
                Ok(PlayOutcome::Drawn)
            }
            None => {
                debug!("Frame #{} lost", frame_idx);
                Ok(PlayOutcome::NotAvailable)
            }
        }
    }

    /// Like `play`, but a missing frame is `NotReady`.
    pub fn try_play(&self, frame_idx: usize) -> Result<(), FrameError> {
        match self.play(frame_idx)? {
            PlayOutcome::Drawn => Ok(()),
            PlayOutcome::NotAvailable => Err(FrameError::NotReady(frame_idx)),
        }
    }

    pub fn get(&self, frame_idx: usize) -> Result<FrameEntry, FrameError> {
        self.cache.get(frame_idx)
    }

    pub fn status(&self, frame_idx: usize) -> Result<FrameStatus, FrameError> {
        self.cache.status(frame_idx)
    }

    pub fn is_playable(&self, frame_idx: usize) -> bool {
        self.cache.is_playable(frame_idx)
    }

    pub fn progress(&self) -> Progress {
        self.cache.progress()
    }

    pub fn counts(&self) -> StatusCounts {
        self.cache.counts()
    }

    pub fn total_frames(&self) -> usize {
        self.cache.total_frames()
    }

    /// (width, height) of every cached frame
    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn options(&self) -> &FlipbookOptions {
        &self.options
    }

    pub fn cache(&self) -> &Arc<FrameCache> {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{FrameData, Locator};
    use image::{Rgba, RgbaImage};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Frame n decodes to a 4x4 image whose red channel is n; `fail` frames error out
    struct StubDecoder {
        fail: Vec<usize>,
        calls: AtomicUsize,
    }

    impl StubDecoder {
        fn new(fail: Vec<usize>) -> Arc<Self> {
            Arc::new(Self {
                fail,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl FrameDecoder for StubDecoder {
        fn decode(&self, locator: &Locator) -> Result<RgbaImage, FrameError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let idx: usize = locator
                .as_str()
                .trim_start_matches("frame_")
                .parse()
                .map_err(|_| FrameError::Decode(locator.to_string()))?;
            if self.fail.contains(&idx) {
                return Err(FrameError::Decode(format!("{} unreachable", locator)));
            }
            Ok(RgbaImage::from_pixel(4, 4, Rgba([idx as u8, 0, 0, 255])))
        }
    }

    #[derive(Default)]
    struct RecordingTarget {
        draws: Mutex<Vec<u8>>,
    }

    impl RenderTarget for RecordingTarget {
        fn draw(&self, frame: &FrameData, _x: u32, _y: u32) {
            self.draws.lock().unwrap().push(frame.pixel(0, 0).unwrap()[0]);
        }
    }

    #[derive(Default)]
    struct PercentLog {
        seen: Mutex<Vec<u8>>,
        hidden: AtomicUsize,
    }

    impl ProgressSink for PercentLog {
        fn set_percent(&self, percent: u8) {
            self.seen.lock().unwrap().push(percent);
        }

        fn hide(&self) {
            self.hidden.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn book(
        total: usize,
        decoder: Arc<StubDecoder>,
        target: Arc<RecordingTarget>,
        options: FlipbookOptions,
    ) -> Flipbook {
        Flipbook::builder(total, 4, 4, |i: usize| format!("frame_{}", i))
            .decoder(decoder)
            .target(target)
            .options(options)
            .build()
            .unwrap()
    }

    #[test]
    fn test_invalid_construction() {
        let urls = |i: usize| i.to_string();
        assert!(Flipbook::new(0, 4, 4, urls, FlipbookOptions::default()).is_err());
        assert!(Flipbook::new(3, 0, 4, urls, FlipbookOptions::default()).is_err());
        let zero_step = FlipbookOptions {
            load_step: 0,
            ..FlipbookOptions::default()
        };
        assert!(matches!(
            Flipbook::new(3, 4, 4, urls, zero_step),
            Err(FrameError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_play_before_and_after_run() {
        let target = Arc::new(RecordingTarget::default());
        let book = book(10, StubDecoder::new(vec![]), target.clone(), FlipbookOptions::serial());

        assert_eq!(book.play(3).unwrap(), PlayOutcome::NotAvailable);
        assert!(target.draws.lock().unwrap().is_empty());

        book.run(|| {});
        // Frame 1 drawn by the scheduler itself
        assert_eq!(*target.draws.lock().unwrap(), vec![1]);

        assert_eq!(book.play(3).unwrap(), PlayOutcome::Drawn);
        assert_eq!(*target.draws.lock().unwrap(), vec![1, 3]);
    }

    #[test]
    fn test_play_out_of_range_never_draws() {
        let target = Arc::new(RecordingTarget::default());
        let book = book(5, StubDecoder::new(vec![]), target.clone(), FlipbookOptions::serial());
        book.run(|| {});
        let before = target.draws.lock().unwrap().len();

        assert!(matches!(book.play(0), Err(FrameError::OutOfRange { .. })));
        assert!(matches!(book.play(6), Err(FrameError::OutOfRange { .. })));
        assert_eq!(target.draws.lock().unwrap().len(), before);
    }

    #[test]
    fn test_failed_frame_not_playable() {
        let target = Arc::new(RecordingTarget::default());
        let book = book(6, StubDecoder::new(vec![4]), target.clone(), FlipbookOptions::serial());
        let summary = book.run(|| {});

        assert_eq!(summary.failed, 1);
        assert_eq!(book.status(4).unwrap(), FrameStatus::Failed);
        assert_eq!(book.play(4).unwrap(), PlayOutcome::NotAvailable);
        assert_eq!(book.try_play(4), Err(FrameError::NotReady(4)));
        assert!(book.try_play(5).is_ok());
    }

    #[test]
    fn test_all_fail_scenario() {
        let target = Arc::new(RecordingTarget::default());
        let decoder = StubDecoder::new((1..=8).collect());
        let book = book(8, decoder.clone(), target.clone(), FlipbookOptions::default());
        let fired = AtomicUsize::new(0);

        let summary = book.run(|| {
            fired.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(summary.ready, 0);
        assert_eq!(book.progress().ready, 0);
        assert_eq!(book.progress().percent, 0);
        assert_eq!(book.counts().failed, 8);
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 8);
        for i in 1..=8 {
            assert_eq!(book.play(i).unwrap(), PlayOutcome::NotAvailable);
        }
        assert!(target.draws.lock().unwrap().is_empty());
    }

    #[test]
    fn test_progress_sink_hidden_at_100() {
        let sink = Arc::new(PercentLog::default());
        let book = Flipbook::builder(4, 4, 4, |i: usize| format!("frame_{}", i))
            .decoder(StubDecoder::new(vec![]))
            .progress_sink(sink.clone())
            .options(FlipbookOptions::serial())
            .build()
            .unwrap();

        book.run(|| {});

        // Serial order for 4 frames, step 10: 1, 4, 2, 3
        assert_eq!(*sink.seen.lock().unwrap(), vec![25, 50, 75, 100]);
        assert_eq!(sink.hidden.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_progress_not_hidden_with_failures() {
        let sink = Arc::new(PercentLog::default());
        let book = Flipbook::builder(4, 4, 4, |i: usize| format!("frame_{}", i))
            .decoder(StubDecoder::new(vec![2]))
            .progress_sink(sink.clone())
            .build()
            .unwrap();

        let summary = book.run(|| {});
        assert_eq!(summary.percent, 75);
        assert_eq!(sink.hidden.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_parallel_run_covers_everything() {
        let target = Arc::new(RecordingTarget::default());
        let options = FlipbookOptions {
            parallel_fetch: true,
            load_step: 6,
            workers: Some(4),
        };
        let decoder = StubDecoder::new(vec![]);
        let book = book(40, decoder.clone(), target, options);

        let summary = book.run(|| {});
        assert_eq!(summary.attempted, 40);
        assert_eq!(decoder.calls.load(Ordering::SeqCst), 40);
        assert_eq!(book.counts().ready, 40);
        assert!(book.progress().is_complete());
    }

    #[test]
    fn test_spawn_run_and_play_concurrently() {
        let target = Arc::new(RecordingTarget::default());
        let book = Arc::new(book(30, StubDecoder::new(vec![]), target.clone(), FlipbookOptions::default()));
        let (tx, rx) = crossbeam_channel::bounded(1);

        let handle = book
            .spawn_run(move || {
                let _ = tx.send(());
            })
            .unwrap();

        // Critical path ready: first, last, middle are playable
        rx.recv().unwrap();
        for i in [1, 30, 15] {
            assert!(book.is_playable(i));
        }

        // Presentation loop may poll while the sweep is running
        for i in 1..=30 {
            let _ = book.play(i).unwrap();
        }

        let summary = handle.join().unwrap();
        assert_eq!(summary.ready, 30);
        assert_eq!(book.counts().empty, 0);
    }

    #[test]
    fn test_frame_data_matches_dimensions() {
        let target = Arc::new(RecordingTarget::default());
        let book = book(2, StubDecoder::new(vec![]), target, FlipbookOptions::serial());
        book.run(|| {});

        let entry = book.get(2).unwrap();
        let data = entry.data.unwrap();
        assert_eq!((data.width(), data.height()), book.dimensions());
        assert_eq!(data.pixel(3, 3), Some([2, 0, 0, 255]));
    }
}
