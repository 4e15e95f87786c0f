//! Thread pool for background frame fetches
//!
//! Uses work-stealing deques:
//! - Jobs are pushed to a global injector in issue order
//! - Idle workers pull batches from the injector into their own FIFO deque
//! - Workers steal from each other when both are empty
//!
//! FIFO everywhere keeps start order close to issue order, so coarse sweep
//! steps begin before fine ones.

use crossbeam::deque::{Injector, Stealer, Worker};
use log::trace;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::entities::WorkerPool;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Worker pool with work-stealing.
///
/// # Example
/// ```ignore
/// let workers = Workers::new(4)?;
/// workers.execute(move || {
///     fetch_frame(&ctx, frame_idx);
/// });
/// ```
pub struct Workers {
    injector: Arc<Injector<Job>>,          // Global queue for external tasks
    handles: Vec<thread::JoinHandle<()>>,  // Thread handles for proper shutdown
    shutdown: Arc<AtomicBool>,             // Shutdown signal
}

impl Workers {
    /// Create worker pool.
    ///
    /// Recommended: `num_cpus::get() * 3 / 4` (leave 25% for the presentation thread).
    pub fn new(num_threads: usize) -> std::io::Result<Self> {
        let num_threads = num_threads.max(1);
        let injector: Arc<Injector<Job>> = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let workers_local: Vec<Worker<Job>> = (0..num_threads).map(|_| Worker::new_fifo()).collect();
        let stealers: Vec<Stealer<Job>> = workers_local.iter().map(|w| w.stealer()).collect();
        let mut handles = Vec::with_capacity(num_threads);

        for (worker_id, worker) in workers_local.into_iter().enumerate() {
            let injector = Arc::clone(&injector);
            let worker_shutdown = Arc::clone(&shutdown);
            let stealers = stealers.clone();

            let handle = thread::Builder::new()
                .name(format!("flipbook-worker-{}", worker_id))
                .spawn(move || {
                    trace!("Worker {} started", worker_id);

                    loop {
                        if let Some(job) = find_job(&worker, &injector, &stealers) {
                            job();
                            continue;
                        }

                        // Queue drained: only now honour shutdown, so issued fetches complete
                        if worker_shutdown.load(Ordering::Relaxed) {
                            break;
                        }

                        // No work - short sleep to avoid CPU spin
                        thread::sleep(Duration::from_millis(1));
                    }

                    trace!("Worker {} stopped", worker_id);
                });

            match handle {
                Ok(h) => handles.push(h),
                Err(e) => {
                    // Stop what we already started before bailing out
                    shutdown.store(true, Ordering::SeqCst);
                    for h in handles {
                        let _ = h.join();
                    }
                    return Err(e);
                }
            }
        }

        trace!("Workers initialized: {} threads (work-stealing)", num_threads);

        Ok(Self {
            injector,
            handles,
            shutdown,
        })
    }

    /// Execute closure on a worker thread. Runs asynchronously, no return value.
    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.injector.push(Box::new(f));
    }

    pub fn num_threads(&self) -> usize {
        self.handles.len()
    }
}

/// Own deque first, then a batch from the injector, then steal from peers.
fn find_job(local: &Worker<Job>, injector: &Injector<Job>, stealers: &[Stealer<Job>]) -> Option<Job> {
    local.pop().or_else(|| {
        std::iter::repeat_with(|| {
            injector
                .steal_batch_and_pop(local)
                .or_else(|| stealers.iter().map(|s| s.steal()).collect())
        })
        .find(|s| !s.is_retry())
        .and_then(|s| s.success())
    })
}

impl Drop for Workers {
    fn drop(&mut self) {
        let num_threads = self.handles.len();
        trace!("Workers shutting down ({} threads)...", num_threads);

        self.shutdown.store(true, Ordering::SeqCst);

        // Queued jobs still run before threads exit; give them a bounded wait
        let deadline = Instant::now() + Duration::from_millis(500);

        let handles = std::mem::take(&mut self.handles);
        for handle in handles {
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    trace!("Shutdown timeout reached, detaching remaining workers");
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
            let _ = handle.join();
        }

        trace!("All {} workers stopped gracefully", num_threads);
    }
}

impl WorkerPool for Workers {
    fn execute(&self, f: Box<dyn FnOnce() + Send + 'static>) {
        self.injector.push(f);
    }

    fn concurrency(&self) -> usize {
        self.num_threads()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_all_jobs_run() {
        let workers = Workers::new(3).unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();

        for i in 0..50 {
            let tx = tx.clone();
            workers.execute(move || {
                tx.send(i).unwrap();
            });
        }
        drop(tx);

        let mut got: Vec<i32> = rx.iter().take(50).collect();
        got.sort();
        assert_eq!(got, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_concurrency_bounded_by_threads() {
        let workers = Workers::new(2).unwrap();
        assert_eq!(WorkerPool::concurrency(&workers), 2);

        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = crossbeam_channel::unbounded();

        for _ in 0..10 {
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            let tx = tx.clone();
            workers.execute(move || {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                running.fetch_sub(1, Ordering::SeqCst);
                tx.send(()).unwrap();
            });
        }

        for _ in 0..10 {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[test]
    fn test_zero_threads_clamped() {
        let workers = Workers::new(0).unwrap();
        assert_eq!(workers.num_threads(), 1);
    }

    #[test]
    fn test_drop_finishes_queued_jobs() {
        let done = Arc::new(AtomicUsize::new(0));
        {
            let workers = Workers::new(2).unwrap();
            for _ in 0..20 {
                let done = Arc::clone(&done);
                workers.execute(move || {
                    done.fetch_add(1, Ordering::SeqCst);
                });
            }
        }
        assert_eq!(done.load(Ordering::SeqCst), 20);
    }
}
