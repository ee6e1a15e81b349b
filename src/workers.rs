//! Work-stealing thread pool (spec §4.G), grounded on `core/workers.rs` and
//! the `WorkerPool` trait in `entities/traits.rs`.
//!
//! The registration pipeline is batch-oriented rather than event-driven, so
//! on top of the teacher's fire-and-forget `execute`/`execute_with_epoch`
//! this adds [`Workers::map`]: submit `N` independent closures and block
//! until every result is back, which is what angle sweeps, per-tile grid
//! refinement, and per-tile compositing all need.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam::deque::{Injector, Worker};
use log::trace;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Abstract worker pool interface so algorithm code (`align`, `refine`,
/// `assemble`) doesn't depend on the concrete thread pool implementation.
pub trait WorkerPool: Send + Sync {
    /// Execute closure on a worker thread with epoch-based cancellation: if
    /// the epoch has advanced past `epoch` before the job runs, it's
    /// silently skipped.
    fn execute_with_epoch(&self, epoch: u64, f: Box<dyn FnOnce() + Send + 'static>);
}

/// Work-stealing pool of OS threads, each with its own deque; idle workers
/// steal from the global injector first, then from each other.
pub struct Workers {
    injector: Arc<Injector<Job>>,
    handles: Vec<thread::JoinHandle<()>>,
    current_epoch: Arc<AtomicU64>,
    shutdown: Arc<AtomicBool>,
}

impl Workers {
    /// Spawn `num_threads` worker threads sharing a fresh epoch counter.
    pub fn new(num_threads: usize) -> Self {
        Self::with_epoch(num_threads, Arc::new(AtomicU64::new(0)))
    }

    /// Spawn workers sharing an externally-owned epoch counter (so a
    /// caller can cancel in-flight work from outside by bumping it).
    pub fn with_epoch(num_threads: usize, epoch: Arc<AtomicU64>) -> Self {
        let injector: Arc<Injector<Job>> = Arc::new(Injector::new());
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut locals: Vec<Worker<Job>> = Vec::new();
        let mut stealers = Vec::new();
        let mut handles = Vec::new();

        for _ in 0..num_threads.max(1) {
            let worker: Worker<Job> = Worker::new_fifo();
            stealers.push(worker.stealer());
            locals.push(worker);
        }

        for (worker_id, worker) in locals.into_iter().enumerate() {
            let injector = Arc::clone(&injector);
            let shutdown = Arc::clone(&shutdown);
            let stealers = stealers.clone();

            let handle = thread::Builder::new()
                .name(format!("nornir-worker-{worker_id}"))
                .spawn(move || {
                    trace!("worker {worker_id} started");
                    loop {
                        if let Some(job) = worker.pop() {
                            job();
                            continue;
                        }
                        if let Some(job) = injector.steal().success() {
                            job();
                            continue;
                        }
                        let mut found = false;
                        for stealer in &stealers {
                            if let Some(job) = stealer.steal().success() {
                                job();
                                found = true;
                                break;
                            }
                        }
                        if found {
                            continue;
                        }
                        if shutdown.load(Ordering::Relaxed) {
                            break;
                        }
                        thread::sleep(std::time::Duration::from_millis(1));
                    }
                    trace!("worker {worker_id} stopped");
                })
                .expect("failed to spawn worker thread");

            handles.push(handle);
        }

        Self { injector, handles, current_epoch: epoch, shutdown }
    }

    pub fn execute<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.injector.push(Box::new(f));
    }

    pub fn current_epoch(&self) -> u64 {
        self.current_epoch.load(Ordering::Relaxed)
    }

    pub fn bump_epoch(&self) -> u64 {
        self.current_epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn execute_with_epoch<F>(&self, epoch: u64, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let current_epoch = Arc::clone(&self.current_epoch);
        let wrapped = move || {
            if current_epoch.load(Ordering::Relaxed) == epoch {
                f();
            }
        };
        self.injector.push(Box::new(wrapped));
    }

    /// Submit `items.len()` independent jobs and block until every result
    /// is back, preserving input order. `f` must be safe to call
    /// concurrently from multiple worker threads.
    pub fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> R + Send + Sync + 'static,
    {
        let n = items.len();
        let f = Arc::new(f);
        let (tx, rx) = crossbeam_channel::bounded(n);

        for (index, item) in items.into_iter().enumerate() {
            let tx = tx.clone();
            let f = Arc::clone(&f);
            self.execute(move || {
                let result = f(item);
                let _ = tx.send((index, result));
            });
        }
        drop(tx);

        let mut slots: Vec<Option<R>> = (0..n).map(|_| None).collect();
        for _ in 0..n {
            let (index, result) = rx.recv().expect("worker dropped result channel unexpectedly");
            slots[index] = Some(result);
        }

        slots.into_iter().map(|s| s.expect("every index is filled exactly once")).collect()
    }
}

impl WorkerPool for Workers {
    fn execute_with_epoch(&self, epoch: u64, f: Box<dyn FnOnce() + Send + 'static>) {
        Workers::execute_with_epoch(self, epoch, f)
    }
}

impl Drop for Workers {
    fn drop(&mut self) {
        use std::time::{Duration, Instant};

        self.shutdown.store(true, Ordering::SeqCst);
        let deadline = Instant::now() + Duration::from_millis(500);

        for handle in std::mem::take(&mut self.handles) {
            while !handle.is_finished() {
                if Instant::now() >= deadline {
                    return;
                }
                thread::sleep(Duration::from_millis(1));
            }
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn map_preserves_order() {
        let workers = Workers::new(4);
        let items: Vec<i32> = (0..50).collect();
        let results = workers.map(items, |x| x * 2);
        let expected: Vec<i32> = (0..50).map(|x| x * 2).collect();
        assert_eq!(results, expected);
    }

    #[test]
    fn stale_epoch_job_is_skipped() {
        let workers = Workers::new(2);
        let ran = Arc::new(AtomicBool::new(false));
        let epoch = workers.current_epoch();
        workers.bump_epoch();
        let flag = Arc::clone(&ran);
        workers.execute_with_epoch(epoch, move || {
            flag.store(true, Ordering::SeqCst);
        });
        thread::sleep(std::time::Duration::from_millis(50));
        assert!(!ran.load(Ordering::SeqCst));
    }

    #[test]
    fn fresh_epoch_job_runs() {
        let workers = Workers::new(2);
        let counter = Arc::new(AtomicUsize::new(0));
        let epoch = workers.current_epoch();
        let c = Arc::clone(&counter);
        workers.execute_with_epoch(epoch, move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        thread::sleep(std::time::Duration::from_millis(50));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
