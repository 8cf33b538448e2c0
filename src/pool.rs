//! Worker pool fed through a bounded lock-free queue.
//!
//! The storage core is single-writer by design, so the toolkit parallelizes
//! at a coarser grain: independent, order-insensitive units of work (one
//! row's similarity vector, one shard's index pass) are fanned out to a
//! fixed set of worker threads through a bounded multi-producer /
//! multi-consumer queue. Each worker opens any store it mutates exclusively
//! for its own shard; no store handle is ever shared between workers.
//!
//! [`SyncQueue`] is the queue itself; [`WorkerPool`] owns the threads. A
//! full queue applies backpressure by blocking the producer, which keeps a
//! fast producer from buffering an unbounded backlog of jobs.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::queue::ArrayQueue;
use crossbeam::utils::Backoff;
use parking_lot::Mutex;

use crate::error::{Error, Result};

/// A bounded multi-producer/multi-consumer queue with blocking push/pop.
pub struct SyncQueue<T> {
    inner: ArrayQueue<T>,
}

impl<T> SyncQueue<T> {
    /// Creates a queue holding at most `capacity` items.
    pub fn new(capacity: usize) -> Self {
        Self { inner: ArrayQueue::new(capacity) }
    }

    /// Pushes an item, spinning (then yielding) while the queue is full.
    pub fn push(&self, mut item: T) {
        let backoff = Backoff::new();
        loop {
            match self.inner.push(item) {
                Ok(()) => return,
                Err(rejected) => {
                    item = rejected;
                    backoff.snooze();
                }
            }
        }
    }

    /// Pushes an item if there is room, handing it back otherwise.
    pub fn try_push(&self, item: T) -> std::result::Result<(), T> {
        self.inner.push(item)
    }

    /// Pops an item, spinning (then yielding) while the queue is empty.
    pub fn pop(&self) -> T {
        let backoff = Backoff::new();
        loop {
            if let Some(item) = self.inner.pop() {
                return item;
            }
            backoff.snooze();
        }
    }

    /// Pops an item if one is available.
    pub fn try_pop(&self) -> Option<T> {
        self.inner.pop()
    }

    /// Number of items currently queued.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Maximum number of items the queue can hold.
    pub fn capacity(&self) -> usize {
        self.inner.capacity()
    }
}

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A fixed set of worker threads consuming jobs from a bounded queue.
///
/// # Example
///
/// ```rust
/// use sparsedb::WorkerPool;
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
///
/// let pool = WorkerPool::new(4, 64).unwrap();
/// let done = Arc::new(AtomicU32::new(0));
/// for _ in 0..100 {
///     let done = done.clone();
///     pool.submit(move || {
///         done.fetch_add(1, Ordering::Relaxed);
///     });
/// }
/// pool.join().unwrap();
/// assert_eq!(done.load(Ordering::Relaxed), 100);
/// ```
pub struct WorkerPool {
    queue: Arc<SyncQueue<Job>>,
    stop: Arc<AtomicBool>,
    panicked: Arc<Mutex<Option<String>>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawns `workers` threads consuming from a queue of `queue_len` jobs.
    pub fn new(workers: usize, queue_len: usize) -> Result<Self> {
        if workers == 0 || queue_len == 0 {
            return Err(Error::invalid_argument("pool needs at least one worker and one slot"));
        }
        let queue = Arc::new(SyncQueue::new(queue_len));
        let stop = Arc::new(AtomicBool::new(false));
        let panicked = Arc::new(Mutex::new(None));

        let mut handles = Vec::with_capacity(workers);
        for i in 0..workers {
            let queue = queue.clone();
            let stop = stop.clone();
            let panicked = panicked.clone();
            let handle = thread::Builder::new()
                .name(format!("sparsedb-worker-{}", i))
                .spawn(move || {
                    let backoff = Backoff::new();
                    loop {
                        match queue.try_pop() {
                            Some(job) => {
                                backoff.reset();
                                if let Err(payload) = catch_unwind(AssertUnwindSafe(job)) {
                                    let msg = panic_message(&payload);
                                    log::warn!("worker job panicked: {}", msg);
                                    panicked.lock().get_or_insert(msg);
                                }
                            }
                            // drain the queue before honoring a stop request
                            None if stop.load(Ordering::Acquire) => break,
                            None => {
                                if backoff.is_completed() {
                                    thread::sleep(Duration::from_millis(1));
                                } else {
                                    backoff.snooze();
                                }
                            }
                        }
                    }
                })
                .map_err(Error::Io)?;
            handles.push(handle);
        }

        Ok(Self { queue, stop, panicked, workers: handles })
    }

    /// Queues a job, blocking while the queue is full.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.queue.push(Box::new(job));
    }

    /// Number of jobs waiting in the queue.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Drains the queue, stops the workers, and surfaces the first worker
    /// panic (if any) as an error.
    pub fn join(mut self) -> Result<()> {
        self.stop.store(true, Ordering::Release);
        for handle in self.workers.drain(..) {
            handle
                .join()
                .map_err(|_| Error::internal("worker thread could not be joined"))?;
        }
        match self.panicked.lock().take() {
            Some(msg) => Err(Error::internal(format!("worker job panicked: {}", msg))),
            None => Ok(()),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
