//! Bounded worker pool for fire-and-forget tasks.
//!
//! Submission follows the classic thread-pool-executor rules: start a core
//! worker while below `core_pool_size`, otherwise queue into the backlog, and
//! when the backlog is full start an extra worker up to `max_pool_size`. Once
//! that is exhausted the task runs on the submitter itself, so work is delayed
//! but never dropped.

use futures::FutureExt;
use tokio::sync::{
    Mutex,
    mpsc::{self, error::TrySendError},
};
use tracing::Instrument;

use std::{
    future::Future,
    panic::AssertUnwindSafe,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use crate::config::ExecutorConfig;

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

#[derive(Clone)]
pub struct TaskExecutor {
    inner: Arc<Inner>,
}

struct Inner {
    core_pool_size: usize,
    max_pool_size: usize,
    keep_alive: Duration,
    thread_name_prefix: String,
    workers: AtomicUsize,
    next_worker_id: AtomicUsize,
    backlog_capacity: usize,
    tx: mpsc::Sender<Job>,
    rx: Mutex<mpsc::Receiver<Job>>,
}

impl TaskExecutor {
    pub fn new(config: &ExecutorConfig) -> Self {
        // tokio channels need at least one slot
        let backlog_capacity = config.queue_capacity.max(1);
        let (tx, rx) = mpsc::channel(backlog_capacity);

        Self {
            inner: Arc::new(Inner {
                core_pool_size: config.core_pool_size,
                max_pool_size: config.max_pool_size.max(1),
                keep_alive: config.keep_alive,
                thread_name_prefix: config.thread_name_prefix.clone(),
                workers: AtomicUsize::new(0),
                next_worker_id: AtomicUsize::new(0),
                backlog_capacity,
                tx,
                rx: Mutex::new(rx),
            }),
        }
    }

    /// Hands `task` to the pool.
    ///
    /// Returns as soon as the task is owned by a worker or the backlog. Only
    /// when the pool is saturated does this await the task to completion.
    pub async fn submit<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let inner = &self.inner;
        let job: Job = Box::pin(task);

        if inner.try_reserve_worker(inner.core_pool_size) {
            inner.spawn_worker(Some(job), true);
            return;
        }

        let job = match inner.tx.try_send(job) {
            Ok(()) => {
                // zero core workers: make sure something drains the backlog
                if inner.workers.load(Ordering::SeqCst) == 0
                    && inner.try_reserve_worker(inner.max_pool_size)
                {
                    inner.spawn_worker(None, false);
                }
                return;
            }
            Err(TrySendError::Full(job) | TrySendError::Closed(job)) => job,
        };

        if inner.try_reserve_worker(inner.max_pool_size) {
            inner.spawn_worker(Some(job), false);
            return;
        }

        tracing::warn!(
            workers = inner.workers.load(Ordering::SeqCst),
            backlog = inner.backlog_capacity,
            "Executor saturated, running task on the submitting task"
        );
        run_job(job).await;
    }

    pub fn active_workers(&self) -> usize {
        self.inner.workers.load(Ordering::SeqCst)
    }

    pub fn queued(&self) -> usize {
        self.inner.backlog_capacity - self.inner.tx.capacity()
    }
}

impl Inner {
    fn try_reserve_worker(&self, limit: usize) -> bool {
        self.workers
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < limit).then_some(n + 1)
            })
            .is_ok()
    }

    fn spawn_worker(self: &Arc<Self>, first: Option<Job>, core: bool) {
        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed) + 1;
        let span = tracing::info_span!(
            "worker",
            name = %format!("{}{id}", self.thread_name_prefix)
        );
        let inner = Arc::clone(self);

        tokio::spawn(inner.work(first, core).instrument(span));
    }

    async fn work(self: Arc<Self>, first: Option<Job>, core: bool) {
        if let Some(job) = first {
            run_job(job).await;
        }

        loop {
            while let Some(job) = self.next_job(core).await {
                run_job(job).await;
            }
            if self.retire() {
                break;
            }
        }

        tracing::debug!("Worker idle past keep-alive, retiring");
    }

    /// Gives up this worker's slot. Returns `false` if a task reached the
    /// backlog meanwhile and the slot was taken back to drain it.
    fn retire(&self) -> bool {
        self.workers.fetch_sub(1, Ordering::SeqCst);
        // a submit that saw this worker still live relies on it to drain the backlog
        let pending = self.tx.capacity() < self.backlog_capacity;
        !(pending && self.try_reserve_worker(self.max_pool_size))
    }

    async fn next_job(&self, core: bool) -> Option<Job> {
        let recv = async { self.rx.lock().await.recv().await };

        if core {
            recv.await
        } else {
            tokio::time::timeout(self.keep_alive, recv)
                .await
                .ok()
                .flatten()
        }
    }
}

async fn run_job(job: Job) {
    if AssertUnwindSafe(job).catch_unwind().await.is_err() {
        tracing::error!("Task panicked");
    }
}
