//! Single-worker FIFO executor.
//!
//! Jobs are sent over a channel to a dedicated thread and run one at a time,
//! in the order they were submitted. Shutting down closes the channel: jobs
//! already queued still run, new ones are rejected.

use crate::error::ExecutorError;
use crossbeam_channel::{Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A sequential task queue backed by one worker thread.
pub struct Executor {
    name: String,
    /// `None` once shut down.
    job_tx: Mutex<Option<Sender<Job>>>,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl Executor {
    /// Spawn the worker thread. `name` labels the thread and log lines.
    pub fn new(name: impl Into<String>) -> Result<Self, ExecutorError> {
        let name = name.into();
        let (job_tx, job_rx) = crossbeam_channel::unbounded::<Job>();

        let worker_name = name.clone();
        let worker_handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_jobs(&worker_name, job_rx))
            .map_err(ExecutorError::Spawn)?;
        let worker_id = worker_handle.thread().id();

        tracing::debug!(executor = %name, "Executor started");

        Ok(Self {
            name,
            job_tx: Mutex::new(Some(job_tx)),
            worker_handle: Mutex::new(Some(worker_handle)),
            worker_id,
        })
    }

    /// Queue a job behind everything submitted so far.
    pub fn submit<F>(&self, job: F) -> Result<(), ExecutorError>
    where
        F: FnOnce() + Send + 'static,
    {
        let job_tx = lock(&self.job_tx);
        let Some(tx) = job_tx.as_ref() else {
            return Err(ExecutorError::ShutDown(self.name.clone()));
        };
        tx.send(Box::new(job))
            .map_err(|_| ExecutorError::ShutDown(self.name.clone()))
    }

    /// Stop accepting jobs, run the ones already queued, then join the worker.
    ///
    /// Idempotent. Called from a job, it returns without joining; the worker
    /// exits once the queue is drained.
    pub fn shutdown(&self) {
        // Dropping the only sender disconnects the channel once it drains.
        if lock(&self.job_tx).take().is_none() {
            return;
        }
        tracing::debug!(executor = %self.name, "Executor shutting down");

        let handle = lock(&self.worker_handle).take();
        if self.is_worker_thread() {
            return;
        }
        if let Some(handle) = handle {
            if handle.join().is_err() {
                tracing::error!(executor = %self.name, "Executor worker panicked");
            }
        }
    }

    pub fn is_shutdown(&self) -> bool {
        lock(&self.job_tx).is_none()
    }

    /// True when called from inside a job.
    pub fn is_worker_thread(&self) -> bool {
        thread::current().id() == self.worker_id
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_jobs(name: &str, job_rx: Receiver<Job>) {
    while let Ok(job) = job_rx.recv() {
        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
            tracing::error!(executor = %name, "Executor job panicked");
        }
    }
    tracing::debug!(executor = %name, "Executor stopped");
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
