//! Timer that runs many delayed callbacks from a single thread.

use crate::error::TimerError;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::collections::{BTreeMap, HashMap};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

/// Identifies a scheduled task for cancellation.
pub type TimerToken = u64;

type Callback = Box<dyn FnOnce() + Send + 'static>;

enum Command {
    Schedule {
        token: TimerToken,
        deadline: Instant,
        callback: Callback,
    },
    Cancel(TimerToken),
}

/// Schedules one-shot callbacks; all of them fire on the timer's own thread.
///
/// Callbacks should be short (e.g. hand work to an executor): a slow callback
/// delays every task behind it.
pub struct MultiTimer {
    next_token: AtomicU64,
    command_tx: Mutex<Option<Sender<Command>>>,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
    worker_id: ThreadId,
}

impl MultiTimer {
    pub fn new() -> Result<Self, TimerError> {
        let (command_tx, command_rx) = crossbeam_channel::unbounded::<Command>();
        let worker_handle = thread::Builder::new()
            .name("multi-timer".to_string())
            .spawn(move || run_timer(command_rx))
            .map_err(TimerError::Spawn)?;
        let worker_id = worker_handle.thread().id();

        Ok(Self {
            next_token: AtomicU64::new(1),
            command_tx: Mutex::new(Some(command_tx)),
            worker_handle: Mutex::new(Some(worker_handle)),
            worker_id,
        })
    }

    /// Run `callback` once, `delay` from now.
    pub fn submit_task<F>(&self, delay: Duration, callback: F) -> Result<TimerToken, TimerError>
    where
        F: FnOnce() + Send + 'static,
    {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let command = Command::Schedule {
            token,
            deadline: Instant::now() + delay,
            callback: Box::new(callback),
        };

        let command_tx = lock(&self.command_tx);
        let tx = command_tx.as_ref().ok_or(TimerError::ShutDown)?;
        tx.send(command).map_err(|_| TimerError::ShutDown)?;
        Ok(token)
    }

    /// Cancel a task that has not fired yet. Unknown or fired tokens are ignored.
    pub fn cancel_task(&self, token: TimerToken) {
        if let Some(tx) = lock(&self.command_tx).as_ref() {
            let _ = tx.send(Command::Cancel(token));
        }
    }

    /// Stop the timer thread. Unfired callbacks are dropped without running.
    pub fn shutdown(&self) {
        if lock(&self.command_tx).take().is_none() {
            return;
        }
        let handle = lock(&self.worker_handle).take();
        if thread::current().id() == self.worker_id {
            return;
        }
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        tracing::debug!("MultiTimer stopped");
    }
}

impl Drop for MultiTimer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_timer(command_rx: Receiver<Command>) {
    // Keyed by (deadline, token) so equal deadlines fire in submission order.
    let mut tasks: BTreeMap<(Instant, TimerToken), Callback> = BTreeMap::new();
    let mut deadlines: HashMap<TimerToken, Instant> = HashMap::new();

    loop {
        let now = Instant::now();
        while let Some(entry) = tasks.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let ((_, token), callback) = entry.remove_entry();
            deadlines.remove(&token);
            if panic::catch_unwind(AssertUnwindSafe(callback)).is_err() {
                tracing::error!(token, "Timer callback panicked");
            }
        }

        let next_deadline = tasks.keys().next().map(|(deadline, _)| *deadline);
        let command = match next_deadline {
            Some(deadline) => match command_rx.recv_deadline(deadline) {
                Ok(command) => Some(command),
                Err(RecvTimeoutError::Timeout) => None,
                Err(RecvTimeoutError::Disconnected) => break,
            },
            None => match command_rx.recv() {
                Ok(command) => Some(command),
                Err(_) => break,
            },
        };

        match command {
            Some(Command::Schedule {
                token,
                deadline,
                callback,
            }) => {
                tasks.insert((deadline, token), callback);
                deadlines.insert(token, deadline);
            }
            Some(Command::Cancel(token)) => {
                if let Some(deadline) = deadlines.remove(&token) {
                    tasks.remove(&(deadline, token));
                }
            }
            None => {}
        }
    }

    if !tasks.is_empty() {
        tracing::debug!(dropped = tasks.len(), "MultiTimer dropping unfired tasks");
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_fires_after_delay() {
        let timer = MultiTimer::new().unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();

        let started = Instant::now();
        timer
            .submit_task(Duration::from_millis(30), move || tx.send(Instant::now()).unwrap())
            .unwrap();

        let fired_at = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert!(fired_at - started >= Duration::from_millis(30));
    }

    #[test]
    fn test_cancelled_task_never_fires() {
        let timer = MultiTimer::new().unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();

        let cancelled_tx = tx.clone();
        let token = timer
            .submit_task(Duration::from_millis(30), move || cancelled_tx.send("cancelled").unwrap())
            .unwrap();
        timer
            .submit_task(Duration::from_millis(60), move || tx.send("kept").unwrap())
            .unwrap();
        timer.cancel_task(token);
        // Unknown token is ignored.
        timer.cancel_task(9999);

        assert_eq!(rx.recv_timeout(Duration::from_secs(2)), Ok("kept"));
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_tasks_fire_in_deadline_order() {
        let timer = MultiTimer::new().unwrap();
        let (tx, rx) = crossbeam_channel::unbounded();

        for (label, delay_ms) in [("c", 60), ("a", 20), ("b", 40)] {
            let tx = tx.clone();
            timer
                .submit_task(Duration::from_millis(delay_ms), move || tx.send(label).unwrap())
                .unwrap();
        }

        let order: Vec<_> = (0..3)
            .map(|_| rx.recv_timeout(Duration::from_secs(2)).unwrap())
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_tokens_are_unique() {
        let timer = MultiTimer::new().unwrap();
        let a = timer.submit_task(Duration::from_secs(60), || {}).unwrap();
        let b = timer.submit_task(Duration::from_secs(60), || {}).unwrap();
        assert!(b > a);
    }

    #[test]
    fn test_shutdown_drops_pending_tasks() {
        let timer = MultiTimer::new().unwrap();
        let (tx, rx) = crossbeam_channel::unbounded::<()>();

        timer
            .submit_task(Duration::from_millis(50), move || tx.send(()).unwrap())
            .unwrap();
        timer.shutdown();

        // The callback (and its sender) was dropped without running.
        assert_eq!(
            rx.recv_timeout(Duration::from_millis(200)),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected)
        );
        assert!(matches!(
            timer.submit_task(Duration::ZERO, || {}),
            Err(TimerError::ShutDown)
        ));
    }
}
