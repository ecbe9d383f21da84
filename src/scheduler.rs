use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Named, cancelable one-shot timers. Scheduling under a name that already
/// has a pending callback replaces it; `cancel` discards a pending callback
/// so it never fires.
pub trait Scheduler: Send + Sync {
    fn schedule(&self, name: &str, delay: Duration, callback: Box<dyn FnOnce() + Send>);
    fn cancel(&self, name: &str);
}

/// Host adapter running callbacks on the tokio runtime. Each named timeout is
/// a spawned task that sleeps and then runs its callback; replacing or
/// cancelling aborts the task at the sleep point.
#[derive(Default)]
pub struct TokioScheduler {
    tasks: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl TokioScheduler {
    pub fn new() -> TokioScheduler {
        TokioScheduler::default()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, name: &str, delay: Duration, callback: Box<dyn FnOnce() + Send>) {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback();
        });
        let replaced = match self.tasks.lock() {
            Ok(mut tasks) => tasks.insert(name.to_string(), handle),
            Err(_) => {
                error!("Could not get lock for scheduler task table");
                handle.abort();
                return;
            }
        };
        if let Some(prev) = replaced {
            prev.abort();
        }
    }

    fn cancel(&self, name: &str) {
        let removed = match self.tasks.lock() {
            Ok(mut tasks) => tasks.remove(name),
            Err(_) => {
                error!("Could not get lock for scheduler task table");
                return;
            }
        };
        if let Some(handle) = removed {
            handle.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            for (_, handle) in tasks.drain() {
                handle.abort();
            }
        }
    }
}

type PendingCallback = (String, Duration, Box<dyn FnOnce() + Send>);

/// Deterministic scheduler: callbacks are held until fired explicitly.
/// Useful for simulation and for tests that step the pacing state machine by
/// hand instead of waiting on wall-clock time.
#[derive(Default)]
pub struct ManualScheduler {
    pending: Mutex<Vec<PendingCallback>>,
}

impl ManualScheduler {
    pub fn new() -> ManualScheduler {
        ManualScheduler::default()
    }

    /// Runs the pending callback under `name`, if any. Returns whether one
    /// fired. The callback runs outside the internal lock, so it may
    /// re-schedule freely.
    pub fn fire(&self, name: &str) -> bool {
        let callback = {
            let Ok(mut pending) = self.pending.lock() else {
                return false;
            };
            match pending.iter().position(|(n, _, _)| n == name) {
                Some(index) => pending.remove(index).2,
                None => return false,
            }
        };
        callback();
        true
    }

    pub fn is_scheduled(&self, name: &str) -> bool {
        self.pending
            .lock()
            .map(|p| p.iter().any(|(n, _, _)| n == name))
            .unwrap_or(false)
    }

    /// Delay the named callback was scheduled with.
    pub fn delay_of(&self, name: &str) -> Option<Duration> {
        self.pending
            .lock()
            .ok()?
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, delay, _)| *delay)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, name: &str, delay: Duration, callback: Box<dyn FnOnce() + Send>) {
        let Ok(mut pending) = self.pending.lock() else {
            error!("Could not get lock for manual scheduler");
            return;
        };
        pending.retain(|(n, _, _)| n != name);
        pending.push((name.to_string(), delay, callback));
    }

    fn cancel(&self, name: &str) {
        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|(n, _, _)| n != name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn manual_scheduler_replaces_by_name() {
        let scheduler = ManualScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let f = fired.clone();
        scheduler.schedule(
            "t",
            Duration::from_millis(100),
            Box::new(move || {
                f.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let f = fired.clone();
        scheduler.schedule(
            "t",
            Duration::from_millis(50),
            Box::new(move || {
                f.fetch_add(10, Ordering::SeqCst);
            }),
        );

        assert_eq!(scheduler.pending_len(), 1);
        assert_eq!(scheduler.delay_of("t"), Some(Duration::from_millis(50)));
        assert!(scheduler.fire("t"));
        assert_eq!(fired.load(Ordering::SeqCst), 10);
        assert!(!scheduler.fire("t"));
    }

    #[test]
    fn manual_scheduler_cancel_discards() {
        let scheduler = ManualScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        scheduler.schedule(
            "t",
            Duration::ZERO,
            Box::new(move || {
                f.fetch_add(1, Ordering::SeqCst);
            }),
        );
        scheduler.cancel("t");
        assert!(!scheduler.fire("t"));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn tokio_scheduler_fires_after_delay() {
        let scheduler = TokioScheduler::new();
        let (tx, rx) = tokio::sync::oneshot::channel();
        scheduler.schedule(
            "t",
            Duration::from_millis(5),
            Box::new(move || {
                let _ = tx.send(());
            }),
        );
        tokio::time::timeout(Duration::from_secs(1), rx)
            .await
            .expect("timeout waiting for callback")
            .expect("callback dropped without firing");
    }

    #[tokio::test]
    async fn tokio_scheduler_cancel_prevents_firing() {
        let scheduler = TokioScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let f = fired.clone();
        scheduler.schedule(
            "t",
            Duration::from_millis(50),
            Box::new(move || {
                f.fetch_add(1, Ordering::SeqCst);
            }),
        );
        scheduler.cancel("t");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn tokio_scheduler_reschedule_replaces() {
        let scheduler = TokioScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        let f = fired.clone();
        scheduler.schedule(
            "t",
            Duration::from_millis(50),
            Box::new(move || {
                f.fetch_add(1, Ordering::SeqCst);
            }),
        );
        let (tx, rx) = tokio::sync::oneshot::channel();
        scheduler.schedule(
            "t",
            Duration::from_millis(5),
            Box::new(move || {
                let _ = tx.send(());
            }),
        );

        tokio::time::timeout(Duration::from_secs(1), rx)
            .await
            .expect("timeout waiting for replacement callback")
            .expect("replacement callback dropped");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
