use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
struct Flag {
    triggered: Mutex<bool>,
    cond: Condvar,
}

/// Cooperative stop signal shared by a node's background threads.
///
/// Cloning yields another handle to the same signal. Triggering is one-way.
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<Flag>);

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, bool> {
        self.0
            .triggered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn trigger(&self) {
        *self.lock() = true;
        self.0.cond.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *self.lock()
    }

    /// Sleep for up to `timeout`, waking early on trigger.
    /// Returns true if the signal fired.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut triggered = self.lock();
        while !*triggered {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            triggered = match self.0.cond.wait_timeout(triggered, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn wait_times_out_when_not_triggered() {
        let shutdown = Shutdown::new();
        let started = Instant::now();
        assert!(!shutdown.wait_timeout(Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn trigger_wakes_waiter_early() {
        let shutdown = Shutdown::new();
        let waiter = {
            let shutdown = shutdown.clone();
            thread::spawn(move || {
                let started = Instant::now();
                let fired = shutdown.wait_timeout(Duration::from_secs(30));
                (fired, started.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(20));
        shutdown.trigger();
        let (fired, elapsed) = waiter.join().unwrap();
        assert!(fired);
        assert!(elapsed < Duration::from_secs(10));
        assert!(shutdown.is_triggered());
    }

    #[test]
    fn already_triggered_returns_immediately() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        assert!(shutdown.wait_timeout(Duration::from_secs(30)));
    }
}
