use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use tracing::info;

/// Stop flag for the watch loop with interruptible waits.
///
/// Unlike `thread::sleep()`, a wait between ticks returns as soon as the
/// signal is triggered.
pub struct ShutdownSignal {
    shutdown: AtomicBool,
    condvar: Condvar,
    mutex: Mutex<()>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            shutdown: AtomicBool::new(false),
            condvar: Condvar::new(),
            mutex: Mutex::new(()),
        }
    }

    /// Signal with a Ctrl+C handler already attached.
    pub fn with_ctrlc() -> Result<Arc<Self>> {
        let signal = Arc::new(Self::new());
        let handler_signal = Arc::clone(&signal);
        ctrlc::set_handler(move || {
            info!("Received Ctrl+C, stopping...");
            handler_signal.trigger();
        })
        .context("Failed to install Ctrl+C handler")?;
        Ok(signal)
    }

    pub fn trigger(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.condvar.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Wait for the specified duration or until shutdown is triggered.
    ///
    /// Returns `true` if shutdown was triggered.
    pub fn wait(&self, duration: Duration) -> bool {
        if self.is_shutdown() {
            return true;
        }

        let Ok(guard) = self.mutex.lock() else {
            return true;
        };
        match self
            .condvar
            .wait_timeout_while(guard, duration, |_| !self.is_shutdown())
        {
            Ok((_, timeout)) => !timeout.timed_out(),
            // Poisoned mutex: stop the loop
            Err(_) => true,
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_trigger() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_shutdown());
        signal.trigger();
        assert!(signal.is_shutdown());
    }

    #[test]
    fn test_wait_timeout() {
        let signal = ShutdownSignal::new();
        let start = Instant::now();
        let interrupted = signal.wait(Duration::from_millis(50));

        assert!(!interrupted);
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_wait_interrupted() {
        let signal = Arc::new(ShutdownSignal::new());
        let waiter = Arc::clone(&signal);

        let handle = thread::spawn(move || {
            let start = Instant::now();
            let interrupted = waiter.wait(Duration::from_secs(10));
            (interrupted, start.elapsed())
        });

        thread::sleep(Duration::from_millis(50));
        signal.trigger();

        let (interrupted, elapsed) = handle.join().unwrap();
        assert!(interrupted);
        assert!(elapsed < Duration::from_secs(1));
    }

    #[test]
    fn test_wait_already_shutdown() {
        let signal = ShutdownSignal::new();
        signal.trigger();

        let start = Instant::now();
        assert!(signal.wait(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
