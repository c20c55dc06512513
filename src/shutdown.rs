//! Graceful shutdown coordinator.
//!
//! Listens for SIGINT / SIGTERM, then raises a process-wide stop flag so
//! transfer workers can drain in-flight work before exiting. A second signal
//! marks shutdown as forced: outstanding workers are detached instead of
//! joined, so the process exits promptly even if a transfer is permanently
//! stuck waiting on a device that will never respond.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

type Waker = Box<dyn Fn() + Send + Sync>;

pub struct Shutdown {
    stop: AtomicBool,
    force: AtomicBool,
    signal_count: AtomicU32,
    wakers: Mutex<Vec<Waker>>,
}

impl Shutdown {
    pub fn new() -> Arc<Shutdown> {
        Arc::new(Shutdown {
            stop: AtomicBool::new(false),
            force: AtomicBool::new(false),
            signal_count: AtomicU32::new(0),
            wakers: Mutex::new(Vec::new()),
        })
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Whether workers should be detached rather than joined.
    pub fn force_requested(&self) -> bool {
        self.force.load(Ordering::Acquire)
    }

    /// Raise the stop flag and wake every registered waiter.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
        for wake in self.wakers.lock().iter() {
            wake();
        }
    }

    pub fn request_force(&self) {
        self.force.store(true, Ordering::Release);
    }

    /// Register a callback run whenever stop is requested. Used by blocking
    /// waiters (the transfer tracker's condvar) so they re-check the flag
    /// instead of sleeping through shutdown.
    pub fn notify_on_stop(&self, wake: impl Fn() + Send + Sync + 'static) {
        self.wakers.lock().push(Box::new(wake));
    }

    /// Record one delivered signal; returns the count including this one.
    pub fn signal(&self) -> u32 {
        let n = self.signal_count.fetch_add(1, Ordering::SeqCst) + 1;
        if n == 1 {
            self.request_stop();
        } else {
            self.request_force();
            self.request_stop();
        }
        n
    }

    /// Sleep in short chunks so a stop request cuts the wait short.
    pub fn interruptible_sleep(&self, total: Duration) {
        let deadline = std::time::Instant::now() + total;
        while !self.is_stopped() {
            let now = std::time::Instant::now();
            if now >= deadline {
                break;
            }
            std::thread::sleep((deadline - now).min(Duration::from_millis(100)));
        }
    }
}

/// Install the process signal handler. First signal drains, second forces.
pub fn install_signal_handler(shutdown: Arc<Shutdown>) -> anyhow::Result<()> {
    ctrlc::set_handler(move || {
        let n = shutdown.signal();
        if n == 1 {
            tracing::info!("Received shutdown signal, finishing current transfers...");
            tracing::info!("Press Ctrl+C again to force exit");
        } else {
            tracing::warn!("Force exit requested");
        }
    })?;
    Ok(())
}
