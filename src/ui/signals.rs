use crate::error::{Result, XplodeError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared by the caller and every worker.
///
/// Workers look at it before picking up a job; extractions already running
/// are left to finish.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    running: Arc<AtomicBool>,
    shutdown_message_shown: Arc<AtomicBool>,
}

impl ShutdownSignal {
    /// Install the handler for Ctrl+C, SIGTERM and SIGHUP. A second signal exits immediately.
    pub fn new() -> Result<Self> {
        let signal = Self::detached();

        let running = signal.running.clone();
        let message_shown = signal.shutdown_message_shown.clone();

        ctrlc::set_handler(move || {
            running.store(false, Ordering::SeqCst);

            if !message_shown.swap(true, Ordering::SeqCst) {
                eprintln!("\n🛑 Finishing running extractions... (press Ctrl+C again to force exit)");
            } else {
                eprintln!("\n💀 Force stopping...");
                std::process::exit(130);
            }
        })
        .map_err(|e| XplodeError::Config {
            message: format!("Failed to set signal handler: {}", e),
        })?;

        Ok(signal)
    }

    /// A signal that is not wired to Ctrl+C; only `request_shutdown` trips it.
    pub fn detached() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
            shutdown_message_shown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        !self.is_running()
    }

    pub fn check_shutdown(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(XplodeError::Cancelled);
        }
        Ok(())
    }

    pub fn request_shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn reset(&self) {
        self.running.store(true, Ordering::SeqCst);
        self.shutdown_message_shown.store(false, Ordering::SeqCst);
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Ctrl+C handler unavailable, continuing without it");
            Self::detached()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_signal() {
        let signal = ShutdownSignal::detached();
        assert!(signal.is_running());
        assert!(signal.check_shutdown().is_ok());

        signal.request_shutdown();
        assert!(signal.is_cancelled());
        assert!(matches!(signal.check_shutdown(), Err(XplodeError::Cancelled)));

        signal.reset();
        assert!(signal.is_running());
    }

    #[test]
    fn test_clones_share_state() {
        let signal = ShutdownSignal::detached();
        let worker_view = signal.clone();

        signal.request_shutdown();
        assert!(worker_view.is_cancelled());
    }

    #[test]
    fn test_visible_across_threads() {
        let signal = ShutdownSignal::detached();
        let remote = signal.clone();

        std::thread::spawn(move || remote.request_shutdown())
            .join()
            .unwrap();

        assert!(signal.is_cancelled());
    }
}
