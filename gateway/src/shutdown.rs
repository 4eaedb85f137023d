//! Process-wide shutdown signalling.
//!
//! Background loops subscribe to the [`ShutdownController`] and `select!` on
//! the receiver. Components that discover an unrecoverable condition (a
//! failed escrow bootstrap) only see it through the [`ShutdownHook`] trait.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::signal;
use tokio::sync::broadcast;

/// Asks the whole process to stop.
pub trait ShutdownHook: Send + Sync {
    fn request_shutdown(&self, reason: &str);
}

pub struct ShutdownController {
    tx: broadcast::Sender<()>,
    triggered: AtomicBool,
    reason: Mutex<Option<String>>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: AtomicBool::new(false),
            reason: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Signal every subscriber. Only the first call sends.
    pub fn shutdown(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            let _ = self.tx.send(());
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Why shutdown was requested through the hook, if it was.
    pub fn reason(&self) -> Option<String> {
        self.reason.lock().clone()
    }

    /// Wait for SIGTERM or SIGINT, then trigger shutdown.
    pub async fn wait_for_signal(&self) {
        let ctrl_c = signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "cannot listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => { tracing::info!("received SIGINT, shutting down"); }
            _ = terminate => { tracing::info!("received SIGTERM, shutting down"); }
        }

        self.shutdown();
    }
}

impl ShutdownHook for ShutdownController {
    fn request_shutdown(&self, reason: &str) {
        tracing::error!(reason, "shutdown requested");
        self.reason.lock().get_or_insert_with(|| reason.to_string());
        self.shutdown();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}
