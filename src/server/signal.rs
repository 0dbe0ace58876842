// Signal handling module
//
// Supported signals:
// - SIGTERM: Graceful shutdown
// - SIGINT:  Graceful shutdown (Ctrl+C)

use std::sync::Arc;
use tokio::sync::Notify;

/// Signal handler state
pub struct SignalHandler {
    /// Shutdown signal (SIGTERM, SIGINT)
    pub shutdown: Arc<Notify>,
}

impl SignalHandler {
    pub fn new() -> Self {
        Self {
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Wake the accept loop
    pub fn trigger_shutdown(&self) {
        // notify_one stores a permit if the loop is not waiting yet
        self.shutdown.notify_one();
    }
}

impl Default for SignalHandler {
    fn default() -> Self {
        Self::new()
    }
}

/// Start signal handlers (Unix)
///
/// | Signal  | Action        |
/// |---------|---------------|
/// | SIGTERM | Graceful stop |
/// | SIGINT  | Graceful stop |
#[cfg(unix)]
pub fn start_signal_handler(handler: Arc<SignalHandler>) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::spawn(async move {
        tracing::info!("Signal handlers registered (SIGTERM, SIGINT), pid {}", std::process::id());
        tokio::select! {
            _ = sigterm.recv() => tracing::info!("SIGTERM received, initiating graceful shutdown"),
            _ = sigint.recv() => tracing::info!("SIGINT received, initiating graceful shutdown"),
        }
        handler.trigger_shutdown();
    });
    Ok(())
}

/// Non-Unix fallback - only handles Ctrl+C
#[cfg(not(unix))]
pub fn start_signal_handler(handler: Arc<SignalHandler>) -> std::io::Result<()> {
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            tracing::info!("Ctrl+C received, initiating graceful shutdown");
            handler.trigger_shutdown();
        }
    });
    Ok(())
}
