//! Shutdown signalling for the node's background tasks.

use tokio::sync::broadcast;

/// Fans one shutdown notice out to every [`ShutdownGuard`].
pub type ShutdownTx = broadcast::Sender<()>;

/// New shutdown sender with no subscribers yet.
pub fn shutdown_channel() -> ShutdownTx {
    broadcast::channel(1).0
}

/// Resolve on the first SIGINT or SIGTERM (Ctrl+C elsewhere).
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;
        let name = tokio::select! {
            _ = interrupt.recv() => "SIGINT",
            _ = terminate.recv() => "SIGTERM",
        };
        tracing::info!(signal = name, "shutdown requested");
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!(signal = "ctrl-c", "shutdown requested");
    }

    Ok(())
}

/// A task's subscription to the shutdown notice.
pub struct ShutdownGuard {
    rx: broadcast::Receiver<()>,
}

impl ShutdownGuard {
    /// Subscribe to `tx`. Notices sent before this call are not seen.
    pub fn new(tx: &ShutdownTx) -> Self {
        Self { rx: tx.subscribe() }
    }

    /// Resolve once shutdown is signalled or the sender is dropped.
    pub async fn wait(&mut self) {
        let _ = self.rx.recv().await;
    }
}
