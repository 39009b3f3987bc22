//! Signal handling for graceful shutdown
//!
//! Long-running commands stop on CTRL-C or SIGTERM. The signal is turned into
//! a broadcast so every background loop (the file swapper, a watch loop)
//! can subscribe.

use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Create a shutdown broadcaster and a first subscriber
pub fn create_shutdown_channel() -> (broadcast::Sender<()>, broadcast::Receiver<()>) {
    broadcast::channel(1)
}

/// Broadcast shutdown when the process receives CTRL-C or SIGTERM
pub fn spawn_signal_listener(shutdown_tx: broadcast::Sender<()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let ctrl_c = async {
            match signal::ctrl_c().await {
                Ok(()) => info!("Ctrl+C received, shutting down"),
                Err(e) => {
                    warn!("Could not listen for Ctrl+C: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("SIGTERM received, shutting down");
                }
                Err(e) => {
                    warn!("Could not listen for SIGTERM: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate => {}
        }

        let _ = shutdown_tx.send(());
    })
}
