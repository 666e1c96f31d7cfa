//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGTERM, SIGINT, SIGHUP)
//! - Translate signals to internal events
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - SIGTERM/SIGINT trigger graceful shutdown
//! - SIGHUP triggers a config reload, not shutdown

use tokio::signal::unix::{signal, SignalKind};

use crate::lifecycle::Shutdown;
use crate::manager::ConfigManager;

/// Trigger `shutdown` on the first SIGINT or SIGTERM.
pub fn spawn_termination_handler(shutdown: Shutdown) -> std::io::Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    let mut stopped = shutdown.subscribe();

    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                    return;
                }
                tracing::info!("SIGINT received, shutting down");
            }
            _ = terminate.recv() => tracing::info!("SIGTERM received, shutting down"),
            _ = stopped.recv() => return,
        }
        shutdown.trigger();
    });
    Ok(())
}

/// Reload the config on every SIGHUP until shutdown.
pub fn spawn_reload_handler(manager: ConfigManager, shutdown: &Shutdown) -> std::io::Result<()> {
    let mut hangup = signal(SignalKind::hangup())?;
    let mut stopped = shutdown.subscribe();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                received = hangup.recv() => {
                    if received.is_none() {
                        return;
                    }
                    tracing::info!("SIGHUP received, reloading config");
                    if let Err(e) = manager.load_with_trigger("signal").await {
                        tracing::warn!(error = %e, "Reload after SIGHUP failed");
                    }
                }
                _ = stopped.recv() => return,
            }
        }
    });
    Ok(())
}
