//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize subsystems in dependency order
//! - Start background tasks (file watcher, signals, control socket, metrics)
//! - Bind the HTTP listener and begin accepting traffic
//! - Tear everything down in order once shutdown is triggered
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listener starts last (traffic only when ready)
//! - Teardown: HTTP drain, then manager drain, then control socket

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use notify::RecommendedWatcher;
use tokio::net::TcpListener;

use crate::config::loader::{ConfigLoader, ConfigSource};
use crate::config::watcher::ConfigWatcher;
use crate::control::ControlServer;
use crate::http::HttpServer;
use crate::lifecycle::{signals, Shutdown};
use crate::manager::{ActorError, ConfigManager, LoadError, DEFAULT_QUEUE_CAPACITY};
use crate::observability::metrics;

/// Everything `start` needs to know.
#[derive(Debug, Clone)]
pub struct StartOptions {
    pub source: ConfigSource,
    /// Load, print the resolved config, exit.
    pub dry_run: bool,
    pub socket_path: PathBuf,
    pub metrics_address: Option<SocketAddr>,
    pub queue_capacity: usize,
}

impl StartOptions {
    pub fn new(source: ConfigSource) -> Self {
        Self {
            source,
            dry_run: false,
            socket_path: crate::control::default_socket_path(),
            metrics_address: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Fatal startup or serving error.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("could not load config: {0}")]
    Load(#[from] LoadError),

    #[error("config manager unavailable: {0}")]
    Manager(#[from] ActorError),

    #[error("could not bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("could not create control socket {path}: {source}")]
    Control {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not start metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("could not install signal handlers: {0}")]
    Signals(#[source] std::io::Error),

    #[error("HTTP server failed: {0}")]
    Serve(#[source] std::io::Error),
}

/// Run the redirect server until shutdown.
pub async fn run(options: StartOptions) -> Result<(), StartupError> {
    let manager = ConfigManager::spawn(ConfigLoader::new(options.source.clone()), options.queue_capacity);

    if let Err(e) = manager.load_with_trigger("startup").await {
        manager.close().await;
        return Err(e.into());
    }

    let config_text = manager.snapshot_text().await?;
    if options.dry_run {
        println!("{config_text}");
        manager.close().await;
        return Ok(());
    }
    tracing::info!(config = %config_text, "Configuration loaded");

    if let Some(addr) = options.metrics_address {
        metrics::init_metrics(addr)?;
    }

    let port = manager.port().await?;
    let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| StartupError::Bind { addr, source })?;

    let control = ControlServer::bind(&options.socket_path).map_err(|source| StartupError::Control {
        path: options.socket_path.clone(),
        source,
    })?;

    // `shutdown` carries requests from signals and control messages;
    // `control_stop` closes the control socket once everything else is down
    let shutdown = Shutdown::new();
    let control_stop = Shutdown::new();
    let control_task = tokio::spawn(control.run(shutdown.clone(), control_stop.subscribe()));

    signals::spawn_termination_handler(shutdown.clone()).map_err(StartupError::Signals)?;
    signals::spawn_reload_handler(manager.clone(), &shutdown).map_err(StartupError::Signals)?;

    // Dropping the watcher stops it, so it lives until teardown
    let _watcher = match &options.source {
        ConfigSource::File(path) => watch_config_file(path, manager.clone(), &shutdown),
        _ => None,
    };

    let served = HttpServer::new(manager.clone())
        .run(listener, shutdown.subscribe())
        .await;

    shutdown.trigger();
    manager.close().await;
    control_stop.trigger();
    if let Err(e) = control_task.await {
        tracing::error!(error = %e, "Control socket task failed");
    }

    tracing::info!("Shutdown complete");
    served.map_err(StartupError::Serve)
}

/// Reload on every change to the config file. Watch failures are not fatal.
fn watch_config_file(path: &Path, manager: ConfigManager, shutdown: &Shutdown) -> Option<RecommendedWatcher> {
    let (watcher, mut changes) = ConfigWatcher::new(path);
    let watcher = match watcher.run() {
        Ok(watcher) => watcher,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "Could not watch config file");
            return None;
        }
    };

    let mut stopped = shutdown.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                change = changes.recv() => {
                    if change.is_none() {
                        return;
                    }
                    match manager.load_with_trigger("file_change").await {
                        Ok(()) => tracing::info!("Config file changed; config reloaded"),
                        Err(LoadError::Actor(_)) => return,
                        Err(e) => tracing::error!(error = %e, "Config file changed, could not load new config"),
                    }
                }
                _ = stopped.recv() => return,
            }
        }
    });

    Some(watcher)
}
