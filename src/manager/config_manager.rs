//! Config manager: the active object owning the current rule snapshot.
//!
//! # Responsibilities
//! - Hold exactly one snapshot at a time; swap it only after a successful load
//! - Answer host lookups, applying the refresh policy around each match
//! - Serve port, snapshot and text-rendering queries from the same queue
//!
//! # Design Decisions
//! - Every operation goes through the worker queue, so reads never observe a
//!   half-applied reload
//! - A failed reload keeps the previous snapshot (including its load time)
//! - Background refreshes are queued behind the current command

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::oneshot;

use crate::config::loader::{ConfigError, ConfigLoader};
use crate::config::schema::{RedirectRule, RuleSet};
use crate::manager::actor::{ActiveObject, ActorError, ActorState, Handler, Mailbox};
use crate::observability::metrics;
use crate::refresh::{after_match, is_stale, MatchOutcome, RefreshTrigger, ReloadMode};
use crate::routing::matcher::match_domain;

/// Commands executed by the config worker.
enum Command {
    GetRedirect {
        host: String,
        reply: oneshot::Sender<Option<Arc<RedirectRule>>>,
    },
    /// Reload from source. `reply` is `None` for background refreshes.
    Load {
        trigger: &'static str,
        reply: Option<oneshot::Sender<Result<(), ConfigError>>>,
    },
    Port {
        reply: oneshot::Sender<u16>,
    },
    Snapshot {
        reply: oneshot::Sender<Arc<RuleSet>>,
    },
}

/// State owned by the worker task.
struct ConfigWorker {
    loader: ConfigLoader,
    snapshot: Arc<RuleSet>,
}

impl ConfigWorker {
    async fn reload(&mut self, trigger: &'static str) -> Result<(), ConfigError> {
        match self.loader.load().await {
            Ok(rules) => {
                tracing::info!(
                    trigger,
                    source = ?rules.source,
                    location = %rules.source_location,
                    redirects = rules.rules.len(),
                    "Config loaded"
                );
                tracing::debug!(config = %rules.to_yaml(), "Active config");
                metrics::record_reload(trigger, "success");
                self.snapshot = Arc::new(rules);
                Ok(())
            }
            Err(e) => {
                tracing::error!(
                    trigger,
                    error = %e,
                    "Failed to load config. Keeping current configuration."
                );
                metrics::record_reload(trigger, "failure");
                Err(e)
            }
        }
    }

    fn find(&self, host: &str) -> Option<Arc<RedirectRule>> {
        match_domain(host, &self.snapshot.rules, |rule| rule.from.as_str())
            .map(|index| Arc::clone(&self.snapshot.rules[index]))
    }

    async fn get_redirect(&mut self, host: &str, mailbox: &Mailbox<Command>) -> Option<Arc<RedirectRule>> {
        if is_stale(&self.snapshot, Utc::now()) {
            tracing::info!(host, "Config cache expired, reloading");
            let _ = self.reload(RefreshTrigger::Stale.as_str()).await;
        }

        let matched = self.find(host);

        let Some(decision) = after_match(&self.snapshot, host, MatchOutcome::of(&matched)) else {
            return matched;
        };

        tracing::info!(host, trigger = %decision.trigger, mode = ?decision.mode, "Refreshing config");
        match decision.mode {
            ReloadMode::BlockingRemap => {
                let _ = self.reload(decision.trigger.as_str()).await;
                self.find(host)
            }
            ReloadMode::Background => {
                mailbox.dispatch(Command::Load {
                    trigger: decision.trigger.as_str(),
                    reply: None,
                });
                matched
            }
        }
    }
}

impl Handler for ConfigWorker {
    type Command = Command;

    async fn handle(&mut self, command: Command, mailbox: &Mailbox<Command>) {
        match command {
            Command::GetRedirect { host, reply } => {
                let matched = self.get_redirect(&host, mailbox).await;
                let _ = reply.send(matched);
            }
            Command::Load { trigger, reply } => {
                let result = self.reload(trigger).await;
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            Command::Port { reply } => {
                let _ = reply.send(self.snapshot.port);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(Arc::clone(&self.snapshot));
            }
        }
    }
}

/// Error returned by [`ConfigManager::load_now`].
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Actor(#[from] ActorError),
}

/// Cloneable handle to the config worker.
#[derive(Clone)]
pub struct ConfigManager {
    actor: ActiveObject<Command>,
}

impl ConfigManager {
    /// Start a manager holding an empty, never-loaded snapshot.
    pub fn spawn(loader: ConfigLoader, queue_capacity: usize) -> Self {
        let source = loader.source();
        let snapshot = Arc::new(RuleSet::empty(source.kind(), source.location()));
        let worker = ConfigWorker { loader, snapshot };

        Self {
            actor: ActiveObject::spawn(worker, queue_capacity),
        }
    }

    /// Find the rule for `host`, refreshing the snapshot as policy requires.
    pub async fn get_redirect(&self, host: &str) -> Result<Option<Arc<RedirectRule>>, ActorError> {
        let host = host.to_string();
        self.actor
            .submit(|reply| Command::GetRedirect { host, reply })
            .await
    }

    /// Reload now and wait for the result.
    pub async fn load_now(&self) -> Result<(), LoadError> {
        self.load_with_trigger("manual").await
    }

    /// Reload now, attributing the reload to `trigger` in logs and metrics.
    pub async fn load_with_trigger(&self, trigger: &'static str) -> Result<(), LoadError> {
        self.actor
            .submit(|reply| Command::Load {
                trigger,
                reply: Some(reply),
            })
            .await??;
        Ok(())
    }

    /// Queue a reload without waiting for it.
    pub fn load_in_background(&self, trigger: &'static str) -> Result<(), ActorError> {
        self.actor.submit_async(Command::Load {
            trigger,
            reply: None,
        })
    }

    pub async fn port(&self) -> Result<u16, ActorError> {
        self.actor.submit(|reply| Command::Port { reply }).await
    }

    /// The current snapshot.
    pub async fn snapshot(&self) -> Result<Arc<RuleSet>, ActorError> {
        self.actor.submit(|reply| Command::Snapshot { reply }).await
    }

    /// The current snapshot rendered as YAML with passwords masked.
    pub async fn snapshot_text(&self) -> Result<String, ActorError> {
        Ok(self.snapshot().await?.to_yaml())
    }

    pub fn state(&self) -> ActorState {
        self.actor.state()
    }

    /// Stop accepting work, finish queued work, stop the worker.
    pub async fn close(&self) {
        self.actor.close().await;
        tracing::info!("Config manager closed");
    }
}
