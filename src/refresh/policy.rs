//! Refresh decisions for URL-sourced snapshots.
//!
//! # Responsibilities
//! - Staleness: decide before matching whether the snapshot must be reloaded
//! - Post-match heuristics: refresh domains first, then the blanket
//!   refresh-on-hit / refresh-on-miss flags
//! - Timing: blocking reload + rematch, or background reload
//!
//! # Design Decisions
//! - Pure functions over a snapshot; the caller supplies `now`
//! - Only the `url` source ever refreshes
//! - The first triggering condition wins; no double trigger

use std::fmt;

use chrono::{DateTime, Utc};

use crate::config::schema::{RuleSet, SourceKind, TriggerOn};
use crate::routing::matcher::match_domain;

/// Outcome of matching a host against the redirect rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Hit,
    Miss,
}

impl MatchOutcome {
    pub fn of<T>(matched: &Option<T>) -> Self {
        if matched.is_some() {
            MatchOutcome::Hit
        } else {
            MatchOutcome::Miss
        }
    }

    fn triggers(self, trigger_on: TriggerOn) -> bool {
        matches!(
            (self, trigger_on),
            (MatchOutcome::Hit, TriggerOn::Hit) | (MatchOutcome::Miss, TriggerOn::Miss)
        )
    }
}

/// Why a reload was requested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshTrigger {
    Stale,
    RefreshDomain { domain: String, trigger_on: TriggerOn },
    RefreshOnHit,
    RefreshOnMiss,
}

impl RefreshTrigger {
    /// Short label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshTrigger::Stale => "stale",
            RefreshTrigger::RefreshDomain { .. } => "refresh_domain",
            RefreshTrigger::RefreshOnHit => "refresh_on_hit",
            RefreshTrigger::RefreshOnMiss => "refresh_on_miss",
        }
    }
}

impl fmt::Display for RefreshTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RefreshTrigger::RefreshDomain { domain, trigger_on } => {
                write!(f, "refresh domain {domain:?} on {trigger_on:?}")
            }
            other => f.write_str(other.as_str()),
        }
    }
}

/// How a post-match reload runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadMode {
    /// Reload now, then recompute the match against the new snapshot.
    BlockingRemap,
    /// Queue the reload; the caller keeps the pre-reload match.
    Background,
}

/// A post-match reload decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshDecision {
    pub trigger: RefreshTrigger,
    pub mode: ReloadMode,
}

/// Whether the snapshot must be reloaded before matching.
///
/// A snapshot that was never loaded counts as stale.
pub fn is_stale(snapshot: &RuleSet, now: DateTime<Utc>) -> bool {
    if snapshot.source != SourceKind::Url {
        return false;
    }

    let Some(loaded_at) = snapshot.loaded_at else {
        return true;
    };

    match chrono::Duration::from_std(snapshot.refresh.cache_ttl) {
        Ok(ttl) => now.signed_duration_since(loaded_at) >= ttl,
        // A TTL beyond chrono's range never expires
        Err(_) => false,
    }
}

/// Decide whether the match outcome for `host` should trigger a reload.
pub fn after_match(snapshot: &RuleSet, host: &str, outcome: MatchOutcome) -> Option<RefreshDecision> {
    if snapshot.source != SourceKind::Url {
        return None;
    }

    let policy = &snapshot.refresh;
    let mode = if policy.remap_after_refresh {
        ReloadMode::BlockingRemap
    } else {
        ReloadMode::Background
    };

    let domain_trigger = match_domain(host, &policy.refresh_domains, |d| d.domain.as_str())
        .map(|index| &policy.refresh_domains[index])
        .filter(|domain| outcome.triggers(domain.trigger_on))
        .map(|domain| RefreshTrigger::RefreshDomain {
            domain: domain.domain.clone(),
            trigger_on: domain.trigger_on,
        });

    let trigger = domain_trigger.or(match outcome {
        MatchOutcome::Hit if policy.refresh_on_hit => Some(RefreshTrigger::RefreshOnHit),
        MatchOutcome::Miss if policy.refresh_on_miss => Some(RefreshTrigger::RefreshOnMiss),
        _ => None,
    })?;

    Some(RefreshDecision { trigger, mode })
}
