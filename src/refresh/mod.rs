//! Refresh policy subsystem.
//!
//! # Data Flow
//! ```text
//! GetRedirect(host)
//!     → policy::is_stale (before matching)
//!     → [blocking reload]
//!     → routing::matcher (match host)
//!     → policy::after_match (refresh domains, refresh-on-hit/miss)
//!     → BlockingRemap: reload + rematch | Background: queued reload
//! ```

pub mod policy;

pub use policy::{after_match, is_stale, MatchOutcome, RefreshDecision, RefreshTrigger, ReloadMode};
