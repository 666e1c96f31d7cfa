//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (host, path)
//!     → matcher.rs (exact patterns first, then wildcards)
//!     → matched RedirectRule or no match
//!     → resolver.rs (fill `*` labels, keep or replace path)
//!     → absolute Location URL + 307/308
//! ```
//!
//! # Design Decisions
//! - Target templates are parsed once per snapshot, not per request
//! - No regex in the hot path; label-wise comparison only
//! - Deterministic: same input always matches the same rule
//! - First match wins within each pass (document order)

pub mod matcher;
pub mod resolver;

pub use matcher::match_domain;
pub use resolver::{redirect_status, resolve, UrlTemplate};
