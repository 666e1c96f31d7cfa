//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Authorization header
//!     → credentials.rs (decode Basic credentials)
//!     → credentials.rs (constant-time check against the rule's groups)
//!     → authorized / challenge with the rule's realm
//! ```
//!
//! # Design Decisions
//! - Only digests of stored passwords are kept in a snapshot
//! - Comparisons run over fixed-size digests, never the raw strings
//! - Every candidate user is compared; no early return on a match

pub mod credentials;

pub use credentials::{authorize, challenge, Credentials};
