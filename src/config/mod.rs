//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! stdin / file / URL (YAML)
//!     → loader.rs (fetch raw bytes)
//!     → schema.rs (deserialize ConfigDocument, normalize)
//!     → validation.rs (collect every semantic error)
//!     → schema.rs (resolve defaults → RuleSet)
//!     → handed to the config manager as Arc<RuleSet>
//!
//! On file change:
//!     watcher.rs emits a signal
//!     → manager reloads through loader.rs
//!     → snapshot swapped only if the new document is valid
//! ```
//!
//! # Design Decisions
//! - Snapshots are immutable once built; changes require a full reload
//! - All fields have defaults to allow minimal documents
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{ConfigError, ConfigLoader, ConfigSource};
pub use schema::{RedirectRule, RuleSet, SourceKind};
pub use validation::ValidationError;
