//! Config manager subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP handler / control socket / file watcher
//!     → config_manager.rs (typed request)
//!     → actor.rs (bounded queue, single worker)
//!     → ConfigWorker (loader + current snapshot)
//!     → reply over oneshot
//!
//! Background refresh:
//!     worker decides → mailbox dispatch → queued Load → snapshot swap
//! ```
//!
//! # Design Decisions
//! - One worker owns the snapshot; no locks around rule data
//! - Snapshots are `Arc`-shared and immutable; a reload swaps the pointer
//! - Shutdown drains queued work before the worker exits

pub mod actor;
pub mod config_manager;

pub use actor::{ActiveObject, ActorError, ActorState, Handler, Mailbox, DEFAULT_QUEUE_CAPACITY};
pub use config_manager::{ConfigManager, LoadError};
