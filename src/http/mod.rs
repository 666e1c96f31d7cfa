//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, host, credentials)
//!     → manager (rule lookup, refresh policy)
//!     → security (credential check)
//!     → routing::resolver (target URL)
//!     → response.rs (redirect / 401 / 404 / 503)
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{UuidRequestId, X_REQUEST_ID};
pub use server::HttpServer;
