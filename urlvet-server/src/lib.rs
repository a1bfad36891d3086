//! # urlvet server
//!
//! HTTP surface and wiring for the urlvet URL scanning service.
//!
//! The binary exposes registration/login, scan submission with
//! dedup/caching, owner-scoped scan access, and a stats endpoint, while
//! a background worker drives submitted scans through the external
//! provider. Library form exists so handler-level tests can build the
//! router against in-memory stores.

pub mod auth;
pub mod errors;
pub mod handlers;
pub mod routes;
pub mod state;

pub use errors::{AppError, AppResult};
pub use routes::build_router;
pub use state::AppState;
