//! Configuration for the urlvet service.
//!
//! Centralizes config defaults, environment-variable loading, and
//! validation warnings so the server binary has a single source of
//! truth for tunables. Every knob has a default; malformed values fall
//! back with a warning rather than aborting startup, and the loader
//! only fails on environment values that cannot be read at all.

pub mod loader;
pub mod models;
pub mod validation;

pub use loader::{ConfigLoad, ConfigLoadError, ConfigLoader};
pub use models::{
    AuthConfig, CacheConfig, Config, DatabaseConfig, ProviderConfig, ServerConfig, WorkerConfig,
};
pub use validation::{ConfigWarning, ConfigWarnings};
