//! Core library for urlvet.
//!
//! Everything between the HTTP surface and PostgreSQL lives here:
//!
//! - [`store`] — durable, lockable scan storage (ports + Postgres and
//!   in-memory implementations)
//! - [`provider`] — the external scanning provider client
//! - [`resolver`] — request-time dedup/cache decisions
//! - [`worker`] — the fairness-aware batch worker driving scans through
//!   the submit/poll state machine
//! - [`metrics`] — process-local counters for operational visibility

pub mod error;
pub mod metrics;
pub mod provider;
pub mod resolver;
pub mod store;
pub mod worker;

pub use error::{Result, ScanError};
pub use metrics::{FailureReason, MetricsSnapshot, ScanMetrics};
pub use provider::{MockProvider, ScanProvider, UrlscanClient, UrlscanConfig};
pub use resolver::ScanResolver;
pub use store::{
    InMemoryScanStore, InMemoryUserStore, PostgresScanStore, PostgresUserStore, ScanClaimSession,
    ScanStore, UserStore,
};
pub use worker::{PassSummary, ScanWorker, WorkerConfig};
