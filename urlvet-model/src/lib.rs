//! Shared data models for the urlvet URL scanning service.
//!
//! This crate holds the plain types exchanged between the core pipeline,
//! the HTTP layer, and persistence: the [`ScanRecord`] lifecycle types,
//! the [`User`] account type, and the API request/response payloads.

pub mod api;
pub mod scan;
pub mod user;

pub use api::{
    AuthResponse, CreateScanRequest, LoginRequest, PageRequest, PageOf, RegisterRequest,
    ValidationError,
};
pub use scan::{ScanRecord, ScanStatus, TransitionError};
pub use user::{Claims, User};
