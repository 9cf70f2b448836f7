//! Server-side components of the `tagseq` HTTP service.
//!
//! ## Submodules
//!
//! - [`config`] - CLI/environment configuration and validation.
//! - [`error`] - Mapping of domain errors onto HTTP responses.
//! - [`service`] - Router, caller identity and request handlers.
//! - [`telemetry`] - Structured logging and optional OpenTelemetry metrics.

pub mod config;
pub mod error;
pub mod service;
pub mod telemetry;
