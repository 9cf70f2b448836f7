//! HTTP service implementation.
//!
//! ## Structure
//!
//! - [`handler`] - Shared state (`TagService`), routes and request handlers.
//! - [`principal`] - Caller identity extracted from gateway headers.

pub mod handler;
pub mod principal;
