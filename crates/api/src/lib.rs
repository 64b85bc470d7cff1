//! HTTP API layer for hostelhub.
//!
//! This crate provides the REST API:
//!
//! - **Endpoints**: auth, staff administration, and the complaint lifecycle
//! - **Extractors**: authenticated user and caller-context extraction
//! - **Middleware**: bearer-token authentication
//!
//! Built on Axum 0.8 with Tower middleware stack.

pub mod endpoints;
pub mod extractors;
pub mod middleware;
pub mod response;

pub use endpoints::router;
