//! The per-invocation request/response facade.
//!
//! This module provides:
//! - Request-field construction from the platform event
//! - The response emission facade with its formatting helpers
//! - The sentinel enforcing at-most-once response delivery

mod request;
mod response;
mod sentinel;

pub use request::{jsonp_callback, request_fields};
pub use response::Response;
pub use sentinel::ResponseSentinel;
