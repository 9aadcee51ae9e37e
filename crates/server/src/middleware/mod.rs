//! HTTP middleware stack for the order processor.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. CORS (storefront origin only)
//!
//! [`ClientIp`] is an extractor rather than a layer; handlers that need the
//! caller's address take it as an argument.

pub mod client_ip;
pub mod request_id;

pub use client_ip::ClientIp;
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
