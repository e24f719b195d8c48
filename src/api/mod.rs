//! API Module
//!
//! HTTP handlers and routing for the caching proxy. Every `/api` read goes
//! through the shared entity gateway, so proxied clients get the same
//! memoization, coalescing and write invalidation as in-process callers.

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
