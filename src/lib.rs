//! Rental Cache - shared entity-access cache for a rental administration backend
//!
//! Memoizes entity reads for a bounded window, coalesces concurrent identical
//! reads into one network call, and invalidates precisely on writes.

pub mod api;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;

pub use api::AppState;
pub use backend::{Backend, HttpBackend};
pub use cache::{EntityId, Params};
pub use config::Config;
pub use error::{GatewayError, Result};
pub use gateway::{EntityGateway, GatewayStats, InvalidationPolicy};
