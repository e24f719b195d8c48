//! Gateway Module
//!
//! The public entity read/write contract and the rules that keep its cache
//! consistent with writes.

mod entity;
pub mod policy;

pub use entity::{EntityGateway, GatewayStats};
pub use policy::{InvalidationPolicy, Region, WriteKind};
