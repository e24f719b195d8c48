//! Cache Module
//!
//! Key building, TTL-bounded memoization and single-flight coalescing of reads.

mod entry;
mod inflight;
mod key;
mod stats;
mod store;


// Re-export public types
pub use entry::CacheEntry;
pub use inflight::{InFlightHandle, InFlightRegistry, Ticket};
pub use key::{build_key, record_path, related_path, CacheKey, EntityId, ParamValue, Params};
pub use stats::CacheStats;
pub use store::CacheStore;

// == Public Constants ==
/// Freshness window applied to every entity read
pub const DEFAULT_TTL_SECS: u64 = 5 * 60;
