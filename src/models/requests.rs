//! Request DTOs for the caching proxy
//!
//! Turns incoming path segments and query strings into gateway inputs.

use std::collections::HashMap;

use serde::Deserialize;

use crate::cache::Params;

/// Query flag that bypasses the cache for one read.
pub const REFRESH_FLAG: &str = "refresh";

/// Query string of a proxied read.
///
/// Every pair except `refresh` becomes a string parameter of the read. Empty
/// values (`?status=`) count as absent.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct ReadQuery(HashMap<String, String>);

impl ReadQuery {
    pub fn new(pairs: HashMap<String, String>) -> Self {
        Self(pairs)
    }

    /// Whether the caller asked to skip the cache.
    pub fn force_refresh(&self) -> bool {
        self.0
            .get(REFRESH_FLAG)
            .map(|v| matches!(v.as_str(), "true" | "1" | "yes"))
            .unwrap_or(false)
    }

    /// Parameters for the read, `None` when there are none.
    pub fn params(&self) -> Option<Params> {
        let params: Params = self
            .0
            .iter()
            .filter(|(name, value)| name.as_str() != REFRESH_FLAG && !value.is_empty())
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        if params.is_empty() {
            None
        } else {
            Some(params)
        }
    }
}

/// Validates a single path segment (entity, id or related collection).
///
/// Returns an error message if validation fails, None if valid.
pub fn validate_segment(segment: &str) -> Option<String> {
    if segment.is_empty() {
        return Some("Path segment cannot be empty".to_string());
    }
    if !segment
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Some(format!(
            "Path segment '{}' may only contain letters, digits, '-' and '_'",
            segment
        ));
    }
    None
}
