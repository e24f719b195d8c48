//! Invalidation Policy
//!
//! Static table that maps a successful write to the cache regions it must
//! clear, including cascades into other entities' caches.

use std::collections::HashMap;

use crate::cache::{build_key, record_path, CacheKey, EntityId, Params};

/// Kind of write that succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Create,
    Update,
    Patch,
    Delete,
}

/// A part of the cache to purge.
#[derive(Debug, Clone, PartialEq)]
pub enum Region {
    /// Every key under the entity path (lists, records, nested collections)
    Entity(String),
    /// Every key under one record's path
    Record { entity: String, id: EntityId },
    /// One exact query key
    Query(CacheKey),
    /// Every read of `entity` whose params include all of `params`
    Filtered { entity: String, params: Params },
}

impl Region {
    pub fn query(entity: &str, params: &Params) -> Self {
        Region::Query(build_key(entity, Some(params)))
    }

    pub fn filtered(entity: impl Into<String>, params: Params) -> Self {
        Region::Filtered {
            entity: entity.into(),
            params,
        }
    }

    /// Key every covered key starts with. Exact for `Query`.
    pub fn root(&self) -> CacheKey {
        match self {
            Region::Entity(entity) | Region::Filtered { entity, .. } => build_key(entity, None),
            Region::Record { entity, id } => build_key(&record_path(entity, id), None),
            Region::Query(key) => key.clone(),
        }
    }

    /// Whether purging this region removes `key`.
    pub fn covers(&self, key: &CacheKey) -> bool {
        match self {
            Region::Entity(_) | Region::Record { .. } => key.is_under(&self.root()),
            Region::Query(exact) => key == exact,
            Region::Filtered { entity, params } => key
                .params_of(entity)
                .is_some_and(|read| params.is_subset_of(&read)),
        }
    }
}

/// Write-to-region rules.
///
/// Every write clears its own entity; writes addressed to a record also clear
/// that record first. Cascades add regions of other entities.
#[derive(Debug, Clone, Default)]
pub struct InvalidationPolicy {
    cascades: HashMap<String, Vec<Region>>,
}

impl InvalidationPolicy {
    /// A policy with no cascades.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The rental domain's rules: tenant writes also stale the active-leases
    /// views, which join tenant data. That is every `leases` read filtered on
    /// `status=active`, whatever other params it carries, plus `leases/active`.
    pub fn standard() -> Self {
        let active = Params::new().with("status", "active");
        Self::empty()
            .with_cascade("tenants", Region::filtered("leases", active))
            .with_cascade("tenants", Region::Entity("leases/active".to_string()))
    }

    /// Adds a region cleared whenever `entity` is written.
    pub fn with_cascade(mut self, entity: impl Into<String>, region: Region) -> Self {
        self.cascades.entry(entity.into()).or_default().push(region);
        self
    }

    pub fn cascades_for(&self, entity: &str) -> &[Region] {
        self.cascades.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Regions a successful `kind` write to `entity` (and `id`) must clear.
    pub fn regions_for(&self, kind: WriteKind, entity: &str, id: Option<&EntityId>) -> Vec<Region> {
        let mut regions = Vec::new();

        if kind != WriteKind::Create {
            if let Some(id) = id {
                regions.push(Region::Record {
                    entity: entity.to_string(),
                    id: id.clone(),
                });
            }
        }
        regions.push(Region::Entity(entity.to_string()));
        regions.extend(self.cascades_for(entity).iter().cloned());
        regions
    }
}
