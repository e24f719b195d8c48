//! Entity Gateway
//!
//! The read/write contract every feature area uses to reach backend entities.
//! Reads are memoized and coalesced; successful writes purge the regions the
//! invalidation policy names.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::policy::{InvalidationPolicy, Region, WriteKind};
use crate::backend::{Backend, BackendRequest, FileUpload, HttpBackend, Method, Payload};
use crate::cache::{
    build_key, record_path, related_path, CacheKey, CacheStore, EntityId, InFlightRegistry,
    Params, Ticket, DEFAULT_TTL_SECS,
};
use crate::config::Config;
use crate::error::{GatewayError, Result};

/// Path suffix of endpoints that accept multipart bodies.
const WITH_IMAGES: &str = "with-images";

/// Which registration a network read completes.
#[derive(Debug, Clone, Copy)]
enum Registration {
    /// Joinable read filed under its key
    Shared(Ticket),
    /// Forced read nobody can join
    Detached(Ticket),
}

/// Memoized reads and pending reads, guarded together.
struct GatewayState {
    store: CacheStore<Value>,
    inflight: InFlightRegistry<Value>,
}

// == Gateway Stats ==
/// Diagnostic snapshot of the cache.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStats {
    /// Number of cached entries, fresh or not yet swept
    pub size: usize,
    /// Number of reads currently in flight
    pub pending_requests: usize,
    /// Cached keys in sorted order
    pub keys: Vec<String>,
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub expirations: u64,
    /// hits / (hits + misses), 0.0 before the first read
    pub hit_rate: f64,
}

// == Entity Gateway ==
/// Shared entity-access cache in front of a `Backend`.
///
/// Cloning is cheap; all clones share one cache.
#[derive(Clone)]
pub struct EntityGateway {
    backend: Arc<dyn Backend>,
    state: Arc<RwLock<GatewayState>>,
    policy: Arc<InvalidationPolicy>,
    ttl: Duration,
}

impl EntityGateway {
    // == Constructors ==
    /// Creates a gateway with the 5-minute TTL and the standard policy.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            state: Arc::new(RwLock::new(GatewayState {
                store: CacheStore::new(),
                inflight: InFlightRegistry::new(),
            })),
            policy: Arc::new(InvalidationPolicy::standard()),
            ttl: Duration::from_secs(DEFAULT_TTL_SECS),
        }
    }

    /// Creates a gateway over `HttpBackend` from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let backend = HttpBackend::from_config(config)?;
        Ok(Self::new(Arc::new(backend)).with_ttl(config.ttl()))
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_policy(mut self, policy: InvalidationPolicy) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn policy(&self) -> &InvalidationPolicy {
        &self.policy
    }

    // == Reads ==
    /// Lists `entity`, optionally filtered by `params`.
    pub async fn get_all<T: DeserializeOwned>(
        &self,
        entity: &str,
        params: Option<&Params>,
        force_refresh: bool,
    ) -> Result<Vec<T>> {
        decode(self.get_json(entity, params, force_refresh).await?)
    }

    /// Reads one record.
    pub async fn get_by_id<T: DeserializeOwned>(
        &self,
        entity: &str,
        id: impl Into<EntityId>,
        params: Option<&Params>,
        force_refresh: bool,
    ) -> Result<T> {
        let path = record_path(entity, &id.into());
        decode(self.get_json(&path, params, force_refresh).await?)
    }

    /// Lists a nested collection such as `apartments/3/meter-readings`.
    pub async fn get_related<T: DeserializeOwned>(
        &self,
        entity: &str,
        id: impl Into<EntityId>,
        related: &str,
        params: Option<&Params>,
        force_refresh: bool,
    ) -> Result<Vec<T>> {
        let path = related_path(entity, &id.into(), related);
        decode(self.get_json(&path, params, force_refresh).await?)
    }

    /// Cached read of any entity path, returned as raw JSON.
    ///
    /// Without `force_refresh`: fresh entry, then pending read, then a new
    /// network call. With it: always the network, and the result overwrites
    /// the entry unless a write invalidated the key while it was in flight.
    pub async fn get_json(
        &self,
        path: &str,
        params: Option<&Params>,
        force_refresh: bool,
    ) -> Result<Value> {
        let key = build_key(path, params);
        let request = BackendRequest::get(path, params.cloned().unwrap_or_default());

        if force_refresh {
            debug!(key = %key, "forced refresh");
            return self.refresh(key, request).await;
        }

        let handle = {
            let mut state = self.state.write().await;
            state.store.sweep_expired();

            if let Some(value) = state.store.get(&key) {
                debug!(key = %key, "cache hit");
                return Ok(value);
            }

            if state.inflight.contains(&key) {
                debug!(key = %key, "joining in-flight read");
            } else {
                debug!(key = %key, "cache miss");
            }
            state
                .inflight
                .join(&key, |ticket| {
                    self.spawn_fetch(key.clone(), Registration::Shared(ticket), request)
                })
        };

        handle.await
    }

    /// Starts the network read for a registration.
    ///
    /// The read runs on its own task so it finishes even if every caller
    /// stops waiting. On completion it caches the value and drops the
    /// registration, unless a write revoked the registration meanwhile.
    fn spawn_fetch(
        &self,
        key: CacheKey,
        registration: Registration,
        request: BackendRequest,
    ) -> BoxFuture<'static, Result<Value>> {
        let backend = Arc::clone(&self.backend);
        let state = Arc::clone(&self.state);
        let ttl = self.ttl;

        let task = tokio::spawn(async move {
            let result = AssertUnwindSafe(backend.execute(request))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| Err(GatewayError::Internal("backend read panicked".to_string())));

            let mut state = state.write().await;
            let current = match registration {
                Registration::Shared(ticket) => state.inflight.complete(&key, ticket),
                Registration::Detached(ticket) => state.inflight.complete_detached(ticket),
            };
            if current {
                if let Ok(value) = &result {
                    state.store.put(key, value.clone(), ttl);
                }
            } else {
                debug!(key = %key, "read superseded by invalidation, result not cached");
            }
            result
        });

        async move {
            task.await
                .unwrap_or_else(|e| Err(GatewayError::Internal(format!("read task failed: {}", e))))
        }
        .boxed()
    }

    /// Forced read: nobody joins it, but invalidations still revoke it.
    async fn refresh(&self, key: CacheKey, request: BackendRequest) -> Result<Value> {
        let ticket = self.state.write().await.inflight.detach(&key);
        self.spawn_fetch(key, Registration::Detached(ticket), request)
            .await
    }

    /// Fetches a binary payload (e.g. a PDF). Never cached or coalesced.
    pub async fn download(&self, path: &str) -> Result<Vec<u8>> {
        debug!(path = %path, "binary download");
        self.backend.download(path).await
    }

    // == Writes ==
    /// Creates a record. Any `files` switch the request to the multipart
    /// `with-images` endpoint.
    pub async fn create<T, B>(&self, entity: &str, body: &B, files: Vec<FileUpload>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let payload = Payload::for_write(encode(body)?, files);
        let path = if payload.is_multipart() {
            format!("{}/{}", entity, WITH_IMAGES)
        } else {
            entity.to_string()
        };

        let value = self.write(Method::Post, path, payload).await?;
        self.invalidate_after(WriteKind::Create, entity, None).await;
        decode(value)
    }

    /// Replaces a record. Any `files` switch the request to the multipart
    /// `with-images` endpoint.
    pub async fn update<T, B>(
        &self,
        entity: &str,
        id: impl Into<EntityId>,
        body: &B,
        files: Vec<FileUpload>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let id = id.into();
        let payload = Payload::for_write(encode(body)?, files);
        let mut path = record_path(entity, &id);
        if payload.is_multipart() {
            path = format!("{}/{}", path, WITH_IMAGES);
        }

        let value = self.write(Method::Put, path, payload).await?;
        self.invalidate_after(WriteKind::Update, entity, Some(&id)).await;
        decode(value)
    }

    /// Partially updates a record.
    pub async fn patch<T, B>(&self, entity: &str, id: impl Into<EntityId>, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let id = id.into();
        let payload = Payload::Json(encode(body)?);

        let value = self
            .write(Method::Patch, record_path(entity, &id), payload)
            .await?;
        self.invalidate_after(WriteKind::Patch, entity, Some(&id)).await;
        decode(value)
    }

    /// Deletes a record.
    pub async fn delete(&self, entity: &str, id: impl Into<EntityId>) -> Result<()> {
        let id = id.into();
        self.write(Method::Delete, record_path(entity, &id), Payload::Empty)
            .await?;
        self.invalidate_after(WriteKind::Delete, entity, Some(&id)).await;
        Ok(())
    }

    /// Adds a record to a nested collection, e.g. a meter reading of an
    /// apartment. Clears the parent record's caches and the child entity's.
    pub async fn create_related<T, B>(
        &self,
        entity: &str,
        id: impl Into<EntityId>,
        related: &str,
        body: &B,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let id = id.into();
        let payload = Payload::Json(encode(body)?);

        let value = self
            .write(Method::Post, related_path(entity, &id, related), payload)
            .await?;

        let mut regions = self.policy.regions_for(WriteKind::Update, entity, Some(&id));
        regions.extend(self.policy.regions_for(WriteKind::Create, related, None));
        self.apply(&regions).await;
        decode(value)
    }

    async fn write(&self, method: Method, path: String, payload: Payload) -> Result<Value> {
        let request = BackendRequest::write(method, path, payload);
        match self.backend.execute(request.clone()).await {
            Ok(value) => Ok(value),
            Err(e) => {
                warn!(method = %request.method, path = %request.path, error = %e, "write failed, cache untouched");
                Err(e)
            }
        }
    }

    // == Invalidation ==
    async fn invalidate_after(&self, kind: WriteKind, entity: &str, id: Option<&EntityId>) {
        let regions = self.policy.regions_for(kind, entity, id);
        let removed = self.apply(&regions).await;
        info!(entity = %entity, ?kind, removed, "invalidated after write");
    }

    /// Purges `regions` from both the store and the in-flight registry.
    /// Returns the number of store entries removed.
    async fn apply(&self, regions: &[Region]) -> usize {
        let mut state = self.state.write().await;
        let mut removed = 0;
        for region in regions {
            let root = region.root();
            removed += match region {
                Region::Query(_) => {
                    state.inflight.evict(&root);
                    usize::from(state.store.evict(&root))
                }
                Region::Entity(_) | Region::Record { .. } => {
                    state.inflight.evict_by_prefix(&root);
                    state.store.evict_by_prefix(&root)
                }
                Region::Filtered { .. } => {
                    state.inflight.evict_where(|key| region.covers(key));
                    state.store.evict_where(|key| region.covers(key))
                }
            };
        }
        removed
    }

    /// Drops cached state of an entity, or of one record when `id` is given.
    pub async fn invalidate_cache(&self, entity: &str, id: Option<EntityId>) -> usize {
        let region = match id {
            Some(id) => Region::Record {
                entity: entity.to_string(),
                id,
            },
            None => Region::Entity(entity.to_string()),
        };
        let removed = self.apply(&[region]).await;
        info!(entity = %entity, removed, "cache invalidated");
        removed
    }

    /// Drops the one cached read of `entity` with exactly these params.
    pub async fn invalidate_cache_with_params(&self, entity: &str, params: &Params) -> usize {
        self.apply(&[Region::query(entity, params)]).await
    }

    /// Wipes the whole cache, pending reads included.
    pub async fn clear_cache(&self) -> usize {
        let mut state = self.state.write().await;
        let removed = state.store.clear();
        let pending = state.inflight.clear();
        info!(removed, pending, "cache cleared");
        removed
    }

    // == Stats ==
    pub async fn cache_stats(&self) -> GatewayStats {
        let state = self.state.read().await;
        let stats = state.store.stats();
        GatewayStats {
            size: state.store.len(),
            pending_requests: state.inflight.len(),
            keys: state.store.keys().into_iter().map(|k| k.to_string()).collect(),
            hits: stats.hits,
            misses: stats.misses,
            invalidations: stats.invalidations,
            expirations: stats.expirations,
            hit_rate: stats.hit_rate(),
        }
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Value> {
    serde_json::to_value(body).map_err(|e| GatewayError::InvalidRequest(e.to_string()))
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    Ok(serde_json::from_value(value)?)
}
