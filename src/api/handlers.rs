//! API Handlers
//!
//! HTTP request handlers that expose the entity gateway as a caching proxy.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;

use crate::cache::EntityId;
use crate::config::Config;
use crate::error::{GatewayError, Result};
use crate::gateway::EntityGateway;
use crate::models::{
    validate_segment, HealthResponse, InvalidateResponse, ReadQuery, StatsResponse,
};

/// Application state shared across all handlers.
///
/// The gateway is cheap to clone; every clone shares one cache.
#[derive(Clone)]
pub struct AppState {
    pub gateway: EntityGateway,
}

impl AppState {
    pub fn new(gateway: EntityGateway) -> Self {
        Self { gateway }
    }

    /// Creates a new AppState from configuration, talking HTTP to the backend.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(EntityGateway::from_config(config)?))
    }
}

fn check(segments: &[&str]) -> Result<()> {
    for segment in segments {
        if let Some(error_msg) = validate_segment(segment) {
            return Err(GatewayError::InvalidRequest(error_msg));
        }
    }
    Ok(())
}

// == Reads ==

/// Handler for GET /api/:entity
pub async fn list_handler(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Query(query): Query<ReadQuery>,
) -> Result<Json<Value>> {
    check(&[&entity])?;
    let params = query.params();
    let value = state
        .gateway
        .get_json(&entity, params.as_ref(), query.force_refresh())
        .await?;
    Ok(Json(value))
}

/// Handler for GET /api/:entity/:id
pub async fn get_handler(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
    Query(query): Query<ReadQuery>,
) -> Result<Json<Value>> {
    check(&[&entity, &id])?;
    let params = query.params();
    let value = state
        .gateway
        .get_by_id(&entity, EntityId::parse(&id), params.as_ref(), query.force_refresh())
        .await?;
    Ok(Json(value))
}

/// Handler for GET /api/:entity/:id/:related
pub async fn related_handler(
    State(state): State<AppState>,
    Path((entity, id, related)): Path<(String, String, String)>,
    Query(query): Query<ReadQuery>,
) -> Result<Json<Value>> {
    check(&[&entity, &id, &related])?;
    let params = query.params();
    let path = crate::cache::related_path(&entity, &EntityId::parse(&id), &related);
    let value = state
        .gateway
        .get_json(&path, params.as_ref(), query.force_refresh())
        .await?;
    Ok(Json(value))
}

// == Writes ==

/// Handler for POST /api/:entity
pub async fn create_handler(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>)> {
    check(&[&entity])?;
    let created = state.gateway.create(&entity, &body, Vec::new()).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Handler for PUT /api/:entity/:id
pub async fn update_handler(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    check(&[&entity, &id])?;
    let updated = state
        .gateway
        .update(&entity, EntityId::parse(&id), &body, Vec::new())
        .await?;
    Ok(Json(updated))
}

/// Handler for PATCH /api/:entity/:id
pub async fn patch_handler(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    check(&[&entity, &id])?;
    let patched = state
        .gateway
        .patch(&entity, EntityId::parse(&id), &body)
        .await?;
    Ok(Json(patched))
}

/// Handler for DELETE /api/:entity/:id
pub async fn delete_handler(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
) -> Result<StatusCode> {
    check(&[&entity, &id])?;
    state.gateway.delete(&entity, EntityId::parse(&id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handler for POST /api/:entity/:id/:related
pub async fn create_related_handler(
    State(state): State<AppState>,
    Path((entity, id, related)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Value>)> {
    check(&[&entity, &id, &related])?;
    let created = state
        .gateway
        .create_related(&entity, EntityId::parse(&id), &related, &body)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

// == Cache Administration ==

/// Handler for DELETE /cache
pub async fn clear_cache_handler(State(state): State<AppState>) -> Json<InvalidateResponse> {
    let removed = state.gateway.clear_cache().await;
    Json(InvalidateResponse::new("all entities", removed))
}

/// Handler for DELETE /cache/:entity
///
/// A non-empty query string narrows the purge to that exact read.
pub async fn invalidate_entity_handler(
    State(state): State<AppState>,
    Path(entity): Path<String>,
    Query(query): Query<ReadQuery>,
) -> Result<Json<InvalidateResponse>> {
    check(&[&entity])?;
    let removed = match query.params() {
        Some(params) => {
            state
                .gateway
                .invalidate_cache_with_params(&entity, &params)
                .await
        }
        None => state.gateway.invalidate_cache(&entity, None).await,
    };
    Ok(Json(InvalidateResponse::new(entity, removed)))
}

/// Handler for DELETE /cache/:entity/:id
pub async fn invalidate_record_handler(
    State(state): State<AppState>,
    Path((entity, id)): Path<(String, String)>,
) -> Result<Json<InvalidateResponse>> {
    check(&[&entity, &id])?;
    let removed = state
        .gateway
        .invalidate_cache(&entity, Some(EntityId::parse(&id)))
        .await;
    Ok(Json(InvalidateResponse::new(format!("{}/{}", entity, id), removed)))
}

/// Handler for GET /stats
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::from(state.gateway.cache_stats().await))
}

/// Handler for GET /health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
