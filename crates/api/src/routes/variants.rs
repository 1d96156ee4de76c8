//! Variant endpoint handlers.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{Actor, JsonBody, PathParams};
use domain::models::{CreateVariantRequest, PutVariantRequest, Variant};

/// GET /api/v1/flags/:flag_id/variants
pub async fn find_variants(
    State(state): State<AppState>,
    PathParams(flag_id): PathParams<i64>,
) -> Result<Json<Vec<Variant>>, ApiError> {
    Ok(Json(state.service.find_variants(flag_id).await?))
}

/// POST /api/v1/flags/:flag_id/variants
pub async fn create_variant(
    State(state): State<AppState>,
    actor: Actor,
    PathParams(flag_id): PathParams<i64>,
    JsonBody(request): JsonBody<CreateVariantRequest>,
) -> Result<Json<Variant>, ApiError> {
    let variant = state
        .service
        .create_variant(flag_id, request, actor.as_deref())
        .await?;
    Ok(Json(variant))
}

/// PUT /api/v1/flags/:flag_id/variants/:variant_id
pub async fn put_variant(
    State(state): State<AppState>,
    actor: Actor,
    PathParams((flag_id, variant_id)): PathParams<(i64, i64)>,
    JsonBody(request): JsonBody<PutVariantRequest>,
) -> Result<Json<Variant>, ApiError> {
    let variant = state
        .service
        .put_variant(flag_id, variant_id, request, actor.as_deref())
        .await?;
    Ok(Json(variant))
}

/// DELETE /api/v1/flags/:flag_id/variants/:variant_id
pub async fn delete_variant(
    State(state): State<AppState>,
    actor: Actor,
    PathParams((flag_id, variant_id)): PathParams<(i64, i64)>,
) -> Result<Json<Value>, ApiError> {
    state
        .service
        .delete_variant(flag_id, variant_id, actor.as_deref())
        .await?;
    Ok(Json(json!({})))
}
