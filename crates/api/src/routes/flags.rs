//! Flag endpoint handlers.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{Actor, JsonBody, PathParams, QueryParams};
use domain::models::{
    CreateFlagRequest, FindFlagsQuery, Flag, FlagSnapshot, FlagSnapshotsQuery, PutFlagRequest,
    SetFlagEnabledRequest,
};

/// List flags.
///
/// GET /api/v1/flags?key=&description=&descriptionLike=&enabled=&limit=&offset=&preload=
pub async fn find_flags(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<FindFlagsQuery>,
) -> Result<Json<Vec<Flag>>, ApiError> {
    Ok(Json(state.service.find_flags(query).await?))
}

/// Create a flag.
///
/// POST /api/v1/flags
pub async fn create_flag(
    State(state): State<AppState>,
    actor: Actor,
    JsonBody(request): JsonBody<CreateFlagRequest>,
) -> Result<Json<Flag>, ApiError> {
    let flag = state
        .service
        .create_flag(request, actor.as_deref())
        .await?;
    Ok(Json(flag))
}

/// Get a flag with its full configuration.
///
/// GET /api/v1/flags/:flag_id
pub async fn get_flag(
    State(state): State<AppState>,
    PathParams(flag_id): PathParams<i64>,
) -> Result<Json<Flag>, ApiError> {
    Ok(Json(state.service.get_flag(flag_id).await?))
}

/// Update a flag.
///
/// PUT /api/v1/flags/:flag_id
pub async fn put_flag(
    State(state): State<AppState>,
    actor: Actor,
    PathParams(flag_id): PathParams<i64>,
    JsonBody(request): JsonBody<PutFlagRequest>,
) -> Result<Json<Flag>, ApiError> {
    let flag = state
        .service
        .put_flag(flag_id, request, actor.as_deref())
        .await?;
    Ok(Json(flag))
}

/// Delete a flag and its configuration.
///
/// DELETE /api/v1/flags/:flag_id
pub async fn delete_flag(
    State(state): State<AppState>,
    PathParams(flag_id): PathParams<i64>,
) -> Result<Json<Value>, ApiError> {
    state.service.delete_flag(flag_id).await?;
    Ok(Json(json!({})))
}

/// Enable or disable a flag.
///
/// PUT /api/v1/flags/:flag_id/enabled
pub async fn set_flag_enabled(
    State(state): State<AppState>,
    actor: Actor,
    PathParams(flag_id): PathParams<i64>,
    JsonBody(request): JsonBody<SetFlagEnabledRequest>,
) -> Result<Json<Flag>, ApiError> {
    let flag = state
        .service
        .set_flag_enabled(flag_id, request, actor.as_deref())
        .await?;
    Ok(Json(flag))
}

/// Snapshot history of a flag, oldest first.
///
/// GET /api/v1/flags/:flag_id/snapshots?limit=&offset=
pub async fn get_flag_snapshots(
    State(state): State<AppState>,
    PathParams(flag_id): PathParams<i64>,
    QueryParams(query): QueryParams<FlagSnapshotsQuery>,
) -> Result<Json<Vec<FlagSnapshot>>, ApiError> {
    Ok(Json(state.service.get_flag_snapshots(flag_id, query).await?))
}
