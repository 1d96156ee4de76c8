//! Segment endpoint handlers.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{Actor, JsonBody, PathParams};
use domain::models::{
    CreateSegmentRequest, PutSegmentReorderRequest, PutSegmentRequest, Segment,
};

/// GET /api/v1/flags/:flag_id/segments
pub async fn find_segments(
    State(state): State<AppState>,
    PathParams(flag_id): PathParams<i64>,
) -> Result<Json<Vec<Segment>>, ApiError> {
    Ok(Json(state.service.find_segments(flag_id).await?))
}

/// POST /api/v1/flags/:flag_id/segments
pub async fn create_segment(
    State(state): State<AppState>,
    actor: Actor,
    PathParams(flag_id): PathParams<i64>,
    JsonBody(request): JsonBody<CreateSegmentRequest>,
) -> Result<Json<Segment>, ApiError> {
    let segment = state
        .service
        .create_segment(flag_id, request, actor.as_deref())
        .await?;
    Ok(Json(segment))
}

/// PUT /api/v1/flags/:flag_id/segments/:segment_id
pub async fn put_segment(
    State(state): State<AppState>,
    actor: Actor,
    PathParams((flag_id, segment_id)): PathParams<(i64, i64)>,
    JsonBody(request): JsonBody<PutSegmentRequest>,
) -> Result<Json<Segment>, ApiError> {
    let segment = state
        .service
        .put_segment(flag_id, segment_id, request, actor.as_deref())
        .await?;
    Ok(Json(segment))
}

/// DELETE /api/v1/flags/:flag_id/segments/:segment_id
pub async fn delete_segment(
    State(state): State<AppState>,
    actor: Actor,
    PathParams((flag_id, segment_id)): PathParams<(i64, i64)>,
) -> Result<Json<Value>, ApiError> {
    state
        .service
        .delete_segment(flag_id, segment_id, actor.as_deref())
        .await?;
    Ok(Json(json!({})))
}

/// Reorder every segment of a flag.
///
/// PUT /api/v1/flags/:flag_id/segments/reorder
pub async fn put_segments_reorder(
    State(state): State<AppState>,
    actor: Actor,
    PathParams(flag_id): PathParams<i64>,
    JsonBody(request): JsonBody<PutSegmentReorderRequest>,
) -> Result<Json<Vec<Segment>>, ApiError> {
    let segments = state
        .service
        .put_segments_reorder(flag_id, request, actor.as_deref())
        .await?;
    Ok(Json(segments))
}
