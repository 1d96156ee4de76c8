//! Constraint endpoint handlers.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{Actor, JsonBody, PathParams};
use domain::models::{Constraint, CreateConstraintRequest, PutConstraintRequest};

/// GET /api/v1/flags/:flag_id/segments/:segment_id/constraints
pub async fn find_constraints(
    State(state): State<AppState>,
    PathParams((flag_id, segment_id)): PathParams<(i64, i64)>,
) -> Result<Json<Vec<Constraint>>, ApiError> {
    Ok(Json(
        state.service.find_constraints(flag_id, segment_id).await?,
    ))
}

/// POST /api/v1/flags/:flag_id/segments/:segment_id/constraints
pub async fn create_constraint(
    State(state): State<AppState>,
    actor: Actor,
    PathParams((flag_id, segment_id)): PathParams<(i64, i64)>,
    JsonBody(request): JsonBody<CreateConstraintRequest>,
) -> Result<Json<Constraint>, ApiError> {
    let constraint = state
        .service
        .create_constraint(flag_id, segment_id, request, actor.as_deref())
        .await?;
    Ok(Json(constraint))
}

/// PUT /api/v1/flags/:flag_id/segments/:segment_id/constraints/:constraint_id
pub async fn put_constraint(
    State(state): State<AppState>,
    actor: Actor,
    PathParams((flag_id, segment_id, constraint_id)): PathParams<(i64, i64, i64)>,
    JsonBody(request): JsonBody<PutConstraintRequest>,
) -> Result<Json<Constraint>, ApiError> {
    let constraint = state
        .service
        .put_constraint(flag_id, segment_id, constraint_id, request, actor.as_deref())
        .await?;
    Ok(Json(constraint))
}

/// DELETE /api/v1/flags/:flag_id/segments/:segment_id/constraints/:constraint_id
pub async fn delete_constraint(
    State(state): State<AppState>,
    actor: Actor,
    PathParams((flag_id, segment_id, constraint_id)): PathParams<(i64, i64, i64)>,
) -> Result<Json<Value>, ApiError> {
    state
        .service
        .delete_constraint(flag_id, segment_id, constraint_id, actor.as_deref())
        .await?;
    Ok(Json(json!({})))
}
