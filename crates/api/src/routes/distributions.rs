//! Distribution endpoint handlers.

use axum::{extract::State, Json};

use crate::app::AppState;
use crate::error::ApiError;
use crate::extractors::{Actor, JsonBody, PathParams};
use domain::models::{Distribution, PutDistributionsRequest};

/// GET /api/v1/flags/:flag_id/segments/:segment_id/distributions
pub async fn find_distributions(
    State(state): State<AppState>,
    PathParams((flag_id, segment_id)): PathParams<(i64, i64)>,
) -> Result<Json<Vec<Distribution>>, ApiError> {
    Ok(Json(
        state.service.find_distributions(flag_id, segment_id).await?,
    ))
}

/// Replace the distribution set of a segment.
///
/// PUT /api/v1/flags/:flag_id/segments/:segment_id/distributions
pub async fn put_distributions(
    State(state): State<AppState>,
    actor: Actor,
    PathParams((flag_id, segment_id)): PathParams<(i64, i64)>,
    JsonBody(request): JsonBody<PutDistributionsRequest>,
) -> Result<Json<Vec<Distribution>>, ApiError> {
    let distributions = state
        .service
        .put_distributions(flag_id, segment_id, request, actor.as_deref())
        .await?;
    Ok(Json(distributions))
}
