//! Shift day endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use poc_common::ShiftDay;
use serde::Serialize;
use uuid::Uuid;

use super::ApiResult;
use crate::db::shifts::{self, DaySummary, DayUpdate, DayWithSlots, NewDay};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct DayDeleted {
    pub message: String,
    pub day: ShiftDay,
}

/// GET /api/poc-dias
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<DaySummary>>> {
    Ok(Json(shifts::list_days(&state.db).await?))
}

/// GET /api/poc-dias/:id
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DayWithSlots>> {
    Ok(Json(shifts::get_day(&state.db, id).await?))
}

/// POST /api/poc-dias
///
/// Slots without a capacity get the configured default.
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<NewDay>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<DayWithSlots>)> {
    let Json(new) = payload?;
    let day = shifts::create_day(&state.db, new, state.settings.default_capacity).await?;
    Ok((StatusCode::CREATED, Json(day)))
}

/// PUT /api/poc-dias/:id
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<DayUpdate>, JsonRejection>,
) -> ApiResult<Json<ShiftDay>> {
    let Json(update) = payload?;
    Ok(Json(shifts::update_day(&state.db, id, update).await?))
}

/// DELETE /api/poc-dias/:id
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DayDeleted>> {
    let day = shifts::delete_day(&state.db, id).await?;
    Ok(Json(DayDeleted {
        message: "Shift day deleted".to_string(),
        day,
    }))
}

pub fn day_routes() -> Router<AppState> {
    Router::new()
        .route("/api/poc-dias", get(list).post(create))
        .route("/api/poc-dias/:id", get(get_one).put(update).delete(remove))
}
