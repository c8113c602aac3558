//! Availability ledger endpoints

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::NaiveDate;
use poc_common::AvailabilityRecord;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::ApiResult;
use crate::db::availability::{self, AvailabilityListing, AvailabilityMark};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    #[serde(default, alias = "fecha_desde")]
    pub from: Option<NaiveDate>,
    #[serde(default, alias = "fecha_hasta")]
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
pub struct DateLabelQuery {
    #[serde(alias = "fecha")]
    pub date: NaiveDate,
    #[serde(alias = "turno")]
    pub label: String,
}

#[derive(Debug, Deserialize)]
pub struct MarkRequest {
    #[serde(alias = "publicador_id")]
    pub publisher_id: Uuid,
    #[serde(flatten)]
    pub mark: AvailabilityMark,
}

#[derive(Debug, Deserialize)]
pub struct MarkManyRequest {
    #[serde(alias = "publicador_id")]
    pub publisher_id: Uuid,
    #[serde(alias = "disponibilidades")]
    pub entries: Vec<AvailabilityMark>,
}

#[derive(Debug, Serialize)]
pub struct MarkManyResponse {
    pub message: String,
    pub records: Vec<AvailabilityRecord>,
}

/// GET /api/disponibilidad/publicador/:publicador_id
pub async fn list_for_publisher(
    State(state): State<AppState>,
    Path(publisher_id): Path<Uuid>,
    query: Result<Query<RangeQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<AvailabilityRecord>>> {
    let Query(range) = query?;
    let records =
        availability::list_for_publisher(&state.db, publisher_id, range.from, range.to).await?;
    Ok(Json(records))
}

/// GET /api/disponibilidad/fecha-turno?fecha&turno
pub async fn list_for_date_label(
    State(state): State<AppState>,
    query: Result<Query<DateLabelQuery>, QueryRejection>,
) -> ApiResult<Json<Vec<AvailabilityListing>>> {
    let Query(query) = query?;
    let listings = availability::list_for_date_label(&state.db, query.date, &query.label).await?;
    Ok(Json(listings))
}

/// POST /api/disponibilidad
pub async fn mark(
    State(state): State<AppState>,
    payload: Result<Json<MarkRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<AvailabilityRecord>)> {
    let Json(request) = payload?;
    let record =
        availability::mark_availability(&state.db, request.publisher_id, request.mark).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// POST /api/disponibilidad/multiple
pub async fn mark_many(
    State(state): State<AppState>,
    payload: Result<Json<MarkManyRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MarkManyResponse>)> {
    let Json(request) = payload?;
    let records = availability::mark_availability_many(
        &state.db,
        request.publisher_id,
        &request.entries,
    )
    .await?;
    Ok((
        StatusCode::CREATED,
        Json(MarkManyResponse {
            message: format!("{} availability records saved", records.len()),
            records,
        }),
    ))
}

/// DELETE /api/disponibilidad/:id
pub async fn remove(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<Value>> {
    availability::remove_availability(&state.db, id).await?;
    Ok(Json(json!({ "message": "Availability removed" })))
}

pub fn availability_routes() -> Router<AppState> {
    Router::new()
        .route("/api/disponibilidad", post(mark))
        .route("/api/disponibilidad/multiple", post(mark_many))
        .route("/api/disponibilidad/publicador/:publicador_id", get(list_for_publisher))
        .route("/api/disponibilidad/fecha-turno", get(list_for_date_label))
        .route("/api/disponibilidad/:id", delete(remove))
}
