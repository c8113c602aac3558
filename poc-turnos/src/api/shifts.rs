//! Shift slot endpoints: grouped availability, commit, suggest, clear, update

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    routing::{delete, get, post},
    Json, Router,
};
use chrono::NaiveDate;
use poc_common::ShiftSlot;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ApiResult;
use crate::db::{availability, shifts};
use crate::error::RosterError;
use crate::roster::committer::{self, CommitOutcome, SlotUpdate};
use crate::roster::grouping::{group_available, GroupedAvailability};
use crate::roster::suggester::Suggestion;
use crate::roster::validator::AssignmentRequest;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct GroupedQuery {
    #[serde(default, alias = "fecha")]
    pub date: Option<NaiveDate>,
    #[serde(default, alias = "turno")]
    pub label: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommitRequest {
    #[serde(alias = "poc_turno_id")]
    pub shift_id: Uuid,
    #[serde(default, alias = "asignaciones")]
    pub entries: Vec<AssignmentRequest>,
}

/// Outcome of a mutation with a human-readable summary
#[derive(Debug, Serialize)]
pub struct OutcomeResponse {
    pub message: String,
    #[serde(flatten)]
    pub outcome: CommitOutcome,
}

impl OutcomeResponse {
    fn new(message: &str, outcome: CommitOutcome) -> Self {
        Self {
            message: message.to_string(),
            outcome,
        }
    }
}

/// GET /api/turnos/disponibles?fecha&turno
pub async fn grouped_availability(
    State(state): State<AppState>,
    query: Result<Query<GroupedQuery>, QueryRejection>,
) -> ApiResult<Json<GroupedAvailability>> {
    let Query(query) = query?;
    let label = query
        .label
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty());
    let (date, label) = match (query.date, label) {
        (Some(date), Some(label)) => (date, label),
        _ => {
            let msg = "fecha and turno are required".to_string();
            return Err(RosterError::Validation(msg).into());
        }
    };

    let mut conn = state.db.acquire().await?;
    let publishers = availability::available_publishers(&mut conn, date, &label).await?;

    Ok(Json(group_available(publishers)))
}

/// GET /api/turnos/:id
pub async fn get_shift(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ShiftSlot>> {
    let mut conn = state.db.acquire().await?;
    let slot = shifts::get_shift(&mut conn, id)
        .await?
        .ok_or_else(|| RosterError::NotFound(format!("Shift {}", id)))?;
    Ok(Json(slot))
}

/// POST /api/turnos/asignar
///
/// Replaces the slot's assignment set with the submitted entries.
pub async fn commit(
    State(state): State<AppState>,
    payload: Result<Json<CommitRequest>, JsonRejection>,
) -> ApiResult<Json<OutcomeResponse>> {
    let Json(request) = payload?;
    let outcome =
        committer::commit(&state.db, &state.settings, request.shift_id, &request.entries).await?;
    Ok(Json(OutcomeResponse::new("Shift assigned", outcome)))
}

/// GET /api/turnos/:id/sugerir
pub async fn suggest(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Suggestion>> {
    let suggestion = state.suggester.suggest(&state.db, &state.settings, id).await?;
    Ok(Json(suggestion))
}

/// DELETE /api/turnos/:id/limpiar
pub async fn clear(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<OutcomeResponse>> {
    let outcome = committer::clear(&state.db, &state.settings, id).await?;
    Ok(Json(OutcomeResponse::new("Shift cleared", outcome)))
}

/// PATCH /api/turnos/:id
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<SlotUpdate>, JsonRejection>,
) -> ApiResult<Json<OutcomeResponse>> {
    let Json(update) = payload?;
    let outcome = committer::update_slot(&state.db, &state.settings, id, update).await?;
    Ok(Json(OutcomeResponse::new("Shift updated", outcome)))
}

pub fn shift_routes() -> Router<AppState> {
    Router::new()
        .route("/api/turnos/disponibles", get(grouped_availability))
        .route("/api/turnos/asignar", post(commit))
        .route("/api/turnos/:id", get(get_shift).patch(update))
        .route("/api/turnos/:id/sugerir", get(suggest))
        .route("/api/turnos/:id/limpiar", delete(clear))
}
