//! Volunteer directory endpoints

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use poc_common::Publisher;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ApiResult;
use crate::db::publishers::{self, NewPublisher, PublisherDetail, PublisherUpdate};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PairRequest {
    #[serde(alias = "publicador1_id")]
    pub publisher_id: Uuid,
    #[serde(alias = "publicador2_id")]
    pub partner_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct PublisherMessage {
    pub message: String,
    pub publisher: Publisher,
}

#[derive(Debug, Serialize)]
pub struct PairResponse {
    pub message: String,
    pub publishers: Vec<Publisher>,
}

/// GET /api/publicadores
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<PublisherDetail>>> {
    Ok(Json(publishers::list_publishers(&state.db).await?))
}

/// GET /api/publicadores/:id
pub async fn get_one(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PublisherDetail>> {
    Ok(Json(publishers::get_publisher_detail(&state.db, id).await?))
}

/// POST /api/publicadores
pub async fn create(
    State(state): State<AppState>,
    payload: Result<Json<NewPublisher>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Publisher>)> {
    let Json(new) = payload?;
    let publisher = publishers::create_publisher(&state.db, new).await?;
    Ok((StatusCode::CREATED, Json(publisher)))
}

/// PUT /api/publicadores/:id
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Result<Json<PublisherUpdate>, JsonRejection>,
) -> ApiResult<Json<Publisher>> {
    let Json(update) = payload?;
    Ok(Json(publishers::update_publisher(&state.db, id, update).await?))
}

/// DELETE /api/publicadores/:id
pub async fn remove(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PublisherMessage>> {
    let publisher = publishers::delete_publisher(&state.db, id).await?;
    Ok(Json(PublisherMessage {
        message: "Publisher deleted".to_string(),
        publisher,
    }))
}

/// POST /api/publicadores/casar
pub async fn pair(
    State(state): State<AppState>,
    payload: Result<Json<PairRequest>, JsonRejection>,
) -> ApiResult<Json<PairResponse>> {
    let Json(request) = payload?;
    let (first, second) =
        publishers::pair_publishers(&state.db, request.publisher_id, request.partner_id).await?;
    Ok(Json(PairResponse {
        message: "Publishers paired".to_string(),
        publishers: vec![first, second],
    }))
}

/// POST /api/publicadores/:id/separar
pub async fn unpair(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PublisherMessage>> {
    let publisher = publishers::unpair_publisher(&state.db, id).await?;
    Ok(Json(PublisherMessage {
        message: "Publisher unpaired".to_string(),
        publisher,
    }))
}

pub fn publisher_routes() -> Router<AppState> {
    Router::new()
        .route("/api/publicadores", get(list).post(create))
        .route("/api/publicadores/casar", post(pair))
        .route("/api/publicadores/:id", get(get_one).put(update).delete(remove))
        .route("/api/publicadores/:id/separar", post(unpair))
}
