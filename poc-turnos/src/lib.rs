//! poc-turnos library - shift-assignment service
//!
//! Validates, commits and suggests volunteer assignments for public
//! outreach shifts, and manages the records those operations read:
//! the volunteer directory, the availability ledger and the shift
//! registry.

use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod roster;

use roster::suggester::Suggester;
use roster::RosterSettings;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Engine tunables
    pub settings: RosterSettings,
    /// Suggestion generator; owns the tie-breaking RNG
    pub suggester: Arc<Suggester>,
}

impl AppState {
    /// Create new application state
    pub fn new(db: SqlitePool, settings: RosterSettings, suggestion_seed: Option<u64>) -> Self {
        Self {
            db,
            settings,
            suggester: Arc::new(Suggester::new(suggestion_seed)),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .merge(api::publisher_routes())
        .merge(api::day_routes())
        .merge(api::availability_routes())
        .merge(api::shift_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
