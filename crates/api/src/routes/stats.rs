//! Aggregate notification statistics.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use fairway_common::error::AppError;
use fairway_dispatch::repository::{BatchRepo, NotificationStats};

use crate::middleware::auth::AuthOperator;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/api/notifications/stats", get(stats))
}

/// GET /api/notifications/stats — batch and record counters.
async fn stats(
    State(state): State<AppState>,
    _auth: AuthOperator,
) -> Result<Json<NotificationStats>, AppError> {
    let stats = BatchRepo::stats(&state.pool).await?;
    Ok(Json(stats))
}
