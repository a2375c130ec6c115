//! Notification batch routes: dispatch, list, show, resend, delete.

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use uuid::Uuid;

use fairway_common::error::AppError;
use fairway_common::types::{NotificationBatch, NotificationRecord};
use fairway_dispatch::dispatch::{DispatchService, DispatchSummary, SendOptions};
use fairway_dispatch::repository::{BatchRepo, RecordRepo};
use fairway_dispatch::resend::{ResendOutcome, ResendService};

use crate::middleware::auth::AuthOperator;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/tournaments/{id}/notifications", post(dispatch_batch))
        .route("/api/notifications", get(list_batches))
        .route(
            "/api/notifications/{id}",
            get(show_batch).delete(delete_batch),
        )
        .route("/api/notifications/{id}/resend", post(resend_batch))
}

fn default_true() -> bool {
    true
}

/// Request body for dispatching a tournament's notifications.
#[derive(Debug, Deserialize)]
struct DispatchRequest {
    year: i32,
    club_template: Option<String>,
    referee_template: Option<String>,
    institutional_template: Option<String>,
    #[serde(default = "default_true")]
    send_to_club: bool,
    #[serde(default = "default_true")]
    send_to_referees: bool,
    #[serde(default)]
    send_to_institutional: bool,
    #[serde(default)]
    include_attachments: bool,
    custom_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListParams {
    year: Option<i32>,
}

/// Batch plus its child records, for the detail view.
#[derive(Debug, serde::Serialize)]
struct BatchDetailResponse {
    batch: NotificationBatch,
    records: Vec<NotificationRecord>,
}

/// POST /api/tournaments/:id/notifications — dispatch a notification batch.
async fn dispatch_batch(
    State(state): State<AppState>,
    auth: AuthOperator,
    Path(tournament_id): Path<Uuid>,
    Json(req): Json<DispatchRequest>,
) -> Result<Json<DispatchSummary>, AppError> {
    let options = SendOptions {
        club_template: req.club_template,
        referee_template: req.referee_template,
        institutional_template: req.institutional_template,
        send_to_club: req.send_to_club,
        send_to_referees: req.send_to_referees,
        send_to_institutional: req.send_to_institutional,
        include_attachments: req.include_attachments,
        custom_message: req.custom_message,
        sent_by: auth.operator,
    };

    let summary = DispatchService::send(
        &state.pool,
        state.queue.as_ref(),
        tournament_id,
        req.year,
        &options,
        &state.config.institutional_emails,
    )
    .await?;

    Ok(Json(summary))
}

/// GET /api/notifications — list batches, optionally by tournament year.
async fn list_batches(
    State(state): State<AppState>,
    _auth: AuthOperator,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<NotificationBatch>>, AppError> {
    let batches = BatchRepo::list(&state.pool, params.year).await?;
    Ok(Json(batches))
}

/// GET /api/notifications/:id — batch detail with child records.
async fn show_batch(
    State(state): State<AppState>,
    _auth: AuthOperator,
    Path(id): Path<Uuid>,
) -> Result<Json<BatchDetailResponse>, AppError> {
    let batch = BatchRepo::get(&state.pool, id).await?;
    let records = RecordRepo::list_by_batch(&state.pool, id).await?;
    Ok(Json(BatchDetailResponse { batch, records }))
}

/// POST /api/notifications/:id/resend — re-queue failed records.
async fn resend_batch(
    State(state): State<AppState>,
    _auth: AuthOperator,
    Path(id): Path<Uuid>,
) -> Result<Json<ResendOutcome>, AppError> {
    let outcome = ResendService::resend(
        &state.pool,
        state.queue.as_ref(),
        id,
        state.config.resend_cooldown_minutes,
    )
    .await?;
    Ok(Json(outcome))
}

/// DELETE /api/notifications/:id — hard-delete a batch and its records.
async fn delete_batch(
    State(state): State<AppState>,
    auth: AuthOperator,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let deleted = BatchRepo::delete(&state.pool, id).await?;
    if deleted {
        tracing::info!(batch_id = %id, operator = %auth.operator, "Batch deleted");
        Ok(Json(serde_json::json!({"deleted": true})))
    } else {
        Err(AppError::NotFound(format!("Batch {} not found", id)))
    }
}
