//! Event endpoints: pull-through listing and write-through mutations

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, put},
};
use one_core::event::EventInput;
use one_core::remote::RemoteEvent;
use one_core::sync::SyncOutcome;

use crate::routes::AppError;
use crate::routes::extract::{AppJson, AppPath};
use crate::session::Session;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route("/events/{id}", put(update_event).delete(delete_event))
}

/// GET /events - Sync every calendar, then return the user's mirror
async fn list_events(
    session: Session,
    State(state): State<AppState>,
) -> Result<Json<SyncOutcome>, AppError> {
    let outcome = state.sync.sync(&session.user_id).await?;
    Ok(Json(outcome))
}

/// POST /events - Create an event on the primary calendar
async fn create_event(
    session: Session,
    State(state): State<AppState>,
    AppJson(input): AppJson<EventInput>,
) -> Result<(StatusCode, Json<RemoteEvent>), AppError> {
    let event = state.gateway.create(&session.user_id, &input).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// PUT /events/:id - Replace an event's summary, description and times
async fn update_event(
    session: Session,
    State(state): State<AppState>,
    AppPath(event_id): AppPath<String>,
    AppJson(input): AppJson<EventInput>,
) -> Result<Json<RemoteEvent>, AppError> {
    let event = state
        .gateway
        .update(&session.user_id, &event_id, &input)
        .await?;
    Ok(Json(event))
}

/// DELETE /events/:id - Delete an event; deleting twice is not an error
async fn delete_event(
    session: Session,
    State(state): State<AppState>,
    AppPath(event_id): AppPath<String>,
) -> Result<StatusCode, AppError> {
    state.gateway.delete(&session.user_id, &event_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
