//! Calendar list and color palette endpoints

use std::collections::HashMap;

use axum::{Json, Router, extract::State, routing::get};
use one_core::remote::ColorDefinition;
use one_core::sync::CalendarListing;

use crate::routes::AppError;
use crate::session::Session;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/calendars", get(list_calendars))
        .route("/colors", get(colors))
}

/// GET /calendars - The user's calendar list and cached primary calendar
async fn list_calendars(
    session: Session,
    State(state): State<AppState>,
) -> Result<Json<CalendarListing>, AppError> {
    let listing = state.sync.list_calendars(&session.user_id).await?;
    Ok(Json(listing))
}

/// GET /colors - Event color id to RGB palette
async fn colors(
    session: Session,
    State(state): State<AppState>,
) -> Result<Json<HashMap<String, ColorDefinition>>, AppError> {
    let colors = state.sync.colors(&session.user_id).await?;
    Ok(Json(colors))
}
