//! Assistant tool definitions and invocation

use axum::{Json, Router, extract::State, routing::get};
use one_core::OneError;
use one_core::assistant::{ToolCall, ToolDefinition, ToolOutput, tool_definitions};
use serde_json::Value;
use tracing::debug;

use crate::routes::AppError;
use crate::routes::extract::AppJson;
use crate::session::Session;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/assistant/tools", get(list_tools).post(invoke_tool))
}

/// GET /assistant/tools - JSON-schema function definitions
async fn list_tools(_session: Session) -> Json<Vec<ToolDefinition>> {
    Json(tool_definitions())
}

/// POST /assistant/tools - Run one tool call `{"name": ..., "arguments": {...}}`
async fn invoke_tool(
    session: Session,
    State(state): State<AppState>,
    AppJson(body): AppJson<Value>,
) -> Result<Json<ToolOutput>, AppError> {
    let call: ToolCall = serde_json::from_value(body)
        .map_err(|e| OneError::InvalidInput(format!("Invalid tool call: {e}")))?;
    debug!(user_id = %session.user_id, ?call, "Invoking assistant tool");

    let output = state.assistant.invoke(&session.user_id, call).await?;
    Ok(Json(output))
}
