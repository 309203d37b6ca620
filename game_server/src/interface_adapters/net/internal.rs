// Read-only monitoring routes. Every query is answered by the world task
// between ticks, so responses always reflect a completed tick.

use crate::interface_adapters::http::error_response;
use crate::interface_adapters::protocol::{HealthResponse, PositionQuery, PositionResponse};
use crate::interface_adapters::state::AppState;
use crate::use_cases::GameEvent;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::{sync::Arc, time::Duration};
use sync_core::EntityId;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::warn;

const QUERY_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

pub async fn state_handler(State(state): State<Arc<AppState>>) -> Response {
    let (reply, rx) = oneshot::channel();
    match ask_world(&state, GameEvent::QuerySnapshot { reply }, rx).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(response) => response,
    }
}

pub async fn entity_position_handler(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<u64>,
    Query(query): Query<PositionQuery>,
) -> Response {
    let (reply, rx) = oneshot::channel();
    let event = GameEvent::QueryPosition {
        entity_id: EntityId(entity_id),
        at_ms: query.at_ms,
        reply,
    };
    match ask_world(&state, event, rx).await {
        Ok(Some(position)) => Json(PositionResponse::from(position)).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "entity not found"),
        Err(response) => response,
    }
}

async fn ask_world<T>(
    state: &AppState,
    event: GameEvent,
    rx: oneshot::Receiver<T>,
) -> Result<T, Response> {
    if state.input_tx.send(event).await.is_err() {
        warn!("world task unavailable for query");
        return Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "simulation unavailable",
        ));
    }
    match timeout(QUERY_TIMEOUT, rx).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(_)) | Err(_) => Err(error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "simulation did not answer",
        )),
    }
}
