//! HTTP surface: health, websocket upgrades, and the event endpoint.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::info;

use sigil_core::{EventBus, EventContext, EventRequest, StorageProvider};

use crate::config::ServerConfig;
use crate::registry::ConnectionRegistry;
use crate::ws;

/// Shared handles threaded through every handler.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn StorageProvider>,
    pub registry: Arc<ConnectionRegistry>,
    pub bus: Arc<EventBus>,
    pub config: Arc<ServerConfig>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws::ws_global))
        .route("/ws/{entity_type}/{entity_id}", get(ws::ws_entity))
        .route(
            "/api/{entity_type}/{entity_id}/event/{event}",
            post(handle_event),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(state: AppState) -> Result<()> {
    let addr = state.config.listen_addr.clone();
    let app = router(state);

    info!(addr = %addr, "sigil-server listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
    }))
}

/// Run the effect list attached to an event, then fan the client effects
/// out to the entity's live subscribers.
async fn handle_event(
    State(state): State<AppState>,
    Path((entity_type, entity_id, event)): Path<(String, String, String)>,
    Json(request): Json<EventRequest>,
) -> impl IntoResponse {
    let entity_id_hint = request.entity_id.clone().or_else(|| {
        (entity_id != "new").then(|| entity_id.clone())
    });
    let new_state = request.new_state.clone().unwrap_or_else(|| event.clone());

    let mut context = EventContext::for_event(request.payload, entity_id_hint.as_deref());
    let response =
        sigil_core::process_effects(state.storage.clone(), &request.effects, &mut context, new_state)
            .await;

    if response.success {
        if !response.client_effects.is_empty() {
            state
                .registry
                .broadcast_client_effects(
                    &entity_type,
                    &entity_id,
                    &event,
                    &response.client_effects,
                    &response.data,
                )
                .await;
        }
        state
            .bus
            .emit(
                "event.processed",
                Some(json!({
                    "entityType": entity_type,
                    "entityId": entity_id,
                    "event": event,
                    "newState": response.new_state,
                })),
            )
            .await;
    }

    Json(response)
}
