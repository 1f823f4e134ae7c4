use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{ConnectInfo, Query, State, WebSocketUpgrade},
    http::HeaderMap,
    response::{IntoResponse, Json},
    routing::get,
    Router as AxumRouter,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::{state::GatewayState, ws};

/// Build the gateway's HTTP + WebSocket router (shared between production
/// startup and tests), matching the teacher's `build_gateway_app` shape.
pub fn build_app(state: Arc<GatewayState>) -> AxumRouter {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    AxumRouter::new()
        .route("/health", get(health_handler))
        .route("/ws", get(ws_upgrade_handler))
        .layer(cors)
        .with_state(state)
}

#[derive(Deserialize)]
struct ConnectQuery {
    token: Option<String>,
}

async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": state.version,
        "protocol": pulsechat_protocol::PROTOCOL_VERSION,
        "connections": state.registry.total_connection_count(),
        "connectedUsers": state.registry.connected_user_count(),
    }))
}

async fn ws_upgrade_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(query): Query<ConnectQuery>,
    State(state): State<Arc<GatewayState>>,
) -> impl IntoResponse {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    let credential = ws::extract_credential(auth_header, query.token.as_deref());

    match state.auth.verify(credential).await {
        Ok(identity) => {
            if let Err(err) = state
                .store
                .ensure_user(identity.user_id, &identity.display_name)
                .await
            {
                warn!(user_id = %identity.user_id, error = %err, "failed to ensure user record before upgrade");
            }
            ws.on_upgrade(move |socket| {
                handle_with_remote(socket, state, identity.user_id, identity.display_name, addr)
            })
            .into_response()
        },
        Err(err) => {
            ws::log_unauthorized_attempt(&err.to_string());
            axum::http::StatusCode::UNAUTHORIZED.into_response()
        },
    }
}

async fn handle_with_remote(
    socket: axum::extract::ws::WebSocket,
    state: Arc<GatewayState>,
    user_id: uuid::Uuid,
    display_name: String,
    addr: SocketAddr,
) {
    info!(%user_id, remote = %addr, "websocket connection accepted");
    ws::handle_connection(socket, state, user_id, display_name).await;
}
