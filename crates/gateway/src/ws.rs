use std::sync::Arc;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::{SinkExt, StreamExt};
use pulsechat_protocol::frame::decode;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    registry::RegistryError,
    router::ConnCtx,
    state::GatewayState,
};

/// Connection lifecycle (§4.7): NEW→HANDSHAKING happens in the upgrade
/// handler (credential verification); this function runs HANDSHAKING→OPEN
/// through CLOSING→CLOSED for one accepted socket.
pub async fn handle_connection(
    socket: WebSocket,
    state: Arc<GatewayState>,
    user_id: Uuid,
    display_name: String,
) {
    let conn_id = Uuid::new_v4();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<String>();

    if let Err(RegistryError::TooManyConnections) =
        state.registry.attach(user_id, conn_id, outbound_tx.clone())
    {
        let _ = ws_tx
            .send(Message::Close(Some(CloseFrame {
                code: axum::extract::ws::close_code::POLICY,
                reason: "Too many connections".into(),
            })))
            .await;
        return;
    }

    // Per-socket outbound mailbox: every write to this socket, whether a
    // direct reply or a fan-out from another connection, goes through this
    // one task so writes are always serialized (§4.1, §5, §9).
    let write_task = tokio::spawn(async move {
        while let Some(json) = outbound_rx.recv().await {
            if ws_tx.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    state.heartbeat.on_connect(user_id).await;
    if let Some(offline) = state.offline_flush.flush(user_id).await {
        // Only clear the queue once the frame has actually been handed off
        // to the write task — a failed send means the socket is already
        // gone, and the queue must survive for the next connect (§4.6).
        if outbound_tx.send(offline.to_json()).is_ok() {
            state.offline_flush.confirm_delivered(user_id).await;
        } else {
            warn!(conn_id = %conn_id, %user_id, "offline flush could not be handed to write task, leaving queue intact");
        }
    }

    let ctx = ConnCtx { conn_id, user_id, display_name };

    while let Some(message) = ws_rx.next().await {
        let message = match message {
            Ok(message) => message,
            Err(err) => {
                debug!(conn_id = %conn_id, error = %err, "websocket read error");
                break;
            },
        };

        match message {
            Message::Text(text) => match decode(&text) {
                Ok(frame) => {
                    if let Some(reply) = state.router.dispatch(&ctx, frame).await {
                        let _ = outbound_tx.send(reply.to_json());
                    }
                },
                Err(err) => {
                    let frame = pulsechat_protocol::frame::ServerFrame::Error {
                        code: err.code,
                        message: err.message,
                    };
                    let _ = outbound_tx.send(frame.to_json());
                },
            },
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => {},
        }
    }

    drop(outbound_tx);
    let _ = write_task.await;

    if let Some(result) = state.registry.detach(conn_id) {
        state
            .heartbeat
            .on_disconnect(result.user_id, result.went_offline)
            .await;
    }
    info!(conn_id = %conn_id, %user_id, "connection closed");
}

/// Resolve the bearer credential from either an `Authorization: Bearer`
/// header or a `token` query parameter (§6.1: "either an authorization
/// header or a short-lived token query parameter").
pub fn extract_credential<'a>(auth_header: Option<&'a str>, token_query: Option<&'a str>) -> Option<&'a str> {
    if let Some(header) = auth_header
        && let Some(rest) = header.strip_prefix("Bearer ")
    {
        return Some(rest);
    }
    token_query
}

pub fn log_unauthorized_attempt(reason: &str) {
    warn!(reason, "rejected websocket handshake");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_credential_prefers_header() {
        let cred = extract_credential(Some("Bearer abc123"), Some("xyz"));
        assert_eq!(cred, Some("abc123"));
    }

    #[test]
    fn extract_credential_falls_back_to_query() {
        let cred = extract_credential(None, Some("xyz"));
        assert_eq!(cred, Some("xyz"));
    }

    #[test]
    fn extract_credential_none_when_both_absent() {
        assert_eq!(extract_credential(None, None), None);
    }
}
