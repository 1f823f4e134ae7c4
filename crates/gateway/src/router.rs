use std::sync::Arc;

use pulsechat_protocol::frame::{ClientFrame, ServerFrame};
use uuid::Uuid;

use crate::{delivery::DeliveryEngine, heartbeat::HeartbeatController};

/// Per-connection identity the Router dispatches on behalf of (§4.2).
pub struct ConnCtx {
    pub conn_id: Uuid,
    pub user_id: Uuid,
    pub display_name: String,
}

/// Router (C4, §4.2): one instance per connection, dispatching a single
/// decoded frame to a handler by `type`. Grounded on the teacher's
/// `MethodRegistry::dispatch` auth-then-dispatch shape, collapsed to a
/// `match` over §4.2's small fixed frame set.
pub struct Router {
    delivery: Arc<DeliveryEngine>,
    heartbeat: Arc<HeartbeatController>,
}

impl Router {
    pub fn new(delivery: Arc<DeliveryEngine>, heartbeat: Arc<HeartbeatController>) -> Self {
        Self { delivery, heartbeat }
    }

    /// Dispatch one already-decoded frame. Never returns an `Err` — any
    /// handler failure is converted to an `error` frame so the connection
    /// stays open (§4.2, §7: "the connection is not closed").
    pub async fn dispatch(&self, ctx: &ConnCtx, frame: ClientFrame) -> Option<ServerFrame> {
        match frame {
            ClientFrame::MessageSend {
                recipient_id,
                content,
                message_type,
            } => Some(
                self.delivery
                    .send_direct(ctx.user_id, &ctx.display_name, recipient_id, content, message_type)
                    .await
                    .unwrap_or_else(|e| ServerFrame::Error { code: e.code, message: e.message }),
            ),
            ClientFrame::MessageGroupSend {
                group_id,
                content,
                message_type,
            } => Some(
                self.delivery
                    .send_group(ctx.user_id, group_id, content, message_type)
                    .await
                    .unwrap_or_else(|e| ServerFrame::Error { code: e.code, message: e.message }),
            ),
            ClientFrame::MessageRead { message_id } => {
                match self.delivery.mark_read(ctx.user_id, message_id).await {
                    Ok(()) => None,
                    Err(e) => Some(ServerFrame::Error { code: e.code, message: e.message }),
                }
            },
            ClientFrame::Typing {
                recipient_id,
                group_id,
                is_typing,
            } => {
                self.delivery
                    .relay_typing(ctx.user_id, recipient_id, group_id, is_typing)
                    .await;
                None
            },
            ClientFrame::Ping => {
                self.heartbeat.on_ping(ctx.user_id).await;
                Some(ServerFrame::Pong)
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pulsechat_presence::InProcessPresenceStore;
    use pulsechat_protocol::error::ErrorCode;
    use pulsechat_store::InMemoryMessageStore;

    use super::*;
    use crate::registry::ConnectionRegistry;

    fn router() -> Router {
        let registry = Arc::new(ConnectionRegistry::new(5));
        let presence = Arc::new(InProcessPresenceStore::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
        ));
        let store = Arc::new(InMemoryMessageStore::new());
        let heartbeat = Arc::new(HeartbeatController::new(presence.clone()));
        let delivery = Arc::new(DeliveryEngine::new(registry, presence, store, heartbeat.clone()));
        Router::new(delivery, heartbeat)
    }

    fn ctx() -> ConnCtx {
        ConnCtx {
            conn_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            display_name: "alice".into(),
        }
    }

    #[tokio::test]
    async fn ping_replies_pong() {
        let router = router();
        let reply = router.dispatch(&ctx(), ClientFrame::Ping).await;
        assert!(matches!(reply, Some(ServerFrame::Pong)));
    }

    #[tokio::test]
    async fn message_send_missing_recipient_yields_error_frame() {
        let router = router();
        let frame = ClientFrame::MessageSend {
            recipient_id: None,
            content: "hi".into(),
            message_type: None,
        };
        let reply = router.dispatch(&ctx(), frame).await;
        match reply {
            Some(ServerFrame::Error { code, .. }) => assert_eq!(code, ErrorCode::MissingRecipient),
            _ => panic!("expected error frame"),
        }
    }

    #[tokio::test]
    async fn typing_produces_no_direct_reply() {
        let router = router();
        let frame = ClientFrame::Typing {
            recipient_id: Some(Uuid::new_v4()),
            group_id: None,
            is_typing: true,
        };
        let reply = router.dispatch(&ctx(), frame).await;
        assert!(reply.is_none());
    }
}
