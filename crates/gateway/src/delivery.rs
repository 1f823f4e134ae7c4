use std::sync::Arc;

use pulsechat_common::{new_id, Timestamp};
use pulsechat_presence::{PresenceStore, QueuePointer};
use pulsechat_protocol::{
    constants::{DEFAULT_MESSAGE_KIND, MAX_CONTENT_CHARS},
    error::{ErrorCode, ErrorShape},
    frame::ServerFrame,
};
use pulsechat_store::{DirectMessage, GroupMessage, MessageStore};
use tracing::warn;
use uuid::Uuid;

use crate::{heartbeat::HeartbeatController, metrics, registry::ConnectionRegistry};

/// Delivery Engine (C5, §4.3): fan-out for direct and group messages,
/// choosing live-send vs queue-and-persist, and emitting sender acks.
/// Grounded on the teacher's `LiveChatService::send` spawn-and-track
/// pattern (fire-and-forget persist) and `GatewayState::next_seq`-style
/// broadcast shape, generalized from an agent-run id to a message id.
pub struct DeliveryEngine {
    registry: Arc<ConnectionRegistry>,
    presence: Arc<dyn PresenceStore>,
    store: Arc<dyn MessageStore>,
    heartbeat: Arc<HeartbeatController>,
}

impl DeliveryEngine {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        presence: Arc<dyn PresenceStore>,
        store: Arc<dyn MessageStore>,
        heartbeat: Arc<HeartbeatController>,
    ) -> Self {
        Self {
            registry,
            presence,
            store,
            heartbeat,
        }
    }

    /// Write `frame` to every live socket of `user_id`. A send failure
    /// (remote closed) detaches that socket immediately (§7: "Transport
    /// faults... the Registry detaches that socket; the handler continues
    /// with the remaining sockets"). Returns the number of sockets the
    /// frame was actually handed to.
    async fn fanout(&self, user_id: Uuid, frame: &ServerFrame) -> usize {
        let json = frame.to_json();
        let sockets = self.registry.sockets_for(user_id);
        let mut accepted = 0;
        for socket in sockets {
            if socket.sender.send(json.clone()).is_ok() {
                accepted += 1;
            } else if let Some(result) = self.registry.detach(socket.conn_id) {
                self.heartbeat
                    .on_disconnect(result.user_id, result.went_offline)
                    .await;
            }
        }
        accepted
    }

    fn validate_content(content: &str) -> Result<(), ErrorShape> {
        if content.is_empty() {
            return Err(ErrorShape::new(ErrorCode::EmptyContent, "content must not be empty"));
        }
        if content.chars().count() > MAX_CONTENT_CHARS {
            return Err(ErrorShape::new(
                ErrorCode::EmptyContent,
                format!("content exceeds {MAX_CONTENT_CHARS} characters"),
            ));
        }
        Ok(())
    }

    /// §4.3 "Direct send".
    pub async fn send_direct(
        &self,
        sender_id: Uuid,
        sender_username: &str,
        recipient_id: Option<Uuid>,
        content: String,
        message_type: Option<String>,
    ) -> Result<ServerFrame, ErrorShape> {
        Self::validate_content(&content)?;
        let Some(recipient_id) = recipient_id else {
            return Err(ErrorShape::new(ErrorCode::MissingRecipient, "recipient_id is required"));
        };

        let message_id = new_id();
        let created_at = Timestamp::now();
        let kind = message_type.unwrap_or_else(|| DEFAULT_MESSAGE_KIND.to_string());

        let new_frame = ServerFrame::MessageNew {
            message_id,
            sender_id,
            sender_username: sender_username.to_string(),
            content: content.clone(),
            message_type: kind.clone(),
            created_at: created_at.to_rfc3339_millis(),
        };

        let online = self.presence.is_online(recipient_id).await;
        let accepted = if online { self.fanout(recipient_id, &new_frame).await } else { 0 };

        if accepted > 0 {
            // Async persist: live latency should track the socket write,
            // not a store round-trip (§4.3 "Correctness notes").
            let store = Arc::clone(&self.store);
            let message = DirectMessage {
                id: message_id,
                sender: sender_id,
                recipient: recipient_id,
                body: content,
                kind,
                created_at,
                delivered_at: Some(created_at),
                read_at: None,
            };
            tokio::spawn(async move {
                if let Err(err) = store.save_direct_message(&message).await {
                    warn!(message_id = %message.id, error = %err, "failed to persist delivered direct message");
                }
            });

            metrics::record_message_delivered();
            return Ok(ServerFrame::MessageAck {
                message_id,
                delivered: true,
                queued: false,
                delivered_count: None,
                timestamp: created_at.to_rfc3339_millis(),
            });
        }

        // Offline path (or a presence/registry race landed zero accepting
        // sockets, per §9's fall-through note): persist synchronously,
        // since the queue entry is useless without a row behind it.
        let message = DirectMessage {
            id: message_id,
            sender: sender_id,
            recipient: recipient_id,
            body: content,
            kind,
            created_at,
            delivered_at: None,
            read_at: None,
        };
        if let Err(err) = self.store.save_direct_message(&message).await {
            warn!(message_id = %message_id, error = %err, "failed to persist offline direct message");
            metrics::record_message_dropped();
            return Err(ErrorShape::new(
                ErrorCode::InternalError,
                "failed to persist message; not queued",
            ));
        }
        self.presence
            .enqueue(recipient_id, QueuePointer::direct(message_id))
            .await;
        metrics::record_message_queued();

        Ok(ServerFrame::MessageAck {
            message_id,
            delivered: false,
            queued: true,
            delivered_count: None,
            timestamp: created_at.to_rfc3339_millis(),
        })
    }

    /// §4.3 "Group send".
    pub async fn send_group(
        &self,
        sender_id: Uuid,
        group_id: Option<Uuid>,
        content: String,
        message_type: Option<String>,
    ) -> Result<ServerFrame, ErrorShape> {
        Self::validate_content(&content)?;
        let Some(group_id) = group_id else {
            return Err(ErrorShape::new(ErrorCode::MissingGroup, "group_id is required"));
        };
        if !self
            .store
            .is_group_member(group_id, sender_id)
            .await
            .unwrap_or(false)
        {
            return Err(ErrorShape::new(ErrorCode::NotMember, "sender is not a member of this group"));
        }

        let members = self
            .store
            .group_members(group_id)
            .await
            .map_err(|e| ErrorShape::new(ErrorCode::InternalError, e.to_string()))?;
        let recipient_ids: Vec<Uuid> = members
            .iter()
            .map(|m| m.user_id)
            .filter(|&id| id != sender_id)
            .collect();

        let message_id = new_id();
        let created_at = Timestamp::now();
        let kind = message_type.unwrap_or_else(|| DEFAULT_MESSAGE_KIND.to_string());

        let (online, offline) = self.presence.partition(&recipient_ids).await;

        let new_frame = ServerFrame::MessageGroupNew {
            message_id,
            group_id,
            sender_id,
            content: content.clone(),
            message_type: kind.clone(),
            created_at: created_at.to_rfc3339_millis(),
        };
        for &recipient in &online {
            self.fanout(recipient, &new_frame).await;
        }
        for &recipient in &offline {
            self.presence
                .enqueue(recipient, QueuePointer::group(message_id, group_id))
                .await;
        }

        let store = Arc::clone(&self.store);
        let message = GroupMessage {
            id: message_id,
            group_id,
            sender: sender_id,
            body: content,
            kind,
            created_at,
        };
        tokio::spawn(async move {
            if let Err(err) = store.save_group_message(&message).await {
                warn!(message_id = %message.id, error = %err, "failed to persist group message");
            }
        });

        Ok(ServerFrame::MessageAck {
            message_id,
            delivered: !online.is_empty(),
            queued: false,
            delivered_count: Some(online.len()),
            timestamp: created_at.to_rfc3339_millis(),
        })
    }

    /// §4.3 "Read receipts". Tries the direct-message store first, then
    /// the group-message store — the wire protocol carries one `message_id`
    /// namespace regardless of which facade ultimately owns the row.
    pub async fn mark_read(&self, reader_id: Uuid, message_id: Option<Uuid>) -> Result<(), ErrorShape> {
        let Some(message_id) = message_id else {
            return Err(ErrorShape::new(ErrorCode::MissingMessageId, "message_id is required"));
        };

        if let Ok(direct) = self.store.fetch_direct_message(message_id).await {
            let read_at = Timestamp::now();
            self.store
                .mark_direct_read(message_id, reader_id, read_at)
                .await
                .map_err(|e| ErrorShape::new(ErrorCode::InternalError, e.to_string()))?;

            if reader_id == direct.recipient {
                let receipt = ServerFrame::MessageReadReceipt {
                    message_id,
                    reader_id,
                    read_at: read_at.to_rfc3339_millis(),
                };
                self.fanout(direct.sender, &receipt).await;
            }
            return Ok(());
        }

        if let Ok(group_msg) = self.store.fetch_group_message(message_id).await {
            let read_at = Timestamp::now();
            self.store
                .mark_group_read(message_id, reader_id, read_at)
                .await
                .map_err(|e| ErrorShape::new(ErrorCode::InternalError, e.to_string()))?;

            let receipt = ServerFrame::MessageReadReceipt {
                message_id,
                reader_id,
                read_at: read_at.to_rfc3339_millis(),
            };
            self.fanout(group_msg.sender, &receipt).await;
            return Ok(());
        }

        // Unknown message id: tolerated the same way a dangling offline
        // pointer is (§8 property 4) — no receipt to deliver, no error.
        Ok(())
    }

    /// §4.3 "Typing". Pure relay: never persisted, never queued.
    pub async fn relay_typing(
        &self,
        user_id: Uuid,
        recipient_id: Option<Uuid>,
        group_id: Option<Uuid>,
        is_typing: bool,
    ) {
        if let Some(recipient_id) = recipient_id {
            let frame = ServerFrame::Typing {
                user_id,
                is_typing,
                recipient_id: Some(recipient_id),
                group_id: None,
            };
            self.fanout(recipient_id, &frame).await;
            return;
        }

        let Some(group_id) = group_id else { return };
        let Ok(members) = self.store.group_members(group_id).await else {
            return;
        };
        let frame = ServerFrame::Typing {
            user_id,
            is_typing,
            recipient_id: None,
            group_id: Some(group_id),
        };
        for member in members.into_iter().filter(|m| m.user_id != user_id) {
            self.fanout(member.user_id, &frame).await;
        }
    }
}
