use std::sync::Arc;

use pulsechat_presence::{PointerKind, PresenceStore};
use pulsechat_protocol::frame::{OfflineMessage, OfflineMessageKind, ServerFrame};
use pulsechat_store::MessageStore;
use tracing::warn;
use uuid::Uuid;

/// Offline Flush (C7, §4.6): on connect, after the Heartbeat Controller
/// marks the user online, drains their queue and resolves each pointer to
/// a row before building a single batch frame.
pub struct OfflineFlushEngine {
    presence: Arc<dyn PresenceStore>,
    store: Arc<dyn MessageStore>,
}

impl OfflineFlushEngine {
    pub fn new(presence: Arc<dyn PresenceStore>, store: Arc<dyn MessageStore>) -> Self {
        Self { presence, store }
    }

    /// Returns `None` when the queue was empty (no frame to send). Does
    /// *not* clear the queue — the caller must call
    /// [`confirm_delivered`](Self::confirm_delivered) once the frame has
    /// actually reached the socket. If the socket disappears mid-flush and
    /// the caller never confirms, the queue stays intact and redelivery
    /// happens on the next connect (§4.6, §8 property 6).
    pub async fn flush(&self, user_id: Uuid) -> Option<ServerFrame> {
        let pointers = self.presence.drain(user_id).await;
        if pointers.is_empty() {
            return None;
        }

        let mut messages = Vec::with_capacity(pointers.len());
        for pointer in pointers {
            match pointer.kind {
                PointerKind::Direct => match self.store.fetch_direct_message(pointer.message_id).await {
                    Ok(direct) => {
                        messages.push(OfflineMessage {
                            message_id: direct.id,
                            kind: OfflineMessageKind::Direct,
                            sender_id: direct.sender,
                            group_id: None,
                            content: direct.body,
                            message_type: direct.kind,
                            created_at: direct.created_at.to_rfc3339_millis(),
                        });
                        if let Err(err) = self
                            .store
                            .mark_direct_delivered(direct.id, pulsechat_common::Timestamp::now())
                            .await
                        {
                            warn!(message_id = %direct.id, error = %err, "failed to mark offline flush as delivered");
                        }
                    },
                    // §8 property 4: a pointer that no longer resolves is
                    // skipped, not fatal to the rest of the flush.
                    Err(err) => {
                        warn!(message_id = %pointer.message_id, error = %err, "dangling offline pointer");
                    },
                },
                PointerKind::Group => match self.store.fetch_group_message(pointer.message_id).await {
                    Ok(group_msg) => messages.push(OfflineMessage {
                        message_id: group_msg.id,
                        kind: OfflineMessageKind::Group,
                        sender_id: group_msg.sender,
                        group_id: Some(group_msg.group_id),
                        content: group_msg.body,
                        message_type: group_msg.kind,
                        created_at: group_msg.created_at.to_rfc3339_millis(),
                    }),
                    Err(err) => {
                        warn!(message_id = %pointer.message_id, error = %err, "dangling offline pointer");
                    },
                },
            }
        }

        let count = messages.len();
        Some(ServerFrame::MessagesOffline { messages, count })
    }

    /// Clear the offline queue once the caller has confirmed the flushed
    /// frame actually reached the socket (§4.6: the queue is only cleared
    /// after delivery is confirmed, never unconditionally).
    pub async fn confirm_delivered(&self, user_id: Uuid) {
        self.presence.clear(user_id).await;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pulsechat_common::Timestamp;
    use pulsechat_presence::{InProcessPresenceStore, QueuePointer};
    use pulsechat_store::{DirectMessage, InMemoryMessageStore};

    use super::*;

    #[tokio::test]
    async fn flush_resolves_pointers_without_clearing_until_confirmed() {
        let presence = Arc::new(InProcessPresenceStore::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
        ));
        let store = Arc::new(InMemoryMessageStore::new());
        let sender = Uuid::new_v4();
        let recipient = Uuid::new_v4();

        let msg = DirectMessage {
            id: Uuid::new_v4(),
            sender,
            recipient,
            body: "hi".into(),
            kind: "text".into(),
            created_at: Timestamp::now(),
            delivered_at: None,
            read_at: None,
        };
        store.save_direct_message(&msg).await.unwrap();
        presence.enqueue(recipient, QueuePointer::direct(msg.id)).await;

        let flush = OfflineFlushEngine::new(presence.clone(), store.clone());
        let frame = flush.flush(recipient).await.unwrap();
        match frame {
            ServerFrame::MessagesOffline { messages, count } => {
                assert_eq!(count, 1);
                assert_eq!(messages[0].content, "hi");
            },
            _ => panic!("wrong frame"),
        }

        let fetched = store.fetch_direct_message(msg.id).await.unwrap();
        assert!(fetched.delivered_at.is_some());
        // Not cleared yet — delivery hasn't been confirmed.
        assert_eq!(presence.drain(recipient).await.len(), 1);

        flush.confirm_delivered(recipient).await;
        assert!(presence.drain(recipient).await.is_empty());
    }

    #[tokio::test]
    async fn flush_skips_dangling_pointers() {
        let presence = Arc::new(InProcessPresenceStore::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
        ));
        let store = Arc::new(InMemoryMessageStore::new());
        let user = Uuid::new_v4();
        presence.enqueue(user, QueuePointer::direct(Uuid::new_v4())).await;

        let flush = OfflineFlushEngine::new(presence.clone(), store.clone());
        let frame = flush.flush(user).await.unwrap();
        match frame {
            ServerFrame::MessagesOffline { count, .. } => assert_eq!(count, 0),
            _ => panic!("wrong frame"),
        }
    }

    #[tokio::test]
    async fn empty_queue_returns_none() {
        let presence = Arc::new(InProcessPresenceStore::new(
            Duration::from_secs(60),
            Duration::from_secs(60),
        ));
        let store = Arc::new(InMemoryMessageStore::new());
        let flush = OfflineFlushEngine::new(presence, store);
        assert!(flush.flush(Uuid::new_v4()).await.is_none());
    }
}
