use std::collections::HashMap;

use async_trait::async_trait;
use pulsechat_common::Timestamp;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::StoreError,
    model::{DirectMessage, Group, GroupMember, GroupMessage, GroupRole},
    traits::MessageStore,
};

#[derive(Default)]
struct Inner {
    users: HashMap<Uuid, String>,
    direct: HashMap<Uuid, DirectMessage>,
    groups: HashMap<Uuid, Group>,
    members: HashMap<Uuid, Vec<GroupMember>>,
    group_messages: HashMap<Uuid, GroupMessage>,
    group_reads: HashMap<(Uuid, Uuid), Timestamp>,
}

/// Non-durable fake used in tests and in the gateway's no-auth demo mode,
/// mirroring the teacher's pairing of a live, networked implementation with
/// an in-process fake sharing the same trait.
#[derive(Default)]
pub struct InMemoryMessageStore {
    inner: RwLock<Inner>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn ensure_user(&self, user_id: Uuid, display_name: &str) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .users
            .entry(user_id)
            .or_insert_with(|| display_name.to_string());
        Ok(())
    }

    async fn save_direct_message(&self, message: &DirectMessage) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .direct
            .insert(message.id, message.clone());
        Ok(())
    }

    async fn fetch_direct_message(&self, id: Uuid) -> Result<DirectMessage, StoreError> {
        self.inner
            .read()
            .await
            .direct
            .get(&id)
            .cloned()
            .ok_or(StoreError::DirectMessageNotFound(id))
    }

    async fn mark_direct_delivered(&self, id: Uuid, at: Timestamp) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let msg = inner
            .direct
            .get_mut(&id)
            .ok_or(StoreError::DirectMessageNotFound(id))?;
        if msg.delivered_at.is_none() {
            msg.delivered_at = Some(at);
        }
        Ok(())
    }

    async fn mark_direct_read(
        &self,
        id: Uuid,
        user_id: Uuid,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let msg = inner
            .direct
            .get_mut(&id)
            .ok_or(StoreError::DirectMessageNotFound(id))?;
        if msg.recipient == user_id && msg.read_at.is_none() {
            msg.read_at = Some(at);
        }
        Ok(())
    }

    async fn list_unread_direct(&self, user_id: Uuid) -> Result<Vec<DirectMessage>, StoreError> {
        let inner = self.inner.read().await;
        let mut unread: Vec<DirectMessage> = inner
            .direct
            .values()
            .filter(|m| m.recipient == user_id && m.read_at.is_none())
            .cloned()
            .collect();
        unread.sort_by_key(|m| m.created_at);
        Ok(unread)
    }

    async fn create_group(&self, group: &Group, creator: Uuid) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.groups.insert(group.id, group.clone());
        inner.members.entry(group.id).or_default().push(GroupMember {
            group_id: group.id,
            user_id: creator,
            role: GroupRole::Creator,
            joined_at: Timestamp::now(),
        });
        Ok(())
    }

    async fn add_member(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        role: GroupRole,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if !inner.groups.contains_key(&group_id) {
            return Err(StoreError::GroupNotFound(group_id));
        }
        let members = inner.members.entry(group_id).or_default();
        if !members.iter().any(|m| m.user_id == user_id) {
            members.push(GroupMember {
                group_id,
                user_id,
                role,
                joined_at: Timestamp::now(),
            });
        }
        Ok(())
    }

    async fn is_group_member(&self, group_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .members
            .get(&group_id)
            .is_some_and(|members| members.iter().any(|m| m.user_id == user_id)))
    }

    async fn group_members(&self, group_id: Uuid) -> Result<Vec<GroupMember>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .members
            .get(&group_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save_group_message(&self, message: &GroupMessage) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .group_messages
            .insert(message.id, message.clone());
        Ok(())
    }

    async fn fetch_group_message(&self, id: Uuid) -> Result<GroupMessage, StoreError> {
        self.inner
            .read()
            .await
            .group_messages
            .get(&id)
            .cloned()
            .ok_or(StoreError::GroupMessageNotFound(id))
    }

    async fn mark_group_read(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .group_reads
            .insert((message_id, user_id), at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn direct(sender: Uuid, recipient: Uuid) -> DirectMessage {
        DirectMessage {
            id: Uuid::new_v4(),
            sender,
            recipient,
            body: "hi".into(),
            kind: "text".into(),
            created_at: Timestamp::now(),
            delivered_at: None,
            read_at: None,
        }
    }

    #[tokio::test]
    async fn direct_message_lifecycle_is_set_once() {
        let store = InMemoryMessageStore::new();
        let sender = Uuid::new_v4();
        let recipient = Uuid::new_v4();
        let msg = direct(sender, recipient);
        store.save_direct_message(&msg).await.unwrap();

        let t1 = Timestamp::now();
        store.mark_direct_delivered(msg.id, t1).await.unwrap();
        let t2 = Timestamp::now();
        store.mark_direct_delivered(msg.id, t2).await.unwrap();

        let fetched = store.fetch_direct_message(msg.id).await.unwrap();
        assert_eq!(fetched.delivered_at, Some(t1));
    }

    #[tokio::test]
    async fn only_recipient_can_mark_read() {
        let store = InMemoryMessageStore::new();
        let sender = Uuid::new_v4();
        let recipient = Uuid::new_v4();
        let msg = direct(sender, recipient);
        store.save_direct_message(&msg).await.unwrap();

        store.mark_direct_read(msg.id, sender, Timestamp::now()).await.unwrap();
        let fetched = store.fetch_direct_message(msg.id).await.unwrap();
        assert!(fetched.read_at.is_none());

        store.mark_direct_read(msg.id, recipient, Timestamp::now()).await.unwrap();
        let fetched = store.fetch_direct_message(msg.id).await.unwrap();
        assert!(fetched.read_at.is_some());
    }

    #[tokio::test]
    async fn list_unread_direct_is_oldest_first() {
        let store = InMemoryMessageStore::new();
        let sender = Uuid::new_v4();
        let recipient = Uuid::new_v4();
        let m1 = direct(sender, recipient);
        store.save_direct_message(&m1).await.unwrap();
        let m2 = direct(sender, recipient);
        store.save_direct_message(&m2).await.unwrap();

        let unread = store.list_unread_direct(recipient).await.unwrap();
        assert_eq!(unread.len(), 2);
        assert!(unread[0].created_at <= unread[1].created_at);
    }

    #[tokio::test]
    async fn group_membership_and_messages() {
        let store = InMemoryMessageStore::new();
        let creator = Uuid::new_v4();
        let member = Uuid::new_v4();
        let group = Group {
            id: Uuid::new_v4(),
            name: "team".into(),
            creator,
        };
        store.create_group(&group, creator).await.unwrap();
        store.add_member(group.id, member, GroupRole::Member).await.unwrap();

        assert!(store.is_group_member(group.id, creator).await.unwrap());
        assert!(store.is_group_member(group.id, member).await.unwrap());
        assert_eq!(store.group_members(group.id).await.unwrap().len(), 2);

        let gm = GroupMessage {
            id: Uuid::new_v4(),
            group_id: group.id,
            sender: creator,
            body: "hello team".into(),
            kind: "text".into(),
            created_at: Timestamp::now(),
        };
        store.save_group_message(&gm).await.unwrap();
        store.mark_group_read(gm.id, member, Timestamp::now()).await.unwrap();
        let fetched = store.fetch_group_message(gm.id).await.unwrap();
        assert_eq!(fetched.body, "hello team");
    }
}
