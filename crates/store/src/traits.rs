use async_trait::async_trait;
use pulsechat_common::Timestamp;
use uuid::Uuid;

use crate::{
    error::StoreError,
    model::{DirectMessage, Group, GroupMember, GroupMessage, GroupRole},
};

/// Message Store operations (§3, §4.2, §4.3, §6.2). The control-plane
/// collaborator that lists conversation history or administers groups is
/// out of scope; this trait only covers what the core engine needs to
/// persist and retrieve a message's lifecycle and resolve group membership.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Register a user id as a valid foreign key target. Registration
    /// itself is out of scope (§ Non-goals); the core calls this so a
    /// message's `sender`/`recipient` can be persisted without a real
    /// user-accounts collaborator in place.
    async fn ensure_user(&self, user_id: Uuid, display_name: &str) -> Result<(), StoreError>;

    async fn save_direct_message(&self, message: &DirectMessage) -> Result<(), StoreError>;

    async fn fetch_direct_message(&self, id: Uuid) -> Result<DirectMessage, StoreError>;

    /// Set `delivered_at` if unset (§3 invariant: monotone, set-once).
    async fn mark_direct_delivered(&self, id: Uuid, at: Timestamp) -> Result<(), StoreError>;

    /// Set `read_at` if unset, and only when `user_id` is the recipient
    /// (§4.3: only the recipient may acknowledge a read).
    async fn mark_direct_read(
        &self,
        id: Uuid,
        user_id: Uuid,
        at: Timestamp,
    ) -> Result<(), StoreError>;

    /// Direct messages addressed to `user_id` with `read_at` still unset,
    /// oldest first (used by the offline flush, §4.6).
    async fn list_unread_direct(&self, user_id: Uuid) -> Result<Vec<DirectMessage>, StoreError>;

    async fn create_group(&self, group: &Group, creator: Uuid) -> Result<(), StoreError>;

    async fn add_member(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        role: GroupRole,
    ) -> Result<(), StoreError>;

    async fn is_group_member(&self, group_id: Uuid, user_id: Uuid) -> Result<bool, StoreError>;

    /// Every member of `group_id`, in join order.
    async fn group_members(&self, group_id: Uuid) -> Result<Vec<GroupMember>, StoreError>;

    async fn save_group_message(&self, message: &GroupMessage) -> Result<(), StoreError>;

    async fn fetch_group_message(&self, id: Uuid) -> Result<GroupMessage, StoreError>;

    /// Record that `user_id` has read `message_id`. Idempotent: reading
    /// twice is not an error (§4.3, group reads are per-member, not
    /// set-once the way direct reads are).
    async fn mark_group_read(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        at: Timestamp,
    ) -> Result<(), StoreError>;
}
