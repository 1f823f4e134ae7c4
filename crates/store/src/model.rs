use pulsechat_common::Timestamp;
use uuid::Uuid;

/// §3: `{id, sender, recipient, body, kind, created_at, delivered_at?,
/// read_at?}`. `delivered_at` and `read_at` are set at most once, and only
/// in order `created_at <= delivered_at <= read_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectMessage {
    pub id: Uuid,
    pub sender: Uuid,
    pub recipient: Uuid,
    pub body: String,
    pub kind: String,
    pub created_at: Timestamp,
    pub delivered_at: Option<Timestamp>,
    pub read_at: Option<Timestamp>,
}

/// §3: group + its members share primary key `(group_id, user_id)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub creator: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupRole {
    Creator,
    Admin,
    Member,
}

impl GroupRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupRole::Creator => "creator",
            GroupRole::Admin => "admin",
            GroupRole::Member => "member",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "creator" => GroupRole::Creator,
            "admin" => GroupRole::Admin,
            _ => GroupRole::Member,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupMember {
    pub group_id: Uuid,
    pub user_id: Uuid,
    pub role: GroupRole,
    pub joined_at: Timestamp,
}

/// §3: `{id, group_id, sender, body, kind, created_at}` plus a per-recipient
/// `GroupMessageRead` record, tracked separately via
/// [`MessageStore::mark_group_read`](crate::traits::MessageStore::mark_group_read).
#[derive(Debug, Clone, PartialEq)]
pub struct GroupMessage {
    pub id: Uuid,
    pub group_id: Uuid,
    pub sender: Uuid,
    pub body: String,
    pub kind: String,
    pub created_at: Timestamp,
}
