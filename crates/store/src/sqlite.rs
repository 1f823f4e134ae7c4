use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pulsechat_common::Timestamp;
use sqlx::{sqlite::SqlitePoolOptions, Row, SqlitePool};
use uuid::Uuid;

use crate::{
    error::StoreError,
    model::{DirectMessage, Group, GroupMember, GroupMessage, GroupRole},
    traits::MessageStore,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    display_name TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS direct_messages (
    id TEXT PRIMARY KEY,
    sender TEXT NOT NULL REFERENCES users(id),
    recipient TEXT NOT NULL REFERENCES users(id),
    body TEXT NOT NULL,
    kind TEXT NOT NULL,
    created_at TEXT NOT NULL,
    delivered_at TEXT,
    read_at TEXT
);

CREATE INDEX IF NOT EXISTS idx_direct_unread
    ON direct_messages(recipient, read_at);

CREATE TABLE IF NOT EXISTS groups (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    creator TEXT NOT NULL REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS group_members (
    group_id TEXT NOT NULL REFERENCES groups(id),
    user_id TEXT NOT NULL REFERENCES users(id),
    role TEXT NOT NULL,
    joined_at TEXT NOT NULL,
    PRIMARY KEY (group_id, user_id)
);

CREATE TABLE IF NOT EXISTS group_messages (
    id TEXT PRIMARY KEY,
    group_id TEXT NOT NULL REFERENCES groups(id),
    sender TEXT NOT NULL REFERENCES users(id),
    body TEXT NOT NULL,
    kind TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS group_message_reads (
    message_id TEXT NOT NULL REFERENCES group_messages(id),
    user_id TEXT NOT NULL REFERENCES users(id),
    read_at TEXT NOT NULL,
    PRIMARY KEY (message_id, user_id)
);
"#;

/// SQLite-backed `MessageStore`. Uses the runtime query APIs (not
/// `query!`/`query_as!`) so the workspace never needs a live `DATABASE_URL`
/// at build time — timestamps are stored as RFC3339 text rather than
/// through sqlx's chrono feature, which this workspace doesn't enable.
pub struct SqliteMessageStore {
    pool: SqlitePool,
}

impl SqliteMessageStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        sqlx::query(SCHEMA).execute(&pool).await?;
        Ok(Self { pool })
    }

    fn parse_ts(s: &str) -> Timestamp {
        let dt = DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());
        Timestamp::from_utc(dt)
    }

    fn opt_ts(s: Option<String>) -> Option<Timestamp> {
        s.map(|s| Self::parse_ts(&s))
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn ensure_user(&self, user_id: Uuid, display_name: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, display_name) VALUES (?1, ?2)
             ON CONFLICT(id) DO NOTHING",
        )
        .bind(user_id.to_string())
        .bind(display_name)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn save_direct_message(&self, message: &DirectMessage) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO direct_messages
                (id, sender, recipient, body, kind, created_at, delivered_at, read_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(message.id.to_string())
        .bind(message.sender.to_string())
        .bind(message.recipient.to_string())
        .bind(&message.body)
        .bind(&message.kind)
        .bind(message.created_at.to_rfc3339_millis())
        .bind(message.delivered_at.map(|t| t.to_rfc3339_millis()))
        .bind(message.read_at.map(|t| t.to_rfc3339_millis()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_direct_message(&self, id: Uuid) -> Result<DirectMessage, StoreError> {
        let row = sqlx::query(
            "SELECT id, sender, recipient, body, kind, created_at, delivered_at, read_at
             FROM direct_messages WHERE id = ?1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::DirectMessageNotFound(id))?;

        Ok(DirectMessage {
            id,
            sender: parse_uuid(row.get::<String, _>("sender"))?,
            recipient: parse_uuid(row.get::<String, _>("recipient"))?,
            body: row.get("body"),
            kind: row.get("kind"),
            created_at: Self::parse_ts(&row.get::<String, _>("created_at")),
            delivered_at: Self::opt_ts(row.get("delivered_at")),
            read_at: Self::opt_ts(row.get("read_at")),
        })
    }

    async fn mark_direct_delivered(&self, id: Uuid, at: Timestamp) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE direct_messages SET delivered_at = ?2
             WHERE id = ?1 AND delivered_at IS NULL",
        )
        .bind(id.to_string())
        .bind(at.to_rfc3339_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_direct_read(
        &self,
        id: Uuid,
        user_id: Uuid,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE direct_messages SET read_at = ?3
             WHERE id = ?1 AND recipient = ?2 AND read_at IS NULL",
        )
        .bind(id.to_string())
        .bind(user_id.to_string())
        .bind(at.to_rfc3339_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_unread_direct(&self, user_id: Uuid) -> Result<Vec<DirectMessage>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, sender, recipient, body, kind, created_at, delivered_at, read_at
             FROM direct_messages
             WHERE recipient = ?1 AND read_at IS NULL
             ORDER BY created_at ASC",
        )
        .bind(user_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(DirectMessage {
                    id: parse_uuid(row.get::<String, _>("id"))?,
                    sender: parse_uuid(row.get::<String, _>("sender"))?,
                    recipient: user_id,
                    body: row.get("body"),
                    kind: row.get("kind"),
                    created_at: Self::parse_ts(&row.get::<String, _>("created_at")),
                    delivered_at: Self::opt_ts(row.get("delivered_at")),
                    read_at: Self::opt_ts(row.get("read_at")),
                })
            })
            .collect()
    }

    async fn create_group(&self, group: &Group, creator: Uuid) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("INSERT INTO groups (id, name, creator) VALUES (?1, ?2, ?3)")
            .bind(group.id.to_string())
            .bind(&group.name)
            .bind(group.creator.to_string())
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO group_members (group_id, user_id, role, joined_at)
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(group.id.to_string())
        .bind(creator.to_string())
        .bind(GroupRole::Creator.as_str())
        .bind(Timestamp::now().to_rfc3339_millis())
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn add_member(
        &self,
        group_id: Uuid,
        user_id: Uuid,
        role: GroupRole,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO group_members (group_id, user_id, role, joined_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(group_id, user_id) DO NOTHING",
        )
        .bind(group_id.to_string())
        .bind(user_id.to_string())
        .bind(role.as_str())
        .bind(Timestamp::now().to_rfc3339_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn is_group_member(&self, group_id: Uuid, user_id: Uuid) -> Result<bool, StoreError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS c FROM group_members WHERE group_id = ?1 AND user_id = ?2",
        )
        .bind(group_id.to_string())
        .bind(user_id.to_string())
        .fetch_one(&self.pool)
        .await?;
        let count: i64 = row.get("c");
        Ok(count > 0)
    }

    async fn group_members(&self, group_id: Uuid) -> Result<Vec<GroupMember>, StoreError> {
        let rows = sqlx::query(
            "SELECT group_id, user_id, role, joined_at FROM group_members
             WHERE group_id = ?1 ORDER BY joined_at ASC",
        )
        .bind(group_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(GroupMember {
                    group_id,
                    user_id: parse_uuid(row.get::<String, _>("user_id"))?,
                    role: GroupRole::parse(&row.get::<String, _>("role")),
                    joined_at: Self::parse_ts(&row.get::<String, _>("joined_at")),
                })
            })
            .collect()
    }

    async fn save_group_message(&self, message: &GroupMessage) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO group_messages (id, group_id, sender, body, kind, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(message.id.to_string())
        .bind(message.group_id.to_string())
        .bind(message.sender.to_string())
        .bind(&message.body)
        .bind(&message.kind)
        .bind(message.created_at.to_rfc3339_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fetch_group_message(&self, id: Uuid) -> Result<GroupMessage, StoreError> {
        let row = sqlx::query(
            "SELECT id, group_id, sender, body, kind, created_at
             FROM group_messages WHERE id = ?1",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::GroupMessageNotFound(id))?;

        Ok(GroupMessage {
            id,
            group_id: parse_uuid(row.get::<String, _>("group_id"))?,
            sender: parse_uuid(row.get::<String, _>("sender"))?,
            body: row.get("body"),
            kind: row.get("kind"),
            created_at: Self::parse_ts(&row.get::<String, _>("created_at")),
        })
    }

    async fn mark_group_read(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        at: Timestamp,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO group_message_reads (message_id, user_id, read_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(message_id, user_id) DO UPDATE SET read_at = excluded.read_at",
        )
        .bind(message_id.to_string())
        .bind(user_id.to_string())
        .bind(at.to_rfc3339_millis())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

fn parse_uuid(s: String) -> Result<Uuid, StoreError> {
    Uuid::parse_str(&s).map_err(|e| StoreError::Backend(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> SqliteMessageStore {
        SqliteMessageStore::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn direct_message_round_trips_and_is_set_once() {
        let store = store().await;
        let sender = Uuid::new_v4();
        let recipient = Uuid::new_v4();
        store.ensure_user(sender, "alice").await.unwrap();
        store.ensure_user(recipient, "bob").await.unwrap();

        let msg = DirectMessage {
            id: Uuid::new_v4(),
            sender,
            recipient,
            body: "hello".into(),
            kind: "text".into(),
            created_at: Timestamp::now(),
            delivered_at: None,
            read_at: None,
        };
        store.save_direct_message(&msg).await.unwrap();

        let t1 = Timestamp::now();
        store.mark_direct_delivered(msg.id, t1).await.unwrap();
        store.mark_direct_delivered(msg.id, Timestamp::now()).await.unwrap();

        let fetched = store.fetch_direct_message(msg.id).await.unwrap();
        assert_eq!(fetched.body, "hello");
        assert_eq!(fetched.delivered_at, Some(t1));
        assert!(fetched.read_at.is_none());
    }

    #[tokio::test]
    async fn group_roundtrip_and_membership() {
        let store = store().await;
        let creator = Uuid::new_v4();
        let member = Uuid::new_v4();
        store.ensure_user(creator, "carol").await.unwrap();
        store.ensure_user(member, "dave").await.unwrap();

        let group = Group {
            id: Uuid::new_v4(),
            name: "eng".into(),
            creator,
        };
        store.create_group(&group, creator).await.unwrap();
        store.add_member(group.id, member, GroupRole::Member).await.unwrap();

        assert!(store.is_group_member(group.id, member).await.unwrap());
        assert_eq!(store.group_members(group.id).await.unwrap().len(), 2);

        let gm = GroupMessage {
            id: Uuid::new_v4(),
            group_id: group.id,
            sender: creator,
            body: "standup at 9".into(),
            kind: "text".into(),
            created_at: Timestamp::now(),
        };
        store.save_group_message(&gm).await.unwrap();
        store.mark_group_read(gm.id, member, Timestamp::now()).await.unwrap();
        let fetched = store.fetch_group_message(gm.id).await.unwrap();
        assert_eq!(fetched.sender, creator);
    }
}
