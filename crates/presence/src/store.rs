use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::pointer::QueuePointer;

/// Presence Store operations (§4.4). Implementable on any TTL key/value +
/// list store; this crate ships the in-process implementation only.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    async fn mark_online(&self, user_id: Uuid);
    async fn mark_offline(&self, user_id: Uuid);
    async fn is_online(&self, user_id: Uuid) -> bool;
    /// Extend the TTL of an existing online marker (heartbeat refresh).
    async fn refresh(&self, user_id: Uuid);

    /// Partition `user_ids` into `(online, offline)`, preserving the
    /// relative order of each partition as given in the input (§4.4).
    async fn partition(&self, user_ids: &[Uuid]) -> (Vec<Uuid>, Vec<Uuid>) {
        let mut online = Vec::new();
        let mut offline = Vec::new();
        for &id in user_ids {
            if self.is_online(id).await {
                online.push(id);
            } else {
                offline.push(id);
            }
        }
        (online, offline)
    }

    /// Left-push (i.e. append to the tail for later oldest-first drain) a
    /// pointer onto `user_id`'s offline queue, refreshing its TTL.
    async fn enqueue(&self, user_id: Uuid, pointer: QueuePointer);

    /// Oldest-first ordered list of pointers currently queued (§4.4: "this
    /// spec uses oldest first for delivery"). Does not clear the queue.
    async fn drain(&self, user_id: Uuid) -> Vec<QueuePointer>;

    /// Remove the queue entirely (called once a flush fully succeeds).
    async fn clear(&self, user_id: Uuid);

    /// Evict every expired online marker and queue. Called periodically by
    /// the heartbeat ticker (§4.5: silent expiry after `T_online`).
    async fn sweep(&self);
}

struct OnlineEntry {
    expires_at: Instant,
}

struct QueueEntry {
    items: VecDeque<QueuePointer>,
    expires_at: Instant,
}

/// Single-process presence store backed by two `DashMap`s, modeled on the
/// teacher's `DedupeCache` (lazy TTL eviction) and `NodeRegistry` (owned,
/// mutex-free concurrent map) shapes.
pub struct InProcessPresenceStore {
    online: DashMap<Uuid, OnlineEntry>,
    queues: DashMap<Uuid, QueueEntry>,
    online_ttl: Duration,
    queue_ttl: Duration,
}

impl InProcessPresenceStore {
    pub fn new(online_ttl: Duration, queue_ttl: Duration) -> Self {
        Self {
            online: DashMap::new(),
            queues: DashMap::new(),
            online_ttl,
            queue_ttl,
        }
    }

    fn is_expired(expires_at: Instant) -> bool {
        Instant::now() > expires_at
    }
}

impl Default for InProcessPresenceStore {
    fn default() -> Self {
        Self::new(
            Duration::from_secs(pulsechat_defaults::T_ONLINE_SECS),
            Duration::from_secs(pulsechat_defaults::T_QUEUE_DAYS * 24 * 60 * 60),
        )
    }
}

#[async_trait]
impl PresenceStore for InProcessPresenceStore {
    async fn mark_online(&self, user_id: Uuid) {
        self.online.insert(user_id, OnlineEntry {
            expires_at: Instant::now() + self.online_ttl,
        });
    }

    async fn mark_offline(&self, user_id: Uuid) {
        self.online.remove(&user_id);
    }

    async fn is_online(&self, user_id: Uuid) -> bool {
        let expired = match self.online.get(&user_id) {
            Some(entry) => Self::is_expired(entry.expires_at),
            None => return false,
        };
        if expired {
            self.online.remove(&user_id);
            false
        } else {
            true
        }
    }

    async fn refresh(&self, user_id: Uuid) {
        if let Some(mut entry) = self.online.get_mut(&user_id) {
            entry.expires_at = Instant::now() + self.online_ttl;
        }
    }

    async fn enqueue(&self, user_id: Uuid, pointer: QueuePointer) {
        let mut entry = self.queues.entry(user_id).or_insert_with(|| QueueEntry {
            items: VecDeque::new(),
            expires_at: Instant::now() + self.queue_ttl,
        });
        entry.items.push_back(pointer);
        entry.expires_at = Instant::now() + self.queue_ttl;
    }

    async fn drain(&self, user_id: Uuid) -> Vec<QueuePointer> {
        match self.queues.get(&user_id) {
            Some(entry) if !Self::is_expired(entry.expires_at) => {
                entry.items.iter().copied().collect()
            },
            _ => Vec::new(),
        }
    }

    async fn clear(&self, user_id: Uuid) {
        self.queues.remove(&user_id);
    }

    async fn sweep(&self) {
        let now = Instant::now();
        self.online.retain(|_, entry| entry.expires_at > now);
        self.queues.retain(|_, entry| entry.expires_at > now);
    }
}

/// Kept in lockstep with `pulsechat-protocol`'s constants by doc comment;
/// not a dependency to avoid a cycle (protocol has no reason to depend on
/// presence, and presence shouldn't need the whole wire-frame surface just
/// for two integers).
mod pulsechat_defaults {
    pub const T_ONLINE_SECS: u64 = 300;
    pub const T_QUEUE_DAYS: u64 = 30;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> InProcessPresenceStore {
        InProcessPresenceStore::new(Duration::from_millis(50), Duration::from_secs(60))
    }

    #[tokio::test]
    async fn mark_online_then_is_online() {
        let s = store();
        let u = Uuid::new_v4();
        assert!(!s.is_online(u).await);
        s.mark_online(u).await;
        assert!(s.is_online(u).await);
    }

    #[tokio::test]
    async fn online_marker_expires_after_ttl() {
        let s = store();
        let u = Uuid::new_v4();
        s.mark_online(u).await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(!s.is_online(u).await);
    }

    #[tokio::test]
    async fn refresh_extends_ttl() {
        let s = store();
        let u = Uuid::new_v4();
        s.mark_online(u).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        s.refresh(u).await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(s.is_online(u).await);
    }

    #[tokio::test]
    async fn partition_preserves_order() {
        let s = store();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        s.mark_online(a).await;
        s.mark_online(c).await;
        let (online, offline) = s.partition(&[a, b, c]).await;
        assert_eq!(online, vec![a, c]);
        assert_eq!(offline, vec![b]);
    }

    #[tokio::test]
    async fn drain_is_oldest_first_and_clear_empties_it() {
        let s = store();
        let u = Uuid::new_v4();
        let p1 = QueuePointer::direct(Uuid::new_v4());
        let p2 = QueuePointer::direct(Uuid::new_v4());
        s.enqueue(u, p1).await;
        s.enqueue(u, p2).await;
        let drained = s.drain(u).await;
        assert_eq!(drained, vec![p1, p2]);
        s.clear(u).await;
        assert!(s.drain(u).await.is_empty());
    }

    #[tokio::test]
    async fn sweep_evicts_expired_entries() {
        let s = store();
        let u = Uuid::new_v4();
        s.mark_online(u).await;
        s.enqueue(u, QueuePointer::direct(Uuid::new_v4())).await;
        tokio::time::sleep(Duration::from_millis(80)).await;
        s.sweep().await;
        assert_eq!(s.online.len(), 0);
    }
}
