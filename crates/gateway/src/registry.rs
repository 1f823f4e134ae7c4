use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use pulsechat_common::Timestamp;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::metrics;

/// One live socket, as seen by the Registry. Sends go through an unbounded
/// mailbox so fan-out writes to this socket never block on the socket's own
/// read loop (§5: "a per-socket write mutex or a per-socket outbound
/// mailbox").
struct ConnEntry {
    user_id: Uuid,
    sender: mpsc::UnboundedSender<String>,
    opened_at: Timestamp,
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("too many connections")]
    TooManyConnections,
}

/// Outcome of detaching a socket: whether that user has any sockets left.
pub struct DetachResult {
    pub user_id: Uuid,
    pub went_offline: bool,
}

/// A snapshot of one user's live sockets, taken outside the registry's
/// mutex so send loops don't race with concurrent detaches (§4.1).
#[derive(Clone)]
pub struct SocketHandle {
    pub conn_id: Uuid,
    pub sender: mpsc::UnboundedSender<String>,
}

struct Inner {
    by_user: HashMap<Uuid, HashSet<Uuid>>,
    by_conn: HashMap<Uuid, ConnEntry>,
}

/// Connection Registry (C3, §4.1): in-process mapping from user id to the
/// set of live sockets for that user, with a reverse socket-to-user map.
/// Modeled on the teacher's `NodeRegistry` dual-map shape, generalized from
/// a single device-per-node mapping to a capped many-sockets-per-user one.
pub struct ConnectionRegistry {
    inner: Mutex<Inner>,
    max_connections_per_user: usize,
}

impl ConnectionRegistry {
    pub fn new(max_connections_per_user: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                by_user: HashMap::new(),
                by_conn: HashMap::new(),
            }),
            max_connections_per_user,
        }
    }

    /// Register `conn_id` under `user_id`. Fails with `TooManyConnections`
    /// if the user already holds the per-user cap (§4.1, §8 property 2).
    pub fn attach(
        &self,
        user_id: Uuid,
        conn_id: Uuid,
        sender: mpsc::UnboundedSender<String>,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let sockets = inner.by_user.entry(user_id).or_default();
        if sockets.len() >= self.max_connections_per_user {
            return Err(RegistryError::TooManyConnections);
        }
        sockets.insert(conn_id);
        inner.by_conn.insert(conn_id, ConnEntry {
            user_id,
            sender,
            opened_at: Timestamp::now(),
        });
        let connected_users = inner.by_user.len();
        let total_connections = inner.by_conn.len();
        drop(inner);
        metrics::record_connected(total_connections);
        metrics::record_connected_users(connected_users);
        Ok(())
    }

    /// Remove `conn_id` from both maps. Returns `None` if it wasn't
    /// registered (already detached, or never attached).
    pub fn detach(&self, conn_id: Uuid) -> Option<DetachResult> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let entry = inner.by_conn.remove(&conn_id)?;
        let went_offline = match inner.by_user.get_mut(&entry.user_id) {
            Some(sockets) => {
                sockets.remove(&conn_id);
                let empty = sockets.is_empty();
                if empty {
                    inner.by_user.remove(&entry.user_id);
                }
                empty
            },
            None => true,
        };
        let connected_users = inner.by_user.len();
        let total_connections = inner.by_conn.len();
        drop(inner);
        metrics::record_connected(total_connections);
        metrics::record_connected_users(connected_users);
        Some(DetachResult {
            user_id: entry.user_id,
            went_offline,
        })
    }

    /// Snapshot of `user_id`'s current sockets, safe to iterate after the
    /// registry's lock is released (§4.1: "a copy, so send loops don't race
    /// with detaches").
    pub fn sockets_for(&self, user_id: Uuid) -> Vec<SocketHandle> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let Some(conn_ids) = inner.by_user.get(&user_id) else {
            return Vec::new();
        };
        conn_ids
            .iter()
            .filter_map(|conn_id| {
                inner.by_conn.get(conn_id).map(|entry| SocketHandle {
                    conn_id: *conn_id,
                    sender: entry.sender.clone(),
                })
            })
            .collect()
    }

    pub fn is_local(&self, user_id: Uuid) -> bool {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner
            .by_user
            .get(&user_id)
            .is_some_and(|sockets| !sockets.is_empty())
    }

    pub fn user_of(&self, conn_id: Uuid) -> Option<Uuid> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.by_conn.get(&conn_id).map(|e| e.user_id)
    }

    pub fn connected_user_count(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.by_user.len()
    }

    pub fn total_connection_count(&self) -> usize {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.by_conn.len()
    }

    pub fn connected_user_ids(&self) -> Vec<Uuid> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.by_user.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> (
        mpsc::UnboundedSender<String>,
        mpsc::UnboundedReceiver<String>,
    ) {
        mpsc::unbounded_channel()
    }

    #[test]
    fn attach_then_sockets_for_is_consistent() {
        let registry = ConnectionRegistry::new(5);
        let user = Uuid::new_v4();
        let conn = Uuid::new_v4();
        let (tx, _rx) = sender();
        registry.attach(user, conn, tx).unwrap();

        let sockets = registry.sockets_for(user);
        assert_eq!(sockets.len(), 1);
        assert_eq!(sockets[0].conn_id, conn);
        assert_eq!(registry.user_of(conn), Some(user));
        assert!(registry.is_local(user));
    }

    #[test]
    fn per_user_cap_is_enforced() {
        let registry = ConnectionRegistry::new(2);
        let user = Uuid::new_v4();
        for _ in 0..2 {
            let (tx, _rx) = sender();
            registry.attach(user, Uuid::new_v4(), tx).unwrap();
        }
        let (tx, _rx) = sender();
        let err = registry.attach(user, Uuid::new_v4(), tx).unwrap_err();
        assert!(matches!(err, RegistryError::TooManyConnections));
        assert_eq!(registry.sockets_for(user).len(), 2);
    }

    #[test]
    fn detach_reports_went_offline_only_when_last_socket() {
        let registry = ConnectionRegistry::new(5);
        let user = Uuid::new_v4();
        let (tx1, _rx1) = sender();
        let (tx2, _rx2) = sender();
        let conn1 = Uuid::new_v4();
        let conn2 = Uuid::new_v4();
        registry.attach(user, conn1, tx1).unwrap();
        registry.attach(user, conn2, tx2).unwrap();

        let result = registry.detach(conn1).unwrap();
        assert!(!result.went_offline);
        assert!(registry.is_local(user));

        let result = registry.detach(conn2).unwrap();
        assert!(result.went_offline);
        assert!(!registry.is_local(user));
    }

    #[test]
    fn detach_unknown_conn_returns_none() {
        let registry = ConnectionRegistry::new(5);
        assert!(registry.detach(Uuid::new_v4()).is_none());
    }
}
