use std::{sync::Arc, time::Duration};

use pulsechat_presence::PresenceStore;
use tracing::debug;
use uuid::Uuid;

/// Heartbeat / Presence Controller (C6, §4.5): the only component that
/// writes online/offline transitions to the Presence Store. Grounded on
/// the teacher's `start_gateway` tick-timer (`tokio::spawn` +
/// `tokio::time::interval`), generalized from a broadcast tick to a
/// presence-sweep tick.
pub struct HeartbeatController {
    presence: Arc<dyn PresenceStore>,
}

impl HeartbeatController {
    pub fn new(presence: Arc<dyn PresenceStore>) -> Self {
        Self { presence }
    }

    pub async fn on_connect(&self, user_id: Uuid) {
        self.presence.mark_online(user_id).await;
    }

    pub async fn on_ping(&self, user_id: Uuid) {
        self.presence.refresh(user_id).await;
    }

    /// Single-process implementation of §4.5's disconnect rule: mark
    /// offline only when the Registry reports no sockets remain for this
    /// user (a multi-process deployment would add a presence query here
    /// before committing to offline).
    pub async fn on_disconnect(&self, user_id: Uuid, last_local_socket: bool) {
        if last_local_socket {
            self.presence.mark_offline(user_id).await;
        }
    }

    /// Periodically evict expired online markers and queues, covering the
    /// crash-death case where no disconnect ever fires (§4.5: "silently
    /// expire from the Presence Store").
    pub fn spawn_sweep(self: Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                self.presence.sweep().await;
                debug!("presence sweep tick");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use pulsechat_presence::InProcessPresenceStore;

    use super::*;

    #[tokio::test]
    async fn connect_marks_online_and_disconnect_marks_offline_when_last() {
        let presence = Arc::new(InProcessPresenceStore::new(
            StdDuration::from_secs(60),
            StdDuration::from_secs(60),
        ));
        let heartbeat = HeartbeatController::new(presence.clone());
        let user = Uuid::new_v4();

        heartbeat.on_connect(user).await;
        assert!(presence.is_online(user).await);

        heartbeat.on_disconnect(user, false).await;
        assert!(presence.is_online(user).await);

        heartbeat.on_disconnect(user, true).await;
        assert!(!presence.is_online(user).await);
    }

    #[tokio::test]
    async fn ping_refreshes_ttl() {
        let presence = Arc::new(InProcessPresenceStore::new(
            StdDuration::from_millis(60),
            StdDuration::from_secs(60),
        ));
        let heartbeat = HeartbeatController::new(presence.clone());
        let user = Uuid::new_v4();
        heartbeat.on_connect(user).await;

        tokio::time::sleep(StdDuration::from_millis(30)).await;
        heartbeat.on_ping(user).await;
        tokio::time::sleep(StdDuration::from_millis(40)).await;
        assert!(presence.is_online(user).await);
    }
}
