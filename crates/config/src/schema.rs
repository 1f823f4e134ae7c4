/// Config schema: bind address, connection limits, presence TTLs, storage
/// paths, and auth mode (§4.1, §4.4, §4.5, §6.2).
use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PulsechatConfig {
    pub server: ServerConfig,
    pub presence: PresenceConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
    /// Per-user live connection cap (§4.1, default 5).
    pub max_connections_per_user: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            port: 7878,
            max_connections_per_user: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceConfig {
    /// TTL for the online marker, in seconds (§3, default 300s = `T_online`).
    pub online_ttl_secs: u64,
    /// TTL for the offline queue, in days (§3, default 30 days = `T_queue`).
    pub queue_ttl_days: u64,
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            online_ttl_secs: 300,
            queue_ttl_days: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite connection string, e.g. `sqlite://pulsechat.db?mode=rwc`.
    pub database_url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://pulsechat.db?mode=rwc".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared secret used to verify bearer tokens at connect time. Typically
    /// left blank in the file and resolved from `${PULSECHAT_AUTH_SECRET}`
    /// via env substitution.
    pub shared_secret: String,
}
