/// Protocol version advertised in the startup banner and `/health`.
pub const PROTOCOL_VERSION: u32 = 1;

/// Default TTL for an `online:{user}` presence marker, in seconds (§3).
pub const T_ONLINE_SECS: u64 = 300;

/// Default TTL for a user's `offline_queue:{user}`, in days (§3).
pub const T_QUEUE_DAYS: u64 = 30;

/// Per-user live connection cap (§4.1, §5).
pub const MAX_CONNECTIONS_PER_USER: usize = 5;

/// Maximum accepted message body length, in characters (§4.3).
pub const MAX_CONTENT_CHARS: usize = 10_000;

/// Recommended client ping interval: half of `T_ONLINE_SECS` (§4.5).
pub const RECOMMENDED_PING_INTERVAL_SECS: u64 = T_ONLINE_SECS / 2;

/// Default `message_type` when a client omits it (§6.1).
pub const DEFAULT_MESSAGE_KIND: &str = "text";
