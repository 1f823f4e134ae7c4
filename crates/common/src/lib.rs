//! Shared low-level helpers used by every pulsechat crate: timestamps and id
//! generation. Deliberately thin — domain types live closer to their owners
//! (`pulsechat-protocol`, `pulsechat-store`, ...).

pub mod ids;
pub mod time;

pub use ids::new_id;
pub use time::Timestamp;
