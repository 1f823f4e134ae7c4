//! Wire protocol for the pulsechat realtime messaging engine: frame types,
//! error codes, and the constants that bound connection/presence behavior.

pub mod constants;
pub mod error;
pub mod frame;

pub use constants::*;
pub use error::{ErrorCode, ErrorShape};
pub use frame::{decode, ClientFrame, MessageKind, OfflineMessage, OfflineMessageKind, ServerFrame};
