//! Message Store facade (C2, §3, §4, §6.2): durable record of direct
//! messages, group messages, and group membership, exposed through the
//! narrow set of operations the core needs. The control-plane collaborator
//! (history/conversation-listing REST surface, group administration) is
//! out of scope and not implemented here — only the trait it and the core
//! would share.

pub mod error;
pub mod memory;
pub mod model;
pub mod sqlite;
pub mod traits;

pub use error::StoreError;
pub use memory::InMemoryMessageStore;
pub use model::{DirectMessage, Group, GroupMember, GroupMessage, GroupRole};
pub use sqlite::SqliteMessageStore;
pub use traits::MessageStore;
