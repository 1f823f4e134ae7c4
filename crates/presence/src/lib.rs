//! Presence Store (C1, §4.4): online markers with TTL and per-user offline
//! message queues with TTL. This crate ships a single-process
//! implementation — the spec explicitly accepts that (§4.5: "the spec
//! accepts a single-process implementation"); a shared-cache-backed
//! implementation is a documented extension point, not built here (see
//! DESIGN.md).

pub mod pointer;
pub mod store;

pub use pointer::{PointerKind, QueuePointer};
pub use store::{InProcessPresenceStore, PresenceStore};
