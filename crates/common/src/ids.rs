use uuid::Uuid;

/// Mint a fresh 128-bit identifier for a message, connection, or run.
/// Never trusted from the client — minted server-side only (§3).
pub fn new_id() -> Uuid {
    Uuid::new_v4()
}
