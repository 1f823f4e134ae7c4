use uuid::Uuid;

/// A reference pushed onto an offline queue — never a full message body
/// (§3, §9: "Queue as pointer, not payload").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuePointer {
    pub message_id: Uuid,
    pub kind: PointerKind,
    /// Set only when `kind == Group`.
    pub group_id: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Direct,
    Group,
}

impl QueuePointer {
    pub fn direct(message_id: Uuid) -> Self {
        Self {
            message_id,
            kind: PointerKind::Direct,
            group_id: None,
        }
    }

    pub fn group(message_id: Uuid, group_id: Uuid) -> Self {
        Self {
            message_id,
            kind: PointerKind::Group,
            group_id: Some(group_id),
        }
    }
}
