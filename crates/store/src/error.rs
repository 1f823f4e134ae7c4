use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("direct message {0} not found")]
    DirectMessageNotFound(Uuid),

    #[error("group message {0} not found")]
    GroupMessageNotFound(Uuid),

    #[error("group {0} not found")]
    GroupNotFound(Uuid),

    #[error("user {user} is not a member of group {group}")]
    NotMember { group: Uuid, user: Uuid },

    #[error("backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}
