use async_trait::async_trait;
use uuid::Uuid;

/// The identity the auth collaborator hands back once a connect attempt is
/// verified (§3: "User identity (supplied by auth collaborator at connect
/// time)"). Lives only for the lifetime of one connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedIdentity {
    pub user_id: Uuid,
    pub display_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing credential")]
    MissingCredential,
    #[error("malformed credential")]
    Malformed,
    #[error("credential expired")]
    Expired,
    #[error("credential signature mismatch")]
    SignatureMismatch,
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}

/// The seam between the realtime core and whatever out-of-scope
/// registration/login system issues bearer tokens (§1, §6.1). The gateway
/// calls `verify` once per connect attempt, before Registry attach; a
/// rejection here never reaches the Connection Registry.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn verify(&self, credential: Option<&str>) -> Result<VerifiedIdentity, AuthError>;
}
