use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::provider::{AuthError, AuthProvider, VerifiedIdentity};

type HmacSha256 = Hmac<Sha256>;

/// Verifies short-lived bearer tokens signed with a shared secret
/// (§6.1: "a short-lived token query parameter"). The out-of-scope
/// registration/login system is assumed to call [`issue`](Self::issue) (or
/// an equivalent of its own) to hand tokens to clients; this crate only
/// owns verification.
pub struct SharedSecretAuth {
    secret: Vec<u8>,
}

impl SharedSecretAuth {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Issue a bearer token good for `ttl_secs` seconds. Field order puts
    /// the free-form `display_name` last so it may itself contain `:`
    /// without breaking the parse in [`verify`](AuthProvider::verify).
    pub fn issue(&self, user_id: Uuid, display_name: &str, ttl_secs: u64) -> Result<String, AuthError> {
        let expires_at = now_unix() + ttl_secs;
        let payload = format!("{expires_at}:{user_id}:{display_name}");
        let sig = self.sign(&payload)?;
        Ok(format!("{sig}:{payload}"))
    }

    fn sign(&self, payload: &str) -> Result<String, AuthError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AuthError::InvalidKey(e.to_string()))?;
        mac.update(payload.as_bytes());
        Ok(hex_encode(&mac.finalize().into_bytes()))
    }
}

#[async_trait]
impl AuthProvider for SharedSecretAuth {
    async fn verify(&self, credential: Option<&str>) -> Result<VerifiedIdentity, AuthError> {
        let token = credential.ok_or(AuthError::MissingCredential)?;
        let mut parts = token.splitn(4, ':');
        let sig_hex = parts.next().ok_or(AuthError::Malformed)?;
        let expires_at = parts.next().ok_or(AuthError::Malformed)?;
        let user_id = parts.next().ok_or(AuthError::Malformed)?;
        let display_name = parts.next().ok_or(AuthError::Malformed)?;

        let payload = format!("{expires_at}:{user_id}:{display_name}");
        let expected_sig = hex_decode(sig_hex).map_err(|_| AuthError::Malformed)?;

        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AuthError::InvalidKey(e.to_string()))?;
        mac.update(payload.as_bytes());
        // `verify_slice` compares in constant time, same property the
        // teacher's `safe_equal` hand-rolled for plain string comparison.
        mac.verify_slice(&expected_sig)
            .map_err(|_| AuthError::SignatureMismatch)?;

        let expires_at: u64 = expires_at.parse().map_err(|_| AuthError::Malformed)?;
        if now_unix() > expires_at {
            return Err(AuthError::Expired);
        }

        let user_id = Uuid::parse_str(user_id).map_err(|_| AuthError::Malformed)?;

        Ok(VerifiedIdentity {
            user_id,
            display_name: display_name.to_string(),
        })
    }
}

fn now_unix() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn hex_decode(s: &str) -> Result<Vec<u8>, ()> {
    if s.len() % 2 != 0 {
        return Err(());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| ()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn issued_token_verifies() {
        let auth = SharedSecretAuth::new(b"test-secret".to_vec());
        let user_id = Uuid::new_v4();
        let token = auth.issue(user_id, "alice", 60).unwrap();
        let identity = auth.verify(Some(&token)).await.unwrap();
        assert_eq!(identity.user_id, user_id);
        assert_eq!(identity.display_name, "alice");
    }

    #[tokio::test]
    async fn expired_token_rejected() {
        let auth = SharedSecretAuth::new(b"test-secret".to_vec());
        let token = auth.issue(Uuid::new_v4(), "bob", 0).unwrap();
        // ttl of 0 means expires_at == now_unix() at issue time; sleep a
        // tick so `now_unix() > expires_at` is guaranteed true.
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        let err = auth.verify(Some(&token)).await.unwrap_err();
        assert!(matches!(err, AuthError::Expired));
    }

    #[tokio::test]
    async fn tampered_signature_rejected() {
        let auth = SharedSecretAuth::new(b"test-secret".to_vec());
        let token = auth.issue(Uuid::new_v4(), "carol", 60).unwrap();
        // Flip the first hex digit of the signature to a value it can't
        // already be, so this never accidentally matches the real sig.
        let first = token.chars().next().unwrap();
        let flipped = if first == '0' { '1' } else { '0' };
        let tampered = format!("{flipped}{}", &token[1..]);
        let err = auth.verify(Some(&tampered)).await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::SignatureMismatch | AuthError::Malformed
        ));
    }

    #[tokio::test]
    async fn wrong_secret_rejected() {
        let issuer = SharedSecretAuth::new(b"issuer-secret".to_vec());
        let verifier = SharedSecretAuth::new(b"different-secret".to_vec());
        let token = issuer.issue(Uuid::new_v4(), "dave", 60).unwrap();
        let err = verifier.verify(Some(&token)).await.unwrap_err();
        assert!(matches!(err, AuthError::SignatureMismatch));
    }

    #[tokio::test]
    async fn missing_credential_rejected() {
        let auth = SharedSecretAuth::new(b"test-secret".to_vec());
        let err = auth.verify(None).await.unwrap_err();
        assert!(matches!(err, AuthError::MissingCredential));
    }
}
