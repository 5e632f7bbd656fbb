//! Session tokens and acting-user resolution.
//!
//! A session token is `{user_id}.{valid_until}.{signature}` where the
//! signature is an Ed25519 signature (hex) over `user_id || valid_until`,
//! both big-endian. Tokens are stateless; the server only needs its signing
//! key to check them.

use axum::http::{header, HeaderMap};
use chrono::{DateTime, Duration, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::Serialize;
use tracing::debug;

use symbolhub_shared::constants::ANONYMOUS_USER_ID;

use crate::error::ServerError;

/// Ten years.
const MAX_SESSION_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// A freshly issued session.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Issues and checks session tokens.
pub struct SessionKeys {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(seed: &[u8; 32], ttl_secs: u64) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
            ttl: Duration::seconds(
                i64::try_from(ttl_secs)
                    .unwrap_or(MAX_SESSION_SECS)
                    .min(MAX_SESSION_SECS),
            ),
        }
    }

    pub fn issue(&self, user_id: i32) -> IssuedSession {
        let expires_at = Utc::now() + self.ttl;
        let valid_until = expires_at.timestamp();
        let signature = self.signing_key.sign(&payload(user_id, valid_until));
        IssuedSession {
            token: format!(
                "{user_id}.{valid_until}.{}",
                hex::encode(signature.to_bytes())
            ),
            expires_at,
        }
    }

    /// The user id a token was issued for, if the token is genuine and
    /// unexpired.
    pub fn verify(&self, token: &str) -> Option<i32> {
        let mut parts = token.splitn(3, '.');
        let user_id: i32 = parts.next()?.parse().ok()?;
        let valid_until: i64 = parts.next()?.parse().ok()?;
        let sig_bytes = hex::decode(parts.next()?).ok()?;

        if Utc::now().timestamp() > valid_until {
            debug!(user_id, "Session token expired");
            return None;
        }

        let signature = Signature::from_slice(&sig_bytes).ok()?;
        self.verifying_key
            .verify(&payload(user_id, valid_until), &signature)
            .ok()?;
        Some(user_id)
    }
}

fn payload(user_id: i32, valid_until: i64) -> [u8; 12] {
    let mut out = [0u8; 12];
    out[..4].copy_from_slice(&user_id.to_be_bytes());
    out[4..].copy_from_slice(&valid_until.to_be_bytes());
    out
}

/// Who a request acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActingUser {
    Authenticated(i32),
    Anonymous,
}

impl ActingUser {
    /// The user id writes are attributed to.
    pub fn user_id(self) -> i32 {
        match self {
            ActingUser::Authenticated(id) => id,
            ActingUser::Anonymous => ANONYMOUS_USER_ID,
        }
    }
}

/// No `Authorization` header means anonymous; a header that does not carry
/// a valid bearer token is rejected rather than downgraded.
pub fn resolve_acting_user(
    headers: &HeaderMap,
    keys: &SessionKeys,
) -> Result<ActingUser, ServerError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Ok(ActingUser::Anonymous);
    };

    let token = value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or_else(|| ServerError::Unauthorized("expected a bearer token".into()))?;

    keys.verify(token)
        .map(ActingUser::Authenticated)
        .ok_or_else(|| ServerError::Unauthorized("invalid or expired session".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn keys() -> SessionKeys {
        SessionKeys::new(&rand::random(), 3600)
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    #[test]
    fn test_issue_and_verify() {
        let keys = keys();
        let session = keys.issue(42);
        assert_eq!(keys.verify(&session.token), Some(42));
        assert!(session.expires_at > Utc::now());
    }

    #[test]
    fn test_wrong_key_rejected() {
        let session = keys().issue(42);
        assert_eq!(keys().verify(&session.token), None);
    }

    #[test]
    fn test_tampered_token_rejected() {
        let keys = keys();
        let session = keys.issue(42);
        let forged = session.token.replacen("42.", "43.", 1);
        assert_eq!(keys.verify(&forged), None);
        assert_eq!(keys.verify("garbage"), None);
        assert_eq!(keys.verify("1.2.zz"), None);
    }

    #[test]
    fn test_expired_token_rejected() {
        let keys = keys();
        let valid_until = Utc::now().timestamp() - 1;
        let sig = keys.signing_key.sign(&payload(7, valid_until));
        let token = format!("7.{valid_until}.{}", hex::encode(sig.to_bytes()));
        assert_eq!(keys.verify(&token), None);
    }

    #[test]
    fn test_resolve_acting_user() {
        let keys = keys();

        let acting = resolve_acting_user(&HeaderMap::new(), &keys).unwrap();
        assert_eq!(acting, ActingUser::Anonymous);
        assert_eq!(acting.user_id(), ANONYMOUS_USER_ID);

        let session = keys.issue(5);
        let acting = resolve_acting_user(&bearer(&session.token), &keys).unwrap();
        assert_eq!(acting, ActingUser::Authenticated(5));
        assert_eq!(acting.user_id(), 5);

        let err = resolve_acting_user(&bearer("1.1.00"), &keys).unwrap_err();
        assert!(matches!(err, ServerError::Unauthorized(_)));

        let mut basic = HeaderMap::new();
        basic.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(resolve_acting_user(&basic, &keys).is_err());
    }
}
