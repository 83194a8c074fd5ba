//! Opaque credential service: password digests and signed bearer tokens.
//!
//! The portal treats credential mechanics as a black box with two verbs,
//! issue and verify. Tokens are `base64(claims).base64(mac)` where the MAC
//! is a SHA-256 over the service secret and the payload; claims carry the
//! actor's identity and tagged role and expire after 24 hours.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{PortalError, PortalResult};
use crate::policy::Actor;
use crate::types::{Role, User};

const TOKEN_TTL_HOURS: i64 = 24;

/// Verified identity carried by a bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthClaims {
    pub sub: u64,
    pub name: String,
    pub email: String,
    #[serde(flatten)]
    pub role: Role,
    /// Expiry as a unix timestamp (seconds).
    pub exp: i64,
}

impl AuthClaims {
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.sub,
            role: self.role.clone(),
        }
    }
}

/// Salted password digest, `salt$hex`.
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b"$");
    hasher.update(password.as_bytes());
    format!("{}${:x}", salt, hasher.finalize())
}

pub fn verify_password(password: &str, stored: &str) -> bool {
    match stored.split_once('$') {
        Some((salt, _)) => hash_password(password, salt) == stored,
        None => false,
    }
}

/// Issues and verifies bearer tokens for the gateway.
#[derive(Debug, Clone)]
pub struct TokenService {
    secret: Vec<u8>,
}

impl TokenService {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn issue(&self, user: &User) -> PortalResult<String> {
        let claims = AuthClaims {
            sub: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role.clone(),
            exp: (Utc::now() + Duration::hours(TOKEN_TTL_HOURS)).timestamp(),
        };
        let payload = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&claims)
                .map_err(|err| PortalError::Persistence(err.to_string()))?,
        );
        let mac = self.sign(payload.as_bytes());
        Ok(format!("{}.{}", payload, mac))
    }

    pub fn verify(&self, token: &str) -> PortalResult<AuthClaims> {
        let (payload, mac) = token
            .split_once('.')
            .ok_or_else(|| PortalError::Authentication("malformed token".to_string()))?;
        if self.sign(payload.as_bytes()) != mac {
            return Err(PortalError::Authentication(
                "token signature mismatch".to_string(),
            ));
        }
        let bytes = URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|_| PortalError::Authentication("malformed token payload".to_string()))?;
        let claims: AuthClaims = serde_json::from_slice(&bytes)
            .map_err(|_| PortalError::Authentication("unreadable token claims".to_string()))?;
        if claims.exp < Utc::now().timestamp() {
            return Err(PortalError::Authentication("token expired".to_string()));
        }
        Ok(claims)
    }

    fn sign(&self, payload: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.secret);
        hasher.update(b".");
        hasher.update(payload);
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: 2,
            name: "Technology Editor".to_string(),
            email: "tech@newswire.local".to_string(),
            password_hash: hash_password("admin123", "s1"),
            role: Role::SectorialEditor {
                sector: "Technology".to_string(),
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn password_digest_roundtrip() {
        let stored = hash_password("admin123", "s1");
        assert!(verify_password("admin123", &stored));
        assert!(!verify_password("admin124", &stored));
        assert!(!verify_password("admin123", "garbage"));
    }

    #[test]
    fn token_roundtrip_preserves_claims() {
        let tokens = TokenService::new("test-secret");
        let token = tokens.issue(&user()).unwrap();
        let claims = tokens.verify(&token).unwrap();
        assert_eq!(claims.sub, 2);
        assert_eq!(claims.email, "tech@newswire.local");
        assert_eq!(claims.role.sector(), Some("Technology"));

        let actor = claims.actor();
        assert_eq!(actor.user_id, 2);
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let tokens = TokenService::new("test-secret");
        let token = tokens.issue(&user()).unwrap();

        let mut forged = token.clone();
        forged.truncate(forged.len() - 2);
        assert!(tokens.verify(&forged).is_err());

        // A token signed with another secret never verifies.
        let other = TokenService::new("other-secret");
        assert!(other.verify(&token).is_err());

        assert!(tokens.verify("no-separator").is_err());
    }

    #[test]
    fn expired_tokens_are_rejected() {
        let tokens = TokenService::new("test-secret");
        let claims = AuthClaims {
            sub: 1,
            name: "Chief".to_string(),
            email: "chief@newswire.local".to_string(),
            role: Role::ChiefEditor,
            exp: (Utc::now() - Duration::hours(1)).timestamp(),
        };
        let payload = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        let mac = tokens.sign(payload.as_bytes());
        let stale = format!("{}.{}", payload, mac);

        let denied = tokens.verify(&stale);
        assert!(matches!(denied, Err(PortalError::Authentication(_))));
    }
}
