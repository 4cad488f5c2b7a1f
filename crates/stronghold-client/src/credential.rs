//! Credential derivation from the shared secret.
//!
//! Two strategies exist side by side:
//! - signed tokens: HS256 JWT carrying `sub`, `iat`, `nbf` and a 24 hour `exp`
//! - hashed secret: the hex SHA-256 digest of the secret, used as-is
//!
//! The rest of the client only ever asks the [`CredentialManager`] for the
//! current value and never cares which strategy produced it.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::CredentialKind;
use crate::error::ClientError;

/// Lifetime of a signed token.
pub const TOKEN_VALIDITY_SECS: i64 = 86_400;

/// Authentication material sent with every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Credential {
    /// Credential that never expires.
    pub fn permanent(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expires_at: None,
        }
    }

    /// Credential that stops being valid at `expires_at`.
    pub fn expiring(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at: Some(expires_at),
        }
    }

    /// Header value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Expiry, if the credential has one.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// Check if the credential has expired.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Utc::now() >= at)
    }
}

/// Strategy turning a secret into a [`Credential`].
pub trait CredentialStrategy: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Derive credential material from the secret.
    fn derive(&self, secret: &str) -> Result<Credential, ClientError>;
}

/// Claims carried by a signed token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject: hex SHA-256 of the secret.
    pub sub: String,
    /// Issued at (Unix timestamp).
    pub iat: i64,
    /// Not before (Unix timestamp).
    pub nbf: i64,
    /// Expiration time (Unix timestamp).
    pub exp: i64,
}

/// HS256 bearer tokens keyed by the secret.
#[derive(Debug, Clone)]
pub struct SignedTokenStrategy {
    validity: Duration,
}

impl Default for SignedTokenStrategy {
    fn default() -> Self {
        Self {
            validity: Duration::seconds(TOKEN_VALIDITY_SECS),
        }
    }
}

impl CredentialStrategy for SignedTokenStrategy {
    fn name(&self) -> &'static str {
        "signed-token"
    }

    fn derive(&self, secret: &str) -> Result<Credential, ClientError> {
        let now = Utc::now();
        let expires_at = now + self.validity;

        let claims = TokenClaims {
            sub: hash_secret(secret),
            iat: now.timestamp(),
            nbf: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )?;

        Ok(Credential::expiring(token, expires_at))
    }
}

/// Static header carrying the secret's digest.
#[derive(Debug, Clone, Default)]
pub struct HashedSecretStrategy;

impl CredentialStrategy for HashedSecretStrategy {
    fn name(&self) -> &'static str {
        "hashed-secret"
    }

    fn derive(&self, secret: &str) -> Result<Credential, ClientError> {
        Ok(Credential::permanent(hash_secret(secret)))
    }
}

/// Hash a secret using SHA-256.
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    let result = hasher.finalize();
    hex::encode(result)
}

struct Established {
    secret: String,
    credential: Credential,
}

/// Caches the credential derived from the configured secret.
pub struct CredentialManager {
    strategy: Box<dyn CredentialStrategy>,
    state: RwLock<Option<Established>>,
}

impl CredentialManager {
    /// Create a manager around a strategy.
    pub fn new(strategy: impl CredentialStrategy + 'static) -> Self {
        Self {
            strategy: Box::new(strategy),
            state: RwLock::new(None),
        }
    }

    /// Create a manager for a configured strategy kind.
    pub fn for_kind(kind: CredentialKind) -> Self {
        match kind {
            CredentialKind::SignedToken => Self::new(SignedTokenStrategy::default()),
            CredentialKind::HashedSecret => Self::new(HashedSecretStrategy),
        }
    }

    /// Derive and cache credential material.
    pub async fn establish(&self, secret: &str) -> Result<Credential, ClientError> {
        if secret.is_empty() {
            return Err(ClientError::InvalidConfig("secret must not be empty".into()));
        }

        let credential = self.strategy.derive(secret)?;
        info!(
            strategy = self.strategy.name(),
            expires_at = ?credential.expires_at(),
            "Credentials established"
        );

        *self.state.write().await = Some(Established {
            secret: secret.to_string(),
            credential: credential.clone(),
        });
        Ok(credential)
    }

    /// Current credential, re-derived if the cached one expired.
    pub async fn credential(&self) -> Result<Credential, ClientError> {
        {
            let state = self.state.read().await;
            let established = state.as_ref().ok_or(ClientError::NotInitialized)?;
            if !established.credential.is_expired() {
                return Ok(established.credential.clone());
            }
        }

        let mut state = self.state.write().await;
        let established = state.as_mut().ok_or(ClientError::NotInitialized)?;
        if established.credential.is_expired() {
            debug!(strategy = self.strategy.name(), "Credential expired, re-deriving");
            established.credential = self.strategy.derive(&established.secret)?;
        }
        Ok(established.credential.clone())
    }

    /// Value used to authenticate the realtime channel.
    pub async fn realtime_credential(&self) -> Result<String, ClientError> {
        Ok(self.credential().await?.value)
    }

    /// Check if `establish` has succeeded.
    pub async fn is_established(&self) -> bool {
        self.state.read().await.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

    #[test]
    fn test_hash_secret() {
        let hash = hash_secret("hunter2");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "f52fbd32b2b3b86ff88ef6c490628285f482af15ddcb29541f94bcf526a3f6c7"
        );
    }

    #[test]
    fn test_signed_token_claims() {
        let secret = "a-very-long-shared-secret-for-tests";
        let credential = SignedTokenStrategy::default().derive(secret).unwrap();

        let data = decode::<TokenClaims>(
            credential.value(),
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )
        .unwrap();

        assert_eq!(data.claims.sub, hash_secret(secret));
        assert_eq!(data.claims.iat, data.claims.nbf);
        assert_eq!(data.claims.exp - data.claims.iat, TOKEN_VALIDITY_SECS);
        assert!(credential.expires_at().is_some());
        assert!(!credential.is_expired());
    }

    #[test]
    fn test_signed_token_rejects_other_key() {
        let credential = SignedTokenStrategy::default().derive("secret-one").unwrap();
        let result = decode::<TokenClaims>(
            credential.value(),
            &DecodingKey::from_secret(b"secret-two"),
            &Validation::new(Algorithm::HS256),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_credential_before_establish_fails() {
        let manager = CredentialManager::for_kind(CredentialKind::HashedSecret);
        assert!(!manager.is_established().await);
        assert!(matches!(
            manager.credential().await,
            Err(ClientError::NotInitialized)
        ));
        assert!(matches!(
            manager.realtime_credential().await,
            Err(ClientError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn test_hashed_secret_is_cached() {
        let manager = CredentialManager::for_kind(CredentialKind::HashedSecret);
        manager.establish("hunter2").await.unwrap();

        let first = manager.credential().await.unwrap();
        let second = manager.credential().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.value(), hash_secret("hunter2"));
        assert_eq!(manager.realtime_credential().await.unwrap(), first.value());
    }

    #[tokio::test]
    async fn test_empty_secret_rejected() {
        let manager = CredentialManager::for_kind(CredentialKind::SignedToken);
        let err = manager.establish("").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidConfig(_)));
        assert!(!manager.is_established().await);
    }

    #[derive(Default)]
    struct ShortLived {
        issued: std::sync::atomic::AtomicU32,
    }

    impl CredentialStrategy for ShortLived {
        fn name(&self) -> &'static str {
            "short-lived"
        }

        fn derive(&self, _secret: &str) -> Result<Credential, ClientError> {
            let n = self
                .issued
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Credential::expiring(
                format!("token-{}", n),
                Utc::now() - Duration::seconds(1),
            ))
        }
    }

    #[tokio::test]
    async fn test_expired_credential_is_rederived() {
        let manager = CredentialManager::new(ShortLived::default());
        let established = manager.establish("secret").await.unwrap();
        let current = manager.credential().await.unwrap();
        assert_ne!(established.value(), current.value());
    }
}
