//! Bearer credential exchange and caching.
//!
//! [`ServiceAccountExchange`] implements the OAuth2 JWT bearer grant: it signs
//! a short-lived RS256 assertion with the service account key and trades it at
//! the token endpoint for an access token. [`TokenCache`] holds the most
//! recent token until its TTL runs out.

use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::push::PushError;

/// OAuth2 grant type for signed JWT assertions.
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Scope required to send messages through the push provider.
const MESSAGING_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

/// Lifetime of the signed assertion itself (seconds).
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// An access token returned by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BearerCredential {
    pub access_token: String,
    /// Provider-reported lifetime; informational, the cache uses its own TTL.
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Obtains a fresh bearer credential from an identity provider.
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    async fn exchange(&self) -> Result<BearerCredential, PushError>;
}

// ---------------------------------------------------------------------------
// TokenCache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Single-slot bearer credential cache with a fixed TTL.
///
/// The lock is held only while reading or replacing the slot, never across a
/// credential exchange.
#[derive(Debug)]
pub struct TokenCache {
    ttl: Duration,
    slot: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    /// Create an empty cache whose entries live for `ttl`.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: RwLock::new(None),
        }
    }

    /// The cached token, if one exists and `now < expiry`.
    pub async fn get(&self) -> Option<String> {
        let slot = self.slot.read().await;
        slot.as_ref()
            .filter(|cached| Instant::now() < cached.expires_at)
            .map(|cached| cached.value.clone())
    }

    /// Store `token` with `expiry = now + ttl` and return it.
    pub async fn store(&self, token: String) -> String {
        let cached = CachedToken {
            value: token.clone(),
            expires_at: Instant::now() + self.ttl,
        };
        *self.slot.write().await = Some(cached);
        token
    }

    /// Drop the cached token so the next caller exchanges a new one. Used when
    /// the provider rejects a token before its TTL runs out.
    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }
}

// ---------------------------------------------------------------------------
// ServiceAccountExchange
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Exchanges a signed service-account assertion for an access token.
pub struct ServiceAccountExchange {
    client: reqwest::Client,
    client_email: String,
    private_key: String,
    token_uri: String,
}

impl ServiceAccountExchange {
    pub fn new(
        client: reqwest::Client,
        client_email: String,
        private_key: String,
        token_uri: String,
    ) -> Self {
        Self {
            client,
            client_email,
            private_key,
            token_uri,
        }
    }

    /// Sign the RS256 assertion presented to the token endpoint.
    fn sign_assertion(&self) -> Result<String, PushError> {
        let iat = unix_now();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: MESSAGING_SCOPE,
            aud: &self.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())?;
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &key,
        )?)
    }
}

#[async_trait]
impl CredentialExchange for ServiceAccountExchange {
    async fn exchange(&self) -> Result<BearerCredential, PushError> {
        let assertion = self.sign_assertion()?;
        let response = self
            .client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            tracing::warn!(status, token_uri = %self.token_uri, "Credential exchange rejected");
            return Err(PushError::CredentialExchange(status));
        }

        let credential: BearerCredential = response.json().await?;
        tracing::info!(expires_in = ?credential.expires_in, "Push credential exchanged");
        Ok(credential)
    }
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
