//! Push notification delivery via an HTTP push provider.
//!
//! [`PushGatewayClient`] sends one message per recipient to a Firebase Cloud
//! Messaging style `messages:send` endpoint. Each user is addressed through
//! the provider topic `user-<id>`, which the mobile clients subscribe to after
//! login. Requests are authenticated with a bearer credential obtained from
//! [`CredentialExchange`] and cached in a [`TokenCache`].
//!
//! There is no retry: a failed delivery is returned to the caller, which logs
//! it and moves on.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pinwatch_core::types::DbId;
use serde::Serialize;

use super::credentials::{CredentialExchange, ServiceAccountExchange, TokenCache};

/// Provider-side string map attached to a push message.
pub type PushData = BTreeMap<String, String>;

/// HTTP request timeout for a single provider call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default OAuth2 token endpoint for service-account credentials.
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Default credential lifetime: 55 minutes, below the provider's 60.
const DEFAULT_TOKEN_TTL_SECS: u64 = 55 * 60;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for push delivery and credential exchange failures.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The push provider returned a non-2xx status code.
    #[error("Push provider returned HTTP {0}")]
    HttpStatus(u16),

    /// The identity provider rejected the credential exchange.
    #[error("Credential exchange returned HTTP {0}")]
    CredentialExchange(u16),

    /// The service-account assertion could not be signed.
    #[error("Credential signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

// ---------------------------------------------------------------------------
// PushSender
// ---------------------------------------------------------------------------

/// Delivers a single push notification to one user.
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn send_push(
        &self,
        user_id: DbId,
        title: &str,
        body: &str,
        data: &PushData,
    ) -> Result<(), PushError>;
}

// ---------------------------------------------------------------------------
// PushConfig
// ---------------------------------------------------------------------------

/// Configuration for the push gateway client.
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Provider project identifier.
    pub project_id: String,
    /// Service account identity used as the assertion issuer.
    pub client_email: String,
    /// PEM-encoded RSA private key of the service account.
    pub private_key: String,
    /// OAuth2 token endpoint the assertion is exchanged at.
    pub token_uri: String,
    /// Full `messages:send` URL.
    pub endpoint: String,
    /// How long an exchanged credential is reused.
    pub token_ttl: Duration,
}

impl PushConfig {
    /// Build a config for `project_id` with the default provider URLs and TTL.
    pub fn new(
        project_id: impl Into<String>,
        client_email: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Self {
        let project_id = project_id.into();
        Self {
            endpoint: default_endpoint(&project_id),
            project_id,
            client_email: client_email.into(),
            private_key: private_key.into(),
            token_uri: DEFAULT_TOKEN_URI.to_string(),
            token_ttl: Duration::from_secs(DEFAULT_TOKEN_TTL_SECS),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `PUSH_PROJECT_ID` is not set, signalling that push
    /// delivery is not configured and should be skipped. Also returns `None`
    /// (with a warning) when the project is set but the service account
    /// credentials are missing.
    ///
    /// # Panics
    ///
    /// Panics if `PUSH_TOKEN_TTL_SECS` is set but is not a valid `u64`.
    ///
    /// | Variable              | Required | Default                                   |
    /// |-----------------------|----------|-------------------------------------------|
    /// | `PUSH_PROJECT_ID`     | yes      | -                                         |
    /// | `PUSH_CLIENT_EMAIL`   | yes      | -                                         |
    /// | `PUSH_PRIVATE_KEY`    | yes      | -                                         |
    /// | `PUSH_TOKEN_URI`      | no       | `https://oauth2.googleapis.com/token`     |
    /// | `PUSH_ENDPOINT`       | no       | FCM v1 `messages:send` for the project    |
    /// | `PUSH_TOKEN_TTL_SECS` | no       | `3300`                                    |
    pub fn from_env() -> Option<Self> {
        let project_id = std::env::var("PUSH_PROJECT_ID").ok()?;

        let (Ok(client_email), Ok(private_key)) = (
            std::env::var("PUSH_CLIENT_EMAIL"),
            std::env::var("PUSH_PRIVATE_KEY"),
        ) else {
            tracing::warn!(
                project_id = %project_id,
                "PUSH_PROJECT_ID is set but service account credentials are missing, push disabled"
            );
            return None;
        };

        let mut config = Self::new(project_id, client_email, private_key.replace("\\n", "\n"));

        if let Ok(token_uri) = std::env::var("PUSH_TOKEN_URI") {
            config.token_uri = token_uri;
        }
        if let Ok(endpoint) = std::env::var("PUSH_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Ok(raw) = std::env::var("PUSH_TOKEN_TTL_SECS") {
            config.token_ttl = parse_token_ttl(&raw);
        }

        Some(config)
    }
}

/// Parse `PUSH_TOKEN_TTL_SECS`, panicking on a value that is not a whole
/// number of seconds.
fn parse_token_ttl(raw: &str) -> Duration {
    match raw.trim().parse::<u64>() {
        Ok(secs) => Duration::from_secs(secs),
        Err(e) => panic!("PUSH_TOKEN_TTL_SECS is invalid ('{raw}'): {e}"),
    }
}

fn default_endpoint(project_id: &str) -> String {
    format!("https://fcm.googleapis.com/v1/projects/{project_id}/messages:send")
}

/// Provider topic every device of `user_id` is subscribed to.
pub fn user_topic(user_id: DbId) -> String {
    format!("user-{user_id}")
}

// ---------------------------------------------------------------------------
// Wire format
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    message: OutboundMessage<'a>,
}

#[derive(Debug, Serialize)]
struct OutboundMessage<'a> {
    topic: String,
    notification: OutboundNotification<'a>,
    data: &'a PushData,
}

#[derive(Debug, Serialize)]
struct OutboundNotification<'a> {
    title: &'a str,
    body: &'a str,
}

// ---------------------------------------------------------------------------
// PushGatewayClient
// ---------------------------------------------------------------------------

/// Sends push notifications through the provider's HTTP API.
pub struct PushGatewayClient {
    client: reqwest::Client,
    endpoint: String,
    exchange: Arc<dyn CredentialExchange>,
    cache: TokenCache,
}

impl PushGatewayClient {
    /// Create a client that exchanges service-account assertions for tokens.
    pub fn new(config: PushConfig) -> Result<Self, PushError> {
        let client = build_http_client()?;
        let exchange = Arc::new(ServiceAccountExchange::new(
            client.clone(),
            config.client_email.clone(),
            config.private_key.clone(),
            config.token_uri.clone(),
        ));
        Ok(Self::with_exchange(client, config, exchange))
    }

    /// Create a client with a custom credential exchange.
    pub fn with_exchange(
        client: reqwest::Client,
        config: PushConfig,
        exchange: Arc<dyn CredentialExchange>,
    ) -> Self {
        Self {
            client,
            endpoint: config.endpoint,
            exchange,
            cache: TokenCache::new(config.token_ttl),
        }
    }

    /// Return the cached bearer credential, exchanging a new one if expired.
    ///
    /// The cache is not locked across the exchange: concurrent callers that
    /// all observe an expired credential each fetch a fresh one and the last
    /// write wins.
    pub async fn get_token(&self) -> Result<String, PushError> {
        if let Some(token) = self.cache.get().await {
            return Ok(token);
        }

        tracing::debug!("Push credential missing or expired, exchanging");
        let credential = self.exchange.exchange().await?;
        Ok(self.cache.store(credential.access_token).await)
    }

    /// Execute a single `messages:send` request and check the response status.
    async fn try_send(&self, token: &str, request: &SendRequest<'_>) -> Result<(), PushError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(token)
            .json(request)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PushError::HttpStatus(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl PushSender for PushGatewayClient {
    async fn send_push(
        &self,
        user_id: DbId,
        title: &str,
        body: &str,
        data: &PushData,
    ) -> Result<(), PushError> {
        let token = self.get_token().await?;
        let request = SendRequest {
            message: OutboundMessage {
                topic: user_topic(user_id),
                notification: OutboundNotification { title, body },
                data,
            },
        };
        match self.try_send(&token, &request).await {
            Ok(()) => {
                tracing::debug!(user_id, "Push notification sent");
                Ok(())
            }
            Err(PushError::HttpStatus(401)) => {
                tracing::warn!(user_id, "Push provider rejected credential, dropping cached token");
                self.cache.invalidate().await;
                Err(PushError::HttpStatus(401))
            }
            Err(e) => Err(e),
        }
    }
}

/// Build the shared HTTP client used for both exchange and send calls.
pub fn build_http_client() -> Result<reqwest::Client, PushError> {
    Ok(reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
