//! Password-grant token acquisition and the per-client token store.

use crate::config::{Credentials, RedditConfig, ResolvedCredentials};
use crate::retry::RetryExecutor;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::Client;
use search_core::{CoreError, RedditApiError};
use serde::Deserialize;
use std::fmt;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// A bearer token plus the instant after which it is no longer used.
#[derive(Clone, PartialEq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            value: value.into(),
            expires_at,
        }
    }

    /// Token issued at `issued_at` that the server declared valid for
    /// `expires_in` seconds, shortened by `margin`.
    pub fn issued(
        value: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_in: u64,
        margin: Duration,
    ) -> Self {
        let lifetime =
            i64::try_from(expires_in.saturating_sub(margin.as_secs())).unwrap_or(i64::MAX);
        let expires_at = chrono::Duration::try_seconds(lifetime)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::new(value, expires_at)
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Body of Reddit's `access_token` endpoint. Reddit answers some credential
/// failures with `200 OK` and an `error` field, so every field is optional.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Owns the cached token and performs exchanges when it is missing or stale.
///
/// The exchange runs while the write half of the store's lock is held, so
/// callers racing on an empty cache wait for one exchange instead of each
/// starting their own.
#[derive(Debug)]
pub struct TokenManager {
    http_client: Client,
    token_url: String,
    credentials: Credentials,
    timeout: Duration,
    expiry_margin: Duration,
    retry: RetryExecutor,
    token: RwLock<Option<AccessToken>>,
}

impl TokenManager {
    pub fn new(http_client: Client, config: &RedditConfig) -> Self {
        Self {
            http_client,
            token_url: config.token_url.clone(),
            credentials: config.credentials.clone(),
            timeout: config.token_timeout,
            expiry_margin: config.token_expiry_margin,
            retry: RetryExecutor::new(config.retry.clone()),
            token: RwLock::new(None),
        }
    }

    /// Returns a valid bearer token, exchanging credentials when needed.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        {
            let cached = self.token.read().await;
            if let Some(token) = cached.as_ref().filter(|token| token.is_valid()) {
                debug!("Using cached Reddit access token");
                return Ok(token.value.clone());
            }
        }

        let mut cached = self.token.write().await;

        // Another task may have finished an exchange while we waited
        if let Some(token) = cached.as_ref().filter(|token| token.is_valid()) {
            debug!("Access token refreshed by a concurrent caller");
            return Ok(token.value.clone());
        }

        let credentials = self.credentials.resolve()?;
        let token = self
            .retry
            .execute("reddit token exchange", || self.exchange(credentials))
            .await?;

        info!("Obtained Reddit access token, expires at {}", token.expires_at);
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    pub async fn cached_token(&self) -> Option<AccessToken> {
        self.token.read().await.clone()
    }

    pub async fn set_token(&self, token: AccessToken) {
        *self.token.write().await = Some(token);
    }

    pub async fn clear_token(&self) {
        if self.token.write().await.take().is_some() {
            debug!("Cleared cached Reddit access token");
        }
    }

    /// Drops the cached token only if it is still the one Reddit rejected.
    /// Returns whether anything was cleared.
    pub async fn invalidate(&self, rejected: &str) -> bool {
        let mut cached = self.token.write().await;
        match cached.as_ref() {
            Some(token) if token.value == rejected => {
                *cached = None;
                debug!("Invalidated rejected Reddit access token");
                true
            }
            Some(_) => {
                debug!("Rejected token was already replaced, keeping the cached one");
                false
            }
            None => false,
        }
    }

    async fn exchange(
        &self,
        credentials: ResolvedCredentials<'_>,
    ) -> Result<AccessToken, CoreError> {
        debug!("Requesting Reddit access token for {}", credentials.username);
        let issued_at = Utc::now();

        let form = [
            ("grant_type", "password"),
            ("username", credentials.username),
            ("password", credentials.password),
        ];

        let response = self
            .http_client
            .post(&self.token_url)
            .basic_auth(credentials.client_id, Some(credentials.client_secret))
            .form(&form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.map_err(map_transport_error)?;

        match status.as_u16() {
            200..=299 => {}
            400 | 401 | 403 => {
                return Err(RedditApiError::AuthenticationFailed {
                    reason: format!("token endpoint returned {}: {}", status, body),
                }
                .into());
            }
            429 => {
                return Err(RedditApiError::RateLimitExceeded {
                    retry_after: retry_after.unwrap_or(1),
                }
                .into());
            }
            code @ 500..=599 => {
                return Err(RedditApiError::ServerError {
                    status_code: code,
                    body,
                }
                .into());
            }
            code => {
                return Err(RedditApiError::UnexpectedStatus {
                    status_code: code,
                    body,
                }
                .into());
            }
        }

        let payload: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            RedditApiError::InvalidResponse {
                details: format!("token response is not valid JSON: {}", e),
            }
        })?;

        if let Some(error) = payload.error {
            let reason = match payload.error_description {
                Some(description) => format!("{}: {}", error, description),
                None => error,
            };
            return Err(RedditApiError::AuthenticationFailed { reason }.into());
        }

        let missing = |field: &str| RedditApiError::InvalidResponse {
            details: format!("token response missing {}", field),
        };
        let value = payload
            .access_token
            .filter(|token| !token.is_empty())
            .ok_or_else(|| missing("access_token"))?;
        let expires_in = payload.expires_in.ok_or_else(|| missing("expires_in"))?;

        Ok(AccessToken::issued(
            value,
            issued_at,
            expires_in,
            self.expiry_margin,
        ))
    }
}

pub(crate) fn map_transport_error(error: reqwest::Error) -> CoreError {
    if error.is_timeout() {
        CoreError::RedditApi(RedditApiError::RequestTimeout)
    } else {
        CoreError::Network(error)
    }
}

/// Seconds to wait according to `Retry-After`, falling back to Reddit's
/// `x-ratelimit-reset` header.
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    [RETRY_AFTER.as_str(), "x-ratelimit-reset"]
        .into_iter()
        .filter_map(|name| headers.get(name))
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.trim().parse::<f64>().ok())
        .find(|seconds| seconds.is_finite() && *seconds >= 0.0)
        .map(|seconds| seconds.ceil() as u64)
}
