use crate::retry::RetryConfig;
use search_core::{ConfigError, CoreError};
use std::fmt;
use std::time::Duration;
use url::Url;

pub const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";
pub const REDDIT_API_BASE: &str = "https://oauth.reddit.com";
pub const REDDIT_SITE_ORIGIN: &str = "https://reddit.com";
pub const DEFAULT_USER_AGENT: &str = "reddit-search/0.1 (by reddit-client)";

pub const ENV_CLIENT_ID: &str = "REDDIT_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "REDDIT_CLIENT_SECRET";
pub const ENV_USERNAME: &str = "REDDIT_USERNAME";
pub const ENV_PASSWORD: &str = "REDDIT_PASSWORD";
pub const ENV_USER_AGENT: &str = "REDDIT_USER_AGENT";

/// Script-app credentials for the password grant.
///
/// Fields stay optional until a token is actually needed, so a client can be
/// built (and seeded with a token) without a complete set.
#[derive(Clone, Default)]
pub struct Credentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Borrowed view of a complete credential set.
#[derive(Clone, Copy)]
pub(crate) struct ResolvedCredentials<'a> {
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub username: &'a str,
    pub password: &'a str,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client_id: Some(client_id.into()),
            client_secret: Some(client_secret.into()),
            username: Some(username.into()),
            password: Some(password.into()),
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        Self {
            client_id: read(ENV_CLIENT_ID),
            client_secret: read(ENV_CLIENT_SECRET),
            username: read(ENV_USERNAME),
            password: read(ENV_PASSWORD),
        }
    }

    /// Names of the environment variables whose values are missing or blank.
    pub fn missing_fields(&self) -> Vec<String> {
        [
            (ENV_CLIENT_ID, &self.client_id),
            (ENV_CLIENT_SECRET, &self.client_secret),
            (ENV_USERNAME, &self.username),
            (ENV_PASSWORD, &self.password),
        ]
        .into_iter()
        .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
        .map(|(name, _)| name.to_string())
        .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    pub(crate) fn resolve(&self) -> Result<ResolvedCredentials<'_>, ConfigError> {
        match (
            self.client_id.as_deref(),
            self.client_secret.as_deref(),
            self.username.as_deref(),
            self.password.as_deref(),
        ) {
            (Some(client_id), Some(client_secret), Some(username), Some(password))
                if self.is_complete() =>
            {
                Ok(ResolvedCredentials {
                    client_id,
                    client_secret,
                    username,
                    password,
                })
            }
            _ => Err(ConfigError::MissingCredentials {
                fields: self.missing_fields(),
            }),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |value: &Option<String>| value.as_ref().map(|_| "<redacted>");
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &redact(&self.client_secret))
            .field("username", &self.username)
            .field("password", &redact(&self.password))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct RedditConfig {
    pub credentials: Credentials,
    pub user_agent: String,
    pub token_url: String,
    pub api_base: String,
    /// Prefixed to relative permalinks.
    pub site_origin: String,
    pub token_timeout: Duration,
    pub search_timeout: Duration,
    /// Subtracted from the server-declared token lifetime.
    pub token_expiry_margin: Duration,
    pub retry: RetryConfig,
    /// Floor for the wait after a 429, whatever `Retry-After` says.
    pub min_rate_limit_delay: Duration,
    /// How many times a rate-limited search is replayed after waiting.
    pub max_rate_limit_retries: u32,
}

impl RedditConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            token_url: REDDIT_TOKEN_URL.to_string(),
            api_base: REDDIT_API_BASE.to_string(),
            site_origin: REDDIT_SITE_ORIGIN.to_string(),
            token_timeout: Duration::from_secs(8),
            search_timeout: Duration::from_secs(10),
            token_expiry_margin: Duration::from_secs(60),
            retry: RetryConfig::default(),
            min_rate_limit_delay: Duration::from_millis(1000),
            max_rate_limit_retries: 1,
        }
    }

    /// Reads `REDDIT_CLIENT_ID`, `REDDIT_CLIENT_SECRET`, `REDDIT_USERNAME`,
    /// `REDDIT_PASSWORD` and the optional `REDDIT_USER_AGENT`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let user_agent = lookup(ENV_USER_AGENT)
            .map(|agent| agent.trim().to_string())
            .filter(|agent| !agent.is_empty());
        let config = Self::new(Credentials::from_lookup(&lookup));
        match user_agent {
            Some(agent) => config.with_user_agent(agent),
            None => config,
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_token_url(mut self, token_url: &str) -> Result<Self, CoreError> {
        self.token_url = parse_url("token_url", token_url)?.to_string();
        Ok(self)
    }

    pub fn with_api_base(mut self, api_base: &str) -> Result<Self, CoreError> {
        self.api_base = parse_url("api_base", api_base)?.to_string();
        Ok(self)
    }

    pub fn with_site_origin(mut self, site_origin: impl Into<String>) -> Self {
        self.site_origin = site_origin.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_min_rate_limit_delay(mut self, delay: Duration) -> Self {
        self.min_rate_limit_delay = delay;
        self
    }
}

pub(crate) fn parse_url(field: &str, value: &str) -> Result<Url, CoreError> {
    match Url::parse(value) {
        Ok(url) if !url.cannot_be_a_base() => Ok(url),
        _ => Err(CoreError::Config(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_config_from_environment() {
        let config = RedditConfig::from_lookup(lookup_from(&[
            ("REDDIT_CLIENT_ID", "client"),
            ("REDDIT_CLIENT_SECRET", "secret"),
            ("REDDIT_USERNAME", "bot"),
            ("REDDIT_PASSWORD", "hunter2"),
            ("REDDIT_USER_AGENT", "manga-finder/1.0 by bot"),
        ]));

        assert!(config.credentials.is_complete());
        assert_eq!(config.user_agent, "manga-finder/1.0 by bot");
        assert_eq!(config.token_url, REDDIT_TOKEN_URL);
        assert_eq!(config.token_timeout, Duration::from_secs(8));
        assert_eq!(config.search_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_user_agent_defaults_when_unset() {
        let config = RedditConfig::from_lookup(lookup_from(&[("REDDIT_USER_AGENT", "  ")]));
        assert_eq!(config.user_agent, DEFAULT_USER_AGENT);
    }

    #[test]
    fn test_blank_credentials_count_as_missing() {
        let credentials = Credentials::from_lookup(lookup_from(&[
            ("REDDIT_CLIENT_ID", "client"),
            ("REDDIT_CLIENT_SECRET", ""),
            ("REDDIT_USERNAME", "bot"),
        ]));

        assert_eq!(
            credentials.missing_fields(),
            vec!["REDDIT_CLIENT_SECRET", "REDDIT_PASSWORD"]
        );
        assert!(matches!(
            credentials.resolve(),
            Err(ConfigError::MissingCredentials { .. })
        ));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let credentials = Credentials::new("client", "top-secret", "bot", "hunter2");
        let rendered = format!("{:?}", credentials);
        assert!(rendered.contains("client"));
        assert!(!rendered.contains("top-secret"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_invalid_url_override() {
        let result = RedditConfig::new(Credentials::default()).with_api_base("not a url");
        assert!(matches!(
            result,
            Err(CoreError::Config(ConfigError::InvalidValue { .. }))
        ));
    }
}
