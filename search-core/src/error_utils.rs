use crate::error::*;
use std::time::Duration;
use tracing::error;

pub trait ErrorExt {
    fn log_error(&self) -> &Self;
    fn is_retryable(&self) -> bool;
    fn retry_after(&self) -> Option<Duration>;
    fn user_friendly_message(&self) -> String;
    fn error_code(&self) -> String;
}

impl ErrorExt for CoreError {
    fn log_error(&self) -> &Self {
        error!("CoreError: {}", self);
        match self.root_cause() {
            CoreError::RedditApi(e) => {
                error!("Reddit API error details: {:?}", e);
            }
            CoreError::Config(e) => {
                error!("Configuration error details: {:?}", e);
            }
            _ => {}
        }
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            CoreError::RedditApi(e) => e.is_retryable(),
            CoreError::Network(e) => {
                e.is_timeout() || e.is_connect() || e.is_request() || e.is_body() || e.is_decode()
            }
            CoreError::SearchFailed { source, .. } => source.is_retryable(),
            CoreError::Config(_) | CoreError::InvalidInput { .. } => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            CoreError::RedditApi(e) => e.retry_after(),
            CoreError::SearchFailed { source, .. } => source.retry_after(),
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            CoreError::RedditApi(e) => e.user_friendly_message(),
            CoreError::Config(e) => e.user_friendly_message(),
            CoreError::Network(_) => {
                "Network connection error. Please check your internet connection.".to_string()
            }
            CoreError::InvalidInput { message } => {
                format!("Invalid input: {}. Please check your input and try again.", message)
            }
            CoreError::SearchFailed { subreddit, source } => {
                format!(
                    "Searching r/{} failed. {}",
                    subreddit,
                    source.user_friendly_message()
                )
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            CoreError::RedditApi(_) => "REDDIT_API".to_string(),
            CoreError::Config(_) => "CONFIG".to_string(),
            CoreError::Network(_) => "NETWORK".to_string(),
            CoreError::InvalidInput { .. } => "INVALID_INPUT".to_string(),
            CoreError::SearchFailed { .. } => "SEARCH_FAILED".to_string(),
        }
    }
}

impl ErrorExt for RedditApiError {
    fn log_error(&self) -> &Self {
        error!("RedditApiError: {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        match self {
            RedditApiError::RateLimitExceeded { .. } => true,
            RedditApiError::RequestTimeout => true,
            RedditApiError::ServerError { .. } => true,
            // Truncated or garbled payloads are usually a proxy hiccup
            RedditApiError::InvalidResponse { .. } => true,
            _ => false,
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            RedditApiError::RateLimitExceeded { retry_after } => {
                Some(Duration::from_secs(*retry_after))
            }
            _ => None,
        }
    }

    fn user_friendly_message(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { .. } => {
                "Failed to authenticate with Reddit. Please check your credentials.".to_string()
            }
            RedditApiError::RateLimitExceeded { retry_after } => {
                format!(
                    "Reddit API rate limit reached. Please wait {} seconds before trying again.",
                    retry_after
                )
            }
            RedditApiError::Forbidden { resource } => {
                format!("Access to {} is forbidden.", resource)
            }
            RedditApiError::NotFound { resource } => {
                format!("Could not find: {}", resource)
            }
            RedditApiError::InvalidToken => {
                "Your Reddit authentication token is invalid. Please try again.".to_string()
            }
            RedditApiError::RequestTimeout => {
                "The request to Reddit timed out. Please try again.".to_string()
            }
            RedditApiError::InvalidResponse { .. } => {
                "Received an invalid response from Reddit. Please try again later.".to_string()
            }
            RedditApiError::ServerError { .. } | RedditApiError::UnexpectedStatus { .. } => {
                "Reddit servers are having issues. Please try again later.".to_string()
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            RedditApiError::AuthenticationFailed { .. } => "AUTH_FAILED".to_string(),
            RedditApiError::RateLimitExceeded { .. } => "RATE_LIMITED".to_string(),
            RedditApiError::Forbidden { .. } => "FORBIDDEN".to_string(),
            RedditApiError::NotFound { .. } => "NOT_FOUND".to_string(),
            RedditApiError::InvalidToken => "INVALID_TOKEN".to_string(),
            RedditApiError::RequestTimeout => "TIMEOUT".to_string(),
            RedditApiError::InvalidResponse { .. } => "INVALID_RESPONSE".to_string(),
            RedditApiError::ServerError { .. } => "SERVER_ERROR".to_string(),
            RedditApiError::UnexpectedStatus { .. } => "UNEXPECTED_STATUS".to_string(),
        }
    }
}

impl ErrorExt for ConfigError {
    fn log_error(&self) -> &Self {
        error!("ConfigError: {}", self);
        self
    }

    fn is_retryable(&self) -> bool {
        false
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }

    fn user_friendly_message(&self) -> String {
        match self {
            ConfigError::MissingCredentials { fields } => {
                format!(
                    "Reddit credentials are missing. Please set: {}",
                    fields.join(", ")
                )
            }
            ConfigError::InvalidValue { field, value } => {
                format!("Invalid value '{}' for setting '{}'.", value, field)
            }
        }
    }

    fn error_code(&self) -> String {
        match self {
            ConfigError::MissingCredentials { .. } => "MISSING_CREDENTIALS".to_string(),
            ConfigError::InvalidValue { .. } => "INVALID_VALUE".to_string(),
        }
    }
}
