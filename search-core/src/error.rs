use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Reddit API error: {0}")]
    RedditApi(#[from] RedditApiError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// A search request failed. `source` keeps the typed cause so callers can
    /// still match on it after the subreddit context has been attached.
    #[error("Search in r/{subreddit} failed: {source}")]
    SearchFailed {
        subreddit: String,
        source: Box<CoreError>,
    },
}

impl CoreError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        CoreError::InvalidInput {
            message: message.into(),
        }
    }

    /// Innermost error, looking through `SearchFailed` wrappers.
    pub fn root_cause(&self) -> &CoreError {
        match self {
            CoreError::SearchFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RedditApiError {
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed { reason: String },

    #[error("Rate limit exceeded. Retry after {retry_after} seconds")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Forbidden access to resource: {resource}")]
    Forbidden { resource: String },

    #[error("Resource not found: {resource}")]
    NotFound { resource: String },

    #[error("Invalid OAuth token")]
    InvalidToken,

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Invalid API response: {details}")]
    InvalidResponse { details: String },

    #[error("Server error {status_code}: {body}")]
    ServerError { status_code: u16, body: String },

    #[error("Unexpected status {status_code}: {body}")]
    UnexpectedStatus { status_code: u16, body: String },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Missing credentials: {}", .fields.join(", "))]
    MissingCredentials { fields: Vec<String> },

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },
}
