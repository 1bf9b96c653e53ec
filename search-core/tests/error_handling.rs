use search_core::{
    ConfigError, CoreError, ErrorExt, RedditApiError, RedditPost, SearchPage,
};
use std::error::Error;
use std::time::Duration;

#[test]
fn test_error_codes() {
    let reddit_error = CoreError::RedditApi(RedditApiError::InvalidToken);
    assert_eq!(reddit_error.error_code(), "REDDIT_API");

    let config_error = CoreError::Config(ConfigError::MissingCredentials {
        fields: vec!["REDDIT_CLIENT_ID".to_string()],
    });
    assert_eq!(config_error.error_code(), "CONFIG");

    let input_error = CoreError::invalid_input("query must not be empty");
    assert_eq!(input_error.error_code(), "INVALID_INPUT");
}

#[test]
fn test_retryable_errors() {
    let retryable_error =
        CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 });
    assert!(retryable_error.is_retryable());

    let server_error = CoreError::RedditApi(RedditApiError::ServerError {
        status_code: 503,
        body: "upstream unavailable".to_string(),
    });
    assert!(server_error.is_retryable());

    let auth_error = CoreError::RedditApi(RedditApiError::AuthenticationFailed {
        reason: "invalid_grant".to_string(),
    });
    assert!(!auth_error.is_retryable());

    let non_retryable_error = CoreError::Config(ConfigError::MissingCredentials {
        fields: vec!["REDDIT_PASSWORD".to_string()],
    });
    assert!(!non_retryable_error.is_retryable());
}

#[test]
fn test_retry_after() {
    let rate_limit_error =
        CoreError::RedditApi(RedditApiError::RateLimitExceeded { retry_after: 60 });
    assert_eq!(
        rate_limit_error.retry_after(),
        Some(Duration::from_secs(60))
    );

    let timeout_error = CoreError::RedditApi(RedditApiError::RequestTimeout);
    assert_eq!(timeout_error.retry_after(), None);
}

#[test]
fn test_search_failure_keeps_cause() {
    let error = CoreError::SearchFailed {
        subreddit: "manga".to_string(),
        source: Box::new(CoreError::RedditApi(RedditApiError::ServerError {
            status_code: 500,
            body: r#"{"message": "Internal Server Error"}"#.to_string(),
        })),
    };

    let message = error.to_string();
    assert!(message.contains("r/manga"));
    assert!(message.contains("Internal Server Error"));

    assert!(error.source().is_some());
    assert!(matches!(
        error.root_cause(),
        CoreError::RedditApi(RedditApiError::ServerError {
            status_code: 500,
            ..
        })
    ));
}

#[test]
fn test_user_friendly_messages() {
    let reddit_error = CoreError::RedditApi(RedditApiError::InvalidToken);
    let message = reddit_error.user_friendly_message();
    assert!(message.contains("authentication token is invalid"));

    let config_error = CoreError::Config(ConfigError::MissingCredentials {
        fields: vec!["REDDIT_CLIENT_SECRET".to_string()],
    });
    let message = config_error.user_friendly_message();
    assert!(message.contains("REDDIT_CLIENT_SECRET"));
}

#[test]
fn test_search_page_serialization() {
    let page = SearchPage {
        posts: vec![RedditPost {
            id: "abc123".to_string(),
            title: "One Piece chapter discussion".to_string(),
            url: None,
            permalink: Some("https://reddit.com/r/manga/comments/abc123/".to_string()),
            author: Some("reader".to_string()),
            created_utc: Some(1_700_000_000.0),
            score: Some(512),
            num_comments: Some(48),
            subreddit: Some("manga".to_string()),
        }],
        next_cursor: Some("t3_abc123".to_string()),
    };

    let json = serde_json::to_value(&page).unwrap();
    assert_eq!(json["next_cursor"], "t3_abc123");
    assert_eq!(json["posts"][0]["num_comments"], 48);
    assert!(page.has_more());
}
