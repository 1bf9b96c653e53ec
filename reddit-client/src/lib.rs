//! Client for Reddit's subreddit search endpoint, authenticated with an
//! OAuth2 password grant.

pub mod api;
pub mod auth;
pub mod config;
pub mod retry;


pub use api::RedditApiClient;
pub use auth::{AccessToken, TokenManager};
pub use config::{Credentials, RedditConfig};
pub use retry::{RetryConfig, RetryExecutor};

use reqwest::Client;
use search_core::{CoreError, ErrorExt, RedditApiError, SearchOptions, SearchPage};
use tracing::{debug, info_span, warn, Instrument};
use uuid::Uuid;

#[derive(Debug)]
pub struct RedditClient {
    api: RedditApiClient,
    tokens: TokenManager,
    user_agent: String,
}

impl RedditClient {
    pub fn new(config: RedditConfig) -> Result<Self, CoreError> {
        let http_client = Client::builder()
            .user_agent(&config.user_agent)
            .build()
            .map_err(CoreError::Network)?;

        Ok(Self {
            api: RedditApiClient::new(http_client.clone(), &config),
            tokens: TokenManager::new(http_client, &config),
            user_agent: config.user_agent,
        })
    }

    /// Builds a client from the `REDDIT_*` environment variables.
    pub fn from_env() -> Result<Self, CoreError> {
        Self::new(RedditConfig::from_env())
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Returns a valid bearer token, reusing the cached one while it lasts.
    pub async fn access_token(&self) -> Result<String, CoreError> {
        self.tokens.access_token().await
    }

    pub async fn cached_token(&self) -> Option<AccessToken> {
        self.tokens.cached_token().await
    }

    pub async fn set_token(&self, token: AccessToken) {
        self.tokens.set_token(token).await
    }

    pub async fn clear_token(&self) {
        self.tokens.clear_token().await
    }

    pub async fn is_authenticated(&self) -> bool {
        self.cached_token()
            .await
            .map_or(false, |token| token.is_valid())
    }

    /// Searches `r/{subreddit}` for `query`, returning one page of results.
    ///
    /// Empty arguments fail before any request is made. Token failures are
    /// returned as-is; failures of the search request itself come back as
    /// [`CoreError::SearchFailed`] with the upstream error as its source.
    pub async fn search(
        &self,
        subreddit: &str,
        query: &str,
        options: SearchOptions,
    ) -> Result<SearchPage, CoreError> {
        validate_not_empty("subreddit", subreddit)?;
        validate_not_empty("query", query)?;

        let request_id = Uuid::new_v4();
        let span = info_span!("reddit_search", %request_id, subreddit, sort = %options.sort);

        self.search_page(subreddit, query, &options)
            .instrument(span)
            .await
    }

    async fn search_page(
        &self,
        subreddit: &str,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchPage, CoreError> {
        let access_token = self.access_token().await?;

        match self
            .api
            .search_subreddit(&access_token, subreddit, query, options)
            .await
        {
            Ok(page) => Ok(page),
            Err(error) => {
                if matches!(error, CoreError::RedditApi(RedditApiError::InvalidToken)) {
                    warn!("Reddit rejected the access token");
                    self.tokens.invalidate(&access_token).await;
                }
                let error = CoreError::SearchFailed {
                    subreddit: subreddit.to_string(),
                    source: Box::new(error),
                };
                error.log_error();
                Err(error)
            }
        }
    }

    /// Follows the pagination cursor for up to `max_pages` pages (at least
    /// one) and concatenates the posts in order. The returned cursor resumes
    /// after the last page fetched, or is `None` once results run out.
    pub async fn search_all(
        &self,
        subreddit: &str,
        query: &str,
        options: SearchOptions,
        max_pages: usize,
    ) -> Result<SearchPage, CoreError> {
        let mut posts = Vec::new();
        let mut options = options;
        let mut next_cursor = None;

        for page_number in 1..=max_pages.max(1) {
            let page = self.search(subreddit, query, options.clone()).await?;
            debug!(
                "Page {} of r/{} returned {} posts",
                page_number,
                subreddit,
                page.posts.len()
            );
            posts.extend(page.posts);

            next_cursor = page.next_cursor;
            match &next_cursor {
                Some(cursor) => options.after = Some(cursor.clone()),
                None => break,
            }
        }

        Ok(SearchPage { posts, next_cursor })
    }
}

fn validate_not_empty(field: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::invalid_input(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(())
}
