use crate::auth::{map_transport_error, parse_retry_after};
use crate::config::{parse_url, RedditConfig};
use reqwest::{Client, StatusCode};
use search_core::{CoreError, RedditApiError, RedditPost, SearchOptions, SearchPage};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListing<T> {
    pub kind: Option<String>,
    pub data: Option<RedditListingData<T>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListingData<T> {
    #[serde(default = "Vec::new")]
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
    pub dist: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: Option<String>,
    pub data: T,
}

/// Raw search hit. Only the fields the normalized post carries are read, and
/// each one is optional so a sparse item never fails the whole page.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    pub permalink: Option<String>,
    pub author: Option<String>,
    pub created_utc: Option<f64>,
    pub score: Option<i64>,
    pub num_comments: Option<u64>,
    pub subreddit: Option<String>,
}

impl RedditPostData {
    pub fn into_post(self, site_origin: &str) -> RedditPost {
        RedditPost {
            id: self.id,
            title: self.title,
            url: self.url,
            permalink: self
                .permalink
                .map(|permalink| absolute_permalink(site_origin, &permalink)),
            author: self.author,
            created_utc: self.created_utc,
            score: self.score,
            num_comments: self.num_comments,
            subreddit: self.subreddit,
        }
    }
}

fn absolute_permalink(site_origin: &str, permalink: &str) -> String {
    if permalink.starts_with("http://") || permalink.starts_with("https://") {
        return permalink.to_string();
    }
    format!(
        "{}/{}",
        site_origin.trim_end_matches('/'),
        permalink.trim_start_matches('/')
    )
}

/// Authenticated calls against `oauth.reddit.com`.
#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    api_base: String,
    site_origin: String,
    timeout: Duration,
    min_rate_limit_delay: Duration,
    max_rate_limit_retries: u32,
}

impl RedditApiClient {
    pub fn new(http_client: Client, config: &RedditConfig) -> Self {
        Self {
            http_client,
            api_base: config.api_base.clone(),
            site_origin: config.site_origin.clone(),
            timeout: config.search_timeout,
            min_rate_limit_delay: config.min_rate_limit_delay,
            max_rate_limit_retries: config.max_rate_limit_retries,
        }
    }

    /// GETs `segments` under the API base and returns the body of a 2xx
    /// response. A 429 is waited out and replayed up to the configured
    /// number of times.
    pub async fn make_request(
        &self,
        segments: &[&str],
        access_token: &str,
        query_params: &[(&str, String)],
    ) -> Result<String, CoreError> {
        let mut url = parse_url("api_base", &self.api_base)?;
        url.path_segments_mut()
            .map_err(|_| RedditApiError::InvalidResponse {
                details: format!("cannot build a request URL from {}", self.api_base),
            })?
            .pop_if_empty()
            .extend(segments);
        let endpoint = url.path().to_string();

        let mut rate_limit_retries = 0;
        loop {
            let start_time = Instant::now();
            info!("Making Reddit API request: GET {}", endpoint);

            let response = self
                .http_client
                .get(url.clone())
                .bearer_auth(access_token)
                .query(query_params)
                .timeout(self.timeout)
                .send()
                .await
                .map_err(|e| {
                    error!("Network error for GET {}: {}", endpoint, e);
                    map_transport_error(e)
                })?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after = parse_retry_after(response.headers());
                let delay = retry_after
                    .map(Duration::from_secs)
                    .unwrap_or_default()
                    .max(self.min_rate_limit_delay);

                if rate_limit_retries >= self.max_rate_limit_retries {
                    warn!(
                        "Still rate limited on {} after {} retries",
                        endpoint, rate_limit_retries
                    );
                    return Err(RedditApiError::RateLimitExceeded {
                        retry_after: retry_after.unwrap_or(delay.as_secs().max(1)),
                    }
                    .into());
                }

                warn!("Rate limited on {}, retrying after {:?}", endpoint, delay);
                sleep(delay).await;
                rate_limit_retries += 1;
                continue;
            }

            let body = response.text().await.map_err(map_transport_error)?;
            debug!(
                "GET {} returned {} in {:?}",
                endpoint,
                status,
                start_time.elapsed()
            );

            return match status.as_u16() {
                200..=299 => Ok(body),
                401 => Err(RedditApiError::InvalidToken.into()),
                403 => Err(RedditApiError::Forbidden { resource: endpoint }.into()),
                404 => Err(RedditApiError::NotFound { resource: endpoint }.into()),
                code @ 500..=599 => Err(RedditApiError::ServerError {
                    status_code: code,
                    body,
                }
                .into()),
                code => Err(RedditApiError::UnexpectedStatus {
                    status_code: code,
                    body,
                }
                .into()),
            };
        }
    }

    /// One page of `restrict_sr` search results from `r/{subreddit}`.
    pub async fn search_subreddit(
        &self,
        access_token: &str,
        subreddit: &str,
        query: &str,
        options: &SearchOptions,
    ) -> Result<SearchPage, CoreError> {
        let mut params = vec![
            ("q", query.to_string()),
            ("limit", options.limit.to_string()),
            ("restrict_sr", "true".to_string()),
            ("sort", options.sort.to_string()),
        ];
        if let Some(after) = &options.after {
            params.push(("after", after.clone()));
        }
        if let Some(time) = options.time {
            params.push(("t", time.to_string()));
        }

        let body = self
            .make_request(&["r", subreddit, "search"], access_token, &params)
            .await?;

        let listing: RedditListing<RedditPostData> =
            serde_json::from_str(&body).map_err(|e| {
                error!("Failed to parse search results: {}", e);
                RedditApiError::InvalidResponse {
                    details: format!("Failed to parse search results for r/{}: {}", subreddit, e),
                }
            })?;

        let page = self.normalize(listing);
        info!(
            "Retrieved {} posts from r/{} (more: {})",
            page.posts.len(),
            subreddit,
            page.has_more()
        );
        Ok(page)
    }

    fn normalize(&self, listing: RedditListing<RedditPostData>) -> SearchPage {
        let Some(data) = listing.data else {
            return SearchPage::default();
        };
        SearchPage {
            posts: data
                .children
                .into_iter()
                .map(|child| child.data.into_post(&self.site_origin))
                .collect(),
            next_cursor: data.after,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;

    fn api_client() -> RedditApiClient {
        let config = RedditConfig::new(Credentials::default());
        RedditApiClient::new(Client::new(), &config)
    }

    #[test]
    fn test_absolute_permalink() {
        assert_eq!(
            absolute_permalink("https://reddit.com", "/r/manga/comments/abc/title/"),
            "https://reddit.com/r/manga/comments/abc/title/"
        );
        assert_eq!(
            absolute_permalink("https://reddit.com/", "r/manga/"),
            "https://reddit.com/r/manga/"
        );
        assert_eq!(
            absolute_permalink("https://reddit.com", "https://old.reddit.com/r/x/"),
            "https://old.reddit.com/r/x/"
        );
    }

    #[test]
    fn test_listing_without_data_is_empty_page() {
        let listing: RedditListing<RedditPostData> =
            serde_json::from_str(r#"{"kind": "Listing"}"#).unwrap();
        let page = api_client().normalize(listing);
        assert!(page.posts.is_empty());
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_sparse_items_pass_through() {
        let listing: RedditListing<RedditPostData> = serde_json::from_str(
            r#"{
                "kind": "Listing",
                "data": {
                    "after": "t3_second",
                    "children": [
                        {"kind": "t3", "data": {"id": "first", "title": "Vol. 1", "score": 10, "over_18": false}},
                        {"kind": "t3", "data": {"id": "second", "title": "Vol. 2", "author": null}}
                    ]
                }
            }"#,
        )
        .unwrap();

        let page = api_client().normalize(listing);
        assert_eq!(page.posts.len(), 2);
        assert_eq!(page.posts[0].score, Some(10));
        assert_eq!(page.posts[1].author, None);
        assert_eq!(page.next_cursor.as_deref(), Some("t3_second"));
    }
}
