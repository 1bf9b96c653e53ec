use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_SEARCH_LIMIT: u32 = 25;

/// One search hit, normalized from Reddit's `t3` listing item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedditPost {
    pub id: String,
    pub title: String,
    pub url: Option<String>,
    /// Absolute URL of the comments page.
    pub permalink: Option<String>,
    pub author: Option<String>,
    pub created_utc: Option<f64>,
    pub score: Option<i64>,
    pub num_comments: Option<u64>,
    pub subreddit: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub posts: Vec<RedditPost>,
    /// Reddit's `after` token; `None` on the last page.
    pub next_cursor: Option<String>,
}

impl SearchPage {
    pub fn has_more(&self) -> bool {
        self.next_cursor.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchSort {
    #[default]
    New,
    Hot,
    Top,
    Relevance,
}

impl SearchSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchSort::New => "new",
            SearchSort::Hot => "hot",
            SearchSort::Top => "top",
            SearchSort::Relevance => "relevance",
        }
    }
}

impl fmt::Display for SearchSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchSort {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "new" => Ok(SearchSort::New),
            "hot" => Ok(SearchSort::Hot),
            "top" => Ok(SearchSort::Top),
            "relevance" => Ok(SearchSort::Relevance),
            other => Err(CoreError::invalid_input(format!(
                "unknown sort '{}', expected one of new, hot, top, relevance",
                other
            ))),
        }
    }
}

/// Time window for search results, sent as Reddit's `t` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeFilter {
    Hour,
    Day,
    Week,
    Month,
    Year,
    All,
}

impl TimeFilter {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeFilter::Hour => "hour",
            TimeFilter::Day => "day",
            TimeFilter::Week => "week",
            TimeFilter::Month => "month",
            TimeFilter::Year => "year",
            TimeFilter::All => "all",
        }
    }
}

impl fmt::Display for TimeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeFilter {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hour" => Ok(TimeFilter::Hour),
            "day" => Ok(TimeFilter::Day),
            "week" => Ok(TimeFilter::Week),
            "month" => Ok(TimeFilter::Month),
            "year" => Ok(TimeFilter::Year),
            "all" => Ok(TimeFilter::All),
            other => Err(CoreError::invalid_input(format!(
                "unknown time filter '{}', expected one of hour, day, week, month, year, all",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub limit: u32,
    pub sort: SearchSort,
    pub after: Option<String>,
    pub time: Option<TimeFilter>,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_SEARCH_LIMIT,
            sort: SearchSort::default(),
            after: None,
            time: None,
        }
    }
}

impl SearchOptions {
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_sort(mut self, sort: SearchSort) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_after(mut self, after: impl Into<String>) -> Self {
        self.after = Some(after.into());
        self
    }

    pub fn with_time(mut self, time: TimeFilter) -> Self {
        self.time = Some(time);
        self
    }
}
