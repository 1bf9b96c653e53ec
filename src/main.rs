use clap::Parser;
use reddit_client::RedditClient;
use search_core::{ErrorExt, RedditPost, SearchOptions, SearchPage, SearchSort, TimeFilter};
use tracing_subscriber::EnvFilter;

/// Search a subreddit using the credentials in the REDDIT_* environment variables.
#[derive(Debug, Parser)]
#[command(name = "reddit-search", version)]
struct Cli {
    /// Subreddit to search, without the `r/` prefix
    subreddit: String,

    /// Search terms
    query: String,

    /// Results per page
    #[arg(long, default_value_t = search_core::DEFAULT_SEARCH_LIMIT)]
    limit: u32,

    /// new, hot, top or relevance
    #[arg(long, default_value_t = SearchSort::New)]
    sort: SearchSort,

    /// hour, day, week, month, year or all
    #[arg(long)]
    time: Option<TimeFilter>,

    /// Cursor returned by a previous search
    #[arg(long)]
    after: Option<String>,

    /// Follow the cursor for up to this many pages
    #[arg(long, default_value_t = 1)]
    pages: usize,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("reddit_search=info,reddit_client=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::info!("Searching r/{} for {:?}", cli.subreddit, cli.query);

    let client = RedditClient::from_env()?;
    tracing::debug!("Using user agent {:?}", client.user_agent());

    let mut options = SearchOptions::default()
        .with_limit(cli.limit)
        .with_sort(cli.sort);
    options.after = cli.after;
    options.time = cli.time;

    let page = if cli.pages > 1 {
        client
            .search_all(&cli.subreddit, &cli.query, options, cli.pages)
            .await
    } else {
        client.search(&cli.subreddit, &cli.query, options).await
    };

    let SearchPage { posts, next_cursor } = page.map_err(|e| {
        e.log_error();
        anyhow::anyhow!("[{}] {}", e.error_code(), e.user_friendly_message())
    })?;

    if cli.json {
        let output = serde_json::json!({ "posts": posts, "next_cursor": next_cursor });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        for post in &posts {
            println!("{}", format_post(post));
        }
        if let Some(cursor) = next_cursor {
            println!("next page: --after {}", cursor);
        }
    }

    Ok(())
}

fn format_post(post: &RedditPost) -> String {
    let score = post
        .score
        .map(|score| score.to_string())
        .unwrap_or_else(|| "-".to_string());
    match &post.permalink {
        Some(link) => format!("[{:>6}] {} ({})", score, post.title, link),
        None => format!("[{:>6}] {}", score, post.title),
    }
}
