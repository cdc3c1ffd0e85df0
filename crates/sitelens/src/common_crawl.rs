use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::http_client::HttpClient;

#[derive(Debug, Deserialize)]
struct CdxRecord {
    url: Option<String>,
}

/// Lookup of archived URLs for one host in a Common Crawl CDX index.
#[derive(Clone)]
pub struct CommonCrawlIndex {
    client: HttpClient,
    index_url: String,
    timeout: Duration,
}

impl CommonCrawlIndex {
    pub fn new(client: HttpClient, index_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            index_url: index_url.into(),
            timeout,
        }
    }

    /// URLs recorded for `allowed_host`, in index order. Any failure yields what was read so far.
    pub async fn urls(&self, allowed_host: &str) -> Vec<String> {
        let query = match Url::parse_with_params(
            &self.index_url,
            &[("url", format!("{}/*", allowed_host).as_str()), ("output", "json")],
        ) {
            Ok(query) => query,
            Err(e) => {
                tracing::warn!("Invalid Common Crawl index '{}': {}", self.index_url, e);
                return Vec::new();
            }
        };

        let body = match self.client.get(&query, self.timeout).await {
            Ok(response) if response.is_success() => response.body,
            Ok(response) => {
                tracing::debug!("Common Crawl index returned HTTP {}", response.status);
                return Vec::new();
            }
            Err(e) => {
                tracing::warn!("Common Crawl lookup for {} failed: {}", allowed_host, e);
                return Vec::new();
            }
        };

        parse_records(&body, allowed_host)
    }
}

fn parse_records(body: &str, allowed_host: &str) -> Vec<String> {
    body.lines()
        .filter_map(|line| serde_json::from_str::<CdxRecord>(line).ok())
        .filter_map(|record| record.url)
        .filter(|url| {
            Url::parse(url)
                .ok()
                .is_some_and(|u| u.host_str() == Some(allowed_host))
        })
        .collect()
}
