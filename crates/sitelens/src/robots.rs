use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use robots_txt::{Robots, matcher::SimpleMatcher};
use url::Url;

use crate::http_client::HttpClient;
use crate::scope::origin_of;

// A simple wrapper for robots.txt handling.
// It stores the text content and parses it on demand.
#[derive(Debug)]
pub struct RobotsTxt {
    robots_text: Option<String>,
    origin: String,
}

impl RobotsTxt {
    /// `{scheme}://{host}/robots.txt` for the origin of `target_url`.
    pub fn location(target_url: &Url) -> Option<Url> {
        let origin = origin_of(target_url)?;
        Url::parse(&origin).ok()?.join("/robots.txt").ok()
    }

    /// Fetches robots.txt for the origin of `target_url`.
    ///
    /// Never fails: an unreachable, non-2xx or slow robots.txt yields an empty rule set,
    /// which allows everything.
    pub async fn fetch(client: &HttpClient, target_url: &Url, timeout: Duration) -> Self {
        let origin = origin_of(target_url).unwrap_or_default();
        let Some(robots_url) = Self::location(target_url) else {
            tracing::debug!("No robots.txt location for {}", target_url);
            return Self::empty(origin);
        };

        tracing::debug!("Fetching robots.txt from: {}", robots_url);

        match client.get(&robots_url, timeout).await {
            Ok(response) if response.is_success() => {
                tracing::debug!("robots.txt content for {}:\n{}", origin, response.body);
                Self {
                    robots_text: Some(response.body),
                    origin,
                }
            }
            Ok(response) => {
                tracing::debug!(
                    "No robots.txt for {}: HTTP {}, assuming crawl is allowed",
                    origin,
                    response.status
                );
                Self::empty(origin)
            }
            Err(e) => {
                tracing::warn!(
                    "Error fetching robots.txt for {}: {}, assuming crawl is allowed",
                    origin,
                    e
                );
                Self::empty(origin)
            }
        }
    }

    fn empty(origin: String) -> Self {
        Self {
            robots_text: None,
            origin,
        }
    }

    pub fn from_text(origin: &str, text: &str) -> Self {
        Self {
            robots_text: Some(text.to_string()),
            origin: origin.to_string(),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Checks if a URL is allowed to be crawled by a specific user-agent.
    /// Parses the stored robots.txt content on each call.
    pub fn is_allowed(&self, url_to_check: &Url, user_agent: &str) -> bool {
        let parsed_robots = match &self.robots_text {
            Some(text) => Robots::from_str_lossy(text),
            None => return true,
        };

        let section = parsed_robots.choose_section(user_agent);
        let matcher = SimpleMatcher::new(&section.rules);

        let target = match url_to_check.query() {
            Some(query) => format!("{}?{}", url_to_check.path(), query),
            None => url_to_check.path().to_string(),
        };
        matcher.check_path(&target)
    }

    /// `Sitemap:` directives in file order. The key is matched case-insensitively.
    pub fn sitemaps(&self) -> Vec<String> {
        self.robots_text
            .as_deref()
            .map(sitemap_directives)
            .unwrap_or_default()
    }
}

pub(crate) fn sitemap_directives(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| {
            line.get(..8)
                .is_some_and(|key| key.eq_ignore_ascii_case("sitemap:"))
        })
        .map(|line| line[8..].trim().to_string())
        .filter(|location| !location.is_empty())
        .collect()
}

/// Fetches and evaluates robots.txt for `url` in one go, failing open.
pub async fn is_allowed(client: &HttpClient, url: &Url, user_agent: &str, timeout: Duration) -> bool {
    RobotsTxt::fetch(client, url, timeout)
        .await
        .is_allowed(url, user_agent)
}

/// Section consulted by the crawl gate.
const GATE_USER_AGENT: &str = "*";

/// Per-origin robots.txt cache owned by one crawl run.
///
/// Entries older than `ttl` are fetched again, so a verdict is never staler than the run.
pub struct PolitenessGate {
    client: HttpClient,
    timeout: Duration,
    ttl: Duration,
    cache: HashMap<String, (Instant, Arc<RobotsTxt>)>,
}

impl PolitenessGate {
    pub fn new(client: HttpClient, timeout: Duration, ttl: Duration) -> Self {
        Self {
            client,
            timeout,
            ttl,
            cache: HashMap::new(),
        }
    }

    async fn rules_for(&mut self, url: &Url) -> Arc<RobotsTxt> {
        let origin = origin_of(url).unwrap_or_default();
        if let Some((fetched_at, robots)) = self.cache.get(&origin) {
            if fetched_at.elapsed() < self.ttl {
                return robots.clone();
            }
        }

        let robots = Arc::new(RobotsTxt::fetch(&self.client, url, self.timeout).await);
        self.cache
            .insert(origin, (Instant::now(), robots.clone()));
        robots
    }

    pub async fn is_allowed(&mut self, url: &Url) -> bool {
        let robots = self.rules_for(url).await;
        robots.is_allowed(url, GATE_USER_AGENT)
    }
}
