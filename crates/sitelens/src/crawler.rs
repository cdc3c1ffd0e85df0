use crate::config::Config;
use crate::error::{Error, Result};
use crate::http_client::HttpClient;
use crate::render::{self, Fingerprint, Page, Renderer, Session, Stealth, WaitUntil};
use crate::robots::PolitenessGate;
use crate::scope::{self, Scope};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Link-selection strategy applied to every expanded page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Every anchor.
    #[default]
    Mesh,
    /// Pagination links only (`rel=next`, "Next", "Previous").
    Linear,
    /// Every anchor, one hop from the start page.
    HubAndSpoke,
    /// Anchors inside aside, sidebar and nav regions.
    Sidebar,
}

impl Topology {
    pub fn depth_ceiling(self) -> usize {
        match self {
            Topology::HubAndSpoke => 1,
            _ => 3,
        }
    }

    fn anchor_selector(self) -> &'static str {
        match self {
            Topology::Sidebar => "aside a[href], .sidebar a[href], nav a[href]",
            _ => "a[href]",
        }
    }
}

fn is_pagination_anchor(element: &scraper::ElementRef<'_>) -> bool {
    let rel_next = element
        .value()
        .attr("rel")
        .is_some_and(|rel| rel.split_ascii_whitespace().any(|r| r.eq_ignore_ascii_case("next")));
    if rel_next {
        return true;
    }
    let text = element.text().collect::<String>().to_lowercase();
    text.contains("next") || text.contains("previous")
}

/// Outgoing links of a rendered page for `topology`, resolved against `base_url`.
pub fn select_links(html_content: &str, base_url: &Url, topology: Topology) -> Vec<Url> {
    if html_content.is_empty() {
        return Vec::new();
    }

    let document = Html::parse_document(html_content);
    let Ok(selector) = Selector::parse(topology.anchor_selector()) else {
        return Vec::new();
    };

    let links: Vec<Url> = document
        .select(&selector)
        .filter(|element| topology != Topology::Linear || is_pagination_anchor(element))
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            match base_url.join(href) {
                Ok(url) => Some(url),
                Err(e) => {
                    tracing::debug!(
                        "Failed to join URL '{}' with base '{}': {}",
                        href,
                        base_url,
                        e
                    );
                    None
                }
            }
        })
        .collect();

    tracing::debug!("Selected {} links from {}", links.len(), base_url);
    links
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlOptions {
    pub topology: Topology,
    pub scope: Scope,
    /// Drop query strings when normalizing URLs.
    pub strip_queries: bool,
    /// Hard stop on the number of found pages.
    pub page_limit: usize,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            topology: Topology::Mesh,
            scope: Scope::Subdomain,
            strip_queries: true,
            page_limit: 50,
        }
    }
}

#[derive(Debug, Default)]
pub struct CrawlStats {
    pub start_time: Option<Instant>,
    pub end_time: Option<Instant>,
    pub pages_expanded: usize,
    pub pages_skipped_robots: usize,
    pub pages_skipped_scope: usize,
    pub pages_failed: usize,
    pub links_discovered: usize,
}

impl CrawlStats {
    pub fn duration(&self) -> Option<Duration> {
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            Some(end.duration_since(start))
        } else {
            None
        }
    }
}

#[derive(Debug, Default)]
pub struct CrawlResult {
    /// Accepted URLs, fragment stripped. No ordering.
    pub found: HashSet<Url>,
    pub stats: CrawlStats,
}

impl CrawlResult {
    /// Found URLs in lexical order.
    pub fn urls(&self) -> Vec<String> {
        let mut urls: Vec<String> = self.found.iter().map(Url::to_string).collect();
        urls.sort();
        urls
    }

    pub fn write_stats_to_stderr(&self) {
        let stderr = io::stderr();
        let mut handle = stderr.lock();
        let stats = &self.stats;

        let _ = writeln!(handle, "\n=== Crawl Statistics ===");
        let _ = writeln!(handle, "Pages found: {}", self.found.len());
        let _ = writeln!(handle, "Pages expanded: {}", stats.pages_expanded);
        let _ = writeln!(
            handle,
            "Pages skipped (robots.txt): {}",
            stats.pages_skipped_robots
        );
        let _ = writeln!(handle, "Pages skipped (scope): {}", stats.pages_skipped_scope);
        let _ = writeln!(handle, "Pages failed: {}", stats.pages_failed);
        let _ = writeln!(handle, "Links discovered: {}", stats.links_discovered);

        if let Some(duration) = stats.duration() {
            let _ = writeln!(handle, "Total duration: {:.2}s", duration.as_secs_f64());
        }
        let _ = writeln!(handle, "========================\n");
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FrontierEntry {
    url: Url,
    depth: usize,
}

/// Rendering session launched on first expansion and reused for the rest of the run.
#[derive(Default)]
struct SessionSlot {
    session: Option<Box<dyn Session>>,
    launch_failed: bool,
}

impl SessionSlot {
    async fn get(&mut self, renderer: &dyn Renderer) -> Result<&mut (dyn Session + 'static)> {
        if self.session.is_none() {
            if self.launch_failed {
                return Err(Error::Render("Rendering session unavailable".to_string()));
            }
            match renderer.launch().await {
                Ok(session) => self.session = Some(session),
                Err(e) => {
                    self.launch_failed = true;
                    return Err(e);
                }
            }
        }
        self.session
            .as_deref_mut()
            .ok_or_else(|| Error::Render("Rendering session unavailable".to_string()))
    }

    async fn close(self) {
        if let Some(session) = self.session {
            render::close_session(session).await;
        }
    }
}

/// State of one crawl run. Never shared between runs.
struct TraversalContext {
    frontier: VecDeque<FrontierEntry>,
    visited: HashSet<Url>,
    found: HashSet<Url>,
    start_host: String,
    gate: PolitenessGate,
    session: SessionSlot,
    stats: CrawlStats,
}

impl TraversalContext {
    fn new(start_url: &Url, start_host: String, gate: PolitenessGate) -> Self {
        let mut frontier = VecDeque::new();
        frontier.push_back(FrontierEntry {
            url: start_url.clone(),
            depth: 0,
        });
        Self {
            frontier,
            visited: HashSet::new(),
            found: HashSet::new(),
            start_host,
            gate,
            session: SessionSlot::default(),
            stats: CrawlStats {
                start_time: Some(Instant::now()),
                ..Default::default()
            },
        }
    }
}

/// Breadth-first crawler bounded by topology depth, scope, robots.txt and a page limit.
#[derive(Clone)]
pub struct Crawler {
    http_client: HttpClient,
    renderer: Arc<dyn Renderer>,
    fingerprint: Arc<dyn Fingerprint>,
    navigation_timeout: Duration,
    robots_timeout: Duration,
    robots_cache_ttl: Duration,
    crawl_delay: Duration,
}

impl Crawler {
    pub fn new(http_client: HttpClient, renderer: Arc<dyn Renderer>, config: &Config) -> Self {
        Self {
            http_client,
            renderer,
            fingerprint: Arc::new(Stealth),
            navigation_timeout: config.timeouts.crawl_navigation,
            robots_timeout: config.timeouts.robots,
            robots_cache_ttl: config.robots_cache_ttl,
            crawl_delay: config.crawl_delay,
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: Arc<dyn Fingerprint>) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    pub async fn crawl(&self, start_url: &Url, options: &CrawlOptions) -> CrawlResult {
        let Some(start_host) = start_url.host_str().map(str::to_string) else {
            tracing::warn!("Start URL {} has no host, nothing to crawl", start_url);
            return CrawlResult::default();
        };
        let ceiling = options.topology.depth_ceiling();

        tracing::info!(
            "Crawl started at {}. Topology: {:?}, scope: {:?}, depth ceiling: {}, page limit: {}.",
            start_url,
            options.topology,
            options.scope,
            ceiling,
            options.page_limit
        );

        let gate = PolitenessGate::new(
            self.http_client.clone(),
            self.robots_timeout,
            self.robots_cache_ttl,
        );
        let mut ctx = TraversalContext::new(start_url, start_host, gate);

        while ctx.found.len() < options.page_limit {
            let Some(entry) = ctx.frontier.pop_front() else {
                break;
            };

            let normalized = scope::normalize(&entry.url, options.strip_queries);
            if ctx.visited.contains(&normalized) || entry.depth > ceiling {
                continue;
            }

            if !options.scope.allows_url(&normalized, &ctx.start_host) {
                tracing::debug!("Skipping out-of-scope URL: {}", entry.url);
                ctx.stats.pages_skipped_scope += 1;
                continue;
            }

            if !ctx.gate.is_allowed(&entry.url).await {
                tracing::info!("Skipping URL disallowed by robots.txt: {}", entry.url);
                ctx.stats.pages_skipped_robots += 1;
                continue;
            }

            ctx.visited.insert(normalized);
            ctx.found.insert(scope::normalize(&entry.url, false));

            if entry.depth < ceiling {
                self.expand(&mut ctx, &entry, options).await;
            }
        }

        let TraversalContext {
            found,
            session,
            mut stats,
            ..
        } = ctx;
        session.close().await;
        stats.end_time = Some(Instant::now());

        tracing::info!(
            "Crawl finished with {} page(s) in {:.2}s",
            found.len(),
            stats.duration().unwrap_or_default().as_secs_f64()
        );
        CrawlResult { found, stats }
    }

    /// Renders `entry` and enqueues its in-scope links one level deeper.
    /// A page that fails to load contributes no links.
    async fn expand(&self, ctx: &mut TraversalContext, entry: &FrontierEntry, options: &CrawlOptions) {
        tracing::info!("Expanding {} (depth {})", entry.url, entry.depth);

        let links = match self.fetch_links(&mut ctx.session, &entry.url, options.topology).await {
            Ok(links) => links,
            Err(e) => {
                tracing::warn!("Failed to crawl {}: {}", entry.url, e);
                ctx.stats.pages_failed += 1;
                return;
            }
        };

        ctx.stats.pages_expanded += 1;
        ctx.stats.links_discovered += links.len();

        for link in links {
            let link = scope::normalize(&link, options.strip_queries);
            if scope::is_http(&link) && options.scope.allows_url(&link, &ctx.start_host) {
                ctx.frontier.push_back(FrontierEntry {
                    url: link,
                    depth: entry.depth + 1,
                });
            }
        }

        if !self.crawl_delay.is_zero() {
            tokio::time::sleep(self.crawl_delay).await;
        }
    }

    async fn fetch_links(&self, slot: &mut SessionSlot, url: &Url, topology: Topology) -> Result<Vec<Url>> {
        let session = slot.get(self.renderer.as_ref()).await?;
        let page = session.open_page().await?;
        let links = self.read_links(page.as_ref(), url, topology).await;
        render::close_page(page).await;
        links
    }

    async fn read_links(&self, page: &dyn Page, url: &Url, topology: Topology) -> Result<Vec<Url>> {
        render::navigate(
            page,
            url,
            WaitUntil::DomContentLoaded,
            self.navigation_timeout,
            self.fingerprint.as_ref(),
        )
        .await?;
        let html = page.content().await?;
        let base = page.url().await.unwrap_or_else(|_| url.clone());
        Ok(select_links(&html, &base, topology))
    }
}
