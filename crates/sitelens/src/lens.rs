use std::sync::Arc;

use url::Url;

use crate::common_crawl::CommonCrawlIndex;
use crate::config::Config;
use crate::content::{ContentPipeline, Extraction};
use crate::crawler::{CrawlOptions, CrawlResult, Crawler};
use crate::error::{Error, Result};
use crate::http_client::HttpClient;
use crate::inspector::{SiteInspector, SiteReport};
use crate::render::Renderer;
use crate::render::webdriver::WebDriverRenderer;
use crate::scope::{self, Scope};
use crate::scorer::LinkCandidate;
use crate::sitemap::SitemapResolver;

/// Entry point bundling inspection, link discovery, crawling and extraction over one
/// renderer and one HTTP client.
///
/// Every call owns its rendering session; a `SiteLens` can serve concurrent calls.
#[derive(Clone)]
pub struct SiteLens {
    inspector: SiteInspector,
    crawler: Crawler,
    pipeline: ContentPipeline,
    common_crawl: CommonCrawlIndex,
}

impl SiteLens {
    /// Renders through the WebDriver endpoint named in `config`.
    pub fn new(config: Config) -> Result<Self> {
        let renderer = WebDriverRenderer::new(
            config.webdriver_url.clone(),
            config.user_agent.clone(),
            config.headless,
        );
        Self::with_renderer(config, Arc::new(renderer))
    }

    pub fn with_renderer(config: Config, renderer: Arc<dyn Renderer>) -> Result<Self> {
        let http_client = HttpClient::new(&config.user_agent)?;
        let sitemaps = SitemapResolver::new(
            http_client.clone(),
            config.timeouts.robots,
            config.timeouts.sitemap,
        );

        Ok(Self {
            inspector: SiteInspector::new(renderer.clone(), sitemaps, &config),
            crawler: Crawler::new(http_client.clone(), renderer.clone(), &config),
            pipeline: ContentPipeline::new(http_client.clone(), renderer, &config),
            common_crawl: CommonCrawlIndex::new(
                http_client,
                config.common_crawl_index.clone(),
                config.timeouts.sitemap,
            ),
        })
    }

    pub async fn inspect_site(&self, url: &str) -> Result<SiteReport> {
        let url = parse_url(url)?;
        Ok(self.inspector.inspect(&url).await)
    }

    pub async fn discover_links(
        &self,
        url: &str,
        keywords: &[String],
        scope: Scope,
    ) -> Result<Vec<LinkCandidate>> {
        let url = parse_url(url)?;
        Ok(self.inspector.discover_links(&url, keywords, scope).await)
    }

    pub async fn crawl(&self, url: &str, options: &CrawlOptions) -> Result<CrawlResult> {
        let url = parse_url(url)?;
        Ok(self.crawler.crawl(&url, options).await)
    }

    pub async fn extract_content(
        &self,
        url: &str,
        click_selectors: &[String],
        want_screenshot: bool,
    ) -> Result<Extraction> {
        let url = parse_url(url)?;
        Ok(self
            .pipeline
            .extract(&url, click_selectors, want_screenshot)
            .await)
    }

    /// Results are in input order. Fails before extracting anything if any URL is invalid.
    pub async fn extract_many(
        &self,
        urls: &[String],
        click_selectors: &[String],
        want_screenshot: bool,
    ) -> Result<Vec<Extraction>> {
        let urls = urls
            .iter()
            .map(|url| parse_url(url))
            .collect::<Result<Vec<_>>>()?;
        Ok(self
            .pipeline
            .extract_many(&urls, click_selectors, want_screenshot)
            .await)
    }

    pub async fn common_crawl_urls(&self, allowed_host: &str) -> Vec<String> {
        self.common_crawl.urls(allowed_host).await
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| Error::invalid_url(raw, e))?;
    if !scope::is_http(&url) {
        return Err(Error::invalid_url(raw, "only http and https URLs are supported"));
    }
    if url.host_str().is_none() {
        return Err(Error::invalid_url(raw, "URL has no host"));
    }
    Ok(url)
}
