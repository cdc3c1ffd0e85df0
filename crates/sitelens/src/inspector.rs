//! Structural report of a site: page metadata, landmark navigation and sitemap shape.
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::config::Config;
use crate::error::Result;
use crate::render::{self, Fingerprint, Page, Renderer, Session, Stealth, WaitUntil};
use crate::scope::Scope;
use crate::scorer::{LinkCandidate, extract_anchors, score_links};
use crate::sitemap::{SitemapResolver, SitemapSummary};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SiteMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationLink {
    pub text: String,
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Navigation {
    pub header: Vec<NavigationLink>,
    pub nav: Vec<NavigationLink>,
    pub footer: Vec<NavigationLink>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SiteReport {
    pub metadata: SiteMetadata,
    pub navigation: Navigation,
    pub sitemap_summary: SitemapSummary,
    /// Set when the page could not be rendered; the sitemap summary is still filled in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Clone)]
pub struct SiteInspector {
    renderer: Arc<dyn Renderer>,
    fingerprint: Arc<dyn Fingerprint>,
    sitemaps: SitemapResolver,
    navigation_timeout: Duration,
}

impl SiteInspector {
    pub fn new(renderer: Arc<dyn Renderer>, sitemaps: SitemapResolver, config: &Config) -> Self {
        Self {
            renderer,
            fingerprint: Arc::new(Stealth),
            sitemaps,
            navigation_timeout: config.timeouts.inspect_navigation,
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: Arc<dyn Fingerprint>) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    pub async fn inspect(&self, url: &Url) -> SiteReport {
        tracing::info!("Inspecting {}", url);
        let mut report = SiteReport::default();

        let structure = match self.open(url).await {
            Ok((session, page)) => {
                let structure = read_structure(page.as_ref(), url).await;
                close(session, page).await;
                structure
            }
            Err(e) => Err(e),
        };

        match structure {
            Ok((metadata, navigation)) => {
                report.metadata = metadata;
                report.navigation = navigation;
            }
            Err(e) => {
                tracing::warn!("Inspection of {} failed: {}", url, e);
                report.error = Some(e.to_string());
            }
        }

        let allowed_host = url.host_str().unwrap_or_default();
        let sitemap_urls = self.sitemaps.resolve(url, allowed_host).await;
        report.sitemap_summary = SitemapSummary::from_urls(&sitemap_urls);
        report
    }

    /// Anchors of `url` ranked by keyword relevance. Render failures yield an empty list.
    pub async fn discover_links(&self, url: &Url, keywords: &[String], scope: Scope) -> Vec<LinkCandidate> {
        let start_host = url.host_str().unwrap_or_default();

        let html = match self.open(url).await {
            Ok((session, page)) => {
                let html = page.content().await;
                close(session, page).await;
                html
            }
            Err(e) => Err(e),
        };

        match html {
            Ok(html) => {
                let candidates = score_links(&extract_anchors(&html), keywords, url, scope, start_host);
                tracing::info!("Discovered {} relevant link(s) on {}", candidates.len(), url);
                candidates
            }
            Err(e) => {
                tracing::warn!("Link discovery on {} failed: {}", url, e);
                Vec::new()
            }
        }
    }

    /// Launches a session and loads `url`. On failure everything opened so far is closed.
    async fn open(&self, url: &Url) -> Result<(Box<dyn Session>, Box<dyn Page>)> {
        let mut session = self.renderer.launch().await?;
        let page = match session.open_page().await {
            Ok(page) => page,
            Err(e) => {
                render::close_session(session).await;
                return Err(e);
            }
        };

        if let Err(e) = render::navigate(
            page.as_ref(),
            url,
            WaitUntil::DomContentLoaded,
            self.navigation_timeout,
            self.fingerprint.as_ref(),
        )
        .await
        {
            render::close_page(page).await;
            render::close_session(session).await;
            return Err(e);
        }
        Ok((session, page))
    }
}

async fn close(session: Box<dyn Session>, page: Box<dyn Page>) {
    render::close_page(page).await;
    render::close_session(session).await;
}

async fn meta_content(page: &dyn Page, name: &str) -> Option<String> {
    match page.query(&format!("meta[name=\"{}\"]", name)).await {
        Ok(elements) => elements
            .first()
            .and_then(|element| element.attr("content"))
            .map(str::to_string),
        Err(e) => {
            tracing::debug!("No {} meta tag: {}", name, e);
            None
        }
    }
}

async fn landmark_links(page: &dyn Page, landmark: &str, base_url: &Url) -> Vec<NavigationLink> {
    let elements = match page.query(&format!("{} a", landmark)).await {
        Ok(elements) => elements,
        Err(e) => {
            tracing::debug!("Failed to read {} links: {}", landmark, e);
            return Vec::new();
        }
    };

    elements
        .iter()
        .filter_map(|element| {
            let href = element.attr("href").filter(|href| !href.is_empty())?;
            let text = element.text.trim();
            if text.is_empty() {
                return None;
            }
            let url = base_url.join(href).ok()?;
            Some(NavigationLink {
                text: text.to_string(),
                url: url.to_string(),
            })
        })
        .collect()
}

async fn read_structure(page: &dyn Page, url: &Url) -> Result<(SiteMetadata, Navigation)> {
    let metadata = SiteMetadata {
        title: Some(page.title().await?),
        description: meta_content(page, "description").await,
        keywords: meta_content(page, "keywords").await,
    };
    let navigation = Navigation {
        header: landmark_links(page, "header", url).await,
        nav: landmark_links(page, "nav", url).await,
        footer: landmark_links(page, "footer", url).await,
    };
    Ok((metadata, navigation))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::HttpClient;
    use crate::render::NoFingerprint;
    use crate::render::fixture::{FixturePage, StaticRenderer};
    use crate::render::stealth::STEALTH_SCRIPT;
    use httpmock::{Method::GET, MockServer};

    const HOME: &str = r#"<html><head>
        <title>Example Docs</title>
        <meta name="description" content="Documentation portal">
    </head><body>
        <header><a href="/">Home</a><a href="/login"> </a></header>
        <nav><a href="/docs/api">API Reference</a><a href="guide">Guide</a><a>Dead</a></nav>
        <main><a href="/blog/api-news">API news</a></main>
        <footer><a href="https://status.example.org/">Status</a></footer>
    </body></html>"#;

    fn inspector(renderer: &StaticRenderer) -> SiteInspector {
        let client = HttpClient::new("sitelens-test").unwrap();
        let sitemaps = SitemapResolver::new(client, Duration::from_secs(5), Duration::from_secs(5));
        SiteInspector::new(Arc::new(renderer.clone()), sitemaps, &Config::default())
    }

    async fn sitemap(server: &MockServer) {
        let host = server.base_url();
        let body = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>{host}/docs/a</loc></url>
  <url><loc>{host}/docs/b</loc></url>
  <url><loc>{host}/blog/c</loc></url>
  <url><loc>https://elsewhere.example/docs/d</loc></url>
</urlset>"#
        );
        server
            .mock_async(|when, then| {
                when.method(GET).path("/sitemap.xml");
                then.status(200).body(body);
            })
            .await;
    }

    #[tokio::test]
    async fn test_inspect_reports_metadata_navigation_and_sitemap() {
        let server = MockServer::start_async().await;
        sitemap(&server).await;
        let url = server.url("/home/");
        let renderer = StaticRenderer::new().with_page(&url, FixturePage::html(HOME));

        let report = inspector(&renderer).inspect(&Url::parse(&url).unwrap()).await;

        assert_eq!(report.error, None);
        assert_eq!(report.metadata.title.as_deref(), Some("Example Docs"));
        assert_eq!(report.metadata.description.as_deref(), Some("Documentation portal"));
        assert_eq!(report.metadata.keywords, None);
        assert_eq!(
            report.navigation.header,
            vec![NavigationLink {
                text: "Home".to_string(),
                url: server.url("/"),
            }]
        );
        let nav_urls: Vec<_> = report.navigation.nav.iter().map(|l| l.url.clone()).collect();
        assert_eq!(nav_urls, vec![server.url("/docs/api"), server.url("/home/guide")]);
        assert_eq!(report.navigation.footer[0].url, "https://status.example.org/");

        assert_eq!(report.sitemap_summary.total_urls, 3);
        assert_eq!(report.sitemap_summary.structure_hint.get("/docs"), Some(&2));
        assert_eq!(report.sitemap_summary.structure_hint.get("/blog"), Some(&1));
        assert_eq!(renderer.closes(), 1);

        let stealth = renderer.evaluations();
        assert_eq!(stealth.len(), 1);
        assert_eq!(stealth[0].script, STEALTH_SCRIPT);
        assert_eq!(stealth[0].document.as_deref(), Some(url.as_str()));
    }

    #[tokio::test]
    async fn test_discover_links_without_fingerprint() {
        let server = MockServer::start_async().await;
        let url = server.url("/");
        let renderer = StaticRenderer::new().with_page(&url, FixturePage::html(HOME));

        let links = inspector(&renderer)
            .with_fingerprint(Arc::new(NoFingerprint))
            .discover_links(&Url::parse(&url).unwrap(), &["guide".to_string()], Scope::Subdomain)
            .await;

        assert_eq!(links.len(), 1);
        assert_eq!(links[0].url, server.url("/guide"));
        assert!(renderer.evaluations().is_empty());
    }

    #[tokio::test]
    async fn test_render_failure_still_summarizes_sitemap() {
        let server = MockServer::start_async().await;
        sitemap(&server).await;

        let renderer = StaticRenderer::new();
        let report = inspector(&renderer)
            .inspect(&Url::parse(&server.url("/")).unwrap())
            .await;

        assert!(report.error.is_some());
        assert_eq!(report.metadata, SiteMetadata::default());
        assert_eq!(report.sitemap_summary.total_urls, 3);

        let json = serde_json::to_value(&report).unwrap();
        assert!(json["error"].is_string());
        assert_eq!(json["sitemap_summary"]["structure_hint"]["/docs"], 2);
    }

    #[tokio::test]
    async fn test_report_omits_error_on_success() {
        let server = MockServer::start_async().await;
        let url = server.url("/");
        let renderer = StaticRenderer::new().with_page(&url, FixturePage::html(HOME));

        let report = inspector(&renderer).inspect(&Url::parse(&url).unwrap()).await;
        let json = serde_json::to_value(&report).unwrap();

        assert!(json.get("error").is_none());
        assert!(json["metadata"]["keywords"].is_null());
        assert_eq!(json["sitemap_summary"]["total_urls"], 0);
    }

    #[tokio::test]
    async fn test_discover_links_ranks_by_keyword() {
        let server = MockServer::start_async().await;
        let url = server.url("/");
        let renderer = StaticRenderer::new().with_page(&url, FixturePage::html(HOME));

        let links = inspector(&renderer)
            .discover_links(&Url::parse(&url).unwrap(), &["api".to_string()], Scope::Domain)
            .await;

        let ranked: Vec<_> = links.iter().map(|l| (l.url.clone(), l.score)).collect();
        assert_eq!(
            ranked,
            vec![
                (server.url("/docs/api"), 15),
                (server.url("/blog/api-news"), 15),
            ]
        );
    }

    #[tokio::test]
    async fn test_discover_links_render_failure_is_empty() {
        let renderer = StaticRenderer::new().refusing_launch();
        let links = inspector(&renderer)
            .discover_links(
                &Url::parse("https://example.com/").unwrap(),
                &["api".to_string()],
                Scope::Domain,
            )
            .await;
        assert!(links.is_empty());
    }
}
