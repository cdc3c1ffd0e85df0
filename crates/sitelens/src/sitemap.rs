//! Sitemap discovery: robots.txt `Sitemap:` directives, sitemap indexes one level deep,
//! and a read-only structural summary of the collected URLs.
use std::collections::BTreeMap;
use std::io::Cursor;
use std::time::Duration;

use serde::Serialize;
use sitemap::reader::{SiteMapEntity, SiteMapReader};
use url::Url;

use crate::http_client::HttpClient;
use crate::robots::RobotsTxt;
use crate::scope::origin_of;

/// `<loc>` values of one sitemap document, split by document kind.
#[derive(Debug, Default, PartialEq)]
struct SitemapDocument {
    urls: Vec<String>,
    children: Vec<String>,
}

impl SitemapDocument {
    fn is_index(&self) -> bool {
        !self.children.is_empty()
    }
}

/// Reads entries until the first XML error; what came before it is kept.
fn parse_document(xml: &[u8]) -> SitemapDocument {
    let mut document = SitemapDocument::default();
    for entity in SiteMapReader::new(Cursor::new(xml)) {
        match entity {
            SiteMapEntity::Url(entry) => {
                if let Some(url) = entry.loc.get_url() {
                    document.urls.push(url.to_string());
                }
            }
            SiteMapEntity::SiteMap(entry) => {
                if let Some(url) = entry.loc.get_url() {
                    document.children.push(url.to_string());
                }
            }
            SiteMapEntity::Err(e) => {
                tracing::debug!("Malformed sitemap XML: {:?}", e);
                break;
            }
        }
    }
    document
}

fn host_matches(location: &str, allowed_host: &str) -> bool {
    Url::parse(location)
        .ok()
        .and_then(|url| url.host_str().map(|host| host == allowed_host))
        .unwrap_or(false)
}

#[derive(Clone)]
pub struct SitemapResolver {
    client: HttpClient,
    robots_timeout: Duration,
    timeout: Duration,
}

impl SitemapResolver {
    pub fn new(client: HttpClient, robots_timeout: Duration, timeout: Duration) -> Self {
        Self {
            client,
            robots_timeout,
            timeout,
        }
    }

    /// Sitemap locations declared in robots.txt, or `{origin}/sitemap.xml` when none are.
    pub async fn candidates(&self, start_url: &Url) -> Vec<String> {
        let declared = RobotsTxt::fetch(&self.client, start_url, self.robots_timeout)
            .await
            .sitemaps();
        if !declared.is_empty() {
            tracing::debug!("Found {} sitemap(s) in robots.txt", declared.len());
            return declared;
        }

        origin_of(start_url)
            .map(|origin| vec![format!("{}/sitemap.xml", origin)])
            .unwrap_or_default()
    }

    async fn fetch_document(&self, location: &str) -> Option<SitemapDocument> {
        let url = match Url::parse(location) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Skipping invalid sitemap location '{}': {}", location, e);
                return None;
            }
        };

        match self.client.get(&url, self.timeout).await {
            Ok(response) if response.is_success() => Some(parse_document(response.body.as_bytes())),
            Ok(response) => {
                tracing::debug!("Sitemap {} returned HTTP {}", url, response.status);
                None
            }
            Err(e) => {
                tracing::warn!("Failed to fetch sitemap {}: {}", url, e);
                None
            }
        }
    }

    /// Every sitemap URL whose host equals `allowed_host`.
    ///
    /// Failures at any step are swallowed; the result holds whatever was collected.
    pub async fn resolve(&self, start_url: &Url, allowed_host: &str) -> Vec<String> {
        let mut urls = Vec::new();

        for candidate in self.candidates(start_url).await {
            let Some(document) = self.fetch_document(&candidate).await else {
                continue;
            };

            if document.is_index() {
                for child in &document.children {
                    if let Some(child_document) = self.fetch_document(child).await {
                        urls.extend(
                            child_document
                                .urls
                                .into_iter()
                                .filter(|loc| host_matches(loc, allowed_host)),
                        );
                    }
                }
            } else {
                urls.extend(
                    document
                        .urls
                        .into_iter()
                        .filter(|loc| host_matches(loc, allowed_host)),
                );
            }
        }

        tracing::debug!("Resolved {} sitemap URL(s) for {}", urls.len(), allowed_host);
        urls
    }
}

/// A sitemap URL with its inferred top-level path prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SitemapEntry {
    pub url: String,
    pub prefix: String,
}

impl SitemapEntry {
    pub fn new(url: &str) -> Self {
        let path = Url::parse(url)
            .map(|u| u.path().to_string())
            .unwrap_or_default();
        let first_segment = path.trim_matches('/').split('/').next().unwrap_or_default();
        Self {
            url: url.to_string(),
            prefix: format!("/{}", first_segment),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SitemapSummary {
    pub total_urls: usize,
    pub structure_hint: BTreeMap<String, usize>,
}

impl SitemapSummary {
    pub fn from_urls(urls: &[String]) -> Self {
        let mut structure_hint = BTreeMap::new();
        for entry in urls.iter().map(|url| SitemapEntry::new(url)) {
            *structure_hint.entry(entry.prefix).or_insert(0) += 1;
        }
        Self {
            total_urls: urls.len(),
            structure_hint,
        }
    }
}
