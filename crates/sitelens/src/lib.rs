//! Site inspection, topology-aware crawling and Markdown content extraction.
//!
//! This crate renders pages through a WebDriver-compatible browser and turns them into
//! structured output: site metadata and navigation, keyword-ranked links, a bounded
//! breadth-first page set, and cleaned Markdown.
//!
//! # Features
//!
//! - Site inspection: title/description/keywords, header/nav/footer links, sitemap summary
//! - Keyword link discovery with explainable scores
//! - Breadth-first crawling with `mesh`, `linear`, `hub_and_spoke` and `sidebar` topologies
//! - robots.txt compliance (fails open) with a per-run rule cache
//! - Content extraction with PDF/JSON branching, click interactions and lazy-load scrolling
//! - Common Crawl index lookup
//!
//! # Usage
//!
//! ```rust,ignore
//! use sitelens::{Config, CrawlOptions, SiteLens, Topology};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let lens = SiteLens::new(Config::from_env())?;
//!     let options = CrawlOptions {
//!         topology: Topology::HubAndSpoke,
//!         ..Default::default()
//!     };
//!     let result = lens.crawl("https://your-target-site.com", &options).await?;
//!     println!("Found {} pages", result.found.len());
//!     Ok(())
//! }
//! ```
//!
//! # Failure model
//!
//! Failures local to one page, one sitemap or one interaction are logged and recovered.
//! Only extraction and inspection report failures, and they do so as data (an `error`
//! field), never as an `Err`. `Err` is returned for invalid input URLs alone.
pub mod common_crawl;
pub mod config;
pub mod content;
pub mod crawler;
pub mod error;
pub mod http_client;
pub mod inspector;
pub mod lens;
pub mod render;
pub mod robots;
pub mod scope;
pub mod scorer;
pub mod sitemap;

pub use config::{Config, LogFormat, Timeouts};
pub use content::{ContentKind, Extraction, ExtractionOutcome, PageMetadata};
pub use crawler::{CrawlOptions, CrawlResult, CrawlStats, Topology};
pub use error::{Error, Result};
pub use inspector::{Navigation, NavigationLink, SiteMetadata, SiteReport};
pub use lens::SiteLens;
pub use scope::Scope;
pub use scorer::LinkCandidate;
pub use sitemap::SitemapSummary;
