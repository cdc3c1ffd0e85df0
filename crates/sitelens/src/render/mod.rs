//! Rendering collaborator: a browser-like session that loads pages and exposes DOM access.
//!
//! Sessions are acquired per top-level call and closed on every exit path; pages never
//! outlive their session.
#[cfg(test)]
pub mod fixture;
pub mod stealth;
pub mod webdriver;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::error::Result;

pub use stealth::{Fingerprint, NoFingerprint, Stealth};

/// Measures the current document height.
pub const SCROLL_HEIGHT_SCRIPT: &str = "return document.body.scrollHeight;";
/// Scrolls the window to the bottom of the document.
pub const SCROLL_TO_BOTTOM_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitUntil {
    DomContentLoaded,
    NetworkIdle,
}

/// Snapshot of one matched DOM element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ElementSnapshot {
    pub tag: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ElementSnapshot {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

#[async_trait]
pub trait Renderer: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn Session>>;
}

#[async_trait]
pub trait Session: Send {
    async fn open_page(&mut self) -> Result<Box<dyn Page>>;
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
pub trait Page: Send + Sync {
    /// Loads `url`, failing with [`crate::Error::Navigation`] on network failure or timeout.
    async fn goto(&self, url: &Url, wait: WaitUntil, timeout: Duration) -> Result<()>;
    async fn wait_until(&self, wait: WaitUntil, timeout: Duration) -> Result<()>;
    async fn evaluate(&self, script: &str) -> Result<Value>;
    async fn query(&self, selector: &str) -> Result<Vec<ElementSnapshot>>;
    async fn click(&self, selector: &str, timeout: Duration) -> Result<()>;
    async fn screenshot(&self) -> Result<Vec<u8>>;
    async fn title(&self) -> Result<String>;
    /// Current (post-redirect) URL.
    async fn url(&self) -> Result<Url>;
    async fn content(&self) -> Result<String>;
    async fn close(&self) -> Result<()>;
}

/// Loads `url`, then applies `fingerprint` to the loaded document.
///
/// Only the navigation can fail; fingerprint failures are logged and ignored.
pub async fn navigate(
    page: &dyn Page,
    url: &Url,
    wait: WaitUntil,
    timeout: Duration,
    fingerprint: &dyn Fingerprint,
) -> Result<()> {
    page.goto(url, wait, timeout).await?;
    if let Err(e) = fingerprint.apply(page).await {
        tracing::debug!("Fingerprint not applied to {}: {}", url, e);
    }
    Ok(())
}

pub async fn close_page(page: Box<dyn Page>) {
    if let Err(e) = page.close().await {
        tracing::debug!("Failed to close page: {}", e);
    }
}

pub async fn close_session(mut session: Box<dyn Session>) {
    if let Err(e) = session.close().await {
        tracing::warn!("Failed to close rendering session: {}", e);
    }
}
