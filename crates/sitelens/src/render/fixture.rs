//! Deterministic in-memory [`Renderer`] serving recorded HTML.
//!
//! Pages are keyed by URL and navigation to an unknown URL fails. Launches, closes,
//! navigations, clicks, evaluated scripts and height reads are recorded.
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde_json::Value;
use url::Url;

use super::{
    ElementSnapshot, Page, Renderer, SCROLL_HEIGHT_SCRIPT, Session, WaitUntil,
};
use crate::error::{Error, Result};

const PNG_SIGNATURE: &[u8] = b"\x89PNG\r\n\x1a\n";

#[derive(Debug, Clone, Default)]
pub struct FixturePage {
    html: String,
    final_url: Option<Url>,
    heights: Vec<u64>,
    clicks: HashMap<String, String>,
}

impl FixturePage {
    pub fn html(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ..Default::default()
        }
    }

    /// Reports `url` as the post-redirect location.
    pub fn redirected_to(mut self, url: Url) -> Self {
        self.final_url = Some(url);
        self
    }

    /// Successive values reported for the document height; the last one repeats.
    pub fn with_heights(mut self, heights: Vec<u64>) -> Self {
        self.heights = heights;
        self
    }

    /// Replaces the document with `html` once `selector` is clicked.
    pub fn on_click(mut self, selector: impl Into<String>, html: impl Into<String>) -> Self {
        self.clicks.insert(selector.into(), html.into());
        self
    }
}

#[derive(Debug, Default)]
struct Recorder {
    launches: AtomicUsize,
    closes: AtomicUsize,
    navigations: Mutex<Vec<String>>,
    clicks: Mutex<Vec<String>>,
    evaluations: Mutex<Vec<Evaluation>>,
    height_reads: AtomicUsize,
}

/// A script run through [`Page::evaluate`] and the document loaded at the time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub document: Option<String>,
    pub script: String,
}

#[derive(Debug, Clone, Default)]
pub struct StaticRenderer {
    pages: Arc<HashMap<String, FixturePage>>,
    recorder: Arc<Recorder>,
    refuse_launch: bool,
}

impl StaticRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, page: FixturePage) -> Self {
        let key = Url::parse(url)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| url.to_string());
        Arc::make_mut(&mut self.pages).insert(key, page);
        self
    }

    /// Every launch fails, as when no browser is reachable.
    pub fn refusing_launch(mut self) -> Self {
        self.refuse_launch = true;
        self
    }

    pub fn launches(&self) -> usize {
        self.recorder.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.recorder.closes.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> Vec<String> {
        self.recorder
            .navigations
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }

    pub fn clicks(&self) -> Vec<String> {
        self.recorder
            .clicks
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    pub fn evaluations(&self) -> Vec<Evaluation> {
        self.recorder
            .evaluations
            .lock()
            .map(|e| e.clone())
            .unwrap_or_default()
    }

    /// Total document height readings across every page.
    pub fn height_reads(&self) -> usize {
        self.recorder.height_reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for StaticRenderer {
    async fn launch(&self) -> Result<Box<dyn Session>> {
        if self.refuse_launch {
            return Err(Error::Render("Renderer unavailable".to_string()));
        }
        self.recorder.launches.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(StaticSession {
            pages: self.pages.clone(),
            recorder: self.recorder.clone(),
            closed: false,
        }))
    }
}

struct StaticSession {
    pages: Arc<HashMap<String, FixturePage>>,
    recorder: Arc<Recorder>,
    closed: bool,
}

#[async_trait]
impl Session for StaticSession {
    async fn open_page(&mut self) -> Result<Box<dyn Page>> {
        if self.closed {
            return Err(Error::Render("Session already closed".to_string()));
        }
        Ok(Box::new(StaticPage {
            pages: self.pages.clone(),
            recorder: self.recorder.clone(),
            state: Mutex::new(PageState::default()),
        }))
    }

    async fn close(&mut self) -> Result<()> {
        if !self.closed {
            self.closed = true;
            self.recorder.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[derive(Default)]
struct PageState {
    url: Option<Url>,
    page: FixturePage,
    height_reads: usize,
}

struct StaticPage {
    pages: Arc<HashMap<String, FixturePage>>,
    recorder: Arc<Recorder>,
    state: Mutex<PageState>,
}

impl StaticPage {
    fn with_state<T>(&self, f: impl FnOnce(&mut PageState) -> T) -> Result<T> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| Error::Render("Page state poisoned".to_string()))?;
        Ok(f(&mut state))
    }
}

fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[async_trait]
impl Page for StaticPage {
    async fn goto(&self, url: &Url, _wait: WaitUntil, _timeout: Duration) -> Result<()> {
        if let Ok(mut navigations) = self.recorder.navigations.lock() {
            navigations.push(url.to_string());
        }
        let page = self
            .pages
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| Error::Navigation {
                url: url.to_string(),
                message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            })?;
        self.with_state(|state| {
            state.url = Some(url.clone());
            state.page = page;
            state.height_reads = 0;
        })
    }

    async fn wait_until(&self, _wait: WaitUntil, _timeout: Duration) -> Result<()> {
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        let document = self.with_state(|state| state.url.as_ref().map(Url::to_string))?;
        if let Ok(mut evaluations) = self.recorder.evaluations.lock() {
            evaluations.push(Evaluation {
                document,
                script: script.to_string(),
            });
        }

        self.with_state(|state| {
            if script != SCROLL_HEIGHT_SCRIPT {
                return Value::Null;
            }
            self.recorder.height_reads.fetch_add(1, Ordering::SeqCst);
            let heights = &state.page.heights;
            let height = heights
                .get(state.height_reads)
                .or_else(|| heights.last())
                .copied()
                .unwrap_or(0);
            state.height_reads += 1;
            Value::from(height)
        })
    }

    async fn query(&self, selector: &str) -> Result<Vec<ElementSnapshot>> {
        let parsed = Selector::parse(selector).map_err(|_| Error::Selector(selector.to_string()))?;
        let html = self.with_state(|state| state.page.html.clone())?;
        let document = Html::parse_document(&html);
        Ok(document
            .select(&parsed)
            .map(|element| ElementSnapshot {
                tag: element.value().name().to_string(),
                text: normalize_text(&element.text().collect::<Vec<_>>().join(" ")),
                attributes: element
                    .value()
                    .attrs()
                    .map(|(name, value)| (name.to_string(), value.to_string()))
                    .collect(),
            })
            .collect())
    }

    async fn click(&self, selector: &str, _timeout: Duration) -> Result<()> {
        if let Ok(mut clicks) = self.recorder.clicks.lock() {
            clicks.push(selector.to_string());
        }
        if self.query(selector).await?.is_empty() {
            return Err(Error::Interaction {
                selector: selector.to_string(),
                message: "no element matches".to_string(),
            });
        }
        self.with_state(|state| {
            if let Some(revealed) = state.page.clicks.get(selector).cloned() {
                state.page.html = revealed;
            }
        })
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(PNG_SIGNATURE.to_vec())
    }

    async fn title(&self) -> Result<String> {
        let html = self.with_state(|state| state.page.html.clone())?;
        let document = Html::parse_document(&html);
        let title = Selector::parse("title")
            .ok()
            .and_then(|selector| {
                document
                    .select(&selector)
                    .next()
                    .map(|t| normalize_text(&t.text().collect::<String>()))
            })
            .unwrap_or_default();
        Ok(title)
    }

    async fn url(&self) -> Result<Url> {
        self.with_state(|state| state.page.final_url.clone().or_else(|| state.url.clone()))?
            .ok_or_else(|| Error::Render("No page loaded".to_string()))
    }

    async fn content(&self) -> Result<String> {
        self.with_state(|state| state.page.html.clone())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serves_recorded_page() {
        let renderer = StaticRenderer::new().with_page(
            "https://example.com",
            FixturePage::html("<html><head><title> Home </title></head><body><a href='/a'>A</a></body></html>"),
        );

        let mut session = renderer.launch().await.unwrap();
        let page = session.open_page().await.unwrap();
        let url = Url::parse("https://example.com/").unwrap();
        page.goto(&url, WaitUntil::DomContentLoaded, Duration::from_secs(1))
            .await
            .unwrap();

        assert_eq!(page.title().await.unwrap(), "Home");
        assert_eq!(page.url().await.unwrap(), url);
        let anchors = page.query("a").await.unwrap();
        assert_eq!(anchors[0].attr("href"), Some("/a"));
        session.close().await.unwrap();

        assert_eq!(renderer.launches(), 1);
        assert_eq!(renderer.closes(), 1);
    }

    #[tokio::test]
    async fn test_unknown_url_fails_navigation() {
        let renderer = StaticRenderer::new();
        let mut session = renderer.launch().await.unwrap();
        let page = session.open_page().await.unwrap();
        let err = page
            .goto(
                &Url::parse("https://missing.example/").unwrap(),
                WaitUntil::NetworkIdle,
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Navigation { .. }));
    }

    #[tokio::test]
    async fn test_heights_repeat_last_value() {
        let renderer = StaticRenderer::new().with_page(
            "https://example.com/",
            FixturePage::html("<p>x</p>").with_heights(vec![100, 200]),
        );
        let mut session = renderer.launch().await.unwrap();
        let page = session.open_page().await.unwrap();
        page.goto(
            &Url::parse("https://example.com/").unwrap(),
            WaitUntil::NetworkIdle,
            Duration::from_secs(1),
        )
        .await
        .unwrap();

        let reads: Vec<Value> = vec![
            page.evaluate(SCROLL_HEIGHT_SCRIPT).await.unwrap(),
            page.evaluate(SCROLL_HEIGHT_SCRIPT).await.unwrap(),
            page.evaluate(SCROLL_HEIGHT_SCRIPT).await.unwrap(),
        ];
        assert_eq!(reads, vec![Value::from(100), Value::from(200), Value::from(200)]);
    }

    #[tokio::test]
    async fn test_refusing_launch() {
        let renderer = StaticRenderer::new().refusing_launch();
        assert!(renderer.launch().await.is_err());
        assert_eq!(renderer.launches(), 0);
    }
}
