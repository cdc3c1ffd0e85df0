//! Content extraction: content-type probe, render, interact, reveal, capture and Markdown
//! conversion of one URL.
pub mod clean;

use std::sync::Arc;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use futures::stream::{self, StreamExt};
use serde::ser::{SerializeStruct, Serializer};
use serde::Serialize;
use url::Url;

use crate::config::{Config, Timeouts};
use crate::error::{Error, Result};
use crate::http_client::HttpClient;
use crate::render::{
    self, Fingerprint, Page, Renderer, SCROLL_HEIGHT_SCRIPT, SCROLL_TO_BOTTOM_SCRIPT, Stealth,
    WaitUntil,
};

pub use clean::strip_boilerplate;

pub const PDF_PLACEHOLDER: &str = "[PDF Content - Extraction not implemented yet]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Html,
    Pdf,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: Option<String>,
    /// Post-redirect URL.
    pub final_url: String,
    pub content_type: ContentKind,
}

/// Terminal state of one extraction: Markdown or an error message, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionOutcome {
    Ok {
        markdown: String,
        metadata: PageMetadata,
    },
    Err {
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub outcome: ExtractionOutcome,
    /// PNG bytes; independent of the outcome.
    pub screenshot: Option<Vec<u8>>,
}

impl Extraction {
    fn ok(markdown: String, metadata: PageMetadata) -> Self {
        Self {
            outcome: ExtractionOutcome::Ok { markdown, metadata },
            screenshot: None,
        }
    }

    fn failed(message: impl Into<String>) -> Self {
        Self {
            outcome: ExtractionOutcome::Err {
                message: message.into(),
            },
            screenshot: None,
        }
    }

    pub fn markdown(&self) -> Option<&str> {
        match &self.outcome {
            ExtractionOutcome::Ok { markdown, .. } => Some(markdown),
            ExtractionOutcome::Err { .. } => None,
        }
    }

    pub fn metadata(&self) -> Option<&PageMetadata> {
        match &self.outcome {
            ExtractionOutcome::Ok { metadata, .. } => Some(metadata),
            ExtractionOutcome::Err { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ExtractionOutcome::Ok { .. } => None,
            ExtractionOutcome::Err { message } => Some(message),
        }
    }
}

#[derive(Serialize)]
struct WireMetadata<'a> {
    title: Option<&'a str>,
    url: Option<&'a str>,
    #[serde(rename = "type")]
    kind: ContentKind,
}

impl Serialize for Extraction {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let field_count = if self.error().is_some() { 4 } else { 3 };
        let mut state = serializer.serialize_struct("Extraction", field_count)?;
        state.serialize_field("markdown", &self.markdown())?;
        state.serialize_field(
            "screenshot",
            &self.screenshot.as_ref().map(|bytes| STANDARD.encode(bytes)),
        )?;

        let metadata = match &self.outcome {
            ExtractionOutcome::Ok { metadata, .. } => WireMetadata {
                title: metadata.title.as_deref(),
                url: Some(metadata.final_url.as_str()),
                kind: metadata.content_type,
            },
            ExtractionOutcome::Err { .. } => WireMetadata {
                title: None,
                url: None,
                kind: ContentKind::Html,
            },
        };
        state.serialize_field("metadata", &metadata)?;

        if let Some(error) = self.error() {
            state.serialize_field("error", error)?;
        }
        state.end()
    }
}

/// Turns one URL into Markdown, one rendering session per call.
#[derive(Clone)]
pub struct ContentPipeline {
    http: HttpClient,
    renderer: Arc<dyn Renderer>,
    fingerprint: Arc<dyn Fingerprint>,
    timeouts: Timeouts,
    max_scroll_rounds: usize,
    scroll_pause: Duration,
    concurrency: usize,
}

impl ContentPipeline {
    pub fn new(http: HttpClient, renderer: Arc<dyn Renderer>, config: &Config) -> Self {
        Self {
            http,
            renderer,
            fingerprint: Arc::new(Stealth),
            timeouts: config.timeouts.clone(),
            max_scroll_rounds: config.max_scroll_rounds,
            scroll_pause: config.scroll_pause,
            concurrency: config.concurrency.max(1),
        }
    }

    pub fn with_fingerprint(mut self, fingerprint: Arc<dyn Fingerprint>) -> Self {
        self.fingerprint = fingerprint;
        self
    }

    pub async fn extract(
        &self,
        url: &Url,
        click_selectors: &[String],
        want_screenshot: bool,
    ) -> Extraction {
        tracing::info!("Extracting content from {}", url);

        if let Some(extraction) = self.probe(url).await {
            return extraction;
        }

        let extraction = self.render(url, click_selectors, want_screenshot).await;
        if let Some(error) = extraction.error() {
            tracing::error!("Extraction of {} failed: {}", url, error);
        }
        extraction
    }

    /// Extracts every URL with at most `concurrency` sessions in flight; results keep input order.
    pub async fn extract_many(
        &self,
        urls: &[Url],
        click_selectors: &[String],
        want_screenshot: bool,
    ) -> Vec<Extraction> {
        stream::iter(urls)
            .map(|url| self.extract(url, click_selectors, want_screenshot))
            .buffered(self.concurrency)
            .collect()
            .await
    }

    /// Resolves PDF and JSON documents without rendering. `None` continues on the HTML path.
    async fn probe(&self, url: &Url) -> Option<Extraction> {
        let head = match self.http.head(url, self.timeouts.probe).await {
            Ok(head) => head,
            Err(e) => {
                tracing::debug!("Content probe for {} failed, treating as HTML: {}", url, e);
                return None;
            }
        };

        let content_type = head.content_type_lowercase();
        if content_type.contains("application/pdf") {
            tracing::debug!("{} is a PDF document", url);
            return Some(Extraction::ok(
                PDF_PLACEHOLDER.to_string(),
                PageMetadata {
                    title: None,
                    final_url: head.url.to_string(),
                    content_type: ContentKind::Pdf,
                },
            ));
        }

        if content_type.contains("application/json") {
            return match self.fetch_json(url).await {
                Ok((markdown, final_url)) => Some(Extraction::ok(
                    markdown,
                    PageMetadata {
                        title: None,
                        final_url: final_url.to_string(),
                        content_type: ContentKind::Json,
                    },
                )),
                Err(e) => {
                    tracing::warn!("Failed to read JSON body of {}, rendering instead: {}", url, e);
                    None
                }
            };
        }

        None
    }

    async fn fetch_json(&self, url: &Url) -> Result<(String, Url)> {
        let response = self.http.get(url, self.timeouts.probe).await?;
        let value: serde_json::Value = serde_json::from_str(&response.body)?;
        let pretty = serde_json::to_string_pretty(&value)?;
        Ok((format!("```json\n{}\n```", pretty), response.url))
    }

    async fn render(&self, url: &Url, click_selectors: &[String], want_screenshot: bool) -> Extraction {
        let mut session = match self.renderer.launch().await {
            Ok(session) => session,
            Err(e) => return Extraction::failed(e.to_string()),
        };

        let mut screenshot = None;
        let outcome = match session.open_page().await {
            Ok(page) => {
                let outcome = self
                    .run_page(page.as_ref(), url, click_selectors, want_screenshot, &mut screenshot)
                    .await;
                render::close_page(page).await;
                outcome
            }
            Err(e) => Err(e),
        };
        render::close_session(session).await;

        let mut extraction = match outcome {
            Ok((markdown, metadata)) => Extraction::ok(markdown, metadata),
            Err(e) => Extraction::failed(e.to_string()),
        };
        extraction.screenshot = screenshot;
        extraction
    }

    async fn run_page(
        &self,
        page: &dyn Page,
        url: &Url,
        click_selectors: &[String],
        want_screenshot: bool,
        screenshot: &mut Option<Vec<u8>>,
    ) -> Result<(String, PageMetadata)> {
        render::navigate(
            page,
            url,
            WaitUntil::NetworkIdle,
            self.timeouts.content_navigation,
            self.fingerprint.as_ref(),
        )
        .await?;

        for selector in click_selectors {
            self.interact(page, selector).await;
        }

        self.reveal(page).await?;

        if want_screenshot {
            *screenshot = Some(page.screenshot().await?);
        }

        let html = page.content().await?;
        let final_url = page.url().await?;
        let markdown = html2md::parse_html(&strip_boilerplate(&html, &final_url));
        let title = page.title().await?;

        Ok((
            markdown,
            PageMetadata {
                title: Some(title),
                final_url: final_url.to_string(),
                content_type: ContentKind::Html,
            },
        ))
    }

    /// Clicks `selector` and lets the page settle. Failures are logged and skipped.
    async fn interact(&self, page: &dyn Page, selector: &str) {
        let timeout = self.timeouts.interaction;
        let result = match page.click(selector, timeout).await {
            Ok(()) => page.wait_until(WaitUntil::NetworkIdle, timeout).await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            tracing::debug!("Interaction with '{}' skipped: {}", selector, e);
        }
    }

    /// Scrolls to the bottom until two consecutive height readings agree or the round cap is hit.
    async fn reveal(&self, page: &dyn Page) -> Result<()> {
        let mut last_height = page_height(page).await?;

        for round in 1..=self.max_scroll_rounds {
            page.evaluate(SCROLL_TO_BOTTOM_SCRIPT).await?;
            tokio::time::sleep(self.scroll_pause).await;

            let height = page_height(page).await?;
            if height == last_height {
                tracing::debug!("Page height settled at {} after {} rounds", height, round);
                return Ok(());
            }
            last_height = height;
        }

        tracing::debug!(
            "Page height still changing after {} rounds, continuing",
            self.max_scroll_rounds
        );
        Ok(())
    }
}

async fn page_height(page: &dyn Page) -> Result<u64> {
    let value = page.evaluate(SCROLL_HEIGHT_SCRIPT).await?;
    value
        .as_u64()
        .or_else(|| value.as_f64().map(|h| h.max(0.0) as u64))
        .ok_or_else(|| Error::Render(format!("Unexpected page height {}", value)))
}
