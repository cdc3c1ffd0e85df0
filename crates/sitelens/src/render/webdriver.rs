//! [`Renderer`] backed by a WebDriver endpoint (chromedriver, geckodriver, Selenium grid).
use std::time::Duration;

use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Value, json};
use url::Url;

use super::{ElementSnapshot, Page, Renderer, Session, WaitUntil};
use crate::error::{Error, Result, with_timeout};

const QUERY_SCRIPT: &str = r#"
return Array.from(document.querySelectorAll(arguments[0])).map(function (e) {
    var attributes = {};
    for (var i = 0; i < e.attributes.length; i++) {
        attributes[e.attributes[i].name] = e.attributes[i].value;
    }
    return {
        tag: e.tagName.toLowerCase(),
        text: (e.innerText || e.textContent || '').trim(),
        attributes: attributes
    };
});
"#;

const READY_STATE_SCRIPT: &str = "return document.readyState;";
const RESOURCE_COUNT_SCRIPT: &str = "return performance.getEntriesByType('resource').length;";
const IDLE_SAMPLE_INTERVAL: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct WebDriverRenderer {
    webdriver_url: String,
    user_agent: String,
    headless: bool,
}

impl WebDriverRenderer {
    pub fn new(webdriver_url: impl Into<String>, user_agent: impl Into<String>, headless: bool) -> Self {
        Self {
            webdriver_url: webdriver_url.into(),
            user_agent: user_agent.into(),
            headless,
        }
    }

    fn capabilities(&self) -> serde_json::Map<String, Value> {
        let mut args = vec![format!("--user-agent={}", self.user_agent)];
        if self.headless {
            args.push("--headless=new".to_string());
        }
        let mut firefox_args = Vec::new();
        if self.headless {
            firefox_args.push("-headless".to_string());
        }

        let mut capabilities = serde_json::Map::new();
        capabilities.insert("goog:chromeOptions".to_string(), json!({ "args": args }));
        capabilities.insert(
            "moz:firefoxOptions".to_string(),
            json!({
                "args": firefox_args,
                "prefs": { "general.useragent.override": self.user_agent }
            }),
        );
        capabilities
    }
}

#[async_trait]
impl Renderer for WebDriverRenderer {
    async fn launch(&self) -> Result<Box<dyn Session>> {
        let mut builder =
            ClientBuilder::rustls().map_err(|e| Error::Render(format!("TLS setup failed: {}", e)))?;
        builder.capabilities(self.capabilities());
        let client = builder.connect(&self.webdriver_url).await.map_err(|e| {
            Error::Render(format!(
                "Failed to connect to WebDriver at {}: {}",
                self.webdriver_url, e
            ))
        })?;
        tracing::debug!("WebDriver session opened at {}", self.webdriver_url);
        Ok(Box::new(WebDriverSession {
            client: Some(client),
        }))
    }
}

pub struct WebDriverSession {
    client: Option<Client>,
}

#[async_trait]
impl Session for WebDriverSession {
    async fn open_page(&mut self) -> Result<Box<dyn Page>> {
        let client = self
            .client
            .clone()
            .ok_or_else(|| Error::Render("Session already closed".to_string()))?;
        Ok(Box::new(WebDriverPage { client }))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            client
                .close()
                .await
                .map_err(|e| Error::Render(format!("Failed to close session: {}", e)))?;
        }
        Ok(())
    }
}

/// A page is the session's single browsing context.
pub struct WebDriverPage {
    client: Client,
}

impl WebDriverPage {
    async fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        self.client
            .execute(script, args)
            .await
            .map_err(|e| Error::Render(format!("Script failed: {}", e)))
    }

    async fn settle(&self, wait: WaitUntil) -> Result<()> {
        match wait {
            WaitUntil::DomContentLoaded => loop {
                let state = self.execute(READY_STATE_SCRIPT, vec![]).await?;
                if state.as_str().is_some_and(|s| s != "loading") {
                    return Ok(());
                }
                tokio::time::sleep(Duration::from_millis(100)).await;
            },
            WaitUntil::NetworkIdle => {
                let mut previous = self.execute(RESOURCE_COUNT_SCRIPT, vec![]).await?;
                loop {
                    tokio::time::sleep(IDLE_SAMPLE_INTERVAL).await;
                    let current = self.execute(RESOURCE_COUNT_SCRIPT, vec![]).await?;
                    if current == previous {
                        return Ok(());
                    }
                    previous = current;
                }
            }
        }
    }
}

#[async_trait]
impl Page for WebDriverPage {
    async fn goto(&self, url: &Url, wait: WaitUntil, timeout: Duration) -> Result<()> {
        let navigation = async {
            self.client
                .goto(url.as_str())
                .await
                .map_err(|e| Error::Render(e.to_string()))?;
            self.settle(wait).await
        };

        with_timeout("navigation", timeout, navigation)
            .await
            .map_err(|e| Error::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    async fn wait_until(&self, wait: WaitUntil, timeout: Duration) -> Result<()> {
        with_timeout("load state", timeout, self.settle(wait)).await
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        self.execute(script, vec![]).await
    }

    async fn query(&self, selector: &str) -> Result<Vec<ElementSnapshot>> {
        let value = self
            .execute(QUERY_SCRIPT, vec![json!(selector)])
            .await
            .map_err(|_| Error::Selector(selector.to_string()))?;
        Ok(serde_json::from_value(value)?)
    }

    async fn click(&self, selector: &str, timeout: Duration) -> Result<()> {
        let click = async {
            let element = self
                .client
                .find(Locator::Css(selector))
                .await
                .map_err(|e| Error::Render(e.to_string()))?;
            element
                .click()
                .await
                .map_err(|e| Error::Render(e.to_string()))
        };

        with_timeout("click", timeout, click)
            .await
            .map_err(|e| Error::Interaction {
                selector: selector.to_string(),
                message: e.to_string(),
            })
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.client
            .screenshot()
            .await
            .map_err(|e| Error::Render(format!("Screenshot failed: {}", e)))
    }

    async fn title(&self) -> Result<String> {
        self.client
            .title()
            .await
            .map_err(|e| Error::Render(e.to_string()))
    }

    async fn url(&self) -> Result<Url> {
        let current = self
            .client
            .current_url()
            .await
            .map_err(|e| Error::Render(e.to_string()))?;
        Url::parse(current.as_str()).map_err(|e| Error::invalid_url(current.as_str(), e))
    }

    async fn content(&self) -> Result<String> {
        self.client
            .source()
            .await
            .map_err(|e| Error::Render(e.to_string()))
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}
