use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Renderer error: {0}")]
    Render(String),
    #[error("Invalid selector '{0}'")]
    Selector(String),
    #[error("Interaction with '{selector}' failed: {message}")]
    Interaction { selector: String, message: String },
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn invalid_url(url: &str, message: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.to_string(),
            message: message.to_string(),
        }
    }

    pub fn timeout(operation: impl Into<String>, after: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            after,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Runs `future` under `after`, mapping an elapsed deadline to [`Error::Timeout`].
pub(crate) async fn with_timeout<T, F>(operation: &str, after: Duration, future: F) -> Result<T>
where
    F: std::future::Future<Output = Result<T>>,
{
    match tokio::time::timeout(after, future).await {
        Ok(result) => result,
        Err(_) => Err(Error::timeout(operation, after)),
    }
}
