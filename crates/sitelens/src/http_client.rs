use std::time::Duration;

use reqwest::Client as ReqwestClient;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::error::{Error, Result};

/// Status, declared content type and body of one HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Final URL after redirects.
    pub url: Url,
    pub content_type: Option<String>,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Lower-cased content type, empty when the header was absent.
    pub fn content_type_lowercase(&self) -> String {
        self.content_type
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_default()
    }
}

/// Thin wrapper over a pooled reqwest client; every call carries its own deadline.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: ReqwestClient,
}

impl HttpClient {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = ReqwestClient::builder()
            .user_agent(user_agent)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client })
    }

    pub async fn get(&self, url: &Url, timeout: Duration) -> Result<HttpResponse> {
        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_send_error(e, "GET", url, timeout))?;
        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let content_type = header_content_type(&response);
        let body = response.text().await?;
        Ok(HttpResponse {
            status,
            url: final_url,
            content_type,
            body,
        })
    }

    /// Header-only request; the returned body is always empty.
    pub async fn head(&self, url: &Url, timeout: Duration) -> Result<HttpResponse> {
        let response = self
            .client
            .head(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_send_error(e, "HEAD", url, timeout))?;
        Ok(HttpResponse {
            status: response.status().as_u16(),
            url: response.url().clone(),
            content_type: header_content_type(&response),
            body: String::new(),
        })
    }
}

fn header_content_type(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

fn map_send_error(error: reqwest::Error, method: &str, url: &Url, timeout: Duration) -> Error {
    if error.is_timeout() {
        Error::timeout(format!("{} {}", method, url), timeout)
    } else {
        Error::Http(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::GET, Method::HEAD, MockServer};

    #[test]
    fn test_new_client() {
        assert!(HttpClient::new("sitelens-test").is_ok());
    }

    #[tokio::test]
    async fn test_get_reads_body_and_content_type() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/data");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"a":1}"#);
            })
            .await;

        let client = HttpClient::new("sitelens-test").unwrap();
        let url = Url::parse(&server.url("/data")).unwrap();
        let response = client.get(&url, Duration::from_secs(5)).await.unwrap();

        assert!(response.is_success());
        assert_eq!(response.body, r#"{"a":1}"#);
        assert_eq!(response.content_type_lowercase(), "application/json");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_head_has_empty_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(HEAD).path("/doc.pdf");
                then.status(200).header("Content-Type", "Application/PDF");
            })
            .await;

        let client = HttpClient::new("sitelens-test").unwrap();
        let url = Url::parse(&server.url("/doc.pdf")).unwrap();
        let response = client.head(&url, Duration::from_secs(5)).await.unwrap();

        assert!(response.body.is_empty());
        assert_eq!(response.content_type_lowercase(), "application/pdf");
    }

    #[tokio::test]
    async fn test_get_timeout_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/slow");
                then.status(200).delay(Duration::from_secs(2)).body("late");
            })
            .await;

        let client = HttpClient::new("sitelens-test").unwrap();
        let url = Url::parse(&server.url("/slow")).unwrap();
        let err = client
            .get(&url, Duration::from_millis(100))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Timeout { .. }));
    }
}
