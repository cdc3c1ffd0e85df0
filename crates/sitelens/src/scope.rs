//! URL normalization and host scope rules shared by the crawler and the link scorer.
use serde::{Deserialize, Serialize};
use url::Url;

/// Host-matching policy bounding which links are eligible for traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Exact host match against the start host.
    #[default]
    Subdomain,
    /// The start host or any of its subdomains.
    Domain,
}

impl Scope {
    /// Checks `host` against `start_host`, ignoring ASCII case.
    ///
    /// `Domain` matches on a label boundary, so `evil-example.com` is not inside `example.com`.
    pub fn allows(self, host: &str, start_host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        let start_host = start_host.to_ascii_lowercase();
        match self {
            Scope::Subdomain => host == start_host,
            Scope::Domain => {
                host == start_host
                    || host
                        .strip_suffix(start_host.as_str())
                        .is_some_and(|prefix| prefix.ends_with('.'))
            }
        }
    }

    pub fn allows_url(self, url: &Url, start_host: &str) -> bool {
        url.host_str()
            .is_some_and(|host| self.allows(host, start_host))
    }
}

/// Strips the fragment always and the query string when `strip_queries` is set.
pub fn normalize(url: &Url, strip_queries: bool) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    if strip_queries {
        normalized.set_query(None);
    }
    normalized
}

pub fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

/// `{scheme}://{host[:port]}` of `url`, used to key per-origin caches.
pub fn origin_of(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}://{}:{}", url.scheme(), host, port),
        None => format!("{}://{}", url.scheme(), host),
    })
}
