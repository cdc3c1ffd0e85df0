//! Keyword relevance scoring for the anchors of one page.
use scraper::{Html, Selector};
use serde::Serialize;
use url::Url;

use crate::scope::Scope;

const URL_MATCH_POINTS: u32 = 5;
const TEXT_MATCH_POINTS: u32 = 10;

/// An `<a>` element as found in the page: raw `href` and trimmed visible text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub href: String,
    pub text: String,
}

impl Anchor {
    pub fn new(href: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkCandidate {
    pub url: String,
    pub text: String,
    pub score: u32,
    pub matches: Vec<String>,
}

/// Every `<a href>` in document order.
pub fn extract_anchors(html: &str) -> Vec<Anchor> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            let text = element.text().collect::<Vec<_>>().join(" ");
            Some(Anchor::new(
                href,
                text.split_whitespace().collect::<Vec<_>>().join(" "),
            ))
        })
        .collect()
}

/// Scores anchors against `keywords` and returns the relevant ones, best first.
///
/// A URL match is worth 5 points (`url:<kw>`), an anchor-text match 10 (`text:<kw>`).
/// Anchors outside `scope` or scoring zero are dropped. Ties keep document order.
pub fn score_links(
    anchors: &[Anchor],
    keywords: &[String],
    base_url: &Url,
    scope: Scope,
    start_host: &str,
) -> Vec<LinkCandidate> {
    let mut candidates: Vec<LinkCandidate> = anchors
        .iter()
        .filter_map(|anchor| {
            let text = anchor.text.trim();
            if anchor.href.trim().is_empty() || text.is_empty() {
                return None;
            }

            let url = base_url.join(anchor.href.trim()).ok()?;
            if !scope.allows_url(&url, start_host) {
                tracing::debug!("Skipping out-of-scope link {}", url);
                return None;
            }

            let url_lower = url.as_str().to_lowercase();
            let text_lower = text.to_lowercase();
            let mut score = 0;
            let mut matches = Vec::new();

            for keyword in keywords {
                let needle = keyword.to_lowercase();
                if needle.is_empty() {
                    continue;
                }
                if url_lower.contains(&needle) {
                    score += URL_MATCH_POINTS;
                    matches.push(format!("url:{}", keyword));
                }
                if text_lower.contains(&needle) {
                    score += TEXT_MATCH_POINTS;
                    matches.push(format!("text:{}", keyword));
                }
            }

            (score > 0).then(|| LinkCandidate {
                url: url.to_string(),
                text: text.to_string(),
                score,
                matches,
            })
        })
        .collect();

    candidates.sort_by(|a, b| b.score.cmp(&a.score));
    candidates
}
