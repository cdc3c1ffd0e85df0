//! Boilerplate removal: keeps the readable body of a page and drops its chrome.
use readability::extractor;
use scraper::Html;
use url::Url;

fn has_text(html: &str) -> bool {
    Html::parse_fragment(html)
        .root_element()
        .text()
        .any(|t| !t.trim().is_empty())
}

/// Extracts the main content of `html` with the readability algorithm.
///
/// Relative links are resolved against `page_url`. Never fails: when extraction errors or
/// leaves nothing readable, the input is returned unchanged.
pub fn strip_boilerplate(html: &str, page_url: &Url) -> String {
    match extractor::extract(&mut html.as_bytes(), page_url) {
        Ok(product) if has_text(&product.content) => product.content,
        Ok(_) => {
            tracing::debug!("Readability left no text for {}, keeping original HTML", page_url);
            html.to_string()
        }
        Err(_) => {
            tracing::debug!("Readability failed for {}, keeping original HTML", page_url);
            html.to_string()
        }
    }
}
