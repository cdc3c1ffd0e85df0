use async_trait::async_trait;

use super::Page;
use crate::error::Result;

/// Mutates navigator properties of a loaded document.
#[async_trait]
pub trait Fingerprint: Send + Sync {
    async fn apply(&self, page: &dyn Page) -> Result<()>;
}

pub(crate) const STEALTH_SCRIPT: &str = r#"
Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
Object.defineProperty(navigator, 'languages', { get: () => ['en-US', 'en'] });
Object.defineProperty(navigator, 'plugins', { get: () => [1, 2, 3, 4, 5] });
window.chrome = window.chrome || { runtime: {} };
return true;
"#;

/// Hides the common automation markers.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stealth;

#[async_trait]
impl Fingerprint for Stealth {
    async fn apply(&self, page: &dyn Page) -> Result<()> {
        page.evaluate(STEALTH_SCRIPT).await.map(|_| ())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoFingerprint;

#[async_trait]
impl Fingerprint for NoFingerprint {
    async fn apply(&self, _page: &dyn Page) -> Result<()> {
        Ok(())
    }
}
