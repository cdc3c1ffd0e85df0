use std::env;
use std::time::Duration;

/// Per-operation deadlines. Every network operation carries one of these.
#[derive(Debug, Clone, PartialEq)]
pub struct Timeouts {
    /// Navigation used by site inspection and link discovery.
    pub inspect_navigation: Duration,
    /// Navigation for each page expanded during a crawl.
    pub crawl_navigation: Duration,
    /// Navigation for content extraction (network-idle wait).
    pub content_navigation: Duration,
    /// HEAD request deciding the content type.
    pub probe: Duration,
    /// Each click-and-settle interaction.
    pub interaction: Duration,
    pub robots: Duration,
    pub sitemap: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            inspect_navigation: Duration::from_secs(15),
            crawl_navigation: Duration::from_secs(10),
            content_navigation: Duration::from_secs(30),
            probe: Duration::from_secs(5),
            interaction: Duration::from_secs(2),
            robots: Duration::from_secs(5),
            sitemap: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub webdriver_url: String,
    pub user_agent: String,
    pub headless: bool,
    pub timeouts: Timeouts,
    /// Upper bound on scroll-to-bottom rounds while waiting for the page height to settle.
    pub max_scroll_rounds: usize,
    pub scroll_pause: Duration,
    pub crawl_delay: Duration,
    pub robots_cache_ttl: Duration,
    /// Maximum extractions in flight for `extract_many`.
    pub concurrency: usize,
    pub common_crawl_index: String,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:4444".to_string(),
            user_agent: format!("sitelens/{}", env!("CARGO_PKG_VERSION")),
            headless: true,
            timeouts: Timeouts::default(),
            max_scroll_rounds: 20,
            scroll_pause: Duration::from_secs(1),
            crawl_delay: Duration::ZERO,
            robots_cache_ttl: Duration::from_secs(300),
            concurrency: 4,
            common_crawl_index: "http://index.commoncrawl.org/CC-MAIN-2024-33-index".to_string(),
            log_level: "sitelens=info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

fn parse_env<T: std::str::FromStr + std::fmt::Debug>(name: &str, current: T) -> T {
    match env::var(name) {
        Ok(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                eprintln!(
                    "Warning: Invalid {} value '{}', using default {:?}",
                    name, raw, current
                );
                current
            }
        },
        Err(_) => current,
    }
}

fn parse_env_secs(name: &str, current: Duration) -> Duration {
    let secs = parse_env(name, current.as_secs_f64());
    Duration::try_from_secs_f64(secs).unwrap_or_else(|_| {
        eprintln!("Warning: Invalid {} value '{}', using default {:?}", name, secs, current);
        current
    })
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(webdriver_url) = env::var("SITELENS_WEBDRIVER_URL") {
            config.webdriver_url = webdriver_url;
        }

        if let Ok(user_agent) = env::var("SITELENS_USER_AGENT") {
            config.user_agent = user_agent;
        }

        config.headless = parse_env("SITELENS_HEADLESS", config.headless);
        config.max_scroll_rounds = parse_env("SITELENS_MAX_SCROLL_ROUNDS", config.max_scroll_rounds);
        config.scroll_pause = parse_env_secs("SITELENS_SCROLL_PAUSE_SECS", config.scroll_pause);
        config.crawl_delay = parse_env_secs("SITELENS_CRAWL_DELAY_SECS", config.crawl_delay);
        config.robots_cache_ttl =
            parse_env_secs("SITELENS_ROBOTS_CACHE_TTL_SECS", config.robots_cache_ttl);
        config.concurrency = parse_env("SITELENS_CONCURRENCY", config.concurrency).max(1);

        if let Ok(index) = env::var("SITELENS_COMMON_CRAWL_INDEX") {
            config.common_crawl_index = index;
        }

        if let Ok(log_level) = env::var("RUST_LOG") {
            config.log_level = log_level;
        } else if let Ok(log_level) = env::var("SITELENS_LOG_LEVEL") {
            config.log_level = log_level;
        }

        if let Ok(log_format) = env::var("SITELENS_LOG_FORMAT") {
            config.log_format = match log_format.to_lowercase().as_str() {
                "text" | "plain" => LogFormat::Text,
                "json" => LogFormat::Json,
                _ => {
                    eprintln!(
                        "Warning: Invalid SITELENS_LOG_FORMAT value '{}', using default text",
                        log_format
                    );
                    LogFormat::Text
                }
            };
        }

        config
    }
}
