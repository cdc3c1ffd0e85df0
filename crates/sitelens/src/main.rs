use clap::{Parser, Subcommand};
use miette::IntoDiagnostic;
use serde::Serialize;
use sitelens::{Config, CrawlOptions, LogFormat, Scope, SiteLens, Topology};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

/// Inspect sites, discover links, crawl and extract Markdown through a WebDriver browser.
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct CliArgs {
    /// WebDriver endpoint (e.g., http://localhost:4444). Overrides SITELENS_WEBDRIVER_URL.
    #[clap(short = 'U', long, global = true, value_name = "WEBDRIVER_URL")]
    webdriver_url: Option<String>,
    /// Log output format. Overrides SITELENS_LOG_FORMAT.
    #[clap(long, global = true, value_enum)]
    log_format: Option<LogFormatArg>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report metadata, navigation links and sitemap structure of a page.
    Inspect { url: String },
    /// Rank the links of a page by keyword relevance.
    Discover {
        url: String,
        /// Keyword to score against; repeatable.
        #[clap(short, long = "keyword", required = true)]
        keywords: Vec<String>,
        #[clap(long, value_enum, default_value_t = Scope::Domain)]
        scope: Scope,
    },
    /// Crawl breadth-first from a URL and list the pages found.
    Crawl {
        url: String,
        #[clap(long, value_enum, default_value_t = Topology::Mesh)]
        topology: Topology,
        #[clap(long, value_enum, default_value_t = Scope::Subdomain)]
        scope: Scope,
        /// Treat URLs differing only in their query string as distinct pages.
        #[clap(long)]
        keep_queries: bool,
        #[clap(short, long, default_value_t = 50)]
        max_pages: usize,
        /// Delay (in seconds) after each expanded page. Overrides SITELENS_CRAWL_DELAY_SECS.
        #[clap(short, long)]
        crawl_delay: Option<f64>,
        /// Print crawl statistics to stderr.
        #[clap(long)]
        stats: bool,
    },
    /// Extract cleaned Markdown from one or more URLs.
    Extract {
        #[clap(required = true)]
        urls: Vec<String>,
        /// CSS selector to click before extraction; repeatable.
        #[clap(long = "click")]
        click_selectors: Vec<String>,
        /// Attach a base64 PNG screenshot.
        #[clap(long)]
        screenshot: bool,
    },
}

#[derive(Serialize)]
struct CrawlOutput {
    urls: Vec<String>,
    pages_expanded: usize,
    pages_skipped_robots: usize,
    pages_skipped_scope: usize,
    pages_failed: usize,
    links_discovered: usize,
    duration_secs: Option<f64>,
}

fn init_tracing(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into());

    match config.log_format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> miette::Result<()> {
    let output = serde_json::to_string_pretty(value).into_diagnostic()?;
    println!("{}", output);
    Ok(())
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let args = CliArgs::parse();

    let mut config = Config::from_env();
    if let Some(webdriver_url) = args.webdriver_url {
        config.webdriver_url = webdriver_url;
    }
    if let Some(log_format) = args.log_format {
        config.log_format = match log_format {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        };
    }
    if let Command::Crawl {
        crawl_delay: Some(delay),
        ..
    } = &args.command
    {
        config.crawl_delay = std::time::Duration::try_from_secs_f64(*delay).into_diagnostic()?;
    }

    init_tracing(&config);
    tracing::debug!("WebDriver endpoint: {}", config.webdriver_url);

    let lens = SiteLens::new(config).into_diagnostic()?;

    match args.command {
        Command::Inspect { url } => print_json(&lens.inspect_site(&url).await.into_diagnostic()?),
        Command::Discover {
            url,
            keywords,
            scope,
        } => print_json(
            &lens
                .discover_links(&url, &keywords, scope)
                .await
                .into_diagnostic()?,
        ),
        Command::Crawl {
            url,
            topology,
            scope,
            keep_queries,
            max_pages,
            stats,
            ..
        } => {
            let options = CrawlOptions {
                topology,
                scope,
                strip_queries: !keep_queries,
                page_limit: max_pages,
            };
            let result = lens.crawl(&url, &options).await.into_diagnostic()?;
            if stats {
                result.write_stats_to_stderr();
            }
            print_json(&CrawlOutput {
                urls: result.urls(),
                pages_expanded: result.stats.pages_expanded,
                pages_skipped_robots: result.stats.pages_skipped_robots,
                pages_skipped_scope: result.stats.pages_skipped_scope,
                pages_failed: result.stats.pages_failed,
                links_discovered: result.stats.links_discovered,
                duration_secs: result.stats.duration().map(|d| d.as_secs_f64()),
            })
        }
        Command::Extract {
            urls,
            click_selectors,
            screenshot,
        } => {
            let extractions = lens
                .extract_many(&urls, &click_selectors, screenshot)
                .await
                .into_diagnostic()?;
            if let [single] = extractions.as_slice() {
                print_json(single)
            } else {
                print_json(&extractions)
            }
        }
    }
}
