use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use storecrawl_common::observability::init_logging;
use storecrawl_config::StorecrawlConfig;
use storecrawl_drivers::browser::driver::StoreDriver;
use storecrawl_runtime::StorecrawlRuntime;
use storecrawl_storefront::{AppInfo, StorefrontCrawler};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

mod settings;

const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Crawl every app listed by a company on the App Store.
#[derive(Debug, Parser)]
#[command(name = "storecrawl", version)]
pub struct Cli {
    /// Company to search for.
    #[arg(short = 'n', long = "company-name")]
    pub company_name: String,

    /// Print progress data to stderr.
    #[arg(short, long)]
    pub verbose: bool,

    /// Show the browser window instead of running headless.
    #[arg(short, long)]
    pub browser: bool,

    /// Slow every browser action down by this many milliseconds.
    #[arg(short, long = "slow-mo", value_name = "MS")]
    pub slow_mo: Option<u64>,

    /// YAML configuration file; defaults to `storecrawl.yaml` when present.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// WebDriver endpoint, e.g. a running chromedriver.
    #[arg(long, env = "STORECRAWL_WEBDRIVER_URL")]
    pub webdriver_url: Option<String>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cfg = settings::load_config(&cli)?;

    let log_path = init_logging(settings::log_config(&cfg, cli.verbose))?;
    info!(target: "app", log = %log_path.display(), "storecrawl starting");

    let runtime = StorecrawlRuntime::build("storecrawl", None)?;
    let _ctrl_c = runtime.cancel_on_ctrl_c();
    let cancel = runtime.handle().cancellation();

    let outcome = runtime.block_on(crawl(&cli.company_name, &cfg, cancel));
    runtime.shutdown(SHUTDOWN_GRACE);

    let apps = outcome?;
    println!("=> Result:\n{}", serde_json::to_string_pretty(&apps)?);
    Ok(())
}

async fn crawl(
    company_name: &str,
    cfg: &StorecrawlConfig,
    cancel: CancellationToken,
) -> Result<Vec<AppInfo>> {
    let driver = StoreDriver::connect(
        settings::driver_options(cfg),
        settings::behavioral_engine(cfg),
    )
    .await?;

    let crawler = StorefrontCrawler::new(driver, settings::crawl_settings(cfg), cancel);
    let result = crawler.crawl_company_apps(company_name).await;

    let driver = crawler.into_driver();
    if cfg.browser.headless {
        if let Some(delay) = cfg.browser.close_delay_ms {
            driver.linger(Duration::from_millis(delay)).await;
        }
    }
    if let Err(e) = driver.close().await {
        warn!(target: "app", error = %e, "closing the browser session failed");
    }

    Ok(result?)
}
