//! Turns the merged configuration and CLI flags into crawl components.
use anyhow::Result;
use std::time::Duration;
use storecrawl_common::observability::LogConfig;
use storecrawl_config::{StorecrawlConfig, StorecrawlConfigLoader};
use storecrawl_core::discovery::DiscoveryWalk;
use storecrawl_core::jitter::{RngSampler, SharedSampler};
use storecrawl_drivers::browser::behavioral::{BehavioralEngine, Timings};
use storecrawl_drivers::browser::driver::DriverOptions;
use storecrawl_drivers::browser::launch::LaunchOptions;
use storecrawl_storefront::CrawlSettings;

use crate::Cli;

/// Load configuration, then let command-line flags win over it.
pub fn load_config(cli: &Cli) -> Result<StorecrawlConfig> {
    let loader = match &cli.config {
        Some(path) => StorecrawlConfigLoader::new().with_file(path),
        None => StorecrawlConfigLoader::new().with_default_locations(),
    };
    let mut cfg = loader.load()?;
    apply_cli(&mut cfg, cli);
    cfg.validate()?;
    Ok(cfg)
}

fn apply_cli(cfg: &mut StorecrawlConfig, cli: &Cli) {
    if cli.browser {
        cfg.browser.headless = false;
    }
    if let Some(ms) = cli.slow_mo {
        cfg.browser.slow_mo_ms = Some(ms);
    }
    if let Some(url) = &cli.webdriver_url {
        cfg.browser.webdriver_url = url.clone();
    }
}

pub fn log_config(cfg: &StorecrawlConfig, verbose: bool) -> LogConfig {
    LogConfig {
        log_dir: cfg.logging.log_dir.clone(),
        emit_stderr: verbose || cfg.logging.emit_stderr,
        format: cfg.logging.format,
        default_filter: cfg.logging.filter.clone(),
        ..LogConfig::default()
    }
}

/// Browser pacing; the modifier key is resolved here, once.
pub fn driver_options(cfg: &StorecrawlConfig) -> DriverOptions {
    DriverOptions {
        webdriver_url: cfg.browser.webdriver_url.clone(),
        launch: LaunchOptions {
            headless: cfg.browser.headless,
            ..LaunchOptions::default()
        },
        modifier: cfg.browser.modifier_key.resolve(),
        element_timeout: Duration::from_secs(cfg.browser.element_timeout_secs),
    }
}

pub fn behavioral_engine(cfg: &StorecrawlConfig) -> BehavioralEngine {
    let sampler = SharedSampler::new(RngSampler::from_seed_option(cfg.jitter.seed));
    let timings = Timings {
        click: cfg.jitter.click_delay_ms,
        typing: cfg.jitter.typing_delay_ms,
        settle: cfg.jitter.settle_delay_ms,
        tab_open: cfg.jitter.tab_open_delay_ms,
    };
    BehavioralEngine::new(
        sampler,
        timings,
        cfg.browser.slow_mo_ms.map(Duration::from_millis),
    )
}

pub fn crawl_settings(cfg: &StorecrawlConfig) -> CrawlSettings {
    CrawlSettings {
        base_url: cfg.storefront.base_url.clone(),
        walk: DiscoveryWalk {
            scroll_delta: cfg.walk.scroll_delta,
            pause: cfg.walk.pause_ms,
            max_steps: cfg.walk.max_steps,
            timeout: cfg.walk.timeout_secs.map(Duration::from_secs),
        },
        ..CrawlSettings::default()
    }
}
