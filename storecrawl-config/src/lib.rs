//! Loader for storecrawl configuration with YAML + environment overlays.
//!
//! Sources are merged in this order, later ones winning:
//! 1. built-in defaults (every field has one, so an empty document is valid)
//! 2. YAML files and inline snippets, in the order they were added
//! 3. `STORECRAWL__<SECTION>__<KEY>` environment variables
//!
//! String values may reference environment variables as `${VAR}`; these are
//! expanded after merging.
use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use storecrawl_common::{JitterRange, ModifierKeySetting, observability::LogFormat};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const DEFAULT_FILE_NAME: &str = "storecrawl.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorecrawlConfig {
    pub version: Option<String>,
    pub browser: BrowserConfig,
    pub storefront: StorefrontConfig,
    pub jitter: JitterConfig,
    pub walk: WalkConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// WebDriver endpoint (chromedriver by default).
    pub webdriver_url: String,
    pub headless: bool,
    /// Fixed extra delay before every browser action.
    pub slow_mo_ms: Option<u64>,
    pub modifier_key: ModifierKeySetting,
    /// How long to wait for an expected element.
    pub element_timeout_secs: u64,
    /// Keep a headless browser open this long before closing it.
    pub close_delay_ms: Option<u64>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".into(),
            headless: true,
            slow_mo_ms: None,
            modifier_key: ModifierKeySetting::Auto,
            element_timeout_secs: 15,
            close_delay_ms: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorefrontConfig {
    pub base_url: String,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            base_url: "https://apps.apple.com".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JitterConfig {
    /// Fixed seed for reproducible timings; entropy when unset.
    pub seed: Option<u64>,
    pub click_delay_ms: JitterRange,
    pub typing_delay_ms: JitterRange,
    pub settle_delay_ms: JitterRange,
    pub tab_open_delay_ms: JitterRange,
}

impl Default for JitterConfig {
    fn default() -> Self {
        Self {
            seed: None,
            click_delay_ms: JitterRange::stepped(70, 500, 7),
            typing_delay_ms: JitterRange::stepped(100, 300, 7),
            settle_delay_ms: JitterRange::stepped(300, 2000, 8),
            tab_open_delay_ms: JitterRange::stepped(700, 2000, 9),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WalkConfig {
    /// Pixels scrolled per step.
    pub scroll_delta: JitterRange,
    pub pause_ms: JitterRange,
    pub max_steps: Option<u32>,
    pub timeout_secs: Option<u64>,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            scroll_delta: JitterRange::uniform(300, 900),
            pause_ms: JitterRange::stepped(300, 1000, 8),
            max_steps: None,
            timeout_secs: Some(120),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Filter used when `RUST_LOG` is unset.
    pub filter: String,
    pub emit_stderr: bool,
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            filter: "info".into(),
            emit_stderr: false,
            log_dir: None,
        }
    }
}

impl StorecrawlConfig {
    /// Check ranges and URLs that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ranges = [
            ("jitter.click_delay_ms", &self.jitter.click_delay_ms),
            ("jitter.typing_delay_ms", &self.jitter.typing_delay_ms),
            ("jitter.settle_delay_ms", &self.jitter.settle_delay_ms),
            ("jitter.tab_open_delay_ms", &self.jitter.tab_open_delay_ms),
            ("walk.scroll_delta", &self.walk.scroll_delta),
            ("walk.pause_ms", &self.walk.pause_ms),
        ];
        for (key, range) in ranges {
            range
                .validate()
                .map_err(|e| ConfigError::Message(format!("{key}: {e}")))?;
        }

        for (key, raw) in [
            ("browser.webdriver_url", &self.browser.webdriver_url),
            ("storefront.base_url", &self.storefront.base_url),
        ] {
            url::Url::parse(raw)
                .map_err(|e| ConfigError::Message(format!("{key}: invalid url {raw:?}: {e}")))?;
        }
        Ok(())
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring.
pub struct StorecrawlConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for StorecrawlConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl StorecrawlConfigLoader {
    /// Start from defaults; environment overrides are applied at [`load`](Self::load).
    ///
    /// ```
    /// use storecrawl_config::StorecrawlConfigLoader;
    ///
    /// let config = StorecrawlConfigLoader::new()
    ///     .with_yaml_str("version: '1'")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert!(config.browser.headless);
    /// assert_eq!(config.walk.scroll_delta.min, 300);
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
        }
    }

    /// Attach a required YAML/TOML/JSON file; the format follows the suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is silently skipped when missing.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Look for `storecrawl.yaml` in the user config dir, then the working
    /// directory. Both are optional.
    pub fn with_default_locations(self) -> Self {
        let mut loader = self;
        if let Some(dir) = dirs::config_dir() {
            loader = loader.with_optional_file(dir.join("storecrawl").join(DEFAULT_FILE_NAME));
        }
        loader.with_optional_file(DEFAULT_FILE_NAME)
    }

    /// Merge an inline YAML snippet.
    ///
    /// ```
    /// use storecrawl_common::ModifierKeySetting;
    /// use storecrawl_config::StorecrawlConfigLoader;
    ///
    /// let cfg = StorecrawlConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// browser:
    ///   headless: false
    ///   modifier_key: meta
    /// walk:
    ///   scroll_delta: { min: 100, max: 200 }
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert!(!cfg.browser.headless);
    /// assert_eq!(cfg.browser.modifier_key, ModifierKeySetting::Meta);
    /// assert_eq!(cfg.walk.scroll_delta.max, 200);
    /// assert_eq!(cfg.walk.scroll_delta.resolution, None);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, FileFormat::Yaml));
        self
    }

    /// Merge all sources, expand `${VAR}` placeholders and validate.
    ///
    /// ```
    /// use storecrawl_config::StorecrawlConfigLoader;
    ///
    /// unsafe { std::env::set_var("CRAWL_DRIVER_HOST", "grid.internal"); }
    ///
    /// let config = StorecrawlConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// browser:
    ///   webdriver_url: "http://${CRAWL_DRIVER_HOST}:4444"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.browser.webdriver_url, "http://grid.internal:4444");
    ///
    /// unsafe { std::env::remove_var("CRAWL_DRIVER_HOST"); }
    /// ```
    pub fn load(self) -> Result<StorecrawlConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix("STORECRAWL")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: StorecrawlConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        typed.validate()?;

        Ok(typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_vars_inside_nested_sections() {
        temp_env::with_vars(
            [
                ("GRID_HOST", Some("grid.internal")),
                ("GRID_URL", Some("http://${GRID_HOST}:4444")),
            ],
            || {
                let mut v = json!({
                    "browser": { "webdriver_url": "${GRID_URL}", "headless": true },
                    "jitter": { "click_delay_ms": { "min": 70, "max": 500 } },
                    "logging": { "log_dir": "/var/log/${MISSING_DIR}" }
                });
                expand_env_in_value(&mut v);
                assert_eq!(v["browser"]["webdriver_url"], "http://grid.internal:4444");
                assert_eq!(v["browser"]["headless"], true);
                assert_eq!(v["jitter"]["click_delay_ms"]["max"], 500);
                assert_eq!(v["logging"]["log_dir"], "/var/log/${MISSING_DIR}");
            },
        );
    }

    #[test]
    fn self_referencing_vars_terminate() {
        temp_env::with_vars([("LOOP_A", Some("${LOOP_B}")), ("LOOP_B", Some("${LOOP_A}"))], || {
            let mut v = json!({ "storefront": { "base_url": "https://${LOOP_A}" } });
            expand_env_in_value(&mut v);
            let url = v["storefront"]["base_url"].as_str().unwrap();
            assert!(url.starts_with("https://${LOOP_"));
        });
    }

    #[test]
    fn defaults_mirror_crawler_timings() {
        let cfg = StorecrawlConfig::default();
        assert_eq!(cfg.jitter.click_delay_ms, JitterRange::stepped(70, 500, 7));
        assert_eq!(cfg.jitter.tab_open_delay_ms, JitterRange::stepped(700, 2000, 9));
        assert_eq!(cfg.walk.scroll_delta, JitterRange::uniform(300, 900));
        assert_eq!(cfg.storefront.base_url, "https://apps.apple.com");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_inverted_range() {
        let mut cfg = StorecrawlConfig::default();
        cfg.walk.pause_ms = JitterRange::uniform(900, 100);
        let err = cfg.validate().unwrap_err();
        assert!(err.to_string().contains("walk.pause_ms"));
    }

    #[test]
    fn validate_rejects_bad_url() {
        let mut cfg = StorecrawlConfig::default();
        cfg.browser.webdriver_url = "not a url".into();
        assert!(cfg.validate().is_err());
    }
}
