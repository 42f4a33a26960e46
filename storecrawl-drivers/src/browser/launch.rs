use serde_json::{json, Map, Value};

const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// How the Chrome process should be started.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub window_size: (u32, u32),
    pub user_agent: Option<String>,
    pub language: String,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            window_size: (1440, 900),
            user_agent: None,
            language: "en-US".to_string(),
        }
    }
}

/// Construct Chrome command-line arguments.
///
/// Headless runs get an explicit desktop user agent since headless Chrome
/// advertises itself in the default one.
pub fn build_launch_arguments(options: &LaunchOptions) -> Vec<String> {
    let mut args = vec![
        "--disable-blink-features=AutomationControlled".to_string(),
        "--disable-infobars".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--no-sandbox".to_string(),
        "--disable-extensions".to_string(),
        format!(
            "--window-size={},{}",
            options.window_size.0, options.window_size.1
        ),
        format!("--lang={}", options.language),
    ];

    let user_agent = match (&options.user_agent, options.headless) {
        (Some(ua), _) => Some(ua.as_str()),
        (None, true) => Some(DESKTOP_USER_AGENT),
        (None, false) => None,
    };
    if let Some(ua) = user_agent {
        args.push(format!("--user-agent={ua}"));
    }

    if options.headless {
        args.push("--headless=new".to_string());
        args.push("--disable-gpu".to_string());
    }
    args
}

/// `goog:chromeOptions` capability payload.
pub fn chrome_options(options: &LaunchOptions) -> Map<String, Value> {
    let mut chrome_opts = Map::new();
    chrome_opts.insert("args".to_string(), json!(build_launch_arguments(options)));
    chrome_opts.insert(
        "excludeSwitches".to_string(),
        json!(["enable-automation"]),
    );
    chrome_opts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headless_adds_flags_and_user_agent() {
        let args = build_launch_arguments(&LaunchOptions::default());
        assert!(args.iter().any(|a| a == "--headless=new"));
        assert!(args.iter().any(|a| a.starts_with("--user-agent=")));
        assert!(args.iter().any(|a| a == "--window-size=1440,900"));
    }

    #[test]
    fn headed_run_keeps_native_user_agent() {
        let options = LaunchOptions {
            headless: false,
            ..LaunchOptions::default()
        };
        let args = build_launch_arguments(&options);
        assert!(!args.iter().any(|a| a.starts_with("--headless")));
        assert!(!args.iter().any(|a| a.starts_with("--user-agent=")));
    }

    #[test]
    fn chrome_options_carry_args() {
        let opts = chrome_options(&LaunchOptions::default());
        assert!(opts["args"].as_array().is_some_and(|a| !a.is_empty()));
    }
}
