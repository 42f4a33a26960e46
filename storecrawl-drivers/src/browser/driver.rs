use crate::browser::{
    behavioral::BehavioralEngine,
    launch::{chrome_options, LaunchOptions},
    page::{StoreElement, StorePage},
};
use anyhow::{anyhow, Result};
use fantoccini::{
    actions::{InputSource, KeyAction, KeyActions},
    key::Key,
    wd::WindowHandle,
    Client, ClientBuilder,
};
use serde_json::json;
use std::time::Duration;
use storecrawl_common::ModifierKey;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};
use webdriver::capabilities::Capabilities;

const WINDOW_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Connection and interaction settings for [`StoreDriver`].
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Running WebDriver service, e.g. chromedriver on `http://localhost:9515`.
    pub webdriver_url: String,
    pub launch: LaunchOptions,
    /// Key held while clicking to open a link in a new tab.
    pub modifier: ModifierKey,
    pub element_timeout: Duration,
}

/// Thin wrapper around a `fantoccini` WebDriver client with behavioral
/// helpers and tab management.
pub struct StoreDriver {
    pub client: Client,
    pub behavioral_engine: BehavioralEngine,
    options: DriverOptions,
}

impl StoreDriver {
    /// Create a new driver connected to a running WebDriver service.
    pub async fn connect(options: DriverOptions, behavioral_engine: BehavioralEngine) -> Result<Self> {
        let mut caps = Capabilities::new();
        caps.insert(
            "goog:chromeOptions".to_string(),
            json!(chrome_options(&options.launch)),
        );

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&options.webdriver_url)
            .await
            .map_err(|e| anyhow!("connecting to {}: {e}", options.webdriver_url))?;

        info!(
            target: "browser.driver",
            url = %options.webdriver_url,
            headless = options.launch.headless,
            "webdriver session started"
        );

        Ok(Self {
            client,
            behavioral_engine,
            options,
        })
    }

    /// Page handle for whichever tab currently has focus.
    pub fn page(&self) -> StorePage {
        StorePage::new(
            self.client.clone(),
            self.behavioral_engine.clone(),
            self.options.element_timeout,
        )
    }

    /// Navigate the focused tab to `url`.
    pub async fn goto(&self, url: &str) -> Result<StorePage> {
        let page = self.page();
        page.goto(url).await?;
        Ok(page)
    }

    /// Open a fresh blank tab, focus it and return its handle.
    pub async fn new_tab(&self) -> Result<WindowHandle> {
        let created = self.client.new_window(true).await?;
        self.client.switch_to_window(created.handle.clone()).await?;
        Ok(created.handle)
    }

    pub async fn current_tab(&self) -> Result<WindowHandle> {
        Ok(self.client.window().await?)
    }

    pub async fn switch_to(&self, handle: &WindowHandle) -> Result<()> {
        self.client.switch_to_window(handle.clone()).await?;
        Ok(())
    }

    /// Modifier-click `link` so it opens in a background tab, then focus that
    /// tab and return its handle.
    pub async fn open_in_new_tab(&self, link: &StoreElement) -> Result<WindowHandle> {
        let before = self.client.windows().await?;

        link.scroll_into_view().await?;
        self.modifier_click(link).await?;
        self.behavioral_engine.tab_open_delay().await;

        let deadline = Instant::now() + self.options.element_timeout;
        let opened = loop {
            let now_open = self.client.windows().await?;
            if let Some(handle) = now_open.into_iter().find(|h| !before.contains(h)) {
                break handle;
            }
            if Instant::now() >= deadline {
                return Err(anyhow!("no new tab appeared after modifier click"));
            }
            sleep(WINDOW_POLL_INTERVAL).await;
        };

        self.switch_to(&opened).await?;
        debug!(target: "browser.driver", "switched to new tab");
        Ok(opened)
    }

    /// Close the focused tab and return to `back`.
    pub async fn close_tab(&self, back: &WindowHandle) -> Result<()> {
        self.client.close_window().await?;
        self.switch_to(back).await
    }

    async fn modifier_click(&self, link: &StoreElement) -> Result<()> {
        let key = modifier_char(self.options.modifier);

        self.client
            .perform_actions(modifier_action(KeyAction::Down { value: key }))
            .await?;
        let clicked = link.click().await;
        self.client
            .perform_actions(modifier_action(KeyAction::Up { value: key }))
            .await?;
        self.client.release_actions().await?;
        clicked
    }

    /// Keep the browser open for `delay` before closing, e.g. to inspect it.
    pub async fn linger(&self, delay: Duration) {
        sleep(delay).await;
    }

    /// Close the underlying browser session.
    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}

fn modifier_char(modifier: ModifierKey) -> char {
    match modifier {
        ModifierKey::Control => Key::Control.into(),
        ModifierKey::Meta => Key::Meta.into(),
    }
}

fn modifier_action(action: KeyAction) -> KeyActions {
    KeyActions::new("modifier".to_string()).then(action)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modifiers_map_to_webdriver_key_codes() {
        assert_eq!(modifier_char(ModifierKey::Control), '\u{e009}');
        assert_eq!(modifier_char(ModifierKey::Meta), '\u{e03d}');
    }
}
