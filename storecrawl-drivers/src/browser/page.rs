use crate::browser::behavioral::BehavioralEngine;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use fantoccini::{elements::Element, Client, Locator};
use serde_json::{json, Value};
use std::time::Duration;
use storecrawl_core::discovery::{DiscoveryWalk, ScrollSignal, ScrollSurface, WalkReport};
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Page wrapper providing element queries, waits and scrolling for the
/// window the session is currently focused on.
#[derive(Clone)]
pub struct StorePage {
    pub(crate) client: Client,
    pub(crate) behavioral_engine: BehavioralEngine,
    pub(crate) element_timeout: Duration,
}

impl StorePage {
    pub fn new(
        client: Client,
        behavioral_engine: BehavioralEngine,
        element_timeout: Duration,
    ) -> Self {
        Self {
            client,
            behavioral_engine,
            element_timeout,
        }
    }

    pub fn behavioral_engine(&self) -> &BehavioralEngine {
        &self.behavioral_engine
    }

    /// Navigate to `url` and wait for the document to finish loading.
    pub async fn goto(&self, url: &str) -> Result<()> {
        self.behavioral_engine.slow_mo().await;
        self.client
            .goto(url)
            .await
            .with_context(|| format!("navigating to {url}"))?;
        self.wait_until_ready().await
    }

    /// Poll `document.readyState` until the page reports `complete`.
    pub async fn wait_until_ready(&self) -> Result<()> {
        let deadline = Instant::now() + self.element_timeout;
        loop {
            let state = self
                .client
                .execute("return document.readyState;", vec![])
                .await?;
            if state.as_str() == Some("complete") {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(anyhow!("page did not finish loading in time"));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Return the full page HTML source.
    pub async fn get_content(&self) -> Result<String> {
        self.client.source().await.map_err(anyhow::Error::msg)
    }

    /// Wait for an element matching `selector` to be attached.
    pub async fn wait_for_element(&self, selector: &str) -> Result<StoreElement> {
        let element = self
            .client
            .wait()
            .at_most(self.element_timeout)
            .for_element(Locator::Css(selector))
            .await
            .with_context(|| format!("waiting for {selector}"))?;
        Ok(self.wrap(element))
    }

    /// Wait for an element matching `selector` to be attached and visible.
    pub async fn wait_for_visible(&self, selector: &str) -> Result<StoreElement> {
        let element = self.wait_for_element(selector).await?;
        let deadline = Instant::now() + self.element_timeout;
        while !element.is_displayed().await? {
            if Instant::now() >= deadline {
                return Err(anyhow!("{selector} never became visible"));
            }
            sleep(POLL_INTERVAL).await;
        }
        Ok(element)
    }

    /// Find zero or more elements by CSS selector without waiting.
    pub async fn find_elements(&self, selector: &str) -> Result<Vec<StoreElement>> {
        let elements = self.client.find_all(Locator::Css(selector)).await?;
        Ok(elements.into_iter().map(|e| self.wrap(e)).collect())
    }

    /// First element matching `selector`, if any.
    pub async fn first_element(&self, selector: &str) -> Result<Option<StoreElement>> {
        Ok(self.find_elements(selector).await?.into_iter().next())
    }

    /// Elements matching `selector` whose visible text contains `text`.
    pub async fn find_elements_with_text(
        &self,
        selector: &str,
        text: &str,
    ) -> Result<Vec<StoreElement>> {
        filter_by_text(self.find_elements(selector).await?, text).await
    }

    /// Run `walk` over this page, drawing from the engine's sampler.
    pub async fn discover(
        &self,
        walk: &DiscoveryWalk,
        cancel: &CancellationToken,
    ) -> Result<WalkReport> {
        let mut sampler = self.behavioral_engine.sampler();
        let report = walk.run(self, &mut sampler, cancel).await?;
        info!(
            target: "browser.discovery",
            steps = report.steps,
            stop = ?report.stop,
            "page discovery finished"
        );
        Ok(report)
    }

    fn wrap(&self, element: Element) -> StoreElement {
        StoreElement::new(
            element,
            self.client.clone(),
            &self.behavioral_engine,
            self.element_timeout,
        )
    }
}

#[async_trait]
impl ScrollSurface for StorePage {
    async fn scroll_metrics(&self) -> Result<ScrollSignal> {
        let raw = self
            .client
            .execute(
                "return [document.body.scrollHeight, window.scrollY];",
                vec![],
            )
            .await?;
        let [height, offset]: [f64; 2] =
            serde_json::from_value(raw).context("unexpected scroll metrics payload")?;
        debug!(target: "browser.discovery", height, offset, "scroll metrics");
        Ok(ScrollSignal { height, offset })
    }

    async fn scroll_by(&self, delta_x: i64, delta_y: i64) -> Result<()> {
        self.client
            .execute(
                "window.scrollBy(arguments[0], arguments[1]);",
                vec![json!(delta_x), json!(delta_y)],
            )
            .await?;
        Ok(())
    }

    async fn pause(&self, duration: Duration) {
        sleep(duration).await;
    }
}

async fn filter_by_text(elements: Vec<StoreElement>, text: &str) -> Result<Vec<StoreElement>> {
    let mut matching = Vec::new();
    for element in elements {
        if element.get_inner_text().await?.contains(text) {
            matching.push(element);
        }
    }
    Ok(matching)
}

// =========================
// StoreElement Definition
// =========================

#[derive(Clone)]
/// Wrapper for DOM elements that provides typed helpers consistent with [`StorePage`].
pub struct StoreElement {
    pub element: Element,
    client: Client,
    behavioral_engine: BehavioralEngine,
    timeout: Duration,
}

impl StoreElement {
    pub fn new(
        element: Element,
        client: Client,
        behavioral: &BehavioralEngine,
        timeout: Duration,
    ) -> Self {
        Self {
            element,
            client,
            behavioral_engine: behavioral.clone(),
            timeout,
        }
    }

    /// Click after a human-like pause.
    pub async fn click(&self) -> Result<()> {
        self.behavioral_engine.click_delay().await;
        self.element.click().await.map_err(anyhow::Error::from)
    }

    /// Type into the element using human-like timings.
    pub async fn type_str(&self, text: &str) -> Result<()> {
        self.behavioral_engine
            .type_text_human_like(&self.element, text)
            .await
    }

    /// Send a single key, e.g. [`fantoccini::key::Key::Enter`].
    pub async fn press(&self, key: fantoccini::key::Key) -> Result<()> {
        self.behavioral_engine.click_delay().await;
        let key: char = key.into();
        self.element
            .send_keys(&key.to_string())
            .await
            .map_err(anyhow::Error::from)
    }

    /// Scroll the element into the middle of the viewport.
    pub async fn scroll_into_view(&self) -> Result<()> {
        let arg: Value = serde_json::to_value(&self.element)?;
        self.client
            .execute(
                "arguments[0].scrollIntoView({block: 'center', inline: 'nearest'});",
                vec![arg],
            )
            .await?;
        Ok(())
    }

    pub async fn is_displayed(&self) -> Result<bool> {
        self.element
            .is_displayed()
            .await
            .map_err(anyhow::Error::from)
    }

    /// Wait until the element is hidden or detached from the document.
    pub async fn wait_hidden(&self) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match self.element.is_displayed().await {
                Ok(false) | Err(_) => return Ok(()),
                Ok(true) if Instant::now() >= deadline => {
                    return Err(anyhow!("element still visible after {:?}", self.timeout));
                }
                Ok(true) => sleep(POLL_INTERVAL).await,
            }
        }
    }

    /// Find zero or more child elements by CSS selector.
    pub async fn find_elements(&self, selector: &str) -> Result<Vec<StoreElement>> {
        let elements = self.element.find_all(Locator::Css(selector)).await?;
        Ok(elements.into_iter().map(|e| self.child(e)).collect())
    }

    /// Child elements matching `selector` whose visible text contains `text`.
    pub async fn find_elements_with_text(
        &self,
        selector: &str,
        text: &str,
    ) -> Result<Vec<StoreElement>> {
        filter_by_text(self.find_elements(selector).await?, text).await
    }

    /// Read an attribute value.
    pub async fn get_attribute(&self, attribute: &str) -> Result<Option<String>> {
        self.element
            .attr(attribute)
            .await
            .map_err(anyhow::Error::from)
    }

    /// Return the element's visible text.
    pub async fn get_inner_text(&self) -> Result<String> {
        self.element.text().await.map_err(anyhow::Error::from)
    }

    fn child(&self, element: Element) -> StoreElement {
        StoreElement::new(
            element,
            self.client.clone(),
            &self.behavioral_engine,
            self.timeout,
        )
    }
}
