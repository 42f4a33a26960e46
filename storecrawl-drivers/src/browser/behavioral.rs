use anyhow::Result;
use fantoccini::elements::Element;
use std::time::Duration;
use storecrawl_common::JitterRange;
use storecrawl_core::jitter::{draw, draw_duration, SharedSampler};
use tokio::time::sleep;

/// Delay ranges used between browser actions.
#[derive(Debug, Clone)]
pub struct Timings {
    /// Before clicks and key presses.
    pub click: JitterRange,
    /// Between typed characters.
    pub typing: JitterRange,
    /// After navigation or when polling for UI state.
    pub settle: JitterRange,
    /// After opening a link in a new tab.
    pub tab_open: JitterRange,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            click: JitterRange::stepped(70, 500, 7),
            typing: JitterRange::stepped(100, 300, 7),
            settle: JitterRange::stepped(300, 2000, 8),
            tab_open: JitterRange::stepped(700, 2000, 9),
        }
    }
}

#[derive(Debug, Clone)]
/// Produces human-like delays and typing behavior to reduce automation signals.
pub struct BehavioralEngine {
    sampler: SharedSampler,
    timings: Timings,
    slow_mo: Option<Duration>,
}

impl BehavioralEngine {
    pub fn new(sampler: SharedSampler, timings: Timings, slow_mo: Option<Duration>) -> Self {
        Self {
            sampler,
            timings,
            slow_mo,
        }
    }

    /// Handle to the engine's sampler, for walks that should share its sequence.
    pub fn sampler(&self) -> SharedSampler {
        self.sampler.clone()
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    /// Draw a value from `range` without sleeping.
    pub fn sample(&self, range: &JitterRange) -> u64 {
        draw(range, &mut self.sampler.clone())
    }

    /// Sleep for a duration drawn from `range` (milliseconds).
    pub async fn random_delay(&self, range: &JitterRange) {
        let wait = draw_duration(range, &mut self.sampler.clone());
        sleep(wait).await;
    }

    /// Fixed pause applied before every action when slow motion is on.
    pub async fn slow_mo(&self) {
        if let Some(wait) = self.slow_mo {
            sleep(wait).await;
        }
    }

    pub async fn click_delay(&self) {
        self.slow_mo().await;
        self.random_delay(&self.timings.click).await;
    }

    pub async fn settle(&self) {
        self.random_delay(&self.timings.settle).await;
    }

    pub async fn tab_open_delay(&self) {
        self.random_delay(&self.timings.tab_open).await;
    }

    /// Type the provided text with small random delays between characters.
    pub async fn type_text_human_like(&self, element: &Element, text: &str) -> Result<()> {
        self.slow_mo().await;
        for ch in text.chars() {
            element.send_keys(&ch.to_string()).await?;
            self.random_delay(&self.timings.typing).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storecrawl_core::jitter::RngSampler;

    fn engine(seed: u64) -> BehavioralEngine {
        BehavioralEngine::new(
            SharedSampler::new(RngSampler::seeded(seed)),
            Timings::default(),
            None,
        )
    }

    #[test]
    fn click_samples_stay_on_grid() {
        let engine = engine(21);
        let range = engine.timings().click;
        let grid: Vec<u64> = (0..7).map(|k| range.value_at(k)).collect();
        for _ in 0..100 {
            assert!(grid.contains(&engine.sample(&range)));
        }
    }

    #[test]
    fn clones_share_one_sequence() {
        let a = engine(4);
        let b = a.clone();
        let reference = engine(4);
        let range = JitterRange::uniform(0, 1_000_000);

        let expected = (reference.sample(&range), reference.sample(&range));
        assert_eq!((a.sample(&range), b.sample(&range)), expected);
    }

    #[tokio::test]
    async fn zero_width_delay_returns_quickly() {
        let engine = engine(1);
        let started = std::time::Instant::now();
        engine.random_delay(&JitterRange::uniform(0, 0)).await;
        engine.slow_mo().await;
        assert!(started.elapsed() < Duration::from_millis(500));
    }
}
