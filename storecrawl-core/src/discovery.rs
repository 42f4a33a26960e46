//! Scroll a lazily-rendered surface until no more content appears.
//!
//! Each step scrolls down by a random amount, waits a random delay and then
//! reads the surface height and scroll offset. The walk ends once the offset
//! reaches the height or stops moving between two reads. A cancellation
//! token, an optional deadline and an optional step cap bound the walk when
//! a page keeps growing forever.
use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use storecrawl_common::JitterRange;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::jitter::{draw, draw_duration, RangeSampler};

/// Height and scroll offset read from a surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScrollSignal {
    pub height: f64,
    pub offset: f64,
}

impl ScrollSignal {
    pub fn at_bottom(&self) -> bool {
        self.offset >= self.height
    }
}

/// A scrollable area the walk can drive.
#[async_trait]
pub trait ScrollSurface: Send + Sync {
    /// Current total scrollable height and scroll offset.
    async fn scroll_metrics(&self) -> Result<ScrollSignal>;

    /// Scroll relative to the current position.
    async fn scroll_by(&self, delta_x: i64, delta_y: i64) -> Result<()>;

    /// Wait between steps.
    async fn pause(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Why a walk ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WalkStop {
    ReachedBottom,
    Stalled,
    StepLimit,
    TimedOut,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WalkReport {
    pub steps: u32,
    pub stop: WalkStop,
    pub last_signal: Option<ScrollSignal>,
}

/// Parameters of a discovery walk.
#[derive(Debug, Clone)]
pub struct DiscoveryWalk {
    pub scroll_delta: JitterRange,
    pub pause: JitterRange,
    pub max_steps: Option<u32>,
    pub timeout: Option<Duration>,
}

impl Default for DiscoveryWalk {
    fn default() -> Self {
        Self {
            scroll_delta: JitterRange::uniform(300, 900),
            pause: JitterRange::stepped(300, 1000, 8),
            max_steps: None,
            timeout: Some(Duration::from_secs(120)),
        }
    }
}

enum StepOutcome {
    Continue(ScrollSignal),
    Done(WalkStop, ScrollSignal),
}

impl DiscoveryWalk {
    /// Drive `surface` until it stops yielding new content.
    ///
    /// Cancellation, timeout and the step cap are reported through
    /// [`WalkReport::stop`]; only errors raised by the surface are returned
    /// as `Err`.
    pub async fn run<S>(
        &self,
        surface: &S,
        sampler: &mut dyn RangeSampler,
        cancel: &CancellationToken,
    ) -> Result<WalkReport>
    where
        S: ScrollSurface + ?Sized,
    {
        let deadline = self.timeout.map(|t| Instant::now() + t);
        let mut last_offset = 0.0;
        let mut steps = 0u32;
        let mut last_signal = None;

        loop {
            if let Some(limit) = self.max_steps {
                if steps >= limit {
                    return Ok(self.finish(steps, WalkStop::StepLimit, last_signal));
                }
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    return Ok(self.finish(steps, WalkStop::Cancelled, last_signal));
                }
                _ = wait_until(deadline) => {
                    return Ok(self.finish(steps, WalkStop::TimedOut, last_signal));
                }
                outcome = self.step(surface, sampler, last_offset) => outcome?,
            };

            steps += 1;
            match outcome {
                StepOutcome::Done(stop, signal) => {
                    return Ok(self.finish(steps, stop, Some(signal)));
                }
                StepOutcome::Continue(signal) => {
                    last_offset = signal.offset;
                    last_signal = Some(signal);
                }
            }
        }
    }

    async fn step<S>(
        &self,
        surface: &S,
        sampler: &mut dyn RangeSampler,
        last_offset: f64,
    ) -> Result<StepOutcome>
    where
        S: ScrollSurface + ?Sized,
    {
        let delta = draw(&self.scroll_delta, sampler);
        let pause = draw_duration(&self.pause, sampler);

        surface.scroll_by(0, delta as i64).await?;
        surface.pause(pause).await;

        let signal = surface.scroll_metrics().await?;
        if signal.at_bottom() {
            return Ok(StepOutcome::Done(WalkStop::ReachedBottom, signal));
        }
        if signal.offset == last_offset {
            return Ok(StepOutcome::Done(WalkStop::Stalled, signal));
        }
        Ok(StepOutcome::Continue(signal))
    }

    fn finish(&self, steps: u32, stop: WalkStop, last_signal: Option<ScrollSignal>) -> WalkReport {
        debug!(
            target: "crawl.discovery",
            steps,
            stop = ?stop,
            "discovery walk finished"
        );
        WalkReport {
            steps,
            stop,
            last_signal,
        }
    }
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}

/// Run `walk` over `surface` with a fresh entropy-seeded sampler and no
/// external cancellation.
pub async fn discover_page<S>(surface: &S, walk: &DiscoveryWalk) -> Result<WalkReport>
where
    S: ScrollSurface + ?Sized,
{
    let mut sampler = crate::jitter::RngSampler::from_entropy();
    walk.run(surface, &mut sampler, &CancellationToken::new())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jitter::RngSampler;
    use std::sync::Mutex;

    /// Surface whose offset follows a scripted sequence of reads.
    struct ScriptedSurface {
        height: f64,
        offsets: Vec<f64>,
        reads: Mutex<usize>,
        scrolls: Mutex<Vec<i64>>,
    }

    impl ScriptedSurface {
        fn new(height: f64, offsets: Vec<f64>) -> Self {
            Self {
                height,
                offsets,
                reads: Mutex::new(0),
                scrolls: Mutex::new(Vec::new()),
            }
        }

        fn reads(&self) -> usize {
            *self.reads.lock().unwrap()
        }
    }

    #[async_trait]
    impl ScrollSurface for ScriptedSurface {
        async fn scroll_metrics(&self) -> Result<ScrollSignal> {
            let mut reads = self.reads.lock().unwrap();
            let idx = (*reads).min(self.offsets.len() - 1);
            *reads += 1;
            Ok(ScrollSignal {
                height: self.height,
                offset: self.offsets[idx],
            })
        }

        async fn scroll_by(&self, _delta_x: i64, delta_y: i64) -> Result<()> {
            self.scrolls.lock().unwrap().push(delta_y);
            Ok(())
        }

        async fn pause(&self, _duration: Duration) {}
    }

    /// Surface that keeps growing and never stabilises.
    struct EndlessSurface {
        offset: Mutex<f64>,
    }

    #[async_trait]
    impl ScrollSurface for EndlessSurface {
        async fn scroll_metrics(&self) -> Result<ScrollSignal> {
            let offset = *self.offset.lock().unwrap();
            Ok(ScrollSignal {
                height: offset + 10_000.0,
                offset,
            })
        }

        async fn scroll_by(&self, _delta_x: i64, delta_y: i64) -> Result<()> {
            *self.offset.lock().unwrap() += delta_y as f64;
            Ok(())
        }

        async fn pause(&self, _duration: Duration) {
            tokio::task::yield_now().await;
        }
    }

    struct FailingSurface;

    #[async_trait]
    impl ScrollSurface for FailingSurface {
        async fn scroll_metrics(&self) -> Result<ScrollSignal> {
            Err(anyhow::anyhow!("session closed"))
        }

        async fn scroll_by(&self, _delta_x: i64, _delta_y: i64) -> Result<()> {
            Ok(())
        }

        async fn pause(&self, _duration: Duration) {}
    }

    fn walk() -> DiscoveryWalk {
        DiscoveryWalk {
            timeout: None,
            ..DiscoveryWalk::default()
        }
    }

    #[tokio::test]
    async fn stops_when_offset_reaches_height() {
        // converges to the bottom after k = 3 reads
        let surface = ScriptedSurface::new(3000.0, vec![800.0, 1700.0, 3000.0]);
        let mut sampler = RngSampler::seeded(3);
        let report = walk()
            .run(&surface, &mut sampler, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.stop, WalkStop::ReachedBottom);
        assert!(report.steps <= 4);
        assert_eq!(surface.reads(), 3);
    }

    #[tokio::test]
    async fn stops_when_offset_stalls() {
        let surface = ScriptedSurface::new(5000.0, vec![600.0, 1200.0, 1200.0, 1800.0]);
        let mut sampler = RngSampler::seeded(3);
        let report = walk()
            .run(&surface, &mut sampler, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.stop, WalkStop::Stalled);
        assert_eq!(report.steps, 3);
        assert_eq!(report.last_signal.map(|s| s.offset), Some(1200.0));
    }

    #[tokio::test]
    async fn unmoved_first_read_counts_as_stalled() {
        // a page too short to scroll reports offset 0 on the first read
        let surface = ScriptedSurface::new(5000.0, vec![0.0]);
        let mut sampler = RngSampler::seeded(3);
        let report = walk()
            .run(&surface, &mut sampler, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.stop, WalkStop::Stalled);
        assert_eq!(report.steps, 1);
    }

    #[tokio::test]
    async fn scroll_deltas_respect_configured_range() {
        let surface = ScriptedSurface::new(
            100_000.0,
            (1..=50).map(|k| f64::from(k) * 500.0).collect(),
        );
        let mut sampler = RngSampler::seeded(11);
        let _ = walk()
            .run(&surface, &mut sampler, &CancellationToken::new())
            .await
            .unwrap();

        let scrolls = surface.scrolls.lock().unwrap();
        assert!(!scrolls.is_empty());
        assert!(scrolls.iter().all(|d| (300..=900).contains(d)));
    }

    #[tokio::test]
    async fn step_limit_bounds_endless_page() {
        let surface = EndlessSurface {
            offset: Mutex::new(0.0),
        };
        let walk = DiscoveryWalk {
            max_steps: Some(25),
            ..walk()
        };
        let mut sampler = RngSampler::seeded(5);
        let report = walk
            .run(&surface, &mut sampler, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.stop, WalkStop::StepLimit);
        assert_eq!(report.steps, 25);
    }

    #[tokio::test]
    async fn timeout_bounds_endless_page() {
        let surface = EndlessSurface {
            offset: Mutex::new(0.0),
        };
        let walk = DiscoveryWalk {
            timeout: Some(Duration::from_millis(20)),
            ..DiscoveryWalk::default()
        };
        let mut sampler = RngSampler::seeded(5);
        let report = walk
            .run(&surface, &mut sampler, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.stop, WalkStop::TimedOut);
    }

    #[tokio::test]
    async fn cancelled_token_ends_walk_immediately() {
        let surface = EndlessSurface {
            offset: Mutex::new(0.0),
        };
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut sampler = RngSampler::seeded(5);
        let report = walk().run(&surface, &mut sampler, &cancel).await.unwrap();

        assert_eq!(report.stop, WalkStop::Cancelled);
        assert_eq!(report.steps, 0);
    }

    #[tokio::test]
    async fn surface_errors_propagate() {
        let mut sampler = RngSampler::seeded(5);
        let err = walk()
            .run(&FailingSurface, &mut sampler, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(err.to_string().contains("session closed"));
    }

    #[tokio::test]
    async fn discover_page_walks_to_the_bottom() {
        let surface = ScriptedSurface::new(2400.0, vec![700.0, 1500.0, 2400.0]);
        let walk = DiscoveryWalk {
            max_steps: Some(10),
            timeout: Some(Duration::from_secs(5)),
            ..DiscoveryWalk::default()
        };
        let report = discover_page(&surface, &walk).await.unwrap();

        assert_eq!(report.stop, WalkStop::ReachedBottom);
        assert_eq!(report.steps, 3);
        assert_eq!(report.last_signal.map(|s| s.offset), Some(2400.0));
        assert_eq!(surface.scrolls.lock().unwrap().len(), 3);
    }
}
