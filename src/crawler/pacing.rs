//! Waiting: pacing between pages and settling after navigation
//!
//! All waits go through a `Sleeper` so tests can run crawls without touching
//! the wall clock.

use crate::config::{CrawlerConfig, FetcherConfig};
use crate::crawler::fetcher::{FetchError, PageFetcher};
use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;

/// Something that can wait
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Waits on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

/// Randomized delay between page dispatches
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    min_ms: u64,
    max_ms: u64,
}

impl Pacer {
    /// Creates a pacer drawing delays uniformly from `[min, max]`
    ///
    /// Bounds given in the wrong order are swapped. Bounds too large to count
    /// in milliseconds saturate.
    pub fn new(min: Duration, max: Duration) -> Self {
        let (a, b) = (whole_millis(min), whole_millis(max));
        Self {
            min_ms: a.min(b),
            max_ms: a.max(b),
        }
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            Duration::from_millis(config.min_delay_ms),
            Duration::from_millis(config.max_delay_ms),
        )
    }

    /// A pacer that never waits
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    /// Draws the next delay
    pub fn next_delay(&self) -> Duration {
        if self.min_ms == self.max_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rand::thread_rng().gen_range(self.min_ms..=self.max_ms))
    }
}

fn whole_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// How long to wait for a page to finish rendering before capturing it
///
/// After `dwell`, the markup is polled every `poll_interval` until two
/// consecutive captures match or `max_polls` polls have been made. With
/// `max_polls == 0` only the dwell applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlePolicy {
    pub dwell: Duration,
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl SettlePolicy {
    /// Fixed dwell, no polling
    pub fn fixed(dwell: Duration) -> Self {
        Self {
            dwell,
            poll_interval: Duration::ZERO,
            max_polls: 0,
        }
    }

    /// Capture immediately
    pub fn immediate() -> Self {
        Self::fixed(Duration::ZERO)
    }

    pub fn from_config(config: &FetcherConfig) -> Self {
        Self {
            dwell: Duration::from_millis(config.settle_dwell_ms),
            poll_interval: Duration::from_millis(config.settle_poll_ms),
            max_polls: config.settle_max_polls,
        }
    }
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self::from_config(&FetcherConfig::default())
    }
}

/// Waits for the loaded page to settle and returns its markup
pub async fn settle<F>(
    fetcher: &mut F,
    policy: &SettlePolicy,
    sleeper: &dyn Sleeper,
) -> Result<String, FetchError>
where
    F: PageFetcher + ?Sized,
{
    sleeper.sleep(policy.dwell).await;
    let mut last = fetcher.current_markup().await?;

    for _ in 0..policy.max_polls {
        sleeper.sleep(policy.poll_interval).await;
        let next = fetcher.current_markup().await?;
        if next == last {
            return Ok(next);
        }
        last = next;
    }

    Ok(last)
}
