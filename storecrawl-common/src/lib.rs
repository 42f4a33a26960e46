//! Common types and utilities shared across storecrawl crates.
//!
//! This crate defines the small value types that the configuration loader,
//! the crawl core and the browser layer all agree on, plus observability
//! helpers and the shared error type. It stays dependency-light so that
//! every crate can depend on it.
//!
//! # Overview
//!
//! - [`JitterRange`]: bounds for randomized delays and scroll amounts
//! - [`ModifierKey`] / [`ModifierKeySetting`]: the key held while opening
//!   links in a new tab, resolved once at startup
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`StorecrawlError`] and [`Result`]: shared error handling
//!
//! # Examples
//!
//! ```rust
//! use storecrawl_common::JitterRange;
//!
//! let range = JitterRange::stepped(70, 500, 7);
//! assert!(range.validate().is_ok());
//! assert_eq!(range.value_at(0), 70);
//! assert_eq!(range.value_at(6), 500);
//! ```
use serde::{Deserialize, Serialize};

pub mod observability;

/// Inclusive bounds for a randomized quantity (milliseconds or pixels).
///
/// With `resolution = None` any integer in `[min, max]` may be drawn. With
/// `Some(n)` only `n` evenly spaced values are possible, the first being
/// `min` and the last `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JitterRange {
    pub min: u64,
    pub max: u64,
    #[serde(default)]
    pub resolution: Option<u32>,
}

impl JitterRange {
    pub const fn uniform(min: u64, max: u64) -> Self {
        Self {
            min,
            max,
            resolution: None,
        }
    }

    pub const fn stepped(min: u64, max: u64, resolution: u32) -> Self {
        Self {
            min,
            max,
            resolution: Some(resolution),
        }
    }

    /// Reject inverted bounds and resolutions that cannot hit both ends.
    pub fn validate(&self) -> Result<()> {
        if self.min > self.max {
            return Err(StorecrawlError::Config(format!(
                "jitter range min {} exceeds max {}",
                self.min, self.max
            )));
        }
        if let Some(steps) = self.resolution {
            if steps < 2 {
                return Err(StorecrawlError::Config(format!(
                    "jitter resolution must be at least 2, got {steps}"
                )));
            }
        }
        Ok(())
    }

    /// `(min, max)` with inverted bounds swapped.
    pub fn bounds(&self) -> (u64, u64) {
        if self.min <= self.max {
            (self.min, self.max)
        } else {
            (self.max, self.min)
        }
    }

    /// Value of the `step`-th grid point for a stepped range.
    ///
    /// For uniform ranges `step` is taken as an offset from the lower bound.
    /// Results are clamped to the upper bound.
    pub fn value_at(&self, step: u32) -> u64 {
        let (low, high) = self.bounds();
        match self.resolution {
            Some(steps) if steps >= 2 => {
                let delta = (high - low) as f64 / f64::from(steps - 1);
                let value = low as f64 + f64::from(step) * delta;
                (value.round() as u64).min(high)
            }
            _ => low.saturating_add(u64::from(step)).min(high),
        }
    }
}

/// Key held down while clicking a link so that it opens in a new tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModifierKey {
    Control,
    Meta,
}

/// Configured preference for [`ModifierKey`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModifierKeySetting {
    #[default]
    Auto,
    Control,
    Meta,
}

impl ModifierKeySetting {
    /// Resolve against the host platform. Call once during startup.
    pub fn resolve(self) -> ModifierKey {
        self.resolve_for(std::env::consts::OS)
    }

    pub fn resolve_for(self, os: &str) -> ModifierKey {
        match self {
            Self::Control => ModifierKey::Control,
            Self::Meta => ModifierKey::Meta,
            Self::Auto if os.eq_ignore_ascii_case("macos") => ModifierKey::Meta,
            Self::Auto => ModifierKey::Control,
        }
    }
}

/// Error types used across the storecrawl workspace.
#[derive(thiserror::Error, Debug)]
pub enum StorecrawlError {
    /// The browser or WebDriver session reported an error.
    #[error("Driver error: {0}")]
    Driver(#[from] anyhow::Error),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A URL or page did not have the expected shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An expected page element never appeared.
    #[error("Element not found: {0}")]
    NotFound(String),

    /// Operation exceeded the configured timeout.
    #[error("Timeout occurred: {0}")]
    Timeout(String),

    /// The crawl was cancelled before finishing.
    #[error("Cancelled")]
    Cancelled,
}

/// Convenient alias for results that use [`StorecrawlError`].
pub type Result<T> = std::result::Result<T, StorecrawlError>;
