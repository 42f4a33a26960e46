//! Driver layer for browser automation against the storefront.
//!
//! This crate wraps a `fantoccini` WebDriver session with the human-like
//! pacing the crawler relies on.
//!
//! - [`browser::driver::StoreDriver`]: WebDriver client wrapper and tab handling
//! - [`browser::page::StorePage`]: DOM helpers; also the scroll surface for
//!   the discovery walk
//! - [`browser::behavioral::BehavioralEngine`]: randomized delays and typing
//! - [`browser::launch`]: Chrome launch arguments
pub mod browser;
