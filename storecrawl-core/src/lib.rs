//! Site-independent crawl logic.
//!
//! - [`discovery`]: the scroll-until-stable walk over a [`discovery::ScrollSurface`]
//! - [`matcher`]: longest-common-substring similarity and best-match selection
//! - [`jitter`]: injectable random sampling for delays and scroll amounts
pub mod discovery;
pub mod jitter;
pub mod matcher;

pub use discovery::{
    discover_page, DiscoveryWalk, ScrollSignal, ScrollSurface, WalkReport, WalkStop,
};
pub use jitter::{RangeSampler, RngSampler, SharedSampler};
pub use matcher::{
    best_match, best_match_scored, longest_common_substring, similarity_score, MatchResult,
};
