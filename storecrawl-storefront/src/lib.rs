//! App Store storefront crawling.
//!
//! - [`crawler`]: the browser-driven search, developer and app page walk
//! - [`parser`]: extraction of [`model::AppInfo`] from rendered app pages
//! - [`urls`]: shape checks for app and developer links
//! - [`text`]: whitespace and Unicode cleanup of scraped text

pub mod crawler;
pub mod model;
pub mod parser;
pub mod text;
pub mod urls;

pub use crawler::{CrawlSettings, StorefrontCrawler};
pub use model::{AppInfo, CompanyDirectory};
pub use parser::AppInfoParser;
