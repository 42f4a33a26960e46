//! Browser-driven crawl of the storefront: search a company, resolve its
//! developer page, list its apps and extract each app's metadata.
use fantoccini::key::Key;
use std::collections::HashSet;
use std::time::Duration;
use storecrawl_common::{JitterRange, Result, StorecrawlError};
use storecrawl_core::discovery::{DiscoveryWalk, ScrollSurface, WalkReport, WalkStop};
use storecrawl_core::matcher::best_match_scored;
use storecrawl_drivers::browser::driver::StoreDriver;
use storecrawl_drivers::browser::page::{StoreElement, StorePage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::model::{AppInfo, CompanyDirectory};
use crate::parser::AppInfoParser;
use crate::urls::{developer_name_from_company_url, is_app_url, is_company_url};

const REGION_CONTINUE: &str = "#ac-ls-continue";
const SEARCH_BUTTON: &str = "#globalnav-menubutton-link-search";
const SEARCH_BOX: &str = r#"input[placeholder="Search apple.com"]"#;
const SEARCH_RESULTS: &str = "#exploreCurated";
const RESULT_LINKS: &str =
    r#"li a.rf-serp-productname-link, [role="listitem"] a.rf-serp-productname-link"#;
const NEXT_BUTTON: &str = "#explore nav.rc-pagination div.rc-pagination-arrow > button";
const DEVELOPER_LINK: &str = "h2.product-header__identity.app-header__identity a";
const DEVICE_SECTIONS: &str = "section.section.section--bordered";
const SEE_ALL_LINK: &str = "div.section__nav > a";
const FEED_LINKS: &str = r#"div.l-row[role="feed"] > a"#;
const PEEK_LINKS: &str = "div.l-row.l-row--peek > a";
const APP_PAGE_READY: &str = "#ember3";
const INFO_LIST: &str = ".information-list.information-list--app";
const MORE_BUTTON: &str = "dd button";

const SEARCH_OPEN_ATTEMPTS: u32 = 5;

/// Site-level knobs for [`StorefrontCrawler`].
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Storefront home page.
    pub base_url: String,
    pub walk: DiscoveryWalk,
    /// How long to wait for the regional redirect prompt before moving on.
    pub region_prompt_timeout: Duration,
    /// Scroll applied on the home page before opening search.
    pub search_nudge: JitterRange,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            base_url: "https://apps.apple.com".to_string(),
            walk: DiscoveryWalk::default(),
            region_prompt_timeout: Duration::from_secs(5),
            search_nudge: JitterRange::uniform(100, 500),
        }
    }
}

pub struct StorefrontCrawler {
    driver: StoreDriver,
    settings: CrawlSettings,
    cancel: CancellationToken,
}

impl StorefrontCrawler {
    pub fn new(driver: StoreDriver, settings: CrawlSettings, cancel: CancellationToken) -> Self {
        Self {
            driver,
            settings,
            cancel,
        }
    }

    /// Give the driver back, e.g. to close the session.
    pub fn into_driver(self) -> StoreDriver {
        self.driver
    }

    /// Search the storefront for `company_name` and map every developer
    /// behind the app results to its developer page URL.
    pub async fn collect_company_urls(&self, company_name: &str) -> Result<CompanyDirectory> {
        let home = self.driver.current_tab().await?;
        self.driver.new_tab().await?;
        let result = self.search_companies(company_name).await;
        self.driver.close_tab(&home).await?;
        result
    }

    /// App URLs listed on a developer page, across all device sections.
    pub async fn collect_app_urls(&self, company_url: &str) -> Result<Vec<String>> {
        if !is_company_url(company_url) {
            return Err(StorecrawlError::Parse(format!(
                "not a developer page url: {company_url}"
            )));
        }
        let home = self.driver.current_tab().await?;
        self.driver.new_tab().await?;
        let result = self.list_company_apps(company_url).await;
        self.driver.close_tab(&home).await?;
        result
    }

    /// Load an app page in the focused tab, reveal lazy content and return
    /// the rendered HTML.
    pub async fn collect_app_html(&self, app_url: &str) -> Result<String> {
        if !is_app_url(app_url) {
            return Err(StorecrawlError::Parse(format!("not an app url: {app_url}")));
        }
        self.ensure_active()?;

        let page = self.driver.goto(app_url).await?;
        page.wait_for_visible(APP_PAGE_READY).await?;
        self.walk(&page).await?;

        let info_list = page.wait_for_element(INFO_LIST).await?;
        info_list.scroll_into_view().await?;
        self.expand_languages(&info_list).await?;

        Ok(page.get_content().await?)
    }

    pub async fn crawl_app_info(&self, app_url: &str) -> Result<AppInfo> {
        let html = self.collect_app_html(app_url).await?;
        Ok(AppInfoParser::new(&html).parse())
    }

    /// Full crawl: find the developer best matching `company_name` and
    /// extract every app it lists. Empty when no developer is found.
    pub async fn crawl_company_apps(&self, company_name: &str) -> Result<Vec<AppInfo>> {
        let company_name = company_name.to_lowercase();

        let companies = self.collect_company_urls(&company_name).await?;
        if companies.is_empty() {
            info!(target: "crawl.progress", company = %company_name, "no company found");
            return Ok(Vec::new());
        }
        info!(
            target: "crawl.progress",
            companies = %to_pretty_json(&companies),
            "found companies"
        );

        let Some(best) = best_match_scored(&company_name, companies.names()) else {
            warn!(
                target: "crawl.progress",
                company = %company_name,
                "no developer name shares any text with the query"
            );
            return Ok(Vec::new());
        };
        let company_url = companies
            .get(best.candidate)
            .ok_or_else(|| StorecrawlError::NotFound(best.candidate.to_string()))?
            .to_string();
        info!(
            target: "crawl.progress",
            name = best.candidate,
            score = best.score,
            url = %company_url,
            "best match"
        );

        let app_urls = self.collect_app_urls(&company_url).await?;
        info!(
            target: "crawl.progress",
            app_urls = %to_pretty_json(&app_urls),
            "app urls to be crawled"
        );

        let mut apps = Vec::with_capacity(app_urls.len());
        for app_url in &app_urls {
            self.ensure_active()?;
            let app = self.crawl_app_info(app_url).await?;
            info!(
                target: "crawl.progress",
                url = %app_url,
                app = %to_pretty_json(&app),
                "crawled app"
            );
            apps.push(app);
        }
        Ok(apps)
    }

    /// Fail with [`StorecrawlError::Cancelled`] once the crawl was cancelled.
    pub fn ensure_active(&self) -> Result<()> {
        check_cancelled(&self.cancel)
    }

    async fn search_companies(&self, company_name: &str) -> Result<CompanyDirectory> {
        let page = self.driver.goto(&self.settings.base_url).await?;
        self.accept_region_prompt(&page).await;

        let nudge = page.behavioral_engine().sample(&self.settings.search_nudge);
        page.scroll_by(0, nudge as i64).await?;

        let search_box = self.open_search_box(&page).await?;
        search_box.click().await?;
        search_box.type_str(company_name).await?;
        search_box.press(Key::Enter).await?;

        let mut directory = CompanyDirectory::default();
        let mut visited = HashSet::new();
        let mut result_page = 1u32;
        loop {
            self.ensure_active()?;
            page.wait_until_ready().await?;
            page.behavioral_engine().settle().await;
            self.walk(&page).await?;

            let Some(results) = page.first_element(SEARCH_RESULTS).await? else {
                debug!(target: "crawl.search", result_page, "no result list");
                break;
            };

            let mut fresh = 0usize;
            for link in results.find_elements(RESULT_LINKS).await? {
                let Some(href) = link.get_attribute("href").await? else {
                    continue;
                };
                if !visited.insert(href.clone()) {
                    continue;
                }
                fresh += 1;
                if !is_app_url(&href) {
                    continue;
                }
                self.ensure_active()?;
                if let Some((name, url)) = self.read_developer(&link).await? {
                    debug!(target: "crawl.search", %name, %url, "developer found");
                    directory.insert(name, url);
                }
            }

            if fresh == 0 {
                debug!(target: "crawl.search", result_page, "no new results");
                break;
            }
            if !self.next_result_page(&page).await? {
                break;
            }
            result_page += 1;
        }

        info!(
            target: "crawl.search",
            pages = result_page,
            developers = directory.len(),
            "search finished"
        );
        Ok(directory)
    }

    /// Click through the regional redirect prompt when one shows up.
    async fn accept_region_prompt(&self, page: &StorePage) {
        let prompt = tokio::time::timeout(
            self.settings.region_prompt_timeout,
            page.wait_for_visible(REGION_CONTINUE),
        )
        .await;
        match prompt {
            Ok(Ok(button)) => {
                if let Err(e) = button.click().await {
                    warn!(target: "crawl.search", error = %e, "regional prompt click failed");
                }
            }
            Ok(Err(e)) => debug!(target: "crawl.search", error = %e, "no regional prompt"),
            Err(_) => debug!(target: "crawl.search", "no regional prompt"),
        }
    }

    async fn open_search_box(&self, page: &StorePage) -> Result<StoreElement> {
        let search_button = page.wait_for_element(SEARCH_BUTTON).await?;
        search_button.scroll_into_view().await?;

        for _ in 0..SEARCH_OPEN_ATTEMPTS {
            if let Some(search_box) = page.first_element(SEARCH_BOX).await? {
                if search_box.is_displayed().await? {
                    return Ok(search_box);
                }
            }
            search_button.click().await?;
            page.behavioral_engine().settle().await;
        }
        Err(StorecrawlError::NotFound(SEARCH_BOX.to_string()))
    }

    /// Open an app result in a new tab and read its developer link.
    async fn read_developer(&self, link: &StoreElement) -> Result<Option<(String, String)>> {
        let back = self.driver.current_tab().await?;
        self.driver.open_in_new_tab(link).await?;
        let href = self.developer_href().await;
        self.driver.close_tab(&back).await?;

        let Some(url) = href? else {
            warn!(target: "crawl.search", "app page without developer link");
            return Ok(None);
        };
        match developer_name_from_company_url(&url) {
            Some(name) => Ok(Some((name, url))),
            None => {
                warn!(target: "crawl.search", %url, "unexpected developer url");
                Ok(None)
            }
        }
    }

    async fn developer_href(&self) -> Result<Option<String>> {
        let page = self.driver.page();
        page.wait_until_ready().await?;
        let developer = page.wait_for_element(DEVELOPER_LINK).await?;
        Ok(developer.get_attribute("href").await?)
    }

    /// Advance to the next result page. `false` when there is none.
    async fn next_result_page(&self, page: &StorePage) -> Result<bool> {
        let Some(next) = page
            .find_elements_with_text(NEXT_BUTTON, "Next")
            .await?
            .into_iter()
            .next()
        else {
            return Ok(false);
        };
        if next.get_attribute("disabled").await?.is_some() {
            return Ok(false);
        }
        next.scroll_into_view().await?;
        next.click().await?;
        Ok(true)
    }

    async fn list_company_apps(&self, company_url: &str) -> Result<Vec<String>> {
        let page = self.driver.goto(company_url).await?;
        self.walk(&page).await?;

        let mut seen = HashSet::new();
        let mut app_urls = Vec::new();
        for section in page.find_elements(DEVICE_SECTIONS).await? {
            self.ensure_active()?;
            section.scroll_into_view().await?;

            let see_all = section
                .find_elements_with_text(SEE_ALL_LINK, "See All")
                .await?
                .into_iter()
                .next();
            let hrefs = match see_all {
                Some(link) => self.see_all_hrefs(&link).await?,
                None => hrefs_of(&section.find_elements(PEEK_LINKS).await?).await?,
            };
            app_urls.extend(keep_app_urls(hrefs, &mut seen));
        }

        info!(
            target: "crawl.company",
            url = %company_url,
            apps = app_urls.len(),
            "developer page listed"
        );
        Ok(app_urls)
    }

    async fn see_all_hrefs(&self, link: &StoreElement) -> Result<Vec<Option<String>>> {
        let back = self.driver.current_tab().await?;
        self.driver.open_in_new_tab(link).await?;
        let hrefs = self.feed_hrefs().await;
        self.driver.close_tab(&back).await?;
        hrefs
    }

    async fn feed_hrefs(&self) -> Result<Vec<Option<String>>> {
        let page = self.driver.page();
        page.wait_until_ready().await?;
        self.walk(&page).await?;
        hrefs_of(&page.find_elements(FEED_LINKS).await?).await
    }

    async fn expand_languages(&self, info_list: &StoreElement) -> Result<()> {
        let Some(languages) = info_list
            .find_elements_with_text("div", "Languages")
            .await?
            .into_iter()
            .next()
        else {
            return Ok(());
        };
        if let Some(more) = languages
            .find_elements_with_text(MORE_BUTTON, "more")
            .await?
            .into_iter()
            .next()
        {
            more.click().await?;
            more.wait_hidden().await?;
        }
        Ok(())
    }

    async fn walk(&self, page: &StorePage) -> Result<WalkReport> {
        let report = page.discover(&self.settings.walk, &self.cancel).await?;
        match report.stop {
            WalkStop::Cancelled => Err(StorecrawlError::Cancelled),
            WalkStop::TimedOut | WalkStop::StepLimit => {
                warn!(target: "crawl.progress", stop = ?report.stop, "page walk cut short");
                Ok(report)
            }
            WalkStop::ReachedBottom | WalkStop::Stalled => Ok(report),
        }
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(StorecrawlError::Cancelled)
    } else {
        Ok(())
    }
}

async fn hrefs_of(links: &[StoreElement]) -> Result<Vec<Option<String>>> {
    let mut hrefs = Vec::with_capacity(links.len());
    for link in links {
        hrefs.push(link.get_attribute("href").await?);
    }
    Ok(hrefs)
}

/// App URLs among `hrefs`, first occurrence only.
fn keep_app_urls(
    hrefs: impl IntoIterator<Item = Option<String>>,
    seen: &mut HashSet<String>,
) -> Vec<String> {
    hrefs
        .into_iter()
        .flatten()
        .filter(|href| is_app_url(href))
        .filter(|href| seen.insert(href.clone()))
        .collect()
}

fn to_pretty_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}
