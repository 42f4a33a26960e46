//! Extraction of [`AppInfo`] from a rendered app page.
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

use crate::model::AppInfo;
use crate::text::{clean_text, element_text};

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector")
}

static OG_URL: LazyLock<Selector> = LazyLock::new(|| selector(r#"meta[property="og:url"]"#));
static CONTENT_ID: LazyLock<Selector> =
    LazyLock::new(|| selector(r#"meta[name="apple:content_id"]"#));
static TITLE: LazyLock<Selector> =
    LazyLock::new(|| selector("h1.product-header__title.app-header__title"));
static TERM: LazyLock<Selector> = LazyLock::new(|| selector("dt"));

const COMPATIBILITY_LABEL: &str = "Compatibility";
const LANGUAGES_LABEL: &str = "Languages";

pub struct AppInfoParser {
    document: Html,
}

impl AppInfoParser {
    pub fn new(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
        }
    }

    /// Canonical page URL from the Open Graph tag.
    pub fn parse_url(&self) -> String {
        self.meta_content(&OG_URL)
    }

    /// Numeric store identifier, without the `id` prefix.
    pub fn parse_id(&self) -> String {
        self.meta_content(&CONTENT_ID)
    }

    /// App title; badges rendered on following lines are dropped.
    pub fn parse_name(&self) -> String {
        self.document
            .select(&TITLE)
            .next()
            .map(|title| element_text(title, None))
            .and_then(|text| text.split('\n').next().map(str::to_string))
            .unwrap_or_default()
    }

    /// Device names listed under "Compatibility".
    pub fn parse_compatibilities(&self) -> Vec<String> {
        self.definitions(COMPATIBILITY_LABEL)
            .flat_map(child_elements_named("dl"))
            .flat_map(child_elements_named("dt"))
            .map(|dt| element_text(dt, None))
            .collect()
    }

    /// Languages listed under "Languages"; empty when the section is missing.
    pub fn parse_languages(&self) -> Vec<String> {
        let Some(definition) = self.definitions(LANGUAGES_LABEL).next() else {
            return Vec::new();
        };
        let full = element_text(definition, None);
        if full.is_empty() {
            return Vec::new();
        }
        full.split(',').map(clean_text).collect()
    }

    pub fn parse(&self) -> AppInfo {
        AppInfo {
            app_name: self.parse_name(),
            app_id: format!("id{}", self.parse_id()),
            app_url: self.parse_url(),
            app_targets: self.parse_compatibilities(),
            app_languages: self.parse_languages(),
        }
    }

    fn meta_content(&self, selector: &Selector) -> String {
        self.document
            .select(selector)
            .next()
            .and_then(|meta| meta.value().attr("content"))
            .map(str::to_string)
            .unwrap_or_default()
    }

    /// `dd` elements directly following a `dt` whose text contains `label`.
    fn definitions<'a>(&'a self, label: &'a str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
        self.document
            .select(&TERM)
            .filter(move |dt| dt.text().collect::<String>().contains(label))
            .filter_map(|dt| dt.next_siblings().find_map(ElementRef::wrap))
            .filter(|sibling| sibling.value().name() == "dd")
    }
}

fn child_elements_named<'a>(
    name: &'static str,
) -> impl Fn(ElementRef<'a>) -> Vec<ElementRef<'a>> {
    move |parent| {
        parent
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|child| child.value().name() == name)
            .collect()
    }
}
