//! Text cleanup for scraped strings.
use scraper::{ElementRef, Selector};
use unicode_normalization::UnicodeNormalization;

/// Compatibility decomposition (NFKD); turns non-breaking spaces into spaces.
pub fn normalize_text(text: &str) -> String {
    text.nfkd().collect()
}

/// Trim surrounding whitespace, then normalize.
pub fn clean_text(text: &str) -> String {
    normalize_text(text.trim())
}

/// Cleaned text of `element`, or of its first descendant matching
/// `selector`. Empty when the selector matches nothing.
pub fn element_text(element: ElementRef<'_>, selector: Option<&Selector>) -> String {
    let target = match selector {
        Some(selector) => element.select(selector).next(),
        None => Some(element),
    };
    target
        .map(|el| clean_text(&el.text().collect::<String>()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn normalize_replaces_nbsp() {
        assert_eq!(normalize_text("This is a space:\u{a0}"), "This is a space: ");
    }

    #[test]
    fn clean_trims_then_normalizes() {
        assert_eq!(clean_text("\n A text\u{a0}to test \n"), "A text to test");
    }

    #[test]
    fn normalize_decomposes_accents() {
        assert_eq!(normalize_text("\u{1ea3}"), "a\u{309}");
    }

    #[test]
    fn element_text_without_selector() {
        let doc = Html::parse_fragment("<div>contained\u{a0}text\n</div>");
        let div = doc.select(&Selector::parse("div").unwrap()).next().unwrap();
        assert_eq!(element_text(div, None), "contained text");
    }

    #[test]
    fn element_text_with_selector() {
        let doc = Html::parse_fragment(
            "<div>parent text 1 <p> text of interest\n </p> parent text 2<br/></div>",
        );
        let div = doc.select(&Selector::parse("div").unwrap()).next().unwrap();
        let p = Selector::parse("p").unwrap();
        assert_eq!(element_text(div, Some(&p)), "text of interest");

        let missing = Selector::parse("span").unwrap();
        assert_eq!(element_text(div, Some(&missing)), "");
    }
}
