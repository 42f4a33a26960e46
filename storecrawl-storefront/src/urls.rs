//! Shape checks for storefront links.
use regex::Regex;
use std::sync::LazyLock;

static COMPANY_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^https://apps\.apple\.com/(?:\w{2}/)?developer/([\w\-%]+)/id\d+(?:\?(?:[\w\-]+=[\w\-]+&?)*)?$",
    )
    .expect("company url pattern")
});

static APP_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^https://apps\.apple\.com/(?:\w{2}/)?app/[\w\-%]+/id\d+(?:\?(?:[\w\-]+=[\w\-]+&?)*)?$",
    )
    .expect("app url pattern")
});

/// `https://apps.apple.com/[cc/]app/<slug>/id<digits>[?query]`
pub fn is_app_url(url: &str) -> bool {
    APP_URL_RE.is_match(url)
}

/// `https://apps.apple.com/[cc/]developer/<slug>/id<digits>[?query]`
pub fn is_company_url(url: &str) -> bool {
    COMPANY_URL_RE.is_match(url)
}

/// Developer slug of a company URL, e.g. `netflix-inc`.
pub fn developer_name_from_company_url(url: &str) -> Option<String> {
    COMPANY_URL_RE
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SONY_APP: &str = "https://apps.apple.com/vn/app/sony-b%E1%BA%A3o-h%C3%A0nh-%C4%91i%E1%BB%87n-t%E1%BB%AD/id1193542964";

    #[test]
    fn app_urls() {
        assert!(is_app_url("https://apps.apple.com/app/netflix/id363590051"));
        assert!(is_app_url(SONY_APP));
        assert!(is_app_url("https://apps.apple.com/us/app/netflix/id363590051?platform=iphone"));
        assert!(!is_app_url(
            "https://apps.apple.com/vn/developer/sony-corporation/id1315534741"
        ));
        assert!(!is_app_url(
            "https://apps.apple.com/us/developer/netflix-inc/id363590054"
        ));
    }

    #[test]
    fn company_urls() {
        assert!(is_company_url(
            "https://apps.apple.com/vn/developer/sony-corporation/id1315534741"
        ));
        assert!(is_company_url(
            "https://apps.apple.com/us/developer/netflix-inc/id363590054?mt=1"
        ));
        assert!(!is_company_url("https://apps.apple.com/app/netflix/id363590051"));
        assert!(!is_company_url(SONY_APP));
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert!(is_app_url("HTTPS://APPS.APPLE.COM/US/APP/NETFLIX/ID363590051"));
    }

    #[test]
    fn rejects_other_hosts_and_trailing_junk() {
        assert!(!is_app_url("https://appsxapple.com/app/netflix/id363590051"));
        assert!(!is_app_url("https://apps.apple.com/app/netflix/id363590051/extra"));
    }

    #[test]
    fn developer_names() {
        assert_eq!(
            developer_name_from_company_url(
                "https://apps.apple.com/vn/developer/sony-corporation/id1315534741"
            )
            .as_deref(),
            Some("sony-corporation")
        );
        assert_eq!(
            developer_name_from_company_url(
                "https://apps.apple.com/us/developer/netflix-inc/id363590054?xyz=3"
            )
            .as_deref(),
            Some("netflix-inc")
        );
        assert_eq!(
            developer_name_from_company_url("https://apps.apple.com/app/netflix/id363590051"),
            None
        );
    }
}
