use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

pub(crate) const AMAZON_URL_PREFIXES: &[&str] = &[
    "https://amazon.",
    "http://amazon.",
    "https://www.amazon.",
    "http://www.amazon.",
    "https://amzn.",
    "http://amzn.",
    "https://www.amzn.",
    "http://www.amzn.",
];

const SHORT_LINK_PREFIXES: &[&str] = &[
    "https://amzn.",
    "http://amzn.",
    "https://www.amzn.",
    "http://www.amzn.",
];

static PRODUCT_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:dp|o|gp|-|gp/product|/ASIN|gp/offer-listing|gp/product/images|gp/aw/d)/(B[0-9]{2}[0-9A-Z]{7}|[0-9]{9}(?:X|[0-9]))",
    )
    .expect("product path pattern is valid")
});

static ASIN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(B[0-9]{2}[0-9A-Z]{7}|[0-9]{9}(?:X|[0-9]))").expect("ASIN pattern is valid")
});

/// Vendor data attached to Amazon product links.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmazonData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asin: Option<String>,
}

impl AmazonData {
    pub fn from_url(url: &str) -> Self {
        Self {
            asin: amazon_asin(url),
        }
    }
}

/// Amazon Standard Identification Number of a product URL. Short links are
/// searched anywhere; full links only after a known product path segment.
pub fn amazon_asin(url: &str) -> Option<String> {
    let short_link = SHORT_LINK_PREFIXES
        .iter()
        .any(|prefix| url.starts_with(prefix));
    if !short_link && !PRODUCT_PATH.is_match(url) {
        return None;
    }
    ASIN.find(url).map(|m| m.as_str().to_string())
}
