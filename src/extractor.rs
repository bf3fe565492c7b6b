use crate::SiteData;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

/// Metadata extractor, responsible for turning raw page HTML into [`SiteData`].
///
/// Extraction never fails: tags that are missing or empty leave the field unset.
#[derive(Clone, Default)]
pub struct MetadataExtractor;

impl MetadataExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, url: &str, html: &str) -> SiteData {
        let document = Html::parse_document(html);
        let base = Url::parse(url).ok();

        let title = self
            .meta_tag(&document, "title")
            .or_else(|| self.title_element(&document));

        let site_data = SiteData {
            url: url.to_string(),
            title,
            description: self.meta_tag(&document, "description"),
            image: self
                .meta_tag(&document, "image")
                .map(|image| absolutize(base.as_ref(), image)),
            favicon: self
                .favicon(&document)
                .map(|favicon| absolutize(base.as_ref(), favicon)),
            author: self.meta_tag(&document, "author"),
            site_name: self.meta_tag(&document, "site_name"),
            largest_image: None,
        };

        debug!(
            url = %url,
            title = ?site_data.title,
            image = ?site_data.image,
            "Extracted page metadata"
        );
        site_data
    }

    /// Resolves a metadata field, first match wins:
    /// `meta[name=field]`, `meta[name="og:field"]`, `meta[property="og:field"]`,
    /// `meta[name="twitter:field"]`.
    fn meta_tag(&self, document: &Html, field: &str) -> Option<String> {
        let candidates = [
            format!(r#"meta[name="{field}"]"#),
            format!(r#"meta[name="og:{field}"]"#),
            format!(r#"meta[property="og:{field}"]"#),
            format!(r#"meta[name="twitter:{field}"]"#),
        ];

        candidates
            .iter()
            .find_map(|selector| first_attr(document, selector, "content"))
    }

    fn title_element(&self, document: &Html) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>())
            .and_then(non_empty)
    }

    fn favicon(&self, document: &Html) -> Option<String> {
        first_attr(document, r#"link[rel="shortcut icon"]"#, "href")
    }
}

fn first_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .and_then(|value| non_empty(value.to_string()))
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

// Relative asset paths are joined onto the page URL so they can be fetched later.
fn absolutize(base: Option<&Url>, href: String) -> String {
    if href.starts_with("http://") || href.starts_with("https://") || href.starts_with("data:") {
        return href;
    }
    base.and_then(|base| base.join(&href).ok())
        .map(|joined| joined.to_string())
        .unwrap_or(href)
}
