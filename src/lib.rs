//! Link preview resolution: page metadata with a headless browser fallback,
//! image search enrichment and a validated top image.

mod amazon;
mod config;
mod enrichment;
mod error;
mod extractor;
mod fetcher;
mod image_search;
#[cfg(feature = "logging")]
mod logging;
mod policy;
mod renderer;
mod request;
mod resolver;
mod site_scraper;
mod top_image;
mod utils;

#[cfg(feature = "browser")]
mod browser_renderer;
#[cfg(feature = "browser")]
mod mcp_client;
#[cfg(feature = "server")]
pub mod server;

pub use amazon::{amazon_asin, AmazonData};
pub use config::ServiceConfig;
pub use enrichment::{
    build_page_query, merge_image_results, Enrichment, SearchEnrichment, DOMAIN_INSERT_INDICES,
};
pub use error::{ErrorReport, PreviewError};
pub use extractor::MetadataExtractor;
pub use fetcher::{FetchResponse, Fetcher, FetcherConfig, PageFetcher, DEFAULT_USER_AGENT};
pub use image_search::{BingImageSearch, ImageSearchProvider, BING_IMAGE_SEARCH_ENDPOINT};
#[cfg(feature = "logging")]
pub use logging::{log_error_card, log_preview_card, setup_logging, LogConfig, LogLevelGuard};
pub use policy::{ExceptionPolicy, ExtraData, PolicyOutcome, PolicyRule, SiteMatcher};
pub use renderer::{RenderWaitPolicy, RenderedPage, Renderer};
pub use request::{parse_bool_flag, validate_web_url, PreviewQuery, PreviewRequest};
pub use resolver::{PreviewResolver, PreviewResult, ResolvedPreview, ResolverOptions};
pub use site_scraper::{ScrapeOptions, ScrapeOutcome, SiteScraper};
pub use top_image::{HttpImageValidator, ImageValidator, TopImageSelector};
pub use utils::{registrable_domain, registrable_label};

#[cfg(feature = "browser")]
pub use browser_renderer::BrowserRenderer;
#[cfg(feature = "browser")]
pub use mcp_client::{McpClient, McpConfig, DEFAULT_BLOCKED_ORIGINS};

/// Metadata scraped from a single page. Every field but `url` is optional;
/// a missing field means the page did not provide it.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteData {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favicon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub largest_image: Option<String>,
}

impl SiteData {
    /// Title with at least one non-whitespace character.
    pub fn searchable_title(&self) -> Option<&str> {
        self.title
            .as_deref()
            .filter(|title| title.chars().any(|c| !c.is_whitespace()))
    }
}

pub fn is_twitter_url(url: &str) -> bool {
    url.starts_with("https://twitter.")
        || url.starts_with("http://twitter.")
        || url.starts_with("https://www.twitter.")
        || url.starts_with("http://www.twitter.")
        || url.starts_with("https://x.com/")
        || url.starts_with("http://x.com/")
        || url.starts_with("https://www.x.com/")
        || url.starts_with("http://www.x.com/")
}
