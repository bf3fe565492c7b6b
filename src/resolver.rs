//! Top-level pipeline: request validation, site exceptions, scrape and
//! domain search side by side, page search, top image validation.

use crate::request::{validate_web_url, PreviewQuery};
use crate::{
    Enrichment, ErrorReport, ExceptionPolicy, ExtraData, PreviewError, PreviewRequest,
    ScrapeOptions, SearchEnrichment, SiteData, SiteScraper, TopImageSelector,
};
use futures::future::OptionFuture;
use serde::Serialize;
use tracing::{debug, info, instrument};

/// Process-wide switches. A stage runs only when both this and the request
/// flag allow it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    pub search: bool,
    pub validate: bool,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            search: true,
            validate: true,
        }
    }
}

impl ResolverOptions {
    pub fn with_search(mut self, search: bool) -> Self {
        self.search = search;
        self
    }

    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPreview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_data: Option<SiteData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_search: Option<String>,
    pub image_results: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_data: Option<ExtraData>,
}

/// Response body. `success` is false only for a malformed request or an
/// aborted resolution; stage failures land in `errors`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResolvedPreview>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub errors: Vec<ErrorReport>,
}

impl PreviewResult {
    pub fn resolved(preview: ResolvedPreview, errors: Vec<ErrorReport>) -> Self {
        Self {
            success: true,
            result: Some(preview),
            error: None,
            errors,
        }
    }

    pub fn rejected(errors: &[PreviewError]) -> Self {
        Self {
            success: false,
            result: None,
            error: None,
            errors: errors.iter().map(ErrorReport::from).collect(),
        }
    }

    pub fn failed(error: &PreviewError) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.to_string()),
            errors: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct PreviewResolver {
    policy: ExceptionPolicy,
    scraper: SiteScraper,
    enrichment: SearchEnrichment,
    selector: TopImageSelector,
    options: ResolverOptions,
}

impl PreviewResolver {
    pub fn new(
        scraper: SiteScraper,
        enrichment: SearchEnrichment,
        selector: TopImageSelector,
    ) -> Self {
        Self {
            policy: ExceptionPolicy::standard(),
            scraper,
            enrichment,
            selector,
            options: ResolverOptions::default(),
        }
    }

    pub fn with_policy(mut self, policy: ExceptionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> ResolverOptions {
        self.options
    }

    /// Parses raw query parameters, then resolves. Request errors come back
    /// as a rejected result; only a domain resolution failure is `Err`.
    pub async fn resolve_query(&self, query: &PreviewQuery) -> Result<PreviewResult, PreviewError> {
        match PreviewRequest::from_query(query) {
            Ok(request) => self.resolve(&request).await,
            Err(errors) => {
                for e in &errors {
                    e.log();
                }
                Ok(PreviewResult::rejected(&errors))
            }
        }
    }

    #[instrument(level = "debug", skip(self), fields(url = %request.url))]
    pub async fn resolve(&self, request: &PreviewRequest) -> Result<PreviewResult, PreviewError> {
        let url = match validate_web_url(&request.url) {
            Ok(url) => url.to_string(),
            Err(e) => {
                e.log();
                return Ok(PreviewResult::rejected(&[e]));
            }
        };

        let policy = self.policy.lookup(&url, request.stealth);
        let scrape_options = policy
            .scrape_options
            .unwrap_or_else(|| ScrapeOptions::new(request.stealth));
        debug!(options = ?scrape_options, "Resolved scrape options");

        let search = self.options.search && request.search_enabled();
        let domain_search: OptionFuture<_> =
            search.then(|| self.enrichment.search_domain(&url)).into();

        // An unresolvable domain drops the in-flight scrape.
        let (domain, scraped) = tokio::try_join!(
            async { domain_search.await.transpose() },
            async { Ok::<_, PreviewError>(self.scraper.scrape(&url, &scrape_options).await) },
        )?;

        let enrichment = match domain {
            Some(domain) => self.enrichment.finish(domain, scraped.data.as_ref()).await,
            None => Enrichment::default(),
        };

        let top_image = if self.options.validate && request.validate_enabled() {
            self.selector
                .select_top(&enrichment.image_results, scraped.data.as_ref())
                .await
        } else {
            None
        };

        let errors: Vec<ErrorReport> = scraped
            .errors
            .iter()
            .chain(&enrichment.errors)
            .map(ErrorReport::from)
            .collect();

        info!(
            url = %url,
            has_site_data = scraped.data.is_some(),
            image_results = enrichment.image_results.len(),
            top_image = ?top_image,
            errors = errors.len(),
            "Resolved link preview"
        );

        // Fetches use the parsed form; the response echoes the caller's URL.
        let site_data = scraped.data.map(|data| SiteData {
            url: request.url.trim().to_string(),
            ..data
        });

        Ok(PreviewResult::resolved(
            ResolvedPreview {
                site_data,
                image_search: enrichment.query,
                image_results: enrichment.image_results,
                top_image,
                extra_data: policy.extra_data,
            },
            errors,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{FetchResponse, ImageSearchProvider, ImageValidator, PageFetcher};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct HtmlFetcher {
        html: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for HtmlFetcher {
        async fn fetch(&self, _url: &str) -> Result<FetchResponse, PreviewError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(FetchResponse {
                status: 200,
                content_type: Some("text/html".into()),
                body: self.html.to_string(),
            })
        }
    }

    struct EchoSearch;

    #[async_trait]
    impl ImageSearchProvider for EchoSearch {
        async fn search(&self, query: &str) -> Result<Vec<String>, PreviewError> {
            Ok(vec![format!("https://img.example.net/{}.png", query.replace(' ', "_"))])
        }
    }

    struct AcceptAll;

    #[async_trait]
    impl ImageValidator for AcceptAll {
        async fn is_valid_image(&self, _url: &str) -> bool {
            true
        }
    }

    fn resolver(fetcher: Arc<HtmlFetcher>) -> PreviewResolver {
        PreviewResolver::new(
            SiteScraper::new(fetcher),
            SearchEnrichment::new(Arc::new(EchoSearch)),
            TopImageSelector::new(Arc::new(AcceptAll)),
        )
    }

    fn fetcher(html: &'static str) -> Arc<HtmlFetcher> {
        Arc::new(HtmlFetcher {
            html,
            calls: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected_before_any_stage() {
        let fetcher = fetcher("<title>x</title>");
        let result = resolver(fetcher.clone())
            .resolve(&PreviewRequest::new("ftp://example.com/file"))
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.result.is_none());
        assert_eq!(result.errors[0].kind, "invalid_url");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_full_resolution() {
        let result = resolver(fetcher(
            r#"<title>Blue Widget</title><meta property="og:image" content="/og.png">"#,
        ))
        .resolve(&PreviewRequest::new("https://www.example.com/widget"))
        .await
        .unwrap();

        assert!(result.success);
        let preview = result.result.unwrap();
        assert_eq!(preview.image_search.as_deref(), Some("Blue Widget"));
        assert_eq!(
            preview.image_results,
            vec![
                "https://img.example.net/Blue_Widget.png",
                "https://img.example.net/example.png"
            ]
        );
        assert_eq!(
            preview.top_image.as_deref(),
            Some("https://www.example.com/og.png")
        );
        assert!(preview.extra_data.is_none());
    }

    #[tokio::test]
    async fn test_site_data_echoes_the_requested_url() {
        let preview = resolver(fetcher("<title>Home</title>"))
            .resolve(
                &PreviewRequest::new("https://WWW.Example.com")
                    .with_search(false)
                    .with_validate(false),
            )
            .await
            .unwrap()
            .result
            .unwrap();

        assert_eq!(preview.site_data.unwrap().url, "https://WWW.Example.com");
    }

    #[tokio::test]
    async fn test_flags_disable_search_and_validation() {
        let request = PreviewRequest::new("http://localhost:3000/")
            .with_search(false)
            .with_validate(false);
        let result = resolver(fetcher("<title>Local</title>"))
            .resolve(&request)
            .await
            .unwrap();

        let preview = result.result.unwrap();
        assert!(preview.image_results.is_empty());
        assert!(preview.image_search.is_none());
        assert!(preview.top_image.is_none());
        assert_eq!(
            preview.site_data.unwrap().title.as_deref(),
            Some("Local")
        );
    }

    #[tokio::test]
    async fn test_unresolvable_domain_aborts() {
        let result = resolver(fetcher("<title>Local</title>"))
            .resolve(&PreviewRequest::new("http://192.168.1.10/"))
            .await;
        assert!(matches!(result, Err(PreviewError::DomainResolutionError(_))));
    }

    #[tokio::test]
    async fn test_resolve_query_reports_every_bad_flag() {
        let query = PreviewQuery {
            url: Some("https://example.com".into()),
            stealth: Some("yes".into()),
            search: Some("no".into()),
            validate: None,
        };
        let result = resolver(fetcher("")).resolve_query(&query).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.errors.len(), 2);
        assert!(result.errors.iter().all(|e| e.kind == "invalid_parameter"));
    }

    #[test]
    fn test_serialized_shape() {
        let result = PreviewResult::resolved(
            ResolvedPreview {
                site_data: Some(SiteData {
                    url: "https://example.com/".into(),
                    site_name: Some("Example".into()),
                    ..Default::default()
                }),
                image_search: Some("example".into()),
                image_results: Vec::new(),
                top_image: None,
                extra_data: None,
            },
            Vec::new(),
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "success": true,
                "result": {
                    "siteData": {"url": "https://example.com/", "siteName": "Example"},
                    "imageSearch": "example",
                    "imageResults": []
                },
                "errors": []
            })
        );
    }
}
