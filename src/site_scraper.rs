use crate::{
    MetadataExtractor, PageFetcher, PreviewError, RenderWaitPolicy, Renderer, SiteData,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

pub const DEFAULT_RENDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-request scraping switches, produced by the exception policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeOptions {
    /// `false` disables all fetching for the request.
    pub scrape: bool,
    /// `Some(false)` disables the render fallback; anything else allows it.
    pub stealth: Option<bool>,
    pub render_wait_policy: Option<RenderWaitPolicy>,
}

impl Default for ScrapeOptions {
    fn default() -> Self {
        Self::new(None)
    }
}

impl ScrapeOptions {
    pub fn new(stealth: Option<bool>) -> Self {
        Self {
            scrape: true,
            stealth,
            render_wait_policy: None,
        }
    }

    pub fn disabled() -> Self {
        Self {
            scrape: false,
            stealth: Some(false),
            render_wait_policy: None,
        }
    }

    pub fn with_render_wait_policy(mut self, policy: RenderWaitPolicy) -> Self {
        self.render_wait_policy = Some(policy);
        self
    }

    pub fn allows_render(&self) -> bool {
        self.stealth != Some(false)
    }

    pub fn wait_policy(&self) -> RenderWaitPolicy {
        self.render_wait_policy.unwrap_or_default()
    }
}

/// Best-effort scrape result. `data` is `None` when neither strategy produced a page.
#[derive(Debug, Clone, Default)]
pub struct ScrapeOutcome {
    pub data: Option<SiteData>,
    pub errors: Vec<PreviewError>,
}

/// Direct fetch first, then a full browser render when the cheap path
/// yielded nothing or no image.
#[derive(Clone)]
pub struct SiteScraper {
    fetcher: Arc<dyn PageFetcher>,
    renderer: Option<Arc<dyn Renderer>>,
    extractor: MetadataExtractor,
    render_timeout: Duration,
}

impl SiteScraper {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self {
            fetcher,
            renderer: None,
            extractor: MetadataExtractor::new(),
            render_timeout: DEFAULT_RENDER_TIMEOUT,
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn scrape(&self, url: &str, options: &ScrapeOptions) -> ScrapeOutcome {
        let mut outcome = ScrapeOutcome::default();
        if !options.scrape {
            debug!(url = %url, "Scraping disabled for this URL");
            return outcome;
        }

        match self.fetch_html(url).await {
            Ok(Some(html)) => outcome.data = Some(self.extractor.extract(url, &html)),
            Ok(None) => debug!(url = %url, "Direct fetch returned an empty body"),
            Err(e) => {
                e.log();
                outcome.errors.push(e);
            }
        }

        let has_image = outcome
            .data
            .as_ref()
            .is_some_and(|data| data.image.is_some());
        if !options.allows_render() || has_image {
            return outcome;
        }

        let Some(renderer) = &self.renderer else {
            debug!(url = %url, "Render fallback wanted but no renderer is configured");
            return outcome;
        };

        debug!(url = %url, policy = ?options.wait_policy(), "Falling back to browser render");
        match self.render(renderer.as_ref(), url, options.wait_policy()).await {
            Ok(page) => {
                let mut data = self.extractor.extract(url, &page.html);
                data.largest_image = page.largest_image;
                outcome.data = Some(data);
            }
            Err(e) => {
                e.log();
                outcome.errors.push(e);
            }
        }

        outcome
    }

    async fn fetch_html(&self, url: &str) -> Result<Option<String>, PreviewError> {
        let response = self.fetcher.fetch(url).await?;
        if !response.is_success() {
            return Err(PreviewError::HttpStatus {
                status: response.status,
                url: url.to_string(),
            });
        }
        if response.body.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(response.body))
    }

    async fn render(
        &self,
        renderer: &dyn Renderer,
        url: &str,
        wait_policy: RenderWaitPolicy,
    ) -> Result<crate::RenderedPage, PreviewError> {
        match tokio::time::timeout(self.render_timeout, renderer.render(url, wait_policy)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(url = %url, timeout = ?self.render_timeout, "Render timed out");
                Err(PreviewError::TimeoutError(format!(
                    "render of {url} exceeded {}s",
                    self.render_timeout.as_secs()
                )))
            }
        }
    }
}
