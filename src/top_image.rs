use crate::{FetchResponse, PageFetcher, PreviewError, SiteData};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Decides whether a URL currently serves an image.
#[async_trait]
pub trait ImageValidator: Send + Sync {
    async fn is_valid_image(&self, url: &str) -> bool;
}

/// Valid means: GET answers 200 with an `image/*` content type. Any fetch
/// error counts as invalid.
#[derive(Clone)]
pub struct HttpImageValidator {
    fetcher: Arc<dyn PageFetcher>,
}

impl HttpImageValidator {
    pub fn new(fetcher: Arc<dyn PageFetcher>) -> Self {
        Self { fetcher }
    }
}

fn is_image_content_type(content_type: &str) -> bool {
    content_type
        .trim_start()
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
}

/// Why a fetched candidate is not an image, if it is not.
fn check_image_response(url: &str, response: &FetchResponse) -> Result<(), PreviewError> {
    if response.status != 200 {
        return Err(PreviewError::HttpStatus {
            status: response.status,
            url: url.to_string(),
        });
    }
    match response.content_type.as_deref() {
        Some(content_type) if is_image_content_type(content_type) => Ok(()),
        other => Err(PreviewError::InvalidContentType(format!(
            "{url} served {}",
            other.unwrap_or("no content type")
        ))),
    }
}

#[async_trait]
impl ImageValidator for HttpImageValidator {
    async fn is_valid_image(&self, url: &str) -> bool {
        let checked = match self.fetcher.probe(url).await {
            Ok(response) => check_image_response(url, &response),
            Err(e) => Err(e),
        };
        match checked {
            Ok(()) => {
                debug!(url = %url, "Image candidate is valid");
                true
            }
            Err(e) => {
                debug!(url = %url, kind = e.kind(), error = %e, "Image candidate rejected");
                false
            }
        }
    }
}

/// Picks the first candidate that passes validation, checking the page's own
/// image, then its largest rendered image, then search results in order.
#[derive(Clone)]
pub struct TopImageSelector {
    validator: Arc<dyn ImageValidator>,
}

impl TopImageSelector {
    pub fn new(validator: Arc<dyn ImageValidator>) -> Self {
        Self { validator }
    }

    #[instrument(level = "debug", skip_all)]
    pub async fn select_top(
        &self,
        candidates: &[String],
        site_data: Option<&SiteData>,
    ) -> Option<String> {
        let own_images: Vec<&String> = site_data
            .into_iter()
            .flat_map(|data| [data.image.as_ref(), data.largest_image.as_ref()])
            .flatten()
            .collect();

        for url in own_images.into_iter().chain(candidates) {
            if self.validator.is_valid_image(url).await {
                debug!(url = %url, "Selected top image");
                return Some(url.clone());
            }
        }

        debug!(candidates = candidates.len(), "No valid top image");
        None
    }
}
