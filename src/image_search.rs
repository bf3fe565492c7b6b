use crate::PreviewError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

pub const BING_IMAGE_SEARCH_ENDPOINT: &str = "https://api.bing.microsoft.com/v7.0/images/search";

/// Text query in, ranked image URLs out.
#[async_trait]
pub trait ImageSearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<Vec<String>, PreviewError>;
}

#[derive(Debug, Deserialize)]
struct BingImagesResponse {
    #[serde(default)]
    value: Vec<BingImage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BingImage {
    content_url: Option<String>,
}

/// Bing Image Search v7 client.
#[derive(Clone)]
pub struct BingImageSearch {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
}

impl BingImageSearch {
    pub fn new(api_key: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            endpoint: BING_IMAGE_SEARCH_ENDPOINT.to_string(),
            api_key,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    fn service_error(message: impl Into<String>) -> PreviewError {
        PreviewError::ExternalServiceError {
            service: "Bing Image Search".to_string(),
            message: message.into(),
        }
    }
}

#[async_trait]
impl ImageSearchProvider for BingImageSearch {
    #[instrument(level = "debug", skip(self), err)]
    async fn search(&self, query: &str) -> Result<Vec<String>, PreviewError> {
        if query.trim().is_empty() {
            return Err(PreviewError::SearchError(
                "No search string for image".to_string(),
            ));
        }
        let api_key = self.api_key.as_deref().ok_or_else(|| {
            PreviewError::ConfigError("image search API key is not configured".to_string())
        })?;

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query), ("aspect", "Square")])
            .header("Ocp-Apim-Subscription-Key", api_key)
            .send()
            .await
            .map_err(|e| Self::service_error(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(Self::service_error(format!("status {status}: {message}")));
        }

        let body: BingImagesResponse = response
            .json()
            .await
            .map_err(|e| Self::service_error(format!("invalid response: {e}")))?;

        let urls: Vec<String> = body
            .value
            .into_iter()
            .filter_map(|image| image.content_url)
            .collect();

        debug!(query = %query, results = urls.len(), "Image search completed");
        Ok(urls)
    }
}
