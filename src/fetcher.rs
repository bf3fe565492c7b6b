use crate::PreviewError;
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE},
    Client,
};
use std::time::Duration;
use tracing::{debug, error, instrument};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/119.0.0.0 Safari/537.36";

/// Status, content type and (for full fetches) body of a GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Raw page fetcher used by the scraper and the image validator.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// GET `url` and read the body as text.
    async fn fetch(&self, url: &str) -> Result<FetchResponse, PreviewError>;

    /// GET `url` without reading the body. `body` is left empty.
    async fn probe(&self, url: &str) -> Result<FetchResponse, PreviewError> {
        self.fetch(url).await
    }
}

/// Creates a fetcher with custom configuration.
///
/// # Examples
/// ```ignore
/// let fetcher = Fetcher::new_with_config(FetcherConfig {
///     user_agent: "my-custom-agent/1.0".to_string(),
///     timeout: Duration::from_secs(20),
///     headers: None,
///     redirect_policy: None,
/// })?;
/// ```
pub struct FetcherConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub headers: Option<HeaderMap>,
    pub redirect_policy: Option<reqwest::redirect::Policy>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(10),
            headers: None,
            redirect_policy: None,
        }
    }
}

impl FetcherConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

#[derive(Clone)]
pub struct Fetcher {
    client: Client,
}

impl Default for Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher {
    pub fn new() -> Self {
        debug!("Fetcher initialized with default configuration");
        Self::new_with_config(FetcherConfig::default()).unwrap_or_else(|e| {
            error!(error = %e, "Failed to create configured HTTP client, using defaults");
            Self::with_client(Client::new())
        })
    }

    pub fn new_with_config(config: FetcherConfig) -> Result<Self, PreviewError> {
        let mut client_builder = Client::builder()
            .user_agent(config.user_agent)
            .timeout(config.timeout)
            .pool_max_idle_per_host(10)
            .default_headers(config.headers.unwrap_or_else(browser_headers));

        if let Some(redirect_policy) = config.redirect_policy {
            client_builder = client_builder.redirect(redirect_policy);
        }

        let client = client_builder.build().map_err(|e| {
            error!(error = %e, "Failed to create HTTP client");
            PreviewError::ConfigError(format!("Failed to initialize HTTP client: {e}"))
        })?;

        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response, PreviewError> {
        self.client.get(url).send().await.map_err(|e| {
            debug!(error = %e, url = %url, "Failed to send request");
            if e.is_timeout() {
                PreviewError::TimeoutError(format!("{url}: {e}"))
            } else {
                PreviewError::FetchError(format!("{url}: {e}"))
            }
        })
    }
}

fn browser_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers
}

fn content_type(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(String::from)
}

#[async_trait]
impl PageFetcher for Fetcher {
    #[instrument(level = "debug", skip(self), err)]
    async fn fetch(&self, url: &str) -> Result<FetchResponse, PreviewError> {
        let response = self.send(url).await?;
        let status = response.status().as_u16();
        let content_type = content_type(&response);

        let body = response.text().await.map_err(|e| {
            debug!(error = %e, url = %url, "Failed to read response body");
            PreviewError::FetchError(format!("{url}: {e}"))
        })?;

        debug!(url = %url, status, content_length = body.len(), "Fetched page");
        Ok(FetchResponse {
            status,
            content_type,
            body,
        })
    }

    #[instrument(level = "debug", skip(self), err)]
    async fn probe(&self, url: &str) -> Result<FetchResponse, PreviewError> {
        let response = self.send(url).await?;
        Ok(FetchResponse {
            status: response.status().as_u16(),
            content_type: content_type(&response),
            body: String::new(),
        })
    }
}
