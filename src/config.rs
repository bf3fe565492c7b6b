use crate::{
    BingImageSearch, Fetcher, FetcherConfig, HttpImageValidator, PageFetcher, PreviewError,
    PreviewResolver, SearchEnrichment, SiteScraper, TopImageSelector,
    BING_IMAGE_SEARCH_ENDPOINT, DEFAULT_USER_AGENT,
};
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_MCP_COMMAND: &str = "npx -y @playwright/mcp@latest";

/// Process configuration, read once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub bing_api_key: Option<String>,
    pub bing_endpoint: String,
    pub fetch_timeout: Duration,
    pub render_timeout: Duration,
    pub user_agent: String,
    pub browser_enabled: bool,
    pub mcp_command: String,
    pub host: String,
    pub port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bing_api_key: None,
            bing_endpoint: BING_IMAGE_SEARCH_ENDPOINT.to_string(),
            fetch_timeout: Duration::from_secs(10),
            render_timeout: Duration::from_secs(30),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            browser_enabled: false,
            mcp_command: DEFAULT_MCP_COMMAND.to_string(),
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, PreviewError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| PreviewError::ConfigError(format!("{key}={value:?}: {e}")))
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, PreviewError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads every setting through `lookup`. Unset or empty values keep
    /// their defaults; malformed numbers and booleans are errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, PreviewError> {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::default();

        config.bing_api_key = get("AZURE_BING_SEARCH_KEY");
        if let Some(endpoint) = get("BING_SEARCH_ENDPOINT") {
            config.bing_endpoint = endpoint;
        }
        if let Some(secs) = get("LINK_PREVIEW_FETCH_TIMEOUT_SECS") {
            config.fetch_timeout =
                Duration::from_secs(parse_var("LINK_PREVIEW_FETCH_TIMEOUT_SECS", &secs)?);
        }
        if let Some(secs) = get("LINK_PREVIEW_RENDER_TIMEOUT_SECS") {
            config.render_timeout =
                Duration::from_secs(parse_var("LINK_PREVIEW_RENDER_TIMEOUT_SECS", &secs)?);
        }
        if let Some(user_agent) = get("LINK_PREVIEW_USER_AGENT") {
            config.user_agent = user_agent;
        }
        if let Some(enabled) = get("LINK_PREVIEW_BROWSER") {
            config.browser_enabled = parse_var("LINK_PREVIEW_BROWSER", &enabled)?;
        }
        if let Some(command) = get("LINK_PREVIEW_MCP_COMMAND") {
            config.mcp_command = command;
        }
        if let Some(host) = get("HOST") {
            config.host = host;
        }
        if let Some(port) = get("PORT") {
            config.port = parse_var("PORT", &port)?;
        }

        if config.bing_api_key.is_none() {
            warn!("AZURE_BING_SEARCH_KEY is not set; image search will report errors");
        }
        debug!(
            browser = config.browser_enabled,
            fetch_timeout = ?config.fetch_timeout,
            render_timeout = ?config.render_timeout,
            "Loaded service configuration"
        );
        Ok(config)
    }

    pub fn with_bing_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.bing_api_key = Some(api_key.into());
        self
    }

    pub fn with_bing_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.bing_endpoint = endpoint.into();
        self
    }

    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_browser(mut self, enabled: bool) -> Self {
        self.browser_enabled = enabled;
        self
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Wires the reqwest fetcher, Bing client and optional browser renderer
    /// into a resolver.
    pub fn build_resolver(&self) -> Result<PreviewResolver, PreviewError> {
        let fetcher: Arc<dyn PageFetcher> = Arc::new(Fetcher::new_with_config(
            FetcherConfig::default()
                .with_timeout(self.fetch_timeout)
                .with_user_agent(&self.user_agent),
        )?);

        let scraper = self.attach_renderer(
            SiteScraper::new(fetcher.clone()).with_render_timeout(self.render_timeout),
        );
        let search = BingImageSearch::new(self.bing_api_key.clone())
            .with_endpoint(&self.bing_endpoint);

        Ok(PreviewResolver::new(
            scraper,
            SearchEnrichment::new(Arc::new(search)),
            TopImageSelector::new(Arc::new(HttpImageValidator::new(fetcher))),
        ))
    }

    /// Browser server settings: the configured command, with the fetch user
    /// agent and the default tracker block list.
    #[cfg(feature = "browser")]
    pub fn mcp_config(&self) -> crate::McpConfig {
        crate::McpConfig::default()
            .with_command_line(&self.mcp_command)
            .with_request_timeout(self.render_timeout)
            .with_user_agent(&self.user_agent)
    }

    #[cfg(feature = "browser")]
    fn attach_renderer(&self, scraper: SiteScraper) -> SiteScraper {
        if !self.browser_enabled {
            return scraper;
        }
        scraper.with_renderer(Arc::new(crate::BrowserRenderer::new(self.mcp_config())))
    }

    #[cfg(not(feature = "browser"))]
    fn attach_renderer(&self, scraper: SiteScraper) -> SiteScraper {
        if self.browser_enabled {
            warn!("LINK_PREVIEW_BROWSER is set but the `browser` feature is not compiled in");
        }
        scraper
    }
}
