use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

#[derive(Debug, Clone, Error)]
pub enum PreviewError {
    #[error("Failed to parse URL: {0}")]
    UrlParseError(#[from] url::ParseError),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Failed to fetch content: {0}")]
    FetchError(String),

    #[error("HTTP {status} returned for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Failed to render page: {0}")]
    RenderError(String),

    #[error("Request timeout: {0}")]
    TimeoutError(String),

    #[error("Image search failed: {0}")]
    SearchError(String),

    #[error("External service error: {service} - {message}")]
    ExternalServiceError { service: String, message: String },

    #[error("Could not resolve registrable domain: {0}")]
    DomainResolutionError(String),

    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl PreviewError {
    /// Stable machine-readable name used in serialized error reports.
    pub fn kind(&self) -> &'static str {
        match self {
            PreviewError::UrlParseError(_) | PreviewError::InvalidUrl(_) => "invalid_url",
            PreviewError::InvalidParameter(_) => "invalid_parameter",
            PreviewError::FetchError(_) => "fetch",
            PreviewError::HttpStatus { .. } => "http_status",
            PreviewError::RenderError(_) => "render",
            PreviewError::TimeoutError(_) => "timeout",
            PreviewError::SearchError(_) => "search",
            PreviewError::ExternalServiceError { .. } => "external_service",
            PreviewError::DomainResolutionError(_) => "domain_resolution",
            PreviewError::InvalidContentType(_) => "invalid_content_type",
            PreviewError::ConfigError(_) => "config",
        }
    }

    /// Malformed inbound request; maps to a 400 response.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            PreviewError::UrlParseError(_)
                | PreviewError::InvalidUrl(_)
                | PreviewError::InvalidParameter(_)
        )
    }

    pub fn log(&self) {
        match self {
            PreviewError::UrlParseError(e) => {
                warn!(error = %e, "URL parsing failed");
            }
            PreviewError::InvalidUrl(e) => {
                warn!(error = %e, "Rejected invalid URL");
            }
            PreviewError::InvalidParameter(e) => {
                warn!(error = %e, "Rejected request parameter");
            }
            PreviewError::FetchError(e) => {
                warn!(error = %e, "Content fetch failed");
            }
            PreviewError::HttpStatus { status, url } => {
                warn!(status = *status, url = %url, "Upstream returned error status");
            }
            PreviewError::RenderError(e) => {
                warn!(error = %e, "Page render failed");
            }
            PreviewError::TimeoutError(e) => {
                warn!(error = %e, "Request timed out");
            }
            PreviewError::SearchError(e) => {
                warn!(error = %e, "Image search failed");
            }
            PreviewError::ExternalServiceError { service, message } => {
                error!(
                    service = %service,
                    error = %message,
                    "External service error occurred"
                );
            }
            PreviewError::DomainResolutionError(e) => {
                error!(error = %e, "Registrable domain could not be derived");
            }
            PreviewError::InvalidContentType(e) => {
                warn!(error = %e, "Invalid content type received");
            }
            PreviewError::ConfigError(e) => {
                error!(error = %e, "Configuration error");
            }
        }
    }
}

/// Serialized form of a recorded error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: String,
    pub message: String,
}

impl From<&PreviewError> for ErrorReport {
    fn from(error: &PreviewError) -> Self {
        Self {
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}
