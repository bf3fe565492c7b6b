//! Full-browser rendering interface used as the scraper's fallback path.

use crate::PreviewError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// When the renderer considers a page loaded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RenderWaitPolicy {
    /// Return after the load event plus a short settle delay.
    #[default]
    Default,
    /// Return once the page has had no in-flight network requests for a while.
    NetworkIdle,
}

/// Output of a browser render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedPage {
    /// Final DOM serialized as HTML.
    pub html: String,
    /// `src` of the visible image with the largest natural area.
    pub largest_image: Option<String>,
}

#[async_trait]
pub trait Renderer: Send + Sync {
    async fn render(
        &self,
        url: &str,
        wait_policy: RenderWaitPolicy,
    ) -> Result<RenderedPage, PreviewError>;
}
