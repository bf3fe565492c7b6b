//! Headless browser renderer backed by the playwright MCP server.

use crate::mcp_client::{McpClient, McpConfig};
use crate::{PreviewError, RenderWaitPolicy, RenderedPage, Renderer};
use async_trait::async_trait;
use jsonrpc_core::Value;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, instrument};

const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(2);
const DEFAULT_MAX_IDLE_SESSIONS: usize = 4;

/// Resolves once no new resource entries have appeared for 500ms.
const NETWORK_IDLE_SCRIPT: &str = r#"() => new Promise((resolve) => {
  let last = -1;
  let quiet = 0;
  const tick = () => {
    const count = performance.getEntriesByType("resource").length;
    if (count === last) { quiet += 1; } else { quiet = 0; last = count; }
    if (quiet >= 5) { resolve(true); } else { setTimeout(tick, 100); }
  };
  tick();
})"#;

const LARGEST_IMAGE_SCRIPT: &str = r#"() => {
  let best = null;
  let bestArea = 0;
  for (const img of document.getElementsByTagName("img")) {
    const area = img.naturalWidth * img.naturalHeight;
    if (area > bestArea) { best = img; bestArea = area; }
  }
  return best ? best.src : null;
}"#;

/// Each render checks out its own browser session. Idle sessions are kept
/// for reuse. A session goes back to the pool only after a clean render; any
/// other outcome drops it and its browser process.
pub struct BrowserRenderer {
    config: McpConfig,
    idle: Mutex<Vec<McpClient>>,
    max_idle: usize,
    settle_delay: Duration,
}

impl BrowserRenderer {
    pub fn new(config: McpConfig) -> Self {
        Self {
            config,
            idle: Mutex::new(Vec::new()),
            max_idle: DEFAULT_MAX_IDLE_SESSIONS,
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    /// Wait after load for [`RenderWaitPolicy::Default`].
    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    /// Number of warm sessions kept between renders.
    pub fn with_max_idle_sessions(mut self, max_idle: usize) -> Self {
        self.max_idle = max_idle;
        self
    }

    pub fn idle_sessions(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Starts one session ahead of the first render.
    pub async fn initialize(&self) -> Result<(), PreviewError> {
        let client = McpClient::new(self.config.clone());
        client.start().await?;
        self.check_in(client);
        Ok(())
    }

    pub async fn shutdown(&self) -> Result<(), PreviewError> {
        let sessions: Vec<McpClient> = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for client in sessions {
            client.stop().await?;
        }
        Ok(())
    }

    fn check_out(&self) -> McpClient {
        let reused = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();
        reused.unwrap_or_else(|| {
            debug!("No idle browser session, opening a new one");
            McpClient::new(self.config.clone())
        })
    }

    fn check_in(&self, client: McpClient) {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(client);
        }
    }

    async fn render_with(
        &self,
        client: &McpClient,
        url: &str,
        wait_policy: RenderWaitPolicy,
    ) -> Result<RenderedPage, PreviewError> {
        client.navigate(url).await.map_err(render_error)?;
        let waited = match wait_policy {
            RenderWaitPolicy::Default => client.wait_for(self.settle_delay).await,
            RenderWaitPolicy::NetworkIdle => client.evaluate(NETWORK_IDLE_SCRIPT).await.map(drop),
        };
        waited.map_err(render_error)?;

        let html = client.page_html().await.map_err(render_error)?;
        let largest_image = largest_image_src(
            client
                .evaluate(LARGEST_IMAGE_SCRIPT)
                .await
                .map_err(render_error)?,
        );
        Ok(RenderedPage {
            html,
            largest_image,
        })
    }
}

fn render_error(error: PreviewError) -> PreviewError {
    match error {
        PreviewError::ExternalServiceError { message, .. } => PreviewError::RenderError(message),
        other => other,
    }
}

fn largest_image_src(value: Value) -> Option<String> {
    match value {
        Value::String(src) if !src.trim().is_empty() => Some(src),
        _ => None,
    }
}

#[async_trait]
impl Renderer for BrowserRenderer {
    #[instrument(level = "debug", skip(self))]
    async fn render(
        &self,
        url: &str,
        wait_policy: RenderWaitPolicy,
    ) -> Result<RenderedPage, PreviewError> {
        let client = self.check_out();
        let page = self.render_with(&client, url, wait_policy).await?;
        self.check_in(client);

        debug!(
            url = %url,
            html_len = page.html.len(),
            largest_image = ?page.largest_image,
            "Rendered page in browser"
        );
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_largest_image_src() {
        assert_eq!(
            largest_image_src(Value::from("https://cdn.example.com/hero.jpg")).as_deref(),
            Some("https://cdn.example.com/hero.jpg")
        );
        assert_eq!(largest_image_src(Value::Null), None);
        assert_eq!(largest_image_src(Value::from("")), None);
    }

    #[test]
    fn test_render_error_mapping() {
        let mapped = render_error(PreviewError::ExternalServiceError {
            service: "MCP".into(),
            message: "browser closed".into(),
        });
        assert!(matches!(mapped, PreviewError::RenderError(m) if m == "browser closed"));

        let timeout = render_error(PreviewError::TimeoutError("slow".into()));
        assert!(matches!(timeout, PreviewError::TimeoutError(_)));
    }

    /// Line-oriented stand-in for playwright-mcp. Logs each start to `$1`.
    /// `$2` is either the seconds `browser_wait_for` takes or `hang`, which
    /// answers `initialize` and nothing after it.
    const FAKE_MCP_SERVER: &str = r##"count_file="$1"
mode="$2"
echo started >> "$count_file"
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  [ -n "$id" ] || continue
  case "$line" in
    *'"initialize"'*)
      printf '%s\n' '{"jsonrpc":"2.0","id":'"$id"',"result":{}}'
      continue ;;
  esac
  [ "$mode" = hang ] && continue
  case "$line" in
    *browser_wait_for*) sleep "$mode" ;;
  esac
  case "$line" in
    *outerHTML*) printf '%s\n' '{"jsonrpc":"2.0","id":'"$id"',"result":{"content":[{"type":"text","text":"\"<title>Rendered</title>\""}]}}' ;;
    *) printf '%s\n' '{"jsonrpc":"2.0","id":'"$id"',"result":{"content":[{"type":"text","text":"null"}]}}' ;;
  esac
done
"##;

    fn fake_server(name: &str, mode: &str) -> (McpConfig, std::path::PathBuf) {
        let base = std::env::temp_dir().join(format!("link-preview-{}-{name}", std::process::id()));
        let script = base.with_extension("sh");
        let starts = base.with_extension("starts");
        std::fs::write(&script, FAKE_MCP_SERVER).unwrap();
        let _ = std::fs::remove_file(&starts);
        let config = McpConfig::default().with_command_line(&format!(
            "sh {} {} {mode}",
            script.display(),
            starts.display()
        ));
        (config, starts)
    }

    fn starts(path: &std::path::Path) -> usize {
        std::fs::read_to_string(path)
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_concurrent_slow_renders_do_not_queue() {
        let (config, log) = fake_server("concurrent", "2");
        let renderer = BrowserRenderer::new(config);
        let limit = Duration::from_secs(3);

        let started = std::time::Instant::now();
        let (a, b) = tokio::join!(
            tokio::time::timeout(
                limit,
                renderer.render("https://a.example.com/", RenderWaitPolicy::Default)
            ),
            tokio::time::timeout(
                limit,
                renderer.render("https://b.example.com/", RenderWaitPolicy::Default)
            ),
        );

        let a = a.expect("first render timed out").unwrap();
        let b = b.expect("second render timed out").unwrap();
        assert_eq!(a.html, "<title>Rendered</title>");
        assert_eq!(b.html, "<title>Rendered</title>");
        assert!(started.elapsed() < limit);
        assert_eq!(starts(&log), 2);
        assert_eq!(renderer.idle_sessions(), 2);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_clean_session_is_reused() {
        let (config, log) = fake_server("reuse", "0");
        let renderer = BrowserRenderer::new(config);

        for _ in 0..2 {
            let page = renderer
                .render("https://example.com/", RenderWaitPolicy::Default)
                .await
                .unwrap();
            assert_eq!(page.largest_image, None);
        }

        assert_eq!(starts(&log), 1);
        assert_eq!(renderer.idle_sessions(), 1);
        renderer.shutdown().await.unwrap();
        assert_eq!(renderer.idle_sessions(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancelled_render_discards_its_session() {
        let (config, log) = fake_server("hang", "hang");
        let renderer = BrowserRenderer::new(config);

        for _ in 0..3 {
            let outcome = tokio::time::timeout(
                Duration::from_millis(500),
                renderer.render("https://example.com/", RenderWaitPolicy::Default),
            )
            .await;
            assert!(outcome.is_err());
        }

        assert_eq!(starts(&log), 3);
        assert_eq!(renderer.idle_sessions(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_browser_is_render_error() {
        let renderer = BrowserRenderer::new(
            McpConfig::default().with_command_line("definitely-not-an-mcp-server-binary"),
        );
        let result = renderer
            .render("https://example.com/", RenderWaitPolicy::Default)
            .await;
        assert!(matches!(result, Err(PreviewError::RenderError(_))));
    }
}
