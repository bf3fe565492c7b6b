#![allow(dead_code)]

use async_trait::async_trait;
use link_preview::{
    FetchResponse, ImageSearchProvider, ImageValidator, PageFetcher, PreviewError,
    PreviewResolver, RenderWaitPolicy, RenderedPage, Renderer, SearchEnrichment, SiteScraper,
    TopImageSelector,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Serves canned pages; unknown URLs fail like an unreachable host.
#[derive(Default)]
pub struct MapFetcher {
    pages: HashMap<String, FetchResponse>,
    delay: Option<Duration>,
    pub calls: AtomicUsize,
    pub completed: AtomicUsize,
}

impl MapFetcher {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(
            url.to_string(),
            FetchResponse {
                status: 200,
                content_type: Some("text/html; charset=utf-8".into()),
                body: html.to_string(),
            },
        );
        self
    }
}

#[async_trait]
impl PageFetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchResponse, PreviewError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.completed.fetch_add(1, Ordering::SeqCst);
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| PreviewError::FetchError(format!("{url}: connection refused")))
    }
}

/// Canned image search; unknown queries fail.
#[derive(Default)]
pub struct FakeSearch {
    results: HashMap<String, Vec<String>>,
    delay: Option<Duration>,
    pub queries: Mutex<Vec<String>>,
}

impl FakeSearch {
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn results(mut self, query: &str, urls: &[&str]) -> Self {
        self.results
            .insert(query.to_string(), urls.iter().map(|u| u.to_string()).collect());
        self
    }
}

#[async_trait]
impl ImageSearchProvider for FakeSearch {
    async fn search(&self, query: &str) -> Result<Vec<String>, PreviewError> {
        self.queries.lock().unwrap().push(query.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.results
            .get(query)
            .cloned()
            .ok_or_else(|| PreviewError::SearchError(format!("no results for {query}")))
    }
}

#[derive(Default)]
pub struct SetValidator {
    valid: HashSet<String>,
}

impl SetValidator {
    pub fn new(valid: &[&str]) -> Self {
        Self {
            valid: valid.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[async_trait]
impl ImageValidator for SetValidator {
    async fn is_valid_image(&self, url: &str) -> bool {
        self.valid.contains(url)
    }
}

/// Returns a fixed page, optionally after a delay, and records each call.
pub struct FakeRenderer {
    pub html: String,
    pub largest_image: Option<String>,
    pub delay: Option<Duration>,
    pub policies: Mutex<Vec<RenderWaitPolicy>>,
    pub in_flight: Arc<AtomicBool>,
}

impl FakeRenderer {
    pub fn new(html: &str, largest_image: Option<&str>) -> Self {
        Self {
            html: html.to_string(),
            largest_image: largest_image.map(String::from),
            delay: None,
            policies: Mutex::new(Vec::new()),
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

struct InFlight(Arc<AtomicBool>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn render(
        &self,
        _url: &str,
        wait_policy: RenderWaitPolicy,
    ) -> Result<RenderedPage, PreviewError> {
        self.policies.lock().unwrap().push(wait_policy);
        self.in_flight.store(true, Ordering::SeqCst);
        let _guard = InFlight(self.in_flight.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(RenderedPage {
            html: self.html.clone(),
            largest_image: self.largest_image.clone(),
        })
    }
}

pub fn resolver(
    fetcher: Arc<MapFetcher>,
    renderer: Option<Arc<FakeRenderer>>,
    search: Arc<FakeSearch>,
    validator: SetValidator,
) -> PreviewResolver {
    let mut scraper = SiteScraper::new(fetcher);
    if let Some(renderer) = renderer {
        scraper = scraper.with_renderer(renderer);
    }
    PreviewResolver::new(
        scraper,
        SearchEnrichment::new(search),
        TopImageSelector::new(Arc::new(validator)),
    )
}
