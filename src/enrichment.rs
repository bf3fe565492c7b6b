//! Image search enrichment: a domain-level query and a page-level query,
//! merged into one ranked candidate list.

use crate::utils::{registrable_domain, registrable_label};
use crate::{ImageSearchProvider, PreviewError, SiteData};
use regex::RegexBuilder;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Positions at which domain results are spliced into the page results.
// TODO: replace the fixed positions with a scored interleave.
pub const DOMAIN_INSERT_INDICES: [usize; 5] = [2, 5, 10, 15, 20];

const SPECIAL_CHARS: &[char] = &[
    '&', '/', '\\', '#', ',', '+', '(', ')', '$', '~', '%', '.', '\'', '"', ':', '*', '?', '<',
    '>', '{', '}', '|', '—',
];

/// Splices `domain[i]` into `page` at `DOMAIN_INSERT_INDICES[i]`, one after
/// another. Positions past the end append.
pub fn merge_image_results(page: Vec<String>, domain: &[String]) -> Vec<String> {
    let mut merged = page;
    for (&index, url) in DOMAIN_INSERT_INDICES.iter().zip(domain) {
        let at = index.min(merged.len());
        merged.insert(at, url.clone());
    }
    merged
}

/// Builds the page-level search query from a title.
///
/// Occurrences of the registrable domain and its label are removed
/// case-insensitively unless that would leave nothing; special characters
/// become spaces and whitespace is normalized.
pub fn build_page_query(title: &str, domain: &str, label: &str) -> String {
    let pattern = format!(
        "{}|{}",
        regex::escape(domain),
        regex::escape(label)
    );
    let stripped = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map(|re| re.replace_all(title, "").into_owned())
        .unwrap_or_else(|_| title.to_string());

    let base = if stripped.chars().any(|c| !c.is_whitespace()) {
        stripped
    } else {
        title.to_string()
    };

    base.replace(SPECIAL_CHARS, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Result of the enrichment stage.
#[derive(Debug, Clone, Default)]
pub struct Enrichment {
    pub image_results: Vec<String>,
    pub query: Option<String>,
    pub errors: Vec<PreviewError>,
}

/// Domain-level search, which only needs the URL and may run alongside the scrape.
#[derive(Debug, Clone)]
pub struct DomainSearch {
    pub domain: String,
    pub label: String,
    pub results: Result<Vec<String>, PreviewError>,
}

#[derive(Clone)]
pub struct SearchEnrichment {
    provider: Arc<dyn ImageSearchProvider>,
}

impl SearchEnrichment {
    pub fn new(provider: Arc<dyn ImageSearchProvider>) -> Self {
        Self { provider }
    }

    /// Fails only when `url` has no registrable second-level domain.
    #[instrument(level = "debug", skip(self))]
    pub async fn search_domain(&self, url: &str) -> Result<DomainSearch, PreviewError> {
        let domain = registrable_domain(url)?;
        let label = registrable_label(url)?;
        debug!(domain = %domain, label = %label, "Searching images for domain");

        let results = self.provider.search(&label).await;
        Ok(DomainSearch {
            domain,
            label,
            results,
        })
    }

    /// Runs the page query (when the title allows one) and merges it with the
    /// domain results.
    #[instrument(level = "debug", skip_all)]
    pub async fn finish(&self, domain: DomainSearch, site_data: Option<&SiteData>) -> Enrichment {
        let mut enrichment = Enrichment {
            query: Some(domain.label.clone()),
            ..Default::default()
        };

        let domain_results = match domain.results {
            Ok(results) => results,
            Err(e) => {
                e.log();
                enrichment.errors.push(e);
                Vec::new()
            }
        };

        let Some(title) = site_data.and_then(SiteData::searchable_title) else {
            enrichment.image_results = domain_results;
            return enrichment;
        };

        let query = build_page_query(title, &domain.domain, &domain.label);
        if query.is_empty() {
            enrichment
                .errors
                .push(PreviewError::SearchError("No search string for image".to_string()));
            enrichment.image_results = domain_results;
            return enrichment;
        }

        debug!(query = %query, "Searching images for page title");
        enrichment.query = Some(query.clone());
        match self.provider.search(&query).await {
            Ok(page_results) => {
                enrichment.image_results = merge_image_results(page_results, &domain_results);
            }
            Err(e) => {
                e.log();
                enrichment.errors.push(e);
                enrichment.image_results = domain_results;
            }
        }

        enrichment
    }

    /// Both queries in sequence. `Err` only for an unresolvable domain.
    pub async fn enrich(
        &self,
        url: &str,
        site_data: Option<&SiteData>,
        search_enabled: bool,
    ) -> Result<Enrichment, PreviewError> {
        if !search_enabled {
            return Ok(Enrichment::default());
        }
        let domain = self.search_domain(url).await?;
        Ok(self.finish(domain, site_data).await)
    }
}
