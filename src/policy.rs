//! Per-site exceptions: an ordered table of URL matchers and the scrape
//! overrides or vendor data they produce.

use crate::amazon::{AmazonData, AMAZON_URL_PREFIXES};
use crate::{is_twitter_url, RenderWaitPolicy, ScrapeOptions};
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Vendor sidecar data passed through to the response untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtraData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amazon: Option<AmazonData>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyOutcome {
    pub scrape_options: Option<ScrapeOptions>,
    pub extra_data: Option<ExtraData>,
}

#[derive(Clone, Copy)]
pub enum SiteMatcher {
    Prefixes(&'static [&'static str]),
    Predicate(fn(&str) -> bool),
}

impl SiteMatcher {
    pub fn matches(&self, url: &str) -> bool {
        match self {
            SiteMatcher::Prefixes(prefixes) => prefixes.iter().any(|p| url.starts_with(p)),
            SiteMatcher::Predicate(predicate) => predicate(url),
        }
    }
}

/// One table entry. `apply` receives the URL and the request's stealth flag.
#[derive(Clone, Copy)]
pub struct PolicyRule {
    pub name: &'static str,
    pub matcher: SiteMatcher,
    pub apply: fn(&str, Option<bool>) -> PolicyOutcome,
}

impl fmt::Debug for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyRule").field("name", &self.name).finish()
    }
}

#[derive(Debug, Clone)]
pub struct ExceptionPolicy {
    rules: Vec<PolicyRule>,
}

impl Default for ExceptionPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl ExceptionPolicy {
    /// No exceptions: every URL gets default scrape options.
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Amazon product data and the Twitter render wait.
    pub fn standard() -> Self {
        Self::empty()
            .with_rule(PolicyRule {
                name: "amazon",
                matcher: SiteMatcher::Prefixes(AMAZON_URL_PREFIXES),
                apply: |url, _stealth| PolicyOutcome {
                    scrape_options: None,
                    extra_data: Some(ExtraData {
                        amazon: Some(AmazonData::from_url(url)),
                    }),
                },
            })
            .with_rule(PolicyRule {
                name: "twitter",
                matcher: SiteMatcher::Predicate(is_twitter_url),
                apply: |_url, stealth| PolicyOutcome {
                    scrape_options: Some(
                        ScrapeOptions::new(stealth)
                            .with_render_wait_policy(RenderWaitPolicy::NetworkIdle),
                    ),
                    extra_data: None,
                },
            })
    }

    /// Appends a rule with the lowest priority so far.
    pub fn with_rule(mut self, rule: PolicyRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// First matching rule wins.
    pub fn lookup(&self, url: &str, stealth: Option<bool>) -> PolicyOutcome {
        match self.rules.iter().find(|rule| rule.matcher.matches(url)) {
            Some(rule) => {
                debug!(url = %url, rule = rule.name, "Applying site exception");
                (rule.apply)(url, stealth)
            }
            None => PolicyOutcome::default(),
        }
    }
}
