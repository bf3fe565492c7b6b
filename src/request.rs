//! Inbound request shape: a plain `url` query parameter plus optional
//! `stealth`, `search` and `validate` flags.

use crate::PreviewError;
use serde::Deserialize;
use url::Url;

/// Accepts only absolute `http`/`https` URLs with a host.
pub fn validate_web_url(raw: &str) -> Result<Url, PreviewError> {
    let raw = raw.trim();
    if !(raw.starts_with("http://") || raw.starts_with("https://")) {
        return Err(PreviewError::InvalidUrl(format!(
            "{raw:?} is not an http(s) URL"
        )));
    }
    let url = Url::parse(raw)?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(PreviewError::InvalidUrl(format!("{raw:?} has no host")));
    }
    Ok(url)
}

/// Parses a boolean flag. Absent or empty means "use the default"; only the
/// literal strings `true` and `false` are accepted otherwise.
pub fn parse_bool_flag(name: &str, value: Option<&str>) -> Result<Option<bool>, PreviewError> {
    match value {
        None | Some("") => Ok(None),
        Some("true") => Ok(Some(true)),
        Some("false") => Ok(Some(false)),
        Some(_) => Err(PreviewError::InvalidParameter(format!(
            "{name} parameter must be boolean string - \"true\" or \"false\""
        ))),
    }
}

/// Raw query parameters as received.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreviewQuery {
    pub url: Option<String>,
    pub stealth: Option<String>,
    pub search: Option<String>,
    pub validate: Option<String>,
}

/// A validated preview request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRequest {
    pub url: String,
    pub stealth: Option<bool>,
    pub search: Option<bool>,
    pub validate: Option<bool>,
}

impl PreviewRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            stealth: None,
            search: None,
            validate: None,
        }
    }

    pub fn with_stealth(mut self, stealth: bool) -> Self {
        self.stealth = Some(stealth);
        self
    }

    pub fn with_search(mut self, search: bool) -> Self {
        self.search = Some(search);
        self
    }

    pub fn with_validate(mut self, validate: bool) -> Self {
        self.validate = Some(validate);
        self
    }

    pub fn search_enabled(&self) -> bool {
        self.search != Some(false)
    }

    pub fn validate_enabled(&self) -> bool {
        self.validate != Some(false)
    }

    /// Checks every parameter and reports all problems at once.
    pub fn from_query(query: &PreviewQuery) -> Result<Self, Vec<PreviewError>> {
        let mut errors = Vec::new();

        let url = match query.url.as_deref() {
            Some(raw) if !raw.is_empty() => match validate_web_url(raw) {
                Ok(url) => Some(url.to_string()),
                Err(e) => {
                    errors.push(e);
                    None
                }
            },
            _ => {
                errors.push(PreviewError::InvalidUrl(
                    "url parameter is required".to_string(),
                ));
                None
            }
        };

        let mut flag = |name: &str, value: &Option<String>| {
            parse_bool_flag(name, value.as_deref()).unwrap_or_else(|e| {
                errors.push(e);
                None
            })
        };
        let stealth = flag("Stealth", &query.stealth);
        let search = flag("Search", &query.search);
        let validate = flag("Validate", &query.validate);

        match url {
            Some(url) if errors.is_empty() => Ok(Self {
                url,
                stealth,
                search,
                validate,
            }),
            _ => Err(errors),
        }
    }
}
