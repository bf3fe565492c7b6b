use crate::PreviewError;
use unicode_width::UnicodeWidthChar;
use url::{Host, Url};

/// Safely truncate a string, ensuring it is not truncated in the middle of multi-byte characters
///
/// This function will:
/// 1. Correctly handle Unicode characters (including Chinese, emoji, etc.)
/// 2. Add ellipsis when maximum length is reached
/// 3. Ensure the output string's display width does not exceed the specified length
#[cfg_attr(not(any(feature = "logging", feature = "browser")), allow(dead_code))]
pub fn truncate_str(s: &str, max_width: usize) -> String {
    use unicode_width::UnicodeWidthStr;

    if s.width() <= max_width {
        return s.to_string();
    }

    let mut result = String::new();
    let mut current_width = 0;

    for c in s.chars() {
        let char_width = c.width().unwrap_or(1);

        if current_width + char_width + 3 > max_width {
            break;
        }

        result.push(c);
        current_width += char_width;
    }

    result.push_str("...");
    result
}

/// Public-suffix-aware registrable domain of `url`, e.g. `example.co.uk`
/// for `https://www.example.co.uk/page`.
pub fn registrable_domain(url: &str) -> Result<String, PreviewError> {
    let parsed = Url::parse(url)?;
    let host = match parsed.host() {
        Some(Host::Domain(host)) => host.trim_end_matches('.').to_ascii_lowercase(),
        Some(_) => {
            return Err(PreviewError::DomainResolutionError(format!(
                "{url} has an IP address host"
            )))
        }
        None => {
            return Err(PreviewError::DomainResolutionError(format!(
                "{url} has no host"
            )))
        }
    };

    psl::domain_str(&host)
        .map(String::from)
        .ok_or_else(|| PreviewError::DomainResolutionError(format!("no registrable domain in {host}")))
}

/// Second-level label of the registrable domain, e.g. `example` for
/// `https://www.example.co.uk/page`.
pub fn registrable_label(url: &str) -> Result<String, PreviewError> {
    let domain = registrable_domain(url)?;
    let suffix = psl::suffix_str(&domain).ok_or_else(|| {
        PreviewError::DomainResolutionError(format!("no public suffix in {domain}"))
    })?;

    domain
        .strip_suffix(suffix)
        .map(|rest| rest.trim_end_matches('.'))
        .and_then(|label| label.rsplit('.').next())
        .filter(|label| !label.is_empty())
        .map(String::from)
        .ok_or_else(|| {
            PreviewError::DomainResolutionError(format!("no second-level label in {domain}"))
        })
}
