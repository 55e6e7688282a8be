use crate::{UrlError, UrlResult};
use url::Url;

/// Schemes that never lead to a crawlable page
const SKIPPED_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// Canonicalizes a link found on a page for identity comparison
///
/// # Canonicalization Steps
///
/// 1. Resolve the reference against the page it was found on
/// 2. Reject anything that is not HTTP(S) or has no host
/// 3. Drop the fragment
/// 4. Drop the query string
///
/// Scheme, host, port and path are kept as the URL parser produced them.
/// No trailing-slash folding, `www.` stripping or scheme upgrading is done,
/// so `https://a.example/x` and `https://a.example/x/` are distinct pages.
///
/// # Arguments
///
/// * `href` - The reference as written in the document (absolute or relative)
/// * `base` - The URL of the page the reference was found on
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::canonicalize;
/// use url::Url;
///
/// let base = Url::parse("https://same.example/dir/page").unwrap();
/// let url = canonicalize("../about?x=1#team", &base).unwrap();
/// assert_eq!(url.as_str(), "https://same.example/about");
/// ```
pub fn canonicalize(href: &str, base: &Url) -> UrlResult<Url> {
    let href = href.trim();
    let lowered = href.to_ascii_lowercase();
    if let Some(scheme) = SKIPPED_SCHEMES.iter().find(|s| lowered.starts_with(*s)) {
        return Err(UrlError::InvalidScheme(scheme.trim_end_matches(':').to_string()));
    }

    let url = base
        .join(href)
        .map_err(|e| UrlError::Parse(format!("{}: {}", href, e)))?;
    strip_identity_noise(url)
}

/// Parses and canonicalizes an absolute URL
///
/// Used for seed URLs, which have no page to be resolved against.
///
/// # Examples
///
/// ```
/// use sumi_harvest::url::normalize_url;
///
/// let url = normalize_url("https://School.Example/home?utm=1#top").unwrap();
/// assert_eq!(url.as_str(), "https://school.example/home");
/// ```
pub fn normalize_url(url_str: &str) -> UrlResult<Url> {
    let url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;
    strip_identity_noise(url)
}

fn strip_identity_noise(mut url: Url) -> UrlResult<Url> {
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingDomain);
    }

    url.set_fragment(None);
    url.set_query(None);
    Ok(url)
}
