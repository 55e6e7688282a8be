/// Placeholder the directory shows when a record has no website
const NOT_AVAILABLE: &str = "Information Not Available";

/// Screen-reader suffix the directory appends to external links
const NEW_TAB_SUFFIX: &str = " Link opens new browser tab";

/// Cleans a website value scraped from the directory
///
/// Returns `None` for empty values and the "not available" placeholder.
/// The new-tab suffix is stripped and `https://` is prepended when no
/// scheme is present.
///
/// # Examples
///
/// ```
/// use sumi_harvest::sources::clean_website;
///
/// assert_eq!(
///     clean_website("www.school.example Link opens new browser tab"),
///     Some("https://www.school.example".to_string())
/// );
/// assert_eq!(clean_website("Information Not Available"), None);
/// ```
pub fn clean_website(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw == NOT_AVAILABLE {
        return None;
    }

    let cleaned = raw.replace(NEW_TAB_SUFFIX, "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        return None;
    }

    let lowered = cleaned.to_ascii_lowercase();
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        Some(cleaned.to_string())
    } else {
        Some(format!("https://{}", cleaned))
    }
}
