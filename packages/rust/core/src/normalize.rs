//! URL, tag and whitespace normalization for incoming bookmarks.

use tracing::debug;
use url::Url;
use url::form_urlencoded;

use linkshelf_shared::{LinkshelfError, Result, Tag};

/// Canonicalize a bookmark URL.
///
/// Fails with a validation error unless `raw` parses as an absolute URL with a
/// scheme and a host. The fragment is dropped, as is every query parameter
/// named in `tracking_params`; remaining parameters keep their original text
/// and order. The result is in WHATWG serialized form, so a bare host gains a
/// root path (`https://ex.com` becomes `https://ex.com/`).
pub fn normalize_url(raw: &str, tracking_params: &[String]) -> Result<Url> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| LinkshelfError::validation(format!("URL is not valid: {raw:?}: {e}")))?;

    if url.scheme().is_empty() || url.host_str().is_none_or(str::is_empty) {
        return Err(LinkshelfError::validation(format!(
            "URL is not valid: {raw:?}: missing scheme or host"
        )));
    }

    url.set_fragment(None);

    if let Some(kept) = strip_tracking(url.query(), tracking_params) {
        url.set_query((!kept.is_empty()).then_some(kept.as_str()));
    }

    debug!(%url, "URL normalized");
    Ok(url)
}

/// Returns the rewritten query when at least one tracking parameter was found.
fn strip_tracking(query: Option<&str>, tracking_params: &[String]) -> Option<String> {
    let query = query?;
    let pairs: Vec<&str> = query.split('&').collect();

    if !pairs.iter().any(|pair| is_tracking(pair, tracking_params)) {
        return None;
    }

    Some(
        pairs
            .into_iter()
            .filter(|pair| !pair.is_empty() && !is_tracking(pair, tracking_params))
            .collect::<Vec<_>>()
            .join("&"),
    )
}

fn is_tracking(pair: &str, tracking_params: &[String]) -> bool {
    form_urlencoded::parse(pair.as_bytes())
        .next()
        .is_some_and(|(name, _)| tracking_params.iter().any(|p| *p == name))
}

/// Trim each raw tag. Order, case, duplicates and empty names are kept.
pub fn normalize_tags<S: AsRef<str>>(raw: &[S]) -> Vec<Tag> {
    raw.iter().map(|t| Tag::new(t.as_ref().trim())).collect()
}

/// Collapse runs of whitespace to single spaces and trim the ends.
pub fn normalize_space(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
