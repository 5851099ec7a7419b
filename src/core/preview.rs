//! Preview frame identification and cache-busting of its source URL.

use std::time::{SystemTime, UNIX_EPOCH};

use url::{Url, form_urlencoded};

use super::page::{parse_url, url_path};

/// File name of the themed story container embedded by component pages.
pub const DEFAULT_PREVIEW_FILE: &str = "themed_story.html";

/// Query parameter carrying the cache-busting stamp.
pub const DEFAULT_CACHE_BUST_PARAM: &str = "t";

/// Predicate selecting the embedded preview frame by its source URL.
///
/// Matching is on the last path segment with query and fragment ignored, so a
/// frame whose source was already cache-busted keeps matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewFrameMatcher {
    file_name: String,
}

impl PreviewFrameMatcher {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn matches(&self, src: &str) -> bool {
        url_path(src).rsplit('/').next() == Some(self.file_name.as_str())
    }
}

impl Default for PreviewFrameMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_FILE)
    }
}

/// Produces strictly increasing millisecond stamps and applies them to URLs.
#[derive(Debug, Clone)]
pub struct CacheBuster {
    param: String,
    last_stamp: u64,
}

impl CacheBuster {
    pub fn new(param: impl Into<String>) -> Self {
        Self {
            param: param.into(),
            last_stamp: 0,
        }
    }

    /// Current epoch milliseconds, bumped past the previous stamp if the clock
    /// has not moved (or moved backwards).
    pub fn next_stamp(&mut self) -> u64 {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis().min(u64::MAX as u128) as u64)
            .unwrap_or(0);
        let stamp = now.max(self.last_stamp.saturating_add(1));
        self.last_stamp = stamp;
        stamp
    }

    /// Rewrite `src` with a fresh stamp.
    pub fn bust(&mut self, src: &str) -> String {
        let stamp = self.next_stamp();
        with_cache_bust(src, &self.param, stamp)
    }
}

impl Default for CacheBuster {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_BUST_PARAM)
    }
}

/// Remove every `param` pair from the query of `src`, keeping other pairs and the fragment.
pub fn strip_cache_bust(src: &str, param: &str) -> String {
    rewrite_query(src, param, None)
}

/// Strip prior stamps from `src` and append `param=stamp`.
pub fn with_cache_bust(src: &str, param: &str, stamp: u64) -> String {
    rewrite_query(src, param, Some(stamp))
}

fn rewrite_query(src: &str, param: &str, stamp: Option<u64>) -> String {
    match Url::parse(src) {
        Ok(mut url) if !url.cannot_be_a_base() => {
            let query = rebuild_query(url.query(), param, stamp);
            url.set_query(query.as_deref());
            url.into()
        }
        _ => {
            // Relative sources keep their authored path.
            let resolved = parse_url(src).ok();
            let path_end = src.find(['?', '#']).unwrap_or(src.len());
            let mut out = src[..path_end].to_owned();
            if let Some(query) = rebuild_query(resolved.as_ref().and_then(Url::query), param, stamp) {
                out.push('?');
                out.push_str(&query);
            }
            if let Some(fragment) = resolved.as_ref().and_then(Url::fragment) {
                out.push('#');
                out.push_str(fragment);
            }
            out
        }
    }
}

/// Re-encode `query` without any `param` pair (keys compared decoded), then
/// append the new stamp. `None` when nothing is left.
fn rebuild_query(query: Option<&str>, param: &str, stamp: Option<u64>) -> Option<String> {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    let mut empty = true;
    for (key, value) in form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
        if *key != *param {
            serializer.append_pair(&key, &value);
            empty = false;
        }
    }
    if let Some(stamp) = stamp {
        serializer.append_pair(param, &stamp.to_string());
        empty = false;
    }
    (!empty).then(|| serializer.finish())
}
