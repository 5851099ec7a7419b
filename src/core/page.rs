use serde::Serialize;
use url::Url;

/// Origin used to resolve relative page and frame URLs. Only path, query and
/// fragment are ever read back from the result.
const RELATIVE_BASE: &str = "http://localhost/";

/// Kind of page a client is viewing, as understood by the reload server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Story,
    StoryContainer,
    NonStory,
}

/// Page description announced to the server after each successful open.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    pub page_url: String,
    pub page_type: PageType,
    pub story_id: Option<String>,
}

impl PageInfo {
    /// Classify a page path and derive its story id.
    pub fn from_page_url(page_url: impl Into<String>) -> Self {
        let page_url = page_url.into();
        let page_type = classify_page_type(&page_url);
        let story_id = match page_type {
            PageType::Story => story_id_from_url(&page_url),
            PageType::StoryContainer | PageType::NonStory => None,
        };
        Self {
            page_url,
            page_type,
            story_id,
        }
    }
}

/// `story-N/index.html` pages are stories, `themed_story.html` hosts a story frame.
pub fn classify_page_type(page_url: &str) -> PageType {
    let path = url_path(page_url);
    if path.contains("story-") && path.ends_with("/index.html") {
        PageType::Story
    } else if path.contains("themed_story.html") {
        PageType::StoryContainer
    } else {
        PageType::NonStory
    }
}

/// `/components/heading/story-0/index.html` -> `components/heading/story-0`.
pub fn story_id_from_url(page_url: &str) -> Option<String> {
    let path = url_path(page_url);
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.last() == Some(&"index.html") {
        segments.pop();
    }

    let story_at = segments.iter().position(|s| s.starts_with("story-"))?;
    Some(segments[..=story_at].join("/"))
}

/// Parse `src` as an absolute URL, or resolve it against a placeholder origin.
pub(crate) fn parse_url(src: &str) -> Result<Url, url::ParseError> {
    Url::parse(src).or_else(|_| Url::parse(RELATIVE_BASE).and_then(|base| base.join(src)))
}

/// Path component of `src`, without query or fragment.
pub(crate) fn url_path(src: &str) -> String {
    match parse_url(src) {
        Ok(url) => url.path().to_owned(),
        Err(_) => src.to_owned(),
    }
}
