use std::time::Duration;

use crate::core::{
    DEFAULT_CACHE_BUST_PARAM, PageInfo, PreviewFrameMatcher, ReloadResult, WebSocketBufferConfig,
    WsTlsConfig, endpoint_for_page,
};

/// Quiet window a burst of reload notifications must settle for.
pub const DEFAULT_RELOAD_DEBOUNCE: Duration = Duration::from_millis(100);

/// Class marking the preview frame while it reloads.
pub const DEFAULT_RELOADING_CLASS: &str = "iframe-reloading";

/// How long the reloading class stays on, independent of load completion.
pub const DEFAULT_RELOADING_CLASS_DURATION: Duration = Duration::from_millis(200);

/// Runtime configuration for a live reload client.
#[derive(Clone, Debug)]
pub struct LiveReloadConfig {
    /// Notification endpoint, e.g. `ws://localhost:8080/ws/reload`.
    pub endpoint: String,
    pub reload_debounce: Duration,
    pub preview_frame: PreviewFrameMatcher,
    pub reloading_class: String,
    pub reloading_class_duration: Duration,
    pub cache_bust_param: String,
    /// Sent as a `page_info` message after every successful open when set.
    pub page_info: Option<PageInfo>,
    pub ws_buffers: WebSocketBufferConfig,
    pub tls: WsTlsConfig,
}

impl LiveReloadConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            reload_debounce: DEFAULT_RELOAD_DEBOUNCE,
            preview_frame: PreviewFrameMatcher::default(),
            reloading_class: DEFAULT_RELOADING_CLASS.to_string(),
            reloading_class_duration: DEFAULT_RELOADING_CLASS_DURATION,
            cache_bust_param: DEFAULT_CACHE_BUST_PARAM.to_string(),
            page_info: None,
            ws_buffers: WebSocketBufferConfig::default(),
            tls: WsTlsConfig::default(),
        }
    }

    /// Configuration for the page loaded from `page_url`.
    pub fn for_page(page_url: &str) -> ReloadResult<Self> {
        Ok(Self::new(endpoint_for_page(page_url)?))
    }

    pub fn with_reload_debounce(mut self, debounce: Duration) -> Self {
        self.reload_debounce = debounce;
        self
    }

    pub fn with_page_info(mut self, page_info: PageInfo) -> Self {
        self.page_info = Some(page_info);
        self
    }
}
