use http::Uri;

use super::types::{ReloadError, ReloadResult};

/// Path the dev server exposes its reload notifications on.
pub const RELOAD_PATH: &str = "/ws/reload";

/// Derive the notification endpoint from the hosting page's URL.
///
/// The websocket scheme follows the page: `https` pages use `wss`, everything
/// else uses `ws`. Only host and port are kept from the page origin.
pub fn endpoint_for_page(page_url: &str) -> ReloadResult<String> {
    let uri: Uri = page_url
        .parse()
        .map_err(|err| ReloadError::InvalidEndpoint(format!("{page_url}: {err}")))?;

    let authority = uri
        .authority()
        .ok_or_else(|| ReloadError::InvalidEndpoint(format!("{page_url}: missing host")))?;

    let scheme = match uri.scheme_str() {
        Some(s) if s.eq_ignore_ascii_case("https") => "wss",
        _ => "ws",
    };

    let host = match authority.port_u16() {
        Some(port) => format!("{}:{port}", authority.host()),
        None => authority.host().to_string(),
    };

    Ok(format!("{scheme}://{host}{RELOAD_PATH}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_http_maps_to_ws() {
        assert_eq!(
            endpoint_for_page("http://localhost:8080/components/index.html").unwrap(),
            "ws://localhost:8080/ws/reload"
        );
    }

    #[test]
    fn https_maps_to_wss() {
        assert_eq!(
            endpoint_for_page("https://docs.example.dev/a/b?x=1").unwrap(),
            "wss://docs.example.dev/ws/reload"
        );
    }

    #[test]
    fn userinfo_is_dropped() {
        assert_eq!(
            endpoint_for_page("http://user:pw@127.0.0.1:9000/").unwrap(),
            "ws://127.0.0.1:9000/ws/reload"
        );
    }

    #[test]
    fn relative_urls_are_rejected() {
        assert!(matches!(
            endpoint_for_page("/components/index.html"),
            Err(ReloadError::InvalidEndpoint(_))
        ));
    }
}
