//! Wire protocol: inbound notifications and the optional outbound page announcement.
//!
//! Inbound parsing is deliberately permissive. Only `{"type": "reload"}` carries
//! meaning; every other well-formed payload is ignored so servers can grow the
//! protocol without breaking older clients.

use serde::Serialize;
use sonic_rs::{JsonValueTrait, Value};

use super::page::PageInfo;
use super::types::{ReloadError, ReloadResult};

/// Discriminator value that triggers a reload.
pub const RELOAD_KIND: &str = "reload";

/// A parsed inbound notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    Reload,
    /// Well-formed message of a kind this client does not act on.
    Other(String),
    /// Well-formed JSON without a string `type` field (or not an object at all).
    Untyped,
}

impl InboundMessage {
    #[inline]
    pub fn is_reload(&self) -> bool {
        matches!(self, InboundMessage::Reload)
    }
}

/// Parse a raw text payload into an [`InboundMessage`].
pub fn parse_inbound(payload: &[u8]) -> ReloadResult<InboundMessage> {
    let value: Value =
        sonic_rs::from_slice(payload).map_err(|err| ReloadError::ParseFailed(err.to_string()))?;

    let message = match value.get("type").and_then(|kind| kind.as_str()) {
        Some(RELOAD_KIND) => InboundMessage::Reload,
        Some(other) => InboundMessage::Other(other.to_string()),
        None => InboundMessage::Untyped,
    };
    Ok(message)
}

/// Messages this client may send to the server.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    PageInfo(PageInfo),
}

impl OutboundMessage {
    pub fn encode(&self) -> ReloadResult<String> {
        sonic_rs::to_string(self).map_err(|err| ReloadError::ParseFailed(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::page::PageType;

    #[test]
    fn reload_payload_is_recognised() {
        assert_eq!(
            parse_inbound(br#"{"type":"reload"}"#).unwrap(),
            InboundMessage::Reload
        );
    }

    #[test]
    fn extra_fields_do_not_prevent_reload() {
        let msg = parse_inbound(br#"{"paths":["a.py"],"type":"reload","seq":7}"#).unwrap();
        assert!(msg.is_reload());
    }

    #[test]
    fn unknown_kinds_are_reported_not_rejected() {
        assert_eq!(
            parse_inbound(br#"{"type":"ping"}"#).unwrap(),
            InboundMessage::Other("ping".to_string())
        );
    }

    #[test]
    fn payloads_without_string_type_are_untyped() {
        for payload in [
            &br#"{}"#[..],
            br#"{"kind":"reload"}"#,
            br#"{"type":1}"#,
            br#"{"type":null}"#,
            br#"["reload"]"#,
            br#""reload""#,
            br#"42"#,
        ] {
            assert_eq!(
                parse_inbound(payload).unwrap(),
                InboundMessage::Untyped,
                "payload {}",
                String::from_utf8_lossy(payload)
            );
        }
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        for payload in [&b"{not json"[..], b"", b"{\"type\":\"reload\""] {
            assert!(matches!(
                parse_inbound(payload),
                Err(ReloadError::ParseFailed(_))
            ));
        }
    }

    #[test]
    fn page_info_is_tagged_on_the_wire() {
        let message = OutboundMessage::PageInfo(PageInfo {
            page_url: "/components/heading/story-0/index.html".to_string(),
            page_type: PageType::Story,
            story_id: Some("components/heading/story-0".to_string()),
        });
        let encoded = message.encode().unwrap();
        let value: Value = sonic_rs::from_str(&encoded).unwrap();
        assert_eq!(value.get("type").and_then(|v| v.as_str()), Some("page_info"));
        assert_eq!(value.get("page_type").and_then(|v| v.as_str()), Some("story"));
        assert_eq!(
            value.get("story_id").and_then(|v| v.as_str()),
            Some("components/heading/story-0")
        );
    }
}
