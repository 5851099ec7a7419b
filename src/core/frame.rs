use bytes::Bytes;

/// Transport-neutral websocket frame type.
///
/// Transports convert their native frame representation into/from `WsFrame`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WsFrame {
    Text(Bytes),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close(Option<WsCloseFrame>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WsCloseFrame {
    pub code: u16,
    pub reason: Bytes,
}

impl WsFrame {
    #[inline]
    pub fn text_static(s: &'static str) -> Self {
        Self::Text(Bytes::from_static(s.as_bytes()))
    }

    #[inline]
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(Bytes::from(s.into()))
    }

    #[inline]
    pub fn close(code: u16, reason: Bytes) -> Self {
        Self::Close(Some(WsCloseFrame { code, reason }))
    }

    /// Normal closure (1000) with no reason.
    #[inline]
    pub fn normal_close() -> Self {
        Self::close(1000, Bytes::new())
    }
}
