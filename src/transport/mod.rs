use std::future::Future;
use std::pin::Pin;

use futures_util::{Sink, Stream};

use crate::core::{ReloadError, WebSocketBufferConfig, WsFrame, WsTlsConfig};

pub mod tungstenite;

/// Future returned by [`WsTransport::connect`].
pub type WsTransportConnectFuture<R, W> =
    Pin<Box<dyn Future<Output = Result<(R, W), ReloadError>> + Send>>;

/// Transport boundary for websocket IO.
///
/// The actor owns lifecycle and reload state; the transport only produces a
/// reader/writer pair for one connection. Tests swap in
/// [`crate::testing::MockTransport`].
pub trait WsTransport: Clone + Send + Sync + 'static {
    type Reader: Stream<Item = Result<WsFrame, ReloadError>> + Send + Unpin + 'static;
    type Writer: Sink<WsFrame, Error = ReloadError> + Send + Sync + Unpin + 'static;

    fn connect(
        &self,
        url: String,
        buffers: WebSocketBufferConfig,
        tls: WsTlsConfig,
    ) -> WsTransportConnectFuture<Self::Reader, Self::Writer>;
}
