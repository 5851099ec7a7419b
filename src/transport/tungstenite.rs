use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::{Sink, Stream, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    Connector, MaybeTlsStream, WebSocketStream,
    connect_async_tls_with_config as tungstenite_connect_tls,
    tungstenite::{
        Message as TungsteniteMessage, Utf8Bytes,
        protocol::{CloseFrame as TungCloseFrame, WebSocketConfig},
    },
};
use tracing::debug;

use crate::core::{ReloadError, WebSocketBufferConfig, WsCloseFrame, WsFrame, WsTlsConfig};
use crate::tls::{install_rustls_crypto_provider, insecure_client_config};
use crate::transport::{WsTransport, WsTransportConnectFuture};

type TungsteniteStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

fn map_ws_error(context: &'static str, err: impl ToString) -> ReloadError {
    ReloadError::TransportError {
        context,
        error: err.to_string(),
    }
}

fn close_to_core(frame: Option<TungCloseFrame>) -> Option<WsCloseFrame> {
    frame.map(|f| WsCloseFrame {
        code: u16::from(f.code),
        reason: AsRef::<Bytes>::as_ref(&f.reason).clone(),
    })
}

fn core_to_close(frame: WsCloseFrame) -> TungCloseFrame {
    let reason = Utf8Bytes::try_from(frame.reason).unwrap_or_else(|_| Utf8Bytes::from_static(""));
    TungCloseFrame {
        code: frame.code.into(),
        reason,
    }
}

pub(crate) fn msg_to_frame(msg: TungsteniteMessage) -> WsFrame {
    match msg {
        TungsteniteMessage::Text(text) => WsFrame::Text(AsRef::<Bytes>::as_ref(&text).clone()),
        TungsteniteMessage::Binary(bytes) => WsFrame::Binary(bytes),
        TungsteniteMessage::Ping(bytes) => WsFrame::Ping(bytes),
        TungsteniteMessage::Pong(bytes) => WsFrame::Pong(bytes),
        TungsteniteMessage::Close(frame) => WsFrame::Close(close_to_core(frame)),
        TungsteniteMessage::Frame(_) => WsFrame::Binary(Bytes::new()),
    }
}

pub(crate) fn frame_to_msg(frame: WsFrame) -> TungsteniteMessage {
    match frame {
        WsFrame::Text(bytes) => match Utf8Bytes::try_from(bytes.clone()) {
            Ok(text) => TungsteniteMessage::Text(text),
            Err(_) => TungsteniteMessage::Binary(bytes),
        },
        WsFrame::Binary(bytes) => TungsteniteMessage::Binary(bytes),
        WsFrame::Ping(bytes) => TungsteniteMessage::Ping(bytes),
        WsFrame::Pong(bytes) => TungsteniteMessage::Pong(bytes),
        WsFrame::Close(frame) => TungsteniteMessage::Close(frame.map(core_to_close)),
    }
}

/// Production transport backed by tokio-tungstenite and rustls.
///
/// `wss` endpoints verify certificates against the native roots unless
/// [`WsTlsConfig::validate_certs`] is off.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteTransport;

/// `None` lets tokio-tungstenite pick its default rustls connector.
fn connector_for(url: &str, tls: WsTlsConfig) -> Option<Connector> {
    (!tls.validate_certs && url.starts_with("wss:"))
        .then(|| Connector::Rustls(insecure_client_config()))
}

pub struct TungsteniteReader {
    inner: futures_util::stream::SplitStream<TungsteniteStream>,
}

impl Stream for TungsteniteReader {
    type Item = Result<WsFrame, ReloadError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(msg))) => Poll::Ready(Some(Ok(msg_to_frame(msg)))),
            Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(map_ws_error("read", err)))),
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

pub struct TungsteniteWriter {
    inner: futures_util::stream::SplitSink<TungsteniteStream, TungsteniteMessage>,
}

impl Sink<WsFrame> for TungsteniteWriter {
    type Error = ReloadError;

    fn poll_ready(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.inner)
            .poll_ready(cx)
            .map_err(|e| map_ws_error("write", e))
    }

    fn start_send(mut self: Pin<&mut Self>, item: WsFrame) -> Result<(), Self::Error> {
        Pin::new(&mut self.inner)
            .start_send(frame_to_msg(item))
            .map_err(|e| map_ws_error("write", e))
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.inner)
            .poll_flush(cx)
            .map_err(|e| map_ws_error("write", e))
    }

    fn poll_close(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Pin::new(&mut self.inner)
            .poll_close(cx)
            .map_err(|e| map_ws_error("write", e))
    }
}

impl WsTransport for TungsteniteTransport {
    type Reader = TungsteniteReader;
    type Writer = TungsteniteWriter;

    fn connect(
        &self,
        url: String,
        buffers: WebSocketBufferConfig,
        tls: WsTlsConfig,
    ) -> WsTransportConnectFuture<Self::Reader, Self::Writer> {
        Box::pin(async move {
            install_rustls_crypto_provider();

            let mut config = WebSocketConfig::default();
            config.max_message_size = Some(buffers.max_message_bytes.max(buffers.read_buffer_bytes));
            config.max_frame_size = Some(buffers.max_frame_bytes.max(buffers.read_buffer_bytes));
            config.write_buffer_size = buffers.write_buffer_bytes;
            config.max_write_buffer_size = buffers.max_write_buffer_bytes;

            let connector = connector_for(&url, tls);
            debug!(url = %url, "opening reload websocket");
            let (stream, _) = tungstenite_connect_tls(url, Some(config), true, connector)
                .await
                .map_err(|e| ReloadError::ConnectionFailed(e.to_string()))?;

            let (write, read) = stream.split();
            Ok((
                TungsteniteReader { inner: read },
                TungsteniteWriter { inner: write },
            ))
        })
    }
}
