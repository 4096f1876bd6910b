//! WebSocket transport.
//!
//! Each transport runs in its own task: it performs the handshake with the
//! `tty` subprotocol, then shuttles messages between the socket and channels.
//! Lifecycle notifications come back as [`BridgeEvent`]s tagged with the
//! transport id, so events from a replaced transport are recognizably stale.
//! This is a thin layer; protocol logic stays in the Sans-IO state machines.

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{
    self, Message,
    client::IntoClientRequest,
    http::HeaderValue,
    protocol::{CloseFrame, frame::coding::CloseCode},
};
use ttybridge_app::BridgeEvent;
use ttybridge_core::TransportId;

/// WebSocket subprotocol spoken by the server.
pub const SUBPROTOCOL: &str = "tty";

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// URL or header could not form a handshake request.
    #[error("invalid request: {0}")]
    Request(String),

    /// WebSocket failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
}

enum Outgoing {
    Data(Bytes),
    Close,
}

/// Handle to a transport task.
///
/// Messages are queued to the task; dropping the handle without
/// [`TransportHandle::close`] aborts the connection without a close frame.
pub struct TransportHandle {
    to_server: mpsc::UnboundedSender<Outgoing>,
    abort_handle: tokio::task::AbortHandle,
}

impl TransportHandle {
    /// Queue one message.
    ///
    /// Returns `false` if the task already ended; its close event is on the
    /// way.
    pub fn send(&self, data: Bytes) -> bool {
        self.to_server.send(Outgoing::Data(data)).is_ok()
    }

    /// Send a normal-closure frame and wait for the server's close.
    pub fn close(&self) {
        if self.to_server.send(Outgoing::Close).is_err() {
            tracing::debug!("transport already finished");
        }
    }

    /// Abort the task immediately.
    pub fn stop(&self) {
        self.abort_handle.abort();
    }
}

/// Start connecting transport `id` to `url`.
///
/// Reports [`BridgeEvent::TransportOpened`], then messages, then exactly one
/// of [`BridgeEvent::TransportClosed`] or [`BridgeEvent::TransportFailed`].
pub fn spawn(id: TransportId, url: String, events: mpsc::UnboundedSender<BridgeEvent>) -> TransportHandle {
    let (to_server, outgoing) = mpsc::unbounded_channel();
    let task = tokio::spawn(async move {
        let terminal = match run(id, &url, outgoing, &events).await {
            Ok(code) => BridgeEvent::TransportClosed { transport: id, code },
            Err(err) => {
                tracing::warn!(transport = %id, %err, "transport failed");
                BridgeEvent::TransportFailed { transport: id, reason: err.to_string() }
            },
        };
        if events.send(terminal).is_err() {
            tracing::debug!(transport = %id, "driver gone, dropping close event");
        }
    });

    TransportHandle { to_server, abort_handle: task.abort_handle() }
}

/// Frame `data` as a binary message. The server only reads binary frames.
pub fn to_message(data: Bytes) -> Message {
    Message::Binary(data.to_vec())
}

/// Extract the close code from a close frame.
pub fn close_code(frame: Option<&CloseFrame<'_>>) -> Option<u16> {
    frame.map(|frame| u16::from(frame.code))
}

async fn run(
    id: TransportId,
    url: &str,
    mut outgoing: mpsc::UnboundedReceiver<Outgoing>,
    events: &mpsc::UnboundedSender<BridgeEvent>,
) -> Result<Option<u16>, TransportError> {
    let mut request = url
        .into_client_request()
        .map_err(|err| TransportError::Request(format!("{url}: {err}")))?;
    request.headers_mut().insert("Sec-WebSocket-Protocol", HeaderValue::from_static(SUBPROTOCOL));

    tracing::info!(transport = %id, %url, "connecting");
    let (stream, _response) = tokio_tungstenite::connect_async(request).await?;
    let (mut sink, mut stream) = stream.split();

    if events.send(BridgeEvent::TransportOpened { transport: id }).is_err() {
        return Ok(None);
    }

    let mut closing = false;
    loop {
        tokio::select! {
            message = outgoing.recv(), if !closing => match message {
                Some(Outgoing::Data(data)) => sink.send(to_message(data)).await?,
                Some(Outgoing::Close) | None => {
                    closing = true;
                    let frame = CloseFrame { code: CloseCode::Normal, reason: "".into() };
                    sink.send(Message::Close(Some(frame))).await?;
                },
            },
            message = stream.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let data = Bytes::from(text.into_bytes());
                    if events.send(BridgeEvent::TransportMessage { transport: id, data }).is_err() {
                        return Ok(None);
                    }
                },
                Some(Ok(Message::Binary(data))) => {
                    let data = Bytes::from(data);
                    if events.send(BridgeEvent::TransportMessage { transport: id, data }).is_err() {
                        return Ok(None);
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    let code = close_code(frame.as_ref());
                    tracing::info!(transport = %id, ?code, "server closed connection");
                    return Ok(code);
                },
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {},
                Some(Err(tungstenite::Error::ConnectionClosed)) | None => return Ok(None),
                Some(Err(err)) => return Err(err.into()),
            },
        }
    }
}
