//! WebSocket link built on `tokio-tungstenite`.
//!
//! Binary messages carry transport frames in both directions; text messages
//! carry control signals from the peer.  [`WebSocketConnector::connect`]
//! performs the handshake (bounded by a timeout) and spawns a pump task that
//! bridges the socket to a [`TransportLink`].  The pump ends when the peer
//! closes, the socket errors, or the session sends
//! [`TransportCommand::Close`] / drops its command sender; in every case it
//! reports a final [`TransportEvent::Disconnected`].
//!
//! There is no reconnect: a dropped link ends the session.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async, WebSocketStream};
use url::Url;

use super::{Connector, LinkEndpoint, TransportCommand, TransportError, TransportEvent, TransportLink};

/// Parse `url` and require a `ws` or `wss` scheme.
pub fn validate_url(url: &str) -> Result<Url, TransportError> {
    let parsed = Url::parse(url)?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(parsed),
        other => Err(TransportError::UnsupportedScheme(other.to_string())),
    }
}

// ---------------------------------------------------------------------------
// WebSocketConnector
// ---------------------------------------------------------------------------

/// Production [`Connector`].
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    timeout: Duration,
}

impl WebSocketConnector {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout: Duration::from_secs(timeout_secs),
        }
    }
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self::new(10)
    }
}

#[async_trait]
impl Connector for WebSocketConnector {
    async fn connect(&self, url: &str) -> Result<TransportLink, TransportError> {
        let url = validate_url(url)?;

        log::info!("transport: connecting to {url}");
        let (ws, _response) = tokio::time::timeout(self.timeout, connect_async(url.as_str()))
            .await
            .map_err(|_| TransportError::Timeout(self.timeout.as_secs()))??;
        log::info!("transport: connected");

        let (link, endpoint) = TransportLink::pair();
        tokio::spawn(pump(ws, endpoint));
        Ok(link)
    }
}

// ---------------------------------------------------------------------------
// Pump
// ---------------------------------------------------------------------------

/// Bridge `ws` to `endpoint` until either side goes away.
pub(crate) async fn pump<S>(ws: WebSocketStream<S>, endpoint: LinkEndpoint)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let LinkEndpoint {
        mut commands,
        events,
    } = endpoint;
    let (mut write, mut read) = ws.split();

    if events.send(TransportEvent::Connected).await.is_err() {
        return;
    }

    let reason = loop {
        tokio::select! {
            msg = read.next() => {
                let event = match msg {
                    Some(Ok(Message::Binary(data))) => TransportEvent::Binary(data.to_vec()),
                    Some(Ok(Message::Text(text))) => TransportEvent::Text(text.as_str().to_owned()),
                    Some(Ok(Message::Close(frame))) => {
                        log::info!("transport: peer closed connection: {frame:?}");
                        break None;
                    }
                    // Ping/pong are answered by tungstenite itself.
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break Some(e.to_string()),
                    None => break None,
                };
                if events.send(event).await.is_err() {
                    let _ = write.send(Message::Close(None)).await;
                    break None;
                }
            }
            cmd = commands.recv() => {
                let result = match cmd {
                    Some(TransportCommand::SendBinary(data)) => {
                        write.send(Message::Binary(data.into())).await
                    }
                    Some(TransportCommand::SendText(text)) => {
                        write.send(Message::Text(text.into())).await
                    }
                    Some(TransportCommand::Close) | None => {
                        let _ = write.send(Message::Close(None)).await;
                        break None;
                    }
                };
                if let Err(e) = result {
                    break Some(e.to_string());
                }
            }
        }
    };

    match &reason {
        Some(e) => log::warn!("transport: link failed: {e}"),
        None => log::info!("transport: link closed"),
    }
    let _ = events.send(TransportEvent::Disconnected(reason)).await;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
