//! Duplex message channel to the remote peer.
//!
//! The transport is an external collaborator: the session only needs a way
//! to send binary frames and to receive binary frames and text signals.  A
//! connected channel is represented as a [`TransportLink`], a command sink
//! plus an event stream, so the session loop can wait on inbound events
//! and send outbound frames from independent halves.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐  TransportCommand   ┌──────────────┐    ws    ┌────────┐
//! │ SessionRunner │ ──────────────────▶ │  link task   │ ◀──────▶ │  peer  │
//! │               │ ◀────────────────── │ (websocket)  │          └────────┘
//! └───────────────┘   TransportEvent    └──────────────┘
//! ```
//!
//! [`Connector`] is the seam: production code uses
//! [`WebSocketConnector`]; tests build a link from plain channels with
//! [`TransportLink::pair`].

pub mod websocket;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

pub use websocket::WebSocketConnector;

/// Capacity of the command and event channels of a link.
pub const LINK_CHANNEL_CAPACITY: usize = 100;

// ---------------------------------------------------------------------------
// TransportError
// ---------------------------------------------------------------------------

/// Errors that can occur while establishing or running a link.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid transport URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("unsupported URL scheme '{0}' (expected ws or wss)")]
    UnsupportedScheme(String),

    #[error("connection timed out after {0}s")]
    Timeout(u64),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

// ---------------------------------------------------------------------------
// Events and commands
// ---------------------------------------------------------------------------

/// Something the peer (or the link itself) reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Connected,
    Binary(Vec<u8>),
    Text(String),
    /// The link closed.  `Some(reason)` when it failed rather than closed
    /// cleanly.
    Disconnected(Option<String>),
}

/// Something to send to the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCommand {
    SendBinary(Vec<u8>),
    SendText(String),
    Close,
}

// ---------------------------------------------------------------------------
// TransportLink
// ---------------------------------------------------------------------------

/// The session-side ends of a connected link.
#[derive(Debug)]
pub struct TransportLink {
    pub commands: mpsc::Sender<TransportCommand>,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// The transport-side ends of a link, as seen by whatever drives it.
#[derive(Debug)]
pub struct LinkEndpoint {
    pub commands: mpsc::Receiver<TransportCommand>,
    pub events: mpsc::Sender<TransportEvent>,
}

impl TransportLink {
    /// Two connected halves backed by bounded channels.
    ///
    /// ```rust
    /// use voice_link::transport::{TransportCommand, TransportLink};
    ///
    /// # #[tokio::main] async fn main() {
    /// let (link, mut endpoint) = TransportLink::pair();
    /// link.commands.send(TransportCommand::Close).await.unwrap();
    /// assert_eq!(endpoint.commands.recv().await, Some(TransportCommand::Close));
    /// # }
    /// ```
    pub fn pair() -> (TransportLink, LinkEndpoint) {
        let (cmd_tx, cmd_rx) = mpsc::channel(LINK_CHANNEL_CAPACITY);
        let (evt_tx, evt_rx) = mpsc::channel(LINK_CHANNEL_CAPACITY);
        (
            TransportLink {
                commands: cmd_tx,
                events: evt_rx,
            },
            LinkEndpoint {
                commands: cmd_rx,
                events: evt_tx,
            },
        )
    }
}

// ---------------------------------------------------------------------------
// Connector trait
// ---------------------------------------------------------------------------

/// Opens a link to the peer.
///
/// Implementations must be `Send + Sync` so they can be held behind an
/// `Arc<dyn Connector>`.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<TransportLink, TransportError>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
