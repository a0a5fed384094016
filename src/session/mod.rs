//! Session orchestration — the non-realtime side of a duplex voice call.
//!
//! A session joins the two audio pipeline halves to one transport link and
//! applies control messages to them.  The real-time halves stay inside the
//! device callbacks; the session only ever touches their lock-free ends.
//!
//! # Architecture
//!
//! ```text
//!                  ControlMessage (mpsc)
//! console / main ─────────────────────────┐
//!        │                                ▼
//!        │ Session (handle)        SessionRunner::run()  ← tokio task
//!        │                           │      │      │
//!        │        capture ring ──────┘      │      └──── JitterWriter ──▶ playback
//!        │        (rtrb consumer)           │
//!        │                                  ▼
//!        │                           TransportLink ◀──▶ peer
//!        │
//! SharedState (Arc<Mutex<SessionState>>) ←── read for status output
//! ```
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::atomic::AtomicU64;
//! use std::sync::Arc;
//! use voice_link::audio::{JitterBuffer, MuteSwitch, PlaybackConfig};
//! use voice_link::session::{new_shared_state, Session, SessionParts};
//! use voice_link::transport::WebSocketConnector;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let (playback, _reader) = JitterBuffer::new(PlaybackConfig::new(48_000));
//!     let (_frames_tx, capture) = rtrb::RingBuffer::new(50);
//!
//!     let parts = SessionParts {
//!         mute: MuteSwitch::default(),
//!         playback,
//!         capture,
//!         capture_dropped: Arc::new(AtomicU64::new(0)),
//!     };
//!     let session = Session::connect(
//!         &WebSocketConnector::default(),
//!         "ws://localhost:8081/ws",
//!         new_shared_state(),
//!         parts,
//!     )
//!     .await?;
//!
//!     session.set_mute(true).await;
//!     session.disconnect().await;
//!     Ok(())
//! }
//! ```

pub mod control;
pub mod handle;
pub mod runner;
pub mod state;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use control::{ControlMessage, STOP_SIGNAL};
pub use handle::Session;
pub use runner::{SessionParts, SessionRunner};
pub use state::{lock, new_shared_state, SessionState, SessionStats, SessionStatus, SharedState};
