//! Session status and shared statistics.
//!
//! [`SessionState`] is the single source of truth for everything the console
//! front end reports: link status, mute flag, frame counters and the last
//! error.  It lives behind [`SharedState`] (`Arc<Mutex<SessionState>>`) so
//! the session runner can update it while `main` reads it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

// ---------------------------------------------------------------------------
// SessionStatus
// ---------------------------------------------------------------------------

/// Lifecycle of the link to the peer.
///
/// ```text
/// Closed ──connect()──▶ Connecting ──handshake ok──▶ Open ──peer/local close──▶ Closed
///                                  ──handshake err─▶ Error
///                                                    Open ──socket error──────▶ Error
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Closed,
    Connecting,
    Open,
    Error,
}

impl SessionStatus {
    /// Label for the console status line.
    pub fn label(&self) -> &'static str {
        match self {
            SessionStatus::Closed => "closed",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Open => "open",
            SessionStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// SessionStats
// ---------------------------------------------------------------------------

/// Running counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Capture frames handed to the transport.
    pub frames_sent: u64,
    /// Inbound frames accepted into the playback buffer.
    pub frames_received: u64,
    /// Inbound binary messages that were not exactly one frame long.
    pub malformed_dropped: u64,
    /// Capture frames dropped because the link's send queue was full.
    pub outbound_dropped: u64,
    /// Capture frames lost because the capture queue was full.
    pub capture_dropped: u64,
    /// Output blocks that had to be padded with silence.
    pub underruns: u64,
    /// Playback flushes (STOP signals and local flush requests).
    pub flushes: u64,
}

// ---------------------------------------------------------------------------
// SessionState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub status: SessionStatus,
    pub muted: bool,
    pub stats: SessionStats,
    /// Human-readable reason for the most recent [`SessionStatus::Error`].
    pub last_error: Option<String>,
}

impl SessionState {
    /// Move to `Error`, recording `reason`.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = SessionStatus::Error;
        self.last_error = Some(reason.into());
    }
}

/// Shared handle to the session state.
pub type SharedState = Arc<Mutex<SessionState>>;

/// A fresh [`SharedState`] in [`SessionStatus::Closed`].
pub fn new_shared_state() -> SharedState {
    Arc::new(Mutex::new(SessionState::default()))
}

/// Lock `state`, recovering the data if a previous holder panicked.
pub fn lock(state: &SharedState) -> MutexGuard<'_, SessionState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
