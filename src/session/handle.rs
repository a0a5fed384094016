//! Owning handle for a running session.
//!
//! [`Session::connect`] opens a link through a [`Connector`] and spawns a
//! [`SessionRunner`] on it.  The handle is what the front end talks to:
//! mute, flush, status and an orderly [`Session::disconnect`] that closes the
//! link and waits for the runner to finish, so nothing touches the playback
//! queue after it returns.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::transport::{Connector, TransportError};

use super::control::ControlMessage;
use super::runner::{SessionParts, SessionRunner};
use super::state::{lock, SessionStats, SessionStatus, SharedState};

/// Capacity of the local control channel.
pub const CONTROL_CHANNEL_CAPACITY: usize = 32;

pub struct Session {
    control: mpsc::Sender<ControlMessage>,
    state: SharedState,
    task: Option<JoinHandle<SessionStats>>,
    stats: SessionStats,
}

impl Session {
    /// Connect to `url` and start the session loop.
    ///
    /// `state` moves through `Connecting` to `Open`; on a failed handshake
    /// it is left in `Error` and the error is returned.
    pub async fn connect(
        connector: &dyn Connector,
        url: &str,
        state: SharedState,
        parts: SessionParts,
    ) -> Result<Self, TransportError> {
        {
            let mut st = lock(&state);
            st.status = SessionStatus::Connecting;
            st.last_error = None;
        }

        let link = match connector.connect(url).await {
            Ok(link) => link,
            Err(e) => {
                log::error!("session: connect failed: {e}");
                lock(&state).fail(e.to_string());
                return Err(e);
            }
        };

        let (control, control_rx) = mpsc::channel(CONTROL_CHANNEL_CAPACITY);
        let runner = SessionRunner::new(state.clone(), parts);
        let task = tokio::spawn(runner.run(control_rx, link));

        Ok(Self {
            control,
            state,
            task: Some(task),
            stats: SessionStats::default(),
        })
    }

    /// Mute or unmute the microphone.  Returns `false` once the session has
    /// ended.
    pub async fn set_mute(&self, muted: bool) -> bool {
        self.control.send(ControlMessage::Mute(muted)).await.is_ok()
    }

    /// Discard queued playback.  Returns `false` once the session has ended.
    pub async fn flush(&self) -> bool {
        self.control.send(ControlMessage::Flush).await.is_ok()
    }

    pub fn status(&self) -> SessionStatus {
        lock(&self.state).status
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    /// Wait until the session loop ends on its own (peer close or error).
    ///
    /// Cancel-safe; may be polled repeatedly from `select!`.
    pub async fn closed(&mut self) -> SessionStats {
        if let Some(task) = self.task.as_mut() {
            self.stats = join(task, &self.state).await;
            self.task = None;
        }
        self.stats
    }

    /// Close the link and wait for the session loop to finish.
    pub async fn disconnect(self) -> SessionStats {
        let Session {
            control,
            state,
            task,
            stats,
        } = self;
        drop(control);
        match task {
            Some(task) => join(task, &state).await,
            None => stats,
        }
    }
}

async fn join<F>(task: F, state: &SharedState) -> SessionStats
where
    F: std::future::Future<Output = Result<SessionStats, tokio::task::JoinError>>,
{
    match task.await {
        Ok(stats) => stats,
        Err(e) => {
            log::error!("session: runner task failed: {e}");
            let mut st = lock(state);
            st.fail(e.to_string());
            st.stats
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
