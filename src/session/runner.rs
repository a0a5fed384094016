//! Session loop — joins the audio pipeline halves to a transport link.
//!
//! [`SessionRunner`] owns the off-callback ends of both audio paths: the
//! consumer of finished capture frames and the [`JitterWriter`] feeding the
//! speaker.  It runs as a single tokio task and reacts to three sources:
//!
//! ```text
//! ControlMessage (mpsc, local)
//!   ├─ Mute(b)   → MuteSwitch::set(b)
//!   └─ Flush     → JitterWriter::flush()
//!
//! TransportEvent (link)
//!   ├─ Connected           → status = Open
//!   ├─ Binary(bytes)       → decode → JitterWriter::enqueue   (malformed: drop)
//!   ├─ Text("STOP")        → JitterWriter::flush()
//!   └─ Disconnected(err)   → status = Closed / Error, loop ends
//!
//! tick (every 10 ms)
//!   ├─ JitterWriter::top_up()
//!   └─ drain capture ring → SendBinary(frame bytes) while Open, else discard
//! ```
//!
//! Control messages are handled before transport events and in arrival
//! order within each source, so a `STOP` always takes effect before any
//! frame the peer sent after it.  When the local control channel closes the
//! runner asks the link to close, drops its command sender and ends once the
//! link reports `Disconnected`.
//!
//! The loop never waits on the outbound path.  Capture frames are offered to
//! the link with `try_send`; when its command queue is full the frame is
//! dropped and counted, exactly like a full capture ring.  Inbound events
//! therefore keep draining however slowly the peer reads.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rtrb::Consumer;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::MissedTickBehavior;

use crate::audio::{JitterWriter, MuteSwitch, TransportFrame, FRAME_DURATION_MS};
use crate::transport::{TransportCommand, TransportEvent, TransportLink};

use super::control::ControlMessage;
use super::state::{lock, SessionStats, SessionStatus, SharedState};

/// How often the capture ring is drained; half a frame period.
const CAPTURE_POLL: Duration = Duration::from_millis(FRAME_DURATION_MS / 2);

// ---------------------------------------------------------------------------
// SessionParts
// ---------------------------------------------------------------------------

/// The non-realtime ends of the audio pipeline, handed to a session.
pub struct SessionParts {
    /// Shared with the capture callback.
    pub mute: MuteSwitch,
    /// Producer side of the playback queue.
    pub playback: JitterWriter,
    /// Frames finished by the capture callback.
    pub capture: Consumer<TransportFrame>,
    /// Frames the capture callback could not queue.
    pub capture_dropped: Arc<AtomicU64>,
}

// ---------------------------------------------------------------------------
// SessionRunner
// ---------------------------------------------------------------------------

pub struct SessionRunner {
    state: SharedState,
    mute: MuteSwitch,
    playback: JitterWriter,
    capture: Consumer<TransportFrame>,
    capture_dropped: Arc<AtomicU64>,
    open: bool,
}

impl SessionRunner {
    pub fn new(state: SharedState, parts: SessionParts) -> Self {
        let SessionParts {
            mute,
            playback,
            capture,
            capture_dropped,
        } = parts;
        lock(&state).muted = mute.is_muted();
        Self {
            state,
            mute,
            playback,
            capture,
            capture_dropped,
            open: false,
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run until the link disconnects, returning the final counters.
    pub async fn run(
        mut self,
        mut control_rx: mpsc::Receiver<ControlMessage>,
        link: TransportLink,
    ) -> SessionStats {
        let TransportLink { commands, mut events } = link;
        let mut commands = Some(commands);

        let mut tick = tokio::time::interval(CAPTURE_POLL);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut closing = false;

        loop {
            tokio::select! {
                biased;

                msg = control_rx.recv(), if !closing => match msg {
                    Some(msg) => self.apply(msg),
                    None => {
                        log::info!("session: control channel closed, closing link");
                        closing = true;
                        if let Some(commands) = commands.take() {
                            let _ = commands.try_send(TransportCommand::Close);
                        }
                    }
                },

                event = events.recv() => match event {
                    Some(TransportEvent::Connected) => self.on_connected(),
                    Some(TransportEvent::Disconnected(reason)) => {
                        self.on_disconnected(reason);
                        break;
                    }
                    Some(other) => match ControlMessage::from_event(other) {
                        Some(msg) => self.apply(msg),
                        None => log::debug!("session: ignoring text message from peer"),
                    },
                    None => {
                        self.on_disconnected(None);
                        break;
                    }
                },

                _ = tick.tick() => {
                    self.playback.top_up();
                    self.forward_capture(commands.as_ref());
                }
            }
        }

        self.sync_counters();
        let stats = lock(&self.state).stats;
        stats
    }

    // -----------------------------------------------------------------------
    // Control
    // -----------------------------------------------------------------------

    /// Apply one control message to the pipeline.
    pub fn apply(&mut self, msg: ControlMessage) {
        match msg {
            ControlMessage::Mute(muted) => {
                self.mute.set(muted);
                lock(&self.state).muted = muted;
                log::info!("session: {}", if muted { "muted" } else { "unmuted" });
            }
            ControlMessage::Flush => {
                self.playback.flush();
                lock(&self.state).stats.flushes += 1;
                log::debug!("session: playback flushed");
            }
            ControlMessage::Frame(bytes) => match TransportFrame::from_bytes(&bytes) {
                Ok(frame) => {
                    self.playback.enqueue(&frame);
                    lock(&self.state).stats.frames_received += 1;
                }
                Err(e) => {
                    log::debug!("session: dropping inbound message: {e}");
                    lock(&self.state).stats.malformed_dropped += 1;
                }
            },
        }
    }

    // -----------------------------------------------------------------------
    // Link lifecycle
    // -----------------------------------------------------------------------

    fn on_connected(&mut self) {
        log::info!("session: link open");
        self.open = true;
        lock(&self.state).status = SessionStatus::Open;
    }

    fn on_disconnected(&mut self, reason: Option<String>) {
        self.open = false;
        let mut st = lock(&self.state);
        match reason {
            Some(reason) => {
                log::warn!("session: link failed: {reason}");
                st.fail(reason);
            }
            None => {
                log::info!("session: link closed");
                st.status = SessionStatus::Closed;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Capture forwarding
    // -----------------------------------------------------------------------

    /// Drain every finished capture frame; offer them to the link while it
    /// is open.
    fn forward_capture(&mut self, commands: Option<&mpsc::Sender<TransportCommand>>) {
        while let Ok(frame) = self.capture.pop() {
            let Some(commands) = commands.filter(|_| self.open) else {
                continue;
            };
            let bytes = frame.to_bytes().to_vec();
            match commands.try_send(TransportCommand::SendBinary(bytes)) {
                Ok(()) => lock(&self.state).stats.frames_sent += 1,
                Err(TrySendError::Full(_)) => lock(&self.state).stats.outbound_dropped += 1,
                Err(TrySendError::Closed(_)) => {
                    // Link task is gone; its Disconnected event ends the loop.
                    self.open = false;
                }
            }
        }
        self.sync_counters();
    }

    fn sync_counters(&self) {
        let mut st = lock(&self.state);
        st.stats.capture_dropped = self.capture_dropped.load(Ordering::Relaxed);
        st.stats.underruns = self.playback.underruns();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{JitterBuffer, JitterReader, PlaybackConfig, FRAME_SAMPLES};
    use crate::session::state::new_shared_state;
    use crate::transport::LinkEndpoint;
    use rtrb::{Producer, RingBuffer};

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    struct Harness {
        runner: SessionRunner,
        state: SharedState,
        mute: MuteSwitch,
        reader: JitterReader,
        capture_tx: Producer<TransportFrame>,
    }

    /// Runner with an 8 kHz output so one frame renders as 160 samples.
    fn harness() -> Harness {
        let state = new_shared_state();
        let mute = MuteSwitch::default();
        let (playback, reader) = JitterBuffer::new(PlaybackConfig::new(8_000));
        let (capture_tx, capture) = RingBuffer::new(256);

        let runner = SessionRunner::new(
            Arc::clone(&state),
            SessionParts {
                mute: mute.clone(),
                playback,
                capture,
                capture_dropped: Arc::new(AtomicU64::new(0)),
            },
        );
        Harness {
            runner,
            state,
            mute,
            reader,
            capture_tx,
        }
    }

    fn frame_of(value: i16) -> TransportFrame {
        TransportFrame::from_samples([value; FRAME_SAMPLES])
    }

    async fn send_events(endpoint: &LinkEndpoint, events: Vec<TransportEvent>) {
        for event in events {
            endpoint.events.send(event).await.unwrap();
        }
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    /// A STOP between frames discards the earlier ones but keeps the later.
    #[tokio::test]
    async fn stop_flushes_before_the_next_frame() {
        let Harness {
            runner,
            state,
            mut reader,
            ..
        } = harness();
        let (link, endpoint) = TransportLink::pair();
        let (_control_tx, control_rx) = mpsc::channel(4);

        send_events(
            &endpoint,
            vec![
                TransportEvent::Connected,
                TransportEvent::Binary(frame_of(100).to_bytes().to_vec()),
                TransportEvent::Binary(frame_of(200).to_bytes().to_vec()),
                TransportEvent::Text("STOP".into()),
                TransportEvent::Binary(frame_of(300).to_bytes().to_vec()),
                TransportEvent::Disconnected(None),
            ],
        )
        .await;

        let stats = runner.run(control_rx, link).await;
        assert_eq!(stats.frames_received, 3);
        assert_eq!(stats.flushes, 1);

        let mut out = [0.0_f32; FRAME_SAMPLES];
        reader.render(&mut out);
        let expected = 300.0 / 32_768.0;
        assert!(out.iter().all(|&s| (s - expected).abs() < 1e-6));

        reader.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));

        assert_eq!(state.lock().unwrap().status, SessionStatus::Closed);
    }

    /// Binary messages that are not exactly one frame are dropped.
    #[tokio::test]
    async fn malformed_frames_are_dropped() {
        let Harness {
            runner, mut reader, ..
        } = harness();
        let (link, endpoint) = TransportLink::pair();
        let (_control_tx, control_rx) = mpsc::channel(4);

        send_events(
            &endpoint,
            vec![
                TransportEvent::Connected,
                TransportEvent::Binary(vec![0x7f; 319]),
                TransportEvent::Binary(vec![0x7f; 322]),
                TransportEvent::Binary(Vec::new()),
                TransportEvent::Text("hello".into()),
                TransportEvent::Disconnected(None),
            ],
        )
        .await;

        let stats = runner.run(control_rx, link).await;
        assert_eq!(stats.malformed_dropped, 3);
        assert_eq!(stats.frames_received, 0);

        let mut out = [1.0_f32; FRAME_SAMPLES];
        reader.render(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    /// `Mute` flips the switch shared with the capture callback.
    #[tokio::test]
    async fn mute_reaches_capture_switch() {
        let Harness {
            runner,
            state,
            mute,
            ..
        } = harness();
        let (link, endpoint) = TransportLink::pair();
        let (control_tx, control_rx) = mpsc::channel(4);

        control_tx.send(ControlMessage::Mute(true)).await.unwrap();
        send_events(&endpoint, vec![TransportEvent::Disconnected(None)]).await;

        runner.run(control_rx, link).await;
        assert!(mute.is_muted());
        assert!(state.lock().unwrap().muted);
    }

    /// Capture frames produced before the link opens are discarded.
    #[tokio::test]
    async fn capture_is_forwarded_only_while_open() {
        let Harness {
            runner,
            mut capture_tx,
            ..
        } = harness();
        let (link, mut endpoint) = TransportLink::pair();
        let (_control_tx, control_rx) = mpsc::channel(4);

        capture_tx.push(frame_of(1)).unwrap();
        let task = tokio::spawn(runner.run(control_rx, link));

        // Several polls go by with the link still connecting.
        tokio::time::sleep(CAPTURE_POLL * 5).await;
        endpoint.events.send(TransportEvent::Connected).await.unwrap();
        tokio::time::sleep(CAPTURE_POLL * 2).await;
        capture_tx.push(frame_of(2)).unwrap();

        let cmd = tokio::time::timeout(Duration::from_secs(1), endpoint.commands.recv())
            .await
            .unwrap();
        assert_eq!(
            cmd,
            Some(TransportCommand::SendBinary(frame_of(2).to_bytes().to_vec()))
        );

        endpoint
            .events
            .send(TransportEvent::Disconnected(None))
            .await
            .unwrap();
        let stats = task.await.unwrap();
        assert_eq!(stats.frames_sent, 1);
    }

    /// Dropping the control sender closes the link and ends the loop.
    #[tokio::test]
    async fn closing_control_channel_closes_link() {
        let Harness { runner, state, .. } = harness();
        let (link, mut endpoint) = TransportLink::pair();
        let (control_tx, control_rx) = mpsc::channel(4);

        endpoint.events.send(TransportEvent::Connected).await.unwrap();
        let task = tokio::spawn(runner.run(control_rx, link));
        drop(control_tx);

        assert_eq!(endpoint.commands.recv().await, Some(TransportCommand::Close));
        endpoint
            .events
            .send(TransportEvent::Disconnected(None))
            .await
            .unwrap();
        task.await.unwrap();

        assert_eq!(state.lock().unwrap().status, SessionStatus::Closed);
    }

    /// A failed link leaves the session in `Error` with the reason.
    #[tokio::test]
    async fn link_failure_sets_error() {
        let Harness { runner, state, .. } = harness();
        let (link, endpoint) = TransportLink::pair();
        let (_control_tx, control_rx) = mpsc::channel(4);

        send_events(
            &endpoint,
            vec![
                TransportEvent::Connected,
                TransportEvent::Disconnected(Some("connection reset".into())),
            ],
        )
        .await;
        runner.run(control_rx, link).await;

        let st = state.lock().unwrap();
        assert_eq!(st.status, SessionStatus::Error);
        assert_eq!(st.last_error.as_deref(), Some("connection reset"));
    }

    /// Losing the link task without a final event counts as a clean close.
    #[tokio::test]
    async fn vanished_link_ends_loop() {
        let Harness { runner, state, .. } = harness();
        let (link, endpoint) = TransportLink::pair();
        let (_control_tx, control_rx) = mpsc::channel(4);

        drop(endpoint);
        runner.run(control_rx, link).await;
        assert_eq!(state.lock().unwrap().status, SessionStatus::Closed);
    }

    /// A burst longer than the playback ring is staged and played in full.
    #[tokio::test]
    async fn playback_burst_is_kept() {
        let state = new_shared_state();
        let (playback, mut reader) = JitterBuffer::new(PlaybackConfig {
            native_rate: 8_000,
            buffer_ms: 40,
        });
        let (_capture_tx, capture) = RingBuffer::new(4);
        let mut runner = SessionRunner::new(
            Arc::clone(&state),
            SessionParts {
                mute: MuteSwitch::default(),
                playback,
                capture,
                capture_dropped: Arc::new(AtomicU64::new(0)),
            },
        );

        for value in [100, 200, 300] {
            runner.apply(ControlMessage::Frame(frame_of(value).to_bytes().to_vec()));
        }
        assert_eq!(state.lock().unwrap().stats.frames_received, 3);
        assert_eq!(runner.playback.queued_samples(), 3 * FRAME_SAMPLES);

        let mut out = [0.0_f32; FRAME_SAMPLES];
        for value in [100.0, 200.0, 300.0] {
            runner.playback.top_up();
            reader.render(&mut out);
            let expected = value / 32_768.0;
            assert!(out.iter().all(|&s| (s - expected).abs() < 1e-6));
        }
    }

    /// Frames the link cannot take yet are dropped and counted; the loop
    /// does not wait for room.
    #[tokio::test]
    async fn full_link_queue_drops_capture_frames() {
        let Harness {
            runner,
            state,
            mut capture_tx,
            ..
        } = harness();
        let (link, endpoint) = TransportLink::pair();
        let (control_tx, control_rx) = mpsc::channel(4);

        endpoint.events.send(TransportEvent::Connected).await.unwrap();
        let task = tokio::spawn(runner.run(control_rx, link));
        tokio::time::sleep(CAPTURE_POLL * 2).await;
        assert_eq!(state.lock().unwrap().status, SessionStatus::Open);

        // Nobody reads the command side of the link.
        for _ in 0..150 {
            capture_tx.push(frame_of(7)).unwrap();
        }
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                let stats = state.lock().unwrap().stats;
                if stats.frames_sent + stats.outbound_dropped == 150 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("capture ring not drained");

        // Still responsive to control messages.
        control_tx.send(ControlMessage::Flush).await.unwrap();
        endpoint
            .events
            .send(TransportEvent::Disconnected(None))
            .await
            .unwrap();
        let stats = task.await.unwrap();

        assert_eq!(stats.frames_sent, crate::transport::LINK_CHANNEL_CAPACITY as u64);
        assert_eq!(stats.outbound_dropped, 50);
        assert_eq!(stats.flushes, 1);
    }

    /// A peer that stops reading must not wedge the session: control
    /// messages still apply and closing still completes.
    #[tokio::test]
    async fn stalled_peer_does_not_block_flush_or_close() {
        use crate::transport::websocket::pump;
        use futures_util::{SinkExt, StreamExt};
        use tokio_tungstenite::tungstenite::protocol::{Message, Role};
        use tokio_tungstenite::WebSocketStream;

        let state = new_shared_state();
        let (playback, _reader) = JitterBuffer::new(PlaybackConfig::new(8_000));
        let (mut capture_tx, capture) = RingBuffer::new(1024);
        let runner = SessionRunner::new(
            Arc::clone(&state),
            SessionParts {
                mute: MuteSwitch::default(),
                playback,
                capture,
                capture_dropped: Arc::new(AtomicU64::new(0)),
            },
        );
        // Small pipe so both directions fill up quickly.
        let (client_io, server_io) = tokio::io::duplex(4 * 1024);
        let client = WebSocketStream::from_raw_socket(client_io, Role::Client, None).await;
        let server = WebSocketStream::from_raw_socket(server_io, Role::Server, None).await;
        let (link, endpoint) = TransportLink::pair();
        tokio::spawn(pump(client, endpoint));

        let (control_tx, control_rx) = mpsc::channel(4);
        let task = tokio::spawn(runner.run(control_rx, link));

        let (mut peer_tx, mut peer_rx) = server.split();
        tokio::spawn(async move {
            for _ in 0..600 {
                let bytes = frame_of(11).to_bytes().to_vec();
                if peer_tx.send(Message::Binary(bytes.into())).await.is_err() {
                    break;
                }
            }
        });
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            while let Some(Ok(_)) = peer_rx.next().await {}
        });

        tokio::time::timeout(Duration::from_secs(1), async {
            while state.lock().unwrap().status != SessionStatus::Open {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("link never opened");
        for _ in 0..1000 {
            capture_tx.push(frame_of(9)).unwrap();
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        control_tx.send(ControlMessage::Flush).await.unwrap();
        tokio::time::timeout(Duration::from_secs(1), async {
            while state.lock().unwrap().stats.flushes == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("flush not applied while the peer is stalled");

        drop(control_tx);
        let stats = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("session did not finish closing")
            .unwrap();
        assert_eq!(stats.flushes, 1);
        assert_eq!(stats.frames_sent + stats.outbound_dropped, 1000);
    }
}
