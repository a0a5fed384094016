//! Application entry point — narrowband voice link client.
//!
//! # Startup sequence
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] from disk (default on first run); the first
//!    command-line argument overrides `transport.url`.  Validate it.
//! 3. Create the [`tokio`] runtime.
//! 4. Open the input and output devices.
//! 5. Build both pipeline halves at the devices' native rates.
//! 6. Start the cpal streams.
//! 7. Connect the session and read console commands until `quit`, Ctrl+C
//!    or the link goes away.
//! 8. Disconnect (waits for the session task), then stop the streams.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use voice_link::{
    audio::{AudioDevices, CaptureResampler, JitterBuffer, MuteSwitch},
    config::AppConfig,
    console::{ConsoleCommand, ConsoleListener},
    session::{lock, new_shared_state, Session, SessionParts, SessionStats, SessionStatus, SharedState},
    transport::WebSocketConnector,
};

fn main() -> Result<()> {
    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("voice-link starting up");

    // 2. Configuration
    let mut config = AppConfig::load().unwrap_or_else(|e| {
        log::warn!("Failed to load config ({e:#}); using defaults");
        AppConfig::default()
    });
    if AppConfig::is_first_run() {
        log::info!("no settings.toml found; running with defaults");
    }
    if let Some(url) = std::env::args().nth(1) {
        config.transport.url = url;
    }
    config.validate().context("invalid configuration")?;

    // 3. Tokio runtime (the session loop and the websocket pump)
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    // 4. Devices
    let devices = AudioDevices::open(&config.audio.device_selection())
        .context("failed to open audio devices")?;

    // 5. Pipelines
    let mute = MuteSwitch::new(config.audio.start_muted);
    let resampler = CaptureResampler::new(config.audio.capture(devices.input_rate()), mute.clone());
    let (frames_tx, frames_rx) = rtrb::RingBuffer::new(config.audio.capture_queue_frames);
    let capture_dropped = Arc::new(AtomicU64::new(0));
    let (playback, reader) = JitterBuffer::new(config.audio.playback(devices.output_rate()));

    // 6. Streams; each owns its pipeline half until dropped.
    let input_stream = devices
        .start_capture(resampler, frames_tx, Arc::clone(&capture_dropped))
        .context("failed to start microphone")?;
    let output_stream = devices
        .start_playback(reader)
        .context("failed to start speaker")?;

    // 7. Session
    let parts = SessionParts {
        mute,
        playback,
        capture: frames_rx,
        capture_dropped,
    };
    let result = rt.block_on(run_session(&config, parts));

    // 8. Teardown.  The session task has finished, so nothing feeds the
    //    playback queue any more.
    drop(input_stream);
    drop(output_stream);
    log::info!("voice-link stopped");

    result
}

/// Connect, then serve console commands until the session should end.
///
/// Returns an error when the link failed rather than closed.
async fn run_session(config: &AppConfig, parts: SessionParts) -> Result<()> {
    let connector = WebSocketConnector::new(config.transport.connect_timeout_secs);
    let state = new_shared_state();

    let mut session = Session::connect(&connector, &config.transport.url, state.clone(), parts)
        .await
        .with_context(|| format!("could not connect to {}", config.transport.url))?;

    println!("Connected to {}", config.transport.url);
    println!("Commands: mute, unmute, flush, status, quit");

    let (console_tx, mut console_rx) = mpsc::channel(16);
    let _console = ConsoleListener::start(console_tx).context("failed to start console")?;
    let mut console_open = true;

    let stats = loop {
        tokio::select! {
            cmd = console_rx.recv(), if console_open => match cmd {
                Some(ConsoleCommand::Mute) => {
                    if !session.set_mute(true).await {
                        log::warn!("console: session has ended, mute ignored");
                    }
                }
                Some(ConsoleCommand::Unmute) => {
                    if !session.set_mute(false).await {
                        log::warn!("console: session has ended, unmute ignored");
                    }
                }
                Some(ConsoleCommand::Flush) => {
                    if !session.flush().await {
                        log::warn!("console: session has ended, flush ignored");
                    }
                }
                Some(ConsoleCommand::Status) => print_status(&state),
                Some(ConsoleCommand::Quit) => break session.disconnect().await,
                None => {
                    log::debug!("console: stdin closed; Ctrl+C to quit");
                    console_open = false;
                }
            },

            _ = tokio::signal::ctrl_c() => {
                log::info!("console: interrupted");
                break session.disconnect().await;
            }

            stats = session.closed() => break stats,
        }
    };

    print_stats(&stats);

    let st = lock(&state);
    if st.status == SessionStatus::Error {
        bail!(
            "link failed: {}",
            st.last_error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

fn print_status(state: &SharedState) {
    let st = lock(state);
    println!(
        "Status: {}{}",
        st.status,
        if st.muted { " (muted)" } else { "" }
    );
    print_stats(&st.stats);
}

fn print_stats(stats: &SessionStats) {
    println!(
        "  sent {} / received {} frames, {} malformed, {} flushes, \
         {} outbound drops, {} capture drops, {} underruns",
        stats.frames_sent,
        stats.frames_received,
        stats.malformed_dropped,
        stats.flushes,
        stats.outbound_dropped,
        stats.capture_dropped,
        stats.underruns,
    );
}
