//! Line-oriented local controls read from stdin.
//!
//! The client has no window; the operator types commands instead:
//!
//! | Input                 | Command                  |
//! |-----------------------|--------------------------|
//! | `mute` / `m`          | [`ConsoleCommand::Mute`]   |
//! | `unmute` / `u`        | [`ConsoleCommand::Unmute`] |
//! | `flush` / `f`         | [`ConsoleCommand::Flush`]  |
//! | `status` / `s`        | [`ConsoleCommand::Status`] |
//! | `quit` / `q` / `exit` | [`ConsoleCommand::Quit`]   |
//!
//! Blocking reads from stdin cannot be cancelled, so they run on a dedicated
//! OS thread ([`ConsoleListener::start`]) that forwards parsed commands over
//! a `tokio::sync::mpsc` channel.  The channel closes when input ends.

use std::io::BufRead;

use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Mute,
    Unmute,
    /// Drop queued playback locally, as if the peer had sent `STOP`.
    Flush,
    /// Print link status and counters.
    Status,
    /// Disconnect and exit.
    Quit,
}

/// Parse one line of operator input.
///
/// Surrounding whitespace and case are ignored.  Returns `None` for blank or
/// unrecognised input.
///
/// ```
/// use voice_link::console::{parse_command, ConsoleCommand};
///
/// assert_eq!(parse_command("mute"), Some(ConsoleCommand::Mute));
/// assert_eq!(parse_command("  Q \n"), Some(ConsoleCommand::Quit));
/// assert_eq!(parse_command("louder"), None);
/// ```
pub fn parse_command(line: &str) -> Option<ConsoleCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "mute" | "m" => Some(ConsoleCommand::Mute),
        "unmute" | "u" => Some(ConsoleCommand::Unmute),
        "flush" | "f" => Some(ConsoleCommand::Flush),
        "status" | "s" => Some(ConsoleCommand::Status),
        "quit" | "q" | "exit" => Some(ConsoleCommand::Quit),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// ConsoleListener
// ---------------------------------------------------------------------------

/// Handle to the console reader thread.
///
/// The thread lives until input ends or the receiving side is dropped;
/// a read blocked on an interactive terminal is abandoned at process exit.
pub struct ConsoleListener {
    _thread: std::thread::JoinHandle<()>,
}

impl ConsoleListener {
    /// Read commands from the process's stdin.
    pub fn start(tx: mpsc::Sender<ConsoleCommand>) -> std::io::Result<Self> {
        Self::start_with(std::io::BufReader::new(std::io::stdin()), tx)
    }

    /// Read commands from any line source.
    pub fn start_with<R>(reader: R, tx: mpsc::Sender<ConsoleCommand>) -> std::io::Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let thread = std::thread::Builder::new()
            .name("console-listener".into())
            .spawn(move || {
                for line in reader.lines() {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            log::warn!("console: failed to read input: {e}");
                            break;
                        }
                    };
                    match parse_command(&line) {
                        Some(cmd) => {
                            if tx.blocking_send(cmd).is_err() {
                                break;
                            }
                        }
                        None if line.trim().is_empty() => {}
                        None => println!("Unknown command: {}", line.trim()),
                    }
                }
                log::debug!("console: input closed");
            })?;

        Ok(Self { _thread: thread })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
