//! Narrowband duplex voice client.
//!
//! Captures microphone audio, reduces it to 8 kHz 16-bit transport frames and
//! sends them to a peer over a WebSocket, while playing the peer's frames
//! back through a lock-free jitter buffer that the peer can flush on
//! barge-in.
//!
//! * [`audio`] — capture resampler, playback jitter buffer, wire frames and
//!   the cpal device layer.
//! * [`transport`] — the link to the peer and its WebSocket implementation.
//! * [`session`] — joins the audio halves to a link and applies control
//!   messages.
//! * [`config`] — `settings.toml` persistence.
//! * [`console`] — stdin controls.

pub mod audio;
pub mod config;
pub mod console;
pub mod session;
pub mod transport;
