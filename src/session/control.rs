//! Control messages understood by the session.
//!
//! Everything that can change the audio pipeline from outside the device
//! callbacks is a [`ControlMessage`]: the local front end sends `Mute`, the
//! peer sends frames and the `STOP` signal.  Inbound transport events are
//! mapped with [`ControlMessage::from_event`].

use crate::transport::TransportEvent;

/// Text signal from the peer that discards queued playback (barge-in).
pub const STOP_SIGNAL: &str = "STOP";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlMessage {
    /// Replace capture output with silence (`true`) or resume it.
    Mute(bool),
    /// Discard everything queued for playback.
    Flush,
    /// One inbound wire frame, not yet validated.
    Frame(Vec<u8>),
}

impl ControlMessage {
    /// Map a transport event to a control message.
    ///
    /// Binary payloads become [`ControlMessage::Frame`] and the `STOP` text
    /// signal becomes [`ControlMessage::Flush`].  Other text and link
    /// lifecycle events yield `None`.
    ///
    /// ```
    /// use voice_link::session::ControlMessage;
    /// use voice_link::transport::TransportEvent;
    ///
    /// assert_eq!(
    ///     ControlMessage::from_event(TransportEvent::Text("STOP".into())),
    ///     Some(ControlMessage::Flush)
    /// );
    /// assert_eq!(ControlMessage::from_event(TransportEvent::Text("hello".into())), None);
    /// ```
    pub fn from_event(event: TransportEvent) -> Option<Self> {
        match event {
            TransportEvent::Binary(bytes) => Some(ControlMessage::Frame(bytes)),
            TransportEvent::Text(text) if text == STOP_SIGNAL => Some(ControlMessage::Flush),
            TransportEvent::Text(_)
            | TransportEvent::Connected
            | TransportEvent::Disconnected(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_becomes_frame() {
        let msg = ControlMessage::from_event(TransportEvent::Binary(vec![0u8; 320]));
        assert_eq!(msg, Some(ControlMessage::Frame(vec![0u8; 320])));
    }

    #[test]
    fn binary_of_any_length_is_passed_on() {
        // Length is validated when the frame is decoded, not here.
        let msg = ControlMessage::from_event(TransportEvent::Binary(vec![1, 2, 3]));
        assert_eq!(msg, Some(ControlMessage::Frame(vec![1, 2, 3])));
    }

    #[test]
    fn stop_is_case_sensitive() {
        assert_eq!(
            ControlMessage::from_event(TransportEvent::Text("STOP".into())),
            Some(ControlMessage::Flush)
        );
        assert_eq!(
            ControlMessage::from_event(TransportEvent::Text("stop".into())),
            None
        );
        assert_eq!(
            ControlMessage::from_event(TransportEvent::Text("STOP ".into())),
            None
        );
    }

    #[test]
    fn lifecycle_events_are_not_control() {
        assert_eq!(ControlMessage::from_event(TransportEvent::Connected), None);
        assert_eq!(
            ControlMessage::from_event(TransportEvent::Disconnected(None)),
            None
        );
    }
}
