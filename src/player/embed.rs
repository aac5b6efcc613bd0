//! Embedded (cross-origin) player adapter.
//!
//! Commands are posted as JSON messages to a sandboxed player frame:
//!   `{"method":"setCurrentTime","value":t}`, `{"method":"pause"}`,
//!   `{"method":"seek","time":t}`, `{"method":"getDuration"}`.
//! The player answers with `{"duration":d}` notices, which are only trusted
//! when they come from the configured origin.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

use crate::player::sink::{PositionSink, SinkError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum PlayerMessage {
    SetCurrentTime { value: f64 },
    Pause,
    Seek { time: f64 },
    GetDuration,
}

/// Transport for posting messages into the player frame.
pub trait MessagePort: Send {
    fn post(&mut self, message: &PlayerMessage, target_origin: &str) -> Result<(), SinkError>;
}

/// Message ready to be handed to the frame by the host bridge.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundMessage {
    pub target_origin: String,
    pub payload: String,
}

/// Port backed by a channel drained by the host bridge.
pub struct ChannelPort {
    tx: UnboundedSender<OutboundMessage>,
}

impl ChannelPort {
    pub fn new(tx: UnboundedSender<OutboundMessage>) -> Self {
        Self { tx }
    }
}

impl MessagePort for ChannelPort {
    fn post(&mut self, message: &PlayerMessage, target_origin: &str) -> Result<(), SinkError> {
        let payload = serde_json::to_string(message)
            .map_err(|e| SinkError::Rejected(format!("failed to encode {message:?}: {e}")))?;
        self.tx
            .send(OutboundMessage {
                target_origin: target_origin.to_string(),
                payload,
            })
            .map_err(|_| SinkError::Unavailable("player frame bridge closed".to_string()))
    }
}

pub struct EmbeddedPlayer<P: MessagePort> {
    port: P,
    origin: String,
    mirror_seek: bool,
}

impl<P: MessagePort> EmbeddedPlayer<P> {
    pub fn new(port: P, origin: impl Into<String>, mirror_seek: bool) -> Self {
        Self {
            port,
            origin: origin.into(),
            mirror_seek,
        }
    }

    fn post(&mut self, message: PlayerMessage) -> Result<(), SinkError> {
        self.port.post(&message, &self.origin)
    }
}

impl<P: MessagePort> PositionSink for EmbeddedPlayer<P> {
    fn name(&self) -> &str {
        "embedded-player"
    }

    fn set_position(&mut self, seconds: f64) -> Result<(), SinkError> {
        self.post(PlayerMessage::SetCurrentTime { value: seconds })?;
        if self.mirror_seek {
            self.post(PlayerMessage::Seek { time: seconds })?;
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<(), SinkError> {
        self.post(PlayerMessage::Pause)
    }

    fn request_duration(&mut self) -> Result<(), SinkError> {
        self.post(PlayerMessage::GetDuration)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NoticeError {
    #[error("notice from untrusted origin {0}")]
    UntrustedOrigin(String),
    #[error("notice carries no duration")]
    MissingDuration,
    #[error("notice carries invalid duration {0}")]
    InvalidDuration(f64),
}

/// Validates inbound player notices.
#[derive(Debug, Clone)]
pub struct OriginGuard {
    trusted: String,
}

impl OriginGuard {
    pub fn new(trusted: impl Into<String>) -> Self {
        Self {
            trusted: trusted.into(),
        }
    }

    /// Extracts the duration from a notice, rejecting wrong origins and
    /// malformed payloads. Payloads posted as JSON strings are decoded first.
    pub fn duration_from_notice(&self, origin: &str, data: &Value) -> Result<f64, NoticeError> {
        if origin.trim_end_matches('/') != self.trusted.trim_end_matches('/') {
            return Err(NoticeError::UntrustedOrigin(origin.to_string()));
        }

        let decoded;
        let data = match data {
            Value::String(raw) => {
                decoded = serde_json::from_str::<Value>(raw)
                    .map_err(|_| NoticeError::MissingDuration)?;
                &decoded
            }
            other => other,
        };

        let duration = data
            .get("duration")
            .and_then(Value::as_f64)
            .ok_or(NoticeError::MissingDuration)?;

        if duration.is_finite() && duration > 0.0 {
            Ok(duration)
        } else {
            Err(NoticeError::InvalidDuration(duration))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::sync::mpsc::unbounded_channel;

    const ORIGIN: &str = "https://streamable.com";

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<OutboundMessage>) -> Vec<Value> {
        let mut out = Vec::new();
        while let Ok(message) = rx.try_recv() {
            assert_eq!(message.target_origin, ORIGIN);
            out.push(serde_json::from_str(&message.payload).expect("payload is json"));
        }
        out
    }

    #[test]
    fn set_position_posts_current_time_and_mirrored_seek() {
        let (tx, mut rx) = unbounded_channel();
        let mut player = EmbeddedPlayer::new(ChannelPort::new(tx), ORIGIN, true);

        player.set_position(15.0).expect("post");
        player.pause().expect("post");

        assert_eq!(
            drain(&mut rx),
            vec![
                json!({"method":"setCurrentTime","value":15.0}),
                json!({"method":"seek","time":15.0}),
                json!({"method":"pause"}),
            ]
        );
    }

    #[test]
    fn mirror_seek_can_be_disabled() {
        let (tx, mut rx) = unbounded_channel();
        let mut player = EmbeddedPlayer::new(ChannelPort::new(tx), ORIGIN, false);

        player.set_position(3.0).expect("post");
        player.request_duration().expect("post");

        assert_eq!(
            drain(&mut rx),
            vec![
                json!({"method":"setCurrentTime","value":3.0}),
                json!({"method":"getDuration"}),
            ]
        );
    }

    #[test]
    fn closed_bridge_reports_unavailable() {
        let (tx, rx) = unbounded_channel();
        drop(rx);
        let mut player = EmbeddedPlayer::new(ChannelPort::new(tx), ORIGIN, true);
        assert!(matches!(
            player.set_position(1.0),
            Err(SinkError::Unavailable(_))
        ));
    }

    #[test]
    fn guard_accepts_trusted_duration_notice() {
        let guard = OriginGuard::new(ORIGIN);
        assert_eq!(
            guard.duration_from_notice(ORIGIN, &json!({"duration": 42.0})),
            Ok(42.0)
        );
        assert_eq!(
            guard.duration_from_notice(ORIGIN, &json!("{\"duration\":7}")),
            Ok(7.0)
        );
    }

    #[test]
    fn guard_rejects_foreign_origin_and_bad_payloads() {
        let guard = OriginGuard::new(ORIGIN);
        assert_eq!(
            guard.duration_from_notice("https://evil.example", &json!({"duration": 42.0})),
            Err(NoticeError::UntrustedOrigin(
                "https://evil.example".to_string()
            ))
        );
        assert_eq!(
            guard.duration_from_notice(ORIGIN, &json!({"event": "ready"})),
            Err(NoticeError::MissingDuration)
        );
        assert_eq!(
            guard.duration_from_notice(ORIGIN, &json!({"duration": 0})),
            Err(NoticeError::InvalidDuration(0.0))
        );
    }
}
