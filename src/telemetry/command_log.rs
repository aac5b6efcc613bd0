//! Recording sink: keeps every command that reached it, in order.
//!
//! Used by the replay tool to report what the player would have received, and
//! by tests as an inspectable fake. Availability can be toggled from outside
//! to simulate a detached player.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::player::sink::{PositionSink, SinkCommand, SinkError};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedCommand {
    pub seq: u64,
    #[serde(flatten)]
    pub command: SinkCommand,
}

/// Shared handle onto the recorded command stream.
#[derive(Debug, Clone)]
pub struct CommandLog {
    commands: Arc<Mutex<Vec<LoggedCommand>>>,
    available: Arc<AtomicBool>,
}

impl CommandLog {
    pub fn new() -> Self {
        Self {
            commands: Arc::new(Mutex::new(Vec::new())),
            available: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    pub fn commands(&self) -> Vec<LoggedCommand> {
        self.guard().clone()
    }

    /// Last position command, if any.
    pub fn last_position(&self) -> Option<f64> {
        self.guard().iter().rev().find_map(|entry| match entry.command {
            SinkCommand::SetPosition { seconds } => Some(seconds),
            _ => None,
        })
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    fn record(&self, command: SinkCommand) -> Result<(), SinkError> {
        if !self.available.load(Ordering::Relaxed) {
            return Err(SinkError::Unavailable("recording sink offline".to_string()));
        }
        let mut commands = self.guard();
        let seq = commands.len() as u64;
        commands.push(LoggedCommand { seq, command });
        Ok(())
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, Vec<LoggedCommand>> {
        self.commands.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CommandLog {
    fn default() -> Self {
        Self::new()
    }
}

pub struct RecordingSink {
    name: String,
    log: CommandLog,
}

impl RecordingSink {
    pub fn new(name: impl Into<String>, log: CommandLog) -> Self {
        Self {
            name: name.into(),
            log,
        }
    }
}

impl PositionSink for RecordingSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn set_position(&mut self, seconds: f64) -> Result<(), SinkError> {
        self.log.record(SinkCommand::SetPosition { seconds })
    }

    fn pause(&mut self) -> Result<(), SinkError> {
        self.log.record(SinkCommand::Pause)
    }

    fn request_duration(&mut self) -> Result<(), SinkError> {
        self.log.record(SinkCommand::RequestDuration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_commands_in_order() {
        let log = CommandLog::new();
        let mut sink = RecordingSink::new("recorder", log.clone());

        sink.set_position(2.0).expect("record");
        sink.pause().expect("record");

        let commands = log.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].seq, 0);
        assert_eq!(commands[1].command, SinkCommand::Pause);
        assert_eq!(log.last_position(), Some(2.0));
    }

    #[test]
    fn offline_sink_drops_commands() {
        let log = CommandLog::new();
        let mut sink = RecordingSink::new("recorder", log.clone());
        log.set_available(false);

        assert!(sink.set_position(2.0).is_err());
        assert!(log.is_empty());
    }

    #[test]
    fn logged_command_serializes_flat() {
        let entry = LoggedCommand {
            seq: 3,
            command: SinkCommand::SetPosition { seconds: 1.5 },
        };
        let json = serde_json::to_string(&entry).expect("serialize");
        assert_eq!(json, r#"{"seq":3,"command":"setPosition","seconds":1.5}"#);
    }
}
