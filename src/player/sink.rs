//! Position sinks: any media endpoint that accepts absolute-time commands.
//!
//! The controller broadcasts every command to all sinks in order. Delivery is
//! fire-and-forget: a failing sink is logged and skipped, the rest of the
//! chain still receives the command, and nothing is retried.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SinkError {
    #[error("media channel unavailable: {0}")]
    Unavailable(String),
    #[error("media command rejected: {0}")]
    Rejected(String),
}

/// Commands understood by every sink.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "camelCase")]
pub enum SinkCommand {
    /// Seek to an absolute position (seconds).
    SetPosition { seconds: f64 },
    /// Hold playback; the controller drives position explicitly.
    Pause,
    /// Ask for the duration; the answer arrives as a separate notice.
    RequestDuration,
}

pub trait PositionSink: Send {
    fn name(&self) -> &str;

    fn set_position(&mut self, seconds: f64) -> Result<(), SinkError>;

    fn pause(&mut self) -> Result<(), SinkError>;

    /// Asks the endpoint to report its duration asynchronously.
    fn request_duration(&mut self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Duration the endpoint can report synchronously, once its metadata
    /// has loaded.
    fn element_duration(&self) -> Option<f64> {
        None
    }

    fn apply(&mut self, command: SinkCommand) -> Result<(), SinkError> {
        match command {
            SinkCommand::SetPosition { seconds } => self.set_position(seconds),
            SinkCommand::Pause => self.pause(),
            SinkCommand::RequestDuration => self.request_duration(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub dropped: usize,
}

impl DispatchReport {
    fn merge(&mut self, other: DispatchReport) {
        self.delivered += other.delivered;
        self.dropped += other.dropped;
    }
}

/// Ordered list of sinks, typically embedded player first, native element second.
#[derive(Default)]
pub struct SinkChain {
    sinks: Vec<Box<dyn PositionSink>>,
}

impl SinkChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl PositionSink + 'static) -> Self {
        self.push(Box::new(sink));
        self
    }

    pub fn push(&mut self, sink: Box<dyn PositionSink>) {
        self.sinks.push(sink);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// First valid duration exposed by a sink, in chain order.
    pub fn element_duration(&self) -> Option<f64> {
        self.sinks
            .iter()
            .filter_map(|sink| sink.element_duration())
            .find(|d| d.is_finite() && *d > 0.0)
    }

    pub fn dispatch(&mut self, command: SinkCommand) -> DispatchReport {
        let mut report = DispatchReport::default();
        for sink in &mut self.sinks {
            match sink.apply(command) {
                Ok(()) => {
                    log::debug!("sink {}: {command:?}", sink.name());
                    report.delivered += 1;
                }
                Err(err) => {
                    log::warn!("sink {}: dropped {command:?}: {err}", sink.name());
                    report.dropped += 1;
                }
            }
        }
        report
    }

    /// Seeks every sink to `seconds` and holds it paused.
    pub fn seek_and_pause(&mut self, seconds: f64) -> DispatchReport {
        let mut report = self.dispatch(SinkCommand::SetPosition { seconds });
        report.merge(self.dispatch(SinkCommand::Pause));
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct FlakySink {
        name: String,
        fail: bool,
        seen: Arc<Mutex<Vec<SinkCommand>>>,
    }

    impl PositionSink for FlakySink {
        fn name(&self) -> &str {
            &self.name
        }

        fn set_position(&mut self, seconds: f64) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::Unavailable("detached".to_string()));
            }
            self.seen
                .lock()
                .unwrap()
                .push(SinkCommand::SetPosition { seconds });
            Ok(())
        }

        fn pause(&mut self) -> Result<(), SinkError> {
            if self.fail {
                return Err(SinkError::Unavailable("detached".to_string()));
            }
            self.seen.lock().unwrap().push(SinkCommand::Pause);
            Ok(())
        }
    }

    #[test]
    fn failing_sink_does_not_block_the_rest_of_the_chain() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut chain = SinkChain::new()
            .with(FlakySink {
                name: "embed".to_string(),
                fail: true,
                seen: seen.clone(),
            })
            .with(FlakySink {
                name: "native".to_string(),
                fail: false,
                seen: seen.clone(),
            });

        let report = chain.seek_and_pause(4.5);
        assert_eq!(
            report,
            DispatchReport {
                delivered: 2,
                dropped: 2
            }
        );
        assert_eq!(
            *seen.lock().unwrap(),
            vec![SinkCommand::SetPosition { seconds: 4.5 }, SinkCommand::Pause]
        );
    }

    #[test]
    fn request_duration_defaults_to_noop() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut chain = SinkChain::new().with(FlakySink {
            name: "native".to_string(),
            fail: false,
            seen: seen.clone(),
        });

        let report = chain.dispatch(SinkCommand::RequestDuration);
        assert_eq!(report.delivered, 1);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn empty_chain_reports_nothing() {
        let mut chain = SinkChain::new();
        assert!(chain.is_empty());
        assert_eq!(chain.seek_and_pause(1.0), DispatchReport::default());
    }
}
