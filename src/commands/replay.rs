//! replay — runs a recorded input script (script.json) through a controller.
//!
//! Time is virtual: events are applied in `ts` order and the handshake and
//! grace-period timers fire at their due timestamps, so a report is fully
//! determined by the script and the config.

use std::path::Path;

use serde::Serialize;
use uuid::Uuid;

use crate::algorithm::scrub_engine::{Disposition, ScrubController, ScrubSnapshot};
use crate::models::config::{ConfigError, ScrubConfig};
use crate::models::events::{ScriptFile, ScrubEvent, SCHEMA_VERSION};
use crate::page::scroll_lock::{BodyStyle, BodyStyleLock};
use crate::player::embed::{ChannelPort, EmbeddedPlayer, OriginGuard, OutboundMessage};
use crate::player::native::{ElementState, NativeSink, SharedMediaElement};
use crate::player::sink::SinkChain;
use crate::session::driver::apply_event;
use crate::telemetry::command_log::{CommandLog, LoggedCommand, RecordingSink};

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("Failed to read script {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse script {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unsupported script schemaVersion: expected {expected}, got {got}")]
    UnsupportedSchema { expected: u32, got: u32 },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub session_id: String,
    pub events_applied: usize,
    pub events_consumed: usize,
    /// Virtual time (ms) at which page scroll was restored, if it was.
    pub unlocked_at_ms: Option<u64>,
    pub snapshot: ScrubSnapshot,
    pub page: BodyStyle,
    /// Fallback element state at the end of the replay.
    pub element: ElementState,
    /// Wire messages posted to the embedded player, in order.
    pub messages: Vec<OutboundMessage>,
    pub commands: Vec<LoggedCommand>,
}

pub fn load_script(path: &Path) -> Result<ScriptFile, ReplayError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ReplayError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let script: ScriptFile = serde_json::from_str(&raw).map_err(|source| ReplayError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    if script.schema_version != SCHEMA_VERSION {
        return Err(ReplayError::UnsupportedSchema {
            expected: SCHEMA_VERSION,
            got: script.schema_version,
        });
    }

    Ok(script)
}

#[derive(Debug, Clone, Copy)]
enum Timer {
    Handshake,
    Unlock { epoch: u64 },
}

/// Pending virtual timers, fired in due order.
#[derive(Default)]
struct TimerQueue {
    pending: Vec<(u64, Timer)>,
}

impl TimerQueue {
    fn schedule(&mut self, due_ms: u64, timer: Timer) {
        self.pending.push((due_ms, timer));
        self.pending.sort_by_key(|(due, _)| *due);
    }

    fn pop_due(&mut self, now_ms: u64) -> Option<(u64, Timer)> {
        match self.pending.first() {
            Some((due, _)) if *due <= now_ms => Some(self.pending.remove(0)),
            _ => None,
        }
    }

    fn drop_unlocks(&mut self) {
        self.pending
            .retain(|(_, timer)| !matches!(timer, Timer::Unlock { .. }));
    }
}

pub fn replay_script(
    script: &ScriptFile,
    config: ScrubConfig,
) -> Result<ReplayReport, ReplayError> {
    config.validate()?;

    let session_id = Uuid::new_v4();
    let commands = CommandLog::new();
    let page = BodyStyleLock::new();
    let guard = OriginGuard::new(config.trusted_origin.clone());

    let mut timers = TimerQueue::default();
    timers.schedule(config.handshake_delay_ms, Timer::Handshake);

    let element = SharedMediaElement::attached(None);
    let (message_tx, mut message_rx) = tokio::sync::mpsc::unbounded_channel();
    let sinks = SinkChain::new()
        .with(EmbeddedPlayer::new(
            ChannelPort::new(message_tx),
            config.trusted_origin.clone(),
            config.mirror_seek,
        ))
        .with(NativeSink::new(element.clone()))
        .with(RecordingSink::new("replay", commands.clone()));
    let mut controller = ScrubController::mount(config, sinks, page.clone());

    let mut events: Vec<&ScrubEvent> = script.events.iter().collect();
    events.sort_by_key(|event| event.ts());

    log::info!("replay {session_id}: {} events", events.len());

    let mut unlocked_at_ms = None;
    let mut events_consumed = 0usize;
    for event in &events {
        fire_due(&mut controller, &mut timers, event.ts(), &mut unlocked_at_ms);

        if let ScrubEvent::MetadataLoaded { duration, .. } = event {
            element.set_duration(*duration);
        }
        if apply_event(&mut controller, &guard, event) == Disposition::Consumed {
            events_consumed += 1;
        }
        if matches!(event, ScrubEvent::Reset { .. }) {
            timers.drop_unlocks();
            unlocked_at_ms = None;
        }
        if let Some(scheduled) = controller.take_scheduled_unlock() {
            let delay_ms = u64::try_from(scheduled.delay.as_millis()).unwrap_or(u64::MAX);
            let due = event.ts().saturating_add(delay_ms);
            timers.schedule(
                due,
                Timer::Unlock {
                    epoch: scheduled.epoch,
                },
            );
        }
    }
    fire_due(&mut controller, &mut timers, u64::MAX, &mut unlocked_at_ms);

    let report = ReplayReport {
        session_id: session_id.to_string(),
        events_applied: events.len(),
        events_consumed,
        unlocked_at_ms,
        snapshot: controller.snapshot(),
        page: page.style(),
        element: element.state(),
        messages: std::iter::from_fn(|| message_rx.try_recv().ok()).collect(),
        commands: commands.commands(),
    };
    log::info!(
        "replay {session_id}: finished in {:?} at progress {:.3}",
        report.snapshot.mode,
        report.snapshot.progress
    );
    Ok(report)
}

fn fire_due(
    controller: &mut ScrubController,
    timers: &mut TimerQueue,
    now_ms: u64,
    unlocked_at_ms: &mut Option<u64>,
) {
    while let Some((due, timer)) = timers.pop_due(now_ms) {
        match timer {
            Timer::Handshake => controller.begin_handshake(),
            Timer::Unlock { epoch } => {
                if controller.complete_unlock(epoch) {
                    *unlocked_at_ms = Some(due);
                }
            }
        }
    }
}

pub fn replay_file(
    script_path: &Path,
    config_path: Option<&Path>,
) -> Result<ReplayReport, ReplayError> {
    let config = match config_path {
        Some(path) => ScrubConfig::from_json_file(path)?,
        None => ScrubConfig::default(),
    };
    let script = load_script(script_path)?;
    replay_script(&script, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::scrub_engine::ScrubMode;
    use crate::page::scroll_lock::Overflow;
    use crate::player::sink::SinkCommand;
    use serde_json::json;

    fn script(events: Vec<ScrubEvent>) -> ScriptFile {
        ScriptFile {
            schema_version: SCHEMA_VERSION,
            events,
        }
    }

    fn linear() -> ScrubConfig {
        ScrubConfig {
            scroll_sensitivity: 1.0,
            enable_easing: false,
            ..ScrubConfig::default()
        }
    }

    #[test]
    fn wheel_before_handshake_is_swallowed() {
        let report = replay_script(
            &script(vec![
                ScrubEvent::Wheel {
                    ts: 100,
                    delta_y: 800.0,
                },
                ScrubEvent::Wheel {
                    ts: 1_600,
                    delta_y: 500.0,
                },
            ]),
            linear(),
        )
        .expect("replay");

        assert_eq!(report.events_consumed, 2);
        assert_eq!(report.snapshot.accumulator, 500.0);
        assert_eq!(report.snapshot.progress, 0.25);
        assert_eq!(report.page.overflow, Overflow::Hidden);
    }

    #[test]
    fn full_scrub_unlocks_after_grace_period() {
        let report = replay_script(
            &script(vec![
                ScrubEvent::Message {
                    ts: 1_700,
                    origin: "https://streamable.com".to_string(),
                    data: json!({"duration": 20.0}),
                },
                ScrubEvent::Wheel {
                    ts: 1_800,
                    delta_y: 1_000.0,
                },
                ScrubEvent::Wheel {
                    ts: 1_900,
                    delta_y: 1_000.0,
                },
            ]),
            linear(),
        )
        .expect("replay");

        assert_eq!(report.snapshot.mode, ScrubMode::Released);
        assert_eq!(report.snapshot.target_time, 20.0);
        assert_eq!(report.unlocked_at_ms, Some(2_100));
        assert_eq!(report.page.overflow, Overflow::Auto);
        assert_eq!(report.element.current_time, 20.0);
        assert!(report.element.paused);
    }

    #[test]
    fn embedded_player_receives_wire_messages() {
        let report = replay_script(
            &script(vec![ScrubEvent::Wheel {
                ts: 1_600,
                delta_y: 1_000.0,
            }]),
            linear(),
        )
        .expect("replay");

        let payloads: Vec<serde_json::Value> = report
            .messages
            .iter()
            .map(|message| serde_json::from_str(&message.payload).expect("json payload"))
            .collect();
        assert_eq!(
            payloads,
            vec![
                json!({"method":"pause"}),
                json!({"method":"setCurrentTime","value":0.0}),
                json!({"method":"seek","time":0.0}),
                json!({"method":"getDuration"}),
                json!({"method":"setCurrentTime","value":15.0}),
                json!({"method":"seek","time":15.0}),
                json!({"method":"pause"}),
            ]
        );
        assert!(report
            .messages
            .iter()
            .all(|message| message.target_origin == "https://streamable.com"));
    }

    #[test]
    fn events_are_applied_in_timestamp_order() {
        let report = replay_script(
            &script(vec![
                ScrubEvent::KeyDown {
                    ts: 3_000,
                    key_code: "Escape".to_string(),
                },
                ScrubEvent::Wheel {
                    ts: 2_000,
                    delta_y: 200.0,
                },
            ]),
            linear(),
        )
        .expect("replay");

        assert_eq!(report.snapshot.mode, ScrubMode::Released);
        assert_eq!(report.snapshot.accumulator, 200.0);
        assert_eq!(report.unlocked_at_ms, None);
        assert_eq!(report.page.overflow, Overflow::Auto);
    }

    #[test]
    fn reset_drops_pending_unlock() {
        let report = replay_script(
            &script(vec![
                ScrubEvent::MetadataLoaded {
                    ts: 0,
                    duration: Some(8.0),
                },
                ScrubEvent::Wheel {
                    ts: 10,
                    delta_y: 2_000.0,
                },
                ScrubEvent::Reset { ts: 50 },
            ]),
            linear(),
        )
        .expect("replay");

        assert_eq!(report.snapshot.mode, ScrubMode::Locked);
        assert_eq!(report.snapshot.progress, 0.0);
        assert_eq!(report.unlocked_at_ms, None);
        assert_eq!(report.page.overflow, Overflow::Hidden);
    }

    #[test]
    fn late_handshake_keeps_released_position() {
        let report = replay_script(
            &script(vec![
                ScrubEvent::MetadataLoaded {
                    ts: 0,
                    duration: Some(30.0),
                },
                ScrubEvent::Wheel {
                    ts: 10,
                    delta_y: 2_000.0,
                },
            ]),
            linear(),
        )
        .expect("replay");

        assert_eq!(report.snapshot.mode, ScrubMode::Released);
        assert_eq!(report.element.current_time, 30.0);
        let last_seek = report.commands.iter().rev().find_map(|logged| match logged.command {
            SinkCommand::SetPosition { seconds } => Some(seconds),
            _ => None,
        });
        assert_eq!(last_seek, Some(30.0));
    }

    #[test]
    fn element_duration_drives_native_scrub() {
        let report = replay_script(
            &script(vec![
                ScrubEvent::MetadataLoaded {
                    ts: 0,
                    duration: Some(12.0),
                },
                ScrubEvent::Wheel {
                    ts: 1_600,
                    delta_y: 1_000.0,
                },
            ]),
            linear(),
        )
        .expect("replay");

        assert_eq!(report.snapshot.duration, 12.0);
        assert_eq!(report.element.current_time, 6.0);
    }

    #[test]
    fn release_at_end_of_clock_unlocks_without_overflow() {
        let report = replay_script(
            &script(vec![
                ScrubEvent::MetadataLoaded {
                    ts: 0,
                    duration: Some(10.0),
                },
                ScrubEvent::Wheel {
                    ts: u64::MAX,
                    delta_y: 2_000.0,
                },
            ]),
            linear(),
        )
        .expect("replay");

        assert_eq!(report.snapshot.mode, ScrubMode::Released);
        assert_eq!(report.unlocked_at_ms, Some(u64::MAX));
        assert_eq!(report.page.overflow, Overflow::Auto);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = ScrubConfig {
            scroll_distance: -1.0,
            ..ScrubConfig::default()
        };
        let err = replay_script(&script(Vec::new()), config).expect_err("invalid config");
        assert!(matches!(err, ReplayError::Config(_)));
    }

    #[test]
    fn load_script_rejects_unknown_schema() {
        let path = std::env::temp_dir().join(format!("scrollscrub-{}.json", Uuid::new_v4()));
        std::fs::write(&path, r#"{"schemaVersion": 7, "events": []}"#).expect("write script");

        let err = load_script(&path).expect_err("schema mismatch");
        std::fs::remove_file(&path).ok();
        assert!(matches!(
            err,
            ReplayError::UnsupportedSchema {
                expected: 1,
                got: 7
            }
        ));
    }
}
