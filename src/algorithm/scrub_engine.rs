//! Scroll-locked playback controller.
//!
//! While LOCKED, page scrolling is suppressed and wheel / touch / arrow-key
//! input is accumulated into an absolute playback position that is pushed to
//! every position sink. Once eased progress crosses the release threshold the
//! controller switches to RELEASED for good (until an explicit `reset`) and
//! asks the host to restore page scroll after a short grace period.
//!
//! All transitions happen synchronously on the caller's thread. Commands to
//! sinks are fire-and-forget; the accumulator stays authoritative regardless
//! of delivery.

use std::time::Duration;

use serde::Serialize;

use crate::algorithm::easing::{eased_progress, raw_progress, target_time};
use crate::models::config::ScrubConfig;
use crate::models::events::{InputSource, ScrubKey};
use crate::page::scroll_lock::ScrollLock;
use crate::player::native::metadata_duration;
use crate::player::sink::{SinkChain, SinkCommand};

/// Whether page scroll is intercepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ScrubMode {
    /// Input scrubs the video; native scrolling is suppressed.
    Locked,
    /// Scrubbing finished or skipped; input is ignored until `reset`.
    Released,
}

/// What the host should do with the native event that produced the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Suppress native scrolling (`preventDefault`).
    Consumed,
    /// Let the page handle the event normally.
    PassThrough,
}

/// Deferred scroll restore requested by a threshold release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduledUnlock {
    pub epoch: u64,
    pub delay: Duration,
}

/// Read-only copy of controller state, published to hosts and reports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrubSnapshot {
    pub mode: ScrubMode,
    /// Running sum of scaled input deltas; may be negative.
    pub accumulator: f64,
    /// Eased fraction of the video, always in `[0, 1]`.
    pub progress: f64,
    /// Last commanded playback position (seconds).
    pub target_time: f64,
    /// Latest known duration (seconds), or the placeholder.
    pub duration: f64,
    /// False while `duration` is still the placeholder.
    pub duration_known: bool,
    /// Media handshake or metadata completed.
    pub loaded: bool,
}

/// Largest accumulator magnitude; keeps the sum finite under extreme deltas.
const ACCUMULATOR_LIMIT: f64 = f64::MAX / 4.0;

/// Maps scroll input onto an embedded video's playback position.
pub struct ScrubController {
    config: ScrubConfig,
    sinks: SinkChain,
    scroll: Box<dyn ScrollLock>,
    mode: ScrubMode,
    accumulator: f64,
    progress: f64,
    target_time: f64,
    duration: f64,
    duration_known: bool,
    loaded: bool,
    mounted: bool,
    last_touch_y: Option<f64>,
    /// Bumped on every release, reset and unmount; stale unlocks are ignored.
    release_epoch: u64,
    scheduled_unlock: Option<ScheduledUnlock>,
}

impl ScrubController {
    /// Mounts the controller and locks page scroll.
    pub fn mount(
        config: ScrubConfig,
        sinks: SinkChain,
        scroll: impl ScrollLock + 'static,
    ) -> Self {
        let mut scroll: Box<dyn ScrollLock> = Box::new(scroll);
        scroll.lock();
        log::info!(
            "scrub mount: sinks={} distance={} threshold={}",
            sinks.len(),
            config.scroll_distance,
            config.release_threshold
        );

        Self {
            duration: config.placeholder_duration,
            config,
            sinks,
            scroll,
            mode: ScrubMode::Locked,
            accumulator: 0.0,
            progress: 0.0,
            target_time: 0.0,
            duration_known: false,
            loaded: false,
            mounted: true,
            last_touch_y: None,
            release_epoch: 0,
            scheduled_unlock: None,
        }
    }

    pub fn config(&self) -> &ScrubConfig {
        &self.config
    }

    pub fn mode(&self) -> ScrubMode {
        self.mode
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn snapshot(&self) -> ScrubSnapshot {
        ScrubSnapshot {
            mode: self.mode,
            accumulator: self.accumulator,
            progress: self.progress,
            target_time: self.target_time,
            duration: self.duration,
            duration_known: self.duration_known,
            loaded: self.loaded,
        }
    }

    /// Marks the media handshake as done. The first valid duration seen here
    /// is recorded; later calls never overwrite it or touch the accumulator.
    pub fn on_loaded(&mut self, duration: Option<f64>) {
        if !self.mounted {
            return;
        }
        if !self.loaded {
            log::info!("scrub loaded: duration={duration:?}");
        }
        self.loaded = true;

        if self.duration_known {
            return;
        }
        if let Some(d) = duration.filter(|d| d.is_finite() && *d > 0.0) {
            self.duration = d;
            self.duration_known = true;
        }
    }

    /// Applies a duration reported asynchronously by the media. Only the
    /// duration changes; progress is re-mapped on the next input.
    pub fn on_duration_known(&mut self, duration: f64) -> bool {
        if !self.mounted || !duration.is_finite() || duration <= 0.0 {
            return false;
        }
        if (self.duration - duration).abs() > f64::EPSILON {
            log::debug!("scrub duration: {} -> {duration}", self.duration);
        }
        self.duration = duration;
        self.duration_known = true;
        true
    }

    /// Initial handshake once the embedded frame had time to load: hold the
    /// player paused at the current target (0 on a fresh mount) and ask it
    /// for its duration.
    pub fn begin_handshake(&mut self) {
        if !self.mounted {
            return;
        }
        self.on_loaded(None);
        self.target_time = target_time(self.progress, self.duration);
        self.sinks.dispatch(SinkCommand::Pause);
        self.sinks.dispatch(SinkCommand::SetPosition {
            seconds: self.target_time,
        });
        self.sinks.dispatch(SinkCommand::RequestDuration);
    }

    /// Native element metadata arrived. The duration is read from the
    /// element itself when a sink exposes one, otherwise `reported` is used;
    /// missing durations fall back to the placeholder. Sinks are re-synced
    /// to the current target.
    pub fn on_native_metadata(&mut self, reported: Option<f64>) {
        if !self.mounted {
            return;
        }
        let reported = self.sinks.element_duration().or(reported);
        let duration = metadata_duration(reported, self.config.placeholder_duration);
        self.on_loaded(Some(duration));
        self.target_time = target_time(self.progress, self.duration);
        self.sinks.seek_and_pause(self.target_time);
    }

    pub fn on_wheel(&mut self, delta_y: f64) -> Disposition {
        self.on_input_delta(delta_y, InputSource::Wheel)
    }

    pub fn on_touch_start(&mut self, y: f64) {
        if self.mounted && self.mode == ScrubMode::Locked {
            self.last_touch_y = Some(y);
        }
    }

    /// Finger moving up (decreasing `y`) scrubs forward.
    pub fn on_touch_move(&mut self, y: f64) -> Disposition {
        if !self.mounted || self.mode == ScrubMode::Released {
            return Disposition::PassThrough;
        }
        let Some(last_y) = self.last_touch_y.replace(y) else {
            return Disposition::Consumed;
        };
        self.on_input_delta(last_y - y, InputSource::Touch)
    }

    pub fn on_key(&mut self, key: ScrubKey) -> Disposition {
        if !self.mounted || self.mode == ScrubMode::Released {
            return Disposition::PassThrough;
        }
        match key {
            ScrubKey::ArrowDown => self.on_input_delta(self.config.key_step, InputSource::Key),
            ScrubKey::ArrowUp => self.on_input_delta(-self.config.key_step, InputSource::Key),
            ScrubKey::Escape => {
                self.skip();
                Disposition::PassThrough
            }
            ScrubKey::Other => Disposition::PassThrough,
        }
    }

    /// Core scrub step. Returns `Consumed` for every event seen while locked,
    /// including filtered ones, so the page never scrolls and scrubs at once.
    pub fn on_input_delta(&mut self, raw_delta: f64, source: InputSource) -> Disposition {
        if !self.mounted || self.mode == ScrubMode::Released {
            return Disposition::PassThrough;
        }
        if !self.loaded || !raw_delta.is_finite() {
            return Disposition::Consumed;
        }
        if source != InputSource::Key && raw_delta.abs() < self.config.min_scroll_delta {
            return Disposition::Consumed;
        }

        let source_multiplier = match source {
            InputSource::Touch => self.config.touch_multiplier,
            InputSource::Wheel | InputSource::Key => 1.0,
        };
        let step = (raw_delta
            * source_multiplier
            * self.config.scroll_sensitivity
            * self.config.playback_speed)
            .clamp(-ACCUMULATOR_LIMIT, ACCUMULATOR_LIMIT);
        self.accumulator =
            (self.accumulator + step).clamp(-ACCUMULATOR_LIMIT, ACCUMULATOR_LIMIT);

        let raw = raw_progress(self.accumulator, self.config.scroll_distance);
        self.progress = eased_progress(raw, self.config.enable_easing);
        self.target_time = target_time(self.progress, self.duration);
        self.sinks.seek_and_pause(self.target_time);

        if self.progress >= self.config.release_threshold {
            self.release();
        }
        Disposition::Consumed
    }

    fn release(&mut self) {
        self.mode = ScrubMode::Released;
        self.release_epoch += 1;
        self.scheduled_unlock = Some(ScheduledUnlock {
            epoch: self.release_epoch,
            delay: Duration::from_millis(self.config.release_delay_ms),
        });
        log::info!(
            "scrub released: progress={:.3} target={:.3}s",
            self.progress,
            self.target_time
        );
    }

    /// Escape: release immediately, bypassing the threshold and grace period.
    pub fn skip(&mut self) {
        if !self.mounted || self.mode == ScrubMode::Released {
            return;
        }
        self.mode = ScrubMode::Released;
        self.release_epoch += 1;
        self.scheduled_unlock = None;
        self.scroll.unlock_overflow();
        log::info!("scrub skipped at progress={:.3}", self.progress);
    }

    /// Hands the pending grace-period unlock to the host, once.
    pub fn take_scheduled_unlock(&mut self) -> Option<ScheduledUnlock> {
        self.scheduled_unlock.take()
    }

    /// Restores page scroll for a grace period that has elapsed. Returns
    /// false when the unlock went stale (reset or unmount in between).
    pub fn complete_unlock(&mut self, epoch: u64) -> bool {
        if !self.mounted || self.mode != ScrubMode::Released || epoch != self.release_epoch {
            log::debug!("scrub unlock epoch {epoch} is stale");
            return false;
        }
        self.scroll.unlock();
        true
    }

    /// Back to a fresh LOCKED state, from any prior state.
    pub fn reset(&mut self) {
        if !self.mounted {
            return;
        }
        self.mode = ScrubMode::Locked;
        self.accumulator = 0.0;
        self.progress = 0.0;
        self.target_time = 0.0;
        self.last_touch_y = None;
        self.release_epoch += 1;
        self.scheduled_unlock = None;
        self.scroll.lock();
        self.sinks.seek_and_pause(0.0);
        log::info!("scrub reset");
    }

    /// Stops reacting to input, drops any pending unlock and restores page
    /// scroll whatever the mode.
    pub fn unmount(&mut self) {
        if !self.mounted {
            return;
        }
        self.mounted = false;
        self.release_epoch += 1;
        self.scheduled_unlock = None;
        self.last_touch_y = None;
        self.scroll.unlock();
        log::info!("scrub unmount: mode={:?}", self.mode);
    }
}

impl Drop for ScrubController {
    fn drop(&mut self) {
        self.unmount();
    }
}
