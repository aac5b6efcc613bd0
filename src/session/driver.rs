//! Host runtime for one mounted scrub controller.
//!
//! Architecture:
//!   1. `ScrubSession::spawn` moves the controller into a single tokio task, so
//!      there is exactly one writer and no locking around controller state.
//!   2. The host pushes `ScrubEvent`s through an unbounded channel. `send`
//!      never waits on the outcome; `dispatch` hands back a oneshot that
//!      resolves to the event's `Disposition`. The latest snapshot is
//!      published on a `watch` channel so the host can also decide
//!      synchronously whether to suppress native scrolling.
//!   3. The task owns two timers: the embedded-player handshake delay and the
//!      grace period between release and restoring page scroll.
//!   4. `unmount` stops the task: pending timers are dropped, the controller
//!      is unmounted (page scroll restored) and the final snapshot returned.

use std::pin::Pin;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Sleep};
use uuid::Uuid;

use crate::algorithm::scrub_engine::{Disposition, ScrubController, ScrubMode, ScrubSnapshot};
use crate::models::events::{ScrubEvent, ScrubKey};
use crate::player::embed::OriginGuard;

enum SessionMessage {
    Event(ScrubEvent, Option<oneshot::Sender<Disposition>>),
    Unmount,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("scrub session {0} is no longer running")]
    Closed(Uuid),
    #[error("scrub session {0} task failed: {1}")]
    Join(Uuid, String),
}

/// Feeds one host event into the controller. Player notices go through the
/// origin guard first; rejected notices never reach the controller.
pub fn apply_event(
    controller: &mut ScrubController,
    guard: &OriginGuard,
    event: &ScrubEvent,
) -> Disposition {
    match event {
        ScrubEvent::Wheel { delta_y, .. } => controller.on_wheel(*delta_y),
        ScrubEvent::TouchStart { y, .. } => {
            controller.on_touch_start(*y);
            Disposition::PassThrough
        }
        ScrubEvent::TouchMove { y, .. } => controller.on_touch_move(*y),
        ScrubEvent::KeyDown { key_code, .. } => controller.on_key(ScrubKey::from_code(key_code)),
        ScrubEvent::Message { origin, data, .. } => {
            match guard.duration_from_notice(origin, data) {
                Ok(duration) => {
                    controller.on_duration_known(duration);
                }
                Err(err) => log::debug!("ignored player notice: {err}"),
            }
            Disposition::PassThrough
        }
        ScrubEvent::MetadataLoaded { duration, .. } => {
            controller.on_native_metadata(*duration);
            Disposition::PassThrough
        }
        ScrubEvent::Reset { .. } => {
            controller.reset();
            Disposition::PassThrough
        }
    }
}

pub struct ScrubSession {
    id: Uuid,
    tx: mpsc::UnboundedSender<SessionMessage>,
    snapshot: watch::Receiver<ScrubSnapshot>,
    task: JoinHandle<ScrubSnapshot>,
}

impl ScrubSession {
    /// Starts the session task. Must be called inside a tokio runtime.
    pub fn spawn(controller: ScrubController) -> Self {
        let id = Uuid::new_v4();
        let guard = OriginGuard::new(controller.config().trusted_origin.clone());
        let (tx, rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot) = watch::channel(controller.snapshot());

        log::info!("scrub session {id}: start");
        let task = tokio::spawn(run_session(id, controller, guard, rx, snapshot_tx));

        Self {
            id,
            tx,
            snapshot,
            task,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Queues a host event. Never blocks.
    pub fn send(&self, event: ScrubEvent) -> Result<(), SessionError> {
        self.tx
            .send(SessionMessage::Event(event, None))
            .map_err(|_| SessionError::Closed(self.id))
    }

    /// Queues a host event and resolves to what the host should do with the
    /// native event once the controller has applied it.
    pub async fn dispatch(&self, event: ScrubEvent) -> Result<Disposition, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SessionMessage::Event(event, Some(reply_tx)))
            .map_err(|_| SessionError::Closed(self.id))?;
        reply_rx.await.map_err(|_| SessionError::Closed(self.id))
    }

    pub fn snapshot(&self) -> ScrubSnapshot {
        *self.snapshot.borrow()
    }

    /// True while the host must suppress its own scroll handling.
    pub fn intercepts_scroll(&self) -> bool {
        self.snapshot().mode == ScrubMode::Locked
    }

    /// Resolves once a snapshot matching `predicate` has been published.
    pub async fn wait_for(
        &mut self,
        predicate: impl Fn(&ScrubSnapshot) -> bool,
    ) -> Result<ScrubSnapshot, SessionError> {
        let id = self.id;
        self.snapshot
            .wait_for(|snapshot| predicate(snapshot))
            .await
            .map(|snapshot| *snapshot)
            .map_err(|_| SessionError::Closed(id))
    }

    /// Stops the session, restoring page scroll, and returns the final state.
    pub async fn unmount(self) -> Result<ScrubSnapshot, SessionError> {
        let _ = self.tx.send(SessionMessage::Unmount);
        self.task
            .await
            .map_err(|e| SessionError::Join(self.id, e.to_string()))
    }
}

async fn run_session(
    id: Uuid,
    mut controller: ScrubController,
    guard: OriginGuard,
    mut rx: mpsc::UnboundedReceiver<SessionMessage>,
    snapshot_tx: watch::Sender<ScrubSnapshot>,
) -> ScrubSnapshot {
    let handshake = sleep(Duration::from_millis(controller.config().handshake_delay_ms));
    tokio::pin!(handshake);
    let mut handshake_done = false;

    let mut unlock_timer: Option<Pin<Box<Sleep>>> = None;
    let mut unlock_epoch = 0u64;

    loop {
        let mut reply = None;
        tokio::select! {
            _ = &mut handshake, if !handshake_done => {
                handshake_done = true;
                log::debug!("scrub session {id}: handshake");
                controller.begin_handshake();
            }
            _ = wait_unlock(&mut unlock_timer), if unlock_timer.is_some() => {
                unlock_timer = None;
                if controller.complete_unlock(unlock_epoch) {
                    log::info!("scrub session {id}: page scroll restored");
                }
            }
            message = rx.recv() => match message {
                Some(SessionMessage::Event(event, reply_tx)) => {
                    let disposition = apply_event(&mut controller, &guard, &event);
                    if matches!(event, ScrubEvent::Reset { .. }) {
                        unlock_timer = None;
                    }
                    reply = reply_tx.map(|tx| (tx, disposition));
                }
                Some(SessionMessage::Unmount) | None => break,
            },
        }

        if let Some(scheduled) = controller.take_scheduled_unlock() {
            unlock_epoch = scheduled.epoch;
            unlock_timer = Some(Box::pin(sleep(scheduled.delay)));
        }
        snapshot_tx.send_replace(controller.snapshot());
        // Reply after publishing so the caller observes the matching snapshot.
        if let Some((tx, disposition)) = reply {
            let _ = tx.send(disposition);
        }
    }

    controller.unmount();
    let last = controller.snapshot();
    snapshot_tx.send_replace(last);
    log::info!("scrub session {id}: stopped in {:?}", last.mode);
    last
}

async fn wait_unlock(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(timer) => timer.as_mut().await,
        None => std::future::pending().await,
    }
}
