//! Native (locally controllable) media element fallback.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

use crate::player::sink::{PositionSink, SinkError};

/// Minimal surface of a local media element.
pub trait MediaElement: Send {
    fn set_current_time(&mut self, seconds: f64) -> Result<(), SinkError>;

    fn pause(&mut self) -> Result<(), SinkError>;

    /// Duration once metadata has loaded.
    fn duration(&self) -> Option<f64>;
}

/// Picks the duration to record when element metadata arrives; missing,
/// zero or NaN durations fall back to the placeholder.
pub fn metadata_duration(reported: Option<f64>, placeholder: f64) -> f64 {
    match reported {
        Some(d) if d.is_finite() && d > 0.0 => d,
        _ => placeholder,
    }
}

pub struct NativeSink<E: MediaElement> {
    element: E,
}

impl<E: MediaElement> NativeSink<E> {
    pub fn new(element: E) -> Self {
        Self { element }
    }
}

impl<E: MediaElement> PositionSink for NativeSink<E> {
    fn name(&self) -> &str {
        "native-element"
    }

    fn set_position(&mut self, seconds: f64) -> Result<(), SinkError> {
        self.element.set_current_time(seconds)
    }

    fn pause(&mut self) -> Result<(), SinkError> {
        self.element.pause()
    }

    fn element_duration(&self) -> Option<f64> {
        self.element.duration()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementState {
    pub attached: bool,
    pub current_time: f64,
    pub paused: bool,
    pub duration: Option<f64>,
}

/// Element handle shared between the host (which feeds metadata) and the sink.
#[derive(Debug, Clone, Default)]
pub struct SharedMediaElement(Arc<Mutex<ElementState>>);

impl SharedMediaElement {
    pub fn attached(duration: Option<f64>) -> Self {
        Self(Arc::new(Mutex::new(ElementState {
            attached: true,
            current_time: 0.0,
            paused: true,
            duration,
        })))
    }

    pub fn detach(&self) {
        self.lock().attached = false;
    }

    pub fn set_duration(&self, duration: Option<f64>) {
        self.lock().duration = duration;
    }

    pub fn state(&self) -> ElementState {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ElementState> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MediaElement for SharedMediaElement {
    fn set_current_time(&mut self, seconds: f64) -> Result<(), SinkError> {
        let mut state = self.lock();
        if !state.attached {
            return Err(SinkError::Unavailable("media element detached".to_string()));
        }
        state.current_time = match state.duration {
            Some(d) if d > 0.0 => seconds.clamp(0.0, d),
            _ => seconds.max(0.0),
        };
        Ok(())
    }

    fn pause(&mut self) -> Result<(), SinkError> {
        let mut state = self.lock();
        if !state.attached {
            return Err(SinkError::Unavailable("media element detached".to_string()));
        }
        state.paused = true;
        Ok(())
    }

    fn duration(&self) -> Option<f64> {
        self.lock().duration
    }
}
