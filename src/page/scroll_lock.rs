//! Page-wide scroll lock.
//!
//! Locking hides body overflow and disables smooth scrolling; unlocking
//! restores `overflow: auto` and `scroll-behavior: smooth`. Escape only
//! restores overflow, which `unlock_overflow` covers.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;

pub trait ScrollLock: Send {
    fn lock(&mut self);

    fn unlock(&mut self);

    /// Restores overflow without touching scroll behaviour.
    fn unlock_overflow(&mut self) {
        self.unlock();
    }

    fn is_locked(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Overflow {
    Auto,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScrollBehavior {
    Auto,
    Smooth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BodyStyle {
    pub overflow: Overflow,
    pub scroll_behavior: ScrollBehavior,
}

impl Default for BodyStyle {
    fn default() -> Self {
        Self {
            overflow: Overflow::Auto,
            scroll_behavior: ScrollBehavior::Smooth,
        }
    }
}

/// Body style shared with whatever renders the page.
#[derive(Debug, Clone, Default)]
pub struct BodyStyleLock(Arc<Mutex<BodyStyle>>);

impl BodyStyleLock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn style(&self) -> BodyStyle {
        *self.guard()
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, BodyStyle> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ScrollLock for BodyStyleLock {
    fn lock(&mut self) {
        let mut style = self.guard();
        style.overflow = Overflow::Hidden;
        style.scroll_behavior = ScrollBehavior::Auto;
    }

    fn unlock(&mut self) {
        let mut style = self.guard();
        style.overflow = Overflow::Auto;
        style.scroll_behavior = ScrollBehavior::Smooth;
    }

    fn unlock_overflow(&mut self) {
        self.guard().overflow = Overflow::Auto;
    }

    fn is_locked(&self) -> bool {
        self.guard().overflow == Overflow::Hidden
    }
}
