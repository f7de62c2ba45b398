//! Toolbar badge seam.

use std::sync::{Arc, Mutex};

use tracing::info;

pub trait ActionBadge: Send {
    fn set(&self, text: &str, color: &str);
    fn clear(&self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeState {
    pub text: String,
    pub color: String,
}

/// Keeps the last badge state so it can be inspected from another handle.
#[derive(Debug, Clone, Default)]
pub struct MemoryBadge {
    state: Arc<Mutex<Option<BadgeState>>>,
}

impl MemoryBadge {
    pub fn current(&self) -> Option<BadgeState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn replace(&self, value: Option<BadgeState>) {
        *self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = value;
    }
}

impl ActionBadge for MemoryBadge {
    fn set(&self, text: &str, color: &str) {
        self.replace(Some(BadgeState {
            text: text.to_string(),
            color: color.to_string(),
        }));
    }

    fn clear(&self) {
        self.replace(None);
    }
}

/// Writes badge changes to the log. Used when no toolbar exists.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogBadge;

impl ActionBadge for LogBadge {
    fn set(&self, text: &str, color: &str) {
        info!("Badge: {} ({})", text, color);
    }

    fn clear(&self) {
        info!("Badge cleared");
    }
}
