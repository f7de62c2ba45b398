//! Background service: single owner of the current meeting and of the
//! dashboard connection.

pub mod badge;
pub mod coordinator;
pub mod handle;
pub mod state;

pub use badge::{ActionBadge, BadgeState, LogBadge, MemoryBadge};
pub use coordinator::Coordinator;
pub use handle::{BackgroundHandle, CoordinatorInput, CoordinatorSnapshot};
pub use state::CoordinatorState;
