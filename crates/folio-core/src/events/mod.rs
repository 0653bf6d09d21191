//! Event system for content lifecycle events
//!
//! This module provides:
//! - Event types for history operations (commits, branches, merges, reviews)
//! - Event bus for internal pub/sub

mod bus;
mod event;

pub use bus::{EventBus, EventSubscriber};
pub use event::{VersionEvent, VersionEventKind};
