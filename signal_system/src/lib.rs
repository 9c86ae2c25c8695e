//! Signal system for administrative auth events
//!
//! This crate provides an in-process event bus that carries authorization
//! changes (group rules, memberships, logouts) to whoever keeps derived
//! permission state, such as the invalidation dispatcher.

pub mod event;
pub mod manager;
pub mod prelude;

pub use event::{AuthEvent, AuthEventKind};
pub use manager::{CallbackId, EventCallback, SignalManager, SignalStats};
