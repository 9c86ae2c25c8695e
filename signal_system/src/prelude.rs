//! Convenience re-exports for common signal-system usage

// Core signal system components
pub use crate::event::{AuthEvent, AuthEventKind};
pub use crate::manager::{CallbackId, EventCallback, SignalManager, SignalStats};

// Common external dependencies
pub use serde::{Deserialize, Serialize};
