// CLASSIFICATION: COMMUNITY
// Filename: manager/mod.rs v0.3
// Author: Lukas Bower
// Date Modified: 2026-08-17

//! Coordinator thread, liveness watchdog, events, and manager sync.

pub mod coordinator;
pub mod events;
pub mod heartbeat;
pub mod sync;

pub use coordinator::{Command, Coordinator};
pub use events::{EventRecord, EV_IFACE_DOWN, EV_IFACE_ERROR, EV_MGR_BEAT};
pub use heartbeat::{Pulse, Role, Watchdog};
pub use sync::{SyncOp, SyncShadow};
