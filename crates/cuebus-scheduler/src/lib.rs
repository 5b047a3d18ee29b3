//! `cuebus-scheduler` — group timers, condition gating and OSC dispatch.
//!
//! # Overview
//!
//! The [`engine::Engine`] owns the in-memory model (groups, commands,
//! targets) loaded from a [`cuebus_store::Repository`] and one countdown per
//! group. When a running countdown reaches zero, the group's commands are
//! filtered by their [`cuebus_core::Condition`] and sent as one OSC bundle per
//! target; the countdown then restarts from the group's current interval.
//!
//! # Timer states
//!
//! | State     | `start`            | `stop`   | `reset` |
//! |-----------|--------------------|----------|---------|
//! | `idle`    | running (interval) | —        | —       |
//! | `running` | —                  | paused   | idle    |
//! | `paused`  | running (resume)   | —        | idle    |
//!
//! Every change is published on one of two feeds: `state` for structural
//! changes and `timers` for countdown progress.

pub mod condition;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod publish;
pub mod registry;
pub mod timer;
pub mod transport;

pub use dispatch::{DispatchReport, Dispatcher};
pub use engine::Engine;
pub use error::{EngineError, Result, TransportError};
pub use publish::{StateSnapshot, TimersSnapshot};
pub use timer::PlaybackAction;
pub use transport::{OscUdpTransport, Transport};
