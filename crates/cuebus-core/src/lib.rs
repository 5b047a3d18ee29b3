//! `cuebus-core` — domain types and configuration shared by every cuebus crate.

pub mod condition;
pub mod config;
pub mod error;
pub mod types;

pub use condition::{Condition, ConditionError};
pub use error::{CoreError, Result};
pub use types::{
    Argument, Command, CommandId, Group, GroupId, NewCommand, NewTarget, Target, TargetId,
    TimerState, TimerStatus, Trigger, TriggerKind,
};
