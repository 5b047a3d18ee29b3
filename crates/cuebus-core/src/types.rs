use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::condition::Condition;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

row_id!(
    /// Primary key of a persisted target.
    TargetId
);
row_id!(
    /// Primary key of a persisted group.
    GroupId
);
row_id!(
    /// Primary key of a persisted command.
    CommandId
);

/// A network endpoint that receives OSC bundles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub name: String,
    pub host: String,
    pub port: u16,
}

/// Input for `targets.add`; the id is assigned by the repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTarget {
    pub name: String,
    pub host: String,
    pub port: u16,
}

/// What drives a group. Only countdown timers exist today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Trigger {
    /// Fire every `interval` seconds while running.
    Timer { interval: u64 },
}

impl Trigger {
    pub fn timer(interval: u64) -> Self {
        Trigger::Timer { interval }
    }

    /// Countdown length in seconds.
    pub fn interval(&self) -> u64 {
        match self {
            Trigger::Timer { interval } => *interval,
        }
    }
}

/// Trigger kind requested by `groups.add`; the interval always starts at the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    Timer,
}

/// A named collection of commands sharing one timer.
///
/// Command order is the insertion order and only matters for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub trigger: Trigger,
    #[serde(default)]
    pub commands: Vec<Command>,
}

/// One typed OSC argument.
///
/// Wire / storage shape: `{"type": "int", "value": 1}`. Integer values are
/// rounded half-up when decoded, so `{"type":"int","value":1.5}` becomes `2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Argument {
    #[serde(deserialize_with = "deserialize_rounded_int")]
    Int(i64),
    Float(f64),
    String(String),
}

/// Round half-up, matching how integer arguments were entered in the UI.
pub fn round_half_up(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}

fn deserialize_rounded_int<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() {
        return Err(serde::de::Error::custom("int argument must be finite"));
    }
    Ok(round_half_up(value))
}

/// A single addressed message plus the condition gating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub id: CommandId,
    pub group_id: GroupId,
    pub target_id: TargetId,
    /// OSC address pattern, always starts with `/`.
    pub tag: String,
    /// Seconds. Stored and shown, not applied by the dispatcher.
    pub offset: i64,
    #[serde(default)]
    pub arguments: Vec<Argument>,
    #[serde(default)]
    pub condition: Condition,
    pub active: bool,
}

/// Input for `commands.add`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCommand {
    pub group_id: GroupId,
    pub target_id: TargetId,
    pub tag: String,
    #[serde(default)]
    pub offset: i64,
    #[serde(default)]
    pub arguments: Vec<Argument>,
    #[serde(default)]
    pub condition: Condition,
    #[serde(default = "bool_true")]
    pub active: bool,
}

fn bool_true() -> bool {
    true
}

/// Playback state of a group timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
}

impl fmt::Display for TimerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerStatus::Idle => write!(f, "idle"),
            TimerStatus::Running => write!(f, "running"),
            TimerStatus::Paused => write!(f, "paused"),
        }
    }
}

/// Observable view of one group's countdown. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerState {
    /// Whole seconds left in the current cycle.
    pub duration: u64,
    /// Number of expiries since the last reset.
    pub iteration: u64,
    pub state: TimerStatus,
}
