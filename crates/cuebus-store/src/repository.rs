use cuebus_core::{Command, CommandId, Group, GroupId, NewCommand, NewTarget, Target, TargetId, Trigger};
use serde::Serialize;

use crate::error::Result;

/// Everything the engine needs at startup, read in one transaction.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dataset {
    pub groups: Vec<Group>,
    pub targets: Vec<Target>,
}

/// Persistence contract consumed by the engine.
///
/// Implementations are blocking; callers must not hold the engine's state
/// lock while a call is in flight.
pub trait Repository: Send + Sync {
    /// Load all groups (with their commands) and all targets atomically.
    fn load_all(&self) -> Result<Dataset>;

    fn create_target(&self, target: &NewTarget) -> Result<Target>;

    /// Returns `false` when no row matched.
    fn delete_target(&self, id: TargetId) -> Result<bool>;

    /// Create a group with no commands.
    fn create_group(&self, name: &str, trigger: Trigger) -> Result<Group>;

    /// Replace the trigger and return the updated group including commands.
    fn update_trigger(&self, id: GroupId, trigger: Trigger) -> Result<Group>;

    /// Delete a group and its commands. Returns `false` when no row matched.
    fn delete_group(&self, id: GroupId) -> Result<bool>;

    /// Append a command to an existing group.
    fn create_command(&self, command: &NewCommand) -> Result<Command>;

    /// Returns `false` when the command does not exist in that group.
    fn delete_command(&self, group_id: GroupId, command_id: CommandId) -> Result<bool>;
}
