// Well-known WS method and event names.

// utility
pub const PING: &str = "ping";

// targets
pub const TARGETS_ADD: &str = "targets.add";
pub const TARGETS_REMOVE: &str = "targets.remove";

// groups
pub const GROUPS_ADD: &str = "groups.add";
pub const GROUPS_EDIT: &str = "groups.edit";
pub const GROUPS_REMOVE: &str = "groups.remove";

// commands
pub const COMMANDS_ADD: &str = "commands.add";
pub const COMMANDS_REMOVE: &str = "commands.remove";

// playback
pub const PLAYBACK_CONTROL: &str = "playback.control";

// one-shot reads
pub const STATE_GET: &str = "state.get";
pub const TIMERS_GET: &str = "timers.get";

// subscriptions
pub const STATE_SUBSCRIBE: &str = "state.subscribe";
pub const STATE_UNSUBSCRIBE: &str = "state.unsubscribe";
pub const TIMERS_SUBSCRIBE: &str = "timers.subscribe";
pub const TIMERS_UNSUBSCRIBE: &str = "timers.unsubscribe";

// pushed event names
pub const EVENT_STATE: &str = "state";
pub const EVENT_TIMERS: &str = "timers";
