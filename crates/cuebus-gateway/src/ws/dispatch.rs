use std::sync::Arc;

use cuebus_protocol::{
    frames::{codes, ResFrame},
    methods,
};
use tracing::warn;

use crate::app::AppState;
use crate::ws::handlers;

/// Route a WS method call to the correct handler.
///
/// Subscriptions are connection-scoped and handled in `message.rs`; every
/// other method is a plain request/response and lands here.
pub fn route(
    method: &str,
    params: Option<&serde_json::Value>,
    req_id: &str,
    app: &Arc<AppState>,
) -> ResFrame {
    match method {
        // ------------------------------------------------------------------
        // Utility
        // ------------------------------------------------------------------
        methods::PING => ResFrame::ok(req_id, serde_json::json!({ "pong": true })),

        // ------------------------------------------------------------------
        // Targets
        // ------------------------------------------------------------------
        methods::TARGETS_ADD => handlers::handle_targets_add(params, req_id, app),

        methods::TARGETS_REMOVE => handlers::handle_targets_remove(params, req_id, app),

        // ------------------------------------------------------------------
        // Groups
        // ------------------------------------------------------------------
        methods::GROUPS_ADD => handlers::handle_groups_add(params, req_id, app),

        methods::GROUPS_EDIT => handlers::handle_groups_edit(params, req_id, app),

        methods::GROUPS_REMOVE => handlers::handle_groups_remove(params, req_id, app),

        // ------------------------------------------------------------------
        // Commands
        // ------------------------------------------------------------------
        methods::COMMANDS_ADD => handlers::handle_commands_add(params, req_id, app),

        methods::COMMANDS_REMOVE => handlers::handle_commands_remove(params, req_id, app),

        // ------------------------------------------------------------------
        // Playback
        // ------------------------------------------------------------------
        methods::PLAYBACK_CONTROL => handlers::handle_playback_control(params, req_id, app),

        // ------------------------------------------------------------------
        // One-shot reads
        // ------------------------------------------------------------------
        methods::STATE_GET => ResFrame::ok(req_id, &*app.engine.state()),

        methods::TIMERS_GET => ResFrame::ok(req_id, &*app.engine.timers()),

        // ------------------------------------------------------------------
        // Fallthrough
        // ------------------------------------------------------------------
        other => {
            warn!(method = other, "unknown method");
            ResFrame::err(req_id, codes::METHOD_NOT_FOUND, &format!("unknown method: {other}"))
        }
    }
}
