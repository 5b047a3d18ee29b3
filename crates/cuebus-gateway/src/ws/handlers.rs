//! Concrete WS method handler functions.
//!
//! Each function extracts its parameters, calls the engine, and returns a
//! `ResFrame`. `dispatch::route` is the only caller.

use cuebus_core::{CommandId, GroupId, NewCommand, NewTarget, TargetId, TriggerKind};
use cuebus_protocol::frames::{codes, ResFrame};
use cuebus_scheduler::{EngineError, PlaybackAction};
use serde_json::Value;
use tracing::warn;

use crate::app::AppState;

/// Map an engine failure to a RES error frame.
fn engine_error(req_id: &str, method: &str, e: EngineError) -> ResFrame {
    warn!(method, error = %e, "request failed");
    ResFrame::err(req_id, e.code(), &e.to_string())
}

/// Read a required integer id field.
fn id_param(params: Option<&Value>, field: &str) -> Result<i64, String> {
    params
        .and_then(|p| p.get(field))
        .and_then(|v| v.as_i64())
        .ok_or_else(|| format!("missing or non-integer '{field}' field"))
}

// ---------------------------------------------------------------------------
// targets.add
// ---------------------------------------------------------------------------

/// Handler for `targets.add`.
///
/// Params: `{ "name": string, "host": string, "port": number }`
pub fn handle_targets_add(params: Option<&Value>, req_id: &str, app: &AppState) -> ResFrame {
    let p = match params {
        Some(p) => p,
        None => return ResFrame::err(req_id, codes::INVALID_PARAMS, "params object required"),
    };

    let name = match p.get("name").and_then(|v| v.as_str()) {
        Some(s) => s,
        None => return ResFrame::err(req_id, codes::INVALID_PARAMS, "missing 'name' field"),
    };

    let host = match p.get("host").and_then(|v| v.as_str()) {
        Some(s) if !s.is_empty() => s,
        _ => return ResFrame::err(req_id, codes::INVALID_PARAMS, "missing or empty 'host' field"),
    };

    let port = match p.get("port").and_then(|v| v.as_u64()).map(u16::try_from) {
        Some(Ok(port)) => port,
        _ => return ResFrame::err(req_id, codes::INVALID_PARAMS, "'port' must be 0-65535"),
    };

    let target = NewTarget {
        name: name.to_string(),
        host: host.to_string(),
        port,
    };
    match app.engine.add_target(target) {
        Ok(target) => ResFrame::ok(req_id, serde_json::json!({ "target": target })),
        Err(e) => engine_error(req_id, "targets.add", e),
    }
}

// ---------------------------------------------------------------------------
// targets.remove
// ---------------------------------------------------------------------------

/// Handler for `targets.remove`. Removing an unknown id succeeds with
/// `removed: false`.
///
/// Params: `{ "id": number }`
pub fn handle_targets_remove(params: Option<&Value>, req_id: &str, app: &AppState) -> ResFrame {
    let id = match id_param(params, "id") {
        Ok(id) => TargetId(id),
        Err(msg) => return ResFrame::err(req_id, codes::INVALID_PARAMS, &msg),
    };

    match app.engine.remove_target(id) {
        Ok(removed) => ResFrame::ok(req_id, serde_json::json!({ "removed": removed })),
        Err(e) => engine_error(req_id, "targets.remove", e),
    }
}

// ---------------------------------------------------------------------------
// groups.add
// ---------------------------------------------------------------------------

/// Handler for `groups.add`. New groups start with the configured default
/// interval and an idle timer.
///
/// Params: `{ "name": string, "trigger": "timer" }`
pub fn handle_groups_add(params: Option<&Value>, req_id: &str, app: &AppState) -> ResFrame {
    let p = match params {
        Some(p) => p,
        None => return ResFrame::err(req_id, codes::INVALID_PARAMS, "params object required"),
    };

    let name = match p.get("name").and_then(|v| v.as_str()) {
        Some(s) => s,
        None => return ResFrame::err(req_id, codes::INVALID_PARAMS, "missing 'name' field"),
    };

    let kind: TriggerKind = match p.get("trigger") {
        Some(v) => match serde_json::from_value(v.clone()) {
            Ok(k) => k,
            Err(e) => return ResFrame::err(req_id, codes::INVALID_PARAMS, &format!("bad trigger: {e}")),
        },
        None => return ResFrame::err(req_id, codes::INVALID_PARAMS, "missing 'trigger' field"),
    };

    match app.engine.add_group(name, kind) {
        Ok(group) => ResFrame::ok(req_id, serde_json::json!({ "group": group })),
        Err(e) => engine_error(req_id, "groups.add", e),
    }
}

/// Accept `5` as well as `5.0`; fractional or negative numbers are rejected.
fn whole_seconds(v: &Value) -> Option<u64> {
    if let Some(secs) = v.as_u64() {
        return Some(secs);
    }
    let f = v.as_f64()?;
    if f.is_finite() && f >= 0.0 && f.fract() == 0.0 && f < u64::MAX as f64 {
        Some(f as u64)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// groups.edit
// ---------------------------------------------------------------------------

/// Handler for `groups.edit`.
///
/// Params: `{ "group_id": number, "interval": number | null }`
pub fn handle_groups_edit(params: Option<&Value>, req_id: &str, app: &AppState) -> ResFrame {
    let group_id = match id_param(params, "group_id") {
        Ok(id) => GroupId(id),
        Err(msg) => return ResFrame::err(req_id, codes::INVALID_PARAMS, &msg),
    };

    let interval = match params.and_then(|p| p.get("interval")) {
        None | Some(Value::Null) => None,
        Some(v) => match whole_seconds(v) {
            Some(secs) => Some(secs),
            None => {
                return ResFrame::err(
                    req_id,
                    codes::INVALID_PARAMS,
                    "'interval' must be a whole number of seconds or null",
                )
            }
        },
    };

    match app.engine.edit_group(group_id, interval) {
        Ok(group) => ResFrame::ok(req_id, serde_json::json!({ "group": group })),
        Err(e) => engine_error(req_id, "groups.edit", e),
    }
}

// ---------------------------------------------------------------------------
// groups.remove
// ---------------------------------------------------------------------------

/// Handler for `groups.remove`.
///
/// Params: `{ "group_id": number }`
pub fn handle_groups_remove(params: Option<&Value>, req_id: &str, app: &AppState) -> ResFrame {
    let group_id = match id_param(params, "group_id") {
        Ok(id) => GroupId(id),
        Err(msg) => return ResFrame::err(req_id, codes::INVALID_PARAMS, &msg),
    };

    match app.engine.remove_group(group_id) {
        Ok(removed) => ResFrame::ok(req_id, serde_json::json!({ "removed": removed })),
        Err(e) => engine_error(req_id, "groups.remove", e),
    }
}

// ---------------------------------------------------------------------------
// commands.add
// ---------------------------------------------------------------------------

/// Handler for `commands.add`.
///
/// Params: `{ "group_id", "target_id", "tag", "offset"?, "arguments"?,
/// "condition"?, "active"? }`. Arguments and condition use their stored
/// JSON shapes; a malformed condition tree is rejected here.
pub fn handle_commands_add(params: Option<&Value>, req_id: &str, app: &AppState) -> ResFrame {
    let command: NewCommand = match params {
        Some(p) => match serde_json::from_value(p.clone()) {
            Ok(c) => c,
            Err(e) => return ResFrame::err(req_id, codes::INVALID_PARAMS, &format!("bad command: {e}")),
        },
        None => return ResFrame::err(req_id, codes::INVALID_PARAMS, "params object required"),
    };

    match app.engine.add_command(command) {
        Ok(command) => ResFrame::ok(req_id, serde_json::json!({ "command": command })),
        Err(e) => engine_error(req_id, "commands.add", e),
    }
}

// ---------------------------------------------------------------------------
// commands.remove
// ---------------------------------------------------------------------------

/// Handler for `commands.remove`.
///
/// Params: `{ "group_id": number, "command_id": number }`
pub fn handle_commands_remove(params: Option<&Value>, req_id: &str, app: &AppState) -> ResFrame {
    let (group_id, command_id) =
        match (id_param(params, "group_id"), id_param(params, "command_id")) {
            (Ok(g), Ok(c)) => (GroupId(g), CommandId(c)),
            (Err(msg), _) | (_, Err(msg)) => return ResFrame::err(req_id, codes::INVALID_PARAMS, &msg),
        };

    match app.engine.remove_command(group_id, command_id) {
        Ok(removed) => ResFrame::ok(req_id, serde_json::json!({ "removed": removed })),
        Err(e) => engine_error(req_id, "commands.remove", e),
    }
}

// ---------------------------------------------------------------------------
// playback.control
// ---------------------------------------------------------------------------

/// Handler for `playback.control`. Unknown groups are not an error; the
/// response then carries `timer: null`.
///
/// Params: `{ "group_id": number, "action": "start" | "stop" | "reset" }`
pub fn handle_playback_control(
    params: Option<&Value>,
    req_id: &str,
    app: &AppState,
) -> ResFrame {
    let group_id = match id_param(params, "group_id") {
        Ok(id) => GroupId(id),
        Err(msg) => return ResFrame::err(req_id, codes::INVALID_PARAMS, &msg),
    };

    let action: PlaybackAction = match params.and_then(|p| p.get("action")) {
        Some(v) => match serde_json::from_value(v.clone()) {
            Ok(a) => a,
            Err(e) => return ResFrame::err(req_id, codes::INVALID_PARAMS, &format!("bad action: {e}")),
        },
        None => return ResFrame::err(req_id, codes::INVALID_PARAMS, "missing 'action' field"),
    };

    let timer = app.engine.playback_control(group_id, action);
    ResFrame::ok(req_id, serde_json::json!({ "timer": timer }))
}
