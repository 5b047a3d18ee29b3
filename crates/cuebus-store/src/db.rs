use rusqlite::Connection;

use crate::error::Result;

/// Initialise the targets / groups / commands schema.
///
/// Safe to call on every startup — uses `IF NOT EXISTS` throughout.
/// `commands.target_id` deliberately has no foreign key: a target may be
/// removed while commands still reference it, and dispatch skips those.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS targets (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT    NOT NULL,
            host        TEXT    NOT NULL,
            port        INTEGER NOT NULL,
            created_at  TEXT    NOT NULL
        );

        CREATE TABLE IF NOT EXISTS groups (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            name          TEXT    NOT NULL,
            trigger_json  TEXT    NOT NULL,   -- JSON-encoded Trigger
            created_at    TEXT    NOT NULL,
            updated_at    TEXT    NOT NULL
        );

        CREATE TABLE IF NOT EXISTS commands (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            group_id        INTEGER NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
            target_id       INTEGER NOT NULL,
            tag             TEXT    NOT NULL,
            offset_secs     INTEGER NOT NULL DEFAULT 0,
            arguments_json  TEXT    NOT NULL DEFAULT '[]',
            condition_json  TEXT,                 -- NULL means always
            active          INTEGER NOT NULL DEFAULT 1,
            created_at      TEXT    NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_commands_group ON commands (group_id, id);
        ",
    )?;
    Ok(())
}
