use std::sync::{Mutex, MutexGuard};

use cuebus_core::{
    Argument, Command, CommandId, Condition, Group, GroupId, NewCommand, NewTarget, Target,
    TargetId, Trigger,
};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info, instrument};

use crate::db::init_db;
use crate::error::{Result, StoreError};
use crate::repository::{Dataset, Repository};

/// SQLite-backed [`Repository`].
///
/// Wraps a single connection in a `Mutex`; every CRUD call is short and the
/// engine never calls in while holding its own state lock.
pub struct SqliteRepository {
    db: Mutex<Connection>,
}

impl SqliteRepository {
    /// Wrap a connection, running the schema migration first.
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self { db: Mutex::new(conn) })
    }

    /// Fresh in-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-statement leaves SQLite itself consistent; keep serving.
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Repository for SqliteRepository {
    #[instrument(skip(self))]
    fn load_all(&self) -> Result<Dataset> {
        let mut db = self.conn();
        let tx = db.transaction()?;

        let targets = {
            let mut stmt = tx.prepare("SELECT id, name, host, port FROM targets ORDER BY id")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?;
            let mut targets = Vec::new();
            for row in rows {
                let (id, name, host, port) = row?;
                targets.push(target_from_row(id, name, host, port)?);
            }
            targets
        };

        let mut groups = {
            let mut stmt = tx.prepare("SELECT id, name, trigger_json FROM groups ORDER BY id")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;
            let mut groups = Vec::new();
            for row in rows {
                let (id, name, trigger_json) = row?;
                groups.push(group_from_row(id, name, &trigger_json)?);
            }
            groups
        };

        let commands = {
            let mut stmt = tx.prepare(&format!("{COMMAND_COLUMNS} ORDER BY group_id, id"))?;
            let rows = stmt.query_map([], raw_command)?;
            let mut commands = Vec::new();
            for row in rows {
                commands.push(row?.decode()?);
            }
            commands
        };
        tx.commit()?;

        for command in commands {
            if let Some(group) = groups.iter_mut().find(|g| g.id == command.group_id) {
                group.commands.push(command);
            }
        }

        debug!(groups = groups.len(), targets = targets.len(), "dataset loaded");
        Ok(Dataset { groups, targets })
    }

    #[instrument(skip(self, target), fields(name = %target.name))]
    fn create_target(&self, target: &NewTarget) -> Result<Target> {
        let db = self.conn();
        let now = chrono::Utc::now().to_rfc3339();
        db.execute(
            "INSERT INTO targets (name, host, port, created_at) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![target.name, target.host, target.port, now],
        )?;
        let id = db.last_insert_rowid();
        info!(target_id = id, host = %target.host, port = target.port, "target created");
        Ok(Target {
            id: TargetId(id),
            name: target.name.clone(),
            host: target.host.clone(),
            port: target.port,
        })
    }

    #[instrument(skip(self))]
    fn delete_target(&self, id: TargetId) -> Result<bool> {
        let db = self.conn();
        let n = db.execute("DELETE FROM targets WHERE id = ?1", [id.0])?;
        Ok(n > 0)
    }

    #[instrument(skip(self))]
    fn create_group(&self, name: &str, trigger: Trigger) -> Result<Group> {
        let db = self.conn();
        let now = chrono::Utc::now().to_rfc3339();
        let trigger_json = serde_json::to_string(&trigger)?;
        db.execute(
            "INSERT INTO groups (name, trigger_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            rusqlite::params![name, trigger_json, now],
        )?;
        let id = db.last_insert_rowid();
        info!(group_id = id, "group created");
        Ok(Group {
            id: GroupId(id),
            name: name.to_string(),
            trigger,
            commands: Vec::new(),
        })
    }

    #[instrument(skip(self))]
    fn update_trigger(&self, id: GroupId, trigger: Trigger) -> Result<Group> {
        let mut db = self.conn();
        let tx = db.transaction()?;
        let now = chrono::Utc::now().to_rfc3339();
        let n = tx.execute(
            "UPDATE groups SET trigger_json = ?1, updated_at = ?2 WHERE id = ?3",
            rusqlite::params![serde_json::to_string(&trigger)?, now, id.0],
        )?;
        if n == 0 {
            return Err(StoreError::NotFound { entity: "group", id: id.0 });
        }
        let group = read_group(&tx, id)?.ok_or(StoreError::NotFound { entity: "group", id: id.0 })?;
        tx.commit()?;
        Ok(group)
    }

    #[instrument(skip(self))]
    fn delete_group(&self, id: GroupId) -> Result<bool> {
        let mut db = self.conn();
        let tx = db.transaction()?;
        tx.execute("DELETE FROM commands WHERE group_id = ?1", [id.0])?;
        let n = tx.execute("DELETE FROM groups WHERE id = ?1", [id.0])?;
        tx.commit()?;
        Ok(n > 0)
    }

    #[instrument(skip(self, command), fields(group_id = %command.group_id, tag = %command.tag))]
    fn create_command(&self, command: &NewCommand) -> Result<Command> {
        let mut db = self.conn();
        let tx = db.transaction()?;

        let exists = tx
            .query_row("SELECT 1 FROM groups WHERE id = ?1", [command.group_id.0], |_| Ok(()))
            .optional()?;
        if exists.is_none() {
            return Err(StoreError::NotFound {
                entity: "group",
                id: command.group_id.0,
            });
        }

        let arguments_json = serde_json::to_string(&command.arguments)?;
        let condition_json = match command.condition {
            Condition::Always => None,
            ref c => Some(serde_json::to_string(c)?),
        };
        let now = chrono::Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO commands
             (group_id, target_id, tag, offset_secs, arguments_json, condition_json, active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            rusqlite::params![
                command.group_id.0,
                command.target_id.0,
                command.tag,
                command.offset,
                arguments_json,
                condition_json,
                command.active,
                now,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        info!(command_id = id, "command created");
        Ok(Command {
            id: CommandId(id),
            group_id: command.group_id,
            target_id: command.target_id,
            tag: command.tag.clone(),
            offset: command.offset,
            arguments: command.arguments.clone(),
            condition: command.condition.clone(),
            active: command.active,
        })
    }

    #[instrument(skip(self))]
    fn delete_command(&self, group_id: GroupId, command_id: CommandId) -> Result<bool> {
        let db = self.conn();
        let n = db.execute(
            "DELETE FROM commands WHERE id = ?1 AND group_id = ?2",
            rusqlite::params![command_id.0, group_id.0],
        )?;
        Ok(n > 0)
    }
}

const COMMAND_COLUMNS: &str = "SELECT id, group_id, target_id, tag, offset_secs, arguments_json,
        condition_json, active FROM commands";

/// Undecoded command row; JSON columns are parsed outside the rusqlite closure
/// so decode failures surface as [`StoreError::Corrupt`].
struct RawCommand {
    id: i64,
    group_id: i64,
    target_id: i64,
    tag: String,
    offset: i64,
    arguments_json: String,
    condition_json: Option<String>,
    active: bool,
}

fn raw_command(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawCommand> {
    Ok(RawCommand {
        id: row.get(0)?,
        group_id: row.get(1)?,
        target_id: row.get(2)?,
        tag: row.get(3)?,
        offset: row.get(4)?,
        arguments_json: row.get(5)?,
        condition_json: row.get(6)?,
        active: row.get(7)?,
    })
}

impl RawCommand {
    fn decode(self) -> Result<Command> {
        let corrupt = |reason: String| StoreError::Corrupt {
            entity: "command",
            id: self.id,
            reason,
        };
        let arguments: Vec<Argument> = serde_json::from_str(&self.arguments_json)
            .map_err(|e| corrupt(format!("arguments: {e}")))?;
        let condition = Condition::from_json(self.condition_json.as_deref())
            .map_err(|e| corrupt(format!("condition: {e}")))?;
        Ok(Command {
            id: CommandId(self.id),
            group_id: GroupId(self.group_id),
            target_id: TargetId(self.target_id),
            tag: self.tag,
            offset: self.offset,
            arguments,
            condition,
            active: self.active,
        })
    }
}

fn target_from_row(id: i64, name: String, host: String, port: i64) -> Result<Target> {
    let port = u16::try_from(port).map_err(|_| StoreError::Corrupt {
        entity: "target",
        id,
        reason: format!("port {port} out of range"),
    })?;
    Ok(Target {
        id: TargetId(id),
        name,
        host,
        port,
    })
}

fn group_from_row(id: i64, name: String, trigger_json: &str) -> Result<Group> {
    let trigger: Trigger = serde_json::from_str(trigger_json).map_err(|e| StoreError::Corrupt {
        entity: "group",
        id,
        reason: format!("trigger: {e}"),
    })?;
    Ok(Group {
        id: GroupId(id),
        name,
        trigger,
        commands: Vec::new(),
    })
}

/// Read one group plus its commands using an already-locked connection.
fn read_group(conn: &Connection, id: GroupId) -> Result<Option<Group>> {
    let row = conn
        .query_row(
            "SELECT id, name, trigger_json FROM groups WHERE id = ?1",
            [id.0],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            },
        )
        .optional()?;
    let Some((gid, name, trigger_json)) = row else {
        return Ok(None);
    };
    let mut group = group_from_row(gid, name, &trigger_json)?;

    let mut stmt = conn.prepare(&format!("{COMMAND_COLUMNS} WHERE group_id = ?1 ORDER BY id"))?;
    let rows = stmt.query_map([id.0], raw_command)?;
    for row in rows {
        group.commands.push(row?.decode()?);
    }
    Ok(Some(group))
}
