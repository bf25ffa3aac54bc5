//! SQLite-backed instance store implementation.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use super::types::parse_state;
use super::{
    InstanceError, InstanceFilter, InstanceState, InstanceStore, OrchestrationInstance, StepRecord,
};

const INSTANCE_COLUMNS: &str =
    "id, name, state, input, output, custom_status, created_at, updated_at";

/// Row as stored, before the state and JSON columns are interpreted.
struct InstanceRow {
    id: String,
    name: String,
    state: String,
    input: String,
    output: Option<String>,
    custom_status: Option<String>,
    created_at: String,
    updated_at: String,
}

impl InstanceRow {
    fn into_instance(self) -> Result<OrchestrationInstance, InstanceError> {
        let state = parse_state(&self.id, &self.state)?;
        let input: Value = serde_json::from_str(&self.input).unwrap_or(Value::Null);
        let output: Option<Value> = self
            .output
            .and_then(|json| serde_json::from_str(&json).ok());

        Ok(OrchestrationInstance {
            id: self.id,
            name: self.name,
            state,
            input,
            output,
            custom_status: self.custom_status,
            created_at: parse_timestamp(&self.created_at),
            updated_at: parse_timestamp(&self.updated_at),
        })
    }
}

fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn db_err(e: impl std::fmt::Display) -> InstanceError {
    InstanceError::Database(e.to_string())
}

/// SQLite-backed instance store.
pub struct SqliteInstanceStore {
    conn: Mutex<Connection>,
}

impl SqliteInstanceStore {
    /// Create a new SQLite instance store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, InstanceError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite instance store (useful for testing).
    pub fn in_memory() -> Result<Self, InstanceError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), InstanceError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS instances (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                state TEXT NOT NULL,
                input TEXT NOT NULL,
                output TEXT,
                custom_status TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_instances_state ON instances(state);
            CREATE INDEX IF NOT EXISTS idx_instances_created_at ON instances(created_at);

            CREATE TABLE IF NOT EXISTS instance_steps (
                instance_id TEXT NOT NULL,
                step_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                result TEXT NOT NULL,
                completed_at TEXT NOT NULL,
                PRIMARY KEY (instance_id, step_id)
            );
            "#,
        )
        .map_err(db_err)?;

        Ok(())
    }

    fn row_to_instance(row: &rusqlite::Row) -> rusqlite::Result<InstanceRow> {
        Ok(InstanceRow {
            id: row.get(0)?,
            name: row.get(1)?,
            state: row.get(2)?,
            input: row.get(3)?,
            output: row.get(4)?,
            custom_status: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }

    fn fetch(conn: &Connection, id: &str) -> Result<Option<OrchestrationInstance>, InstanceError> {
        let row = conn
            .query_row(
                &format!("SELECT {} FROM instances WHERE id = ?", INSTANCE_COLUMNS),
                params![id],
                Self::row_to_instance,
            )
            .optional()
            .map_err(db_err)?;

        row.map(InstanceRow::into_instance).transpose()
    }

    /// Explains why a compare-and-set update matched no row.
    fn cas_failure(conn: &Connection, id: &str, operation: &str) -> InstanceError {
        let current: Result<Option<String>, _> = conn
            .query_row(
                "SELECT state FROM instances WHERE id = ?",
                params![id],
                |row| row.get(0),
            )
            .optional();

        match current {
            Ok(Some(state)) => InstanceError::InvalidState {
                instance_id: id.to_string(),
                current_state: state,
                operation: operation.to_string(),
            },
            Ok(None) => InstanceError::NotFound(id.to_string()),
            Err(e) => db_err(e),
        }
    }

    fn require(conn: &Connection, id: &str) -> Result<OrchestrationInstance, InstanceError> {
        Self::fetch(conn, id)?.ok_or_else(|| InstanceError::NotFound(id.to_string()))
    }
}

impl InstanceStore for SqliteInstanceStore {
    fn create(&self, name: &str, input: &Value) -> Result<OrchestrationInstance, InstanceError> {
        let conn = self.conn.lock().unwrap();

        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let input_json = serde_json::to_string(input).map_err(db_err)?;

        conn.execute(
            "INSERT INTO instances (id, name, state, input, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
            params![
                id,
                name,
                InstanceState::Pending.as_str(),
                input_json,
                now.to_rfc3339(),
                now.to_rfc3339(),
            ],
        )
        .map_err(db_err)?;

        Ok(OrchestrationInstance {
            id,
            name: name.to_string(),
            state: InstanceState::Pending,
            input: input.clone(),
            output: None,
            custom_status: None,
            created_at: now,
            updated_at: now,
        })
    }

    fn get(&self, id: &str) -> Result<Option<OrchestrationInstance>, InstanceError> {
        let conn = self.conn.lock().unwrap();
        Self::fetch(&conn, id)
    }

    fn list(&self, filter: &InstanceFilter) -> Result<Vec<OrchestrationInstance>, InstanceError> {
        let conn = self.conn.lock().unwrap();

        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(state) = filter.state {
            conditions.push("state = ?");
            params.push(Box::new(state.as_str()));
        }
        if filter.non_terminal {
            conditions.push("state NOT IN ('completed', 'failed')");
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let sql = format!(
            "SELECT {} FROM instances {} ORDER BY created_at ASC, rowid ASC LIMIT ? OFFSET ?",
            INSTANCE_COLUMNS, where_clause
        );

        let mut stmt = conn.prepare(&sql).map_err(db_err)?;

        params.push(Box::new(filter.limit));
        params.push(Box::new(filter.offset));
        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::row_to_instance)
            .map_err(db_err)?;

        let mut instances = Vec::new();
        for row in rows {
            instances.push(row.map_err(db_err)?.into_instance()?);
        }

        Ok(instances)
    }

    fn transition(
        &self,
        id: &str,
        from: InstanceState,
        to: InstanceState,
    ) -> Result<OrchestrationInstance, InstanceError> {
        let conn = self.conn.lock().unwrap();
        let operation = format!("move to {}", to);

        if !from.can_transition_to(to) {
            return Err(InstanceError::InvalidState {
                instance_id: id.to_string(),
                current_state: from.as_str().to_string(),
                operation,
            });
        }

        let changed = conn
            .execute(
                "UPDATE instances SET state = ?, updated_at = ? WHERE id = ? AND state = ?",
                params![to.as_str(), Utc::now().to_rfc3339(), id, from.as_str()],
            )
            .map_err(db_err)?;

        if changed == 0 {
            return Err(Self::cas_failure(&conn, id, &operation));
        }

        Self::require(&conn, id)
    }

    fn complete(&self, id: &str, output: &Value) -> Result<OrchestrationInstance, InstanceError> {
        let conn = self.conn.lock().unwrap();
        let output_json = serde_json::to_string(output).map_err(db_err)?;

        let changed = conn
            .execute(
                "UPDATE instances SET state = 'completed', output = ?, updated_at = ? WHERE id = ? AND state = 'running'",
                params![output_json, Utc::now().to_rfc3339(), id],
            )
            .map_err(db_err)?;

        if changed == 0 {
            return Err(Self::cas_failure(&conn, id, "complete"));
        }

        Self::require(&conn, id)
    }

    fn fail(&self, id: &str, error: &Value) -> Result<OrchestrationInstance, InstanceError> {
        let conn = self.conn.lock().unwrap();
        let error_json = serde_json::to_string(error).map_err(db_err)?;

        let changed = conn
            .execute(
                "UPDATE instances SET state = 'failed', output = ?, updated_at = ? WHERE id = ? AND state IN ('pending', 'running')",
                params![error_json, Utc::now().to_rfc3339(), id],
            )
            .map_err(db_err)?;

        if changed == 0 {
            return Err(Self::cas_failure(&conn, id, "fail"));
        }

        Self::require(&conn, id)
    }

    fn set_custom_status(&self, id: &str, status: &str) -> Result<(), InstanceError> {
        let conn = self.conn.lock().unwrap();

        let changed = conn
            .execute(
                "UPDATE instances SET custom_status = ?, updated_at = ? WHERE id = ? AND state IN ('pending', 'running')",
                params![status, Utc::now().to_rfc3339(), id],
            )
            .map_err(db_err)?;

        if changed == 0 {
            return Err(Self::cas_failure(&conn, id, "set status of"));
        }

        Ok(())
    }

    fn record_step(
        &self,
        instance_id: &str,
        step_id: &str,
        result: &Value,
    ) -> Result<Value, InstanceError> {
        let conn = self.conn.lock().unwrap();
        let result_json = serde_json::to_string(result).map_err(db_err)?;

        conn.execute(
            r#"
            INSERT OR IGNORE INTO instance_steps (instance_id, step_id, seq, result, completed_at)
            VALUES (?1, ?2,
                    (SELECT COALESCE(MAX(seq), 0) + 1 FROM instance_steps WHERE instance_id = ?1),
                    ?3, ?4)
            "#,
            params![instance_id, step_id, result_json, Utc::now().to_rfc3339()],
        )
        .map_err(db_err)?;

        let stored: String = conn
            .query_row(
                "SELECT result FROM instance_steps WHERE instance_id = ? AND step_id = ?",
                params![instance_id, step_id],
                |row| row.get(0),
            )
            .map_err(db_err)?;

        serde_json::from_str(&stored).map_err(db_err)
    }

    fn load_steps(&self, instance_id: &str) -> Result<Vec<StepRecord>, InstanceError> {
        let conn = self.conn.lock().unwrap();

        let mut stmt = conn
            .prepare(
                "SELECT step_id, seq, result, completed_at FROM instance_steps WHERE instance_id = ? ORDER BY seq ASC",
            )
            .map_err(db_err)?;

        let rows = stmt
            .query_map(params![instance_id], |row| {
                let step_id: String = row.get(0)?;
                let seq: i64 = row.get(1)?;
                let result: String = row.get(2)?;
                let completed_at: String = row.get(3)?;
                Ok((step_id, seq, result, completed_at))
            })
            .map_err(db_err)?;

        let mut steps = Vec::new();
        for row in rows {
            let (step_id, seq, result, completed_at) = row.map_err(db_err)?;
            steps.push(StepRecord {
                instance_id: instance_id.to_string(),
                step_id,
                seq,
                result: serde_json::from_str(&result).map_err(db_err)?,
                completed_at: parse_timestamp(&completed_at),
            });
        }

        Ok(steps)
    }

    fn delete(&self, id: &str) -> Result<OrchestrationInstance, InstanceError> {
        let mut conn = self.conn.lock().unwrap();

        let instance = Self::require(&conn, id)?;
        if !instance.state.is_terminal() {
            return Err(InstanceError::InvalidState {
                instance_id: id.to_string(),
                current_state: instance.state.as_str().to_string(),
                operation: "purge".to_string(),
            });
        }

        let tx = conn.transaction().map_err(db_err)?;
        tx.execute(
            "DELETE FROM instance_steps WHERE instance_id = ?",
            params![id],
        )
        .map_err(db_err)?;
        tx.execute("DELETE FROM instances WHERE id = ?", params![id])
            .map_err(db_err)?;
        tx.commit().map_err(db_err)?;

        Ok(instance)
    }
}
