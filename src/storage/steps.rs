//! Checkpoint store for durable steps.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Database;
use crate::error::{Result, SandloopError};

/// A completed step as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    pub run_id: String,
    pub step_id: String,
    pub output: Value,
    pub completed_at: DateTime<Utc>,
}

/// Key-value store of step outputs keyed by `(run_id, step_id)`.
pub trait StepStore: Send + Sync {
    /// Cached output of a completed step, if any.
    fn load_step(&self, run_id: &str, step_id: &str) -> Result<Option<Value>>;

    /// Record a step's output. The first write for a key wins.
    fn save_step(&self, run_id: &str, step_id: &str, output: &Value) -> Result<()>;

    /// All completed steps of a run in completion order.
    fn list_steps(&self, run_id: &str) -> Result<Vec<StepRecord>>;
}

impl StepStore for Database {
    fn load_step(&self, run_id: &str, step_id: &str) -> Result<Option<Value>> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT output FROM steps WHERE run_id = ?1 AND step_id = ?2",
                params![run_id, step_id],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|s| serde_json::from_str(&s).map_err(SandloopError::from))
            .transpose()
    }

    fn save_step(&self, run_id: &str, step_id: &str, output: &Value) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO steps (run_id, step_id, output, completed_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                run_id,
                step_id,
                serde_json::to_string(output)?,
                Utc::now().timestamp_millis()
            ],
        )?;
        Ok(())
    }

    fn list_steps(&self, run_id: &str) -> Result<Vec<StepRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT step_id, output, completed_at FROM steps WHERE run_id = ?1 ORDER BY completed_at, rowid",
        )?;
        let rows = stmt.query_map(params![run_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (step_id, output, completed_at) = row?;
            records.push(StepRecord {
                run_id: run_id.to_string(),
                step_id,
                output: serde_json::from_str(&output)?,
                completed_at: DateTime::from_timestamp_millis(completed_at).unwrap_or_default(),
            });
        }
        Ok(records)
    }
}

/// In-memory step store for tests and throwaway runs.
#[derive(Debug, Default)]
pub struct MemoryStepStore {
    steps: Mutex<Vec<StepRecord>>,
    index: Mutex<HashMap<(String, String), usize>>,
}

impl MemoryStepStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StepStore for MemoryStepStore {
    fn load_step(&self, run_id: &str, step_id: &str) -> Result<Option<Value>> {
        let index = self.index.lock().map_err(|e| SandloopError::Storage(e.to_string()))?;
        let steps = self.steps.lock().map_err(|e| SandloopError::Storage(e.to_string()))?;
        Ok(index
            .get(&(run_id.to_string(), step_id.to_string()))
            .map(|&i| steps[i].output.clone()))
    }

    fn save_step(&self, run_id: &str, step_id: &str, output: &Value) -> Result<()> {
        let mut index = self.index.lock().map_err(|e| SandloopError::Storage(e.to_string()))?;
        let mut steps = self.steps.lock().map_err(|e| SandloopError::Storage(e.to_string()))?;
        let key = (run_id.to_string(), step_id.to_string());
        if index.contains_key(&key) {
            return Ok(());
        }
        index.insert(key, steps.len());
        steps.push(StepRecord {
            run_id: run_id.to_string(),
            step_id: step_id.to_string(),
            output: output.clone(),
            completed_at: Utc::now(),
        });
        Ok(())
    }

    fn list_steps(&self, run_id: &str) -> Result<Vec<StepRecord>> {
        let steps = self.steps.lock().map_err(|e| SandloopError::Storage(e.to_string()))?;
        Ok(steps.iter().filter(|s| s.run_id == run_id).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn exercise(store: &dyn StepStore) {
        assert_eq!(store.load_step("run-1", "get-sandbox-id").unwrap(), None);

        store.save_step("run-1", "get-sandbox-id", &json!({"sandbox_id": "sbx-1"})).unwrap();
        store.save_step("run-1", "terminal", &json!("ok")).unwrap();
        store.save_step("run-2", "terminal", &json!("other run")).unwrap();

        assert_eq!(
            store.load_step("run-1", "get-sandbox-id").unwrap(),
            Some(json!({"sandbox_id": "sbx-1"}))
        );
        assert_eq!(store.load_step("run-2", "terminal").unwrap(), Some(json!("other run")));

        let steps = store.list_steps("run-1").unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0].step_id, "get-sandbox-id");
        assert_eq!(steps[1].step_id, "terminal");
    }

    #[test]
    fn test_memory_store() {
        exercise(&MemoryStepStore::new());
    }

    #[test]
    fn test_sqlite_store() {
        exercise(&Database::open_in_memory().unwrap());
    }

    #[test]
    fn test_first_write_wins() {
        let db = Database::open_in_memory().unwrap();
        db.save_step("run-1", "s", &json!(1)).unwrap();
        db.save_step("run-1", "s", &json!(2)).unwrap();
        assert_eq!(db.load_step("run-1", "s").unwrap(), Some(json!(1)));

        let mem = MemoryStepStore::new();
        mem.save_step("run-1", "s", &json!(1)).unwrap();
        mem.save_step("run-1", "s", &json!(2)).unwrap();
        assert_eq!(mem.load_step("run-1", "s").unwrap(), Some(json!(1)));
    }

    #[test]
    fn test_steps_survive_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("steps.db");
        {
            let db = Database::open(&path).unwrap();
            db.save_step("run-1", "save-result", &json!("msg-1")).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert_eq!(db.load_step("run-1", "save-result").unwrap(), Some(json!("msg-1")));
    }
}
