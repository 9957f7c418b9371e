//! Durable steps - run a unit of work once per run and replay it afterwards.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{Result, SandloopError};
use crate::storage::StepStore;

/// Executes named steps against a checkpoint store for one run.
///
/// Step ids are derived from the step name and how many times that name has
/// been used in the run so far: `terminal`, `terminal:1`, `terminal:2`. A run
/// replayed under the same id therefore hits the same keys in the same order.
pub struct StepRunner {
    run_id: String,
    store: Arc<dyn StepStore>,
    counters: Mutex<HashMap<String, usize>>,
}

impl std::fmt::Debug for StepRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepRunner").field("run_id", &self.run_id).finish_non_exhaustive()
    }
}

impl StepRunner {
    pub fn new(run_id: impl Into<String>, store: Arc<dyn StepStore>) -> Self {
        Self {
            run_id: run_id.into(),
            store,
            counters: Mutex::new(HashMap::new()),
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    fn next_key(&self, name: &str) -> Result<String> {
        let mut counters = self
            .counters
            .lock()
            .map_err(|e| SandloopError::Storage(e.to_string()))?;
        let seen = counters.entry(name.to_string()).or_insert(0);
        let key = if *seen == 0 {
            name.to_string()
        } else {
            format!("{}:{}", name, seen)
        };
        *seen += 1;
        Ok(key)
    }

    /// Run `f` unless this step already completed, in which case its stored
    /// output is returned and `f` is never called.
    ///
    /// Failed steps are not recorded; the next attempt runs them again.
    pub async fn run<T, F, Fut>(&self, name: &str, f: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        let key = self.next_key(name)?;
        self.execute(key, f).await
    }

    /// Like [`run`](Self::run), but under `key` exactly, outside occurrence
    /// counting. For steps that happen at most once per run whatever path
    /// reaches them.
    pub async fn run_keyed<T, F, Fut>(&self, key: &str, f: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        self.execute(key.to_string(), f).await
    }

    /// Stored output of a completed step, if any.
    pub fn checkpoint<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.store.load_step(&self.run_id, key)? {
            Some(cached) => Ok(Some(decode(key, cached)?)),
            None => Ok(None),
        }
    }

    async fn execute<T, F, Fut>(&self, key: String, f: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<T>> + Send,
    {
        if let Some(cached) = self.store.load_step(&self.run_id, &key)? {
            log::debug!("[{}] Replaying step {}", self.run_id, key);
            return decode(&key, cached);
        }

        let output = f().await?;
        let value = serde_json::to_value(&output)?;
        self.store.save_step(&self.run_id, &key, &value)?;
        log::debug!("[{}] Completed step {}", self.run_id, key);
        Ok(output)
    }
}

fn decode<T: DeserializeOwned>(key: &str, cached: serde_json::Value) -> Result<T> {
    serde_json::from_value(cached).map_err(|e| SandloopError::Step {
        step: key.to_string(),
        message: format!("checkpoint does not match step output: {}", e),
    })
}
