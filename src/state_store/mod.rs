//! Small key-value persistence for process state that outlives a run, such
//! as the traversal checkpoint and the scheduler's last-run times.

mod file_state_store;

pub use file_state_store::FileStateStore;

use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::sync::Mutex;

pub trait StateStore: Send + Sync {
    fn get_state(&self, key: &str) -> Result<Option<String>>;
    /// Replaces the value for `key`. Readers observe either the old or the
    /// new value, never a partial write.
    fn set_state(&self, key: &str, value: &str) -> Result<()>;
    /// Returns whether a value was present.
    fn delete_state(&self, key: &str) -> Result<bool>;
}

/// Non-durable [`StateStore`], for tests and dry runs.
#[derive(Default)]
pub struct InMemoryStateStore {
    values: Mutex<HashMap<String, String>>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for InMemoryStateStore {
    fn get_state(&self, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().map_err(|_| anyhow!("state lock poisoned"))?;
        Ok(values.get(key).cloned())
    }

    fn set_state(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().map_err(|_| anyhow!("state lock poisoned"))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete_state(&self, key: &str) -> Result<bool> {
        let mut values = self.values.lock().map_err(|_| anyhow!("state lock poisoned"))?;
        Ok(values.remove(key).is_some())
    }
}
