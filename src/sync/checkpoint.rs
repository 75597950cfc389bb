use anyhow::{Context, Result};
use std::sync::Arc;

use super::traversal::TraversalState;
use crate::state_store::StateStore;

const CHECKPOINT_KEY: &str = "checkpoint";

/// Durable copy of the last traversal state whose items were persisted.
#[derive(Clone)]
pub struct CheckpointStore {
    state_store: Arc<dyn StateStore>,
}

impl CheckpointStore {
    pub fn new(state_store: Arc<dyn StateStore>) -> Self {
        Self { state_store }
    }

    pub fn load(&self) -> Result<Option<TraversalState>> {
        let Some(raw) = self.state_store.get_state(CHECKPOINT_KEY)? else {
            return Ok(None);
        };
        let state = serde_json::from_str(&raw).context("Corrupt checkpoint")?;
        Ok(Some(state))
    }

    pub fn save(&self, state: &TraversalState) -> Result<()> {
        let json = serde_json::to_string_pretty(state)?;
        self.state_store.set_state(CHECKPOINT_KEY, &json)
    }

    /// Returns whether a checkpoint was present.
    pub fn clear(&self) -> Result<bool> {
        self.state_store.delete_state(CHECKPOINT_KEY)
    }
}
