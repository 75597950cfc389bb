use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::state_store::StateStore;

const LAST_RUN_KEY: &str = "lastrun";

/// When each account was last synced, persisted as a JSON map of account to
/// RFC 3339 timestamp.
#[derive(Clone)]
pub struct LastRunStore {
    state_store: Arc<dyn StateStore>,
}

impl LastRunStore {
    pub fn new(state_store: Arc<dyn StateStore>) -> Self {
        Self { state_store }
    }

    pub fn load_all(&self) -> Result<BTreeMap<String, DateTime<Utc>>> {
        match self.state_store.get_state(LAST_RUN_KEY)? {
            Some(raw) => serde_json::from_str(&raw).context("Corrupt last-run record"),
            None => Ok(BTreeMap::new()),
        }
    }

    pub fn get(&self, account_id: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self.load_all()?.get(account_id).copied())
    }

    pub fn set(&self, account_id: &str, at: DateTime<Utc>) -> Result<()> {
        // A corrupt record is replaced rather than blocking every later run.
        let mut all = self.load_all().unwrap_or_default();
        all.insert(account_id.to_string(), at);
        let json = serde_json::to_string_pretty(&all)?;
        self.state_store.set_state(LAST_RUN_KEY, &json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_store::{FileStateStore, InMemoryStateStore};
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn unknown_account_has_no_last_run() {
        let store = LastRunStore::new(Arc::new(InMemoryStateStore::new()));
        assert_eq!(store.get("someone").unwrap(), None);
    }

    #[test]
    fn set_keeps_other_accounts() {
        let store = LastRunStore::new(Arc::new(InMemoryStateStore::new()));
        let first = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 5, 1, 11, 0, 0).unwrap();

        store.set("alice", first).unwrap();
        store.set("bob", second).unwrap();
        store.set("alice", second).unwrap();

        assert_eq!(store.get("alice").unwrap(), Some(second));
        assert_eq!(store.get("bob").unwrap(), Some(second));
    }

    #[test]
    fn persisted_as_rfc3339_map() {
        let dir = TempDir::new().unwrap();
        let store = LastRunStore::new(Arc::new(FileStateStore::new(dir.path()).unwrap()));
        store
            .set("alice", Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap())
            .unwrap();

        let raw = std::fs::read_to_string(dir.path().join("lastrun.json")).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed["alice"], "2024-05-01T10:00:00Z");
    }

    #[test]
    fn corrupt_record_is_overwritten() {
        let state = Arc::new(InMemoryStateStore::new());
        state.set_state(LAST_RUN_KEY, "garbage").unwrap();
        let store = LastRunStore::new(state);

        assert!(store.get("alice").is_err());
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 10, 0, 0).unwrap();
        store.set("alice", at).unwrap();
        assert_eq!(store.get("alice").unwrap(), Some(at));
    }
}
