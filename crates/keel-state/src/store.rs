//! StateStore - redb-backed persistence for Keel desired state.
//!
//! Provides create-if-absent, compare-and-set, get, list, and delete over
//! desired LRPs and tasks. All values are JSON-serialized [`Versioned`]
//! envelopes in redb's `&[u8]` value columns. The store supports both
//! on-disk and in-memory backends (the latter for testing).
//!
//! redb serializes write transactions, so the existence check and the write
//! inside a single transaction are atomic with respect to other writers.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

type SpecTable = TableDefinition<'static, &'static str, &'static [u8]>;

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    pub(crate) db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(DESIRED_LRPS).map_err(map_err!(Table))?;
        txn.open_table(TASKS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Desired LRPs ───────────────────────────────────────────────

    /// Store a new desired LRP at version 1.
    ///
    /// Fails with [`StateError::AlreadyExists`] if the process guid is taken;
    /// the stored record is left untouched in that case.
    pub fn insert_desired_lrp(&self, lrp: &DesiredLrp) -> StateResult<()> {
        self.insert_new(DESIRED_LRPS, lrp)?;
        debug!(process_guid = %lrp.process_guid, "desired lrp stored");
        Ok(())
    }

    /// Get a desired LRP and its current version.
    pub fn get_desired_lrp(
        &self,
        process_guid: &str,
    ) -> StateResult<Option<Versioned<DesiredLrp>>> {
        self.get_versioned(DESIRED_LRPS, process_guid)
    }

    /// List all desired LRPs, ordered by process guid.
    pub fn list_desired_lrps(&self) -> StateResult<Vec<DesiredLrp>> {
        self.list_matching(DESIRED_LRPS, None)
    }

    /// List the desired LRPs owned by `domain`, ordered by process guid.
    pub fn list_desired_lrps_for_domain(&self, domain: &str) -> StateResult<Vec<DesiredLrp>> {
        self.list_matching(DESIRED_LRPS, Some(domain))
    }

    /// Replace a desired LRP if its stored version is still `expected_version`.
    ///
    /// Returns the new version.
    pub fn update_desired_lrp(
        &self,
        process_guid: &str,
        lrp: &DesiredLrp,
        expected_version: u64,
    ) -> StateResult<u64> {
        let version = self.compare_and_swap(DESIRED_LRPS, process_guid, lrp, expected_version)?;
        debug!(%process_guid, version, "desired lrp updated");
        Ok(version)
    }

    /// Delete a desired LRP. Returns true if it existed.
    pub fn delete_desired_lrp(&self, process_guid: &str) -> StateResult<bool> {
        let existed = self.remove(DESIRED_LRPS, process_guid)?;
        debug!(%process_guid, existed, "desired lrp deleted");
        Ok(existed)
    }

    // ── Tasks ──────────────────────────────────────────────────────

    /// Store a new task at version 1.
    pub fn insert_task(&self, task: &Task) -> StateResult<()> {
        self.insert_new(TASKS, task)?;
        debug!(task_guid = %task.task_guid, "task stored");
        Ok(())
    }

    /// Get a task and its current version.
    pub fn get_task(&self, task_guid: &str) -> StateResult<Option<Versioned<Task>>> {
        self.get_versioned(TASKS, task_guid)
    }

    /// List all tasks, ordered by task guid.
    pub fn list_tasks(&self) -> StateResult<Vec<Task>> {
        self.list_matching(TASKS, None)
    }

    /// List the tasks owned by `domain`, ordered by task guid.
    pub fn list_tasks_for_domain(&self, domain: &str) -> StateResult<Vec<Task>> {
        self.list_matching(TASKS, Some(domain))
    }

    // ── Table primitives ───────────────────────────────────────────

    fn insert_new<T: Spec + Serialize>(&self, definition: SpecTable, spec: &T) -> StateResult<()> {
        let key = spec.guid();
        let value = encode(1, spec)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let created = {
            let mut table = txn.open_table(definition).map_err(map_err!(Table))?;
            let exists = table.get(key).map_err(map_err!(Read))?.is_some();
            if !exists {
                table
                    .insert(key, value.as_slice())
                    .map_err(map_err!(Write))?;
            }
            !exists
        };
        if !created {
            txn.abort().map_err(map_err!(Transaction))?;
            return Err(StateError::AlreadyExists(key.to_string()));
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn get_versioned<T: DeserializeOwned>(
        &self,
        definition: SpecTable,
        key: &str,
    ) -> StateResult<Option<Versioned<T>>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(definition).map_err(map_err!(Table))?;
        match table.get(key).map_err(map_err!(Read))? {
            Some(guard) => Ok(Some(decode(guard.value())?)),
            None => Ok(None),
        }
    }

    fn list_matching<T: Spec + DeserializeOwned>(
        &self,
        definition: SpecTable,
        domain: Option<&str>,
    ) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(definition).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: Versioned<T> = decode(value.value())?;
            if domain.is_none_or(|d| record.value.domain() == d) {
                results.push(record.value);
            }
        }
        Ok(results)
    }

    fn compare_and_swap<T: Serialize>(
        &self,
        definition: SpecTable,
        key: &str,
        spec: &T,
        expected_version: u64,
    ) -> StateResult<u64> {
        let next_version = expected_version + 1;
        let value = encode(next_version, spec)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(definition).map_err(map_err!(Table))?;
            let current = match table.get(key).map_err(map_err!(Read))? {
                Some(guard) => decode::<IgnoredAny>(guard.value())?.version,
                None => return Err(StateError::NotFound(key.to_string())),
            };
            if current != expected_version {
                return Err(StateError::Conflict {
                    key: key.to_string(),
                    expected: expected_version,
                    actual: current,
                });
            }
            table
                .insert(key, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(next_version)
    }

    fn remove(&self, definition: SpecTable, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(definition).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }
}

fn encode<T: Serialize>(version: u64, value: &T) -> StateResult<Vec<u8>> {
    serde_json::to_vec(&Versioned { version, value }).map_err(map_err!(Serialize))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StateResult<Versioned<T>> {
    serde_json::from_slice(bytes).map_err(map_err!(Deserialize))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn test_lrp(process_guid: &str, domain: &str) -> DesiredLrp {
        DesiredLrp {
            process_guid: process_guid.to_string(),
            domain: domain.to_string(),
            stack: "some-stack".to_string(),
            instances: 1,
            actions: vec![json!({"action": "run", "args": {"path": "/bin/bash"}})],
            routes: vec!["app.example.com".to_string()],
            annotation: "v1".to_string(),
        }
    }

    fn test_task(task_guid: &str, domain: &str) -> Task {
        Task {
            task_guid: task_guid.to_string(),
            domain: domain.to_string(),
            stack: "some-stack".to_string(),
            actions: vec![json!({"action": "run", "args": {"path": "/bin/echo"}})],
            memory_mb: 256,
            disk_mb: 1024,
            cpu_percent: 25.0,
            log: LogConfig {
                guid: "log-guid".to_string(),
                source_name: "TASK".to_string(),
            },
            annotation: String::new(),
        }
    }

    // ── Desired LRPs ───────────────────────────────────────────────

    #[test]
    fn desired_lrp_insert_and_get() {
        let store = StateStore::open_in_memory().unwrap();
        let lrp = test_lrp("pg-1", "cf-apps");

        store.insert_desired_lrp(&lrp).unwrap();
        let retrieved = store.get_desired_lrp("pg-1").unwrap().unwrap();

        assert_eq!(retrieved.version, 1);
        assert_eq!(retrieved.value, lrp);
    }

    #[test]
    fn desired_lrp_get_nonexistent_returns_none() {
        let store = StateStore::open_in_memory().unwrap();
        assert!(store.get_desired_lrp("nope").unwrap().is_none());
    }

    #[test]
    fn desired_lrp_insert_twice_keeps_first() {
        let store = StateStore::open_in_memory().unwrap();
        store.insert_desired_lrp(&test_lrp("pg-1", "cf-apps")).unwrap();

        let mut second = test_lrp("pg-1", "cf-apps");
        second.instances = 9;
        let err = store.insert_desired_lrp(&second).unwrap_err();
        assert!(matches!(err, StateError::AlreadyExists(ref key) if key == "pg-1"));

        let stored = store.get_desired_lrp("pg-1").unwrap().unwrap();
        assert_eq!(stored.value.instances, 1);
        assert_eq!(store.list_desired_lrps().unwrap().len(), 1);
    }

    #[test]
    fn desired_lrp_update_bumps_version() {
        let store = StateStore::open_in_memory().unwrap();
        let mut lrp = test_lrp("pg-1", "cf-apps");
        store.insert_desired_lrp(&lrp).unwrap();

        lrp.instances = 0;
        let version = store.update_desired_lrp("pg-1", &lrp, 1).unwrap();
        assert_eq!(version, 2);

        let stored = store.get_desired_lrp("pg-1").unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.value.instances, 0);
    }

    #[test]
    fn desired_lrp_update_with_stale_version_conflicts() {
        let store = StateStore::open_in_memory().unwrap();
        let mut lrp = test_lrp("pg-1", "cf-apps");
        store.insert_desired_lrp(&lrp).unwrap();

        lrp.instances = 3;
        store.update_desired_lrp("pg-1", &lrp, 1).unwrap();

        lrp.instances = 5;
        let err = store.update_desired_lrp("pg-1", &lrp, 1).unwrap_err();
        assert!(matches!(
            err,
            StateError::Conflict { expected: 1, actual: 2, .. }
        ));
        assert_eq!(store.get_desired_lrp("pg-1").unwrap().unwrap().value.instances, 3);
    }

    #[test]
    fn desired_lrp_update_missing_is_not_found() {
        let store = StateStore::open_in_memory().unwrap();
        let err = store
            .update_desired_lrp("pg-1", &test_lrp("pg-1", "cf-apps"), 1)
            .unwrap_err();
        assert!(matches!(err, StateError::NotFound(_)));
        assert!(store.get_desired_lrp("pg-1").unwrap().is_none());
    }

    #[test]
    fn desired_lrp_list_by_domain() {
        let store = StateStore::open_in_memory().unwrap();
        store.insert_desired_lrp(&test_lrp("pg-a", "domain-1")).unwrap();
        store.insert_desired_lrp(&test_lrp("pg-b", "wrong-domain")).unwrap();
        store.insert_desired_lrp(&test_lrp("pg-c", "domain-1")).unwrap();

        let filtered = store.list_desired_lrps_for_domain("domain-1").unwrap();
        let guids: Vec<_> = filtered.iter().map(|l| l.process_guid.as_str()).collect();
        assert_eq!(guids, vec!["pg-a", "pg-c"]);

        assert_eq!(store.list_desired_lrps().unwrap().len(), 3);
        assert!(store.list_desired_lrps_for_domain("nobody").unwrap().is_empty());
    }

    #[test]
    fn desired_lrp_delete() {
        let store = StateStore::open_in_memory().unwrap();
        store.insert_desired_lrp(&test_lrp("pg-1", "cf-apps")).unwrap();

        assert!(store.delete_desired_lrp("pg-1").unwrap());
        assert!(!store.delete_desired_lrp("pg-1").unwrap());
        assert!(store.get_desired_lrp("pg-1").unwrap().is_none());

        // The guid is free again after deletion.
        store.insert_desired_lrp(&test_lrp("pg-1", "cf-apps")).unwrap();
        assert_eq!(store.get_desired_lrp("pg-1").unwrap().unwrap().version, 1);
    }

    // ── Tasks ──────────────────────────────────────────────────────

    #[test]
    fn task_insert_get_and_conflict() {
        let store = StateStore::open_in_memory().unwrap();
        let task = test_task("task-1", "tasks");

        store.insert_task(&task).unwrap();
        assert_eq!(store.get_task("task-1").unwrap().unwrap().value, task);

        let err = store.insert_task(&task).unwrap_err();
        assert!(matches!(err, StateError::AlreadyExists(_)));
    }

    #[test]
    fn task_list_by_domain() {
        let store = StateStore::open_in_memory().unwrap();
        store.insert_task(&test_task("task-1", "a")).unwrap();
        store.insert_task(&test_task("task-2", "b")).unwrap();

        assert_eq!(store.list_tasks().unwrap().len(), 2);
        let only_b = store.list_tasks_for_domain("b").unwrap();
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b[0].task_guid, "task-2");
    }

    #[test]
    fn lrps_and_tasks_do_not_share_keys() {
        let store = StateStore::open_in_memory().unwrap();
        store.insert_desired_lrp(&test_lrp("same-guid", "d")).unwrap();
        store.insert_task(&test_task("same-guid", "d")).unwrap();

        assert_eq!(store.list_desired_lrps().unwrap().len(), 1);
        assert_eq!(store.list_tasks().unwrap().len(), 1);
    }

    // ── Persistence (on-disk) ──────────────────────────────────────

    #[test]
    fn persistence_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("keel.redb");

        {
            let store = StateStore::open(&db_path).unwrap();
            store.insert_desired_lrp(&test_lrp("pg-1", "cf-apps")).unwrap();
            store.update_desired_lrp("pg-1", &test_lrp("pg-1", "cf-apps"), 1).unwrap();
        }

        // Reopen the same database file.
        let store = StateStore::open(&db_path).unwrap();
        let stored = store.get_desired_lrp("pg-1").unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.value.domain, "cf-apps");
    }

    // ── Edge cases ─────────────────────────────────────────────────

    #[test]
    fn empty_store_operations() {
        let store = StateStore::open_in_memory().unwrap();

        assert!(store.list_desired_lrps().unwrap().is_empty());
        assert!(store.list_tasks().unwrap().is_empty());
        assert!(store.get_task("nope").unwrap().is_none());
        assert!(!store.delete_desired_lrp("nope").unwrap());
    }
}
