//! The store capability the API layer is written against.
//!
//! [`SpecGateway`] is the narrow set of operations request handlers need:
//! create-if-absent, compare-and-set, get, enumerate, and enumerate by
//! domain. Handlers hold an `Arc<dyn SpecGateway>`, so the backing store
//! (redb on disk, redb in memory, or a test double) can be swapped without
//! touching handler logic.
//!
//! Methods return boxed futures so the trait stays object-safe. The redb
//! implementation runs each call on tokio's blocking pool, so a slow
//! transaction never stalls a runtime worker and a caller's deadline can
//! elapse while it is still running. A future dropped before its first poll
//! never starts its transaction. One dropped after that abandons the result,
//! but the transaction itself still commits or aborts as a whole.

use std::future::Future;
use std::pin::Pin;

use crate::error::{StateError, StateResult};
use crate::store::StateStore;
use crate::types::{DesiredLrp, Task, Versioned};

/// Boxed future alias for gateway results.
pub type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = StateResult<T>> + Send + 'a>>;

/// Read/write access to persisted desired state.
///
/// Error contract:
/// - `desire_*` fails with [`StateError::AlreadyExists`] if the guid is taken.
/// - `update_desired_lrp` fails with [`StateError::NotFound`] if the guid is
///   absent and [`StateError::Conflict`] if the stored version moved.
/// - `remove_desired_lrp` and `get_*` fail with [`StateError::NotFound`].
/// - Anything else is an infrastructure failure.
pub trait SpecGateway: Send + Sync {
    /// Create a desired LRP if no LRP with its process guid exists.
    fn desire_lrp<'a>(&'a self, lrp: &'a DesiredLrp) -> GatewayFuture<'a, ()>;

    /// Replace a desired LRP, provided its version is still `expected_version`.
    fn update_desired_lrp<'a>(
        &'a self,
        process_guid: &'a str,
        lrp: &'a DesiredLrp,
        expected_version: u64,
    ) -> GatewayFuture<'a, ()>;

    fn remove_desired_lrp<'a>(&'a self, process_guid: &'a str) -> GatewayFuture<'a, ()>;

    fn get_desired_lrp<'a>(
        &'a self,
        process_guid: &'a str,
    ) -> GatewayFuture<'a, Versioned<DesiredLrp>>;

    fn get_all_desired_lrps(&self) -> GatewayFuture<'_, Vec<DesiredLrp>>;

    fn get_all_desired_lrps_by_domain<'a>(
        &'a self,
        domain: &'a str,
    ) -> GatewayFuture<'a, Vec<DesiredLrp>>;

    /// Create a task if no task with its guid exists.
    fn desire_task<'a>(&'a self, task: &'a Task) -> GatewayFuture<'a, ()>;

    fn get_task<'a>(&'a self, task_guid: &'a str) -> GatewayFuture<'a, Task>;

    fn get_all_tasks(&self) -> GatewayFuture<'_, Vec<Task>>;

    fn get_all_tasks_by_domain<'a>(&'a self, domain: &'a str) -> GatewayFuture<'a, Vec<Task>>;
}

impl StateStore {
    /// Run `work` against a handle to this store on the blocking pool.
    fn blocking<T, F>(&self, work: F) -> GatewayFuture<'static, T>
    where
        T: Send + 'static,
        F: FnOnce(&StateStore) -> StateResult<T> + Send + 'static,
    {
        let store = self.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || work(&store))
                .await
                .map_err(|e| StateError::Blocking(e.to_string()))?
        })
    }
}

impl SpecGateway for StateStore {
    fn desire_lrp<'a>(&'a self, lrp: &'a DesiredLrp) -> GatewayFuture<'a, ()> {
        let lrp = lrp.clone();
        self.blocking(move |store| store.insert_desired_lrp(&lrp))
    }

    fn update_desired_lrp<'a>(
        &'a self,
        process_guid: &'a str,
        lrp: &'a DesiredLrp,
        expected_version: u64,
    ) -> GatewayFuture<'a, ()> {
        let process_guid = process_guid.to_string();
        let lrp = lrp.clone();
        self.blocking(move |store| {
            store
                .update_desired_lrp(&process_guid, &lrp, expected_version)
                .map(|_| ())
        })
    }

    fn remove_desired_lrp<'a>(&'a self, process_guid: &'a str) -> GatewayFuture<'a, ()> {
        let process_guid = process_guid.to_string();
        self.blocking(move |store| {
            if store.delete_desired_lrp(&process_guid)? {
                Ok(())
            } else {
                Err(StateError::NotFound(process_guid))
            }
        })
    }

    fn get_desired_lrp<'a>(
        &'a self,
        process_guid: &'a str,
    ) -> GatewayFuture<'a, Versioned<DesiredLrp>> {
        let process_guid = process_guid.to_string();
        self.blocking(move |store| {
            store
                .get_desired_lrp(&process_guid)?
                .ok_or(StateError::NotFound(process_guid))
        })
    }

    fn get_all_desired_lrps(&self) -> GatewayFuture<'_, Vec<DesiredLrp>> {
        self.blocking(|store| store.list_desired_lrps())
    }

    fn get_all_desired_lrps_by_domain<'a>(
        &'a self,
        domain: &'a str,
    ) -> GatewayFuture<'a, Vec<DesiredLrp>> {
        let domain = domain.to_string();
        self.blocking(move |store| store.list_desired_lrps_for_domain(&domain))
    }

    fn desire_task<'a>(&'a self, task: &'a Task) -> GatewayFuture<'a, ()> {
        let task = task.clone();
        self.blocking(move |store| store.insert_task(&task))
    }

    fn get_task<'a>(&'a self, task_guid: &'a str) -> GatewayFuture<'a, Task> {
        let task_guid = task_guid.to_string();
        self.blocking(move |store| {
            store
                .get_task(&task_guid)?
                .map(|record| record.value)
                .ok_or(StateError::NotFound(task_guid))
        })
    }

    fn get_all_tasks(&self) -> GatewayFuture<'_, Vec<Task>> {
        self.blocking(|store| store.list_tasks())
    }

    fn get_all_tasks_by_domain<'a>(&'a self, domain: &'a str) -> GatewayFuture<'a, Vec<Task>> {
        let domain = domain.to_string();
        self.blocking(move |store| store.list_tasks_for_domain(&domain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn lrp(process_guid: &str) -> DesiredLrp {
        DesiredLrp {
            process_guid: process_guid.to_string(),
            domain: "cf-apps".to_string(),
            stack: "cflinuxfs4".to_string(),
            instances: 2,
            actions: vec![json!({"action": "run", "args": {"path": "/bin/server"}})],
            routes: Vec::new(),
            annotation: String::new(),
        }
    }

    fn gateway() -> Arc<dyn SpecGateway> {
        Arc::new(StateStore::open_in_memory().unwrap())
    }

    #[tokio::test]
    async fn get_missing_lrp_is_not_found() {
        let gateway = gateway();
        let err = gateway.get_desired_lrp("missing").await.unwrap_err();
        assert!(matches!(err, StateError::NotFound(ref guid) if guid == "missing"));
    }

    #[tokio::test]
    async fn remove_missing_lrp_is_not_found() {
        let gateway = gateway();
        let err = gateway.remove_desired_lrp("missing").await.unwrap_err();
        assert!(matches!(err, StateError::NotFound(_)));
    }

    #[tokio::test]
    async fn desire_then_compare_and_set() {
        let gateway = gateway();
        let mut spec = lrp("pg-1");
        gateway.desire_lrp(&spec).await.unwrap();

        let current = gateway.get_desired_lrp("pg-1").await.unwrap();
        spec.instances = 7;
        gateway
            .update_desired_lrp("pg-1", &spec, current.version)
            .await
            .unwrap();

        // Reusing the old version loses the race.
        let err = gateway
            .update_desired_lrp("pg-1", &spec, current.version)
            .await
            .unwrap_err();
        assert!(matches!(err, StateError::Conflict { .. }));
    }

    #[tokio::test]
    async fn dropped_future_performs_no_write() {
        let gateway = gateway();
        let spec = lrp("pg-1");
        drop(gateway.desire_lrp(&spec));

        assert!(gateway.get_all_desired_lrps().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_task_strips_version() {
        let gateway = gateway();
        let task = Task {
            task_guid: "task-1".to_string(),
            domain: "tasks".to_string(),
            stack: String::new(),
            actions: vec![json!({"action": "run", "args": {"path": "/bin/true"}})],
            memory_mb: 0,
            disk_mb: 0,
            cpu_percent: 0.0,
            log: Default::default(),
            annotation: String::new(),
        };
        gateway.desire_task(&task).await.unwrap();
        assert_eq!(gateway.get_task("task-1").await.unwrap(), task);
        assert_eq!(gateway.get_all_tasks_by_domain("tasks").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deadline_elapses_while_store_is_busy() {
        let store = StateStore::open_in_memory().unwrap();
        let spec = lrp("pg-1");

        // redb admits one writer at a time; hold the slot so the call queues.
        let held = store.db.begin_write().unwrap();
        let result = tokio::time::timeout(
            Duration::from_millis(20),
            SpecGateway::desire_lrp(&store, &spec),
        )
        .await;
        assert!(result.is_err());

        // Reads are not blocked by a pending writer.
        assert!(
            SpecGateway::get_all_desired_lrps(&store)
                .await
                .unwrap()
                .is_empty()
        );

        // The abandoned call commits whole once the writer slot frees up.
        drop(held);
        let mut stored = None;
        for _ in 0..100 {
            if let Ok(record) = SpecGateway::get_desired_lrp(&store, "pg-1").await {
                stored = Some(record);
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        let stored = stored.expect("abandoned write never landed");
        assert_eq!(stored.version, 1);
        assert_eq!(stored.value, spec);
    }
}
