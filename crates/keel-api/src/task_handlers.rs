//! Task handlers.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use tracing::{info, warn};

use crate::ApiState;
use crate::error::ApiError;
use crate::handlers::invalid_json;
use crate::mapper::task_from_request;
use crate::wire::{CreateTaskRequest, TaskResponse};

/// POST /tasks
///
/// Unlike desired LRPs, a task guid may only be desired once; a repeat is
/// a 409 `TaskGuidAlreadyExists`.
pub async fn create_task(
    State(state): State<ApiState>,
    payload: Result<Json<CreateTaskRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(req) = payload.map_err(invalid_json)?;
    let task = task_from_request(req).map_err(|e| {
        warn!(reason = %e, "task request invalid");
        ApiError::invalid_task(e)
    })?;

    state
        .call("desire-task", state.gateway.desire_task(&task))
        .await?
        .map_err(|e| {
            warn!(task_guid = %task.task_guid, error = %e, "desire task failed");
            ApiError::from_task_store(e)
        })?;

    info!(task_guid = %task.task_guid, domain = %task.domain, "task created");
    Ok(StatusCode::CREATED)
}

/// GET /tasks/{task_guid}
pub async fn get_task(
    State(state): State<ApiState>,
    Path(task_guid): Path<String>,
) -> Result<Json<TaskResponse>, ApiError> {
    let task = state
        .call("get-task", state.gateway.get_task(&task_guid))
        .await?
        .map_err(ApiError::from_task_store)?;
    Ok(Json(task.into()))
}

/// GET /tasks
pub async fn list_tasks(
    State(state): State<ApiState>,
) -> Result<Json<Vec<TaskResponse>>, ApiError> {
    let tasks = state
        .call("get-all-tasks", state.gateway.get_all_tasks())
        .await?
        .map_err(ApiError::from_task_store)?;
    Ok(Json(tasks.into_iter().map(Into::into).collect()))
}

/// GET /domains/{domain}/tasks
pub async fn list_tasks_by_domain(
    State(state): State<ApiState>,
    Path(domain): Path<String>,
) -> Result<Json<Vec<TaskResponse>>, ApiError> {
    let tasks = state
        .call("get-tasks-by-domain", state.gateway.get_all_tasks_by_domain(&domain))
        .await?
        .map_err(ApiError::from_task_store)?;
    Ok(Json(tasks.into_iter().map(Into::into).collect()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::response::IntoResponse;
    use keel_state::{LogConfig, StateStore};
    use serde_json::json;

    use crate::error::{ErrorBody, ErrorKind};

    fn test_state() -> (ApiState, Arc<StateStore>) {
        let store = Arc::new(StateStore::open_in_memory().unwrap());
        (ApiState::new(store.clone()), store)
    }

    fn task_request(task_guid: &str, domain: &str) -> CreateTaskRequest {
        CreateTaskRequest {
            task_guid: task_guid.to_string(),
            domain: domain.to_string(),
            stack: "some-stack".to_string(),
            actions: vec![json!({"action": "run", "args": {"path": "/bin/bash", "args": ["echo", "hi"]}})],
            memory_mb: 256,
            disk_mb: 1024,
            cpu_percent: 25.0,
            log: LogConfig {
                guid: "log-guid".to_string(),
                source_name: "APP".to_string(),
            },
            annotation: "".to_string(),
        }
    }

    async fn create(state: &ApiState, req: CreateTaskRequest) -> axum::response::Response {
        create_task(State(state.clone()), Ok(Json(req)))
            .await
            .into_response()
    }

    #[tokio::test]
    async fn create_then_get() {
        let (state, _) = test_state();
        let req = task_request("task-1", "d");
        assert_eq!(create(&state, req.clone()).await.status(), StatusCode::CREATED);

        let Json(task) = get_task(State(state), Path("task-1".to_string()))
            .await
            .unwrap();
        assert_eq!(
            serde_json::to_value(&task).unwrap(),
            serde_json::to_value(&req).unwrap()
        );
    }

    #[tokio::test]
    async fn duplicate_guid_conflicts() {
        let (state, store) = test_state();
        create(&state, task_request("task-1", "d")).await;

        let mut second = task_request("task-1", "d");
        second.memory_mb = 1;
        let resp = create(&state, second).await;
        assert_eq!(resp.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.kind, ErrorKind::TaskGuidAlreadyExists);
        assert_eq!(body.message, "task already exists");

        let stored = store.get_task("task-1").unwrap().unwrap();
        assert_eq!(stored.value.memory_mb, 256);
    }

    #[tokio::test]
    async fn invalid_task_is_rejected() {
        let (state, store) = test_state();
        let mut req = task_request("task-1", "d");
        req.cpu_percent = -1.0;

        let resp = create(&state, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body.kind, ErrorKind::InvalidTask);
        assert!(store.list_tasks().unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_missing_task() {
        let (state, _) = test_state();
        let err = get_task(State(state), Path("nope".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TaskNotFound);
    }

    #[tokio::test]
    async fn lists_filter_by_domain() {
        let (state, _) = test_state();
        for i in 0..3 {
            create(&state, task_request(&format!("a-{i}"), "alpha")).await;
        }
        create(&state, task_request("b-0", "beta")).await;

        let Json(all) = list_tasks(State(state.clone())).await.unwrap();
        assert_eq!(all.len(), 4);

        let Json(alpha) = list_tasks_by_domain(State(state.clone()), Path("alpha".to_string()))
            .await
            .unwrap();
        assert_eq!(alpha.len(), 3);
        assert!(alpha.iter().all(|t| t.domain == "alpha"));

        let Json(none) = list_tasks_by_domain(State(state), Path("gamma".to_string()))
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
