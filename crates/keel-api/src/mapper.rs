//! Translation between wire bodies and stored specifications.

use keel_state::{DesiredLrp, Task};

use crate::validate::{Validate, ValidationError};
use crate::wire::{CreateTaskRequest, DesiredLrpCreateRequest, DesiredLrpResponse, TaskResponse};

/// Replica count used when a create request leaves `instances` out.
pub const DEFAULT_INSTANCES: i32 = 1;

/// Build a desired LRP from a create request, applying defaults, and
/// validate it.
pub fn desired_lrp_from_request(
    req: DesiredLrpCreateRequest,
) -> Result<DesiredLrp, ValidationError> {
    let lrp = DesiredLrp {
        process_guid: req.process_guid,
        domain: req.domain,
        stack: req.stack,
        instances: req.instances.unwrap_or(DEFAULT_INSTANCES),
        actions: req.actions,
        routes: req.routes,
        annotation: req.annotation,
    };
    lrp.validate()?;
    Ok(lrp)
}

/// Build a task from a create request and validate it.
pub fn task_from_request(req: CreateTaskRequest) -> Result<Task, ValidationError> {
    let task = Task {
        task_guid: req.task_guid,
        domain: req.domain,
        stack: req.stack,
        actions: req.actions,
        memory_mb: req.memory_mb,
        disk_mb: req.disk_mb,
        cpu_percent: req.cpu_percent,
        log: req.log,
        annotation: req.annotation,
    };
    task.validate()?;
    Ok(task)
}

impl From<DesiredLrp> for DesiredLrpResponse {
    fn from(lrp: DesiredLrp) -> Self {
        Self {
            process_guid: lrp.process_guid,
            domain: lrp.domain,
            stack: lrp.stack,
            instances: lrp.instances,
            actions: lrp.actions,
            routes: lrp.routes,
            annotation: lrp.annotation,
        }
    }
}

impl From<Task> for TaskResponse {
    fn from(task: Task) -> Self {
        Self {
            task_guid: task.task_guid,
            domain: task.domain,
            stack: task.stack,
            actions: task.actions,
            memory_mb: task.memory_mb,
            disk_mb: task.disk_mb,
            cpu_percent: task.cpu_percent,
            log: task.log,
            annotation: task.annotation,
        }
    }
}
