//! Structural and semantic checks that gate entry into desired state.
//!
//! Checks run in a fixed order and stop at the first violation:
//! identity, actions, numeric fields, domain.

use thiserror::Error;

use keel_state::{ActionPayload, DesiredLrp, ExecutorAction, Task};

/// A specification was rejected. `reason` is safe to show to callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ValidationError {
    pub reason: String,
}

impl ValidationError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A specification that can be checked before it is stored.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

impl Validate for DesiredLrp {
    fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("process_guid", &self.process_guid)?;
        validate_actions(&self.actions)?;
        require_non_negative("instances", self.instances)?;
        require_non_empty("domain", &self.domain)
    }
}

impl Validate for Task {
    fn validate(&self) -> Result<(), ValidationError> {
        require_non_empty("task_guid", &self.task_guid)?;
        validate_actions(&self.actions)?;
        require_non_negative("memory_mb", self.memory_mb)?;
        require_non_negative("disk_mb", self.disk_mb)?;
        if self.cpu_percent.is_nan() || self.cpu_percent < 0.0 {
            return Err(ValidationError::new("cpu_percent must not be negative"));
        }
        require_non_empty("domain", &self.domain)
    }
}

fn require_non_empty(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::new(format!("{field} must not be empty")));
    }
    Ok(())
}

fn require_non_negative(field: &str, value: i32) -> Result<(), ValidationError> {
    if value < 0 {
        return Err(ValidationError::new(format!(
            "{field} must not be negative (got {value})"
        )));
    }
    Ok(())
}

fn validate_actions(actions: &[ActionPayload]) -> Result<(), ValidationError> {
    if actions.is_empty() {
        return Err(ValidationError::new("actions must not be empty"));
    }
    for (index, payload) in actions.iter().enumerate() {
        ExecutorAction::decode(payload)
            .map_err(|e| ValidationError::new(format!("actions[{index}]: {e}")))?;
    }
    Ok(())
}
