//! Executor action decoding.
//!
//! Actions travel through the API as opaque JSON in the adjacently tagged
//! form `{"action": "<kind>", "args": {...}}`. This module knows the set of
//! action kinds the executors understand and decodes a payload into an
//! [`ExecutorAction`], recursing into wrapping actions (`try`, `monitor`,
//! `parallel`, `emit_progress`, `timeout`).

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ActionPayload;

/// A payload did not decode into a known action.
#[derive(Debug, Error)]
#[error("invalid action: {0}")]
pub struct ActionDecodeError(#[from] serde_json::Error);

/// Every action kind an executor can run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "args", rename_all = "snake_case")]
pub enum ExecutorAction {
    Download(DownloadAction),
    Upload(UploadAction),
    Run(RunAction),
    FetchResult(FetchResultAction),
    EmitProgress(EmitProgressAction),
    Try(TryAction),
    Monitor(MonitorAction),
    Parallel(ParallelAction),
    Timeout(TimeoutAction),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadAction {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub cache_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadAction {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunAction {
    pub path: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: Vec<EnvironmentVariable>,
    #[serde(default)]
    pub resource_limits: ResourceLimits,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ResourceLimits {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nofile: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchResultAction {
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmitProgressAction {
    pub action: Box<ExecutorAction>,
    #[serde(default)]
    pub start_message: String,
    #[serde(default)]
    pub success_message: String,
    #[serde(default)]
    pub failure_message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TryAction {
    pub action: Box<ExecutorAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorAction {
    pub action: Box<ExecutorAction>,
    #[serde(default)]
    pub healthy_threshold: u32,
    #[serde(default)]
    pub unhealthy_threshold: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelAction {
    pub actions: Vec<ExecutorAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutAction {
    pub action: Box<ExecutorAction>,
    pub timeout_ms: u64,
}

impl ExecutorAction {
    /// Decode an opaque payload into a known action.
    pub fn decode(payload: &ActionPayload) -> Result<Self, ActionDecodeError> {
        Ok(ExecutorAction::deserialize(payload)?)
    }
}
