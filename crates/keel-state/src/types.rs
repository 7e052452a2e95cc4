//! Domain types for the Keel state store.
//!
//! These types are the internal specification shapes persisted in redb.
//! Actions are kept as opaque JSON so that whatever the client submitted is
//! stored and served back verbatim; [`crate::action`] decides whether an
//! action is of a known kind.

use serde::{Deserialize, Serialize};

/// Client-supplied identity of a desired LRP.
pub type ProcessGuid = String;

/// Client-supplied identity of a task.
pub type TaskGuid = String;

/// An executable action descriptor, as submitted by the client.
pub type ActionPayload = serde_json::Value;

// ── Desired LRP ───────────────────────────────────────────────────

/// Desired state of a long-running process group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DesiredLrp {
    pub process_guid: ProcessGuid,
    /// Ownership tag; does not participate in identity.
    pub domain: String,
    /// Execution environment tag.
    pub stack: String,
    /// Desired replica count. Zero means "scaled to zero", not deleted.
    pub instances: i32,
    pub actions: Vec<ActionPayload>,
    /// Route strings, owned by the routing layer and stored verbatim.
    pub routes: Vec<String>,
    pub annotation: String,
}

// ── Task ──────────────────────────────────────────────────────────

/// Desired state of a one-shot unit of work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub task_guid: TaskGuid,
    pub domain: String,
    pub stack: String,
    pub actions: Vec<ActionPayload>,
    pub memory_mb: i32,
    pub disk_mb: i32,
    pub cpu_percent: f64,
    pub log: LogConfig,
    pub annotation: String,
}

/// Where a task's output should be shipped.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct LogConfig {
    #[serde(default)]
    pub guid: String,
    #[serde(default)]
    pub source_name: String,
}

// ── Storage envelope ──────────────────────────────────────────────

/// A stored value together with its store-assigned version.
///
/// Versions start at 1 on create and increase by one on every successful
/// compare-and-set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Versioned<T> {
    pub version: u64,
    pub value: T,
}

/// Common accessors the store needs to key and filter specifications.
pub trait Spec {
    /// The immutable, client-supplied identity.
    fn guid(&self) -> &str;
    fn domain(&self) -> &str;
}

impl Spec for DesiredLrp {
    fn guid(&self) -> &str {
        &self.process_guid
    }

    fn domain(&self) -> &str {
        &self.domain
    }
}

impl Spec for Task {
    fn guid(&self) -> &str {
        &self.task_guid
    }

    fn domain(&self) -> &str {
        &self.domain
    }
}
