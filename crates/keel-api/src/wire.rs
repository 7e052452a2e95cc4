//! Request and response bodies as they appear on the wire.
//!
//! Every field of a create request defaults when omitted so that a missing
//! identity or action list is reported by the validator (with a reason)
//! rather than as a JSON decoding failure.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use keel_state::{ActionPayload, LogConfig};

// ── Three-state update fields ──────────────────────────────────────

/// A field of a partial update: either not mentioned, or set to a value.
///
/// `Set` carries explicit zero/empty values (`0`, `""`, `[]`) distinctly
/// from `Unset`. A JSON `null` is read as `Unset`.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate<T> {
    Unset,
    Set(T),
}

impl<T> FieldUpdate<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, FieldUpdate::Unset)
    }

    pub fn is_set(&self) -> bool {
        matches!(self, FieldUpdate::Set(_))
    }

    /// The supplied value, or `current` if the field was not mentioned.
    pub fn apply(self, current: T) -> T {
        match self {
            FieldUpdate::Unset => current,
            FieldUpdate::Set(value) => value,
        }
    }
}

impl<T> Default for FieldUpdate<T> {
    fn default() -> Self {
        FieldUpdate::Unset
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for FieldUpdate<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<T>::deserialize(deserializer)?.map_or(FieldUpdate::Unset, FieldUpdate::Set))
    }
}

impl<T: Serialize> Serialize for FieldUpdate<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldUpdate::Unset => serializer.serialize_none(),
            FieldUpdate::Set(value) => value.serialize(serializer),
        }
    }
}

// ── Desired LRPs ───────────────────────────────────────────────────

/// Body of `POST /desired_lrps`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DesiredLrpCreateRequest {
    pub process_guid: String,
    pub domain: String,
    pub stack: String,
    /// Defaults to 1 when omitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instances: Option<i32>,
    pub actions: Vec<ActionPayload>,
    pub routes: Vec<String>,
    pub annotation: String,
}

/// Body of `PUT /desired_lrps/{process_guid}`.
///
/// Only `instances`, `routes`, `annotation`, and `actions` may change.
/// `process_guid`, `domain`, and `stack` are decoded only so that an update
/// mentioning them can be rejected by name; for those, any value counts as
/// present, `null` included.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DesiredLrpUpdateRequest {
    #[serde(skip_serializing_if = "FieldUpdate::is_unset")]
    pub instances: FieldUpdate<i32>,
    #[serde(skip_serializing_if = "FieldUpdate::is_unset")]
    pub routes: FieldUpdate<Vec<String>>,
    #[serde(skip_serializing_if = "FieldUpdate::is_unset")]
    pub annotation: FieldUpdate<String>,
    #[serde(skip_serializing_if = "FieldUpdate::is_unset")]
    pub actions: FieldUpdate<Vec<ActionPayload>>,

    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub process_guid: Option<serde_json::Value>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub domain: Option<serde_json::Value>,
    #[serde(deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub stack: Option<serde_json::Value>,
}

/// Records that a field was sent, whatever its value.
fn present<'de, D>(deserializer: D) -> Result<Option<serde_json::Value>, D::Error>
where
    D: Deserializer<'de>,
{
    serde_json::Value::deserialize(deserializer).map(Some)
}

/// A desired LRP as served by the read endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DesiredLrpResponse {
    pub process_guid: String,
    pub domain: String,
    pub stack: String,
    pub instances: i32,
    pub actions: Vec<ActionPayload>,
    pub routes: Vec<String>,
    pub annotation: String,
}

// ── Tasks ──────────────────────────────────────────────────────────

/// Body of `POST /tasks`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct CreateTaskRequest {
    pub task_guid: String,
    pub domain: String,
    pub stack: String,
    pub actions: Vec<ActionPayload>,
    pub memory_mb: i32,
    pub disk_mb: i32,
    pub cpu_percent: f64,
    pub log: LogConfig,
    pub annotation: String,
}

/// A task as served by the read endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskResponse {
    pub task_guid: String,
    pub domain: String,
    pub stack: String,
    pub actions: Vec<ActionPayload>,
    pub memory_mb: i32,
    pub disk_mb: i32,
    pub cpu_percent: f64,
    pub log: LogConfig,
    pub annotation: String,
}
