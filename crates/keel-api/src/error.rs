//! Wire error taxonomy and the mapping from internal failures onto it.
//!
//! Every failure a handler can produce becomes an [`ApiError`], which
//! renders as `{"type": <kind>, "message": <text>}` with the status code
//! owned by its [`ErrorKind`]. A store failure the gateway contract does
//! not name for that entity becomes `UnknownError` carrying only
//! [`StateError::summary`]; the full error is logged.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use keel_state::StateError;

use crate::validate::ValidationError;

/// Machine-matchable failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    #[serde(rename = "InvalidJSON")]
    InvalidJson,
    #[serde(rename = "InvalidLRP")]
    InvalidLrp,
    #[serde(rename = "InvalidTask")]
    InvalidTask,
    #[serde(rename = "LRPNotFound")]
    LrpNotFound,
    #[serde(rename = "TaskNotFound")]
    TaskNotFound,
    #[serde(rename = "TaskGuidAlreadyExists")]
    TaskGuidAlreadyExists,
    #[serde(rename = "ResourceConflict")]
    ResourceConflict,
    #[serde(rename = "UnknownError")]
    Unknown,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::InvalidJson | ErrorKind::InvalidLrp | ErrorKind::InvalidTask => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::LrpNotFound | ErrorKind::TaskNotFound => StatusCode::NOT_FOUND,
            ErrorKind::TaskGuidAlreadyExists | ErrorKind::ResourceConflict => StatusCode::CONFLICT,
            ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// The JSON body of every non-2xx response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind:?}: {message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_json(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidJson, message)
    }

    pub fn invalid_lrp(err: ValidationError) -> Self {
        Self::new(ErrorKind::InvalidLrp, err.reason)
    }

    pub fn invalid_task(err: ValidationError) -> Self {
        Self::new(ErrorKind::InvalidTask, err.reason)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// Classify a store failure on a desired LRP operation.
    pub fn from_lrp_store(err: StateError) -> Self {
        match err {
            StateError::NotFound(guid) => {
                Self::new(ErrorKind::LrpNotFound, format!("desired lrp not found: {guid}"))
            }
            StateError::Conflict { key, .. } => Self::new(
                ErrorKind::ResourceConflict,
                format!("desired lrp {key} was modified concurrently"),
            ),
            other => Self::from_store_failure(other),
        }
    }

    /// Classify a store failure on a task operation.
    pub fn from_task_store(err: StateError) -> Self {
        match err {
            StateError::NotFound(guid) => {
                Self::new(ErrorKind::TaskNotFound, format!("task not found: {guid}"))
            }
            StateError::AlreadyExists(_) => {
                Self::new(ErrorKind::TaskGuidAlreadyExists, "task already exists")
            }
            other => Self::from_store_failure(other),
        }
    }

    fn from_store_failure(err: StateError) -> Self {
        error!(error = %err, "store operation failed");
        Self::unknown(err.summary())
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            kind: self.kind,
            message: self.message.clone(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.kind.status();
        (
            status,
            Json(ErrorBody {
                kind: self.kind,
                message: self.message,
            }),
        )
            .into_response()
    }
}
