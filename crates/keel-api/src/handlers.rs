//! Desired LRP handlers.
//!
//! Each handler decodes, validates, and (for updates) merges before it
//! issues at most one store mutation, then maps the outcome onto the wire
//! error taxonomy.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use tracing::{info, warn};

use keel_state::StateError;

use crate::ApiState;
use crate::error::ApiError;
use crate::mapper::desired_lrp_from_request;
use crate::merge::merge_desired_lrp;
use crate::wire::{DesiredLrpCreateRequest, DesiredLrpResponse, DesiredLrpUpdateRequest};

/// Turn an axum body rejection into an `InvalidJSON` error.
pub(crate) fn invalid_json(rejection: JsonRejection) -> ApiError {
    let message = rejection.body_text();
    warn!(error = %message, "invalid json");
    ApiError::invalid_json(message)
}

/// GET /ping
pub async fn ping() -> StatusCode {
    StatusCode::OK
}

/// POST /desired_lrps
///
/// Creating an LRP whose process guid already exists succeeds without
/// touching the stored spec.
pub async fn create_desired_lrp(
    State(state): State<ApiState>,
    payload: Result<Json<DesiredLrpCreateRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(req) = payload.map_err(invalid_json)?;
    let lrp = desired_lrp_from_request(req).map_err(|e| {
        warn!(reason = %e, "desired lrp request invalid");
        ApiError::invalid_lrp(e)
    })?;

    match state
        .call("desire-lrp", state.gateway.desire_lrp(&lrp))
        .await?
    {
        Ok(()) => {
            info!(
                process_guid = %lrp.process_guid,
                domain = %lrp.domain,
                "desired lrp created"
            );
        }
        Err(StateError::AlreadyExists(_)) => {
            info!(process_guid = %lrp.process_guid, "desired lrp already exists");
        }
        Err(e) => return Err(ApiError::from_lrp_store(e)),
    }
    Ok(StatusCode::CREATED)
}

/// GET /desired_lrps/{process_guid}
pub async fn get_desired_lrp(
    State(state): State<ApiState>,
    Path(process_guid): Path<String>,
) -> Result<Json<DesiredLrpResponse>, ApiError> {
    let record = state
        .call("get-desired-lrp", state.gateway.get_desired_lrp(&process_guid))
        .await?
        .map_err(ApiError::from_lrp_store)?;
    Ok(Json(record.value.into()))
}

/// GET /desired_lrps
pub async fn list_desired_lrps(
    State(state): State<ApiState>,
) -> Result<Json<Vec<DesiredLrpResponse>>, ApiError> {
    let lrps = state
        .call("get-all-desired-lrps", state.gateway.get_all_desired_lrps())
        .await?
        .map_err(ApiError::from_lrp_store)?;
    Ok(Json(lrps.into_iter().map(Into::into).collect()))
}

/// GET /domains/{domain}/desired_lrps
pub async fn list_desired_lrps_by_domain(
    State(state): State<ApiState>,
    Path(domain): Path<String>,
) -> Result<Json<Vec<DesiredLrpResponse>>, ApiError> {
    let lrps = state
        .call(
            "get-desired-lrps-by-domain",
            state.gateway.get_all_desired_lrps_by_domain(&domain),
        )
        .await?
        .map_err(ApiError::from_lrp_store)?;
    Ok(Json(lrps.into_iter().map(Into::into).collect()))
}

/// PUT /desired_lrps/{process_guid}
///
/// Fetches the current spec and its version, merges the update, and writes
/// it back only if nobody else wrote in between.
pub async fn update_desired_lrp(
    State(state): State<ApiState>,
    Path(process_guid): Path<String>,
    payload: Result<Json<DesiredLrpUpdateRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(update) = payload.map_err(invalid_json)?;

    let existing = state
        .call("get-desired-lrp", state.gateway.get_desired_lrp(&process_guid))
        .await?
        .map_err(ApiError::from_lrp_store)?;

    let merged = merge_desired_lrp(&existing.value, update).map_err(|e| {
        warn!(%process_guid, reason = %e, "desired lrp update invalid");
        ApiError::invalid_lrp(e)
    })?;

    state
        .call(
            "update-desired-lrp",
            state
                .gateway
                .update_desired_lrp(&process_guid, &merged, existing.version),
        )
        .await?
        .map_err(|e| {
            if matches!(e, StateError::Conflict { .. }) {
                warn!(
                    %process_guid,
                    version = existing.version,
                    "desired lrp update lost a race"
                );
            }
            ApiError::from_lrp_store(e)
        })?;

    info!(%process_guid, instances = merged.instances, "desired lrp updated");
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /desired_lrps/{process_guid}
pub async fn delete_desired_lrp(
    State(state): State<ApiState>,
    Path(process_guid): Path<String>,
) -> Result<StatusCode, ApiError> {
    state
        .call("remove-desired-lrp", state.gateway.remove_desired_lrp(&process_guid))
        .await?
        .map_err(ApiError::from_lrp_store)?;
    info!(%process_guid, "desired lrp removed");
    Ok(StatusCode::NO_CONTENT)
}
