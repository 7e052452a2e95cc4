//! Applies a partial update onto a stored desired LRP.

use keel_state::DesiredLrp;

use crate::validate::{Validate, ValidationError};
use crate::wire::DesiredLrpUpdateRequest;

/// Produce the desired LRP that results from applying `update` to `existing`.
///
/// Unset fields keep their stored value; set fields replace it, including
/// explicit zero and empty values. An update that mentions `process_guid`,
/// `domain`, or `stack` is rejected. The result is validated before it is
/// returned.
pub fn merge_desired_lrp(
    existing: &DesiredLrp,
    update: DesiredLrpUpdateRequest,
) -> Result<DesiredLrp, ValidationError> {
    let DesiredLrpUpdateRequest {
        instances,
        routes,
        annotation,
        actions,
        process_guid,
        domain,
        stack,
    } = update;

    for (field, present) in [
        ("process_guid", process_guid.is_some()),
        ("domain", domain.is_some()),
        ("stack", stack.is_some()),
    ] {
        if present {
            return Err(ValidationError::new(format!("{field} cannot be updated")));
        }
    }

    let merged = DesiredLrp {
        process_guid: existing.process_guid.clone(),
        domain: existing.domain.clone(),
        stack: existing.stack.clone(),
        instances: instances.apply(existing.instances),
        actions: actions.apply(existing.actions.clone()),
        routes: routes.apply(existing.routes.clone()),
        annotation: annotation.apply(existing.annotation.clone()),
    };
    merged.validate()?;
    Ok(merged)
}
