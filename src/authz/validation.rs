use crate::authz::errors::AuthzError;
use crate::authz::types::{Grant, ParameterValues, Permission};

/// Check a parameter assignment against a permission definition.
///
/// The supplied names must be either empty (blanket grant) or exactly the
/// declared parameter set. Called before every grant is persisted.
pub fn validate_parameters(
    permission: &Permission,
    values: &ParameterValues,
) -> Result<(), AuthzError> {
    // Both sides are sorted sets, so an ordered comparison is set equality
    if values.is_empty() || values.keys().eq(permission.parameters.iter()) {
        return Ok(());
    }

    Err(AuthzError::ParameterMismatch {
        code: permission.code.clone(),
        declared: permission.parameters.iter().cloned().collect(),
        supplied: values.keys().cloned().collect(),
    })
}

pub fn validate_grant(grant: &Grant) -> Result<(), AuthzError> {
    validate_parameters(&grant.permission, &grant.parameter_values)
}
