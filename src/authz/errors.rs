use miette::Diagnostic;
use thiserror::Error;

use crate::errors::PrbacError;

#[derive(Debug, Error, Diagnostic)]
pub enum AuthzError {
    #[error("Parameter values {supplied:?} do not match the parameters {declared:?} of permission `{code}`")]
    #[diagnostic(
        code(prbac::authz::parameter_mismatch),
        help("Supply either no parameter values (a blanket grant) or exactly the parameters the permission declares")
    )]
    ParameterMismatch {
        code: String,
        declared: Vec<String>,
        supplied: Vec<String>,
    },

    #[error("`{subject}` holds no direct grant of `{code}` with these parameter values")]
    #[diagnostic(
        code(prbac::authz::grant_not_found),
        help("List the subject's grants to see which parameter values were granted")
    )]
    GrantNotFound { subject: String, code: String },

    #[error("`{subject}` still holds `{code}` through a broader or inherited grant")]
    #[diagnostic(
        code(prbac::authz::not_revocable),
        help("Revoke the blanket grant or the group grant that implies this access instead")
    )]
    PermissionNotRevocable { subject: String, code: String },

    #[error("Undefined permission `{0}`")]
    #[diagnostic(
        code(prbac::authz::undefined_permission),
        help("Create the permission in the catalog before granting or checking it")
    )]
    PermissionUndefined(String),

    #[error("Unknown subject `{0}`")]
    #[diagnostic(code(prbac::authz::unknown_subject))]
    SubjectNotFound(String),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Storage(#[from] PrbacError),
}

impl From<sea_orm::DbErr> for AuthzError {
    fn from(value: sea_orm::DbErr) -> Self {
        AuthzError::Storage(value.into())
    }
}
