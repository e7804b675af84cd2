use std::collections::HashSet;

use sha2::{Digest, Sha256};

use crate::authz::types::{AuthorizationRequest, NormalizedGrant, ParamValue, ParameterValues};

/// Does `grant` satisfy `request`?
///
/// True when the codes are equal and the grant's parameter values either
/// equal the request's exactly or are empty (blanket grant).
pub fn complies(grant: &NormalizedGrant, request: &AuthorizationRequest) -> bool {
    grant.permission.code == request.action_code
        && (grant.parameter_values.is_empty()
            || grant.parameter_values == request.parameter_values)
}

/// Linear scan over the grants.
pub fn has_permission(grants: &[NormalizedGrant], request: &AuthorizationRequest) -> bool {
    grants.iter().any(|grant| complies(grant, request))
}

/// True if any of `requests` is authorized, checked in order.
pub fn has_any(grants: &[NormalizedGrant], requests: &[AuthorizationRequest]) -> bool {
    requests.iter().any(|request| has_permission(grants, request))
}

pub type Fingerprint = [u8; 32];

/// SHA-256 over the action code and the key-sorted parameter assignment.
///
/// Each field is length-prefixed and every value carries a kind tag, so
/// distinct assignments (including `1` vs `"1"`) never share an encoding.
pub fn fingerprint(action_code: &str, values: &ParameterValues) -> Fingerprint {
    let mut hasher = Sha256::new();
    update_field(&mut hasher, action_code.as_bytes());
    hasher.update((values.len() as u64).to_be_bytes());
    for (name, value) in values {
        update_field(&mut hasher, name.as_bytes());
        match value {
            ParamValue::Bool(b) => {
                hasher.update(b"b");
                hasher.update([u8::from(*b)]);
            }
            ParamValue::Int(i) => {
                hasher.update(b"i");
                hasher.update(i.to_be_bytes());
            }
            ParamValue::Str(s) => {
                hasher.update(b"s");
                update_field(&mut hasher, s.as_bytes());
            }
        }
    }
    hasher.finalize().into()
}

fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_be_bytes());
    hasher.update(bytes);
}

/// Set of grant fingerprints giving expected O(1) point checks.
///
/// Answers exactly like [`has_permission`] over the grants it was built from.
#[derive(Debug, Clone, Default)]
pub struct FingerprintIndex {
    fingerprints: HashSet<Fingerprint>,
}

impl FingerprintIndex {
    pub fn build<'a, I>(grants: I) -> Self
    where
        I: IntoIterator<Item = &'a NormalizedGrant>,
    {
        let fingerprints = grants
            .into_iter()
            .map(|g| fingerprint(g.code(), &g.parameter_values))
            .collect();
        Self { fingerprints }
    }

    pub fn contains(&self, request: &AuthorizationRequest) -> bool {
        if self
            .fingerprints
            .contains(&fingerprint(&request.action_code, &request.parameter_values))
        {
            return true;
        }
        // A blanket grant's fingerprint never equals a parameterized request's
        !request.parameter_values.is_empty()
            && self
                .fingerprints
                .contains(&fingerprint(&request.action_code, &ParameterValues::new()))
    }

    pub fn contains_any(&self, requests: &[AuthorizationRequest]) -> bool {
        requests.iter().any(|request| self.contains(request))
    }

    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}
