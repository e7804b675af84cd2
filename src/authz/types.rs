use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// A scalar parameter value. Values of different kinds never compare equal,
/// so `1` and `"1"` are distinct assignments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl ParamValue {
    /// Interpret a command-line literal: `true`/`false`, then integers,
    /// anything else is kept as a string.
    pub fn parse_literal(s: &str) -> Self {
        match s {
            "true" => ParamValue::Bool(true),
            "false" => ParamValue::Bool(false),
            _ => s
                .parse::<i64>()
                .map(ParamValue::Int)
                .unwrap_or_else(|_| ParamValue::Str(s.to_string())),
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{b}"),
            ParamValue::Int(i) => write!(f, "{i}"),
            ParamValue::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(value.into())
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

/// Parameter name -> value. Key-sorted, so its JSON form is canonical.
pub type ParameterValues = BTreeMap<String, ParamValue>;

/// Build a [`ParameterValues`] from `(name, value)` pairs.
pub fn params<K, V, I>(pairs: I) -> ParameterValues
where
    K: Into<String>,
    V: Into<ParamValue>,
    I: IntoIterator<Item = (K, V)>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}

/// Parse a `name=value` assignment, e.g. `module_id=1`.
pub fn parse_assignment(s: &str) -> Option<(String, ParamValue)> {
    let (name, value) = s.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name.to_string(), ParamValue::parse_literal(value.trim())))
}

/// A permission definition from the catalog, e.g. `can_view:module`
/// parametrized by `module_id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permission {
    pub code: String,
    #[serde(default)]
    pub description: String,
    pub scope: String,
    /// Declared parameter names (order irrelevant)
    pub parameters: BTreeSet<String>,
}

impl Permission {
    pub fn new<I, P>(code: impl Into<String>, scope: impl Into<String>, parameters: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        Self {
            code: code.into(),
            description: String::new(),
            scope: scope.into(),
            parameters: parameters.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    User,
    Group,
}

impl SubjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubjectKind::User => "user",
            SubjectKind::Group => "group",
        }
    }
}

/// Reference to a grant holder: "user/alice" or "group/finance".
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubjectRef {
    pub kind: SubjectKind,
    pub id: String,
}

impl SubjectRef {
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::User,
            id: id.into(),
        }
    }

    pub fn group(id: impl Into<String>) -> Self {
        Self {
            kind: SubjectKind::Group,
            id: id.into(),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let (kind, id) = s.split_once('/')?;
        if id.is_empty() {
            return None;
        }
        match kind {
            "user" => Some(Self::user(id)),
            "group" => Some(Self::group(id)),
            _ => None,
        }
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind.as_str(), self.id)
    }
}

/// A permission held by a subject, optionally bound to parameter values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grant {
    pub subject: SubjectRef,
    pub permission: Permission,
    pub parameter_values: ParameterValues,
}

impl Grant {
    pub fn new(subject: SubjectRef, permission: Permission, parameter_values: ParameterValues) -> Self {
        Self {
            subject,
            permission,
            parameter_values,
        }
    }

    /// A grant without parameter values authorizes any parameters.
    pub fn is_blanket(&self) -> bool {
        self.parameter_values.is_empty()
    }

    pub fn normalize(&self) -> NormalizedGrant {
        NormalizedGrant {
            permission: self.permission.clone(),
            parameter_values: self.parameter_values.clone(),
        }
    }

    pub fn into_normalized(self) -> NormalizedGrant {
        NormalizedGrant {
            permission: self.permission,
            parameter_values: self.parameter_values,
        }
    }
}

/// A grant with the holder erased, so user and group grants compare alike.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedGrant {
    pub permission: Permission,
    pub parameter_values: ParameterValues,
}

impl NormalizedGrant {
    pub fn new(permission: Permission, parameter_values: ParameterValues) -> Self {
        Self {
            permission,
            parameter_values,
        }
    }

    pub fn code(&self) -> &str {
        &self.permission.code
    }

    pub fn is_blanket(&self) -> bool {
        self.parameter_values.is_empty()
    }
}

/// A point check: may the subject perform `action_code` with these values?
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AuthorizationRequest {
    pub action_code: String,
    pub parameter_values: ParameterValues,
}

impl AuthorizationRequest {
    pub fn new(action_code: impl Into<String>, parameter_values: ParameterValues) -> Self {
        Self {
            action_code: action_code.into(),
            parameter_values,
        }
    }
}

/// Tells the predicate compiler how grant parameters of `action_code` map
/// onto fields of the filtered collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSpec {
    pub action_code: String,
    /// parameter name -> field name
    pub lookup: BTreeMap<String, String>,
}

impl ActionSpec {
    pub fn new(action_code: impl Into<String>) -> Self {
        Self {
            action_code: action_code.into(),
            lookup: BTreeMap::new(),
        }
    }

    pub fn with_lookup(mut self, parameter: impl Into<String>, field: impl Into<String>) -> Self {
        self.lookup.insert(parameter.into(), field.into());
        self
    }

    /// Field name for a parameter; unmapped parameters pass through unchanged.
    pub fn field_for<'a>(&'a self, parameter: &'a str) -> &'a str {
        self.lookup
            .get(parameter)
            .map(String::as_str)
            .unwrap_or(parameter)
    }
}
