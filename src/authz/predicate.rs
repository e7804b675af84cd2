//! Compile a subject's grants into a filter over a queryable collection.
//!
//! The result is a plain value: render it with [`Predicate::to_condition`]
//! or [`Predicate::apply`] for a sea-orm query, or evaluate it against
//! in-memory records with [`Predicate::matches`].

use sea_orm::sea_query::{Alias, Expr};
use sea_orm::{Condition, QueryFilter, Value};

use crate::authz::types::{ActionSpec, NormalizedGrant, ParamValue, ParameterValues};

/// Field equalities that must all hold.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Clause {
    /// (field name, required value), in parameter-name order
    pub fields: Vec<(String, ParamValue)>,
}

impl Clause {
    fn from_grant(grant: &NormalizedGrant, spec: &ActionSpec) -> Self {
        let fields = grant
            .parameter_values
            .iter()
            .map(|(parameter, value)| (spec.field_for(parameter).to_string(), value.clone()))
            .collect();
        Self { fields }
    }

    pub fn to_condition(&self) -> Condition {
        self.fields
            .iter()
            .fold(Condition::all(), |all, (field, value)| {
                all.add(Expr::col(Alias::new(field.as_str())).eq(Value::from(value)))
            })
    }

    pub fn matches(&self, record: &ParameterValues) -> bool {
        self.fields
            .iter()
            .all(|(field, value)| record.get(field) == Some(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// No eligible grant: matches no record.
    Nothing,
    /// An eligible blanket grant: matches every record.
    Everything,
    /// Matches records satisfying at least one clause.
    AnyOf(Vec<Clause>),
}

impl Predicate {
    pub fn is_nothing(&self) -> bool {
        matches!(self, Predicate::Nothing)
    }

    pub fn is_everything(&self) -> bool {
        matches!(self, Predicate::Everything)
    }

    pub fn to_condition(&self) -> Condition {
        match self {
            Predicate::Nothing => Condition::all().add(Expr::val(1).eq(0)),
            Predicate::Everything => Condition::all().add(Expr::val(1).eq(1)),
            Predicate::AnyOf(clauses) => clauses
                .iter()
                .fold(Condition::any(), |any, clause| any.add(clause.to_condition())),
        }
    }

    /// Restrict `query` to permitted records, keeping its existing filters.
    pub fn apply<Q: QueryFilter>(&self, query: Q) -> Q {
        query.filter(self.to_condition())
    }

    pub fn matches(&self, record: &ParameterValues) -> bool {
        match self {
            Predicate::Nothing => false,
            Predicate::Everything => true,
            Predicate::AnyOf(clauses) => clauses.iter().any(|clause| clause.matches(record)),
        }
    }
}

/// Build the predicate for `grants` under `specs`.
///
/// Grants whose code matches no spec are ignored. One blanket grant among
/// the rest absorbs everything else.
pub fn compile(grants: &[NormalizedGrant], specs: &[ActionSpec]) -> Predicate {
    let mut clauses: Vec<Clause> = Vec::new();

    for grant in grants {
        let Some(spec) = specs.iter().find(|s| s.action_code == grant.permission.code) else {
            continue;
        };

        if grant.is_blanket() {
            return Predicate::Everything;
        }

        let clause = Clause::from_grant(grant, spec);
        if !clauses.contains(&clause) {
            clauses.push(clause);
        }
    }

    if clauses.is_empty() {
        Predicate::Nothing
    } else {
        Predicate::AnyOf(clauses)
    }
}

impl From<&ParamValue> for Value {
    fn from(value: &ParamValue) -> Self {
        match value {
            ParamValue::Bool(b) => Value::from(*b),
            ParamValue::Int(i) => Value::from(*i),
            ParamValue::Str(s) => Value::from(s.clone()),
        }
    }
}
