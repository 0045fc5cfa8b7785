//! Observed evidence and queries.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{EngineResult, ModelError};
use crate::value::Value;
use crate::variable::Variable;

/// Observed (variable, value) pairs, in deterministic order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evidence {
    observations: BTreeMap<Variable, Value>,
}

impl Evidence {
    /// Empty evidence.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an observation. Repeating an identical observation is a no-op.
    ///
    /// # Errors
    ///
    /// `ConflictingEvidence` if `var` was already observed with another value.
    pub fn observe(&mut self, var: Variable, value: Value) -> EngineResult<()> {
        if let Some(existing) = self.observations.get(&var) {
            if *existing != value {
                return Err(ModelError::ConflictingEvidence {
                    var: var.to_string(),
                    existing: existing.to_string(),
                    observed: value.to_string(),
                }
                .into());
            }
            return Ok(());
        }
        self.observations.insert(var, value);
        Ok(())
    }

    /// Observed value of `var`.
    #[must_use]
    pub fn get(&self, var: &Variable) -> Option<&Value> {
        self.observations.get(var)
    }

    /// Observations in variable order.
    pub fn iter(&self) -> impl Iterator<Item = (&Variable, &Value)> {
        self.observations.iter()
    }

    /// Number of observed variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Returns true if nothing is observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}

impl<'a> IntoIterator for &'a Evidence {
    type Item = (&'a Variable, &'a Value);
    type IntoIter = std::collections::btree_map::Iter<'a, Variable, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.observations.iter()
    }
}

/// A variable whose posterior is being estimated.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Query {
    var: Variable,
}

impl Query {
    /// Query on `var`.
    #[must_use]
    pub const fn new(var: Variable) -> Self {
        Self { var }
    }

    /// The queried variable.
    #[must_use]
    pub const fn variable(&self) -> &Variable {
        &self.var
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "query {}", self.var)
    }
}

impl From<Variable> for Query {
    fn from(var: Variable) -> Self {
        Self::new(var)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EngineError;
    use crate::variable::FuncRef;

    #[test]
    fn conflicting_observations_rejected() {
        let v = FuncRef::new(0, "Holds").var([Value::Int(1)]);
        let mut ev = Evidence::new();
        ev.observe(v.clone(), Value::Bool(true)).unwrap();
        ev.observe(v.clone(), Value::Bool(true)).unwrap();
        assert_eq!(ev.len(), 1);
        let err = ev.observe(v, Value::Bool(false)).unwrap_err();
        assert!(matches!(err, EngineError::Configuration(ModelError::ConflictingEvidence { .. })));
    }

    #[test]
    fn iteration_is_ordered() {
        let f = FuncRef::new(0, "F");
        let mut ev = Evidence::new();
        ev.observe(f.var([Value::Int(2)]), Value::Int(0)).unwrap();
        ev.observe(f.var([Value::Int(1)]), Value::Int(0)).unwrap();
        let args: Vec<i64> = ev.iter().filter_map(|(v, _)| v.args()[0].as_int()).collect();
        assert_eq!(args, vec![1, 2]);
    }
}
