use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::error::EngineResult;
use crate::model::Model;
use crate::object::{LineageId, ObjectRef};
use crate::value::Value;
use crate::variable::{CountVar, Variable};

use super::private::Backing;
use super::WorldView;

/// A partial assignment of values to the variables of a model.
///
/// Basic variables are set directly; derived variables are filled in lazily
/// by the evaluator and cached. Every world starts its own lineage.
#[derive(Clone)]
pub struct PartialWorld {
    model: Arc<Model>,
    lineage: LineageId,
    basic: BTreeMap<Variable, Value>,
    derived: BTreeMap<Variable, Value>,
    observed: BTreeSet<Variable>,
    satisfiers: BTreeMap<CountVar, Arc<[ObjectRef]>>,
    evaluating: Vec<Variable>,
}

impl PartialWorld {
    /// Creates an empty world of a fresh lineage.
    #[must_use]
    pub fn new(model: Arc<Model>) -> Self {
        Self {
            model,
            lineage: LineageId::new(),
            basic: BTreeMap::new(),
            derived: BTreeMap::new(),
            observed: BTreeSet::new(),
            satisfiers: BTreeMap::new(),
            evaluating: Vec::new(),
        }
    }

    /// Sets `var` as observed evidence.
    ///
    /// # Errors
    ///
    /// Same as [`WorldView::set_value`].
    pub fn observe(&mut self, var: Variable, value: Value) -> EngineResult<()> {
        self.set_value(var.clone(), value)?;
        self.observed.insert(var);
        Ok(())
    }

    /// Observed evidence variables, in order.
    pub fn observed_variables(&self) -> impl Iterator<Item = &Variable> {
        self.observed.iter()
    }

    /// Snapshot of the derived (lazily computed) variables.
    #[must_use]
    pub fn derived_variables(&self) -> Vec<Variable> {
        self.derived.keys().cloned().collect()
    }

    /// Number of instantiated variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.basic.len() + self.derived.len()
    }

    /// Returns true if nothing is instantiated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.basic.is_empty() && self.derived.is_empty()
    }

    /// Stable digest of the world contents (blake3, hex).
    ///
    /// Generated objects hash by origin and index, so two worlds of
    /// different lineages with the same structure share a fingerprint.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for (tag, map) in [(b"B", &self.basic), (b"D", &self.derived)] {
            for (var, value) in map {
                hasher.update(tag);
                hasher.update(var.to_string().as_bytes());
                hasher.update(b"=");
                hasher.update(value.to_string().as_bytes());
                hasher.update(b"\n");
            }
        }
        for var in &self.observed {
            hasher.update(b"O");
            hasher.update(var.to_string().as_bytes());
            hasher.update(b"\n");
        }
        hasher.finalize().to_hex().to_string()
    }
}

impl Backing for PartialWorld {
    fn store_basic(&mut self, var: Variable, value: Value) {
        self.derived.remove(&var);
        self.basic.insert(var, value);
    }

    fn store_derived(&mut self, var: Variable, value: Value) {
        self.basic.remove(&var);
        self.derived.insert(var, value);
    }

    fn cached_satisfiers(&self, var: &CountVar) -> Option<Arc<[ObjectRef]>> {
        self.satisfiers.get(var).cloned()
    }

    fn store_satisfiers(&mut self, var: CountVar, objects: Arc<[ObjectRef]>) {
        self.satisfiers.insert(var, objects);
    }

    fn evaluation_stack(&mut self) -> &mut Vec<Variable> {
        &mut self.evaluating
    }
}

impl WorldView for PartialWorld {
    fn model(&self) -> &Arc<Model> {
        &self.model
    }

    fn lineage(&self) -> LineageId {
        self.lineage
    }

    fn value(&self, var: &Variable) -> Option<&Value> {
        self.basic.get(var).or_else(|| self.derived.get(var))
    }

    fn is_basic(&self, var: &Variable) -> bool {
        self.basic.contains_key(var)
    }

    fn is_observed(&self, var: &Variable) -> bool {
        self.observed.contains(var)
    }

    fn basic_variables(&self) -> Vec<Variable> {
        self.basic.keys().cloned().collect()
    }

    fn instantiated_variables(&self) -> Vec<Variable> {
        let mut vars: Vec<Variable> = self.basic.keys().chain(self.derived.keys()).cloned().collect();
        vars.sort();
        vars
    }
}

impl fmt::Debug for PartialWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartialWorld")
            .field("lineage", &self.lineage)
            .field("basic", &self.basic.len())
            .field("derived", &self.derived.len())
            .field("observed", &self.observed.len())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for PartialWorld {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (var, value) in &self.basic {
            let mark = if self.observed.contains(var) { " (observed)" } else { "" };
            writeln!(f, "{var} = {value}{mark}")?;
        }
        for (var, value) in &self.derived {
            writeln!(f, "{var} = {value} (derived)")?;
        }
        Ok(())
    }
}
