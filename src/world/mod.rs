//! Partial worlds and transactional diffs.
//!
//! Key invariants:
//! - A variable's identity never changes once created.
//! - A diff's visible value is its override if present, else the
//!   underlying world's value.
//! - Writes through a diff never reach the underlying world until `save()`.
//! - A derived value is computed at most once per world instance.
//! - Setting a variable does not invalidate derived values that read it.

mod diff;
mod eval;
mod partial;

pub use diff::WorldDiff;
pub use eval::{children_of, distribution_of, log_density_given, log_density_of, log_joint, log_prior_at};
pub use partial::PartialWorld;

use std::sync::Arc;

use rand::RngCore;

use crate::error::EngineResult;
use crate::model::Model;
use crate::object::{LineageId, ObjectRef};
use crate::value::Value;
use crate::variable::{CountVar, Variable};

/// Storage slot of an instantiated variable.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Slot {
    /// Set directly (evidence, initialization, proposals).
    Basic(Value),
    /// Computed lazily from the dependency model.
    Derived(Value),
}

impl Slot {
    pub(crate) const fn value(&self) -> &Value {
        match self {
            Self::Basic(v) | Self::Derived(v) => v,
        }
    }

    pub(crate) const fn is_basic(&self) -> bool {
        matches!(self, Self::Basic(_))
    }
}

mod private {
    use super::{Arc, CountVar, ObjectRef, Value, Variable};

    /// Raw storage used by the evaluator. Not part of the public contract.
    pub trait Backing {
        fn store_basic(&mut self, var: Variable, value: Value);
        fn store_derived(&mut self, var: Variable, value: Value);
        fn cached_satisfiers(&self, var: &CountVar) -> Option<Arc<[ObjectRef]>>;
        fn store_satisfiers(&mut self, var: CountVar, objects: Arc<[ObjectRef]>);
        fn evaluation_stack(&mut self) -> &mut Vec<Variable>;
    }
}

/// Read/write contract shared by [`PartialWorld`] and [`WorldDiff`].
///
/// Proposers are written against this trait so the same code runs on a
/// committed world or on a hypothetical diff.
pub trait WorldView: private::Backing {
    /// Model the world instantiates.
    fn model(&self) -> &Arc<Model>;

    /// Lineage of the world chain.
    fn lineage(&self) -> LineageId;

    /// Current value, without instantiating anything.
    fn value(&self, var: &Variable) -> Option<&Value>;

    /// Returns true if `var` was set directly rather than derived.
    fn is_basic(&self, var: &Variable) -> bool;

    /// Returns true if `var` is observed evidence.
    fn is_observed(&self, var: &Variable) -> bool;

    /// Snapshot of the basic variables, in deterministic order.
    fn basic_variables(&self) -> Vec<Variable>;

    /// Snapshot of every instantiated variable, in deterministic order.
    fn instantiated_variables(&self) -> Vec<Variable>;

    /// Returns true if `var` holds a value, basic or derived.
    fn is_instantiated(&self, var: &Variable) -> bool {
        self.value(var).is_some()
    }

    /// Returns the value of `var`, instantiating it (and, recursively, its
    /// parents) from the dependency model if needed.
    ///
    /// # Errors
    ///
    /// `CyclicDependency`, `Uninstantiable`, `TypeMismatch`, `ForeignObject`,
    /// or a distribution error.
    fn get_value(&mut self, var: &Variable, rng: &mut dyn RngCore) -> EngineResult<Value> {
        eval::get_value(self, var, rng)
    }

    /// Objects generated for `var`, instantiating the count first if needed.
    /// Idempotent.
    ///
    /// # Errors
    ///
    /// Same as [`WorldView::get_value`].
    fn get_satisfiers(&mut self, var: &CountVar, rng: &mut dyn RngCore) -> EngineResult<Arc<[ObjectRef]>> {
        eval::get_satisfiers(self, var, rng)
    }

    /// Sets `var` to `value` and marks it basic. Setting a count variable to
    /// N materializes exactly N generated objects. Derived values that read
    /// `var` are not invalidated.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` if the value does not conform to the declared type,
    /// `UnknownVariable` or `ForeignObject`.
    fn set_value(&mut self, var: Variable, value: Value) -> EngineResult<()> {
        eval::check_assignment(self, &var, &value)?;
        if let Variable::Count(count) = &var {
            eval::materialize(self, count, &value)?;
        }
        self.store_basic(var, value);
        Ok(())
    }
}
