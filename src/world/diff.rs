//! Copy-on-write overlay over a partial world.
//!
//! Key invariants:
//! - Writes land in the override layer and never reach the underlying world
//!   before `save()`.
//! - Reads merge the override layer over the underlying world.
//! - `save()` flattens in place when the diff holds the only handle to the
//!   underlying world, and copies it otherwise.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::mem;
use std::sync::Arc;

use tracing::trace;

use crate::model::Model;
use crate::object::{LineageId, ObjectRef};
use crate::value::Value;
use crate::variable::{CountVar, Variable};

use super::private::Backing;
use super::{PartialWorld, Slot, WorldView};

/// A hypothetical world: a read-only base plus local overrides.
pub struct WorldDiff {
    base: Arc<PartialWorld>,
    overrides: BTreeMap<Variable, Slot>,
    satisfiers: BTreeMap<CountVar, Arc<[ObjectRef]>>,
    evaluating: Vec<Variable>,
}

impl WorldDiff {
    /// Wraps `base`. The diff starts empty.
    #[must_use]
    pub fn new(base: Arc<PartialWorld>) -> Self {
        Self {
            base,
            overrides: BTreeMap::new(),
            satisfiers: BTreeMap::new(),
            evaluating: Vec::new(),
        }
    }

    /// The underlying world as of the last `save()`.
    #[must_use]
    pub fn world(&self) -> &PartialWorld {
        &self.base
    }

    /// Shared handle to the underlying world.
    #[must_use]
    pub const fn base(&self) -> &Arc<PartialWorld> {
        &self.base
    }

    /// Number of variables overridden since the last save or revert.
    #[must_use]
    pub fn overrides_len(&self) -> usize {
        self.overrides.len()
    }

    /// Returns true if the diff holds no uncommitted writes.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.overrides.is_empty() && self.satisfiers.is_empty()
    }

    /// Commits every override into the underlying world and clears the
    /// layer. The diff keeps wrapping the new baseline.
    pub fn save(&mut self) {
        if self.is_clean() {
            return;
        }
        let overrides = mem::take(&mut self.overrides);
        let satisfiers = mem::take(&mut self.satisfiers);
        trace!(overrides = overrides.len(), shared = Arc::strong_count(&self.base) > 1, "save");
        let world = Arc::make_mut(&mut self.base);
        for (var, objects) in satisfiers {
            world.store_satisfiers(var, objects);
        }
        for (var, slot) in overrides {
            match slot {
                Slot::Basic(value) => world.store_basic(var, value),
                Slot::Derived(value) => world.store_derived(var, value),
            }
        }
    }

    /// Drops every override; the underlying world is untouched.
    pub fn revert(&mut self) {
        self.overrides.clear();
        self.satisfiers.clear();
    }

    /// Discards the overrides and returns the untouched underlying world.
    #[must_use]
    pub fn discard(self) -> Arc<PartialWorld> {
        self.base
    }

    /// Saves and returns the resulting world.
    #[must_use]
    pub fn into_world(mut self) -> PartialWorld {
        self.save();
        Arc::try_unwrap(self.base).unwrap_or_else(|shared| (*shared).clone())
    }
}

impl From<PartialWorld> for WorldDiff {
    fn from(world: PartialWorld) -> Self {
        Self::new(Arc::new(world))
    }
}

impl Backing for WorldDiff {
    fn store_basic(&mut self, var: Variable, value: Value) {
        self.overrides.insert(var, Slot::Basic(value));
    }

    fn store_derived(&mut self, var: Variable, value: Value) {
        self.overrides.insert(var, Slot::Derived(value));
    }

    fn cached_satisfiers(&self, var: &CountVar) -> Option<Arc<[ObjectRef]>> {
        self.satisfiers
            .get(var)
            .cloned()
            .or_else(|| self.base.cached_satisfiers(var))
    }

    fn store_satisfiers(&mut self, var: CountVar, objects: Arc<[ObjectRef]>) {
        self.satisfiers.insert(var, objects);
    }

    fn evaluation_stack(&mut self) -> &mut Vec<Variable> {
        &mut self.evaluating
    }
}

impl WorldView for WorldDiff {
    fn model(&self) -> &Arc<Model> {
        self.base.model()
    }

    fn lineage(&self) -> LineageId {
        self.base.lineage()
    }

    fn value(&self, var: &Variable) -> Option<&Value> {
        match self.overrides.get(var) {
            Some(slot) => Some(slot.value()),
            None => self.base.value(var),
        }
    }

    fn is_basic(&self, var: &Variable) -> bool {
        match self.overrides.get(var) {
            Some(slot) => slot.is_basic(),
            None => self.base.is_basic(var),
        }
    }

    fn is_observed(&self, var: &Variable) -> bool {
        self.base.is_observed(var)
    }

    fn basic_variables(&self) -> Vec<Variable> {
        let mut vars: BTreeSet<Variable> = self
            .base
            .basic_variables()
            .into_iter()
            .filter(|v| self.overrides.get(v).map_or(true, Slot::is_basic))
            .collect();
        vars.extend(
            self.overrides
                .iter()
                .filter(|(_, slot)| slot.is_basic())
                .map(|(v, _)| v.clone()),
        );
        vars.into_iter().collect()
    }

    fn instantiated_variables(&self) -> Vec<Variable> {
        let mut vars: BTreeSet<Variable> = self.base.instantiated_variables().into_iter().collect();
        vars.extend(self.overrides.keys().cloned());
        vars.into_iter().collect()
    }
}

impl fmt::Debug for WorldDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorldDiff")
            .field("base", &self.base)
            .field("overrides", &self.overrides.len())
            .finish_non_exhaustive()
    }
}
