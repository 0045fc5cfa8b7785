//! Dependency evaluator.
//!
//! Instantiates variables on demand by running their dependency model
//! against the world and sampling the resulting distribution. Recursion
//! goes through the world's evaluation stack, which doubles as the cycle
//! detector.

use std::collections::BTreeSet;
use std::sync::Arc;

use rand::RngCore;
use tracing::trace;

use super::private::Backing;
use super::WorldView;
use crate::distrib::DistribSpec;
use crate::error::{EngineError, EngineResult, EvalError};
use crate::object::{GeneratedObject, ObjectRef, Origin};
use crate::value::Value;
use crate::variable::{CountVar, Variable};

pub(super) fn get_value<W: WorldView + ?Sized>(
    world: &mut W,
    var: &Variable,
    rng: &mut dyn RngCore,
) -> EngineResult<Value> {
    if let Some(value) = world.value(var) {
        return Ok(value.clone());
    }
    evaluate(world, var, rng)
}

pub(super) fn get_satisfiers<W: WorldView + ?Sized>(
    world: &mut W,
    var: &CountVar,
    rng: &mut dyn RngCore,
) -> EngineResult<Arc<[ObjectRef]>> {
    if let Some(objects) = world.cached_satisfiers(var) {
        return Ok(objects);
    }
    let count = Variable::Count(var.clone());
    let value = get_value(world, &count, rng)?;
    materialize(world, var, &value)
}

fn evaluate<W: WorldView + ?Sized>(world: &mut W, var: &Variable, rng: &mut dyn RngCore) -> EngineResult<Value> {
    let model = Arc::clone(world.model());
    model.check_variable(var)?;
    check_lineage(world, var, var.args())?;

    let dependency = model
        .dependency_of(var)
        .ok_or_else(|| EvalError::Uninstantiable { var: var.to_string() })?;

    let stack = world.evaluation_stack();
    if let Some(start) = stack.iter().position(|v| v == var) {
        let mut path: Vec<String> = stack[start..].iter().map(ToString::to_string).collect();
        path.push(var.to_string());
        return Err(EvalError::CyclicDependency {
            var: var.to_string(),
            path: path.join(" -> "),
        }
        .into());
    }
    stack.push(var.clone());

    let spec = {
        let mut reader = InstantiatingReader {
            world: &mut *world,
            rng: &mut *rng,
        };
        dependency.distribution(var.args(), &mut reader)
    };
    let sampled = spec.and_then(|spec| model.registry().sample(&spec, rng).map_err(EngineError::from));
    world.evaluation_stack().pop();
    let value = sampled?;

    check_conformance(world, var, &value)?;
    if let Variable::Count(count) = var {
        materialize(world, count, &value)?;
    }
    trace!(var = %var, value = %value, "instantiated");
    world.store_derived(var.clone(), value.clone());
    Ok(value)
}

/// Validates an assignment of `value` to `var`.
pub(super) fn check_assignment<W: WorldView + ?Sized>(world: &W, var: &Variable, value: &Value) -> EngineResult<()> {
    world.model().check_variable(var)?;
    check_lineage(world, var, var.args())?;
    check_conformance(world, var, value)
}

fn check_conformance<W: WorldView + ?Sized>(world: &W, var: &Variable, value: &Value) -> EngineResult<()> {
    let expected = world
        .model()
        .value_type_of(var)
        .ok_or_else(|| EvalError::UnknownVariable { var: var.to_string() })?;
    if !value.conforms_to(expected) {
        return Err(EvalError::TypeMismatch {
            var: var.to_string(),
            expected: expected.to_string(),
            actual: value.describe_type(),
        }
        .into());
    }
    check_lineage(world, var, std::slice::from_ref(value))
}

fn check_lineage<W: WorldView + ?Sized>(world: &W, var: &Variable, values: &[Value]) -> EngineResult<()> {
    let lineage = world.lineage();
    for value in values {
        if let Value::Object(ObjectRef::Generated(obj)) = value {
            if obj.lineage() != lineage {
                trace!(var = %var, object = %obj, "foreign object");
                return Err(EvalError::ForeignObject { object: obj.to_string() }.into());
            }
        }
    }
    Ok(())
}

/// Materializes exactly `count` generated objects for `var`, reusing the
/// objects (and shared origin) already materialized for it.
pub(super) fn materialize<W: WorldView + ?Sized>(
    world: &mut W,
    var: &CountVar,
    count: &Value,
) -> EngineResult<Arc<[ObjectRef]>> {
    let n = count
        .as_int()
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| EvalError::TypeMismatch {
            var: var.to_string(),
            expected: "NaturalNum".to_string(),
            actual: count.to_string(),
        })?;
    let existing = world.cached_satisfiers(var).unwrap_or_else(|| Arc::from(Vec::new()));
    if existing.len() == n {
        return Ok(existing);
    }
    let origin = existing
        .first()
        .and_then(ObjectRef::as_generated)
        .map_or_else(
            || Arc::new(Origin::new(var.pop(), var.ty().clone(), var.args().to_vec())),
            |obj| Arc::clone(obj.origin_arc()),
        );
    let lineage = world.lineage();
    let objects: Arc<[ObjectRef]> = (0..n)
        .map(|i| {
            existing.get(i).cloned().unwrap_or_else(|| {
                ObjectRef::Generated(GeneratedObject::new(Arc::clone(&origin), i, lineage))
            })
        })
        .collect();
    world.store_satisfiers(var.clone(), Arc::clone(&objects));
    Ok(objects)
}

/// Reads parents through `get_value`, instantiating them as needed.
struct InstantiatingReader<'a, W: ?Sized> {
    world: &'a mut W,
    rng: &'a mut dyn RngCore,
}

impl<W: WorldView + ?Sized> crate::model::ParentReader for InstantiatingReader<'_, W> {
    fn read(&mut self, var: &Variable) -> EngineResult<Value> {
        get_value(self.world, var, self.rng)
    }

    fn satisfiers(&mut self, var: &CountVar) -> EngineResult<Arc<[ObjectRef]>> {
        get_satisfiers(self.world, var, self.rng)
    }
}

/// Reads parents from the world, except that `target` reads as `candidate`.
struct SubstitutingReader<'a, W: ?Sized> {
    inner: InstantiatingReader<'a, W>,
    target: &'a Variable,
    candidate: &'a Value,
}

impl<W: WorldView + ?Sized> crate::model::ParentReader for SubstitutingReader<'_, W> {
    fn read(&mut self, var: &Variable) -> EngineResult<Value> {
        if var == self.target {
            return Ok(self.candidate.clone());
        }
        self.inner.read(var)
    }

    fn satisfiers(&mut self, var: &CountVar) -> EngineResult<Arc<[ObjectRef]>> {
        self.inner.satisfiers(var)
    }
}

/// Records which parents a dependency model reads.
struct RecordingReader<'a, W: ?Sized> {
    inner: InstantiatingReader<'a, W>,
    reads: BTreeSet<Variable>,
}

impl<W: WorldView + ?Sized> crate::model::ParentReader for RecordingReader<'_, W> {
    fn read(&mut self, var: &Variable) -> EngineResult<Value> {
        self.reads.insert(var.clone());
        self.inner.read(var)
    }

    fn satisfiers(&mut self, var: &CountVar) -> EngineResult<Arc<[ObjectRef]>> {
        self.reads.insert(Variable::Count(var.clone()));
        self.inner.satisfiers(var)
    }
}

/// Distribution of `var` under its current parents; `None` when the model
/// has no dependency for it.
///
/// # Errors
///
/// Evaluation errors raised while reading parents.
pub fn distribution_of<W: WorldView + ?Sized>(
    world: &mut W,
    var: &Variable,
    rng: &mut dyn RngCore,
) -> EngineResult<Option<DistribSpec>> {
    distribution_with(world, var, None, rng)
}

fn distribution_with<W: WorldView + ?Sized>(
    world: &mut W,
    var: &Variable,
    substitution: Option<(&Variable, &Value)>,
    rng: &mut dyn RngCore,
) -> EngineResult<Option<DistribSpec>> {
    let model = Arc::clone(world.model());
    let Some(dependency) = model.dependency_of(var) else {
        return Ok(None);
    };
    let inner = InstantiatingReader { world, rng };
    let spec = match substitution {
        Some((target, candidate)) => {
            let mut reader = SubstitutingReader {
                inner,
                target,
                candidate,
            };
            dependency.distribution(var.args(), &mut reader)?
        }
        None => {
            let mut reader = inner;
            dependency.distribution(var.args(), &mut reader)?
        }
    };
    Ok(Some(spec))
}

/// Log density of the current value of `var` given its parents.
///
/// Instantiates `var` first if needed. Variables without a dependency model
/// (pure evidence) contribute 0.
///
/// # Errors
///
/// Evaluation or distribution errors.
pub fn log_density_of<W: WorldView + ?Sized>(world: &mut W, var: &Variable, rng: &mut dyn RngCore) -> EngineResult<f64> {
    let value = get_value(world, var, rng)?;
    log_prior_at(world, var, &value, rng)
}

/// Log density `var` would have if it held `value`, given its current parents.
///
/// # Errors
///
/// Evaluation or distribution errors.
pub fn log_prior_at<W: WorldView + ?Sized>(
    world: &mut W,
    var: &Variable,
    value: &Value,
    rng: &mut dyn RngCore,
) -> EngineResult<f64> {
    match distribution_of(world, var, rng)? {
        Some(spec) => Ok(world.model().registry().log_density(&spec, value)?),
        None => Ok(0.0),
    }
}

/// Log density of the current value of `var` with parent `target` read as
/// `candidate`. The world is not modified apart from lazily instantiated
/// parents.
///
/// # Errors
///
/// Evaluation or distribution errors.
pub fn log_density_given<W: WorldView + ?Sized>(
    world: &mut W,
    var: &Variable,
    target: &Variable,
    candidate: &Value,
    rng: &mut dyn RngCore,
) -> EngineResult<f64> {
    let value = get_value(world, var, rng)?;
    match distribution_with(world, var, Some((target, candidate)), rng)? {
        Some(spec) => Ok(world.model().registry().log_density(&spec, &value)?),
        None => Ok(0.0),
    }
}

/// Instantiated variables whose dependency model reads `var` under the
/// current world.
///
/// # Errors
///
/// Evaluation errors raised while replaying dependency models.
pub fn children_of<W: WorldView + ?Sized>(
    world: &mut W,
    var: &Variable,
    rng: &mut dyn RngCore,
) -> EngineResult<Vec<Variable>> {
    let model = Arc::clone(world.model());
    let mut children = Vec::new();
    for candidate in world.instantiated_variables() {
        if &candidate == var {
            continue;
        }
        let Some(dependency) = model.dependency_of(&candidate) else {
            continue;
        };
        let mut reader = RecordingReader {
            inner: InstantiatingReader {
                world: &mut *world,
                rng: &mut *rng,
            },
            reads: BTreeSet::new(),
        };
        dependency.distribution(candidate.args(), &mut reader)?;
        if reader.reads.contains(var) {
            children.push(candidate);
        }
    }
    Ok(children)
}

/// Sum of log densities of every instantiated variable that has a
/// distribution. Parents instantiated along the way are scored too.
///
/// # Errors
///
/// Evaluation or distribution errors.
pub fn log_joint<W: WorldView + ?Sized>(world: &mut W, rng: &mut dyn RngCore) -> EngineResult<f64> {
    let model = Arc::clone(world.model());
    let mut scored = BTreeSet::new();
    let mut total = 0.0;
    loop {
        let pending: Vec<Variable> = world
            .instantiated_variables()
            .into_iter()
            .filter(|v| !scored.contains(v) && model.has_distribution(v))
            .collect();
        if pending.is_empty() {
            return Ok(total);
        }
        for var in pending {
            total += log_density_of(world, &var, rng)?;
            scored.insert(var);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Dependency, ModelBuilder};
    use crate::value::ValueType;
    use crate::world::PartialWorld;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn cycle_is_reported_with_path() {
        let mut b = ModelBuilder::new();
        let a = b.add_random_function("A", vec![], ValueType::Real, None).unwrap();
        let c = b.add_random_function("B", vec![], ValueType::Real, None).unwrap();
        let (ra, rc) = (a.clone(), c.clone());
        b.set_dependency(
            &a,
            Dependency::from_fn(move |_, p| Ok(DistribSpec::new("Gaussian", [p.read_real(&rc.var([]))?, 1.0]))),
        )
        .unwrap();
        b.set_dependency(
            &c,
            Dependency::from_fn(move |_, p| Ok(DistribSpec::new("Gaussian", [p.read_real(&ra.var([]))?, 1.0]))),
        )
        .unwrap();
        let mut world = PartialWorld::new(b.build());
        let mut rng = StdRng::seed_from_u64(0);

        let err = world.get_value(&a.var([]), &mut rng).unwrap_err();
        assert!(err.is_cyclic_dependency());
        assert!(format!("{err}").contains("A() -> B() -> A()"));
        // The stack unwinds and nothing half-evaluated is cached.
        assert!(!world.is_instantiated(&a.var([])));
        assert!(!world.is_instantiated(&c.var([])));
        assert!(world.evaluation_stack().is_empty());
    }

    #[test]
    fn uninstantiable_without_dependency() {
        let mut b = ModelBuilder::new();
        let a = b.add_random_function("A", vec![], ValueType::Bool, None).unwrap();
        let mut world = PartialWorld::new(b.build());
        let err = world.get_value(&a.var([]), &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, EngineError::Evaluation(EvalError::Uninstantiable { .. })));
    }

    #[test]
    fn sampled_value_is_type_checked() {
        let mut b = ModelBuilder::new();
        let a = b
            .add_random_function(
                "A",
                vec![],
                ValueType::Bool,
                Some(Dependency::prior(DistribSpec::new("Gaussian", [0.0, 1.0]))),
            )
            .unwrap();
        let mut world = PartialWorld::new(b.build());
        let err = world.get_value(&a.var([]), &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert!(err.is_type_mismatch());
        assert!(!world.is_instantiated(&a.var([])));
    }

    #[test]
    fn children_and_joint() {
        let mut b = ModelBuilder::new();
        let p = b
            .add_random_function(
                "P",
                vec![],
                ValueType::Real,
                Some(Dependency::prior(DistribSpec::new("Beta", [2.0, 2.0]))),
            )
            .unwrap();
        let pr = p.clone();
        let x = b
            .add_random_function(
                "X",
                vec![],
                ValueType::Bool,
                Some(Dependency::from_fn(move |_, parents| {
                    Ok(DistribSpec::new("Bernoulli", [parents.read_real(&pr.var([]))?]))
                })),
            )
            .unwrap();
        let mut world = PartialWorld::new(b.build());
        let mut rng = StdRng::seed_from_u64(1);
        world.set_value(p.var([]), Value::Real(0.5)).unwrap();
        world.set_value(x.var([]), Value::Bool(true)).unwrap();

        assert_eq!(children_of(&mut world, &p.var([]), &mut rng).unwrap(), vec![x.var([])]);
        assert!(children_of(&mut world, &x.var([]), &mut rng).unwrap().is_empty());

        // Beta(2,2) at 0.5 is 1.5; Bernoulli(0.5) of true is 0.5.
        let joint = log_joint(&mut world, &mut rng).unwrap();
        assert!((joint - (1.5f64 * 0.5).ln()).abs() < 1e-9);

        let given = log_density_given(&mut world, &x.var([]), &p.var([]), &Value::Real(0.9), &mut rng).unwrap();
        assert!((given - 0.9f64.ln()).abs() < 1e-12);
        assert_eq!(world.value(&p.var([])), Some(&Value::Real(0.5)));
    }
}
