use std::sync::Arc;

use openworld::{
    CountVar, Dependency, DistribSpec, EngineError, EvalError, FuncRef, Model, ModelBuilder, PartialWorld, PopId,
    TypeName, Value, ValueType, Variable, WorldDiff, WorldView,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

struct Fixture {
    model: Arc<Model>,
    x: FuncRef,
    y: FuncRef,
    pick: FuncRef,
    fact: TypeName,
    pop: PopId,
    relation: Value,
}

/// `X ~ UniformInt(0, 9)`, `Y = X`, `#Fact(Relation) ~ Poisson(3)` and an
/// unconstrained `Pick(): Fact`.
fn fixture() -> Fixture {
    let mut b = ModelBuilder::new();
    let relation_ty = b.add_type("Relation").unwrap();
    let fact = b.add_type("Fact").unwrap();
    let relation = Value::from(b.add_guaranteed_objects(&relation_ty, ["born_in"]).unwrap().remove(0));
    let pop = b
        .add_origin_pattern(
            &fact,
            &[relation_ty],
            Some(Dependency::prior(DistribSpec::new("Poisson", [3.0]))),
        )
        .unwrap();
    let x = b
        .add_random_function(
            "X",
            vec![],
            ValueType::Int,
            Some(Dependency::prior(DistribSpec::new("UniformInt", [0i64, 9]))),
        )
        .unwrap();
    let parent = x.var([]);
    let y = b
        .add_random_function(
            "Y",
            vec![],
            ValueType::Int,
            Some(Dependency::from_fn(move |_args, parents| {
                Ok(DistribSpec::new("Constant", [parents.read(&parent)?]))
            })),
        )
        .unwrap();
    let pick = b
        .add_random_function("Pick", vec![], ValueType::from(&fact), None)
        .unwrap();
    Fixture {
        model: b.build(),
        x,
        y,
        pick,
        fact,
        pop,
        relation,
    }
}

fn count(f: &Fixture) -> Variable {
    Variable::Count(CountVar::new(f.pop, f.fact.clone(), [f.relation.clone()]))
}

#[test]
fn get_value_is_idempotent_and_lazy() {
    let f = fixture();
    let mut world = PartialWorld::new(Arc::clone(&f.model));
    let mut rng = StdRng::seed_from_u64(1);
    assert!(world.is_empty());

    let y = world.get_value(&f.y.var([]), &mut rng).unwrap();
    assert_eq!(world.value(&f.x.var([])), Some(&y));
    for _ in 0..10 {
        assert_eq!(world.get_value(&f.y.var([]), &mut rng).unwrap(), y);
    }
    assert_eq!(world.len(), 2);
    assert!(!world.is_basic(&f.y.var([])));
}

#[test]
fn diff_writes_stay_isolated_until_saved() {
    let f = fixture();
    let mut world = PartialWorld::new(Arc::clone(&f.model));
    world.set_value(f.x.var([]), Value::Int(1)).unwrap();
    let mut diff = WorldDiff::from(world);

    diff.set_value(f.x.var([]), Value::Int(2)).unwrap();
    assert_eq!(diff.value(&f.x.var([])), Some(&Value::Int(2)));
    assert_eq!(diff.world().value(&f.x.var([])), Some(&Value::Int(1)));

    diff.revert();
    assert_eq!(diff.value(&f.x.var([])), Some(&Value::Int(1)));

    diff.set_value(f.x.var([]), Value::Int(3)).unwrap();
    diff.save();
    assert!(diff.is_clean());
    assert_eq!(diff.world().value(&f.x.var([])), Some(&Value::Int(3)));
}

#[test]
fn setting_a_parent_leaves_derived_children_stale() {
    let f = fixture();
    let mut world = PartialWorld::new(Arc::clone(&f.model));
    let mut rng = StdRng::seed_from_u64(2);
    world.set_value(f.x.var([]), Value::Int(4)).unwrap();
    assert_eq!(world.get_value(&f.y.var([]), &mut rng).unwrap(), Value::Int(4));

    world.set_value(f.x.var([]), Value::Int(7)).unwrap();
    assert_eq!(world.value(&f.y.var([])), Some(&Value::Int(4)));
}

#[test]
fn count_variables_materialize_exactly_n_objects() {
    let f = fixture();
    let mut world = PartialWorld::new(Arc::clone(&f.model));
    let mut rng = StdRng::seed_from_u64(3);
    let Variable::Count(cv) = count(&f) else { unreachable!() };

    world.set_value(count(&f), Value::Int(4)).unwrap();
    let four = world.get_satisfiers(&cv, &mut rng).unwrap();
    assert_eq!(four.len(), 4);
    assert_eq!(world.get_satisfiers(&cv, &mut rng).unwrap(), four);

    world.set_value(count(&f), Value::Int(2)).unwrap();
    let two = world.get_satisfiers(&cv, &mut rng).unwrap();
    assert_eq!(&two[..], &four[..2]);

    world.set_value(count(&f), Value::Int(0)).unwrap();
    assert!(world.get_satisfiers(&cv, &mut rng).unwrap().is_empty());
}

#[test]
fn unset_count_is_sampled_then_materialized_once() {
    let f = fixture();
    let Variable::Count(cv) = count(&f) else { unreachable!() };
    let mut generated = 0;
    for seed in 0..8 {
        let mut world = PartialWorld::new(Arc::clone(&f.model));
        let mut rng = StdRng::seed_from_u64(seed);
        assert!(!world.is_instantiated(&count(&f)));

        let objects = world.get_satisfiers(&cv, &mut rng).unwrap();
        let n = world.value(&count(&f)).and_then(Value::as_int).unwrap();
        assert_eq!(objects.len(), usize::try_from(n).unwrap());
        assert!(!world.is_basic(&count(&f)));
        for (i, object) in objects.iter().enumerate() {
            let g = object.as_generated().unwrap();
            assert_eq!(g.index(), i);
            assert_eq!(g.origin().pop(), f.pop);
            assert_eq!(g.origin().args(), std::slice::from_ref(&f.relation));
            assert_eq!(g.lineage(), world.lineage());
        }
        assert_eq!(world.get_satisfiers(&cv, &mut rng).unwrap(), objects);
        generated += objects.len();
    }
    assert!(generated > 0);
}

#[test]
fn type_errors_are_never_coerced() {
    let f = fixture();
    let mut world = PartialWorld::new(Arc::clone(&f.model));
    let err = world.set_value(f.x.var([]), Value::Real(1.5)).unwrap_err();
    assert!(err.is_type_mismatch());
    let err = world.set_value(count(&f), Value::Int(-1)).unwrap_err();
    assert!(err.is_type_mismatch());
    assert!(world.is_empty());
}

#[test]
fn generated_objects_do_not_cross_lineages() {
    let f = fixture();
    let mut rng = StdRng::seed_from_u64(4);
    let Variable::Count(cv) = count(&f) else { unreachable!() };

    let mut first = PartialWorld::new(Arc::clone(&f.model));
    first.set_value(count(&f), Value::Int(1)).unwrap();
    let foreign = first.get_satisfiers(&cv, &mut rng).unwrap()[0].clone();

    let mut second = PartialWorld::new(Arc::clone(&f.model));
    second.set_value(count(&f), Value::Int(1)).unwrap();
    let local = second.get_satisfiers(&cv, &mut rng).unwrap()[0].clone();
    assert_ne!(foreign.lineage(), local.lineage());
    assert_eq!(foreign.to_string(), local.to_string());

    second.set_value(f.pick.var([]), Value::from(local.clone())).unwrap();
    let err = second.set_value(f.pick.var([]), Value::from(foreign)).unwrap_err();
    assert!(matches!(err, EngineError::Evaluation(EvalError::ForeignObject { .. })));

    // A diff shares its world's lineage.
    let diff = WorldDiff::from(second);
    assert_eq!(Some(diff.lineage()), local.lineage());
}
