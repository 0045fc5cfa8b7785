//! Property tests for world and diff semantics.

use std::collections::BTreeMap;
use std::sync::Arc;

use openworld::{
    CountVar, FuncRef, Model, ModelBuilder, PartialWorld, PopId, TypeName, Value, ValueType, WorldDiff, WorldView,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;

const SLOTS: usize = 6;

fn slot_model() -> (Arc<Model>, FuncRef, Vec<Value>) {
    let mut b = ModelBuilder::new();
    let slot = b.add_type("Slot").unwrap();
    let slots = b
        .add_guaranteed_array(&slot, "slot", SLOTS)
        .unwrap()
        .into_iter()
        .map(Value::from)
        .collect();
    let v = b
        .add_random_function("V", vec![ValueType::from(&slot)], ValueType::Int, None)
        .unwrap();
    (b.build(), v, slots)
}

fn count_model() -> (Arc<Model>, PopId, TypeName) {
    let mut b = ModelBuilder::new();
    let item = b.add_type("Item").unwrap();
    let pop = b.add_origin_pattern(&item, &[], None).unwrap();
    (b.build(), pop, item)
}

/// Strategy for a sequence of (slot, value) writes.
fn writes() -> impl Strategy<Value = Vec<(usize, i64)>> {
    prop::collection::vec((0..SLOTS, -50i64..50), 0..24)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// The diff shows the last write per slot, else the base value; the base
    /// is untouched until save.
    #[test]
    fn diff_overlays_base(base in writes(), overlay in writes()) {
        let (model, v, slots) = slot_model();
        let mut world = PartialWorld::new(model);
        let mut expected_base = BTreeMap::new();
        for (i, x) in &base {
            world.set_value(v.var([slots[*i].clone()]), Value::Int(*x)).unwrap();
            expected_base.insert(*i, *x);
        }
        let base_print = world.fingerprint();
        let mut diff = WorldDiff::new(Arc::new(world));
        let mut expected = expected_base.clone();
        for (i, x) in &overlay {
            diff.set_value(v.var([slots[*i].clone()]), Value::Int(*x)).unwrap();
            expected.insert(*i, *x);
        }

        for (i, slot) in slots.iter().enumerate() {
            let var = v.var([slot.clone()]);
            prop_assert_eq!(diff.value(&var).cloned(), expected.get(&i).map(|x| Value::Int(*x)));
            prop_assert_eq!(diff.world().value(&var).cloned(), expected_base.get(&i).map(|x| Value::Int(*x)));
        }

        prop_assert_eq!(diff.world().fingerprint(), base_print);

        diff.save();
        prop_assert!(diff.is_clean());
        for (i, slot) in slots.iter().enumerate() {
            let var = v.var([slot.clone()]);
            prop_assert_eq!(diff.world().value(&var).cloned(), expected.get(&i).map(|x| Value::Int(*x)));
        }
    }

    /// Setting a count to N yields exactly N objects, and the common prefix
    /// survives a resize.
    #[test]
    fn counts_materialize_stable_prefixes(n1 in 0i64..40, n2 in 0i64..40) {
        let (model, pop, item) = count_model();
        let cv = CountVar::new(pop, item, Vec::<Value>::new());
        let mut world = PartialWorld::new(model);
        let mut rng = StdRng::seed_from_u64(0);

        world.set_value(cv.clone().into(), Value::Int(n1)).unwrap();
        let first = world.get_satisfiers(&cv, &mut rng).unwrap();
        prop_assert_eq!(first.len() as i64, n1);

        world.set_value(cv.clone().into(), Value::Int(n2)).unwrap();
        let second = world.get_satisfiers(&cv, &mut rng).unwrap();
        prop_assert_eq!(second.len() as i64, n2);
        let common = first.len().min(second.len());
        prop_assert_eq!(&first[..common], &second[..common]);
    }
}
