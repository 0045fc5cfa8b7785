//! Ready-made models.
//!
//! - [`coin_model`]: one coin of unknown bias and a row of observed flips.
//!   The textbook Beta-Bernoulli posterior makes it a convenient check for
//!   the Gibbs proposer.
//! - [`relation_extraction_model`]: relations between entity pairs, each
//!   sentence expressing one true fact through a trigger word.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::distrib::DistribSpec;
use crate::error::{EngineResult, ValidationError};
use crate::evidence::Evidence;
use crate::model::{Dependency, Model, ModelBuilder};
use crate::proposer::conjugate::BetaParams;
use crate::object::{GuaranteedObject, TypeName};
use crate::value::{Value, ValueType};
use crate::variable::{CountVar, FuncRef, PopId, Variable};

/// Coin-flip model: `Sparsity(coin) ~ Beta(prior)`,
/// `Holds(flip[i]) ~ Bernoulli(Sparsity(coin))`.
#[derive(Debug, Clone)]
pub struct CoinModel {
    /// The built model.
    pub model: Arc<Model>,
    /// `Sparsity(Coin)`, the coin bias.
    pub bias: FuncRef,
    /// `Holds(Flip)`, one flip outcome.
    pub holds: FuncRef,
    /// The single coin.
    pub coin: Value,
    /// Guaranteed flips, in order.
    pub flips: Vec<Value>,
}

impl CoinModel {
    /// The coin's bias variable.
    #[must_use]
    pub fn bias_var(&self) -> Variable {
        self.bias.var([self.coin.clone()])
    }

    /// Outcome variable of flip `i`.
    #[must_use]
    pub fn flip_var(&self, i: usize) -> Option<Variable> {
        self.flips.get(i).map(|f| self.holds.var([f.clone()]))
    }

    /// Evidence for the first `outcomes.len()` flips.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` if there are more outcomes than flips.
    pub fn evidence(&self, outcomes: &[bool]) -> EngineResult<Evidence> {
        if outcomes.len() > self.flips.len() {
            return Err(ValidationError::InvalidConfig {
                reason: format!("{} outcomes for {} flips", outcomes.len(), self.flips.len()),
            }
            .into());
        }
        let mut evidence = Evidence::new();
        for (flip, outcome) in self.flips.iter().zip(outcomes) {
            evidence.observe(self.holds.var([flip.clone()]), Value::Bool(*outcome))?;
        }
        Ok(evidence)
    }
}

/// Builds the coin-flip model with `flips` guaranteed flips.
///
/// # Errors
///
/// Only on internal model-construction failures.
pub fn coin_model(prior: BetaParams, flips: usize) -> EngineResult<CoinModel> {
    let mut b = ModelBuilder::new();
    let coin_ty = b.add_type("Coin")?;
    let flip_ty = b.add_type("Flip")?;
    let coin: Value = b.add_guaranteed_objects(&coin_ty, ["coin"])?.remove(0).into();
    let flips: Vec<Value> = b
        .add_guaranteed_array(&flip_ty, "flip", flips)?
        .into_iter()
        .map(Value::from)
        .collect();

    let bias = b.add_random_function(
        "Sparsity",
        vec![ValueType::from(&coin_ty)],
        ValueType::Real,
        Some(Dependency::prior(prior.spec())),
    )?;
    let parent = bias.var([coin.clone()]);
    let holds = b.add_random_function(
        "Holds",
        vec![ValueType::from(&flip_ty)],
        ValueType::Bool,
        Some(Dependency::from_fn(move |_args, parents| {
            let p = parents.read_real(&parent)?;
            Ok(DistribSpec::new("Bernoulli", [p]))
        })),
    )?;

    Ok(CoinModel {
        model: b.build(),
        bias,
        holds,
        coin,
        flips,
    })
}

/// Universe sizes of the relation-extraction model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationSizes {
    /// Number of relations.
    pub relations: usize,
    /// Number of entities.
    pub entities: usize,
    /// Number of trigger words.
    pub triggers: usize,
    /// Number of sentences.
    pub sentences: usize,
}

/// Relation-extraction model and handles to its parts. Function and type
/// names match [`RelationSchema::default`](crate::proposer::RelationSchema).
#[derive(Debug, Clone)]
pub struct RelationModel {
    /// The built model.
    pub model: Arc<Model>,
    /// Guaranteed relations.
    pub relations: Vec<Value>,
    /// Guaranteed entities.
    pub entities: Vec<Value>,
    /// Guaranteed trigger words.
    pub triggers: Vec<Value>,
    /// Guaranteed sentences.
    pub sentences: Vec<Value>,
    /// `#Fact(Relation, Entity, Entity)`.
    pub fact_pop: PopId,
    /// `Sparsity(Relation)`.
    pub sparsity: FuncRef,
    /// `Theta(Relation)`.
    pub theta: FuncRef,
    /// `Holds(Flip)`, one flip outcome.
    pub holds: FuncRef,
    /// `SourceFact(Sentence)`.
    pub source_fact: FuncRef,
    /// `Subject(Sentence)`.
    pub subject: FuncRef,
    /// `Object(Sentence)`.
    pub object: FuncRef,
    /// `TriggerID(Sentence)`.
    pub trigger_id: FuncRef,
    /// `Verb(Sentence)`.
    pub verb: FuncRef,
}

impl RelationModel {
    /// Evidence for sentence `i` from `(subject, object, trigger)` index
    /// triples.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` when an index is out of range.
    pub fn evidence(&self, sentences: &[(usize, usize, usize)]) -> EngineResult<Evidence> {
        let mut evidence = Evidence::new();
        for (i, &(subj, obj, trigger)) in sentences.iter().enumerate() {
            let (Some(s), Some(e1), Some(e2), Some(t)) = (
                self.sentences.get(i),
                self.entities.get(subj),
                self.entities.get(obj),
                self.triggers.get(trigger),
            ) else {
                return Err(ValidationError::InvalidConfig {
                    reason: format!("sentence {i} ({subj}, {obj}, {trigger}) is out of range"),
                }
                .into());
            };
            evidence.observe(self.subject.var([s.clone()]), e1.clone())?;
            evidence.observe(self.object.var([s.clone()]), e2.clone())?;
            evidence.observe(self.verb.var([s.clone()]), t.clone())?;
        }
        Ok(evidence)
    }
}

/// Builds the relation-extraction model.
///
/// ```text
/// #Fact(r, e1, e2) ~ Constant(1)
/// Sparsity(r)      ~ Beta(prior)
/// Theta(r)         ~ Dirichlet(dirichlet_alpha, ..)
/// Holds(f)         ~ Bernoulli(Sparsity(Rel(f)))
/// SourceFact(s)    ~ UniformChoice({f : Holds(f)})
/// Subject(s)       = Arg1(SourceFact(s))
/// Object(s)        = Arg2(SourceFact(s))
/// TriggerID(s)     ~ Categorical(Theta(Rel(SourceFact(s))))
/// Verb(s)          = trigger[TriggerID(s)]
/// ```
///
/// # Errors
///
/// `NonPositive` for a non-positive `dirichlet_alpha`.
pub fn relation_extraction_model(
    sizes: RelationSizes,
    prior: BetaParams,
    dirichlet_alpha: f64,
) -> EngineResult<RelationModel> {
    if !(dirichlet_alpha.is_finite() && dirichlet_alpha > 0.0) {
        return Err(ValidationError::NonPositive {
            field: "dirichlet_alpha".to_string(),
            value: dirichlet_alpha,
        }
        .into());
    }
    let mut b = ModelBuilder::new();
    let relation_ty = b.add_type("Relation")?;
    let entity_ty = b.add_type("Entity")?;
    let fact_ty = b.add_type("Fact")?;
    let trigger_ty = b.add_type("Trigger")?;
    let sentence_ty = b.add_type("Sentence")?;

    let values = |objs: Vec<GuaranteedObject>| objs.into_iter().map(Value::from).collect::<Vec<_>>();
    let relations = values(b.add_guaranteed_array(&relation_ty, "r", sizes.relations)?);
    let entities = values(b.add_guaranteed_array(&entity_ty, "e", sizes.entities)?);
    let triggers = values(b.add_guaranteed_array(&trigger_ty, "t", sizes.triggers)?);
    let sentences = values(b.add_guaranteed_array(&sentence_ty, "s", sizes.sentences)?);

    let fact_pop = b.add_origin_pattern(
        &fact_ty,
        &[relation_ty.clone(), entity_ty.clone(), entity_ty.clone()],
        Some(Dependency::prior(DistribSpec::new("Constant", [1i64]))),
    )?;

    let on = |ty: &TypeName| vec![ValueType::from(ty)];
    let sparsity = b.add_random_function(
        "Sparsity",
        on(&relation_ty),
        ValueType::Real,
        Some(Dependency::prior(prior.spec())),
    )?;
    let theta = b.add_random_function(
        "Theta",
        on(&relation_ty),
        ValueType::Vector,
        Some(Dependency::prior(DistribSpec::new(
            "Dirichlet",
            [Value::Vector(vec![dirichlet_alpha; sizes.triggers])],
        ))),
    )?;
    let holds = b.add_random_function("Holds", on(&fact_ty), ValueType::Bool, None)?;
    let source_fact = b.add_random_function("SourceFact", on(&sentence_ty), ValueType::from(&fact_ty), None)?;
    let subject = b.add_random_function("Subject", on(&sentence_ty), ValueType::from(&entity_ty), None)?;
    let object = b.add_random_function("Object", on(&sentence_ty), ValueType::from(&entity_ty), None)?;
    let trigger_id = b.add_random_function("TriggerID", on(&sentence_ty), ValueType::Int, None)?;
    let verb = b.add_random_function("Verb", on(&sentence_ty), ValueType::from(&trigger_ty), None)?;

    {
        let sparsity = sparsity.clone();
        b.set_dependency(
            &holds,
            Dependency::from_fn(move |args, parents| {
                let Some(relation) = origin_arg(args, 0) else {
                    return Ok(DistribSpec::new("Constant", [false]));
                };
                let p = parents.read_real(&sparsity.var([relation]))?;
                Ok(DistribSpec::new("Bernoulli", [p]))
            }),
        )?;
    }
    {
        let fact_ty = fact_ty.clone();
        let (relations, entities, holds) = (relations.clone(), entities.clone(), holds.clone());
        b.set_dependency(
            &source_fact,
            Dependency::from_fn(move |_args, parents| {
                let mut candidates = Vec::new();
                for r in &relations {
                    for e1 in &entities {
                        for e2 in &entities {
                            let count = CountVar::new(fact_pop, fact_ty.clone(), [r.clone(), e1.clone(), e2.clone()]);
                            for fact in parents.satisfiers(&count)?.iter() {
                                let fact = Value::from(fact.clone());
                                if parents.read(&holds.var([fact.clone()]))? == Value::Bool(true) {
                                    candidates.push(fact);
                                }
                            }
                        }
                    }
                }
                if candidates.is_empty() {
                    Ok(DistribSpec::new("Constant", [Value::Null]))
                } else {
                    Ok(DistribSpec::new("UniformChoice", candidates))
                }
            }),
        )?;
    }
    for (func, arg) in [(&subject, 1), (&object, 2)] {
        let source_fact = source_fact.clone();
        b.set_dependency(
            func,
            Dependency::from_fn(move |args, parents| {
                let fact = parents.read(&source_fact.var(args.iter().cloned()))?;
                let entity = origin_arg(std::slice::from_ref(&fact), arg).unwrap_or(Value::Null);
                Ok(DistribSpec::new("Constant", [entity]))
            }),
        )?;
    }
    {
        let (source_fact, theta) = (source_fact.clone(), theta.clone());
        let triggers = sizes.triggers;
        b.set_dependency(
            &trigger_id,
            Dependency::from_fn(move |args, parents| {
                let fact = parents.read(&source_fact.var(args.iter().cloned()))?;
                let Some(relation) = origin_arg(std::slice::from_ref(&fact), 0) else {
                    return Ok(DistribSpec::new("UniformInt", [0, triggers.saturating_sub(1)]));
                };
                let weights = parents.read(&theta.var([relation]))?;
                Ok(DistribSpec::new("Categorical", [weights]))
            }),
        )?;
    }
    {
        let (trigger_id, triggers) = (trigger_id.clone(), triggers.clone());
        b.set_dependency(
            &verb,
            Dependency::from_fn(move |args, parents| {
                let index = parents.read(&trigger_id.var(args.iter().cloned()))?;
                let trigger = index
                    .as_int()
                    .and_then(|i| usize::try_from(i).ok())
                    .and_then(|i| triggers.get(i).cloned())
                    .unwrap_or(Value::Null);
                Ok(DistribSpec::new("Constant", [trigger]))
            }),
        )?;
    }

    Ok(RelationModel {
        model: b.build(),
        relations,
        entities,
        triggers,
        sentences,
        fact_pop,
        sparsity,
        theta,
        holds,
        source_fact,
        subject,
        object,
        trigger_id,
        verb,
    })
}

/// Origin argument `i` of the generated object in `args[0]`.
fn origin_arg(args: &[Value], i: usize) -> Option<Value> {
    args.first()?.as_object()?.as_generated()?.origin_arg(i).cloned()
}
