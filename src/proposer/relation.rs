//! Composite proposer for the relation-extraction model.
//!
//! The model: relations hold between entity pairs with a per-relation
//! sparsity; each sentence expresses one true fact (its source fact) and
//! carries a trigger word drawn from the relation's trigger distribution
//! theta. The proposer mixes four moves on equal-width slices of one
//! uniform draw: source-fact switch, holds switch, conjugate Beta update of
//! Sparsity, and conjugate Dirichlet update of Theta.
//!
//! Both conjugate updates start from the prior the model declares for the
//! updated variable. The configured prior applies only when the model
//! declares none.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::Rng;
use tracing::{debug, info};

use super::config::{RelationProposerConfig, RelationSchema, ThetaCounting};
use super::conjugate::{resample_beta, resample_dirichlet, BetaParams};
use super::{pin_declared_counts, promote_derived, seeded_rng, Proposal, Proposer, ProposerStats};
use crate::distrib::{Dirichlet, DistribSpec};
use crate::error::{EngineError, EngineResult, ModelError, ProposalError, ValidationError};
use crate::evidence::{Evidence, Query};
use crate::model::Model;
use crate::object::{ObjectRef, TypeName};
use crate::value::{Value, ValueType};
use crate::variable::{FuncRef, PopId, Variable};
use crate::world::{distribution_of, PartialWorld, WorldDiff, WorldView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelationMove {
    SourceFactSwitch,
    HoldsSwitch,
    SparsitySample,
    ThetaSample,
}

impl RelationMove {
    const ALL: [Self; 4] = [
        Self::SourceFactSwitch,
        Self::HoldsSwitch,
        Self::SparsitySample,
        Self::ThetaSample,
    ];

    const fn label(self) -> &'static str {
        match self {
            Self::SourceFactSwitch => "source_fact_switch",
            Self::HoldsSwitch => "holds_switch",
            Self::SparsitySample => "sparsity_sample",
            Self::ThetaSample => "theta_sample",
        }
    }
}

/// The schema's names resolved against a model.
#[derive(Debug, Clone)]
struct ResolvedSchema {
    types: Vec<TypeName>,
    entity_type: TypeName,
    relations: Vec<Value>,
    entities: Vec<Value>,
    triggers: Vec<Value>,
    sentences: Vec<Value>,
    fact_pop: PopId,
    sparsity: FuncRef,
    holds: FuncRef,
    theta: FuncRef,
    source_fact: FuncRef,
    subject: FuncRef,
    object: FuncRef,
    trigger_id: FuncRef,
    verb: FuncRef,
}

impl ResolvedSchema {
    fn resolve(model: &Model, names: &RelationSchema) -> EngineResult<Self> {
        let ty = |name: &str| -> EngineResult<TypeName> {
            let ty = TypeName::new(name);
            if model.has_type(&ty) {
                Ok(ty)
            } else {
                Err(ModelError::UnknownType { name: name.to_string() }.into())
            }
        };
        let relation = ty(&names.relation_type)?;
        let entity = ty(&names.entity_type)?;
        let fact = ty(&names.fact_type)?;
        let trigger = ty(&names.trigger_type)?;
        let sentence = ty(&names.sentence_type)?;

        let on = |t: &TypeName| [ValueType::from(t)];
        Ok(Self {
            relations: model.guaranteed_values_of(&relation),
            entities: model.guaranteed_values_of(&entity),
            triggers: model.guaranteed_values_of(&trigger),
            sentences: model.guaranteed_values_of(&sentence),
            fact_pop: model.origin_pattern_for(&fact, 3)?.id(),
            sparsity: model.lookup_function(&names.sparsity, &on(&relation))?,
            holds: model.lookup_function(&names.holds, &on(&fact))?,
            theta: model.lookup_function(&names.theta, &on(&relation))?,
            source_fact: model.lookup_function(&names.source_fact, &on(&sentence))?,
            subject: model.lookup_function(&names.subject, &on(&sentence))?,
            object: model.lookup_function(&names.object, &on(&sentence))?,
            trigger_id: model.lookup_function(&names.trigger_id, &on(&sentence))?,
            verb: model.lookup_function(&names.verb, &on(&sentence))?,
            types: vec![relation.clone(), entity.clone(), fact.clone(), trigger.clone(), sentence.clone()],
            entity_type: entity,
        })
    }
}

/// Key of a fact: (relation, subject entity, object entity).
pub type FactKey = (Value, Value, Value);

/// Composite relation-extraction proposer.
pub struct RelationProposer {
    model: Arc<Model>,
    config: RelationProposerConfig,
    schema: ResolvedSchema,
    rng: StdRng,
    stats: ProposerStats,
    facts: BTreeMap<FactKey, ObjectRef>,
    initialized: bool,
}

impl RelationProposer {
    /// Resolves the configured schema against `model`.
    ///
    /// # Errors
    ///
    /// `ValidationError` for an invalid config, when the model declares no
    /// relations or no triggers, or when Sparsity or Theta has a prior the
    /// conjugate updates cannot use. `ModelError` when a schema name does
    /// not resolve.
    pub fn new(model: Arc<Model>, config: RelationProposerConfig) -> EngineResult<Self> {
        config.validate()?;
        let schema = ResolvedSchema::resolve(&model, &config.schema)?;
        if schema.relations.is_empty() || schema.triggers.is_empty() {
            return Err(ValidationError::InvalidConfig {
                reason: format!(
                    "model must declare at least one '{}' and one '{}' object",
                    config.schema.relation_type, config.schema.trigger_type
                ),
            }
            .into());
        }
        let mut proposer = Self {
            rng: seeded_rng(config.seed),
            model,
            config,
            schema,
            stats: ProposerStats::default(),
            facts: BTreeMap::new(),
            initialized: false,
        };
        let mut scratch = PartialWorld::new(Arc::clone(&proposer.model));
        for r in proposer.schema.relations.clone() {
            proposer.sparsity_prior(&mut scratch, &r)?;
            proposer.theta_prior(&mut scratch, &r)?;
        }
        Ok(proposer)
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &RelationProposerConfig {
        &self.config
    }

    /// The fact materialized for (relation, subject, object).
    #[must_use]
    pub fn fact(&self, key: &FactKey) -> Option<&ObjectRef> {
        self.facts.get(key)
    }

    /// Number of materialized facts (|Relation| · |Entity|² once initialized).
    #[must_use]
    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    /// `Sparsity(relation)`.
    #[must_use]
    pub fn sparsity_var(&self, relation: &Value) -> Variable {
        self.schema.sparsity.var([relation.clone()])
    }

    /// `Theta(relation)`.
    #[must_use]
    pub fn theta_var(&self, relation: &Value) -> Variable {
        self.schema.theta.var([relation.clone()])
    }

    /// Holds indicators of every (subject, object) slot of `relation`.
    #[must_use]
    pub fn holds_indicators(&self, relation: &Value) -> Vec<Variable> {
        let mut out = Vec::with_capacity(self.schema.entities.len() * self.schema.entities.len());
        for e1 in &self.schema.entities {
            for e2 in &self.schema.entities {
                if let Some(fact) = self.facts.get(&(relation.clone(), e1.clone(), e2.clone())) {
                    out.push(self.schema.holds.var([Value::from(fact.clone())]));
                }
            }
        }
        out
    }

    fn pick_move(&mut self) -> RelationMove {
        let u: f64 = self.rng.random();
        if self.config.enable_switch_moves {
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let slot = ((u * 4.0) as usize).min(3);
            RelationMove::ALL[slot]
        } else if u < 0.5 {
            RelationMove::SparsitySample
        } else {
            RelationMove::ThetaSample
        }
    }

    fn random_relation(&mut self) -> Value {
        let i = self.rng.random_range(0..self.schema.relations.len());
        self.schema.relations[i].clone()
    }

    /// Beta prior the model declares for `Sparsity(relation)`, or the
    /// configured one when the model declares none.
    fn sparsity_prior<W: WorldView + ?Sized>(&mut self, world: &mut W, relation: &Value) -> EngineResult<BetaParams> {
        let var = self.sparsity_var(relation);
        let Some(spec) = distribution_of(world, &var, &mut self.rng)? else {
            return Ok(BetaParams::new(self.config.alpha, self.config.beta)?);
        };
        match (spec.name(), spec.params()) {
            ("Beta", [a, b]) => match (a.as_real(), b.as_real()) {
                (Some(a), Some(b)) => Ok(BetaParams::new(a, b)?),
                _ => Err(non_conjugate(&var, "Beta", &spec)),
            },
            _ => Err(non_conjugate(&var, "Beta", &spec)),
        }
    }

    /// Dirichlet concentrations the model declares for `Theta(relation)`,
    /// or the configured symmetric ones when the model declares none.
    fn theta_prior<W: WorldView + ?Sized>(&mut self, world: &mut W, relation: &Value) -> EngineResult<Vec<f64>> {
        let var = self.theta_var(relation);
        let bins = self.schema.triggers.len();
        let Some(spec) = distribution_of(world, &var, &mut self.rng)? else {
            return Ok(vec![self.config.dirichlet_alpha; bins]);
        };
        if spec.name() != "Dirichlet" {
            return Err(non_conjugate(&var, "Dirichlet", &spec));
        }
        let base = Dirichlet::concentrations(spec.params()).map_err(|_| non_conjugate(&var, "Dirichlet", &spec))?;
        if base.len() != bins {
            return Err(ValidationError::InvalidConfig {
                reason: format!("{var} has {} concentrations for {bins} triggers", base.len()),
            }
            .into());
        }
        Ok(base)
    }

    fn sparsity_sample(&mut self, world: &mut WorldDiff) -> EngineResult<()> {
        let relation = self.random_relation();
        let indicators = self.holds_indicators(&relation);
        let prior = self.sparsity_prior(world, &relation)?;
        let target = self.sparsity_var(&relation);
        let x = resample_beta(world, &target, prior, &indicators, &mut self.rng)?;
        debug!(relation = %relation, slots = indicators.len(), sparsity = x, "sparsity update");
        Ok(())
    }

    fn theta_sample(&mut self, world: &mut WorldDiff) -> EngineResult<()> {
        let relation = self.random_relation();
        let mut assignments = Vec::with_capacity(self.schema.sentences.len());
        for sentence in &self.schema.sentences {
            if self.config.theta_counting == ThetaCounting::AttributedUnits {
                let source = world.get_value(&self.schema.source_fact.var([sentence.clone()]), &mut self.rng)?;
                if fact_relation(&source) != Some(&relation) {
                    continue;
                }
            }
            assignments.push(self.schema.trigger_id.var([sentence.clone()]));
        }
        let base = self.theta_prior(world, &relation)?;
        let target = self.theta_var(&relation);
        resample_dirichlet(world, &target, &base, &assignments, &mut self.rng)?;
        debug!(relation = %relation, units = assignments.len(), "theta update");
        Ok(())
    }

    /// Pins one fact per (relation, entity, entity) and records them.
    fn materialize_facts(&mut self, world: &mut PartialWorld) -> EngineResult<()> {
        let pattern = self
            .model
            .origin_pattern(self.schema.fact_pop)
            .ok_or_else(|| EngineError::internal("fact pattern vanished from model"))?;
        self.facts.clear();
        for r in &self.schema.relations {
            for e1 in &self.schema.entities {
                for e2 in &self.schema.entities {
                    let count = pattern.count_var([r.clone(), e1.clone(), e2.clone()]);
                    world.set_value(Variable::Count(count.clone()), Value::Int(1))?;
                    let fact = world
                        .get_satisfiers(&count, &mut self.rng)?
                        .first()
                        .cloned()
                        .ok_or_else(|| EngineError::internal("fact count pinned to 1 but nothing materialized"))?;
                    self.facts.insert((r.clone(), e1.clone(), e2.clone()), fact);
                }
            }
        }
        Ok(())
    }

    /// Observed value of an entity-valued sentence function, or a uniformly
    /// drawn entity (set as basic) when unobserved.
    fn entity_of(&mut self, world: &mut PartialWorld, var: Variable) -> EngineResult<Value> {
        if let Some(value) = world.value(&var) {
            return Ok(value.clone());
        }
        let i = self.rng.random_range(0..self.schema.entities.len().max(1));
        let value = self.schema.entities.get(i).cloned().unwrap_or(Value::Null);
        world.set_value(var, value.clone())?;
        Ok(value)
    }
}

fn non_conjugate(var: &Variable, expected: &str, found: &DistribSpec) -> EngineError {
    ValidationError::InvalidConfig {
        reason: format!("{var} needs a {expected} prior for its conjugate update, found {found}"),
    }
    .into()
}

/// Relation a fact was generated for (origin argument 0).
fn fact_relation(fact: &Value) -> Option<&Value> {
    fact.as_object()?.as_generated()?.origin_arg(0)
}

impl Proposer for RelationProposer {
    fn initialize(&mut self, evidence: &Evidence, queries: &[Query]) -> EngineResult<PartialWorld> {
        let mut world = PartialWorld::new(Arc::clone(&self.model));
        let pinned = pin_declared_counts(&mut world, &self.schema.types)?;
        self.materialize_facts(&mut world)?;

        for (var, value) in evidence {
            world.observe(var.clone(), value.clone())?;
        }

        // Observed verbs fix the trigger index.
        let sentences = self.schema.sentences.clone();
        for s in &sentences {
            let verb = world.value(&self.schema.verb.var([s.clone()])).cloned();
            if let Some(verb) = verb {
                if let Some(i) = self.schema.triggers.iter().position(|t| *t == verb) {
                    world.set_value(self.schema.trigger_id.var([s.clone()]), Value::from(i))?;
                }
            }
        }

        // Each sentence expresses a true fact of a random relation.
        for s in &sentences {
            let subject = self.entity_of(&mut world, self.schema.subject.var([s.clone()]))?;
            let object = self.entity_of(&mut world, self.schema.object.var([s.clone()]))?;
            let relation = self.random_relation();
            let fact = self
                .facts
                .get(&(relation.clone(), subject.clone(), object.clone()))
                .cloned()
                .ok_or_else(|| ModelError::NotGuaranteed {
                    object: format!("{subject} / {object}"),
                    ty: self.schema.entity_type.to_string(),
                })?;
            world.set_value(self.schema.source_fact.var([s.clone()]), Value::from(fact.clone()))?;
            world.set_value(self.schema.holds.var([Value::from(fact)]), Value::Bool(true))?;
        }

        let model = Arc::clone(&self.model);
        let registry = model.registry();
        for r in self.schema.relations.clone() {
            let beta = self.sparsity_prior(&mut world, &r)?.spec();
            let dirichlet = DistribSpec::new("Dirichlet", [Value::Vector(self.theta_prior(&mut world, &r)?)]);
            let sparsity = registry.sample(&beta, &mut self.rng)?;
            world.set_value(self.schema.sparsity.var([r.clone()]), sparsity)?;
            let theta = registry.sample(&dirichlet, &mut self.rng)?;
            world.set_value(self.schema.theta.var([r]), theta)?;
        }

        // Remaining Holds from Bernoulli(Sparsity(relation)).
        for ((r, _, _), fact) in &self.facts {
            let holds = self.schema.holds.var([Value::from(fact.clone())]);
            if world.is_instantiated(&holds) {
                continue;
            }
            let p = world
                .value(&self.schema.sparsity.var([r.clone()]))
                .and_then(Value::as_real)
                .unwrap_or(0.0);
            let value = registry.sample(&DistribSpec::new("Bernoulli", [p]), &mut self.rng)?;
            world.set_value(holds, value)?;
        }

        for query in queries {
            world.get_value(query.variable(), &mut self.rng)?;
        }
        promote_derived(&mut world)?;
        self.initialized = true;
        info!(
            pinned,
            facts = self.facts.len(),
            sentences = sentences.len(),
            basic = world.basic_variables().len(),
            "initialized relation world"
        );
        Ok(world)
    }

    fn propose_next_state(&mut self, world: &mut WorldDiff) -> EngineResult<Proposal> {
        if !self.initialized {
            return Err(ProposalError::NotInitialized.into());
        }
        let mv = self.pick_move();
        self.stats.record_proposed(mv.label());
        match mv {
            RelationMove::SourceFactSwitch | RelationMove::HoldsSwitch => {
                debug!(move_kind = mv.label(), "placeholder move");
                Ok(Proposal::placeholder(mv.label()))
            }
            RelationMove::SparsitySample => {
                self.sparsity_sample(world)?;
                world.save();
                Ok(Proposal::gibbs(mv.label()))
            }
            RelationMove::ThetaSample => {
                self.theta_sample(world)?;
                world.save();
                Ok(Proposal::gibbs(mv.label()))
            }
        }
    }

    fn update_stats(&mut self, accepted: bool) {
        self.stats.record_outcome(accepted);
    }

    fn stats(&self) -> &ProposerStats {
        &self.stats
    }
}

impl fmt::Debug for RelationProposer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationProposer")
            .field("config", &self.config)
            .field("facts", &self.facts.len())
            .field("initialized", &self.initialized)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Dependency, DependencyModel, ModelBuilder};
    use crate::models::{coin_model, relation_extraction_model, RelationModel, RelationSizes};
    use crate::proposer::MoveKind;

    /// The default schema with no dependencies except an optional Sparsity
    /// prior; `counted` adds `#Relation()` and `#Sentence()` patterns.
    fn schema_model(sparsity: Option<Arc<dyn DependencyModel>>, counted: bool) -> Arc<Model> {
        let mut b = ModelBuilder::new();
        let relation = b.add_type("Relation").unwrap();
        let entity = b.add_type("Entity").unwrap();
        let fact = b.add_type("Fact").unwrap();
        let trigger = b.add_type("Trigger").unwrap();
        let sentence = b.add_type("Sentence").unwrap();
        b.add_guaranteed_array(&relation, "r", 2).unwrap();
        b.add_guaranteed_array(&entity, "e", 2).unwrap();
        b.add_guaranteed_array(&trigger, "t", 3).unwrap();
        b.add_guaranteed_array(&sentence, "s", 2).unwrap();
        b.add_origin_pattern(
            &fact,
            &[relation.clone(), entity.clone(), entity.clone()],
            Some(Dependency::prior(DistribSpec::new("Constant", [1i64]))),
        )
        .unwrap();
        if counted {
            for ty in [&relation, &sentence] {
                b.add_origin_pattern(ty, &[], Some(Dependency::prior(DistribSpec::new("Poisson", [3.0]))))
                    .unwrap();
            }
        }
        let on = |ty: &TypeName| vec![ValueType::from(ty)];
        b.add_random_function("Sparsity", on(&relation), ValueType::Real, sparsity).unwrap();
        b.add_random_function("Theta", on(&relation), ValueType::Vector, None).unwrap();
        b.add_random_function("Holds", on(&fact), ValueType::Bool, None).unwrap();
        b.add_random_function("SourceFact", on(&sentence), ValueType::from(&fact), None).unwrap();
        b.add_random_function("Subject", on(&sentence), ValueType::from(&entity), None).unwrap();
        b.add_random_function("Object", on(&sentence), ValueType::from(&entity), None).unwrap();
        b.add_random_function("TriggerID", on(&sentence), ValueType::Int, None).unwrap();
        b.add_random_function("Verb", on(&sentence), ValueType::from(&trigger), None).unwrap();
        b.build()
    }

    fn model() -> RelationModel {
        relation_extraction_model(
            RelationSizes {
                relations: 2,
                entities: 3,
                triggers: 4,
                sentences: 3,
            },
            BetaParams::new(1.0, 1.0).unwrap(),
            1.0,
        )
        .unwrap()
    }

    fn proposer(rm: &RelationModel, config: RelationProposerConfig) -> RelationProposer {
        RelationProposer::new(
            Arc::clone(&rm.model),
            RelationProposerConfig {
                seed: Some(21),
                ..config
            },
        )
        .unwrap()
    }

    #[test]
    fn unresolvable_schema_is_rejected() {
        let coin = coin_model(BetaParams::new(1.0, 1.0).unwrap(), 2).unwrap();
        let err = RelationProposer::new(coin.model, RelationProposerConfig::default()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn non_conjugate_sparsity_prior_is_rejected() {
        let gaussian = Dependency::prior(DistribSpec::new("Gaussian", [0.5, 1.0]));
        let err = RelationProposer::new(schema_model(Some(gaussian), false), RelationProposerConfig::default())
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::InvalidConfig { .. })));
    }

    #[test]
    fn model_priors_take_precedence_over_config() {
        let configured = RelationProposerConfig {
            alpha: 3.0,
            beta: 7.0,
            dirichlet_alpha: 2.0,
            ..RelationProposerConfig::default()
        };
        let rm = relation_extraction_model(
            RelationSizes {
                relations: 1,
                entities: 2,
                triggers: 3,
                sentences: 1,
            },
            BetaParams::new(20.0, 1.0).unwrap(),
            0.5,
        )
        .unwrap();
        let mut p = proposer(&rm, configured.clone());
        let mut scratch = PartialWorld::new(Arc::clone(&rm.model));
        let r = rm.relations[0].clone();
        assert_eq!(p.sparsity_prior(&mut scratch, &r).unwrap(), BetaParams { alpha: 20.0, beta: 1.0 });
        assert_eq!(p.theta_prior(&mut scratch, &r).unwrap(), vec![0.5; 3]);

        // Without model priors the configured ones apply.
        let bare = schema_model(None, false);
        let mut p = RelationProposer::new(Arc::clone(&bare), configured).unwrap();
        let mut scratch = PartialWorld::new(bare);
        let r = p.schema.relations[0].clone();
        assert_eq!(p.sparsity_prior(&mut scratch, &r).unwrap(), BetaParams { alpha: 3.0, beta: 7.0 });
        assert_eq!(p.theta_prior(&mut scratch, &r).unwrap(), vec![2.0; 3]);
    }

    #[test]
    fn initialize_pins_parameterless_counts() {
        let model = schema_model(None, true);
        let mut p = RelationProposer::new(
            Arc::clone(&model),
            RelationProposerConfig {
                seed: Some(4),
                ..RelationProposerConfig::default()
            },
        )
        .unwrap();
        let world = p.initialize(&Evidence::new(), &[]).unwrap();
        for name in ["Relation", "Sentence"] {
            let ty = TypeName::new(name);
            let count = Variable::Count(model.origin_pattern_for(&ty, 0).unwrap().count_var([]));
            assert_eq!(world.value(&count), Some(&Value::Int(2)), "{name}");
            assert!(world.is_observed(&count));
        }
        assert!(model.origin_pattern_for(&TypeName::new("Entity"), 0).is_err());
    }

    #[test]
    fn propose_requires_initialize() {
        let rm = model();
        let mut p = proposer(&rm, RelationProposerConfig::default());
        let mut diff = WorldDiff::from(PartialWorld::new(Arc::clone(&rm.model)));
        let err = p.propose_next_state(&mut diff).unwrap_err();
        assert!(matches!(err, EngineError::Proposal(ProposalError::NotInitialized)));
    }

    #[test]
    fn initialization_links_sentences_to_true_facts() {
        let rm = model();
        let evidence = rm.evidence(&[(0, 1, 3), (2, 2, 0), (1, 0, 1)]).unwrap();
        let mut p = proposer(&rm, RelationProposerConfig::default());
        let world = p.initialize(&evidence, &[]).unwrap();
        assert_eq!(p.fact_count(), 2 * 3 * 3);

        for (i, s) in rm.sentences.iter().enumerate() {
            let fact = world.value(&rm.source_fact.var([s.clone()])).cloned().unwrap();
            let generated = fact.as_object().and_then(ObjectRef::as_generated).unwrap().clone();
            assert_eq!(world.value(&rm.holds.var([fact.clone()])), Some(&Value::Bool(true)));
            assert_eq!(generated.origin_arg(1), world.value(&rm.subject.var([s.clone()])));
            assert_eq!(generated.origin_arg(2), world.value(&rm.object.var([s.clone()])));

            let verb = world.value(&rm.verb.var([s.clone()])).unwrap();
            let index = rm.triggers.iter().position(|t| t == verb).unwrap();
            assert_eq!(world.value(&rm.trigger_id.var([s.clone()])), Some(&Value::from(index)));
            assert!(world.is_basic(&rm.trigger_id.var([s.clone()])), "sentence {i}");
        }
        for r in &rm.relations {
            assert!(world.is_basic(&rm.sparsity.var([r.clone()])));
            assert!(world.is_basic(&rm.theta.var([r.clone()])));
            for holds in p.holds_indicators(r) {
                assert!(world.is_basic(&holds));
            }
        }
    }

    #[test]
    fn conjugate_moves_are_saved_gibbs_steps() {
        let rm = model();
        let evidence = rm.evidence(&[(0, 1, 3), (2, 2, 0)]).unwrap();
        let mut p = proposer(&rm, RelationProposerConfig::default());
        let mut diff = WorldDiff::from(p.initialize(&evidence, &[]).unwrap());
        for _ in 0..20 {
            let proposal = p.propose_next_state(&mut diff).unwrap();
            assert_eq!(proposal.kind(), MoveKind::Gibbs);
            assert!(diff.is_clean());
            p.update_stats(true);
        }
        assert_eq!(p.stats().total_proposed(), 20);
        assert!(p.stats().get("source_fact_switch").is_none());
    }

    #[test]
    fn switch_moves_are_placeholders() {
        let rm = model();
        let evidence = rm.evidence(&[(0, 1, 3)]).unwrap();
        let mut p = proposer(
            &rm,
            RelationProposerConfig {
                enable_switch_moves: true,
                ..RelationProposerConfig::default()
            },
        );
        let mut diff = WorldDiff::from(p.initialize(&evidence, &[]).unwrap());
        let before = diff.world().fingerprint();
        let mut placeholders = 0;
        for _ in 0..40 {
            let proposal = p.propose_next_state(&mut diff).unwrap();
            if proposal.kind() == MoveKind::Placeholder {
                placeholders += 1;
                assert!(diff.is_clean());
            }
        }
        assert!(placeholders > 0);
        assert_ne!(diff.world().fingerprint(), before);
    }

    #[test]
    fn attributed_counting_only_uses_sentences_of_the_relation() {
        let rm = model();
        let evidence = rm.evidence(&[(0, 1, 3), (2, 2, 0), (1, 0, 1)]).unwrap();
        let mut p = proposer(
            &rm,
            RelationProposerConfig {
                theta_counting: ThetaCounting::AttributedUnits,
                ..RelationProposerConfig::default()
            },
        );
        let mut diff = WorldDiff::from(p.initialize(&evidence, &[]).unwrap());
        for _ in 0..10 {
            p.propose_next_state(&mut diff).unwrap();
        }
        for r in &rm.relations {
            let theta = diff.value(&rm.theta.var([r.clone()])).and_then(Value::as_vector).unwrap();
            assert_eq!(theta.len(), 4);
            assert!((theta.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        }
    }
}
