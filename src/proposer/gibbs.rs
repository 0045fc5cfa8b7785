use std::sync::Arc;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::debug;

use super::conditional::{ConditionalSampler, TruncatedGridSampler};
use super::config::GibbsConfig;
use super::{initialize_from_prior, seeded_rng, Proposal, Proposer, ProposerStats};
use crate::error::{EngineResult, ProposalError, ValidationError};
use crate::evidence::{Evidence, Query};
use crate::model::Model;
use crate::world::{PartialWorld, WorldDiff, WorldView};

const LABEL: &str = "variable_gibbs";

/// Single-variable Gibbs proposer.
///
/// Each step scans the basic variables in a fresh random order, skipping
/// those without a distribution and observed evidence, and resamples the
/// first one whose exact conditional can be built. The move is saved before
/// returning, so the proposal ratio is exactly 1.
#[derive(Debug)]
pub struct VariableGibbsProposer<S = TruncatedGridSampler> {
    model: Arc<Model>,
    sampler: S,
    rng: StdRng,
    stats: ProposerStats,
}

impl VariableGibbsProposer {
    /// Creates a proposer using the truncated-grid conditional sampler.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` for an invalid config.
    pub fn new(model: Arc<Model>, config: GibbsConfig) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self::with_sampler(model, config, TruncatedGridSampler::new(config.resolution)))
    }
}

impl<S: ConditionalSampler> VariableGibbsProposer<S> {
    /// Creates a proposer with a custom conditional sampler. The config's
    /// resolution is ignored.
    pub fn with_sampler(model: Arc<Model>, config: GibbsConfig, sampler: S) -> Self {
        Self {
            model,
            sampler,
            rng: seeded_rng(config.seed),
            stats: ProposerStats::default(),
        }
    }

    /// Model the proposer samples.
    #[must_use]
    pub const fn model(&self) -> &Arc<Model> {
        &self.model
    }
}

impl<S: ConditionalSampler> Proposer for VariableGibbsProposer<S> {
    fn initialize(&mut self, evidence: &Evidence, queries: &[Query]) -> EngineResult<PartialWorld> {
        initialize_from_prior(&self.model, evidence, queries, &mut self.rng)
    }

    fn propose_next_state(&mut self, world: &mut WorldDiff) -> EngineResult<Proposal> {
        let mut vars = world.basic_variables();
        let candidates = vars.len();
        vars.shuffle(&mut self.rng);
        vars.retain(|v| self.model.has_distribution(v) && !world.is_observed(v));

        for var in vars {
            let Some(values) = self.sampler.sampler(&var, world, &mut self.rng)? else {
                continue;
            };
            let value = values.draw(&mut self.rng);
            debug!(var = %var, value = %value, "gibbs update");
            world.set_value(var, value)?;
            world.save();
            self.stats.record_proposed(LABEL);
            return Ok(Proposal::gibbs(LABEL));
        }
        Err(ProposalError::NoEligibleVariable { candidates }.into())
    }

    fn update_stats(&mut self, accepted: bool) {
        self.stats.record_outcome(accepted);
    }

    fn stats(&self) -> &ProposerStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distrib::DistribSpec;
    use crate::model::{Dependency, ModelBuilder};
    use crate::value::{Value, ValueType};
    use crate::variable::Variable;

    fn gibbs(model: Arc<Model>) -> VariableGibbsProposer {
        VariableGibbsProposer::new(
            model,
            GibbsConfig {
                seed: Some(11),
                ..GibbsConfig::default()
            },
        )
        .unwrap()
    }

    #[test]
    fn resamples_and_saves() {
        let mut b = ModelBuilder::new();
        let x = b
            .add_random_function(
                "X",
                vec![],
                ValueType::Int,
                Some(Dependency::prior(DistribSpec::new("UniformInt", [0i64, 3]))),
            )
            .unwrap();
        let model = b.build();
        let mut proposer = gibbs(Arc::clone(&model));
        let world = proposer
            .initialize(&Evidence::new(), &[Query::new(x.var([]))])
            .unwrap();
        assert!(world.is_basic(&x.var([])));

        let mut diff = WorldDiff::from(world);
        let proposal = proposer.propose_next_state(&mut diff).unwrap();
        assert_eq!(proposal.ratio(), 1.0);
        assert_eq!(diff.overrides_len(), 0);
        let v = diff.world().value(&x.var([])).and_then(Value::as_int).unwrap();
        assert!((0..=3).contains(&v));
        proposer.update_stats(true);
        assert_eq!(proposer.stats().get(LABEL).map(|m| m.accepted), Some(1));
    }

    #[test]
    fn no_eligible_variable_is_fatal() {
        let mut b = ModelBuilder::new();
        // Dirichlet has no enumerable support.
        let theta = b
            .add_random_function(
                "Theta",
                vec![],
                ValueType::Vector,
                Some(Dependency::prior(DistribSpec::new("Dirichlet", [Value::Vector(vec![1.0, 1.0])]))),
            )
            .unwrap();
        let mut proposer = gibbs(b.build());
        let world = proposer
            .initialize(&Evidence::new(), &[Query::new(theta.var([]))])
            .unwrap();
        let mut diff = WorldDiff::from(world);
        let err = proposer.propose_next_state(&mut diff).unwrap_err();
        assert!(err.is_fatal());
        assert!(format!("{err}").contains("1 basic variable"));
    }

    #[test]
    fn observed_variables_are_never_resampled() {
        let mut b = ModelBuilder::new();
        let x = b
            .add_random_function(
                "X",
                vec![],
                ValueType::Bool,
                Some(Dependency::prior(DistribSpec::new("Bernoulli", [0.5]))),
            )
            .unwrap();
        let mut proposer = gibbs(b.build());
        let mut evidence = Evidence::new();
        evidence.observe(x.var([]), Value::Bool(true)).unwrap();
        let world = proposer.initialize(&evidence, &[]).unwrap();
        let mut diff = WorldDiff::from(world);
        let err = proposer.propose_next_state(&mut diff).unwrap_err();
        assert!(matches!(
            err,
            crate::error::EngineError::Proposal(ProposalError::NoEligibleVariable { candidates: 1 })
        ));
        let v: &Variable = &x.var([]);
        assert_eq!(diff.value(v), Some(&Value::Bool(true)));
    }
}
