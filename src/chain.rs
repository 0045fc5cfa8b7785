//! Minimal Markov chain driver.
//!
//! Holds a single [`WorldDiff`] over the current state and applies each
//! proposal according to its [`MoveKind`]. Query values are recorded after
//! every step.

use std::collections::BTreeMap;
use std::fmt;

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{EngineResult, ValidationError};
use crate::evidence::{Evidence, Query};
use crate::proposer::{seeded_rng, MoveKind, Proposer};
use crate::value::Value;
use crate::variable::Variable;
use crate::world::{log_joint, WorldDiff, WorldView};

/// Settings for a [`MarkovChain`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Seed of the acceptance RNG; `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Steps performed by [`MarkovChain::run`].
    pub steps: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self { seed: None, steps: 1000 }
    }
}

impl ChainConfig {
    /// Parses and validates a JSON config; missing fields take defaults.
    ///
    /// # Errors
    ///
    /// `InvalidConfig` for malformed JSON, `Zero` for zero steps.
    pub fn from_json(json: &str) -> Result<Self, ValidationError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ValidationError::InvalidConfig { reason: e.to_string() })?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    ///
    /// `Zero` if `steps` is zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.steps == 0 {
            return Err(ValidationError::Zero {
                field: "steps".to_string(),
            });
        }
        Ok(())
    }
}

/// Step accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChainStats {
    /// Steps performed.
    pub steps: u64,
    /// Accepted moves, Gibbs moves included.
    pub accepted: u64,
    /// Rejected MH candidates and recovered errors.
    pub rejected: u64,
    /// Placeholder moves (no state change).
    pub skipped: u64,
    /// Rejections caused by recoverable evaluation errors.
    pub recovered_errors: u64,
}

impl ChainStats {
    /// Accepted share of the decided (non-skipped) steps.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn acceptance_rate(&self) -> f64 {
        let decided = self.accepted + self.rejected;
        if decided == 0 {
            0.0
        } else {
            self.accepted as f64 / decided as f64
        }
    }
}

impl fmt::Display for ChainStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "steps={} accepted={} rejected={} skipped={} recovered_errors={}",
            self.steps, self.accepted, self.rejected, self.skipped, self.recovered_errors
        )
    }
}

/// Single-chain sampler driving a [`Proposer`].
pub struct MarkovChain<P> {
    proposer: P,
    world: WorldDiff,
    queries: Vec<Query>,
    config: ChainConfig,
    rng: StdRng,
    /// Log joint of the current state; `None` once a Gibbs move made it stale.
    log_prob: Option<f64>,
    stats: ChainStats,
    samples: BTreeMap<Variable, Vec<Value>>,
}

impl<P: Proposer> MarkovChain<P> {
    /// Initializes the proposer's world and scores it.
    ///
    /// # Errors
    ///
    /// `ValidationError` for an invalid config, or any initialization or
    /// evaluation error.
    pub fn new(mut proposer: P, evidence: &Evidence, queries: Vec<Query>, config: ChainConfig) -> EngineResult<Self> {
        config.validate()?;
        let mut rng = seeded_rng(config.seed);
        let mut world = WorldDiff::from(proposer.initialize(evidence, &queries)?);
        let log_prob = log_joint(&mut world, &mut rng)?;
        world.save();
        info!(queries = queries.len(), log_prob, "chain initialized");
        let samples = queries.iter().map(|q| (q.variable().clone(), Vec::new())).collect();
        Ok(Self {
            proposer,
            world,
            queries,
            config,
            rng,
            log_prob: Some(log_prob),
            stats: ChainStats::default(),
            samples,
        })
    }

    /// Runs `config.steps` steps.
    ///
    /// # Errors
    ///
    /// The first fatal or unrecoverable error.
    pub fn run(&mut self) -> EngineResult<ChainStats> {
        for _ in 0..self.config.steps {
            self.step()?;
        }
        info!(stats = %self.stats, "chain finished");
        Ok(self.stats)
    }

    /// Performs one step and records the queries.
    ///
    /// # Errors
    ///
    /// Fatal errors and evaluation errors that are not recoverable.
    pub fn step(&mut self) -> EngineResult<()> {
        match self.proposer.propose_next_state(&mut self.world) {
            Ok(proposal) => match proposal.kind() {
                MoveKind::Gibbs => {
                    self.world.save();
                    self.log_prob = None;
                    self.stats.accepted += 1;
                    self.proposer.update_stats(true);
                }
                MoveKind::MetropolisHastings => {
                    let accepted = self.metropolis_hastings(proposal.log_ratio())?;
                    self.proposer.update_stats(accepted);
                }
                MoveKind::Placeholder => {
                    self.world.revert();
                    self.stats.skipped += 1;
                    self.proposer.update_stats(false);
                }
            },
            Err(err) if err.is_recoverable() => {
                warn!(error = %err, "rejecting proposal");
                self.world.revert();
                self.stats.rejected += 1;
                self.stats.recovered_errors += 1;
                self.proposer.update_stats(false);
            }
            Err(err) => return Err(err),
        }
        self.record()?;
        self.stats.steps += 1;
        Ok(())
    }

    fn metropolis_hastings(&mut self, log_ratio: f64) -> EngineResult<bool> {
        let old = match self.log_prob {
            Some(lp) => lp,
            None => {
                let mut current = self.world.world().clone();
                log_joint(&mut current, &mut self.rng)?
            }
        };
        let new = match log_joint(&mut self.world, &mut self.rng) {
            Ok(lp) => lp,
            Err(err) if err.is_recoverable() => {
                warn!(error = %err, "rejecting proposal");
                self.world.revert();
                self.log_prob = Some(old);
                self.stats.rejected += 1;
                self.stats.recovered_errors += 1;
                return Ok(false);
            }
            Err(err) => return Err(err),
        };
        let u: f64 = self.rng.random();
        let accepted = u.ln() < log_ratio + new - old;
        debug!(old, new, log_ratio, accepted, "metropolis-hastings decision");
        if accepted {
            self.world.save();
            self.log_prob = Some(new);
            self.stats.accepted += 1;
        } else {
            self.world.revert();
            self.log_prob = Some(old);
            self.stats.rejected += 1;
        }
        Ok(accepted)
    }

    fn record(&mut self) -> EngineResult<()> {
        for query in &self.queries {
            let value = self.world.get_value(query.variable(), &mut self.rng)?;
            self.samples.entry(query.variable().clone()).or_default().push(value);
        }
        // Queries instantiated on demand change the scored variable set.
        if !self.world.is_clean() {
            self.log_prob = None;
            self.world.save();
        }
        Ok(())
    }

    /// Current state.
    #[must_use]
    pub fn world(&self) -> &WorldDiff {
        &self.world
    }

    /// The driven proposer.
    #[must_use]
    pub const fn proposer(&self) -> &P {
        &self.proposer
    }

    /// Step accounting so far.
    #[must_use]
    pub const fn stats(&self) -> &ChainStats {
        &self.stats
    }

    /// Values recorded for `var`, one per step.
    #[must_use]
    pub fn samples(&self, var: &Variable) -> &[Value] {
        self.samples.get(var).map_or(&[], Vec::as_slice)
    }

    /// Mean of the numeric samples of `var` (booleans count as 0/1);
    /// `None` if there are none.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self, var: &Variable) -> Option<f64> {
        let values: Vec<f64> = self
            .samples(var)
            .iter()
            .filter_map(|v| match v {
                Value::Bool(b) => Some(f64::from(u8::from(*b))),
                other => other.as_real(),
            })
            .collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }
}

impl<P> fmt::Debug for MarkovChain<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarkovChain")
            .field("config", &self.config)
            .field("stats", &self.stats)
            .field("log_prob", &self.log_prob)
            .finish_non_exhaustive()
    }
}
