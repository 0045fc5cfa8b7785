//! Proposal framework.
//!
//! A proposer turns the current world (wrapped in a [`WorldDiff`]) into a
//! candidate next state and reports how the driver must treat it:
//! - `Gibbs`: an exact conditional draw, already saved; accept
//!   unconditionally (log ratio 0, ratio 1).
//! - `MetropolisHastings`: the diff holds the candidate; accept or reject
//!   using the returned log proposal ratio.
//! - `Placeholder`: no state change; the driver discards the diff.

mod conditional;
mod config;
pub mod conjugate;
mod gibbs;
mod relation;

pub use conditional::{ConditionalSampler, TruncatedGridSampler, WeightedValue, WeightedValues};
pub use config::{GibbsConfig, RelationProposerConfig, RelationSchema, ThetaCounting};
pub use gibbs::VariableGibbsProposer;
pub use relation::RelationProposer;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::EngineResult;
use crate::evidence::{Evidence, Query};
use crate::model::Model;
use crate::object::TypeName;
use crate::value::Value;
use crate::variable::Variable;
use crate::world::{log_density_of, PartialWorld, WorldDiff, WorldView};

/// How the driver must treat a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveKind {
    /// Exact conditional draw; already saved.
    Gibbs,
    /// Candidate in the diff; accept with the MH rule.
    MetropolisHastings,
    /// Unimplemented move; nothing changed.
    Placeholder,
}

/// Outcome of one `propose_next_state` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Proposal {
    log_ratio: f64,
    kind: MoveKind,
    label: &'static str,
}

impl Proposal {
    /// An exact conditional (Gibbs) draw: log ratio 0.
    #[must_use]
    pub const fn gibbs(label: &'static str) -> Self {
        Self {
            log_ratio: 0.0,
            kind: MoveKind::Gibbs,
            label,
        }
    }

    /// A Metropolis-Hastings candidate with log q(old|new) - log q(new|old).
    #[must_use]
    pub const fn metropolis_hastings(label: &'static str, log_ratio: f64) -> Self {
        Self {
            log_ratio,
            kind: MoveKind::MetropolisHastings,
            label,
        }
    }

    /// An unimplemented move that left the world untouched.
    #[must_use]
    pub const fn placeholder(label: &'static str) -> Self {
        Self {
            log_ratio: 0.0,
            kind: MoveKind::Placeholder,
            label,
        }
    }

    /// Log proposal ratio; 0 for Gibbs and placeholder moves.
    #[must_use]
    pub const fn log_ratio(&self) -> f64 {
        self.log_ratio
    }

    /// Proposal ratio q(old|new)/q(new|old).
    #[must_use]
    pub fn ratio(&self) -> f64 {
        self.log_ratio.exp()
    }

    /// How the driver must treat the proposal.
    #[must_use]
    pub const fn kind(&self) -> MoveKind {
        self.kind
    }

    /// Name of the move that produced the proposal.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        self.label
    }
}

impl fmt::Display for Proposal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, log ratio {})", self.label, self.kind, self.log_ratio)
    }
}

/// Proposed/accepted counters for one move.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MoveStats {
    /// Times the move was proposed.
    pub proposed: u64,
    /// Times the driver accepted it.
    pub accepted: u64,
}

impl MoveStats {
    /// Fraction of proposals accepted; 0 when nothing was proposed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn acceptance_rate(&self) -> f64 {
        if self.proposed == 0 {
            0.0
        } else {
            self.accepted as f64 / self.proposed as f64
        }
    }
}

/// Per-move statistics of a proposer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProposerStats {
    moves: BTreeMap<&'static str, MoveStats>,
    #[serde(skip)]
    last: Option<&'static str>,
}

impl ProposerStats {
    /// Records that `label` was proposed; it becomes the move the next
    /// `record_outcome` applies to.
    pub fn record_proposed(&mut self, label: &'static str) {
        self.moves.entry(label).or_default().proposed += 1;
        self.last = Some(label);
    }

    /// Records the driver's verdict on the last proposed move.
    pub fn record_outcome(&mut self, accepted: bool) {
        if let (true, Some(label)) = (accepted, self.last) {
            self.moves.entry(label).or_default().accepted += 1;
        }
        self.last = None;
    }

    /// Counters of one move, if it was ever proposed.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<&MoveStats> {
        self.moves.get(label)
    }

    /// Counters of every proposed move, ordered by label.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &MoveStats)> {
        self.moves.iter().map(|(k, v)| (*k, v))
    }

    /// Proposals across all moves.
    #[must_use]
    pub fn total_proposed(&self) -> u64 {
        self.moves.values().map(|m| m.proposed).sum()
    }
}

impl fmt::Display for ProposerStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, m) in &self.moves {
            writeln!(
                f,
                "{label}: {}/{} accepted ({:.1}%)",
                m.accepted,
                m.proposed,
                100.0 * m.acceptance_rate()
            )?;
        }
        Ok(())
    }
}

/// A source of MCMC moves over partial worlds.
pub trait Proposer {
    /// Builds an initial world consistent with `evidence` in which every
    /// query variable is instantiated.
    ///
    /// # Errors
    ///
    /// Configuration errors abort initialization.
    fn initialize(&mut self, evidence: &Evidence, queries: &[Query]) -> EngineResult<PartialWorld>;

    /// Proposes a next state by reading and writing `world`.
    ///
    /// # Errors
    ///
    /// Fatal errors (`NoEligibleVariable`) stop the run; recoverable ones
    /// (`CyclicDependency`) reject this proposal only.
    fn propose_next_state(&mut self, world: &mut WorldDiff) -> EngineResult<Proposal>;

    /// Informs the proposer whether its last proposal was accepted.
    fn update_stats(&mut self, accepted: bool);

    /// Per-move counters collected so far.
    fn stats(&self) -> &ProposerStats;
}

pub(crate) fn seeded_rng(seed: Option<u64>) -> StdRng {
    seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64)
}

/// Generic initialization: pin the parameterless count of every type with
/// guaranteed objects, observe the evidence, instantiate the parents of
/// every evidence variable and every query, then promote the derived
/// variables to basic so they can be resampled.
///
/// # Errors
///
/// Conflicting or ill-typed evidence, or evaluation errors.
pub fn initialize_from_prior(
    model: &Arc<Model>,
    evidence: &Evidence,
    queries: &[Query],
    rng: &mut dyn RngCore,
) -> EngineResult<PartialWorld> {
    let mut world = PartialWorld::new(Arc::clone(model));
    let declared: Vec<TypeName> = model
        .types()
        .filter(|ty| !model.guaranteed_objects_of(ty).is_empty())
        .cloned()
        .collect();
    let pinned = pin_declared_counts(&mut world, &declared)?;
    for (var, value) in evidence {
        world.observe(var.clone(), value.clone())?;
    }
    for (var, _) in evidence {
        let lp = log_density_of(&mut world, var, rng)?;
        if lp == f64::NEG_INFINITY {
            warn!(var = %var, "evidence has zero probability under the sampled parents");
        }
    }
    for query in queries {
        world.get_value(query.variable(), rng)?;
    }
    promote_derived(&mut world)?;
    info!(
        pinned,
        basic = world.basic_variables().len(),
        observed = evidence.len(),
        queries = queries.len(),
        "initialized world"
    );
    Ok(world)
}

/// Observes the parameterless count variable `#T()` of each type in `types`
/// as the number of guaranteed objects declared for `T`, so no move ever
/// resamples it. Returns how many counts were pinned.
pub(crate) fn pin_declared_counts(world: &mut PartialWorld, types: &[TypeName]) -> EngineResult<usize> {
    let model = Arc::clone(world.model());
    let mut pinned = 0;
    for ty in types {
        let n = model.guaranteed_objects_of(ty).len();
        for pattern in model.origin_patterns_of(ty).filter(|p| p.origin_types().is_empty()) {
            world.observe(Variable::Count(pattern.count_var([])), Value::from(n))?;
            pinned += 1;
        }
    }
    Ok(pinned)
}

/// Marks every derived variable that has a distribution as basic.
pub(crate) fn promote_derived(world: &mut PartialWorld) -> EngineResult<()> {
    let model = Arc::clone(world.model());
    for var in world.derived_variables() {
        if !model.has_distribution(&var) {
            continue;
        }
        if let Some(value) = world.value(&var).cloned() {
            world.set_value(var, value)?;
        }
    }
    Ok(())
}
