//! Conjugate posterior updates.
//!
//! Beta-Bernoulli: with prior Beta(α, β) and k successes among n Bernoulli
//! indicators, the posterior is Beta(α + k, β + n − k).
//! Dirichlet-Categorical: with base measure a and per-bin counts c, the
//! posterior is Dirichlet(a + c).

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::distrib::DistribSpec;
use crate::error::{EngineResult, EvalError, ValidationError};
use crate::value::Value;
use crate::variable::Variable;
use crate::world::WorldView;

/// Parameters of a Beta distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaParams {
    /// Pseudo-count of successes.
    pub alpha: f64,
    /// Pseudo-count of failures.
    pub beta: f64,
}

impl BetaParams {
    /// # Errors
    ///
    /// `NonPositive` unless both parameters are finite and positive.
    pub fn new(alpha: f64, beta: f64) -> Result<Self, ValidationError> {
        for (field, value) in [("alpha", alpha), ("beta", beta)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(ValidationError::NonPositive {
                    field: field.to_string(),
                    value,
                });
            }
        }
        Ok(Self { alpha, beta })
    }

    /// Mean α / (α + β).
    #[must_use]
    pub fn mean(&self) -> f64 {
        self.alpha / (self.alpha + self.beta)
    }

    /// The distribution as a registry spec.
    #[must_use]
    pub fn spec(&self) -> DistribSpec {
        DistribSpec::new("Beta", [self.alpha, self.beta])
    }
}

/// Beta posterior after observing `k` successes in `n` trials.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn beta_posterior(prior: BetaParams, k: usize, n: usize) -> BetaParams {
    BetaParams {
        alpha: prior.alpha + k as f64,
        beta: prior.beta + n.saturating_sub(k) as f64,
    }
}

/// Number of indicators that are true (instantiating them if needed).
///
/// # Errors
///
/// `TypeMismatch` if an indicator holds a non-boolean value.
pub fn count_true<W: WorldView + ?Sized>(
    world: &mut W,
    indicators: &[Variable],
    rng: &mut dyn RngCore,
) -> EngineResult<usize> {
    let mut k = 0;
    for var in indicators {
        match world.get_value(var, rng)? {
            Value::Bool(true) => k += 1,
            Value::Bool(false) => {}
            other => {
                return Err(EvalError::TypeMismatch {
                    var: var.to_string(),
                    expected: "Boolean".to_string(),
                    actual: other.describe_type(),
                }
                .into())
            }
        }
    }
    Ok(k)
}

/// Sets `target` to a draw from the Beta posterior given `indicators`
/// (n = `indicators.len()`) and returns the drawn value. Does not save.
///
/// # Errors
///
/// Evaluation errors on the indicators or the assignment.
pub fn resample_beta<W: WorldView + ?Sized>(
    world: &mut W,
    target: &Variable,
    prior: BetaParams,
    indicators: &[Variable],
    rng: &mut dyn RngCore,
) -> EngineResult<f64> {
    let k = count_true(world, indicators, rng)?;
    let posterior = beta_posterior(prior, k, indicators.len());
    let x = match world.model().registry().sample(&posterior.spec(), rng)? {
        Value::Real(x) => x,
        other => {
            return Err(EvalError::TypeMismatch {
                var: target.to_string(),
                expected: "Real".to_string(),
                actual: other.describe_type(),
            }
            .into())
        }
    };
    world.set_value(target.clone(), Value::Real(x))?;
    Ok(x)
}

/// Dirichlet posterior concentrations: `base + counts`, elementwise.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn dirichlet_posterior(base: &[f64], counts: &[usize]) -> Vec<f64> {
    base.iter()
        .enumerate()
        .map(|(i, a)| a + counts.get(i).copied().unwrap_or(0) as f64)
        .collect()
}

/// Histogram of integer assignments over `0..bins`. Values outside the
/// range are ignored.
///
/// # Errors
///
/// `TypeMismatch` if an assignment holds a non-integer value.
pub fn bin_counts<W: WorldView + ?Sized>(
    world: &mut W,
    assignments: &[Variable],
    bins: usize,
    rng: &mut dyn RngCore,
) -> EngineResult<Vec<usize>> {
    let mut counts = vec![0; bins];
    for var in assignments {
        let value = world.get_value(var, rng)?;
        let Some(i) = value.as_int() else {
            return Err(EvalError::TypeMismatch {
                var: var.to_string(),
                expected: "Integer".to_string(),
                actual: value.describe_type(),
            }
            .into());
        };
        if let Some(slot) = usize::try_from(i).ok().and_then(|i| counts.get_mut(i)) {
            *slot += 1;
        }
    }
    Ok(counts)
}

/// Sets `target` to a draw from Dirichlet(base + counts of `assignments`)
/// and returns it. Does not save.
///
/// # Errors
///
/// Evaluation errors on the assignments or the assignment of `target`.
pub fn resample_dirichlet<W: WorldView + ?Sized>(
    world: &mut W,
    target: &Variable,
    base: &[f64],
    assignments: &[Variable],
    rng: &mut dyn RngCore,
) -> EngineResult<Vec<f64>> {
    let counts = bin_counts(world, assignments, base.len(), rng)?;
    let posterior = dirichlet_posterior(base, &counts);
    let spec = DistribSpec::new("Dirichlet", [Value::Vector(posterior)]);
    let drawn = world.model().registry().sample(&spec, rng)?;
    let theta = drawn.as_vector().map(<[f64]>::to_vec).unwrap_or_default();
    world.set_value(target.clone(), drawn)?;
    Ok(theta)
}
