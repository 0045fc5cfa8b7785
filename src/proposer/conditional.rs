//! Exact conditional samplers for single-variable Gibbs moves.

use std::sync::Arc;

use rand::{Rng, RngCore};

use crate::error::EngineResult;
use crate::value::Value;
use crate::variable::Variable;
use crate::world::{children_of, distribution_of, log_density_given, WorldDiff, WorldView};

/// A candidate value with its unnormalized log weight.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedValue {
    /// Candidate value.
    pub value: Value,
    /// Unnormalized log conditional weight.
    pub log_weight: f64,
}

/// A finite weighted sequence of candidate values, consumed by one draw.
#[derive(Debug, Clone)]
pub struct WeightedValues {
    items: Vec<WeightedValue>,
    max_log_weight: f64,
}

impl WeightedValues {
    /// Builds the sequence; `None` if it is empty or every weight is zero.
    #[must_use]
    pub fn from_log_weights(items: Vec<WeightedValue>) -> Option<Self> {
        let max_log_weight = items
            .iter()
            .map(|w| w.log_weight)
            .filter(|w| !w.is_nan())
            .fold(f64::NEG_INFINITY, f64::max);
        if max_log_weight == f64::NEG_INFINITY {
            return None;
        }
        Some(Self { items, max_log_weight })
    }

    /// Number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if there are no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn weight(&self, w: &WeightedValue) -> f64 {
        if w.log_weight.is_nan() {
            0.0
        } else {
            (w.log_weight - self.max_log_weight).exp()
        }
    }

    /// Normalized probability of `value`.
    #[must_use]
    pub fn probability(&self, value: &Value) -> f64 {
        let total: f64 = self.items.iter().map(|w| self.weight(w)).sum();
        let mass: f64 = self
            .items
            .iter()
            .filter(|w| &w.value == value)
            .map(|w| self.weight(w))
            .sum();
        mass / total
    }

    /// Draws one value proportionally to its weight.
    pub fn draw(self, rng: &mut dyn RngCore) -> Value {
        let weights: Vec<f64> = self.items.iter().map(|w| self.weight(w)).collect();
        let total: f64 = weights.iter().sum();
        let mut u = rng.random::<f64>() * total;
        let mut chosen = None;
        for (i, w) in weights.iter().enumerate() {
            if *w > 0.0 {
                chosen = Some(i);
                if u < *w {
                    break;
                }
                u -= w;
            }
        }
        // `chosen` is the last positive-weight item if rounding ran past the end.
        let i = chosen.unwrap_or(0);
        self.items.into_iter().nth(i).map_or(Value::Null, |w| w.value)
    }
}

/// Builds the exact conditional distribution of a variable given the rest
/// of the world.
pub trait ConditionalSampler {
    /// Returns `None` when no exact conditional can be constructed for `var`.
    ///
    /// # Errors
    ///
    /// Evaluation errors raised while scoring candidates.
    fn sampler(&self, var: &Variable, world: &mut WorldDiff, rng: &mut dyn RngCore)
        -> EngineResult<Option<WeightedValues>>;
}

/// Enumerates the (finite, truncated or discretized) support of the
/// variable's distribution and weights each candidate by its prior density
/// times the densities of the variable's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruncatedGridSampler {
    resolution: usize,
}

impl TruncatedGridSampler {
    /// Sampler with `resolution` grid points per continuous variable.
    #[must_use]
    pub const fn new(resolution: usize) -> Self {
        Self { resolution }
    }

    /// Grid points per continuous variable.
    #[must_use]
    pub const fn resolution(&self) -> usize {
        self.resolution
    }
}

impl Default for TruncatedGridSampler {
    fn default() -> Self {
        Self::new(32)
    }
}

impl ConditionalSampler for TruncatedGridSampler {
    fn sampler(
        &self,
        var: &Variable,
        world: &mut WorldDiff,
        rng: &mut dyn RngCore,
    ) -> EngineResult<Option<WeightedValues>> {
        if var.is_count_variable() {
            return Ok(None);
        }
        let model = Arc::clone(world.model());
        let Some(spec) = distribution_of(world, var, rng)? else {
            return Ok(None);
        };
        let Some(support) = model.registry().support(&spec, self.resolution)? else {
            return Ok(None);
        };
        let children = children_of(world, var, rng)?;

        let mut items = Vec::with_capacity(support.len());
        for candidate in support {
            let mut log_weight = model.registry().log_density(&spec, &candidate)?;
            for child in &children {
                if log_weight == f64::NEG_INFINITY {
                    break;
                }
                log_weight += log_density_given(world, child, var, &candidate, rng)?;
            }
            items.push(WeightedValue {
                value: candidate,
                log_weight,
            });
        }
        Ok(WeightedValues::from_log_weights(items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn wv(value: i64, log_weight: f64) -> WeightedValue {
        WeightedValue {
            value: Value::Int(value),
            log_weight,
        }
    }

    #[test]
    fn all_zero_weights_yield_none() {
        assert!(WeightedValues::from_log_weights(vec![]).is_none());
        assert!(WeightedValues::from_log_weights(vec![wv(0, f64::NEG_INFINITY)]).is_none());
    }

    #[test]
    fn draw_never_picks_zero_weight() {
        let mut rng = StdRng::seed_from_u64(4);
        for _ in 0..200 {
            let values =
                WeightedValues::from_log_weights(vec![wv(0, f64::NEG_INFINITY), wv(1, 0.0), wv(2, f64::NEG_INFINITY)])
                    .unwrap();
            assert_eq!(values.draw(&mut rng), Value::Int(1));
        }
    }

    #[test]
    fn probabilities_are_normalized() {
        let values = WeightedValues::from_log_weights(vec![wv(0, 1.0f64.ln()), wv(1, 3.0f64.ln())]).unwrap();
        assert!((values.probability(&Value::Int(1)) - 0.75).abs() < 1e-12);
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn draw_frequencies_follow_weights() {
        let mut rng = StdRng::seed_from_u64(8);
        let mut ones = 0;
        let n = 10_000;
        for _ in 0..n {
            let values = WeightedValues::from_log_weights(vec![wv(0, 1.0f64.ln()), wv(1, 3.0f64.ln())]).unwrap();
            if values.draw(&mut rng) == Value::Int(1) {
                ones += 1;
            }
        }
        let freq = f64::from(ones) / f64::from(n);
        assert!((freq - 0.75).abs() < 0.02, "freq={freq}");
    }
}
