//! Distribution library boundary.
//!
//! The engine only ever refers to a distribution by name and parameter
//! vector (`DistribSpec`). Implementations live behind the `Distribution`
//! trait and are looked up in a `DistributionRegistry` populated once.

mod builtins;
mod registry;
mod special;

pub use builtins::{
    Bernoulli, Beta, Categorical, Constant, Dirichlet, Gamma, Gaussian, Poisson, UniformChoice,
    UniformInt, UniformReal,
};
pub use registry::{DistributionFactory, DistributionRegistry};
pub use special::{ln_beta, ln_gamma};

use std::fmt;

use rand::RngCore;
use thiserror::Error;

use crate::value::Value;

/// Errors raised by distributions and the registry.
#[derive(Debug, Error)]
pub enum DistribError {
    #[error("Unknown distribution '{name}'")]
    UnknownDistribution {
        name: String,
    },

    #[error("Distribution '{name}' already registered")]
    DuplicateDistribution {
        name: String,
    },

    #[error("Invalid parameters for {name}: {reason}")]
    InvalidParameters {
        name: String,
        reason: String,
    },

    #[error("Value {value} is outside the domain of {name}")]
    InvalidValue {
        name: String,
        value: String,
    },
}

impl DistribError {
    pub(crate) fn params(name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidParameters {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn value(name: &str, value: &Value) -> Self {
        Self::InvalidValue {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// A conditional probability distribution over `Value`s.
///
/// Implementations are stateless; all randomness comes from the caller's RNG.
pub trait Distribution: Send + Sync {
    /// Registry name.
    fn name(&self) -> &'static str;

    /// Draws one value.
    fn sample(&self, params: &[Value], rng: &mut dyn RngCore) -> Result<Value, DistribError>;

    /// Log density (or log mass) of `value`. Values outside the support
    /// yield `f64::NEG_INFINITY`; values of the wrong kind are an error.
    fn log_density(&self, params: &[Value], value: &Value) -> Result<f64, DistribError>;

    /// Finite (possibly truncated or discretized) support for exact
    /// conditional enumeration, with `resolution` grid points for continuous
    /// distributions. `None` when no such enumeration exists.
    fn support(&self, _params: &[Value], _resolution: usize) -> Result<Option<Vec<Value>>, DistribError> {
        Ok(None)
    }
}

/// Name plus parameter vector identifying a concrete distribution.
///
/// # Examples
///
/// ```
/// use openworld::distrib::DistribSpec;
///
/// let spec = DistribSpec::new("Beta", [2.0, 2.0]);
/// assert_eq!(spec.name(), "Beta");
/// assert_eq!(spec.params().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct DistribSpec {
    name: String,
    params: Vec<Value>,
}

impl DistribSpec {
    /// Creates a spec from any values convertible to `Value`.
    #[must_use]
    pub fn new<V: Into<Value>>(name: impl Into<String>, params: impl IntoIterator<Item = V>) -> Self {
        Self {
            name: name.into(),
            params: params.into_iter().map(Into::into).collect(),
        }
    }

    /// Registry name of the distribution.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter vector.
    #[must_use]
    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

impl fmt::Display for DistribSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, p) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{p}")?;
        }
        write!(f, ")")
    }
}
