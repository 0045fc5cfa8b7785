use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use rand::RngCore;

use super::builtins::{
    Bernoulli, Beta, Categorical, Constant, Dirichlet, Gamma, Gaussian, Poisson, UniformChoice,
    UniformInt, UniformReal,
};
use super::{DistribError, DistribSpec, Distribution};
use crate::value::Value;

/// Constructor stored in the registry.
pub type DistributionFactory = fn() -> Box<dyn Distribution>;

/// Name-keyed table of distribution implementations.
///
/// Populated once (usually via [`DistributionRegistry::builtin`]) and
/// read-only afterwards.
#[derive(Default)]
pub struct DistributionRegistry {
    entries: BTreeMap<String, Box<dyn Distribution>>,
}

impl DistributionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every builtin distribution.
    #[must_use]
    pub fn with_builtins() -> Self {
        let builtins: [DistributionFactory; 11] = [
            || Box::new(Bernoulli),
            || Box::new(Beta),
            || Box::new(Categorical),
            || Box::new(Constant),
            || Box::new(Dirichlet),
            || Box::new(Gamma),
            || Box::new(Gaussian),
            || Box::new(Poisson),
            || Box::new(UniformChoice),
            || Box::new(UniformInt),
            || Box::new(UniformReal),
        ];
        let mut registry = Self::new();
        for factory in builtins {
            let dist = factory();
            registry.entries.insert(dist.name().to_string(), dist);
        }
        registry
    }

    /// Process-wide shared builtin registry, built on first use.
    #[must_use]
    pub fn builtin() -> Arc<Self> {
        static BUILTIN: OnceLock<Arc<DistributionRegistry>> = OnceLock::new();
        Arc::clone(BUILTIN.get_or_init(|| Arc::new(Self::with_builtins())))
    }

    /// Registers a distribution under `name`.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateDistribution` if the name is taken.
    pub fn register(&mut self, name: impl Into<String>, factory: DistributionFactory) -> Result<(), DistribError> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(DistribError::DuplicateDistribution { name });
        }
        self.entries.insert(name, factory());
        Ok(())
    }

    /// Looks a distribution up by name.
    ///
    /// # Errors
    ///
    /// Returns `UnknownDistribution` if nothing is registered under `name`.
    pub fn get(&self, name: &str) -> Result<&dyn Distribution, DistribError> {
        self.entries
            .get(name)
            .map(AsRef::as_ref)
            .ok_or_else(|| DistribError::UnknownDistribution { name: name.to_string() })
    }

    /// Returns true if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Samples from `spec`.
    ///
    /// # Errors
    ///
    /// Unknown distribution or invalid parameters.
    pub fn sample(&self, spec: &DistribSpec, rng: &mut dyn RngCore) -> Result<Value, DistribError> {
        self.get(spec.name())?.sample(spec.params(), rng)
    }

    /// Log density of `value` under `spec`.
    ///
    /// # Errors
    ///
    /// Unknown distribution, invalid parameters, or a value of the wrong kind.
    pub fn log_density(&self, spec: &DistribSpec, value: &Value) -> Result<f64, DistribError> {
        self.get(spec.name())?.log_density(spec.params(), value)
    }

    /// Enumerable support of `spec`, if any.
    ///
    /// # Errors
    ///
    /// Unknown distribution or invalid parameters.
    pub fn support(&self, spec: &DistribSpec, resolution: usize) -> Result<Option<Vec<Value>>, DistribError> {
        self.get(spec.name())?.support(spec.params(), resolution)
    }
}

impl fmt::Debug for DistributionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributionRegistry")
            .field("names", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[derive(Debug)]
    struct AlwaysSeven;

    impl Distribution for AlwaysSeven {
        fn name(&self) -> &'static str {
            "AlwaysSeven"
        }

        fn sample(&self, _params: &[Value], _rng: &mut dyn RngCore) -> Result<Value, DistribError> {
            Ok(Value::Int(7))
        }

        fn log_density(&self, _params: &[Value], value: &Value) -> Result<f64, DistribError> {
            Ok(if *value == Value::Int(7) { 0.0 } else { f64::NEG_INFINITY })
        }
    }

    #[test]
    fn builtin_registry_is_shared() {
        let a = DistributionRegistry::builtin();
        let b = DistributionRegistry::builtin();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.names().count(), 11);
        assert!(a.contains("Dirichlet"));
    }

    #[test]
    fn unknown_name_is_an_error() {
        let reg = DistributionRegistry::with_builtins();
        let spec = DistribSpec::new("Zipf", [1.0]);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(matches!(
            reg.sample(&spec, &mut rng),
            Err(DistribError::UnknownDistribution { .. })
        ));
    }

    #[test]
    fn register_rejects_duplicates() {
        let mut reg = DistributionRegistry::new();
        reg.register("AlwaysSeven", || Box::new(AlwaysSeven)).unwrap();
        let err = reg.register("AlwaysSeven", || Box::new(AlwaysSeven)).unwrap_err();
        assert!(matches!(err, DistribError::DuplicateDistribution { .. }));

        let spec = DistribSpec::new("AlwaysSeven", Vec::<Value>::new());
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(reg.sample(&spec, &mut rng).unwrap(), Value::Int(7));
        assert!(reg.support(&spec, 4).unwrap().is_none());
    }

    #[test]
    fn delegates_density() {
        let reg = DistributionRegistry::with_builtins();
        let spec = DistribSpec::new("Bernoulli", [0.25]);
        let lp = reg.log_density(&spec, &Value::Bool(false)).unwrap();
        assert!((lp - 0.75f64.ln()).abs() < 1e-12);
    }
}
