//! Builtin distributions.
//!
//! Sampling for the continuous families delegates to `rand_distr`; densities
//! are computed in log space here.

use rand::{Rng, RngCore};
use rand_distr::Distribution as _;

use super::special::{ln_beta, ln_gamma};
use super::{DistribError, Distribution};
use crate::value::Value;

fn real(name: &str, params: &[Value], i: usize) -> Result<f64, DistribError> {
    params
        .get(i)
        .and_then(Value::as_real)
        .filter(|x| x.is_finite())
        .ok_or_else(|| DistribError::params(name, format!("parameter {i} must be a finite real")))
}

fn int(name: &str, params: &[Value], i: usize) -> Result<i64, DistribError> {
    params
        .get(i)
        .and_then(Value::as_int)
        .ok_or_else(|| DistribError::params(name, format!("parameter {i} must be an integer")))
}

fn positive(name: &str, params: &[Value], i: usize) -> Result<f64, DistribError> {
    let x = real(name, params, i)?;
    if x > 0.0 {
        Ok(x)
    } else {
        Err(DistribError::params(name, format!("parameter {i} must be > 0, got {x}")))
    }
}

/// A vector parameter: either one `Vector` value or a list of reals.
fn vector(name: &str, params: &[Value]) -> Result<Vec<f64>, DistribError> {
    let out = match params {
        [Value::Vector(v)] => v.clone(),
        _ => params
            .iter()
            .map(|p| p.as_real())
            .collect::<Option<Vec<f64>>>()
            .ok_or_else(|| DistribError::params(name, "expected a vector of reals"))?,
    };
    if out.is_empty() {
        return Err(DistribError::params(name, "vector parameter is empty"));
    }
    if out.iter().any(|x| !x.is_finite() || *x < 0.0) {
        return Err(DistribError::params(name, "vector entries must be finite and non-negative"));
    }
    Ok(out)
}

fn read_real(name: &str, value: &Value) -> Result<f64, DistribError> {
    match value {
        Value::Real(x) => Ok(*x),
        other => Err(DistribError::value(name, other)),
    }
}

fn read_int(name: &str, value: &Value) -> Result<i64, DistribError> {
    value.as_int().ok_or_else(|| DistribError::value(name, value))
}

/// `resolution` midpoints of [lo, hi].
#[allow(clippy::cast_precision_loss)]
fn grid(lo: f64, hi: f64, resolution: usize) -> Vec<Value> {
    let n = resolution.max(1);
    let step = (hi - lo) / n as f64;
    (0..n).map(|i| Value::Real(lo + (i as f64 + 0.5) * step)).collect()
}

/// Bernoulli(p) over booleans.
#[derive(Debug, Default)]
pub struct Bernoulli;

impl Bernoulli {
    fn p(params: &[Value]) -> Result<f64, DistribError> {
        let p = real("Bernoulli", params, 0)?;
        if (0.0..=1.0).contains(&p) {
            Ok(p)
        } else {
            Err(DistribError::params("Bernoulli", format!("p must lie in [0, 1], got {p}")))
        }
    }
}

impl Distribution for Bernoulli {
    fn name(&self) -> &'static str {
        "Bernoulli"
    }

    fn sample(&self, params: &[Value], rng: &mut dyn RngCore) -> Result<Value, DistribError> {
        let p = Self::p(params)?;
        Ok(Value::Bool(rng.random::<f64>() < p))
    }

    fn log_density(&self, params: &[Value], value: &Value) -> Result<f64, DistribError> {
        let p = Self::p(params)?;
        match value {
            Value::Bool(true) => Ok(p.ln()),
            Value::Bool(false) => Ok((1.0 - p).ln()),
            other => Err(DistribError::value(self.name(), other)),
        }
    }

    fn support(&self, params: &[Value], _resolution: usize) -> Result<Option<Vec<Value>>, DistribError> {
        Self::p(params)?;
        Ok(Some(vec![Value::Bool(true), Value::Bool(false)]))
    }
}

/// Beta(alpha, beta) on (0, 1).
#[derive(Debug, Default)]
pub struct Beta;

impl Distribution for Beta {
    fn name(&self) -> &'static str {
        "Beta"
    }

    fn sample(&self, params: &[Value], rng: &mut dyn RngCore) -> Result<Value, DistribError> {
        let a = positive(self.name(), params, 0)?;
        let b = positive(self.name(), params, 1)?;
        let dist = rand_distr::Beta::new(a, b).map_err(|e| DistribError::params(self.name(), e.to_string()))?;
        let x: f64 = dist.sample(rng);
        Ok(Value::Real(x))
    }

    fn log_density(&self, params: &[Value], value: &Value) -> Result<f64, DistribError> {
        let a = positive(self.name(), params, 0)?;
        let b = positive(self.name(), params, 1)?;
        let x = read_real(self.name(), value)?;
        if x <= 0.0 || x >= 1.0 {
            return Ok(f64::NEG_INFINITY);
        }
        Ok((a - 1.0) * x.ln() + (b - 1.0) * (1.0 - x).ln() - ln_beta(a, b))
    }

    fn support(&self, params: &[Value], resolution: usize) -> Result<Option<Vec<Value>>, DistribError> {
        positive(self.name(), params, 0)?;
        positive(self.name(), params, 1)?;
        Ok(Some(grid(0.0, 1.0, resolution)))
    }
}

/// Categorical over indices `0..k`, with unnormalized weights.
#[derive(Debug, Default)]
pub struct Categorical;

impl Categorical {
    fn weights(params: &[Value]) -> Result<(Vec<f64>, f64), DistribError> {
        let w = vector("Categorical", params)?;
        let total: f64 = w.iter().sum();
        if total <= 0.0 {
            return Err(DistribError::params("Categorical", "weights sum to zero"));
        }
        Ok((w, total))
    }
}

impl Distribution for Categorical {
    fn name(&self) -> &'static str {
        "Categorical"
    }

    fn sample(&self, params: &[Value], rng: &mut dyn RngCore) -> Result<Value, DistribError> {
        let (w, total) = Self::weights(params)?;
        let mut u = rng.random::<f64>() * total;
        for (i, wi) in w.iter().enumerate() {
            if u < *wi {
                return Ok(Value::from(i));
            }
            u -= wi;
        }
        // Rounding can leave a sliver past the last bin.
        let last = w.iter().rposition(|x| *x > 0.0).unwrap_or(w.len() - 1);
        Ok(Value::from(last))
    }

    fn log_density(&self, params: &[Value], value: &Value) -> Result<f64, DistribError> {
        let (w, total) = Self::weights(params)?;
        let i = read_int(self.name(), value)?;
        let p = usize::try_from(i).ok().and_then(|i| w.get(i)).map_or(0.0, |wi| wi / total);
        Ok(p.ln())
    }

    fn support(&self, params: &[Value], _resolution: usize) -> Result<Option<Vec<Value>>, DistribError> {
        let (w, _) = Self::weights(params)?;
        Ok(Some((0..w.len()).map(Value::from).collect()))
    }
}

/// Dirichlet(alpha) over the probability simplex.
#[derive(Debug, Default)]
pub struct Dirichlet;

impl Dirichlet {
    pub(crate) fn concentrations(params: &[Value]) -> Result<Vec<f64>, DistribError> {
        let alpha = vector("Dirichlet", params)?;
        if alpha.iter().any(|a| *a <= 0.0) {
            return Err(DistribError::params("Dirichlet", "concentrations must be > 0"));
        }
        Ok(alpha)
    }
}

impl Distribution for Dirichlet {
    fn name(&self) -> &'static str {
        "Dirichlet"
    }

    fn sample(&self, params: &[Value], rng: &mut dyn RngCore) -> Result<Value, DistribError> {
        let alpha = Self::concentrations(params)?;
        let mut draws = Vec::with_capacity(alpha.len());
        for a in &alpha {
            let g = rand_distr::Gamma::new(*a, 1.0).map_err(|e| DistribError::params(self.name(), e.to_string()))?;
            let x: f64 = g.sample(rng);
            draws.push(x);
        }
        let total: f64 = draws.iter().sum();
        if total > 0.0 {
            for x in &mut draws {
                *x /= total;
            }
        } else {
            // All gamma draws underflowed (tiny concentrations): put the mass on one bin.
            let i = rng.random_range(0..draws.len());
            draws.iter_mut().for_each(|x| *x = 0.0);
            draws[i] = 1.0;
        }
        Ok(Value::Vector(draws))
    }

    #[allow(clippy::float_cmp)]
    fn log_density(&self, params: &[Value], value: &Value) -> Result<f64, DistribError> {
        let alpha = Self::concentrations(params)?;
        let x = value.as_vector().ok_or_else(|| DistribError::value(self.name(), value))?;
        if x.len() != alpha.len() {
            return Err(DistribError::value(self.name(), value));
        }
        let sum: f64 = x.iter().sum();
        if x.iter().any(|xi| *xi < 0.0) || (sum - 1.0).abs() > 1e-6 {
            return Ok(f64::NEG_INFINITY);
        }
        let a0: f64 = alpha.iter().sum();
        let norm = ln_gamma(a0) - alpha.iter().map(|a| ln_gamma(*a)).sum::<f64>();
        let mut body = 0.0;
        for (a, xi) in alpha.iter().zip(x) {
            // (a - 1) ln x at x = 0 is 0 for a = 1, +inf below, -inf above.
            if *a == 1.0 {
                continue;
            }
            if *xi == 0.0 {
                return Ok(if *a < 1.0 { f64::INFINITY } else { f64::NEG_INFINITY });
            }
            body += (a - 1.0) * xi.ln();
        }
        Ok(norm + body)
    }
}

/// Gaussian(mean, variance).
#[derive(Debug, Default)]
pub struct Gaussian;

impl Gaussian {
    fn params(params: &[Value]) -> Result<(f64, f64), DistribError> {
        let mean = real("Gaussian", params, 0)?;
        let var = positive("Gaussian", params, 1)?;
        Ok((mean, var))
    }
}

impl Distribution for Gaussian {
    fn name(&self) -> &'static str {
        "Gaussian"
    }

    fn sample(&self, params: &[Value], rng: &mut dyn RngCore) -> Result<Value, DistribError> {
        let (mean, var) = Self::params(params)?;
        let dist = rand_distr::Normal::new(mean, var.sqrt()).map_err(|e| DistribError::params(self.name(), e.to_string()))?;
        let x: f64 = dist.sample(rng);
        Ok(Value::Real(x))
    }

    fn log_density(&self, params: &[Value], value: &Value) -> Result<f64, DistribError> {
        let (mean, var) = Self::params(params)?;
        let x = read_real(self.name(), value)?;
        let d = x - mean;
        Ok(-0.5 * (2.0 * std::f64::consts::PI * var).ln() - d * d / (2.0 * var))
    }

    fn support(&self, params: &[Value], resolution: usize) -> Result<Option<Vec<Value>>, DistribError> {
        let (mean, var) = Self::params(params)?;
        let sd = var.sqrt();
        Ok(Some(grid(mean - 4.0 * sd, mean + 4.0 * sd, resolution)))
    }
}

/// Gamma(shape, rate).
#[derive(Debug, Default)]
pub struct Gamma;

impl Distribution for Gamma {
    fn name(&self) -> &'static str {
        "Gamma"
    }

    fn sample(&self, params: &[Value], rng: &mut dyn RngCore) -> Result<Value, DistribError> {
        let shape = positive(self.name(), params, 0)?;
        let rate = positive(self.name(), params, 1)?;
        let dist = rand_distr::Gamma::new(shape, 1.0 / rate).map_err(|e| DistribError::params(self.name(), e.to_string()))?;
        let x: f64 = dist.sample(rng);
        Ok(Value::Real(x))
    }

    fn log_density(&self, params: &[Value], value: &Value) -> Result<f64, DistribError> {
        let shape = positive(self.name(), params, 0)?;
        let rate = positive(self.name(), params, 1)?;
        let x = read_real(self.name(), value)?;
        if x <= 0.0 {
            return Ok(f64::NEG_INFINITY);
        }
        Ok(shape * rate.ln() - ln_gamma(shape) + (shape - 1.0) * x.ln() - rate * x)
    }
}

/// Poisson(lambda) over natural numbers.
#[derive(Debug, Default)]
pub struct Poisson;

impl Distribution for Poisson {
    fn name(&self) -> &'static str {
        "Poisson"
    }

    #[allow(clippy::cast_possible_truncation)]
    fn sample(&self, params: &[Value], rng: &mut dyn RngCore) -> Result<Value, DistribError> {
        let lambda = positive(self.name(), params, 0)?;
        let dist = rand_distr::Poisson::new(lambda).map_err(|e| DistribError::params(self.name(), e.to_string()))?;
        let x: f64 = dist.sample(rng);
        Ok(Value::Int(x as i64))
    }

    #[allow(clippy::cast_precision_loss)]
    fn log_density(&self, params: &[Value], value: &Value) -> Result<f64, DistribError> {
        let lambda = positive(self.name(), params, 0)?;
        let k = read_int(self.name(), value)?;
        if k < 0 {
            return Ok(f64::NEG_INFINITY);
        }
        let k = k as f64;
        Ok(k * lambda.ln() - lambda - ln_gamma(k + 1.0))
    }

    /// Truncated at mean + 6 standard deviations.
    #[allow(clippy::cast_possible_truncation)]
    fn support(&self, params: &[Value], _resolution: usize) -> Result<Option<Vec<Value>>, DistribError> {
        let lambda = positive(self.name(), params, 0)?;
        let upper = (lambda + 6.0 * lambda.sqrt()).ceil().max(1.0) as i64;
        Ok(Some((0..=upper).map(Value::Int).collect()))
    }
}

/// Uniform over the integers `lo..=hi`.
#[derive(Debug, Default)]
pub struct UniformInt;

impl UniformInt {
    /// Widest range enumerated as an exact support.
    pub const MAX_SUPPORT: i64 = 100_000;

    fn bounds(params: &[Value]) -> Result<(i64, i64), DistribError> {
        let lo = int("UniformInt", params, 0)?;
        let hi = int("UniformInt", params, 1)?;
        if lo > hi {
            return Err(DistribError::params("UniformInt", format!("empty range {lo}..={hi}")));
        }
        Ok((lo, hi))
    }
}

impl Distribution for UniformInt {
    fn name(&self) -> &'static str {
        "UniformInt"
    }

    fn sample(&self, params: &[Value], rng: &mut dyn RngCore) -> Result<Value, DistribError> {
        let (lo, hi) = Self::bounds(params)?;
        Ok(Value::Int(rng.random_range(lo..=hi)))
    }

    #[allow(clippy::cast_precision_loss)]
    fn log_density(&self, params: &[Value], value: &Value) -> Result<f64, DistribError> {
        let (lo, hi) = Self::bounds(params)?;
        let k = read_int(self.name(), value)?;
        if (lo..=hi).contains(&k) {
            Ok(-((hi - lo + 1) as f64).ln())
        } else {
            Ok(f64::NEG_INFINITY)
        }
    }

    fn support(&self, params: &[Value], _resolution: usize) -> Result<Option<Vec<Value>>, DistribError> {
        let (lo, hi) = Self::bounds(params)?;
        if hi.saturating_sub(lo) > Self::MAX_SUPPORT {
            return Ok(None);
        }
        Ok(Some((lo..=hi).map(Value::Int).collect()))
    }
}

/// Uniform over the reals in [lo, hi).
#[derive(Debug, Default)]
pub struct UniformReal;

impl UniformReal {
    fn bounds(params: &[Value]) -> Result<(f64, f64), DistribError> {
        let lo = real("UniformReal", params, 0)?;
        let hi = real("UniformReal", params, 1)?;
        if lo >= hi {
            return Err(DistribError::params("UniformReal", format!("empty interval [{lo}, {hi})")));
        }
        Ok((lo, hi))
    }
}

impl Distribution for UniformReal {
    fn name(&self) -> &'static str {
        "UniformReal"
    }

    fn sample(&self, params: &[Value], rng: &mut dyn RngCore) -> Result<Value, DistribError> {
        let (lo, hi) = Self::bounds(params)?;
        Ok(Value::Real(rng.random_range(lo..hi)))
    }

    fn log_density(&self, params: &[Value], value: &Value) -> Result<f64, DistribError> {
        let (lo, hi) = Self::bounds(params)?;
        let x = read_real(self.name(), value)?;
        if (lo..hi).contains(&x) {
            Ok(-(hi - lo).ln())
        } else {
            Ok(f64::NEG_INFINITY)
        }
    }

    fn support(&self, params: &[Value], resolution: usize) -> Result<Option<Vec<Value>>, DistribError> {
        let (lo, hi) = Self::bounds(params)?;
        Ok(Some(grid(lo, hi, resolution)))
    }
}

/// Uniform choice among the parameter values (objects or otherwise).
#[derive(Debug, Default)]
pub struct UniformChoice;

impl Distribution for UniformChoice {
    fn name(&self) -> &'static str {
        "UniformChoice"
    }

    fn sample(&self, params: &[Value], rng: &mut dyn RngCore) -> Result<Value, DistribError> {
        if params.is_empty() {
            return Err(DistribError::params(self.name(), "no values to choose from"));
        }
        Ok(params[rng.random_range(0..params.len())].clone())
    }

    #[allow(clippy::cast_precision_loss)]
    fn log_density(&self, params: &[Value], value: &Value) -> Result<f64, DistribError> {
        if params.is_empty() {
            return Err(DistribError::params(self.name(), "no values to choose from"));
        }
        let hits = params.iter().filter(|p| *p == value).count();
        Ok((hits as f64 / params.len() as f64).ln())
    }

    fn support(&self, params: &[Value], _resolution: usize) -> Result<Option<Vec<Value>>, DistribError> {
        if params.is_empty() {
            return Err(DistribError::params(self.name(), "no values to choose from"));
        }
        let mut values = params.to_vec();
        values.sort();
        values.dedup();
        Ok(Some(values))
    }
}

/// Point mass on its single parameter.
#[derive(Debug, Default)]
pub struct Constant;

impl Constant {
    fn point(params: &[Value]) -> Result<&Value, DistribError> {
        match params {
            [v] => Ok(v),
            _ => Err(DistribError::params("Constant", "expected exactly one parameter")),
        }
    }
}

impl Distribution for Constant {
    fn name(&self) -> &'static str {
        "Constant"
    }

    fn sample(&self, params: &[Value], _rng: &mut dyn RngCore) -> Result<Value, DistribError> {
        Self::point(params).cloned()
    }

    fn log_density(&self, params: &[Value], value: &Value) -> Result<f64, DistribError> {
        let point = Self::point(params)?;
        Ok(if point == value { 0.0 } else { f64::NEG_INFINITY })
    }

    fn support(&self, params: &[Value], _resolution: usize) -> Result<Option<Vec<Value>>, DistribError> {
        Ok(Some(vec![Self::point(params)?.clone()]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn reals(xs: &[f64]) -> Vec<Value> {
        xs.iter().copied().map(Value::Real).collect()
    }

    #[test]
    fn bernoulli_density_and_support() {
        let p = reals(&[0.7]);
        let d = Bernoulli;
        assert!((d.log_density(&p, &Value::Bool(true)).unwrap() - 0.7f64.ln()).abs() < 1e-12);
        assert_eq!(d.support(&p, 8).unwrap().unwrap().len(), 2);
        assert!(d.log_density(&p, &Value::Int(1)).is_err());
        assert!(d.sample(&reals(&[1.5]), &mut StdRng::seed_from_u64(1)).is_err());
    }

    #[test]
    fn beta_density_integrates_to_one_on_grid() {
        let p = reals(&[2.0, 5.0]);
        let d = Beta;
        let support = d.support(&p, 2000).unwrap().unwrap();
        let mass: f64 = support
            .iter()
            .map(|x| d.log_density(&p, x).unwrap().exp() / 2000.0)
            .sum();
        assert!((mass - 1.0).abs() < 1e-3, "mass={mass}");
    }

    #[test]
    fn beta_sample_mean() {
        let mut rng = StdRng::seed_from_u64(7);
        let p = reals(&[9.0, 5.0]);
        let n = 20_000;
        let mut sum = 0.0;
        for _ in 0..n {
            sum += Beta.sample(&p, &mut rng).unwrap().as_real().unwrap();
        }
        let mean = sum / f64::from(n);
        assert!((mean - 9.0 / 14.0).abs() < 0.01, "mean={mean}");
    }

    #[test]
    fn categorical_uses_vector_weights() {
        let p = vec![Value::Vector(vec![1.0, 3.0])];
        let d = Categorical;
        assert!((d.log_density(&p, &Value::Int(1)).unwrap() - 0.75f64.ln()).abs() < 1e-12);
        assert_eq!(d.log_density(&p, &Value::Int(5)).unwrap(), f64::NEG_INFINITY);
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let k = d.sample(&p, &mut rng).unwrap().as_int().unwrap();
            assert!((0..2).contains(&k));
        }
    }

    #[test]
    fn dirichlet_samples_lie_on_simplex() {
        let p = vec![Value::Vector(vec![0.5, 1.0, 2.0])];
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let v = Dirichlet.sample(&p, &mut rng).unwrap();
            let x = v.as_vector().unwrap();
            assert_eq!(x.len(), 3);
            assert!((x.iter().sum::<f64>() - 1.0).abs() < 1e-9);
            assert!(Dirichlet.log_density(&p, &v).unwrap().is_finite());
        }
        assert!(Dirichlet.support(&p, 4).unwrap().is_none());
    }

    #[test]
    fn dirichlet_density_at_the_simplex_boundary() {
        let corner = Value::Vector(vec![1.0, 0.0, 0.0]);
        let flat = Dirichlet.log_density(&reals(&[1.0, 1.0, 1.0]), &corner).unwrap();
        assert!((flat - 2.0f64.ln()).abs() < 1e-9);
        let peaked = Dirichlet.log_density(&reals(&[1.0, 3.0, 1.0]), &corner).unwrap();
        assert_eq!(peaked, f64::NEG_INFINITY);
        let sparse = Dirichlet.log_density(&reals(&[1.0, 0.5, 1.0]), &corner).unwrap();
        assert_eq!(sparse, f64::INFINITY);
    }

    #[test]
    fn gaussian_grid_is_centered() {
        let p = reals(&[10.0, 4.0]);
        let support = Gaussian.support(&p, 4).unwrap().unwrap();
        let xs: Vec<f64> = support.iter().map(|v| v.as_real().unwrap()).collect();
        assert_eq!(xs, vec![3.0, 7.0, 11.0, 15.0]);
    }

    #[test]
    fn poisson_support_is_truncated() {
        let support = Poisson.support(&reals(&[4.0]), 0).unwrap().unwrap();
        assert_eq!(support.first(), Some(&Value::Int(0)));
        assert_eq!(support.last(), Some(&Value::Int(16)));
    }

    #[test]
    fn uniform_choice_counts_duplicates() {
        let p = vec![Value::Int(1), Value::Int(1), Value::Int(2)];
        let d = UniformChoice;
        assert!((d.log_density(&p, &Value::Int(1)).unwrap() - (2.0f64 / 3.0).ln()).abs() < 1e-12);
        assert_eq!(d.support(&p, 0).unwrap().unwrap(), vec![Value::Int(1), Value::Int(2)]);
    }

    #[test]
    fn constant_is_a_point_mass() {
        let p = vec![Value::Bool(true)];
        assert_eq!(Constant.log_density(&p, &Value::Bool(true)).unwrap(), 0.0);
        assert_eq!(Constant.log_density(&p, &Value::Bool(false)).unwrap(), f64::NEG_INFINITY);
    }
}
