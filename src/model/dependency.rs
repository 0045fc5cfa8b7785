//! Dependency models: how a variable's distribution is computed from its
//! parents.
//!
//! A dependency model never sees the world directly. It pulls parent values
//! through a [`ParentReader`], so the parent set of a binding is exactly the
//! set of variables it reads. This is what allows contingent dependencies
//! such as `TriggerID(s) ~ Categorical(Theta(Rel(SourceFact(s))))`.

use std::fmt;
use std::sync::Arc;

use crate::distrib::DistribSpec;
use crate::error::{EngineResult, EvalError};
use crate::object::ObjectRef;
use crate::value::Value;
use crate::variable::{CountVar, Variable};

/// Read access to parent variables during evaluation.
///
/// Implementations may instantiate parents on demand (recursing into the
/// evaluator), substitute hypothetical values, or record what was read.
pub trait ParentReader {
    /// Value of a parent variable.
    ///
    /// # Errors
    ///
    /// Propagates evaluation errors from instantiating the parent.
    fn read(&mut self, var: &Variable) -> EngineResult<Value>;

    /// Objects generated for a count variable (instantiating it if needed).
    ///
    /// # Errors
    ///
    /// Propagates evaluation errors from instantiating the count variable.
    fn satisfiers(&mut self, var: &CountVar) -> EngineResult<Arc<[ObjectRef]>>;

    /// Reads a real-valued parent.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` if the parent holds anything but a real.
    fn read_real(&mut self, var: &Variable) -> EngineResult<f64> {
        match self.read(var)? {
            Value::Real(x) => Ok(x),
            other => Err(mismatch(var, "real", &other)),
        }
    }

    /// Reads an object-valued parent; `None` for null.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` if the parent holds a non-object value.
    fn read_object(&mut self, var: &Variable) -> EngineResult<Option<ObjectRef>> {
        match self.read(var)? {
            Value::Object(o) => Ok(Some(o)),
            Value::Null => Ok(None),
            other => Err(mismatch(var, "object", &other)),
        }
    }
}

fn mismatch(var: &Variable, expected: &str, actual: &Value) -> crate::error::EngineError {
    EvalError::TypeMismatch {
        var: var.to_string(),
        expected: expected.to_string(),
        actual: actual.describe_type(),
    }
    .into()
}

/// Computes the distribution of a variable given its arguments and parents.
pub trait DependencyModel: Send + Sync {
    /// Returns the distribution for the binding `args`.
    ///
    /// # Errors
    ///
    /// Propagates parent evaluation errors.
    fn distribution(&self, args: &[Value], parents: &mut dyn ParentReader) -> EngineResult<DistribSpec>;
}

/// Dependency model backed by a closure.
pub struct FnDependency<F> {
    f: F,
}

impl<F> FnDependency<F>
where
    F: Fn(&[Value], &mut dyn ParentReader) -> EngineResult<DistribSpec> + Send + Sync,
{
    /// Wraps `f` as a dependency model.
    pub const fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> DependencyModel for FnDependency<F>
where
    F: Fn(&[Value], &mut dyn ParentReader) -> EngineResult<DistribSpec> + Send + Sync,
{
    fn distribution(&self, args: &[Value], parents: &mut dyn ParentReader) -> EngineResult<DistribSpec> {
        (self.f)(args, parents)
    }
}

impl<F> fmt::Debug for FnDependency<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FnDependency")
    }
}

/// Parentless distribution.
#[derive(Debug, Clone)]
struct Prior(DistribSpec);

impl DependencyModel for Prior {
    fn distribution(&self, _args: &[Value], _parents: &mut dyn ParentReader) -> EngineResult<DistribSpec> {
        Ok(self.0.clone())
    }
}

/// Constructors for shared dependency models.
pub struct Dependency;

impl Dependency {
    /// Wraps a closure.
    pub fn from_fn<F>(f: F) -> Arc<dyn DependencyModel>
    where
        F: Fn(&[Value], &mut dyn ParentReader) -> EngineResult<DistribSpec> + Send + Sync + 'static,
    {
        Arc::new(FnDependency::new(f))
    }

    /// Fixed distribution with no parents.
    #[must_use]
    pub fn prior(spec: DistribSpec) -> Arc<dyn DependencyModel> {
        Arc::new(Prior(spec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::variable::FuncRef;

    struct Fixed(Value);

    impl ParentReader for Fixed {
        fn read(&mut self, _var: &Variable) -> EngineResult<Value> {
            Ok(self.0.clone())
        }

        fn satisfiers(&mut self, _var: &CountVar) -> EngineResult<Arc<[ObjectRef]>> {
            Ok(Arc::from(Vec::new()))
        }
    }

    #[test]
    fn closure_reads_parent() {
        let p = FuncRef::new(0, "P");
        let dep = Dependency::from_fn(move |_args, parents| {
            let x = parents.read_real(&p.var([]))?;
            Ok(DistribSpec::new("Bernoulli", [x]))
        });
        let spec = dep.distribution(&[], &mut Fixed(Value::Real(0.3))).unwrap();
        assert_eq!(spec.params(), &[Value::Real(0.3)]);
    }

    #[test]
    fn read_real_rejects_other_kinds() {
        let p = FuncRef::new(0, "P").var([]);
        let err = Fixed(Value::Bool(true)).read_real(&p).unwrap_err();
        assert!(err.is_type_mismatch());
    }

    #[test]
    fn read_object_maps_null() {
        let p = FuncRef::new(0, "P").var([]);
        assert!(Fixed(Value::Null).read_object(&p).unwrap().is_none());
    }

    #[test]
    fn prior_ignores_parents() {
        let dep = Dependency::prior(DistribSpec::new("Beta", [2.0, 2.0]));
        let spec = dep.distribution(&[Value::Int(1)], &mut Fixed(Value::Null)).unwrap();
        assert_eq!(spec.name(), "Beta");
    }
}
