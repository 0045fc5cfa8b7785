//! Random functions and origin patterns declared by a model.

use std::fmt;
use std::sync::Arc;

use super::dependency::DependencyModel;
use crate::object::TypeName;
use crate::value::{Value, ValueType};
use crate::variable::{CountVar, FuncRef, PopId, Variable};

/// A random function: signature plus (optional) dependency model.
///
/// A function without a dependency model can only be given values by
/// evidence or `set_value`.
#[derive(Clone)]
pub struct RandomFunction {
    func: FuncRef,
    arg_types: Vec<ValueType>,
    ret: ValueType,
    pub(crate) dependency: Option<Arc<dyn DependencyModel>>,
}

impl RandomFunction {
    pub(crate) fn new(
        func: FuncRef,
        arg_types: Vec<ValueType>,
        ret: ValueType,
        dependency: Option<Arc<dyn DependencyModel>>,
    ) -> Self {
        Self {
            func,
            arg_types,
            ret,
            dependency,
        }
    }

    /// Handle of the function.
    #[must_use]
    pub const fn func(&self) -> &FuncRef {
        &self.func
    }

    /// Declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.func.name()
    }

    /// Argument types, in order.
    #[must_use]
    pub fn arg_types(&self) -> &[ValueType] {
        &self.arg_types
    }

    /// Return type.
    #[must_use]
    pub const fn ret_type(&self) -> &ValueType {
        &self.ret
    }

    /// Dependency model, if any.
    #[must_use]
    pub const fn dependency(&self) -> Option<&Arc<dyn DependencyModel>> {
        self.dependency.as_ref()
    }

    /// The variable for this function applied to `args`.
    #[must_use]
    pub fn var(&self, args: impl IntoIterator<Item = Value>) -> Variable {
        self.func.var(args)
    }

    /// Signature rendered as `Name(T1, T2)`.
    #[must_use]
    pub fn signature(&self) -> String {
        signature(self.func.name(), &self.arg_types)
    }
}

impl fmt::Debug for RandomFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RandomFunction")
            .field("signature", &self.signature())
            .field("ret", &self.ret)
            .field("has_dependency", &self.dependency.is_some())
            .finish()
    }
}

/// An origin pattern (POP): objects of `ty` generated per tuple of origin
/// objects, with a count distribution.
#[derive(Clone)]
pub struct OriginPattern {
    id: PopId,
    ty: TypeName,
    origin_types: Vec<ValueType>,
    pub(crate) dependency: Option<Arc<dyn DependencyModel>>,
}

impl OriginPattern {
    pub(crate) fn new(
        id: PopId,
        ty: TypeName,
        origin_types: Vec<ValueType>,
        dependency: Option<Arc<dyn DependencyModel>>,
    ) -> Self {
        Self {
            id,
            ty,
            origin_types,
            dependency,
        }
    }

    /// Pattern id.
    #[must_use]
    pub const fn id(&self) -> PopId {
        self.id
    }

    /// Type of the generated objects.
    #[must_use]
    pub const fn ty(&self) -> &TypeName {
        &self.ty
    }

    /// Types of the origin arguments, in order.
    #[must_use]
    pub fn origin_types(&self) -> &[ValueType] {
        &self.origin_types
    }

    /// Dependency model, if any.
    #[must_use]
    pub const fn dependency(&self) -> Option<&Arc<dyn DependencyModel>> {
        self.dependency.as_ref()
    }

    /// The count variable of this pattern for one origin tuple.
    #[must_use]
    pub fn count_var(&self, args: impl IntoIterator<Item = Value>) -> CountVar {
        CountVar::new(self.id, self.ty.clone(), args)
    }

    /// Signature rendered as `#Type(T1, T2)`.
    #[must_use]
    pub fn signature(&self) -> String {
        format!("#{}", signature(self.ty.as_str(), &self.origin_types))
    }
}

impl fmt::Debug for OriginPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OriginPattern")
            .field("id", &self.id)
            .field("signature", &self.signature())
            .field("has_dependency", &self.dependency.is_some())
            .finish()
    }
}

pub(crate) fn signature(name: &str, arg_types: &[ValueType]) -> String {
    let args: Vec<String> = arg_types.iter().map(ToString::to_string).collect();
    format!("{name}({})", args.join(", "))
}
