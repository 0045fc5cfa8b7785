//! Immutable model description.
//!
//! A `Model` is what the engine consumes in place of a parsed and analyzed
//! program: declared types with their guaranteed objects, origin patterns,
//! and random functions with their dependency models. It is built once via
//! [`ModelBuilder`] and shared read-only (`Arc<Model>`) by every world.

mod dependency;
mod function;

pub use dependency::{Dependency, DependencyModel, FnDependency, ParentReader};
pub use function::{OriginPattern, RandomFunction};

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::distrib::DistributionRegistry;
use crate::error::{EngineError, EngineResult, EvalError, ModelError};
use crate::object::{GuaranteedObject, TypeName};
use crate::value::{Value, ValueType};
use crate::variable::{FuncRef, PopId, Variable};

static NATURAL_NUM: ValueType = ValueType::NaturalNum;

#[derive(Debug, Clone, Default)]
struct TypeInfo {
    guaranteed: Vec<GuaranteedObject>,
    patterns: Vec<PopId>,
}

/// A fully built model.
#[derive(Debug)]
pub struct Model {
    types: BTreeMap<TypeName, TypeInfo>,
    symbols: BTreeMap<String, GuaranteedObject>,
    functions: Vec<RandomFunction>,
    function_index: BTreeMap<(String, Vec<ValueType>), FuncRef>,
    patterns: Vec<OriginPattern>,
    registry: Arc<DistributionRegistry>,
}

impl Model {
    /// Starts building a model backed by the builtin distribution registry.
    #[must_use]
    pub fn builder() -> ModelBuilder {
        ModelBuilder::new()
    }

    /// Declared types in sorted order.
    pub fn types(&self) -> impl Iterator<Item = &TypeName> {
        self.types.keys()
    }

    /// Returns true if `ty` is declared.
    #[must_use]
    pub fn has_type(&self, ty: &TypeName) -> bool {
        self.types.contains_key(ty)
    }

    /// Guaranteed objects of `ty` in declaration order (empty if unknown).
    #[must_use]
    pub fn guaranteed_objects_of(&self, ty: &TypeName) -> &[GuaranteedObject] {
        self.types.get(ty).map_or(&[], |info| info.guaranteed.as_slice())
    }

    /// Guaranteed objects of `ty` as values.
    #[must_use]
    pub fn guaranteed_values_of(&self, ty: &TypeName) -> Vec<Value> {
        self.guaranteed_objects_of(ty).iter().cloned().map(Value::from).collect()
    }

    /// Looks a guaranteed object up by its declared name.
    #[must_use]
    pub fn guaranteed_object(&self, name: &str) -> Option<&GuaranteedObject> {
        self.symbols.get(name)
    }

    /// Origin patterns generating objects of `ty`.
    pub fn origin_patterns_of<'a>(&'a self, ty: &TypeName) -> impl Iterator<Item = &'a OriginPattern> + 'a {
        self.types
            .get(ty)
            .into_iter()
            .flat_map(|info| info.patterns.iter())
            .filter_map(|id| self.patterns.get(id.index()))
    }

    /// The origin pattern of `ty` taking `arity` origin arguments.
    ///
    /// # Errors
    ///
    /// `MissingOriginPattern` if there is none.
    pub fn origin_pattern_for(&self, ty: &TypeName, arity: usize) -> EngineResult<&OriginPattern> {
        self.origin_patterns_of(ty)
            .find(|p| p.origin_types().len() == arity)
            .ok_or_else(|| {
                ModelError::MissingOriginPattern {
                    ty: ty.to_string(),
                    arity,
                }
                .into()
            })
    }

    /// Origin pattern by id.
    #[must_use]
    pub fn origin_pattern(&self, id: PopId) -> Option<&OriginPattern> {
        self.patterns.get(id.index())
    }

    /// Resolves a function by name and argument types.
    ///
    /// # Errors
    ///
    /// `UnknownFunction` if no declared signature matches.
    pub fn lookup_function(&self, name: &str, arg_types: &[ValueType]) -> EngineResult<FuncRef> {
        self.function_index
            .get(&(name.to_string(), arg_types.to_vec()))
            .cloned()
            .ok_or_else(|| {
                ModelError::UnknownFunction {
                    signature: function::signature(name, arg_types),
                }
                .into()
            })
    }

    /// Declaration of `func`.
    #[must_use]
    pub fn function(&self, func: &FuncRef) -> Option<&RandomFunction> {
        self.functions.get(func.index())
    }

    /// Every declared random function.
    pub fn functions(&self) -> impl Iterator<Item = &RandomFunction> {
        self.functions.iter()
    }

    /// Dependency model for `var`, if the model defines one.
    #[must_use]
    pub fn dependency_of(&self, var: &Variable) -> Option<&Arc<dyn DependencyModel>> {
        match var {
            Variable::FuncApp(v) => self.function(v.func())?.dependency(),
            Variable::Count(v) => self.origin_pattern(v.pop())?.dependency(),
        }
    }

    /// Returns true if `var` is governed by a distribution.
    #[must_use]
    pub fn has_distribution(&self, var: &Variable) -> bool {
        self.dependency_of(var).is_some()
    }

    /// Declared value type; `NaturalNum` for every count variable.
    #[must_use]
    pub fn value_type_of(&self, var: &Variable) -> Option<&ValueType> {
        match var {
            Variable::FuncApp(v) => self.function(v.func()).map(RandomFunction::ret_type),
            Variable::Count(v) => self.origin_pattern(v.pop()).map(|_| &NATURAL_NUM),
        }
    }

    /// Checks that `var` belongs to this model and its arguments conform to
    /// the declared argument types.
    ///
    /// # Errors
    ///
    /// `UnknownVariable` for foreign functions/patterns or a wrong arity,
    /// `TypeMismatch` for a non-conforming argument.
    pub fn check_variable(&self, var: &Variable) -> EngineResult<()> {
        let arg_types = match var {
            Variable::FuncApp(v) => self
                .function(v.func())
                .filter(|f| f.name() == v.func().name())
                .map(RandomFunction::arg_types),
            Variable::Count(v) => self
                .origin_pattern(v.pop())
                .filter(|p| p.ty() == v.ty())
                .map(OriginPattern::origin_types),
        };
        let unknown = || -> EngineError {
            EvalError::UnknownVariable { var: var.to_string() }.into()
        };
        let arg_types = arg_types.ok_or_else(unknown)?;
        if arg_types.len() != var.args().len() {
            return Err(unknown());
        }
        for (ty, arg) in arg_types.iter().zip(var.args()) {
            if !arg.conforms_to(ty) {
                return Err(EvalError::TypeMismatch {
                    var: var.to_string(),
                    expected: ty.to_string(),
                    actual: arg.describe_type(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Distribution registry used to sample and score variables.
    #[must_use]
    pub fn registry(&self) -> &DistributionRegistry {
        &self.registry
    }
}

/// Incremental model construction with duplicate detection.
///
/// # Examples
///
/// ```
/// use openworld::distrib::DistribSpec;
/// use openworld::model::{Dependency, ModelBuilder};
/// use openworld::ValueType;
///
/// let mut builder = ModelBuilder::new();
/// let coin = builder.add_type("Coin").unwrap();
/// builder.add_guaranteed_objects(&coin, ["c1"]).unwrap();
/// let bias = builder
///     .add_random_function(
///         "Bias",
///         vec![ValueType::from(&coin)],
///         ValueType::Real,
///         Some(Dependency::prior(DistribSpec::new("Beta", [2.0, 2.0]))),
///     )
///     .unwrap();
/// let model = builder.build();
/// assert_eq!(model.lookup_function("Bias", &[ValueType::from(&coin)]).unwrap(), bias);
/// ```
#[derive(Debug)]
pub struct ModelBuilder {
    types: BTreeMap<TypeName, TypeInfo>,
    symbols: BTreeMap<String, GuaranteedObject>,
    functions: Vec<RandomFunction>,
    function_index: BTreeMap<(String, Vec<ValueType>), FuncRef>,
    patterns: Vec<OriginPattern>,
    registry: Arc<DistributionRegistry>,
}

impl Default for ModelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelBuilder {
    /// Empty builder over the builtin distributions.
    #[must_use]
    pub fn new() -> Self {
        Self {
            types: BTreeMap::new(),
            symbols: BTreeMap::new(),
            functions: Vec::new(),
            function_index: BTreeMap::new(),
            patterns: Vec::new(),
            registry: DistributionRegistry::builtin(),
        }
    }

    /// Replaces the distribution registry.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<DistributionRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Declares a type.
    ///
    /// # Errors
    ///
    /// `DuplicateType` if already declared.
    pub fn add_type(&mut self, name: &str) -> EngineResult<TypeName> {
        let ty = TypeName::new(name);
        if self.types.contains_key(&ty) {
            return Err(ModelError::DuplicateType { name: name.to_string() }.into());
        }
        self.types.insert(ty.clone(), TypeInfo::default());
        Ok(ty)
    }

    fn type_info_mut(&mut self, ty: &TypeName) -> EngineResult<&mut TypeInfo> {
        self.types
            .get_mut(ty)
            .ok_or_else(|| ModelError::UnknownType { name: ty.to_string() }.into())
    }

    fn require_type(&self, ty: &ValueType) -> EngineResult<()> {
        match ty {
            ValueType::Object(name) if !self.types.contains_key(name) => {
                Err(ModelError::UnknownType { name: name.to_string() }.into())
            }
            _ => Ok(()),
        }
    }

    /// Declares distinct guaranteed objects of `ty`.
    ///
    /// # Errors
    ///
    /// `UnknownType`, or `DuplicateSymbol` if a name is already used by any type.
    pub fn add_guaranteed_objects<I, S>(&mut self, ty: &TypeName, names: I) -> EngineResult<Vec<GuaranteedObject>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut added = Vec::new();
        for name in names {
            let name = name.as_ref();
            if self.symbols.contains_key(name) {
                return Err(ModelError::DuplicateSymbol { name: name.to_string() }.into());
            }
            let info = self.type_info_mut(ty)?;
            let obj = GuaranteedObject::new(ty.clone(), name, info.guaranteed.len());
            info.guaranteed.push(obj.clone());
            self.symbols.insert(name.to_string(), obj.clone());
            added.push(obj);
        }
        Ok(added)
    }

    /// Declares `n` guaranteed objects named `base[0]` .. `base[n-1]`.
    ///
    /// # Errors
    ///
    /// Same as [`ModelBuilder::add_guaranteed_objects`].
    pub fn add_guaranteed_array(&mut self, ty: &TypeName, base: &str, n: usize) -> EngineResult<Vec<GuaranteedObject>> {
        self.add_guaranteed_objects(ty, (0..n).map(|i| format!("{base}[{i}]")))
    }

    /// Declares an origin pattern generating objects of `ty` from tuples of
    /// `origin_types`.
    ///
    /// # Errors
    ///
    /// `UnknownType` for undeclared types, `DuplicateFunction` if `ty`
    /// already has a pattern with the same origin types.
    pub fn add_origin_pattern(
        &mut self,
        ty: &TypeName,
        origin_types: &[TypeName],
        dependency: Option<Arc<dyn DependencyModel>>,
    ) -> EngineResult<PopId> {
        let origin_types: Vec<ValueType> = origin_types.iter().map(ValueType::from).collect();
        for t in &origin_types {
            self.require_type(t)?;
        }
        let patterns = &self.patterns;
        let existing = self.types.get(ty).map_or(false, |info| {
            info.patterns
                .iter()
                .filter_map(|id| patterns.get(id.index()))
                .any(|p| p.origin_types() == origin_types.as_slice())
        });
        if existing {
            return Err(ModelError::DuplicateFunction {
                signature: format!("#{}", function::signature(ty.as_str(), &origin_types)),
            }
            .into());
        }
        let id = PopId::new(next_id(self.patterns.len())?);
        self.type_info_mut(ty)?.patterns.push(id);
        self.patterns.push(OriginPattern::new(id, ty.clone(), origin_types, dependency));
        Ok(id)
    }

    /// Declares a random function.
    ///
    /// # Errors
    ///
    /// `UnknownType` for undeclared types, `DuplicateFunction` if the same
    /// name and argument types are already declared.
    pub fn add_random_function(
        &mut self,
        name: &str,
        arg_types: Vec<ValueType>,
        ret: ValueType,
        dependency: Option<Arc<dyn DependencyModel>>,
    ) -> EngineResult<FuncRef> {
        for t in arg_types.iter().chain(std::iter::once(&ret)) {
            self.require_type(t)?;
        }
        let key = (name.to_string(), arg_types);
        if self.function_index.contains_key(&key) {
            return Err(ModelError::DuplicateFunction {
                signature: function::signature(name, &key.1),
            }
            .into());
        }
        let func = FuncRef::new(next_id(self.functions.len())?, name);
        self.functions
            .push(RandomFunction::new(func.clone(), key.1.clone(), ret, dependency));
        self.function_index.insert(key, func.clone());
        Ok(func)
    }

    /// Attaches (or replaces) the dependency model of a declared function.
    /// Needed when dependencies refer to each other.
    ///
    /// # Errors
    ///
    /// `UnknownFunction` if `func` was not declared by this builder.
    pub fn set_dependency(&mut self, func: &FuncRef, dependency: Arc<dyn DependencyModel>) -> EngineResult<()> {
        let f = self
            .functions
            .get_mut(func.index())
            .filter(|f| f.func().name() == func.name())
            .ok_or_else(|| ModelError::UnknownFunction {
                signature: func.name().to_string(),
            })?;
        f.dependency = Some(dependency);
        Ok(())
    }

    /// Attaches (or replaces) the count distribution of an origin pattern.
    ///
    /// # Errors
    ///
    /// `UnknownFunction` if `pop` was not declared by this builder.
    pub fn set_pattern_dependency(&mut self, pop: PopId, dependency: Arc<dyn DependencyModel>) -> EngineResult<()> {
        let p = self
            .patterns
            .get_mut(pop.index())
            .ok_or_else(|| ModelError::UnknownFunction { signature: pop.to_string() })?;
        p.dependency = Some(dependency);
        Ok(())
    }

    /// Finishes the model.
    #[must_use]
    pub fn build(self) -> Arc<Model> {
        Arc::new(Model {
            types: self.types,
            symbols: self.symbols,
            functions: self.functions,
            function_index: self.function_index,
            patterns: self.patterns,
            registry: self.registry,
        })
    }
}

fn next_id(len: usize) -> EngineResult<u32> {
    u32::try_from(len).map_err(|_| EngineError::internal("model table exceeds u32 ids"))
}
