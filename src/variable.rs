//! Variable identity.
//!
//! A variable is either a function application (`Holds(f)`) or a count
//! variable (`#Fact(r, e1, e2)`: how many objects an origin pattern generates
//! for a parent tuple). Identity is structural and immutable.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::object::TypeName;
use crate::value::Value;

/// Identifier of an origin pattern (POP) within a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PopId(u32);

impl PopId {
    pub(crate) const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Index into the model's pattern table.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pop{}", self.0)
    }
}

/// Reference to a random function of a model.
///
/// Equality, ordering and hashing use the function id only; the name is kept
/// for display.
#[derive(Debug, Clone)]
pub struct FuncRef {
    id: u32,
    name: Arc<str>,
}

impl FuncRef {
    pub(crate) fn new(id: u32, name: &str) -> Self {
        Self {
            id,
            name: Arc::from(name),
        }
    }

    /// Index into the model's function table.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.id as usize
    }

    /// Declared function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds the variable for this function applied to `args`.
    #[must_use]
    pub fn var(&self, args: impl IntoIterator<Item = Value>) -> Variable {
        Variable::FuncApp(FuncAppVar::new(self.clone(), args))
    }
}

impl PartialEq for FuncRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FuncRef {}

impl PartialOrd for FuncRef {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FuncRef {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Hash for FuncRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for FuncRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, args: &[Value]) -> fmt::Result {
    write!(f, "(")?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{arg}")?;
    }
    write!(f, ")")
}

/// Application of a random function to an argument tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FuncAppVar {
    func: FuncRef,
    args: Arc<[Value]>,
}

impl FuncAppVar {
    /// Creates a function application variable.
    #[must_use]
    pub fn new(func: FuncRef, args: impl IntoIterator<Item = Value>) -> Self {
        Self {
            func,
            args: args.into_iter().collect(),
        }
    }

    /// The applied function.
    #[must_use]
    pub const fn func(&self) -> &FuncRef {
        &self.func
    }

    /// Arguments, in order.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }
}

impl fmt::Display for FuncAppVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.func)?;
        write_args(f, &self.args)
    }
}

/// Number of objects an origin pattern generates for a parent tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CountVar {
    pop: PopId,
    ty: TypeName,
    args: Arc<[Value]>,
}

impl CountVar {
    /// Creates a count variable for pattern `pop` generating objects of `ty`.
    #[must_use]
    pub fn new(pop: PopId, ty: TypeName, args: impl IntoIterator<Item = Value>) -> Self {
        Self {
            pop,
            ty,
            args: args.into_iter().collect(),
        }
    }

    /// Origin pattern counted.
    #[must_use]
    pub const fn pop(&self) -> PopId {
        self.pop
    }

    /// Type of the objects this variable counts.
    #[must_use]
    pub const fn ty(&self) -> &TypeName {
        &self.ty
    }

    /// Arguments, in order.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }
}

impl fmt::Display for CountVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.ty)?;
        write_args(f, &self.args)
    }
}

/// Identity of a random quantity in the unrolled model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Variable {
    FuncApp(FuncAppVar),
    Count(CountVar),
}

impl Variable {
    /// Returns true for number variables.
    #[must_use]
    pub const fn is_count_variable(&self) -> bool {
        matches!(self, Self::Count(_))
    }

    /// Argument tuple of the variable.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        match self {
            Self::FuncApp(v) => v.args(),
            Self::Count(v) => v.args(),
        }
    }

    /// The number variable, if this is one.
    #[must_use]
    pub const fn as_count(&self) -> Option<&CountVar> {
        match self {
            Self::Count(v) => Some(v),
            Self::FuncApp(_) => None,
        }
    }

    /// The function application, if this is one.
    #[must_use]
    pub const fn as_func_app(&self) -> Option<&FuncAppVar> {
        match self {
            Self::FuncApp(v) => Some(v),
            Self::Count(_) => None,
        }
    }

    /// Returns true if this applies `func`.
    #[must_use]
    pub fn applies(&self, func: &FuncRef) -> bool {
        matches!(self, Self::FuncApp(v) if v.func() == func)
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FuncApp(v) => write!(f, "{v}"),
            Self::Count(v) => write!(f, "{v}"),
        }
    }
}

impl From<FuncAppVar> for Variable {
    fn from(v: FuncAppVar) -> Self {
        Self::FuncApp(v)
    }
}

impl From<CountVar> for Variable {
    fn from(v: CountVar) -> Self {
        Self::Count(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_ignores_display_name() {
        let a = FuncRef::new(3, "Holds");
        let b = FuncRef::new(3, "Alias");
        assert_eq!(a.var([Value::Int(1)]), b.var([Value::Int(1)]));
        assert_ne!(a.var([Value::Int(1)]), a.var([Value::Int(2)]));
    }

    #[test]
    fn count_and_func_app_never_collide() {
        let func = FuncRef::new(0, "N").var([]);
        let count: Variable = CountVar::new(PopId::new(0), TypeName::new("N"), []).into();
        assert_ne!(func, count);
        assert!(count.is_count_variable());
        assert!(!func.is_count_variable());
    }

    #[test]
    fn display_formats() {
        let f = FuncRef::new(0, "Sparsity").var([Value::Int(4)]);
        assert_eq!(f.to_string(), "Sparsity(4)");
        let c: Variable = CountVar::new(PopId::new(1), TypeName::new("Fact"), [Value::Int(1), Value::Int(2)]).into();
        assert_eq!(c.to_string(), "#Fact(1, 2)");
    }
}
