//! Values a variable can take.
//!
//! Values double as argument tuples of variable identities, so unlike a plain
//! numeric enum they need total `Eq`, `Ord` and `Hash`. Reals compare by bit
//! pattern (`f64::total_cmp`), which keeps identity structural and
//! iteration order deterministic.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::object::{GeneratedObject, GuaranteedObject, ObjectRef, TypeName};

/// Possible values of a random variable.
///
/// # Examples
///
/// ```
/// use openworld::Value;
///
/// let holds = Value::Bool(true);
/// let weight = Value::Real(0.25);
///
/// assert_eq!(holds.as_bool(), Some(true));
/// assert_eq!(weight.as_real(), Some(0.25));
/// assert_ne!(Value::Real(0.0), Value::Real(-0.0));
/// ```
#[derive(Debug, Clone)]
pub enum Value {
    /// Boolean.
    Bool(bool),
    /// Integer; counts and indices.
    Int(i64),
    /// Real number, ordered by `total_cmp`.
    Real(f64),
    /// Real vector, e.g. a point on the simplex.
    Vector(Vec<f64>),
    /// Guaranteed or generated object.
    Object(ObjectRef),
    /// The absent value.
    Null,
}

impl Value {
    /// Returns true for booleans.
    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }

    /// Returns true for integers.
    pub const fn is_int(&self) -> bool {
        matches!(self, Self::Int(_))
    }

    /// Returns true for reals.
    pub const fn is_real(&self) -> bool {
        matches!(self, Self::Real(_))
    }

    /// Returns true for object references.
    pub const fn is_object(&self) -> bool {
        matches!(self, Self::Object(_))
    }

    /// Returns true for null.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The boolean, if this is one.
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// The integer, if this is one. Reals do not narrow.
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Reads a real; integers widen.
    #[allow(clippy::cast_precision_loss)]
    pub fn as_real(&self) -> Option<f64> {
        match self {
            Self::Real(v) => Some(*v),
            Self::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// The real vector, if this is one.
    pub fn as_vector(&self) -> Option<&[f64]> {
        match self {
            Self::Vector(v) => Some(v),
            _ => None,
        }
    }

    /// The object reference, if this is one.
    pub const fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Returns a human-readable type name.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Vector(_) => "vector",
            Self::Object(_) => "object",
            Self::Null => "null",
        }
    }

    /// Describes the value's type, including the object type when known.
    #[must_use]
    pub fn describe_type(&self) -> String {
        match self {
            Self::Object(o) => o.ty().to_string(),
            other => other.type_name().to_string(),
        }
    }

    /// Returns true if this value may be stored in a variable of type `ty`.
    ///
    /// No coercion: an `Int` does not conform to `Real`.
    #[must_use]
    pub fn conforms_to(&self, ty: &ValueType) -> bool {
        match (ty, self) {
            (ValueType::Bool, Self::Bool(_))
            | (ValueType::Int, Self::Int(_))
            | (ValueType::Real, Self::Real(_))
            | (ValueType::Vector, Self::Vector(_))
            | (ValueType::Object(_), Self::Null) => true,
            (ValueType::NaturalNum, Self::Int(n)) => *n >= 0,
            (ValueType::Object(expected), Self::Object(o)) => o.ty() == expected,
            _ => false,
        }
    }

    const fn rank(&self) -> u8 {
        match self {
            Self::Null => 0,
            Self::Bool(_) => 1,
            Self::Int(_) => 2,
            Self::Real(_) => 3,
            Self::Vector(_) => 4,
            Self::Object(_) => 5,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Self::Null
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Value {}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Int(a), Self::Int(b)) => a.cmp(b),
            (Self::Real(a), Self::Real(b)) => a.total_cmp(b),
            (Self::Vector(a), Self::Vector(b)) => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| x.total_cmp(y))
                .find(|o| *o != Ordering::Equal)
                .unwrap_or_else(|| a.len().cmp(&b.len())),
            (Self::Object(a), Self::Object(b)) => a.cmp(b),
            (Self::Null, Self::Null) => Ordering::Equal,
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Self::Bool(v) => v.hash(state),
            Self::Int(v) => v.hash(state),
            Self::Real(v) => v.to_bits().hash(state),
            Self::Vector(v) => {
                v.len().hash(state);
                for x in v {
                    x.to_bits().hash(state);
                }
            }
            Self::Object(o) => o.hash(state),
            Self::Null => {}
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Vector(v) => {
                write!(f, "[")?;
                for (i, x) in v.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{x}")?;
                }
                write!(f, "]")
            }
            Self::Object(o) => write!(f, "{o}"),
            Self::Null => write!(f, "null"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<usize> for Value {
    #[allow(clippy::cast_possible_wrap)]
    fn from(v: usize) -> Self {
        Self::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<Vec<f64>> for Value {
    fn from(v: Vec<f64>) -> Self {
        Self::Vector(v)
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Self::Object(v)
    }
}

impl From<GuaranteedObject> for Value {
    fn from(v: GuaranteedObject) -> Self {
        Self::Object(ObjectRef::Guaranteed(v))
    }
}

impl From<GeneratedObject> for Value {
    fn from(v: GeneratedObject) -> Self {
        Self::Object(ObjectRef::Generated(v))
    }
}

/// Declared type of a function's return value or argument.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "type")]
pub enum ValueType {
    Bool,
    Int,
    /// Non-negative integer; the type of every count variable.
    NaturalNum,
    Real,
    Vector,
    /// An object of the named type (or null).
    Object(TypeName),
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "Boolean"),
            Self::Int => write!(f, "Integer"),
            Self::NaturalNum => write!(f, "NaturalNum"),
            Self::Real => write!(f, "Real"),
            Self::Vector => write!(f, "RealVector"),
            Self::Object(ty) => write!(f, "{ty}"),
        }
    }
}

impl From<TypeName> for ValueType {
    fn from(ty: TypeName) -> Self {
        Self::Object(ty)
    }
}

impl From<&TypeName> for ValueType {
    fn from(ty: &TypeName) -> Self {
        Self::Object(ty.clone())
    }
}
