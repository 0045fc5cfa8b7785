//! Objects of the open universe.
//!
//! Two kinds of individuals exist:
//! - guaranteed objects, declared statically by name;
//! - generated objects, introduced when a count variable is instantiated.
//!   A generated object's identity is its origin tuple, its index among
//!   siblings, and the lineage of the world chain that created it.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value::Value;
use crate::variable::PopId;

/// Name of a declared type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName(Arc<str>);

impl TypeName {
    /// Creates a type name.
    #[must_use]
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Identifier of a chain of worlds evolving from one another.
///
/// Every `PartialWorld::new` starts a fresh lineage; diffs and saves keep it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineageId(Uuid);

impl LineageId {
    /// Creates a new random lineage id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for LineageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for LineageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A statically declared, permanently existing individual.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GuaranteedObject {
    ty: TypeName,
    name: Arc<str>,
    index: usize,
}

impl GuaranteedObject {
    pub(crate) fn new(ty: TypeName, name: &str, index: usize) -> Self {
        Self {
            ty,
            name: Arc::from(name),
            index,
        }
    }

    /// Declared type.
    #[must_use]
    pub const fn ty(&self) -> &TypeName {
        &self.ty
    }

    /// Declared name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position among the guaranteed objects of its type.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for GuaranteedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Origin tuple shared by all siblings generated for one count variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Origin {
    pop: PopId,
    ty: TypeName,
    args: Vec<Value>,
}

impl Origin {
    pub(crate) fn new(pop: PopId, ty: TypeName, args: Vec<Value>) -> Self {
        Self { pop, ty, args }
    }

    /// Origin pattern that generated the object.
    #[must_use]
    pub const fn pop(&self) -> PopId {
        self.pop
    }

    /// Type of the generated objects.
    #[must_use]
    pub const fn ty(&self) -> &TypeName {
        &self.ty
    }

    /// Parent objects the pattern was applied to.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }
}

/// An individual introduced by a count variable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GeneratedObject {
    origin: Arc<Origin>,
    index: usize,
    lineage: LineageId,
}

impl GeneratedObject {
    pub(crate) fn new(origin: Arc<Origin>, index: usize, lineage: LineageId) -> Self {
        Self {
            origin,
            index,
            lineage,
        }
    }

    /// Immutable origin tuple.
    #[must_use]
    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub(crate) fn origin_arc(&self) -> &Arc<Origin> {
        &self.origin
    }

    /// Index among siblings sharing this origin (0-based).
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Lineage of the world chain that created the object.
    #[must_use]
    pub const fn lineage(&self) -> LineageId {
        self.lineage
    }

    /// Type of the object.
    #[must_use]
    pub fn ty(&self) -> &TypeName {
        &self.origin.ty
    }

    /// The `i`-th origin argument (e.g. the relation a fact was generated for).
    #[must_use]
    pub fn origin_arg(&self, i: usize) -> Option<&Value> {
        self.origin.args.get(i)
    }
}

impl fmt::Display for GeneratedObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.origin.ty)?;
        for (i, arg) in self.origin.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}")?;
        }
        write!(f, ")#{}", self.index)
    }
}

/// Reference to any object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectRef {
    Guaranteed(GuaranteedObject),
    Generated(GeneratedObject),
}

impl ObjectRef {
    /// Type of the referenced object.
    #[must_use]
    pub fn ty(&self) -> &TypeName {
        match self {
            Self::Guaranteed(o) => o.ty(),
            Self::Generated(o) => o.ty(),
        }
    }

    /// The guaranteed object, if this is one.
    #[must_use]
    pub const fn as_guaranteed(&self) -> Option<&GuaranteedObject> {
        match self {
            Self::Guaranteed(o) => Some(o),
            Self::Generated(_) => None,
        }
    }

    /// The generated object, if this is one.
    #[must_use]
    pub const fn as_generated(&self) -> Option<&GeneratedObject> {
        match self {
            Self::Generated(o) => Some(o),
            Self::Guaranteed(_) => None,
        }
    }

    /// Lineage for generated objects; guaranteed objects belong to every world.
    #[must_use]
    pub const fn lineage(&self) -> Option<LineageId> {
        match self {
            Self::Generated(o) => Some(o.lineage),
            Self::Guaranteed(_) => None,
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Guaranteed(o) => write!(f, "{o}"),
            Self::Generated(o) => write!(f, "{o}"),
        }
    }
}
