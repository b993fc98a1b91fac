//! Overload keys and the strategies that index implementations by them.
//!
//! At registration a [`Selection`] is digested by its dimension's
//! [`Strategy`] into a [`Key`]. At call time every parameter of the
//! capability projects the call arguments into a [`Probe`], which the same
//! strategy harvests against an [`OverloadScope`].

mod scope;
mod strategy;

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

pub use scope::{OverloadScope, ParamScope, TwinSet};
pub use strategy::{Predicate, Strategy};

use crate::address::{Address, AddressPattern};

// =============================================================================
// Literal
// =============================================================================

/// A hashable scalar used as an exact overload key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Literal {
    Bool(bool),
    Int(i64),
    Str(Arc<str>),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => write!(f, "{s:?}"),
        }
    }
}

impl From<bool> for Literal {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Literal {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Literal {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<u32> for Literal {
    fn from(value: u32) -> Self {
        Self::Int(value.into())
    }
}

impl From<&str> for Literal {
    fn from(value: &str) -> Self {
        Self::Str(value.into())
    }
}

impl From<String> for Literal {
    fn from(value: String) -> Self {
        Self::Str(value.into())
    }
}

// =============================================================================
// TypeKey
// =============================================================================

/// A runtime type identity that remembers its name for diagnostics.
///
/// Equality and hashing only look at the [`TypeId`].
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: Any + ?Sized>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// A key for lookups where only the id is known.
    pub(crate) fn from_id(id: TypeId) -> Self {
        Self { id, name: "<runtime>" }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// =============================================================================
// Key / Selection / Probe
// =============================================================================

/// A digested overload key, as stored in an [`OverloadScope`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Literal(Literal),
    Type(TypeKey),
    Pattern(AddressPattern),
    /// Registered for an absent optional argument.
    Absent,
    /// The only key of a singleton dimension.
    Singleton,
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(l) => write!(f, "{l}"),
            Self::Type(t) => write!(f, "<{}>", t.name()),
            Self::Pattern(p) => write!(f, "{p}"),
            Self::Absent => f.write_str("<absent>"),
            Self::Singleton => f.write_str("<singleton>"),
        }
    }
}

/// What a registration selects for one overload parameter.
#[derive(Debug, Clone)]
pub enum Selection {
    Literal(Literal),
    Type(TypeKey),
    /// A raw address pattern, parsed when digested.
    Pattern(String),
    /// Matches calls where an optional argument is absent.
    Absent,
}

impl Selection {
    pub fn literal(value: impl Into<Literal>) -> Self {
        Self::Literal(value.into())
    }

    /// Selects calls whose argument is a `T`.
    pub fn of<T: Any>() -> Self {
        Self::Type(TypeKey::of::<T>())
    }

    pub fn pattern(pattern: impl Into<String>) -> Self {
        Self::Pattern(pattern.into())
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Literal(_) => "literal",
            Self::Type(_) => "type",
            Self::Pattern(_) => "pattern",
            Self::Absent => "absent",
        }
    }
}

impl From<bool> for Selection {
    fn from(value: bool) -> Self {
        Self::Literal(value.into())
    }
}

impl From<i64> for Selection {
    fn from(value: i64) -> Self {
        Self::Literal(value.into())
    }
}

impl From<i32> for Selection {
    fn from(value: i32) -> Self {
        Self::Literal(value.into())
    }
}

impl From<u32> for Selection {
    fn from(value: u32) -> Self {
        Self::Literal(value.into())
    }
}

impl From<&str> for Selection {
    fn from(value: &str) -> Self {
        Self::Literal(value.into())
    }
}

impl From<String> for Selection {
    fn from(value: String) -> Self {
        Self::Literal(value.into())
    }
}

impl From<TypeKey> for Selection {
    fn from(value: TypeKey) -> Self {
        Self::Type(value)
    }
}

/// A call argument projected for one overload parameter.
#[derive(Clone)]
pub enum Probe<'a> {
    Literal(Literal),
    Value(&'a dyn Any),
    Address(&'a Address),
    /// The optional argument was not given.
    Absent,
}

impl<'a> Probe<'a> {
    pub fn literal(value: impl Into<Literal>) -> Self {
        Self::Literal(value.into())
    }

    /// Probes with the concrete value; `Type` dimensions use its runtime type.
    pub fn value<T: Any>(value: &'a T) -> Self {
        Self::Value(value)
    }

    /// Probes with an already type-erased value, such as the inside of a
    /// `Box<dyn Any>`.
    pub fn dynamic(value: &'a dyn Any) -> Self {
        Self::Value(value)
    }

    pub fn address(address: &'a Address) -> Self {
        Self::Address(address)
    }

    /// Maps `Some` through `f` and `None` to [`Probe::Absent`].
    pub fn optional<T>(value: Option<&'a T>, f: impl FnOnce(&'a T) -> Probe<'a>) -> Self {
        value.map_or(Self::Absent, f)
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Literal(_) => "literal",
            Self::Value(_) => "value",
            Self::Address(_) => "address",
            Self::Absent => "absent",
        }
    }

    /// The probed value as `dyn Any`, if there is one.
    pub fn as_any(&self) -> Option<&dyn Any> {
        match self {
            Self::Literal(l) => Some(l),
            Self::Value(v) => Some(*v),
            Self::Address(a) => Some(*a),
            Self::Absent => None,
        }
    }
}

impl fmt::Debug for Probe<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(l) => f.debug_tuple("Literal").field(l).finish(),
            Self::Value(v) => f
                .debug_tuple("Value")
                .field(&(**v).type_id())
                .finish(),
            Self::Address(a) => f.debug_tuple("Address").field(a).finish(),
            Self::Absent => f.write_str("Absent"),
        }
    }
}
