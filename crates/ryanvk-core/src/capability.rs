//! Capability declarations.
//!
//! A capability is a named operation with argument type `A` and result type
//! `R`, overloaded along zero or more dimensions. Each dimension has one
//! [`Strategy`] and one or more named parameters; a parameter projects the call
//! arguments into the [`Probe`] its strategy harvests with.
//!
//! ```ignore
//! static SEND: LazyLock<Capability<SendArgs, String>> = LazyLock::new(|| {
//!     Capability::declare("send")
//!         .overload(Strategy::Type, "message", |a| Probe::dynamic(a.message.as_ref()))
//!         .overload(Strategy::PatternAddress, "target", |a| Probe::address(&a.target))
//!         .build()
//! });
//! ```

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::overload::{Probe, Strategy};

static NEXT_CAPABILITY: AtomicU64 = AtomicU64::new(1);

/// Nominal identity of a declared capability.
///
/// Two declarations with the same name are still different capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CapabilityId(u64);

/// Projects call arguments into the probe of one parameter.
pub type Projection<A> = for<'a> fn(&'a A) -> Probe<'a>;

/// Name used for the implicit parameter of a singleton dimension.
pub(crate) const SINGLETON_PARAM: &str = "_";

pub struct Param<A> {
    name: &'static str,
    project: Projection<A>,
}

impl<A> Param<A> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn project<'a>(&self, args: &'a A) -> Probe<'a> {
        (self.project)(args)
    }
}

/// One overload dimension: a strategy and the parameters it indexes.
pub struct Dimension<A> {
    strategy: Strategy,
    params: Vec<Param<A>>,
}

impl<A> Dimension<A> {
    pub fn new(strategy: Strategy) -> Self {
        Self {
            strategy,
            params: Vec::new(),
        }
    }

    pub fn param(mut self, name: &'static str, project: Projection<A>) -> Self {
        self.params.push(Param { name, project });
        self
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn params(&self) -> &[Param<A>] {
        &self.params
    }
}

struct CapabilityInner<A> {
    id: CapabilityId,
    name: &'static str,
    dimensions: Vec<Dimension<A>>,
    optional: bool,
}

/// A declared capability. Cloning is cheap and keeps the identity.
pub struct Capability<A, R> {
    inner: Arc<CapabilityInner<A>>,
    _result: PhantomData<fn() -> R>,
}

impl<A, R> Capability<A, R> {
    pub fn declare(name: &'static str) -> CapabilityBuilder<A, R> {
        CapabilityBuilder {
            name,
            dimensions: Vec::new(),
            optional: false,
            _result: PhantomData,
        }
    }

    pub fn id(&self) -> CapabilityId {
        self.inner.id
    }

    pub fn name(&self) -> &'static str {
        self.inner.name
    }

    pub fn dimensions(&self) -> &[Dimension<A>] {
        &self.inner.dimensions
    }

    /// Whether callers may treat a missing implementation as "no result".
    pub fn is_optional(&self) -> bool {
        self.inner.optional
    }

    /// Finds the dimension index and declaration of a parameter.
    pub fn param(&self, name: &str) -> Option<(usize, &Dimension<A>, &Param<A>)> {
        self.inner
            .dimensions
            .iter()
            .enumerate()
            .find_map(|(index, dimension)| {
                dimension
                    .params
                    .iter()
                    .find(|p| p.name == name)
                    .map(|p| (index, dimension, p))
            })
    }
}

impl<A, R> Clone for Capability<A, R> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            _result: PhantomData,
        }
    }
}

impl<A, R> PartialEq for Capability<A, R> {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl<A, R> Eq for Capability<A, R> {}

impl<A, R> fmt::Debug for Capability<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("name", &self.inner.name)
            .field(
                "dimensions",
                &self
                    .inner
                    .dimensions
                    .iter()
                    .map(|d| (d.strategy.name(), d.params.iter().map(|p| p.name).collect::<Vec<_>>()))
                    .collect::<Vec<_>>(),
            )
            .field("optional", &self.inner.optional)
            .finish()
    }
}

/// Builder returned by [`Capability::declare`].
pub struct CapabilityBuilder<A, R> {
    name: &'static str,
    dimensions: Vec<Dimension<A>>,
    optional: bool,
    _result: PhantomData<fn() -> R>,
}

impl<A, R> CapabilityBuilder<A, R> {
    /// Adds a dimension with a single parameter.
    pub fn overload(self, strategy: Strategy, param: &'static str, project: Projection<A>) -> Self {
        self.dimension(strategy, |d| d.param(param, project))
    }

    /// Adds a dimension whose parameters are declared by `build`.
    pub fn dimension(
        mut self,
        strategy: Strategy,
        build: impl FnOnce(Dimension<A>) -> Dimension<A>,
    ) -> Self {
        self.dimensions.push(build(Dimension::new(strategy)));
        self
    }

    /// Adds a singleton dimension: one slot every call resolves to.
    pub fn singleton(mut self) -> Self {
        self.dimensions
            .push(Dimension::new(Strategy::Singleton).param(SINGLETON_PARAM, |_| Probe::Absent));
        self
    }

    /// Lets callers use `Staff::call_optional` on this capability.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// # Panics
    ///
    /// Panics if two parameters share a name, or a non-singleton dimension
    /// declares no parameter. Both are declaration mistakes.
    pub fn build(self) -> Capability<A, R> {
        let mut seen: Vec<&'static str> = Vec::new();
        for dimension in &self.dimensions {
            assert!(
                !dimension.params.is_empty(),
                "capability '{}' declares a dimension without parameters",
                self.name
            );
            for param in &dimension.params {
                assert!(
                    !seen.contains(&param.name),
                    "capability '{}' declares parameter '{}' twice",
                    self.name,
                    param.name
                );
                seen.push(param.name);
            }
        }

        Capability {
            inner: Arc::new(CapabilityInner {
                id: CapabilityId(NEXT_CAPABILITY.fetch_add(1, Ordering::Relaxed)),
                name: self.name,
                dimensions: self.dimensions,
                optional: self.optional,
            }),
            _result: PhantomData,
        }
    }
}
