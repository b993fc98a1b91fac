//! Twins: an implementation paired with the collector that registered it.

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use futures::future::BoxFuture;

use crate::error::BoxError;
use crate::performer::PerformerSlot;
use crate::staff::Invocation;

static NEXT_TWIN: AtomicU64 = AtomicU64::new(1);
static NEXT_COLLECTOR: AtomicU64 = AtomicU64::new(1);

/// Identity of a registered implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TwinId(u64);

impl TwinId {
    fn next() -> Self {
        Self(NEXT_TWIN.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TwinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "twin#{}", self.0)
    }
}

/// Where a twin came from.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct CollectorInfo {
    id: u64,
    namespace: String,
    identify: String,
}

impl CollectorInfo {
    pub(crate) fn new(namespace: impl Into<String>, identify: impl Into<String>) -> Self {
        Self {
            id: NEXT_COLLECTOR.fetch_add(1, Ordering::Relaxed),
            namespace: namespace.into(),
            identify: identify.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn identify(&self) -> &str {
        &self.identify
    }
}

impl fmt::Display for CollectorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.identify)
    }
}

pub(crate) type HandlerFn<A, R> = dyn Fn(Arc<dyn Any + Send + Sync>, Invocation<A, R>, A) -> BoxFuture<'static, Result<R, BoxError>>
    + Send
    + Sync;

/// A type-erased implementation of a capability with arguments `A`.
pub(crate) struct Handler<A, R>(pub(crate) Box<HandlerFn<A, R>>);

/// An implementation plus the collector that registered it.
///
/// Twins compare by identity: two registrations of the same closure are
/// still different twins.
#[derive(Clone)]
pub struct Twin {
    inner: Arc<TwinInner>,
}

struct TwinInner {
    id: TwinId,
    capability: &'static str,
    collector: Arc<CollectorInfo>,
    performer: PerformerSlot,
    handler: Arc<dyn Any + Send + Sync>,
}

impl Twin {
    pub(crate) fn new<A: 'static, R: 'static>(
        capability: &'static str,
        collector: Arc<CollectorInfo>,
        performer: PerformerSlot,
        handler: Handler<A, R>,
    ) -> Self {
        Self {
            inner: Arc::new(TwinInner {
                id: TwinId::next(),
                capability,
                collector,
                performer,
                handler: Arc::new(handler),
            }),
        }
    }

    pub fn id(&self) -> TwinId {
        self.inner.id
    }

    /// Name of the capability this twin implements.
    pub fn capability(&self) -> &'static str {
        self.inner.capability
    }

    pub fn collector(&self) -> &CollectorInfo {
        &self.inner.collector
    }

    pub fn performer(&self) -> &PerformerSlot {
        &self.inner.performer
    }

    pub(crate) fn handler<A: 'static, R: 'static>(&self) -> Option<&Handler<A, R>> {
        self.inner.handler.downcast_ref()
    }
}

impl PartialEq for Twin {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Twin {}

impl Hash for Twin {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Twin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Twin")
            .field("id", &self.inner.id)
            .field("capability", &self.inner.capability)
            .field("collector", &format_args!("{}", self.inner.collector))
            .field("performer", &self.inner.performer.name())
            .finish()
    }
}
