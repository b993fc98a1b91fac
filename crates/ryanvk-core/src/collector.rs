//! Collectors gather registrations for one performer type.
//!
//! ```ignore
//! let mut collector = Collector::<QqPerformer>::new("qq", "message");
//! collector
//!     .register(&SEND)
//!     .on("message", Selection::of::<Text>())
//!     .on("target", Selection::pattern("group.member"))
//!     .implement(|this, _cx, args| async move { this.send(args).await })?;
//! let artifacts = collector.close();
//! ```

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::FutureExt;
use indexmap::IndexMap;
use tracing::trace;

use crate::capability::{Capability, CapabilityId};
use crate::error::{BoxError, OverloadError, OverloadResult, StaffError};
use crate::overload::{Key, Selection, Strategy};
use crate::performer::{Performer, PerformerSlot};
use crate::staff::Invocation;
use crate::twin::{CollectorInfo, Handler, Twin, TwinId};

// =============================================================================
// Keys
// =============================================================================

/// One digested parameter of a registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    pub dimension: usize,
    pub param: &'static str,
    pub key: Key,
}

/// All signatures of a registration, in declaration order.
///
/// Two registrations with equal full keys compete for the same slot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct FullKey(Vec<Signature>);

impl FullKey {
    pub fn signatures(&self) -> &[Signature] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FullKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, s) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}={}", s.param, s.key)?;
        }
        f.write_str("]")
    }
}

// =============================================================================
// Artifacts
// =============================================================================

/// Registrations of one capability inside one collector.
#[derive(Debug, Clone)]
pub(crate) struct PartialRecord {
    pub(crate) capability: &'static str,
    pub(crate) entities: IndexMap<FullKey, Twin>,
}

#[derive(Debug, Clone)]
pub(crate) struct Duplicate {
    pub(crate) capability: &'static str,
    pub(crate) key: FullKey,
}

struct ArtifactsInner {
    info: Arc<CollectorInfo>,
    performer: PerformerSlot,
    records: IndexMap<CapabilityId, PartialRecord>,
    duplicates: Vec<Duplicate>,
}

/// The closed output of a [`Collector`], ready to be composed.
#[derive(Clone)]
pub struct Artifacts {
    inner: Arc<ArtifactsInner>,
}

impl Artifacts {
    pub fn collector(&self) -> &CollectorInfo {
        &self.inner.info
    }

    pub fn performer(&self) -> &PerformerSlot {
        &self.inner.performer
    }

    /// Number of registered implementations.
    pub fn len(&self) -> usize {
        self.inner.records.values().map(|r| r.entities.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Twins registered for `capability`, in registration order.
    pub fn twins<A, R>(&self, capability: &Capability<A, R>) -> Vec<Twin> {
        self.inner
            .records
            .get(&capability.id())
            .map(|r| r.entities.values().cloned().collect())
            .unwrap_or_default()
    }

    pub(crate) fn same_collector(&self, other: &Artifacts) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner) || self.inner.info == other.inner.info
    }

    pub(crate) fn records(&self) -> impl Iterator<Item = (&CapabilityId, &PartialRecord)> {
        self.inner.records.iter()
    }

    pub(crate) fn duplicates(&self) -> &[Duplicate] {
        &self.inner.duplicates
    }
}

impl fmt::Debug for Artifacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artifacts")
            .field("collector", &format_args!("{}", self.inner.info))
            .field("performer", &self.inner.performer.name())
            .field("implementations", &self.len())
            .finish()
    }
}

// =============================================================================
// Collector
// =============================================================================

/// A registration scope bound to performer type `P`.
pub struct Collector<P> {
    info: Arc<CollectorInfo>,
    records: IndexMap<CapabilityId, PartialRecord>,
    duplicates: Vec<Duplicate>,
    _performer: PhantomData<fn() -> P>,
}

impl<P: Performer> Collector<P> {
    pub fn new(namespace: impl Into<String>, identify: impl Into<String>) -> Self {
        Self {
            info: Arc::new(CollectorInfo::new(namespace, identify)),
            records: IndexMap::new(),
            duplicates: Vec::new(),
            _performer: PhantomData,
        }
    }

    pub fn info(&self) -> &CollectorInfo {
        &self.info
    }

    /// Starts a registration of `capability`.
    pub fn register<A, R>(&mut self, capability: &Capability<A, R>) -> Registration<'_, P, A, R>
    where
        A: Send + 'static,
        R: Send + 'static,
    {
        Registration {
            collector: self,
            capability: capability.clone(),
            selections: Vec::new(),
            error: None,
        }
    }

    /// Finishes collecting and hands out the artifacts.
    pub fn close(self) -> Artifacts {
        Artifacts {
            inner: Arc::new(ArtifactsInner {
                info: self.info,
                performer: PerformerSlot::of::<P>(),
                records: self.records,
                duplicates: self.duplicates,
            }),
        }
    }

    fn insert(&mut self, capability: CapabilityId, name: &'static str, key: FullKey, twin: Twin) {
        let record = self.records.entry(capability).or_insert_with(|| PartialRecord {
            capability: name,
            entities: IndexMap::new(),
        });
        if record.entities.contains_key(&key) {
            // first registration keeps the slot; compose reports the clash
            self.duplicates.push(Duplicate {
                capability: name,
                key,
            });
            return;
        }
        trace!(
            collector = %self.info,
            capability = name,
            key = %key,
            twin = %twin.id(),
            "Registered implementation"
        );
        record.entities.insert(key, twin);
    }
}

impl<P> fmt::Debug for Collector<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collector")
            .field("info", &format_args!("{}", self.info))
            .field("capabilities", &self.records.len())
            .finish()
    }
}

/// An in-progress registration, finished by [`Registration::implement`].
pub struct Registration<'c, P, A, R> {
    collector: &'c mut Collector<P>,
    capability: Capability<A, R>,
    selections: Vec<(&'static str, usize, Selection)>,
    error: Option<OverloadError>,
}

impl<P, A, R> Registration<'_, P, A, R>
where
    P: Performer,
    A: Send + 'static,
    R: Send + 'static,
{
    /// Selects the key this implementation is registered under for `param`.
    ///
    /// Singleton dimensions need no selection.
    pub fn on(mut self, param: &str, selection: impl Into<Selection>) -> Self {
        if self.error.is_some() {
            return self;
        }
        let capability = self.capability.name();
        match self.capability.param(param) {
            None => {
                self.error = Some(OverloadError::UnknownParam {
                    capability,
                    param: param.to_owned(),
                })
            }
            Some((_, _, declared))
                if self.selections.iter().any(|(n, _, _)| *n == declared.name()) =>
            {
                self.error = Some(OverloadError::DuplicateSelection {
                    capability,
                    param: param.to_owned(),
                })
            }
            Some((dimension, _, declared)) => {
                let name = declared.name();
                self.selections.push((name, dimension, selection.into()))
            }
        }
        self
    }

    fn full_key(&self) -> OverloadResult<FullKey> {
        let mut signatures = Vec::new();
        for (index, dimension) in self.capability.dimensions().iter().enumerate() {
            for param in dimension.params() {
                let selection = self
                    .selections
                    .iter()
                    .find(|(name, _, _)| *name == param.name())
                    .map(|(_, _, s)| s);
                let key = match (dimension.strategy(), selection) {
                    (Strategy::Singleton, _) => Key::Singleton,
                    (strategy, Some(selection)) => strategy.digest(param.name(), selection)?,
                    (_, None) => continue,
                };
                signatures.push(Signature {
                    dimension: index,
                    param: param.name(),
                    key,
                });
            }
        }
        Ok(FullKey(signatures))
    }

    /// Stores `handler` under the selected keys.
    ///
    /// The handler receives the shared performer instance, the invocation
    /// context (for `super_call`) and the call arguments.
    pub fn implement<F, Fut>(self, handler: F) -> OverloadResult<TwinId>
    where
        F: Fn(Arc<P>, Invocation<A, R>, A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, BoxError>> + Send + 'static,
    {
        if let Some(error) = self.error {
            return Err(error);
        }
        let key = self.full_key()?;
        let capability = self.capability.name();

        let erased = Handler::<A, R>(Box::new(
            move |instance: Arc<dyn Any + Send + Sync>, invocation: Invocation<A, R>, args: A| {
                match instance.downcast::<P>() {
                    Ok(this) => handler(this, invocation, args).boxed(),
                    Err(_) => {
                        let err: BoxError = StaffError::ShapeMismatch { capability }.into();
                        futures::future::ready(Err(err)).boxed()
                    }
                }
            },
        ));

        let twin = Twin::new(
            capability,
            self.collector.info.clone(),
            PerformerSlot::of::<P>(),
            erased,
        );
        let id = twin.id();
        self.collector
            .insert(self.capability.id(), capability, key, twin);
        Ok(id)
    }
}
