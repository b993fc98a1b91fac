//! Performers: the receiver types implementations run against.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::{self, BoxFuture};

use crate::access::Access;
use crate::error::{BoxError, StaffError, StaffResult};
use crate::overload::TypeKey;
use crate::staff::Staff;

pub(crate) type Instance = Arc<dyn Any + Send + Sync>;

/// A type whose instances execute implementations for one collector.
///
/// A staff family (a staff plus everything derived from it with
/// [`Staff::ext`] or [`Staff::inject`]) constructs each performer type at
/// most once and hands the shared instance to every implementation bound to
/// that type. Components are not stored on the instance; they are read per
/// call through [`Component`](crate::Component) handles. Usually derived with
/// `#[derive(Performer)]`.
pub trait Performer: Send + Sync + 'static {
    fn construct(access: &Access<'_>) -> StaffResult<Self>
    where
        Self: Sized;

    /// Runs once after construction, before any implementation sees the
    /// instance. A failure leaves nothing cached.
    ///
    /// Concurrent first calls wait for this hook, so it must not call a
    /// capability implemented by this same performer type.
    fn on_enter<'a>(&'a self, staff: &'a Staff) -> BoxFuture<'a, Result<(), BoxError>> {
        let _ = staff;
        future::ready(Ok(())).boxed()
    }

    /// Runs from [`Staff::shutdown`], newest performer first.
    fn on_exit(&self) -> BoxFuture<'_, Result<(), BoxError>> {
        future::ready(Ok(())).boxed()
    }
}

type Construct = fn(&Access<'_>) -> StaffResult<Instance>;
type Enter = for<'a> fn(&'a Instance, &'a Staff) -> BoxFuture<'a, Result<(), BoxError>>;
type Exit = for<'a> fn(&'a Instance) -> BoxFuture<'a, Result<(), BoxError>>;

/// Type-erased handle to a [`Performer`] type.
#[derive(Clone, Copy)]
pub struct PerformerSlot {
    key: TypeKey,
    construct: Construct,
    enter: Enter,
    exit: Exit,
}

impl PerformerSlot {
    pub fn of<P: Performer>() -> Self {
        Self {
            key: TypeKey::of::<P>(),
            construct: construct_erased::<P>,
            enter: enter_erased::<P>,
            exit: exit_erased::<P>,
        }
    }

    pub fn key(&self) -> TypeKey {
        self.key
    }

    pub fn name(&self) -> &'static str {
        self.key.name()
    }

    pub(crate) fn construct(&self, access: &Access<'_>) -> StaffResult<Instance> {
        (self.construct)(access)
    }

    pub(crate) fn enter<'a>(
        &self,
        instance: &'a Instance,
        staff: &'a Staff,
    ) -> BoxFuture<'a, Result<(), BoxError>> {
        (self.enter)(instance, staff)
    }

    pub(crate) fn exit<'a>(&self, instance: &'a Instance) -> BoxFuture<'a, Result<(), BoxError>> {
        (self.exit)(instance)
    }
}

fn construct_erased<P: Performer>(access: &Access<'_>) -> StaffResult<Instance> {
    Ok(Arc::new(P::construct(access)?))
}

fn mismatch<P>() -> BoxFuture<'static, Result<(), BoxError>> {
    let err = StaffError::ShapeMismatch {
        capability: std::any::type_name::<P>(),
    };
    future::ready(Err(err.into())).boxed()
}

fn enter_erased<'a, P: Performer>(
    instance: &'a Instance,
    staff: &'a Staff,
) -> BoxFuture<'a, Result<(), BoxError>> {
    match (**instance).downcast_ref::<P>() {
        Some(performer) => performer.on_enter(staff),
        None => mismatch::<P>(),
    }
}

fn exit_erased<P: Performer>(instance: &Instance) -> BoxFuture<'_, Result<(), BoxError>> {
    match (**instance).downcast_ref::<P>() {
        Some(performer) => performer.on_exit(),
        None => mismatch::<P>(),
    }
}

impl fmt::Debug for PerformerSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PerformerSlot").field(&self.key).finish()
    }
}
