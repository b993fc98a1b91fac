//! The staff: resolves capability calls against a layer stack and runs them.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{Instrument, debug, debug_span, trace, warn};

use crate::access::{Access, Components};
use crate::capability::Capability;
use crate::compose::Composition;
use crate::error::{BoxError, StaffError};
use crate::performer::{Instance, Performer, PerformerSlot};
use crate::twin::Twin;

/// A twin picked for a call, with the layer it was found in.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub twin: Twin,
    pub layer: usize,
}

/// Executes capabilities for one account or session.
///
/// A staff holds the composed layers, a bag of named components and a cache
/// of performer instances. Clones share the cache, so each performer type is
/// constructed at most once per staff family.
#[derive(Clone)]
pub struct Staff {
    layers: Composition,
    components: Components,
    performers: Arc<Performers>,
}

/// The instance cache shared by a staff family.
#[derive(Default)]
struct Performers {
    cells: Mutex<HashMap<TypeId, Arc<OnceCell<Instance>>>>,
    // construction order, for shutdown
    entered: Mutex<Vec<(PerformerSlot, Instance)>>,
}

impl Staff {
    pub fn new(layers: Composition, components: Components) -> Self {
        Self {
            layers,
            components,
            performers: Arc::default(),
        }
    }

    pub fn layers(&self) -> &Composition {
        &self.layers
    }

    pub fn components(&self) -> &Components {
        &self.components
    }

    /// A staff seeing `extra` ahead of the current components.
    ///
    /// The layers and the performer cache are shared with `self`. Performers
    /// read `extra` through [`Component`](crate::Component) handles only when
    /// called through the returned staff.
    pub fn ext(&self, extra: Components) -> Staff {
        Staff {
            layers: self.layers.clone(),
            components: self.components.overlay(extra),
            performers: self.performers.clone(),
        }
    }

    /// Adds a component to this staff only.
    pub fn insert_component<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.components.insert(name, value);
    }

    /// A staff whose layer stack has `front` ahead of the current layers.
    pub fn inject(&self, front: &Composition) -> Staff {
        Staff {
            layers: self.layers.stacked_under(front),
            components: self.components.clone(),
            performers: self.performers.clone(),
        }
    }

    /// Finds the twin a call with `args` would run, without running it.
    pub fn resolve<A, R>(&self, capability: &Capability<A, R>, args: &A) -> Option<Resolved> {
        self.resolve_from(capability, args, 0)
    }

    fn resolve_from<A, R>(
        &self,
        capability: &Capability<A, R>,
        args: &A,
        start: usize,
    ) -> Option<Resolved> {
        self.layers
            .layers()
            .iter()
            .enumerate()
            .skip(start)
            .find_map(|(layer, registry)| {
                let twin = registry
                    .record(capability.id())?
                    .harvest(capability, args)
                    .first()
                    .cloned()?;
                Some(Resolved { twin, layer })
            })
    }

    /// Runs the best implementation of `capability` for `args`.
    ///
    /// Fails with [`StaffError::Unresolvable`] if no layer has one.
    pub async fn call<A, R>(&self, capability: &Capability<A, R>, args: A) -> Result<R, BoxError>
    where
        A: Send + 'static,
        R: Send + 'static,
    {
        self.call_from(capability, args, 0)
            .instrument(debug_span!("capability", name = capability.name()))
            .await
    }

    /// Like [`Staff::call`] but maps "no implementation" to `Ok(None)`.
    ///
    /// Only capabilities declared `.optional()` may be called this way.
    pub async fn call_optional<A, R>(
        &self,
        capability: &Capability<A, R>,
        args: A,
    ) -> Result<Option<R>, BoxError>
    where
        A: Send + 'static,
        R: Send + 'static,
    {
        if !capability.is_optional() {
            return Err(StaffError::NotOptional {
                capability: capability.name(),
            }
            .into());
        }
        // only a missing implementation means "no handler"; whatever the
        // handler itself returns is passed through
        let Some(resolved) = self.resolve_from(capability, &args, 0) else {
            return Ok(None);
        };
        self.execute(capability, resolved, args)
            .instrument(debug_span!("capability", name = capability.name()))
            .await
            .map(Some)
    }

    /// Runs every implementation matching `args` in the first layer that has
    /// any, in insertion order.
    pub async fn call_all<A, R>(
        &self,
        capability: &Capability<A, R>,
        args: A,
    ) -> Result<Vec<R>, BoxError>
    where
        A: Clone + Send + 'static,
        R: Send + 'static,
    {
        let span = debug_span!("capability", name = capability.name());
        let found = self
            .layers
            .layers()
            .iter()
            .enumerate()
            .find_map(|(layer, registry)| {
                let twins = registry.record(capability.id())?.harvest(capability, &args);
                (!twins.is_empty()).then_some((layer, twins))
            });
        let Some((layer, twins)) = found else {
            return Err(StaffError::Unresolvable {
                capability: capability.name(),
            }
            .into());
        };

        let mut results = Vec::with_capacity(twins.len());
        for twin in twins {
            let value = self
                .execute(capability, Resolved { twin, layer }, args.clone())
                .instrument(span.clone())
                .await?;
            results.push(value);
        }
        Ok(results)
    }

    pub(crate) async fn call_from<A, R>(
        &self,
        capability: &Capability<A, R>,
        args: A,
        start: usize,
    ) -> Result<R, BoxError>
    where
        A: Send + 'static,
        R: Send + 'static,
    {
        let Some(resolved) = self.resolve_from(capability, &args, start) else {
            debug!(start, "No implementation found");
            return Err(StaffError::Unresolvable {
                capability: capability.name(),
            }
            .into());
        };
        self.execute(capability, resolved, args).await
    }

    async fn execute<A, R>(
        &self,
        capability: &Capability<A, R>,
        resolved: Resolved,
        args: A,
    ) -> Result<R, BoxError>
    where
        A: Send + 'static,
        R: Send + 'static,
    {
        let Resolved { twin, layer } = resolved;
        trace!(
            layer,
            twin = %twin.id(),
            collector = %twin.collector(),
            "Executing implementation"
        );

        let instance = self.instance(twin.performer()).await?;
        let future = {
            let handler = twin
                .handler::<A, R>()
                .ok_or(StaffError::ShapeMismatch {
                    capability: capability.name(),
                })?;
            let invocation = Invocation {
                staff: self.clone(),
                capability: capability.clone(),
                twin: twin.clone(),
                layer,
            };
            (handler.0)(instance, invocation, args)
        };
        future.await
    }

    /// The cached instance of a performer type, constructing and entering it
    /// on first use. Concurrent first uses wait for the same construction.
    async fn instance(&self, slot: &PerformerSlot) -> Result<Instance, BoxError> {
        let cell = self
            .performers
            .cells
            .lock()
            .entry(slot.key().id())
            .or_default()
            .clone();

        let instance = cell
            .get_or_try_init(|| async move {
                let instance = slot.construct(&Access::new(&self.components, slot.name()))?;
                slot.enter(&instance, self).await?;
                debug!(performer = slot.name(), "Constructed performer");
                self.performers
                    .entered
                    .lock()
                    .push((*slot, instance.clone()));
                Ok::<_, BoxError>(instance)
            })
            .await?;
        Ok(instance.clone())
    }

    /// The shared instance of performer `P`, constructing it on first use.
    pub async fn performer<P: Performer>(&self) -> Result<Arc<P>, BoxError> {
        let slot = PerformerSlot::of::<P>();
        self.instance(&slot).await?.downcast().map_err(|_| {
            StaffError::ShapeMismatch {
                capability: slot.name(),
            }
            .into()
        })
    }

    /// Number of performer instances constructed so far.
    pub fn instance_count(&self) -> usize {
        self.performers
            .cells
            .lock()
            .values()
            .filter(|cell| cell.initialized())
            .count()
    }

    /// Runs [`Performer::on_exit`] for every constructed performer, newest
    /// first, and empties the instance cache of the whole staff family.
    ///
    /// Every hook runs; the first failure is returned.
    pub async fn shutdown(&self) -> Result<(), BoxError> {
        let entered = std::mem::take(&mut *self.performers.entered.lock());
        self.performers.cells.lock().clear();

        let mut first_error = None;
        for (slot, instance) in entered.into_iter().rev() {
            match slot.exit(&instance).await {
                Ok(()) => debug!(performer = slot.name(), "Performer exited"),
                Err(err) => {
                    warn!(performer = slot.name(), error = %err, "Performer exit failed");
                    first_error.get_or_insert(err);
                }
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl fmt::Debug for Staff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Staff")
            .field("layers", &self.layers.len())
            .field("components", &self.components)
            .field("instances", &self.instance_count())
            .finish()
    }
}

// =============================================================================
// Invocation
// =============================================================================

/// Context handed to a running implementation.
pub struct Invocation<A, R> {
    staff: Staff,
    capability: Capability<A, R>,
    twin: Twin,
    layer: usize,
}

impl<A, R> Invocation<A, R>
where
    A: Send + 'static,
    R: Send + 'static,
{
    pub fn staff(&self) -> &Staff {
        &self.staff
    }

    pub fn capability(&self) -> &Capability<A, R> {
        &self.capability
    }

    pub fn twin(&self) -> &Twin {
        &self.twin
    }

    /// Index of the layer the running twin was found in.
    pub fn layer(&self) -> usize {
        self.layer
    }

    /// Runs the next implementation below the current layer.
    ///
    /// Fails with [`StaffError::Unresolvable`] when none of the lower layers
    /// accepts `args`.
    pub async fn super_call(&self, args: A) -> Result<R, BoxError> {
        self.staff
            .call_from(&self.capability, args, self.layer + 1)
            .await
    }

    /// The twin this one displaced when the layers were composed.
    pub fn overridden(&self) -> Option<Twin> {
        self.staff
            .layers()
            .layers()
            .get(self.layer)?
            .record(self.capability.id())?
            .overridden(self.twin.id())
            .cloned()
    }
}

impl<A, R> fmt::Debug for Invocation<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("capability", &self.capability.name())
            .field("twin", &self.twin.id())
            .field("layer", &self.layer)
            .finish()
    }
}
