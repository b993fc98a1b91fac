//! Named components carried by a staff and the lookups performers make.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::error::{StaffError, StaffResult};
use crate::staff::Staff;

type Erased = Arc<dyn Any + Send + Sync>;

/// A bag of named, type-erased values.
///
/// Bags stack: [`Components::overlay`] puts new entries in front of the
/// existing ones without copying them, and writes only ever touch the front
/// map.
#[derive(Clone, Default)]
pub struct Components {
    layers: Vec<Arc<HashMap<String, Erased>>>,
}

impl Components {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`Components::insert`].
    pub fn with<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        self.insert_shared(name, Arc::new(value));
    }

    /// Inserts a value that is already shared elsewhere.
    pub fn insert_shared<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: Arc<T>) {
        if self.layers.is_empty() {
            self.layers.push(Arc::default());
        }
        Arc::make_mut(&mut self.layers[0]).insert(name.into(), value);
    }

    /// A new bag where `extra` shadows the entries of `self`.
    pub fn overlay(&self, extra: Components) -> Components {
        let mut front = HashMap::new();
        for layer in extra.layers.iter().rev() {
            front.extend(layer.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let mut layers = Vec::with_capacity(self.layers.len() + 1);
        layers.push(Arc::new(front));
        layers.extend(self.layers.iter().cloned());
        Components { layers }
    }

    fn lookup(&self, name: &str) -> Option<&Erased> {
        self.layers.iter().find_map(|layer| layer.get(name))
    }

    /// The component named `name`, if present and of type `T`.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.lookup(name).cloned()?.downcast().ok()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Visible component names, front layer first.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for layer in &self.layers {
            for name in layer.keys() {
                if !names.contains(&name.as_str()) {
                    names.push(name.as_str());
                }
            }
        }
        names
    }
}

impl fmt::Debug for Components {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

/// Component lookups available to a performer while it is constructed.
pub struct Access<'a> {
    components: &'a Components,
    performer: &'static str,
}

impl<'a> Access<'a> {
    pub(crate) fn new(components: &'a Components, performer: &'static str) -> Self {
        Self {
            components,
            performer,
        }
    }

    /// A required component.
    pub fn get<T: Any + Send + Sync>(&self, name: &str) -> StaffResult<Arc<T>> {
        self.get_optional(name)?
            .ok_or_else(|| StaffError::MissingComponent {
                performer: self.performer,
                component: name.to_owned(),
            })
    }

    /// A component that may be absent; a present value of the wrong type is
    /// still an error.
    pub fn get_optional<T: Any + Send + Sync>(&self, name: &str) -> StaffResult<Option<Arc<T>>> {
        let Some(component) = self.components.lookup(name) else {
            return Ok(None);
        };
        component
            .clone()
            .downcast()
            .map(Some)
            .map_err(|_| StaffError::ComponentType {
                performer: self.performer,
                component: name.to_owned(),
                expected: std::any::type_name::<T>(),
            })
    }

    /// Name of the performer type being constructed.
    pub fn performer(&self) -> &'static str {
        self.performer
    }

    pub fn components(&self) -> &Components {
        self.components
    }
}

/// A component a performer reads from the staff running it.
///
/// A performer instance is shared by a staff and its [`Staff::ext`]
/// children, so the value is looked up in the calling staff's components on
/// every read instead of being stored on the instance.
pub struct Component<T> {
    name: &'static str,
    performer: &'static str,
    _value: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> Component<T> {
    fn declare(access: &Access<'_>, name: &'static str) -> Self {
        Self {
            name,
            performer: access.performer(),
            _value: PhantomData,
        }
    }

    /// A component the constructing staff must carry.
    pub fn required(access: &Access<'_>, name: &'static str) -> StaffResult<Self> {
        access.get::<T>(name)?;
        Ok(Self::declare(access, name))
    }

    /// A component that may be absent when the performer is constructed.
    pub fn optional(access: &Access<'_>, name: &'static str) -> StaffResult<Self> {
        access.get_optional::<T>(name)?;
        Ok(Self::declare(access, name))
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The value carried by `staff`.
    pub fn get(&self, staff: &Staff) -> StaffResult<Arc<T>> {
        Access::new(staff.components(), self.performer).get(self.name)
    }

    pub fn get_optional(&self, staff: &Staff) -> StaffResult<Option<Arc<T>>> {
        Access::new(staff.components(), self.performer).get_optional(self.name)
    }
}

impl<T> Clone for Component<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Component<T> {}

impl<T> fmt::Debug for Component<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("name", &self.name)
            .field("performer", &self.performer)
            .finish()
    }
}
