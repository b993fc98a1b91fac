use indexmap::{IndexMap, IndexSet};

use super::Key;
use crate::twin::Twin;

/// Twins sharing one key, in registration order.
pub type TwinSet = IndexSet<Twin>;

/// Buckets of one overload parameter, keyed by digested [`Key`].
pub type ParamScope = IndexMap<Key, TwinSet>;

/// The index of one capability dimension: parameter name to its buckets.
#[derive(Debug, Clone, Default)]
pub struct OverloadScope {
    params: IndexMap<&'static str, ParamScope>,
}

impl OverloadScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn param(&self, name: &str) -> Option<&ParamScope> {
        self.params.get(name)
    }

    /// Buckets of `param`, created empty on first use.
    pub fn param_mut(&mut self, name: &'static str) -> &mut ParamScope {
        self.params.entry(name).or_default()
    }

    pub fn params(&self) -> impl Iterator<Item = (&'static str, &ParamScope)> {
        self.params.iter().map(|(name, scope)| (*name, scope))
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}
