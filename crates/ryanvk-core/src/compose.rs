//! Merging collector artifacts into a priority-ordered stack of layers.
//!
//! Artifacts are merged in the order given; later collectors take priority.
//! For every full key the newest twin lands in layer 0 and each twin it
//! displaces moves one layer down, so a key registered by `n` collectors
//! occupies layers `0..n`. Every twin remembers the twin it displaced, which
//! is what `super_call` falls through to.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::capability::{Capability, CapabilityId};
use crate::collector::{Artifacts, FullKey};
use crate::error::{ComposeError, ComposeResult};
use crate::overload::{OverloadScope, TwinSet};
use crate::twin::{Twin, TwinId};

/// One capability's entries within a layer.
#[derive(Debug, Clone, Default)]
pub struct ArtifactRecord {
    entities: IndexMap<FullKey, Twin>,
    scopes: HashMap<usize, OverloadScope>,
    next: HashMap<TwinId, Twin>,
}

impl ArtifactRecord {
    fn place(&mut self, key: &FullKey, twin: Twin, next: Option<&Twin>) {
        for signature in key.signatures() {
            self.scopes
                .entry(signature.dimension)
                .or_default()
                .param_mut(signature.param)
                .entry(signature.key.clone())
                .or_default()
                .insert(twin.clone());
        }
        if let Some(next) = next {
            self.next.insert(twin.id(), next.clone());
        }
        self.entities.insert(key.clone(), twin);
    }

    pub fn entities(&self) -> &IndexMap<FullKey, Twin> {
        &self.entities
    }

    /// The twin `twin` displaced when this layer was composed.
    pub fn overridden(&self, twin: TwinId) -> Option<&Twin> {
        self.next.get(&twin)
    }

    /// All twins of this layer accepting `args`, in insertion order.
    pub fn harvest<A, R>(&self, capability: &Capability<A, R>, args: &A) -> TwinSet {
        let dimensions = capability.dimensions();
        if dimensions.is_empty() {
            return self.entities.values().take(1).cloned().collect();
        }

        let mut result: Option<TwinSet> = None;
        for (index, dimension) in dimensions.iter().enumerate() {
            let Some(scope) = self.scopes.get(&index) else {
                return TwinSet::new();
            };
            for param in dimension.params() {
                let Some(param_scope) = scope.param(param.name()) else {
                    return TwinSet::new();
                };
                let probe = param.project(args);
                let found = dimension
                    .strategy()
                    .harvest(param.name(), param_scope, &probe);
                let narrowed = match result.take() {
                    None => found.into_owned(),
                    Some(mut acc) => {
                        acc.retain(|twin| found.contains(twin));
                        acc
                    }
                };
                if narrowed.is_empty() {
                    return narrowed;
                }
                result = Some(narrowed);
            }
        }
        result.unwrap_or_default()
    }
}

/// One layer: a record per capability.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    records: HashMap<CapabilityId, ArtifactRecord>,
}

impl Registry {
    pub fn record(&self, capability: CapabilityId) -> Option<&ArtifactRecord> {
        self.records.get(&capability)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A priority-ordered stack of layers; index 0 is searched first.
#[derive(Clone, Default)]
pub struct Composition {
    layers: Arc<[Registry]>,
}

impl Composition {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn layers(&self) -> &[Registry] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// A stack with `front`'s layers ahead of these.
    pub fn stacked_under(&self, front: &Composition) -> Composition {
        Composition {
            layers: front.layers.iter().chain(self.layers.iter()).cloned().collect(),
        }
    }
}

impl From<Vec<Registry>> for Composition {
    fn from(layers: Vec<Registry>) -> Self {
        Self {
            layers: layers.into(),
        }
    }
}

impl fmt::Debug for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Composition")
            .field("layers", &self.layers.len())
            .finish()
    }
}

/// Merges `inbound` artifacts, later ones taking priority, into layers.
///
/// Fails if any collector registered the same capability twice under one
/// full key. Passing the same collector more than once has no extra effect.
pub fn compose(inbound: impl IntoIterator<Item = Artifacts>) -> ComposeResult<Composition> {
    let mut unique: Vec<Artifacts> = Vec::new();
    for artifacts in inbound {
        if unique.iter().any(|seen| seen.same_collector(&artifacts)) {
            continue;
        }
        if let Some(duplicate) = artifacts.duplicates().first() {
            return Err(ComposeError::DuplicateRegistration {
                collector: artifacts.collector().to_string(),
                capability: duplicate.capability,
                key: duplicate.key.to_string(),
            });
        }
        unique.push(artifacts);
    }

    // capability -> full key -> twins in inbound order
    let mut groups: IndexMap<CapabilityId, IndexMap<FullKey, IndexSet<Twin>>> = IndexMap::new();
    for artifacts in &unique {
        for (capability, record) in artifacts.records() {
            let keys = groups.entry(*capability).or_default();
            for (key, twin) in &record.entities {
                keys.entry(key.clone()).or_default().insert(twin.clone());
            }
        }
    }

    let mut layers: Vec<Registry> = Vec::new();
    for (capability, keys) in &groups {
        for (key, twins) in keys {
            // each arrival takes layer 0 and pushes the previous occupants down
            let mut stack: Vec<&Twin> = Vec::with_capacity(twins.len());
            for twin in twins {
                stack.insert(0, twin);
            }

            for (depth, twin) in stack.iter().enumerate() {
                if layers.len() <= depth {
                    layers.push(Registry::default());
                }
                layers[depth]
                    .records
                    .entry(*capability)
                    .or_default()
                    .place(key, (*twin).clone(), stack.get(depth + 1).copied());
            }
        }
    }

    debug!(
        collectors = unique.len(),
        capabilities = groups.len(),
        layers = layers.len(),
        "Composed registry"
    );
    Ok(layers.into())
}
