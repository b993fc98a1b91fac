//! # Ryanvk Core
//!
//! The capability dispatch engine of the Ryanvk bot framework.
//!
//! Protocol implementations declare [`Capability`]s, register implementations
//! for them in [`Collector`]s bound to a [`Performer`] type, and merge the
//! collectors' [`Artifacts`] into a layered [`Composition`] with [`compose`].
//! A [`Staff`] then routes each call to the implementation whose overload keys
//! match the arguments, searching layers from highest priority down.
//!
//! ## Modules
//!
//! - [`overload`]: keys, probes and overload strategies
//! - [`capability`]: capability declarations
//! - [`collector`]: registration and artifacts
//! - [`compose`]: the layer merge
//! - [`staff`]: resolution, execution and `super_call`
//! - [`access`]: components and performer construction lookups
//! - [`export`]: link-time collector registry

pub mod access;
pub mod address;
pub mod capability;
pub mod collector;
pub mod compose;
pub mod error;
pub mod export;
pub mod overload;
pub mod performer;
pub mod staff;
pub mod twin;

pub use access::{Access, Component, Components};
pub use address::{Address, AddressPattern};
pub use capability::{Capability, CapabilityBuilder, CapabilityId, Dimension, Param, Projection};
pub use collector::{Artifacts, Collector, FullKey, Registration, Signature};
pub use compose::{ArtifactRecord, Composition, Registry, compose};
pub use error::{
    BoxError, ComposeError, ComposeResult, OverloadError, OverloadResult, StaffError, StaffResult,
};
pub use export::{COLLECTORS, CollectorEntry, compose_subset};
pub use overload::{Key, Literal, OverloadScope, Predicate, Probe, Selection, Strategy, TypeKey};
pub use performer::{Performer, PerformerSlot};
pub use staff::{Invocation, Resolved, Staff};
pub use twin::{CollectorInfo, Twin, TwinId};

// Re-exported for `export_collector!`.
pub use linkme;
