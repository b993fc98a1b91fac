//! # Ryanvk
//!
//! Layered capability dispatch for multi-protocol chat bots.
//!
//! ## Overview
//!
//! A bot framework talks to many chat protocols through one vocabulary of
//! operations. Ryanvk expresses each operation as a [`Capability`]: a typed,
//! overloadable signature. Protocol crates implement capabilities inside
//! collectors, the runtime stacks those collectors into layers, and a
//! [`Staff`] dispatches every call to the implementation whose keys match the
//! arguments.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐  close  ┌───────────┐ compose ┌─────────────┐       ┌───────┐
//! │ Collector  │────────▶│ Artifacts │────────▶│ Composition │──────▶│ Staff │──▶ implementation
//! │ (per perf.)│         └───────────┘         │  (layers)   │       └───────┘       │
//! └────────────┘                               └─────────────┘                       │ super_call
//!                                                     ▲                              ▼
//!                                                     └─────────────────────── next layer down
//! ```
//!
//! - **Capabilities**: named signatures with overload dimensions
//! - **Collectors**: register implementations bound to one performer type
//! - **Composition**: newest collectors on top, older ones below
//! - **Staff**: resolves, caches performers, and runs implementations
//! - **Runtime**: configuration, logging and per-account staffs
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ryanvk::prelude::*;
//!
//! static GREET: LazyLock<Capability<String, String>> =
//!     LazyLock::new(|| Capability::declare("greet").singleton().build());
//!
//! #[derive(Performer)]
//! struct Polite;
//!
//! let mut collector = Collector::<Polite>::new("demo", "polite");
//! collector
//!     .register(&*GREET)
//!     .implement(|_, _, name| async move { Ok(format!("Hello, {name}")) })?;
//!
//! let staff = Staff::new(compose([collector.close()])?, Components::new());
//! assert_eq!(staff.call(&GREET, "Ryan".into()).await?, "Hello, Ryan");
//! ```
//!
//! ## Features
//!
//! - `toml-config`: read `ryanvk.toml` (default)
//! - `yaml-config`: read `ryanvk.yaml`
//! - `json-log`: JSON log output

pub use ryanvk_core as core;
pub use ryanvk_macros as macros;
pub use ryanvk_runtime as runtime;

pub use ryanvk_core::{
    Capability, Collector, Components, Composition, Staff, compose, compose_subset,
    export_collector,
};
pub use ryanvk_macros::Performer;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use ryanvk::prelude::*;
/// ```
pub mod prelude {
    // Declaring capabilities
    pub use ryanvk_core::{
        Address, AddressPattern, Capability, Dimension, Literal, Probe, Selection, Strategy,
        TypeKey,
    };

    // Implementing them
    pub use ryanvk_core::{
        Access, Artifacts, Collector, Component, Invocation, Performer, StaffResult,
        export_collector,
    };
    pub use ryanvk_macros::Performer;

    // Composing and calling
    pub use ryanvk_core::{BoxError, Components, Composition, Staff, StaffError, compose};

    // Hosting
    pub use ryanvk_runtime::{CapabilityService, RyanvkRuntime};

    pub use std::sync::{Arc, LazyLock};
}
