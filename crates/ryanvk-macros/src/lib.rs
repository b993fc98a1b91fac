//! Procedural macros for the Ryanvk capability engine.
//!
//! This crate provides:
//!
//! - `#[derive(Performer)]` - Builds a performer from the components of the
//!   staff that first needs it
//!
//! ```rust,ignore
//! use ryanvk::prelude::*;
//!
//! #[derive(Performer)]
//! #[performer(enter = "connect", exit = "close")]
//! struct QqPerformer {
//!     #[access]
//!     connection: Component<Connection>,
//!     #[access(name = "account", optional)]
//!     account: Component<u64>,
//!     sent: AtomicUsize,
//! }
//! ```
//!
//! The generated code refers to `::ryanvk_core`, so the crate using the derive
//! must depend on `ryanvk-core` directly.

mod performer;

use proc_macro::TokenStream;
use syn::{DeriveInput, parse_macro_input};

/// Derives `ryanvk_core::Performer`.
///
/// # Field attributes
///
/// - `#[access]` - Component named after the field, type `Component<T>`;
///   the constructing staff must carry it
/// - `#[access("name")]` or `#[access(name = "name")]` - Same, with an
///   explicit component name
/// - `#[access(optional)]` - Component that may be absent at construction
///
/// Components are read per call with `field.get(cx.staff())`, so values
/// added through `Staff::ext` reach the performer. Fields without
/// `#[access]` are initialised with `Default::default()` and shared by every
/// call.
///
/// # Container attributes
///
/// - `#[performer(enter = "method")]` - `async fn method(&self, staff: &Staff)
///   -> Result<(), BoxError>` runs once after construction
/// - `#[performer(exit = "method")]` - `async fn method(&self)
///   -> Result<(), BoxError>` runs from `Staff::shutdown`
#[proc_macro_derive(Performer, attributes(access, performer))]
pub fn derive_performer(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match performer::derive_performer(&input) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}
