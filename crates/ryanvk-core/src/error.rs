//! Error types for the capability dispatch engine.
//!
//! Registration problems surface as [`OverloadError`], merge problems as
//! [`ComposeError`] and anything that goes wrong while a [`Staff`] resolves
//! or runs a capability as [`StaffError`].
//!
//! [`Staff`]: crate::Staff

use thiserror::Error;

/// Boxed error returned by implementations and by [`Staff::call`].
///
/// Engine errors travel inside it and can be recovered with
/// `err.downcast_ref::<StaffError>()`.
///
/// [`Staff::call`]: crate::Staff::call
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

// =============================================================================
// Overload Errors
// =============================================================================

/// Errors raised while turning a registration selector into an overload key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OverloadError {
    /// The registration names a parameter the capability does not declare.
    #[error("capability '{capability}' has no overload parameter named '{param}'")]
    UnknownParam {
        /// Capability being registered.
        capability: &'static str,
        /// The unknown parameter name.
        param: String,
    },

    /// The same parameter was selected twice in one registration.
    #[error("parameter '{param}' of capability '{capability}' is selected twice")]
    DuplicateSelection {
        /// Capability being registered.
        capability: &'static str,
        /// The repeated parameter name.
        param: String,
    },

    /// The selector kind does not suit the strategy of its dimension.
    #[error("strategy '{strategy}' cannot digest a {selection} selector for '{param}'")]
    SelectorMismatch {
        /// Strategy name.
        strategy: &'static str,
        /// Kind of the offending selector.
        selection: &'static str,
        /// Parameter the selector was given for.
        param: &'static str,
    },

    /// An address pattern could not be parsed.
    #[error("invalid address pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The raw pattern.
        pattern: String,
        /// What is wrong with it.
        reason: &'static str,
    },
}

/// Result type for registration operations.
pub type OverloadResult<T> = Result<T, OverloadError>;

// =============================================================================
// Compose Errors
// =============================================================================

/// Errors raised while merging collector artifacts into layers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    /// One collector registered two implementations under the same key.
    #[error("collector '{collector}' registers capability '{capability}' twice under {key}")]
    DuplicateRegistration {
        /// `namespace/identify` of the collector.
        collector: String,
        /// Capability name.
        capability: &'static str,
        /// Rendered full key.
        key: String,
    },

    /// No exported collector matches the requested subset.
    #[error("no exported collector matches subset '{subset}'")]
    UnknownSubset {
        /// The requested `namespace[/identify]`.
        subset: String,
    },
}

/// Result type for compose operations.
pub type ComposeResult<T> = Result<T, ComposeError>;

// =============================================================================
// Staff Errors
// =============================================================================

/// Errors raised while resolving or running a capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StaffError {
    /// No layer holds an implementation matching the arguments.
    #[error("no implementation of capability '{capability}' matches the given arguments")]
    Unresolvable {
        /// Capability name.
        capability: &'static str,
    },

    /// A performer asked for a component the staff does not carry.
    #[error("performer '{performer}' requires component '{component}', which is missing")]
    MissingComponent {
        /// Performer type name.
        performer: &'static str,
        /// Component name.
        component: String,
    },

    /// A component exists but holds a different type.
    #[error("component '{component}' requested by '{performer}' is not a {expected}")]
    ComponentType {
        /// Performer type name.
        performer: &'static str,
        /// Component name.
        component: String,
        /// Expected Rust type.
        expected: &'static str,
    },

    /// `call_optional` was used on a capability not declared optional.
    #[error("capability '{capability}' is not declared optional")]
    NotOptional {
        /// Capability name.
        capability: &'static str,
    },

    /// A stored implementation does not match the capability's signature.
    #[error("implementation of capability '{capability}' has a mismatched signature")]
    ShapeMismatch {
        /// Capability name.
        capability: &'static str,
    },
}

impl StaffError {
    /// Returns `true` if `err` carries [`StaffError::Unresolvable`].
    pub fn is_unresolvable(err: &BoxError) -> bool {
        matches!(
            err.downcast_ref::<StaffError>(),
            Some(StaffError::Unresolvable { .. })
        )
    }
}

/// Result type for staff operations.
pub type StaffResult<T> = Result<T, StaffError>;
