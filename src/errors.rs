//! Error Types
//!
//! This module defines the error types returned by structural world operations.
//!
//! # Overview
//!
//! The main error type [`WorldError`] covers the recoverable failure modes:
//! - Stale or foreign object and component handles
//! - Component ownership conflicts
//! - Rejected hierarchy changes (cycles, depth overflow)
//! - Global key collisions
//!
//! Lookups through stale handles never produce an error value; they return
//! `None`. Contract violations are reported through [`contract_violation`],
//! which logs and, in strict mode, panics.
//!
//! # Usage
//!
//! ```rust,ignore
//! use scenegraph::errors::{WorldError, Result};
//!
//! fn reparent(world: &mut World, child: ObjectHandle, parent: ObjectHandle) -> Result<()> {
//!     world.set_parent(child, Some(parent), Preserve::Global)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::world::{ComponentHandle, ObjectHandle};

/// The main error type for world operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorldError {
    // ========================================================================
    // Handle Errors
    // ========================================================================
    /// The object handle does not refer to a live object.
    #[error("Invalid object handle: {0:?}")]
    InvalidHandle(ObjectHandle),

    /// The component handle does not refer to a live component.
    #[error("Invalid component handle: {0:?}")]
    InvalidComponent(ComponentHandle),

    // ========================================================================
    // Component Ownership Errors
    // ========================================================================
    /// The component is already attached to an object.
    #[error("Component {component:?} is already owned by {owner:?}")]
    AlreadyOwned {
        /// The component that was being attached
        component: ComponentHandle,
        /// Its current owner
        owner: ObjectHandle,
    },

    /// The component is not in the object's component list.
    #[error("Component {component:?} is not attached to {object:?}")]
    ComponentNotFound {
        /// The component that was being removed
        component: ComponentHandle,
        /// The object it was expected on
        object: ObjectHandle,
    },

    // ========================================================================
    // Hierarchy Errors
    // ========================================================================
    /// Re-parenting would make an object its own ancestor.
    #[error("Cannot parent {child:?} under {parent:?}: the parent is inside the child's subtree")]
    CyclicHierarchy {
        /// The object being re-parented
        child: ObjectHandle,
        /// The rejected new parent
        parent: ObjectHandle,
    },

    /// Re-parenting would push part of the subtree past the deepest
    /// representable hierarchy level.
    #[error("Cannot parent {child:?} under {parent:?}: the hierarchy would exceed {max} levels", max = u16::MAX)]
    HierarchyTooDeep {
        /// The object being re-parented
        child: ObjectHandle,
        /// The rejected new parent
        parent: ObjectHandle,
    },

    // ========================================================================
    // Naming Errors
    // ========================================================================
    /// Another live object already uses this global key.
    #[error("Global key already in use: {0}")]
    GlobalKeyInUse(String),
}

/// Alias for `Result<T, WorldError>`.
pub type Result<T> = std::result::Result<T, WorldError>;

/// Reports a caller bug that the world refuses to act on.
///
/// Always logged. With `strict` set (the default in debug builds) this panics,
/// otherwise the caller continues with a best-effort no-op.
#[track_caller]
pub(crate) fn contract_violation(strict: bool, world_name: &str, message: std::fmt::Arguments<'_>) {
    log::error!("[{world_name}] contract violation: {message}");
    if strict {
        panic!("[{world_name}] contract violation: {message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_contract_violation_does_not_panic() {
        contract_violation(false, "test", format_args!("nothing to see"));
    }

    #[test]
    #[should_panic(expected = "contract violation")]
    fn strict_contract_violation_panics() {
        contract_violation(true, "test", format_args!("boom"));
    }
}
