//! Error types for the padgrid toolkit.
//!
//! Every variant is a contract violation by the embedding application, not
//! a recoverable runtime condition: operations validate first and mutate
//! only once all validations for the call have passed, so a returned error
//! leaves the view tree unchanged.

use thiserror::Error;

use crate::geometry::{Bounds, Point, Size};

/// Errors that can occur during grid operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    /// The view ID does not refer to a view of this tree.
    #[error("invalid view id")]
    InvalidViewId,

    /// A view was constructed with a size below the 1x1 minimum.
    #[error("minimum view size is 1x1, got {size}")]
    InvalidSize { size: Size },

    /// A point fell outside a view's extent.
    #[error("point {point} not within bounds of a {size} view")]
    OutOfBounds { point: Point, size: Size },

    /// A sub-rectangle fell outside a view's extent.
    #[error("bounds ({bounds}) not within bounds of a {size} view")]
    BoundsNotContained { bounds: Bounds, size: Size },

    /// A point fell outside a controller's extent.
    #[error("point {point} not within bounds of a {size} controller")]
    OutOfControllerBounds { point: Point, size: Size },

    /// A child view origin had a negative component.
    #[error("child view origin may not be negative, got {origin}")]
    NegativeOrigin { origin: Point },

    /// The view already has a parent.
    #[error("view already has a parent")]
    AlreadyHasParent,

    /// Adding the child would make a view an ancestor of itself.
    #[error("cannot add a view as a child of itself or of its own descendants")]
    CircularParentage,

    /// Top views are tree roots and may not be parented.
    #[error("a top view may not be added as a child to another view")]
    TopViewAsChild,

    /// Local press/release carry no source identity, which top views need.
    #[error("local press and release are not available on a top view")]
    TopViewLocalInput,

    /// The view is not a child of the given container.
    #[error("view is not a child of this container")]
    NotAChild,

    /// The operation requires a container view.
    #[error("view is not a container")]
    NotAContainer,

    /// The operation requires a switcher.
    #[error("view is not a switcher")]
    NotASwitcher,

    /// The operation requires a top view.
    #[error("view is not a top view")]
    NotATopView,

    /// The view has no parent.
    #[error("view has no parent")]
    NoParent,

    /// The operation requires an enabled view.
    #[error("view is disabled")]
    Disabled,

    /// Enable was called on an already-enabled view.
    #[error("view is already enabled")]
    AlreadyEnabled,

    /// Disable was called on an already-disabled view.
    #[error("view is already disabled")]
    AlreadyDisabled,

    /// The container constructs and owns its children internally.
    #[error("children of this container are managed internally and may not be changed directly")]
    ManagedChildren,

    /// Switcher children may only be switched via the switcher value.
    #[error("children of a switcher may not be enabled or disabled directly; set the switcher value instead")]
    SwitcherManagedChild,

    /// A child index was out of range.
    #[error("bad child index {index}, view has {count} children")]
    IndexOutOfRange { index: usize, count: usize },

    /// No child with the requested name exists.
    #[error("no child named {name:?}")]
    NoSuchChild { name: String },

    /// More than one child carries the requested name.
    #[error("more than one child named {name:?}")]
    AmbiguousChildName { name: String },

    /// The controller is already attached to a view.
    #[error("controller is already attached to a view")]
    AlreadyAttached,

    /// The controller is already detached.
    #[error("controller is already detached")]
    AlreadyDetached,

    /// The controller has already been removed.
    #[error("controller has already been removed")]
    ControllerRemoved,

    /// A widget-level value failed validation.
    #[error("invalid value: {reason}")]
    InvalidValue { reason: String },
}

/// A specialized Result type for grid operations.
pub type GridResult<T> = Result<T, GridError>;
