//! Event payloads crossing the toolkit's listener boundaries.

use crate::controller::ControllerId;
use crate::geometry::Point;
use crate::tree::ViewId;

/// Identity of a button-event originator.
///
/// Top views aggregate presses per source, so the same point may be held
/// by several controllers at once and is released only when every source
/// has let go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// A local `press`/`release` call on a view.
    View(ViewId),
    /// Input forwarded by a controller from an external device.
    Controller(ControllerId),
}

/// A button-state change, in the coordinates of the view whose listeners
/// receive it. Also the payload of a controller's outbound button
/// notifications, in controller-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonEvent {
    pub point: Point,
    pub pressed: bool,
}

/// An LED refresh delivered to a view's LED listeners.
///
/// `source` is the view whose lit state produced the refresh; `point` is
/// translated into the coordinates of the view whose listeners receive
/// the event as the refresh is forwarded up the parent chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedRefresh {
    pub source: ViewId,
    pub point: Point,
    pub on: bool,
}

/// An LED update reported by a controller, in controller-local
/// coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedEvent {
    pub point: Point,
    pub on: bool,
}

/// One entry of the response list returned by press/release routing:
/// a view that performed a genuine state transition, and the point in
/// that view's coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handled {
    pub view: ViewId,
    pub point: Point,
}
