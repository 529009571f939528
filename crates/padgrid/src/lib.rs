//! padgrid: a hardware-agnostic grid-controller UI toolkit.
//!
//! padgrid models an LED/button grid (a monome-style controller) as a
//! tree of rectangular views:
//!
//! - **View Tree**: an arena-owned hierarchy routing button presses down
//!   to the topmost enabled view covering each point, and LED refreshes
//!   up through enabled ancestors
//! - **Views**: plain surfaces, containers, and multi-source-aware top
//!   views, all sharing the [`Viewable`] capability surface
//! - **Controllers**: adapters mapping a physical device's coordinate
//!   space onto a rectangle of the tree, translating events both ways
//! - **Widgets**: buttons, toggles, multi-button/toggle banks and step
//!   views, composed from plain views plus a value model
//!
//! Event propagation is synchronous and deterministic; the only
//! background activity is the timer thread driving flash and indicate
//! effects.
//!
//! # Example
//!
//! ```
//! use padgrid::{Controller, ViewTree, Viewable};
//! use padgrid::widget::Button;
//!
//! fn main() -> padgrid::GridResult<()> {
//!     let tree = ViewTree::new();
//!
//!     // A controller with its own 8x8 top view, as a device would see it.
//!     let controller = Controller::new(&tree, 8, 8)?;
//!     controller.connect_led_refreshed(|led| {
//!         println!("led {} -> {}", led.point, led.on);
//!     });
//!
//!     // A toggle button in the top-left corner.
//!     let button = Button::new(&tree, 2, 2)?;
//!     tree.add_child(controller.view().unwrap(), button.id(), (0, 0).into())?;
//!
//!     // Device input flows through the controller into the button.
//!     controller.emit_press((1, 1))?;
//!     controller.emit_release((1, 1))?;
//!     assert!(button.value());
//!     Ok(())
//! }
//! ```

pub mod config;
mod controller;
mod error;
mod event;
pub mod geometry;
mod switcher;
mod tree;
mod view;
pub mod widget;

pub use config::GridConfig;
pub use controller::{Controller, ControllerId};
pub use error::{GridError, GridResult};
pub use event::{ButtonEvent, Handled, LedEvent, LedRefresh, Source};
pub use geometry::{Bounds, Point, Size};
pub use switcher::Switcher;
pub use tree::{LitStateFn, ViewId, ViewTree, WeakViewTree};
pub use view::{ContainerView, ContainerViewable, TopView, View, Viewable};

// Re-export the connection handle used by every listener surface.
pub use padgrid_core::ConnectionId;
