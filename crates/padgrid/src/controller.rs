//! Controllers: device/view boundary adapters.
//!
//! A controller binds a physical grid device's coordinate space to a
//! rectangle of some view (usually a [`TopView`](crate::view::TopView)).
//! Device input enters through [`Controller::emit_press`] /
//! [`Controller::emit_release`]; state changes inside the bound
//! rectangle come back out through the controller's
//! [`button_state_changed`](Controller::connect_button_state_changed)
//! and [`led_refreshed`](Controller::connect_led_refreshed) listeners,
//! translated into controller-local coordinates.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use slotmap::new_key_type;

use padgrid_core::{ConnectionId, Signal};

use crate::error::{GridError, GridResult};
use crate::event::{ButtonEvent, LedEvent, LedRefresh, Source};
use crate::geometry::{Bounds, Point, Size};
use crate::tree::{ViewId, ViewTree};
use crate::view::Viewable;

new_key_type! {
    /// A unique identifier for a controller registered with a tree.
    pub struct ControllerId;
}

/// An installed view binding.
struct Binding {
    view: ViewId,
    origin: Point,
    button_conn: ConnectionId,
    led_conn: ConnectionId,
}

type Hook = Box<dyn FnOnce() + Send>;

struct ControllerShared {
    tree: ViewTree,
    id: ControllerId,
    size: Size,
    binding: Mutex<Option<Binding>>,
    removed: AtomicBool,
    button_state_changed: Arc<Signal<ButtonEvent>>,
    led_refreshed: Arc<Signal<LedEvent>>,
    cleanup: Mutex<Option<Hook>>,
    on_remove: Mutex<Option<Hook>>,
}

impl Drop for ControllerShared {
    fn drop(&mut self) {
        // A controller dropped without remove() must not leave stale
        // listeners or a dangling registry entry behind.
        if !self.removed.load(Ordering::SeqCst) {
            if let Some(binding) = self.binding.get_mut().take() {
                let _ = self
                    .tree
                    .disconnect_button_state_changed(binding.view, binding.button_conn);
                let _ = self.tree.disconnect_led_refreshed(binding.view, binding.led_conn);
            }
            self.tree.deregister_controller(self.id);
        }
    }
}

/// A device/view boundary adapter.
///
/// Cloning is cheap; all clones refer to the same controller.
#[derive(Clone)]
pub struct Controller {
    shared: Arc<ControllerShared>,
}

impl Controller {
    /// Create a controller together with a fresh, matching
    /// [`TopView`](crate::view::TopView) bound at (0, 0).
    pub fn new(tree: &ViewTree, num_cols: i32, num_rows: i32) -> GridResult<Self> {
        let controller = Self::construct(tree, num_cols, num_rows)?;
        let top = tree.create_top(Size::new(num_cols, num_rows), true)?;
        controller.attach_inner(top, Point::ZERO)?;
        tree.announce_controller(controller.shared.id);
        Ok(controller)
    }

    /// Create an unbound controller.
    ///
    /// While detached, `emit_press`/`emit_release` have no effect and
    /// every point reports released and unlit.
    pub fn new_detached(tree: &ViewTree, num_cols: i32, num_rows: i32) -> GridResult<Self> {
        let controller = Self::construct(tree, num_cols, num_rows)?;
        tree.announce_controller(controller.shared.id);
        Ok(controller)
    }

    /// Create a controller bound to a rectangle of an existing view.
    pub fn with_view<V: Viewable>(
        num_cols: i32,
        num_rows: i32,
        view: &V,
        origin: impl Into<Point>,
    ) -> GridResult<Self> {
        let controller = Self::construct(view.tree(), num_cols, num_rows)?;
        controller.attach_inner(view.id(), origin.into())?;
        controller.shared.tree.announce_controller(controller.shared.id);
        Ok(controller)
    }

    fn construct(tree: &ViewTree, num_cols: i32, num_rows: i32) -> GridResult<Self> {
        let size = Size::new(num_cols, num_rows);
        if size.num_cols < 1 || size.num_rows < 1 {
            return Err(GridError::InvalidSize { size });
        }
        let id = tree.register_controller();
        Ok(Self {
            shared: Arc::new(ControllerShared {
                tree: tree.clone(),
                id,
                size,
                binding: Mutex::new(None),
                removed: AtomicBool::new(false),
                button_state_changed: Arc::new(Signal::new()),
                led_refreshed: Arc::new(Signal::new()),
                cleanup: Mutex::new(None),
                on_remove: Mutex::new(None),
            }),
        })
    }

    // =========================================================================
    // Identity and bounds
    // =========================================================================

    /// This controller's registry identifier.
    pub fn id(&self) -> ControllerId {
        self.shared.id
    }

    /// The identity this controller presents as a button-event source.
    pub fn source(&self) -> Source {
        Source::Controller(self.shared.id)
    }

    /// The controller's width in buttons.
    pub fn num_cols(&self) -> i32 {
        self.shared.size.num_cols
    }

    /// The controller's height in buttons.
    pub fn num_rows(&self) -> i32 {
        self.shared.size.num_rows
    }

    /// The controller's size.
    pub fn size(&self) -> Size {
        self.shared.size
    }

    /// The total number of buttons.
    pub fn num_buttons(&self) -> i32 {
        self.shared.size.area()
    }

    fn validate_contains_point(&self, point: Point) -> GridResult<()> {
        if Bounds::from_size(self.shared.size).contains_point(point) {
            Ok(())
        } else {
            Err(GridError::OutOfControllerBounds {
                point,
                size: self.shared.size,
            })
        }
    }

    // =========================================================================
    // Attaching and detaching
    // =========================================================================

    /// The bound view, if attached.
    pub fn view(&self) -> Option<ViewId> {
        self.shared.binding.lock().as_ref().map(|b| b.view)
    }

    /// The binding origin within the bound view, if attached.
    pub fn origin(&self) -> Option<Point> {
        self.shared.binding.lock().as_ref().map(|b| b.origin)
    }

    /// Whether the controller is bound to a view.
    pub fn is_attached(&self) -> bool {
        self.shared.binding.lock().is_some()
    }

    /// Whether the controller is unbound.
    pub fn is_detached(&self) -> bool {
        !self.is_attached()
    }

    /// Bind the controller to the rectangle of `view` at `origin`, then
    /// report the rectangle's full current state to the device side.
    ///
    /// Errors when already attached or when the rectangle does not fit
    /// inside the view.
    pub fn attach<V: Viewable>(&self, view: &V, origin: impl Into<Point>) -> GridResult<()> {
        let origin = origin.into();
        self.attach_inner(view.id(), origin)?;
        self.refresh();
        if self.shared.tree.config().indicate_on_structure_change {
            self.indicate(None, None)?;
        }
        Ok(())
    }

    fn attach_inner(&self, view: ViewId, origin: Point) -> GridResult<()> {
        let tree = &self.shared.tree;
        let mut binding = self.shared.binding.lock();
        if binding.is_some() {
            return Err(GridError::AlreadyAttached);
        }
        let footprint = Bounds::new(origin, self.shared.size);
        let view_size = tree.size(view)?;
        if !Bounds::from_size(view_size).contains_bounds(footprint) {
            return Err(GridError::BoundsNotContained {
                bounds: footprint,
                size: view_size,
            });
        }

        // When the rectangle covers the whole view no bounds filter is
        // needed; otherwise events outside the rectangle are dropped.
        let whole_view = origin == Point::ZERO && view_size == self.shared.size;

        let button_out = self.shared.button_state_changed.clone();
        let button_conn = tree.connect_button_state_changed(view, move |event: &ButtonEvent| {
            if whole_view || footprint.contains_point(event.point) {
                button_out.emit(&ButtonEvent {
                    point: event.point - origin,
                    pressed: event.pressed,
                });
            }
        })?;

        let led_out = self.shared.led_refreshed.clone();
        let led_conn = tree.connect_led_refreshed(view, move |event: &LedRefresh| {
            if whole_view || footprint.contains_point(event.point) {
                led_out.emit(&LedEvent {
                    point: event.point - origin,
                    on: event.on,
                });
            }
        })?;

        *binding = Some(Binding {
            view,
            origin,
            button_conn,
            led_conn,
        });
        tracing::trace!(
            target: "padgrid::controller",
            controller = ?self.shared.id, ?view, %origin,
            "controller attached"
        );
        Ok(())
    }

    /// Unbind the controller, then report every point released and unlit
    /// to the device side. Errors when already detached.
    pub fn detach(&self) -> GridResult<()> {
        let binding = {
            self.shared
                .binding
                .lock()
                .take()
                .ok_or(GridError::AlreadyDetached)?
        };
        let tree = &self.shared.tree;
        tree.disconnect_button_state_changed(binding.view, binding.button_conn)?;
        tree.disconnect_led_refreshed(binding.view, binding.led_conn)?;
        tracing::trace!(
            target: "padgrid::controller",
            controller = ?self.shared.id, view = ?binding.view,
            "controller detached"
        );

        self.refresh();

        if tree.config().indicate_on_structure_change {
            let footprint = Bounds::new(binding.origin, self.shared.size);
            let _ = tree.indicate_bounds(binding.view, footprint, None, None);
        }
        Ok(())
    }

    /// Re-report the full controller-local state: one button and one LED
    /// notification per point. While detached every point reports
    /// released and unlit.
    pub fn refresh(&self) {
        for point in Bounds::from_size(self.shared.size).points() {
            let pressed = self.is_pressed_at(point).unwrap_or(false);
            self.shared
                .button_state_changed
                .emit(&ButtonEvent { point, pressed });
            let on = self.is_lit_at(point).unwrap_or(false);
            self.shared.led_refreshed.emit(&LedEvent { point, on });
        }
    }

    /// Blink the controller's rectangle on the bound view. Errors when
    /// detached.
    pub fn indicate(&self, repeat: Option<usize>, interval: Option<Duration>) -> GridResult<()> {
        let (view, origin) = self.binding_coords().ok_or(GridError::AlreadyDetached)?;
        let footprint = Bounds::new(origin, self.shared.size);
        self.shared
            .tree
            .indicate_bounds(view, footprint, repeat, interval)
    }

    fn binding_coords(&self) -> Option<(ViewId, Point)> {
        self.shared
            .binding
            .lock()
            .as_ref()
            .map(|b| (b.view, b.origin))
    }

    // =========================================================================
    // Device input
    // =========================================================================

    /// Forward a device press at the controller-local `point` into the
    /// bound view. Validates the point; has no effect while detached.
    pub fn emit_press(&self, point: impl Into<Point>) -> GridResult<()> {
        self.emit_button_event(point.into(), true)
    }

    /// Forward a device release at the controller-local `point` into the
    /// bound view. Validates the point; has no effect while detached.
    pub fn emit_release(&self, point: impl Into<Point>) -> GridResult<()> {
        self.emit_button_event(point.into(), false)
    }

    fn emit_button_event(&self, point: Point, pressed: bool) -> GridResult<()> {
        self.validate_contains_point(point)?;
        if let Some((view, origin)) = self.binding_coords() {
            self.shared
                .tree
                .handle_button_event(view, self.source(), origin + point, pressed)?;
        }
        Ok(())
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Whether the button at the controller-local `point` is pressed on
    /// the bound view. `false` while detached.
    pub fn is_pressed_at(&self, point: impl Into<Point>) -> GridResult<bool> {
        let point = point.into();
        self.validate_contains_point(point)?;
        match self.binding_coords() {
            Some((view, origin)) => self.shared.tree.is_pressed_at(view, origin + point),
            None => Ok(false),
        }
    }

    /// Whether the button at the controller-local `point` is released.
    pub fn is_released_at(&self, point: impl Into<Point>) -> GridResult<bool> {
        Ok(!self.is_pressed_at(point)?)
    }

    /// Whether this controller itself holds the button at `point` on the
    /// bound top view. `false` while detached.
    pub fn is_pressed_by_this_controller_at(&self, point: impl Into<Point>) -> GridResult<bool> {
        let point = point.into();
        self.validate_contains_point(point)?;
        match self.binding_coords() {
            Some((view, origin)) => {
                self.shared
                    .tree
                    .is_pressed_by_source_at(view, self.source(), origin + point)
            }
            None => Ok(false),
        }
    }

    /// Whether this controller does not hold the button at `point`.
    pub fn is_released_by_this_controller_at(&self, point: impl Into<Point>) -> GridResult<bool> {
        Ok(!self.is_pressed_by_this_controller_at(point)?)
    }

    /// The lit state at the controller-local `point`. `false` while
    /// detached.
    pub fn is_lit_at(&self, point: impl Into<Point>) -> GridResult<bool> {
        let point = point.into();
        self.validate_contains_point(point)?;
        match self.binding_coords() {
            Some((view, origin)) => self.shared.tree.is_lit_at(view, origin + point),
            None => Ok(false),
        }
    }

    /// The unlit state at the controller-local `point`.
    pub fn is_unlit_at(&self, point: impl Into<Point>) -> GridResult<bool> {
        Ok(!self.is_lit_at(point)?)
    }

    // =========================================================================
    // Removal
    // =========================================================================

    /// Whether the controller has been removed.
    pub fn is_removed(&self) -> bool {
        self.shared.removed.load(Ordering::SeqCst)
    }

    /// Install a hook run first during [`remove`](Self::remove), while
    /// the view binding is still in place.
    pub fn set_cleanup<F: FnOnce() + Send + 'static>(&self, f: F) {
        *self.shared.cleanup.lock() = Some(Box::new(f));
    }

    /// Install a hook run last during [`remove`](Self::remove).
    pub fn set_on_remove<F: FnOnce() + Send + 'static>(&self, f: F) {
        *self.shared.on_remove.lock() = Some(Box::new(f));
    }

    /// Remove the controller: run the cleanup hook, detach if attached,
    /// deregister from the tree, then run the on-remove hook.
    pub fn remove(&self) -> GridResult<()> {
        if self.shared.removed.swap(true, Ordering::SeqCst) {
            return Err(GridError::ControllerRemoved);
        }
        if let Some(cleanup) = self.shared.cleanup.lock().take() {
            cleanup();
        }
        if self.is_attached() {
            self.detach()?;
        }
        self.shared.tree.deregister_controller(self.shared.id);
        if let Some(on_remove) = self.shared.on_remove.lock().take() {
            on_remove();
        }
        Ok(())
    }

    // =========================================================================
    // Device-side listeners
    // =========================================================================

    /// Connect a listener for translated button-state changes inside the
    /// controller's rectangle.
    pub fn connect_button_state_changed<F>(&self, f: F) -> ConnectionId
    where
        F: Fn(&ButtonEvent) + Send + Sync + 'static,
    {
        self.shared.button_state_changed.connect(f)
    }

    /// Disconnect a button-state-changed listener.
    pub fn disconnect_button_state_changed(&self, conn: ConnectionId) -> bool {
        self.shared.button_state_changed.disconnect(conn)
    }

    /// Connect a listener for translated LED updates inside the
    /// controller's rectangle.
    pub fn connect_led_refreshed<F>(&self, f: F) -> ConnectionId
    where
        F: Fn(&LedEvent) + Send + Sync + 'static,
    {
        self.shared.led_refreshed.connect(f)
    }

    /// Disconnect an LED-refreshed listener.
    pub fn disconnect_led_refreshed(&self, conn: ConnectionId) -> bool {
        self.shared.led_refreshed.disconnect(conn)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;
    use crate::view::{ContainerViewable, TopView, View, Viewable};

    #[test]
    fn test_new_creates_and_binds_top_view() {
        let tree = ViewTree::new();
        let controller = Controller::new(&tree, 8, 8).unwrap();
        assert!(controller.is_attached());
        assert_eq!(controller.origin(), Some(Point::ZERO));
        let view = controller.view().unwrap();
        assert_eq!(tree.size(view).unwrap(), Size::new(8, 8));
    }

    #[test]
    fn test_emit_press_translates_coordinates() {
        let tree = ViewTree::new();
        let top = TopView::new(&tree, 8, 8).unwrap();
        let controller = Controller::with_view(4, 4, &top, (2, 2)).unwrap();

        controller.emit_press((1, 1)).unwrap();
        assert!(top.is_pressed_at((3, 3)).unwrap());
        assert!(controller.is_pressed_at((1, 1)).unwrap());
        assert!(controller.is_pressed_by_this_controller_at((1, 1)).unwrap());

        controller.emit_release((1, 1)).unwrap();
        assert!(top.is_released_at((3, 3)).unwrap());
    }

    #[test]
    fn test_led_events_translate_back() {
        let tree = ViewTree::new();
        let top = TopView::new(&tree, 8, 8).unwrap();
        let controller = Controller::with_view(4, 4, &top, (2, 2)).unwrap();

        let inner = View::attached(&top, (3, 3), 1, 1).unwrap();
        inner.set_lit_state_fn(|_| true).unwrap();

        let leds = Arc::new(StdMutex::new(Vec::new()));
        let leds_clone = leds.clone();
        controller.connect_led_refreshed(move |e| {
            leds_clone.lock().unwrap().push(*e);
        });

        inner.refresh().unwrap();

        let leds = leds.lock().unwrap();
        assert_eq!(leds.len(), 1);
        assert_eq!(leds[0].point, Point::new(1, 1));
        assert!(leds[0].on);
    }

    #[test]
    fn test_led_events_outside_rectangle_are_dropped() {
        let tree = ViewTree::new();
        let top = TopView::new(&tree, 8, 8).unwrap();
        let controller = Controller::with_view(2, 2, &top, (0, 0)).unwrap();

        let leds = Arc::new(StdMutex::new(Vec::new()));
        let leds_clone = leds.clone();
        controller.connect_led_refreshed(move |e| {
            leds_clone.lock().unwrap().push(*e);
        });

        let inner = View::attached(&top, (5, 5), 1, 1).unwrap();
        inner.set_lit_state_fn(|_| true).unwrap();
        inner.refresh().unwrap();
        assert!(leds.lock().unwrap().is_empty());
    }

    #[test]
    fn test_emit_out_of_bounds_fails() {
        let tree = ViewTree::new();
        let controller = Controller::new(&tree, 4, 4).unwrap();
        assert!(matches!(
            controller.emit_press((4, 0)),
            Err(GridError::OutOfControllerBounds { .. })
        ));
    }

    #[test]
    fn test_detached_controller_is_inert() {
        let tree = ViewTree::new();
        let controller = Controller::new_detached(&tree, 4, 4).unwrap();
        assert!(controller.is_detached());
        controller.emit_press((1, 1)).unwrap();
        assert!(!controller.is_pressed_at((1, 1)).unwrap());
        assert!(!controller.is_lit_at((1, 1)).unwrap());
        assert!(!controller.is_pressed_by_this_controller_at((1, 1)).unwrap());
    }

    #[test]
    fn test_attach_validations() {
        let tree = ViewTree::new();
        let top = TopView::new(&tree, 4, 4).unwrap();
        let controller = Controller::with_view(4, 4, &top, (0, 0)).unwrap();

        let other = TopView::new(&tree, 8, 8).unwrap();
        assert!(matches!(
            controller.attach(&other, (0, 0)),
            Err(GridError::AlreadyAttached)
        ));

        controller.detach().unwrap();
        assert!(matches!(controller.detach(), Err(GridError::AlreadyDetached)));

        // A 4x4 rectangle at (6, 6) does not fit an 8x8 view.
        assert!(matches!(
            controller.attach(&other, (6, 6)),
            Err(GridError::BoundsNotContained { .. })
        ));
        controller.attach(&other, (4, 4)).unwrap();
        assert!(controller.is_attached());
    }

    #[test]
    fn test_detach_reports_everything_off() {
        let tree = ViewTree::new();
        let top = TopView::new(&tree, 2, 2).unwrap();
        let controller = Controller::with_view(2, 2, &top, (0, 0)).unwrap();
        top.set_lit_state_fn(|_| true).unwrap();

        let leds = Arc::new(StdMutex::new(Vec::new()));
        let leds_clone = leds.clone();
        controller.connect_led_refreshed(move |e| {
            leds_clone.lock().unwrap().push(*e);
        });

        controller.detach().unwrap();
        let leds = leds.lock().unwrap();
        assert_eq!(leds.len(), 4);
        assert!(leds.iter().all(|e| !e.on));
    }

    #[test]
    fn test_two_controllers_share_a_top_view() {
        let tree = ViewTree::new();
        let top = TopView::new(&tree, 4, 4).unwrap();
        let first = Controller::with_view(4, 4, &top, (0, 0)).unwrap();
        let second = Controller::with_view(4, 4, &top, (0, 0)).unwrap();

        first.emit_press((1, 1)).unwrap();
        second.emit_press((1, 1)).unwrap();
        assert!(top.is_pressed_at((1, 1)).unwrap());

        first.emit_release((1, 1)).unwrap();
        // The second controller still holds the button.
        assert!(top.is_pressed_at((1, 1)).unwrap());
        assert!(!first.is_pressed_by_this_controller_at((1, 1)).unwrap());
        assert!(second.is_pressed_by_this_controller_at((1, 1)).unwrap());

        second.emit_release((1, 1)).unwrap();
        assert!(top.is_released_at((1, 1)).unwrap());
    }

    #[test]
    fn test_registry_and_removal_order() {
        let tree = ViewTree::new();
        let order = Arc::new(StdMutex::new(Vec::new()));

        let order_clone = order.clone();
        tree.connect_controller_registered(move |_| {
            order_clone.lock().unwrap().push("registered");
        });

        let controller = Controller::new(&tree, 4, 4).unwrap();
        assert_eq!(tree.controller_count(), 1);
        assert!(tree.controller_ids().contains(&controller.id()));

        let order_clone = order.clone();
        controller.set_cleanup(move || {
            order_clone.lock().unwrap().push("cleanup");
        });
        let order_clone = order.clone();
        controller.set_on_remove(move || {
            order_clone.lock().unwrap().push("on_remove");
        });

        controller.remove().unwrap();
        assert!(controller.is_removed());
        assert!(controller.is_detached());
        assert_eq!(tree.controller_count(), 0);
        assert_eq!(
            *order.lock().unwrap(),
            vec!["registered", "cleanup", "on_remove"]
        );
        assert!(matches!(
            controller.remove(),
            Err(GridError::ControllerRemoved)
        ));
    }

    #[test]
    fn test_drop_without_remove_deregisters() {
        let tree = ViewTree::new();
        {
            let _controller = Controller::new(&tree, 4, 4).unwrap();
            assert_eq!(tree.controller_count(), 1);
        }
        assert_eq!(tree.controller_count(), 0);
    }
}
