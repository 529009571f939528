//! View handles.
//!
//! Views are owned by their [`ViewTree`]; the types here are thin
//! `(tree, id)` handles. [`Viewable`] is the capability surface every
//! view kind shares (bounds, pressed state, lit state, listeners, visual
//! effects); [`ContainerViewable`] adds composition. Widgets implement
//! [`Viewable`] too, so anything that works on a plain [`View`] works on
//! a button or toggle.

use std::time::Duration;

use padgrid_core::ConnectionId;

use crate::error::GridResult;
use crate::event::{ButtonEvent, Handled, LedRefresh, Source};
use crate::geometry::{Bounds, Point, Size};
use crate::tree::{ViewId, ViewTree};

/// The capability surface shared by every view kind.
pub trait Viewable {
    /// The tree owning this view.
    fn tree(&self) -> &ViewTree;

    /// This view's identifier.
    fn id(&self) -> ViewId;

    // =========================================================================
    // Bounds
    // =========================================================================

    /// The view's size.
    fn size(&self) -> GridResult<Size> {
        self.tree().size(self.id())
    }

    /// The view's width in buttons.
    fn num_cols(&self) -> GridResult<i32> {
        Ok(self.size()?.num_cols)
    }

    /// The view's height in buttons.
    fn num_rows(&self) -> GridResult<i32> {
        Ok(self.size()?.num_rows)
    }

    /// The total number of buttons on this view.
    fn num_buttons(&self) -> GridResult<i32> {
        Ok(self.size()?.area())
    }

    /// The view's bounds, anchored at (0, 0).
    fn bounds(&self) -> GridResult<Bounds> {
        self.tree().bounds(self.id())
    }

    /// Check if a point lies within this view.
    fn contains_point(&self, point: impl Into<Point>) -> GridResult<bool> {
        self.tree().contains_point(self.id(), point.into())
    }

    /// Check if a sub-rectangle lies within this view.
    fn contains_bounds(&self, bounds: Bounds) -> GridResult<bool> {
        self.tree().contains_bounds(self.id(), bounds)
    }

    // =========================================================================
    // Naming
    // =========================================================================

    /// The view's name, if set.
    fn name(&self) -> GridResult<Option<String>> {
        self.tree().name(self.id())
    }

    /// Name the view, for lookup and diagnostics.
    fn set_name(&self, name: impl Into<String>) -> GridResult<()> {
        self.tree().set_name(self.id(), name)
    }

    // =========================================================================
    // Parent
    // =========================================================================

    /// The parent view, if attached.
    fn parent_id(&self) -> GridResult<Option<ViewId>> {
        self.tree().parent(self.id())
    }

    /// The origin within the parent, if attached.
    fn origin(&self) -> GridResult<Option<Point>> {
        self.tree().origin(self.id())
    }

    /// Whether the view is attached to a parent.
    fn has_parent(&self) -> GridResult<bool> {
        Ok(self.parent_id()?.is_some())
    }

    /// Whether the view is detached.
    fn is_detached(&self) -> GridResult<bool> {
        Ok(self.parent_id()?.is_none())
    }

    /// Detach the view from its parent. Errors when it has none.
    fn remove(&self) -> GridResult<()> {
        self.tree().remove_from_parent(self.id())
    }

    /// Move this view to the top of its parent's z-order. A no-op for
    /// detached views.
    fn bring_to_front(&self) -> GridResult<()> {
        if let Some(parent) = self.parent_id()? {
            self.tree().bring_child_to_front(parent, self.id())?;
        }
        Ok(())
    }

    /// Move this view to the bottom of its parent's z-order. A no-op for
    /// detached views.
    fn send_to_back(&self) -> GridResult<()> {
        if let Some(parent) = self.parent_id()? {
            self.tree().send_child_to_back(parent, self.id())?;
        }
        Ok(())
    }

    // =========================================================================
    // Enable / disable
    // =========================================================================

    /// Whether the view is enabled.
    fn is_enabled(&self) -> GridResult<bool> {
        self.tree().is_enabled(self.id())
    }

    /// Whether the view is disabled.
    fn is_disabled(&self) -> GridResult<bool> {
        Ok(!self.is_enabled()?)
    }

    /// Enable the view.
    fn enable(&self) -> GridResult<()> {
        self.tree().enable(self.id())
    }

    /// Disable the view, releasing everything pressed on it and its
    /// enabled descendants.
    fn disable(&self) -> GridResult<()> {
        self.tree().disable(self.id())
    }

    // =========================================================================
    // Button state
    // =========================================================================

    /// Press the button at `point` as a local event.
    fn press(&self, point: impl Into<Point>) -> GridResult<Vec<Handled>> {
        self.tree().press(self.id(), point.into())
    }

    /// Release the button at `point` as a local event.
    fn release(&self, point: impl Into<Point>) -> GridResult<Vec<Handled>> {
        self.tree().release(self.id(), point.into())
    }

    /// Route a button event from an explicit source into this view.
    fn handle_button_event(
        &self,
        source: Source,
        point: impl Into<Point>,
        pressed: bool,
    ) -> GridResult<Vec<Handled>> {
        self.tree()
            .handle_button_event(self.id(), source, point.into(), pressed)
    }

    /// Release every pressed button on this view and its enabled
    /// descendants.
    fn release_all(&self) -> GridResult<()> {
        self.tree().release_all(self.id())
    }

    /// Release this view's own pressed buttons inside `bounds`.
    fn release_all_within_bounds(&self, bounds: Bounds) -> GridResult<()> {
        self.tree().release_all_within_bounds(self.id(), bounds)
    }

    /// Whether the button at `point` is pressed.
    fn is_pressed_at(&self, point: impl Into<Point>) -> GridResult<bool> {
        self.tree().is_pressed_at(self.id(), point.into())
    }

    /// Whether the button at `point` is released.
    fn is_released_at(&self, point: impl Into<Point>) -> GridResult<bool> {
        Ok(!self.is_pressed_at(point)?)
    }

    /// The pressed points, in press order.
    fn points_pressed(&self) -> GridResult<Vec<Point>> {
        self.tree().points_pressed(self.id())
    }

    /// The pressed points inside `bounds`, in press order.
    fn points_pressed_within_bounds(&self, bounds: Bounds) -> GridResult<Vec<Point>> {
        self.tree().points_pressed_within_bounds(self.id(), bounds)
    }

    /// Whether any of this view's own buttons inside `bounds` is
    /// pressed.
    fn any_pressed_within_bounds(&self, bounds: Bounds) -> GridResult<bool> {
        self.tree().any_pressed_within_bounds(self.id(), bounds)
    }

    /// Whether every one of this view's own buttons inside `bounds` is
    /// pressed.
    fn all_pressed_within_bounds(&self, bounds: Bounds) -> GridResult<bool> {
        self.tree().all_pressed_within_bounds(self.id(), bounds)
    }

    /// Whether any of this view's own buttons inside `bounds` is
    /// released.
    fn any_released_within_bounds(&self, bounds: Bounds) -> GridResult<bool> {
        self.tree().any_released_within_bounds(self.id(), bounds)
    }

    /// Whether every one of this view's own buttons inside `bounds` is
    /// released.
    fn all_released_within_bounds(&self, bounds: Bounds) -> GridResult<bool> {
        self.tree().all_released_within_bounds(self.id(), bounds)
    }

    /// The number of this view's own pressed buttons inside `bounds`.
    fn num_pressed_within_bounds(&self, bounds: Bounds) -> GridResult<usize> {
        self.tree().num_pressed_within_bounds(self.id(), bounds)
    }

    /// Whether any button is pressed.
    fn any_pressed(&self) -> GridResult<bool> {
        self.tree().any_pressed(self.id())
    }

    /// Whether every button is pressed.
    fn all_pressed(&self) -> GridResult<bool> {
        self.tree().all_pressed(self.id())
    }

    /// Whether any button is released.
    fn any_released(&self) -> GridResult<bool> {
        self.tree().any_released(self.id())
    }

    /// Whether every button is released.
    fn all_released(&self) -> GridResult<bool> {
        self.tree().all_released(self.id())
    }

    /// The number of pressed buttons.
    fn num_pressed(&self) -> GridResult<usize> {
        self.tree().num_pressed(self.id())
    }

    /// The earliest still-held press.
    fn first_pressed(&self) -> GridResult<Option<Point>> {
        self.tree().first_pressed(self.id())
    }

    /// The most recent press.
    fn last_pressed(&self) -> GridResult<Option<Point>> {
        self.tree().last_pressed(self.id())
    }

    /// The leftmost pressed column, if any.
    fn leftmost_col_pressed(&self) -> GridResult<Option<i32>> {
        self.tree().leftmost_col_pressed(self.id())
    }

    /// The rightmost pressed column, if any.
    fn rightmost_col_pressed(&self) -> GridResult<Option<i32>> {
        self.tree().rightmost_col_pressed(self.id())
    }

    /// The topmost pressed row, if any.
    fn topmost_row_pressed(&self) -> GridResult<Option<i32>> {
        self.tree().topmost_row_pressed(self.id())
    }

    /// The bottommost pressed row, if any.
    fn bottommost_row_pressed(&self) -> GridResult<Option<i32>> {
        self.tree().bottommost_row_pressed(self.id())
    }

    // =========================================================================
    // Lit state and refresh
    // =========================================================================

    /// The lit state at `point`.
    fn is_lit_at(&self, point: impl Into<Point>) -> GridResult<bool> {
        self.tree().is_lit_at(self.id(), point.into())
    }

    /// The unlit state at `point`.
    fn is_unlit_at(&self, point: impl Into<Point>) -> GridResult<bool> {
        Ok(!self.is_lit_at(point)?)
    }

    /// Whether any LED is lit.
    fn any_lit(&self) -> GridResult<bool> {
        self.tree().any_lit(self.id())
    }

    /// Whether every LED is lit.
    fn all_lit(&self) -> GridResult<bool> {
        self.tree().all_lit(self.id())
    }

    /// Whether any LED is unlit.
    fn any_unlit(&self) -> GridResult<bool> {
        self.tree().any_unlit(self.id())
    }

    /// Whether every LED is unlit.
    fn all_unlit(&self) -> GridResult<bool> {
        self.tree().all_unlit(self.id())
    }

    /// The lit state of every point inside `bounds`.
    fn led_state_within_bounds(&self, bounds: Bounds) -> GridResult<Vec<(Point, bool)>> {
        self.tree().led_state_within_bounds(self.id(), bounds)
    }

    /// Install the view's lit-state function. See
    /// [`ViewTree::set_lit_state_fn`].
    fn set_lit_state_fn<F>(&self, f: F) -> GridResult<()>
    where
        F: Fn(Point) -> bool + Send + Sync + 'static,
    {
        self.tree().set_lit_state_fn(self.id(), f)
    }

    /// Refresh every LED. Errors when the view is disabled.
    fn refresh(&self) -> GridResult<()> {
        self.tree().refresh(self.id())
    }

    /// Refresh the LEDs inside `bounds`. Errors when the view is
    /// disabled.
    fn refresh_bounds(&self, bounds: Bounds) -> GridResult<()> {
        self.tree().refresh_bounds(self.id(), bounds)
    }

    /// Refresh the listed points. Errors when the view is disabled.
    fn refresh_points(&self, points: &[Point]) -> GridResult<()> {
        self.tree().refresh_points(self.id(), points)
    }

    /// Refresh a single LED. Errors when the view is disabled.
    fn refresh_point(&self, point: impl Into<Point>) -> GridResult<()> {
        self.tree().refresh_point(self.id(), point.into())
    }

    // =========================================================================
    // Flash and indicate
    // =========================================================================

    /// Flash the whole view.
    fn flash(&self, delay: Option<Duration>) -> GridResult<()> {
        self.tree().flash_view(self.id(), delay)
    }

    /// Flash every point inside `bounds`.
    fn flash_bounds(&self, bounds: Bounds, delay: Option<Duration>) -> GridResult<()> {
        self.tree().flash_bounds(self.id(), bounds, delay)
    }

    /// Flash the listed points.
    fn flash_points(&self, points: &[Point], delay: Option<Duration>) -> GridResult<()> {
        self.tree().flash_points(self.id(), points, delay)
    }

    /// Flash a single point.
    fn flash_point(&self, point: impl Into<Point>, delay: Option<Duration>) -> GridResult<()> {
        self.tree().flash_point(self.id(), point.into(), delay)
    }

    /// Blink the whole view at the listener level.
    fn indicate(&self, repeat: Option<usize>, interval: Option<Duration>) -> GridResult<()> {
        self.tree().indicate_view(self.id(), repeat, interval)
    }

    /// Blink every point inside `bounds`.
    fn indicate_bounds(
        &self,
        bounds: Bounds,
        repeat: Option<usize>,
        interval: Option<Duration>,
    ) -> GridResult<()> {
        self.tree().indicate_bounds(self.id(), bounds, repeat, interval)
    }

    /// Blink a single point.
    fn indicate_point(
        &self,
        point: impl Into<Point>,
        repeat: Option<usize>,
        interval: Option<Duration>,
    ) -> GridResult<()> {
        self.tree().indicate_point(self.id(), point.into(), repeat, interval)
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    /// Connect a button-state-changed listener.
    fn connect_button_state_changed<F>(&self, f: F) -> GridResult<ConnectionId>
    where
        F: Fn(&ButtonEvent) + Send + Sync + 'static,
    {
        self.tree().connect_button_state_changed(self.id(), f)
    }

    /// Disconnect a button-state-changed listener.
    fn disconnect_button_state_changed(&self, conn: ConnectionId) -> GridResult<bool> {
        self.tree().disconnect_button_state_changed(self.id(), conn)
    }

    /// Connect an LED-refreshed listener.
    fn connect_led_refreshed<F>(&self, f: F) -> GridResult<ConnectionId>
    where
        F: Fn(&LedRefresh) + Send + Sync + 'static,
    {
        self.tree().connect_led_refreshed(self.id(), f)
    }

    /// Disconnect an LED-refreshed listener.
    fn disconnect_led_refreshed(&self, conn: ConnectionId) -> GridResult<bool> {
        self.tree().disconnect_led_refreshed(self.id(), conn)
    }

    /// Connect an enabled-changed listener.
    fn connect_enabled_changed<F>(&self, f: F) -> GridResult<ConnectionId>
    where
        F: Fn(&bool) + Send + Sync + 'static,
    {
        self.tree().connect_enabled_changed(self.id(), f)
    }

    /// Disconnect an enabled-changed listener.
    fn disconnect_enabled_changed(&self, conn: ConnectionId) -> GridResult<bool> {
        self.tree().disconnect_enabled_changed(self.id(), conn)
    }
}

/// Composition capabilities of container views.
pub trait ContainerViewable: Viewable {
    /// Add `child` at `origin`, placing it topmost.
    fn add_child<V: Viewable>(&self, child: &V, origin: impl Into<Point>) -> GridResult<()> {
        self.tree().add_child(self.id(), child.id(), origin.into())
    }

    /// Remove `child` from this container.
    fn remove_child<V: Viewable>(&self, child: &V) -> GridResult<()> {
        self.tree().remove_child(self.id(), child.id())
    }

    /// Remove every child.
    fn remove_all_children(&self) -> GridResult<()> {
        self.tree().remove_all_children(self.id())
    }

    /// The children, bottom to top.
    fn children(&self) -> GridResult<Vec<ViewId>> {
        self.tree().children(self.id())
    }

    /// Whether this container has no children.
    fn is_empty(&self) -> GridResult<bool> {
        Ok(self.children()?.is_empty())
    }

    /// Whether `child` is a direct child of this container.
    fn is_parent_of<V: Viewable>(&self, child: &V) -> GridResult<bool> {
        self.tree().is_parent_of(self.id(), child.id())
    }

    /// Whether any child (enabled or not) covers `point`.
    fn has_child_at(&self, point: impl Into<Point>) -> GridResult<bool> {
        self.tree().has_child_at(self.id(), point.into())
    }

    /// The topmost enabled child covering `point`, if any.
    fn enabled_child_at(&self, point: impl Into<Point>) -> GridResult<Option<ViewId>> {
        self.tree().enabled_child_at(self.id(), point.into())
    }

    /// Whether this container also handles events forwarded to children.
    fn press_through(&self) -> GridResult<bool> {
        self.tree().press_through(self.id())
    }

    /// Move a child to the top of the z-order and repaint its footprint.
    fn bring_child_to_front<V: Viewable>(&self, child: &V) -> GridResult<()> {
        self.tree().bring_child_to_front(self.id(), child.id())
    }

    /// Move a child to the bottom of the z-order and repaint its
    /// footprint.
    fn send_child_to_back<V: Viewable>(&self, child: &V) -> GridResult<()> {
        self.tree().send_child_to_back(self.id(), child.id())
    }

    /// Find a direct child by name.
    fn find_child_by_name(&self, name: &str) -> GridResult<Option<ViewId>> {
        self.tree().find_child_by_name(self.id(), name)
    }
}

/// A plain rectangular button/LED surface.
#[derive(Clone)]
pub struct View {
    tree: ViewTree,
    id: ViewId,
}

impl View {
    /// Create a detached, enabled view.
    pub fn new(tree: &ViewTree, num_cols: i32, num_rows: i32) -> GridResult<Self> {
        let id = tree.create_view(Size::new(num_cols, num_rows), true)?;
        Ok(Self {
            tree: tree.clone(),
            id,
        })
    }

    /// Create a detached, disabled view.
    pub fn new_disabled(tree: &ViewTree, num_cols: i32, num_rows: i32) -> GridResult<Self> {
        let id = tree.create_view(Size::new(num_cols, num_rows), false)?;
        Ok(Self {
            tree: tree.clone(),
            id,
        })
    }

    /// Create an enabled view and attach it to `parent` in one step.
    pub fn attached<C: ContainerViewable>(
        parent: &C,
        origin: impl Into<Point>,
        num_cols: i32,
        num_rows: i32,
    ) -> GridResult<Self> {
        let view = Self::new(parent.tree(), num_cols, num_rows)?;
        parent.add_child(&view, origin)?;
        Ok(view)
    }
}

impl Viewable for View {
    fn tree(&self) -> &ViewTree {
        &self.tree
    }

    fn id(&self) -> ViewId {
        self.id
    }
}

/// A view that owns and routes to child views.
#[derive(Clone)]
pub struct ContainerView {
    tree: ViewTree,
    id: ViewId,
}

impl ContainerView {
    /// Create a detached, enabled container.
    pub fn new(tree: &ViewTree, num_cols: i32, num_rows: i32) -> GridResult<Self> {
        Self::create(tree, num_cols, num_rows, true, false)
    }

    /// Create a detached, enabled container that also handles events
    /// forwarded to its children.
    pub fn new_press_through(tree: &ViewTree, num_cols: i32, num_rows: i32) -> GridResult<Self> {
        Self::create(tree, num_cols, num_rows, true, true)
    }

    /// Create a detached, disabled container.
    pub fn new_disabled(tree: &ViewTree, num_cols: i32, num_rows: i32) -> GridResult<Self> {
        Self::create(tree, num_cols, num_rows, false, false)
    }

    /// Create an enabled container and attach it to `parent` in one step.
    pub fn attached<C: ContainerViewable>(
        parent: &C,
        origin: impl Into<Point>,
        num_cols: i32,
        num_rows: i32,
    ) -> GridResult<Self> {
        let view = Self::new(parent.tree(), num_cols, num_rows)?;
        parent.add_child(&view, origin)?;
        Ok(view)
    }

    fn create(
        tree: &ViewTree,
        num_cols: i32,
        num_rows: i32,
        enabled: bool,
        press_through: bool,
    ) -> GridResult<Self> {
        let id = tree.create_container(
            Size::new(num_cols, num_rows),
            enabled,
            press_through,
            false,
            false,
        )?;
        Ok(Self {
            tree: tree.clone(),
            id,
        })
    }
}

impl Viewable for ContainerView {
    fn tree(&self) -> &ViewTree {
        &self.tree
    }

    fn id(&self) -> ViewId {
        self.id
    }
}

impl ContainerViewable for ContainerView {}

/// The root of a view tree.
///
/// Button state is derived from the set of distinct sources holding each
/// point, so several controllers can overlay the same logical grid
/// without one controller's release clearing a button another is still
/// holding. Top views cannot be added as children and do not accept
/// local press/release.
#[derive(Clone)]
pub struct TopView {
    tree: ViewTree,
    id: ViewId,
}

impl TopView {
    /// Create an enabled top view.
    pub fn new(tree: &ViewTree, num_cols: i32, num_rows: i32) -> GridResult<Self> {
        let id = tree.create_top(Size::new(num_cols, num_rows), true)?;
        Ok(Self {
            tree: tree.clone(),
            id,
        })
    }

    /// Create a disabled top view.
    pub fn new_disabled(tree: &ViewTree, num_cols: i32, num_rows: i32) -> GridResult<Self> {
        let id = tree.create_top(Size::new(num_cols, num_rows), false)?;
        Ok(Self {
            tree: tree.clone(),
            id,
        })
    }

    /// Whether `source` currently holds the button at `point`.
    pub fn is_pressed_by_source_at(
        &self,
        source: Source,
        point: impl Into<Point>,
    ) -> GridResult<bool> {
        self.tree
            .is_pressed_by_source_at(self.id, source, point.into())
    }

    /// Whether `source` does not hold the button at `point`.
    pub fn is_released_by_source_at(
        &self,
        source: Source,
        point: impl Into<Point>,
    ) -> GridResult<bool> {
        Ok(!self.is_pressed_by_source_at(source, point)?)
    }
}

impl Viewable for TopView {
    fn tree(&self) -> &ViewTree {
        &self.tree
    }

    fn id(&self) -> ViewId {
        self.id
    }
}

impl ContainerViewable for TopView {}
