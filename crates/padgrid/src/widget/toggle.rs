//! A toggle: one selected value out of a grid of thumb-sized slots.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use padgrid_core::{ConnectionId, Signal};

use crate::error::{GridError, GridResult};
use crate::event::ButtonEvent;
use crate::geometry::{Bounds, Point, Size};
use crate::tree::{ViewId, ViewTree};
use crate::view::{ContainerViewable, Viewable};

/// Which way a toggle's values run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Values run down each column, then across columns.
    Vertical,
    /// Values run across each row, then down rows.
    Horizontal,
}

struct ToggleInner {
    size: Size,
    coupled: bool,
    nillable: bool,
    orientation: Orientation,
    thumb_width: i32,
    thumb_height: i32,
    filled: bool,
    values_inverted: bool,
    value: Option<i32>,
    /// Values currently held, in press order.
    values_pressed: Vec<i32>,
    saved_range: Option<(i32, i32)>,
}

impl ToggleInner {
    fn num_values_x(&self) -> i32 {
        self.size.num_cols / self.thumb_width
    }

    fn num_values_y(&self) -> i32 {
        self.size.num_rows / self.thumb_height
    }

    fn num_values(&self) -> i32 {
        self.num_values_x() * self.num_values_y()
    }

    fn maximum_value(&self) -> i32 {
        self.num_values() - 1
    }

    fn value_at(&self, point: Point) -> i32 {
        let raw = match self.orientation {
            Orientation::Vertical => {
                point.y / self.thumb_height + (point.x / self.thumb_width) * self.num_values_y()
            }
            Orientation::Horizontal => {
                point.x / self.thumb_width + (point.y / self.thumb_height) * self.num_values_x()
            }
        };
        if self.values_inverted {
            self.maximum_value() - raw
        } else {
            raw
        }
    }

    fn lit_for(&self, point: Point) -> bool {
        match self.value {
            None => false,
            Some(value) => {
                let at = self.value_at(point);
                if self.filled {
                    at <= value
                } else {
                    at == value
                }
            }
        }
    }

    fn validate_value(&self, value: Option<i32>) -> GridResult<()> {
        match value {
            None if self.nillable => Ok(()),
            None => Err(GridError::InvalidValue {
                reason: "toggle is not nillable".into(),
            }),
            Some(v) if (0..=self.maximum_value()).contains(&v) => Ok(()),
            Some(v) => Err(GridError::InvalidValue {
                reason: format!(
                    "value {} must be between 0 and {}",
                    v,
                    self.maximum_value()
                ),
            }),
        }
    }

    fn validate_thumb_size(&self, width: i32, height: i32) -> GridResult<()> {
        if width < 1 || self.size.num_cols % width != 0 {
            return Err(GridError::InvalidValue {
                reason: format!(
                    "toggle width ({}) must be divisible by thumb width ({})",
                    self.size.num_cols, width
                ),
            });
        }
        if height < 1 || self.size.num_rows % height != 0 {
            return Err(GridError::InvalidValue {
                reason: format!(
                    "toggle height ({}) must be divisible by thumb height ({})",
                    self.size.num_rows, height
                ),
            });
        }
        Ok(())
    }
}

struct ToggleShared {
    inner: Mutex<ToggleInner>,
    pressed: Signal<()>,
    released: Signal<()>,
    value_pressed: Signal<i32>,
    range_pressed: Signal<(i32, i32)>,
    value_changed: Signal<Option<i32>>,
}

/// An `Option<i32>`-valued toggle.
///
/// The surface is divided into thumb-sized slots, each mapping to one
/// value; the slot matching the current value is lit (or, in filled
/// mode, every slot up to it). Coupled toggles set their value from
/// presses; nillable toggles clear to `None` when the current value is
/// pressed again.
#[derive(Clone)]
pub struct Toggle {
    tree: ViewTree,
    id: ViewId,
    shared: Arc<ToggleShared>,
}

impl Toggle {
    /// Create a detached, coupled, vertical toggle with value 0.
    pub fn new(tree: &ViewTree, num_cols: i32, num_rows: i32) -> GridResult<Self> {
        Self::create(tree, num_cols, num_rows, true, true, false, Orientation::Vertical)
    }

    /// Create a detached, coupled, horizontal toggle with value 0.
    pub fn new_horizontal(tree: &ViewTree, num_cols: i32, num_rows: i32) -> GridResult<Self> {
        Self::create(tree, num_cols, num_rows, true, true, false, Orientation::Horizontal)
    }

    /// Create a detached toggle with an explicit orientation.
    pub fn with_orientation(
        tree: &ViewTree,
        num_cols: i32,
        num_rows: i32,
        orientation: Orientation,
    ) -> GridResult<Self> {
        Self::create(tree, num_cols, num_rows, true, true, false, orientation)
    }

    /// Create a detached toggle that reports presses without changing
    /// its value.
    pub fn new_decoupled(
        tree: &ViewTree,
        num_cols: i32,
        num_rows: i32,
        orientation: Orientation,
    ) -> GridResult<Self> {
        Self::create(tree, num_cols, num_rows, true, false, false, orientation)
    }

    /// Create a detached toggle whose value may be cleared to `None`.
    pub fn new_nillable(
        tree: &ViewTree,
        num_cols: i32,
        num_rows: i32,
        orientation: Orientation,
    ) -> GridResult<Self> {
        Self::create(tree, num_cols, num_rows, true, true, true, orientation)
    }

    /// Create a coupled, vertical toggle and attach it to `parent` in
    /// one step.
    pub fn attached<C: ContainerViewable>(
        parent: &C,
        origin: impl Into<Point>,
        num_cols: i32,
        num_rows: i32,
    ) -> GridResult<Self> {
        let toggle = Self::new(parent.tree(), num_cols, num_rows)?;
        parent.add_child(&toggle, origin)?;
        Ok(toggle)
    }

    pub(crate) fn create(
        tree: &ViewTree,
        num_cols: i32,
        num_rows: i32,
        enabled: bool,
        coupled: bool,
        nillable: bool,
        orientation: Orientation,
    ) -> GridResult<Self> {
        let size = Size::new(num_cols, num_rows);
        let id = tree.create_view(size, enabled)?;
        let (thumb_width, thumb_height) = match orientation {
            Orientation::Vertical => (size.num_cols, 1),
            Orientation::Horizontal => (1, size.num_rows),
        };
        let shared = Arc::new(ToggleShared {
            inner: Mutex::new(ToggleInner {
                size,
                coupled,
                nillable,
                orientation,
                thumb_width,
                thumb_height,
                filled: false,
                values_inverted: false,
                value: Some(0),
                values_pressed: Vec::new(),
                saved_range: None,
            }),
            pressed: Signal::new(),
            released: Signal::new(),
            value_pressed: Signal::new(),
            range_pressed: Signal::new(),
            value_changed: Signal::new(),
        });

        let lit_shared = shared.clone();
        tree.set_lit_state_fn(id, move |point| lit_shared.inner.lock().lit_for(point))?;

        let weak_tree = tree.downgrade();
        let reaction_shared = shared.clone();
        tree.connect_button_state_changed(id, move |event| {
            let Some(tree) = weak_tree.upgrade() else {
                return;
            };
            Self::react(&tree, id, &reaction_shared, event);
        })?;

        Ok(Self {
            tree: tree.clone(),
            id,
            shared,
        })
    }

    /// Runs after every genuine cell transition on the toggle's view.
    ///
    /// A value counts as newly pressed only when its first cell goes
    /// down, and as released only when its last cell comes up.
    fn react(tree: &ViewTree, id: ViewId, shared: &Arc<ToggleShared>, event: &ButtonEvent) {
        let pressed_points = tree.points_pressed(id).unwrap_or_default();

        let mut set_value: Option<Option<i32>> = None;
        let mut emit_value_pressed = None;
        let mut emit_pressed = false;
        let mut emit_range = None;
        let mut emit_released = false;
        {
            let mut inner = shared.inner.lock();
            let affected = inner.value_at(event.point);
            let cells_with_value = pressed_points
                .iter()
                .filter(|&&p| inner.value_at(p) == affected)
                .count();
            if event.pressed {
                if cells_with_value == 1 {
                    inner.values_pressed.push(affected);
                    if inner.coupled {
                        set_value = Some(if inner.nillable && inner.value == Some(affected) {
                            None
                        } else {
                            Some(affected)
                        });
                    }
                    emit_value_pressed = Some(affected);
                    let held = inner.values_pressed.len();
                    if held == 1 {
                        emit_pressed = true;
                    }
                    if held > 1 {
                        let min = inner.values_pressed.iter().copied().min().unwrap_or(affected);
                        let max = inner.values_pressed.iter().copied().max().unwrap_or(affected);
                        if inner.saved_range != Some((min, max)) {
                            inner.saved_range = Some((min, max));
                            emit_range = Some((min, max));
                        }
                    }
                }
            } else if cells_with_value == 0 {
                if let Some(pos) = inner.values_pressed.iter().position(|&v| v == affected) {
                    inner.values_pressed.remove(pos);
                }
                if inner.values_pressed.is_empty() {
                    inner.saved_range = None;
                    emit_released = true;
                }
            }
        }

        if let Some(value) = set_value {
            let _ = Self::apply_value(tree, id, shared, value, true);
        }
        if let Some(value) = emit_value_pressed {
            shared.value_pressed.emit(&value);
        }
        if emit_pressed {
            shared.pressed.emit(&());
        }
        if let Some(range) = emit_range {
            shared.range_pressed.emit(&range);
        }
        if emit_released {
            shared.released.emit(&());
        }
    }

    fn apply_value(
        tree: &ViewTree,
        id: ViewId,
        shared: &Arc<ToggleShared>,
        value: Option<i32>,
        notify: bool,
    ) -> GridResult<()> {
        let changed = {
            let mut inner = shared.inner.lock();
            if inner.value == value {
                false
            } else {
                inner.validate_value(value)?;
                inner.value = value;
                true
            }
        };
        if changed {
            if tree.is_enabled(id)? {
                tree.refresh(id)?;
            }
            if notify {
                shared.value_changed.emit(&value);
            }
        }
        Ok(())
    }

    // =========================================================================
    // Value
    // =========================================================================

    /// The toggle's value. `None` only for nillable toggles.
    pub fn value(&self) -> Option<i32> {
        self.shared.inner.lock().value
    }

    /// Set the value, repainting when it changes.
    pub fn set_value(&self, value: Option<i32>) -> GridResult<()> {
        Self::apply_value(&self.tree, self.id, &self.shared, value, false)
    }

    /// Set the value and fire the value-changed listeners when it
    /// changes.
    pub fn set_value_notify(&self, value: Option<i32>) -> GridResult<()> {
        Self::apply_value(&self.tree, self.id, &self.shared, value, true)
    }

    /// The value a press at `point` selects.
    pub fn value_at(&self, point: impl Into<Point>) -> i32 {
        self.shared.inner.lock().value_at(point.into())
    }

    /// The number of selectable values.
    pub fn num_values(&self) -> i32 {
        self.shared.inner.lock().num_values()
    }

    /// The largest selectable value.
    pub fn maximum_value(&self) -> i32 {
        self.shared.inner.lock().maximum_value()
    }

    // =========================================================================
    // Pressed values
    // =========================================================================

    /// Whether any value is held.
    pub fn is_pressed(&self) -> bool {
        !self.shared.inner.lock().values_pressed.is_empty()
    }

    /// Whether no value is held.
    pub fn is_released(&self) -> bool {
        !self.is_pressed()
    }

    /// Whether `value` is held.
    pub fn value_is_pressed(&self, value: i32) -> bool {
        self.shared.inner.lock().values_pressed.contains(&value)
    }

    /// The earliest still-held value.
    pub fn first_value_pressed(&self) -> Option<i32> {
        self.shared.inner.lock().values_pressed.first().copied()
    }

    /// The most recently pressed value.
    pub fn last_value_pressed(&self) -> Option<i32> {
        self.shared.inner.lock().values_pressed.last().copied()
    }

    /// The smallest held value.
    pub fn min_value_pressed(&self) -> Option<i32> {
        self.shared.inner.lock().values_pressed.iter().copied().min()
    }

    /// The largest held value.
    pub fn max_value_pressed(&self) -> Option<i32> {
        self.shared.inner.lock().values_pressed.iter().copied().max()
    }

    /// How many values are held.
    pub fn num_values_pressed(&self) -> usize {
        self.shared.inner.lock().values_pressed.len()
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Whether presses drive the value.
    pub fn is_coupled(&self) -> bool {
        self.shared.inner.lock().coupled
    }

    /// Set whether presses drive the value.
    pub fn set_coupled(&self, coupled: bool) {
        self.shared.inner.lock().coupled = coupled;
    }

    /// Whether the value may be cleared to `None`.
    pub fn is_nillable(&self) -> bool {
        self.shared.inner.lock().nillable
    }

    /// Set whether the value may be cleared. Turning nillability off
    /// while the value is `None` resets the value to 0 with
    /// notification.
    pub fn set_nillable(&self, nillable: bool) -> GridResult<()> {
        let reset = {
            let mut inner = self.shared.inner.lock();
            inner.nillable = nillable;
            !nillable && inner.value.is_none()
        };
        if reset {
            self.set_value_notify(Some(0))?;
        }
        Ok(())
    }

    /// The toggle's orientation.
    pub fn orientation(&self) -> Orientation {
        self.shared.inner.lock().orientation
    }

    /// Whether every slot up to the value is lit, instead of just the
    /// value's slot.
    pub fn is_filled(&self) -> bool {
        self.shared.inner.lock().filled
    }

    /// Set filled display mode.
    pub fn set_filled(&self, filled: bool) -> GridResult<()> {
        self.shared.inner.lock().filled = filled;
        if self.is_enabled()? {
            self.refresh()?;
        }
        Ok(())
    }

    /// Whether the value order is reversed.
    pub fn values_are_inverted(&self) -> bool {
        self.shared.inner.lock().values_inverted
    }

    /// Reverse the value order. Releases held buttons first, since their
    /// value mapping changes.
    pub fn set_values_are_inverted(&self, inverted: bool) -> GridResult<()> {
        self.release_all()?;
        {
            let mut inner = self.shared.inner.lock();
            inner.values_pressed.clear();
            inner.values_inverted = inverted;
        }
        if self.is_enabled()? {
            self.refresh()?;
        }
        Ok(())
    }

    /// The thumb size as (width, height).
    pub fn thumb_size(&self) -> (i32, i32) {
        let inner = self.shared.inner.lock();
        (inner.thumb_width, inner.thumb_height)
    }

    /// The thumb width.
    pub fn thumb_width(&self) -> i32 {
        self.shared.inner.lock().thumb_width
    }

    /// The thumb height.
    pub fn thumb_height(&self) -> i32 {
        self.shared.inner.lock().thumb_height
    }

    /// Set the thumb width.
    pub fn set_thumb_width(&self, width: i32) -> GridResult<()> {
        let height = self.thumb_height();
        self.set_thumb_size(width, height)
    }

    /// Set the thumb height.
    pub fn set_thumb_height(&self, height: i32) -> GridResult<()> {
        let width = self.thumb_width();
        self.set_thumb_size(width, height)
    }

    /// Resize the thumbs. Both dimensions must divide the toggle's size.
    /// Held buttons are released, and a value beyond the new maximum
    /// resets to 0.
    pub fn set_thumb_size(&self, width: i32, height: i32) -> GridResult<()> {
        {
            let inner = self.shared.inner.lock();
            inner.validate_thumb_size(width, height)?;
        }
        self.release_all()?;
        {
            let mut inner = self.shared.inner.lock();
            inner.values_pressed.clear();
            inner.thumb_width = width;
            inner.thumb_height = height;
            if inner.value.is_some_and(|v| v > inner.maximum_value()) {
                inner.value = Some(0);
            }
        }
        if self.is_enabled()? {
            self.refresh()?;
        }
        Ok(())
    }

    // =========================================================================
    // Flash
    // =========================================================================

    /// Flash the slots representing the current value.
    pub fn flash(&self, delay: Option<Duration>) -> GridResult<()> {
        let points = {
            let inner = self.shared.inner.lock();
            Bounds::from_size(inner.size)
                .points()
                .filter(|&p| inner.lit_for(p))
                .collect::<Vec<_>>()
        };
        self.tree.flash_points(self.id, &points, delay)
    }

    /// Flash the slot(s) mapping to `value`.
    pub fn flash_value(&self, value: i32, delay: Option<Duration>) -> GridResult<()> {
        let points = {
            let inner = self.shared.inner.lock();
            Bounds::from_size(inner.size)
                .points()
                .filter(|&p| inner.value_at(p) == value)
                .collect::<Vec<_>>()
        };
        self.tree.flash_points(self.id, &points, delay)
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    /// Connect a listener fired when the first value goes down.
    pub fn connect_pressed<F: Fn(&()) + Send + Sync + 'static>(&self, f: F) -> ConnectionId {
        self.shared.pressed.connect(f)
    }

    /// Connect a listener fired when the last value comes up.
    pub fn connect_released<F: Fn(&()) + Send + Sync + 'static>(&self, f: F) -> ConnectionId {
        self.shared.released.connect(f)
    }

    /// Connect a listener fired for each newly pressed value.
    pub fn connect_value_pressed<F: Fn(&i32) + Send + Sync + 'static>(&self, f: F) -> ConnectionId {
        self.shared.value_pressed.connect(f)
    }

    /// Connect a listener fired when two or more values span a new
    /// (min, max) range.
    pub fn connect_range_pressed<F>(&self, f: F) -> ConnectionId
    where
        F: Fn(&(i32, i32)) + Send + Sync + 'static,
    {
        self.shared.range_pressed.connect(f)
    }

    /// Connect a listener fired when the value changes with
    /// notification.
    pub fn connect_value_changed<F>(&self, f: F) -> ConnectionId
    where
        F: Fn(&Option<i32>) + Send + Sync + 'static,
    {
        self.shared.value_changed.connect(f)
    }

    /// Disconnect a pressed listener.
    pub fn disconnect_pressed(&self, conn: ConnectionId) -> bool {
        self.shared.pressed.disconnect(conn)
    }

    /// Disconnect a released listener.
    pub fn disconnect_released(&self, conn: ConnectionId) -> bool {
        self.shared.released.disconnect(conn)
    }

    /// Disconnect a value-pressed listener.
    pub fn disconnect_value_pressed(&self, conn: ConnectionId) -> bool {
        self.shared.value_pressed.disconnect(conn)
    }

    /// Disconnect a range-pressed listener.
    pub fn disconnect_range_pressed(&self, conn: ConnectionId) -> bool {
        self.shared.range_pressed.disconnect(conn)
    }

    /// Disconnect a value-changed listener.
    pub fn disconnect_value_changed(&self, conn: ConnectionId) -> bool {
        self.shared.value_changed.disconnect(conn)
    }
}

impl Viewable for Toggle {
    fn tree(&self) -> &ViewTree {
        &self.tree
    }

    fn id(&self) -> ViewId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;

    #[test]
    fn test_vertical_value_mapping() {
        let tree = ViewTree::new();
        let toggle = Toggle::new(&tree, 1, 4).unwrap();
        assert_eq!(toggle.num_values(), 4);
        assert_eq!(toggle.value_at((0, 0)), 0);
        assert_eq!(toggle.value_at((0, 3)), 3);
    }

    #[test]
    fn test_horizontal_value_mapping() {
        let tree = ViewTree::new();
        let toggle = Toggle::new_horizontal(&tree, 4, 1).unwrap();
        assert_eq!(toggle.value_at((0, 0)), 0);
        assert_eq!(toggle.value_at((3, 0)), 3);
    }

    #[test]
    fn test_press_sets_value_and_lights_slot() {
        let tree = ViewTree::new();
        let toggle = Toggle::new(&tree, 1, 4).unwrap();
        assert_eq!(toggle.value(), Some(0));
        assert!(toggle.is_lit_at((0, 0)).unwrap());

        toggle.press((0, 2)).unwrap();
        assert_eq!(toggle.value(), Some(2));
        assert!(!toggle.is_lit_at((0, 0)).unwrap());
        assert!(toggle.is_lit_at((0, 2)).unwrap());
        toggle.release((0, 2)).unwrap();
        assert_eq!(toggle.value(), Some(2));
    }

    #[test]
    fn test_decoupled_toggle_reports_without_setting() {
        let tree = ViewTree::new();
        let toggle = Toggle::new_decoupled(&tree, 1, 4, Orientation::Vertical).unwrap();
        let values = Arc::new(StdMutex::new(Vec::new()));

        let values_clone = values.clone();
        toggle.connect_value_pressed(move |&v| {
            values_clone.lock().unwrap().push(v);
        });

        toggle.press((0, 3)).unwrap();
        assert_eq!(toggle.value(), Some(0));
        assert_eq!(*values.lock().unwrap(), vec![3]);
    }

    #[test]
    fn test_nillable_toggle_clears_on_repress() {
        let tree = ViewTree::new();
        let toggle = Toggle::new_nillable(&tree, 1, 4, Orientation::Vertical).unwrap();
        toggle.press((0, 1)).unwrap();
        toggle.release((0, 1)).unwrap();
        assert_eq!(toggle.value(), Some(1));

        toggle.press((0, 1)).unwrap();
        toggle.release((0, 1)).unwrap();
        assert_eq!(toggle.value(), None);
        assert!(toggle.all_unlit().unwrap());
    }

    #[test]
    fn test_value_validation() {
        let tree = ViewTree::new();
        let toggle = Toggle::new(&tree, 1, 4).unwrap();
        assert!(matches!(
            toggle.set_value(Some(4)),
            Err(GridError::InvalidValue { .. })
        ));
        assert!(matches!(
            toggle.set_value(None),
            Err(GridError::InvalidValue { .. })
        ));
        toggle.set_value(Some(3)).unwrap();
        assert_eq!(toggle.value(), Some(3));
    }

    #[test]
    fn test_filled_mode_lights_up_to_value() {
        let tree = ViewTree::new();
        let toggle = Toggle::new(&tree, 1, 4).unwrap();
        toggle.set_filled(true).unwrap();
        toggle.set_value(Some(2)).unwrap();
        assert!(toggle.is_lit_at((0, 0)).unwrap());
        assert!(toggle.is_lit_at((0, 2)).unwrap());
        assert!(!toggle.is_lit_at((0, 3)).unwrap());
    }

    #[test]
    fn test_inverted_values() {
        let tree = ViewTree::new();
        let toggle = Toggle::new(&tree, 1, 4).unwrap();
        toggle.set_values_are_inverted(true).unwrap();
        assert_eq!(toggle.value_at((0, 0)), 3);
        assert_eq!(toggle.value_at((0, 3)), 0);
    }

    #[test]
    fn test_thumb_size_divides_surface() {
        let tree = ViewTree::new();
        let toggle = Toggle::new(&tree, 4, 4).unwrap();
        // Vertical default: one thumb per row.
        assert_eq!(toggle.thumb_size(), (4, 1));
        assert_eq!(toggle.num_values(), 4);

        toggle.set_thumb_size(2, 2).unwrap();
        assert_eq!(toggle.num_values(), 4);
        assert!(matches!(
            toggle.set_thumb_size(3, 1),
            Err(GridError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_thumb_resize_clamps_value() {
        let tree = ViewTree::new();
        let toggle = Toggle::new(&tree, 4, 4).unwrap();
        toggle.set_value(Some(3)).unwrap();
        // 4x4 thumbs leave a single value; 3 is out of range now.
        toggle.set_thumb_size(4, 4).unwrap();
        assert_eq!(toggle.value(), Some(0));
    }

    #[test]
    fn test_range_pressed_fires_for_spans() {
        let tree = ViewTree::new();
        let toggle = Toggle::new(&tree, 1, 8).unwrap();
        let ranges = Arc::new(StdMutex::new(Vec::new()));

        let ranges_clone = ranges.clone();
        toggle.connect_range_pressed(move |&r| {
            ranges_clone.lock().unwrap().push(r);
        });

        toggle.press((0, 2)).unwrap();
        toggle.press((0, 5)).unwrap();
        toggle.press((0, 7)).unwrap();
        assert_eq!(*ranges.lock().unwrap(), vec![(2, 5), (2, 7)]);
        assert_eq!(toggle.min_value_pressed(), Some(2));
        assert_eq!(toggle.max_value_pressed(), Some(7));

        // Releasing everything clears the span; the same range fires
        // again on the next hold.
        toggle.release((0, 2)).unwrap();
        toggle.release((0, 5)).unwrap();
        toggle.release((0, 7)).unwrap();
        toggle.press((0, 2)).unwrap();
        toggle.press((0, 5)).unwrap();
        assert_eq!(
            *ranges.lock().unwrap(),
            vec![(2, 5), (2, 7), (2, 5)]
        );
    }

    #[test]
    fn test_pressed_released_edges() {
        let tree = ViewTree::new();
        let toggle = Toggle::new(&tree, 1, 4).unwrap();
        let log = Arc::new(StdMutex::new(Vec::new()));

        let log_clone = log.clone();
        toggle.connect_pressed(move |_| {
            log_clone.lock().unwrap().push("pressed");
        });
        let log_clone = log.clone();
        toggle.connect_released(move |_| {
            log_clone.lock().unwrap().push("released");
        });

        toggle.press((0, 0)).unwrap();
        toggle.press((0, 1)).unwrap();
        toggle.release((0, 0)).unwrap();
        toggle.release((0, 1)).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["pressed", "released"]);
    }

    #[test]
    fn test_multi_cell_thumb_counts_value_once() {
        let tree = ViewTree::new();
        let toggle = Toggle::new(&tree, 2, 4).unwrap();
        // Default vertical thumbs are 2x1: both cells of a row share one
        // value.
        let values = Arc::new(StdMutex::new(Vec::new()));
        let values_clone = values.clone();
        toggle.connect_value_pressed(move |&v| {
            values_clone.lock().unwrap().push(v);
        });

        toggle.press((0, 1)).unwrap();
        toggle.press((1, 1)).unwrap();
        assert_eq!(*values.lock().unwrap(), vec![1]);
        assert_eq!(toggle.num_values_pressed(), 1);

        toggle.release((0, 1)).unwrap();
        assert_eq!(toggle.num_values_pressed(), 1);
        toggle.release((1, 1)).unwrap();
        assert_eq!(toggle.num_values_pressed(), 0);
    }
}
