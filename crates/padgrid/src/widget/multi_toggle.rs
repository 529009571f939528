//! A bank of parallel toggles acting as one widget.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use padgrid_core::{ConnectionId, Signal};

use crate::error::{GridError, GridResult};
use crate::geometry::{Point, Size};
use crate::tree::{ViewId, ViewTree};
use crate::view::{ContainerViewable, Viewable};
use crate::widget::toggle::{Orientation, Toggle};

struct MtInner {
    coupled: bool,
    nillable: bool,
    filled: bool,
    values_inverted: bool,
    orientation: Orientation,
    num_toggles: i32,
    thumb_width: i32,
    thumb_height: i32,
    toggles: Vec<Toggle>,
}

impl MtInner {
    fn toggle(&self, index: usize) -> GridResult<Toggle> {
        self.toggles
            .get(index)
            .cloned()
            .ok_or(GridError::IndexOutOfRange {
                index,
                count: self.toggles.len(),
            })
    }
}

struct MultiToggleShared {
    inner: Mutex<MtInner>,
    toggle_pressed: Signal<usize>,
    toggle_released: Signal<usize>,
    toggle_value_pressed: Signal<(usize, i32)>,
    toggle_range_pressed: Signal<(usize, (i32, i32))>,
    toggle_value_changed: Signal<(usize, Option<i32>)>,
    value_changed: Signal<Vec<Option<i32>>>,
}

/// A sealed container of detached [`Toggle`]s, one per column (vertical
/// orientation) or row (horizontal), all sharing one configuration.
///
/// The widget's value is the vector of its toggles' values. Children are
/// constructed and owned internally; external composition is rejected.
#[derive(Clone)]
pub struct MultiToggleView {
    tree: ViewTree,
    id: ViewId,
    shared: Arc<MultiToggleShared>,
}

impl MultiToggleView {
    /// Create a detached, coupled, vertical multi-toggle.
    pub fn new(tree: &ViewTree, num_cols: i32, num_rows: i32) -> GridResult<Self> {
        Self::create(tree, num_cols, num_rows, true, true, false, Orientation::Vertical)
    }

    /// Create a detached multi-toggle with an explicit orientation.
    pub fn with_orientation(
        tree: &ViewTree,
        num_cols: i32,
        num_rows: i32,
        orientation: Orientation,
    ) -> GridResult<Self> {
        Self::create(tree, num_cols, num_rows, true, true, false, orientation)
    }

    /// Create a detached multi-toggle whose toggles report presses
    /// without changing their values.
    pub fn new_decoupled(
        tree: &ViewTree,
        num_cols: i32,
        num_rows: i32,
        orientation: Orientation,
    ) -> GridResult<Self> {
        Self::create(tree, num_cols, num_rows, true, false, false, orientation)
    }

    /// Create a coupled, vertical multi-toggle and attach it to `parent`
    /// in one step.
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
        coupled: bool,
        nillable: bool,
        orientation: Orientation,
    ) -> GridResult<Self> {
        let id = tree.create_container(Size::new(num_cols, num_rows), enabled, true, true, false)?;
        let num_toggles = match orientation {
            Orientation::Vertical => num_cols,
            Orientation::Horizontal => num_rows,
        };
        let shared = Arc::new(MultiToggleShared {
            inner: Mutex::new(MtInner {
                coupled,
                nillable,
                filled: false,
                values_inverted: false,
                orientation,
                num_toggles,
                // Adopted from the constructed toggles below.
                thumb_width: 0,
                thumb_height: 0,
                toggles: Vec::new(),
            }),
            toggle_pressed: Signal::new(),
            toggle_released: Signal::new(),
            toggle_value_pressed: Signal::new(),
            toggle_range_pressed: Signal::new(),
            toggle_value_changed: Signal::new(),
            value_changed: Signal::new(),
        });
        Self::reconstruct(tree, id, &shared)?;
        Ok(Self {
            tree: tree.clone(),
            id,
            shared,
        })
    }

    /// Drop the current toggles and build a fresh bank from the stored
    /// configuration.
    fn reconstruct(tree: &ViewTree, id: ViewId, shared: &Arc<MultiToggleShared>) -> GridResult<()> {
        tree.release_all(id)?;
        tree.remove_all_children_internal(id)?;

        let size = tree.size(id)?;
        let (num_toggles, coupled, nillable, filled, inverted, orientation) = {
            let inner = shared.inner.lock();
            (
                inner.num_toggles,
                inner.coupled,
                inner.nillable,
                inner.filled,
                inner.values_inverted,
                inner.orientation,
            )
        };
        let (toggle_width, toggle_height) = match orientation {
            Orientation::Vertical => (size.num_cols / num_toggles, size.num_rows),
            Orientation::Horizontal => (size.num_cols, size.num_rows / num_toggles),
        };

        let mut toggles = Vec::with_capacity(num_toggles as usize);
        for i in 0..num_toggles {
            let toggle =
                Toggle::create(tree, toggle_width, toggle_height, true, coupled, nillable, orientation)?;
            if filled {
                toggle.set_filled(true)?;
            }
            if inverted {
                toggle.set_values_are_inverted(true)?;
            }

            let index = i as usize;
            let weak = Arc::downgrade(shared);
            toggle.connect_pressed(move |_| {
                if let Some(shared) = weak.upgrade() {
                    shared.toggle_pressed.emit(&index);
                }
            });
            let weak = Arc::downgrade(shared);
            toggle.connect_released(move |_| {
                if let Some(shared) = weak.upgrade() {
                    shared.toggle_released.emit(&index);
                }
            });
            let weak = Arc::downgrade(shared);
            toggle.connect_value_pressed(move |&value| {
                if let Some(shared) = weak.upgrade() {
                    shared.toggle_value_pressed.emit(&(index, value));
                }
            });
            let weak = Arc::downgrade(shared);
            toggle.connect_range_pressed(move |&range| {
                if let Some(shared) = weak.upgrade() {
                    shared.toggle_range_pressed.emit(&(index, range));
                }
            });
            let weak = Arc::downgrade(shared);
            toggle.connect_value_changed(move |&value| {
                if let Some(shared) = weak.upgrade() {
                    shared.toggle_value_changed.emit(&(index, value));
                    let values: Vec<Option<i32>> = shared
                        .inner
                        .lock()
                        .toggles
                        .iter()
                        .map(|t| t.value())
                        .collect();
                    shared.value_changed.emit(&values);
                }
            });

            let position = match orientation {
                Orientation::Vertical => Point::new(i * toggle_width, 0),
                Orientation::Horizontal => Point::new(0, i * toggle_height),
            };
            tree.add_child_internal(id, toggle.id(), position)?;
            toggles.push(toggle);
        }

        let mut inner = shared.inner.lock();
        let (thumb_width, thumb_height) = toggles
            .first()
            .map(|t| t.thumb_size())
            .unwrap_or((toggle_width, toggle_height));
        inner.thumb_width = thumb_width;
        inner.thumb_height = thumb_height;
        inner.toggles = toggles;
        Ok(())
    }

    // =========================================================================
    // Value
    // =========================================================================

    /// The widget's value: one entry per toggle.
    pub fn value(&self) -> Vec<Option<i32>> {
        self.shared
            .inner
            .lock()
            .toggles
            .iter()
            .map(|t| t.value())
            .collect()
    }

    fn validate_value(&self, value: &[Option<i32>]) -> GridResult<()> {
        let count = self.num_toggles() as usize;
        if value.len() == count {
            Ok(())
        } else {
            Err(GridError::InvalidValue {
                reason: format!("value must be an array of {} values", count),
            })
        }
    }

    /// Set every toggle's value, repainting the changes.
    pub fn set_value(&self, value: &[Option<i32>]) -> GridResult<()> {
        self.validate_value(value)?;
        let toggles = self.shared.inner.lock().toggles.clone();
        for (toggle, &v) in toggles.iter().zip(value) {
            toggle.set_value(v)?;
        }
        Ok(())
    }

    /// Set every toggle's value, firing per-toggle and aggregate
    /// listeners for the changes.
    pub fn set_value_notify(&self, value: &[Option<i32>]) -> GridResult<()> {
        self.validate_value(value)?;
        let toggles = self.shared.inner.lock().toggles.clone();
        let mut changed = 0;
        for (index, (toggle, &v)) in toggles.iter().zip(value).enumerate() {
            if toggle.value() != v {
                toggle.set_value(v)?;
                self.shared.toggle_value_changed.emit(&(index, v));
                changed += 1;
            }
        }
        if changed > 0 {
            self.shared.value_changed.emit(&self.value());
        }
        Ok(())
    }

    /// The value of one toggle.
    pub fn toggle_value(&self, index: usize) -> GridResult<Option<i32>> {
        Ok(self.shared.inner.lock().toggle(index)?.value())
    }

    /// Set the value of one toggle, silently.
    pub fn set_toggle_value(&self, index: usize, value: Option<i32>) -> GridResult<()> {
        let toggle = self.shared.inner.lock().toggle(index)?;
        toggle.set_value(value)
    }

    /// Set the value of one toggle, firing the per-toggle and aggregate
    /// listeners when it changes.
    pub fn set_toggle_value_notify(&self, index: usize, value: Option<i32>) -> GridResult<()> {
        let toggle = self.shared.inner.lock().toggle(index)?;
        toggle.set_value_notify(value)
    }

    /// The largest selectable value of each toggle.
    pub fn maximum_toggle_value(&self) -> GridResult<i32> {
        Ok(self.shared.inner.lock().toggle(0)?.maximum_value())
    }

    /// Flash the slots of one toggle's current value.
    pub fn flash_toggle(&self, index: usize, delay: Option<Duration>) -> GridResult<()> {
        let toggle = self.shared.inner.lock().toggle(index)?;
        toggle.flash(delay)
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// The number of toggles.
    pub fn num_toggles(&self) -> i32 {
        self.shared.inner.lock().num_toggles
    }

    /// The bank's orientation.
    pub fn orientation(&self) -> Orientation {
        self.shared.inner.lock().orientation
    }

    /// Rebuild the bank with a different number of toggles. The count
    /// must divide the width (vertical) or height (horizontal). All
    /// toggle state is reset.
    pub fn set_num_toggles(&self, num_toggles: i32) -> GridResult<()> {
        let size = self.size()?;
        let (orientation, extent) = {
            let inner = self.shared.inner.lock();
            let extent = match inner.orientation {
                Orientation::Vertical => size.num_cols,
                Orientation::Horizontal => size.num_rows,
            };
            (inner.orientation, extent)
        };
        if num_toggles < 1 || extent % num_toggles != 0 {
            let dimension = match orientation {
                Orientation::Vertical => "width",
                Orientation::Horizontal => "height",
            };
            return Err(GridError::InvalidValue {
                reason: format!(
                    "{} ({}) must be divisible by number of toggles ({})",
                    dimension, extent, num_toggles
                ),
            });
        }
        self.shared.inner.lock().num_toggles = num_toggles;
        Self::reconstruct(&self.tree, self.id, &self.shared)
    }

    /// Whether presses drive the toggle values.
    pub fn is_coupled(&self) -> bool {
        self.shared.inner.lock().coupled
    }

    /// Set whether presses drive the toggle values.
    pub fn set_coupled(&self, coupled: bool) {
        let toggles = {
            let mut inner = self.shared.inner.lock();
            inner.coupled = coupled;
            inner.toggles.clone()
        };
        for toggle in toggles {
            toggle.set_coupled(coupled);
        }
    }

    /// Whether toggle values may be cleared to `None`.
    pub fn is_nillable(&self) -> bool {
        self.shared.inner.lock().nillable
    }

    /// Set whether toggle values may be cleared.
    pub fn set_nillable(&self, nillable: bool) -> GridResult<()> {
        let toggles = {
            let mut inner = self.shared.inner.lock();
            inner.nillable = nillable;
            inner.toggles.clone()
        };
        for toggle in toggles {
            toggle.set_nillable(nillable)?;
        }
        Ok(())
    }

    /// Whether the toggles use filled display mode.
    pub fn is_filled(&self) -> bool {
        self.shared.inner.lock().filled
    }

    /// Set filled display mode on every toggle.
    pub fn set_filled(&self, filled: bool) -> GridResult<()> {
        let toggles = {
            let mut inner = self.shared.inner.lock();
            inner.filled = filled;
            inner.toggles.clone()
        };
        for toggle in toggles {
            toggle.set_filled(filled)?;
        }
        Ok(())
    }

    /// Whether the toggles' value order is reversed.
    pub fn values_are_inverted(&self) -> bool {
        self.shared.inner.lock().values_inverted
    }

    /// Reverse the value order on every toggle.
    pub fn set_values_are_inverted(&self, inverted: bool) -> GridResult<()> {
        let toggles = {
            let mut inner = self.shared.inner.lock();
            inner.values_inverted = inverted;
            inner.toggles.clone()
        };
        for toggle in toggles {
            toggle.set_values_are_inverted(inverted)?;
        }
        Ok(())
    }

    /// The shared thumb size as (width, height).
    pub fn thumb_size(&self) -> (i32, i32) {
        let inner = self.shared.inner.lock();
        (inner.thumb_width, inner.thumb_height)
    }

    /// Set the thumb width on every toggle.
    pub fn set_thumb_width(&self, width: i32) -> GridResult<()> {
        let (_, height) = self.thumb_size();
        self.set_thumb_size(width, height)
    }

    /// Set the thumb height on every toggle.
    pub fn set_thumb_height(&self, height: i32) -> GridResult<()> {
        let (width, _) = self.thumb_size();
        self.set_thumb_size(width, height)
    }

    /// Set the thumb size on every toggle.
    pub fn set_thumb_size(&self, width: i32, height: i32) -> GridResult<()> {
        let toggles = self.shared.inner.lock().toggles.clone();
        for toggle in &toggles {
            toggle.set_thumb_size(width, height)?;
        }
        let mut inner = self.shared.inner.lock();
        inner.thumb_width = width;
        inner.thumb_height = height;
        Ok(())
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    /// Connect a listener fired with the toggle index when a toggle's
    /// first value goes down.
    pub fn connect_toggle_pressed<F: Fn(&usize) + Send + Sync + 'static>(&self, f: F) -> ConnectionId {
        self.shared.toggle_pressed.connect(f)
    }

    /// Connect a listener fired with the toggle index when a toggle's
    /// last value comes up.
    pub fn connect_toggle_released<F: Fn(&usize) + Send + Sync + 'static>(
        &self,
        f: F,
    ) -> ConnectionId {
        self.shared.toggle_released.connect(f)
    }

    /// Connect a listener fired with (index, value) for each newly
    /// pressed toggle value.
    pub fn connect_toggle_value_pressed<F>(&self, f: F) -> ConnectionId
    where
        F: Fn(&(usize, i32)) + Send + Sync + 'static,
    {
        self.shared.toggle_value_pressed.connect(f)
    }

    /// Connect a listener fired with (index, (min, max)) when a toggle
    /// spans a new pressed range.
    pub fn connect_toggle_range_pressed<F>(&self, f: F) -> ConnectionId
    where
        F: Fn(&(usize, (i32, i32))) + Send + Sync + 'static,
    {
        self.shared.toggle_range_pressed.connect(f)
    }

    /// Connect a listener fired with (index, value) when a toggle's
    /// value changes with notification.
    pub fn connect_toggle_value_changed<F>(&self, f: F) -> ConnectionId
    where
        F: Fn(&(usize, Option<i32>)) + Send + Sync + 'static,
    {
        self.shared.toggle_value_changed.connect(f)
    }

    /// Connect a listener fired with the full value vector after
    /// notified changes.
    pub fn connect_value_changed<F>(&self, f: F) -> ConnectionId
    where
        F: Fn(&Vec<Option<i32>>) + Send + Sync + 'static,
    {
        self.shared.value_changed.connect(f)
    }

    /// Disconnect a toggle-pressed listener.
    pub fn disconnect_toggle_pressed(&self, conn: ConnectionId) -> bool {
        self.shared.toggle_pressed.disconnect(conn)
    }

    /// Disconnect a toggle-released listener.
    pub fn disconnect_toggle_released(&self, conn: ConnectionId) -> bool {
        self.shared.toggle_released.disconnect(conn)
    }

    /// Disconnect a toggle-value-pressed listener.
    pub fn disconnect_toggle_value_pressed(&self, conn: ConnectionId) -> bool {
        self.shared.toggle_value_pressed.disconnect(conn)
    }

    /// Disconnect a toggle-range-pressed listener.
    pub fn disconnect_toggle_range_pressed(&self, conn: ConnectionId) -> bool {
        self.shared.toggle_range_pressed.disconnect(conn)
    }

    /// Disconnect a toggle-value-changed listener.
    pub fn disconnect_toggle_value_changed(&self, conn: ConnectionId) -> bool {
        self.shared.toggle_value_changed.disconnect(conn)
    }

    /// Disconnect a value-changed listener.
    pub fn disconnect_value_changed(&self, conn: ConnectionId) -> bool {
        self.shared.value_changed.disconnect(conn)
    }
}

impl Viewable for MultiToggleView {
    fn tree(&self) -> &ViewTree {
        &self.tree
    }

    fn id(&self) -> ViewId {
        self.id
    }
}

impl ContainerViewable for MultiToggleView {}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;

    #[test]
    fn test_one_toggle_per_column() {
        let tree = ViewTree::new();
        let view = MultiToggleView::new(&tree, 4, 4).unwrap();
        assert_eq!(view.num_toggles(), 4);
        assert_eq!(view.children().unwrap().len(), 4);
        assert_eq!(view.value(), vec![Some(0); 4]);
        assert_eq!(view.maximum_toggle_value().unwrap(), 3);
    }

    #[test]
    fn test_press_sets_column_value() {
        let tree = ViewTree::new();
        let view = MultiToggleView::new(&tree, 4, 4).unwrap();
        let changes = Arc::new(StdMutex::new(Vec::new()));

        let changes_clone = changes.clone();
        view.connect_toggle_value_changed(move |&(i, v)| {
            changes_clone.lock().unwrap().push((i, v));
        });

        view.press((2, 3)).unwrap();
        assert_eq!(view.toggle_value(2).unwrap(), Some(3));
        assert_eq!(*changes.lock().unwrap(), vec![(2, Some(3))]);
        assert!(view.is_lit_at((2, 3)).unwrap());
        assert!(!view.is_lit_at((2, 0)).unwrap());
    }

    #[test]
    fn test_horizontal_orientation_uses_rows() {
        let tree = ViewTree::new();
        let view =
            MultiToggleView::with_orientation(&tree, 4, 2, Orientation::Horizontal).unwrap();
        assert_eq!(view.num_toggles(), 2);

        view.press((3, 1)).unwrap();
        assert_eq!(view.toggle_value(1).unwrap(), Some(3));
        assert_eq!(view.toggle_value(0).unwrap(), Some(0));
    }

    #[test]
    fn test_value_roundtrip_and_notify() {
        let tree = ViewTree::new();
        let view = MultiToggleView::new(&tree, 2, 4).unwrap();
        let aggregates = Arc::new(StdMutex::new(Vec::new()));

        let aggregates_clone = aggregates.clone();
        view.connect_value_changed(move |values| {
            aggregates_clone.lock().unwrap().push(values.clone());
        });

        view.set_value_notify(&[Some(1), Some(3)]).unwrap();
        assert_eq!(view.value(), vec![Some(1), Some(3)]);
        assert_eq!(aggregates.lock().unwrap().len(), 1);

        assert!(matches!(
            view.set_value(&[Some(0)]),
            Err(GridError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_set_num_toggles_rebuilds() {
        let tree = ViewTree::new();
        let view = MultiToggleView::new(&tree, 4, 4).unwrap();
        view.set_num_toggles(2).unwrap();
        assert_eq!(view.children().unwrap().len(), 2);
        // Each toggle is now two cells wide.
        view.press((1, 2)).unwrap();
        assert_eq!(view.toggle_value(0).unwrap(), Some(2));

        assert!(matches!(
            view.set_num_toggles(3),
            Err(GridError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_nillable_fan_out() {
        let tree = ViewTree::new();
        let view = MultiToggleView::new(&tree, 2, 4).unwrap();
        view.set_nillable(true).unwrap();
        view.set_toggle_value(0, None).unwrap();
        assert_eq!(view.toggle_value(0).unwrap(), None);

        view.set_nillable(false).unwrap();
        // Clearing nillability resets a None value to 0.
        assert_eq!(view.toggle_value(0).unwrap(), Some(0));
    }

    #[test]
    fn test_filled_fan_out() {
        let tree = ViewTree::new();
        let view = MultiToggleView::new(&tree, 2, 4).unwrap();
        view.set_filled(true).unwrap();
        view.set_toggle_value(0, Some(2)).unwrap();
        assert!(view.is_lit_at((0, 0)).unwrap());
        assert!(view.is_lit_at((0, 2)).unwrap());
        assert!(!view.is_lit_at((0, 3)).unwrap());
    }
}
