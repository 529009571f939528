//! A step sequencer row/grid with a playhead display.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use padgrid_core::{ConnectionId, Signal};

use crate::error::{GridError, GridResult};
use crate::geometry::Point;
use crate::tree::{ViewId, ViewTree};
use crate::view::{ContainerViewable, Viewable};
use crate::widget::button::ButtonBehavior;
use crate::widget::multi_button::MultiButtonView;

/// How long the playhead flash lasts on a set step.
const PLAYHEAD_FLASH_DELAY: Duration = Duration::from_millis(100);

struct StepInner {
    coupled: bool,
    steps: Vec<bool>,
    playhead: Option<usize>,
}

struct StepShared {
    inner: Mutex<StepInner>,
    step_pressed: Signal<usize>,
    step_released: Signal<usize>,
    step_value_changed: Signal<(usize, bool)>,
    value_changed: Signal<Vec<bool>>,
}

/// A sequence of bool steps over a button grid, indexed left-to-right,
/// top-to-bottom.
///
/// The underlying buttons are decoupled; the step view owns the step
/// values and drives the button display from them, overlaying a playhead
/// (a temporarily lit, or flashing, step) without disturbing the values.
#[derive(Clone)]
pub struct StepView {
    tree: ViewTree,
    id: ViewId,
    buttons: MultiButtonView,
    shared: Arc<StepShared>,
}

impl StepView {
    /// Create a detached step view whose steps toggle when pressed.
    pub fn new(tree: &ViewTree, num_cols: i32, num_rows: i32) -> GridResult<Self> {
        Self::create(tree, num_cols, num_rows, true, true)
    }

    /// Create a detached step view that only reports presses.
    pub fn new_decoupled(tree: &ViewTree, num_cols: i32, num_rows: i32) -> GridResult<Self> {
        Self::create(tree, num_cols, num_rows, true, false)
    }

    /// Create a step view and attach it to `parent` in one step.
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
    ) -> GridResult<Self> {
        // Step state lives here; the buttons are plain decoupled toggles
        // driven from it.
        let buttons =
            MultiButtonView::create(tree, num_cols, num_rows, enabled, false, ButtonBehavior::Toggle)?;
        let num_steps = (num_cols * num_rows) as usize;
        let shared = Arc::new(StepShared {
            inner: Mutex::new(StepInner {
                coupled,
                steps: vec![false; num_steps],
                playhead: None,
            }),
            step_pressed: Signal::new(),
            step_released: Signal::new(),
            step_value_changed: Signal::new(),
            value_changed: Signal::new(),
        });

        let weak_shared = Arc::downgrade(&shared);
        let weak_tree = tree.downgrade();
        let weak_buttons = Arc::downgrade(buttons.shared());
        let buttons_id = buttons.id();
        buttons.connect_button_pressed(move |&(x, y)| {
            let (Some(shared), Some(tree), Some(button_shared)) = (
                weak_shared.upgrade(),
                weak_tree.upgrade(),
                weak_buttons.upgrade(),
            ) else {
                return;
            };
            let buttons = MultiButtonView::from_parts(tree, buttons_id, button_shared);
            let index = (x + y * num_cols) as usize;
            let (coupled, current) = {
                let inner = shared.inner.lock();
                (inner.coupled, inner.steps.get(index).copied().unwrap_or(false))
            };
            if coupled {
                let _ = Self::apply_step_value(&buttons, &shared, num_cols, index, !current, true);
            }
            shared.step_pressed.emit(&index);
        });

        let weak_shared = Arc::downgrade(&shared);
        buttons.connect_button_released(move |&(x, y)| {
            let Some(shared) = weak_shared.upgrade() else {
                return;
            };
            shared.step_released.emit(&((x + y * num_cols) as usize));
        });

        Ok(Self {
            tree: tree.clone(),
            id: buttons.id(),
            buttons,
            shared,
        })
    }

    fn apply_step_value(
        buttons: &MultiButtonView,
        shared: &Arc<StepShared>,
        num_cols: i32,
        index: usize,
        value: bool,
        notify: bool,
    ) -> GridResult<()> {
        let desired = {
            let mut inner = shared.inner.lock();
            if index >= inner.steps.len() {
                return Err(GridError::IndexOutOfRange {
                    index,
                    count: inner.steps.len(),
                });
            }
            inner.steps[index] = value;
            value || inner.playhead == Some(index)
        };
        let (x, y) = (index as i32 % num_cols, index as i32 / num_cols);
        if buttons.button_value(x, y)? != desired {
            buttons.set_button_value(x, y, desired)?;
        }
        if notify {
            shared.step_value_changed.emit(&(index, value));
        }
        Ok(())
    }

    fn step_coords(&self, index: usize) -> GridResult<(i32, i32)> {
        let count = self.shared.inner.lock().steps.len();
        if index >= count {
            return Err(GridError::IndexOutOfRange { index, count });
        }
        let cols = self.buttons.num_button_cols();
        Ok((index as i32 % cols, index as i32 / cols))
    }

    // =========================================================================
    // Value
    // =========================================================================

    /// The number of steps.
    pub fn num_steps(&self) -> usize {
        self.shared.inner.lock().steps.len()
    }

    /// The step sequence.
    pub fn value(&self) -> Vec<bool> {
        self.shared.inner.lock().steps.clone()
    }

    /// Replace the whole sequence, silently.
    pub fn set_value(&self, value: &[bool]) -> GridResult<()> {
        self.validate_value(value)?;
        for (index, &v) in value.iter().enumerate() {
            self.set_step_value(index, v)?;
        }
        Ok(())
    }

    /// Replace the whole sequence, firing per-step and aggregate
    /// listeners for the changes.
    pub fn set_value_notify(&self, value: &[bool]) -> GridResult<()> {
        self.validate_value(value)?;
        let mut changed = 0;
        for (index, &v) in value.iter().enumerate() {
            if self.step_value(index)? != v {
                self.set_step_value(index, v)?;
                self.shared.step_value_changed.emit(&(index, v));
                changed += 1;
            }
        }
        if changed > 0 {
            self.shared.value_changed.emit(&self.value());
        }
        Ok(())
    }

    fn validate_value(&self, value: &[bool]) -> GridResult<()> {
        let count = self.num_steps();
        if value.len() == count {
            Ok(())
        } else {
            Err(GridError::InvalidValue {
                reason: format!("value must be a 1-dimensional array of {} values", count),
            })
        }
    }

    /// The value of one step.
    pub fn step_value(&self, index: usize) -> GridResult<bool> {
        let inner = self.shared.inner.lock();
        inner
            .steps
            .get(index)
            .copied()
            .ok_or(GridError::IndexOutOfRange {
                index,
                count: inner.steps.len(),
            })
    }

    /// Set one step, silently.
    pub fn set_step_value(&self, index: usize, value: bool) -> GridResult<()> {
        Self::apply_step_value(
            &self.buttons,
            &self.shared,
            self.buttons.num_button_cols(),
            index,
            value,
            false,
        )
    }

    /// Set one step, firing the per-step and aggregate listeners.
    pub fn set_step_value_notify(&self, index: usize, value: bool) -> GridResult<()> {
        Self::apply_step_value(
            &self.buttons,
            &self.shared,
            self.buttons.num_button_cols(),
            index,
            value,
            true,
        )?;
        self.shared.value_changed.emit(&self.value());
        Ok(())
    }

    /// Turn every step off.
    pub fn clear(&self) -> GridResult<()> {
        self.set_value(&vec![false; self.num_steps()])
    }

    /// Turn every step off, with notification.
    pub fn clear_notify(&self) -> GridResult<()> {
        self.set_value_notify(&vec![false; self.num_steps()])
    }

    /// Turn every step on.
    pub fn fill(&self) -> GridResult<()> {
        self.set_value(&vec![true; self.num_steps()])
    }

    /// Turn every step on, with notification.
    pub fn fill_notify(&self) -> GridResult<()> {
        self.set_value_notify(&vec![true; self.num_steps()])
    }

    /// Whether the button under a step is held.
    pub fn step_is_pressed(&self, index: usize) -> GridResult<bool> {
        let (x, y) = self.step_coords(index)?;
        self.buttons.button_is_pressed(x, y)
    }

    /// Whether step presses toggle step values.
    pub fn is_coupled(&self) -> bool {
        self.shared.inner.lock().coupled
    }

    /// Set whether step presses toggle step values.
    pub fn set_coupled(&self, coupled: bool) {
        self.shared.inner.lock().coupled = coupled;
    }

    // =========================================================================
    // Playhead
    // =========================================================================

    /// The playhead position, if shown.
    pub fn playhead(&self) -> Option<usize> {
        self.shared.inner.lock().playhead
    }

    /// Move (or clear) the playhead. A set step under the playhead
    /// flashes; an unset one lights up while the playhead stays. Step
    /// values are not modified.
    pub fn set_playhead(&self, playhead: Option<usize>) -> GridResult<()> {
        if let Some(index) = playhead {
            self.step_coords(index)?;
        }
        let previous = {
            let mut inner = self.shared.inner.lock();
            let previous = inner.playhead;
            inner.playhead = playhead;
            previous
        };
        if let Some(index) = playhead {
            let (x, y) = self.step_coords(index)?;
            if self.step_value(index)? {
                self.buttons.flash_button(x, y, Some(PLAYHEAD_FLASH_DELAY))?;
            } else {
                self.buttons.set_button_value(x, y, true)?;
            }
        }
        if let Some(previous) = previous {
            self.refresh_step_display(previous)?;
        }
        Ok(())
    }

    /// Re-derive a step's button value from its step value and the
    /// playhead.
    fn refresh_step_display(&self, index: usize) -> GridResult<()> {
        let (x, y) = self.step_coords(index)?;
        let desired = self.step_value(index)? || self.playhead() == Some(index);
        if self.buttons.button_value(x, y)? != desired {
            self.buttons.set_button_value(x, y, desired)?;
        }
        Ok(())
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    /// Connect a listener fired with the step index on press.
    pub fn connect_step_pressed<F: Fn(&usize) + Send + Sync + 'static>(&self, f: F) -> ConnectionId {
        self.shared.step_pressed.connect(f)
    }

    /// Connect a listener fired with the step index on release.
    pub fn connect_step_released<F: Fn(&usize) + Send + Sync + 'static>(&self, f: F) -> ConnectionId {
        self.shared.step_released.connect(f)
    }

    /// Connect a listener fired with (index, value) when a step changes
    /// with notification.
    pub fn connect_step_value_changed<F>(&self, f: F) -> ConnectionId
    where
        F: Fn(&(usize, bool)) + Send + Sync + 'static,
    {
        self.shared.step_value_changed.connect(f)
    }

    /// Connect a listener fired with the full sequence after notified
    /// changes.
    pub fn connect_value_changed<F>(&self, f: F) -> ConnectionId
    where
        F: Fn(&Vec<bool>) + Send + Sync + 'static,
    {
        self.shared.value_changed.connect(f)
    }

    /// Disconnect a step-pressed listener.
    pub fn disconnect_step_pressed(&self, conn: ConnectionId) -> bool {
        self.shared.step_pressed.disconnect(conn)
    }

    /// Disconnect a step-released listener.
    pub fn disconnect_step_released(&self, conn: ConnectionId) -> bool {
        self.shared.step_released.disconnect(conn)
    }

    /// Disconnect a step-value-changed listener.
    pub fn disconnect_step_value_changed(&self, conn: ConnectionId) -> bool {
        self.shared.step_value_changed.disconnect(conn)
    }

    /// Disconnect a value-changed listener.
    pub fn disconnect_value_changed(&self, conn: ConnectionId) -> bool {
        self.shared.value_changed.disconnect(conn)
    }
}

impl Viewable for StepView {
    fn tree(&self) -> &ViewTree {
        &self.tree
    }

    fn id(&self) -> ViewId {
        self.id
    }
}

impl ContainerViewable for StepView {}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use super::*;

    #[test]
    fn test_press_toggles_step() {
        let tree = ViewTree::new();
        let steps = StepView::new(&tree, 4, 1).unwrap();

        steps.press((2, 0)).unwrap();
        steps.release((2, 0)).unwrap();
        assert!(steps.step_value(2).unwrap());
        assert!(steps.is_lit_at((2, 0)).unwrap());

        steps.press((2, 0)).unwrap();
        steps.release((2, 0)).unwrap();
        assert!(!steps.step_value(2).unwrap());
    }

    #[test]
    fn test_index_runs_row_major() {
        let tree = ViewTree::new();
        let steps = StepView::new(&tree, 4, 2).unwrap();
        let pressed = Arc::new(StdMutex::new(Vec::new()));

        let pressed_clone = pressed.clone();
        steps.connect_step_pressed(move |&i| {
            pressed_clone.lock().unwrap().push(i);
        });

        steps.press((1, 0)).unwrap();
        steps.release((1, 0)).unwrap();
        steps.press((1, 1)).unwrap();
        steps.release((1, 1)).unwrap();
        assert_eq!(*pressed.lock().unwrap(), vec![1, 5]);
    }

    #[test]
    fn test_decoupled_reports_without_toggling() {
        let tree = ViewTree::new();
        let steps = StepView::new_decoupled(&tree, 4, 1).unwrap();
        steps.press((0, 0)).unwrap();
        steps.release((0, 0)).unwrap();
        assert!(!steps.step_value(0).unwrap());
    }

    #[test]
    fn test_value_roundtrip_and_notify() {
        let tree = ViewTree::new();
        let steps = StepView::new(&tree, 4, 1).unwrap();
        let changes = Arc::new(StdMutex::new(Vec::new()));

        let changes_clone = changes.clone();
        steps.connect_step_value_changed(move |&(i, v)| {
            changes_clone.lock().unwrap().push((i, v));
        });

        steps
            .set_value_notify(&[true, false, true, false])
            .unwrap();
        assert_eq!(steps.value(), vec![true, false, true, false]);
        assert_eq!(*changes.lock().unwrap(), vec![(0, true), (2, true)]);

        assert!(matches!(
            steps.set_value(&[true]),
            Err(GridError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_playhead_lights_unset_step_without_changing_value() {
        let tree = ViewTree::new();
        let steps = StepView::new(&tree, 4, 1).unwrap();

        steps.set_playhead(Some(1)).unwrap();
        assert!(steps.is_lit_at((1, 0)).unwrap());
        assert!(!steps.step_value(1).unwrap());

        // Moving the playhead restores the previous step's display.
        steps.set_playhead(Some(2)).unwrap();
        assert!(!steps.is_lit_at((1, 0)).unwrap());
        assert!(steps.is_lit_at((2, 0)).unwrap());

        steps.set_playhead(None).unwrap();
        assert!(!steps.is_lit_at((2, 0)).unwrap());
        assert_eq!(steps.value(), vec![false; 4]);
    }

    #[test]
    fn test_playhead_on_set_step_flashes() {
        let tree = ViewTree::new();
        let steps = StepView::new(&tree, 4, 1).unwrap();
        steps.set_step_value(0, true).unwrap();

        steps.set_playhead(Some(0)).unwrap();
        // The step is set, so its value is untouched and it stays lit
        // after the flash reverts.
        assert!(steps.step_value(0).unwrap());
        std::thread::sleep(Duration::from_millis(160));
        assert!(steps.is_lit_at((0, 0)).unwrap());
    }

    #[test]
    fn test_clear_and_fill() {
        let tree = ViewTree::new();
        let steps = StepView::new(&tree, 4, 1).unwrap();
        steps.fill().unwrap();
        assert_eq!(steps.value(), vec![true; 4]);
        steps.clear().unwrap();
        assert_eq!(steps.value(), vec![false; 4]);
    }
}
