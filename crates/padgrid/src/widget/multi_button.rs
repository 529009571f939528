//! A grid of equally-sized buttons acting as one widget.

use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;

use padgrid_core::{ConnectionId, Signal};

use crate::error::{GridError, GridResult};
use crate::geometry::{Point, Size};
use crate::tree::{ViewId, ViewTree};
use crate::view::{ContainerViewable, Viewable};
use crate::widget::button::{Button, ButtonBehavior};

struct MbInner {
    coupled: bool,
    behavior: ButtonBehavior,
    array_cols: i32,
    array_rows: i32,
    /// Buttons in column-major order: index = x * array_rows + y.
    buttons: Vec<Button>,
}

impl MbInner {
    fn index(&self, x: i32, y: i32) -> GridResult<usize> {
        if x < 0 || y < 0 || x >= self.array_cols || y >= self.array_rows {
            return Err(GridError::InvalidValue {
                reason: format!(
                    "button ({}, {}) out of range for a {}x{} button array",
                    x, y, self.array_cols, self.array_rows
                ),
            });
        }
        Ok((x * self.array_rows + y) as usize)
    }

    fn button(&self, x: i32, y: i32) -> GridResult<Button> {
        Ok(self.buttons[self.index(x, y)?].clone())
    }

    fn grid_value(&self) -> Vec<Vec<bool>> {
        (0..self.array_cols)
            .map(|x| {
                (0..self.array_rows)
                    .map(|y| self.buttons[(x * self.array_rows + y) as usize].value())
                    .collect()
            })
            .collect()
    }
}

pub(crate) struct MultiButtonShared {
    inner: Mutex<MbInner>,
    button_pressed: Signal<(i32, i32)>,
    button_released: Signal<(i32, i32)>,
    button_value_changed: Signal<(i32, i32, bool)>,
    value_changed: Signal<Vec<Vec<bool>>>,
}

/// A sealed container of detached [`Button`]s arranged in a button
/// array.
///
/// The array size defaults to one button per cell and can be coarsened
/// with [`set_button_array_size`](Self::set_button_array_size) as long
/// as it divides the view size. The widget's value is the 2-D bool grid
/// of its buttons' values. Children are constructed and owned
/// internally; external composition is rejected.
#[derive(Clone)]
pub struct MultiButtonView {
    tree: ViewTree,
    id: ViewId,
    shared: Arc<MultiButtonShared>,
}

impl MultiButtonView {
    /// Create a detached, coupled multi-button view with toggling
    /// buttons.
    pub fn new(tree: &ViewTree, num_cols: i32, num_rows: i32) -> GridResult<Self> {
        Self::create(tree, num_cols, num_rows, true, true, ButtonBehavior::Toggle)
    }

    /// Create a detached multi-button view whose buttons only report
    /// presses.
    pub fn new_decoupled(tree: &ViewTree, num_cols: i32, num_rows: i32) -> GridResult<Self> {
        Self::create(tree, num_cols, num_rows, true, false, ButtonBehavior::Toggle)
    }

    /// Create a coupled multi-button view and attach it to `parent` in
    /// one step.
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

    pub(crate) fn create(
        tree: &ViewTree,
        num_cols: i32,
        num_rows: i32,
        enabled: bool,
        coupled: bool,
        behavior: ButtonBehavior,
    ) -> GridResult<Self> {
        let id = tree.create_container(Size::new(num_cols, num_rows), enabled, true, true, false)?;
        let shared = Arc::new(MultiButtonShared {
            inner: Mutex::new(MbInner {
                coupled,
                behavior,
                array_cols: num_cols,
                array_rows: num_rows,
                buttons: Vec::new(),
            }),
            button_pressed: Signal::new(),
            button_released: Signal::new(),
            button_value_changed: Signal::new(),
            value_changed: Signal::new(),
        });
        Self::reconstruct(tree, id, &shared)?;
        Ok(Self {
            tree: tree.clone(),
            id,
            shared,
        })
    }

    pub(crate) fn from_parts(
        tree: ViewTree,
        id: ViewId,
        shared: Arc<MultiButtonShared>,
    ) -> Self {
        Self { tree, id, shared }
    }

    pub(crate) fn shared(&self) -> &Arc<MultiButtonShared> {
        &self.shared
    }

    /// Drop the current buttons and build a fresh array from the stored
    /// configuration.
    fn reconstruct(tree: &ViewTree, id: ViewId, shared: &Arc<MultiButtonShared>) -> GridResult<()> {
        tree.release_all(id)?;
        tree.remove_all_children_internal(id)?;

        let size = tree.size(id)?;
        let (array_cols, array_rows, coupled, behavior) = {
            let inner = shared.inner.lock();
            (inner.array_cols, inner.array_rows, inner.coupled, inner.behavior)
        };
        let button_width = size.num_cols / array_cols;
        let button_height = size.num_rows / array_rows;

        let mut buttons = Vec::with_capacity((array_cols * array_rows) as usize);
        for x in 0..array_cols {
            for y in 0..array_rows {
                let button = Button::create(tree, button_width, button_height, true, coupled, behavior)?;

                let weak: Weak<MultiButtonShared> = Arc::downgrade(shared);
                button.connect_pressed(move |_| {
                    if let Some(shared) = weak.upgrade() {
                        shared.button_pressed.emit(&(x, y));
                    }
                });
                let weak = Arc::downgrade(shared);
                button.connect_released(move |_| {
                    if let Some(shared) = weak.upgrade() {
                        shared.button_released.emit(&(x, y));
                    }
                });
                let weak = Arc::downgrade(shared);
                button.connect_value_changed(move |&value| {
                    if let Some(shared) = weak.upgrade() {
                        shared.button_value_changed.emit(&(x, y, value));
                        let grid = shared.inner.lock().grid_value();
                        shared.value_changed.emit(&grid);
                    }
                });

                tree.add_child_internal(id, button.id(), Point::new(x * button_width, y * button_height))?;
                buttons.push(button);
            }
        }
        shared.inner.lock().buttons = buttons;
        Ok(())
    }

    // =========================================================================
    // Value
    // =========================================================================

    /// The widget's value: `value()[x][y]` is the button at (x, y).
    pub fn value(&self) -> Vec<Vec<bool>> {
        self.shared.inner.lock().grid_value()
    }

    fn validate_value(&self, value: &[Vec<bool>]) -> GridResult<()> {
        let inner = self.shared.inner.lock();
        let ok = value.len() == inner.array_cols as usize
            && value.iter().all(|col| col.len() == inner.array_rows as usize);
        if ok {
            Ok(())
        } else {
            Err(GridError::InvalidValue {
                reason: format!(
                    "value must be a 2-dimensional array of {}x{} values",
                    inner.array_cols, inner.array_rows
                ),
            })
        }
    }

    /// Set every button's value, repainting changed buttons.
    pub fn set_value(&self, value: &[Vec<bool>]) -> GridResult<()> {
        self.validate_value(value)?;
        let (buttons, array_rows) = {
            let inner = self.shared.inner.lock();
            (inner.buttons.clone(), inner.array_rows)
        };
        for (x, col) in value.iter().enumerate() {
            for (y, &v) in col.iter().enumerate() {
                buttons[x * array_rows as usize + y].set_value(v)?;
            }
        }
        Ok(())
    }

    /// Set every button's value, firing per-button and aggregate
    /// listeners for the changes.
    pub fn set_value_notify(&self, value: &[Vec<bool>]) -> GridResult<()> {
        self.validate_value(value)?;
        let (buttons, array_rows) = {
            let inner = self.shared.inner.lock();
            (inner.buttons.clone(), inner.array_rows)
        };
        let mut changed = 0;
        for (x, col) in value.iter().enumerate() {
            for (y, &v) in col.iter().enumerate() {
                let button = &buttons[x * array_rows as usize + y];
                if button.value() != v {
                    button.set_value(v)?;
                    self.shared
                        .button_value_changed
                        .emit(&(x as i32, y as i32, v));
                    changed += 1;
                }
            }
        }
        if changed > 0 {
            self.shared.value_changed.emit(&self.value());
        }
        Ok(())
    }

    /// Turn every button off.
    pub fn clear(&self) -> GridResult<()> {
        self.set_value(&self.uniform_value(false))
    }

    /// Turn every button off, with notification.
    pub fn clear_notify(&self) -> GridResult<()> {
        self.set_value_notify(&self.uniform_value(false))
    }

    /// Turn every button on.
    pub fn fill(&self) -> GridResult<()> {
        self.set_value(&self.uniform_value(true))
    }

    /// Turn every button on, with notification.
    pub fn fill_notify(&self) -> GridResult<()> {
        self.set_value_notify(&self.uniform_value(true))
    }

    fn uniform_value(&self, value: bool) -> Vec<Vec<bool>> {
        let inner = self.shared.inner.lock();
        vec![vec![value; inner.array_rows as usize]; inner.array_cols as usize]
    }

    // =========================================================================
    // Per-button access
    // =========================================================================

    /// The value of the button at (x, y).
    pub fn button_value(&self, x: i32, y: i32) -> GridResult<bool> {
        Ok(self.shared.inner.lock().button(x, y)?.value())
    }

    /// Set the value of the button at (x, y).
    pub fn set_button_value(&self, x: i32, y: i32, value: bool) -> GridResult<()> {
        let button = self.shared.inner.lock().button(x, y)?;
        button.set_value(value)
    }

    /// Set the value of the button at (x, y), firing the per-button and
    /// aggregate listeners when it changes.
    pub fn set_button_value_notify(&self, x: i32, y: i32, value: bool) -> GridResult<()> {
        let button = self.shared.inner.lock().button(x, y)?;
        button.set_value_notify(value)
    }

    /// Whether the button at (x, y) is held.
    pub fn button_is_pressed(&self, x: i32, y: i32) -> GridResult<bool> {
        let button = self.shared.inner.lock().button(x, y)?;
        button.is_pressed()
    }

    /// Flash the button at (x, y).
    pub fn flash_button(&self, x: i32, y: i32, delay: Option<Duration>) -> GridResult<()> {
        let button = self.shared.inner.lock().button(x, y)?;
        button.flash(delay)
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// The button array size as (columns, rows).
    pub fn button_array_size(&self) -> (i32, i32) {
        let inner = self.shared.inner.lock();
        (inner.array_cols, inner.array_rows)
    }

    /// The number of button columns.
    pub fn num_button_cols(&self) -> i32 {
        self.shared.inner.lock().array_cols
    }

    /// The number of button rows.
    pub fn num_button_rows(&self) -> i32 {
        self.shared.inner.lock().array_rows
    }

    /// The width of each button in cells.
    pub fn button_width(&self) -> GridResult<i32> {
        Ok(self.size()?.num_cols / self.num_button_cols())
    }

    /// The height of each button in cells.
    pub fn button_height(&self) -> GridResult<i32> {
        Ok(self.size()?.num_rows / self.num_button_rows())
    }

    /// Rebuild the widget with a new button array size. Both dimensions
    /// must divide the view size. All button state is reset.
    pub fn set_button_array_size(&self, array_cols: i32, array_rows: i32) -> GridResult<()> {
        let size = self.size()?;
        if array_cols < 1 || size.num_cols % array_cols != 0 {
            return Err(GridError::InvalidValue {
                reason: format!(
                    "width ({}) must be divisible by number of button columns ({})",
                    size.num_cols, array_cols
                ),
            });
        }
        if array_rows < 1 || size.num_rows % array_rows != 0 {
            return Err(GridError::InvalidValue {
                reason: format!(
                    "height ({}) must be divisible by number of button rows ({})",
                    size.num_rows, array_rows
                ),
            });
        }
        {
            let mut inner = self.shared.inner.lock();
            inner.array_cols = array_cols;
            inner.array_rows = array_rows;
        }
        Self::reconstruct(&self.tree, self.id, &self.shared)
    }

    /// Whether presses drive the button values.
    pub fn is_coupled(&self) -> bool {
        self.shared.inner.lock().coupled
    }

    /// Set whether presses drive the button values.
    pub fn set_coupled(&self, coupled: bool) {
        let buttons = {
            let mut inner = self.shared.inner.lock();
            inner.coupled = coupled;
            inner.buttons.clone()
        };
        for button in buttons {
            button.set_coupled(coupled);
        }
    }

    /// The buttons' coupled behavior.
    pub fn behavior(&self) -> ButtonBehavior {
        self.shared.inner.lock().behavior
    }

    /// Set the buttons' coupled behavior.
    pub fn set_behavior(&self, behavior: ButtonBehavior) {
        let buttons = {
            let mut inner = self.shared.inner.lock();
            inner.behavior = behavior;
            inner.buttons.clone()
        };
        for button in buttons {
            button.set_behavior(behavior);
        }
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    /// Connect a listener fired with (x, y) when a button becomes
    /// pressed.
    pub fn connect_button_pressed<F>(&self, f: F) -> ConnectionId
    where
        F: Fn(&(i32, i32)) + Send + Sync + 'static,
    {
        self.shared.button_pressed.connect(f)
    }

    /// Connect a listener fired with (x, y) when a button becomes
    /// released.
    pub fn connect_button_released<F>(&self, f: F) -> ConnectionId
    where
        F: Fn(&(i32, i32)) + Send + Sync + 'static,
    {
        self.shared.button_released.connect(f)
    }

    /// Connect a listener fired with (x, y, value) when a button's value
    /// changes with notification.
    pub fn connect_button_value_changed<F>(&self, f: F) -> ConnectionId
    where
        F: Fn(&(i32, i32, bool)) + Send + Sync + 'static,
    {
        self.shared.button_value_changed.connect(f)
    }

    /// Connect a listener fired with the full grid after notified
    /// changes.
    pub fn connect_value_changed<F>(&self, f: F) -> ConnectionId
    where
        F: Fn(&Vec<Vec<bool>>) + Send + Sync + 'static,
    {
        self.shared.value_changed.connect(f)
    }

    /// Disconnect a button-pressed listener.
    pub fn disconnect_button_pressed(&self, conn: ConnectionId) -> bool {
        self.shared.button_pressed.disconnect(conn)
    }

    /// Disconnect a button-released listener.
    pub fn disconnect_button_released(&self, conn: ConnectionId) -> bool {
        self.shared.button_released.disconnect(conn)
    }

    /// Disconnect a button-value-changed listener.
    pub fn disconnect_button_value_changed(&self, conn: ConnectionId) -> bool {
        self.shared.button_value_changed.disconnect(conn)
    }

    /// Disconnect a value-changed listener.
    pub fn disconnect_value_changed(&self, conn: ConnectionId) -> bool {
        self.shared.value_changed.disconnect(conn)
    }
}

impl Viewable for MultiButtonView {
    fn tree(&self) -> &ViewTree {
        &self.tree
    }

    fn id(&self) -> ViewId {
        self.id
    }
}

impl ContainerViewable for MultiButtonView {}
