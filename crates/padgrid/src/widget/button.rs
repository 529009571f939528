//! A momentary or toggling button covering one or more grid cells.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use padgrid_core::{ConnectionId, Signal};

use crate::error::GridResult;
use crate::geometry::{Point, Size};
use crate::tree::{ViewId, ViewTree};
use crate::view::{ContainerViewable, Viewable};

/// Default flash delay while the button is lit.
pub const DEFAULT_FLASH_DELAY_WHEN_LIT: Duration = Duration::from_millis(25);

/// Default flash delay while the button is unlit.
pub const DEFAULT_FLASH_DELAY_WHEN_UNLIT: Duration = Duration::from_millis(50);

/// How a coupled button derives its value from presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonBehavior {
    /// Each press flips the value.
    Toggle,
    /// The value follows the pressed state: on while held, off on
    /// release.
    Momentary,
}

struct ButtonInner {
    coupled: bool,
    behavior: ButtonBehavior,
    value: bool,
    /// Whole-surface pressed state at the last reaction, so multi-cell
    /// buttons fire once per edge rather than once per cell.
    was_pressed: bool,
}

struct ButtonShared {
    inner: Mutex<ButtonInner>,
    pressed: Signal<()>,
    released: Signal<()>,
    value_changed: Signal<bool>,
}

/// A bool-valued button.
///
/// All of the button's cells act as one switch: pressing any cell
/// presses the button, and it releases only when every cell is released.
/// Decoupled buttons leave their value untouched and only report
/// pressed/released edges.
#[derive(Clone)]
pub struct Button {
    tree: ViewTree,
    id: ViewId,
    shared: Arc<ButtonShared>,
}

impl Button {
    /// Create a detached, coupled, toggling button.
    pub fn new(tree: &ViewTree, num_cols: i32, num_rows: i32) -> GridResult<Self> {
        Self::create(tree, num_cols, num_rows, true, true, ButtonBehavior::Toggle)
    }

    /// Create a detached, coupled, momentary button.
    pub fn new_momentary(tree: &ViewTree, num_cols: i32, num_rows: i32) -> GridResult<Self> {
        Self::create(tree, num_cols, num_rows, true, true, ButtonBehavior::Momentary)
    }

    /// Create a detached button that only forwards pressed/released
    /// edges without touching its value.
    pub fn new_decoupled(tree: &ViewTree, num_cols: i32, num_rows: i32) -> GridResult<Self> {
        Self::create(tree, num_cols, num_rows, true, false, ButtonBehavior::Toggle)
    }

    /// Create a coupled, toggling button and attach it to `parent` in
    /// one step.
    pub fn attached<C: ContainerViewable>(
        parent: &C,
        origin: impl Into<Point>,
        num_cols: i32,
        num_rows: i32,
    ) -> GridResult<Self> {
        let button = Self::new(parent.tree(), num_cols, num_rows)?;
        parent.add_child(&button, origin)?;
        Ok(button)
    }

    pub(crate) fn create(
        tree: &ViewTree,
        num_cols: i32,
        num_rows: i32,
        enabled: bool,
        coupled: bool,
        behavior: ButtonBehavior,
    ) -> GridResult<Self> {
        let id = tree.create_view(Size::new(num_cols, num_rows), enabled)?;
        let shared = Arc::new(ButtonShared {
            inner: Mutex::new(ButtonInner {
                coupled,
                behavior,
                value: false,
                was_pressed: false,
            }),
            pressed: Signal::new(),
            released: Signal::new(),
            value_changed: Signal::new(),
        });

        let lit_shared = shared.clone();
        tree.set_lit_state_fn(id, move |_point| lit_shared.inner.lock().value)?;

        let weak_tree = tree.downgrade();
        let reaction_shared = shared.clone();
        tree.connect_button_state_changed(id, move |_event| {
            let Some(tree) = weak_tree.upgrade() else {
                return;
            };
            Self::react(&tree, id, &reaction_shared);
        })?;

        Ok(Self {
            tree: tree.clone(),
            id,
            shared,
        })
    }

    /// Runs after every genuine cell transition on the button's view.
    fn react(tree: &ViewTree, id: ViewId, shared: &Arc<ButtonShared>) {
        let button_is_pressed = tree.any_pressed(id).unwrap_or(false);
        let new_value = {
            let mut inner = shared.inner.lock();
            if inner.was_pressed == button_is_pressed {
                return;
            }
            inner.was_pressed = button_is_pressed;
            if !inner.coupled {
                None
            } else {
                match inner.behavior {
                    ButtonBehavior::Toggle if button_is_pressed => Some(!inner.value),
                    ButtonBehavior::Toggle => None,
                    ButtonBehavior::Momentary => Some(button_is_pressed),
                }
            }
        };
        if let Some(value) = new_value {
            let _ = Self::apply_value(tree, id, shared, value, true);
        }
        if button_is_pressed {
            shared.pressed.emit(&());
        } else {
            shared.released.emit(&());
        }
    }

    fn apply_value(
        tree: &ViewTree,
        id: ViewId,
        shared: &Arc<ButtonShared>,
        value: bool,
        notify: bool,
    ) -> GridResult<()> {
        let changed = {
            let mut inner = shared.inner.lock();
            if inner.value == value {
                false
            } else {
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

    /// The button's value.
    pub fn value(&self) -> bool {
        self.shared.inner.lock().value
    }

    /// Set the value, repainting when it changes.
    pub fn set_value(&self, value: bool) -> GridResult<()> {
        Self::apply_value(&self.tree, self.id, &self.shared, value, false)
    }

    /// Set the value and fire the value-changed listeners when it
    /// changes.
    pub fn set_value_notify(&self, value: bool) -> GridResult<()> {
        Self::apply_value(&self.tree, self.id, &self.shared, value, true)
    }

    /// Flip the value, firing the value-changed listeners.
    pub fn toggle_value(&self) -> GridResult<()> {
        self.set_value_notify(!self.value())
    }

    /// Whether any of the button's cells is held.
    pub fn is_pressed(&self) -> GridResult<bool> {
        self.any_pressed()
    }

    /// Whether all of the button's cells are released.
    pub fn is_released(&self) -> GridResult<bool> {
        self.all_released()
    }

    /// Whether presses drive the value.
    pub fn is_coupled(&self) -> bool {
        self.shared.inner.lock().coupled
    }

    /// Set whether presses drive the value.
    pub fn set_coupled(&self, coupled: bool) {
        self.shared.inner.lock().coupled = coupled;
    }

    /// The coupled behavior.
    pub fn behavior(&self) -> ButtonBehavior {
        self.shared.inner.lock().behavior
    }

    /// Set the coupled behavior.
    pub fn set_behavior(&self, behavior: ButtonBehavior) {
        self.shared.inner.lock().behavior = behavior;
    }

    /// Flash the whole button. The default delay is shorter while lit so
    /// the inversion reads as a blink in both states.
    pub fn flash(&self, delay: Option<Duration>) -> GridResult<()> {
        let delay = delay.unwrap_or(if self.value() {
            DEFAULT_FLASH_DELAY_WHEN_LIT
        } else {
            DEFAULT_FLASH_DELAY_WHEN_UNLIT
        });
        self.tree.flash_view(self.id, Some(delay))
    }

    /// Connect a listener fired when the button becomes pressed.
    pub fn connect_pressed<F: Fn(&()) + Send + Sync + 'static>(&self, f: F) -> ConnectionId {
        self.shared.pressed.connect(f)
    }

    /// Connect a listener fired when the button becomes released.
    pub fn connect_released<F: Fn(&()) + Send + Sync + 'static>(&self, f: F) -> ConnectionId {
        self.shared.released.connect(f)
    }

    /// Connect a listener fired when the value changes with
    /// notification.
    pub fn connect_value_changed<F: Fn(&bool) + Send + Sync + 'static>(&self, f: F) -> ConnectionId {
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

    /// Disconnect a value-changed listener.
    pub fn disconnect_value_changed(&self, conn: ConnectionId) -> bool {
        self.shared.value_changed.disconnect(conn)
    }
}

impl Viewable for Button {
    fn tree(&self) -> &ViewTree {
        &self.tree
    }

    fn id(&self) -> ViewId {
        self.id
    }
}
