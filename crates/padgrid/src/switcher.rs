//! Switcher: a container keeping exactly one child enabled.

use crate::error::{GridError, GridResult};
use crate::geometry::{Point, Size};
use crate::tree::{ViewId, ViewTree};
use crate::view::{ContainerViewable, Viewable};

/// A container view where exactly zero or one children are enabled at a
/// time.
///
/// The enabled child is the "current" view, selected by index via
/// [`set_value`](Self::set_value). Adding a child to an empty switcher
/// enables it and makes it current; adding to a non-empty switcher
/// disables the newcomer. Enabling or disabling a switcher's child
/// directly is rejected - switching the value is the only sanctioned
/// mutation.
#[derive(Clone)]
pub struct Switcher {
    tree: ViewTree,
    id: ViewId,
}

impl Switcher {
    /// Create a detached, enabled switcher.
    pub fn new(tree: &ViewTree, num_cols: i32, num_rows: i32) -> GridResult<Self> {
        Self::create(tree, num_cols, num_rows, true)
    }

    /// Create a detached, disabled switcher.
    pub fn new_disabled(tree: &ViewTree, num_cols: i32, num_rows: i32) -> GridResult<Self> {
        Self::create(tree, num_cols, num_rows, false)
    }

    /// Create an enabled switcher and attach it to `parent` in one step.
    pub fn attached<C: ContainerViewable>(
        parent: &C,
        origin: impl Into<Point>,
        num_cols: i32,
        num_rows: i32,
    ) -> GridResult<Self> {
        let switcher = Self::new(parent.tree(), num_cols, num_rows)?;
        parent.add_child(&switcher, origin)?;
        Ok(switcher)
    }

    fn create(tree: &ViewTree, num_cols: i32, num_rows: i32, enabled: bool) -> GridResult<Self> {
        let id = tree.create_container(Size::new(num_cols, num_rows), enabled, false, false, true)?;
        Ok(Self {
            tree: tree.clone(),
            id,
        })
    }

    /// The index of the current child, or `None` when empty.
    pub fn value(&self) -> GridResult<Option<usize>> {
        self.tree.switcher_value(self.id)
    }

    /// Select the child at `index`: the previous current child is
    /// disabled, the new one enabled.
    pub fn set_value(&self, index: usize) -> GridResult<()> {
        self.tree.set_switcher_value(self.id, index)
    }

    /// The current (enabled) child, or `None` when empty.
    pub fn current_view(&self) -> GridResult<Option<ViewId>> {
        self.tree.switcher_current(self.id)
    }

    /// Make `child` the current view.
    pub fn switch_to_view<V: Viewable>(&self, child: &V) -> GridResult<()> {
        let index = self
            .children()?
            .iter()
            .position(|&c| c == child.id())
            .ok_or(GridError::NotAChild)?;
        self.set_value(index)
    }

    /// Make the uniquely-named child `name` the current view.
    pub fn switch_to_named(&self, name: &str) -> GridResult<()> {
        let children = self.children()?;
        let mut matches = Vec::new();
        for (index, &child) in children.iter().enumerate() {
            if self.tree.name(child)?.as_deref() == Some(name) {
                matches.push(index);
            }
        }
        match matches.as_slice() {
            [] => Err(GridError::NoSuchChild {
                name: name.to_string(),
            }),
            [index] => self.set_value(*index),
            _ => Err(GridError::AmbiguousChildName {
                name: name.to_string(),
            }),
        }
    }
}

impl Viewable for Switcher {
    fn tree(&self) -> &ViewTree {
        &self.tree
    }

    fn id(&self) -> ViewId {
        self.id
    }
}

impl ContainerViewable for Switcher {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::View;

    fn switcher_with_two_children(tree: &ViewTree) -> (Switcher, View, View) {
        let switcher = Switcher::new(tree, 2, 2).unwrap();
        let a = View::new(tree, 2, 2).unwrap();
        let b = View::new(tree, 2, 2).unwrap();
        switcher.add_child(&a, (0, 0)).unwrap();
        switcher.add_child(&b, (0, 0)).unwrap();
        (switcher, a, b)
    }

    #[test]
    fn test_first_child_becomes_current() {
        let tree = ViewTree::new();
        let (switcher, a, b) = switcher_with_two_children(&tree);
        assert_eq!(switcher.current_view().unwrap(), Some(a.id()));
        assert_eq!(switcher.value().unwrap(), Some(0));
        assert!(a.is_enabled().unwrap());
        assert!(b.is_disabled().unwrap());
    }

    #[test]
    fn test_disabled_first_child_is_enabled_on_add() {
        let tree = ViewTree::new();
        let switcher = Switcher::new(&tree, 2, 2).unwrap();
        let a = View::new_disabled(&tree, 2, 2).unwrap();
        switcher.add_child(&a, (0, 0)).unwrap();
        assert!(a.is_enabled().unwrap());
        assert_eq!(switcher.current_view().unwrap(), Some(a.id()));
    }

    #[test]
    fn test_set_value_switches_enabled_child() {
        let tree = ViewTree::new();
        let (switcher, a, b) = switcher_with_two_children(&tree);

        switcher.set_value(1).unwrap();
        assert_eq!(switcher.current_view().unwrap(), Some(b.id()));
        assert!(a.is_disabled().unwrap());
        assert!(b.is_enabled().unwrap());

        // Selecting the current index again is a no-op.
        switcher.set_value(1).unwrap();
        assert_eq!(switcher.value().unwrap(), Some(1));
    }

    #[test]
    fn test_routing_follows_current() {
        let tree = ViewTree::new();
        let (switcher, a, b) = switcher_with_two_children(&tree);

        switcher.press((0, 0)).unwrap();
        assert!(a.is_pressed_at((0, 0)).unwrap());

        a.release_all().unwrap();
        switcher.set_value(1).unwrap();
        switcher.press((0, 0)).unwrap();
        assert!(b.is_pressed_at((0, 0)).unwrap());
        assert!(!a.is_pressed_at((0, 0)).unwrap());
    }

    #[test]
    fn test_switch_to_view_and_named() {
        let tree = ViewTree::new();
        let (switcher, a, b) = switcher_with_two_children(&tree);
        b.set_name("second").unwrap();

        switcher.switch_to_view(&b).unwrap();
        assert_eq!(switcher.current_view().unwrap(), Some(b.id()));

        switcher.switch_to_named("second").unwrap();
        assert_eq!(switcher.current_view().unwrap(), Some(b.id()));
        assert!(matches!(
            switcher.switch_to_named("missing"),
            Err(GridError::NoSuchChild { .. })
        ));

        a.set_name("second").unwrap();
        assert!(matches!(
            switcher.switch_to_named("second"),
            Err(GridError::AmbiguousChildName { .. })
        ));
    }

    #[test]
    fn test_remove_current_restores_previous() {
        let tree = ViewTree::new();
        let (switcher, a, b) = switcher_with_two_children(&tree);
        switcher.set_value(1).unwrap();

        switcher.remove_child(&b).unwrap();
        assert_eq!(switcher.current_view().unwrap(), Some(a.id()));
        assert_eq!(switcher.value().unwrap(), Some(0));

        switcher.remove_child(&a).unwrap();
        assert_eq!(switcher.current_view().unwrap(), None);
        assert_eq!(switcher.value().unwrap(), None);
    }
}
