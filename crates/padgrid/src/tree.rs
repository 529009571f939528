//! The view tree.
//!
//! Provides the arena that owns every view of a grid UI:
//! - Stable view identifiers via arena-based storage
//! - Parent-child composition with origin offsets and z-order
//! - Button-event routing down the tree and LED refresh forwarding up it
//! - Enable/disable cascades, flash and indicate effects
//!
//! # Key Types
//!
//! - [`ViewTree`] - Cheaply clonable handle owning the arena
//! - [`WeakViewTree`] - Non-owning handle for stored closures and timers
//! - [`ViewId`] - Unique stable identifier for each view
//!
//! Parent and child references are [`ViewId`]s into the arena, so the
//! tree has no ownership cycles; the typed view handles in
//! [`crate::view`] are thin wrappers around a `(ViewTree, ViewId)` pair.
//!
//! # Locking and callbacks
//!
//! All node state lives behind one `RwLock`. Operations validate and
//! mutate under the lock, collect the listener notifications they caused,
//! and invoke them only after the lock is released — so a listener may
//! freely call back into the tree. The same rule covers the scheduler
//! thread that drives flash and indicate effects. Lit-state functions are
//! the one exception: they are consulted while the lock is held and must
//! not call back into the tree.

use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::RwLock;
use slotmap::{new_key_type, SlotMap};

use padgrid_core::{ConnectionId, Scheduler, Signal};

use crate::config::GridConfig;
use crate::controller::ControllerId;
use crate::error::{GridError, GridResult};
use crate::event::{ButtonEvent, Handled, LedRefresh, Source};
use crate::geometry::{Bounds, Point, Size};

new_key_type! {
    /// A unique identifier for a view in a tree.
    ///
    /// `ViewId`s are stable handles that remain valid for the lifetime of
    /// the tree, even as the view hierarchy changes.
    pub struct ViewId;
}

/// A pure LED criterion: given a view-local point, is its LED lit?
///
/// Consulted with tree-internal locks held; implementations must not call
/// back into the tree.
pub type LitStateFn = Arc<dyn Fn(Point) -> bool + Send + Sync>;

/// Per-node listener lists.
struct NodeSignals {
    button_state_changed: Arc<Signal<ButtonEvent>>,
    led_refreshed: Arc<Signal<LedRefresh>>,
    enabled_changed: Arc<Signal<bool>>,
}

impl NodeSignals {
    fn new() -> Self {
        Self {
            button_state_changed: Arc::new(Signal::new()),
            led_refreshed: Arc::new(Signal::new()),
            enabled_changed: Arc::new(Signal::new()),
        }
    }
}

/// Parent link of an attached view. Present iff the view has a parent,
/// which encodes the parent/origin pairing invariant in the type.
#[derive(Debug, Clone, Copy)]
struct Attachment {
    parent: ViewId,
    origin: Point,
}

/// Container-specific node state.
struct ContainerData {
    press_through: bool,
    /// Sealed containers construct and own their children internally
    /// (multi-button style widgets); external composition is rejected.
    sealed: bool,
    /// Switchers keep exactly zero or one child enabled.
    switcher: bool,
    /// The switcher's enabled child.
    current: Option<ViewId>,
    /// Children in z-order: later entries are topmost.
    children: Vec<ViewId>,
}

/// Top-view-specific node state.
struct TopData {
    children: Vec<ViewId>,
    /// Sources currently holding each point, in press order. A button is
    /// pressed iff its source list is non-empty.
    pressed_by_source: HashMap<Point, Vec<Source>>,
}

/// The closed set of view kinds.
enum Kind {
    View,
    Container(ContainerData),
    Top(TopData),
}

struct Node {
    size: Size,
    attachment: Option<Attachment>,
    enabled: bool,
    name: Option<String>,
    /// Pressed points in press order.
    points_pressed: Vec<Point>,
    /// Per-point LED inversion overlay, row-major.
    inverted_leds: Vec<bool>,
    lit_fn: Option<LitStateFn>,
    kind: Kind,
    signals: NodeSignals,
}

impl Node {
    fn new(size: Size, enabled: bool, kind: Kind) -> Self {
        Self {
            size,
            attachment: None,
            enabled,
            name: None,
            points_pressed: Vec::new(),
            inverted_leds: vec![false; size.area() as usize],
            lit_fn: None,
            kind,
            signals: NodeSignals::new(),
        }
    }

    #[inline]
    fn bounds(&self) -> Bounds {
        Bounds::from_size(self.size)
    }

    fn children(&self) -> Option<&[ViewId]> {
        match &self.kind {
            Kind::View => None,
            Kind::Container(data) => Some(&data.children),
            Kind::Top(data) => Some(&data.children),
        }
    }

    fn children_mut(&mut self) -> Option<&mut Vec<ViewId>> {
        match &mut self.kind {
            Kind::View => None,
            Kind::Container(data) => Some(&mut data.children),
            Kind::Top(data) => Some(&mut data.children),
        }
    }

    fn press_through(&self) -> bool {
        match &self.kind {
            Kind::View => false,
            Kind::Container(data) => data.press_through,
            // Top views process their own state after routing to children.
            Kind::Top(_) => true,
        }
    }

    fn is_top(&self) -> bool {
        matches!(self.kind, Kind::Top(_))
    }

    fn is_switcher(&self) -> bool {
        matches!(&self.kind, Kind::Container(data) if data.switcher)
    }

    fn is_sealed(&self) -> bool {
        matches!(&self.kind, Kind::Container(data) if data.sealed)
    }

    #[inline]
    fn overlay_idx(&self, point: Point) -> usize {
        (point.y * self.size.num_cols + point.x) as usize
    }

    /// The node's own lit state, ignoring children: the lit-state
    /// function (default constant false) XOR the inversion overlay.
    fn own_lit_at(&self, point: Point) -> bool {
        let base = self.lit_fn.as_ref().map(|f| f(point)).unwrap_or(false);
        base != self.inverted_leds[self.overlay_idx(point)]
    }
}

/// A listener notification collected under the lock, fired after it.
enum Emission {
    Button {
        signal: Arc<Signal<ButtonEvent>>,
        event: ButtonEvent,
    },
    Led {
        signal: Arc<Signal<LedRefresh>>,
        event: LedRefresh,
    },
    Enabled {
        signal: Arc<Signal<bool>>,
        enabled: bool,
    },
}

impl Emission {
    fn fire(self) {
        match self {
            Emission::Button { signal, event } => signal.emit(&event),
            Emission::Led { signal, event } => signal.emit(&event),
            Emission::Enabled { signal, enabled } => signal.emit(&enabled),
        }
    }
}

/// Deferred work that must run after the lock is released and the
/// collected emissions have fired.
enum PostAction {
    None,
    Indicate { view: ViewId, bounds: Bounds },
}

struct TreeState {
    nodes: SlotMap<ViewId, Node>,
    controllers: SlotMap<ControllerId, ()>,
    config: GridConfig,
}

impl TreeState {
    fn node(&self, id: ViewId) -> GridResult<&Node> {
        self.nodes.get(id).ok_or(GridError::InvalidViewId)
    }

    fn node_mut(&mut self, id: ViewId) -> GridResult<&mut Node> {
        self.nodes.get_mut(id).ok_or(GridError::InvalidViewId)
    }

    fn validate_contains_point(&self, id: ViewId, point: Point) -> GridResult<()> {
        let node = self.node(id)?;
        if node.bounds().contains_point(point) {
            Ok(())
        } else {
            Err(GridError::OutOfBounds {
                point,
                size: node.size,
            })
        }
    }

    fn validate_contains_bounds(&self, id: ViewId, bounds: Bounds) -> GridResult<()> {
        let node = self.node(id)?;
        if node.bounds().contains_bounds(bounds) {
            Ok(())
        } else {
            Err(GridError::BoundsNotContained {
                bounds,
                size: node.size,
            })
        }
    }

    /// The last-added (topmost) enabled child covering `point`, with its
    /// origin. `Ok(None)` for plain views and uncovered points.
    fn topmost_enabled_child_at(
        &self,
        id: ViewId,
        point: Point,
    ) -> GridResult<Option<(ViewId, Point)>> {
        let node = self.node(id)?;
        let Some(children) = node.children() else {
            return Ok(None);
        };
        for &child_id in children.iter().rev() {
            let child = self.node(child_id)?;
            if !child.enabled {
                continue;
            }
            let Some(att) = child.attachment else {
                continue;
            };
            if Bounds::new(att.origin, child.size).contains_point(point) {
                return Ok(Some((child_id, att.origin)));
            }
        }
        Ok(None)
    }

    // =========================================================================
    // Button pipeline
    // =========================================================================

    /// Route a button event into the view at `id`.
    ///
    /// Returns the views that performed a genuine state transition.
    /// Disabled views and idempotent events yield an empty list.
    fn handle_button_event(
        &mut self,
        id: ViewId,
        source: Source,
        point: Point,
        pressed: bool,
        out: &mut Vec<Emission>,
    ) -> GridResult<Vec<Handled>> {
        if !self.node(id)?.enabled {
            return Ok(Vec::new());
        }
        self.validate_contains_point(id, point)?;

        // Top views aggregate per source: forward a press only on the
        // empty -> non-empty transition of the point's source set, and a
        // release only when the set empties.
        if self.node(id)?.is_top() && !self.top_aggregate(id, source, point, pressed)? {
            if self.config.trace_button_events {
                tracing::debug!(
                    target: "padgrid::events",
                    view = ?id, %point, pressed, ?source,
                    "button event absorbed by source aggregation"
                );
            }
            return Ok(Vec::new());
        }

        if let Some((child, child_origin)) = self.topmost_enabled_child_at(id, point)? {
            if self.config.trace_button_events {
                tracing::debug!(
                    target: "padgrid::events",
                    view = ?id, %point, pressed, ?child,
                    "button event forwarded to child"
                );
            }
            let mut responses =
                self.handle_button_event(child, source, point - child_origin, pressed, out)?;
            if self.node(id)?.press_through() {
                for handled in self.local_transition(id, point, pressed, out)? {
                    // Set-union: no duplicate entries.
                    if !responses.contains(&handled) {
                        responses.push(handled);
                    }
                }
            }
            Ok(responses)
        } else {
            self.local_transition(id, point, pressed, out)
        }
    }

    /// Record a press/release transition for `point`, updating the
    /// source-set bookkeeping of a top view. Returns whether the event
    /// should proceed into the ordinary pressed-state machinery.
    fn top_aggregate(
        &mut self,
        id: ViewId,
        source: Source,
        point: Point,
        pressed: bool,
    ) -> GridResult<bool> {
        let node = self.node_mut(id)?;
        let Kind::Top(top) = &mut node.kind else {
            return Ok(true);
        };
        let sources = top.pressed_by_source.entry(point).or_default();
        if pressed {
            if sources.contains(&source) {
                return Ok(false);
            }
            sources.push(source);
            Ok(sources.len() == 1)
        } else {
            let Some(idx) = sources.iter().position(|s| *s == source) else {
                return Ok(false);
            };
            sources.remove(idx);
            Ok(sources.is_empty())
        }
    }

    /// The plain per-view pressed-state machine: Released <-> Pressed,
    /// transitioning only when the new state differs.
    fn local_transition(
        &mut self,
        id: ViewId,
        point: Point,
        pressed: bool,
        out: &mut Vec<Emission>,
    ) -> GridResult<Vec<Handled>> {
        let trace = self.config.trace_button_events;
        let node = self.node_mut(id)?;
        let idx = node.points_pressed.iter().position(|&q| q == point);
        let changed = match (idx, pressed) {
            (None, true) => {
                node.points_pressed.push(point);
                true
            }
            (Some(i), false) => {
                node.points_pressed.remove(i);
                true
            }
            _ => false,
        };
        if !changed {
            if trace {
                tracing::debug!(
                    target: "padgrid::events",
                    view = ?id, %point, pressed,
                    "button state already current, listeners not invoked"
                );
            }
            return Ok(Vec::new());
        }
        out.push(Emission::Button {
            signal: node.signals.button_state_changed.clone(),
            event: ButtonEvent { point, pressed },
        });
        if trace {
            tracing::debug!(
                target: "padgrid::events",
                view = ?id, %point, pressed,
                "button state changed"
            );
        }
        Ok(vec![Handled { view: id, point }])
    }

    /// Release a pressed point directly at this view, bypassing routing.
    fn force_release(&mut self, id: ViewId, point: Point, out: &mut Vec<Emission>) -> GridResult<()> {
        if let Kind::Top(top) = &mut self.node_mut(id)?.kind {
            top.pressed_by_source.remove(&point);
        }
        self.local_transition(id, point, false, out)?;
        Ok(())
    }

    /// Release this view's own pressed points inside `bounds`. Children
    /// are unaffected.
    fn release_own_within_bounds(
        &mut self,
        id: ViewId,
        bounds: Bounds,
        out: &mut Vec<Emission>,
    ) -> GridResult<()> {
        let points: Vec<Point> = self
            .node(id)?
            .points_pressed
            .iter()
            .copied()
            .filter(|&p| bounds.contains_point(p))
            .collect();
        for point in points {
            self.force_release(id, point, out)?;
        }
        Ok(())
    }

    /// Release everything pressed on this view and, recursively, on its
    /// enabled descendants.
    fn release_all_recursive(&mut self, id: ViewId, out: &mut Vec<Emission>) -> GridResult<()> {
        let bounds = self.node(id)?.bounds();
        self.release_own_within_bounds(id, bounds, out)?;
        let children: Option<Vec<ViewId>> = self.node(id)?.children().map(|c| c.to_vec());
        if let Some(children) = children {
            for child in children {
                if self.node(child)?.enabled {
                    self.release_all_recursive(child, out)?;
                }
            }
        }
        Ok(())
    }

    // =========================================================================
    // LED pipeline
    // =========================================================================

    /// The routed lit state: the topmost enabled child covering the point
    /// answers, else the view's own lit state applies.
    fn lit_at(&self, id: ViewId, point: Point) -> GridResult<bool> {
        self.validate_contains_point(id, point)?;
        if let Some((child, origin)) = self.topmost_enabled_child_at(id, point)? {
            return self.lit_at(child, point - origin);
        }
        Ok(self.node(id)?.own_lit_at(point))
    }

    /// Deliver an LED refresh for `view` at `point` to the view's own
    /// listeners, then forward it up the parent chain while each ancestor
    /// is enabled and still considers the forwarding child topmost at the
    /// point. `forced` overrides the computed lit state (indicate blinks).
    fn emit_led(
        &self,
        view: ViewId,
        point: Point,
        forced: Option<bool>,
        out: &mut Vec<Emission>,
    ) -> GridResult<()> {
        let node = self.node(view)?;
        let on = match forced {
            Some(on) => on,
            None => node.own_lit_at(point),
        };
        out.push(Emission::Led {
            signal: node.signals.led_refreshed.clone(),
            event: LedRefresh {
                source: view,
                point,
                on,
            },
        });
        if self.config.trace_led_events {
            tracing::debug!(target: "padgrid::led", view = ?view, %point, on, "led refreshed");
        }

        let mut current = view;
        let mut local = point;
        loop {
            let Some(att) = self.node(current)?.attachment else {
                break;
            };
            let global = local + att.origin;
            let parent_enabled = self.node(att.parent)?.enabled;
            let topmost = self
                .topmost_enabled_child_at(att.parent, global)?
                .map(|(child, _)| child);
            if !parent_enabled || topmost != Some(current) {
                if self.config.trace_led_events {
                    tracing::debug!(
                        target: "padgrid::led",
                        view = ?current, parent = ?att.parent, point = %global, on,
                        "led refresh not forwarded, view not topmost enabled owner"
                    );
                }
                break;
            }
            out.push(Emission::Led {
                signal: self.node(att.parent)?.signals.led_refreshed.clone(),
                event: LedRefresh {
                    source: view,
                    point: global,
                    on,
                },
            });
            current = att.parent;
            local = global;
        }
        Ok(())
    }

    fn refresh_point_inner(&self, id: ViewId, point: Point, out: &mut Vec<Emission>) -> GridResult<()> {
        let node = self.node(id)?;
        if !node.enabled {
            return Err(GridError::Disabled);
        }
        self.validate_contains_point(id, point)?;
        if let Some((child, origin)) = self.topmost_enabled_child_at(id, point)? {
            if self.config.trace_led_events {
                tracing::debug!(
                    target: "padgrid::led",
                    view = ?id, %point, ?child,
                    "refresh forwarded to child"
                );
            }
            return self.refresh_point_inner(child, point - origin, out);
        }
        self.emit_led(id, point, None, out)
    }

    fn refresh_points_inner(
        &self,
        id: ViewId,
        points: &[Point],
        out: &mut Vec<Emission>,
    ) -> GridResult<()> {
        for &point in points {
            self.refresh_point_inner(id, point, out)?;
        }
        Ok(())
    }

    fn refresh_bounds_inner(
        &self,
        id: ViewId,
        bounds: Bounds,
        out: &mut Vec<Emission>,
    ) -> GridResult<()> {
        if !self.node(id)?.enabled {
            return Err(GridError::Disabled);
        }
        self.validate_contains_bounds(id, bounds)?;
        for point in bounds.points() {
            self.refresh_point_inner(id, point, out)?;
        }
        Ok(())
    }

    fn refresh_inner(&self, id: ViewId, out: &mut Vec<Emission>) -> GridResult<()> {
        let bounds = self.node(id)?.bounds();
        if !self.node(id)?.enabled {
            return Err(GridError::Disabled);
        }
        for point in bounds.points() {
            self.refresh_point_inner(id, point, out)?;
        }
        Ok(())
    }

    // =========================================================================
    // Enable / disable
    // =========================================================================

    fn set_enabled_inner(&mut self, id: ViewId, enabled: bool, out: &mut Vec<Emission>) -> GridResult<()> {
        let node = self.node(id)?;
        if node.enabled == enabled {
            return Err(if enabled {
                GridError::AlreadyEnabled
            } else {
                GridError::AlreadyDisabled
            });
        }
        let attachment = node.attachment;
        let size = node.size;

        if enabled {
            // Release stale presses the parent accumulated over this
            // footprint while the view was disabled. The view itself is
            // still disabled here, so routing cannot reach it.
            if let Some(att) = attachment {
                self.release_own_within_bounds(att.parent, Bounds::new(att.origin, size), out)?;
            }
            self.node_mut(id)?.enabled = true;
            self.refresh_inner(id, out)?;
        } else {
            self.release_all_recursive(id, out)?;
            self.node_mut(id)?.enabled = false;
            // The parent's own LED state is authoritative again over the
            // vacated footprint.
            if let Some(att) = attachment {
                if self.node(att.parent)?.enabled {
                    self.refresh_bounds_inner(att.parent, Bounds::new(att.origin, size), out)?;
                }
            }
        }
        let signal = self.node(id)?.signals.enabled_changed.clone();
        out.push(Emission::Enabled { signal, enabled });
        tracing::trace!(target: "padgrid::tree", view = ?id, enabled, "view enabled state changed");
        Ok(())
    }

    // =========================================================================
    // Composition
    // =========================================================================

    fn add_child_inner(
        &mut self,
        parent_id: ViewId,
        child_id: ViewId,
        origin: Point,
        internal: bool,
        out: &mut Vec<Emission>,
    ) -> GridResult<PostAction> {
        let (parent_sealed, parent_is_switcher, parent_size, parent_is_container) = {
            let parent = self.node(parent_id)?;
            (
                parent.is_sealed(),
                parent.is_switcher(),
                parent.size,
                parent.children().is_some(),
            )
        };
        if !parent_is_container {
            return Err(GridError::NotAContainer);
        }
        if parent_sealed && !internal {
            return Err(GridError::ManagedChildren);
        }

        let child = self.node(child_id)?;
        if child.is_top() {
            return Err(GridError::TopViewAsChild);
        }
        if child.attachment.is_some() {
            return Err(GridError::AlreadyHasParent);
        }
        let child_size = child.size;
        let child_enabled = child.enabled;

        if origin.x < 0 || origin.y < 0 {
            return Err(GridError::NegativeOrigin { origin });
        }
        let footprint = Bounds::new(origin, child_size);
        if !Bounds::from_size(parent_size).contains_bounds(footprint) {
            return Err(GridError::BoundsNotContained {
                bounds: footprint,
                size: parent_size,
            });
        }

        // Cycle prevention: the parent may not be the child itself or any
        // of the child's descendants.
        let mut current = Some(parent_id);
        while let Some(cur) = current {
            if cur == child_id {
                return Err(GridError::CircularParentage);
            }
            current = self.node(cur)?.attachment.map(|a| a.parent);
        }

        // Switchers admit the first child as current and queue later
        // children disabled behind it.
        if parent_is_switcher {
            if self.switcher_current_of(parent_id)?.is_some() {
                if child_enabled {
                    self.set_enabled_inner(child_id, false, out)?;
                }
            } else {
                if !child_enabled {
                    self.set_enabled_inner(child_id, true, out)?;
                }
                self.set_switcher_current(parent_id, Some(child_id))?;
            }
        }

        // No press state may leak under the new coverage.
        self.release_own_within_bounds(parent_id, footprint, out)?;

        self.node_mut(parent_id)?
            .children_mut()
            .ok_or(GridError::NotAContainer)?
            .push(child_id);
        self.node_mut(child_id)?.attachment = Some(Attachment {
            parent: parent_id,
            origin,
        });
        tracing::trace!(
            target: "padgrid::tree",
            parent = ?parent_id, child = ?child_id, %origin,
            "added child"
        );

        let child_enabled = self.node(child_id)?.enabled;
        if !internal && self.config.indicate_on_structure_change {
            Ok(PostAction::Indicate {
                view: parent_id,
                bounds: footprint,
            })
        } else {
            if child_enabled {
                self.refresh_inner(child_id, out)?;
            }
            Ok(PostAction::None)
        }
    }

    fn remove_child_inner(
        &mut self,
        parent_id: ViewId,
        child_id: ViewId,
        internal: bool,
        out: &mut Vec<Emission>,
    ) -> GridResult<PostAction> {
        let (parent_sealed, parent_is_switcher, parent_enabled) = {
            let parent = self.node(parent_id)?;
            (parent.is_sealed(), parent.is_switcher(), parent.enabled)
        };
        if parent_sealed && !internal {
            return Err(GridError::ManagedChildren);
        }
        let att = self.node(child_id)?.attachment;
        let Some(att) = att.filter(|a| a.parent == parent_id) else {
            return Err(GridError::NotAChild);
        };

        // A switcher re-selects before its current child departs.
        if parent_is_switcher && self.switcher_current_of(parent_id)? == Some(child_id) {
            let children = self.children_of(parent_id)?;
            if children.len() == 1 {
                self.set_switcher_current(parent_id, None)?;
            } else {
                let index = children
                    .iter()
                    .position(|&c| c == child_id)
                    .ok_or(GridError::NotAChild)?;
                let next = if index == 0 { 1 } else { index - 1 };
                self.set_switcher_value_inner(parent_id, next, out)?;
            }
        }

        let child_enabled = self.node(child_id)?.enabled;
        let child_size = self.node(child_id)?.size;
        self.node_mut(parent_id)?
            .children_mut()
            .ok_or(GridError::NotAContainer)?
            .retain(|&c| c != child_id);
        self.node_mut(child_id)?.attachment = None;
        tracing::trace!(
            target: "padgrid::tree",
            parent = ?parent_id, child = ?child_id,
            "removed child"
        );

        let footprint = Bounds::new(att.origin, child_size);
        if !internal && self.config.indicate_on_structure_change {
            Ok(PostAction::Indicate {
                view: parent_id,
                bounds: footprint,
            })
        } else {
            if child_enabled && parent_enabled {
                self.refresh_bounds_inner(parent_id, footprint, out)?;
            }
            Ok(PostAction::None)
        }
    }

    fn reorder_child(
        &mut self,
        parent_id: ViewId,
        child_id: ViewId,
        to_front: bool,
        out: &mut Vec<Emission>,
    ) -> GridResult<()> {
        let att = self.node(child_id)?.attachment;
        let Some(att) = att.filter(|a| a.parent == parent_id) else {
            return Err(GridError::NotAChild);
        };
        let children = self
            .node_mut(parent_id)?
            .children_mut()
            .ok_or(GridError::NotAContainer)?;
        children.retain(|&c| c != child_id);
        if to_front {
            children.push(child_id);
        } else {
            children.insert(0, child_id);
        }
        // Overlapping siblings may have changed visibility over the
        // child's footprint.
        let footprint = Bounds::new(att.origin, self.node(child_id)?.size);
        if self.node(parent_id)?.enabled {
            self.refresh_bounds_inner(parent_id, footprint, out)?;
        }
        Ok(())
    }

    // =========================================================================
    // Switcher
    // =========================================================================

    fn switcher_current_of(&self, id: ViewId) -> GridResult<Option<ViewId>> {
        match &self.node(id)?.kind {
            Kind::Container(data) if data.switcher => Ok(data.current),
            _ => Err(GridError::NotASwitcher),
        }
    }

    fn set_switcher_current(&mut self, id: ViewId, current: Option<ViewId>) -> GridResult<()> {
        match &mut self.node_mut(id)?.kind {
            Kind::Container(data) if data.switcher => {
                data.current = current;
                Ok(())
            }
            _ => Err(GridError::NotASwitcher),
        }
    }

    fn set_switcher_value_inner(
        &mut self,
        id: ViewId,
        index: usize,
        out: &mut Vec<Emission>,
    ) -> GridResult<()> {
        let current = self.switcher_current_of(id)?;
        let children = self.children_of(id)?;
        if index >= children.len() {
            return Err(GridError::IndexOutOfRange {
                index,
                count: children.len(),
            });
        }
        let new_current = children[index];
        if current == Some(new_current) {
            return Ok(());
        }
        if let Some(prev) = current {
            self.set_switcher_current(id, None)?;
            self.set_enabled_inner(prev, false, out)?;
        }
        self.set_enabled_inner(new_current, true, out)?;
        self.set_switcher_current(id, Some(new_current))?;
        Ok(())
    }

    fn children_of(&self, id: ViewId) -> GridResult<Vec<ViewId>> {
        self.node(id)?
            .children()
            .map(|c| c.to_vec())
            .ok_or(GridError::NotAContainer)
    }
}

struct TreeShared {
    state: RwLock<TreeState>,
    scheduler: Scheduler,
    controller_registered: Signal<ControllerId>,
}

/// A handle to a view tree.
///
/// Cloning is cheap and every clone refers to the same tree. The tree
/// owns the arena of views, the per-tree configuration, and the worker
/// that drives flash/indicate timers.
#[derive(Clone)]
pub struct ViewTree {
    inner: Arc<TreeShared>,
}

/// A non-owning [`ViewTree`] handle.
///
/// Stored closures and scheduled timers hold these so a tree is freed
/// when the application drops its last strong handle; a late timer fire
/// against a dropped tree is a silent no-op.
#[derive(Clone)]
pub struct WeakViewTree {
    inner: Weak<TreeShared>,
}

impl WeakViewTree {
    /// Attempt to recover a strong handle.
    pub fn upgrade(&self) -> Option<ViewTree> {
        self.inner.upgrade().map(|inner| ViewTree { inner })
    }
}

impl Default for ViewTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewTree {
    /// Create a tree with default configuration.
    pub fn new() -> Self {
        Self::with_config(GridConfig::default())
    }

    /// Create a tree with the given configuration.
    pub fn with_config(config: GridConfig) -> Self {
        Self {
            inner: Arc::new(TreeShared {
                state: RwLock::new(TreeState {
                    nodes: SlotMap::with_key(),
                    controllers: SlotMap::with_key(),
                    config,
                }),
                scheduler: Scheduler::new(),
                controller_registered: Signal::new(),
            }),
        }
    }

    /// Get a copy of this tree's configuration.
    pub fn config(&self) -> GridConfig {
        self.inner.state.read().config.clone()
    }

    /// Downgrade to a non-owning handle.
    pub fn downgrade(&self) -> WeakViewTree {
        WeakViewTree {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether two handles refer to the same tree.
    pub fn same_tree(&self, other: &ViewTree) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn read<T>(&self, f: impl FnOnce(&TreeState) -> GridResult<T>) -> GridResult<T> {
        f(&self.inner.state.read())
    }

    /// Run a mutation under the write lock, then fire the listener
    /// notifications it collected.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut TreeState, &mut Vec<Emission>) -> GridResult<T>,
    ) -> GridResult<T> {
        let mut emissions = Vec::new();
        let result = {
            let mut state = self.inner.state.write();
            f(&mut state, &mut emissions)
        };
        for emission in emissions {
            emission.fire();
        }
        result
    }

    fn run_post(&self, action: PostAction) -> GridResult<()> {
        match action {
            PostAction::None => Ok(()),
            PostAction::Indicate { view, bounds } => self.indicate_bounds(view, bounds, None, None),
        }
    }

    // =========================================================================
    // View creation
    // =========================================================================

    fn create_node(&self, size: Size, enabled: bool, kind: Kind) -> GridResult<ViewId> {
        if size.num_cols < 1 || size.num_rows < 1 {
            return Err(GridError::InvalidSize { size });
        }
        let id = self
            .inner
            .state
            .write()
            .nodes
            .insert(Node::new(size, enabled, kind));
        tracing::trace!(target: "padgrid::tree", ?id, %size, enabled, "created view");
        Ok(id)
    }

    pub(crate) fn create_view(&self, size: Size, enabled: bool) -> GridResult<ViewId> {
        self.create_node(size, enabled, Kind::View)
    }

    pub(crate) fn create_container(
        &self,
        size: Size,
        enabled: bool,
        press_through: bool,
        sealed: bool,
        switcher: bool,
    ) -> GridResult<ViewId> {
        self.create_node(
            size,
            enabled,
            Kind::Container(ContainerData {
                press_through,
                sealed,
                switcher,
                current: None,
                children: Vec::new(),
            }),
        )
    }

    pub(crate) fn create_top(&self, size: Size, enabled: bool) -> GridResult<ViewId> {
        self.create_node(
            size,
            enabled,
            Kind::Top(TopData {
                children: Vec::new(),
                pressed_by_source: HashMap::new(),
            }),
        )
    }

    // =========================================================================
    // Basic queries
    // =========================================================================

    /// Get the view's size.
    pub fn size(&self, id: ViewId) -> GridResult<Size> {
        self.read(|s| Ok(s.node(id)?.size))
    }

    /// Get the view's bounds anchored at (0, 0).
    pub fn bounds(&self, id: ViewId) -> GridResult<Bounds> {
        self.read(|s| Ok(s.node(id)?.bounds()))
    }

    /// Check whether the view is enabled.
    pub fn is_enabled(&self, id: ViewId) -> GridResult<bool> {
        self.read(|s| Ok(s.node(id)?.enabled))
    }

    /// Get the view's parent, if attached.
    pub fn parent(&self, id: ViewId) -> GridResult<Option<ViewId>> {
        self.read(|s| Ok(s.node(id)?.attachment.map(|a| a.parent)))
    }

    /// Get the view's origin within its parent, if attached.
    pub fn origin(&self, id: ViewId) -> GridResult<Option<Point>> {
        self.read(|s| Ok(s.node(id)?.attachment.map(|a| a.origin)))
    }

    /// Get the view's name.
    pub fn name(&self, id: ViewId) -> GridResult<Option<String>> {
        self.read(|s| Ok(s.node(id)?.name.clone()))
    }

    /// Set the view's name.
    pub fn set_name(&self, id: ViewId, name: impl Into<String>) -> GridResult<()> {
        let name = name.into();
        self.mutate(|s, _| {
            s.node_mut(id)?.name = Some(name);
            Ok(())
        })
    }

    /// Check if a point lies within the view's bounds.
    pub fn contains_point(&self, id: ViewId, point: Point) -> GridResult<bool> {
        self.read(|s| Ok(s.node(id)?.bounds().contains_point(point)))
    }

    /// Check if a sub-rectangle lies within the view's bounds.
    pub fn contains_bounds(&self, id: ViewId, bounds: Bounds) -> GridResult<bool> {
        self.read(|s| Ok(s.node(id)?.bounds().contains_bounds(bounds)))
    }

    // =========================================================================
    // Pressed state
    // =========================================================================

    /// Check whether the button at `point` is pressed.
    pub fn is_pressed_at(&self, id: ViewId, point: Point) -> GridResult<bool> {
        self.read(|s| {
            s.validate_contains_point(id, point)?;
            Ok(s.node(id)?.points_pressed.contains(&point))
        })
    }

    /// The view's pressed points, in press order.
    pub fn points_pressed(&self, id: ViewId) -> GridResult<Vec<Point>> {
        self.read(|s| Ok(s.node(id)?.points_pressed.clone()))
    }

    /// The view's pressed points inside `bounds`, in press order.
    pub fn points_pressed_within_bounds(&self, id: ViewId, bounds: Bounds) -> GridResult<Vec<Point>> {
        self.read(|s| {
            s.validate_contains_bounds(id, bounds)?;
            Ok(s.node(id)?
                .points_pressed
                .iter()
                .copied()
                .filter(|&p| bounds.contains_point(p))
                .collect())
        })
    }

    /// Whether any of the view's own buttons inside `bounds` is pressed.
    pub fn any_pressed_within_bounds(&self, id: ViewId, bounds: Bounds) -> GridResult<bool> {
        Ok(!self.points_pressed_within_bounds(id, bounds)?.is_empty())
    }

    /// Whether every one of the view's own buttons inside `bounds` is
    /// pressed.
    pub fn all_pressed_within_bounds(&self, id: ViewId, bounds: Bounds) -> GridResult<bool> {
        Ok(self.points_pressed_within_bounds(id, bounds)?.len() as i32 == bounds.size.area())
    }

    /// Whether any of the view's own buttons inside `bounds` is
    /// released.
    pub fn any_released_within_bounds(&self, id: ViewId, bounds: Bounds) -> GridResult<bool> {
        Ok(!self.all_pressed_within_bounds(id, bounds)?)
    }

    /// Whether every one of the view's own buttons inside `bounds` is
    /// released.
    pub fn all_released_within_bounds(&self, id: ViewId, bounds: Bounds) -> GridResult<bool> {
        Ok(self.points_pressed_within_bounds(id, bounds)?.is_empty())
    }

    /// The number of the view's own pressed buttons inside `bounds`.
    pub fn num_pressed_within_bounds(&self, id: ViewId, bounds: Bounds) -> GridResult<usize> {
        Ok(self.points_pressed_within_bounds(id, bounds)?.len())
    }

    /// Whether any button is pressed.
    pub fn any_pressed(&self, id: ViewId) -> GridResult<bool> {
        self.read(|s| Ok(!s.node(id)?.points_pressed.is_empty()))
    }

    /// Whether every button is pressed.
    pub fn all_pressed(&self, id: ViewId) -> GridResult<bool> {
        self.read(|s| {
            let node = s.node(id)?;
            Ok(node.points_pressed.len() as i32 == node.size.area())
        })
    }

    /// Whether any button is released.
    pub fn any_released(&self, id: ViewId) -> GridResult<bool> {
        Ok(!self.all_pressed(id)?)
    }

    /// Whether every button is released.
    pub fn all_released(&self, id: ViewId) -> GridResult<bool> {
        Ok(!self.any_pressed(id)?)
    }

    /// The number of pressed buttons.
    pub fn num_pressed(&self, id: ViewId) -> GridResult<usize> {
        self.read(|s| Ok(s.node(id)?.points_pressed.len()))
    }

    /// The earliest still-held press.
    pub fn first_pressed(&self, id: ViewId) -> GridResult<Option<Point>> {
        self.read(|s| Ok(s.node(id)?.points_pressed.first().copied()))
    }

    /// The most recent press.
    pub fn last_pressed(&self, id: ViewId) -> GridResult<Option<Point>> {
        self.read(|s| Ok(s.node(id)?.points_pressed.last().copied()))
    }

    /// Pressed points in the leftmost pressed column.
    pub fn leftmost_pressed(&self, id: ViewId) -> GridResult<Vec<Point>> {
        self.pressed_extreme(id, |p| p.x, false)
    }

    /// Pressed points in the rightmost pressed column.
    pub fn rightmost_pressed(&self, id: ViewId) -> GridResult<Vec<Point>> {
        self.pressed_extreme(id, |p| p.x, true)
    }

    /// Pressed points in the topmost pressed row.
    pub fn topmost_pressed(&self, id: ViewId) -> GridResult<Vec<Point>> {
        self.pressed_extreme(id, |p| p.y, false)
    }

    /// Pressed points in the bottommost pressed row.
    pub fn bottommost_pressed(&self, id: ViewId) -> GridResult<Vec<Point>> {
        self.pressed_extreme(id, |p| p.y, true)
    }

    /// The leftmost pressed column, if any button is pressed.
    pub fn leftmost_col_pressed(&self, id: ViewId) -> GridResult<Option<i32>> {
        Ok(self.leftmost_pressed(id)?.first().map(|p| p.x))
    }

    /// The rightmost pressed column, if any button is pressed.
    pub fn rightmost_col_pressed(&self, id: ViewId) -> GridResult<Option<i32>> {
        Ok(self.rightmost_pressed(id)?.first().map(|p| p.x))
    }

    /// The topmost pressed row, if any button is pressed.
    pub fn topmost_row_pressed(&self, id: ViewId) -> GridResult<Option<i32>> {
        Ok(self.topmost_pressed(id)?.first().map(|p| p.y))
    }

    /// The bottommost pressed row, if any button is pressed.
    pub fn bottommost_row_pressed(&self, id: ViewId) -> GridResult<Option<i32>> {
        Ok(self.bottommost_pressed(id)?.first().map(|p| p.y))
    }

    fn pressed_extreme(
        &self,
        id: ViewId,
        key: impl Fn(&Point) -> i32,
        max: bool,
    ) -> GridResult<Vec<Point>> {
        self.read(|s| {
            let pressed = &s.node(id)?.points_pressed;
            let extreme = if max {
                pressed.iter().map(&key).max()
            } else {
                pressed.iter().map(&key).min()
            };
            Ok(match extreme {
                Some(value) => pressed.iter().copied().filter(|p| key(p) == value).collect(),
                None => Vec::new(),
            })
        })
    }

    /// Whether a top view records `source` as holding `point`.
    pub fn is_pressed_by_source_at(
        &self,
        id: ViewId,
        source: Source,
        point: Point,
    ) -> GridResult<bool> {
        self.read(|s| {
            s.validate_contains_point(id, point)?;
            match &s.node(id)?.kind {
                Kind::Top(top) => Ok(top
                    .pressed_by_source
                    .get(&point)
                    .is_some_and(|sources| sources.contains(&source))),
                _ => Err(GridError::NotATopView),
            }
        })
    }

    // =========================================================================
    // Button input
    // =========================================================================

    /// Press the button at `point` as a local event.
    ///
    /// Not available on top views, which aggregate per external source.
    pub fn press(&self, id: ViewId, point: Point) -> GridResult<Vec<Handled>> {
        self.local_input(id, point, true)
    }

    /// Release the button at `point` as a local event.
    pub fn release(&self, id: ViewId, point: Point) -> GridResult<Vec<Handled>> {
        self.local_input(id, point, false)
    }

    fn local_input(&self, id: ViewId, point: Point, pressed: bool) -> GridResult<Vec<Handled>> {
        self.mutate(|s, out| {
            if s.node(id)?.is_top() {
                return Err(GridError::TopViewLocalInput);
            }
            s.handle_button_event(id, Source::View(id), point, pressed, out)
        })
    }

    /// Route a button event from an explicit source into the view.
    ///
    /// This is the device-level entry point used by controllers.
    pub fn handle_button_event(
        &self,
        id: ViewId,
        source: Source,
        point: Point,
        pressed: bool,
    ) -> GridResult<Vec<Handled>> {
        self.mutate(|s, out| s.handle_button_event(id, source, point, pressed, out))
    }

    /// Release every pressed button on the view and its enabled
    /// descendants.
    pub fn release_all(&self, id: ViewId) -> GridResult<()> {
        self.mutate(|s, out| s.release_all_recursive(id, out))
    }

    /// Release the view's own pressed buttons inside `bounds`.
    pub fn release_all_within_bounds(&self, id: ViewId, bounds: Bounds) -> GridResult<()> {
        self.mutate(|s, out| {
            s.validate_contains_bounds(id, bounds)?;
            s.release_own_within_bounds(id, bounds, out)
        })
    }

    // =========================================================================
    // Lit state and refresh
    // =========================================================================

    /// The lit state at `point`: the topmost enabled child covering the
    /// point answers, else the view's own lit-state function XOR its
    /// inversion overlay.
    pub fn is_lit_at(&self, id: ViewId, point: Point) -> GridResult<bool> {
        self.read(|s| s.lit_at(id, point))
    }

    /// Whether any LED of the view is lit.
    pub fn any_lit(&self, id: ViewId) -> GridResult<bool> {
        self.read(|s| {
            let bounds = s.node(id)?.bounds();
            for point in bounds.points() {
                if s.lit_at(id, point)? {
                    return Ok(true);
                }
            }
            Ok(false)
        })
    }

    /// Whether every LED of the view is lit.
    pub fn all_lit(&self, id: ViewId) -> GridResult<bool> {
        self.read(|s| {
            let bounds = s.node(id)?.bounds();
            for point in bounds.points() {
                if !s.lit_at(id, point)? {
                    return Ok(false);
                }
            }
            Ok(true)
        })
    }

    /// Whether any LED of the view is unlit.
    pub fn any_unlit(&self, id: ViewId) -> GridResult<bool> {
        Ok(!self.all_lit(id)?)
    }

    /// Whether every LED of the view is unlit.
    pub fn all_unlit(&self, id: ViewId) -> GridResult<bool> {
        Ok(!self.any_lit(id)?)
    }

    /// The lit state of every point inside `bounds`.
    pub fn led_state_within_bounds(
        &self,
        id: ViewId,
        bounds: Bounds,
    ) -> GridResult<Vec<(Point, bool)>> {
        self.read(|s| {
            s.validate_contains_bounds(id, bounds)?;
            bounds
                .points()
                .map(|p| Ok((p, s.lit_at(id, p)?)))
                .collect()
        })
    }

    /// Install the view's lit-state function.
    ///
    /// The function is consulted with tree-internal locks held and must
    /// not call back into the tree. Without one the view's base lit state
    /// is constant false.
    pub fn set_lit_state_fn<F>(&self, id: ViewId, f: F) -> GridResult<()>
    where
        F: Fn(Point) -> bool + Send + Sync + 'static,
    {
        self.mutate(|s, _| {
            s.node_mut(id)?.lit_fn = Some(Arc::new(f));
            Ok(())
        })
    }

    /// Remove the view's lit-state function.
    pub fn clear_lit_state_fn(&self, id: ViewId) -> GridResult<()> {
        self.mutate(|s, _| {
            s.node_mut(id)?.lit_fn = None;
            Ok(())
        })
    }

    /// Refresh every LED of the view. Errors when the view is disabled.
    pub fn refresh(&self, id: ViewId) -> GridResult<()> {
        self.mutate(|s, out| s.refresh_inner(id, out))
    }

    /// Refresh the LEDs inside `bounds`. Errors when the view is
    /// disabled.
    pub fn refresh_bounds(&self, id: ViewId, bounds: Bounds) -> GridResult<()> {
        self.mutate(|s, out| s.refresh_bounds_inner(id, bounds, out))
    }

    /// Refresh the listed points. Errors when the view is disabled.
    pub fn refresh_points(&self, id: ViewId, points: &[Point]) -> GridResult<()> {
        self.mutate(|s, out| s.refresh_points_inner(id, points, out))
    }

    /// Refresh a single LED. Errors when the view is disabled.
    pub fn refresh_point(&self, id: ViewId, point: Point) -> GridResult<()> {
        self.mutate(|s, out| s.refresh_point_inner(id, point, out))
    }

    // =========================================================================
    // Enable / disable
    // =========================================================================

    /// Enable the view. Errors when already enabled, or when the view is
    /// a switcher-managed child.
    pub fn enable(&self, id: ViewId) -> GridResult<()> {
        self.set_enabled(id, true)
    }

    /// Disable the view, releasing every pressed button on it and its
    /// enabled descendants. Errors when already disabled, or when the
    /// view is a switcher-managed child.
    pub fn disable(&self, id: ViewId) -> GridResult<()> {
        self.set_enabled(id, false)
    }

    /// Set the enabled state. See [`enable`](Self::enable) and
    /// [`disable`](Self::disable).
    pub fn set_enabled(&self, id: ViewId, enabled: bool) -> GridResult<()> {
        self.mutate(|s, out| {
            if let Some(att) = s.node(id)?.attachment {
                if s.node(att.parent)?.is_switcher() {
                    return Err(GridError::SwitcherManagedChild);
                }
            }
            s.set_enabled_inner(id, enabled, out)
        })
    }

    // =========================================================================
    // Composition
    // =========================================================================

    /// Add `child` to `parent` at `origin`, placing it topmost.
    pub fn add_child(&self, parent: ViewId, child: ViewId, origin: Point) -> GridResult<()> {
        let action = self.mutate(|s, out| s.add_child_inner(parent, child, origin, false, out))?;
        self.run_post(action)
    }

    /// Internal composition for sealed containers; never indicates.
    pub(crate) fn add_child_internal(
        &self,
        parent: ViewId,
        child: ViewId,
        origin: Point,
    ) -> GridResult<()> {
        let action = self.mutate(|s, out| s.add_child_inner(parent, child, origin, true, out))?;
        self.run_post(action)
    }

    /// Remove `child` from `parent`.
    pub fn remove_child(&self, parent: ViewId, child: ViewId) -> GridResult<()> {
        let action = self.mutate(|s, out| s.remove_child_inner(parent, child, false, out))?;
        self.run_post(action)
    }

    pub(crate) fn remove_child_internal(&self, parent: ViewId, child: ViewId) -> GridResult<()> {
        let action = self.mutate(|s, out| s.remove_child_inner(parent, child, true, out))?;
        self.run_post(action)
    }

    /// Remove every child of `parent`.
    pub fn remove_all_children(&self, parent: ViewId) -> GridResult<()> {
        for child in self.children(parent)? {
            self.remove_child(parent, child)?;
        }
        Ok(())
    }

    pub(crate) fn remove_all_children_internal(&self, parent: ViewId) -> GridResult<()> {
        for child in self.children(parent)? {
            self.remove_child_internal(parent, child)?;
        }
        Ok(())
    }

    /// Detach the view from its parent. Errors when it has none.
    pub fn remove_from_parent(&self, child: ViewId) -> GridResult<()> {
        let parent = self
            .read(|s| Ok(s.node(child)?.attachment.map(|a| a.parent)))?
            .ok_or(GridError::NoParent)?;
        self.remove_child(parent, child)
    }

    /// The container's children, bottom to top.
    pub fn children(&self, id: ViewId) -> GridResult<Vec<ViewId>> {
        self.read(|s| s.children_of(id))
    }

    /// Whether `child` is a direct child of `parent`.
    pub fn is_parent_of(&self, parent: ViewId, child: ViewId) -> GridResult<bool> {
        self.read(|s| {
            Ok(s.node(child)?
                .attachment
                .is_some_and(|a| a.parent == parent))
        })
    }

    /// Whether any child (enabled or not) covers `point`.
    pub fn has_child_at(&self, id: ViewId, point: Point) -> GridResult<bool> {
        self.read(|s| {
            for &child in s.node(id)?.children().ok_or(GridError::NotAContainer)? {
                if let Some(att) = s.node(child)?.attachment {
                    if Bounds::new(att.origin, s.node(child)?.size).contains_point(point) {
                        return Ok(true);
                    }
                }
            }
            Ok(false)
        })
    }

    /// The topmost enabled child covering `point`, if any.
    pub fn enabled_child_at(&self, id: ViewId, point: Point) -> GridResult<Option<ViewId>> {
        self.read(|s| Ok(s.topmost_enabled_child_at(id, point)?.map(|(child, _)| child)))
    }

    /// Whether the container routes events to itself as well after
    /// forwarding them to a covering child.
    pub fn press_through(&self, id: ViewId) -> GridResult<bool> {
        self.read(|s| Ok(s.node(id)?.press_through()))
    }

    /// Find a direct child by name.
    pub fn find_child_by_name(&self, id: ViewId, name: &str) -> GridResult<Option<ViewId>> {
        self.read(|s| {
            for &child in s.node(id)?.children().ok_or(GridError::NotAContainer)? {
                if s.node(child)?.name.as_deref() == Some(name) {
                    return Ok(Some(child));
                }
            }
            Ok(None)
        })
    }

    /// Move a child to the top of its parent's z-order and repaint its
    /// footprint.
    pub fn bring_child_to_front(&self, parent: ViewId, child: ViewId) -> GridResult<()> {
        self.mutate(|s, out| s.reorder_child(parent, child, true, out))
    }

    /// Move a child to the bottom of its parent's z-order and repaint its
    /// footprint.
    pub fn send_child_to_back(&self, parent: ViewId, child: ViewId) -> GridResult<()> {
        self.mutate(|s, out| s.reorder_child(parent, child, false, out))
    }

    // =========================================================================
    // Switcher
    // =========================================================================

    /// The index of a switcher's current child, or `None` when empty.
    pub fn switcher_value(&self, id: ViewId) -> GridResult<Option<usize>> {
        self.read(|s| {
            let current = s.switcher_current_of(id)?;
            let children = s.children_of(id)?;
            Ok(current.and_then(|c| children.iter().position(|&child| child == c)))
        })
    }

    /// Select a switcher child by index, disabling the previous current
    /// child and enabling the new one.
    pub fn set_switcher_value(&self, id: ViewId, index: usize) -> GridResult<()> {
        self.mutate(|s, out| s.set_switcher_value_inner(id, index, out))
    }

    /// The switcher's current (enabled) child, or `None` when empty.
    pub fn switcher_current(&self, id: ViewId) -> GridResult<Option<ViewId>> {
        self.read(|s| s.switcher_current_of(id))
    }

    // =========================================================================
    // Flash
    // =========================================================================

    /// Flash the listed points: invert their LEDs now and schedule the
    /// inversion to revert after `delay` (the configured default when
    /// `None`). The revert is a silent no-op if the view was disabled or
    /// the tree dropped in the meantime.
    pub fn flash_points(
        &self,
        id: ViewId,
        points: &[Point],
        delay: Option<Duration>,
    ) -> GridResult<()> {
        let points: Vec<Point> = points.to_vec();
        let delay = self.mutate(|s, out| {
            for &point in &points {
                s.validate_contains_point(id, point)?;
            }
            let node = s.node_mut(id)?;
            for &point in &points {
                let idx = node.overlay_idx(point);
                node.inverted_leds[idx] = true;
            }
            if s.node(id)?.enabled {
                s.refresh_points_inner(id, &points, out)?;
            }
            Ok(delay.unwrap_or(s.config.flash_delay))
        })?;

        let weak = self.downgrade();
        self.inner.scheduler.schedule_once(delay, move || {
            let Some(tree) = weak.upgrade() else {
                return;
            };
            tree.revert_flash(id, &points);
        });
        Ok(())
    }

    /// Flash a single point.
    pub fn flash_point(&self, id: ViewId, point: Point, delay: Option<Duration>) -> GridResult<()> {
        self.flash_points(id, &[point], delay)
    }

    /// Flash every point inside `bounds`.
    pub fn flash_bounds(&self, id: ViewId, bounds: Bounds, delay: Option<Duration>) -> GridResult<()> {
        let points: Vec<Point> = {
            self.read(|s| {
                s.validate_contains_bounds(id, bounds)?;
                Ok(bounds.points().collect())
            })?
        };
        self.flash_points(id, &points, delay)
    }

    /// Flash the whole view.
    pub fn flash_view(&self, id: ViewId, delay: Option<Duration>) -> GridResult<()> {
        let bounds = self.bounds(id)?;
        self.flash_bounds(id, bounds, delay)
    }

    fn revert_flash(&self, id: ViewId, points: &[Point]) {
        let _ = self.mutate(|s, out| {
            let Ok(node) = s.node_mut(id) else {
                return Ok(());
            };
            for &point in points {
                let idx = node.overlay_idx(point);
                node.inverted_leds[idx] = false;
            }
            if s.node(id)?.enabled {
                s.refresh_points_inner(id, points, out)?;
            }
            Ok(())
        });
    }

    // =========================================================================
    // Indicate
    // =========================================================================

    /// Blink the listed points `repeat` times at `interval` (configured
    /// defaults when `None`), purely at the listener level, then refresh
    /// them for real if the view is still enabled. Runs on the scheduler
    /// thread; the caller is not blocked.
    pub fn indicate_points(
        &self,
        id: ViewId,
        points: &[Point],
        repeat: Option<usize>,
        interval: Option<Duration>,
    ) -> GridResult<()> {
        let (repeat, interval) = self.read(|s| {
            for &point in points {
                s.validate_contains_point(id, point)?;
            }
            Ok((
                repeat.unwrap_or(s.config.indicate_repeat),
                interval.unwrap_or(s.config.indicate_interval),
            ))
        })?;

        let steps = repeat * 2;
        for step in 0..steps {
            let weak = self.downgrade();
            let step_points = points.to_vec();
            let on = step % 2 == 0;
            self.inner
                .scheduler
                .schedule_once(interval * step as u32, move || {
                    let Some(tree) = weak.upgrade() else {
                        return;
                    };
                    tree.indicate_step(id, &step_points, on);
                });
        }

        let weak = self.downgrade();
        let final_points = points.to_vec();
        self.inner
            .scheduler
            .schedule_once(interval * steps as u32, move || {
                let Some(tree) = weak.upgrade() else {
                    return;
                };
                let _ = tree.mutate(|s, out| {
                    if s.node(id).map(|n| n.enabled).unwrap_or(false) {
                        s.refresh_points_inner(id, &final_points, out)?;
                    }
                    Ok(())
                });
            });
        Ok(())
    }

    /// Blink a single point.
    pub fn indicate_point(
        &self,
        id: ViewId,
        point: Point,
        repeat: Option<usize>,
        interval: Option<Duration>,
    ) -> GridResult<()> {
        self.indicate_points(id, &[point], repeat, interval)
    }

    /// Blink every point inside `bounds`.
    pub fn indicate_bounds(
        &self,
        id: ViewId,
        bounds: Bounds,
        repeat: Option<usize>,
        interval: Option<Duration>,
    ) -> GridResult<()> {
        let points: Vec<Point> = self.read(|s| {
            s.validate_contains_bounds(id, bounds)?;
            Ok(bounds.points().collect())
        })?;
        self.indicate_points(id, &points, repeat, interval)
    }

    /// Blink the whole view.
    pub fn indicate_view(
        &self,
        id: ViewId,
        repeat: Option<usize>,
        interval: Option<Duration>,
    ) -> GridResult<()> {
        let bounds = self.bounds(id)?;
        self.indicate_bounds(id, bounds, repeat, interval)
    }

    fn indicate_step(&self, id: ViewId, points: &[Point], on: bool) {
        let _ = self.mutate(|s, out| {
            if s.node(id).is_err() {
                return Ok(());
            }
            for &point in points {
                s.emit_led(id, point, Some(on), out)?;
            }
            Ok(())
        });
    }

    // =========================================================================
    // Listeners
    // =========================================================================

    /// Connect a listener to the view's button-state-changed events.
    pub fn connect_button_state_changed<F>(&self, id: ViewId, f: F) -> GridResult<ConnectionId>
    where
        F: Fn(&ButtonEvent) + Send + Sync + 'static,
    {
        let signal = self.read(|s| Ok(s.node(id)?.signals.button_state_changed.clone()))?;
        Ok(signal.connect(f))
    }

    /// Disconnect a button-state-changed listener.
    pub fn disconnect_button_state_changed(&self, id: ViewId, conn: ConnectionId) -> GridResult<bool> {
        let signal = self.read(|s| Ok(s.node(id)?.signals.button_state_changed.clone()))?;
        Ok(signal.disconnect(conn))
    }

    /// Connect a listener to the view's LED-refreshed events.
    pub fn connect_led_refreshed<F>(&self, id: ViewId, f: F) -> GridResult<ConnectionId>
    where
        F: Fn(&LedRefresh) + Send + Sync + 'static,
    {
        let signal = self.read(|s| Ok(s.node(id)?.signals.led_refreshed.clone()))?;
        Ok(signal.connect(f))
    }

    /// Disconnect an LED-refreshed listener.
    pub fn disconnect_led_refreshed(&self, id: ViewId, conn: ConnectionId) -> GridResult<bool> {
        let signal = self.read(|s| Ok(s.node(id)?.signals.led_refreshed.clone()))?;
        Ok(signal.disconnect(conn))
    }

    /// Connect a listener to the view's enabled-state changes.
    pub fn connect_enabled_changed<F>(&self, id: ViewId, f: F) -> GridResult<ConnectionId>
    where
        F: Fn(&bool) + Send + Sync + 'static,
    {
        let signal = self.read(|s| Ok(s.node(id)?.signals.enabled_changed.clone()))?;
        Ok(signal.connect(f))
    }

    /// Disconnect an enabled-changed listener.
    pub fn disconnect_enabled_changed(&self, id: ViewId, conn: ConnectionId) -> GridResult<bool> {
        let signal = self.read(|s| Ok(s.node(id)?.signals.enabled_changed.clone()))?;
        Ok(signal.disconnect(conn))
    }

    // =========================================================================
    // Controller registry
    // =========================================================================

    pub(crate) fn register_controller(&self) -> ControllerId {
        let id = self.inner.state.write().controllers.insert(());
        tracing::trace!(target: "padgrid::controller", ?id, "registered controller");
        id
    }

    /// Fired by controller constructors once initial binding is in place.
    pub(crate) fn announce_controller(&self, id: ControllerId) {
        self.inner.controller_registered.emit(&id);
    }

    pub(crate) fn deregister_controller(&self, id: ControllerId) -> bool {
        let removed = self.inner.state.write().controllers.remove(id).is_some();
        if removed {
            tracing::trace!(target: "padgrid::controller", ?id, "deregistered controller");
        }
        removed
    }

    /// The number of live controllers registered with this tree.
    pub fn controller_count(&self) -> usize {
        self.inner.state.read().controllers.len()
    }

    /// The IDs of every live controller registered with this tree.
    pub fn controller_ids(&self) -> Vec<ControllerId> {
        self.inner.state.read().controllers.keys().collect()
    }

    /// Connect a listener invoked once per controller construction.
    pub fn connect_controller_registered<F>(&self, f: F) -> ConnectionId
    where
        F: Fn(&ControllerId) + Send + Sync + 'static,
    {
        self.inner.controller_registered.connect(f)
    }

    /// Disconnect a controller-registered listener.
    pub fn disconnect_controller_registered(&self, conn: ConnectionId) -> bool {
        self.inner.controller_registered.disconnect(conn)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn tree() -> ViewTree {
        ViewTree::new()
    }

    fn view(tree: &ViewTree, cols: i32, rows: i32) -> ViewId {
        tree.create_view(Size::new(cols, rows), true).unwrap()
    }

    fn container(tree: &ViewTree, cols: i32, rows: i32, press_through: bool) -> ViewId {
        tree.create_container(Size::new(cols, rows), true, press_through, false, false)
            .unwrap()
    }

    #[test]
    fn test_minimum_size_is_enforced() {
        let t = tree();
        assert!(matches!(
            t.create_view(Size::new(0, 4), true),
            Err(GridError::InvalidSize { .. })
        ));
        assert!(t.create_view(Size::new(1, 1), true).is_ok());
    }

    #[test]
    fn test_press_is_idempotent() {
        let t = tree();
        let v = view(&t, 4, 4);
        let p = Point::new(1, 2);

        let first = t.press(v, p).unwrap();
        assert_eq!(first, vec![Handled { view: v, point: p }]);
        assert!(t.is_pressed_at(v, p).unwrap());

        let second = t.press(v, p).unwrap();
        assert!(second.is_empty());
        assert!(t.is_pressed_at(v, p).unwrap());

        let released = t.release(v, p).unwrap();
        assert_eq!(released.len(), 1);
        assert!(!t.is_pressed_at(v, p).unwrap());
    }

    #[test]
    fn test_press_notifies_listeners_once() {
        let t = tree();
        let v = view(&t, 4, 4);
        let events = Arc::new(Mutex::new(Vec::new()));

        let events_clone = events.clone();
        t.connect_button_state_changed(v, move |e| {
            events_clone.lock().unwrap().push(*e);
        })
        .unwrap();

        t.press(v, Point::new(0, 0)).unwrap();
        t.press(v, Point::new(0, 0)).unwrap();
        t.release(v, Point::new(0, 0)).unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].pressed);
        assert!(!events[1].pressed);
    }

    #[test]
    fn test_press_out_of_bounds_fails() {
        let t = tree();
        let v = view(&t, 2, 2);
        assert!(matches!(
            t.press(v, Point::new(2, 0)),
            Err(GridError::OutOfBounds { .. })
        ));
        assert!(matches!(
            t.is_pressed_at(v, Point::new(-1, 0)),
            Err(GridError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_press_on_disabled_view_is_inert() {
        let t = tree();
        let v = t.create_view(Size::new(2, 2), false).unwrap();
        assert!(t.press(v, Point::new(0, 0)).unwrap().is_empty());
        assert!(!t.is_pressed_at(v, Point::new(0, 0)).unwrap());
    }

    #[test]
    fn test_points_pressed_keeps_press_order() {
        let t = tree();
        let v = view(&t, 4, 4);
        t.press(v, Point::new(3, 3)).unwrap();
        t.press(v, Point::new(0, 0)).unwrap();
        t.press(v, Point::new(2, 1)).unwrap();
        assert_eq!(t.first_pressed(v).unwrap(), Some(Point::new(3, 3)));
        assert_eq!(t.last_pressed(v).unwrap(), Some(Point::new(2, 1)));
        t.release(v, Point::new(3, 3)).unwrap();
        assert_eq!(t.first_pressed(v).unwrap(), Some(Point::new(0, 0)));
    }

    #[test]
    fn test_pressed_queries_within_bounds() {
        let t = tree();
        let v = view(&t, 4, 4);
        let corner = Bounds::new(Point::new(0, 0), Size::new(2, 2));
        t.press(v, Point::new(0, 0)).unwrap();
        t.press(v, Point::new(3, 3)).unwrap();

        assert!(t.any_pressed_within_bounds(v, corner).unwrap());
        assert!(!t.all_pressed_within_bounds(v, corner).unwrap());
        assert_eq!(t.num_pressed_within_bounds(v, corner).unwrap(), 1);
        assert_eq!(
            t.points_pressed_within_bounds(v, corner).unwrap(),
            vec![Point::new(0, 0)]
        );

        t.press(v, Point::new(1, 0)).unwrap();
        t.press(v, Point::new(0, 1)).unwrap();
        t.press(v, Point::new(1, 1)).unwrap();
        assert!(t.all_pressed_within_bounds(v, corner).unwrap());
        assert!(!t.any_released_within_bounds(v, corner).unwrap());
        assert!(!t.all_released_within_bounds(v, corner).unwrap());
    }

    #[test]
    fn test_pressed_extremes() {
        let t = tree();
        let v = view(&t, 4, 4);
        t.press(v, Point::new(1, 1)).unwrap();
        t.press(v, Point::new(3, 1)).unwrap();
        t.press(v, Point::new(1, 3)).unwrap();
        assert_eq!(t.leftmost_col_pressed(v).unwrap(), Some(1));
        assert_eq!(t.rightmost_col_pressed(v).unwrap(), Some(3));
        assert_eq!(t.topmost_row_pressed(v).unwrap(), Some(1));
        assert_eq!(t.bottommost_row_pressed(v).unwrap(), Some(3));
        assert_eq!(
            t.leftmost_pressed(v).unwrap(),
            vec![Point::new(1, 1), Point::new(1, 3)]
        );
    }

    #[test]
    fn test_routing_to_topmost_enabled_child() {
        let t = tree();
        let c = container(&t, 4, 4, false);
        let a = view(&t, 2, 2);
        let b = view(&t, 2, 2);
        t.add_child(c, a, Point::new(1, 1)).unwrap();
        t.add_child(c, b, Point::new(1, 1)).unwrap();

        let handled = t.press(c, Point::new(2, 2)).unwrap();
        assert_eq!(
            handled,
            vec![Handled {
                view: b,
                point: Point::new(1, 1)
            }]
        );
        assert!(t.is_pressed_at(b, Point::new(1, 1)).unwrap());
        assert!(!t.is_pressed_at(a, Point::new(1, 1)).unwrap());
        assert!(!t.is_pressed_at(c, Point::new(2, 2)).unwrap());
    }

    #[test]
    fn test_z_order_reorder_changes_routing() {
        let t = tree();
        let c = container(&t, 4, 4, false);
        let a = view(&t, 2, 2);
        let b = view(&t, 2, 2);
        t.add_child(c, a, Point::new(0, 0)).unwrap();
        t.add_child(c, b, Point::new(0, 0)).unwrap();

        assert_eq!(t.enabled_child_at(c, Point::new(0, 0)).unwrap(), Some(b));
        t.send_child_to_back(c, b).unwrap();
        assert_eq!(t.enabled_child_at(c, Point::new(0, 0)).unwrap(), Some(a));
        t.bring_child_to_front(c, b).unwrap();
        assert_eq!(t.enabled_child_at(c, Point::new(0, 0)).unwrap(), Some(b));
    }

    #[test]
    fn test_press_through_unions_responses() {
        let t = tree();
        let c = container(&t, 4, 4, true);
        let v = view(&t, 2, 2);
        t.add_child(c, v, Point::new(1, 1)).unwrap();

        let handled = t.press(c, Point::new(1, 1)).unwrap();
        assert_eq!(handled.len(), 2);
        assert!(handled.contains(&Handled {
            view: v,
            point: Point::new(0, 0)
        }));
        assert!(handled.contains(&Handled {
            view: c,
            point: Point::new(1, 1)
        }));
        assert!(t.is_pressed_at(c, Point::new(1, 1)).unwrap());
        assert!(t.is_pressed_at(v, Point::new(0, 0)).unwrap());
    }

    #[test]
    fn test_add_child_validations() {
        let t = tree();
        let c = container(&t, 4, 4, false);
        let v = view(&t, 2, 2);

        assert!(matches!(
            t.add_child(c, v, Point::new(-1, 0)),
            Err(GridError::NegativeOrigin { .. })
        ));
        assert!(matches!(
            t.add_child(c, v, Point::new(3, 3)),
            Err(GridError::BoundsNotContained { .. })
        ));
        assert!(t.children(c).unwrap().is_empty());

        t.add_child(c, v, Point::new(0, 0)).unwrap();
        let other = container(&t, 8, 8, false);
        assert!(matches!(
            t.add_child(other, v, Point::new(0, 0)),
            Err(GridError::AlreadyHasParent)
        ));
    }

    #[test]
    fn test_cycle_prevention() {
        let t = tree();
        let outer = container(&t, 8, 8, false);
        let inner = container(&t, 4, 4, false);
        t.add_child(outer, inner, Point::new(0, 0)).unwrap();

        // A detached container may not adopt itself.
        let lone = container(&t, 4, 4, false);
        assert!(matches!(
            t.add_child(lone, lone, Point::new(0, 0)),
            Err(GridError::CircularParentage)
        ));
        // A container may not adopt its own ancestor.
        assert!(matches!(
            t.add_child(inner, outer, Point::new(0, 0)),
            Err(GridError::CircularParentage)
        ));
    }

    #[test]
    fn test_top_view_cannot_be_child() {
        let t = tree();
        let c = container(&t, 8, 8, false);
        let top = t.create_top(Size::new(4, 4), true).unwrap();
        assert!(matches!(
            t.add_child(c, top, Point::new(0, 0)),
            Err(GridError::TopViewAsChild)
        ));
    }

    #[test]
    fn test_add_child_releases_covered_presses() {
        let t = tree();
        let c = container(&t, 4, 4, false);
        t.press(c, Point::new(1, 1)).unwrap();
        t.press(c, Point::new(3, 3)).unwrap();

        let v = view(&t, 2, 2);
        t.add_child(c, v, Point::new(1, 1)).unwrap();

        assert!(!t.is_pressed_at(c, Point::new(1, 1)).unwrap());
        assert!(t.is_pressed_at(c, Point::new(3, 3)).unwrap());
    }

    #[test]
    fn test_remove_child_and_remove() {
        let t = tree();
        let c = container(&t, 4, 4, false);
        let v = view(&t, 2, 2);
        t.add_child(c, v, Point::new(0, 0)).unwrap();
        assert!(t.is_parent_of(c, v).unwrap());

        t.remove_from_parent(v).unwrap();
        assert!(!t.is_parent_of(c, v).unwrap());
        assert_eq!(t.parent(v).unwrap(), None);
        assert!(matches!(
            t.remove_from_parent(v),
            Err(GridError::NoParent)
        ));

        let stranger = view(&t, 2, 2);
        assert!(matches!(
            t.remove_child(c, stranger),
            Err(GridError::NotAChild)
        ));
    }

    #[test]
    fn test_disable_releases_descendants() {
        let t = tree();
        let top = container(&t, 8, 8, true);
        let mid = container(&t, 4, 4, true);
        let leaf = view(&t, 2, 2);
        t.add_child(top, mid, Point::new(1, 1)).unwrap();
        t.add_child(mid, leaf, Point::new(1, 1)).unwrap();

        // Press through the chain so every level records state.
        t.press(top, Point::new(2, 2)).unwrap();
        assert!(t.any_pressed(top).unwrap());
        assert!(t.any_pressed(mid).unwrap());
        assert!(t.any_pressed(leaf).unwrap());

        t.disable(top).unwrap();
        assert!(t.all_released(top).unwrap());
        assert!(t.all_released(mid).unwrap());
        assert!(t.all_released(leaf).unwrap());
    }

    #[test]
    fn test_enable_disable_state_errors() {
        let t = tree();
        let v = view(&t, 2, 2);
        assert!(matches!(t.enable(v), Err(GridError::AlreadyEnabled)));
        t.disable(v).unwrap();
        assert!(matches!(t.disable(v), Err(GridError::AlreadyDisabled)));
        assert!(matches!(t.refresh(v), Err(GridError::Disabled)));
        t.enable(v).unwrap();
    }

    #[test]
    fn test_enable_releases_parent_presses_in_footprint() {
        let t = tree();
        let c = container(&t, 4, 4, false);
        let v = view(&t, 2, 2);
        t.add_child(c, v, Point::new(1, 1)).unwrap();
        t.disable(v).unwrap();

        // With the child disabled the container takes the press itself.
        t.press(c, Point::new(1, 1)).unwrap();
        assert!(t.is_pressed_at(c, Point::new(1, 1)).unwrap());

        t.enable(v).unwrap();
        assert!(!t.is_pressed_at(c, Point::new(1, 1)).unwrap());
    }

    #[test]
    fn test_lit_state_routing_and_override() {
        let t = tree();
        let c = container(&t, 4, 4, false);
        let v = view(&t, 2, 2);
        t.add_child(c, v, Point::new(1, 1)).unwrap();
        t.set_lit_state_fn(v, |_| true).unwrap();
        t.set_lit_state_fn(c, |p| p == Point::new(0, 0)).unwrap();

        // Covered points answer via the child.
        assert!(t.is_lit_at(c, Point::new(1, 1)).unwrap());
        // Uncovered points answer via the container's own function.
        assert!(t.is_lit_at(c, Point::new(0, 0)).unwrap());
        assert!(!t.is_lit_at(c, Point::new(3, 0)).unwrap());
    }

    #[test]
    fn test_led_refresh_forwarded_only_when_topmost() {
        let t = tree();
        let c = container(&t, 4, 4, false);
        let bottom = view(&t, 2, 2);
        let top_child = view(&t, 2, 2);
        t.add_child(c, bottom, Point::new(0, 0)).unwrap();
        t.add_child(c, top_child, Point::new(0, 0)).unwrap();

        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        t.connect_led_refreshed(c, move |e| {
            received_clone.lock().unwrap().push(*e);
        })
        .unwrap();

        // The covered sibling's refresh must not reach the container.
        t.refresh(bottom).unwrap();
        assert!(received.lock().unwrap().is_empty());

        t.refresh(top_child).unwrap();
        let events = received.lock().unwrap();
        assert_eq!(events.len(), 4);
        assert!(events.iter().all(|e| e.source == top_child));
    }

    #[test]
    fn test_led_refresh_translates_coordinates_up_the_chain() {
        let t = tree();
        let outer = container(&t, 8, 8, false);
        let inner = container(&t, 4, 4, false);
        let leaf = view(&t, 2, 2);
        t.add_child(outer, inner, Point::new(2, 2)).unwrap();
        t.add_child(inner, leaf, Point::new(1, 1)).unwrap();
        t.set_lit_state_fn(leaf, |_| true).unwrap();

        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        t.connect_led_refreshed(outer, move |e| {
            received_clone.lock().unwrap().push(*e);
        })
        .unwrap();

        t.refresh_point(leaf, Point::new(0, 0)).unwrap();
        let events = received.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].point, Point::new(3, 3));
        assert_eq!(events[0].source, leaf);
        assert!(events[0].on);
    }

    #[test]
    fn test_top_view_aggregates_sources() {
        let t = tree();
        let top = t.create_top(Size::new(4, 4), true).unwrap();
        let probe = view(&t, 4, 4);
        let s1 = Source::View(probe);
        let s2 = Source::View(top);
        let p = Point::new(1, 1);

        let events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();
        t.connect_button_state_changed(top, move |e| {
            events_clone.lock().unwrap().push(*e);
        })
        .unwrap();

        assert_eq!(t.handle_button_event(top, s1, p, true).unwrap().len(), 1);
        assert!(t.is_pressed_at(top, p).unwrap());
        // Second source holding the same point adds no transition.
        assert!(t.handle_button_event(top, s2, p, true).unwrap().is_empty());
        assert!(t.is_pressed_by_source_at(top, s1, p).unwrap());
        assert!(t.is_pressed_by_source_at(top, s2, p).unwrap());

        // Releasing one source keeps the button pressed.
        assert!(t.handle_button_event(top, s1, p, false).unwrap().is_empty());
        assert!(t.is_pressed_at(top, p).unwrap());
        // Releasing the last source releases the button.
        assert_eq!(t.handle_button_event(top, s2, p, false).unwrap().len(), 1);
        assert!(!t.is_pressed_at(top, p).unwrap());

        // Exactly one press and one release notification fired overall.
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert!(events[0].pressed);
        assert!(!events[1].pressed);
    }

    #[test]
    fn test_top_view_rejects_local_input() {
        let t = tree();
        let top = t.create_top(Size::new(4, 4), true).unwrap();
        assert!(matches!(
            t.press(top, Point::new(0, 0)),
            Err(GridError::TopViewLocalInput)
        ));
    }

    #[test]
    fn test_flash_inverts_then_reverts() {
        let t = tree();
        let v = view(&t, 2, 2);
        let p = Point::new(0, 0);

        t.flash_point(v, p, Some(Duration::from_millis(20))).unwrap();
        assert!(t.is_lit_at(v, p).unwrap());
        assert!(!t.is_lit_at(v, Point::new(1, 1)).unwrap());

        std::thread::sleep(Duration::from_millis(80));
        assert!(!t.is_lit_at(v, p).unwrap());
    }

    #[test]
    fn test_flash_revert_on_disabled_view_is_tolerated() {
        let t = tree();
        let v = view(&t, 2, 2);
        t.flash_view(v, Some(Duration::from_millis(10))).unwrap();
        t.disable(v).unwrap();
        // The pending revert fires against a disabled view without error.
        std::thread::sleep(Duration::from_millis(60));
        t.enable(v).unwrap();
        assert!(!t.is_lit_at(v, Point::new(0, 0)).unwrap());
    }

    #[test]
    fn test_indicate_blinks_and_restores() {
        let t = tree();
        let v = view(&t, 2, 2);

        let received = Arc::new(Mutex::new(Vec::new()));
        let received_clone = received.clone();
        t.connect_led_refreshed(v, move |e| {
            received_clone.lock().unwrap().push((e.point, e.on));
        })
        .unwrap();

        t.indicate_view(v, Some(2), Some(Duration::from_millis(5)))
            .unwrap();
        std::thread::sleep(Duration::from_millis(100));

        let events = received.lock().unwrap();
        // 2 repeats x on/off x 4 points, plus the final real refresh.
        assert_eq!(events.len(), 4 * 4 + 4);
        // The final refresh reports the true (unlit) state.
        assert!(events[events.len() - 4..].iter().all(|&(_, on)| !on));
    }

    #[test]
    fn test_switcher_value_cycling() {
        let t = tree();
        let sw = t
            .create_container(Size::new(2, 2), true, false, false, true)
            .unwrap();
        let a = view(&t, 2, 2);
        let b = view(&t, 2, 2);

        t.add_child(sw, a, Point::new(0, 0)).unwrap();
        assert_eq!(t.switcher_current(sw).unwrap(), Some(a));
        assert_eq!(t.switcher_value(sw).unwrap(), Some(0));

        t.add_child(sw, b, Point::new(0, 0)).unwrap();
        assert_eq!(t.switcher_current(sw).unwrap(), Some(a));
        assert!(!t.is_enabled(b).unwrap());

        t.set_switcher_value(sw, 1).unwrap();
        assert_eq!(t.switcher_current(sw).unwrap(), Some(b));
        assert!(!t.is_enabled(a).unwrap());
        assert!(t.is_enabled(b).unwrap());

        // Removing the current restores the previous index.
        t.remove_child(sw, b).unwrap();
        assert_eq!(t.switcher_current(sw).unwrap(), Some(a));
        assert_eq!(t.switcher_value(sw).unwrap(), Some(0));

        t.remove_child(sw, a).unwrap();
        assert_eq!(t.switcher_current(sw).unwrap(), None);
        assert_eq!(t.switcher_value(sw).unwrap(), None);
    }

    #[test]
    fn test_switcher_children_cannot_be_toggled_directly() {
        let t = tree();
        let sw = t
            .create_container(Size::new(2, 2), true, false, false, true)
            .unwrap();
        let a = view(&t, 2, 2);
        let b = view(&t, 2, 2);
        t.add_child(sw, a, Point::new(0, 0)).unwrap();
        t.add_child(sw, b, Point::new(0, 0)).unwrap();

        assert!(matches!(
            t.disable(a),
            Err(GridError::SwitcherManagedChild)
        ));
        assert!(matches!(
            t.enable(b),
            Err(GridError::SwitcherManagedChild)
        ));
        assert!(matches!(
            t.set_switcher_value(sw, 5),
            Err(GridError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_sealed_container_rejects_external_composition() {
        let t = tree();
        let sealed = t
            .create_container(Size::new(4, 4), true, true, true, false)
            .unwrap();
        let inner = view(&t, 2, 2);
        t.add_child_internal(sealed, inner, Point::new(0, 0)).unwrap();

        let outsider = view(&t, 2, 2);
        assert!(matches!(
            t.add_child(sealed, outsider, Point::new(2, 2)),
            Err(GridError::ManagedChildren)
        ));
        assert!(matches!(
            t.remove_child(sealed, inner),
            Err(GridError::ManagedChildren)
        ));
    }

    #[test]
    fn test_names_and_lookup() {
        let t = tree();
        let c = container(&t, 4, 4, false);
        let v = view(&t, 2, 2);
        t.set_name(v, "leaf").unwrap();
        t.add_child(c, v, Point::new(0, 0)).unwrap();
        assert_eq!(t.find_child_by_name(c, "leaf").unwrap(), Some(v));
        assert_eq!(t.find_child_by_name(c, "other").unwrap(), None);
        assert_eq!(t.name(v).unwrap().as_deref(), Some("leaf"));
    }

    #[test]
    fn test_led_state_within_bounds() {
        let t = tree();
        let v = view(&t, 2, 2);
        t.set_lit_state_fn(v, |p| p.x == 0).unwrap();
        let states = t
            .led_state_within_bounds(v, Bounds::from_size(Size::new(2, 2)))
            .unwrap();
        assert_eq!(
            states,
            vec![
                (Point::new(0, 0), true),
                (Point::new(1, 0), false),
                (Point::new(0, 1), true),
                (Point::new(1, 1), false),
            ]
        );
    }
}
