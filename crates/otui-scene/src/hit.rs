#![forbid(unsafe_code)]

//! Hit testing and pointer routing.
//!
//! [`SceneTree::hit_test`] finds the deepest visible mouse-target node
//! whose *clipped* rectangle contains a point; dispatch bubbles along the
//! ancestor chain until a handler consumes the event.
//!
//! [`PointerRouter`] turns the raw mouse stream into derived pointer
//! events with a drag state machine:
//!
//! ```text
//! Idle --down--> Pressed --move--> Dragging --up--> DragEnd (+ Drop)
//!                   |
//!                   +-------up--------> (click: Down already delivered)
//! ```
//!
//! `DragEnd` is always emitted before `Drop`. Hover transitions produce
//! `Over`/`Out` pairs as the pointer crosses node boundaries.

use otui_core::event::{MouseButton, MouseEvent, MouseEventKind};
use otui_core::geometry::Rect;

use crate::node::{NodeId, SceneTree};

/// Derived pointer event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    /// Button pressed.
    Down(MouseButton),
    /// Button released (before any drag bookkeeping).
    Up(MouseButton),
    /// Motion with no button held.
    Move,
    /// Motion with a button held.
    Drag(MouseButton),
    /// A drag sequence finished (always precedes `Drop`).
    DragEnd(MouseButton),
    /// The drag's payload was released over a target.
    Drop(MouseButton),
    /// The pointer entered a node.
    Over,
    /// The pointer left a node.
    Out,
    /// Wheel scroll; positive `dy` is down, positive `dx` is right.
    Scroll {
        dx: i8,
        dy: i8,
    },
}

/// A routed pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerEvent {
    /// Derived kind.
    pub kind: PointerKind,
    /// Target node (deepest hit), if any.
    pub node: Option<NodeId>,
    /// Screen coordinates.
    pub x: u16,
    /// Screen coordinates.
    pub y: u16,
}

/// Drag state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum DragState {
    #[default]
    Idle,
    /// Button held, no motion yet.
    Pressed {
        button: MouseButton,
        origin: Option<NodeId>,
    },
    /// Button held and moving.
    Dragging {
        button: MouseButton,
        origin: Option<NodeId>,
    },
}

/// Routes raw mouse events into derived pointer events.
#[derive(Debug, Default)]
pub struct PointerRouter {
    state: DragState,
    hover: Option<NodeId>,
}

impl PointerRouter {
    /// Create an idle router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The node currently under the pointer.
    #[must_use]
    pub fn hover(&self) -> Option<NodeId> {
        self.hover
    }

    /// The node a drag originated on, while a drag is active.
    #[must_use]
    pub fn drag_origin(&self) -> Option<NodeId> {
        match self.state {
            DragState::Pressed { origin, .. } | DragState::Dragging { origin, .. } => origin,
            DragState::Idle => None,
        }
    }

    /// Route one raw mouse event, producing derived events in delivery
    /// order.
    pub fn route(&mut self, tree: &SceneTree, event: &MouseEvent) -> Vec<PointerEvent> {
        let mut out = Vec::new();
        let target = tree.hit_test(event.x, event.y);

        // Hover transitions first, so handlers see Over before the event
        // that caused it.
        if target != self.hover {
            if let Some(prev) = self.hover {
                out.push(PointerEvent {
                    kind: PointerKind::Out,
                    node: Some(prev),
                    x: event.x,
                    y: event.y,
                });
            }
            if let Some(next) = target {
                out.push(PointerEvent {
                    kind: PointerKind::Over,
                    node: Some(next),
                    x: event.x,
                    y: event.y,
                });
            }
            self.hover = target;
        }

        match event.kind {
            MouseEventKind::Down(button) => {
                self.state = DragState::Pressed {
                    button,
                    origin: target,
                };
                out.push(PointerEvent {
                    kind: PointerKind::Down(button),
                    node: target,
                    x: event.x,
                    y: event.y,
                });
            }

            MouseEventKind::Drag(button) => {
                let origin = match self.state {
                    DragState::Pressed { origin, .. } | DragState::Dragging { origin, .. } => {
                        origin
                    }
                    DragState::Idle => target,
                };
                self.state = DragState::Dragging { button, origin };
                out.push(PointerEvent {
                    kind: PointerKind::Drag(button),
                    node: origin,
                    x: event.x,
                    y: event.y,
                });
            }

            MouseEventKind::Moved => {
                out.push(PointerEvent {
                    kind: PointerKind::Move,
                    node: target,
                    x: event.x,
                    y: event.y,
                });
            }

            MouseEventKind::Up(button) => {
                let prior = std::mem::take(&mut self.state);
                out.push(PointerEvent {
                    kind: PointerKind::Up(button),
                    node: target,
                    x: event.x,
                    y: event.y,
                });
                if let DragState::Dragging { button, .. } = prior {
                    // DragEnd precedes Drop, unconditionally.
                    out.push(PointerEvent {
                        kind: PointerKind::DragEnd(button),
                        node: target,
                        x: event.x,
                        y: event.y,
                    });
                    if target.is_some() {
                        out.push(PointerEvent {
                            kind: PointerKind::Drop(button),
                            node: target,
                            x: event.x,
                            y: event.y,
                        });
                    }
                }
            }

            MouseEventKind::ScrollUp => out.push(self.scroll(target, event, 0, -1)),
            MouseEventKind::ScrollDown => out.push(self.scroll(target, event, 0, 1)),
            MouseEventKind::ScrollLeft => out.push(self.scroll(target, event, -1, 0)),
            MouseEventKind::ScrollRight => out.push(self.scroll(target, event, 1, 0)),
        }

        out
    }

    fn scroll(&self, target: Option<NodeId>, event: &MouseEvent, dx: i8, dy: i8) -> PointerEvent {
        PointerEvent {
            kind: PointerKind::Scroll { dx, dy },
            node: target,
            x: event.x,
            y: event.y,
        }
    }
}

impl SceneTree {
    /// The deepest visible mouse-target node whose clipped rect contains
    /// `(x, y)`.
    #[must_use]
    pub fn hit_test(&self, x: u16, y: u16) -> Option<NodeId> {
        let root_rect = self.get(self.root())?.rect();
        self.hit_test_node(self.root(), x, y, root_rect)
    }

    fn hit_test_node(&self, id: NodeId, x: u16, y: u16, parent_clip: Rect) -> Option<NodeId> {
        let node = self.get(id)?;
        if !node.visible {
            return None;
        }
        let clip = parent_clip.intersection_opt(&node.rect())?;

        // Later children draw on top, so test them in reverse draw order.
        let children = self.z_ordered_children(node);
        for &child in children.iter().rev() {
            if let Some(hit) = self.hit_test_node(child, x, y, clip) {
                return Some(hit);
            }
        }

        (node.mouse_target && clip.contains(x, y)).then_some(id)
    }

    /// The ancestor chain from a node to the root (inclusive), for
    /// bubbling dispatch.
    #[must_use]
    pub fn bubble_path(&self, from: NodeId) -> Vec<NodeId> {
        let mut path = Vec::new();
        let mut cursor = Some(from);
        while let Some(id) = cursor {
            path.push(id);
            cursor = self.get(id).and_then(|n| n.parent());
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;
    use otui_core::event::Modifiers;
    use otui_core::geometry::Rect;
    use otui_layout::{Dimension, Inset, ItemStyle, Position};
    use otui_render::cell::PackedRgba;

    fn boxed() -> NodeKind {
        NodeKind::Box {
            bg: None,
            border: None,
            border_color: PackedRgba::TRANSPARENT,
        }
    }

    fn abs_item(x: u16, y: u16, w: u16, h: u16) -> ItemStyle {
        ItemStyle {
            position: Position::Absolute,
            width: Dimension::Cells(w),
            height: Dimension::Cells(h),
            inset: Inset {
                left: Some(x),
                top: Some(y),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn tree_with_two_targets() -> (SceneTree, NodeId, NodeId) {
        let mut tree = SceneTree::new();
        let outer = tree.add_child(tree.root(), boxed());
        let inner = tree.add_child(outer, boxed());
        tree.get_mut(outer).unwrap().item_style = abs_item(0, 0, 10, 10);
        tree.get_mut(outer).unwrap().mouse_target = true;
        tree.get_mut(inner).unwrap().item_style = abs_item(2, 2, 4, 4);
        tree.get_mut(inner).unwrap().mouse_target = true;
        tree.layout(Rect::new(0, 0, 40, 20));
        (tree, outer, inner)
    }

    fn mouse(kind: MouseEventKind, x: u16, y: u16) -> MouseEvent {
        MouseEvent {
            kind,
            x,
            y,
            modifiers: Modifiers::NONE,
        }
    }

    #[test]
    fn hit_test_finds_deepest_target() {
        let (tree, outer, inner) = tree_with_two_targets();
        assert_eq!(tree.hit_test(3, 3), Some(inner));
        assert_eq!(tree.hit_test(8, 8), Some(outer));
        assert_eq!(tree.hit_test(30, 15), None);
    }

    #[test]
    fn hit_test_skips_invisible_and_non_targets() {
        let (mut tree, outer, inner) = tree_with_two_targets();
        tree.get_mut(inner).unwrap().visible = false;
        assert_eq!(tree.hit_test(3, 3), Some(outer));

        tree.get_mut(outer).unwrap().mouse_target = false;
        assert_eq!(tree.hit_test(8, 8), None);
    }

    #[test]
    fn hit_test_respects_ancestor_clip() {
        let mut tree = SceneTree::new();
        let parent = tree.add_child(tree.root(), boxed());
        let child = tree.add_child(parent, boxed());
        tree.get_mut(parent).unwrap().item_style = abs_item(0, 0, 5, 5);
        // Child extends past the parent; the overhang is unclickable.
        tree.get_mut(child).unwrap().item_style = abs_item(0, 0, 20, 3);
        tree.get_mut(child).unwrap().mouse_target = true;
        tree.layout(Rect::new(0, 0, 40, 20));

        assert_eq!(tree.hit_test(2, 1), Some(child));
        assert_eq!(tree.hit_test(10, 1), None, "clipped region misses");
    }

    #[test]
    fn bubble_path_runs_to_root() {
        let (tree, outer, inner) = tree_with_two_targets();
        assert_eq!(tree.bubble_path(inner), vec![inner, outer, tree.root()]);
    }

    #[test]
    fn spec_drag_sequence() {
        // Feed: SGR down (10,5), drag (12,5), up (12,5) - 1-based wire
        // coords become 0-based events (9,4) (11,4) (11,4).
        let (tree, outer, _) = tree_with_two_targets();
        let mut router = PointerRouter::new();

        let down = router.route(&tree, &mouse(MouseEventKind::Down(MouseButton::Left), 9, 4));
        let drag = router.route(&tree, &mouse(MouseEventKind::Drag(MouseButton::Left), 11, 4));
        let up = router.route(&tree, &mouse(MouseEventKind::Up(MouseButton::Left), 11, 4));

        // (9,4) is inside outer; Over precedes Down on first contact.
        assert_eq!(
            down.iter().map(|e| e.kind).collect::<Vec<_>>(),
            vec![PointerKind::Over, PointerKind::Down(MouseButton::Left)]
        );
        assert_eq!(down[1].node, Some(outer));

        // (11,4) leaves outer: Out then the drag.
        assert_eq!(
            drag.iter().map(|e| e.kind).collect::<Vec<_>>(),
            vec![PointerKind::Out, PointerKind::Drag(MouseButton::Left)]
        );

        // Release outside any target: Up then DragEnd, no Drop.
        assert_eq!(
            up.iter().map(|e| e.kind).collect::<Vec<_>>(),
            vec![
                PointerKind::Up(MouseButton::Left),
                PointerKind::DragEnd(MouseButton::Left)
            ]
        );
    }

    #[test]
    fn drop_emitted_after_drag_end_over_target() {
        let (tree, outer, _) = tree_with_two_targets();
        let mut router = PointerRouter::new();

        router.route(&tree, &mouse(MouseEventKind::Down(MouseButton::Left), 1, 1));
        router.route(&tree, &mouse(MouseEventKind::Drag(MouseButton::Left), 8, 8));
        let up = router.route(&tree, &mouse(MouseEventKind::Up(MouseButton::Left), 8, 8));

        let kinds: Vec<PointerKind> = up.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                PointerKind::Up(MouseButton::Left),
                PointerKind::DragEnd(MouseButton::Left),
                PointerKind::Drop(MouseButton::Left),
            ]
        );
        assert_eq!(up[2].node, Some(outer));
    }

    #[test]
    fn click_without_motion_is_not_a_drag() {
        let (tree, _, _) = tree_with_two_targets();
        let mut router = PointerRouter::new();

        router.route(&tree, &mouse(MouseEventKind::Down(MouseButton::Left), 1, 1));
        let up = router.route(&tree, &mouse(MouseEventKind::Up(MouseButton::Left), 1, 1));
        let kinds: Vec<PointerKind> = up.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![PointerKind::Up(MouseButton::Left)]);
    }

    #[test]
    fn drag_events_target_the_origin_node() {
        let (tree, _, inner) = tree_with_two_targets();
        let mut router = PointerRouter::new();

        router.route(&tree, &mouse(MouseEventKind::Down(MouseButton::Left), 3, 3));
        let drag = router.route(&tree, &mouse(MouseEventKind::Drag(MouseButton::Left), 8, 8));
        let drag_event = drag
            .iter()
            .find(|e| matches!(e.kind, PointerKind::Drag(_)))
            .unwrap();
        assert_eq!(drag_event.node, Some(inner), "drag sticks to its origin");
    }

    #[test]
    fn hover_transitions_produce_over_out_pairs() {
        let (tree, outer, inner) = tree_with_two_targets();
        let mut router = PointerRouter::new();

        let first = router.route(&tree, &mouse(MouseEventKind::Moved, 8, 8));
        assert_eq!(first[0].kind, PointerKind::Over);
        assert_eq!(first[0].node, Some(outer));
        assert_eq!(router.hover(), Some(outer));

        let second = router.route(&tree, &mouse(MouseEventKind::Moved, 3, 3));
        let kinds: Vec<PointerKind> = second.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![PointerKind::Out, PointerKind::Over, PointerKind::Move]
        );
        assert_eq!(second[1].node, Some(inner));
    }

    #[test]
    fn scroll_routes_to_hovered_target() {
        let (tree, outer, _) = tree_with_two_targets();
        let mut router = PointerRouter::new();
        let events = router.route(&tree, &mouse(MouseEventKind::ScrollDown, 8, 8));
        let scroll = events
            .iter()
            .find(|e| matches!(e.kind, PointerKind::Scroll { .. }))
            .unwrap();
        assert_eq!(scroll.kind, PointerKind::Scroll { dx: 0, dy: 1 });
        assert_eq!(scroll.node, Some(outer));
    }
}
