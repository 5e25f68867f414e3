#![forbid(unsafe_code)]

//! Drag selection over selectable nodes.
//!
//! A selection anchors on pointer-down over a selectable text node,
//! extends while the button drags, and stays until cleared or replaced.
//! Extraction is delegated to the anchor node's [`TextBuffer`]; the
//! controller only maps screen points to logical text positions.
//!
//! Clipboard export produces the OSC 52 write sequence; whether it is
//! emitted is the presenter's capability decision.

use otui_text::text_buffer::Selection;
use otui_text::TextBuffer;

use crate::hit::{PointerEvent, PointerKind};
use crate::node::{NodeId, NodeKind, SceneTree};

/// The active selection, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionSnapshot {
    /// The node the selection lives on.
    pub node: NodeId,
    /// Endpoints in the node's logical text coordinates.
    pub selection: Selection,
}

/// Tracks the drag-selection lifecycle across pointer events.
#[derive(Debug, Default)]
pub struct SelectionController {
    active: Option<SelectionSnapshot>,
    dragging: bool,
}

impl SelectionController {
    /// Create an idle controller.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current selection.
    #[must_use]
    pub fn snapshot(&self) -> Option<SelectionSnapshot> {
        self.active
    }

    /// Feed a routed pointer event. Returns `true` when the selection
    /// changed (so the owner can request a render).
    pub fn on_pointer(&mut self, tree: &mut SceneTree, event: &PointerEvent) -> bool {
        match event.kind {
            PointerKind::Down(_) => {
                let Some(node) = event.node else {
                    return self.clear(tree);
                };
                if !tree.get(node).is_some_and(|n| n.selectable) {
                    return self.clear(tree);
                }
                let Some((row, col)) = text_position(tree, node, event.x, event.y) else {
                    return self.clear(tree);
                };

                let selection = Selection {
                    anchor_row: row,
                    anchor_col: col,
                    focus_row: row,
                    focus_col: col,
                };
                self.store(tree, SelectionSnapshot { node, selection });
                self.dragging = true;
                true
            }

            PointerKind::Drag(_) => {
                if !self.dragging {
                    return false;
                }
                let Some(mut snapshot) = self.active else {
                    return false;
                };
                let Some((row, col)) = text_position(tree, snapshot.node, event.x, event.y)
                else {
                    return false;
                };
                if (snapshot.selection.focus_row, snapshot.selection.focus_col) == (row, col) {
                    return false;
                }
                snapshot.selection.focus_row = row;
                snapshot.selection.focus_col = col;
                self.store(tree, snapshot);
                true
            }

            PointerKind::Up(_) | PointerKind::DragEnd(_) => {
                self.dragging = false;
                false
            }

            _ => false,
        }
    }

    /// The selected text from the anchor node's buffer.
    #[must_use]
    pub fn selected_text(&self, tree: &mut SceneTree) -> Option<String> {
        let snapshot = self.active?;
        let node = tree.get_mut(snapshot.node)?;
        match &node.kind {
            NodeKind::Text { buffer, .. } => Some(buffer.selected_text(false)),
            _ => None,
        }
    }

    /// Drop the selection. Returns `true` if one existed.
    pub fn clear(&mut self, tree: &mut SceneTree) -> bool {
        self.dragging = false;
        let Some(snapshot) = self.active.take() else {
            return false;
        };
        if let Some(node) = tree.get_mut(snapshot.node) {
            if let NodeKind::Text { buffer, .. } = &mut node.kind {
                buffer.clear_selection();
            }
        }
        tree.request_render(snapshot.node);
        true
    }

    fn store(&mut self, tree: &mut SceneTree, snapshot: SelectionSnapshot) {
        if let Some(prev) = self.active {
            if prev.node != snapshot.node {
                if let Some(node) = tree.get_mut(prev.node) {
                    if let NodeKind::Text { buffer, .. } = &mut node.kind {
                        buffer.clear_selection();
                    }
                }
                tree.request_render(prev.node);
            }
        }
        if let Some(node) = tree.get_mut(snapshot.node) {
            if let NodeKind::Text { buffer, .. } = &mut node.kind {
                buffer.set_selection(snapshot.selection);
            }
        }
        tree.request_render(snapshot.node);
        self.active = Some(snapshot);
    }
}

/// Map a screen point to a logical `(row, grapheme column)` within a
/// text node. Points outside the node clamp to its edges.
fn text_position(
    tree: &mut SceneTree,
    id: NodeId,
    x: u16,
    y: u16,
) -> Option<(usize, usize)> {
    let rect = tree.get(id)?.rect();
    let (scroll_row, local_x, local_y) = {
        let node = tree.get(id)?;
        let NodeKind::Text { scroll_row, .. } = &node.kind else {
            return None;
        };
        (
            *scroll_row,
            clamp_local(x, rect.x, rect.width),
            clamp_local(y, rect.y, rect.height),
        )
    };

    let node = tree.get_mut(id)?;
    let NodeKind::Text { buffer, .. } = &mut node.kind else {
        return None;
    };

    let vrow = scroll_row + local_y as usize;
    let total = buffer.virtual_line_count();
    let vrow = vrow.min(total.saturating_sub(1));
    let (row, seg_start) = buffer.visual_line_to_logical(vrow);

    let col = column_at_width(buffer, row, seg_start, local_x as usize);
    Some((row, col))
}

fn clamp_local(value: u16, origin: u16, extent: u16) -> u16 {
    value
        .saturating_sub(origin)
        .min(extent.saturating_sub(1))
}

/// Grapheme column of the glyph at `target` visual columns after
/// `seg_start` within `row`.
fn column_at_width(buffer: &TextBuffer, row: usize, seg_start: usize, target: usize) -> usize {
    use otui_text::width::{find_pos_by_width, TabPolicy};
    use unicode_segmentation::UnicodeSegmentation;

    let line = buffer.line_text(row);
    let rest = &line.as_bytes()[seg_start.min(line.len())..];
    let byte_in_seg = find_pos_by_width(
        rest,
        target,
        TabPolicy::default(),
        false,
        otui_text::width::EastAsianPolicy::default(),
    );
    let abs_byte = seg_start + byte_in_seg;
    line.grapheme_indices(true)
        .take_while(|(i, _)| *i < abs_byte)
        .count()
}

/// Encode a clipboard write as an OSC 52 sequence.
#[must_use]
pub fn osc52_copy(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len() * 4 / 3 + 16);
    out.extend_from_slice(b"\x1b]52;c;");
    base64_encode(text.as_bytes(), &mut out);
    out.extend_from_slice(b"\x1b\\");
    out
}

const BASE64_ALPHABET: &[u8; 64] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

fn base64_encode(input: &[u8], out: &mut Vec<u8>) {
    for chunk in input.chunks(3) {
        let b = [
            chunk[0],
            chunk.get(1).copied().unwrap_or(0),
            chunk.get(2).copied().unwrap_or(0),
        ];
        let n = u32::from(b[0]) << 16 | u32::from(b[1]) << 8 | u32::from(b[2]);
        out.push(BASE64_ALPHABET[(n >> 18 & 63) as usize]);
        out.push(BASE64_ALPHABET[(n >> 12 & 63) as usize]);
        out.push(if chunk.len() > 1 {
            BASE64_ALPHABET[(n >> 6 & 63) as usize]
        } else {
            b'='
        });
        out.push(if chunk.len() > 2 {
            BASE64_ALPHABET[(n & 63) as usize]
        } else {
            b'='
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otui_core::event::MouseButton;
    use otui_layout::{Dimension, Inset, ItemStyle, Position};
    use otui_style::Style;
    use otui_text::breaks::WrapMode;
    use otui_text::width::TabPolicy;

    fn pointer(kind: PointerKind, node: Option<NodeId>, x: u16, y: u16) -> PointerEvent {
        PointerEvent { kind, node, x, y }
    }

    fn selectable_text_tree(content: &str) -> (SceneTree, NodeId) {
        let mut tree = SceneTree::new();
        let mut buffer = TextBuffer::new();
        buffer.set_text(content);
        let t = tree.add_child(
            tree.root(),
            NodeKind::Text {
                buffer,
                wrap: WrapMode::None,
                tabs: TabPolicy::default(),
                scroll_row: 0,
                base: Style::EMPTY,
            },
        );
        {
            let node = tree.get_mut(t).unwrap();
            node.selectable = true;
            node.mouse_target = true;
            node.item_style = ItemStyle {
                position: Position::Absolute,
                width: Dimension::Cells(20),
                height: Dimension::Cells(5),
                inset: Inset {
                    left: Some(0),
                    top: Some(0),
                    ..Default::default()
                },
                ..Default::default()
            };
        }
        tree.layout(otui_core::geometry::Rect::new(0, 0, 40, 10));
        (tree, t)
    }

    #[test]
    fn down_anchors_selection() {
        let (mut tree, t) = selectable_text_tree("hello world");
        let mut sel = SelectionController::new();

        let changed = sel.on_pointer(
            &mut tree,
            &pointer(PointerKind::Down(MouseButton::Left), Some(t), 2, 0),
        );
        assert!(changed);
        let snap = sel.snapshot().unwrap();
        assert_eq!(snap.node, t);
        assert_eq!((snap.selection.anchor_row, snap.selection.anchor_col), (0, 2));
    }

    #[test]
    fn drag_extends_focus_and_extracts() {
        let (mut tree, t) = selectable_text_tree("hello world");
        let mut sel = SelectionController::new();

        sel.on_pointer(
            &mut tree,
            &pointer(PointerKind::Down(MouseButton::Left), Some(t), 0, 0),
        );
        sel.on_pointer(
            &mut tree,
            &pointer(PointerKind::Drag(MouseButton::Left), Some(t), 5, 0),
        );

        assert_eq!(sel.selected_text(&mut tree).as_deref(), Some("hello"));
    }

    #[test]
    fn multi_row_drag_selects_across_lines() {
        let (mut tree, t) = selectable_text_tree("one\ntwo\nthree");
        let mut sel = SelectionController::new();

        sel.on_pointer(
            &mut tree,
            &pointer(PointerKind::Down(MouseButton::Left), Some(t), 1, 0),
        );
        sel.on_pointer(
            &mut tree,
            &pointer(PointerKind::Drag(MouseButton::Left), Some(t), 2, 2),
        );

        assert_eq!(sel.selected_text(&mut tree).as_deref(), Some("ne\ntwo\nth"));
    }

    #[test]
    fn down_on_non_selectable_clears() {
        let (mut tree, t) = selectable_text_tree("hello");
        let mut sel = SelectionController::new();
        sel.on_pointer(
            &mut tree,
            &pointer(PointerKind::Down(MouseButton::Left), Some(t), 0, 0),
        );
        assert!(sel.snapshot().is_some());

        sel.on_pointer(
            &mut tree,
            &pointer(PointerKind::Down(MouseButton::Left), None, 30, 9),
        );
        assert!(sel.snapshot().is_none());
    }

    #[test]
    fn drag_after_release_does_not_extend() {
        let (mut tree, t) = selectable_text_tree("hello world");
        let mut sel = SelectionController::new();

        sel.on_pointer(
            &mut tree,
            &pointer(PointerKind::Down(MouseButton::Left), Some(t), 0, 0),
        );
        sel.on_pointer(
            &mut tree,
            &pointer(PointerKind::Up(MouseButton::Left), Some(t), 3, 0),
        );
        let changed = sel.on_pointer(
            &mut tree,
            &pointer(PointerKind::Drag(MouseButton::Left), Some(t), 8, 0),
        );
        assert!(!changed, "selection is frozen after release");
    }

    #[test]
    fn wide_glyph_positions_snap_to_grapheme() {
        let (mut tree, t) = selectable_text_tree("a世b");
        let mut sel = SelectionController::new();

        // Column 2 is the right half of 世: the anchor snaps to its start.
        sel.on_pointer(
            &mut tree,
            &pointer(PointerKind::Down(MouseButton::Left), Some(t), 2, 0),
        );
        let snap = sel.snapshot().unwrap();
        assert_eq!(snap.selection.anchor_col, 1);
    }

    #[test]
    fn osc52_sequence_shape() {
        let bytes = osc52_copy("hi");
        assert!(bytes.starts_with(b"\x1b]52;c;"));
        assert!(bytes.ends_with(b"\x1b\\"));
        // "hi" -> aGk=
        assert_eq!(&bytes[7..bytes.len() - 2], b"aGk=");
    }

    #[test]
    fn base64_padding_cases() {
        let mut out = Vec::new();
        base64_encode(b"f", &mut out);
        assert_eq!(out, b"Zg==");
        out.clear();
        base64_encode(b"fo", &mut out);
        assert_eq!(out, b"Zm8=");
        out.clear();
        base64_encode(b"foo", &mut out);
        assert_eq!(out, b"Zm9v");
    }
}
