#![forbid(unsafe_code)]

//! Scene nodes and the layout driver.
//!
//! Nodes live in an id-addressed arena: parents own their children as an
//! ordered id list, each child keeps a back-reference id to its parent,
//! and destruction is recursive. Behavior is a closed tagged variant
//! ([`NodeKind`]) over a shared base - no trait objects on the render
//! path.
//!
//! # Dirty propagation
//!
//! - [`SceneTree::request_render`] marks a node render-dirty and walks
//!   the flag up to the root so the frame loop knows to composite.
//! - [`SceneTree::mark_layout_dirty`] does the same for layout; the next
//!   frame re-solves from the root.
//!
//! # Layout
//!
//! Layout runs top-down: each container solves its children's rects with
//! the flexbox solver, then recurses. Text nodes report intrinsic sizes
//! through the measure callback. A solver error keeps the node's previous
//! child rects and raises its error flag (surfaced once).

use otui_core::geometry::{Rect, Size};
use otui_layout::{solve, ContainerStyle, ItemStyle};
use otui_render::buffer::{BorderStyle, OptimizedBuffer, SampleMode};
use otui_render::cell::PackedRgba;
use otui_style::{Style, StyleRegistry};
use otui_text::breaks::WrapMode;
use otui_text::width::{calculate_text_width, TabPolicy};
use otui_text::TextBuffer;

/// Handle to a node in the tree's arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

/// The closed set of node behaviors.
#[derive(Debug)]
pub enum NodeKind {
    /// A rectangle: optional background fill and border.
    Box {
        /// Background fill, if any.
        bg: Option<PackedRgba>,
        /// Border style; `None` draws no border.
        border: Option<BorderStyle>,
        /// Border color.
        border_color: PackedRgba,
    },
    /// Wrapped styled text backed by a [`TextBuffer`].
    Text {
        /// The content.
        buffer: TextBuffer,
        /// Wrap discipline applied at the node's laid-out width.
        wrap: WrapMode,
        /// Tab expansion.
        tabs: TabPolicy,
        /// First visual row shown (vertical scroll).
        scroll_row: usize,
        /// Base style for unstyled chunks.
        base: Style,
    },
    /// A viewport that scrolls its children.
    ScrollView {
        /// Horizontal scroll offset in cells.
        offset_x: u16,
        /// Vertical scroll offset in cells.
        offset_y: u16,
    },
    /// A foreign RGBA raster resolved to half-block cells.
    Raster {
        /// Row-major RGBA pixels.
        pixels: Vec<[u8; 4]>,
        /// Raster width in pixels.
        width: usize,
        /// Raster height in pixels.
        height: usize,
        /// Half-block sampling mode.
        mode: SampleMode,
    },
}

/// A retained node: shared base plus variant payload.
#[derive(Debug)]
pub struct SceneNode {
    pub(crate) id: NodeId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Variant payload.
    pub kind: NodeKind,
    /// Flex attributes of this node as a child.
    pub item_style: ItemStyle,
    /// Flex attributes of this node as a container.
    pub container_style: ContainerStyle,
    /// Draw order among siblings; ties break by insertion order.
    pub z_index: i32,
    /// Invisible subtrees are skipped by layout consumers and compositing.
    pub visible: bool,
    /// Whether the node accepts pointer events.
    pub mouse_target: bool,
    /// Whether the node can anchor a selection.
    pub selectable: bool,
    /// Whether the node participates in focus traversal.
    pub focusable: bool,
    /// Own a cached frame buffer instead of drawing straight to the root.
    pub buffered: bool,
    pub(crate) rect: Rect,
    pub(crate) render_dirty: bool,
    pub(crate) layout_dirty: bool,
    pub(crate) frame_buffer: Option<OptimizedBuffer>,
    /// Set when layout failed and the previous rects were kept.
    pub(crate) layout_error: bool,
}

impl SceneNode {
    fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            parent: None,
            children: Vec::new(),
            kind,
            item_style: ItemStyle::default(),
            container_style: ContainerStyle::default(),
            z_index: 0,
            visible: true,
            mouse_target: false,
            selectable: false,
            focusable: false,
            buffered: false,
            rect: Rect::default(),
            render_dirty: true,
            layout_dirty: true,
            frame_buffer: None,
            layout_error: false,
        }
    }

    /// The node's absolute rect from the last layout pass.
    #[inline]
    pub fn rect(&self) -> Rect {
        self.rect
    }

    /// The node's id.
    #[inline]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The parent id, if not the root.
    #[inline]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Ordered child ids.
    #[inline]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Whether the last layout pass failed for this container.
    #[inline]
    pub fn layout_error(&self) -> bool {
        self.layout_error
    }
}

/// The scene: an arena of nodes under a single root.
#[derive(Debug)]
pub struct SceneTree {
    nodes: Vec<Option<SceneNode>>,
    free: Vec<u32>,
    root: NodeId,
    /// Style registry shared by text nodes' highlight overlays.
    pub styles: StyleRegistry,
    /// Focused node, if any.
    focused: Option<NodeId>,
    /// Root background color.
    pub background: PackedRgba,
}

impl Default for SceneTree {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneTree {
    /// Create a tree whose root is an undecorated box.
    #[must_use]
    pub fn new() -> Self {
        let root = SceneNode::new(
            NodeId(0),
            NodeKind::Box {
                bg: None,
                border: None,
                border_color: PackedRgba::TRANSPARENT,
            },
        );
        Self {
            nodes: vec![Some(root)],
            free: Vec::new(),
            root: NodeId(0),
            styles: StyleRegistry::default(),
            focused: None,
            background: PackedRgba::TRANSPARENT,
        }
    }

    /// The root id.
    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Shared access to a node.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0 as usize).and_then(Option::as_ref)
    }

    /// Mutable access to a node.
    ///
    /// Callers mutating geometry-affecting state follow up with
    /// [`mark_layout_dirty`](Self::mark_layout_dirty) or
    /// [`request_render`](Self::request_render).
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id.0 as usize).and_then(Option::as_mut)
    }

    /// Number of live nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }

    /// Whether only the root exists.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Create a node and attach it under `parent`.
    pub fn add_child(&mut self, parent: NodeId, kind: NodeKind) -> NodeId {
        let id = match self.free.pop() {
            Some(slot) => NodeId(slot),
            None => {
                let slot = self.nodes.len() as u32;
                self.nodes.push(None);
                NodeId(slot)
            }
        };

        let mut node = SceneNode::new(id, kind);
        node.parent = Some(parent);
        self.nodes[id.0 as usize] = Some(node);

        if let Some(p) = self.get_mut(parent) {
            p.children.push(id);
        }
        self.mark_layout_dirty(parent);
        id
    }

    /// Detach and destroy a subtree. The root cannot be removed.
    pub fn remove(&mut self, id: NodeId) {
        if id == self.root {
            return;
        }
        let Some(parent) = self.get(id).and_then(|n| n.parent) else {
            return;
        };
        if let Some(p) = self.get_mut(parent) {
            p.children.retain(|&c| c != id);
        }
        self.destroy_recursively(id);
        self.mark_layout_dirty(parent);
    }

    fn destroy_recursively(&mut self, id: NodeId) {
        let children = self
            .get(id)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        for child in children {
            self.destroy_recursively(child);
        }
        if self.focused == Some(id) {
            self.focused = None;
        }
        self.nodes[id.0 as usize] = None;
        self.free.push(id.0);
    }

    /// Mark a node render-dirty and propagate up so the frame loop
    /// composites. Does not force a layout pass.
    pub fn request_render(&mut self, id: NodeId) {
        let mut cursor = Some(id);
        while let Some(c) = cursor {
            let Some(node) = self.get_mut(c) else { break };
            if node.render_dirty && c != id {
                break;
            }
            node.render_dirty = true;
            cursor = node.parent;
        }
    }

    /// Mark a node layout-dirty and propagate up; the next frame runs the
    /// solver from the root.
    pub fn mark_layout_dirty(&mut self, id: NodeId) {
        let mut cursor = Some(id);
        while let Some(c) = cursor {
            let Some(node) = self.get_mut(c) else { break };
            node.layout_dirty = true;
            node.render_dirty = true;
            cursor = node.parent;
        }
    }

    /// Whether any node needs compositing.
    #[must_use]
    pub fn needs_render(&self) -> bool {
        self.get(self.root).is_some_and(|n| n.render_dirty)
    }

    /// Whether any node needs layout.
    #[must_use]
    pub fn needs_layout(&self) -> bool {
        self.get(self.root).is_some_and(|n| n.layout_dirty)
    }

    // ========== Focus ==========

    /// The focused node.
    #[must_use]
    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    /// Focus a node (must be focusable) or clear focus with `None`.
    pub fn set_focus(&mut self, id: Option<NodeId>) {
        match id {
            Some(id) if self.get(id).is_some_and(|n| n.focusable) => {
                self.focused = Some(id);
            }
            Some(_) => {}
            None => self.focused = None,
        }
    }

    /// Move focus to the next focusable node in pre-order, wrapping.
    pub fn focus_next(&mut self) -> Option<NodeId> {
        let order = self.preorder(self.root);
        let focusables: Vec<NodeId> = order
            .into_iter()
            .filter(|&id| self.get(id).is_some_and(|n| n.focusable && n.visible))
            .collect();
        if focusables.is_empty() {
            self.focused = None;
            return None;
        }
        let next = match self.focused.and_then(|f| focusables.iter().position(|&x| x == f)) {
            Some(pos) => focusables[(pos + 1) % focusables.len()],
            None => focusables[0],
        };
        self.focused = Some(next);
        Some(next)
    }

    /// Pre-order traversal ids, children in z order.
    #[must_use]
    pub fn preorder(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            let Some(node) = self.get(id) else { continue };
            out.push(id);
            // Reverse so the stack pops children in draw order.
            for &child in self.z_ordered_children(node).iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// A node's children sorted by `(z_index, insertion order)`.
    pub(crate) fn z_ordered_children(&self, node: &SceneNode) -> Vec<NodeId> {
        let mut order: Vec<(i32, usize, NodeId)> = node
            .children
            .iter()
            .enumerate()
            .filter_map(|(i, &id)| self.get(id).map(|n| (n.z_index, i, id)))
            .collect();
        order.sort_by_key(|&(z, i, _)| (z, i));
        order.into_iter().map(|(_, _, id)| id).collect()
    }

    // ========== Layout ==========

    /// Solve the whole tree into `area` and clear the layout flags.
    pub fn layout(&mut self, area: Rect) {
        if let Some(root) = self.get_mut(self.root) {
            root.rect = area;
        }
        self.layout_children(self.root);
        self.clear_layout_flags(self.root);
    }

    fn clear_layout_flags(&mut self, id: NodeId) {
        let children = self
            .get(id)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        if let Some(node) = self.get_mut(id) {
            node.layout_dirty = false;
        }
        for child in children {
            self.clear_layout_flags(child);
        }
    }

    fn layout_children(&mut self, id: NodeId) {
        let Some(node) = self.get(id) else { return };
        if node.children.is_empty() {
            return;
        }

        let area = node.rect;
        let container = node.container_style;
        let children = node.children.clone();

        // A scroll view lays out against a shifted origin so offsets move
        // the content, not the viewport.
        let area = match node.kind {
            NodeKind::ScrollView { offset_x, offset_y } => Rect {
                x: area.x.wrapping_sub(offset_x.min(area.x)),
                y: area.y.wrapping_sub(offset_y.min(area.y)),
                ..area
            },
            _ => area,
        };

        let styles: Vec<ItemStyle> = children
            .iter()
            .map(|&c| self.get(c).map(|n| n.item_style).unwrap_or_default())
            .collect();

        // Intrinsic sizes are precomputed so the solver's measure callback
        // needs no tree access.
        let measured: Vec<Size> = children
            .iter()
            .map(|&c| self.measure_node(c, Size::new(area.width, area.height)))
            .collect();

        match solve(&container, area, &styles, |i, _| measured[i]) {
            Ok(rects) => {
                for (child, rect) in children.iter().zip(rects) {
                    if let Some(n) = self.get_mut(*child) {
                        if n.rect != rect {
                            n.rect = rect;
                            n.render_dirty = true;
                        }
                    }
                }
                if let Some(n) = self.get_mut(id) {
                    n.layout_error = false;
                }
            }
            Err(_err) => {
                // Keep the previous child rects; surface the failure once.
                if let Some(n) = self.get_mut(id) {
                    if !n.layout_error {
                        n.layout_error = true;
                        #[cfg(feature = "tracing")]
                        tracing::warn!(node = n.id.0, error = %_err, "layout failed; keeping previous layout");
                    }
                }
            }
        }

        for child in children {
            self.layout_children(child);
        }
    }

    /// Intrinsic size of a node's content within `available`.
    fn measure_node(&mut self, id: NodeId, available: Size) -> Size {
        let Some(node) = self.get_mut(id) else {
            return Size::default();
        };
        match &mut node.kind {
            NodeKind::Text {
                buffer, wrap, tabs, ..
            } => {
                let tabs = *tabs;
                let wrap = *wrap;
                buffer.wrap_to(
                    (available.width > 0).then_some(available.width as usize),
                    wrap,
                    tabs,
                );
                let rows = buffer.virtual_line_count();
                let widest = (0..buffer.line_count())
                    .map(|row| {
                        calculate_text_width(
                            buffer.line_text(row).as_bytes(),
                            tabs,
                            otui_text::width::EastAsianPolicy::default(),
                        )
                    })
                    .max()
                    .unwrap_or(0);
                Size::new(
                    widest.min(available.width as usize) as u16,
                    rows.min(u16::MAX as usize) as u16,
                )
            }
            NodeKind::Raster { width, height, mode, .. } => {
                let rows = match mode {
                    SampleMode::Standard => height.div_ceil(2),
                    SampleMode::PreSqueezed => *height,
                };
                Size::new(
                    (*width).min(u16::MAX as usize) as u16,
                    rows.min(u16::MAX as usize) as u16,
                )
            }
            NodeKind::Box { .. } | NodeKind::ScrollView { .. } => Size::default(),
        }
    }
}
