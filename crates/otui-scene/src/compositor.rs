#![forbid(unsafe_code)]

//! The compositing pass.
//!
//! Walks the tree pre-order and draws every visible node into the frame
//! presenter's back buffer:
//!
//! 1. Clear the back buffer to the tree's background.
//! 2. Skip invisible subtrees.
//! 3. Clip each node to the intersection of its rect with every
//!    ancestor's rect (the buffer's clip stack enforces it - a node
//!    cannot write outside its clip, so it cannot corrupt a sibling).
//! 4. Buffered nodes re-render into their cached frame buffer only when
//!    render-dirty, then blend the cache; unbuffered nodes draw straight
//!    into the back buffer.
//! 5. Children draw in `(z_index, insertion order)`.

use otui_core::geometry::Rect;
use otui_render::buffer::OptimizedBuffer;
use otui_render::cell::{CellAttrs, PackedRgba};
use otui_render::grapheme_pool::GraphemePool;
use otui_render::link_registry::LinkRegistry;

use crate::node::{NodeId, NodeKind, SceneTree};

impl SceneTree {
    /// Composite the tree into `target`, clearing it first.
    ///
    /// `pool` and `links` belong to the frame presenter; text drawing
    /// interns clusters and hyperlinks through them.
    pub fn composite(
        &mut self,
        target: &mut OptimizedBuffer,
        pool: &mut GraphemePool,
        links: &mut LinkRegistry,
    ) {
        target.clear(self.background);
        let bounds = target.bounds();
        let root = self.root();
        self.composite_node(root, target, pool, links, bounds);
        self.clear_render_flags(root);
    }

    fn clear_render_flags(&mut self, id: NodeId) {
        let children = self
            .get(id)
            .map(|n| n.children.clone())
            .unwrap_or_default();
        if let Some(node) = self.get_mut(id) {
            node.render_dirty = false;
        }
        for child in children {
            self.clear_render_flags(child);
        }
    }

    fn composite_node(
        &mut self,
        id: NodeId,
        target: &mut OptimizedBuffer,
        pool: &mut GraphemePool,
        links: &mut LinkRegistry,
        parent_clip: Rect,
    ) {
        let Some(node) = self.get(id) else { return };
        if !node.visible {
            return;
        }

        let rect = node.rect;
        let Some(clip) = parent_clip.intersection_opt(&rect) else {
            // Fully clipped: the subtree cannot contribute pixels.
            return;
        };

        let buffered = node.buffered;
        let dirty = node.render_dirty;

        if buffered {
            self.render_into_cache(id, pool, links, dirty);
            if let Some(node) = self.get(id) {
                if let Some(cache) = &node.frame_buffer {
                    target.push_clip(clip);
                    target.blend(cache, rect.x, rect.y);
                    target.pop_clip();
                }
            }
        } else {
            target.push_clip(clip);
            self.render_self(id, target, pool, links, rect);
            target.pop_clip();
        }

        let children = self
            .get(id)
            .map(|n| self.z_ordered_children(n))
            .unwrap_or_default();
        for child in children {
            self.composite_node(child, target, pool, links, clip);
        }
    }

    /// Re-render a buffered node's own drawing into its cached buffer if
    /// it is dirty (or the cache is missing/mis-sized).
    fn render_into_cache(
        &mut self,
        id: NodeId,
        pool: &mut GraphemePool,
        links: &mut LinkRegistry,
        dirty: bool,
    ) {
        let Some(node) = self.get(id) else { return };
        let rect = node.rect;
        if rect.is_empty() {
            return;
        }

        let needs_alloc = node
            .frame_buffer
            .as_ref()
            .map_or(true, |b| (b.width(), b.height()) != (rect.width, rect.height));

        if !dirty && !needs_alloc {
            return;
        }

        let mut cache = match self.get_mut(id).and_then(|n| n.frame_buffer.take()) {
            Some(mut buffer) if !needs_alloc => {
                buffer.clear(PackedRgba::TRANSPARENT);
                buffer
            }
            _ => OptimizedBuffer::new(rect.width, rect.height),
        };

        // The cache is drawn in node-local coordinates.
        let local = Rect::from_size(rect.width, rect.height);
        self.render_self(id, &mut cache, pool, links, local);

        if let Some(node) = self.get_mut(id) {
            node.frame_buffer = Some(cache);
        }
    }

    /// Draw one node's own content (not its children) into `target` at
    /// `rect`.
    fn render_self(
        &mut self,
        id: NodeId,
        target: &mut OptimizedBuffer,
        pool: &mut GraphemePool,
        links: &mut LinkRegistry,
        rect: Rect,
    ) {
        let styles = self.styles.clone();
        let Some(node) = self.get_mut(id) else { return };

        match &mut node.kind {
            NodeKind::Box {
                bg,
                border,
                border_color,
            } => {
                if let Some(bg) = bg {
                    target.fill_rect(rect.x, rect.y, rect.width, rect.height, *bg);
                }
                if let Some(style) = border {
                    target.draw_box(
                        rect.x,
                        rect.y,
                        rect.width,
                        rect.height,
                        *style,
                        *border_color,
                        None,
                    );
                }
            }

            NodeKind::Text {
                buffer,
                wrap,
                tabs,
                scroll_row,
                base,
            } => {
                buffer.wrap_to(
                    (rect.width > 0).then_some(rect.width as usize),
                    *wrap,
                    *tabs,
                );
                let total = buffer.virtual_line_count();
                let first = (*scroll_row).min(total.saturating_sub(1));

                for row in 0..rect.height as usize {
                    let vrow = first + row;
                    if vrow >= total {
                        break;
                    }
                    let y = rect.y + row as u16;
                    let mut x = rect.x;
                    for chunk in buffer.line_chunks_for_visual_row(vrow, &styles) {
                        let style = base.merged(chunk.style);
                        let link_id = chunk
                            .link
                            .as_deref()
                            .map(|url| links.register(url))
                            .unwrap_or(CellAttrs::NO_LINK);
                        let attrs = CellAttrs::new(style.attrs, link_id);
                        let bg = style.bg.map(|c| c.pack());
                        x = target.draw_text(
                            Some(pool),
                            &chunk.text,
                            x,
                            y,
                            style.packed_fg(),
                            bg,
                            attrs,
                        );
                        if x >= rect.right() {
                            break;
                        }
                    }
                }
            }

            NodeKind::ScrollView { .. } => {
                // Pure container: the viewport clip and child layout shift
                // do the work.
            }

            NodeKind::Raster {
                pixels,
                width,
                height,
                mode,
            } => {
                target.super_sample_blit(pixels, *width, *height, rect.x, rect.y, *mode);
            }
        }
    }
}
