#![forbid(unsafe_code)]

//! The cell grid and its drawing primitives.
//!
//! [`OptimizedBuffer`] is a fixed `width × height` grid of [`Cell`]s in
//! row-major order. All drawing goes through bounds-checked writes that
//! maintain the wide-glyph invariants:
//!
//! 1. `cells.len() == width * height` - dimensions change only via `resize`
//! 2. A wide head at `(x, y)` always has a wide tail at `(x + 1, y)`
//! 3. Overwriting either half of a wide pair clears the other half
//! 4. A wide glyph that does not fully fit (buffer edge or clip region)
//!    is skipped entirely - no half-written pairs
//!
//! Out-of-range coordinates clip silently; zero-sized operations are no-ops.

use unicode_segmentation::UnicodeSegmentation;

use crate::cell::{Cell, CellAttrs, CellContent, PackedRgba};
use crate::grapheme_pool::GraphemePool;
use crate::grapheme_width;
use otui_core::geometry::Rect;

/// Box border line styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BorderStyle {
    /// Light box-drawing characters.
    #[default]
    Single,
    /// Double-line characters.
    Double,
    /// Light lines with rounded corners.
    Rounded,
    /// Heavy (thick) lines.
    Heavy,
}

/// Direction mask for border joining: which of the four neighbours a
/// border glyph connects toward.
mod line {
    pub const UP: u8 = 1 << 0;
    pub const DOWN: u8 = 1 << 1;
    pub const LEFT: u8 = 1 << 2;
    pub const RIGHT: u8 = 1 << 3;
}

impl BorderStyle {
    /// The glyph for a connection mask, drawn from the 11-glyph border set
    /// (corners, lines, tees, cross).
    fn glyph(self, mask: u8) -> char {
        use line::{DOWN, LEFT, RIGHT, UP};
        let table: &[char; 11] = match self {
            // ┌ ┐ └ ┘ ─ │ ├ ┤ ┬ ┴ ┼
            BorderStyle::Single => &['┌', '┐', '└', '┘', '─', '│', '├', '┤', '┬', '┴', '┼'],
            BorderStyle::Double => &['╔', '╗', '╚', '╝', '═', '║', '╠', '╣', '╦', '╩', '╬'],
            BorderStyle::Rounded => &['╭', '╮', '╰', '╯', '─', '│', '├', '┤', '┬', '┴', '┼'],
            BorderStyle::Heavy => &['┏', '┓', '┗', '┛', '━', '┃', '┣', '┫', '┳', '┻', '╋'],
        };
        match mask {
            m if m == DOWN | RIGHT => table[0],
            m if m == DOWN | LEFT => table[1],
            m if m == UP | RIGHT => table[2],
            m if m == UP | LEFT => table[3],
            m if m == LEFT | RIGHT || m == LEFT || m == RIGHT => table[4],
            m if m == UP | DOWN || m == UP || m == DOWN => table[5],
            m if m == UP | DOWN | RIGHT => table[6],
            m if m == UP | DOWN | LEFT => table[7],
            m if m == DOWN | LEFT | RIGHT => table[8],
            m if m == UP | LEFT | RIGHT => table[9],
            _ => table[10],
        }
    }

    /// The connection mask of a glyph from this style's set, or 0 if the
    /// char is not a border glyph. Used to join adjacent boxes.
    fn mask_of(self, c: char) -> u8 {
        use line::{DOWN, LEFT, RIGHT, UP};
        let masks: [u8; 11] = [
            DOWN | RIGHT,
            DOWN | LEFT,
            UP | RIGHT,
            UP | LEFT,
            LEFT | RIGHT,
            UP | DOWN,
            UP | DOWN | RIGHT,
            UP | DOWN | LEFT,
            DOWN | LEFT | RIGHT,
            UP | LEFT | RIGHT,
            UP | DOWN | LEFT | RIGHT,
        ];
        let table: &[char; 11] = match self {
            BorderStyle::Single => &['┌', '┐', '└', '┘', '─', '│', '├', '┤', '┬', '┴', '┼'],
            BorderStyle::Double => &['╔', '╗', '╚', '╝', '═', '║', '╠', '╣', '╦', '╩', '╬'],
            BorderStyle::Rounded => &['╭', '╮', '╰', '╯', '─', '│', '├', '┤', '┬', '┴', '┼'],
            BorderStyle::Heavy => &['┏', '┓', '┗', '┛', '━', '┃', '┣', '┫', '┳', '┻', '╋'],
        };
        table
            .iter()
            .position(|&g| g == c)
            .map_or(0, |i| masks[i])
    }
}

/// Half-block super-sample algorithm selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleMode {
    /// Source raster is `2 × cell rows` tall: each cell resolves an upper
    /// and a lower pixel.
    Standard,
    /// Caller already averaged vertical pairs: one source pixel per cell.
    PreSqueezed,
}

/// A fixed-size grid of terminal cells with drawing primitives.
#[derive(Debug, Clone)]
pub struct OptimizedBuffer {
    width: u16,
    height: u16,
    cells: Vec<Cell>,
    clip_stack: Vec<Rect>,
}

impl OptimizedBuffer {
    /// Create a buffer with the given dimensions, cleared to default cells.
    ///
    /// # Panics
    ///
    /// Panics if width or height is 0.
    pub fn new(width: u16, height: u16) -> Self {
        assert!(width > 0, "buffer width must be > 0");
        assert!(height > 0, "buffer height must be > 0");

        Self {
            width,
            height,
            cells: vec![Cell::default(); width as usize * height as usize],
            clip_stack: vec![Rect::from_size(width, height)],
        }
    }

    /// Buffer width in cells.
    #[inline]
    pub const fn width(&self) -> u16 {
        self.width
    }

    /// Buffer height in cells.
    #[inline]
    pub const fn height(&self) -> u16 {
        self.height
    }

    /// Bounding rect of the entire buffer.
    #[inline]
    pub const fn bounds(&self) -> Rect {
        Rect::from_size(self.width, self.height)
    }

    #[inline]
    fn index(&self, x: u16, y: u16) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    /// The cell at `(x, y)`, or `None` out of bounds.
    #[inline]
    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        self.index(x, y).map(|i| &self.cells[i])
    }

    /// Raw access to the cell slice (row-major).
    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// One row of cells.
    ///
    /// # Panics
    ///
    /// Panics if `y >= height`.
    #[inline]
    pub fn row_cells(&self, y: u16) -> &[Cell] {
        let start = y as usize * self.width as usize;
        &self.cells[start..start + self.width as usize]
    }

    // ========== Clip stack ==========

    /// Push a clip region; the effective region is the intersection of all
    /// pushed rects. Writes outside it are dropped.
    pub fn push_clip(&mut self, rect: Rect) {
        let clipped = self.current_clip().intersection(&rect);
        self.clip_stack.push(clipped);
    }

    /// Pop a clip region. The base region (full buffer) never pops.
    pub fn pop_clip(&mut self) {
        if self.clip_stack.len() > 1 {
            self.clip_stack.pop();
        }
    }

    /// The current effective clip region.
    #[inline]
    pub fn current_clip(&self) -> Rect {
        // The stack is never empty: new() seeds it and pop_clip keeps the base.
        *self.clip_stack.last().unwrap()
    }

    // ========== Cell writes ==========

    /// Write a cell, maintaining the wide-glyph invariants.
    ///
    /// Wide content is written atomically: if the head or tail position is
    /// out of bounds or outside the clip region, nothing is written.
    pub fn set(&mut self, x: u16, y: u16, cell: Cell) {
        let width = cell.content.width();

        if width <= 1 {
            let Some(idx) = self.index(x, y) else { return };
            if !self.current_clip().contains(x, y) {
                return;
            }
            self.dissolve_wide_pair(x, y);
            self.cells[idx] = cell;
            return;
        }

        // Wide content: verify every covered column first.
        let clip = self.current_clip();
        for i in 0..width {
            let cx = x.saturating_add(i as u16);
            if cx >= self.width || y >= self.height || !clip.contains(cx, y) {
                return;
            }
        }

        for i in 0..width {
            self.dissolve_wide_pair(x + i as u16, y);
        }

        let row = y as usize * self.width as usize;
        self.cells[row + x as usize] = cell;
        for i in 1..width {
            self.cells[row + x as usize + i] = Cell::WIDE_TAIL;
        }
    }

    /// Write a cell without clip processing or wide maintenance.
    #[inline]
    pub fn set_raw(&mut self, x: u16, y: u16, cell: Cell) {
        if let Some(idx) = self.index(x, y) {
            self.cells[idx] = cell;
        }
    }

    /// If `(x, y)` is part of a wide pair, clear the *other* half so no
    /// orphan head or tail survives the upcoming overwrite of `(x, y)`.
    fn dissolve_wide_pair(&mut self, x: u16, y: u16) {
        let Some(idx) = self.index(x, y) else { return };
        let current = self.cells[idx];

        if current.content.width() > 1 {
            // Overwriting a head: clear its tails.
            let w = current.content.width();
            for i in 1..w {
                if let Some(tail_idx) = self.index(x + i as u16, y) {
                    if self.cells[tail_idx].is_wide_tail() {
                        self.cells[tail_idx] = Cell::default();
                    }
                }
            }
        } else if current.is_wide_tail() {
            // Overwriting a tail: scan left for the owning head.
            let mut hx = x;
            while hx > 0 {
                hx -= 1;
                let Some(h_idx) = self.index(hx, y) else { break };
                let head = self.cells[h_idx];
                if head.is_wide_tail() {
                    continue;
                }
                let w = head.content.width();
                if hx as usize + w > x as usize {
                    self.cells[h_idx] = Cell::default();
                    for i in 1..w {
                        if let Some(t_idx) = self.index(hx + i as u16, y) {
                            if self.cells[t_idx].is_wide_tail() {
                                self.cells[t_idx] = Cell::default();
                            }
                        }
                    }
                }
                break;
            }
        }
    }

    // ========== Primitive operations ==========

    /// Set every cell to an empty glyph on the given background.
    pub fn clear(&mut self, bg: PackedRgba) {
        self.cells.fill(Cell::default().with_bg(bg));
    }

    /// Blend a color into the background of every cell in the rect.
    ///
    /// Clips to the buffer and the current clip region; fully clipped
    /// rectangles are silent no-ops. Content and foreground are preserved.
    pub fn fill_rect(&mut self, x: u16, y: u16, w: u16, h: u16, color: PackedRgba) {
        let rect = Rect::new(x, y, w, h);
        let Some(clipped) = self.current_clip().intersection_opt(&rect) else {
            return;
        };

        for cy in clipped.y..clipped.bottom() {
            let row = cy as usize * self.width as usize;
            for cx in clipped.x..clipped.right() {
                let cell = &mut self.cells[row + cx as usize];
                cell.bg = color.over(cell.bg);
            }
        }
    }

    /// Draw text as a run of grapheme clusters.
    ///
    /// - Stops (does not wrap) at the right edge of the buffer.
    /// - A wide glyph that would straddle the edge is skipped.
    /// - TAB advances to the next multiple of `tab_width` (8).
    /// - LF ends the run; callers wanting multi-line text pre-split.
    /// - Other control characters render as U+FFFD.
    /// - `bg` of `None` keeps each cell's existing background.
    ///
    /// Multi-codepoint clusters are interned into `pool` when one is given;
    /// otherwise they degrade to their first scalar, preserving width by
    /// padding with styled blanks.
    ///
    /// Returns the column after the last written glyph.
    #[allow(clippy::too_many_arguments)]
    pub fn draw_text(
        &mut self,
        pool: Option<&mut GraphemePool>,
        text: &str,
        x: u16,
        y: u16,
        fg: PackedRgba,
        bg: Option<PackedRgba>,
        attrs: CellAttrs,
    ) -> u16 {
        const TAB_WIDTH: u16 = 8;

        let mut pool = pool;
        let mut cx = x;
        if y >= self.height {
            return cx;
        }

        for grapheme in text.graphemes(true) {
            if cx >= self.width {
                break;
            }

            if grapheme == "\n" || grapheme == "\r\n" {
                break;
            }

            if grapheme == "\t" {
                let next_stop = ((cx / TAB_WIDTH) + 1) * TAB_WIDTH;
                let stop = next_stop.min(self.width);
                while cx < stop {
                    self.put_styled(cx, y, CellContent::from_char(' '), fg, bg, attrs);
                    cx += 1;
                }
                continue;
            }

            let mut chars = grapheme.chars();
            let first = match chars.next() {
                Some(c) => c,
                None => continue,
            };
            let is_control = first.is_control();
            let multi = chars.next().is_some();

            let (content, gw) = if is_control {
                (CellContent::from_char('\u{FFFD}'), 1)
            } else if multi {
                let gw = grapheme_width(grapheme).max(1);
                match pool.as_deref_mut() {
                    Some(pool) => {
                        let id = pool.intern(grapheme, gw.min(127) as u8);
                        (CellContent::from_grapheme(id), gw)
                    }
                    None => (CellContent::from_char(first), gw),
                }
            } else {
                let content = CellContent::from_char(first);
                (content, content.width().max(1))
            };

            // Wide glyph that cannot fit is skipped, and the run ends:
            // nothing to the right of it can be positioned correctly.
            if cx as usize + gw > self.width as usize {
                break;
            }

            self.put_styled(cx, y, content, fg, bg, attrs);

            // A pooled cluster wider than its stored content fills the
            // trailing columns with styled blanks via the wide-tail path
            // in `set`, except the un-pooled fallback, which pads manually.
            if content.width() < gw {
                for i in content.width().max(1)..gw {
                    self.put_styled(cx + i as u16, y, CellContent::from_char(' '), fg, bg, attrs);
                }
            }

            cx += gw as u16;
        }

        cx
    }

    fn put_styled(
        &mut self,
        x: u16,
        y: u16,
        content: CellContent,
        fg: PackedRgba,
        bg: Option<PackedRgba>,
        attrs: CellAttrs,
    ) {
        let existing_bg = self.get(x, y).map_or(PackedRgba::TRANSPARENT, |c| c.bg);
        let bg = match bg {
            Some(color) => color.over(existing_bg),
            None => existing_bg,
        };
        self.set(
            x,
            y,
            Cell {
                content,
                fg,
                bg,
                attrs,
            },
        );
    }

    /// Draw a box border, optionally filling the interior background.
    ///
    /// Where an edge lands on an existing border glyph of the same style,
    /// the two are joined by substituting the tee or cross glyph, so
    /// adjacent boxes share clean intersections.
    pub fn draw_box(
        &mut self,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
        style: BorderStyle,
        color: PackedRgba,
        fill: Option<PackedRgba>,
    ) {
        if w == 0 || h == 0 {
            return;
        }
        use line::{DOWN, LEFT, RIGHT, UP};

        let right = x.saturating_add(w - 1);
        let bottom = y.saturating_add(h - 1);

        if let Some(fill_color) = fill {
            if w > 2 && h > 2 {
                self.fill_rect(x + 1, y + 1, w - 2, h - 2, fill_color);
            }
        }

        let mut put = |buf: &mut Self, cx: u16, cy: u16, mask: u8| {
            let joined = match buf.get(cx, cy).and_then(|c| c.content.as_char()) {
                Some(existing) => mask | style.mask_of(existing),
                None => mask,
            };
            let cell = Cell {
                content: CellContent::from_char(style.glyph(joined)),
                fg: color,
                bg: buf.get(cx, cy).map_or(PackedRgba::TRANSPARENT, |c| c.bg),
                attrs: CellAttrs::NONE,
            };
            buf.set(cx, cy, cell);
        };

        // Horizontal edges
        for cx in x..=right {
            let mut top_mask = LEFT | RIGHT;
            let mut bottom_mask = LEFT | RIGHT;
            if cx == x {
                top_mask = DOWN | RIGHT;
                bottom_mask = UP | RIGHT;
            } else if cx == right {
                top_mask = DOWN | LEFT;
                bottom_mask = UP | LEFT;
            }
            if w == 1 {
                top_mask = DOWN;
                bottom_mask = UP;
            }
            put(self, cx, y, top_mask);
            if h > 1 {
                put(self, cx, bottom, bottom_mask);
            }
        }

        // Vertical edges (corners already placed)
        if h > 2 {
            for cy in y + 1..bottom {
                put(self, x, cy, UP | DOWN);
                if w > 1 {
                    put(self, right, cy, UP | DOWN);
                }
            }
        }
    }

    /// Composite another buffer onto this one at `(dst_x, dst_y)`.
    ///
    /// Foreground and background blend straight-alpha separately; source
    /// attributes overlay destination attributes when non-zero. Source
    /// cells that carry no glyph and a fully transparent background leave
    /// the destination glyph visible. The overlap is clipped to both
    /// buffers.
    pub fn blend(&mut self, src: &OptimizedBuffer, dst_x: u16, dst_y: u16) {
        let copy_w = src.width.min(self.width.saturating_sub(dst_x));
        let copy_h = src.height.min(self.height.saturating_sub(dst_y));

        for sy in 0..copy_h {
            for sx in 0..copy_w {
                let Some(&src_cell) = src.get(sx, sy) else { continue };
                let dx = dst_x + sx;
                let dy = dst_y + sy;
                let Some(&dst_cell) = self.get(dx, dy) else { continue };

                let bg = src_cell.bg.over(dst_cell.bg);

                let merged = if src_cell.is_wide_tail() {
                    Cell {
                        content: CellContent::WIDE_TAIL,
                        fg: src_cell.fg,
                        bg,
                        attrs: src_cell.attrs,
                    }
                } else if src_cell.content.is_empty() && src_cell.bg.is_transparent() {
                    // Fully transparent source cell: destination shows through.
                    continue;
                } else if src_cell.content.is_empty() {
                    Cell {
                        content: dst_cell.content,
                        fg: dst_cell.fg,
                        bg,
                        attrs: if src_cell.attrs.raw() != 0 {
                            src_cell.attrs
                        } else {
                            dst_cell.attrs
                        },
                    }
                } else {
                    Cell {
                        content: src_cell.content,
                        fg: src_cell.fg.over(dst_cell.bg),
                        bg,
                        attrs: if src_cell.attrs.raw() != 0 {
                            src_cell.attrs
                        } else {
                            dst_cell.attrs
                        },
                    }
                };

                // set() keeps wide pairs coherent across the seam. Tails
                // bypass it (set would dissolve the head just written)
                // but still honor the clip region.
                if merged.is_wide_tail() {
                    if self.current_clip().contains(dx, dy) {
                        self.set_raw(dx, dy, merged);
                    }
                } else {
                    self.set(dx, dy, merged);
                }
            }
        }
    }

    /// Reallocate to new dimensions. Content is not preserved; the caller
    /// redraws. Zero dimensions are clamped to 1.
    pub fn resize(&mut self, width: u16, height: u16) {
        let width = width.max(1);
        let height = height.max(1);
        self.width = width;
        self.height = height;
        self.cells.clear();
        self.cells
            .resize(width as usize * height as usize, Cell::default());
        self.clip_stack.clear();
        self.clip_stack.push(Rect::from_size(width, height));
    }

    /// Whether two buffers have identical dimensions and cells.
    pub fn content_eq(&self, other: &OptimizedBuffer) -> bool {
        self.width == other.width && self.height == other.height && self.cells == other.cells
    }
}

impl PartialEq for OptimizedBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.content_eq(other)
    }
}

impl Eq for OptimizedBuffer {}
