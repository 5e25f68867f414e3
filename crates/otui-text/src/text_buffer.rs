#![forbid(unsafe_code)]

//! The styled text buffer.
//!
//! Content is a [`Rope`] of [`StyledChunk`]s. Hard line breaks are their
//! own chunks (normalized to `"\n"`) carrying the rope's newline marker,
//! which makes logical-line bookkeeping cheap:
//!
//! - line count = newline marker count + 1 (O(1))
//! - line start = marker lookup (O(log n))
//!
//! A *wrap cache* maps each logical line to its visual sub-segments for
//! the current `(wrap mode, width, tab width)`. Entries are computed
//! lazily on query and invalidated by edits from the touched line to the
//! end of the buffer. For fixed parameters the cache is a pure function
//! of the content, so recomputation is always safe.
//!
//! Columns in the public API are grapheme columns within a logical line;
//! byte offsets stay internal. Out-of-range coordinates clamp.

use std::collections::HashMap;

use unicode_segmentation::UnicodeSegmentation;

use otui_style::{Style, StyleId, StyleRegistry};

use crate::breaks::{find_wrap_breaks, WrapMode};
use crate::rope::{Metrics, Rope, Segment};
use crate::width::{
    calculate_text_width, find_wrap_pos_by_width, EastAsianPolicy, TabPolicy,
};

/// Marker variant carried by newline chunks.
const NEWLINE_MARKER: usize = 0;

/// Byte-count metric for chunk ropes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkBytes(pub usize);

impl Metrics for ChunkBytes {
    fn add(self, other: Self) -> Self {
        ChunkBytes(self.0 + other.0)
    }
    fn weight(&self) -> usize {
        self.0
    }
}

/// A run of text with one style, or a hard line break.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StyledChunk {
    /// The chunk text. `"\n"` alone marks a hard break.
    pub text: String,
    /// Style applied to the run.
    pub style: Style,
    /// Optional hyperlink URL attached to the run.
    pub link: Option<String>,
}

impl StyledChunk {
    /// A plain unstyled chunk.
    #[must_use]
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// A styled chunk.
    #[must_use]
    pub fn styled(text: impl Into<String>, style: Style) -> Self {
        Self {
            text: text.into(),
            style,
            link: None,
        }
    }

    fn newline() -> Self {
        Self::plain("\n")
    }

    fn is_newline(&self) -> bool {
        self.text == "\n"
    }
}

impl Segment for StyledChunk {
    type Metrics = ChunkBytes;
    const MARKER_VARIANTS: usize = 1;

    fn measure(&self) -> ChunkBytes {
        ChunkBytes(self.text.len())
    }
    fn marker(&self) -> Option<usize> {
        self.is_newline().then_some(NEWLINE_MARKER)
    }
    fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// A highlight overlay on part of a logical line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Highlight {
    /// First grapheme column covered (inclusive).
    pub start_col: usize,
    /// Last grapheme column covered (exclusive).
    pub end_col: usize,
    /// Style resolved through the registry at render time.
    pub style_id: StyleId,
    /// Higher priority wins where overlays overlap.
    pub priority: i32,
}

/// One styled piece of a visual row, ready for the scene graph.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualChunk {
    /// The text of the piece.
    pub text: String,
    /// Fully resolved style.
    pub style: Style,
    /// Hyperlink URL, if any.
    pub link: Option<String>,
}

/// One visual sub-segment of a logical line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct VSeg {
    /// Byte range within the logical line.
    start: usize,
    end: usize,
    /// Display width of the range.
    width: usize,
}

/// Selection endpoints in logical coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub anchor_row: usize,
    pub anchor_col: usize,
    pub focus_row: usize,
    pub focus_col: usize,
}

/// Styled, wrappable, editable text.
#[derive(Debug, Clone)]
pub struct TextBuffer {
    rope: Rope<StyledChunk>,
    wrap_mode: WrapMode,
    wrap_width: Option<usize>,
    tabs: TabPolicy,
    east_asian: EastAsianPolicy,
    /// Lazily computed visual segments per logical line; `None` = dirty.
    wrap_cache: Vec<Option<Vec<VSeg>>>,
    highlights: HashMap<usize, Vec<Highlight>>,
    selection: Option<Selection>,
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextBuffer {
    /// An empty buffer with no wrapping.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rope: Rope::new(),
            wrap_mode: WrapMode::None,
            wrap_width: None,
            tabs: TabPolicy::default(),
            east_asian: EastAsianPolicy::default(),
            wrap_cache: Vec::new(),
            highlights: HashMap::new(),
            selection: None,
        }
    }

    /// Replace the entire content with plain text.
    ///
    /// `\r\n` normalizes to `\n`; invalid control characters survive to
    /// render time where they draw as replacement glyphs.
    pub fn set_text(&mut self, text: &str) {
        self.set_styled_text(vec![StyledChunk::plain(text)]);
    }

    /// Replace the entire content with styled chunks.
    ///
    /// Chunks containing line breaks are split so breaks become their own
    /// marker chunks.
    pub fn set_styled_text(&mut self, chunks: Vec<StyledChunk>) {
        let mut segments = Vec::new();
        for chunk in chunks {
            let normalized = chunk.text.replace("\r\n", "\n");
            let mut rest = normalized.as_str();
            while let Some(pos) = rest.find('\n') {
                if pos > 0 {
                    segments.push(StyledChunk {
                        text: rest[..pos].to_string(),
                        style: chunk.style,
                        link: chunk.link.clone(),
                    });
                }
                segments.push(StyledChunk::newline());
                rest = &rest[pos + 1..];
            }
            if !rest.is_empty() {
                segments.push(StyledChunk {
                    text: rest.to_string(),
                    style: chunk.style,
                    link: chunk.link.clone(),
                });
            }
        }

        self.rope = Rope::from_slice(&segments);
        self.wrap_cache.clear();
        self.highlights.clear();
        self.selection = None;
    }

    /// Number of logical lines. An empty buffer has one (empty) line.
    #[must_use]
    pub fn line_count(&self) -> usize {
        self.rope.marker_count(NEWLINE_MARKER) as usize + 1
    }

    /// The text of one logical line (no trailing newline).
    #[must_use]
    pub fn line_text(&self, row: usize) -> String {
        let (start, end) = self.line_chunk_range(row);
        let mut out = String::new();
        for i in start..end {
            if let Some(chunk) = self.rope.get(i) {
                out.push_str(&chunk.text);
            }
        }
        out
    }

    /// Full buffer text.
    #[must_use]
    pub fn text(&self) -> String {
        self.rope
            .to_vec()
            .iter()
            .map(|c| c.text.as_str())
            .collect()
    }

    /// Chunk index range `[start, end)` of a row's content, excluding the
    /// terminating newline chunk.
    fn line_chunk_range(&self, row: usize) -> (usize, usize) {
        let row = row.min(self.line_count().saturating_sub(1));

        let start = if row == 0 {
            0
        } else {
            match self.rope.get_marker(NEWLINE_MARKER, row as u32 - 1) {
                Some((idx, _)) => idx + 1,
                None => return (0, 0),
            }
        };
        let end = match self.rope.get_marker(NEWLINE_MARKER, row as u32) {
            Some((idx, _)) => idx,
            None => self.rope.len(),
        };
        (start, end)
    }

    // ========== Wrap parameters and cache ==========

    /// Set the wrapping parameters and invalidate the wrap cache.
    pub fn wrap_to(&mut self, width: Option<usize>, mode: WrapMode, tabs: TabPolicy) {
        self.wrap_width = width;
        self.wrap_mode = mode;
        self.tabs = tabs;
        self.wrap_cache.clear();
    }

    /// Set how ambiguous-width characters measure.
    pub fn set_east_asian(&mut self, policy: EastAsianPolicy) {
        self.east_asian = policy;
        self.wrap_cache.clear();
    }

    fn ensure_cached(&mut self, row: usize) {
        let lines = self.line_count();
        if self.wrap_cache.len() != lines {
            self.wrap_cache.resize(lines, None);
        }
        if row >= lines || self.wrap_cache[row].is_some() {
            return;
        }
        let segs = self.compute_wrap(row);
        self.wrap_cache[row] = Some(segs);
    }

    /// Wrap one logical line into visual segments.
    fn compute_wrap(&self, row: usize) -> Vec<VSeg> {
        let line = self.line_text(row);
        let bytes = line.as_bytes();

        let width = match (self.wrap_width, self.wrap_mode) {
            (Some(w), WrapMode::Word | WrapMode::Char) if w > 0 => w,
            _ => {
                let w = calculate_text_width(bytes, self.tabs, self.east_asian);
                return vec![VSeg {
                    start: 0,
                    end: bytes.len(),
                    width: w,
                }];
            }
        };

        if bytes.is_empty() {
            return vec![VSeg {
                start: 0,
                end: 0,
                width: 0,
            }];
        }

        let candidates = find_wrap_breaks(bytes, self.wrap_mode);
        let mut segs = Vec::new();
        let mut start = 0usize;

        while start < bytes.len() {
            let (fit, fit_width) =
                find_wrap_pos_by_width(&bytes[start..], width, self.tabs, self.east_asian);
            let fit_end = start + fit;

            if fit_end >= bytes.len() {
                segs.push(VSeg {
                    start,
                    end: bytes.len(),
                    width: fit_width,
                });
                break;
            }

            // Word mode: back up to the last break candidate inside the
            // fitting prefix. No candidate means one unbreakable word
            // spans the whole budget; split at the width limit.
            let break_at = match self.wrap_mode {
                WrapMode::Word => candidates
                    .iter()
                    .copied()
                    .take_while(|&c| c <= fit_end)
                    .filter(|&c| c > start)
                    .last()
                    .unwrap_or(fit_end),
                _ => fit_end,
            };

            let seg_width = calculate_text_width(
                &bytes[start..break_at],
                self.tabs,
                self.east_asian,
            );
            segs.push(VSeg {
                start,
                end: break_at,
                width: seg_width,
            });
            start = break_at;
        }

        if segs.is_empty() {
            segs.push(VSeg {
                start: 0,
                end: 0,
                width: 0,
            });
        }
        segs
    }

    /// Total number of visual rows under the current wrap parameters.
    pub fn virtual_line_count(&mut self) -> usize {
        let lines = self.line_count();
        (0..lines)
            .map(|row| {
                self.ensure_cached(row);
                self.wrap_cache[row].as_ref().map_or(1, Vec::len)
            })
            .sum()
    }

    /// Map a visual row to `(logical row, byte offset of segment start)`.
    ///
    /// Clamps past-the-end visual rows to the last segment.
    pub fn visual_line_to_logical(&mut self, vrow: usize) -> (usize, usize) {
        let lines = self.line_count();
        let mut remaining = vrow;
        for row in 0..lines {
            self.ensure_cached(row);
            let count = self.wrap_cache[row].as_ref().map_or(1, Vec::len);
            if remaining < count {
                let seg = self.wrap_cache[row].as_ref().unwrap()[remaining];
                return (row, seg.start);
            }
            remaining -= count;
        }
        let last = lines.saturating_sub(1);
        self.ensure_cached(last);
        let seg = *self.wrap_cache[last].as_ref().unwrap().last().unwrap();
        (last, seg.start)
    }

    /// Map a logical `(row, grapheme column)` to `(visual row, visual col)`.
    pub fn logical_to_visual(&mut self, row: usize, col: usize) -> (usize, usize) {
        let row = row.min(self.line_count().saturating_sub(1));
        let line = self.line_text(row);
        let byte = grapheme_to_byte(&line, col);

        // Visual rows before this logical row.
        let mut vrow = 0;
        for r in 0..row {
            self.ensure_cached(r);
            vrow += self.wrap_cache[r].as_ref().map_or(1, Vec::len);
        }

        self.ensure_cached(row);
        let segs = self.wrap_cache[row].as_ref().unwrap();
        for (i, seg) in segs.iter().enumerate() {
            let is_last = i + 1 == segs.len();
            if byte < seg.end || (is_last && byte >= seg.start) {
                let vcol = calculate_text_width(
                    line.as_bytes()
                        .get(seg.start..byte.min(seg.end).max(seg.start))
                        .unwrap_or(b""),
                    self.tabs,
                    self.east_asian,
                );
                return (vrow + i, vcol);
            }
        }
        (vrow, 0)
    }

    // ========== Editing ==========

    /// Insert text at a logical position; returns the cursor after the
    /// inserted text as `(row, grapheme column)`.
    pub fn insert_at(&mut self, row: usize, col: usize, text: &str) -> (usize, usize) {
        let row = row.min(self.line_count().saturating_sub(1));
        let line = self.line_text(row);
        let col = col.min(line.graphemes(true).count());
        let byte = grapheme_to_byte(&line, col);

        let normalized = text.replace("\r\n", "\n");
        self.splice_line(row, byte, byte, &normalized);

        let inserted_lines = normalized.matches('\n').count();
        let cursor = if inserted_lines == 0 {
            (row, col + normalized.graphemes(true).count())
        } else {
            let tail = normalized.rsplit('\n').next().unwrap_or("");
            (row + inserted_lines, tail.graphemes(true).count())
        };

        self.invalidate_from(row);
        cursor
    }

    /// Delete a logical range; returns the collapsed cursor position.
    pub fn delete_range(
        &mut self,
        start_row: usize,
        start_col: usize,
        end_row: usize,
        end_col: usize,
    ) -> (usize, usize) {
        let last = self.line_count().saturating_sub(1);
        let (mut r0, mut c0) = (start_row.min(last), start_col);
        let (mut r1, mut c1) = (end_row.min(last), end_col);
        if (r1, c1) < (r0, c0) {
            std::mem::swap(&mut r0, &mut r1);
            std::mem::swap(&mut c0, &mut c1);
        }

        let line0 = self.line_text(r0);
        let line1 = self.line_text(r1);
        let b0 = grapheme_to_byte(&line0, c0.min(line0.graphemes(true).count()));
        let b1 = grapheme_to_byte(&line1, c1.min(line1.graphemes(true).count()));

        if r0 == r1 {
            self.splice_line(r0, b0.min(b1), b0.max(b1), "");
        } else {
            // Rebuild the span as: head of first line + tail of last line.
            self.splice_rows(r0, b0, r1, b1);
        }

        self.invalidate_from(r0);
        let col = byte_to_grapheme(&self.line_text(r0), b0);
        (r0, col)
    }

    /// Replace `[from_byte, to_byte)` of one logical line with `text`
    /// (which may contain newlines).
    fn splice_line(&mut self, row: usize, from_byte: usize, to_byte: usize, text: &str) {
        let (start, end) = self.line_chunk_range(row);

        // Collect the line's chunks and rebuild them around the splice.
        let old: Vec<StyledChunk> = (start..end)
            .filter_map(|i| self.rope.get(i).cloned())
            .collect();
        let rebuilt = splice_chunks(&old, from_byte, to_byte, text);

        for _ in start..end {
            self.rope.delete(start);
        }
        for (offset, chunk) in rebuilt.into_iter().enumerate() {
            self.rope.insert(start + offset, chunk);
        }
    }

    /// Delete from `(r0, b0)` through `(r1, b1)` across rows.
    fn splice_rows(&mut self, r0: usize, b0: usize, r1: usize, b1: usize) {
        let (start0, end0) = self.line_chunk_range(r0);
        let (_, end1) = self.line_chunk_range(r1);

        let head: Vec<StyledChunk> = (start0..end0)
            .filter_map(|i| self.rope.get(i).cloned())
            .collect();
        let (tail_start, _) = self.line_chunk_range(r1);
        let tail: Vec<StyledChunk> = (tail_start..end1)
            .filter_map(|i| self.rope.get(i).cloned())
            .collect();

        let head_kept = splice_chunks(&head, b0, line_bytes(&head), "");
        let tail_kept = splice_chunks(&tail, 0, b1, "");

        // Remove every chunk from the first line's start through the last
        // line's end (including the newline markers between them).
        for _ in start0..end1 {
            self.rope.delete(start0);
        }
        let mut offset = 0;
        for chunk in head_kept.into_iter().chain(tail_kept) {
            if chunk.text.is_empty() {
                continue;
            }
            self.rope.insert(start0 + offset, chunk);
            offset += 1;
        }
    }

    fn invalidate_from(&mut self, row: usize) {
        let lines = self.line_count();
        self.wrap_cache.resize(lines, None);
        for entry in self.wrap_cache.iter_mut().skip(row) {
            *entry = None;
        }
        self.wrap_cache.truncate(lines);
    }

    // ========== Highlights ==========

    /// Add a highlight overlay to a logical line.
    pub fn add_highlight(&mut self, row: usize, highlight: Highlight) {
        self.highlights.entry(row).or_default().push(highlight);
    }

    /// Remove all highlights on rows in `range`.
    pub fn clear_highlights(&mut self, range: std::ops::Range<usize>) {
        for row in range {
            self.highlights.remove(&row);
        }
    }

    // ========== Rendering ==========

    /// The styled pieces of one visual row, highlight overlays applied.
    ///
    /// This is the unit the scene graph consumes: each piece carries the
    /// final style (base chunk style merged with the winning highlight)
    /// and the chunk's hyperlink.
    pub fn line_chunks_for_visual_row(
        &mut self,
        vrow: usize,
        registry: &StyleRegistry,
    ) -> Vec<VisualChunk> {
        let (row, _) = self.visual_line_to_logical(vrow);
        self.ensure_cached(row);

        // Find which segment of `row` this visual row is.
        let mut base_vrow = 0;
        for r in 0..row {
            self.ensure_cached(r);
            base_vrow += self.wrap_cache[r].as_ref().map_or(1, Vec::len);
        }
        let segs = self.wrap_cache[row].as_ref().unwrap().clone();
        let seg = segs
            .get(vrow - base_vrow)
            .or_else(|| segs.last())
            .copied()
            .unwrap_or(VSeg {
                start: 0,
                end: 0,
                width: 0,
            });

        let highlights = self.highlights.get(&row).cloned().unwrap_or_default();
        let (start, end) = self.line_chunk_range(row);

        // Walk the line's chunks, clip to the segment's byte range, and
        // split on highlight boundaries.
        let mut out: Vec<VisualChunk> = Vec::new();
        let mut byte = 0usize;
        let mut col = 0usize;

        for i in start..end {
            let Some(chunk) = self.rope.get(i) else { continue };
            for g in chunk.text.graphemes(true) {
                let g_start = byte;
                byte += g.len();
                let g_col = col;
                col += 1;

                if g_start < seg.start || g_start >= seg.end {
                    continue;
                }

                let mut style = chunk.style;
                if let Some(hl) = winning_highlight(&highlights, g_col) {
                    style = style.merged(*registry.get(hl.style_id));
                }

                match out.last_mut() {
                    Some(last) if last.style == style && last.link == chunk.link => {
                        last.text.push_str(g);
                    }
                    _ => out.push(VisualChunk {
                        text: g.to_string(),
                        style,
                        link: chunk.link.clone(),
                    }),
                }
            }
        }

        out
    }

    // ========== Selection ==========

    /// Set the selection endpoints (logical coordinates).
    pub fn set_selection(&mut self, selection: Selection) {
        self.selection = Some(selection);
    }

    /// Clear the selection.
    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// The current selection.
    #[must_use]
    pub fn selection(&self) -> Option<Selection> {
        self.selection
    }

    /// The selected text, rows joined with `\n`.
    ///
    /// In columnar mode each covered row contributes the rectangular
    /// column span between the endpoints instead of the free-form
    /// per-line range. Nodes that present tabular content insert `\t`
    /// between their own columns when exporting.
    #[must_use]
    pub fn selected_text(&self, columnar: bool) -> String {
        let Some(sel) = self.selection else {
            return String::new();
        };

        let (mut r0, mut c0, mut r1, mut c1) = (
            sel.anchor_row,
            sel.anchor_col,
            sel.focus_row,
            sel.focus_col,
        );
        if (r1, c1) < (r0, c0) {
            std::mem::swap(&mut r0, &mut r1);
            std::mem::swap(&mut c0, &mut c1);
        }
        let last = self.line_count().saturating_sub(1);
        let r1 = r1.min(last);

        let mut parts = Vec::new();
        for row in r0..=r1 {
            let line = self.line_text(row);
            let count = line.graphemes(true).count();

            let (from, to) = if columnar {
                (c0.min(c1).min(count), c0.max(c1).min(count))
            } else if r0 == r1 {
                (c0.min(count), c1.min(count))
            } else if row == r0 {
                (c0.min(count), count)
            } else if row == r1 {
                (0, c1.min(count))
            } else {
                (0, count)
            };

            let from_b = grapheme_to_byte(&line, from);
            let to_b = grapheme_to_byte(&line, to.max(from));
            parts.push(line[from_b..to_b].to_string());
        }

        parts.join("\n")
    }
}

/// Byte offset of the `col`-th grapheme of `line` (clamped).
fn grapheme_to_byte(line: &str, col: usize) -> usize {
    line.grapheme_indices(true)
        .nth(col)
        .map_or(line.len(), |(i, _)| i)
}

/// Grapheme column containing byte offset `byte` (clamped).
fn byte_to_grapheme(line: &str, byte: usize) -> usize {
    line.grapheme_indices(true)
        .take_while(|(i, _)| *i < byte)
        .count()
}

/// Total bytes of a chunk list.
fn line_bytes(chunks: &[StyledChunk]) -> usize {
    chunks.iter().map(|c| c.text.len()).sum()
}

/// Replace the byte range `[from, to)` of a chunk list with `text`,
/// preserving chunk styles around the splice. The replacement text takes
/// the style of the chunk it lands in (or default at the line edge) and
/// is split on newlines.
fn splice_chunks(
    chunks: &[StyledChunk],
    from: usize,
    to: usize,
    text: &str,
) -> Vec<StyledChunk> {
    let mut out = Vec::new();
    let mut byte = 0usize;
    let mut insert_style = Style::EMPTY;
    let mut insert_link = None;
    let mut inserted = false;

    let mut push_text = |out: &mut Vec<StyledChunk>, style: Style, link: &Option<String>, t: &str| {
        if t.is_empty() {
            return;
        }
        out.push(StyledChunk {
            text: t.to_string(),
            style,
            link: link.clone(),
        });
    };

    for chunk in chunks {
        let len = chunk.text.len();
        let c_start = byte;
        let c_end = byte + len;
        byte = c_end;

        if c_end <= from || c_start >= to {
            // Entirely outside the removed range; but the insertion point
            // may sit at a boundary.
            if c_start >= to && !inserted && c_start >= from {
                inserted = true;
                push_splice_text(&mut out, insert_style, &insert_link, text);
            }
            push_text(&mut out, chunk.style, &chunk.link, &chunk.text);
            continue;
        }

        // Overlapping chunk: keep the parts outside [from, to).
        let keep_head = from.saturating_sub(c_start).min(len);
        let keep_tail = c_end.saturating_sub(to).min(len);

        if keep_head > 0 {
            push_text(&mut out, chunk.style, &chunk.link, &chunk.text[..keep_head]);
        }
        if !inserted {
            inserted = true;
            insert_style = chunk.style;
            insert_link = chunk.link.clone();
            push_splice_text(&mut out, insert_style, &insert_link, text);
        }
        if keep_tail > 0 {
            push_text(
                &mut out,
                chunk.style,
                &chunk.link,
                &chunk.text[len - keep_tail..],
            );
        }
    }

    if !inserted {
        push_splice_text(&mut out, insert_style, &insert_link, text);
    }

    out
}

/// Append `text` as chunks, splitting newlines into marker chunks.
fn push_splice_text(out: &mut Vec<StyledChunk>, style: Style, link: &Option<String>, text: &str) {
    let mut rest = text;
    while let Some(pos) = rest.find('\n') {
        if pos > 0 {
            out.push(StyledChunk {
                text: rest[..pos].to_string(),
                style,
                link: link.clone(),
            });
        }
        out.push(StyledChunk::newline());
        rest = &rest[pos + 1..];
    }
    if !rest.is_empty() {
        out.push(StyledChunk {
            text: rest.to_string(),
            style,
            link: link.clone(),
        });
    }
}

/// The highest-priority highlight covering `col`, if any.
fn winning_highlight(highlights: &[Highlight], col: usize) -> Option<&Highlight> {
    highlights
        .iter()
        .filter(|h| col >= h.start_col && col < h.end_col)
        .max_by_key(|h| h.priority)
}
