#![forbid(unsafe_code)]

//! State-tracked ANSI presentation.
//!
//! Two layers:
//!
//! - [`Presenter`] turns a diff plus the new buffer into minimal ANSI: it
//!   shadows the terminal's current style, hyperlink, and cursor position
//!   and only emits sequences that change them.
//! - [`FramePresenter`] owns the *front* (last written) and *back*
//!   (being composed) buffers, the grapheme pool and link registry, and
//!   the output sink. Each `present()` diffs back against front, hands the
//!   runs to the presenter, writes the frame bytes to the sink with a
//!   bounded retry, and swaps the buffers (a pointer swap, never a
//!   reallocation).
//!
//! # Emission discipline
//!
//! - One cursor-position per coalesced run; cells inside a run rely on the
//!   terminal's natural cursor advance.
//! - Style transitions emit the minimal SGR delta (individual off-codes,
//!   `39`/`49` for defaults) unless a full reset is estimated cheaper.
//! - Wide-tail cells are skipped: the head already advanced two columns.
//! - Truecolor downgrades to the nearest 256-color entry when the
//!   capability is absent.
//!
//! # Failure semantics
//!
//! A frame is built fully in memory, then written. Interrupted writes are
//! retried up to three times; a failed or closed sink moves the presenter
//! to a *stopped* state in which `present()` is a no-op.

use std::io::{self, Write};

use otui_core::capabilities::{Capabilities, HANDSHAKE_PROBES};

use crate::ansi;
use crate::buffer::OptimizedBuffer;
use crate::cell::{Cell, CellAttrs, PackedRgba, StyleFlags};
use crate::diff::{BufferDiff, ChangeRun};
use crate::grapheme_pool::GraphemePool;
use crate::link_registry::LinkRegistry;

/// Write retry bound for a frame flush.
const WRITE_RETRIES: usize = 3;

/// Where the hardware cursor should rest after a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorHint {
    /// Park at the origin and hide.
    #[default]
    Hidden,
    /// Place at `(x, y)` and show (the focused node's caret).
    At(u16, u16),
}

/// Counters for one presented frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PresentStats {
    /// Cells that differed between front and back.
    pub cells_changed: usize,
    /// Coalesced runs emitted.
    pub runs: usize,
    /// Bytes written to the sink.
    pub bytes_written: usize,
}

/// The style words the terminal is currently displaying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ShadowStyle {
    fg: PackedRgba,
    bg: PackedRgba,
    flags: StyleFlags,
}

impl ShadowStyle {
    fn of(cell: &Cell) -> Self {
        Self {
            fg: cell.fg,
            bg: cell.bg,
            flags: cell.attrs.flags(),
        }
    }
}

/// Shadow-state ANSI emitter.
///
/// Builds a frame's bytes into an internal buffer; the frame is flushed to
/// the sink in one contiguous write by [`FramePresenter`].
#[derive(Debug)]
pub struct Presenter {
    out: Vec<u8>,
    style: Option<ShadowStyle>,
    link: Option<u32>,
    cursor_x: Option<u16>,
    cursor_y: Option<u16>,
    caps: Capabilities,
}

impl Presenter {
    /// Create a presenter for the given capability table.
    #[must_use]
    pub fn new(caps: Capabilities) -> Self {
        Self {
            out: Vec::with_capacity(16 * 1024),
            style: None,
            link: None,
            cursor_x: None,
            cursor_y: None,
            caps,
        }
    }

    /// The capability table steering emission.
    #[inline]
    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// Replace the capability table (handshake completion).
    pub fn set_capabilities(&mut self, caps: Capabilities) {
        self.caps = caps;
    }

    /// Forget all shadowed terminal state (after a resize or an external
    /// writer touched the terminal).
    pub fn invalidate(&mut self) {
        self.style = None;
        self.link = None;
        self.cursor_x = None;
        self.cursor_y = None;
    }

    /// Emit one frame's changes into the internal byte buffer and return
    /// the bytes, leaving the presenter ready for the next frame.
    pub fn render_frame(
        &mut self,
        buffer: &OptimizedBuffer,
        runs: &[ChangeRun],
        pool: &GraphemePool,
        links: &LinkRegistry,
        cursor: CursorHint,
    ) -> Vec<u8> {
        // The cursor may have been moved by the terminal between frames
        // (wrap, scroll, user interference); anchor each frame with an
        // absolute position. Within the frame, relative moves apply.
        self.cursor_x = None;
        self.cursor_y = None;

        if self.caps.sync_output {
            let _ = ansi::sync_begin(&mut self.out);
        }

        for run in runs {
            let _ = self.emit_run(buffer, run, pool, links);
        }

        // Leave the terminal in a clean style state between frames.
        let _ = ansi::sgr_reset(&mut self.out);
        self.style = None;
        if self.link.is_some() {
            let _ = ansi::hyperlink_close(&mut self.out);
            self.link = None;
        }

        match cursor {
            CursorHint::Hidden => {
                let _ = ansi::cup(&mut self.out, 0, 0);
                let _ = ansi::cursor_hide(&mut self.out);
                self.cursor_x = Some(0);
                self.cursor_y = Some(0);
            }
            CursorHint::At(x, y) => {
                let _ = self.move_cursor(x, y);
                let _ = ansi::cursor_show(&mut self.out);
            }
        }

        if self.caps.sync_output {
            let _ = ansi::sync_end(&mut self.out);
        }

        std::mem::take(&mut self.out)
    }

    fn emit_run(
        &mut self,
        buffer: &OptimizedBuffer,
        run: &ChangeRun,
        pool: &GraphemePool,
        links: &LinkRegistry,
    ) -> io::Result<()> {
        self.move_cursor(run.x0, run.y)?;
        for x in run.x0..=run.x1 {
            let Some(cell) = buffer.get(x, run.y) else { continue };
            self.emit_cell(x, cell, pool, links)?;
        }
        Ok(())
    }

    fn emit_cell(
        &mut self,
        x: u16,
        cell: &Cell,
        pool: &GraphemePool,
        links: &LinkRegistry,
    ) -> io::Result<()> {
        // A tail whose head was emitted in this run sits behind the
        // cursor; skip it. A tail the cursor has not passed is an orphan
        // (its head lies left of the run) and must be cleared.
        let is_orphan = cell.is_wide_tail() && self.cursor_x.is_some_and(|cx| cx <= x);
        if cell.is_wide_tail() && !is_orphan {
            return Ok(());
        }
        let blank = Cell::default();
        let cell = if is_orphan { &blank } else { cell };

        self.transition_style(cell)?;
        self.transition_link(cell, links)?;

        let width = self.write_glyph(cell, pool)?;
        if let Some(cx) = self.cursor_x {
            self.cursor_x = Some(cx.saturating_add(width));
        }
        Ok(())
    }

    /// Write the glyph bytes for a cell; returns the columns advanced.
    fn write_glyph(&mut self, cell: &Cell, pool: &GraphemePool) -> io::Result<u16> {
        if let Some(id) = cell.content.grapheme_id() {
            if let Some(text) = pool.get(id) {
                self.out.write_all(text.as_bytes())?;
                return Ok(cell.content.width().max(1) as u16);
            }
            // Stale id: keep the grid aligned with replacement glyphs.
            for _ in 0..cell.content.width().max(1) {
                self.out.write_all("\u{FFFD}".as_bytes())?;
            }
            return Ok(cell.content.width().max(1) as u16);
        }

        match cell.content.as_char() {
            Some(ch) => {
                let mut buf = [0u8; 4];
                self.out.write_all(ch.encode_utf8(&mut buf).as_bytes())?;
                Ok(cell.content.width().max(1) as u16)
            }
            None => {
                // Empty cell: one space.
                self.out.write_all(b" ")?;
                Ok(1)
            }
        }
    }

    fn transition_style(&mut self, cell: &Cell) -> io::Result<()> {
        let next = ShadowStyle::of(cell);
        if self.style == Some(next) {
            return Ok(());
        }

        match self.style {
            None => self.apply_style_full(next)?,
            Some(prev) => self.apply_style_delta(prev, next)?,
        }
        self.style = Some(next);
        Ok(())
    }

    fn apply_style_full(&mut self, style: ShadowStyle) -> io::Result<()> {
        ansi::sgr_reset(&mut self.out)?;
        if !style.fg.is_transparent() {
            ansi::sgr_fg(&mut self.out, style.fg, self.caps.truecolor)?;
        }
        if !style.bg.is_transparent() {
            ansi::sgr_bg(&mut self.out, style.bg, self.caps.truecolor)?;
        }
        ansi::sgr_enable(&mut self.out, style.flags)?;
        Ok(())
    }

    fn apply_style_delta(&mut self, prev: ShadowStyle, next: ShadowStyle) -> io::Result<()> {
        let removed = prev.flags & !next.flags;
        let added = next.flags & !prev.flags;
        let fg_changed = prev.fg != next.fg;
        let bg_changed = prev.bg != next.bg;

        // Cost estimate: off-codes are 5 bytes, on-codes 4, a truecolor
        // SGR up to 19, reset 4. Fall back to reset+apply when the delta
        // would be longer.
        let color_cost = 19u32;
        let delta_cost = removed.bits().count_ones() * 5
            + added.bits().count_ones() * 4
            + u32::from(fg_changed) * color_cost
            + u32::from(bg_changed) * color_cost;
        let full_cost = 4
            + next.flags.bits().count_ones() * 4
            + u32::from(!next.fg.is_transparent()) * color_cost
            + u32::from(!next.bg.is_transparent()) * color_cost;

        if delta_cost > full_cost {
            return self.apply_style_full(next);
        }

        if !removed.is_empty() {
            let collateral = ansi::sgr_disable(&mut self.out, removed, next.flags)?;
            if !collateral.is_empty() {
                ansi::sgr_enable(&mut self.out, collateral)?;
            }
        }
        if !added.is_empty() {
            ansi::sgr_enable(&mut self.out, added)?;
        }
        if fg_changed {
            ansi::sgr_fg(&mut self.out, next.fg, self.caps.truecolor)?;
        }
        if bg_changed {
            ansi::sgr_bg(&mut self.out, next.bg, self.caps.truecolor)?;
        }
        Ok(())
    }

    fn transition_link(&mut self, cell: &Cell, links: &LinkRegistry) -> io::Result<()> {
        let next = match cell.attrs.link_id() {
            CellAttrs::NO_LINK => None,
            id => Some(id),
        };
        if self.link == next {
            return Ok(());
        }

        if self.link.is_some() {
            ansi::hyperlink_close(&mut self.out)?;
        }

        self.link = match (next, self.caps.hyperlinks) {
            (Some(id), true) => match links.get(id) {
                Some(url) => {
                    ansi::hyperlink_open(&mut self.out, url)?;
                    Some(id)
                }
                None => None,
            },
            _ => None,
        };
        Ok(())
    }

    /// Move with the cheapest sequence: nothing when already there, CUF or
    /// CHA within a row, CUP otherwise.
    fn move_cursor(&mut self, x: u16, y: u16) -> io::Result<()> {
        if self.cursor_x == Some(x) && self.cursor_y == Some(y) {
            return Ok(());
        }

        let same_row = self.cursor_y == Some(y);
        if same_row {
            let forward = self.cursor_x.filter(|&cx| x > cx).map(|cx| x - cx);
            match forward {
                Some(dx) if seq_len_cuf(dx) <= seq_len_cha(x) => {
                    ansi::cuf(&mut self.out, dx)?;
                }
                _ => ansi::cha(&mut self.out, x)?,
            }
        } else {
            ansi::cup(&mut self.out, y, x)?;
        }

        self.cursor_x = Some(x);
        self.cursor_y = Some(y);
        Ok(())
    }
}

fn digits(n: u16) -> usize {
    match n {
        0..=9 => 1,
        10..=99 => 2,
        100..=999 => 3,
        1000..=9999 => 4,
        _ => 5,
    }
}

fn seq_len_cuf(n: u16) -> usize {
    match n {
        0 => 0,
        1 => 3,
        _ => 3 + digits(n),
    }
}

fn seq_len_cha(col: u16) -> usize {
    3 + digits(col.saturating_add(1))
}

/// Double-buffered frame presenter: the process-lived pair of cell
/// buffers plus the output sink.
pub struct FramePresenter<W: Write> {
    sink: W,
    presenter: Presenter,
    front: OptimizedBuffer,
    back: OptimizedBuffer,
    pool: GraphemePool,
    links: LinkRegistry,
    cursor: CursorHint,
    /// Mode-enable bytes re-asserted on focus-in (owned by the session).
    mode_reassert: Vec<u8>,
    /// The hint the last emitted frame applied.
    applied_cursor: Option<CursorHint>,
    /// Set after a resize: the next present clears and redraws everything.
    full_redraw: bool,
    stopped: bool,
}

impl<W: Write> FramePresenter<W> {
    /// Create a presenter pair sized to the terminal.
    pub fn new(sink: W, caps: Capabilities, width: u16, height: u16) -> Self {
        Self {
            sink,
            presenter: Presenter::new(caps),
            front: OptimizedBuffer::new(width.max(1), height.max(1)),
            back: OptimizedBuffer::new(width.max(1), height.max(1)),
            pool: GraphemePool::new(),
            links: LinkRegistry::new(),
            cursor: CursorHint::Hidden,
            mode_reassert: Vec::new(),
            applied_cursor: None,
            full_redraw: true,
            stopped: false,
        }
    }

    /// The buffer the next frame is composed into.
    #[inline]
    pub fn back_mut(&mut self) -> &mut OptimizedBuffer {
        &mut self.back
    }

    /// The last presented buffer.
    #[inline]
    pub fn front(&self) -> &OptimizedBuffer {
        &self.front
    }

    /// The grapheme pool shared by compositors drawing into the back buffer.
    #[inline]
    pub fn pool_mut(&mut self) -> &mut GraphemePool {
        &mut self.pool
    }

    /// Split borrow: back buffer plus pool, for draw calls that intern.
    #[inline]
    pub fn back_and_pool(&mut self) -> (&mut OptimizedBuffer, &mut GraphemePool) {
        (&mut self.back, &mut self.pool)
    }

    /// The hyperlink registry.
    #[inline]
    pub fn links_mut(&mut self) -> &mut LinkRegistry {
        &mut self.links
    }

    /// Borrow the back buffer, grapheme pool, and link registry together
    /// for a compositing pass.
    pub fn with_frame_parts<R>(
        &mut self,
        f: impl FnOnce(&mut OptimizedBuffer, &mut GraphemePool, &mut LinkRegistry) -> R,
    ) -> R {
        f(&mut self.back, &mut self.pool, &mut self.links)
    }

    /// Current frame size.
    #[inline]
    pub fn size(&self) -> (u16, u16) {
        (self.back.width(), self.back.height())
    }

    /// Whether the sink failed and presentation is disabled.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// The capability table.
    #[inline]
    pub fn capabilities(&self) -> &Capabilities {
        self.presenter.capabilities()
    }

    /// Install handshake results.
    pub fn set_capabilities(&mut self, caps: Capabilities) {
        self.presenter.set_capabilities(caps);
    }

    /// Set where the cursor rests after each frame.
    pub fn set_cursor_hint(&mut self, hint: CursorHint) {
        self.cursor = hint;
    }

    /// Bytes to replay when the terminal regains focus (the session's
    /// enabled-mode sequences).
    pub fn set_mode_reassert_bytes(&mut self, bytes: Vec<u8>) {
        self.mode_reassert = bytes;
    }

    /// Emit the capability probes. Replies arrive through the input
    /// parser; fold them into a [`Capabilities`] value and call
    /// [`set_capabilities`](Self::set_capabilities).
    pub fn send_handshake(&mut self) -> io::Result<()> {
        if self.stopped {
            return Ok(());
        }
        self.write_with_retry(HANDSHAKE_PROBES.to_vec())
    }

    /// Re-assert terminal modes after a focus-in.
    ///
    /// Emits the stored enable sequences exactly once per call.
    pub fn reassert_modes(&mut self) -> io::Result<()> {
        if self.stopped || self.mode_reassert.is_empty() {
            return Ok(());
        }
        let bytes = self.mode_reassert.clone();
        self.write_with_retry(bytes)
    }

    /// Resize both buffers (content is lost; the caller recomposites) and
    /// schedule a full clear + redraw.
    pub fn resize(&mut self, width: u16, height: u16) {
        let (w, h) = self.size();
        if (w, h) == (width.max(1), height.max(1)) {
            return;
        }
        self.front.resize(width, height);
        self.back.resize(width, height);
        self.pool.clear();
        self.presenter.invalidate();
        self.full_redraw = true;
    }

    /// Diff, emit, flush, swap.
    ///
    /// No-op when stopped. The caller has already composed the frame into
    /// [`back_mut`](Self::back_mut).
    pub fn present(&mut self) -> io::Result<PresentStats> {
        if self.stopped {
            return Ok(PresentStats::default());
        }

        let mut prelude = Vec::new();
        if self.full_redraw {
            // The terminal content is unknown (startup or resize): clear it
            // and let the diff against a cleared front emit everything.
            let _ = ansi::erase_display(&mut prelude);
            let _ = ansi::cup(&mut prelude, 0, 0);
            self.front.clear(PackedRgba::TRANSPARENT);
            self.presenter.invalidate();
            self.full_redraw = false;
        }

        let diff = BufferDiff::compute(&self.front, &self.back);
        let runs = diff.runs();

        let mut stats = PresentStats {
            cells_changed: diff.len(),
            runs: runs.len(),
            bytes_written: 0,
        };

        // A frame with no changes, no pending clear, and an unchanged
        // cursor hint writes nothing at all.
        if runs.is_empty() && prelude.is_empty() && self.applied_cursor == Some(self.cursor) {
            std::mem::swap(&mut self.front, &mut self.back);
            return Ok(stats);
        }

        let frame = self
            .presenter
            .render_frame(&self.back, &runs, &self.pool, &self.links, self.cursor);
        self.applied_cursor = Some(self.cursor);

        let mut bytes = prelude;
        bytes.extend_from_slice(&frame);
        stats.bytes_written = bytes.len();

        self.write_with_retry(bytes)?;

        std::mem::swap(&mut self.front, &mut self.back);
        // The stale frame in `back` is two frames old; the compositor
        // clears it before drawing, so no copy is needed here.
        Ok(stats)
    }

    /// Write a frame's bytes, retrying interrupted writes. A persistent
    /// failure or a closed sink stops the presenter.
    fn write_with_retry(&mut self, bytes: Vec<u8>) -> io::Result<()> {
        let mut attempts = 0;
        loop {
            let result = self
                .sink
                .write_all(&bytes)
                .and_then(|()| self.sink.flush());
            match result {
                Ok(()) => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted && attempts < WRITE_RETRIES => {
                    attempts += 1;
                }
                Err(e) => {
                    self.stopped = true;
                    #[cfg(feature = "tracing")]
                    tracing::warn!(error = %e, "output sink failed; presenter stopped");
                    return Err(e);
                }
            }
        }
    }

    /// Consume the presenter and return the sink.
    pub fn into_sink(self) -> W {
        self.sink
    }
}
