#![forbid(unsafe_code)]

//! Render kernel: cells, buffers, diffs, half-block pixels, and ANSI presentation.

pub mod ansi;
pub mod buffer;
pub mod cell;
pub mod diff;
pub mod grapheme_pool;
pub mod link_registry;
pub mod pixel;
pub mod presenter;

pub(crate) mod text_width {
    use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

    /// Display width of a single char on the terminal grid.
    ///
    /// Control characters render as the replacement glyph downstream, so
    /// they count as width 1 here; everything else defers to
    /// `unicode-width`.
    #[inline]
    pub(crate) fn char_width(ch: char) -> usize {
        if ch.is_ascii() {
            return 1;
        }
        ch.width().unwrap_or(0)
    }

    /// Display width of a grapheme cluster.
    #[inline]
    pub(crate) fn grapheme_width(grapheme: &str) -> usize {
        if grapheme.len() == 1 && grapheme.is_ascii() {
            return 1;
        }
        grapheme.width()
    }
}

pub(crate) use text_width::{char_width, grapheme_width};
