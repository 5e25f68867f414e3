#![forbid(unsafe_code)]

//! Line-break and wrap-candidate scanning.
//!
//! Hard breaks (`\n`, `\r\n`) delimit logical lines. Soft wrap candidates
//! are the positions where a width-bounded layout is *allowed* to split a
//! logical line; the wrap cache picks the last candidate that fits.

use crate::width::scan_units;

/// Kind of a hard line break.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineBreakKind {
    /// A bare `\n`.
    Lf,
    /// A `\r\n` pair (one grapheme, one break).
    CrLf,
}

impl LineBreakKind {
    /// Bytes the break consumes.
    #[must_use]
    pub const fn len(self) -> usize {
        match self {
            Self::Lf => 1,
            Self::CrLf => 2,
        }
    }
}

/// Soft wrapping discipline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WrapMode {
    /// Split at word boundaries and after breaking punctuation.
    #[default]
    Word,
    /// Split after any grapheme.
    Char,
    /// Never split; only hard breaks produce new lines.
    None,
}

/// Punctuation after which word mode allows a split.
const BREAK_PUNCT: &[char] = &[',', '.', ';', ':', '!', '?', '/', '\\', '-'];

/// Find every hard line break as `(byte_offset, kind)`, ordered.
///
/// The offset points at the first byte of the break sequence.
#[must_use]
pub fn find_line_breaks(bytes: &[u8]) -> Vec<(usize, LineBreakKind)> {
    let mut breaks = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\r' if bytes.get(i + 1) == Some(&b'\n') => {
                breaks.push((i, LineBreakKind::CrLf));
                i += 2;
            }
            b'\n' => {
                breaks.push((i, LineBreakKind::Lf));
                i += 1;
            }
            _ => i += 1,
        }
    }
    breaks
}

/// Find soft wrap candidates as byte offsets, ordered.
///
/// Each offset is a position the line may be split *at* (the split keeps
/// `..offset` on the current visual line). Word mode places candidates at
/// whitespace-to-word transitions and after breaking punctuation; char
/// mode after every grapheme; `None` yields no soft candidates.
#[must_use]
pub fn find_wrap_breaks(bytes: &[u8], mode: WrapMode) -> Vec<usize> {
    let mut candidates = Vec::new();

    match mode {
        WrapMode::None => {}
        WrapMode::Char => {
            for unit in scan_units(bytes) {
                let end = unit.offset + unit.len;
                if end < bytes.len() {
                    candidates.push(end);
                }
            }
        }
        WrapMode::Word => {
            let mut prev_was_space = false;
            let mut prev_was_punct = false;
            for unit in scan_units(bytes) {
                let is_space = unit.text.chars().all(char::is_whitespace);

                // Transition out of a whitespace run: the word after the
                // gap may start a fresh visual line.
                if (prev_was_space && !is_space) || (prev_was_punct && !is_space) {
                    candidates.push(unit.offset);
                }

                prev_was_space = is_space;
                prev_was_punct =
                    !is_space && unit.text.chars().all(|c| BREAK_PUNCT.contains(&c));
            }
        }
    }

    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_lf_breaks() {
        let breaks = find_line_breaks(b"ab\ncd\n");
        assert_eq!(breaks, vec![(2, LineBreakKind::Lf), (5, LineBreakKind::Lf)]);
    }

    #[test]
    fn finds_crlf_as_one_break() {
        let breaks = find_line_breaks(b"a\r\nb\nc");
        assert_eq!(
            breaks,
            vec![(1, LineBreakKind::CrLf), (4, LineBreakKind::Lf)]
        );
    }

    #[test]
    fn lone_cr_is_not_a_break() {
        assert!(find_line_breaks(b"a\rb").is_empty());
    }

    #[test]
    fn no_breaks_in_plain_text() {
        assert!(find_line_breaks(b"hello world").is_empty());
    }

    #[test]
    fn char_mode_breaks_after_every_grapheme() {
        let c = find_wrap_breaks(b"abc", WrapMode::Char);
        assert_eq!(c, vec![1, 2]);
    }

    #[test]
    fn char_mode_respects_cluster_boundaries() {
        let s = "e\u{0301}x".as_bytes();
        let c = find_wrap_breaks(s, WrapMode::Char);
        // One candidate: after the full cluster, never inside it.
        assert_eq!(c, vec!["e\u{0301}".len()]);
    }

    #[test]
    fn word_mode_breaks_before_words() {
        let c = find_wrap_breaks(b"aaa bbb  ccc", WrapMode::Word);
        assert_eq!(c, vec![4, 9]);
    }

    #[test]
    fn word_mode_breaks_after_punctuation() {
        let c = find_wrap_breaks(b"a,b", WrapMode::Word);
        assert_eq!(c, vec![2]);

        let c = find_wrap_breaks(b"path/to/file", WrapMode::Word);
        assert_eq!(c, vec![5, 8]);
    }

    #[test]
    fn none_mode_has_no_candidates() {
        assert!(find_wrap_breaks(b"aaa bbb", WrapMode::None).is_empty());
    }

    #[test]
    fn candidates_are_ordered() {
        let c = find_wrap_breaks(b"one two, three/four five", WrapMode::Word);
        let mut sorted = c.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(c, sorted);
    }
}
