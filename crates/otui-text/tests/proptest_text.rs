//! Property tests over the width and wrap subsystems.

use proptest::prelude::*;
use unicode_segmentation::UnicodeSegmentation;

use otui_text::breaks::WrapMode;
use otui_text::width::{
    calculate_text_width, find_wrap_pos_by_width, grapheme_width, EastAsianPolicy, TabPolicy,
};
use otui_text::TextBuffer;

fn tabs() -> TabPolicy {
    TabPolicy {
        width: 8,
        respect_tabs: true,
    }
}

proptest! {
    /// Total width equals the sum of grapheme widths (no tabs involved).
    #[test]
    fn width_is_sum_of_grapheme_widths(s in "\\PC*") {
        prop_assume!(!s.contains('\t'));
        let total = calculate_text_width(s.as_bytes(), tabs(), EastAsianPolicy::Narrow);
        let sum: usize = s
            .graphemes(true)
            .map(|g| grapheme_width(g, EastAsianPolicy::Narrow))
            .sum();
        prop_assert_eq!(total, sum);
    }

    /// The fitting prefix never exceeds the budget unless it is a single
    /// oversized grapheme, and always advances.
    #[test]
    fn wrap_pos_fits_and_progresses(s in "\\PC+", budget in 1usize..40) {
        let (end, width) = find_wrap_pos_by_width(
            s.as_bytes(),
            budget,
            tabs(),
            EastAsianPolicy::Narrow,
        );
        prop_assert!(end > 0, "must consume at least one grapheme");
        prop_assert!(end <= s.len());
        prop_assert!(s.is_char_boundary(end), "wrap point on a char boundary");

        let single_grapheme = s.graphemes(true).next().map_or(0, str::len) == end;
        if !single_grapheme {
            prop_assert!(width <= budget, "width {width} exceeds budget {budget}");
        }
    }

    /// Wrap round-trip: concatenating every visual row of every logical
    /// line reproduces the exact input (soft breaks insert nothing).
    #[test]
    fn wrap_round_trip(
        s in "[a-zA-Z0-9 .,!?世界éñ-]{0,200}",
        width in 1usize..30,
        mode_sel in 0u8..3,
    ) {
        let mode = match mode_sel {
            0 => WrapMode::Word,
            1 => WrapMode::Char,
            _ => WrapMode::None,
        };

        let mut buf = TextBuffer::new();
        buf.set_text(&s);
        buf.wrap_to(Some(width), mode, tabs());

        let registry = otui_style::StyleRegistry::default();
        let mut assembled = String::new();
        let mut last_row = 0usize;
        for v in 0..buf.virtual_line_count() {
            let (row, _) = buf.visual_line_to_logical(v);
            if row != last_row {
                assembled.push('\n');
                last_row = row;
            }
            for chunk in buf.line_chunks_for_visual_row(v, &registry) {
                assembled.push_str(&chunk.text);
            }
        }

        prop_assert_eq!(assembled, s);
    }

    /// Edits keep the buffer equal to the same edits applied to a plain
    /// string (single-line inserts).
    #[test]
    fn insert_matches_string_model(
        base in "[a-z ]{0,40}",
        insert in "[A-Z]{0,10}",
        at in 0usize..50,
    ) {
        let mut buf = TextBuffer::new();
        buf.set_text(&base);

        let col = at.min(base.graphemes(true).count());
        buf.insert_at(0, col, &insert);

        let mut model = String::new();
        let byte = base
            .grapheme_indices(true)
            .nth(col)
            .map_or(base.len(), |(i, _)| i);
        model.push_str(&base[..byte]);
        model.push_str(&insert);
        model.push_str(&base[byte..]);

        prop_assert_eq!(buf.text(), model);
    }
}

#[test]
fn wrap_cache_survives_interleaved_edits_and_queries() {
    let mut buf = TextBuffer::new();
    buf.set_text("alpha beta gamma delta epsilon zeta");
    buf.wrap_to(Some(12), WrapMode::Word, tabs());

    let registry = otui_style::StyleRegistry::default();
    let before = buf.virtual_line_count();
    assert!(before >= 3);

    buf.insert_at(0, 0, "PRE ");
    let after = buf.virtual_line_count();
    assert!(after >= before);

    // Every row still reassembles to the edited content.
    let mut assembled = String::new();
    for v in 0..buf.virtual_line_count() {
        for chunk in buf.line_chunks_for_visual_row(v, &registry) {
            assembled.push_str(&chunk.text);
        }
    }
    assert_eq!(assembled, "PRE alpha beta gamma delta epsilon zeta");
}
