#![forbid(unsafe_code)]

//! ANSI escape sequence generation.
//!
//! Pure byte generators with no state: the presenter decides *when* a
//! sequence is needed, these functions decide *what bytes* it is. Every
//! function writes into a `std::io::Write` sink so the presenter's
//! buffered writer is the single point of output.
//!
//! | Category | Sequence |
//! |----------|----------|
//! | SGR | `ESC [ n ; … m` |
//! | Cursor position | `ESC [ row ; col H` (1-based) |
//! | Column / forward | `ESC [ col G`, `ESC [ n C` |
//! | Erase | `ESC [ n J` / `ESC [ n K` |
//! | Synchronized output | `ESC [ ? 2026 h` / `l` |
//! | Hyperlink | `ESC ] 8 ; ; url ESC \` |

use std::io::{self, Write};

use crate::cell::{PackedRgba, StyleFlags};

// =============================================================================
// SGR
// =============================================================================

/// SGR reset: `CSI 0 m`.
pub const SGR_RESET: &[u8] = b"\x1b[0m";

/// Write the SGR reset sequence.
#[inline]
pub fn sgr_reset<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(SGR_RESET)
}

/// The (enable, disable) SGR codes for each style flag.
///
/// Bold and dim share disable code 22; the presenter compensates when
/// removing one while keeping the other.
const SGR_CODES: [(StyleFlags, u8, u8); 8] = [
    (StyleFlags::BOLD, 1, 22),
    (StyleFlags::DIM, 2, 22),
    (StyleFlags::ITALIC, 3, 23),
    (StyleFlags::UNDERLINE, 4, 24),
    (StyleFlags::BLINK, 5, 25),
    (StyleFlags::INVERSE, 7, 27),
    (StyleFlags::HIDDEN, 8, 28),
    (StyleFlags::STRIKETHROUGH, 9, 29),
];

/// Emit enable codes for every flag in `flags` as one SGR sequence.
///
/// Writes nothing for an empty set.
pub fn sgr_enable<W: Write>(w: &mut W, flags: StyleFlags) -> io::Result<()> {
    if flags.is_empty() {
        return Ok(());
    }

    w.write_all(b"\x1b[")?;
    let mut first = true;
    for (flag, on, _) in SGR_CODES {
        if flags.contains(flag) {
            if !first {
                w.write_all(b";")?;
            }
            write!(w, "{on}")?;
            first = false;
        }
    }
    w.write_all(b"m")
}

/// Emit disable codes for every flag in `removed`, given the flags that
/// must remain active afterwards.
///
/// Returns the flags that were collaterally disabled and need re-enabling:
/// SGR 22 clears both bold and dim, so removing one while `kept` holds the
/// other reports the survivor.
pub fn sgr_disable<W: Write>(
    w: &mut W,
    removed: StyleFlags,
    kept: StyleFlags,
) -> io::Result<StyleFlags> {
    if removed.is_empty() {
        return Ok(StyleFlags::empty());
    }

    let mut collateral = StyleFlags::empty();
    let mut emitted_22 = false;

    w.write_all(b"\x1b[")?;
    let mut first = true;
    for (flag, _, off) in SGR_CODES {
        if !removed.contains(flag) {
            continue;
        }
        if off == 22 {
            if emitted_22 {
                continue;
            }
            emitted_22 = true;
            collateral |= kept & (StyleFlags::BOLD | StyleFlags::DIM);
        }
        if !first {
            w.write_all(b";")?;
        }
        write!(w, "{off}")?;
        first = false;
    }
    w.write_all(b"m")?;

    Ok(collateral)
}

/// Truecolor foreground: `CSI 38;2;r;g;b m`.
pub fn sgr_fg_rgb<W: Write>(w: &mut W, r: u8, g: u8, b: u8) -> io::Result<()> {
    write!(w, "\x1b[38;2;{r};{g};{b}m")
}

/// Truecolor background: `CSI 48;2;r;g;b m`.
pub fn sgr_bg_rgb<W: Write>(w: &mut W, r: u8, g: u8, b: u8) -> io::Result<()> {
    write!(w, "\x1b[48;2;{r};{g};{b}m")
}

/// 256-color foreground: `CSI 38;5;n m`.
pub fn sgr_fg_256<W: Write>(w: &mut W, index: u8) -> io::Result<()> {
    write!(w, "\x1b[38;5;{index}m")
}

/// 256-color background: `CSI 48;5;n m`.
pub fn sgr_bg_256<W: Write>(w: &mut W, index: u8) -> io::Result<()> {
    write!(w, "\x1b[48;5;{index}m")
}

/// Default foreground: `CSI 39 m`.
pub fn sgr_fg_default<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(b"\x1b[39m")
}

/// Default background: `CSI 49 m`.
pub fn sgr_bg_default<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(b"\x1b[49m")
}

/// Foreground for a packed color: truecolor when available, otherwise the
/// nearest 256-color index. Transparent maps to the default foreground.
pub fn sgr_fg<W: Write>(w: &mut W, color: PackedRgba, truecolor: bool) -> io::Result<()> {
    if color.is_transparent() {
        return sgr_fg_default(w);
    }
    if truecolor {
        sgr_fg_rgb(w, color.r(), color.g(), color.b())
    } else {
        sgr_fg_256(w, rgb_to_256(color.r(), color.g(), color.b()))
    }
}

/// Background for a packed color; see [`sgr_fg`].
pub fn sgr_bg<W: Write>(w: &mut W, color: PackedRgba, truecolor: bool) -> io::Result<()> {
    if color.is_transparent() {
        return sgr_bg_default(w);
    }
    if truecolor {
        sgr_bg_rgb(w, color.r(), color.g(), color.b())
    } else {
        sgr_bg_256(w, rgb_to_256(color.r(), color.g(), color.b()))
    }
}

/// Map an RGB triplet to the nearest entry of the 256-color palette.
///
/// Near-gray colors use the 24-step grayscale ramp (232..=255); everything
/// else snaps per channel to the 6×6×6 cube (16..=231). The cube levels
/// `[0, 95, 135, 175, 215, 255]` are not uniform, so channels compare
/// against the midpoints rather than equal-width bins.
#[must_use]
pub fn rgb_to_256(r: u8, g: u8, b: u8) -> u8 {
    if r == g && g == b {
        if r < 8 {
            return 16;
        }
        if r > 248 {
            return 231;
        }
        return 232 + ((r - 8) / 10).min(23);
    }

    fn cube(v: u8) -> u8 {
        if v < 48 {
            0
        } else if v < 115 {
            1
        } else {
            (v - 35) / 40
        }
    }

    16 + 36 * cube(r) + 6 * cube(g) + cube(b)
}

// =============================================================================
// Cursor
// =============================================================================

/// Absolute cursor position: `CSI row ; col H`, 0-based in, 1-based out.
pub fn cup<W: Write>(w: &mut W, row: u16, col: u16) -> io::Result<()> {
    write!(w, "\x1b[{};{}H", row + 1, col + 1)
}

/// Column on the current row: `CSI col G`.
pub fn cha<W: Write>(w: &mut W, col: u16) -> io::Result<()> {
    write!(w, "\x1b[{}G", col + 1)
}

/// Cursor forward: `CSI n C` (`CSI C` for n = 1, nothing for n = 0).
pub fn cuf<W: Write>(w: &mut W, n: u16) -> io::Result<()> {
    match n {
        0 => Ok(()),
        1 => w.write_all(b"\x1b[C"),
        _ => write!(w, "\x1b[{n}C"),
    }
}

/// Hide cursor: `CSI ? 25 l`.
pub const CURSOR_HIDE: &[u8] = b"\x1b[?25l";
/// Show cursor: `CSI ? 25 h`.
pub const CURSOR_SHOW: &[u8] = b"\x1b[?25h";

/// Write hide cursor.
#[inline]
pub fn cursor_hide<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(CURSOR_HIDE)
}

/// Write show cursor.
#[inline]
pub fn cursor_show<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(CURSOR_SHOW)
}

// =============================================================================
// Erase and synchronized output
// =============================================================================

/// Erase the whole display: `CSI 2 J`.
pub fn erase_display<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(b"\x1b[2J")
}

/// Erase the whole current line: `CSI 2 K`.
pub fn erase_line<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(b"\x1b[2K")
}

/// Begin synchronized output: `CSI ? 2026 h`.
pub const SYNC_BEGIN: &[u8] = b"\x1b[?2026h";
/// End synchronized output: `CSI ? 2026 l`.
pub const SYNC_END: &[u8] = b"\x1b[?2026l";

/// Write synchronized-output begin.
#[inline]
pub fn sync_begin<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(SYNC_BEGIN)
}

/// Write synchronized-output end.
#[inline]
pub fn sync_end<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(SYNC_END)
}

// =============================================================================
// OSC 8 hyperlinks
// =============================================================================

/// Open a hyperlink: `OSC 8 ; ; url ST`.
pub fn hyperlink_open<W: Write>(w: &mut W, url: &str) -> io::Result<()> {
    write!(w, "\x1b]8;;{url}\x1b\\")
}

/// Close the open hyperlink: `OSC 8 ; ; ST`.
pub fn hyperlink_close<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(b"\x1b]8;;\x1b\\")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes<F: FnOnce(&mut Vec<u8>) -> io::Result<()>>(f: F) -> Vec<u8> {
        let mut out = Vec::new();
        f(&mut out).unwrap();
        out
    }

    #[test]
    fn sgr_enable_single_and_multiple() {
        assert_eq!(bytes(|w| sgr_enable(w, StyleFlags::BOLD)), b"\x1b[1m");
        assert_eq!(
            bytes(|w| sgr_enable(w, StyleFlags::BOLD | StyleFlags::ITALIC | StyleFlags::UNDERLINE)),
            b"\x1b[1;3;4m"
        );
        assert_eq!(bytes(|w| sgr_enable(w, StyleFlags::empty())), b"");
    }

    #[test]
    fn sgr_disable_emits_off_codes() {
        let mut out = Vec::new();
        let collateral =
            sgr_disable(&mut out, StyleFlags::ITALIC | StyleFlags::UNDERLINE, StyleFlags::empty())
                .unwrap();
        assert_eq!(out, b"\x1b[23;24m");
        assert!(collateral.is_empty());
    }

    #[test]
    fn sgr_disable_reports_bold_dim_collateral() {
        // Removing BOLD while DIM stays: 22 kills both, DIM is collateral.
        let mut out = Vec::new();
        let collateral = sgr_disable(&mut out, StyleFlags::BOLD, StyleFlags::DIM).unwrap();
        assert_eq!(out, b"\x1b[22m");
        assert_eq!(collateral, StyleFlags::DIM);
    }

    #[test]
    fn sgr_disable_deduplicates_code_22() {
        let mut out = Vec::new();
        let collateral = sgr_disable(
            &mut out,
            StyleFlags::BOLD | StyleFlags::DIM,
            StyleFlags::empty(),
        )
        .unwrap();
        assert_eq!(out, b"\x1b[22m");
        assert!(collateral.is_empty());
    }

    #[test]
    fn truecolor_sequences() {
        assert_eq!(bytes(|w| sgr_fg_rgb(w, 255, 128, 0)), b"\x1b[38;2;255;128;0m");
        assert_eq!(bytes(|w| sgr_bg_rgb(w, 0, 0, 0)), b"\x1b[48;2;0;0;0m");
    }

    #[test]
    fn transparent_maps_to_defaults() {
        assert_eq!(
            bytes(|w| sgr_fg(w, PackedRgba::TRANSPARENT, true)),
            b"\x1b[39m"
        );
        assert_eq!(
            bytes(|w| sgr_bg(w, PackedRgba::TRANSPARENT, true)),
            b"\x1b[49m"
        );
    }

    #[test]
    fn downgrade_uses_256_color_palette() {
        let out = bytes(|w| sgr_fg(w, PackedRgba::rgb(255, 0, 0), false));
        assert_eq!(out, format!("\x1b[38;5;{}m", rgb_to_256(255, 0, 0)).as_bytes());
    }

    #[test]
    fn rgb_to_256_grays_use_ramp() {
        assert_eq!(rgb_to_256(0, 0, 0), 16);
        assert_eq!(rgb_to_256(255, 255, 255), 231);
        assert_eq!(rgb_to_256(128, 128, 128), 232 + 12);
    }

    #[test]
    fn rgb_to_256_cube_corners() {
        assert_eq!(rgb_to_256(255, 0, 0), 16 + 36 * 5);
        assert_eq!(rgb_to_256(0, 255, 0), 16 + 6 * 5);
        assert_eq!(rgb_to_256(0, 0, 255), 16 + 5);
    }

    #[test]
    fn cup_is_one_based() {
        assert_eq!(bytes(|w| cup(w, 0, 0)), b"\x1b[1;1H");
        assert_eq!(bytes(|w| cup(w, 23, 79)), b"\x1b[24;80H");
    }

    #[test]
    fn cha_and_cuf() {
        assert_eq!(bytes(|w| cha(w, 4)), b"\x1b[5G");
        assert_eq!(bytes(|w| cuf(w, 0)), b"");
        assert_eq!(bytes(|w| cuf(w, 1)), b"\x1b[C");
        assert_eq!(bytes(|w| cuf(w, 12)), b"\x1b[12C");
    }

    #[test]
    fn hyperlink_sequences_are_st_terminated() {
        let open = bytes(|w| hyperlink_open(w, "https://example.com"));
        assert_eq!(open, b"\x1b]8;;https://example.com\x1b\\");
        assert_eq!(bytes(hyperlink_close), b"\x1b]8;;\x1b\\");
    }

    #[test]
    fn sync_constants() {
        assert_eq!(SYNC_BEGIN, b"\x1b[?2026h");
        assert_eq!(SYNC_END, b"\x1b[?2026l");
    }
}
