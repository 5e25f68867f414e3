#![forbid(unsafe_code)]

//! Terminal capability table and handshake.
//!
//! Capabilities are established once at startup from two sources:
//!
//! 1. **Environment detection** - `COLORTERM`, `TERM`, `TERM_PROGRAM`,
//!    `NO_COLOR` give a conservative baseline without touching the wire.
//! 2. **Probe replies** - the presenter emits DA1 and DECRQM queries at
//!    startup; replies come back through the input parser as
//!    [`CapabilityReply`](crate::event::CapabilityReply) events and are
//!    folded into the table with [`Capabilities::apply_reply`].
//!
//! After the handshake window closes the table is read-only: capabilities
//! never upgrade mid-session. False negatives (a supported feature left
//! off) degrade output quality; false positives corrupt it.

use std::env;

use crate::event::CapabilityReply;

/// DEC private mode number for synchronized output.
pub const MODE_SYNC_OUTPUT: u16 = 2026;
/// DEC private mode number for focus reporting.
pub const MODE_FOCUS_EVENTS: u16 = 1004;
/// DEC private mode number for bracketed paste.
pub const MODE_BRACKETED_PASTE: u16 = 2004;
/// DEC private mode number for SGR mouse encoding.
pub const MODE_SGR_MOUSE: u16 = 1006;

/// Probe sequence emitted at startup: DA1 plus DECRQM for the modes above.
///
/// DA1 (`CSI c`) is answered by effectively every terminal, so its reply
/// doubles as the handshake fence: once it arrives, every DECRQM reply the
/// terminal was going to send has already been seen.
pub const HANDSHAKE_PROBES: &[u8] =
    b"\x1b[?2026$p\x1b[?1004$p\x1b[?2004$p\x1b[?1006$p\x1b[c";

/// What the terminal can do, resolved once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// 24-bit RGB SGR sequences (38;2 / 48;2).
    pub truecolor: bool,
    /// OSC 8 hyperlinks.
    pub hyperlinks: bool,
    /// Kitty keyboard protocol.
    pub kitty_keyboard: bool,
    /// Focus in/out reporting (mode 1004).
    pub focus_events: bool,
    /// Bracketed paste (mode 2004).
    pub bracketed_paste: bool,
    /// SGR mouse encoding (mode 1006).
    pub sgr_mouse: bool,
    /// Synchronized output (mode 2026).
    pub sync_output: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::basic()
    }
}

/// Terminal programs known to support OSC 8 hyperlinks.
const HYPERLINK_TERMINALS: &[&str] = &[
    "iTerm.app",
    "WezTerm",
    "Ghostty",
    "kitty",
    "foot",
    "vscode",
];

/// Terminals known to implement the Kitty keyboard protocol.
const KITTY_KEYBOARD_TERMINALS: &[&str] = &["WezTerm", "Ghostty", "kitty", "foot", "Rio"];

impl Capabilities {
    /// Conservative baseline: 24-bit color off, everything optional off,
    /// the universally supported modes on.
    #[must_use]
    pub const fn basic() -> Self {
        Self {
            truecolor: false,
            hyperlinks: false,
            kitty_keyboard: false,
            focus_events: true,
            bracketed_paste: true,
            sgr_mouse: true,
            sync_output: false,
        }
    }

    /// Everything on. Useful in tests and headless sinks.
    #[must_use]
    pub const fn full() -> Self {
        Self {
            truecolor: true,
            hyperlinks: true,
            kitty_keyboard: true,
            focus_events: true,
            bracketed_paste: true,
            sgr_mouse: true,
            sync_output: true,
        }
    }

    /// Detect a baseline from environment variables.
    ///
    /// Deterministic for a fixed environment. `NO_COLOR` forces truecolor
    /// off; multiplexers (`TMUX`, `STY`) disable sync output because DEC
    /// 2026 passthrough is unreliable there.
    #[must_use]
    pub fn detect() -> Self {
        Self::detect_from(
            env::var("TERM").unwrap_or_default().as_str(),
            env::var("TERM_PROGRAM").unwrap_or_default().as_str(),
            env::var("COLORTERM").unwrap_or_default().as_str(),
            env::var("NO_COLOR").is_ok(),
            env::var("TMUX").is_ok() || env::var("STY").is_ok(),
        )
    }

    /// Detection core, parameterized for tests.
    #[must_use]
    pub fn detect_from(
        term: &str,
        term_program: &str,
        colorterm: &str,
        no_color: bool,
        in_mux: bool,
    ) -> Self {
        let mut caps = Self::basic();

        if term == "dumb" || term.is_empty() {
            caps.focus_events = false;
            caps.bracketed_paste = false;
            caps.sgr_mouse = false;
            return caps;
        }

        caps.truecolor =
            !no_color && (colorterm == "truecolor" || colorterm == "24bit" || term.contains("kitty"));
        caps.hyperlinks = HYPERLINK_TERMINALS.contains(&term_program) || term.contains("kitty");
        caps.kitty_keyboard =
            KITTY_KEYBOARD_TERMINALS.contains(&term_program) || term.contains("kitty");
        caps.sync_output = !in_mux
            && matches!(term_program, "WezTerm" | "Ghostty" | "Alacritty" | "kitty" | "Contour");

        caps
    }

    /// Fold a handshake reply into the table.
    ///
    /// DECRPM value 1 or 3 means the mode is set/settable; 0 means the
    /// terminal doesn't recognize it. A DA1 reply marks the handshake as
    /// answered but carries no mode information we act on beyond "the
    /// terminal speaks CSI".
    ///
    /// Returns `true` if the reply was a DA1 (the handshake fence).
    pub fn apply_reply(&mut self, reply: &CapabilityReply) -> bool {
        match reply {
            CapabilityReply::DeviceAttributes(_) => true,
            CapabilityReply::ModeReport { mode, value } => {
                let supported = matches!(value, 1 | 2 | 3 | 4);
                match *mode {
                    MODE_SYNC_OUTPUT => self.sync_output = supported,
                    MODE_FOCUS_EVENTS => self.focus_events = supported,
                    MODE_BRACKETED_PASTE => self.bracketed_paste = supported,
                    MODE_SGR_MOUSE => self.sgr_mouse = supported,
                    _ => {}
                }
                false
            }
            CapabilityReply::Osc(_) | CapabilityReply::Dcs(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_is_conservative() {
        let caps = Capabilities::basic();
        assert!(!caps.truecolor);
        assert!(!caps.hyperlinks);
        assert!(!caps.sync_output);
        assert!(caps.bracketed_paste);
    }

    #[test]
    fn detect_truecolor_from_colorterm() {
        let caps = Capabilities::detect_from("xterm-256color", "", "truecolor", false, false);
        assert!(caps.truecolor);
    }

    #[test]
    fn no_color_wins_over_colorterm() {
        let caps = Capabilities::detect_from("xterm-256color", "", "truecolor", true, false);
        assert!(!caps.truecolor);
    }

    #[test]
    fn dumb_terminal_disables_everything() {
        let caps = Capabilities::detect_from("dumb", "", "", false, false);
        assert!(!caps.truecolor);
        assert!(!caps.focus_events);
        assert!(!caps.bracketed_paste);
        assert!(!caps.sgr_mouse);
    }

    #[test]
    fn mux_disables_sync_output() {
        let caps = Capabilities::detect_from("screen-256color", "WezTerm", "truecolor", false, true);
        assert!(!caps.sync_output);
        let caps = Capabilities::detect_from("xterm-256color", "WezTerm", "truecolor", false, false);
        assert!(caps.sync_output);
    }

    #[test]
    fn mode_report_updates_table() {
        let mut caps = Capabilities::basic();
        assert!(!caps.sync_output);
        let fence = caps.apply_reply(&CapabilityReply::ModeReport {
            mode: MODE_SYNC_OUTPUT,
            value: 2,
        });
        assert!(!fence);
        assert!(caps.sync_output);

        caps.apply_reply(&CapabilityReply::ModeReport {
            mode: MODE_BRACKETED_PASTE,
            value: 0,
        });
        assert!(!caps.bracketed_paste);
    }

    #[test]
    fn da1_is_the_fence() {
        let mut caps = Capabilities::basic();
        assert!(caps.apply_reply(&CapabilityReply::DeviceAttributes(vec![62, 4])));
    }

    #[test]
    fn handshake_probe_bytes_are_ascii_and_end_with_da1() {
        assert!(HANDSHAKE_PROBES.iter().all(|&b| b < 128));
        assert!(HANDSHAKE_PROBES.ends_with(b"\x1b[c"));
    }
}
