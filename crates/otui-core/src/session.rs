#![forbid(unsafe_code)]

//! Terminal session lifecycle guard.
//!
//! RAII-based terminal lifecycle management that ensures cleanup even on
//! panic. Raw mode enter/exit goes through the platform backend; every
//! other mode toggle is an escape sequence this module owns and writes
//! itself, so the byte stream the terminal sees is fully under our control.
//!
//! # Lifecycle Guarantees
//!
//! 1. **All terminal state changes are tracked** - Each mode (raw,
//!    alt-screen, mouse, bracketed paste, focus events) has a flag.
//! 2. **Drop restores previous state** - Enabled modes are disabled in
//!    reverse order when the session is dropped.
//! 3. **Panic safety** - Cleanup is in [`Drop`] and in a panic hook, so it
//!    runs during unwinding and on aborting panics alike.
//! 4. **Signal safety** (unix) - SIGINT/SIGTERM trigger best-effort
//!    cleanup before the process exits.
//!
//! # Cleanup Order
//!
//! Focus reporting, bracketed paste, mouse reporting, cursor show,
//! alt-screen leave, raw-mode exit, flush.

use std::env;
use std::io::{self, Write};
use std::sync::OnceLock;

#[cfg(unix)]
use signal_hook::consts::signal::{SIGINT, SIGTERM};
#[cfg(unix)]
use signal_hook::iterator::Signals;

/// Alt-screen enter: `CSI ? 1049 h`.
pub const ALT_SCREEN_ENTER: &[u8] = b"\x1b[?1049h";
/// Alt-screen leave: `CSI ? 1049 l`.
pub const ALT_SCREEN_LEAVE: &[u8] = b"\x1b[?1049l";
/// Mouse reporting enable: click (1000) + drag (1002) + SGR encoding (1006).
pub const MOUSE_ENABLE: &[u8] = b"\x1b[?1000;1002;1006h";
/// Mouse reporting disable.
pub const MOUSE_DISABLE: &[u8] = b"\x1b[?1000;1002;1006l";
/// Any-motion mouse reporting enable (1003), layered on top of `MOUSE_ENABLE`.
pub const MOUSE_MOTION_ENABLE: &[u8] = b"\x1b[?1003h";
/// Any-motion mouse reporting disable.
pub const MOUSE_MOTION_DISABLE: &[u8] = b"\x1b[?1003l";
/// Focus reporting enable: `CSI ? 1004 h`.
pub const FOCUS_ENABLE: &[u8] = b"\x1b[?1004h";
/// Focus reporting disable.
pub const FOCUS_DISABLE: &[u8] = b"\x1b[?1004l";
/// Bracketed paste enable: `CSI ? 2004 h`.
pub const BRACKETED_PASTE_ENABLE: &[u8] = b"\x1b[?2004h";
/// Bracketed paste disable.
pub const BRACKETED_PASTE_DISABLE: &[u8] = b"\x1b[?2004l";
/// Show cursor.
pub const CURSOR_SHOW: &[u8] = b"\x1b[?25h";
/// Synchronized-output end, written during cleanup in case a frame was cut short.
const SYNC_END: &[u8] = b"\x1b[?2026l";
/// SGR reset, written during cleanup.
const SGR_RESET: &[u8] = b"\x1b[0m";

/// Terminal session configuration options.
///
/// All options default to `false` for maximum portability.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    /// Enter the alternate screen buffer (`CSI ? 1049 h`).
    pub alternate_screen: bool,
    /// Enable mouse reporting (1000 + 1002 + SGR 1006).
    pub mouse: bool,
    /// Also report motion with no button held (1003).
    pub mouse_motion: bool,
    /// Enable bracketed paste (2004).
    pub bracketed_paste: bool,
    /// Enable focus in/out reporting (1004).
    pub focus_events: bool,
}

/// A terminal session that manages raw mode and cleanup.
///
/// # Contract
///
/// Only one `TerminalSession` should exist at a time; the guard owns the
/// terminal's mode set exclusively. Creating the session enters raw mode.
/// Dropping it (normally or via panic) restores everything.
#[derive(Debug)]
pub struct TerminalSession {
    options: SessionOptions,
    /// Track what was actually enabled so cleanup only undoes that.
    alternate_screen_enabled: bool,
    mouse_enabled: bool,
    mouse_motion_enabled: bool,
    bracketed_paste_enabled: bool,
    focus_events_enabled: bool,
    raw_mode_entered: bool,
    #[cfg(unix)]
    signal_guard: Option<SignalGuard>,
}

impl TerminalSession {
    /// Enter raw mode and enable the requested modes.
    ///
    /// # Errors
    ///
    /// Returns an error if raw mode cannot be enabled; partially enabled
    /// modes are rolled back by `Drop`.
    pub fn new(options: SessionOptions) -> io::Result<Self> {
        install_panic_hook();

        // Create the signal guard before raw mode so a failure here does
        // not leave the terminal raw (the struct would never be fully
        // constructed and Drop would not run).
        #[cfg(unix)]
        let signal_guard = Some(SignalGuard::new()?);

        crossterm::terminal::enable_raw_mode()?;
        #[cfg(feature = "tracing")]
        tracing::info!("terminal raw mode enabled");

        let mut session = Self {
            options,
            alternate_screen_enabled: false,
            mouse_enabled: false,
            mouse_motion_enabled: false,
            bracketed_paste_enabled: false,
            focus_events_enabled: false,
            raw_mode_entered: true,
            #[cfg(unix)]
            signal_guard,
        };

        let mut stdout = io::stdout();

        if options.alternate_screen {
            stdout.write_all(ALT_SCREEN_ENTER)?;
            // Clear and home explicitly: some terminals show stale alt-screen
            // content otherwise.
            stdout.write_all(b"\x1b[2J\x1b[H")?;
            session.alternate_screen_enabled = true;
        }

        if options.mouse {
            stdout.write_all(MOUSE_ENABLE)?;
            session.mouse_enabled = true;
            if options.mouse_motion {
                stdout.write_all(MOUSE_MOTION_ENABLE)?;
                session.mouse_motion_enabled = true;
            }
        }

        if options.bracketed_paste {
            stdout.write_all(BRACKETED_PASTE_ENABLE)?;
            session.bracketed_paste_enabled = true;
        }

        if options.focus_events {
            stdout.write_all(FOCUS_ENABLE)?;
            session.focus_events_enabled = true;
        }

        stdout.flush()?;
        Ok(session)
    }

    /// Create a session object for tests without touching the real terminal.
    pub fn headless(options: SessionOptions) -> Self {
        Self {
            options,
            alternate_screen_enabled: false,
            mouse_enabled: false,
            mouse_motion_enabled: false,
            bracketed_paste_enabled: false,
            focus_events_enabled: false,
            raw_mode_entered: false,
            #[cfg(unix)]
            signal_guard: None,
        }
    }

    /// Get the current terminal size (columns, rows).
    pub fn size(&self) -> io::Result<(u16, u16)> {
        let (w, h) = crossterm::terminal::size()?;
        if w > 1 && h > 1 {
            return Ok((w, h));
        }

        // Some terminals briefly report 1x1 on startup; fall back to env.
        if let Some(size) = size_from_env() {
            return Ok(size);
        }

        Ok((w.max(2), h.max(2)))
    }

    /// Write the enable sequences for every mode this session holds.
    ///
    /// Called when the terminal regains focus: some multiplexers strip
    /// reporting modes while a pane is unfocused, so the presenter
    /// re-asserts them on focus-in.
    pub fn reassert_modes(&self, out: &mut impl Write) -> io::Result<()> {
        if self.mouse_enabled {
            out.write_all(MOUSE_ENABLE)?;
            if self.mouse_motion_enabled {
                out.write_all(MOUSE_MOTION_ENABLE)?;
            }
        }
        if self.bracketed_paste_enabled {
            out.write_all(BRACKETED_PASTE_ENABLE)?;
        }
        if self.focus_events_enabled {
            out.write_all(FOCUS_ENABLE)?;
        }
        Ok(())
    }

    /// Get the session options.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Cleanup helper (shared between drop and explicit cleanup).
    fn cleanup(&mut self) {
        #[cfg(unix)]
        let _ = self.signal_guard.take();

        let mut stdout = io::stdout();

        // End synchronized output first so any buffered content resumes.
        let _ = stdout.write_all(SYNC_END);
        let _ = stdout.write_all(SGR_RESET);

        if self.focus_events_enabled {
            let _ = stdout.write_all(FOCUS_DISABLE);
            self.focus_events_enabled = false;
        }

        if self.bracketed_paste_enabled {
            let _ = stdout.write_all(BRACKETED_PASTE_DISABLE);
            self.bracketed_paste_enabled = false;
        }

        if self.mouse_motion_enabled {
            let _ = stdout.write_all(MOUSE_MOTION_DISABLE);
            self.mouse_motion_enabled = false;
        }

        if self.mouse_enabled {
            let _ = stdout.write_all(MOUSE_DISABLE);
            self.mouse_enabled = false;
        }

        // Always show the cursor before leaving.
        let _ = stdout.write_all(CURSOR_SHOW);

        if self.alternate_screen_enabled {
            let _ = stdout.write_all(ALT_SCREEN_LEAVE);
            self.alternate_screen_enabled = false;
        }

        if self.raw_mode_entered {
            let _ = crossterm::terminal::disable_raw_mode();
            self.raw_mode_entered = false;
        }

        let _ = stdout.flush();
        #[cfg(feature = "tracing")]
        tracing::info!("terminal session restored");
    }
}

impl Drop for TerminalSession {
    fn drop(&mut self) {
        self.cleanup();
    }
}

fn size_from_env() -> Option<(u16, u16)> {
    let cols = env::var("COLUMNS").ok()?.parse::<u16>().ok()?;
    let rows = env::var("LINES").ok()?.parse::<u16>().ok()?;
    if cols > 1 && rows > 1 {
        Some((cols, rows))
    } else {
        None
    }
}

fn install_panic_hook() {
    static HOOK: OnceLock<()> = OnceLock::new();
    HOOK.get_or_init(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            best_effort_cleanup();
            previous(info);
        }));
    });
}

/// Best-effort cleanup for termination paths that skip `Drop`.
///
/// Call this before `std::process::exit` to restore terminal state when
/// unwinding won't run destructors.
pub fn best_effort_cleanup_for_exit() {
    best_effort_cleanup();
}

fn best_effort_cleanup() {
    let mut stdout = io::stdout();

    let _ = stdout.write_all(SYNC_END);
    let _ = stdout.write_all(SGR_RESET);
    let _ = stdout.write_all(FOCUS_DISABLE);
    let _ = stdout.write_all(BRACKETED_PASTE_DISABLE);
    let _ = stdout.write_all(MOUSE_MOTION_DISABLE);
    let _ = stdout.write_all(MOUSE_DISABLE);
    let _ = stdout.write_all(CURSOR_SHOW);
    let _ = stdout.write_all(ALT_SCREEN_LEAVE);
    let _ = crossterm::terminal::disable_raw_mode();
    let _ = stdout.flush();
}

#[cfg(unix)]
#[derive(Debug)]
struct SignalGuard {
    handle: signal_hook::iterator::Handle,
    thread: Option<std::thread::JoinHandle<()>>,
}

#[cfg(unix)]
impl SignalGuard {
    fn new() -> io::Result<Self> {
        let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(io::Error::other)?;
        let handle = signals.handle();
        let thread = std::thread::spawn(move || {
            for signal in signals.forever() {
                if matches!(signal, SIGINT | SIGTERM) {
                    best_effort_cleanup();
                    std::process::exit(128 + signal);
                }
            }
        });
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

#[cfg(unix)]
impl Drop for SignalGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
