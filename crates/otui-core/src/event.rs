#![forbid(unsafe_code)]

//! Canonical input/event types.
//!
//! All events derive `Clone`, `PartialEq`, and `Eq` for use in tests and
//! pattern matching.
//!
//! # Design Notes
//!
//! - Mouse coordinates are 0-indexed (the wire protocols are 1-indexed)
//! - `Modifiers` use bitflags for easy combination
//! - Capability replies are surfaced as events so the handshake can run
//!   through the ordinary input path

use bitflags::bitflags;

/// Canonical input event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A keyboard event.
    Key(KeyEvent),

    /// A mouse event.
    Mouse(MouseEvent),

    /// Terminal was resized.
    Resize {
        /// New terminal width in columns.
        width: u16,
        /// New terminal height in rows.
        height: u16,
    },

    /// Paste event (from bracketed paste mode).
    Paste(PasteEvent),

    /// Focus gained or lost.
    ///
    /// `true` = focus gained, `false` = focus lost.
    Focus(bool),

    /// A terminal capability reply (DA1, DECRPM, OSC response).
    Capability(CapabilityReply),
}

/// A keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// The key code that was pressed.
    pub code: KeyCode,

    /// Modifier keys held during the event.
    pub modifiers: Modifiers,
}

impl KeyEvent {
    /// Create a new key event with no modifiers.
    #[must_use]
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::NONE,
        }
    }

    /// Create a key event with modifiers.
    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Check if this is a specific character key.
    #[must_use]
    pub fn is_char(&self, c: char) -> bool {
        matches!(self.code, KeyCode::Char(ch) if ch == c)
    }

    /// Check if Ctrl modifier is held.
    #[must_use]
    pub const fn ctrl(&self) -> bool {
        self.modifiers.contains(Modifiers::CTRL)
    }

    /// Check if Alt modifier is held.
    #[must_use]
    pub const fn alt(&self) -> bool {
        self.modifiers.contains(Modifiers::ALT)
    }

    /// Check if Shift modifier is held.
    #[must_use]
    pub const fn shift(&self) -> bool {
        self.modifiers.contains(Modifiers::SHIFT)
    }
}

/// Key codes for keyboard events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A regular character key.
    Char(char),
    /// Enter/Return key.
    Enter,
    /// Escape key.
    Escape,
    /// Backspace key.
    Backspace,
    /// Tab key.
    Tab,
    /// Shift+Tab (back-tab).
    BackTab,
    /// Delete key.
    Delete,
    /// Insert key.
    Insert,
    /// Home key.
    Home,
    /// End key.
    End,
    /// Page Up key.
    PageUp,
    /// Page Down key.
    PageDown,
    /// Up arrow key.
    Up,
    /// Down arrow key.
    Down,
    /// Left arrow key.
    Left,
    /// Right arrow key.
    Right,
    /// Function key (F1-F12).
    F(u8),
    /// Null character (Ctrl+Space or Ctrl+@).
    Null,
}

bitflags! {
    /// Modifier keys that can be held during a key or mouse event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        /// No modifiers.
        const NONE  = 0b0000;
        /// Shift key.
        const SHIFT = 0b0001;
        /// Alt/Option key.
        const ALT   = 0b0010;
        /// Control key.
        const CTRL  = 0b0100;
    }
}

impl Default for Modifiers {
    fn default() -> Self {
        Self::NONE
    }
}

/// A mouse event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MouseEvent {
    /// The type of mouse event.
    pub kind: MouseEventKind,

    /// X coordinate (0-indexed, leftmost column is 0).
    pub x: u16,

    /// Y coordinate (0-indexed, topmost row is 0).
    pub y: u16,

    /// Modifier keys held during the event.
    pub modifiers: Modifiers,
}

impl MouseEvent {
    /// Create a new mouse event.
    #[must_use]
    pub const fn new(kind: MouseEventKind, x: u16, y: u16) -> Self {
        Self {
            kind,
            x,
            y,
            modifiers: Modifiers::NONE,
        }
    }

    /// Create a mouse event with modifiers.
    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    /// Get the position as a tuple.
    #[must_use]
    pub const fn position(&self) -> (u16, u16) {
        (self.x, self.y)
    }
}

/// The type of mouse event as decoded from the wire.
///
/// Higher-level pointer kinds (drag-end, drop, over, out) are derived by the
/// event bus from the stream of these raw kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseEventKind {
    /// Mouse button pressed down.
    Down(MouseButton),
    /// Mouse button released.
    Up(MouseButton),
    /// Mouse dragged while button held.
    Drag(MouseButton),
    /// Mouse moved (no button pressed).
    Moved,
    /// Mouse wheel scrolled up.
    ScrollUp,
    /// Mouse wheel scrolled down.
    ScrollDown,
    /// Mouse wheel scrolled left.
    ScrollLeft,
    /// Mouse wheel scrolled right.
    ScrollRight,
}

impl MouseEventKind {
    /// The button involved in a down/up/drag event, if any.
    #[must_use]
    pub const fn button(&self) -> Option<MouseButton> {
        match self {
            Self::Down(b) | Self::Up(b) | Self::Drag(b) => Some(*b),
            _ => None,
        }
    }

    /// Whether this kind is a scroll event.
    #[must_use]
    pub const fn is_scroll(&self) -> bool {
        matches!(
            self,
            Self::ScrollUp | Self::ScrollDown | Self::ScrollLeft | Self::ScrollRight
        )
    }
}

/// Mouse button identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Left mouse button.
    Left,
    /// Right mouse button.
    Right,
    /// Middle mouse button (scroll wheel click).
    Middle,
}

/// A paste event from bracketed paste mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasteEvent {
    /// The pasted text content.
    pub text: String,
}

impl PasteEvent {
    /// Create a new paste event.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A capability reply parsed from the input stream during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapabilityReply {
    /// Primary Device Attributes reply: `CSI ? <params> c`.
    DeviceAttributes(Vec<u16>),
    /// DECRPM mode report: `CSI ? <mode> ; <value> $ y`.
    ModeReport {
        /// DEC private mode number that was queried.
        mode: u16,
        /// Reported setting (1 = set, 2 = reset, 0 = unrecognized).
        value: u8,
    },
    /// An OSC response body (e.g. color query or OSC 8 probe echo).
    Osc(String),
    /// A DCS response body (e.g. XTGETTCAP).
    Dcs(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_event_is_char() {
        let event = KeyEvent::new(KeyCode::Char('q'));
        assert!(event.is_char('q'));
        assert!(!event.is_char('x'));
    }

    #[test]
    fn key_event_modifiers() {
        let event = KeyEvent::new(KeyCode::Char('c')).with_modifiers(Modifiers::CTRL);
        assert!(event.ctrl());
        assert!(!event.alt());
        assert!(!event.shift());
    }

    #[test]
    fn mouse_event_position() {
        let event = MouseEvent::new(MouseEventKind::Down(MouseButton::Left), 10, 20);
        assert_eq!(event.position(), (10, 20));
    }

    #[test]
    fn mouse_kind_button_extraction() {
        assert_eq!(
            MouseEventKind::Drag(MouseButton::Middle).button(),
            Some(MouseButton::Middle)
        );
        assert_eq!(MouseEventKind::Moved.button(), None);
        assert!(MouseEventKind::ScrollUp.is_scroll());
        assert!(!MouseEventKind::Moved.is_scroll());
    }

    #[test]
    fn event_is_clone_and_eq() {
        let event = Event::Key(KeyEvent::new(KeyCode::Char('x')));
        let cloned = event.clone();
        assert_eq!(event, cloned);
    }

    #[test]
    fn capability_reply_variants() {
        let da = CapabilityReply::DeviceAttributes(vec![62, 4]);
        let rpm = CapabilityReply::ModeReport {
            mode: 2026,
            value: 2,
        };
        assert_ne!(
            Event::Capability(da),
            Event::Capability(rpm)
        );
    }
}
