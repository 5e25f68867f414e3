#![forbid(unsafe_code)]

//! Input parser state machine.
//!
//! Decodes terminal input bytes into [`crate::event::Event`] values with DoS
//! protection.
//!
//! # Design
//!
//! The parser is a state machine that handles:
//! - ASCII characters and control codes
//! - UTF-8 multi-byte sequences
//! - CSI (Control Sequence Introducer) sequences
//! - SS3 (Single Shift 3) sequences
//! - OSC and DCS sequences (capability/clipboard responses)
//! - Bracketed paste mode
//! - Mouse events (SGR and legacy X10 protocols)
//! - Focus events
//! - Capability replies (DA1, DECRPM)
//!
//! # Progress guarantee
//!
//! `feed` consumes every byte handed to it; an invalid sequence is dropped
//! with at least one byte of advance, so the parser can never deadlock on
//! arbitrary input. Trailing incomplete sequences are buffered for the next
//! `feed` call.
//!
//! # DoS Protection
//!
//! Length limits are enforced on all accumulating states:
//! - CSI sequences: 256 bytes max
//! - OSC/DCS sequences: 4KB max
//! - Paste content: 1MB max

use crate::event::{
    CapabilityReply, Event, KeyCode, KeyEvent, Modifiers, MouseButton, MouseEvent, MouseEventKind,
    PasteEvent,
};

/// DoS protection: maximum CSI sequence length.
const MAX_CSI_LEN: usize = 256;

/// DoS protection: maximum OSC/DCS sequence length.
const MAX_STRING_LEN: usize = 4096;

/// DoS protection: maximum paste content length.
const MAX_PASTE_LEN: usize = 1024 * 1024;

/// Parser state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ParserState {
    /// Normal character input.
    #[default]
    Ground,
    /// After ESC (0x1B).
    Escape,
    /// After ESC [ (CSI introducer).
    Csi,
    /// Collecting CSI parameters.
    CsiParam,
    /// Ignoring an oversized CSI sequence.
    CsiIgnore,
    /// After ESC O (SS3 introducer).
    Ss3,
    /// Collecting an OSC or DCS string body.
    StringBody {
        /// Which introducer opened the string.
        kind: StringKind,
    },
    /// After ESC inside a string body (for the ESC \ terminator).
    StringEscape {
        kind: StringKind,
    },
    /// Ignoring an oversized string sequence.
    StringIgnore {
        kind: StringKind,
    },
    /// Collecting the three raw bytes of a legacy X10 mouse report.
    X10Mouse {
        /// Bytes collected so far (0..3).
        collected: u8,
    },
    /// Collecting a UTF-8 multi-byte sequence.
    Utf8 {
        /// Bytes collected so far.
        collected: u8,
        /// Total bytes expected.
        expected: u8,
    },
}

/// String-sequence introducer discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StringKind {
    Osc,
    Dcs,
}

/// Terminal input parser.
///
/// ```
/// use otui_core::input_parser::InputParser;
/// use otui_core::event::{Event, KeyCode};
///
/// let mut parser = InputParser::new();
/// let events = parser.feed(b"\x1b[A"); // Up arrow
/// assert_eq!(events.len(), 1);
/// ```
#[derive(Debug)]
pub struct InputParser {
    /// Current parser state.
    state: ParserState,
    /// Buffer for accumulating sequence bytes.
    buffer: Vec<u8>,
    /// Buffer for collecting paste content.
    paste_buffer: Vec<u8>,
    /// UTF-8 bytes collected so far.
    utf8_buffer: [u8; 4],
    /// X10 mouse payload bytes.
    x10_buffer: [u8; 3],
    /// Whether we're inside bracketed paste.
    in_paste: bool,
    /// Buttons currently held, per the event stream seen so far.
    ///
    /// Bit 0 = left, 1 = middle, 2 = right. Used to disambiguate move vs
    /// drag and to resolve X10 release reports, which don't say which
    /// button went up.
    pressed: u8,
    /// Event queued for the next iteration (allows emitting 2 events per byte).
    pending_event: Option<Event>,
}

impl Default for InputParser {
    fn default() -> Self {
        Self::new()
    }
}

impl InputParser {
    /// Create a new input parser.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ParserState::Ground,
            buffer: Vec::with_capacity(64),
            paste_buffer: Vec::new(),
            utf8_buffer: [0; 4],
            x10_buffer: [0; 3],
            in_paste: false,
            pressed: 0,
            pending_event: None,
        }
    }

    /// The set of buttons the parser currently believes are held.
    #[must_use]
    pub fn pressed_buttons(&self) -> impl Iterator<Item = MouseButton> {
        let pressed = self.pressed;
        [MouseButton::Left, MouseButton::Middle, MouseButton::Right]
            .into_iter()
            .enumerate()
            .filter(move |(i, _)| pressed & (1 << i) != 0)
            .map(|(_, b)| b)
    }

    /// Parse input bytes and return any completed events.
    pub fn feed(&mut self, input: &[u8]) -> Vec<Event> {
        let mut events = Vec::new();
        for &byte in input {
            if let Some(event) = self.process_byte(byte) {
                events.push(event);
            }
            if let Some(pending) = self.pending_event.take() {
                events.push(pending);
            }
        }
        events
    }

    /// Process a single byte and optionally return an event.
    fn process_byte(&mut self, byte: u8) -> Option<Event> {
        if self.in_paste {
            return self.process_paste_byte(byte);
        }

        match self.state {
            ParserState::Ground => self.process_ground(byte),
            ParserState::Escape => self.process_escape(byte),
            ParserState::Csi => self.process_csi(byte),
            ParserState::CsiParam => self.process_csi_param(byte),
            ParserState::CsiIgnore => self.process_csi_ignore(byte),
            ParserState::Ss3 => self.process_ss3(byte),
            ParserState::StringBody { kind } => self.process_string_body(byte, kind),
            ParserState::StringEscape { kind } => self.process_string_escape(byte, kind),
            ParserState::StringIgnore { kind } => self.process_string_ignore(byte, kind),
            ParserState::X10Mouse { collected } => self.process_x10(byte, collected),
            ParserState::Utf8 {
                collected,
                expected,
            } => self.process_utf8(byte, collected, expected),
        }
    }

    /// Process byte in ground state.
    fn process_ground(&mut self, byte: u8) -> Option<Event> {
        match byte {
            // ESC - start escape sequence
            0x1B => {
                self.state = ParserState::Escape;
                None
            }
            // NUL - Ctrl+Space or Ctrl+@
            0x00 => Some(Event::Key(KeyEvent::new(KeyCode::Null))),
            // Backspace alternate (Ctrl+H)
            0x08 => Some(Event::Key(KeyEvent::new(KeyCode::Backspace))),
            // Tab (Ctrl+I) - check before generic Ctrl range
            0x09 => Some(Event::Key(KeyEvent::new(KeyCode::Tab))),
            // Enter (Ctrl+M)
            0x0D => Some(Event::Key(KeyEvent::new(KeyCode::Enter))),
            // Other Ctrl+A through Ctrl+Z (excluding Tab and Enter)
            0x01..=0x07 | 0x0A..=0x0C | 0x0E..=0x1A => {
                let c = (byte + b'a' - 1) as char;
                Some(Event::Key(
                    KeyEvent::new(KeyCode::Char(c)).with_modifiers(Modifiers::CTRL),
                ))
            }
            // Backspace (DEL)
            0x7F => Some(Event::Key(KeyEvent::new(KeyCode::Backspace))),
            // Printable ASCII
            0x20..=0x7E => Some(Event::Key(KeyEvent::new(KeyCode::Char(byte as char)))),
            // UTF-8 lead bytes
            0xC0..=0xDF => {
                self.utf8_buffer[0] = byte;
                self.state = ParserState::Utf8 {
                    collected: 1,
                    expected: 2,
                };
                None
            }
            0xE0..=0xEF => {
                self.utf8_buffer[0] = byte;
                self.state = ParserState::Utf8 {
                    collected: 1,
                    expected: 3,
                };
                None
            }
            0xF0..=0xF7 => {
                self.utf8_buffer[0] = byte;
                self.state = ParserState::Utf8 {
                    collected: 1,
                    expected: 4,
                };
                None
            }
            // Invalid or ignored bytes
            _ => None,
        }
    }

    /// Process byte after ESC.
    fn process_escape(&mut self, byte: u8) -> Option<Event> {
        match byte {
            // CSI introducer
            b'[' => {
                self.state = ParserState::Csi;
                self.buffer.clear();
                None
            }
            // SS3 introducer
            b'O' => {
                self.state = ParserState::Ss3;
                None
            }
            // OSC introducer
            b']' => {
                self.state = ParserState::StringBody {
                    kind: StringKind::Osc,
                };
                self.buffer.clear();
                None
            }
            // DCS introducer
            b'P' => {
                self.state = ParserState::StringBody {
                    kind: StringKind::Dcs,
                };
                self.buffer.clear();
                None
            }
            // ESC ESC - Alt+Escape
            0x1B => {
                self.state = ParserState::Ground;
                Some(Event::Key(
                    KeyEvent::new(KeyCode::Escape).with_modifiers(Modifiers::ALT),
                ))
            }
            // Alt+char
            0x20..=0x7E => {
                self.state = ParserState::Ground;
                Some(Event::Key(
                    KeyEvent::new(KeyCode::Char(byte as char)).with_modifiers(Modifiers::ALT),
                ))
            }
            // Invalid - return to ground
            _ => {
                self.state = ParserState::Ground;
                None
            }
        }
    }

    /// Process byte at start of CSI sequence.
    fn process_csi(&mut self, byte: u8) -> Option<Event> {
        // Robustness: ESC restarts sequence
        if byte == 0x1B {
            self.state = ParserState::Escape;
            self.buffer.clear();
            return None;
        }

        // `CSI M` with no parameters is the X10 mouse introducer: the next
        // three bytes are a raw binary payload, not CSI parameter bytes.
        if byte == b'M' {
            self.state = ParserState::X10Mouse { collected: 0 };
            return None;
        }

        self.buffer.push(byte);

        match byte {
            // Parameter bytes (0x30-0x3F) and intermediate bytes (0x20-0x2F)
            0x20..=0x3F => {
                self.state = ParserState::CsiParam;
                None
            }
            // Final byte (0x40-0x7E) - parse and return
            0x40..=0x7E => {
                self.state = ParserState::Ground;
                self.parse_csi_sequence()
            }
            // Invalid
            _ => {
                self.state = ParserState::Ground;
                self.buffer.clear();
                None
            }
        }
    }

    /// Process byte while collecting CSI parameters.
    fn process_csi_param(&mut self, byte: u8) -> Option<Event> {
        if byte == 0x1B {
            self.state = ParserState::Escape;
            self.buffer.clear();
            return None;
        }

        if self.buffer.len() >= MAX_CSI_LEN {
            self.state = ParserState::CsiIgnore;
            self.buffer.clear();
            return None;
        }

        self.buffer.push(byte);

        match byte {
            0x20..=0x3F => None,
            0x40..=0x7E => {
                self.state = ParserState::Ground;
                self.parse_csi_sequence()
            }
            _ => {
                self.state = ParserState::Ground;
                self.buffer.clear();
                None
            }
        }
    }

    /// Ignore bytes until end of CSI sequence.
    fn process_csi_ignore(&mut self, byte: u8) -> Option<Event> {
        if byte == 0x1B {
            self.state = ParserState::Escape;
            return None;
        }

        if let 0x40..=0x7E = byte {
            self.state = ParserState::Ground;
        }
        None
    }

    /// Parse a complete CSI sequence from the buffer.
    fn parse_csi_sequence(&mut self) -> Option<Event> {
        let seq = std::mem::take(&mut self.buffer);
        if seq.is_empty() {
            return None;
        }

        let final_byte = *seq.last()?;
        let params = &seq[..seq.len() - 1];

        match (params, final_byte) {
            // Focus events
            ([], b'I') => return Some(Event::Focus(true)),
            ([], b'O') => return Some(Event::Focus(false)),

            // Bracketed paste
            (b"200", b'~') => {
                self.in_paste = true;
                self.paste_buffer.clear();
                return None;
            }
            // A stray paste terminator: the real one is consumed inside
            // paste collection, so this CSI can only arrive outside paste
            // mode. Drop it.
            (b"201", b'~') => return None,

            // SGR mouse protocol
            _ if params.starts_with(b"<") && (final_byte == b'M' || final_byte == b'm') => {
                return self.parse_sgr_mouse(params, final_byte);
            }

            // Primary Device Attributes reply: CSI ? ... c
            _ if params.starts_with(b"?") && final_byte == b'c' => {
                return parse_da_reply(&params[1..]);
            }

            // DECRPM mode report: CSI ? mode ; value $ y
            _ if params.starts_with(b"?") && params.ends_with(b"$") && final_byte == b'y' => {
                return parse_mode_report(&params[1..params.len() - 1]);
            }

            _ => {}
        }

        // Arrow keys and other CSI key sequences
        match final_byte {
            b'A' => Some(Event::Key(key_with_modifiers(KeyCode::Up, params))),
            b'B' => Some(Event::Key(key_with_modifiers(KeyCode::Down, params))),
            b'C' => Some(Event::Key(key_with_modifiers(KeyCode::Right, params))),
            b'D' => Some(Event::Key(key_with_modifiers(KeyCode::Left, params))),
            b'H' => Some(Event::Key(key_with_modifiers(KeyCode::Home, params))),
            b'F' => Some(Event::Key(key_with_modifiers(KeyCode::End, params))),
            b'Z' => Some(Event::Key(key_with_modifiers(KeyCode::BackTab, params))),
            b'~' => parse_csi_tilde(params),
            b'u' => parse_kitty_keyboard(params),
            _ => None,
        }
    }

    /// Parse SGR mouse protocol events.
    fn parse_sgr_mouse(&mut self, params: &[u8], final_byte: u8) -> Option<Event> {
        // Format: CSI < button ; x ; y M|m  (skip the leading '<')
        let params = &params[1..];
        let s = std::str::from_utf8(params).ok()?;
        let mut parts = s.split(';');

        let button_code: u16 = parts.next()?.parse().ok()?;
        let x: u16 = parts.next()?.parse().ok()?;
        let y: u16 = parts.next()?.parse().ok()?;

        let (button, mods) = decode_mouse_button(button_code);

        let kind = if final_byte == b'M' {
            if button_code & 64 != 0 {
                // Scroll: bit 6 set; bits 0-1 give direction
                match button_code & 3 {
                    0 => MouseEventKind::ScrollUp,
                    1 => MouseEventKind::ScrollDown,
                    2 => MouseEventKind::ScrollLeft,
                    _ => MouseEventKind::ScrollRight,
                }
            } else if button_code & 32 != 0 {
                // Motion: bit 5 set; bits 0-1 == 3 means no button held
                if button_code & 3 == 3 {
                    if self.pressed == 0 {
                        MouseEventKind::Moved
                    } else {
                        // Some terminals report drag with the no-button code;
                        // the pressed set disambiguates.
                        MouseEventKind::Drag(self.first_pressed())
                    }
                } else {
                    MouseEventKind::Drag(button)
                }
            } else {
                self.note_down(button);
                MouseEventKind::Down(button)
            }
        } else {
            self.note_up(button);
            MouseEventKind::Up(button)
        };

        Some(Event::Mouse(MouseEvent {
            kind,
            x: x.saturating_sub(1), // 1-based on the wire
            y: y.saturating_sub(1),
            modifiers: mods,
        }))
    }

    /// Collect the three raw payload bytes of an X10 mouse report.
    fn process_x10(&mut self, byte: u8, collected: u8) -> Option<Event> {
        self.x10_buffer[collected as usize] = byte;
        let collected = collected + 1;
        if collected < 3 {
            self.state = ParserState::X10Mouse { collected };
            return None;
        }

        self.state = ParserState::Ground;
        let [cb, cx, cy] = self.x10_buffer;

        // All payload bytes are offset by 32; coordinates are additionally
        // 1-based. A byte below 32 is a malformed report: drop it.
        if cb < 32 || cx < 32 || cy < 32 {
            return None;
        }

        let code = (cb - 32) as u16;
        let x = (cx - 32) as u16;
        let y = (cy - 32) as u16;
        let (button, mods) = decode_mouse_button(code);

        let kind = if code & 64 != 0 {
            match code & 3 {
                0 => MouseEventKind::ScrollUp,
                1 => MouseEventKind::ScrollDown,
                2 => MouseEventKind::ScrollLeft,
                _ => MouseEventKind::ScrollRight,
            }
        } else if code & 3 == 3 {
            // X10 reports releases as button code 3 without saying which
            // button went up; resolve from the pressed set.
            if self.pressed == 0 {
                if code & 32 != 0 {
                    MouseEventKind::Moved
                } else {
                    MouseEventKind::Up(MouseButton::Left)
                }
            } else {
                let released = self.first_pressed();
                if code & 32 != 0 {
                    MouseEventKind::Moved
                } else {
                    self.note_up(released);
                    MouseEventKind::Up(released)
                }
            }
        } else if code & 32 != 0 {
            MouseEventKind::Drag(button)
        } else {
            self.note_down(button);
            MouseEventKind::Down(button)
        };

        Some(Event::Mouse(MouseEvent {
            kind,
            x: x.saturating_sub(1),
            y: y.saturating_sub(1),
            modifiers: mods,
        }))
    }

    fn note_down(&mut self, button: MouseButton) {
        self.pressed |= button_bit(button);
    }

    fn note_up(&mut self, button: MouseButton) {
        self.pressed &= !button_bit(button);
    }

    fn first_pressed(&self) -> MouseButton {
        if self.pressed & 0b001 != 0 {
            MouseButton::Left
        } else if self.pressed & 0b010 != 0 {
            MouseButton::Middle
        } else {
            MouseButton::Right
        }
    }

    /// Process SS3 (ESC O) sequences.
    fn process_ss3(&mut self, byte: u8) -> Option<Event> {
        if byte == 0x1B {
            self.state = ParserState::Escape;
            return None;
        }

        self.state = ParserState::Ground;

        let code = match byte {
            b'P' => KeyCode::F(1),
            b'Q' => KeyCode::F(2),
            b'R' => KeyCode::F(3),
            b'S' => KeyCode::F(4),
            b'A' => KeyCode::Up,
            b'B' => KeyCode::Down,
            b'C' => KeyCode::Right,
            b'D' => KeyCode::Left,
            b'H' => KeyCode::Home,
            b'F' => KeyCode::End,
            _ => return None,
        };

        Some(Event::Key(KeyEvent::new(code)))
    }

    /// Process an OSC/DCS string body byte.
    fn process_string_body(&mut self, byte: u8, kind: StringKind) -> Option<Event> {
        // ESC may begin the ST terminator (ESC \)
        if byte == 0x1B {
            self.state = ParserState::StringEscape { kind };
            return None;
        }

        if self.buffer.len() >= MAX_STRING_LEN {
            self.state = ParserState::StringIgnore { kind };
            self.buffer.clear();
            return None;
        }

        // BEL also terminates OSC strings
        if byte == 0x07 && kind == StringKind::Osc {
            self.state = ParserState::Ground;
            return self.finish_string(kind);
        }

        self.buffer.push(byte);
        None
    }

    /// Process ESC inside an OSC/DCS body (checking for ST).
    fn process_string_escape(&mut self, byte: u8, kind: StringKind) -> Option<Event> {
        if byte == b'\\' {
            self.state = ParserState::Ground;
            self.finish_string(kind)
        } else if byte == 0x1B {
            // ESC ESC: the first ESC cancelled the string, the second starts
            // a new sequence.
            self.buffer.clear();
            self.state = ParserState::Escape;
            None
        } else {
            // The ESC cancelled the string; reparse this byte as the start
            // of a new escape sequence.
            self.buffer.clear();
            self.state = ParserState::Escape;
            self.process_escape(byte)
        }
    }

    /// Ignore string bytes until a terminator.
    fn process_string_ignore(&mut self, byte: u8, kind: StringKind) -> Option<Event> {
        match byte {
            0x07 if kind == StringKind::Osc => {
                self.state = ParserState::Ground;
                None
            }
            0x1B => {
                self.state = ParserState::StringEscape { kind };
                self.buffer.clear();
                None
            }
            _ => None,
        }
    }

    /// Surface a completed OSC/DCS body as a capability reply.
    fn finish_string(&mut self, kind: StringKind) -> Option<Event> {
        let seq = std::mem::take(&mut self.buffer);
        if seq.is_empty() {
            return None;
        }
        let body = String::from_utf8_lossy(&seq).into_owned();
        let reply = match kind {
            StringKind::Osc => CapabilityReply::Osc(body),
            StringKind::Dcs => CapabilityReply::Dcs(body),
        };
        Some(Event::Capability(reply))
    }

    /// Collect paste content until the closing `CSI 201 ~`.
    fn process_paste_byte(&mut self, byte: u8) -> Option<Event> {
        // Watch for ESC [ 2 0 1 ~ inside the paste stream. We stage
        // candidate terminator bytes in `buffer` so partial matches can be
        // flushed back into the paste content.
        const END: &[u8] = b"\x1b[201~";

        if byte == END[self.buffer.len()] {
            self.buffer.push(byte);
            if self.buffer.len() == END.len() {
                self.buffer.clear();
                self.in_paste = false;
                let content = String::from_utf8_lossy(&self.paste_buffer).into_owned();
                self.paste_buffer.clear();
                return Some(Event::Paste(PasteEvent::new(content)));
            }
            return None;
        }

        // Partial terminator match failed: the staged bytes were content.
        if !self.buffer.is_empty() {
            let staged = std::mem::take(&mut self.buffer);
            self.paste_buffer.extend_from_slice(&staged);
            // The failing byte may itself start a fresh terminator.
            if byte == END[0] {
                self.buffer.push(byte);
                return None;
            }
        }

        if self.paste_buffer.len() >= MAX_PASTE_LEN {
            // Oversized paste: drop further content, keep scanning for the
            // terminator.
            return None;
        }

        self.paste_buffer.push(byte);
        None
    }

    /// Process UTF-8 continuation bytes.
    fn process_utf8(&mut self, byte: u8, collected: u8, expected: u8) -> Option<Event> {
        // Check for valid continuation byte
        if (byte & 0xC0) != 0x80 {
            // Invalid: emit a replacement character for the aborted sequence
            // and re-process the unexpected byte from ground.
            self.state = ParserState::Ground;
            self.pending_event = self.process_ground(byte);
            return Some(Event::Key(KeyEvent::new(KeyCode::Char(
                std::char::REPLACEMENT_CHARACTER,
            ))));
        }

        self.utf8_buffer[collected as usize] = byte;
        let new_collected = collected + 1;

        if new_collected == expected {
            self.state = ParserState::Ground;
            let s = std::str::from_utf8(&self.utf8_buffer[..expected as usize]).ok()?;
            let c = s.chars().next()?;
            Some(Event::Key(KeyEvent::new(KeyCode::Char(c))))
        } else {
            self.state = ParserState::Utf8 {
                collected: new_collected,
                expected,
            };
            None
        }
    }
}

/// Parse CSI sequences ending in `~`.
fn parse_csi_tilde(params: &[u8]) -> Option<Event> {
    let num = parse_first_param(params)?;
    let mods = parse_modifier_param(params);

    let code = match num {
        1 => KeyCode::Home,
        2 => KeyCode::Insert,
        3 => KeyCode::Delete,
        4 => KeyCode::End,
        5 => KeyCode::PageUp,
        6 => KeyCode::PageDown,
        15 => KeyCode::F(5),
        17 => KeyCode::F(6),
        18 => KeyCode::F(7),
        19 => KeyCode::F(8),
        20 => KeyCode::F(9),
        21 => KeyCode::F(10),
        23 => KeyCode::F(11),
        24 => KeyCode::F(12),
        _ => return None,
    };

    Some(Event::Key(KeyEvent::new(code).with_modifiers(mods)))
}

/// Parse Kitty keyboard protocol `CSI u` sequences.
///
/// Format: `CSI unicode-key-code:alts ; modifiers:event-type u`.
/// Release events (event-type 3) are dropped.
fn parse_kitty_keyboard(params: &[u8]) -> Option<Event> {
    let s = std::str::from_utf8(params).ok()?;
    if s.is_empty() {
        return None;
    }

    let mut parts = s.split(';');
    let key_part = parts.next().unwrap_or("");
    let key_code: u32 = key_part.split(':').next().unwrap_or("").parse().ok()?;

    let mod_part = parts.next().unwrap_or("");
    let mut mod_parts = mod_part.split(':');
    let mod_value: u32 = mod_parts.next().and_then(|v| v.parse().ok()).unwrap_or(1);
    let kind_value: u32 = mod_parts.next().and_then(|v| v.parse().ok()).unwrap_or(1);
    if kind_value == 3 {
        return None;
    }
    let modifiers = modifiers_from_xterm(mod_value);

    let code = match key_code {
        9 => KeyCode::Tab,
        13 => KeyCode::Enter,
        27 => KeyCode::Escape,
        8 | 127 => KeyCode::Backspace,
        57_350 => KeyCode::Left,
        57_351 => KeyCode::Right,
        57_352 => KeyCode::Up,
        57_353 => KeyCode::Down,
        57_354 => KeyCode::PageUp,
        57_355 => KeyCode::PageDown,
        57_356 => KeyCode::Home,
        57_357 => KeyCode::End,
        57_364..=57_375 => KeyCode::F((key_code - 57_364 + 1) as u8),
        57_344..=63_743 => return None,
        _ => KeyCode::Char(char::from_u32(key_code)?),
    };

    Some(Event::Key(KeyEvent::new(code).with_modifiers(modifiers)))
}

/// Parse a DA1 reply body (`62;4` from `CSI ? 62 ; 4 c`).
fn parse_da_reply(params: &[u8]) -> Option<Event> {
    let s = std::str::from_utf8(params).ok()?;
    let attrs: Vec<u16> = s.split(';').filter_map(|p| p.parse().ok()).collect();
    Some(Event::Capability(CapabilityReply::DeviceAttributes(attrs)))
}

/// Parse a DECRPM body (`2026;2` from `CSI ? 2026 ; 2 $ y`).
fn parse_mode_report(params: &[u8]) -> Option<Event> {
    let s = std::str::from_utf8(params).ok()?;
    let mut parts = s.split(';');
    let mode: u16 = parts.next()?.parse().ok()?;
    let value: u8 = parts.next()?.parse().ok()?;
    Some(Event::Capability(CapabilityReply::ModeReport { mode, value }))
}

/// Parse the first numeric parameter from CSI params.
fn parse_first_param(params: &[u8]) -> Option<u32> {
    let s = std::str::from_utf8(params).ok()?;
    s.split(';').next()?.parse().ok()
}

/// Parse modifier parameter (second param in CSI key sequences).
fn parse_modifier_param(params: &[u8]) -> Modifiers {
    let Ok(s) = std::str::from_utf8(params) else {
        return Modifiers::NONE;
    };

    let modifier_value: u32 = s
        .split(';')
        .nth(1)
        .and_then(|p| p.parse().ok())
        .unwrap_or(1);

    modifiers_from_xterm(modifier_value)
}

/// xterm modifier encoding: value = 1 + modifier bits (Shift=1, Alt=2, Ctrl=4).
fn modifiers_from_xterm(value: u32) -> Modifiers {
    let bits = value.saturating_sub(1);
    let mut mods = Modifiers::NONE;
    if bits & 1 != 0 {
        mods |= Modifiers::SHIFT;
    }
    if bits & 2 != 0 {
        mods |= Modifiers::ALT;
    }
    if bits & 4 != 0 {
        mods |= Modifiers::CTRL;
    }
    mods
}

/// Create a key event with modifiers from CSI params.
fn key_with_modifiers(code: KeyCode, params: &[u8]) -> KeyEvent {
    KeyEvent::new(code).with_modifiers(parse_modifier_param(params))
}

/// Decode an SGR/X10 mouse button code to button and modifiers.
fn decode_mouse_button(code: u16) -> (MouseButton, Modifiers) {
    let button = match code & 0b11 {
        0 => MouseButton::Left,
        1 => MouseButton::Middle,
        2 => MouseButton::Right,
        _ => MouseButton::Left,
    };

    let mut mods = Modifiers::NONE;
    if code & 4 != 0 {
        mods |= Modifiers::SHIFT;
    }
    if code & 8 != 0 {
        mods |= Modifiers::ALT;
    }
    if code & 16 != 0 {
        mods |= Modifiers::CTRL;
    }

    (button, mods)
}

fn button_bit(button: MouseButton) -> u8 {
    match button {
        MouseButton::Left => 0b001,
        MouseButton::Middle => 0b010,
        MouseButton::Right => 0b100,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_one(bytes: &[u8]) -> Event {
        let mut parser = InputParser::new();
        let events = parser.feed(bytes);
        assert_eq!(events.len(), 1, "expected one event from {bytes:?}");
        events.into_iter().next().unwrap()
    }

    #[test]
    fn plain_ascii_chars() {
        let mut parser = InputParser::new();
        let events = parser.feed(b"ab");
        assert_eq!(
            events,
            vec![
                Event::Key(KeyEvent::new(KeyCode::Char('a'))),
                Event::Key(KeyEvent::new(KeyCode::Char('b'))),
            ]
        );
    }

    #[test]
    fn ctrl_chars() {
        assert_eq!(
            feed_one(&[0x03]),
            Event::Key(KeyEvent::new(KeyCode::Char('c')).with_modifiers(Modifiers::CTRL))
        );
        assert_eq!(feed_one(&[0x09]), Event::Key(KeyEvent::new(KeyCode::Tab)));
        assert_eq!(feed_one(&[0x0D]), Event::Key(KeyEvent::new(KeyCode::Enter)));
    }

    #[test]
    fn arrow_keys() {
        assert_eq!(feed_one(b"\x1b[A"), Event::Key(KeyEvent::new(KeyCode::Up)));
        assert_eq!(
            feed_one(b"\x1bOB"),
            Event::Key(KeyEvent::new(KeyCode::Down))
        );
    }

    #[test]
    fn arrow_with_modifiers() {
        // CSI 1;5C = Ctrl+Right
        assert_eq!(
            feed_one(b"\x1b[1;5C"),
            Event::Key(KeyEvent::new(KeyCode::Right).with_modifiers(Modifiers::CTRL))
        );
    }

    #[test]
    fn alt_letter() {
        assert_eq!(
            feed_one(b"\x1bx"),
            Event::Key(KeyEvent::new(KeyCode::Char('x')).with_modifiers(Modifiers::ALT))
        );
    }

    #[test]
    fn utf8_multibyte() {
        assert_eq!(
            feed_one("é".as_bytes()),
            Event::Key(KeyEvent::new(KeyCode::Char('é')))
        );
        assert_eq!(
            feed_one("世".as_bytes()),
            Event::Key(KeyEvent::new(KeyCode::Char('世')))
        );
        assert_eq!(
            feed_one("🎉".as_bytes()),
            Event::Key(KeyEvent::new(KeyCode::Char('🎉')))
        );
    }

    #[test]
    fn utf8_invalid_continuation_emits_replacement() {
        let mut parser = InputParser::new();
        // 0xE4 expects two continuations; 'x' is not one.
        let events = parser.feed(&[0xE4, b'x']);
        assert_eq!(
            events,
            vec![
                Event::Key(KeyEvent::new(KeyCode::Char('\u{FFFD}'))),
                Event::Key(KeyEvent::new(KeyCode::Char('x'))),
            ]
        );
    }

    #[test]
    fn focus_events() {
        assert_eq!(feed_one(b"\x1b[I"), Event::Focus(true));
        assert_eq!(feed_one(b"\x1b[O"), Event::Focus(false));
    }

    #[test]
    fn sgr_mouse_press_drag_release() {
        let mut parser = InputParser::new();
        let mut events = Vec::new();
        events.extend(parser.feed(b"\x1b[<0;10;5M"));
        events.extend(parser.feed(b"\x1b[<32;12;5M"));
        events.extend(parser.feed(b"\x1b[<0;12;5m"));

        assert_eq!(
            events,
            vec![
                Event::Mouse(MouseEvent::new(
                    MouseEventKind::Down(MouseButton::Left),
                    9,
                    4
                )),
                Event::Mouse(MouseEvent::new(
                    MouseEventKind::Drag(MouseButton::Left),
                    11,
                    4
                )),
                Event::Mouse(MouseEvent::new(
                    MouseEventKind::Up(MouseButton::Left),
                    11,
                    4
                )),
            ]
        );
        assert_eq!(parser.pressed_buttons().count(), 0);
    }

    #[test]
    fn sgr_mouse_scroll() {
        assert_eq!(
            feed_one(b"\x1b[<64;3;4M"),
            Event::Mouse(MouseEvent::new(MouseEventKind::ScrollUp, 2, 3))
        );
        assert_eq!(
            feed_one(b"\x1b[<65;3;4M"),
            Event::Mouse(MouseEvent::new(MouseEventKind::ScrollDown, 2, 3))
        );
    }

    #[test]
    fn sgr_mouse_motion_without_button_is_move() {
        assert_eq!(
            feed_one(b"\x1b[<35;7;8M"),
            Event::Mouse(MouseEvent::new(MouseEventKind::Moved, 6, 7))
        );
    }

    #[test]
    fn sgr_motion_code_35_while_pressed_is_drag() {
        let mut parser = InputParser::new();
        parser.feed(b"\x1b[<0;1;1M");
        let events = parser.feed(b"\x1b[<35;2;2M");
        assert_eq!(
            events,
            vec![Event::Mouse(MouseEvent::new(
                MouseEventKind::Drag(MouseButton::Left),
                1,
                1
            ))]
        );
    }

    #[test]
    fn sgr_mouse_modifiers() {
        // Shift bit is 4
        let event = feed_one(b"\x1b[<4;2;2M");
        match event {
            Event::Mouse(m) => {
                assert!(m.modifiers.contains(Modifiers::SHIFT));
                assert_eq!(m.kind, MouseEventKind::Down(MouseButton::Left));
            }
            other => panic!("expected mouse event, got {other:?}"),
        }
    }

    #[test]
    fn x10_mouse_press_and_release() {
        let mut parser = InputParser::new();
        // press left at (1,1): cb=32+0, cx=32+1, cy=32+1
        let mut bytes = Vec::from(&b"\x1b[M"[..]);
        bytes.extend([32, 33, 33]);
        let events = parser.feed(&bytes);
        assert_eq!(
            events,
            vec![Event::Mouse(MouseEvent::new(
                MouseEventKind::Down(MouseButton::Left),
                0,
                0
            ))]
        );

        // release: cb=32+3
        let mut bytes = Vec::from(&b"\x1b[M"[..]);
        bytes.extend([35, 33, 33]);
        let events = parser.feed(&bytes);
        assert_eq!(
            events,
            vec![Event::Mouse(MouseEvent::new(
                MouseEventKind::Up(MouseButton::Left),
                0,
                0
            ))]
        );
    }

    #[test]
    fn x10_mouse_split_across_feeds() {
        let mut parser = InputParser::new();
        assert!(parser.feed(b"\x1b[M").is_empty());
        assert!(parser.feed(&[32]).is_empty());
        let events = parser.feed(&[42, 37]);
        assert_eq!(
            events,
            vec![Event::Mouse(MouseEvent::new(
                MouseEventKind::Down(MouseButton::Left),
                9,
                4
            ))]
        );
    }

    #[test]
    fn da_reply() {
        assert_eq!(
            feed_one(b"\x1b[?62;4c"),
            Event::Capability(CapabilityReply::DeviceAttributes(vec![62, 4]))
        );
    }

    #[test]
    fn decrpm_reply() {
        assert_eq!(
            feed_one(b"\x1b[?2026;2$y"),
            Event::Capability(CapabilityReply::ModeReport {
                mode: 2026,
                value: 2
            })
        );
    }

    #[test]
    fn osc_reply_with_st() {
        assert_eq!(
            feed_one(b"\x1b]10;rgb:ffff/ffff/ffff\x1b\\"),
            Event::Capability(CapabilityReply::Osc("10;rgb:ffff/ffff/ffff".into()))
        );
    }

    #[test]
    fn osc_reply_with_bel() {
        assert_eq!(
            feed_one(b"\x1b]11;rgb:0000/0000/0000\x07"),
            Event::Capability(CapabilityReply::Osc("11;rgb:0000/0000/0000".into()))
        );
    }

    #[test]
    fn dcs_reply() {
        assert_eq!(
            feed_one(b"\x1bP1+r544e\x1b\\"),
            Event::Capability(CapabilityReply::Dcs("1+r544e".into()))
        );
    }

    #[test]
    fn bracketed_paste_roundtrip() {
        let mut parser = InputParser::new();
        let events = parser.feed(b"\x1b[200~hello\nworld\x1b[201~");
        assert_eq!(events, vec![Event::Paste(PasteEvent::new("hello\nworld"))]);
    }

    #[test]
    fn bracketed_paste_with_embedded_escape() {
        let mut parser = InputParser::new();
        // An ESC [ 2 prefix inside the paste that is NOT the terminator must
        // be kept as content.
        let events = parser.feed(b"\x1b[200~a\x1b[2J-b\x1b[201~");
        assert_eq!(events, vec![Event::Paste(PasteEvent::new("a\x1b[2J-b"))]);
    }

    #[test]
    fn paste_split_across_feeds() {
        let mut parser = InputParser::new();
        assert!(parser.feed(b"\x1b[200~par").is_empty());
        assert!(parser.feed(b"tial\x1b[20").is_empty());
        let events = parser.feed(b"1~");
        assert_eq!(events, vec![Event::Paste(PasteEvent::new("partial"))]);
    }

    #[test]
    fn function_keys_via_tilde() {
        assert_eq!(
            feed_one(b"\x1b[15~"),
            Event::Key(KeyEvent::new(KeyCode::F(5)))
        );
        assert_eq!(
            feed_one(b"\x1b[24~"),
            Event::Key(KeyEvent::new(KeyCode::F(12)))
        );
    }

    #[test]
    fn kitty_basic_key() {
        assert_eq!(
            feed_one(b"\x1b[97;5u"),
            Event::Key(KeyEvent::new(KeyCode::Char('a')).with_modifiers(Modifiers::CTRL))
        );
    }

    #[test]
    fn kitty_release_dropped() {
        let mut parser = InputParser::new();
        assert!(parser.feed(b"\x1b[97;1:3u").is_empty());
    }

    #[test]
    fn split_sequence_across_feeds() {
        let mut parser = InputParser::new();
        assert!(parser.feed(b"\x1b[").is_empty());
        let events = parser.feed(b"A");
        assert_eq!(events, vec![Event::Key(KeyEvent::new(KeyCode::Up))]);
    }

    #[test]
    fn oversized_csi_is_ignored() {
        let mut parser = InputParser::new();
        let mut input = Vec::from(&b"\x1b["[..]);
        input.extend(std::iter::repeat(b'1').take(MAX_CSI_LEN + 10));
        input.push(b'A');
        let events = parser.feed(&input);
        assert!(events.is_empty());

        // Parser recovers for the next sequence.
        let events = parser.feed(b"\x1b[B");
        assert_eq!(events, vec![Event::Key(KeyEvent::new(KeyCode::Down))]);
    }

    #[test]
    fn garbage_never_wedges_the_parser() {
        let mut parser = InputParser::new();
        parser.feed(&[0x1B, 0xFF, 0x00, 0x1B, b'[', 0xFF]);
        let events = parser.feed(b"q");
        assert_eq!(events, vec![Event::Key(KeyEvent::new(KeyCode::Char('q')))]);
    }
}
