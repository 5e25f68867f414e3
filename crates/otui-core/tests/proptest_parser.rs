//! Property tests for the input parser's safety contract: arbitrary byte
//! soup must never wedge, panic, or desynchronize the parser.

use proptest::prelude::*;

use otui_core::event::{Event, KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};
use otui_core::input_parser::InputParser;

proptest! {
    /// `feed` terminates and never panics on arbitrary input.
    #[test]
    fn arbitrary_bytes_never_panic(bytes in proptest::collection::vec(any::<u8>(), 0..2048)) {
        let mut parser = InputParser::new();
        let _ = parser.feed(&bytes);
    }

    /// Feeding byte-by-byte yields the same events as one batch: the
    /// parser buffers partial sequences without losing or inventing
    /// events at chunk boundaries.
    #[test]
    fn chunking_is_transparent(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let mut batch = InputParser::new();
        let batched = batch.feed(&bytes);

        let mut dribble = InputParser::new();
        let mut dribbled = Vec::new();
        for &b in &bytes {
            dribbled.extend(dribble.feed(&[b]));
        }

        prop_assert_eq!(batched, dribbled);
    }

    /// After arbitrary garbage, the parser recovers: a plain key still
    /// parses once the garbage stops (possibly preceded by leftovers of
    /// the garbage itself).
    #[test]
    fn recovers_after_garbage(bytes in proptest::collection::vec(any::<u8>(), 0..256)) {
        let mut parser = InputParser::new();
        let _ = parser.feed(&bytes);
        // A paste terminator unconditionally exits paste mode; a final
        // ESC-free key then must surface.
        let _ = parser.feed(b"\x1b[201~");
        let events = parser.feed(b"\x1b[A");
        prop_assert!(
            events.contains(&Event::Key(KeyEvent::new(KeyCode::Up)))
                || events.iter().any(|e| matches!(e, Event::Paste(_))),
            "expected the Up key (or a flushed paste) after recovery, got {events:?}"
        );
    }

    /// SGR mouse events round-trip through their wire encoding.
    #[test]
    fn sgr_mouse_roundtrip(button in 0u16..3, x in 1u16..500, y in 1u16..500) {
        let mut parser = InputParser::new();
        let wire = format!("\x1b[<{button};{x};{y}M");
        let events = parser.feed(wire.as_bytes());

        let expected_button = match button {
            0 => MouseButton::Left,
            1 => MouseButton::Middle,
            _ => MouseButton::Right,
        };
        prop_assert_eq!(
            events,
            vec![Event::Mouse(MouseEvent::new(
                MouseEventKind::Down(expected_button),
                x - 1,
                y - 1
            ))]
        );
    }
}

#[test]
fn interleaved_sequences_keep_order() {
    let mut parser = InputParser::new();
    let events = parser.feed(b"a\x1b[Ab\x1b[<0;1;1M\x1b[Ic");
    let kinds: Vec<&Event> = events.iter().collect();
    assert_eq!(kinds.len(), 6);
    assert_eq!(events[0], Event::Key(KeyEvent::new(KeyCode::Char('a'))));
    assert_eq!(events[1], Event::Key(KeyEvent::new(KeyCode::Up)));
    assert_eq!(events[2], Event::Key(KeyEvent::new(KeyCode::Char('b'))));
    assert!(matches!(events[3], Event::Mouse(_)));
    assert_eq!(events[4], Event::Focus(true));
    assert_eq!(events[5], Event::Key(KeyEvent::new(KeyCode::Char('c'))));
}
