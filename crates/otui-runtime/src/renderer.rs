#![forbid(unsafe_code)]

//! The renderer facade.
//!
//! [`Renderer`] ties the pieces together around one output sink:
//!
//! - the [`SceneTree`] and its layout/composite passes
//! - the [`FramePresenter`] (front/back buffers, diff, ANSI emission)
//! - the [`InputParser`] plus pointer routing and selection
//! - the capability handshake
//!
//! It owns no timing; the frame loop (or a test harness) decides when to
//! feed input and when to render.
//!
//! # Handshake
//!
//! `begin_handshake` emits the probe sequences. Replies flow back through
//! `feed_input` as ordinary events; the renderer folds them into its
//! capability table until the DA1 fence arrives, then locks the table
//! for the rest of the session.
//!
//! # Focus
//!
//! On focus-in the renderer re-asserts the session's reporting modes
//! (some multiplexers strip them from unfocused panes) - exactly once
//! per focus-in - and passes the focus event on to the caller.

use std::io::{self, Write};

use otui_core::capabilities::Capabilities;
use otui_core::event::Event;
use otui_core::geometry::Rect;
use otui_core::input_parser::InputParser;
use otui_render::presenter::{CursorHint, FramePresenter, PresentStats};
use otui_scene::{PointerEvent, PointerRouter, SceneTree, SelectionController};
use otui_text::width::EastAsianPolicy;

/// Renderer configuration.
#[derive(Debug, Clone, Copy)]
pub struct RendererOptions {
    /// Frames per second the loop aims for.
    pub target_fps: u16,
    /// Use the alternate screen buffer.
    pub alt_screen: bool,
    /// Enable mouse reporting.
    pub mouse: bool,
    /// Emit OSC 8 hyperlinks when the terminal supports them.
    pub hyperlinks: bool,
    /// Ambiguous east-asian width handling.
    pub east_asian: EastAsianPolicy,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            target_fps: 30,
            alt_screen: true,
            mouse: true,
            hyperlinks: true,
            east_asian: EastAsianPolicy::Narrow,
        }
    }
}

/// Runtime failures.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The output sink failed and the presenter stopped.
    #[error("output sink failed: {0}")]
    Io(#[from] io::Error),
}

/// The assembled rendering engine around one sink.
pub struct Renderer<W: Write> {
    presenter: FramePresenter<W>,
    /// The retained scene.
    pub scene: SceneTree,
    parser: InputParser,
    router: PointerRouter,
    /// Drag-selection state over the scene.
    pub selection: SelectionController,
    options: RendererOptions,
    /// Capability table being folded during the handshake.
    caps: Capabilities,
    handshake_open: bool,
}

impl<W: Write> Renderer<W> {
    /// Create a renderer with a detected-baseline capability table.
    pub fn new(sink: W, options: RendererOptions, width: u16, height: u16) -> Self {
        let mut caps = Capabilities::detect();
        if !options.hyperlinks {
            caps.hyperlinks = false;
        }
        let presenter = FramePresenter::new(sink, caps, width, height);
        Self {
            presenter,
            scene: SceneTree::new(),
            parser: InputParser::new(),
            router: PointerRouter::new(),
            selection: SelectionController::new(),
            options,
            caps,
            handshake_open: false,
        }
    }

    /// Create a renderer with an explicit capability table (tests).
    pub fn with_capabilities(
        sink: W,
        options: RendererOptions,
        caps: Capabilities,
        width: u16,
        height: u16,
    ) -> Self {
        let mut renderer = Self::new(sink, options, width, height);
        renderer.caps = caps;
        renderer.presenter.set_capabilities(caps);
        renderer
    }

    /// The renderer's options.
    #[inline]
    pub fn options(&self) -> &RendererOptions {
        &self.options
    }

    /// The capability table currently in effect.
    #[inline]
    pub fn capabilities(&self) -> &Capabilities {
        self.presenter.capabilities()
    }

    /// The frame presenter (owned buffers and sink).
    #[inline]
    pub fn presenter_mut(&mut self) -> &mut FramePresenter<W> {
        &mut self.presenter
    }

    /// Install the mode-enable bytes to replay after a focus-in.
    pub fn set_mode_reassert_bytes(&mut self, bytes: Vec<u8>) {
        self.presenter.set_mode_reassert_bytes(bytes);
    }

    /// Emit the capability probes and open the handshake window.
    pub fn begin_handshake(&mut self) -> Result<(), RuntimeError> {
        self.handshake_open = true;
        self.presenter.send_handshake()?;
        Ok(())
    }

    /// Whether the handshake window is still collecting replies.
    #[inline]
    pub fn handshake_open(&self) -> bool {
        self.handshake_open
    }

    /// Feed raw input bytes; returns the events the application should
    /// see (capability replies are absorbed, focus re-assertion happens
    /// here).
    pub fn feed_input(&mut self, bytes: &[u8]) -> Vec<Event> {
        let mut out = Vec::new();
        for event in self.parser.feed(bytes) {
            match event {
                // Capability replies are absorbed: they are handshake
                // traffic, not application input.
                Event::Capability(reply) => {
                    if self.handshake_open && self.caps.apply_reply(&reply) {
                        self.handshake_open = false;
                        let mut caps = self.caps;
                        if !self.options.hyperlinks {
                            caps.hyperlinks = false;
                        }
                        self.presenter.set_capabilities(caps);
                    }
                }
                Event::Focus(true) => {
                    let _ = self.presenter.reassert_modes();
                    out.push(Event::Focus(true));
                }
                other => out.push(other),
            }
        }
        out
    }

    /// Route a mouse event through hit testing, selection, and the drag
    /// machine, returning the derived pointer events.
    pub fn route_mouse(&mut self, event: &otui_core::event::MouseEvent) -> Vec<PointerEvent> {
        let routed = self.router.route(&self.scene, event);
        for pointer in &routed {
            // A changed selection marks its node render-dirty internally.
            let _ = self.selection.on_pointer(&mut self.scene, pointer);
        }
        routed
    }

    /// Handle a terminal resize.
    pub fn resize(&mut self, width: u16, height: u16) {
        self.presenter.resize(width, height);
        self.scene.mark_layout_dirty(self.scene.root());
    }

    /// Current frame size.
    #[inline]
    pub fn size(&self) -> (u16, u16) {
        self.presenter.size()
    }

    /// Whether the scene needs a frame.
    #[must_use]
    pub fn dirty(&self) -> bool {
        self.scene.needs_render() || self.scene.needs_layout()
    }

    /// Lay out (if needed), composite, and present one frame.
    pub fn render(&mut self) -> Result<PresentStats, RuntimeError> {
        let (width, height) = self.presenter.size();
        if self.scene.needs_layout() {
            self.scene.layout(Rect::from_size(width, height));
        }

        // Cursor hint follows the focused node.
        let hint = match self.scene.focused().and_then(|id| self.scene.get(id)) {
            Some(node) => {
                let rect = node.rect();
                CursorHint::At(rect.x, rect.y)
            }
            None => CursorHint::Hidden,
        };
        self.presenter.set_cursor_hint(hint);

        let scene = &mut self.scene;
        self.presenter.with_frame_parts(|back, pool, links| {
            scene.composite(back, pool, links);
        });

        Ok(self.presenter.present()?)
    }

    /// Consume the renderer and return the sink.
    pub fn into_sink(self) -> W {
        self.presenter.into_sink()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use otui_core::event::{KeyCode, KeyEvent, MouseButton, MouseEvent, MouseEventKind};
    use otui_layout::{Dimension, ItemStyle};
    use otui_render::cell::PackedRgba;
    use otui_scene::NodeKind;
    use otui_style::Style;
    use otui_text::breaks::WrapMode;
    use otui_text::width::TabPolicy;
    use otui_text::TextBuffer;

    fn renderer() -> Renderer<Vec<u8>> {
        let mut caps = Capabilities::full();
        caps.sync_output = false;
        Renderer::with_capabilities(
            Vec::new(),
            RendererOptions::default(),
            caps,
            40,
            10,
        )
    }

    fn text_node(content: &str) -> NodeKind {
        let mut buffer = TextBuffer::new();
        buffer.set_text(content);
        NodeKind::Text {
            buffer,
            wrap: WrapMode::None,
            tabs: TabPolicy::default(),
            scroll_row: 0,
            base: Style::EMPTY,
        }
    }

    #[test]
    fn render_pipeline_produces_output() {
        let mut r = renderer();
        let t = r.scene.add_child(r.scene.root(), text_node("hello"));
        r.scene.get_mut(t).unwrap().item_style = ItemStyle {
            width: Dimension::Cells(5),
            height: Dimension::Cells(1),
            ..Default::default()
        };

        r.render().unwrap();
        let out = String::from_utf8_lossy(&r.into_sink()).into_owned();
        assert!(out.contains("hello"), "frame must contain the text: {out:?}");
    }

    #[test]
    fn second_identical_frame_is_quiet() {
        let mut r = renderer();
        let t = r.scene.add_child(r.scene.root(), text_node("stable"));
        r.scene.get_mut(t).unwrap().item_style = ItemStyle {
            width: Dimension::Cells(6),
            height: Dimension::Cells(1),
            ..Default::default()
        };

        r.render().unwrap();
        let stats = r.render().unwrap();
        assert_eq!(stats.cells_changed, 0);
    }

    #[test]
    fn handshake_folds_replies_until_da1() {
        let mut r = renderer();
        r.begin_handshake().unwrap();
        assert!(r.handshake_open());

        // DECRPM says sync output is supported; then the DA1 fence.
        let events = r.feed_input(b"\x1b[?2026;2$y");
        assert!(events.is_empty(), "capability replies are absorbed");
        assert!(r.handshake_open());

        let events = r.feed_input(b"\x1b[?62;4c");
        assert!(events.is_empty());
        assert!(!r.handshake_open());
        assert!(r.capabilities().sync_output);
    }

    #[test]
    fn key_events_pass_through() {
        let mut r = renderer();
        let events = r.feed_input(b"q");
        assert_eq!(events, vec![Event::Key(KeyEvent::new(KeyCode::Char('q')))]);
    }

    #[test]
    fn focus_in_reasserts_modes_once() {
        let mut r = renderer();
        r.set_mode_reassert_bytes(b"\x1b[?1000;1002;1006h\x1b[?2004h\x1b[?1004h".to_vec());

        // focus-out then focus-in
        let events = r.feed_input(b"\x1b[O\x1b[I");
        assert_eq!(events, vec![Event::Focus(false), Event::Focus(true)]);

        let out = String::from_utf8_lossy(&r.into_sink()).into_owned();
        assert_eq!(out.matches("\x1b[?1000;1002;1006h").count(), 1);
        assert_eq!(out.matches("\x1b[?2004h").count(), 1);
        assert_eq!(out.matches("\x1b[?1004h").count(), 1);
    }

    #[test]
    fn resize_marks_layout_and_redraws() {
        let mut r = renderer();
        r.render().unwrap();
        r.resize(50, 12);
        assert!(r.dirty());
        assert_eq!(r.size(), (50, 12));
        r.render().unwrap();
    }

    #[test]
    fn mouse_routing_reaches_scene_targets() {
        let mut r = renderer();
        let b = r.scene.add_child(
            r.scene.root(),
            NodeKind::Box {
                bg: Some(PackedRgba::rgb(1, 1, 1)),
                border: None,
                border_color: PackedRgba::TRANSPARENT,
            },
        );
        {
            let node = r.scene.get_mut(b).unwrap();
            node.mouse_target = true;
            node.item_style = ItemStyle {
                width: Dimension::Cells(10),
                height: Dimension::Cells(5),
                ..Default::default()
            };
        }
        r.render().unwrap();

        let events = r.route_mouse(&MouseEvent::new(
            MouseEventKind::Down(MouseButton::Left),
            3,
            2,
        ));
        assert!(events
            .iter()
            .any(|e| e.node == Some(b)), "hit the box node: {events:?}");
    }

    #[test]
    fn capability_reply_outside_handshake_is_dropped() {
        let mut r = renderer();
        let before = *r.capabilities();
        let events = r.feed_input(b"\x1b[?2026;0$y");
        assert!(events.is_empty());
        assert_eq!(*r.capabilities(), before, "table is locked");
    }
}
