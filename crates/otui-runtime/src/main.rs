#![forbid(unsafe_code)]

//! The `otui` binary: a minimal harness that drives the full pipeline
//! (session → handshake → scene → frame loop) against the live terminal.
//!
//! Flags:
//!
//! ```text
//! --fps <n>                         target frame rate (default 30)
//! --no-alt-screen                   stay on the main screen buffer
//! --east-asian-ambiguous=<narrow|wide>
//! --no-mouse                        leave mouse reporting off
//! --no-hyperlink                    never emit OSC 8
//! ```
//!
//! Exits 0 on a clean stop (press `q` or Ctrl+C), 1 on an unhandled
//! panic after the session guard restores the terminal.

use std::io::Write as _;
use std::process::ExitCode;

use otui_core::event::{Event, KeyCode};
use otui_core::session::{SessionOptions, TerminalSession};
use otui_layout::{Dimension, ItemStyle};
use otui_render::buffer::BorderStyle;
use otui_render::cell::PackedRgba;
use otui_runtime::frame_loop::spawn_stdin_pump;
use otui_runtime::{FrameLoop, LoopConfig, Renderer, RendererOptions};
use otui_scene::NodeKind;
use otui_style::Style;
use otui_text::breaks::WrapMode;
use otui_text::width::{EastAsianPolicy, TabPolicy};
use otui_text::TextBuffer;

fn main() -> ExitCode {
    let options = match parse_args(std::env::args().skip(1)) {
        Ok(options) => options,
        Err(message) => {
            eprintln!("otui: {message}");
            return ExitCode::from(2);
        }
    };

    // Logs go to stderr; stdout belongs to the presenter.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("otui: {e}");
            ExitCode::FAILURE
        }
    }
}

fn parse_args(args: impl Iterator<Item = String>) -> Result<RendererOptions, String> {
    let mut options = RendererOptions::default();
    let mut args = args.peekable();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--fps" => {
                let value = args
                    .next()
                    .ok_or_else(|| "--fps needs a value".to_string())?;
                options.target_fps = value
                    .parse::<u16>()
                    .map_err(|_| format!("invalid fps: {value}"))?
                    .clamp(1, 240);
            }
            "--no-alt-screen" => options.alt_screen = false,
            "--no-mouse" => options.mouse = false,
            "--no-hyperlink" => options.hyperlinks = false,
            _ if arg.starts_with("--east-asian-ambiguous=") => {
                options.east_asian = match &arg["--east-asian-ambiguous=".len()..] {
                    "narrow" => EastAsianPolicy::Narrow,
                    "wide" => EastAsianPolicy::Wide,
                    other => return Err(format!("unknown width policy: {other}")),
                };
            }
            "--help" | "-h" => {
                return Err("usage: otui [--fps <n>] [--no-alt-screen] \
                     [--east-asian-ambiguous=narrow|wide] [--no-mouse] [--no-hyperlink]"
                    .to_string());
            }
            other => return Err(format!("unknown flag: {other}")),
        }
    }

    Ok(options)
}

fn run(options: RendererOptions) -> std::io::Result<()> {
    let session = TerminalSession::new(SessionOptions {
        alternate_screen: options.alt_screen,
        mouse: options.mouse,
        mouse_motion: false,
        bracketed_paste: true,
        focus_events: true,
    })?;
    let (width, height) = session.size()?;

    let mut renderer = Renderer::new(std::io::stdout(), options, width, height);
    let mut reassert = Vec::new();
    session.reassert_modes(&mut reassert)?;
    renderer.set_mode_reassert_bytes(reassert);

    build_scene(&mut renderer);
    let _ = renderer.begin_handshake();

    let mut frame_loop = FrameLoop::new(LoopConfig {
        target_fps: options.target_fps,
    });
    frame_loop.on_event(Box::new(|renderer, event, control| match event {
        Event::Key(key) if key.is_char('q') || key.code == KeyCode::Escape => {
            control.stop();
        }
        Event::Key(key) if key.is_char('c') && key.ctrl() => control.stop(),
        Event::Key(key) if key.code == KeyCode::Tab => {
            renderer.scene.focus_next();
            let root = renderer.scene.root();
            renderer.scene.request_render(root);
        }
        _ => {}
    }));

    let input = spawn_stdin_pump();
    let result = frame_loop.run(&mut renderer, &input);

    // Session drop restores the terminal after the loop ends.
    drop(session);
    std::io::stdout().flush()?;
    result.map_err(|e| match e {
        otui_runtime::RuntimeError::Io(io) => io,
    })
}

/// A small built-in scene exercising boxes, wrapped text, and status.
fn build_scene(renderer: &mut Renderer<std::io::Stdout>) {
    let east_asian = renderer.options().east_asian;
    let scene = &mut renderer.scene;
    scene.background = PackedRgba::rgb(16, 16, 24);

    let frame = scene.add_child(
        scene.root(),
        NodeKind::Box {
            bg: Some(PackedRgba::rgb(24, 24, 36)),
            border: Some(BorderStyle::Rounded),
            border_color: PackedRgba::rgb(120, 140, 220),
        },
    );
    scene.get_mut(frame).unwrap().item_style = ItemStyle {
        grow: 1.0,
        basis: Dimension::Cells(0),
        ..Default::default()
    };

    let mut body = TextBuffer::new();
    body.set_east_asian(east_asian);
    body.set_text(
        "otui renderer harness\n\nThis text wraps at the box width. Resize the \
         terminal to watch the flexbox solver and the frame diff at work; only \
         changed cells are rewritten. Press Tab to move focus, q to quit.",
    );
    let text = scene.add_child(
        frame,
        NodeKind::Text {
            buffer: body,
            wrap: WrapMode::Word,
            tabs: TabPolicy::default(),
            scroll_row: 0,
            base: Style::EMPTY,
        },
    );
    {
        let node = scene.get_mut(text).unwrap();
        node.item_style = ItemStyle {
            grow: 1.0,
            basis: Dimension::Cells(0),
            margin: otui_core::geometry::Sides::all(1),
            ..Default::default()
        };
        node.selectable = true;
        node.mouse_target = true;
        node.focusable = true;
    }
}
