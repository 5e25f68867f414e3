#![forbid(unsafe_code)]

//! The steady-frequency frame driver.
//!
//! Single-threaded and cooperative: input drain, frame callbacks, and
//! rendering all run on the caller's thread. The only other thread in the
//! system is the stdin pump, which moves raw bytes into a channel because
//! blocking reads cannot share a thread with a frame schedule; the bytes
//! are parsed and dispatched on the loop thread, so every data structure
//! stays single-threaded.
//!
//! # Tick
//!
//! 1. Drain pending input and dispatch events in arrival order.
//! 2. Run frame callbacks in registration order. A panicking callback is
//!    caught and logged; the frame continues.
//! 3. If the scene is dirty, layout + composite + present.
//! 4. Sleep until `last_tick + 1/fps`.
//!
//! # Backpressure
//!
//! A frame that overruns its budget skips the next tick's render (input
//! is still drained), so a slow frame cannot queue up a backlog.
//!
//! # Stopping
//!
//! [`LoopControl::stop`] is idempotent and checked at tick boundaries.
//! Terminal restoration belongs to the session guard's `Drop`, which runs
//! regardless of how the loop exits.

use std::io::Write;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant};

use otui_core::event::Event;

use crate::renderer::{Renderer, RuntimeError};

/// Frame loop configuration.
#[derive(Debug, Clone, Copy)]
pub struct LoopConfig {
    /// Target frames per second (clamped to 1..=240).
    pub target_fps: u16,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self { target_fps: 30 }
    }
}

impl LoopConfig {
    fn frame_budget(&self) -> Duration {
        Duration::from_secs(1) / u32::from(self.target_fps.clamp(1, 240))
    }
}

/// Handle passed to callbacks for cooperative shutdown.
#[derive(Debug, Default)]
pub struct LoopControl {
    stop: bool,
}

impl LoopControl {
    /// Request the loop to exit at the next tick boundary. Idempotent.
    pub fn stop(&mut self) {
        self.stop = true;
    }

    /// Whether stop was requested.
    #[must_use]
    pub fn stopping(&self) -> bool {
        self.stop
    }
}

/// A frame callback: runs once per tick before rendering.
pub type FrameCallback<W> = Box<dyn FnMut(&mut Renderer<W>, &mut LoopControl)>;

/// An event handler: receives every application-visible event.
pub type EventHandler<W> = Box<dyn FnMut(&mut Renderer<W>, &Event, &mut LoopControl)>;

/// The cooperative frame driver.
pub struct FrameLoop<W: Write> {
    config: LoopConfig,
    callbacks: Vec<FrameCallback<W>>,
    handlers: Vec<EventHandler<W>>,
    control: LoopControl,
    last_tick: Option<Instant>,
    /// Set when the previous frame overran its budget.
    skip_render: bool,
}

impl<W: Write> FrameLoop<W> {
    /// Create a loop with the given config.
    #[must_use]
    pub fn new(config: LoopConfig) -> Self {
        Self {
            config,
            callbacks: Vec::new(),
            handlers: Vec::new(),
            control: LoopControl::default(),
            last_tick: None,
            skip_render: false,
        }
    }

    /// Register a per-frame callback (runs in registration order).
    pub fn on_frame(&mut self, callback: FrameCallback<W>) {
        self.callbacks.push(callback);
    }

    /// Register an event handler (runs in registration order).
    pub fn on_event(&mut self, handler: EventHandler<W>) {
        self.handlers.push(handler);
    }

    /// Request the loop to stop.
    pub fn stop(&mut self) {
        self.control.stop();
    }

    /// Whether the loop is stopping.
    #[must_use]
    pub fn stopping(&self) -> bool {
        self.control.stopping()
    }

    /// Run until stopped, draining `input` each tick.
    ///
    /// The channel carries raw stdin bytes from the pump thread. A
    /// disconnected channel stops the loop (stdin closed).
    pub fn run(
        &mut self,
        renderer: &mut Renderer<W>,
        input: &Receiver<Vec<u8>>,
    ) -> Result<(), RuntimeError> {
        while !self.control.stopping() {
            self.tick(renderer, input)?;

            if renderer.presenter_mut().is_stopped() {
                // io-closed policy: nothing further can be presented.
                self.control.stop();
            }

            let budget = self.config.frame_budget();
            let now = Instant::now();
            let next = self.last_tick.map_or(now, |t| t + budget);
            if let Some(sleep) = next.checked_duration_since(now) {
                std::thread::sleep(sleep);
            }
        }

        // Drain whatever input arrived while stopping so the terminal's
        // pending reports don't leak into the shell.
        while let Ok(bytes) = input.try_recv() {
            let _ = renderer.feed_input(&bytes);
        }
        Ok(())
    }

    /// One tick: drain input, run callbacks, render if dirty.
    ///
    /// Exposed for tests and for hosts that own their own schedule.
    pub fn tick(
        &mut self,
        renderer: &mut Renderer<W>,
        input: &Receiver<Vec<u8>>,
    ) -> Result<(), RuntimeError> {
        let tick_start = Instant::now();
        self.last_tick = Some(tick_start);

        // 1. Input drain - always, even when skipping the render.
        loop {
            match input.try_recv() {
                Ok(bytes) => {
                    for event in renderer.feed_input(&bytes) {
                        self.dispatch(renderer, &event);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.control.stop();
                    break;
                }
            }
        }

        // 2. Frame callbacks.
        let mut callbacks = std::mem::take(&mut self.callbacks);
        for callback in &mut callbacks {
            let result = catch_unwind(AssertUnwindSafe(|| {
                callback(renderer, &mut self.control);
            }));
            if result.is_err() {
                #[cfg(feature = "tracing")]
                tracing::error!("frame callback panicked; frame continues");
            }
        }
        self.callbacks = callbacks;

        // 3. Render when dirty, unless the previous frame overran.
        if self.skip_render {
            self.skip_render = false;
        } else if renderer.dirty() {
            renderer.render()?;
            if tick_start.elapsed() > self.config.frame_budget() {
                self.skip_render = true;
            }
        }

        Ok(())
    }

    fn dispatch(&mut self, renderer: &mut Renderer<W>, event: &Event) {
        // Mouse events additionally flow through hit testing / selection.
        if let Event::Mouse(mouse) = event {
            let _ = renderer.route_mouse(mouse);
        }
        if let Event::Resize { width, height } = event {
            renderer.resize(*width, *height);
        }

        let mut handlers = std::mem::take(&mut self.handlers);
        for handler in &mut handlers {
            handler(renderer, event, &mut self.control);
        }
        self.handlers = handlers;
    }
}

/// Spawn the stdin pump thread: reads raw bytes and forwards them over a
/// channel until stdin closes.
#[must_use]
pub fn spawn_stdin_pump() -> Receiver<Vec<u8>> {
    use std::io::Read;
    let (tx, rx) = std::sync::mpsc::channel();
    std::thread::spawn(move || {
        let mut stdin = std::io::stdin().lock();
        let mut buf = [0u8; 4096];
        loop {
            match stdin.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    });
    rx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::RendererOptions;
    use otui_core::capabilities::Capabilities;
    use otui_core::event::KeyCode;
    use std::sync::mpsc::channel;

    fn renderer() -> Renderer<Vec<u8>> {
        let mut caps = Capabilities::full();
        caps.sync_output = false;
        Renderer::with_capabilities(Vec::new(), RendererOptions::default(), caps, 20, 5)
    }

    #[test]
    fn tick_dispatches_input_in_order() {
        let mut fl = FrameLoop::new(LoopConfig::default());
        let mut r = renderer();
        let (tx, rx) = channel();

        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = seen.clone();
        fl.on_event(Box::new(move |_, event, _| {
            if let Event::Key(k) = event {
                sink.borrow_mut().push(k.code);
            }
        }));

        tx.send(b"ab".to_vec()).unwrap();
        tx.send(b"c".to_vec()).unwrap();
        fl.tick(&mut r, &rx).unwrap();

        assert_eq!(
            *seen.borrow(),
            vec![KeyCode::Char('a'), KeyCode::Char('b'), KeyCode::Char('c')]
        );
    }

    #[test]
    fn callbacks_run_each_tick_in_registration_order() {
        let mut fl = FrameLoop::new(LoopConfig::default());
        let mut r = renderer();
        let (_tx, rx) = channel::<Vec<u8>>();

        let order = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        for tag in ["first", "second"] {
            let order = order.clone();
            fl.on_frame(Box::new(move |_, _| {
                order.borrow_mut().push(tag);
            }));
        }

        fl.tick(&mut r, &rx).unwrap();
        assert_eq!(*order.borrow(), vec!["first", "second"]);
    }

    #[test]
    fn panicking_callback_does_not_abort_the_frame() {
        let mut fl = FrameLoop::new(LoopConfig::default());
        let mut r = renderer();
        let (_tx, rx) = channel::<Vec<u8>>();

        let ran = std::rc::Rc::new(std::cell::Cell::new(false));
        fl.on_frame(Box::new(|_, _| panic!("callback bug")));
        let flag = ran.clone();
        fl.on_frame(Box::new(move |_, _| flag.set(true)));

        // Suppress the panic hook noise for this test.
        let prev = std::panic::take_hook();
        std::panic::set_hook(Box::new(|_| {}));
        fl.tick(&mut r, &rx).unwrap();
        std::panic::set_hook(prev);

        assert!(ran.get(), "later callbacks still ran");
    }

    #[test]
    fn stop_is_idempotent_and_checked_at_boundaries() {
        let mut fl: FrameLoop<Vec<u8>> = FrameLoop::new(LoopConfig::default());
        fl.stop();
        fl.stop();
        assert!(fl.stopping());
    }

    #[test]
    fn disconnected_input_stops_the_loop() {
        let mut fl = FrameLoop::new(LoopConfig::default());
        let mut r = renderer();
        let (tx, rx) = channel::<Vec<u8>>();
        drop(tx);

        fl.tick(&mut r, &rx).unwrap();
        assert!(fl.stopping());
    }

    #[test]
    fn callback_can_stop_the_loop() {
        let mut fl = FrameLoop::new(LoopConfig::default());
        let mut r = renderer();
        let (_tx, rx) = channel::<Vec<u8>>();

        fl.on_frame(Box::new(|_, control| control.stop()));
        fl.tick(&mut r, &rx).unwrap();
        assert!(fl.stopping());
    }

    #[test]
    fn resize_events_resize_the_renderer() {
        let mut fl = FrameLoop::new(LoopConfig::default());
        let mut r = renderer();
        let (tx, rx) = channel();

        // A resize arrives as an application event (the host injects it).
        tx.send(Vec::new()).unwrap();
        fl.tick(&mut r, &rx).unwrap();
        fl.dispatch(
            &mut r,
            &Event::Resize {
                width: 33,
                height: 7,
            },
        );
        assert_eq!(r.size(), (33, 7));
    }
}
