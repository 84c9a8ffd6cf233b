//! On-screen presentation: a fixed-size window with black letterboxing.
//!
//! The sequencer only sees the [`FrameSink`] capability: push one frame at a
//! placement, poll for a quit request. The fltk implementation latches quit
//! on window close, Escape (fltk's default close shortcut), or `q`.

use std::cell::Cell;
use std::rc::Rc;

use fltk::{
    app,
    enums::{Color, ColorDepth, Event, Key},
    frame::Frame,
    image::RgbImage,
    prelude::*,
    window::Window,
};
use tracing::info;

use crate::error::{ShowreelError, ShowreelResult};
use crate::geometry::{Canvas, Placement};
use crate::media::FrameRgb;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlayerControl {
    Continue,
    Quit,
}

/// Where decoded frames go, and where the quit signal comes from.
pub trait FrameSink {
    /// Show one frame scaled into the placement rectangle.
    fn present(&mut self, frame: &FrameRgb, placement: Placement) -> ShowreelResult<()>;
    /// Drain pending input events and report whether the user asked to quit.
    /// The quit latch is level-triggered: once set it stays set.
    fn poll_control(&mut self) -> PlayerControl;
}

pub struct FltkWindow {
    _app: app::App,
    window: Window,
    frame: Frame,
    quit: Rc<Cell<bool>>,
}

impl FltkWindow {
    pub fn new(canvas: Canvas, title: &str) -> ShowreelResult<Self> {
        let fltk_app = app::App::default();

        let mut window = Window::new(0, 0, canvas.width as i32, canvas.height as i32, None);
        window.set_label(title);
        window.set_color(Color::Black);
        let frame = Frame::new(0, 0, canvas.width as i32, canvas.height as i32, None);
        window.end();

        let quit = Rc::new(Cell::new(false));
        // Window close request (close button or Escape) and the `q` key both
        // latch the quit flag; the sequencer observes it on its next poll.
        window.set_callback({
            let quit = Rc::clone(&quit);
            move |_| quit.set(true)
        });
        window.handle({
            let quit = Rc::clone(&quit);
            move |_, event| match event {
                Event::KeyDown if app::event_key() == Key::from_char('q') => {
                    quit.set(true);
                    true
                }
                _ => false,
            }
        });

        let mut window = window.center_screen();
        window.show();
        if !window.shown() {
            return Err(ShowreelError::display("failed to open playback window"));
        }
        info!(
            width = canvas.width,
            height = canvas.height,
            "playback window open"
        );

        Ok(Self {
            _app: fltk_app,
            window,
            frame,
            quit,
        })
    }
}

impl FrameSink for FltkWindow {
    fn present(&mut self, frame: &FrameRgb, placement: Placement) -> ShowreelResult<()> {
        let mut image = RgbImage::new(
            &frame.data,
            frame.width as i32,
            frame.height as i32,
            ColorDepth::Rgb8,
        )
        .map_err(|e| ShowreelError::display(format!("frame upload failed: {e}")))?;
        image.scale(placement.width as i32, placement.height as i32, false, true);

        self.frame.resize(
            placement.x,
            placement.y,
            placement.width as i32,
            placement.height as i32,
        );
        self.frame.set_image(Some(image));
        self.window.redraw();
        app::check();
        Ok(())
    }

    fn poll_control(&mut self) -> PlayerControl {
        app::check();
        if self.quit.get() || !self.window.shown() {
            PlayerControl::Quit
        } else {
            PlayerControl::Continue
        }
    }
}

impl Drop for FltkWindow {
    fn drop(&mut self) {
        self.window.hide();
        app::check();
    }
}
