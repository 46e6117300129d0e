use crate::{
    applet::{Applet, Mark, Shape, MOUSE_CENTER, MOUSE_LEFT, MOUSE_RIGHT},
    driver::SketchDriver,
    error::SketchError,
};
use kiss3d::{
    camera::Camera,
    event::{Action, Key, MouseButton, WindowEvent},
    planar_camera::{FixedView, PlanarCamera},
    post_processing::PostProcessingEffect,
    window::{State, Window},
};
use nalgebra::{Point2, Vector3};
use rhai::INT;
use std::f32::consts::TAU;

const ELLIPSE_SEGMENTS: usize = 48;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Setup,
    Running,
    Halted,
}

/// Runs a sketch inside the kiss3d render loop.
pub struct Runner {
    driver: SketchDriver<Applet>,
    applet: Applet,
    planar_camera: FixedView,
    phase: Phase,
}

impl Runner {
    pub fn new(driver: SketchDriver<Applet>) -> Self {
        let applet = driver.host().clone();
        Self {
            driver,
            applet,
            planar_camera: FixedView::new(),
            phase: Phase::Setup,
        }
    }

    fn settle(&mut self, result: Result<(), SketchError>) {
        match result {
            Ok(()) => {}
            Err(SketchError::RendererChange(change)) if self.phase == Phase::Setup => {
                log::info!(
                    "Restarting setup with renderer {} at {}x{}",
                    change.renderer,
                    change.width,
                    change.height
                );
            }
            Err(err) => {
                log::error!("{err}");
                self.phase = Phase::Halted;
            }
        }
    }

    fn handle_event(&mut self, event: WindowEvent) -> Result<(), SketchError> {
        match event {
            WindowEvent::CursorPos(x, y, _) => {
                if self.applet.move_mouse(x as f32, y as f32) {
                    self.driver.mouse_dragged()?;
                }
            }
            WindowEvent::MouseButton(button, Action::Press, _) => {
                self.applet.press_mouse(mouse_button(button));
                self.driver.mouse_pressed()?;
            }
            WindowEvent::MouseButton(_, Action::Release, _) => {
                let clicked = self.applet.release_mouse();
                self.driver.mouse_released()?;
                if clicked {
                    self.driver.mouse_clicked()?;
                }
            }
            WindowEvent::Key(key, Action::Press, _) => {
                let (key, key_code) = key_codes(key);
                self.applet.press_key(key, key_code);
                self.driver.key_pressed()?;
            }
            WindowEvent::Key(_, Action::Release, _) => {
                self.applet.release_key();
                self.driver.key_released()?;
            }
            WindowEvent::Char(key) => {
                self.applet.type_key(key);
                self.driver.key_typed()?;
            }
            WindowEvent::FramebufferSize(width, height) => {
                let renderer = self.applet.renderer();
                self.driver.size(width, height, &renderer, None)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn render(&self, window: &mut Window) {
        let state = self.applet.state();
        window.set_background_color(state.background.x, state.background.y, state.background.z);
        let origin = Point2::new(state.width as f32 / 2.0, state.height as f32 / 2.0);
        for mark in &state.marks {
            draw_mark(window, origin, state.height, mark);
        }
    }
}

impl State for Runner {
    fn cameras_and_effect(
        &mut self,
    ) -> (
        Option<&mut dyn Camera>,
        Option<&mut dyn PlanarCamera>,
        Option<&mut dyn PostProcessingEffect>,
    ) {
        (None, Some(&mut self.planar_camera), None)
    }

    fn step(&mut self, window: &mut Window) {
        if self.phase == Phase::Halted {
            self.render(window);
            return;
        }
        let events: Vec<WindowEvent> = window.events().iter().map(|event| event.value).collect();
        for event in events {
            let result = self.handle_event(event);
            self.settle(result);
            if self.phase == Phase::Halted {
                return;
            }
        }
        if self.phase == Phase::Setup {
            let result = self.driver.setup();
            if result.is_ok() {
                self.phase = Phase::Running;
            }
            self.settle(result);
            if self.phase != Phase::Running {
                return;
            }
        }
        let result = self.driver.draw();
        self.settle(result);
        self.applet.next_frame();
        self.render(window);
    }
}

fn mouse_button(button: MouseButton) -> INT {
    match button {
        MouseButton::Button2 => MOUSE_RIGHT,
        MouseButton::Button3 => MOUSE_CENTER,
        _ => MOUSE_LEFT,
    }
}

const LETTERS: [Key; 26] = [
    Key::A, Key::B, Key::C, Key::D, Key::E, Key::F, Key::G, Key::H, Key::I,
    Key::J, Key::K, Key::L, Key::M, Key::N, Key::O, Key::P, Key::Q, Key::R,
    Key::S, Key::T, Key::U, Key::V, Key::W, Key::X, Key::Y, Key::Z,
];

const DIGITS: [Key; 10] = [
    Key::Key0, Key::Key1, Key::Key2, Key::Key3, Key::Key4,
    Key::Key5, Key::Key6, Key::Key7, Key::Key8, Key::Key9,
];

/// Maps a key to Processing's `key` and `keyCode`. Keys without a character
/// report `CODED`. Letters press as lower case; a following `Char` event
/// carries the shifted character.
fn key_codes(key: Key) -> (char, INT) {
    const CODED: char = '\u{ffff}';
    if let Some(index) = LETTERS.iter().position(|&letter| letter == key) {
        return (char::from(b'a' + index as u8), INT::from(b'A') + index as INT);
    }
    if let Some(index) = DIGITS.iter().position(|&digit| digit == key) {
        return (char::from(b'0' + index as u8), INT::from(b'0') + index as INT);
    }
    match key {
        Key::Space => (' ', 32),
        Key::Back => ('\u{8}', 8),
        Key::Tab => ('\t', 9),
        Key::Return => ('\n', 10),
        Key::Escape => ('\u{1b}', 27),
        Key::Delete => ('\u{7f}', 127),
        Key::Left => (CODED, 37),
        Key::Up => (CODED, 38),
        Key::Right => (CODED, 39),
        Key::Down => (CODED, 40),
        Key::LShift | Key::RShift => (CODED, 16),
        Key::LControl | Key::RControl => (CODED, 17),
        Key::LAlt | Key::RAlt => (CODED, 18),
        _ => (CODED, 0),
    }
}

fn kiss_point(origin: Point2<f32>, point: Point2<f32>) -> kiss3d::nalgebra::Point2<f32> {
    // Sketch space has its origin top-left with y down; kiss3d's planar
    // space is centered with y up.
    kiss3d::nalgebra::Point2::new(point.x - origin.x, origin.y - point.y)
}

fn kiss_color(color: Vector3<f32>) -> kiss3d::nalgebra::Point3<f32> {
    kiss3d::nalgebra::Point3::new(color.x, color.y, color.z)
}

/// Whole pixel rows in `[top, bottom)`, clipped to a canvas `height` rows tall.
fn scanlines(top: f32, bottom: f32, height: u32) -> impl Iterator<Item = f32> {
    let first = top.max(0.0).ceil() as u32;
    let last = bottom.clamp(0.0, height as f32).ceil() as u32;
    (first..last).map(|row| row as f32)
}

fn draw_mark(window: &mut Window, origin: Point2<f32>, height: u32, mark: &Mark) {
    let mut line = |from: Point2<f32>, to: Point2<f32>, color: Vector3<f32>| {
        window.draw_planar_line(
            &kiss_point(origin, from),
            &kiss_point(origin, to),
            &kiss_color(color),
        )
    };
    match mark.shape {
        Shape::Point(at) => {
            if let Some(stroke) = mark.stroke {
                line(at, Point2::new(at.x + 1.0, at.y), stroke);
            }
        }
        Shape::Line(from, to) => {
            if let Some(stroke) = mark.stroke {
                line(from, to, stroke);
            }
        }
        Shape::Rect(corner, size) => {
            let far = corner + size;
            if let Some(fill) = mark.fill {
                for y in scanlines(corner.y, far.y, height) {
                    line(Point2::new(corner.x, y), Point2::new(far.x, y), fill);
                }
            }
            if let Some(stroke) = mark.stroke {
                let corners = [
                    corner,
                    Point2::new(far.x, corner.y),
                    far,
                    Point2::new(corner.x, far.y),
                ];
                for (index, from) in corners.iter().enumerate() {
                    line(*from, corners[(index + 1) % corners.len()], stroke);
                }
            }
        }
        Shape::Ellipse(center, size) => {
            let radii = size / 2.0;
            if let Some(fill) = mark.fill {
                for y in scanlines(center.y - radii.y, center.y + radii.y, height) {
                    let dy = y - center.y;
                    let half = radii.x * (1.0 - (dy / radii.y).powi(2)).max(0.0).sqrt();
                    line(Point2::new(center.x - half, y), Point2::new(center.x + half, y), fill);
                }
            }
            if let Some(stroke) = mark.stroke {
                let at = |step: usize| {
                    let angle = TAU * step as f32 / ELLIPSE_SEGMENTS as f32;
                    Point2::new(center.x + radii.x * angle.cos(), center.y + radii.y * angle.sin())
                };
                for step in 0..ELLIPSE_SEGMENTS {
                    line(at(step), at(step + 1), stroke);
                }
            }
        }
    }
}
