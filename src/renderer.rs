//! # Frame Rendering
//!
//! Turns a selected message plus the cycle's diagnostics into a finished
//! [`Frame`] for the panel, and draws the one-shot calibration grid.
//!
//! ## Frame Anatomy
//! - **Message**: laid out by [`crate::layout`] inside the configured text box
//! - **Diagnostic overlay** (optional): raw values, network name, data source
//!   and update time, top-left at (10, 10) in the built-in 10x20 font
//!
//! ## Calibration Grid
//! One-pixel lines every 50 px in both directions, with coordinate labels on
//! every second line. It is shown once at startup so the text box offsets in
//! the configuration can be read straight off the panel.

use crate::config::{Config, Message, TextBox};
use crate::fonts::{Face, FontCache, FontFamily, FontStore, BUILTIN_FONT, LABEL_FONT};
use crate::frame::Frame;
use crate::layout::{layout, LayoutResult};
use crate::Reading;
use chrono::{DateTime, Local};
use embedded_graphics::mono_font::MonoTextStyle;
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{Line, PrimitiveStyle};
use embedded_graphics::text::{Baseline, Text};
use log::debug;

/// Grid pitch in pixels
pub const GRID_STEP: u32 = 50;
/// Top-left corner of the diagnostic overlay
pub const OVERLAY_ORIGIN: Point = Point::new(10, 10);
/// Vertical gap between overlay lines
const OVERLAY_LINE_GAP: i32 = 4;

/// What the overlay reports about the current cycle.
#[derive(Clone, Debug)]
pub struct Diagnostics {
    pub reading: Reading,
    pub ssid: Option<String>,
    pub updated_at: DateTime<Local>,
}

impl Diagnostics {
    /// Overlay text, one entry per line.
    pub fn lines(&self) -> Vec<String> {
        vec![
            format!(
                "moisture: {:.2}, light: {:.2}",
                self.reading.moisture, self.reading.light
            ),
            format!("ssid: {}", self.ssid.as_deref().unwrap_or("unknown")),
            format!("source: {}", self.reading.origin.label()),
            format!("updated: {}", self.updated_at.format("%H:%M")),
        ]
    }
}

/// Renders frames for one panel.
pub struct Renderer<S> {
    fonts: FontCache<S>,
    width: u32,
    height: u32,
    text_box: TextBox,
    show_overlay: bool,
}

impl<S: FontStore> Renderer<S> {
    pub fn new(config: &Config, width: u32, height: u32, store: S) -> Self {
        Self {
            fonts: FontCache::new(store, config.fonts.clone(), config.default_font_id),
            width,
            height,
            text_box: config.text_box(width, height),
            show_overlay: config.show_log_messages,
        }
    }

    pub fn text_box(&self) -> TextBox {
        self.text_box
    }

    /// Compose the full frame for one poll cycle.
    pub fn compose(&mut self, message: &Message, diagnostics: &Diagnostics) -> Frame {
        let mut frame = Frame::new(self.width, self.height);

        let font = self.fonts.font(message.font_id);
        let result = layout(&message.text, self.text_box.width, self.text_box.height, &font);
        debug!(
            "Layout: {} line(s) at {}px{}",
            result.lines.len(),
            result.font_size,
            if result.degraded { " (degraded)" } else { "" }
        );
        draw_layout(&mut frame, &result, &font, self.text_box);

        if self.show_overlay {
            draw_overlay(&mut frame, &diagnostics.lines());
        }
        frame
    }

    /// The calibration grid frame.
    pub fn grid(&self) -> Frame {
        let mut frame = Frame::new(self.width, self.height);
        draw_grid(&mut frame, GRID_STEP);
        frame
    }
}

/// Draw laid-out lines, offset by the text box origin.
pub fn draw_layout<F: FontFamily>(
    frame: &mut Frame,
    result: &LayoutResult,
    family: &F,
    text_box: TextBox,
) {
    if result.is_empty() {
        return;
    }
    let face = family.face(result.font_size);
    for line in &result.lines {
        let origin = Point::new(text_box.x + line.x, text_box.y + line.y);
        face.draw(&line.text, origin, frame)
            .unwrap_or_else(|never| match never {});
    }
}

/// Draw diagnostic lines from [`OVERLAY_ORIGIN`] downwards.
pub fn draw_overlay(frame: &mut Frame, lines: &[String]) {
    let style = MonoTextStyle::new(BUILTIN_FONT, BinaryColor::On);
    let pitch = BUILTIN_FONT.character_size.height as i32 + OVERLAY_LINE_GAP;
    for (i, line) in lines.iter().enumerate() {
        let origin = OVERLAY_ORIGIN + Point::new(0, i as i32 * pitch);
        Text::with_baseline(line, origin, style, Baseline::Top)
            .draw(frame)
            .unwrap_or_else(|never| match never {});
    }
}

/// Draw a coordinate grid with labels on every second line.
pub fn draw_grid(frame: &mut Frame, step: u32) {
    let (width, height) = (frame.width() as i32, frame.height() as i32);
    let stroke = PrimitiveStyle::with_stroke(BinaryColor::On, 1);
    let label = MonoTextStyle::new(LABEL_FONT, BinaryColor::On);
    let step = step.max(1) as usize;

    for x in (0..width).step_by(step) {
        Line::new(Point::new(x, 0), Point::new(x, height - 1))
            .into_styled(stroke)
            .draw(frame)
            .unwrap_or_else(|never| match never {});
        if x as usize % (step * 2) == 0 {
            Text::with_baseline(&x.to_string(), Point::new(x + 2, 2), label, Baseline::Top)
                .draw(frame)
                .unwrap_or_else(|never| match never {});
        }
    }

    for y in (0..height).step_by(step) {
        Line::new(Point::new(0, y), Point::new(width - 1, y))
            .into_styled(stroke)
            .draw(frame)
            .unwrap_or_else(|never| match never {});
        if y as usize % (step * 2) == 0 {
            Text::with_baseline(&y.to_string(), Point::new(2, y + 2), label, Baseline::Top)
                .draw(frame)
                .unwrap_or_else(|never| match never {});
        }
    }
}
