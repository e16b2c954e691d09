//! # Shrink-to-fit Text Layout
//!
//! Places a message inside a box as large as it will go:
//!
//! 1. Try font sizes from [`MAX_FONT_SIZE`] down to [`MIN_FONT_SIZE`] in
//!    steps of [`FONT_SIZE_STEP`].
//! 2. At each size, greedily wrap on whitespace so no line is wider than the
//!    box. A word that is wider than the box on its own gets a line to
//!    itself and is never split.
//! 3. The block is `lines * line_height + (lines - 1) * spacing` tall, where
//!    spacing is 20% of the line height, rounded.
//! 4. The first size whose block fits the box height wins.
//! 5. If nothing fits, the smallest size is used anyway and the result is
//!    flagged as degraded.
//! 6. The block is centered vertically and every line horizontally.
//!
//! Fixed-size fonts (the built-in fallback) get exactly one attempt since
//! every size would measure the same.
//!
//! The layout is a pure function of its inputs.

use crate::fonts::{Face, FontFamily};
use log::warn;

/// Largest candidate size in pixels
pub const MAX_FONT_SIZE: u32 = 100;
/// Smallest candidate size; used even when it does not fit
pub const MIN_FONT_SIZE: u32 = 20;
/// Distance between candidate sizes
pub const FONT_SIZE_STEP: u32 = 5;
/// Gap between lines as a fraction of the line height
pub const LINE_SPACING_RATIO: f32 = 0.2;

/// Candidate size range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayoutOptions {
    pub max_size: u32,
    pub min_size: u32,
    pub step: u32,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            max_size: MAX_FONT_SIZE,
            min_size: MIN_FONT_SIZE,
            step: FONT_SIZE_STEP,
        }
    }
}

impl LayoutOptions {
    /// Sizes to try, largest first. Always ends with `min_size`.
    pub fn candidate_sizes(&self) -> Vec<u32> {
        let step = self.step.max(1);
        let mut sizes = Vec::new();
        let mut size = self.max_size.max(self.min_size);
        while size > self.min_size {
            sizes.push(size);
            size = size.saturating_sub(step);
        }
        sizes.push(self.min_size);
        sizes
    }
}

/// One line of text with its position relative to the box's top-left corner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlacedLine {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub font_size: u32,
}

/// Output of [`layout`], ready to draw.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct LayoutResult {
    pub lines: Vec<PlacedLine>,
    /// Size the lines were laid out with
    pub font_size: u32,
    pub line_height: u32,
    pub line_spacing: u32,
    /// Total height of the text block
    pub block_height: u32,
    /// True when even the smallest size overflowed the box height
    pub degraded: bool,
}

impl LayoutResult {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Lay out `text` in a `box_width` x `box_height` box with the default sizes.
pub fn layout<F: FontFamily>(
    text: &str,
    box_width: u32,
    box_height: u32,
    family: &F,
) -> LayoutResult {
    layout_with(text, box_width, box_height, family, &LayoutOptions::default())
}

/// [`layout`] with explicit candidate sizes.
pub fn layout_with<F: FontFamily>(
    text: &str,
    box_width: u32,
    box_height: u32,
    family: &F,
    options: &LayoutOptions,
) -> LayoutResult {
    if text.split_whitespace().next().is_none() {
        return LayoutResult::default();
    }

    let sizes = if family.is_scalable() {
        options.candidate_sizes()
    } else {
        vec![options.min_size]
    };

    let mut attempt = None;
    for size in sizes {
        let face = family.face(size);
        let lines = wrap(text, box_width, &face);
        let line_height = face.line_height();
        if block_height(lines.len(), line_height) <= box_height {
            return place(lines, box_width, box_height, &face, false);
        }
        attempt = Some((face, lines));
    }

    let Some((face, lines)) = attempt else {
        return LayoutResult::default();
    };
    warn!(
        "Text {:?} does not fit {}x{} even at {}px, drawing it anyway",
        text,
        box_width,
        box_height,
        face.size()
    );
    place(lines, box_width, box_height, &face, true)
}

/// Greedy whitespace word wrap.
///
/// A word goes onto the current line when the joined line still measures at
/// most `max_width`; otherwise it starts a new line.
pub fn wrap<Fc: Face>(text: &str, max_width: u32, face: &Fc) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{current} {word}");
        if face.text_width(&candidate) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Gap between consecutive lines.
pub fn line_spacing(line_height: u32) -> u32 {
    (line_height as f32 * LINE_SPACING_RATIO).round() as u32
}

/// Height of a block of `lines` lines.
pub fn block_height(lines: usize, line_height: u32) -> u32 {
    if lines == 0 {
        return 0;
    }
    let n = lines as u32;
    n * line_height + (n - 1) * line_spacing(line_height)
}

fn place<Fc: Face>(
    lines: Vec<String>,
    box_width: u32,
    box_height: u32,
    face: &Fc,
    degraded: bool,
) -> LayoutResult {
    let line_height = face.line_height();
    let spacing = line_spacing(line_height);
    let total = block_height(lines.len(), line_height);
    let top = (box_height as i32 - total as i32).div_euclid(2);
    let font_size = face.size();

    let lines = lines
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let width = face.text_width(&text);
            PlacedLine {
                x: (box_width as i32 - width as i32).div_euclid(2),
                y: top + i as i32 * (line_height + spacing) as i32,
                font_size,
                text,
            }
        })
        .collect();

    LayoutResult {
        lines,
        font_size,
        line_height,
        line_spacing: spacing,
        block_height: total,
        degraded,
    }
}
