//! # Fonts
//!
//! Messages are drawn with TrueType/OpenType faces (TTF or TTC collections)
//! rasterized by `fontdue`. Which file a message uses is decided by its
//! `font_id`, looked up in the font table.
//!
//! Font files are read through a [`FontStore`] so that tests can hand in
//! bytes without touching the filesystem. Parsed fonts are kept in a
//! [`FontCache`] owned by the renderer; `fontdue` fonts are size
//! independent, so one entry per file serves every candidate size.
//!
//! When a file cannot be read or parsed the cache hands out [`Font::Builtin`],
//! a fixed-size bitmap font from `embedded-graphics`. It cannot be scaled,
//! which the layout engine accounts for.

use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_6X12};
use embedded_graphics::mono_font::{MonoFont, MonoTextStyle};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::text::{Baseline, Text};
use fontdue::FontSettings;
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Font id used when a message does not name one
pub const DEFAULT_FONT_ID: u32 = 1;

/// Fixed-size fallback face for messages
pub const BUILTIN_FONT: &MonoFont<'static> = &FONT_10X20;

/// Small face for the diagnostic overlay and grid labels
pub const LABEL_FONT: &MonoFont<'static> = &FONT_6X12;

/// Coverage at or above this is painted as ink
const INK_THRESHOLD: u8 = 128;

/// The static font table. Configuration may add to or override it.
pub fn default_font_table() -> BTreeMap<u32, PathBuf> {
    [
        (1, "/usr/share/fonts/opentype/noto/NotoSansCJK-Bold.ttc"),
        (2, "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc"),
        (3, "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf"),
        (4, "/usr/share/fonts/truetype/dejavu/DejaVuSerif.ttf"),
    ]
    .into_iter()
    .map(|(id, path)| (id, PathBuf::from(path)))
    .collect()
}

/// Where font bytes come from.
pub trait FontStore {
    fn load(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Reads font files from disk.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsFontStore;

impl FontStore for FsFontStore {
    fn load(&self, path: &Path) -> io::Result<Vec<u8>> {
        std::fs::read(path)
    }
}

/// Font bytes held in memory, keyed by path.
#[derive(Clone, Debug, Default)]
pub struct MemoryFontStore {
    files: HashMap<PathBuf, Vec<u8>>,
}

impl MemoryFontStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, bytes: Vec<u8>) {
        self.files.insert(path.into(), bytes);
    }
}

impl FontStore for MemoryFontStore {
    fn load(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, path.display().to_string()))
    }
}

/// Measuring and drawing text at one fixed size.
pub trait Face {
    /// Nominal size in pixels.
    fn size(&self) -> u32;

    /// Horizontal extent of `text` in pixels.
    fn text_width(&self, text: &str) -> u32;

    /// Height of one line of text in pixels.
    fn line_height(&self) -> u32;

    /// Draw `text` with its line box's top-left corner at `top_left`.
    fn draw<D>(&self, text: &str, top_left: Point, target: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = BinaryColor>;
}

/// A typeface that produces [`Face`]s at requested sizes.
pub trait FontFamily {
    type Face: Face;

    /// False when [`FontFamily::face`] ignores the requested size.
    fn is_scalable(&self) -> bool;

    fn face(&self, size: u32) -> Self::Face;
}

/// A loaded font: either a parsed outline font or the built-in fallback.
#[derive(Clone)]
pub enum Font {
    Outline(Arc<fontdue::Font>),
    Builtin,
}

impl fmt::Debug for Font {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Font::Outline(_) => f.write_str("Font::Outline"),
            Font::Builtin => f.write_str("Font::Builtin"),
        }
    }
}

impl Font {
    /// Parse TTF/OTF bytes (first face of a TTC collection).
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, &'static str> {
        let font = fontdue::Font::from_bytes(bytes, FontSettings::default())?;
        Ok(Font::Outline(Arc::new(font)))
    }

    pub fn is_builtin(&self) -> bool {
        matches!(self, Font::Builtin)
    }
}

impl FontFamily for Font {
    type Face = FontFace;

    fn is_scalable(&self) -> bool {
        !self.is_builtin()
    }

    fn face(&self, size: u32) -> FontFace {
        match self {
            Font::Outline(font) => FontFace::Outline {
                font: Arc::clone(font),
                px: size as f32,
            },
            Font::Builtin => FontFace::Mono(BUILTIN_FONT),
        }
    }
}

/// A [`Font`] at a concrete size.
#[derive(Clone)]
pub enum FontFace {
    Outline { font: Arc<fontdue::Font>, px: f32 },
    Mono(&'static MonoFont<'static>),
}

impl fmt::Debug for FontFace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FontFace::Outline { px, .. } => write!(f, "FontFace::Outline({px}px)"),
            FontFace::Mono(font) => write!(
                f,
                "FontFace::Mono({}x{})",
                font.character_size.width, font.character_size.height
            ),
        }
    }
}

impl FontFace {
    /// Ascent in pixels (distance from line top to baseline).
    fn ascent(&self) -> i32 {
        match self {
            FontFace::Outline { font, px } => font
                .horizontal_line_metrics(*px)
                .map(|m| m.ascent.round() as i32)
                .unwrap_or(*px as i32),
            FontFace::Mono(font) => font.baseline as i32,
        }
    }
}

impl Face for FontFace {
    fn size(&self) -> u32 {
        match self {
            FontFace::Outline { px, .. } => *px as u32,
            FontFace::Mono(font) => font.character_size.height,
        }
    }

    fn text_width(&self, text: &str) -> u32 {
        match self {
            FontFace::Outline { font, px } => {
                let width: f32 = text
                    .chars()
                    .map(|c| font.metrics(c, *px).advance_width)
                    .sum();
                width.ceil() as u32
            }
            FontFace::Mono(font) => mono_text_width(font, text),
        }
    }

    fn line_height(&self) -> u32 {
        match self {
            FontFace::Outline { font, px } => font
                .horizontal_line_metrics(*px)
                .map(|m| (m.ascent - m.descent).ceil() as u32)
                .unwrap_or(*px as u32),
            FontFace::Mono(font) => font.character_size.height,
        }
    }

    fn draw<D>(&self, text: &str, top_left: Point, target: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        match self {
            FontFace::Outline { font, px } => {
                let baseline = top_left.y + self.ascent();
                let mut pen_x = top_left.x as f32;
                let mut pixels = Vec::new();
                for c in text.chars() {
                    let (metrics, coverage) = font.rasterize(c, *px);
                    let gx = pen_x.round() as i32 + metrics.xmin;
                    let gy = baseline - metrics.height as i32 - metrics.ymin;
                    for row in 0..metrics.height {
                        for col in 0..metrics.width {
                            if coverage[row * metrics.width + col] >= INK_THRESHOLD {
                                pixels.push(Pixel(
                                    Point::new(gx + col as i32, gy + row as i32),
                                    BinaryColor::On,
                                ));
                            }
                        }
                    }
                    pen_x += metrics.advance_width;
                }
                target.draw_iter(pixels)
            }
            FontFace::Mono(font) => {
                let style = MonoTextStyle::new(font, BinaryColor::On);
                Text::with_baseline(text, top_left, style, Baseline::Top).draw(target)?;
                Ok(())
            }
        }
    }
}

/// Width of `text` in a mono font, matching how `embedded-graphics` lays it out.
pub fn mono_text_width(font: &MonoFont<'_>, text: &str) -> u32 {
    let n = text.chars().count() as u32;
    if n == 0 {
        return 0;
    }
    n * font.character_size.width + (n - 1) * font.character_spacing
}

/// Font id to loaded font, with lazily parsed, cached entries.
pub struct FontCache<S> {
    store: S,
    table: BTreeMap<u32, PathBuf>,
    default_font_id: u32,
    loaded: HashMap<PathBuf, Font>,
}

impl<S: FontStore> FontCache<S> {
    pub fn new(store: S, table: BTreeMap<u32, PathBuf>, default_font_id: u32) -> Self {
        Self {
            store,
            table,
            default_font_id,
            loaded: HashMap::new(),
        }
    }

    /// Font for `font_id`; unknown ids resolve like the default id.
    pub fn font(&mut self, font_id: u32) -> Font {
        let path = self
            .table
            .get(&font_id)
            .or_else(|| self.table.get(&self.default_font_id))
            .cloned();
        match path {
            Some(path) => self.font_at(&path),
            None => Font::Builtin,
        }
    }

    /// Font stored at `path`, or [`Font::Builtin`] if it cannot be loaded.
    ///
    /// Failures are cached too, so a missing file is only reported once.
    pub fn font_at(&mut self, path: &Path) -> Font {
        if let Some(font) = self.loaded.get(path) {
            return font.clone();
        }
        let font = match self.store.load(path) {
            Ok(bytes) => match Font::from_bytes(&bytes) {
                Ok(font) => {
                    debug!("Loaded font {}", path.display());
                    font
                }
                Err(e) => {
                    warn!("Font {} is unusable ({}), using built-in font", path.display(), e);
                    Font::Builtin
                }
            },
            Err(e) => {
                warn!("Font {} not available ({}), using built-in font", path.display(), e);
                Font::Builtin
            }
        };
        self.loaded.insert(path.to_path_buf(), font.clone());
        font
    }

    /// Number of paths attempted so far.
    pub fn cached_paths(&self) -> usize {
        self.loaded.len()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::layout::layout;

    const DEJAVU_BOLD: &[u8] = include_bytes!("../fixtures/fonts/DejaVuSans-Bold.ttf");
    const DEJAVU_PATH: &str = "/fonts/DejaVuSans-Bold.ttf";

    fn dejavu() -> Font {
        let mut store = MemoryFontStore::new();
        store.insert(DEJAVU_PATH, DEJAVU_BOLD.to_vec());
        let table: BTreeMap<u32, PathBuf> = [(1, PathBuf::from(DEJAVU_PATH))].into();
        FontCache::new(store, table, 1).font(1)
    }

    /// Draw `text` alone on a roomy frame and return its ink bounds.
    fn ink_of(face: &FontFace, text: &str, top_left: Point) -> (i32, i32, i32, i32) {
        let mut frame = Frame::new(600, 300);
        face.draw(text, top_left, &mut frame).unwrap();
        frame.ink_bounds().expect("text drew no ink")
    }

    #[test]
    fn test_default_table_has_default_id() {
        assert!(default_font_table().contains_key(&DEFAULT_FONT_ID));
    }

    #[test]
    fn test_missing_font_falls_back_to_builtin() {
        let mut cache = FontCache::new(MemoryFontStore::new(), default_font_table(), 1);
        let font = cache.font(1);
        assert!(font.is_builtin());
        assert!(!font.is_scalable());
        // Second lookup hits the cached failure
        assert!(cache.font(1).is_builtin());
        assert_eq!(cache.cached_paths(), 1);
    }

    #[test]
    fn test_garbage_bytes_fall_back_to_builtin() {
        let mut store = MemoryFontStore::new();
        store.insert("/fonts/broken.ttf", b"definitely not a font".to_vec());
        let table: BTreeMap<u32, PathBuf> = [(1, PathBuf::from("/fonts/broken.ttf"))].into();
        let mut cache = FontCache::new(store, table, 1);
        assert!(cache.font(1).is_builtin());
    }

    #[test]
    fn test_unknown_id_resolves_through_default() {
        let mut cache = FontCache::new(MemoryFontStore::new(), BTreeMap::new(), 1);
        assert!(cache.font(99).is_builtin());
        assert_eq!(cache.cached_paths(), 0);
    }

    #[test]
    fn test_builtin_face_ignores_size() {
        let small = Font::Builtin.face(20);
        let large = Font::Builtin.face(100);
        assert_eq!(small.line_height(), large.line_height());
        assert_eq!(small.line_height(), 20);
        assert_eq!(small.text_width("abc"), 30);
        assert_eq!(small.text_width(""), 0);
    }

    #[test]
    fn test_builtin_face_draws_within_measured_box() {
        let face = Font::Builtin.face(0);
        let mut frame = Frame::new(200, 60);
        face.draw("Hi!", Point::new(10, 5), &mut frame).unwrap();
        let (x0, y0, x1, y1) = frame.ink_bounds().unwrap();
        assert!(x0 >= 10 && y0 >= 5);
        assert!(x1 < 10 + face.text_width("Hi!") as i32);
        assert!(y1 < 5 + face.line_height() as i32);
    }

    #[test]
    fn test_mono_text_width_counts_spacing() {
        assert_eq!(mono_text_width(LABEL_FONT, "12"), 12);
        assert_eq!(mono_text_width(LABEL_FONT, ""), 0);
    }

    #[test]
    fn test_outline_font_loads_from_store() {
        let font = dejavu();
        assert!(!font.is_builtin());
        assert!(font.is_scalable());
    }

    #[test]
    fn test_outline_line_height_is_ascent_minus_descent() {
        let Font::Outline(raw) = dejavu() else {
            panic!("fixture did not parse");
        };
        for size in [20u32, 30, 55, 100] {
            let metrics = raw.horizontal_line_metrics(size as f32).unwrap();
            let face = Font::Outline(Arc::clone(&raw)).face(size);
            assert_eq!(face.size(), size);
            assert_eq!(
                face.line_height(),
                (metrics.ascent - metrics.descent).ceil() as u32,
                "{size}px"
            );
        }
        assert_eq!(dejavu().face(30).line_height(), 35);
    }

    #[test]
    fn test_outline_width_grows_with_text_and_size() {
        let font = dejavu();
        let face = font.face(30);
        assert_eq!(face.text_width(""), 0);
        assert!(face.text_width("Hello") < face.text_width("Hello World"));
        assert!(face.text_width("Hello") < font.face(60).text_width("Hello"));
    }

    #[test]
    fn test_outline_layout_ink_stays_in_line_boxes() {
        let font = dejavu();
        let result = layout("Hello World", 200, 80, &font);
        assert_eq!(result.font_size, 30);
        assert_eq!(result.line_height, 35);
        assert!(!result.degraded);

        let face = font.face(result.font_size);
        let box_origin = Point::new(100, 60);
        for line in &result.lines {
            let width = face.text_width(&line.text);
            assert!(width <= 200, "{:?} is {width}px", line.text);

            let top_left = box_origin + Point::new(line.x, line.y);
            let (x0, y0, x1, y1) = ink_of(&face, &line.text, top_left);
            assert!(x0 >= top_left.x && x1 <= top_left.x + width as i32, "{:?} x {x0}..{x1}", line.text);
            assert!(
                y0 >= top_left.y && y1 < top_left.y + result.line_height as i32,
                "{:?} y {y0}..{y1}",
                line.text
            );
        }
    }

    #[test]
    fn test_outline_descenders_hang_below_baseline() {
        let font = dejavu();
        let face = font.face(100);
        let top_left = Point::new(50, 40);
        let baseline = top_left.y + face.ascent();

        let (_, _, _, flat_bottom) = ink_of(&face, "mn", top_left);
        let (_, y0, _, hang_bottom) = ink_of(&face, "gyp", top_left);
        assert!(flat_bottom <= baseline);
        assert!(hang_bottom > baseline + 10);
        assert!(y0 >= top_left.y);
        assert!(hang_bottom < top_left.y + face.line_height() as i32);
    }
}
