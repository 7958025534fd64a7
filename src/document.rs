use glam::Vec2;

use crate::{font::FontFace, images::EmbeddedImage};

/// A laid-out, paginated document ready for serialization.
///
/// Coordinates are in points measured from the top-left corner of the page.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub pages: Vec<Page>,
    pub images: Vec<EmbeddedImage>,
    pub page_size: Vec2,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct Page {
    pub ops: Vec<Op>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageId(pub usize);

#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Makes `style` the active text style for the rest of the page.
    Style(TextStyle),
    /// A single line of text; `origin` is the left end of its baseline.
    Text { origin: Vec2, text: String },
    /// An image drawn with its top-left corner at `origin`.
    Image { id: ImageId, origin: Vec2, size: Vec2 },
    Rule { from: Vec2, to: Vec2, color: Color },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub u8, pub u8, pub u8);

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub face: FontFace,
    pub font_size: f32,
    pub color: Color,
}

impl Color {
    pub const BLACK: Color = Color(0, 0, 0);

    pub const fn gray(level: u8) -> Self {
        Color(level, level, level)
    }
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            face: FontFace::Regular,
            font_size: 10.0,
            color: Color::BLACK,
        }
    }
}

impl TextStyle {
    pub fn new(face: FontFace, font_size: f32, color: Color) -> Self {
        Self {
            face,
            font_size,
            color,
        }
    }
}

impl Page {
    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.ops.iter().filter_map(|op| match op {
            Op::Text { text, .. } => Some(text.as_str()),
            _ => None,
        })
    }
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}
